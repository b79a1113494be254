use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sg_core::policy::parse_filter_list;
use sg_core::url::extract_host;
use sg_core::{Classifier, MemoryPage, Sweeper, SweepTargets};

const MIX: &[&str] = &[
    "https://www.example.com/index.html",
    "https://admaven.com/offer?id=7",
    "https://popads.net/pop.js",
    "https://cdn.jsdelivr.net/npm/lib@1/dist/lib.min.js",
    "https://tracker.click/p.gif",
    "https://a8f3k2m9x7q1z5w4e.net/s.js",
    "//static.exoclick.com/ads.js",
    "data:text/html,<p>hi</p>",
    "https://video.example.org/player/embed/42",
    "",
];

fn bench_classify(c: &mut Criterion) {
    let classifier = Classifier::default();

    c.bench_function("classify_mix", |b| {
        b.iter(|| {
            for url in MIX {
                black_box(classifier.classify(black_box(url)));
            }
        })
    });

    c.bench_function("classify_allowed_hot_path", |b| {
        b.iter(|| black_box(classifier.classify(black_box("https://www.example.com/app.js"))))
    });

    c.bench_function("extract_host", |b| {
        b.iter(|| {
            for url in MIX {
                black_box(extract_host(black_box(url)));
            }
        })
    });
}

fn bench_parse(c: &mut Criterion) {
    let mut list = String::from("! Title: bench list\n@@||admaven.com^\n##div[id*=\"ad\"]\n*.click\n");
    for i in 0..1000 {
        list.push_str(&format!("||ads{}.example^\n0.0.0.0 track{}.example\n", i, i));
    }

    c.bench_function("parse_filter_list_2k", |b| {
        b.iter(|| black_box(parse_filter_list(black_box(&list))))
    });
}

fn bench_sweep(c: &mut Criterion) {
    let sweeper = Sweeper::new(Classifier::default(), SweepTargets::ALL);

    c.bench_function("sweep_clean_page_500", |b| {
        let page = MemoryPage::new();
        let body = page.body();
        for i in 0..100 {
            let section = page.append(body, "div", &[("class", "section")]);
            for j in 0..4 {
                let src = format!("https://cdn.example.com/{}/{}.js", i, j);
                page.append(section, "script", &[("src", src.as_str())]);
            }
        }
        b.iter(|| black_box(sweeper.sweep(&page, &body)))
    });
}

criterion_group!(benches, bench_classify, bench_parse, bench_sweep);
criterion_main!(benches);
