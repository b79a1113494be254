use std::cmp::Ordering;
use std::rc::Rc;
use std::time::Instant;

use clap::ValueEnum;
use sg_core::{Classifier, MemoryPage, PolicyStore, Sweeper};

use crate::policy;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum BenchMode {
    Classify,
    Sweep,
    Both,
}

pub struct BenchOptions {
    pub policy_path: Option<String>,
    pub mode: BenchMode,
    pub iterations: usize,
    pub urls: usize,
    pub seed: u32,
}

struct BenchResult {
    ops: usize,
    blocked: usize,
    total_ms: f64,
    avg_us: f64,
    p50_us: f64,
    p95_us: f64,
    p99_us: f64,
    ops_per_sec: u64,
}

pub const DEFAULT_SEED: u32 = 0xc0ffee;

pub fn run(opts: BenchOptions) -> Result<(), String> {
    println!("============================================================");
    println!("SweepGuard Benchmark");
    println!("============================================================");

    let config = policy::read_policy(opts.policy_path.as_deref())?;
    let store = PolicyStore::from_config(&config.policy).map_err(|e| format!("Invalid policy: {}", e))?;
    let classifier = Classifier::new(Rc::new(store));
    let urls = generate_urls(opts.urls, opts.seed);

    if matches!(opts.mode, BenchMode::Classify | BenchMode::Both) {
        println!("------------------------------------------------------------");
        println!("Classify ({} urls, {} iterations)", urls.len(), opts.iterations);
        println!("------------------------------------------------------------");
        let result = bench_classify(&classifier, &urls, opts.iterations);
        println!("{}", format_result(&result));
    }

    if matches!(opts.mode, BenchMode::Sweep | BenchMode::Both) {
        println!("------------------------------------------------------------");
        println!("Sweep (page of {} elements, {} iterations)", urls.len(), opts.iterations);
        println!("------------------------------------------------------------");
        let sweeper = Sweeper::new(classifier, config.sweep_targets);
        let result = bench_sweep(&sweeper, &urls, opts.iterations);
        println!("{}", format_result(&result));
    }

    Ok(())
}

fn bench_classify(classifier: &Classifier, urls: &[String], iterations: usize) -> BenchResult {
    let mut latencies = Vec::with_capacity(urls.len() * iterations);
    let mut blocked = 0usize;

    for _ in 0..iterations {
        for url in urls {
            let start = Instant::now();
            if classifier.should_block(url) {
                blocked += 1;
            }
            latencies.push(start.elapsed().as_secs_f64() * 1_000_000.0);
        }
    }

    summarize(latencies, blocked)
}

/// Each iteration builds a fresh page and times one full sweep of it.
fn bench_sweep(sweeper: &Sweeper, urls: &[String], iterations: usize) -> BenchResult {
    let mut latencies = Vec::with_capacity(iterations);
    let mut blocked = 0usize;

    for _ in 0..iterations {
        let page = MemoryPage::new();
        let body = page.body();
        for (i, url) in urls.iter().enumerate() {
            let tag = if i % 3 == 0 { "iframe" } else { "script" };
            page.append(body, tag, &[("src", url.as_str())]);
        }

        let start = Instant::now();
        blocked += sweeper.sweep(&page, &body);
        latencies.push(start.elapsed().as_secs_f64() * 1_000_000.0);
    }

    summarize(latencies, blocked)
}

fn summarize(mut latencies: Vec<f64>, blocked: usize) -> BenchResult {
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let ops = latencies.len();
    let total_us: f64 = latencies.iter().sum();
    let total_ms = total_us / 1000.0;

    BenchResult {
        ops,
        blocked,
        total_ms,
        avg_us: if ops == 0 { 0.0 } else { total_us / ops as f64 },
        p50_us: percentile(&latencies, 0.50),
        p95_us: percentile(&latencies, 0.95),
        p99_us: percentile(&latencies, 0.99),
        ops_per_sec: if total_ms > 0.0 { (ops as f64 / (total_ms / 1000.0)) as u64 } else { 0 },
    }
}

fn format_result(result: &BenchResult) -> String {
    format!(
        "  Operations:  {}\n  Blocked:     {}\n  Total time:  {:.2}ms\n  Avg latency: {:.2}μs\n  P50 latency: {:.2}μs\n  P95 latency: {:.2}μs\n  P99 latency: {:.2}μs\n  Throughput:  {} ops/sec",
        result.ops,
        result.blocked,
        result.total_ms,
        result.avg_us,
        result.p50_us,
        result.p95_us,
        result.p99_us,
        result.ops_per_sec,
    )
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let idx = ((values.len() as f64) * p).ceil() as usize;
    let idx = idx.saturating_sub(1).min(values.len() - 1);
    values[idx]
}

fn create_rng(seed: u32) -> impl FnMut() -> f64 {
    let mut state = seed;
    move || {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        (state as f64) / (u32::MAX as f64)
    }
}

fn pick<T: Clone>(items: &[T], rand: &mut impl FnMut() -> f64) -> T {
    let idx = (rand() * items.len() as f64).floor() as usize;
    items[idx.min(items.len() - 1)].clone()
}

fn rand_alnum(rand: &mut impl FnMut() -> f64, len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        let idx = (rand() * CHARS.len() as f64).floor() as usize;
        out.push(CHARS[idx.min(CHARS.len() - 1)] as char);
    }
    out
}

/// Seeded mix of ad-network, partner, redirector and clean URLs.
fn generate_urls(count: usize, seed: u32) -> Vec<String> {
    const AD_HOSTS: &[&str] = &[
        "popads.net",
        "c1.popads.net",
        "exoclick.com",
        "syndication.exoclick.com",
        "propellerads.com",
        "hilltopads.net",
        "doubleclick.net",
        "pagead2.googlesyndication.com",
    ];
    const CLEAN_HOSTS: &[&str] = &[
        "example.com",
        "cdn.jsdelivr.net",
        "github.com",
        "wikipedia.org",
        "admaven.com",
        "video.example.org",
    ];
    const SUSPICIOUS_TLDS: &[&str] = &["click", "top", "xyz"];
    const PATHS: &[&str] = &[
        "/",
        "/assets/main.js",
        "/embed/42",
        "/player/iframe.html",
        "/ads/banner.js",
        "/pop.js",
    ];

    let mut rng = create_rng(seed);
    let mut urls = Vec::with_capacity(count);

    for _ in 0..count {
        let roll = rng();
        let host = if roll < 0.25 {
            pick(AD_HOSTS, &mut rng).to_string()
        } else if roll < 0.35 {
            format!("{}.{}", rand_alnum(&mut rng, 8), pick(SUSPICIOUS_TLDS, &mut rng))
        } else if roll < 0.40 {
            format!("{}.com", rand_alnum(&mut rng, 18))
        } else {
            pick(CLEAN_HOSTS, &mut rng).to_string()
        };
        urls.push(format!("https://{}{}", host, pick(PATHS, &mut rng)));
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_urls_are_deterministic() {
        let a = generate_urls(50, DEFAULT_SEED);
        let b = generate_urls(50, DEFAULT_SEED);
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
        assert!(a.iter().all(|u| u.starts_with("https://")));
        assert_ne!(a, generate_urls(50, 7));
    }

    #[test]
    fn test_percentile() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.50), 2.0);
        assert_eq!(percentile(&values, 0.99), 4.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_bench_counts_ops() {
        let urls = vec!["https://popads.net/".to_string(), "https://example.com/".to_string()];
        let result = bench_classify(&Classifier::default(), &urls, 3);
        assert_eq!(result.ops, 6);
        assert_eq!(result.blocked, 3);

        let sweeper = Sweeper::new(Classifier::default(), sg_core::SweepTargets::ALL);
        let result = bench_sweep(&sweeper, &urls, 2);
        assert_eq!(result.ops, 2);
        assert_eq!(result.blocked, 2);
    }
}
