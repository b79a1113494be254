//! DOM Sweeper
//!
//! One pass over a subtree: decide for every element in document order,
//! then detach the blocked ones that are still attached. The pass is
//! idempotent and never fails; elements that cannot be read are skipped.

use crate::classifier::Classifier;
use crate::host::Dom;
use crate::types::SweepTargets;
use crate::url::extract_refresh_target;

/// Why an element was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalKind {
    Script,
    Iframe,
    MetaRefresh,
    Container,
}

/// Scans a document subtree and removes blocked elements.
#[derive(Debug, Clone)]
pub struct Sweeper {
    classifier: Classifier,
    targets: SweepTargets,
}

impl Sweeper {
    pub fn new(classifier: Classifier, targets: SweepTargets) -> Self {
        Self { classifier, targets }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn targets(&self) -> SweepTargets {
        self.targets
    }

    /// Sweep everything under `root`. Returns the number of elements removed.
    pub fn sweep<D: Dom + ?Sized>(&self, dom: &D, root: &D::Node) -> usize {
        let mut removed = 0usize;

        for node in dom.elements_under(root) {
            let kind = match self.inspect(dom, &node) {
                Some(kind) => kind,
                None => continue,
            };

            // An ancestor removed earlier in this pass took the node with it
            if !dom.is_connected(&node) {
                continue;
            }

            if dom.detach(&node) {
                removed += 1;
                log::debug!("removed blocked {:?} element", kind);
            }
        }

        if removed > 0 {
            log::info!("sweep removed {} element(s)", removed);
        }
        removed
    }

    /// Decide whether a single element must go.
    pub fn inspect<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> Option<RemovalKind> {
        let tag = dom.tag_name(node)?;

        match tag.as_str() {
            "script" if self.targets.contains(SweepTargets::SCRIPT) => {
                if let Some(src) = dom.attribute(node, "src") {
                    if self.classifier.should_block(&src) {
                        log::debug!("blocked script: {}", src);
                        return Some(RemovalKind::Script);
                    }
                }
            }
            "iframe" if self.targets.contains(SweepTargets::IFRAME) => {
                let src = dom
                    .attribute(node, "src")
                    .filter(|s| !s.trim().is_empty())
                    .or_else(|| dom.attribute(node, "data-src"))
                    .unwrap_or_default();
                let class = dom.attribute(node, "class").unwrap_or_default();

                if self.classifier.policy().is_player_embed(&[&src, &class]) {
                    return None;
                }
                if self.classifier.should_block(&src) {
                    log::debug!("blocked iframe: {}", src);
                    return Some(RemovalKind::Iframe);
                }
            }
            "meta" if self.targets.contains(SweepTargets::META_REFRESH) => {
                let is_refresh = dom
                    .attribute(node, "http-equiv")
                    .map_or(false, |v| v.trim().eq_ignore_ascii_case("refresh"));
                if is_refresh {
                    if let Some(content) = dom.attribute(node, "content") {
                        let target = extract_refresh_target(&content);
                        if self.classifier.should_block(target) {
                            log::debug!("blocked meta refresh: {}", target);
                            return Some(RemovalKind::MetaRefresh);
                        }
                    }
                }
            }
            _ => {}
        }

        if self.targets.contains(SweepTargets::CONTAINER) {
            let matched = self
                .classifier
                .policy()
                .container_selectors()
                .iter()
                .any(|sel| sel.matches(&tag, |name| dom.attribute(node, name)));
            if matched {
                return Some(RemovalKind::Container);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::page::MemoryPage;
    use crate::policy::{PolicyConfig, PolicyStore, DEFAULT_RANDOM_HOST_RUN};

    fn sweeper() -> Sweeper {
        Sweeper::new(Classifier::default(), SweepTargets::ALL)
    }

    #[test]
    fn test_removes_blocked_script_keeps_partner() {
        let page = MemoryPage::new();
        let body = page.body();
        let blocked = page.append(body, "script", &[("src", "https://popads.net/x.js")]);
        let partner = page.append(body, "script", &[("src", "https://admaven.com/x.js")]);

        assert_eq!(sweeper().sweep(&page, &body), 1);
        assert!(!page.is_connected(&blocked));
        assert!(page.is_connected(&partner));
    }

    #[test]
    fn test_inline_script_is_ignored() {
        let page = MemoryPage::new();
        let body = page.body();
        page.append(body, "script", &[("type", "text/javascript")]);
        assert_eq!(sweeper().sweep(&page, &body), 0);
    }

    fn heuristic_sweeper() -> Sweeper {
        let config = PolicyConfig {
            random_host_run: Some(DEFAULT_RANDOM_HOST_RUN),
            ..PolicyConfig::default()
        };
        let policy = PolicyStore::from_config(&config).unwrap();
        Sweeper::new(Classifier::new(Rc::new(policy)), SweepTargets::ALL)
    }

    #[test]
    fn test_own_player_iframe_survives_builtin_policy() {
        let page = MemoryPage::new();
        let body = page.body();
        let player = page.append(body, "iframe", &[("src", "https://megaplay.buzz/stream/s-2/12345/sub")]);
        let backup = page.append(body, "iframe", &[("src", "https://vidwish.live/stream/s-2/12345/dub")]);

        assert_eq!(sweeper().sweep(&page, &body), 0);
        assert!(page.is_connected(&player));
        assert!(page.is_connected(&backup));
    }

    #[test]
    fn test_player_iframe_survives_heuristics() {
        let page = MemoryPage::new();
        let body = page.body();
        let player = page.append(body, "iframe", &[("src", "https://stream.top/embed/abc")]);
        let by_class = page.append(
            body,
            "iframe",
            &[("src", "https://q8x7k2m9p4w1z6b3.example.com/"), ("class", "video-frame")],
        );
        let ad = page.append(body, "iframe", &[("src", "https://q8x7k2m9p4w1z6b3.example.com/")]);

        assert_eq!(heuristic_sweeper().sweep(&page, &body), 1);
        assert!(page.is_connected(&player));
        assert!(page.is_connected(&by_class));
        assert!(!page.is_connected(&ad));
    }

    #[test]
    fn test_iframe_data_src_fallback() {
        let page = MemoryPage::new();
        let body = page.body();
        let lazy = page.append(body, "iframe", &[("data-src", "https://exoclick.com/ad")]);
        assert_eq!(sweeper().sweep(&page, &body), 1);
        assert!(!page.is_connected(&lazy));
    }

    #[test]
    fn test_meta_refresh() {
        let page = MemoryPage::new();
        let head = page.append(page.document_element(), "head", &[]);
        let bad = page.append(
            head,
            "meta",
            &[("http-equiv", "Refresh"), ("content", "0; url=https://popcash.net/land")],
        );
        let good = page.append(
            head,
            "meta",
            &[("http-equiv", "refresh"), ("content", "30; url=/home")],
        );
        let other = page.append(head, "meta", &[("name", "description"), ("content", "popcash.net")]);

        assert_eq!(sweeper().sweep(&page, &page.document_element()), 1);
        assert!(!page.is_connected(&bad));
        assert!(page.is_connected(&good));
        assert!(page.is_connected(&other));
    }

    #[test]
    fn test_containers() {
        let page = MemoryPage::new();
        let body = page.body();
        let gads = page.append(body, "div", &[("id", "google_ads_iframe_1")]);
        let span = page.append(body, "span", &[("id", "google_ads_label")]);
        let prop = page.append(body, "section", &[("class", "wrap propeller-slot")]);
        let child = page.append(prop, "script", &[("src", "https://popads.net/in-container.js")]);

        // The nested script goes with its container and is not counted twice
        assert_eq!(sweeper().sweep(&page, &body), 2);
        assert!(!page.is_connected(&gads));
        assert!(page.is_connected(&span));
        assert!(!page.is_connected(&prop));
        assert!(!page.is_connected(&child));
    }

    #[test]
    fn test_container_needle_is_case_sensitive() {
        let page = MemoryPage::new();
        let body = page.body();
        let upper = page.append(body, "div", &[("class", "Propeller-slot")]);
        let lower = page.append(body, "div", &[("class", "propeller-slot")]);

        assert_eq!(sweeper().sweep(&page, &body), 1);
        assert!(page.is_connected(&upper));
        assert!(!page.is_connected(&lower));
    }

    #[test]
    fn test_targets_mask() {
        let page = MemoryPage::new();
        let body = page.body();
        let script = page.append(body, "script", &[("src", "https://popads.net/x.js")]);
        let container = page.append(body, "div", &[("class", "adsbygoogle")]);

        let scripts_only = Sweeper::new(Classifier::default(), SweepTargets::SCRIPT);
        assert_eq!(scripts_only.sweep(&page, &body), 1);
        assert!(!page.is_connected(&script));
        assert!(page.is_connected(&container));
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let page = MemoryPage::new();
        let body = page.body();
        page.append(body, "script", &[("src", "https://popads.net/x.js")]);
        page.append(body, "iframe", &[("src", "https://exoclick.com/ad")]);

        let s = sweeper();
        assert_eq!(s.sweep(&page, &body), 2);
        assert_eq!(s.sweep(&page, &body), 0);
    }

    #[test]
    fn test_sweeping_detached_root_is_harmless() {
        let page = MemoryPage::new();
        let orphan = page.create_element("div");
        let inner = page.append(orphan, "script", &[("src", "https://popads.net/x.js")]);
        assert_eq!(sweeper().sweep(&page, &orphan), 0);
        assert_eq!(page.tag_name(&inner).as_deref(), Some("script"));
    }
}
