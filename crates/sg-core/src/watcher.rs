//! Mutation Watcher
//!
//! Subscribes to `childList` + `subtree` mutations under a root and runs
//! one sweep of that root per delivered batch. Batches without added nodes
//! (including the removals a sweep itself causes) are ignored.

use std::rc::Rc;

use crate::host::{Host, HostError, Teardown};
use crate::sweeper::Sweeper;

/// Live subscription; holds nothing but its teardown.
pub struct MutationWatcher {
    teardown: Option<Teardown>,
}

impl MutationWatcher {
    /// Start observing `root` on `host`.
    pub fn observe<H: Host>(host: &H, root: &H::Node, sweeper: Rc<Sweeper>) -> Result<Self, HostError> {
        let sweep_host = host.clone();
        let sweep_root = root.clone();

        let teardown = host.observe(
            root,
            Box::new(move |batch| {
                if !batch.has_additions() {
                    return;
                }
                let removed = sweeper.sweep(&sweep_host, &sweep_root);
                log::trace!(
                    "mutation batch ({} records, {} added) swept {} element(s)",
                    batch.records,
                    batch.added,
                    removed
                );
            }),
        )?;

        Ok(Self {
            teardown: Some(teardown),
        })
    }

    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    /// Stop observing. Returns `false` if already disconnected.
    pub fn disconnect(&mut self) -> bool {
        match self.teardown.take() {
            Some(teardown) => {
                teardown();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::host::Dom;
    use crate::page::MemoryPage;
    use crate::types::SweepTargets;

    fn sweeper() -> Rc<Sweeper> {
        Rc::new(Sweeper::new(Classifier::default(), SweepTargets::ALL))
    }

    #[test]
    fn test_inserted_iframe_removed_on_flush() {
        let page = MemoryPage::new();
        let body = page.body();
        let mut watcher = MutationWatcher::observe(&page, &body, sweeper()).unwrap();

        let wrapper = page.append(body, "div", &[]);
        let frame = page.append(wrapper, "iframe", &[("src", "https://exoclick.com/ad")]);
        assert!(page.is_connected(&frame));

        assert_eq!(page.flush_mutations(), 1);
        assert!(!page.is_connected(&frame));
        assert!(page.is_connected(&wrapper));

        // The sweep's own removal is delivered next and ignored
        assert_eq!(page.flush_mutations(), 1);
        assert_eq!(page.flush_mutations(), 0);

        assert!(watcher.disconnect());
        assert!(!watcher.disconnect());
        assert_eq!(page.active_observers(), 0);
    }

    #[test]
    fn test_disconnected_watcher_ignores_insertions() {
        let page = MemoryPage::new();
        let body = page.body();
        let mut watcher = MutationWatcher::observe(&page, &body, sweeper()).unwrap();
        watcher.disconnect();

        let script = page.append(body, "script", &[("src", "https://popads.net/x.js")]);
        page.flush_mutations();
        assert!(page.is_connected(&script));
    }
}
