//! Periodic Reconciler
//!
//! Backstop sweep on a fixed interval, for elements the watcher cannot see.

use std::rc::Rc;
use std::time::Duration;

use crate::host::{Host, HostError, Teardown};
use crate::sweeper::Sweeper;

/// Default reconciliation period.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(2000);

/// A running interval timer. Cancelling is idempotent.
pub struct PeriodicReconciler {
    period: Duration,
    teardown: Option<Teardown>,
}

impl PeriodicReconciler {
    /// Schedule a sweep of `root` every `period`.
    pub fn start<H: Host>(
        host: &H,
        root: &H::Node,
        sweeper: Rc<Sweeper>,
        period: Duration,
    ) -> Result<Self, HostError> {
        let sweep_host = host.clone();
        let sweep_root = root.clone();

        let teardown = host.set_interval(
            period,
            Box::new(move || {
                sweeper.sweep(&sweep_host, &sweep_root);
            }),
        )?;

        Ok(Self {
            period,
            teardown: Some(teardown),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    /// Clear the timer. Returns `false` if it was already cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.teardown.take() {
            Some(teardown) => {
                teardown();
                true
            }
            None => false,
        }
    }
}
