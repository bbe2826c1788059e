use std::sync::Arc;
use std::time::Duration;

use rapport_columnar::ExecContext;
use rapport_store::InteractionStore;

use crate::clock::MonotonicClock;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: InteractionStore,
    pub clock: MonotonicClock,
    /// Deadline applied to every store operation.
    pub op_timeout: Duration,
}

impl AppStateInner {
    pub fn new(store: InteractionStore, op_timeout: Duration) -> Self {
        Self {
            store,
            clock: MonotonicClock::new(),
            op_timeout,
        }
    }

    pub fn op_context(&self) -> ExecContext {
        ExecContext::with_timeout(self.op_timeout)
    }
}
