//! The failure-reporting bus supervisors publish to, per spec.md §4.3
//! ("delivered to a bus the host may subscribe to").

use std::sync::Arc;

use tokio::sync::broadcast;

use super::error::WorkerError;
use super::supervisor::SupervisorState;

/// One event published whenever a supervised worker's state changes.
///
/// `cause` is populated with a typed [`WorkerError`] for the two
/// supervisor-time error kinds (a panic, or a tripped circuit breaker);
/// ordinary restart-triggering failures still carry a human-readable
/// `detail` but no typed cause, since they are expected operation, not an
/// error condition in their own right. `Arc`-wrapped so the event stays
/// `Clone` without requiring `WorkerError` itself to be.
#[derive(Debug, Clone)]
pub struct SupervisorEvent {
    pub worker_name: String,
    pub state: SupervisorState,
    pub restart_count: u32,
    pub detail: Option<String>,
    pub cause: Option<Arc<WorkerError>>,
}

/// Capacity for the broadcast channel backing the bus. Generous relative
/// to realistic worker counts; a slow subscriber drops the oldest events
/// rather than backpressuring supervisors.
const BUS_CAPACITY: usize = 256;

/// Creates a fresh failure-reporting bus; the manager holds the sender and
/// hands out receivers via [`FailureBus::subscribe`].
pub struct FailureBus {
    sender: broadcast::Sender<SupervisorEvent>,
}

impl Default for FailureBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }
}

impl FailureBus {
    /// Subscribes to future events; missed events while unsubscribed are
    /// not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&self, event: SupervisorEvent) {
        // No subscribers is the common case and not an error.
        let _ = self.sender.send(event);
    }
}
