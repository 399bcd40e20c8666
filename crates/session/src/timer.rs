//! Cancelable delayed task with a single outstanding handle.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug)]
struct Pending {
    ticket: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// At most one scheduled refresh.
///
/// Scheduling always cancels the previous task first. A fired task must call
/// [`RefreshTimer::disarm`] with its ticket before doing work, so that a
/// reschedule from inside the task does not abort the task itself.
#[derive(Debug, Default)]
pub struct RefreshTimer {
    pending: Option<Pending>,
    next_ticket: u64,
}

impl RefreshTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task(ticket)` after `delay`, replacing any pending task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F, Fut>(&mut self, delay: Duration, task: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let deadline = Instant::now() + delay;
        let fut = task(ticket);

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fut.await;
        });

        self.pending = Some(Pending {
            ticket,
            deadline,
            handle,
        });
        ticket
    }

    /// Abort the pending task, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Called by a fired task: forget the handle without aborting it.
    ///
    /// Returns `false` if `ticket` is no longer the pending one (it was
    /// cancelled or replaced), in which case the task must do nothing.
    pub fn disarm(&mut self, ticket: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
