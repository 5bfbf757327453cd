//! Per-view route protection on top of an `AdminSessionGuard`.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;

use crate::session::AdminSession;

/// What a view demands of the session before it renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Protected views.
    Authenticated,
    /// The login view.
    Unauthenticated,
}

/// The verdict for a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Still `Unknown`: render a neutral loading state, do not navigate.
    Pending,
    Granted,
    /// The requirement failed; the gate's callback runs (once).
    Denied,
}

/// Router collaborator.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Builds a gate callback that navigates to `path`.
pub fn redirect_to(
    navigator: Arc<dyn Navigator>,
    path: impl Into<String>,
) -> impl FnOnce() + Send + 'static {
    let path = path.into();
    move || navigator.navigate(&path)
}

type GateAction = Box<dyn FnOnce() + Send>;

struct GateSlot {
    action: Option<GateAction>,
    disposed: bool,
}

/// GateHandle
///
/// A live subscription of one view to the session. It re-evaluates on every
/// transition and runs its callback the first time the requirement is denied,
/// then stops. Dropping or disposing the handle cancels it: once `dispose`
/// returns the callback can no longer run, even if a resolution was in flight.
///
/// The callback runs while the gate's lock is held and must not dispose its
/// own gate.
///
/// The gate sees the latest session state, not every transition. A retry
/// `resolve()` that moves `Unauthenticated` back to `Unknown` before the gate
/// task observes the denial hides it; the redirect then waits for the retry
/// to settle.
pub struct GateHandle {
    slot: Arc<Mutex<GateSlot>>,
    access: watch::Receiver<Access>,
    task: JoinHandle<()>,
}

impl GateHandle {
    pub(crate) fn spawn(
        mut session: watch::Receiver<AdminSession>,
        requirement: Requirement,
        action: GateAction,
    ) -> Self {
        let slot = Arc::new(Mutex::new(GateSlot {
            action: Some(action),
            disposed: false,
        }));
        let (access_tx, access) = watch::channel(Access::Pending);

        let task_slot = Arc::clone(&slot);
        let task = tokio::spawn(async move {
            loop {
                let verdict = session.borrow_and_update().access(requirement);
                if verdict == Access::Denied {
                    fire(&task_slot, requirement);
                    access_tx.send_replace(verdict);
                    return;
                }
                access_tx.send_replace(verdict);

                if session.changed().await.is_err() {
                    return;
                }
            }
        });

        Self { slot, access, task }
    }

    /// The latest verdict.
    pub fn access(&self) -> Access {
        *self.access.borrow()
    }

    /// Waits until the session is no longer `Unknown` for this gate. When this
    /// returns `Denied` the callback has already run.
    pub async fn settled(&mut self) -> Access {
        let settled = self
            .access
            .wait_for(|access| *access != Access::Pending)
            .await
            .map(|access| *access)
            .ok();
        settled.unwrap_or_else(|| *self.access.borrow())
    }

    /// Unmount. Equivalent to dropping the handle.
    pub fn dispose(self) {}
}

fn fire(slot: &Mutex<GateSlot>, requirement: Requirement) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.disposed {
        return;
    }
    if let Some(action) = slot.action.take() {
        debug!(?requirement, "session gate denied; running redirect");
        action();
    }
}

impl Drop for GateHandle {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.disposed = true;
        slot.action = None;
        drop(slot);
        self.task.abort();
    }
}
