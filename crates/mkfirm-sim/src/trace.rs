//! Explicit logging context for a simulation.
//!
//! A simulation never logs through the process-wide default subscriber.
//! Every public operation runs under the [`Dispatch`] held by its
//! [`TraceContext`], inside a `simulation` span tagged with the scheduler
//! name. The default context discards everything.

use tracing::{Dispatch, Subscriber};

/// Subscriber handle threaded through [`Simulation`](crate::Simulation).
#[derive(Debug, Clone)]
pub struct TraceContext {
    dispatch: Dispatch,
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::none()
    }
}

impl TraceContext {
    /// A context that drops every span and event.
    #[must_use]
    pub fn none() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Route logs to `subscriber`.
    #[must_use]
    pub fn from_subscriber<S>(subscriber: S) -> Self
    where
        S: Subscriber + Send + Sync + 'static,
    {
        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    #[must_use]
    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    #[must_use]
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Run `f` with this context as the thread's default dispatcher.
    pub fn in_scope<T>(&self, scheduler: &str, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, || {
            let span = tracing::info_span!("simulation", scheduler);
            let _entered = span.enter();
            f()
        })
    }
}
