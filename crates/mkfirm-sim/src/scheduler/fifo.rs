//! Arrival-order list scheduler.

use super::{ListPolicy, SchedView};
use crate::error::SchedulerResult;
use crate::job::JobHandle;
use crate::time::Time;

/// Runs jobs in the order they were enqueued.
///
/// This is the bare list-dispatch scheduler: deadline monitoring and
/// cancellation come from the engine, ordering is plain arrival order.
#[derive(Debug, Clone, Default)]
pub struct Fifo {
    queue: Vec<JobHandle>,
}

impl ListPolicy for Fifo {
    const NAME: &'static str = "list";

    fn insert(&mut self, _view: SchedView<'_>, handle: JobHandle) {
        self.queue.push(handle);
    }

    fn remove(&mut self, handle: JobHandle) -> bool {
        match self.queue.iter().position(|&h| h == handle) {
            Some(slot) => {
                self.queue.remove(slot);
                true
            }
            None => false,
        }
    }

    fn select(&self, _view: SchedView<'_>, _now: Time) -> SchedulerResult<Option<JobHandle>> {
        Ok(self.queue.first().copied())
    }

    fn order(&self) -> Vec<JobHandle> {
        self.queue.clone()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}
