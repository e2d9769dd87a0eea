use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;

/// Source of simulated latency.
///
/// The deadline is fixed when `sleep` is called, not when the returned
/// future is first polled.
pub trait Scheduler: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Real timers from the tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }
}

struct Sleeper {
    deadline: Duration,
    wake: oneshot::Sender<()>,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    sleepers: Vec<Sleeper>,
}

/// Virtual clock that only moves when [`ManualScheduler::advance`] is called.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn clock(&self) -> MutexGuard<'_, ManualClock> {
        match self.clock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn now(&self) -> Duration {
        self.clock().now
    }

    /// Sleepers still waiting for their deadline.
    pub fn pending(&self) -> usize {
        self.clock().sleepers.len()
    }

    /// Moves virtual time forward and wakes every sleeper whose deadline has passed.
    pub fn advance(&self, by: Duration) {
        let mut clock = self.clock();
        clock.now += by;
        let now = clock.now;

        let (due, waiting): (Vec<_>, Vec<_>) = clock
            .sleepers
            .drain(..)
            .partition(|sleeper| sleeper.deadline <= now);
        clock.sleepers = waiting;
        drop(clock);

        for sleeper in due {
            let _ = sleeper.wake.send(());
        }
    }
}

impl Scheduler for ManualScheduler {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        let (wake, rx) = oneshot::channel();
        if duration.is_zero() {
            let _ = wake.send(());
        } else {
            let mut clock = self.clock();
            let deadline = clock.now + duration;
            clock.sleepers.push(Sleeper { deadline, wake });
        }

        async move {
            let _ = rx.await;
        }
        .boxed()
    }
}
