//! Current correlation id plus its debounced auto-clear.
//!
//! When the in-flight set drains, the runtime arms a single delayed clear.
//! Any `begin` before it fires supersedes it, so a synchronous operation
//! that hands off to asynchronous work keeps its id across the gap.
//!
//! At most one clear is outstanding per context: on a Tokio runtime it is
//! an aborted-on-rearm task, otherwise a single resettable timer thread.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::CorrelationId;

type Job = Box<dyn FnOnce() + Send>;

/// Handle to the one outstanding delayed clear.
#[derive(Debug)]
enum ClearTimer {
    Task(JoinHandle<()>),
    /// Scheduled on the context's [`FallbackTimer`].
    Thread,
}

// ─── Fallback timer thread ───────────────────────────────────────

#[derive(Default)]
struct TimerSlot {
    deadline: Option<Instant>,
    job: Option<Job>,
    shutdown: bool,
}

#[derive(Default)]
struct TimerShared {
    slot: Mutex<TimerSlot>,
    wake: Condvar,
}

/// One long-lived thread holding at most one pending job. Rescheduling
/// replaces the job, cancelling empties the slot, dropping stops the thread.
struct FallbackTimer {
    shared: Arc<TimerShared>,
}

impl FallbackTimer {
    fn start() -> std::io::Result<Self> {
        let shared = Arc::new(TimerShared::default());
        let worker = shared.clone();
        std::thread::Builder::new()
            .name("perflog-correlation-timer".into())
            .spawn(move || Self::run(&worker))?;
        Ok(Self { shared })
    }

    fn run(shared: &TimerShared) {
        let mut slot = shared.slot.lock();
        loop {
            if slot.shutdown {
                return;
            }
            let deadline = slot.deadline;
            match deadline {
                None => shared.wake.wait(&mut slot),
                Some(deadline) if Instant::now() >= deadline => {
                    slot.deadline = None;
                    if let Some(job) = slot.job.take() {
                        // The job takes the runtime lock; never hold ours meanwhile.
                        MutexGuard::unlocked(&mut slot, job);
                    }
                }
                Some(deadline) => {
                    shared.wake.wait_until(&mut slot, deadline);
                }
            }
        }
    }

    fn schedule(&self, delay: Duration, job: Job) {
        let mut slot = self.shared.slot.lock();
        slot.deadline = Some(Instant::now() + delay);
        slot.job = Some(job);
        self.shared.wake.notify_one();
    }

    fn cancel(&self) {
        let mut slot = self.shared.slot.lock();
        slot.deadline = None;
        slot.job = None;
        self.shared.wake.notify_one();
    }

    fn is_scheduled(&self) -> bool {
        self.shared.slot.lock().job.is_some()
    }
}

impl Drop for FallbackTimer {
    fn drop(&mut self) {
        let mut slot = self.shared.slot.lock();
        slot.shutdown = true;
        slot.job = None;
        self.shared.wake.notify_one();
    }
}

impl fmt::Debug for FallbackTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackTimer")
            .field("scheduled", &self.is_scheduled())
            .finish()
    }
}

// ─── Context ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct CorrelationContext {
    current: Option<CorrelationId>,
    /// Bumped every time a pending clear is armed or superseded.
    generation: u64,
    pending: Option<ClearTimer>,
    fallback: Option<FallbackTimer>,
    threads_started: usize,
}

impl CorrelationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&CorrelationId> {
        self.current.as_ref()
    }

    pub fn set_current(&mut self, id: Option<CorrelationId>) {
        self.current = id;
    }

    pub fn has_pending_clear(&self) -> bool {
        self.pending.is_some()
    }

    /// Timer threads this context has ever started (0 or 1).
    pub fn timer_threads(&self) -> usize {
        self.threads_started
    }

    /// Drop any pending clear. Called on every `begin`.
    pub fn supersede(&mut self) {
        if self.pending.is_some() {
            self.generation = self.generation.wrapping_add(1);
            self.cancel_pending();
        }
    }

    fn cancel_pending(&mut self) {
        match self.pending.take() {
            Some(ClearTimer::Task(handle)) => handle.abort(),
            Some(ClearTimer::Thread) => {
                if let Some(timer) = &self.fallback {
                    timer.cancel();
                }
            }
            None => {}
        }
    }

    /// Replace any pending clear with a new one firing after `delay`.
    /// `on_fire` receives the token to hand back to [`fire`](Self::fire).
    pub fn arm<F>(&mut self, delay: Duration, on_fire: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel_pending();
        self.generation = self.generation.wrapping_add(1);
        let token = self.generation;
        let job = move || on_fire(token);

        if let Ok(handle) = Handle::try_current() {
            self.pending = Some(ClearTimer::Task(handle.spawn(async move {
                tokio::time::sleep(delay).await;
                job();
            })));
            return;
        }

        if self.fallback.is_none() {
            match FallbackTimer::start() {
                Ok(timer) => {
                    self.fallback = Some(timer);
                    self.threads_started += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "cannot start correlation timer thread, id kept");
                    return;
                }
            }
        }
        if let Some(timer) = &self.fallback {
            timer.schedule(delay, Box::new(job));
            self.pending = Some(ClearTimer::Thread);
        }
    }

    /// Timer callback. Clears the id only if this timer is still the live
    /// one and nothing is in flight. Returns whether the id was cleared.
    pub fn fire(&mut self, token: u64, in_flight_empty: bool) -> bool {
        if token != self.generation {
            return false;
        }
        self.pending = None;
        if !in_flight_empty {
            return false;
        }
        self.current.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_ctx() -> Arc<Mutex<CorrelationContext>> {
        Arc::new(Mutex::new(CorrelationContext::new()))
    }

    /// Arm the way the runtime does: the callback re-locks the context.
    fn arm(ctx: &Arc<Mutex<CorrelationContext>>, delay: Duration) {
        let weak = Arc::downgrade(ctx);
        ctx.lock().arm(delay, move |token| {
            if let Some(ctx) = weak.upgrade() {
                ctx.lock().fire(token, true);
            }
        });
    }

    #[test]
    fn fire_clears_when_idle() {
        let mut ctx = CorrelationContext::new();
        ctx.set_current(Some("C1".into()));
        ctx.arm(Duration::from_secs(60), |_| {});

        let token = ctx.generation;
        assert!(ctx.fire(token, true));
        assert!(ctx.current().is_none());
        assert!(!ctx.has_pending_clear());
    }

    #[test]
    fn superseded_token_is_ignored() {
        let mut ctx = CorrelationContext::new();
        ctx.set_current(Some("C1".into()));
        ctx.arm(Duration::from_secs(60), |_| {});
        let token = ctx.generation;
        ctx.supersede();

        assert!(!ctx.fire(token, true));
        assert_eq!(ctx.current(), Some(&"C1".into()));
    }

    #[test]
    fn busy_tracker_keeps_id() {
        let mut ctx = CorrelationContext::new();
        ctx.set_current(Some("C1".into()));
        ctx.arm(Duration::from_secs(60), |_| {});
        let token = ctx.generation;
        assert!(!ctx.fire(token, false));
        assert!(ctx.current().is_some());
    }

    #[test]
    fn churn_without_runtime_uses_one_thread() {
        let ctx = shared_ctx();
        ctx.lock().set_current(Some("C1".into()));

        for _ in 0..500 {
            arm(&ctx, Duration::from_millis(2_000));
            ctx.lock().supersede();
        }
        arm(&ctx, Duration::from_millis(20));

        assert_eq!(ctx.lock().timer_threads(), 1);
        assert!(ctx.lock().has_pending_clear());

        std::thread::sleep(Duration::from_millis(300));
        let ctx = ctx.lock();
        assert!(ctx.current().is_none());
        assert!(!ctx.has_pending_clear());
    }

    #[test]
    fn cancelled_thread_job_never_runs() {
        let ctx = shared_ctx();
        ctx.lock().set_current(Some("C1".into()));
        arm(&ctx, Duration::from_millis(20));
        ctx.lock().supersede();

        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(ctx.lock().current(), Some(&"C1".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn task_timer_fires_and_rearms() {
        let ctx = shared_ctx();
        ctx.lock().set_current(Some("C1".into()));
        arm(&ctx, Duration::from_millis(100));
        arm(&ctx, Duration::from_millis(300));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ctx.lock().current(), Some(&"C1".into()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(ctx.lock().current().is_none());
        assert_eq!(ctx.lock().timer_threads(), 0);
    }
}
