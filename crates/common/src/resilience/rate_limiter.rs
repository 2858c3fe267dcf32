//! Sliding-window rate limiters
//!
//! Two limiters share one window algorithm:
//! - [`SlidingWindowLimiter`]: independent read and write buckets, each with a
//!   short window and an optional hourly window
//! - [`GlobalLimiter`]: a single bucket for APIs with one undifferentiated
//!   quota
//!
//! A window keeps the instants of admitted requests and evicts the ones older
//! than its period lazily, on the next call. A request is admitted only when
//! every applicable window has room; otherwise the caller gets the longest
//! remaining wait and nothing is recorded.
//!
//! # Examples
//!
//! ```rust
//! use zsdk_common::resilience::{OperationClass, SlidingWindowLimiter};
//!
//! let limiter = SlidingWindowLimiter::new(3, 1, 1, 1);
//! for _ in 0..3 {
//!     assert!(!limiter.wait(OperationClass::Read).must_wait());
//! }
//! assert!(limiter.wait(OperationClass::Read).must_wait());
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{Clock, SystemClock};

const SECONDS_PER_HOUR: u64 = 3_600;

/// Quota bucket a request is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// GET, HEAD, OPTIONS
    Read,
    /// POST, PUT, PATCH
    Write,
    /// DELETE: charged to the write bucket, plus the delete-only hourly window
    Delete,
}

impl OperationClass {
    /// Classify an HTTP method name.
    pub fn from_method(method: &str) -> Self {
        if method.eq_ignore_ascii_case("DELETE") {
            Self::Delete
        } else if method.eq_ignore_ascii_case("GET")
            || method.eq_ignore_ascii_case("HEAD")
            || method.eq_ignore_ascii_case("OPTIONS")
        {
            Self::Read
        } else {
            Self::Write
        }
    }

    /// Whether this class draws from the write bucket.
    pub fn is_write(self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// Outcome of asking a limiter for admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may go now; its timestamp has been recorded.
    Admitted,
    /// The request must wait this long before asking again.
    Wait(Duration),
}

impl Admission {
    /// True for [`Admission::Wait`], whatever the delay.
    pub fn must_wait(self) -> bool {
        matches!(self, Self::Wait(_))
    }

    /// Delay to honour before retrying; zero when admitted.
    pub fn delay(self) -> Duration {
        match self {
            Self::Admitted => Duration::ZERO,
            Self::Wait(delay) => delay,
        }
    }
}

/// Admission control consumed by the transport.
///
/// `wait` records the request when it is admitted. `peek` answers the same
/// question without recording anything.
pub trait RequestLimiter: Send + Sync {
    /// Admit a request of `class` now and record it, or report how long
    /// until a slot frees up. A `Wait` records nothing.
    fn wait(&self, class: OperationClass) -> Admission;

    /// What `wait` would answer at this instant, leaving the windows as
    /// they are.
    fn peek(&self, class: OperationClass) -> Admission;
}

/// Limiter that admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl RequestLimiter for Unlimited {
    fn wait(&self, _class: OperationClass) -> Admission {
        Admission::Admitted
    }

    fn peek(&self, _class: OperationClass) -> Admission {
        Admission::Admitted
    }
}

/// Timestamps of recently admitted requests for one quota.
///
/// After [`RateWindow::prune`], no more than `limit` timestamps younger than
/// `period` remain.
#[derive(Debug)]
struct RateWindow {
    limit: u32,
    period: Duration,
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    fn new(limit: u32, period: Duration) -> Self {
        Self { limit, period, timestamps: VecDeque::new() }
    }

    fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.period {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Remaining wait if this window is full, `None` if it has room.
    fn blocking_delay(&mut self, now: Instant) -> Option<Duration> {
        if !self.is_enabled() {
            return None;
        }
        self.prune(now);
        if self.timestamps.len() < self.limit as usize {
            return None;
        }
        // Pruned, so the oldest entry is still inside the period.
        let oldest = *self.timestamps.front()?;
        Some(self.period.saturating_sub(now.saturating_duration_since(oldest)))
    }

    fn record(&mut self, now: Instant) {
        if self.is_enabled() {
            self.timestamps.push_back(now);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.timestamps.len()
    }
}

/// Limits for a [`SlidingWindowLimiter`]; a limit of `0` disables its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowLimits {
    pub read_limit: u32,
    pub write_limit: u32,
    pub read_period: Duration,
    pub write_period: Duration,
    pub read_hourly_limit: u32,
    pub write_hourly_limit: u32,
    pub delete_hourly_limit: u32,
}

impl WindowLimits {
    /// Short windows only.
    pub fn new(
        read_limit: u32,
        write_limit: u32,
        read_period_secs: u64,
        write_period_secs: u64,
    ) -> Self {
        Self {
            read_limit,
            write_limit,
            read_period: Duration::from_secs(read_period_secs),
            write_period: Duration::from_secs(write_period_secs),
            ..Self::default()
        }
    }

    /// Add hourly windows on top of the short ones.
    pub fn hourly(mut self, read_hourly: u32, write_hourly: u32, delete_hourly: u32) -> Self {
        self.read_hourly_limit = read_hourly;
        self.write_hourly_limit = write_hourly;
        self.delete_hourly_limit = delete_hourly;
        self
    }
}

#[derive(Debug)]
struct ClassWindows {
    short: RateWindow,
    hourly: RateWindow,
}

impl ClassWindows {
    fn new(limit: u32, period: Duration, hourly_limit: u32) -> Self {
        Self {
            short: RateWindow::new(limit, period),
            hourly: RateWindow::new(hourly_limit, Duration::from_secs(SECONDS_PER_HOUR)),
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    read: ClassWindows,
    write: ClassWindows,
    delete_hourly: RateWindow,
}

impl LimiterState {
    fn windows_for(&mut self, class: OperationClass) -> Vec<&mut RateWindow> {
        match class {
            OperationClass::Read => vec![&mut self.read.short, &mut self.read.hourly],
            OperationClass::Write => vec![&mut self.write.short, &mut self.write.hourly],
            OperationClass::Delete => vec![
                &mut self.write.short,
                &mut self.write.hourly,
                &mut self.delete_hourly,
            ],
        }
    }
}

/// Evaluate every window; record in all of them only when none blocks.
fn admit(windows: &mut [&mut RateWindow], now: Instant, record: bool) -> Admission {
    let delay = windows.iter_mut().filter_map(|window| window.blocking_delay(now)).max();

    match delay {
        Some(delay) => Admission::Wait(delay),
        None => {
            if record {
                for window in windows.iter_mut() {
                    window.record(now);
                }
            }
            Admission::Admitted
        }
    }
}

fn lock_state<'a, T>(mutex: &'a Mutex<T>, name: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!(limiter = name, "limiter lock poisoned; continuing with inner state");
        poisoned.into_inner()
    })
}

/// Dual-bucket sliding-window limiter.
///
/// Read and write classes are independent: exhausting one never blocks the
/// other. When a class has both a short and an hourly window, a request must
/// pass both and the reported wait is the longer of the two.
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    state: Mutex<LimiterState>,
    clock: C,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Create a limiter with short windows only.
    pub fn new(
        read_limit: u32,
        write_limit: u32,
        read_period_secs: u64,
        write_period_secs: u64,
    ) -> Self {
        Self::with_clock(
            WindowLimits::new(read_limit, write_limit, read_period_secs, write_period_secs),
            SystemClock,
        )
    }

    /// Create a limiter with additional hourly windows.
    ///
    /// `delete_hourly_limit` applies to DELETE requests only, on top of the
    /// write windows they already pass through.
    #[allow(clippy::too_many_arguments)]
    pub fn with_hourly(
        read_limit: u32,
        write_limit: u32,
        read_period_secs: u64,
        write_period_secs: u64,
        read_hourly_limit: u32,
        write_hourly_limit: u32,
        delete_hourly_limit: u32,
    ) -> Self {
        Self::with_clock(
            WindowLimits::new(read_limit, write_limit, read_period_secs, write_period_secs)
                .hourly(read_hourly_limit, write_hourly_limit, delete_hourly_limit),
            SystemClock,
        )
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    /// Create a limiter with a custom clock
    pub fn with_clock(limits: WindowLimits, clock: C) -> Self {
        let state = LimiterState {
            read: ClassWindows::new(
                limits.read_limit,
                limits.read_period,
                limits.read_hourly_limit,
            ),
            write: ClassWindows::new(
                limits.write_limit,
                limits.write_period,
                limits.write_hourly_limit,
            ),
            delete_hourly: if limits.delete_hourly_limit > 0 {
                RateWindow::new(limits.delete_hourly_limit, Duration::from_secs(SECONDS_PER_HOUR))
            } else {
                RateWindow::disabled()
            },
        };
        Self { state: Mutex::new(state), clock }
    }

    fn evaluate(&self, class: OperationClass, record: bool) -> Admission {
        let now = self.clock.now();
        let mut state = lock_state(&self.state, "sliding_window");
        let mut windows = state.windows_for(class);
        let admission = admit(&mut windows, now, record);

        if let Admission::Wait(delay) = admission {
            debug!(?class, delay_ms = delay.as_millis() as u64, "rate limit window full");
        }
        admission
    }

    /// Ask for admission and record the request if it is admitted.
    pub fn wait(&self, class: OperationClass) -> Admission {
        self.evaluate(class, true)
    }

    /// Same decision as [`wait`](Self::wait) without recording.
    pub fn peek(&self, class: OperationClass) -> Admission {
        self.evaluate(class, false)
    }
}

impl<C: Clock> RequestLimiter for SlidingWindowLimiter<C> {
    fn wait(&self, class: OperationClass) -> Admission {
        Self::wait(self, class)
    }

    fn peek(&self, class: OperationClass) -> Admission {
        Self::peek(self, class)
    }
}

/// Single-bucket sliding-window limiter; the operation class is ignored.
pub struct GlobalLimiter<C: Clock = SystemClock> {
    window: Mutex<RateWindow>,
    clock: C,
}

impl GlobalLimiter<SystemClock> {
    pub fn new(limit: u32, period_secs: u64) -> Self {
        Self::with_clock(limit, period_secs, SystemClock)
    }
}

impl<C: Clock> GlobalLimiter<C> {
    /// Create a global limiter with a custom clock
    pub fn with_clock(limit: u32, period_secs: u64, clock: C) -> Self {
        Self { window: Mutex::new(RateWindow::new(limit, Duration::from_secs(period_secs))), clock }
    }

    fn evaluate(&self, record: bool) -> Admission {
        let now = self.clock.now();
        let mut window = lock_state(&self.window, "global");
        let admission = admit(&mut [&mut *window], now, record);

        if let Admission::Wait(delay) = admission {
            debug!(delay_ms = delay.as_millis() as u64, "global rate limit window full");
        }
        admission
    }

    pub fn wait(&self) -> Admission {
        self.evaluate(true)
    }

    pub fn peek(&self) -> Admission {
        self.evaluate(false)
    }
}

impl<C: Clock> RequestLimiter for GlobalLimiter<C> {
    fn wait(&self, _class: OperationClass) -> Admission {
        Self::wait(self)
    }

    fn peek(&self, _class: OperationClass) -> Admission {
        Self::peek(self)
    }
}

#[cfg(test)]
mod tests {
    use super::super::MockClock;
    use super::*;

    fn limiter(limits: WindowLimits) -> (SlidingWindowLimiter<MockClock>, MockClock) {
        let clock = MockClock::new();
        (SlidingWindowLimiter::with_clock(limits, clock.clone()), clock)
    }

    #[test]
    fn test_method_classification() {
        assert_eq!(OperationClass::from_method("GET"), OperationClass::Read);
        assert_eq!(OperationClass::from_method("get"), OperationClass::Read);
        assert_eq!(OperationClass::from_method("POST"), OperationClass::Write);
        assert_eq!(OperationClass::from_method("PUT"), OperationClass::Write);
        assert_eq!(OperationClass::from_method("DELETE"), OperationClass::Delete);
        assert!(OperationClass::Delete.is_write());
    }

    #[test]
    fn test_fourth_read_waits_at_most_one_period() {
        let (limiter, _clock) = limiter(WindowLimits::new(3, 1, 1, 1));

        for _ in 0..3 {
            assert_eq!(limiter.wait(OperationClass::Read), Admission::Admitted);
        }
        let fourth = limiter.wait(OperationClass::Read);
        assert!(fourth.must_wait());
        assert!(fourth.delay() > Duration::ZERO);
        assert!(fourth.delay() <= Duration::from_secs(1));
    }

    #[test]
    fn test_blocked_call_records_nothing() {
        let (limiter, _clock) = limiter(WindowLimits::new(1, 1, 10, 10));
        assert_eq!(limiter.wait(OperationClass::Read), Admission::Admitted);

        for _ in 0..5 {
            assert!(limiter.wait(OperationClass::Read).must_wait());
        }
        let state = lock_state(&limiter.state, "test");
        assert_eq!(state.read.short.len(), 1);
    }

    #[test]
    fn test_delay_shrinks_as_oldest_ages() {
        let (limiter, clock) = limiter(WindowLimits::new(1, 1, 10, 10));
        assert_eq!(limiter.wait(OperationClass::Write), Admission::Admitted);

        clock.advance_secs(4);
        assert_eq!(limiter.wait(OperationClass::Write), Admission::Wait(Duration::from_secs(6)));

        clock.advance_secs(6);
        assert_eq!(limiter.wait(OperationClass::Write), Admission::Admitted);
    }

    #[test]
    fn test_zero_limit_is_unlimited_and_never_records() {
        let (limiter, _clock) = limiter(WindowLimits::new(0, 0, 1, 1));
        for _ in 0..1_000 {
            assert_eq!(limiter.wait(OperationClass::Read), Admission::Admitted);
        }
        let state = lock_state(&limiter.state, "test");
        assert_eq!(state.read.short.len(), 0);
    }

    #[test]
    fn test_hourly_window_blocks_after_short_window_slides() {
        let (limiter, clock) = limiter(WindowLimits::new(2, 2, 1, 1).hourly(3, 0, 0));

        assert!(!limiter.wait(OperationClass::Read).must_wait());
        assert!(!limiter.wait(OperationClass::Read).must_wait());
        clock.advance_secs(1);
        assert!(!limiter.wait(OperationClass::Read).must_wait());
        clock.advance_secs(1);

        // Short window is empty again, hourly window is full.
        let blocked = limiter.wait(OperationClass::Read);
        assert!(blocked.must_wait());
        assert_eq!(blocked.delay(), Duration::from_secs(SECONDS_PER_HOUR - 2));
    }

    #[test]
    fn test_wait_reports_longest_blocking_window() {
        let (limiter, _clock) = limiter(WindowLimits::new(1, 1, 10, 10).hourly(1, 0, 0));
        assert!(!limiter.wait(OperationClass::Read).must_wait());
        assert_eq!(
            limiter.wait(OperationClass::Read),
            Admission::Wait(Duration::from_secs(SECONDS_PER_HOUR))
        );
    }

    #[test]
    fn test_delete_hourly_window_only_applies_to_delete() {
        let (limiter, _clock) = limiter(WindowLimits::new(0, 10, 1, 10).hourly(0, 0, 1));

        assert!(!limiter.wait(OperationClass::Delete).must_wait());
        assert!(limiter.wait(OperationClass::Delete).must_wait());
        assert!(!limiter.wait(OperationClass::Write).must_wait());
    }

    #[test]
    fn test_peek_does_not_consume_capacity() {
        let (limiter, _clock) = limiter(WindowLimits::new(1, 1, 10, 10));
        for _ in 0..10 {
            assert_eq!(limiter.peek(OperationClass::Read), Admission::Admitted);
        }
        assert_eq!(limiter.wait(OperationClass::Read), Admission::Admitted);
        assert!(limiter.peek(OperationClass::Read).must_wait());
    }

    #[test]
    fn test_global_limiter_ignores_class() {
        let clock = MockClock::new();
        let limiter = GlobalLimiter::with_clock(2, 5, clock.clone());

        assert!(!RequestLimiter::wait(&limiter, OperationClass::Read).must_wait());
        assert!(!RequestLimiter::wait(&limiter, OperationClass::Delete).must_wait());
        let blocked = RequestLimiter::wait(&limiter, OperationClass::Write);
        assert_eq!(blocked, Admission::Wait(Duration::from_secs(5)));

        clock.advance_secs(5);
        assert_eq!(limiter.wait(), Admission::Admitted);
    }

    #[test]
    fn test_unlimited_admits_everything() {
        assert_eq!(Unlimited.wait(OperationClass::Write), Admission::Admitted);
        assert_eq!(Unlimited.peek(OperationClass::Read).delay(), Duration::ZERO);
    }
}
