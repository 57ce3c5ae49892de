use chrono::{Duration, NaiveDateTime};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration as StdDuration, Instant},
};
use threadpool::ThreadPool;

use super::sim_error::SimError;

/// Longest single sleep of a paced loop, so `stop` is noticed quickly.
const STOP_POLL_MILLIS: u64 = 50;

/// Simulated clock shared by every loop of the control tower.
///
/// The clock advances `tick_advance` of simulated time every real tick. It also
/// carries the running flag that all loops recheck between iterations.
pub struct Timer {
    current_time: Mutex<NaiveDateTime>,
    tick_advance: Duration,
    running: AtomicBool,
    paused: AtomicBool,
}

impl Timer {
    /// Creates a running, unpaused clock at `start_time`.
    pub fn new(start_time: NaiveDateTime, tick_advance: Duration) -> Arc<Self> {
        Arc::new(Self {
            current_time: Mutex::new(start_time),
            tick_advance,
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
        })
    }

    /// Clock advancing `time_scale` simulated seconds per real second when
    /// ticked every `clock_tick_ms`.
    pub fn scaled(
        start_time: NaiveDateTime,
        time_scale: f64,
        clock_tick_ms: u64,
    ) -> Result<Arc<Self>, SimError> {
        Ok(Self::new(start_time, scaled_advance(time_scale, clock_tick_ms)?))
    }

    /// Current simulated time.
    pub fn now(&self) -> Result<NaiveDateTime, SimError> {
        self.current_time
            .lock()
            .map(|time| *time)
            .map_err(|_| SimError::TimerLockError("Failed to read current_time.".to_string()))
    }

    /// Moves the clock forward by `by` and returns the new time.
    pub fn advance(&self, by: Duration) -> Result<NaiveDateTime, SimError> {
        let mut time_lock = self
            .current_time
            .lock()
            .map_err(|_| SimError::TimerLockError("Failed to lock current_time.".to_string()))?;
        *time_lock += by;
        Ok(*time_lock)
    }

    pub fn tick_advance(&self) -> Duration {
        self.tick_advance
    }

    /// Clears the running flag. Every loop exits on its next check.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Freezes simulated time. Loops keep polling but see no time pass.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Sleeps `interval` in short slices, waking early on `stop`.
    ///
    /// Returns whether the clock is still running.
    pub fn pace(&self, interval: StdDuration) -> bool {
        let deadline = Instant::now() + interval;
        while self.is_running() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(StdDuration::from_millis(STOP_POLL_MILLIS)));
        }
        self.is_running()
    }

    /// Runs the clock on `pool`, advancing once every `real_tick`.
    pub fn start(self: Arc<Self>, pool: &ThreadPool, real_tick: StdDuration) {
        pool.execute(move || {
            while self.is_running() {
                let started = Instant::now();

                if !self.is_paused() {
                    if let Err(e) = self.advance(self.tick_advance) {
                        eprintln!("Clock tick skipped: {}", e);
                    }
                }

                self.pace(real_tick.saturating_sub(started.elapsed()));
            }
        });
    }
}

/// Simulated time covered by one real tick of `clock_tick_ms` at `time_scale`.
pub fn scaled_advance(time_scale: f64, clock_tick_ms: u64) -> Result<Duration, SimError> {
    let millis = time_scale * clock_tick_ms as f64;
    if !millis.is_finite() || millis < 1.0 {
        return Err(SimError::InvalidDuration(format!(
            "time scale {} at {} ms per tick",
            time_scale, clock_tick_ms
        )));
    }
    Ok(Duration::milliseconds(millis.round() as i64))
}
