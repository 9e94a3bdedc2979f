//! Mock hardware adapters for integration tests.
//!
//! Records every output write, flush batch and loop event so tests can
//! assert on the full history without touching real GPIO or disk.  The
//! [`ManualClock`] only moves when the loop sleeps or a test advances it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeDelta, TimeZone};

use turbidostat::app::events::LoopEvent;
use turbidostat::app::ports::{ActuatorPort, Clock, EventSink, PersistenceSink, SensorPort};
use turbidostat::app::service::StopHandle;
use turbidostat::buffer::Sample;
use turbidostat::config::{ControllerConfig, PumpConfig, PumpTable};
use turbidostat::control::dosing::DosingDecision;
use turbidostat::error::{ActuationError, PersistenceError, SensorError};

// ── Config helper ─────────────────────────────────────────────

/// Config with millisecond-scale pump pulses so tests finish quickly.
pub fn fast_config(tick_ms: u64, pump_secs: u64, flush_secs: u64) -> ControllerConfig {
    let pulse = |pin| PumpConfig {
        pin,
        activation_secs: 0.002,
    };
    ControllerConfig {
        tick_interval_ms: tick_ms,
        pump_period_secs: pump_secs,
        flush_period_secs: flush_secs,
        pumps: PumpTable {
            drug: pulse(20),
            nutrient: pulse(21),
            waste: pulse(16),
        },
        ..Default::default()
    }
}

// ── ManualClock ───────────────────────────────────────────────

pub struct ManualClock {
    base: Instant,
    base_ts: DateTime<Local>,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            base_ts: Local.timestamp_opt(1_700_000_000, 0).unwrap(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }

    /// Total time the clock has moved since creation.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn start_timestamp(&self) -> DateTime<Local> {
        self.base_ts
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn timestamp(&self) -> DateTime<Local> {
        self.base_ts + TimeDelta::from_std(self.elapsed()).unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

// ── ScriptedSensor ────────────────────────────────────────────

/// Replays a fixed list of readings; the last entry repeats forever.
pub struct ScriptedSensor {
    readings: Vec<Result<f64, SensorError>>,
    reads: usize,
    /// Simulated read latency, charged to the clock.
    latency: Option<(Arc<ManualClock>, Duration)>,
    /// Request a stop once this many reads have happened.
    stop_after: Option<(usize, StopHandle)>,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn new(readings: &[f64]) -> Self {
        Self::with_results(readings.iter().map(|&od| Ok(od)).collect())
    }

    pub fn with_results(readings: Vec<Result<f64, SensorError>>) -> Self {
        assert!(!readings.is_empty());
        Self {
            readings,
            reads: 0,
            latency: None,
            stop_after: None,
        }
    }

    pub fn with_latency(mut self, clock: Arc<ManualClock>, latency: Duration) -> Self {
        self.latency = Some((clock, latency));
        self
    }

    pub fn stop_after(mut self, reads: usize, stop: StopHandle) -> Self {
        self.stop_after = Some((reads, stop));
        self
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl SensorPort for ScriptedSensor {
    fn read_od(&mut self) -> Result<f64, SensorError> {
        let idx = self.reads.min(self.readings.len() - 1);
        self.reads += 1;
        if let Some((clock, latency)) = &self.latency {
            clock.advance(*latency);
        }
        if let Some((n, stop)) = &self.stop_after {
            if self.reads >= *n {
                stop.stop();
            }
        }
        self.readings[idx]
    }
}

// ── RecordingActuator ─────────────────────────────────────────

#[derive(Default)]
pub struct RecordingActuator {
    writes: Mutex<Vec<(u8, bool)>>,
    released: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingActuator {
    pub fn writes(&self) -> Vec<(u8, bool)> {
        self.writes.lock().unwrap().clone()
    }

    /// Last written level per pin.
    pub fn states(&self) -> HashMap<u8, bool> {
        self.writes().into_iter().collect()
    }

    pub fn any_high(&self) -> bool {
        self.states().values().any(|&high| high)
    }

    /// Number of activations (rising writes) on `pin`.
    pub fn activations(&self, pin: u8) -> usize {
        self.writes()
            .iter()
            .filter(|&&(p, high)| p == pin && high)
            .count()
    }

    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl ActuatorPort for RecordingActuator {
    fn set(&self, pin: u8, active: bool) -> Result<(), ActuationError> {
        self.writes.lock().unwrap().push((pin, active));
        Ok(())
    }

    fn release_all(&self) -> Result<(), ActuationError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        let mut writes = self.writes.lock().unwrap();
        for pin in [20, 21, 16] {
            writes.push((pin, false));
        }
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

/// Keeps every flushed batch; can be told to fail the next N writes and
/// to take a while over each write.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<(Vec<Sample>, DateTime<Local>)>>,
    failures_left: AtomicUsize,
    delay: Duration,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn batches(&self) -> Vec<(Vec<Sample>, DateTime<Local>)> {
        self.batches.lock().unwrap().clone()
    }

    /// Every persisted OD value, in write order.
    pub fn flushed_ods(&self) -> Vec<f64> {
        self.batches()
            .iter()
            .flat_map(|(batch, _)| batch.iter().map(|s| s.od))
            .collect()
    }
}

impl PersistenceSink for RecordingSink {
    fn flush(&self, batch: &[Sample], flush_time: DateTime<Local>) -> Result<(), PersistenceError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PersistenceError::Io(std::io::ErrorKind::StorageFull));
        }
        self.batches.lock().unwrap().push((batch.to_vec(), flush_time));
        Ok(())
    }
}

// ── RecordingEvents ───────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEvents {
    pub events: Vec<LoopEvent>,
}

#[allow(dead_code)]
impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(loop_count, elapsed, od, decision)` of every dosing cycle.
    pub fn dosing_cycles(&self) -> Vec<(u64, Duration, f64, DosingDecision)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                LoopEvent::DosingCycle {
                    loop_count,
                    elapsed,
                    od,
                    decision,
                } => Some((*loop_count, *elapsed, *od, *decision)),
                _ => None,
            })
            .collect()
    }

    pub fn overruns(&self) -> usize {
        self.count(|e| matches!(e, LoopEvent::Overrun { .. }))
    }

    pub fn count(&self, pred: impl Fn(&LoopEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&mut self, event: &LoopEvent) {
        self.events.push(event.clone());
    }
}
