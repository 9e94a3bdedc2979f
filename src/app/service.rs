//! Control loop: the hexagonal core.
//!
//! [`ControlLoop`] owns the loop clock, the periodic triggers, the dosing
//! policy, the pump controller and the sample buffer.  All I/O flows
//! through port traits, making the whole loop testable with fakes.
//!
//! ```text
//!   SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//! HostMetrics  ──▶ │          ControlLoop          │
//!                  │ LoopClock · triggers · policy │ ──▶ PersistenceSink (flush task)
//! ActuatorPort ◀── │ PumpController · SampleBuffer │
//!   (pulse tasks)  └──────────────────────────────┘
//! ```
//!
//! ## One tick
//!
//! 1. note the start instant
//! 2. read OD, record a [`Sample`]
//! 3. dosing window due → decide, fire supply + waste pumps (background)
//! 4. flush window due → swap the buffer out, write it (background);
//!    deferred to the next window while the previous write is in flight
//! 5. sleep for whatever is left of the tick, or report an overrun
//! 6. advance the loop clock by exactly one nominal tick
//!
//! Only step 5 blocks.  Pulse and flush tasks never touch the loop's own
//! state; they share the actuator, the sink, and the buffer's mutex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{error, info, warn};

use crate::buffer::{Flusher, Sample, SampleBuffer};
use crate::config::ControllerConfig;
use crate::control::dosing::{DosingPolicy, GrowthTrend, ThresholdPolicy};
use crate::drivers::pump::PumpController;
use crate::drivers::tasks::TaskSet;
use crate::error::{ConfigError, SensorError};
use crate::scheduler::{Cadence, LoopClock, PeriodicTrigger};

use super::events::{LoopEvent, LoopReport, LoopStatus, StopReason};
use super::ports::{ActuatorPort, Clock, EventSink, HostMetricsPort, PersistenceSink, SensorPort};

// ───────────────────────────────────────────────────────────────
// Handles
// ───────────────────────────────────────────────────────────────

/// Cooperative stop signal.  The loop finishes its current tick, flushes,
/// and releases the pumps.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Read-only view of the loop for external pollers.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle(Arc<Mutex<LoopStatus>>);

impl StatusHandle {
    pub fn snapshot(&self) -> LoopStatus {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn publish(&self, status: LoopStatus) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

// ───────────────────────────────────────────────────────────────
// ControlLoop
// ───────────────────────────────────────────────────────────────

/// Adapters shared with background tasks, plus the metrics source.
pub struct LoopPorts {
    pub actuator: Arc<dyn ActuatorPort>,
    pub persistence: Arc<dyn PersistenceSink>,
    pub metrics: Box<dyn HostMetricsPort + Send>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    samples: u64,
    sensor_failures: u64,
    dosing_cycles: u64,
    pump_rejections: u64,
    overruns: u64,
    flushes: u64,
}

/// The fixed-cadence sampling and dosing loop.
pub struct ControlLoop {
    tick: Duration,
    max_iterations: Option<u64>,
    clock: LoopClock,
    dosing_window: PeriodicTrigger,
    flush_window: PeriodicTrigger,
    policy: Box<dyn DosingPolicy>,
    pumps: PumpController,
    buffer: Arc<SampleBuffer>,
    flusher: Flusher,
    metrics: Box<dyn HostMetricsPort + Send>,
    time: Arc<dyn Clock>,
    tasks: TaskSet,
    stop: StopHandle,
    status: StatusHandle,
    counters: Counters,
    /// Most recent successful reading; the growth trend's baseline.
    last_od: Option<f64>,
}

impl ControlLoop {
    /// Build the loop.  Fails only on invalid configuration.
    pub fn new(config: &ControllerConfig, ports: LoopPorts) -> Result<Self, ConfigError> {
        config.validate()?;

        let tick = config.tick_interval();
        let buffer = Arc::new(SampleBuffer::new());
        let flusher = Flusher::new(
            Arc::clone(&buffer),
            ports.persistence,
            config.requeue_failed_flushes,
        );
        let policy = ThresholdPolicy::new(config.od_threshold).with_growth_check(config.require_growth);

        Ok(Self {
            tick,
            max_iterations: config.max_iterations,
            clock: LoopClock::new(tick),
            dosing_window: PeriodicTrigger::new(config.pump_period()),
            flush_window: PeriodicTrigger::skipping_start(config.flush_period()),
            policy: Box::new(policy),
            pumps: PumpController::new(&config.pumps, ports.actuator),
            buffer,
            flusher,
            metrics: ports.metrics,
            time: ports.clock,
            tasks: TaskSet::new(),
            stop: StopHandle::default(),
            status: StatusHandle::default(),
            counters: Counters::default(),
            last_od: None,
        })
    }

    /// Replace the default threshold policy.
    pub fn with_policy(mut self, policy: impl DosingPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn pumps(&self) -> &PumpController {
        &self.pumps
    }

    /// Samples appended and not yet taken by a flush.
    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    pub fn loop_count(&self) -> u64 {
        self.clock.loop_count()
    }

    pub fn elapsed_loop_time(&self) -> Duration {
        self.clock.elapsed()
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Run until the iteration bound is reached or a stop is requested,
    /// then flush and release the pumps.
    pub fn run(&mut self, sensor: &mut impl SensorPort, sink: &mut impl EventSink) -> LoopReport {
        sink.emit(&LoopEvent::Started {
            tick_interval: self.tick,
            max_iterations: self.max_iterations,
        });

        let reason = loop {
            if self.stop.is_stop_requested() {
                break StopReason::Cancelled;
            }
            if self
                .max_iterations
                .is_some_and(|max| self.clock.loop_count() >= max)
            {
                break StopReason::Completed;
            }
            self.tick(sensor, sink);
        };

        let report = self.shutdown(reason);
        sink.emit(&LoopEvent::Stopped(report.clone()));
        report
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full iteration, including the end-of-tick sleep.
    pub fn tick(&mut self, sensor: &mut impl SensorPort, sink: &mut impl EventSink) {
        let started = self.time.now();
        let loop_count = self.clock.loop_count();
        self.tasks.reap();

        // 1. Sample
        let previous_od = self.last_od;
        let reading = match sensor.read_od().and_then(finite) {
            Ok(od) => {
                let metrics = self.metrics.sample();
                self.buffer.append(Sample::new(self.time.timestamp(), od, metrics));
                self.counters.samples += 1;
                self.last_od = Some(od);
                sink.emit(&LoopEvent::SampleRecorded { loop_count, od });
                Some(od)
            }
            Err(error) => {
                self.counters.sensor_failures += 1;
                sink.emit(&LoopEvent::SensorFailed { loop_count, error });
                None
            }
        };

        // 2. Dosing cycle
        if self.dosing_window.is_due_at(&self.clock) {
            match reading {
                Some(od) => self.dose(od, previous_od, sink),
                None => sink.emit(&LoopEvent::DosingSkipped { loop_count }),
            }
        }

        // 3. Flush cycle
        if self.flush_window.is_due_at(&self.clock) {
            if self.flusher.is_in_flight() {
                sink.emit(&LoopEvent::FlushDeferred {
                    loop_count,
                    buffered: self.buffer.len(),
                });
            } else {
                let samples = self.flusher.dispatch(self.time.timestamp(), &mut self.tasks);
                if samples > 0 {
                    self.counters.flushes += 1;
                    sink.emit(&LoopEvent::FlushDispatched {
                        loop_count,
                        samples,
                    });
                }
            }
        }

        // 4. Hold cadence
        let work = self.time.now().saturating_duration_since(started);
        match Cadence::after(self.tick, work) {
            Cadence::Sleep(rest) => self.time.sleep(rest),
            Cadence::Overrun { .. } => {
                self.counters.overruns += 1;
                sink.emit(&LoopEvent::Overrun {
                    loop_count,
                    work,
                    tick: self.tick,
                });
            }
        }

        // 5. Nominal time only ever moves by one tick
        self.clock.advance();
        self.publish_status();
    }

    fn dose(&mut self, od: f64, previous_od: Option<f64>, sink: &mut impl EventSink) {
        let trend = previous_od.map(|previous_od| GrowthTrend {
            previous_od,
            current_od: od,
        });
        let decision = self.policy.decide(od, trend);
        self.counters.dosing_cycles += 1;

        sink.emit(&LoopEvent::DosingCycle {
            loop_count: self.clock.loop_count(),
            elapsed: self.clock.elapsed(),
            od,
            decision,
        });

        for pump in decision.pumps() {
            if let Err(error) = self.pumps.activate(pump, &mut self.tasks) {
                self.counters.pump_rejections += 1;
                sink.emit(&LoopEvent::PumpRejected { pump, error });
            }
        }
    }

    // ── Shutdown ──────────────────────────────────────────────

    fn shutdown(&mut self, reason: StopReason) -> LoopReport {
        info!(
            "Control loop stopping ({:?}); waiting for {} background tasks",
            reason,
            self.tasks.in_flight()
        );
        // In-flight pulses run their full duration; in-flight flushes
        // finish (and may requeue) before the terminal flush.
        self.tasks.join_all();

        let final_flush_samples = match self.flusher.flush_now(self.time.timestamp()) {
            Ok(n) => n,
            Err(e) => {
                error!("Final flush failed: {}", e);
                0
            }
        };
        if !self.buffer.is_empty() {
            warn!("{} samples could not be persisted", self.buffer.len());
        }

        self.pumps.release();
        self.publish_status();

        LoopReport {
            reason,
            loop_count: self.clock.loop_count(),
            elapsed_loop_time: self.clock.elapsed(),
            samples_recorded: self.counters.samples,
            sensor_failures: self.counters.sensor_failures,
            dosing_cycles: self.counters.dosing_cycles,
            pump_rejections: self.counters.pump_rejections,
            overruns: self.counters.overruns,
            flushes: self.counters.flushes,
            final_flush_samples,
            actuation_failures: self.pumps.actuation_failures(),
            persistence_failures: self.flusher.failures(),
        }
    }

    fn publish_status(&self) {
        self.status.publish(LoopStatus {
            elapsed_loop_time: self.clock.elapsed(),
            loop_count: self.clock.loop_count(),
            last_od: self.last_od,
            buffered_samples: self.buffer.len(),
            dosing_cycles: self.counters.dosing_cycles,
            flushes: self.counters.flushes,
            overruns: self.counters.overruns,
        });
    }
}

fn finite(od: f64) -> Result<f64, SensorError> {
    if od.is_finite() {
        Ok(od)
    } else {
        Err(SensorError::InvalidReading)
    }
}
