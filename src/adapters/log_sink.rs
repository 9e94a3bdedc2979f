//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured loop events through the
//! `log` facade.  A notifier (chat bot, MQTT) would implement the same
//! trait.

use log::{debug, info, warn};

use crate::app::events::LoopEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`LoopEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &LoopEvent) {
        match event {
            LoopEvent::Started {
                tick_interval,
                max_iterations,
            } => match max_iterations {
                Some(n) => info!("START | tick={:?} | iterations={}", tick_interval, n),
                None => info!("START | tick={:?} | until stopped", tick_interval),
            },
            LoopEvent::SampleRecorded { loop_count, od } => {
                info!("SAMPLE | #{} | OD={}", loop_count, od);
            }
            LoopEvent::SensorFailed { loop_count, error } => {
                warn!("SAMPLE | #{} | sensor failed: {}", loop_count, error);
            }
            LoopEvent::DosingCycle {
                loop_count,
                elapsed,
                od,
                decision,
            } => {
                info!(
                    "DOSE | #{} | t={}s | OD={} | {:?} + waste",
                    loop_count,
                    elapsed.as_secs(),
                    od,
                    decision
                );
            }
            LoopEvent::DosingSkipped { loop_count } => {
                warn!("DOSE | #{} | skipped, no reading this tick", loop_count);
            }
            LoopEvent::PumpRejected { pump, error } => {
                warn!("DOSE | {} pump not activated: {}", pump, error);
            }
            LoopEvent::FlushDispatched {
                loop_count,
                samples,
            } => {
                info!("FLUSH | #{} | {} samples", loop_count, samples);
            }
            LoopEvent::FlushDeferred {
                loop_count,
                buffered,
            } => {
                warn!(
                    "FLUSH | #{} | previous write still in flight, {} samples wait",
                    loop_count, buffered
                );
            }
            LoopEvent::Overrun {
                loop_count,
                work,
                tick,
            } => {
                warn!(
                    "OVERRUN | #{} | loop took {:?}, longer than requested OD interval {:?}",
                    loop_count, work, tick
                );
            }
            LoopEvent::Stopped(report) => {
                info!(
                    "STOP | {:?} | ticks={} | t={}s | doses={} | flushes={} | final={} samples",
                    report.reason,
                    report.loop_count,
                    report.elapsed_loop_time.as_secs(),
                    report.dosing_cycles,
                    report.flushes,
                    report.final_flush_samples
                );
                debug!("STOP | {:?}", report);
            }
        }
    }
}
