//! Peristaltic pump driver (timed digital outputs).
//!
//! A pump activation drives its output active, holds it for the pump's
//! fixed activation time, then drives it inactive.  Activations run on
//! background tasks so the control loop never waits for a pulse.
//!
//! ## Overlap guard
//!
//! Each pump serialises its own pulses behind a per-pump lock: a second
//! activation of a pump that is already pulsing waits for the first to
//! finish instead of overlapping it.  At most [`MAX_PENDING`] activations
//! (one running, one queued) may exist per pump; further requests are
//! rejected with [`PumpError::Busy`].  Distinct pumps pulse concurrently.
//!
//! ## Safety contract
//!
//! A pulse always ends with a deactivation attempt, including when the
//! activation write itself failed.  Pump state is only written by that
//! pump's own pulse task.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::ActuatorPort;
use crate::config::PumpTable;
use crate::drivers::tasks::TaskSet;
use crate::error::PumpError;

/// Running + queued activations allowed per pump.
pub const MAX_PENDING: usize = 2;

/// Deactivation write attempts before giving up on a pulse.
const DEACTIVATE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PumpId {
    Drug,
    Nutrient,
    Waste,
}

impl PumpId {
    pub const ALL: [PumpId; 3] = [PumpId::Drug, PumpId::Nutrient, PumpId::Waste];

    pub fn name(self) -> &'static str {
        match self {
            Self::Drug => "drug",
            Self::Nutrient => "nutrient",
            Self::Waste => "waste",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Drug => 0,
            Self::Nutrient => 1,
            Self::Waste => 2,
        }
    }
}

impl fmt::Display for PumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of one pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpSpec {
    pub id: PumpId,
    pub pin: u8,
    pub activation: Duration,
}

/// Counters shared with pulse tasks.
#[derive(Debug, Default)]
struct PulseStats {
    completed: AtomicU64,
    failures: AtomicU64,
}

struct PumpSlot {
    spec: PumpSpec,
    /// Held for the whole pulse; serialises activations of this pump.
    turn: Mutex<()>,
    pending: AtomicUsize,
    active: AtomicBool,
}

/// Issues non-blocking pump activations.
pub struct PumpController {
    actuator: Arc<dyn ActuatorPort>,
    slots: [Arc<PumpSlot>; 3],
    stats: Arc<PulseStats>,
}

impl PumpController {
    pub fn new(table: &PumpTable, actuator: Arc<dyn ActuatorPort>) -> Self {
        let slot = |id: PumpId| {
            let cfg = table.get(id);
            Arc::new(PumpSlot {
                spec: PumpSpec {
                    id,
                    pin: cfg.pin,
                    activation: cfg.activation(),
                },
                turn: Mutex::new(()),
                pending: AtomicUsize::new(0),
                active: AtomicBool::new(false),
            })
        };
        Self {
            actuator,
            slots: [slot(PumpId::Drug), slot(PumpId::Nutrient), slot(PumpId::Waste)],
            stats: Arc::new(PulseStats::default()),
        }
    }

    /// Start one pulse of `pump` on a background task.  Returns as soon
    /// as the task is spawned.
    pub fn activate(&self, pump: PumpId, tasks: &mut TaskSet) -> Result<(), PumpError> {
        let slot = Arc::clone(&self.slots[pump.index()]);
        if slot.pending.fetch_add(1, Ordering::AcqRel) >= MAX_PENDING {
            slot.pending.fetch_sub(1, Ordering::AcqRel);
            warn!("Pump {}: activation rejected, queue full", pump);
            return Err(PumpError::Busy);
        }

        let actuator = Arc::clone(&self.actuator);
        let stats = Arc::clone(&self.stats);
        let task_slot = Arc::clone(&slot);
        let spawned = tasks.spawn(&format!("pump-{}", pump.name()), move || {
            pulse(&task_slot, actuator.as_ref(), &stats);
        });

        spawned.map_err(|e| {
            slot.pending.fetch_sub(1, Ordering::AcqRel);
            error!("Pump {}: could not spawn pulse task: {}", pump, e);
            PumpError::SpawnFailed
        })
    }

    /// Whether `pump`'s output is currently held active.
    pub fn is_active(&self, pump: PumpId) -> bool {
        self.slots[pump.index()].active.load(Ordering::Acquire)
    }

    pub fn any_active(&self) -> bool {
        PumpId::ALL.into_iter().any(|p| self.is_active(p))
    }

    /// Pulses whose output was driven active and then released.
    pub fn completed_pulses(&self) -> u64 {
        self.stats.completed.load(Ordering::Relaxed)
    }

    /// Output writes that failed inside pulse tasks.
    pub fn actuation_failures(&self) -> u64 {
        self.stats.failures.load(Ordering::Relaxed)
    }

    /// Drive every output inactive.  Call after all pulse tasks are joined.
    pub fn release(&self) {
        if let Err(e) = self.actuator.release_all() {
            error!("Releasing pump outputs failed: {}", e);
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn pulse(slot: &PumpSlot, actuator: &dyn ActuatorPort, stats: &PulseStats) {
    let _turn = slot.turn.lock().unwrap_or_else(PoisonError::into_inner);
    let PumpSpec { id, pin, activation } = slot.spec;

    let ran = match actuator.set(pin, true) {
        Ok(()) => {
            slot.active.store(true, Ordering::Release);
            info!("Pump {}: on (pin {}) for {:?}", id, pin, activation);
            thread::sleep(activation);
            true
        }
        Err(e) => {
            error!("Pump {}: activation failed: {}", id, e);
            stats.failures.fetch_add(1, Ordering::Relaxed);
            false
        }
    };

    // Always try to return the output to inactive.
    let mut released = false;
    for attempt in 1..=DEACTIVATE_ATTEMPTS {
        match actuator.set(pin, false) {
            Ok(()) => {
                released = true;
                break;
            }
            Err(e) => {
                error!("Pump {}: deactivation attempt {} failed: {}", id, attempt, e);
                stats.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    if released {
        slot.active.store(false, Ordering::Release);
        if ran {
            stats.completed.fetch_add(1, Ordering::Relaxed);
        }
        info!("Pump {}: off", id);
    }

    slot.pending.fetch_sub(1, Ordering::AcqRel);
}
