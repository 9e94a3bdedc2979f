//! Dosing policy for the turbidostat.
//!
//! Every dosing cycle fires exactly one supply pump (drug or nutrient)
//! together with the waste pump, which keeps the culture volume constant.
//! The policy only picks the supply pump.

use serde::{Deserialize, Serialize};

use crate::drivers::pump::PumpId;

/// Outcome of one dosing cycle.  The waste pump accompanies both variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DosingDecision {
    ActivateDrugPump,
    ActivateNutrientPump,
}

impl DosingDecision {
    /// The supply pump chosen by this decision.
    pub fn supply_pump(self) -> PumpId {
        match self {
            Self::ActivateDrugPump => PumpId::Drug,
            Self::ActivateNutrientPump => PumpId::Nutrient,
        }
    }

    /// Every pump this decision activates, supply first, waste last.
    pub fn pumps(self) -> [PumpId; 2] {
        [self.supply_pump(), PumpId::Waste]
    }
}

/// OD change since the previous successful reading (one tick earlier
/// unless that read failed).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthTrend {
    pub previous_od: f64,
    pub current_od: f64,
}

impl GrowthTrend {
    pub fn delta(&self) -> f64 {
        self.current_od - self.previous_od
    }

    pub fn is_growing(&self) -> bool {
        self.delta() > 0.0
    }
}

/// Decide which supply pump to fire.
///
/// Implementations must be pure: the same inputs always give the same
/// decision.
pub trait DosingPolicy: Send {
    /// `trend` is `None` when there is no earlier reading in this run.
    fn decide(&self, od: f64, trend: Option<GrowthTrend>) -> DosingDecision;
}

/// OD threshold policy.
///
/// `od > threshold` selects drug, anything else nutrient.  With
/// `require_growth` the drug branch additionally needs OD to have risen
/// since the previous reading; with no previous reading it counts as growth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub threshold: f64,
    pub require_growth: bool,
}

impl ThresholdPolicy {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            require_growth: false,
        }
    }

    pub fn with_growth_check(mut self, enabled: bool) -> Self {
        self.require_growth = enabled;
        self
    }
}

impl DosingPolicy for ThresholdPolicy {
    fn decide(&self, od: f64, trend: Option<GrowthTrend>) -> DosingDecision {
        let grown = !self.require_growth || trend.is_none_or(|t| t.is_growing());
        if od > self.threshold && grown {
            DosingDecision::ActivateDrugPump
        } else {
            DosingDecision::ActivateNutrientPump
        }
    }
}
