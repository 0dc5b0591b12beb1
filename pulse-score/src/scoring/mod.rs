//! Scoring Engine - deterministic, bounded composite scoring
//!
//! Every function here is pure (no I/O, no hidden state) and total: defined
//! for every input in its documented domain, including zero and boundary
//! inputs. That is what makes them independently unit-testable and safe to
//! re-run idempotently.

use serde::{Deserialize, Serialize};

/// Clamp to the unit interval; non-finite inputs clamp to 0
pub fn clamp01(value: f64) -> f64 {
    if !value.is_finite() {
        if value == f64::INFINITY {
            1.0
        } else {
            0.0
        }
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// One platform's visibility contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformVisibility {
    /// Visibility on this platform, expected in [0,1]
    pub visibility: f64,
    /// Relative weight of this platform
    pub weight: f64,
}

/// Weighted visibility composite: sum of visibility x weight
///
/// Precondition: weights are expected to sum to 1. The function does not
/// enforce or normalize this; out-of-range weight vectors act as a manual
/// override and produce a proportionally scaled composite.
pub fn visibility_composite(platforms: &[PlatformVisibility]) -> f64 {
    platforms
        .iter()
        .map(|p| p.visibility * p.weight)
        .sum()
}

/// Multiplicative risk-quality index, floor-clamped
///
/// A chain of fractional multipliers can collapse toward zero in ways that
/// are not meaningful for this metric, so the product never drops below
/// `floor` (callers pass 1.0 for the standard index).
pub fn risk_quality_index(multipliers: &[f64], floor: f64) -> f64 {
    let product: f64 = multipliers.iter().product();
    product.max(floor)
}

/// Harm-rate proxy: (bad / total) x severity, exactly 0 for an empty total
pub fn harm_rate(bad_count: i64, total_count: i64, severity: f64) -> f64 {
    if total_count <= 0 {
        return 0.0;
    }
    let bad = bad_count.clamp(0, total_count) as f64;
    (bad / total_count as f64) * severity
}

/// Inputs to the composite quality index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityInputs {
    pub seo: f64,
    pub visibility: f64,
    pub velocity: f64,
    pub harm_rate: f64,
    pub risk_multiplier: f64,
    pub seo_weight: f64,
    pub visibility_weight: f64,
    pub harm_weight: f64,
}

impl Default for QualityInputs {
    fn default() -> Self {
        Self {
            seo: 0.0,
            visibility: 0.0,
            velocity: 0.0,
            harm_rate: 0.0,
            risk_multiplier: 1.0,
            seo_weight: 0.6,
            visibility_weight: 0.4,
            harm_weight: 0.5,
        }
    }
}

/// Composite quality index
///
/// `core = (seo*w1 + visibility*w2) * (1 + velocity) - harm_rate*wh`,
/// floor-clamped to 0, then divided by `max(1, risk_multiplier)`.
///
/// The floor-then-divide order is the contract: clamping after the division
/// would let a large risk multiplier mask an already-negative core into a
/// small positive number. A risk multiplier of 0 divides by max(1, 0) = 1,
/// never by zero.
pub fn quality_index(inputs: &QualityInputs) -> f64 {
    let core = (inputs.seo * inputs.seo_weight + inputs.visibility * inputs.visibility_weight)
        * (1.0 + inputs.velocity)
        - inputs.harm_rate * inputs.harm_weight;
    let clamped = core.max(0.0);
    clamped / inputs.risk_multiplier.max(1.0)
}

/// Inputs to the reward signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardInputs {
    pub visibility_delta: f64,
    pub revenue_delta: f64,
    pub api_cost: f64,
    pub min_reward: f64,
}

/// Reward outcome handed to the external autonomy controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardDecision {
    pub reward: f64,
    pub approved: bool,
}

/// Reward signal: visibility delta x revenue delta, net of API cost
///
/// Pure and side-effect-free; the controller owns the decision to act on
/// `approved`.
pub fn reward_signal(inputs: &RewardInputs) -> RewardDecision {
    let reward = inputs.visibility_delta * inputs.revenue_delta - inputs.api_cost;
    RewardDecision {
        reward,
        approved: reward >= inputs.min_reward,
    }
}

/// Inputs to the zero-click decomposition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroClickInputs {
    pub ctr_actual: f64,
    pub ctr_baseline: f64,
    pub gbp_impressions: i64,
    pub gbp_actions: i64,
    pub ai_presence_rate: f64,
}

/// Zero-click decomposition, every component independently in [0,1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZeroClickDecomposition {
    /// Zero-click rate: share of impressions that produced no click
    pub zcr: f64,
    /// Zero-click conversion offset: demand absorbed by the GBP surface
    pub zcco: f64,
    /// AI-result impact: presence-weighted CTR shortfall vs. baseline
    pub airi: f64,
    /// zcr minus zcco, so surface-absorbed demand is not double-counted
    pub adjusted_zero_click: f64,
}

/// Decompose zero-click behavior into bounded components
///
/// Each intermediate is clamped to [0,1] independently, so one bad upstream
/// input cannot propagate an out-of-range composite.
pub fn zero_click(inputs: &ZeroClickInputs) -> ZeroClickDecomposition {
    let zcr = clamp01(1.0 - inputs.ctr_actual);

    let zcco = if inputs.gbp_impressions <= 0 {
        0.0
    } else {
        clamp01(inputs.gbp_actions as f64 / inputs.gbp_impressions as f64)
    };

    let shortfall = (inputs.ctr_baseline - inputs.ctr_actual).max(0.0);
    let airi = clamp01(inputs.ai_presence_rate * shortfall);

    let adjusted_zero_click = clamp01(zcr - zcco);

    ZeroClickDecomposition {
        zcr,
        zcco,
        airi,
        adjusted_zero_click,
    }
}
