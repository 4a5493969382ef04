use serde::Serialize;
use statrs::statistics::Statistics;
use valuation_core::ValuationError;

/// Annual discount rate applied to the projected EPS.
pub const DISCOUNT_RATE: f64 = 0.10;

/// Years the EPS is grown forward and the number of discounting periods.
pub const PROJECTION_YEARS: i32 = 5;

/// Synthetic points appended after the last real EPS on the trend line.
pub const TREND_PROJECTION_POINTS: usize = 4;

const MIN_MULTIPLE: f64 = 15.0;
const MAX_MULTIPLE: f64 = 30.0;

/// Intermediate and final figures of one valuation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcfValuation {
    pub growth_rate: f64,
    pub last_eps: f64,
    pub future_eps: f64,
    pub intrinsic_value: f64,
    pub earnings_multiple: f64,
    pub fair_value: f64,
}

pub struct DcfValuationEngine;

impl DcfValuationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Mean of the period-over-period EPS changes, in percent.
    ///
    /// `eps` is in provider order (most recent first) and pairs are taken in
    /// that index order: `eps[i] / eps[i - 1] - 1` for `i >= 1`.
    pub fn growth_rate(&self, eps: &[f64]) -> Result<f64, ValuationError> {
        if eps.len() < 2 {
            return Err(ValuationError::ComputationUndefined(format!(
                "need at least 2 quarters of earnings, got {}",
                eps.len()
            )));
        }

        let mut changes = Vec::with_capacity(eps.len() - 1);
        for i in 1..eps.len() {
            let prev = eps[i - 1];
            if prev == 0.0 {
                return Err(ValuationError::ComputationUndefined(format!(
                    "reported EPS of quarter {} is zero",
                    i - 1
                )));
            }
            changes.push((eps[i] / prev - 1.0) * 100.0);
        }

        let growth = changes.mean();
        if !growth.is_finite() {
            return Err(ValuationError::ComputationUndefined(
                "EPS growth rate is not a finite number".to_string(),
            ));
        }

        Ok(growth)
    }

    /// Full valuation from a provider-order EPS series.
    pub fn value(&self, eps: &[f64]) -> Result<DcfValuation, ValuationError> {
        let growth_rate = self.growth_rate(eps)?;
        // growth_rate guarantees at least two entries
        let last_eps = eps[eps.len() - 1];
        let valuation = self.value_with_growth(last_eps, growth_rate);

        tracing::debug!(
            growth_rate = valuation.growth_rate,
            future_eps = valuation.future_eps,
            intrinsic_value = valuation.intrinsic_value,
            earnings_multiple = valuation.earnings_multiple,
            fair_value = valuation.fair_value,
            "DCF valuation computed"
        );

        Ok(valuation)
    }

    pub fn value_with_growth(&self, last_eps: f64, growth_rate: f64) -> DcfValuation {
        let future_eps = future_eps(last_eps, growth_rate);
        let intrinsic_value = intrinsic_value(future_eps);
        let earnings_multiple = earnings_multiple(growth_rate);

        DcfValuation {
            growth_rate,
            last_eps,
            future_eps,
            intrinsic_value,
            earnings_multiple,
            fair_value: intrinsic_value * earnings_multiple,
        }
    }

    /// EPS in chronological order followed by a flat one-period projection.
    ///
    /// Every projected point is `last * (1 + g/100)` where `last` is the final
    /// entry of the provider-order series; the projection does not compound.
    pub fn eps_trend(&self, eps: &[f64], growth_rate: f64) -> Vec<f64> {
        let mut trend: Vec<f64> = eps.iter().rev().copied().collect();
        if let Some(&last) = eps.last() {
            let projected = last * (1.0 + growth_rate / 100.0);
            trend.extend(std::iter::repeat(projected).take(TREND_PROJECTION_POINTS));
        }
        trend
    }
}

impl Default for DcfValuationEngine {
    fn default() -> Self {
        Self::new()
    }
}

pub fn future_eps(last_eps: f64, growth_rate: f64) -> f64 {
    last_eps * (1.0 + growth_rate / 100.0).powf(PROJECTION_YEARS as f64)
}

/// The same future EPS discounted once per projection year and summed.
pub fn intrinsic_value(future_eps: f64) -> f64 {
    (1..=PROJECTION_YEARS)
        .map(|year| future_eps / (1.0 + DISCOUNT_RATE).powf(year as f64))
        .sum()
}

/// 15x below 15% growth, 30x from 30% up, the growth rate itself in between.
pub fn earnings_multiple(growth_rate: f64) -> f64 {
    if growth_rate < MIN_MULTIPLE {
        MIN_MULTIPLE
    } else if growth_rate < MAX_MULTIPLE {
        growth_rate
    } else {
        MAX_MULTIPLE
    }
}

/// Two-decimal rounding of the exact binary value, ties to even.
///
/// `{:.2}` formats the exact value, so 953.125 becomes 953.12, not 953.13.
pub fn round_to_cents(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.2}", value).parse::<f64>().unwrap_or(value)
}
