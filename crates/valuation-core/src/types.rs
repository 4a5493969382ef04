use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One reported quarter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsRecord {
    #[serde(default)]
    pub fiscal_date_ending: Option<NaiveDate>,
    #[serde(default)]
    pub reported_date: Option<NaiveDate>,
    pub reported_eps: f64,
}

impl EarningsRecord {
    pub fn new(reported_eps: f64) -> Self {
        Self {
            fiscal_date_ending: None,
            reported_date: None,
            reported_eps,
        }
    }
}

/// Daily adjusted close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub adjusted_close: f64,
}

/// One line of the chart, in the shape chart.js consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    pub border_color: String,
    pub fill: bool,
}

impl Dataset {
    /// Unfilled line series.
    pub fn line(label: &str, border_color: &str, data: Vec<f64>) -> Self {
        Self {
            label: label.to_string(),
            data,
            border_color: border_color.to_string(),
            fill: false,
        }
    }
}

/// Shared label axis (oldest first) plus the datasets drawn against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<NaiveDate>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub fair_value: f64,
    /// Percent, rounded to two decimals.
    pub growth_rate: f64,
    pub strategy: String,
}

/// Response body of `POST /api/analyze`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub chart_data: ChartData,
    pub valuation: Valuation,
}
