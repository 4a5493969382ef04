use dcf_valuation::{round_to_cents, DcfValuationEngine};
use std::sync::Arc;
use std::time::Instant;
use valuation_core::{
    AnalysisResult, ChartData, Dataset, MarketDataProvider, NarrativeProvider, PricePoint,
    Valuation, ValuationError,
};

/// Quarters of earnings used (about three years).
pub const EARNINGS_WINDOW: usize = 12;

/// Trading days of prices drawn on the chart.
pub const PRICE_WINDOW: usize = 100;

pub const STRATEGY_FALLBACK: &str = "No strategy data available.";

pub const PRICE_LABEL: &str = "Stock Price";
pub const EPS_TREND_LABEL: &str = "EPS Trend";

/// Runs the earnings -> prices -> narrative -> DCF pipeline for one ticker.
///
/// Holds no per-request state; a single instance is shared across requests.
pub struct ValuationService {
    market_data: Arc<dyn MarketDataProvider>,
    narrative: Arc<dyn NarrativeProvider>,
    engine: DcfValuationEngine,
}

impl ValuationService {
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        narrative: Arc<dyn NarrativeProvider>,
    ) -> Self {
        Self {
            market_data,
            narrative,
            engine: DcfValuationEngine::new(),
        }
    }

    pub async fn analyze(&self, ticker: &str) -> Result<AnalysisResult, ValuationError> {
        let ticker = validate_ticker(ticker)?;
        let started = Instant::now();

        tracing::info!(
            ticker,
            market_data = self.market_data.provider_name(),
            narrative = self.narrative.provider_name(),
            "Starting valuation"
        );

        // Steps run in order: a missing earnings series must stop the request
        // before any price or narrative call goes out.
        let earnings = self
            .market_data
            .quarterly_earnings(ticker, EARNINGS_WINDOW)
            .await?;
        let eps: Vec<f64> = earnings.iter().map(|e| e.reported_eps).collect();
        let growth_rate = self.engine.growth_rate(&eps)?;

        let prices = self
            .market_data
            .daily_adjusted_prices(ticker, PRICE_WINDOW)
            .await?;
        let chart_data = build_chart(&prices, self.engine.eps_trend(&eps, growth_rate));

        let strategy = match self.narrative.strategy_summary(ticker).await? {
            Some(text) => text,
            None => STRATEGY_FALLBACK.to_string(),
        };

        let dcf = self.engine.value_with_growth(eps[eps.len() - 1], growth_rate);

        tracing::info!(
            ticker,
            quarters = eps.len(),
            trading_days = prices.len(),
            growth_rate = dcf.growth_rate,
            fair_value = dcf.fair_value,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Valuation complete"
        );

        Ok(AnalysisResult {
            chart_data,
            valuation: Valuation {
                fair_value: dcf.fair_value,
                growth_rate: round_to_cents(dcf.growth_rate),
                strategy,
            },
        })
    }
}

/// Trimmed ticker, or `InvalidRequest` when nothing is left.
pub fn validate_ticker(ticker: &str) -> Result<&str, ValuationError> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(ValuationError::InvalidRequest("Ticker is required".to_string()));
    }
    Ok(ticker)
}

/// Price and EPS-trend datasets on a chronological (oldest-first) axis.
///
/// `prices` arrive most recent first. `eps_trend` is already chronological.
pub fn build_chart(prices: &[PricePoint], eps_trend: Vec<f64>) -> ChartData {
    let labels = prices.iter().rev().map(|p| p.date).collect();
    let closes = prices.iter().rev().map(|p| p.adjusted_close).collect();

    ChartData {
        labels,
        datasets: vec![
            Dataset::line(PRICE_LABEL, "blue", closes),
            Dataset::line(EPS_TREND_LABEL, "green", eps_trend),
        ],
    }
}
