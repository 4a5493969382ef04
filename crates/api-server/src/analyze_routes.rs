use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Extension, Json, Router,
};
use serde::Deserialize;
use valuation_core::{AnalysisResult, ValuationError};

use crate::request_id::RequestId;
use crate::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub ticker: Option<String>,
}

pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/api/analyze", post(analyze))
}

async fn analyze(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        ValuationError::InvalidRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let ticker = request.ticker.unwrap_or_default();
    let result = state.valuation.analyze(&ticker).await.map_err(|err| {
        tracing::warn!(request_id = %request_id.0, ticker = %ticker, kind = err.kind(), "Analysis failed");
        err
    })?;

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_router, HttpSettings};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;
    use valuation_core::{EarningsRecord, MarketDataProvider, NarrativeProvider, PricePoint};
    use valuation_service::ValuationService;

    struct StubMarketData {
        earnings: Result<Vec<EarningsRecord>, ValuationError>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MarketDataProvider for StubMarketData {
        async fn quarterly_earnings(
            &self,
            _symbol: &str,
            _limit: usize,
        ) -> Result<Vec<EarningsRecord>, ValuationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.earnings.clone()
        }

        async fn daily_adjusted_prices(
            &self,
            _symbol: &str,
            _limit: usize,
        ) -> Result<Vec<PricePoint>, ValuationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                PricePoint { date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), adjusted_close: 102.0 },
                PricePoint { date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), adjusted_close: 101.0 },
            ])
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }

    struct StubNarrative {
        summary: Result<Option<String>, ValuationError>,
    }

    #[async_trait]
    impl NarrativeProvider for StubNarrative {
        async fn strategy_summary(&self, _symbol: &str) -> Result<Option<String>, ValuationError> {
            self.summary.clone()
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }

    fn test_app(
        earnings: Result<Vec<EarningsRecord>, ValuationError>,
        summary: Result<Option<String>, ValuationError>,
    ) -> (Router, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let market = StubMarketData { earnings, calls: calls.clone() };
        let narrative = StubNarrative { summary };
        let service = ValuationService::new(Arc::new(market), Arc::new(narrative));
        let app = build_router(AppState::new(Arc::new(service)), &HttpSettings::default());
        (app, calls)
    }

    fn two_quarters() -> Result<Vec<EarningsRecord>, ValuationError> {
        Ok(vec![EarningsRecord::new(2.0), EarningsRecord::new(2.2)])
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_success_shape() {
        let (app, _) = test_app(two_quarters(), Ok(Some("Expand data centers.".to_string())));

        let response = app.oneshot(post_json(r#"{"ticker": "MSFT"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-request-id").is_some());

        let body = json_body(response).await;
        assert_eq!(body["chartData"]["labels"], json!(["2024-03-04", "2024-03-05"]));

        let datasets = body["chartData"]["datasets"].as_array().unwrap();
        assert_eq!(datasets[0]["label"], "Stock Price");
        assert_eq!(datasets[0]["data"], json!([101.0, 102.0]));
        assert_eq!(datasets[0]["borderColor"], "blue");
        assert_eq!(datasets[0]["fill"], false);
        assert_eq!(datasets[1]["label"], "EPS Trend");
        assert_eq!(datasets[1]["borderColor"], "green");
        assert_eq!(datasets[1]["data"].as_array().unwrap().len(), 6);

        // newest 2.0 -> older 2.2 is a +10% step
        let growth = body["valuation"]["growthRate"].as_f64().unwrap();
        assert_eq!(growth, 10.0);
        let fair_value = body["valuation"]["fairValue"].as_f64().unwrap();
        let expected = dcf_valuation::DcfValuationEngine::new().value(&[2.0, 2.2]).unwrap();
        // serde_json may land one ULP away on the way back in
        assert!((fair_value - expected.fair_value).abs() < 1e-9);
        assert_eq!(body["valuation"]["strategy"], "Expand data centers.");
    }

    #[tokio::test]
    async fn test_missing_ticker_is_bad_request() {
        for body in [r#"{}"#, r#"{"ticker": ""}"#, r#"{"ticker": null}"#, r#"{"ticker": "  "}"#] {
            let (app, calls) = test_app(two_quarters(), Ok(None));
            let response = app.oneshot(post_json(body)).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
            let json = json_body(response).await;
            assert_eq!(json, json!({"success": false, "error": "Ticker is required"}));
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_unreadable_body_is_bad_request() {
        let (app, calls) = test_app(two_quarters(), Ok(None));
        let response = app.oneshot(post_json("ticker=AAPL")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid request body"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_earnings_is_not_found() {
        let (app, calls) = test_app(
            Err(ValuationError::UpstreamDataMissing("Earnings data not found".to_string())),
            Ok(None),
        );
        let response = app.oneshot(post_json(r#"{"ticker": "ZZZZ"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json, json!({"success": false, "error": "Earnings data not found"}));
        // the price call never happened
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_degenerate_history_is_not_found() {
        let (app, _) = test_app(Ok(vec![EarningsRecord::new(1.0)]), Ok(None));
        let response = app.oneshot(post_json(r#"{"ticker": "NEWCO"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("Cannot compute valuation"));
    }

    #[tokio::test]
    async fn test_narrative_outage_is_bad_gateway() {
        let (app, _) = test_app(
            two_quarters(),
            Err(ValuationError::UpstreamUnavailable("narrative provider: Timeout".to_string())),
        );
        let response = app.oneshot(post_json(r#"{"ticker": "MSFT"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_missing_completion_falls_back() {
        let (app, _) = test_app(two_quarters(), Ok(None));
        let response = app.oneshot(post_json(r#"{"ticker": "MSFT"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["valuation"]["strategy"], "No strategy data available.");
    }

    #[tokio::test]
    async fn test_caller_request_id_reaches_analyze() {
        let (app, _) = test_app(two_quarters(), Ok(None));
        let mut request = post_json(r#"{"ticker": "MSFT"}"#);
        request
            .headers_mut()
            .insert("x-request-id", "trace-abc-123".parse().unwrap());

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "trace-abc-123");
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = test_app(two_quarters(), Ok(None));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
    }
}
