use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use common::{
    Candle, Error, MaAlignment, MarketType, PairKey, SignalFilter, TradeSide, TradeSignal,
    TradingPair,
};
use strategy::{format_volume, top_opportunities, SortKey};

use crate::{auth::require_auth, AppState};

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/pairs", get(get_pairs))
        .route("/api/pair", get(get_pair))
        .route("/api/opportunities", get(get_opportunities))
        .route("/api/portfolio", get(get_portfolio))
        .route("/api/exchanges", get(get_exchanges).post(post_exchange))
        .route("/api/trade", post(post_trade))
        .route("/api/auto-trading", get(get_auto_trading).post(post_auto_trading))
        .route("/api/filter", post(post_filter))
        .route("/api/market", post(post_market))
        .route("/api/refresh", post(post_refresh))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn bad_request(msg: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg.to_string() })))
}

fn engine_error(e: Error) -> (StatusCode, Json<Value>) {
    warn!(error = %e, "Engine request failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": e.to_string() })),
    )
}

/// `"all"` (or absent) means no market-type restriction.
fn parse_market(raw: &str) -> Result<Option<MarketType>, Error> {
    if raw.eq_ignore_ascii_case("all") {
        Ok(None)
    } else {
        raw.parse().map(Some)
    }
}

// ─── Pairs ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PairView<'a> {
    symbol: &'a str,
    exchange: &'a str,
    market_type: MarketType,
    price: f64,
    change_24h: f64,
    volume_24h: f64,
    volume_24h_label: String,
    volume_ratio: f64,
    volatility: f64,
    composite_score: f64,
    signal: TradeSignal,
    ma_alignment: MaAlignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    candles: Option<&'a [Candle]>,
}

impl<'a> PairView<'a> {
    fn new(pair: &'a TradingPair, with_candles: bool) -> Self {
        Self {
            symbol: &pair.symbol,
            exchange: &pair.exchange,
            market_type: pair.market_type,
            price: pair.price,
            change_24h: pair.change_24h,
            volume_24h: pair.volume_24h,
            volume_24h_label: format_volume(pair.volume_24h),
            volume_ratio: pair.volume_ratio,
            volatility: pair.volatility,
            composite_score: pair.composite_score,
            signal: pair.signal,
            ma_alignment: pair.ma_alignment,
            candles: with_candles.then_some(pair.candles.as_slice()),
        }
    }
}

#[derive(Deserialize)]
struct PairsQuery {
    signal: Option<String>,
    market: Option<String>,
    #[serde(default)]
    candles: bool,
}

async fn get_pairs(State(state): State<AppState>, Query(q): Query<PairsQuery>) -> ApiResult {
    let session = state.engine.session().await;

    let signal = match q.signal.as_deref() {
        Some(raw) => raw.parse::<SignalFilter>().map_err(bad_request)?,
        None => session.signal_filter(),
    };
    let market = match q.market.as_deref() {
        Some(raw) => parse_market(raw).map_err(bad_request)?,
        None => session.market_type(),
    };

    let pairs: Vec<PairView> = session
        .filtered_pairs(signal, market)
        .map(|p| PairView::new(p, q.candles))
        .collect();

    Ok(Json(json!({
        "pairs": pairs,
        "total": pairs.len(),
        "signal_filter": signal,
        "market": market,
    })))
}

#[derive(Deserialize)]
struct PairQuery {
    exchange: String,
    symbol: String,
}

async fn get_pair(State(state): State<AppState>, Query(q): Query<PairQuery>) -> ApiResult {
    let session = state.engine.session().await;
    let key = PairKey::new(q.exchange, q.symbol);
    match session.pair(&key) {
        Some(pair) => Ok(Json(json!(PairView::new(pair, true)))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("pair {key} not in current snapshot") })),
        )),
    }
}

#[derive(Deserialize)]
struct TopQuery {
    top: Option<usize>,
    sort: Option<String>,
}

async fn get_opportunities(State(state): State<AppState>, Query(q): Query<TopQuery>) -> ApiResult {
    let n = q.top.unwrap_or(20).min(200);
    let sort = match q.sort.as_deref() {
        Some(raw) => raw.parse::<SortKey>().map_err(bad_request)?,
        None => SortKey::default(),
    };
    let session = state.engine.session().await;
    let top: Vec<PairView> = top_opportunities(session.pairs(), n, sort)
        .into_iter()
        .map(|p| PairView::new(p, false))
        .collect();
    Ok(Json(json!({ "opportunities": top, "sort": sort })))
}

// ─── Portfolio ────────────────────────────────────────────────────────────────

async fn get_portfolio(State(state): State<AppState>) -> Json<Value> {
    let session = state.engine.session().await;
    Json(json!(session.portfolio()))
}

#[derive(Deserialize)]
struct TradeBody {
    exchange: String,
    symbol: String,
    action: String,
}

async fn post_trade(State(state): State<AppState>, Json(body): Json<TradeBody>) -> ApiResult {
    let side: TradeSide = body.action.parse().map_err(bad_request)?;
    let key = PairKey::new(body.exchange, body.symbol);

    match state.engine.execute_trade(key, side).await.map_err(engine_error)? {
        Some(trade) => Ok(Json(json!({ "executed": true, "trade": trade }))),
        None => Ok(Json(json!({ "executed": false }))),
    }
}

// ─── Exchanges ────────────────────────────────────────────────────────────────

async fn get_exchanges(State(state): State<AppState>) -> Json<Value> {
    let session = state.engine.session().await;
    Json(json!({ "exchanges": session.registry().all() }))
}

#[derive(Deserialize)]
struct ToggleBody {
    name: String,
    enabled: bool,
}

async fn post_exchange(State(state): State<AppState>, Json(body): Json<ToggleBody>) -> ApiResult {
    let updated = state
        .engine
        .toggle_exchange(body.name.clone(), body.enabled)
        .await
        .map_err(engine_error)?;
    Ok(Json(json!({
        "name": body.name,
        "enabled": body.enabled,
        "updated": updated,
    })))
}

// ─── Session controls ─────────────────────────────────────────────────────────

async fn get_auto_trading(State(state): State<AppState>) -> Json<Value> {
    let enabled = state.engine.session().await.auto_trading();
    Json(json!({ "enabled": enabled }))
}

#[derive(Deserialize)]
struct AutoTradingBody {
    enabled: bool,
}

async fn post_auto_trading(
    State(state): State<AppState>,
    Json(body): Json<AutoTradingBody>,
) -> ApiResult {
    state
        .engine
        .set_auto_trading(body.enabled)
        .await
        .map_err(engine_error)?;
    Ok(Json(json!({ "enabled": body.enabled })))
}

#[derive(Deserialize)]
struct FilterBody {
    signal: String,
}

async fn post_filter(State(state): State<AppState>, Json(body): Json<FilterBody>) -> ApiResult {
    let filter: SignalFilter = body.signal.parse().map_err(bad_request)?;
    state
        .engine
        .set_signal_filter(filter)
        .await
        .map_err(engine_error)?;
    Ok(Json(json!({ "signal_filter": filter })))
}

#[derive(Deserialize)]
struct MarketBody {
    market: String,
}

async fn post_market(State(state): State<AppState>, Json(body): Json<MarketBody>) -> ApiResult {
    let market = parse_market(&body.market).map_err(bad_request)?;
    state
        .engine
        .set_market_type(market)
        .await
        .map_err(engine_error)?;
    Ok(Json(json!({ "market": market })))
}

async fn post_refresh(State(state): State<AppState>) -> ApiResult {
    state.engine.refresh().await.map_err(engine_error)?;
    let pairs = state.engine.session().await.pairs().len();
    Ok(Json(json!({ "refreshed": true, "pairs": pairs })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use tower::ServiceExt;

    use engine::{Engine, EngineSettings, ExchangeRegistry, MockFeed, Session};
    use paper::{FixedPnl, LedgerConfig, PaperLedger};
    use strategy::PairAnalyzer;

    use super::*;

    const TOKEN: &str = "test-token";

    async fn test_state() -> AppState {
        let session = Session::new(
            ExchangeRegistry::default(),
            PaperLedger::new(LedgerConfig::default(), Box::new(FixedPnl(0.0))),
        );
        let (engine, handle) = Engine::new(
            EngineSettings::default(),
            Arc::new(MockFeed::seeded(21)),
            PairAnalyzer::default(),
            session,
        );
        tokio::spawn(engine.run());
        handle.refresh().await.unwrap();
        AppState {
            engine: handle,
            dashboard_token: TOKEN.into(),
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap()
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_needs_no_token() {
        let app = crate::app(test_state().await);
        let resp = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["pairs"], 20);
    }

    #[tokio::test]
    async fn api_rejects_missing_token() {
        let app = crate::app(test_state().await);
        let resp = app
            .oneshot(Request::builder().uri("/api/portfolio").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn api_rejects_wrong_token() {
        let app = crate::app(test_state().await);
        let req = Request::builder()
            .uri("/api/portfolio")
            .header(header::AUTHORIZATION, "Bearer not-the-token")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"], "unauthorized");
    }

    #[tokio::test]
    async fn event_socket_rejects_missing_or_wrong_token() {
        let state = test_state().await;
        for uri in ["/ws/events", "/ws/events?token=nope", "/ws/events?token="] {
            let resp = crate::app(state.clone())
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn event_socket_with_valid_token_asks_for_upgrade() {
        let app = crate::app(test_state().await);
        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/ws/events?token={TOKEN}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UPGRADE_REQUIRED);
    }

    #[tokio::test]
    async fn opportunities_honour_sort_key() {
        let state = test_state().await;

        let resp = crate::app(state.clone())
            .oneshot(get("/api/opportunities?sort=composite_score&top=50"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["sort"], "composite_score");
        let scores: Vec<f64> = json["opportunities"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["composite_score"].as_f64().unwrap())
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));

        let resp = crate::app(state)
            .oneshot(get("/api/opportunities?sort=momentum"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn portfolio_starts_at_initial_balance() {
        let app = crate::app(test_state().await);
        let resp = app.oneshot(get("/api/portfolio")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["balance"], 1000.0);
        assert_eq!(json["balance_history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pairs_omit_candles_unless_requested() {
        let state = test_state().await;

        let resp = crate::app(state.clone()).oneshot(get("/api/pairs")).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["total"], 20);
        assert!(json["pairs"][0].get("candles").is_none());

        let resp = crate::app(state)
            .oneshot(get("/api/pairs?candles=true&signal=all"))
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["pairs"][0]["candles"].as_array().unwrap().len(), 51);
    }

    #[tokio::test]
    async fn invalid_signal_filter_is_bad_request() {
        let app = crate::app(test_state().await);
        let resp = app.oneshot(get("/api/pairs?signal=LONG")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn trade_then_portfolio_reflects_it() {
        let state = test_state().await;
        let key = state.engine.session().await.pairs()[0].key();

        let resp = crate::app(state.clone())
            .oneshot(post(
                "/api/trade",
                json!({ "exchange": key.exchange, "symbol": key.symbol, "action": "BUY" }),
            ))
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["executed"], true);
        assert_eq!(json["trade"]["type"], "BUY");

        let resp = crate::app(state).oneshot(get("/api/portfolio")).await.unwrap();
        assert_eq!(body_json(resp).await["balance"], 900.0);
    }

    #[tokio::test]
    async fn toggling_exchange_filters_pairs() {
        let state = test_state().await;

        let resp = crate::app(state.clone())
            .oneshot(post("/api/exchanges", json!({ "name": "Binance", "enabled": false })))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["updated"], true);

        let resp = crate::app(state.clone()).oneshot(get("/api/pairs")).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["total"], 15);

        let resp = crate::app(state)
            .oneshot(post("/api/exchanges", json!({ "name": "FTX", "enabled": false })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["updated"], false);
    }

    #[tokio::test]
    async fn auto_trading_toggle_round_trips() {
        let state = test_state().await;
        let resp = crate::app(state.clone())
            .oneshot(post("/api/auto-trading", json!({ "enabled": true })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = crate::app(state).oneshot(get("/api/auto-trading")).await.unwrap();
        assert_eq!(body_json(resp).await["enabled"], true);
    }
}
