//! ==============================================================================
//! server.rs - dashboard web server
//! ==============================================================================
//!
//! routes:
//!     GET /                         html dashboard
//!     GET /api/state                full aggregation snapshot
//!     GET /api/latest               header (last reading + time since)
//!     GET /api/history/temperature  per-day temperature history, newest first
//!     GET /api/history/humidity     per-day humidity history, newest first
//!
//! handlers only read: every request takes a snapshot of the shared store.
//!
//! ==============================================================================

use crate::aggregate::{AggregationState, SharedStore};
use crate::view::{self, Header, HistoryEntry, Metric};

use anyhow::Result;
use axum::{
    extract::State,
    response::{Html, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/state", get(state_handler))
        .route("/api/latest", get(latest_handler))
        .route("/api/history/temperature", get(temperature_handler))
        .route("/api/history/humidity", get(humidity_handler))
        .layer(CorsLayer::permissive())
        .with_state(store)
}

/// serve the dashboard on an already bound listener until the process exits
pub async fn serve(listener: TcpListener, store: SharedStore) -> Result<()> {
    axum::serve(listener, router(store)).await?;
    Ok(())
}

async fn state_handler(State(store): State<SharedStore>) -> Json<AggregationState> {
    Json(store.snapshot().await)
}

async fn latest_handler(State(store): State<SharedStore>) -> Json<Header> {
    let state = store.snapshot().await;
    Json(Header::from_state(&state, Utc::now()))
}

async fn temperature_handler(State(store): State<SharedStore>) -> Json<Vec<HistoryEntry>> {
    Json(view::temperature_history(&store.snapshot().await))
}

async fn humidity_handler(State(store): State<SharedStore>) -> Json<Vec<HistoryEntry>> {
    Json(view::humidity_history(&store.snapshot().await))
}

async fn dashboard_handler(State(store): State<SharedStore>) -> Html<String> {
    let state = store.snapshot().await;
    let header = Header::from_state(&state, Utc::now());

    let mut page = String::from(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>greenhouse</title></head>
<body style="font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee;">
"#,
    );

    let since = header.since.as_deref().unwrap_or(view::PLACEHOLDER);
    page.push_str(&format!(
        "<header><h1>{}°C &middot; {}%</h1><p>{} ago &middot; {} V</p></header>\n",
        html_escape(&header.temperature),
        html_escape(&header.humidity),
        html_escape(since),
        html_escape(&header.voltage),
    ));

    render_history(&mut page, "temperature", Metric::Temperature, &view::temperature_history(&state));
    render_history(&mut page, "humidity", Metric::Humidity, &view::humidity_history(&state));

    page.push_str("</body>\n</html>\n");
    Html(page)
}

fn render_history(page: &mut String, title: &str, metric: Metric, entries: &[HistoryEntry]) {
    let suffix = metric.suffix();
    page.push_str(&format!("<section id=\"{title}\"><h2>{title}</h2>\n<table>\n"));
    page.push_str("<tr><th>day</th><th>min</th><th>max</th><th>range</th><th>readings</th></tr>\n");
    for entry in entries {
        page.push_str(&format!(
            "<tr><td>{}</td><td>{}{suffix}</td><td>{}{suffix}</td><td>{}..{}{suffix}</td><td>{}</td></tr>\n",
            html_escape(entry.day.as_str()),
            entry.min,
            entry.max,
            entry.total_min,
            entry.total_max,
            entry.points.len(),
        ));
    }
    page.push_str("</table></section>\n");
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
