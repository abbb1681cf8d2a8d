use crate::state::{AppState, MonitorSnapshot};
use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;

/// GET /api/state -- current monitor snapshot (from watch channel, no lock)
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<MonitorSnapshot> {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(snapshot)
}

/// GET /api/simulation -- latest simulation view only
pub async fn get_simulation(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.snapshot_rx.borrow().clone();
    match snapshot.simulation {
        Some(sim) => Json(serde_json::json!(sim)),
        None => Json(serde_json::json!({ "error": "no simulation yet" })),
    }
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "ticks_processed": state.counters.ticks_processed.load(Relaxed),
        "prices_received": state.counters.prices_received.load(Relaxed),
        "simulations_run": state.counters.simulations_run.load(Relaxed),
        "errors_recovered": state.counters.errors_recovered.load(Relaxed),
        "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
    }))
}
