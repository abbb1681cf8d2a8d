use crate::config::AppConfig;
use crate::errors::MonitorResult;
use crate::models::montecarlo::{self, SimulationRequest};
use crate::models::{analytic, volatility};
use crate::state::*;
use portable_atomic::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Monitor engine loop. Receives events, maintains the price history and
/// the active contract, re-runs the simulation on every tick, and
/// publishes snapshots. This is the hot path: no locks, no IO.
pub async fn run_engine(
    state: Arc<AppState>,
    config: AppConfig,
    mut rx: mpsc::Receiver<EngineEvent>,
) {
    tracing::info!("engine task started");

    // ── Local engine state (owned, no locks needed) ──
    let mut engine_state = EngineState::Connecting;
    let mut spot_price: f64 = 0.0;
    let mut spot_timestamp = String::new();
    let mut price_history: VecDeque<f64> = VecDeque::with_capacity(config.vol_window + 1);
    let mut contract: Option<ActiveContract> = None;

    while let Some(event) = rx.recv().await {
        let result = process_event(
            event,
            &mut engine_state,
            &mut spot_price,
            &mut spot_timestamp,
            &mut price_history,
            &mut contract,
            &config,
            &state,
        );

        if let Err(e) = result {
            // InvalidParameter here means a badly constructed request --
            // a programming error, not a transient condition. Log it and
            // keep the loop alive.
            tracing::error!(error = %e, "engine error");
            state.counters.errors_recovered.fetch_add(1, Ordering::Relaxed);
        }

        if engine_state == EngineState::Halted {
            break;
        }
    }

    tracing::info!("engine task shutting down");
}

#[allow(clippy::too_many_arguments)]
fn process_event(
    event: EngineEvent,
    engine_state: &mut EngineState,
    spot_price: &mut f64,
    spot_timestamp: &mut String,
    price_history: &mut VecDeque<f64>,
    contract: &mut Option<ActiveContract>,
    config: &AppConfig,
    state: &Arc<AppState>,
) -> MonitorResult<()> {
    match event {
        EngineEvent::SpotPrice { price, timestamp_ms } => {
            *spot_price = price;
            state.counters.prices_received.fetch_add(1, Ordering::Relaxed);

            // Ring buffer behind the vol estimate
            if price_history.len() >= config.vol_window {
                price_history.pop_front();
            }
            price_history.push_back(price);

            if *engine_state == EngineState::Connecting {
                *engine_state = EngineState::Syncing;
                tracing::info!(price = price, "first spot price received, entering Syncing");
                state.broadcast(WsMessage::EngineStateMsg {
                    state: "syncing".into(),
                    reason: "first price received".into(),
                });
            }

            let ts = chrono::DateTime::from_timestamp_millis(timestamp_ms)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default();
            *spot_timestamp = ts.clone();

            state.broadcast(WsMessage::SpotPrice {
                price,
                timestamp: ts,
            });
        }

        EngineEvent::Tick => {
            state.counters.ticks_processed.fetch_add(1, Ordering::Relaxed);

            // Nothing to simulate before the first price arrives.
            if *spot_price <= 0.0 {
                return Ok(());
            }

            let now = chrono::Utc::now();

            // Roll the contract when absent or expired: strike pinned a
            // configured offset above spot, close time one horizon out.
            let needs_roll = match contract.as_ref() {
                None => true,
                Some(c) => compute_ttl_secs(&c.close_time) <= 0.0,
            };
            if needs_roll {
                let strike = *spot_price * (1.0 + config.strike_offset);
                let close_time =
                    (now + chrono::Duration::seconds(config.contract_horizon_secs)).to_rfc3339();
                tracing::info!(strike = strike, close_time = %close_time, "rolling contract");
                *contract = Some(ActiveContract { strike, close_time });
            }

            let Some(active) = contract.as_ref() else {
                return Ok(());
            };
            let ttl_seconds = compute_ttl_secs(&active.close_time);

            state.broadcast(WsMessage::ContractState {
                strike: active.strike,
                close_time: active.close_time.clone(),
                ttl_seconds,
            });

            let vol = select_volatility(price_history, config);

            let mut request =
                SimulationRequest::new(*spot_price, vol.annualized_vol, ttl_seconds, active.strike);
            request.path_count = config.sim_paths;
            request.step_count = config.sim_steps;
            request.drift = config.drift;

            let result = montecarlo::simulate(&request)?;
            state.counters.simulations_run.fetch_add(1, Ordering::Relaxed);

            let analytic_prob = analytic::digital_prob_above(
                request.spot,
                request.strike,
                request.annualized_vol,
                request.years_to_expiry(),
            );

            let view = SimulationView::from_result(
                &result,
                &request,
                analytic_prob,
                config.display_paths,
                now.to_rfc3339(),
            );

            if *engine_state == EngineState::Syncing {
                *engine_state = EngineState::Monitoring;
                tracing::info!("first simulation complete, entering Monitoring");
                state.broadcast(WsMessage::EngineStateMsg {
                    state: "monitoring".into(),
                    reason: "first simulation complete".into(),
                });
            }

            tracing::info!(
                spot = request.spot,
                strike = request.strike,
                vol = request.annualized_vol,
                ttl_seconds = ttl_seconds,
                prob_above = result.prob_above,
                analytic = analytic_prob,
                regime = %vol.regime,
                "simulation complete"
            );

            state.broadcast(WsMessage::Simulation(Box::new(view.clone())));

            let snapshot = MonitorSnapshot {
                engine_state: *engine_state,
                spot_price: *spot_price,
                spot_timestamp: spot_timestamp.clone(),
                contract: contract.clone(),
                volatility: Some(vol),
                simulation: Some(view),
            };
            let _ = state.snapshot_tx.send(snapshot);
        }

        EngineEvent::Shutdown => {
            tracing::info!("shutdown event received");
            *engine_state = EngineState::Halted;
        }
    }

    Ok(())
}

/// Volatility input for the next run: the live estimate once enough
/// samples have accumulated, otherwise the regime-conditioned default.
fn select_volatility(price_history: &VecDeque<f64>, config: &AppConfig) -> VolSummary {
    let sample_count = price_history.len();
    if sample_count >= config.vol_min_samples {
        let prices: Vec<f64> = price_history.iter().copied().collect();
        let estimate = volatility::estimate_volatility(&prices, config.feed_poll_secs as f64);
        VolSummary {
            annualized_vol: estimate,
            regime: volatility::classify_regime(estimate),
            sample_count,
            live: true,
        }
    } else {
        let regime = volatility::classify_regime(config.default_vol);
        VolSummary {
            annualized_vol: volatility::regime_vol(regime),
            regime,
            sample_count,
            live: false,
        }
    }
}

/// Seconds until an RFC3339 close time, clamped at zero.
pub fn compute_ttl_secs(close_time: &str) -> f64 {
    let now = chrono::Utc::now();
    chrono::DateTime::parse_from_rfc3339(close_time)
        .ok()
        .map(|dt| (dt.with_timezone(&chrono::Utc) - now).num_seconds() as f64)
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(close_time, "%Y-%m-%dT%H:%M:%SZ")
                .ok()
                .map(|dt| (dt.and_utc() - now).num_seconds() as f64)
        })
        .unwrap_or(0.0)
        .max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::volatility::Regime;

    fn test_config() -> AppConfig {
        AppConfig {
            feed_base_url: String::new(),
            feed_symbol: "BTCUSDT".into(),
            feed_poll_secs: 2,
            sim_interval_secs: 10,
            sim_paths: 100,
            sim_steps: 10,
            default_vol: 0.40,
            drift: 0.0,
            strike_offset: 0.001,
            contract_horizon_secs: 600,
            vol_min_samples: 20,
            vol_window: 600,
            display_paths: 50,
            server_port: 0,
        }
    }

    #[test]
    fn test_vol_falls_back_to_regime_default_when_history_short() {
        let config = test_config();
        let history: VecDeque<f64> = vec![95_000.0; 5].into();
        let vol = select_volatility(&history, &config);
        assert!(!vol.live);
        assert_eq!(vol.regime, Regime::R2);
        assert_eq!(vol.annualized_vol, 0.40);
    }

    #[test]
    fn test_vol_goes_live_with_enough_samples() {
        let config = test_config();
        let mut history: VecDeque<f64> = VecDeque::new();
        let mut price = 95_000.0;
        for i in 0..30 {
            price *= if i % 2 == 0 { 1.001 } else { 0.999 };
            history.push_back(price);
        }
        let vol = select_volatility(&history, &config);
        assert!(vol.live);
        assert!(vol.annualized_vol > 0.0);
    }

    #[test]
    fn test_ttl_of_past_close_time_is_zero() {
        let past = (chrono::Utc::now() - chrono::Duration::seconds(120)).to_rfc3339();
        assert_eq!(compute_ttl_secs(&past), 0.0);
    }

    #[test]
    fn test_ttl_of_future_close_time() {
        let future = (chrono::Utc::now() + chrono::Duration::seconds(600)).to_rfc3339();
        let ttl = compute_ttl_secs(&future);
        assert!(ttl > 590.0 && ttl <= 600.0, "ttl {ttl}");
    }

    #[test]
    fn test_ttl_of_unparseable_close_time_is_zero() {
        assert_eq!(compute_ttl_secs("not a timestamp"), 0.0);
    }
}
