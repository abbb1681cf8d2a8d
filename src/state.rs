use crate::config::AppConfig;
use crate::models::montecarlo::{SimulationRequest, SimulationResult};
use crate::models::volatility::Regime;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

// ── Engine State Machine ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Connecting,
    Syncing,
    Monitoring,
    Halted,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Syncing => write!(f, "syncing"),
            Self::Monitoring => write!(f, "monitoring"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

// ── Messages INTO the engine (bounded channel) ──

#[derive(Debug, Clone)]
pub enum EngineEvent {
    SpotPrice { price: f64, timestamp_ms: i64 },
    Tick,
    Shutdown,
}

// ── Active contract being monitored ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct ActiveContract {
    pub strike: f64,
    /// RFC3339 close time; the engine rolls the contract once it passes.
    pub close_time: String,
}

// ── Volatility input chosen for a simulation ──

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct VolSummary {
    pub annualized_vol: f64,
    pub regime: Regime,
    pub sample_count: usize,
    /// false while the regime-conditioned default is standing in for a
    /// live estimate.
    pub live: bool,
}

// ── Dashboard view of one simulation ──

/// What the rendering collaborator needs to draw the fan chart and the
/// probability readouts. Paths are capped at `display_paths`; the
/// probabilities and mean path always come from every simulated path.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimulationView {
    pub spot: f64,
    pub strike: f64,
    pub annualized_vol: f64,
    pub time_to_expiry_seconds: f64,
    pub prob_above: f64,
    pub prob_below: f64,
    /// Closed-form Phi(d2) reference next to the Monte Carlo estimate.
    pub analytic_prob_above: f64,
    pub steps: u32,
    /// Total paths simulated (may exceed paths.len()).
    pub path_count: u32,
    pub paths: Vec<Vec<f64>>,
    pub mean_path: Vec<f64>,
    pub run_at: String,
}

impl SimulationView {
    pub fn from_result(
        result: &SimulationResult,
        request: &SimulationRequest,
        analytic_prob_above: f64,
        display_paths: usize,
        run_at: String,
    ) -> Self {
        let paths = result
            .paths
            .iter()
            .take(display_paths)
            .map(|p| p.to_vec())
            .collect();

        Self {
            spot: request.spot,
            strike: request.strike,
            annualized_vol: request.annualized_vol,
            time_to_expiry_seconds: request.time_to_expiry_seconds,
            prob_above: result.prob_above,
            prob_below: result.prob_below,
            analytic_prob_above,
            steps: result.steps,
            path_count: request.path_count,
            paths,
            mean_path: result.mean_path.clone(),
            run_at,
        }
    }
}

// ── Messages OUT of the engine ──

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "spot_price")]
    SpotPrice { price: f64, timestamp: String },

    #[serde(rename = "contract_state")]
    ContractState {
        strike: f64,
        close_time: String,
        ttl_seconds: f64,
    },

    #[serde(rename = "simulation")]
    Simulation(Box<SimulationView>),

    #[serde(rename = "engine_state")]
    EngineStateMsg { state: String, reason: String },
}

// ── Monitor snapshot for the dashboard (sent via watch channel) ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct MonitorSnapshot {
    pub engine_state: EngineState,
    pub spot_price: f64,
    pub spot_timestamp: String,
    pub contract: Option<ActiveContract>,
    pub volatility: Option<VolSummary>,
    pub simulation: Option<SimulationView>,
}

impl Default for MonitorSnapshot {
    fn default() -> Self {
        Self {
            engine_state: EngineState::Connecting,
            spot_price: 0.0,
            spot_timestamp: String::new(),
            contract: None,
            volatility: None,
            simulation: None,
        }
    }
}

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub ticks_processed: AtomicU64,
    pub prices_received: AtomicU64,
    pub simulations_run: AtomicU64,
    pub errors_recovered: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            ticks_processed: AtomicU64::new(0),
            prices_received: AtomicU64::new(0),
            simulations_run: AtomicU64::new(0),
            errors_recovered: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
        }
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    pub config: AppConfig,

    // Engine -> Dashboard: latest snapshot (watch = single producer, multi consumer)
    pub snapshot_tx: watch::Sender<MonitorSnapshot>,
    pub snapshot_rx: watch::Receiver<MonitorSnapshot>,

    // Engine -> Dashboard: event stream (broadcast for WS clients)
    pub ws_tx: broadcast::Sender<WsMessage>,

    // Feed -> Engine: bounded event channel
    pub engine_tx: mpsc::Sender<EngineEvent>,

    // Lock-free performance counters
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig, engine_tx: mpsc::Sender<EngineEvent>) -> Arc<Self> {
        let (ws_tx, _) = broadcast::channel(2048);
        let (snapshot_tx, snapshot_rx) = watch::channel(MonitorSnapshot::default());

        Arc::new(Self {
            config,
            snapshot_tx,
            snapshot_rx,
            ws_tx,
            engine_tx,
            counters: PerfCounters::new(),
        })
    }

    #[inline]
    pub fn broadcast(&self, msg: WsMessage) {
        self.counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);
        let _ = self.ws_tx.send(msg);
    }
}
