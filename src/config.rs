use crate::errors::{MonitorError, MonitorResult};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feed_base_url: String,
    pub feed_symbol: String,
    /// Spot poll cadence. Doubles as the sampling interval fed to the
    /// volatility estimator, so the annualization factor stays consistent
    /// with the actual feed cadence.
    pub feed_poll_secs: u64,
    /// How often a fresh simulation is run.
    pub sim_interval_secs: u64,
    pub sim_paths: u32,
    pub sim_steps: u32,
    pub default_vol: f64,
    pub drift: f64,
    /// Strike is set to spot * (1 + offset) when a contract rolls.
    pub strike_offset: f64,
    /// Lifetime of a rolled contract, in seconds.
    pub contract_horizon_secs: i64,
    /// Minimum price observations before the live vol estimate is trusted.
    pub vol_min_samples: usize,
    /// Ring buffer size for the price history behind the vol estimate.
    pub vol_window: usize,
    /// Max paths shipped to the dashboard per simulation.
    pub display_paths: usize,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> MonitorResult<Self> {
        dotenvy::dotenv().ok();

        let feed_poll_secs = parse_var("FEED_POLL_SECS", "2")?;
        let sim_interval_secs = parse_var("SIM_INTERVAL_SECS", "10")?;
        let sim_paths = parse_var("SIM_PATHS", "1000")?;
        let sim_steps = parse_var("SIM_STEPS", "60")?;
        let default_vol = parse_var("DEFAULT_VOL", "0.40")?;
        let drift = parse_var("DRIFT", "0")?;
        let strike_offset = parse_var("STRIKE_OFFSET", "0.001")?;
        let contract_horizon_secs = parse_var("CONTRACT_HORIZON_SECS", "600")?;
        let vol_min_samples = parse_var("VOL_MIN_SAMPLES", "20")?;
        let vol_window = parse_var("VOL_WINDOW", "600")?;
        let display_paths = parse_var("DISPLAY_PATHS", "200")?;
        let server_port = parse_var("SERVER_PORT", "3001")?;

        Ok(Self {
            feed_base_url: env_var_or("FEED_BASE_URL", "https://api.binance.com/api/v3"),
            feed_symbol: env_var_or("FEED_SYMBOL", "BTCUSDT"),
            feed_poll_secs,
            sim_interval_secs,
            sim_paths,
            sim_steps,
            default_vol,
            drift,
            strike_offset,
            contract_horizon_secs,
            vol_min_samples,
            vol_window,
            display_paths,
            server_port,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: &str) -> MonitorResult<T>
where
    T::Err: std::fmt::Display,
{
    env_var_or(key, default)
        .parse::<T>()
        .map_err(|e| MonitorError::Config(format!("{key}: {e}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
