use crate::models::montecarlo::SECONDS_PER_YEAR;

/// Fallback estimate (40% annualized) used when the price history is too
/// short or degenerate. Deliberate policy, not an error condition.
pub const DEFAULT_VOL: f64 = 0.40;

/// Annualized volatility from a historical price series: standard
/// deviation of consecutive log returns scaled by sqrt(periods per year).
///
/// A non-positive previous price silently skips that return. The
/// annualization factor must match the sampling cadence of the caller's
/// feed; a mismatch silently biases the estimate.
pub fn estimate_volatility(prices: &[f64], sampling_interval_secs: f64) -> f64 {
    if prices.len() < 2 || sampling_interval_secs <= 0.0 {
        return DEFAULT_VOL;
    }

    let mut returns = Vec::with_capacity(prices.len() - 1);
    for pair in prices.windows(2) {
        if pair[0] > 0.0 {
            returns.push((pair[1] / pair[0]).ln());
        }
    }
    if returns.is_empty() {
        return DEFAULT_VOL;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    // Population variance (divide by n, not n - 1).
    let variance = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 || !std_dev.is_finite() {
        return DEFAULT_VOL;
    }

    std_dev * (SECONDS_PER_YEAR / sampling_interval_secs).sqrt()
}

/// Coarse volatility regime. Pure function of the annualized vol; any
/// finite input classifies deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Regime {
    R1,
    R2,
    R3,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::R1 => write!(f, "R1"),
            Self::R2 => write!(f, "R2"),
            Self::R3 => write!(f, "R3"),
        }
    }
}

/// Boundaries are closed below: exactly 0.30 is R2, exactly 0.60 is R3.
pub fn classify_regime(annualized_vol: f64) -> Regime {
    if annualized_vol < 0.30 {
        Regime::R1
    } else if annualized_vol < 0.60 {
        Regime::R2
    } else {
        Regime::R3
    }
}

/// Regime-conditioned volatility used when no live estimate is ready.
pub fn regime_vol(regime: Regime) -> f64 {
    match regime {
        Regime::R1 => 0.25,
        Regime::R2 => DEFAULT_VOL,
        Regime::R3 => 0.65,
    }
}
