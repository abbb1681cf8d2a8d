use crate::errors::{MonitorError, MonitorResult};
use crate::models::gbm;
use crate::models::rng::BoxMuller;
use rayon::prelude::*;
use serde::ser::{SerializeSeq, Serializer};

pub const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

/// Simulated time is floored at one minute so an imminent (or already
/// passed) expiry never degenerates to a zero-variance path. Policy
/// constant; downstream consumers depend on the exact threshold.
const MIN_YEARS: f64 = 1.0 / (365.0 * 24.0 * 60.0);

pub const DEFAULT_PATHS: u32 = 1000;
pub const DEFAULT_STEPS: u32 = 60;

/// Immutable simulation input. Validated before any path is generated.
#[derive(Debug, Clone, Copy)]
pub struct SimulationRequest {
    pub spot: f64,
    pub annualized_vol: f64,
    pub time_to_expiry_seconds: f64,
    pub strike: f64,
    pub path_count: u32,
    pub step_count: u32,
    /// Drift rate mu (0 = risk-neutral).
    pub drift: f64,
}

impl SimulationRequest {
    pub fn new(spot: f64, annualized_vol: f64, time_to_expiry_seconds: f64, strike: f64) -> Self {
        Self {
            spot,
            annualized_vol,
            time_to_expiry_seconds,
            strike,
            path_count: DEFAULT_PATHS,
            step_count: DEFAULT_STEPS,
            drift: 0.0,
        }
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if self.spot <= 0.0 || !self.spot.is_finite() {
            return Err(invalid("spot must be positive", self.spot));
        }
        if self.strike <= 0.0 || !self.strike.is_finite() {
            return Err(invalid("strike must be positive", self.strike));
        }
        if self.annualized_vol < 0.0 || !self.annualized_vol.is_finite() {
            return Err(invalid("volatility must be non-negative", self.annualized_vol));
        }
        if !self.time_to_expiry_seconds.is_finite() {
            return Err(invalid(
                "time to expiry must be finite",
                self.time_to_expiry_seconds,
            ));
        }
        if self.path_count == 0 {
            return Err(MonitorError::InvalidParameter(
                "path count must be positive".into(),
            ));
        }
        if self.step_count == 0 {
            return Err(MonitorError::InvalidParameter(
                "step count must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Time to expiry in years, floored at one simulated minute.
    #[inline]
    pub fn years_to_expiry(&self) -> f64 {
        (self.time_to_expiry_seconds / SECONDS_PER_YEAR).max(MIN_YEARS)
    }
}

fn invalid(what: &str, value: f64) -> MonitorError {
    MonitorError::InvalidParameter(format!("{what}, got {value}"))
}

/// All simulated paths in one contiguous row-major buffer addressed by
/// (path, step); fewer allocations than a Vec per path and better cache
/// locality for the column-wise mean reduction. Never mutated after the
/// run that produced it.
#[derive(Debug, Clone)]
pub struct PathSet {
    prices: Vec<f64>,
    points_per_path: usize,
}

impl PathSet {
    fn zeroed(path_count: usize, points_per_path: usize) -> Self {
        Self {
            prices: vec![0.0; path_count * points_per_path],
            points_per_path,
        }
    }

    #[inline]
    pub fn path_count(&self) -> usize {
        self.prices.len() / self.points_per_path
    }

    #[inline]
    pub fn points_per_path(&self) -> usize {
        self.points_per_path
    }

    /// One path as a slice of `points_per_path` prices.
    #[inline]
    pub fn path(&self, idx: usize) -> &[f64] {
        let start = idx * self.points_per_path;
        &self.prices[start..start + self.points_per_path]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.prices.chunks_exact(self.points_per_path)
    }
}

// The dashboard consumes paths as nested arrays ([path][step] = price).
impl serde::Serialize for PathSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.path_count()))?;
        for path in self.iter() {
            seq.serialize_element(path)?;
        }
        seq.end()
    }
}

/// Derived, read-only output of one simulation run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimulationResult {
    pub paths: PathSet,
    /// Cross-path arithmetic mean at each step; length step_count + 1.
    pub mean_path: Vec<f64>,
    /// Fraction of terminal prices strictly above the strike.
    pub prob_above: f64,
    /// Complement of prob_above; the two always sum to exactly 1.
    pub prob_below: f64,
    pub final_prices: Vec<f64>,
    pub steps: u32,
}

/// Run a simulation with a fresh entropy-derived seed.
pub fn simulate(request: &SimulationRequest) -> MonitorResult<SimulationResult> {
    run(request, rand::random::<u64>())
}

/// Run a simulation with an explicit base seed. Two runs with the same
/// request and seed produce bit-identical results, independent of how
/// rayon schedules the path workers.
pub fn simulate_seeded(request: &SimulationRequest, base_seed: u64) -> MonitorResult<SimulationResult> {
    run(request, base_seed)
}

fn run(request: &SimulationRequest, base_seed: u64) -> MonitorResult<SimulationResult> {
    request.validate()?;

    let years = request.years_to_expiry();
    let path_count = request.path_count as usize;
    let points = request.step_count as usize + 1;

    // Each path owns an independent normal stream seeded from its index,
    // so parallel generation stays reproducible and uncorrelated.
    let mut paths = PathSet::zeroed(path_count, points);
    paths
        .prices
        .par_chunks_exact_mut(points)
        .enumerate()
        .for_each(|(idx, row)| {
            let mut src = BoxMuller::seeded(base_seed.wrapping_add(idx as u64));
            gbm::fill_path(
                row,
                request.spot,
                request.annualized_vol,
                years,
                request.drift,
                &mut src,
            );
        });

    let (mean_path, prob_above, final_prices) = aggregate(&paths, request.spot, request.strike);

    Ok(SimulationResult {
        paths,
        mean_path,
        prob_above,
        prob_below: 1.0 - prob_above,
        final_prices,
        steps: request.step_count,
    })
}

/// Column-wise mean across paths plus the terminal above-strike count.
/// Serial row accumulation in fixed path order keeps seeded runs
/// bit-identical; the sum/count reduction itself is order-independent.
fn aggregate(paths: &PathSet, spot: f64, strike: f64) -> (Vec<f64>, f64, Vec<f64>) {
    let n = paths.path_count();
    let points = paths.points_per_path();

    let mut sums = vec![0.0f64; points];
    let mut above: u64 = 0;
    let mut final_prices = Vec::with_capacity(n);

    for row in paths.iter() {
        for (acc, &price) in sums.iter_mut().zip(row) {
            *acc += price;
        }
        let terminal = row[points - 1];
        final_prices.push(terminal);
        // Strictly greater: a terminal price equal to the strike counts
        // toward "below".
        if terminal > strike {
            above += 1;
        }
    }

    let mut mean_path: Vec<f64> = sums.iter().map(|s| s / n as f64).collect();
    // Every path starts at spot, so the mean does too; assigning directly
    // keeps the equality exact under floating point.
    mean_path[0] = spot;

    (mean_path, above as f64 / n as f64, final_prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analytic;

    fn request(spot: f64, vol: f64, tte: f64, strike: f64) -> SimulationRequest {
        SimulationRequest::new(spot, vol, tte, strike)
    }

    #[test]
    fn test_validation_rejects_bad_parameters() {
        let cases = [
            request(0.0, 0.4, 600.0, 95_095.0),
            request(-10.0, 0.4, 600.0, 95_095.0),
            request(95_000.0, 0.4, 600.0, 0.0),
            request(95_000.0, 0.4, 600.0, -5.0),
            request(95_000.0, -0.1, 600.0, 95_095.0),
        ];
        for req in cases {
            let err = simulate_seeded(&req, 1).unwrap_err();
            assert!(matches!(err, MonitorError::InvalidParameter(_)), "{req:?}");
        }

        let mut req = request(95_000.0, 0.4, 600.0, 95_095.0);
        req.path_count = 0;
        assert!(matches!(
            simulate_seeded(&req, 1).unwrap_err(),
            MonitorError::InvalidParameter(_)
        ));

        let mut req = request(95_000.0, 0.4, 600.0, 95_095.0);
        req.step_count = 0;
        assert!(matches!(
            simulate_seeded(&req, 1).unwrap_err(),
            MonitorError::InvalidParameter(_)
        ));
    }

    #[test]
    fn test_end_to_end_reference_scenario() {
        let req = request(95_000.0, 0.40, 600.0, 95_095.0);
        let result = simulate_seeded(&req, 42).unwrap();

        assert_eq!(result.paths.path_count(), 1000);
        assert_eq!(result.mean_path.len(), 61);
        assert_eq!(result.final_prices.len(), 1000);
        assert_eq!(result.steps, 60);
        assert_eq!(result.prob_above + result.prob_below, 1.0);
    }

    #[test]
    fn test_probabilities_sum_to_one_exactly() {
        for seed in 0..10 {
            let req = request(100.0, 0.8, 3600.0, 101.0);
            let result = simulate_seeded(&req, seed).unwrap();
            assert_eq!(result.prob_above + result.prob_below, 1.0);
        }
    }

    #[test]
    fn test_mean_path_starts_exactly_at_spot() {
        // 0.1 is not exactly representable; the mean must still equal spot
        // bit-for-bit.
        let req = request(0.1, 0.4, 600.0, 0.2);
        let result = simulate_seeded(&req, 5).unwrap();
        assert_eq!(result.mean_path[0], 0.1);
    }

    #[test]
    fn test_every_price_strictly_positive() {
        let req = request(50.0, 1.5, 7.0 * 24.0 * 3600.0, 50.0);
        let result = simulate_seeded(&req, 8).unwrap();
        for path in result.paths.iter() {
            assert_eq!(path.len(), 61);
            assert!(path.iter().all(|&p| p > 0.0));
        }
    }

    #[test]
    fn test_terminal_at_strike_counts_as_below() {
        // Zero vol + zero drift: every terminal price equals spot exactly.
        // With strike == spot the tie must land in "below".
        let req = request(95_000.0, 0.0, 600.0, 95_000.0);
        let result = simulate_seeded(&req, 3).unwrap();
        assert_eq!(result.prob_above, 0.0);
        assert_eq!(result.prob_below, 1.0);
    }

    #[test]
    fn test_degenerate_zero_vol_zero_drift() {
        let req = request(95_000.0, 0.0, 600.0, 95_095.0);
        let result = simulate_seeded(&req, 3).unwrap();
        for path in result.paths.iter() {
            assert!(path.iter().all(|&p| p == 95_000.0));
        }
        assert_eq!(result.prob_above, 0.0);

        let req = request(95_200.0, 0.0, 600.0, 95_095.0);
        let result = simulate_seeded(&req, 3).unwrap();
        assert_eq!(result.prob_above, 1.0);
    }

    #[test]
    fn test_seeded_runs_are_bit_identical() {
        let req = request(95_000.0, 0.40, 600.0, 95_095.0);
        let a = simulate_seeded(&req, 1234).unwrap();
        let b = simulate_seeded(&req, 1234).unwrap();

        assert_eq!(a.prob_above, b.prob_above);
        assert_eq!(a.mean_path, b.mean_path);
        assert_eq!(a.final_prices, b.final_prices);
        for (pa, pb) in a.paths.iter().zip(b.paths.iter()) {
            assert_eq!(pa, pb);
        }
    }

    #[test]
    fn test_zero_time_to_expiry_engages_floor() {
        let req = request(95_000.0, 0.40, 0.0, 95_095.0);
        assert_eq!(req.years_to_expiry(), 1.0 / (365.0 * 24.0 * 60.0));

        let result = simulate_seeded(&req, 6).unwrap();
        assert_eq!(result.mean_path[0], 95_000.0);
        assert_eq!(result.mean_path.len(), 61);
    }

    #[test]
    fn test_negative_time_to_expiry_floors_too() {
        let req = request(95_000.0, 0.40, -30.0, 95_095.0);
        let result = simulate_seeded(&req, 6).unwrap();
        assert_eq!(result.mean_path[0], 95_000.0);
    }

    #[test]
    fn test_probability_agrees_with_closed_form() {
        let mut req = request(95_000.0, 0.40, 600.0, 95_095.0);
        req.path_count = 4000;
        let result = simulate_seeded(&req, 99).unwrap();

        let expected =
            analytic::digital_prob_above(95_000.0, 95_095.0, 0.40, req.years_to_expiry());
        assert!(
            (result.prob_above - expected).abs() < 0.05,
            "monte carlo {} vs closed form {expected}",
            result.prob_above
        );
    }

    #[test]
    fn test_mean_path_tracks_drift() {
        // With zero vol the mean path is the deterministic drift curve.
        let mut req = request(100.0, 0.0, 24.0 * 3600.0, 100.0);
        req.drift = 1.0;
        let result = simulate_seeded(&req, 2).unwrap();
        let years = req.years_to_expiry();
        let expected = 100.0 * (1.0 * years).exp();
        let terminal = *result.mean_path.last().unwrap();
        assert!(
            (terminal - expected).abs() / expected < 1e-12,
            "terminal mean {terminal} vs {expected}"
        );
    }

    #[test]
    fn test_path_set_indexing() {
        let req = request(100.0, 0.4, 600.0, 101.0);
        let result = simulate_seeded(&req, 10).unwrap();
        assert_eq!(result.paths.points_per_path(), 61);
        assert_eq!(result.paths.path(0)[0], 100.0);
        assert_eq!(
            result.paths.path(999)[60],
            result.final_prices[999]
        );
    }

    #[test]
    fn test_path_set_serializes_as_nested_arrays() {
        let mut req = request(100.0, 0.4, 600.0, 101.0);
        req.path_count = 2;
        req.step_count = 3;
        let result = simulate_seeded(&req, 1).unwrap();

        let value = serde_json::to_value(&result.paths).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_array().unwrap().len(), 4);
        assert_eq!(rows[0][0].as_f64().unwrap(), 100.0);
    }
}
