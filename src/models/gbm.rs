use crate::errors::{MonitorError, MonitorResult};
use crate::models::NormalSource;

/// One GBM step using the exact log-space transition (not a first-order
/// discretization -- exact for constant drift/vol within the interval):
///
/// S_{t+1} = S_t * exp((drift - vol^2/2) * dt + vol * sqrt(dt) * z)
#[inline]
pub fn gbm_step(price: f64, vol: f64, dt: f64, sqrt_dt: f64, drift: f64, z: f64) -> f64 {
    price * ((drift - 0.5 * vol * vol) * dt + vol * sqrt_dt * z).exp()
}

/// Fill `out` with one simulated path: out[0] = spot, one normal draw per
/// subsequent step. Multiplicative steps keep every value strictly
/// positive for finite draws. `out.len() - 1` is the step count.
pub fn fill_path<S: NormalSource>(
    out: &mut [f64],
    spot: f64,
    vol: f64,
    years: f64,
    drift: f64,
    src: &mut S,
) {
    debug_assert!(out.len() >= 2, "path needs at least one step");
    let steps = out.len() - 1;
    let dt = years / steps as f64;
    let sqrt_dt = dt.sqrt();

    out[0] = spot;
    let mut s = spot;
    for slot in out.iter_mut().skip(1) {
        let z = src.next();
        s = gbm_step(s, vol, dt, sqrt_dt, drift, z);
        *slot = s;
    }
}

/// Simulate one path of `steps` GBM steps over `years`, returning
/// `steps + 1` prices starting at `spot`.
pub fn simulate_path<S: NormalSource>(
    spot: f64,
    vol: f64,
    years: f64,
    steps: u32,
    drift: f64,
    src: &mut S,
) -> MonitorResult<Vec<f64>> {
    if steps == 0 {
        return Err(MonitorError::InvalidParameter(
            "step count must be positive".into(),
        ));
    }
    let mut path = vec![0.0; steps as usize + 1];
    fill_path(&mut path, spot, vol, years, drift, src);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rng::BoxMuller;

    /// Fixed-draw source for exercising the step arithmetic directly.
    struct ConstSource(f64);

    impl NormalSource for ConstSource {
        fn next(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_path_shape_and_start() {
        let mut src = BoxMuller::seeded(9);
        let path = simulate_path(100.0, 0.4, 0.5, 60, 0.0, &mut src).unwrap();
        assert_eq!(path.len(), 61);
        assert_eq!(path[0], 100.0);
    }

    #[test]
    fn test_all_prices_strictly_positive() {
        let mut src = BoxMuller::seeded(11);
        // High vol over a long horizon still cannot cross zero.
        let path = simulate_path(100.0, 2.5, 4.0, 200, 0.0, &mut src).unwrap();
        assert!(path.iter().all(|&p| p > 0.0));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let mut src = BoxMuller::seeded(1);
        let err = simulate_path(100.0, 0.4, 0.5, 0, 0.0, &mut src).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidParameter(_)));
    }

    #[test]
    fn test_zero_vol_zero_drift_is_constant() {
        let mut src = BoxMuller::seeded(3);
        let path = simulate_path(250.0, 0.0, 1.0, 30, 0.0, &mut src).unwrap();
        assert!(path.iter().all(|&p| p == 250.0));
    }

    #[test]
    fn test_zero_vol_reduces_to_exponential_drift() {
        let mut src = BoxMuller::seeded(3);
        let years = 0.25;
        let drift = 0.08;
        let path = simulate_path(100.0, 0.0, years, 50, drift, &mut src).unwrap();
        let expected = 100.0 * (drift * years).exp();
        let terminal = *path.last().unwrap();
        assert!(
            (terminal - expected).abs() / expected < 1e-12,
            "terminal {terminal} vs closed form {expected}"
        );
    }

    #[test]
    fn test_step_matches_formula() {
        let mut src = ConstSource(1.5);
        let years = 1.0;
        let path = simulate_path(100.0, 0.2, years, 1, 0.05, &mut src).unwrap();
        let expected = 100.0 * ((0.05 - 0.5 * 0.04) * years + 0.2 * years.sqrt() * 1.5).exp();
        assert_eq!(path[1], expected);
    }

    #[test]
    fn test_same_seed_same_path() {
        let mut a = BoxMuller::seeded(77);
        let mut b = BoxMuller::seeded(77);
        let p1 = simulate_path(95_000.0, 0.4, 0.1, 60, 0.0, &mut a).unwrap();
        let p2 = simulate_path(95_000.0, 0.4, 0.1, 60, 0.0, &mut b).unwrap();
        assert_eq!(p1, p2);
    }
}
