use statrs::distribution::{ContinuousCDF, Normal};

/// Closed-form binary probability under GBM.
///
/// P(S_T > K) = Phi(d2)
///
/// where d2 = (ln(S/K) - 0.5 * sigma^2 * T) / (sigma * sqrt(T)).
///
/// Shown on the dashboard next to the Monte Carlo estimate and used by
/// tests as an independent cross-check.
pub fn digital_prob_above(spot: f64, strike: f64, annualized_vol: f64, years: f64) -> f64 {
    let sigma_sqrt_t = annualized_vol * years.sqrt();
    if sigma_sqrt_t < 1e-12 || years <= 0.0 {
        // Degenerate: the outcome is already decided. Ties land in
        // "below", matching the simulation's terminal classification.
        return if spot > strike { 1.0 } else { 0.0 };
    }

    // Normal::new(0, 1) only fails for a non-positive std dev.
    let normal = Normal::new(0.0, 1.0).unwrap_or(Normal::standard());
    let d2 = ((spot / strike).ln() - 0.5 * annualized_vol * annualized_vol * years) / sigma_sqrt_t;
    normal.cdf(d2)
}
