pub mod analytic;
pub mod gbm;
pub mod montecarlo;
pub mod rng;
pub mod volatility;

/// Source of standard-normal variates feeding the path simulator.
/// next() must return a draw independent of all prior draws.
/// Implementations must be seedable so simulations are reproducible
/// in tests; production sources may seed from OS entropy.
pub trait NormalSource {
    /// One draw approximating N(0, 1).
    fn next(&mut self) -> f64;
}
