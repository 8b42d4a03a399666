/// Time constants of a second order loop filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopFilterCoefficients {
    pub tau1: f64,
    pub tau2: f64,
}

/// Computes the loop filter time constants from the noise bandwidth [Hz],
/// the damping ratio and the loop gain (0.25 for a 1 ms Costas loop, 1.0 for
/// the DLL).
///
/// Bandwidth and damping ratio must be strictly positive.
pub fn calculate_loop_coefficients(
    noise_bw: f64,
    damping_ratio: f64,
    gain: f64,
) -> LoopFilterCoefficients {
    debug_assert!(noise_bw > 0.0 && damping_ratio > 0.0);
    let wn: f64 = noise_bw * 8.0 * damping_ratio / (4.0 * damping_ratio.powi(2) + 1.0);
    LoopFilterCoefficients {
        tau1: gain / (wn * wn),
        tau2: 2.0 * damping_ratio / wn,
    }
}

/// Proportional-integral filter driving an NCO; keeps the previous NCO
/// output and discriminator value between integrations.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopFilter {
    coefficients: LoopFilterCoefficients,
    integration_time_s: f64,
    pub nco: f64,
    pub old_error: f64,
}

impl LoopFilter {
    pub fn new(coefficients: LoopFilterCoefficients, integration_time_s: f64) -> Self {
        Self {
            coefficients,
            integration_time_s,
            nco: 0.0,
            old_error: 0.0,
        }
    }

    pub fn coefficients(&self) -> LoopFilterCoefficients {
        self.coefficients
    }

    /// Feeds one discriminator output and returns the updated NCO command.
    pub fn apply(&mut self, error: f64) -> f64 {
        let LoopFilterCoefficients { tau1, tau2 } = self.coefficients;
        self.nco += (tau2 / tau1) * (error - self.old_error)
            + error * (self.integration_time_s / tau1);
        self.old_error = error;
        self.nco
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dll_coefficients() {
        let coef = calculate_loop_coefficients(2.0, 0.7, 0.25);
        assert!((coef.tau1 - 0.017461734693877552).abs() < 1e-12);
        assert!((coef.tau2 - 0.37).abs() < 1e-12);
    }

    #[test]
    fn test_coefficients_positive() {
        for bw in [0.1, 1.0, 2.0, 25.0, 100.0] {
            for zeta in [0.3, 0.7, 1.0, 2.0] {
                for gain in [0.25, 1.0] {
                    let coef = calculate_loop_coefficients(bw, zeta, gain);
                    assert!(coef.tau1 > 0.0 && coef.tau2 > 0.0, "bw {} zeta {}", bw, zeta);
                }
            }
        }
    }

    #[test]
    fn test_filter_recurrence() {
        let coef = calculate_loop_coefficients(25.0, 0.7, 0.25);
        let mut filter = LoopFilter::new(coef, 0.001);
        let first = filter.apply(0.1);
        let expected = coef.tau2 / coef.tau1 * 0.1 + 0.1 * 0.001 / coef.tau1;
        assert!((first - expected).abs() < 1e-12);

        // A constant error only adds the integral term
        let second = filter.apply(0.1);
        assert!((second - first - 0.1 * 0.001 / coef.tau1).abs() < 1e-9);
        assert_eq!(filter.old_error, 0.1);

        // Zero error holds the NCO once the proportional step is undone
        let third = filter.apply(0.0);
        assert!((third - (second - coef.tau2 / coef.tau1 * 0.1)).abs() < 1e-9);
    }
}
