use slice_ring_buf::SliceRB;

use crate::gps_constants::LOOP_UPDATE_RATE_HZ;
use crate::tracking::CorrelationEpoch;

/// Number of prompt correlations the moments are averaged over.
pub const CN0_WINDOW_LENGTH: usize = 200;
pub const CN0_MIN_DB_HZ: f64 = 10.0;
pub const CN0_MAX_DB_HZ: f64 = 60.0;

/// Moment method carrier-to-noise density estimator over a sliding window
/// of prompt correlations.
pub struct Cn0Estimator {
    /// Second and fourth moments of the prompt correlations in the window
    moments: SliceRB<(f64, f64)>,
    m2_sum: f64,
    m4_sum: f64,
    filled: usize,
    head: isize,
    loop_update_rate_hz: f64,
}

impl Default for Cn0Estimator {
    fn default() -> Self {
        Self::new(CN0_WINDOW_LENGTH, LOOP_UPDATE_RATE_HZ)
    }
}

impl Cn0Estimator {
    pub fn new(window_len: usize, loop_update_rate_hz: f64) -> Self {
        Self {
            moments: SliceRB::from_len(window_len.max(1)),
            m2_sum: 0.0,
            m4_sum: 0.0,
            filled: 0,
            head: 0,
            loop_update_rate_hz,
        }
    }

    /// Adds one prompt correlation and returns the CN0 estimate [dB-Hz].
    pub fn update(&mut self, i_prompt: f64, q_prompt: f64) -> f64 {
        let m2 = i_prompt * i_prompt + q_prompt * q_prompt;
        let m4 = m2 * m2;
        if self.filled == self.moments.len() {
            let (old_m2, old_m4) = self.moments[self.head];
            self.m2_sum -= old_m2;
            self.m4_sum -= old_m4;
        } else {
            self.filled += 1;
        }
        self.moments[self.head] = (m2, m4);
        self.m2_sum += m2;
        self.m4_sum += m4;
        self.head = self.moments.constrain(self.head + 1);

        let m2_mean = self.m2_sum / self.filled as f64;
        let m4_mean = self.m4_sum / self.filled as f64;
        let signal_power = (2.0 * m2_mean * m2_mean - m4_mean).max(0.0).sqrt();
        let noise_power = m2_mean - signal_power;

        if signal_power < noise_power * 1e-6 {
            return CN0_MAX_DB_HZ;
        }
        if noise_power <= 0.0 {
            return CN0_MIN_DB_HZ;
        }
        let cn0 = 10.0 * self.loop_update_rate_hz.log10() + 10.0 * (signal_power / noise_power).log10();
        num::clamp(cn0, CN0_MIN_DB_HZ, CN0_MAX_DB_HZ)
    }

    /// CN0 estimate after every epoch of a tracking record.
    pub fn series(epochs: &[CorrelationEpoch]) -> Vec<f64> {
        let mut estimator = Self::default();
        epochs
            .iter()
            .map(|e| estimator.update(e.i_prompt, e.q_prompt))
            .collect()
    }
}
