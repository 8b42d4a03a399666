use rustfft::{num_complex::Complex, num_complex::Complex64, Fft, FftNum, FftPlanner};
use std::sync::Arc;

pub struct FFT<T: FftNum> {
    fft: Arc<dyn Fft<T>>,
    ifft: Arc<dyn Fft<T>>,
    len: usize,
}

impl<T: FftNum> FFT<T> {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::<T>::new();
        let fft = planner.plan_fft_forward(len);
        let ifft = planner.plan_fft_inverse(len);
        Self { fft, ifft, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forward transform in place.
    pub fn execute(&self, input: &mut [Complex<T>]) {
        self.fft.process(input);
    }

    /// Inverse transform in place, scaled by `1 / len`.
    pub fn execute_inverse(&self, input: &mut [Complex<T>]) {
        self.ifft.process(input);
        let scale = T::from_usize(self.len).unwrap_or_else(T::one);
        input.iter_mut().for_each(|x| *x = *x / scale);
    }
}

/// Cross-correlation `r[m] = sum_n signal[n + m] * kernel[n]` for the lags
/// where `kernel` lies fully inside `signal`, computed through one forward
/// transform of each input.
pub fn cross_correlate_valid(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    if kernel.is_empty() || signal.len() < kernel.len() {
        return Vec::new();
    }
    let len = signal.len();
    let fft = FFT::<f64>::new(len);

    let mut signal_freq: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    let mut kernel_freq = vec![Complex64::new(0.0, 0.0); len];
    kernel_freq
        .iter_mut()
        .zip(kernel)
        .for_each(|(k, &x)| k.re = x);
    fft.execute(&mut signal_freq);
    fft.execute(&mut kernel_freq);

    let mut corr: Vec<Complex64> = signal_freq
        .iter()
        .zip(&kernel_freq)
        .map(|(s, k)| s * k.conj())
        .collect();
    fft.execute_inverse(&mut corr);
    corr[..=len - kernel.len()].iter().map(|c| c.re).collect()
}
