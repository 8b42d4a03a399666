//! Synthetic signals and navigation messages for the unit tests.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::TAU;

use crate::decoding::parity::PARITY_EQUATIONS;
use crate::decoding::EphemerisSet;
use crate::gps_ca_prn::generate_ca_code;
use crate::gps_constants::*;
use crate::loop_filter::{calculate_loop_coefficients, LoopFilter};
use crate::tracking::{ChannelState, CorrelationEpoch, TrackingResults, TrackingState};

pub struct SignalSpec {
    pub prn: u8,
    pub f_sampling: f64,
    pub f_if: f64,
    pub doppler_hz: f64,
    /// Sample at which a code period starts
    pub code_delay_samples: usize,
    pub amplitude: f64,
    pub noise_std: f64,
    /// Navigation bits (0/1), one per 20 code periods; empty for a pilot
    pub nav_bits: Vec<u8>,
    pub duration_ms: usize,
    pub seed: u64,
}

/// Real 8-bit IF samples of one satellite: `round(A * d * c * cos(2 pi f n / fs) + noise)`.
pub fn generate_if_signal(spec: &SignalSpec) -> Vec<i8> {
    let code = generate_ca_code(spec.prn);
    let code_len = code.len() as i64;
    let n_samples = (spec.duration_ms as f64 * spec.f_sampling / 1000.0).round() as usize;
    let carrier_freq = spec.f_if + spec.doppler_hz;
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let noise = Normal::new(0.0, spec.noise_std).unwrap();

    (0..n_samples)
        .map(|n| {
            let chips = (n as f64 - spec.code_delay_samples as f64) * GPS_L1_CA_CODE_RATE_CHIPS_PER_S
                / spec.f_sampling;
            let chip_count = chips.floor() as i64;
            let chip = code[chip_count.rem_euclid(code_len) as usize] as f64;
            let data = if spec.nav_bits.is_empty() {
                1.0
            } else {
                let bit_ind = chip_count
                    .div_euclid(code_len * GPS_L1_CA_BIT_PERIOD_MS as i64)
                    .clamp(0, spec.nav_bits.len() as i64 - 1) as usize;
                if spec.nav_bits[bit_ind] == 1 {
                    1.0
                } else {
                    -1.0
                }
            };
            let phase = TAU * carrier_freq * n as f64 / spec.f_sampling;
            let value = spec.amplitude * data * chip * phase.cos() + noise.sample(&mut rng);
            value.round().clamp(-128.0, 127.0) as i8
        })
        .collect()
}

/// Writes the low `len` bits of `value` MSB first at `start`.
pub fn put_bits(bits: &mut [u8], start: usize, len: usize, value: i64) {
    for k in 0..len {
        bits[start + k] = ((value >> (len - 1 - k)) & 1) as u8;
    }
}

/// Writes a field split over two words: the high `first.1` bits at `first.0`,
/// the remaining low bits at `second.0`.
fn put_split(bits: &mut [u8], first: (usize, usize), second: (usize, usize), value: i64) {
    put_bits(bits, first.0, first.1, value >> second.1);
    put_bits(bits, second.0, second.1, value);
}

fn quantize(value: f64, scale: f64) -> i64 {
    (value / scale).round() as i64
}

/// Source data (before parity encoding) of subframes 1 to 5.
pub fn subframe_source_bits(eph: &EphemerisSet, subframe_id: u8, tow_count: u32) -> [u8; 300] {
    let mut sf = [0u8; 300];
    // TLM word
    for (k, &p) in GPS_CA_PREAMBLE.iter().enumerate() {
        sf[k] = (p > 0) as u8;
    }
    // HOW
    put_bits(&mut sf, 30, 17, tow_count as i64);
    put_bits(&mut sf, 49, 3, subframe_id as i64);

    let p31 = 2f64.powi(-31);
    let p43pi = 2f64.powi(-43) * GPS_PI;
    let p31pi = p31 * GPS_PI;
    match subframe_id {
        1 => {
            put_bits(&mut sf, 60, 10, eph.week_number as i64);
            put_bits(&mut sf, 72, 4, eph.accuracy as i64);
            put_bits(&mut sf, 76, 6, eph.health as i64);
            put_split(&mut sf, (82, 2), (210, 8), eph.iodc as i64);
            put_bits(&mut sf, 196, 8, quantize(eph.t_gd, p31));
            put_bits(&mut sf, 218, 16, quantize(eph.t_oc, 16.0));
            put_bits(&mut sf, 240, 8, quantize(eph.a_f2, 2f64.powi(-55)));
            put_bits(&mut sf, 248, 16, quantize(eph.a_f1, 2f64.powi(-43)));
            put_bits(&mut sf, 270, 22, quantize(eph.a_f0, p31));
        }
        2 => {
            put_bits(&mut sf, 60, 8, eph.iode_sf2 as i64);
            put_bits(&mut sf, 68, 16, quantize(eph.c_rs, 2f64.powi(-5)));
            put_bits(&mut sf, 90, 16, quantize(eph.delta_n, p43pi));
            put_split(&mut sf, (106, 8), (120, 24), quantize(eph.m_0, p31pi));
            put_bits(&mut sf, 150, 16, quantize(eph.c_uc, 2f64.powi(-29)));
            put_split(&mut sf, (166, 8), (180, 24), quantize(eph.e, 2f64.powi(-33)));
            put_bits(&mut sf, 210, 16, quantize(eph.c_us, 2f64.powi(-29)));
            put_split(&mut sf, (226, 8), (240, 24), quantize(eph.sqrt_a, 2f64.powi(-19)));
            put_bits(&mut sf, 270, 16, quantize(eph.t_oe, 16.0));
        }
        3 => {
            put_bits(&mut sf, 60, 16, quantize(eph.c_ic, 2f64.powi(-29)));
            put_split(&mut sf, (76, 8), (90, 24), quantize(eph.omega_0, p31pi));
            put_bits(&mut sf, 120, 16, quantize(eph.c_is, 2f64.powi(-29)));
            put_split(&mut sf, (136, 8), (150, 24), quantize(eph.i_0, p31pi));
            put_bits(&mut sf, 180, 16, quantize(eph.c_rc, 2f64.powi(-5)));
            put_split(&mut sf, (196, 8), (210, 24), quantize(eph.omega, p31pi));
            put_bits(&mut sf, 240, 24, quantize(eph.omega_dot, p43pi));
            put_bits(&mut sf, 270, 8, eph.iode_sf3 as i64);
            put_bits(&mut sf, 278, 14, quantize(eph.i_dot, p43pi));
        }
        _ => {
            // Almanac pages are not decoded; fill with a fixed pattern
            for w in 2..10 {
                put_bits(&mut sf, 30 * w, 22, 0x2A5A5A + w as i64);
            }
        }
    }
    sf
}

fn parity_bits(d29_star: u8, d30_star: u8, data: &[u8]) -> [u8; 6] {
    let mut parity = [0u8; 6];
    for (p, (context, indices)) in parity.iter_mut().zip(PARITY_EQUATIONS.iter()) {
        let seed = if *context == 0 { d29_star } else { d30_star };
        *p = indices.iter().fold(seed, |acc, &k| acc ^ data[k]);
    }
    parity
}

/// Encodes one 30-bit word; returns the transmitted bits.
fn encode_word(d29_star: u8, d30_star: u8, data: &[u8]) -> [u8; 30] {
    let mut word = [0u8; 30];
    for k in 0..24 {
        word[k] = data[k] ^ d30_star;
    }
    word[24..].copy_from_slice(&parity_bits(d29_star, d30_star, data));
    word
}

/// Parity encodes subframes, chaining D29*/D30* across words. The last two
/// data bits of the HOW and of word 10 are solved so that the word ends in
/// two zeros.
pub fn encode_subframes(subframes: &[[u8; 300]], d29_star: u8, d30_star: u8) -> Vec<u8> {
    let (mut d29, mut d30) = (d29_star, d30_star);
    let mut out = Vec::with_capacity(subframes.len() * 300);
    for sf in subframes {
        for w in 0..10 {
            let mut data = [0u8; 24];
            data.copy_from_slice(&sf[30 * w..30 * w + 24]);
            let word = if w == 1 || w == 9 {
                (0..4u8)
                    .map(|t| {
                        data[22] = t >> 1;
                        data[23] = t & 1;
                        encode_word(d29, d30, &data)
                    })
                    .find(|word| word[28] == 0 && word[29] == 0)
                    .unwrap()
            } else {
                encode_word(d29, d30, &data)
            };
            d29 = word[28];
            d30 = word[29];
            out.extend_from_slice(&word);
        }
    }
    out
}

/// Transmitted bit stream of `n_subframes` consecutive subframes starting at
/// `first_id`, the first one beginning at `6 * tow_count` seconds.
pub fn nav_message(eph: &EphemerisSet, first_id: u8, tow_count: u32, n_subframes: usize) -> Vec<u8> {
    let subframes: Vec<[u8; 300]> = (0..n_subframes)
        .map(|k| {
            let id = (first_id as usize - 1 + k) % 5 + 1;
            subframe_source_bits(eph, id as u8, tow_count + k as u32 + 1)
        })
        .collect();
    encode_subframes(&subframes, 0, 0)
}

/// Prompt correlations of a bit stream, 20 per bit, a logical one mapping
/// to `+amplitude`.
pub fn bits_to_prompt(bits: &[u8], amplitude: f64, noise_std: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, noise_std).unwrap();
    bits.iter()
        .flat_map(|&b| std::iter::repeat(if b == 1 { amplitude } else { -amplitude }).take(20))
        .map(|x| x + noise.sample(&mut rng))
        .collect()
}

/// An ephemeris whose values are exact multiples of their scale factors.
pub fn sample_ephemeris() -> EphemerisSet {
    let p31pi = 2f64.powi(-31) * GPS_PI;
    let p43pi = 2f64.powi(-43) * GPS_PI;
    EphemerisSet {
        week_number: 1011,
        accuracy: 2,
        health: 0,
        t_gd: -5.0 * 2f64.powi(-31),
        iodc: 0x2F3,
        t_oc: 453_600.0,
        a_f2: 0.0,
        a_f1: -3.0 * 2f64.powi(-43),
        a_f0: 123_456.0 * 2f64.powi(-31),
        iode_sf2: 0xF3,
        c_rs: -1234.0 * 2f64.powi(-5),
        delta_n: 12_345.0 * p43pi,
        m_0: -1_234_567_890.0 * p31pi,
        c_uc: -4321.0 * 2f64.powi(-29),
        e: 98_765_432.0 * 2f64.powi(-33),
        c_us: 7654.0 * 2f64.powi(-29),
        sqrt_a: 2_702_222_222.0 * 2f64.powi(-19),
        t_oe: 453_600.0,
        c_ic: 77.0 * 2f64.powi(-29),
        omega_0: 987_654_321.0 * p31pi,
        c_is: -88.0 * 2f64.powi(-29),
        i_0: 654_321_987.0 * p31pi,
        c_rc: 8765.0 * 2f64.powi(-5),
        omega: -555_444_333.0 * p31pi,
        omega_dot: -8_000.0 * p43pi,
        iode_sf3: 0xF3,
        i_dot: 1200.0 * p43pi,
        subframes_seen: 0,
    }
}

/// Tracking results carrying the given prompt correlations, epoch `k`
/// starting at sample `first_sample + k * samples_per_code`.
pub fn results_from_prompt(
    prn: u8,
    i_prompt: &[f64],
    first_sample: u64,
    samples_per_code: u64,
) -> TrackingResults {
    let epochs: Vec<CorrelationEpoch> = i_prompt
        .iter()
        .enumerate()
        .map(|(k, &i_p)| CorrelationEpoch {
            i_prompt: i_p,
            carrier_freq: 9.548e6,
            code_freq: GPS_L1_CA_CODE_RATE_CHIPS_PER_S,
            absolute_sample: first_sample + k as u64 * samples_per_code,
            ..CorrelationEpoch::default()
        })
        .collect();
    let coef = calculate_loop_coefficients(2.0, 0.7, 1.0);
    TrackingResults {
        prn,
        status: TrackingState::Tracking,
        final_state: ChannelState {
            prn,
            code_freq: GPS_L1_CA_CODE_RATE_CHIPS_PER_S,
            rem_code_phase: 0.0,
            carrier_freq: 9.548e6,
            carrier_freq_basis: 9.548e6,
            rem_carrier_phase: 0.0,
            code_filter: LoopFilter::new(coef, 0.001),
            carrier_filter: LoopFilter::new(coef, 0.001),
            sample_offset: first_sample + epochs.len() as u64 * samples_per_code,
            loop_count: epochs.len(),
        },
        epochs,
    }
}
