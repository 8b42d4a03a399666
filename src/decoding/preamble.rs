use log::{debug, info, warn};
use once_cell::sync::Lazy;
use rayon::prelude::*;

use super::parity::parity_check;
use crate::comm_func::correlations_to_bits;
use crate::fft::cross_correlate_valid;
use crate::gps_constants::*;
use crate::tracking::{TrackingResults, TrackingState};

/// Minimum |correlation| of a preamble candidate; 160 for a clean match.
pub const PREAMBLE_CORRELATION_THRESHOLD: f64 = 153.0;
/// Prompt history needed before a preamble: D29* and D30* of the previous word.
const PREVIOUS_BITS_MS: usize = 2 * GPS_L1_CA_BIT_PERIOD_MS;
/// TLM and HOW words.
const TLM_HOW_MS: usize = 2 * GPS_WORD_BITS * GPS_L1_CA_BIT_PERIOD_MS;

/// Preamble bits repeated over each 20 ms bit.
static PREAMBLE_MS: Lazy<Vec<f64>> = Lazy::new(|| {
    GPS_CA_PREAMBLE
        .iter()
        .flat_map(|&b| std::iter::repeat(b as f64).take(GPS_CA_TELEMETRY_SYMBOLS_PER_BIT))
        .collect()
});

/// Subframe synchronisation of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubframeSync {
    pub prn: u8,
    /// Prompt epoch (ms) where the first validated preamble begins
    pub subframe_start: usize,
}

/// Locates the first subframe start in a prompt correlation series.
///
/// A candidate is a lag whose hard-limited correlation with the preamble
/// reaches the threshold, has a second candidate one subframe later, and
/// whose TLM and HOW words pass the parity check.
pub fn find_subframe_start(i_prompt: &[f64], search_start_offset: usize) -> Option<usize> {
    let len = i_prompt.len();
    if len < TLM_HOW_MS + PREVIOUS_BITS_MS {
        return None;
    }

    let signs: Vec<f64> = i_prompt
        .iter()
        .map(|&x| {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }
        })
        .collect();
    let corr: Vec<f64> = cross_correlate_valid(&signs, &PREAMBLE_MS)
        .iter()
        .map(|c| c.round())
        .collect();

    let first = search_start_offset.max(PREVIOUS_BITS_MS);
    let last = (len - TLM_HOW_MS).min(corr.len());
    if first >= last {
        return None;
    }
    let candidates: Vec<usize> = (first..last)
        .filter(|&k| corr[k].abs() >= PREAMBLE_CORRELATION_THRESHOLD)
        .collect();
    debug!("{} preamble candidates", candidates.len());

    candidates.iter().copied().find(|&k| {
        candidates.binary_search(&(k + GPS_SUBFRAME_MS)).is_ok()
            && tlm_how_parity_ok(&i_prompt[k - PREVIOUS_BITS_MS..k + TLM_HOW_MS])
    })
}

/// Parity of the TLM and HOW words, `corrs` starting two bits before the TLM.
fn tlm_how_parity_ok(corrs: &[f64]) -> bool {
    let bits = match correlations_to_bits(corrs, true) {
        Ok(bits) => bits,
        Err(_) => return false,
    };
    let word = |start: usize| -> Option<[i8; 32]> { bits.get(start..start + 32)?.try_into().ok() };
    match (word(0), word(GPS_WORD_BITS)) {
        (Some(tlm), Some(how)) => parity_check(&tlm) != 0 && parity_check(&how) != 0,
        _ => false,
    }
}

/// Finds the subframe start of every channel still tracking. Channels without
/// a validated preamble are left out of the returned list.
pub fn find_preambles(tracking: &[TrackingResults], search_start_offset: usize) -> Vec<SubframeSync> {
    tracking
        .par_iter()
        .filter(|trk| trk.status != TrackingState::Dropped)
        .filter_map(|trk| {
            match find_subframe_start(&trk.i_prompt(), search_start_offset) {
                Some(start) => {
                    info!("PRN {}: subframe starts at {} ms", trk.prn, start);
                    Some(SubframeSync {
                        prn: trk.prn,
                        subframe_start: start,
                    })
                }
                None => {
                    warn!("PRN {}: no valid preamble, channel excluded", trk.prn);
                    None
                }
            }
        })
        .collect()
}
