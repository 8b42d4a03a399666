use log::{info, warn};
use rayon::prelude::*;
use std::fmt::{Display, Formatter};

use crate::cn0_estimator::Cn0Estimator;
use crate::comm_func::correlations_to_bits;
use crate::decoding::{decode_ephemeris, find_preambles, DecodeError, EphemerisSet, SubframeSync};
use crate::gps_constants::*;
use crate::pseudorange::{calculate_pseudoranges, Pseudorange};
use crate::tracking::TrackingResults;

/// Shortest tracking record a navigation solution can be derived from [ms].
pub const MIN_NAVIGATION_RECORD_MS: usize = 36000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStage {
    SignalTracking,
    MessageDecoding,
    PseudorangeCalculation,
}

impl Display for ProcessStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProcessStage::SignalTracking => "signal tracking",
            ProcessStage::MessageDecoding => "message decoding",
            ProcessStage::PseudorangeCalculation => "pseudorange calculation",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationParams {
    pub search_start_offset_ms: usize,
    pub nav_sol_period_ms: usize,
    pub start_offset_ms: f64,
    pub speed_of_light: f64,
    pub samples_per_code: f64,
}

impl Default for NavigationParams {
    fn default() -> Self {
        Self {
            search_start_offset_ms: 0,
            nav_sol_period_ms: 500,
            start_offset_ms: 68.802,
            speed_of_light: SPEED_OF_LIGHT_M_S,
            samples_per_code: 38192.0,
        }
    }
}

/// Decoded navigation data of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelNavigation {
    pub prn: u8,
    /// Prompt epoch (ms) of the first decoded subframe
    pub subframe_start: usize,
    /// Time of week at `subframe_start` [s]
    pub tow: f64,
    pub ephemeris: EphemerisSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementEpoch {
    /// Time of week of the epoch [s]
    pub tow: f64,
    pub pseudoranges: Vec<Pseudorange>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NavigationResults {
    pub channels: Vec<ChannelNavigation>,
    pub measurements: Vec<MeasurementEpoch>,
    /// Channels left out for lack of a preamble or of decodable bits
    pub excluded: Vec<u8>,
}

fn decode_channel(trk: &TrackingResults, sync: &SubframeSync) -> Option<ChannelNavigation> {
    let n_bits_ms = GPS_SUBFRAMES_PER_DECODE * GPS_SUBFRAME_MS;
    let start = sync.subframe_start;
    // One extra bit in front for D30*
    if start < GPS_L1_CA_BIT_PERIOD_MS || start + n_bits_ms > trk.epochs.len() {
        warn!(
            "PRN {}: record of {} ms ends before five subframes from {} ms",
            trk.prn,
            trk.epochs.len(),
            start
        );
        return None;
    }
    let i_prompt: Vec<f64> = trk.epochs[start - GPS_L1_CA_BIT_PERIOD_MS..start + n_bits_ms]
        .iter()
        .map(|e| e.i_prompt)
        .collect();
    let decoded = correlations_to_bits(&i_prompt, false)
        .map_err(DecodeError::from)
        .and_then(|bits| {
            let bits: Vec<u8> = bits.iter().map(|&b| b as u8).collect();
            decode_ephemeris(&bits[1..], bits[0])
        });

    match decoded {
        Ok((ephemeris, tow)) => {
            let cn0 = Cn0Estimator::series(&trk.epochs);
            info!(
                "PRN {}: TOW {} s, week {}, subframes {:03b}, mean CN0 {:.1} dB-Hz",
                trk.prn,
                tow,
                ephemeris.week_number,
                ephemeris.subframes_seen,
                cn0.iter().sum::<f64>() / cn0.len() as f64
            );
            Some(ChannelNavigation {
                prn: trk.prn,
                subframe_start: start,
                tow,
                ephemeris,
            })
        }
        Err(e) => {
            warn!("PRN {}: navigation decoding failed: {}", trk.prn, e);
            None
        }
    }
}

/// Pseudoranges every `nav_sol_period_ms` from the latest subframe start,
/// while every channel still has prompt epochs.
fn measurement_epochs(
    tracking: &[TrackingResults],
    channels: &[ChannelNavigation],
    params: &NavigationParams,
) -> Vec<MeasurementEpoch> {
    let records: Vec<(&ChannelNavigation, &TrackingResults)> = channels
        .iter()
        .filter_map(|ch| tracking.iter().find(|t| t.prn == ch.prn).map(|t| (ch, t)))
        .collect();
    let n_epochs = match records
        .iter()
        .map(|(ch, trk)| trk.epochs.len().saturating_sub(ch.subframe_start) / params.nav_sol_period_ms)
        .min()
    {
        Some(n) => n,
        None => return Vec::new(),
    };
    let tow_start = records[0].0.tow;

    (0..n_epochs)
        .map(|k| {
            let offset = k * params.nav_sol_period_ms;
            let sample_indices: Vec<(u8, f64)> = records
                .iter()
                .map(|(ch, trk)| (ch.prn, trk.epochs[ch.subframe_start + offset].absolute_sample as f64))
                .collect();
            MeasurementEpoch {
                tow: tow_start + offset as f64 / 1000.0,
                pseudoranges: calculate_pseudoranges(
                    &sample_indices,
                    params.samples_per_code,
                    params.start_offset_ms,
                    params.speed_of_light,
                ),
            }
        })
        .collect()
}

/// Turns tracking records into decoded ephemerides and periodic
/// pseudoranges.
pub fn post_navigation(
    tracking: &[TrackingResults],
    params: &NavigationParams,
) -> Result<NavigationResults, DecodeError> {
    let record_ms = tracking.iter().map(|t| t.epochs.len()).max().unwrap_or(0);
    if record_ms < MIN_NAVIGATION_RECORD_MS {
        return Err(DecodeError::RecordTooShort(record_ms, MIN_NAVIGATION_RECORD_MS));
    }
    if params.nav_sol_period_ms == 0 {
        return Err(DecodeError::InvalidInput(
            "navigation solution period must be positive".to_string(),
        ));
    }

    info!("{} of {} channels", ProcessStage::MessageDecoding, tracking.len());
    let syncs = find_preambles(tracking, params.search_start_offset_ms);
    let channels: Vec<ChannelNavigation> = syncs
        .par_iter()
        .filter_map(|sync| {
            let trk = tracking.iter().find(|t| t.prn == sync.prn)?;
            decode_channel(trk, sync)
        })
        .collect();
    let excluded: Vec<u8> = tracking
        .iter()
        .map(|t| t.prn)
        .filter(|prn| !channels.iter().any(|ch| ch.prn == *prn))
        .collect();

    info!("{} for {} channels", ProcessStage::PseudorangeCalculation, channels.len());
    let measurements = measurement_epochs(tracking, &channels, params);

    Ok(NavigationResults {
        channels,
        measurements,
        excluded,
    })
}
