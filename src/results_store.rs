//! Binary files holding tracking and navigation results.

use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::data_process::{ChannelNavigation, MeasurementEpoch, NavigationResults};
use crate::decoding::EphemerisSet;
use crate::loop_filter::{calculate_loop_coefficients, LoopFilter};
use crate::pseudorange::Pseudorange;
use crate::tracking::{ChannelState, CorrelationEpoch, TrackingParams, TrackingResults, TrackingState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("binary format error: {0}")]
    Binary(#[from] binrw::Error),
    #[error("invalid record: {0}")]
    Invalid(String),
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little, magic = b"GTRK")]
struct TrackingFile {
    n_channels: u32,
    #[br(count = n_channels)]
    channels: Vec<TrackingRecord>,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
struct TrackingRecord {
    prn: u8,
    status: u8,
    n_epochs: u32,
    #[br(count = n_epochs)]
    epochs: Vec<CorrelationEpoch>,
    final_state: ChannelStateRecord,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
struct ChannelStateRecord {
    code_freq: f64,
    rem_code_phase: f64,
    carrier_freq: f64,
    carrier_freq_basis: f64,
    rem_carrier_phase: f64,
    code_nco: f64,
    code_error: f64,
    carrier_nco: f64,
    carrier_error: f64,
    sample_offset: u64,
    loop_count: u64,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little, magic = b"GNAV")]
struct NavigationFile {
    n_channels: u32,
    #[br(count = n_channels)]
    channels: Vec<ChannelNavigationRecord>,
    n_epochs: u32,
    #[br(count = n_epochs)]
    measurements: Vec<MeasurementRecord>,
    n_excluded: u32,
    #[br(count = n_excluded)]
    excluded: Vec<u8>,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
struct ChannelNavigationRecord {
    prn: u8,
    subframe_start: u64,
    tow: f64,
    ephemeris: EphemerisSet,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
struct MeasurementRecord {
    tow: f64,
    n_ranges: u32,
    #[br(count = n_ranges)]
    pseudoranges: Vec<Pseudorange>,
}

fn status_code(status: TrackingState) -> u8 {
    match status {
        TrackingState::Initializing => 0,
        TrackingState::Tracking => 1,
        TrackingState::Dropped => 2,
    }
}

fn status_from_code(code: u8) -> Result<TrackingState, StoreError> {
    match code {
        0 => Ok(TrackingState::Initializing),
        1 => Ok(TrackingState::Tracking),
        2 => Ok(TrackingState::Dropped),
        other => Err(StoreError::Invalid(format!("unknown tracking status {}", other))),
    }
}

fn length_u32(len: usize) -> Result<u32, StoreError> {
    u32::try_from(len).map_err(|_| StoreError::Invalid(format!("{} entries exceed the format", len)))
}

pub fn save_tracking_results<P: AsRef<Path>>(path: P, results: &[TrackingResults]) -> Result<(), StoreError> {
    let channels = results
        .iter()
        .map(|r| -> Result<TrackingRecord, StoreError> {
            let s = &r.final_state;
            Ok(TrackingRecord {
                prn: r.prn,
                status: status_code(r.status),
                n_epochs: length_u32(r.epochs.len())?,
                epochs: r.epochs.clone(),
                final_state: ChannelStateRecord {
                    code_freq: s.code_freq,
                    rem_code_phase: s.rem_code_phase,
                    carrier_freq: s.carrier_freq,
                    carrier_freq_basis: s.carrier_freq_basis,
                    rem_carrier_phase: s.rem_carrier_phase,
                    code_nco: s.code_filter.nco,
                    code_error: s.code_filter.old_error,
                    carrier_nco: s.carrier_filter.nco,
                    carrier_error: s.carrier_filter.old_error,
                    sample_offset: s.sample_offset,
                    loop_count: s.loop_count as u64,
                },
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;
    let file = TrackingFile {
        n_channels: length_u32(channels.len())?,
        channels,
    };

    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_le(&file)?;
    writer.flush()?;
    info!("tracking results of {} channels saved to {}", results.len(), path.as_ref().display());
    Ok(())
}

/// Loads tracking results; `params` restores the loop filter coefficients,
/// which are not stored.
pub fn load_tracking_results<P: AsRef<Path>>(
    path: P,
    params: &TrackingParams,
) -> Result<Vec<TrackingResults>, StoreError> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let file: TrackingFile = reader.read_le()?;

    let code_coef = calculate_loop_coefficients(params.dll_noise_bandwidth, params.dll_damping_ratio, params.dll_gain);
    let carrier_coef =
        calculate_loop_coefficients(params.pll_noise_bandwidth, params.pll_damping_ratio, params.pll_gain);
    file.channels
        .into_iter()
        .map(|rec| -> Result<TrackingResults, StoreError> {
            let s = rec.final_state;
            let mut code_filter = LoopFilter::new(code_coef, params.integration_time_s);
            code_filter.nco = s.code_nco;
            code_filter.old_error = s.code_error;
            let mut carrier_filter = LoopFilter::new(carrier_coef, params.integration_time_s);
            carrier_filter.nco = s.carrier_nco;
            carrier_filter.old_error = s.carrier_error;
            Ok(TrackingResults {
                prn: rec.prn,
                status: status_from_code(rec.status)?,
                epochs: rec.epochs,
                final_state: ChannelState {
                    prn: rec.prn,
                    code_freq: s.code_freq,
                    rem_code_phase: s.rem_code_phase,
                    carrier_freq: s.carrier_freq,
                    carrier_freq_basis: s.carrier_freq_basis,
                    rem_carrier_phase: s.rem_carrier_phase,
                    code_filter,
                    carrier_filter,
                    sample_offset: s.sample_offset,
                    loop_count: s.loop_count as usize,
                },
            })
        })
        .collect()
}

pub fn save_navigation_results<P: AsRef<Path>>(path: P, results: &NavigationResults) -> Result<(), StoreError> {
    let channels: Vec<ChannelNavigationRecord> = results
        .channels
        .iter()
        .map(|ch| ChannelNavigationRecord {
            prn: ch.prn,
            subframe_start: ch.subframe_start as u64,
            tow: ch.tow,
            ephemeris: ch.ephemeris,
        })
        .collect();
    let measurements = results
        .measurements
        .iter()
        .map(|m| -> Result<MeasurementRecord, StoreError> {
            Ok(MeasurementRecord {
                tow: m.tow,
                n_ranges: length_u32(m.pseudoranges.len())?,
                pseudoranges: m.pseudoranges.clone(),
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;
    let file = NavigationFile {
        n_channels: length_u32(channels.len())?,
        channels,
        n_epochs: length_u32(measurements.len())?,
        measurements,
        n_excluded: length_u32(results.excluded.len())?,
        excluded: results.excluded.clone(),
    };

    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_le(&file)?;
    writer.flush()?;
    info!("navigation results saved to {}", path.as_ref().display());
    Ok(())
}

pub fn load_navigation_results<P: AsRef<Path>>(path: P) -> Result<NavigationResults, StoreError> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let file: NavigationFile = reader.read_le()?;
    Ok(NavigationResults {
        channels: file
            .channels
            .into_iter()
            .map(|ch| ChannelNavigation {
                prn: ch.prn,
                subframe_start: ch.subframe_start as usize,
                tow: ch.tow,
                ephemeris: ch.ephemeris,
            })
            .collect(),
        measurements: file
            .measurements
            .into_iter()
            .map(|m| MeasurementEpoch {
                tow: m.tow,
                pseudoranges: m.pseudoranges,
            })
            .collect(),
        excluded: file.excluded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::{results_from_prompt, sample_ephemeris};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("gnss_sdr_nav_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_tracking_results_file() {
        let params = TrackingParams::default();
        let mut first = results_from_prompt(5, &[1.0, -2.0, 3.5], 100, 38192);
        first.epochs[1].q_prompt = 0.25;
        first.final_state.code_filter = LoopFilter::new(
            calculate_loop_coefficients(params.dll_noise_bandwidth, params.dll_damping_ratio, params.dll_gain),
            params.integration_time_s,
        );
        first.final_state.code_filter.nco = 1.5;
        first.final_state.carrier_filter = LoopFilter::new(
            calculate_loop_coefficients(params.pll_noise_bandwidth, params.pll_damping_ratio, params.pll_gain),
            params.integration_time_s,
        );
        first.final_state.carrier_filter.old_error = -0.01;
        let mut second = first.clone();
        second.prn = 9;
        second.status = TrackingState::Dropped;
        second.epochs.clear();

        let path = temp_path("tracking.bin");
        save_tracking_results(&path, &[first.clone(), second.clone()]).unwrap();
        let loaded = load_tracking_results(&path, &params).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, vec![first, second]);
    }

    #[test]
    fn test_navigation_results_file() {
        let results = NavigationResults {
            channels: vec![ChannelNavigation {
                prn: 12,
                subframe_start: 3007,
                tow: 3006.0,
                ephemeris: sample_ephemeris(),
            }],
            measurements: vec![MeasurementEpoch {
                tow: 3006.5,
                pseudoranges: vec![Pseudorange {
                    prn: 12,
                    range_m: 20_627_000.25,
                }],
            }],
            excluded: vec![4, 30],
        };
        let path = temp_path("navigation.bin");
        save_navigation_results(&path, &results).unwrap();
        let loaded = load_navigation_results(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, results);
    }

    #[test]
    fn test_wrong_magic() {
        let path = temp_path("wrong_magic.bin");
        std::fs::write(&path, b"GNAV\0\0\0\0").unwrap();
        let result = load_tracking_results(&path, &TrackingParams::default());
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(StoreError::Binary(_))));
    }
}
