use binrw::{BinRead, BinWrite};
use crossbeam_channel::Sender;
use itertools::izip;
use log::{debug, info};
use rustfft::num_complex::Complex64;
use serde::Deserialize;
use std::f64::consts::TAU;
use std::sync::Arc;
use thiserror::Error;

use crate::code_replica::CodeReplica;
use crate::gps_constants;
use crate::loop_filter::{calculate_loop_coefficients, LoopFilter};
use crate::stream::{SampleSource, SourceError};

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("PRN {prn}: insufficient samples after {ms} ms: {source}")]
    InsufficientSamples {
        prn: u8,
        ms: usize,
        #[source]
        source: SourceError,
    },
    #[error("no code replica for PRN {0}")]
    UnknownPrn(u8),
    #[error("block of {got} samples given, {expected} expected")]
    BlockLength { expected: usize, got: usize },
    #[error("PRN {0}: channel was dropped")]
    ChannelDropped(u8),
    #[error("invalid tracking parameter: {0}")]
    InvalidParameter(String),
}

/// Acquisition outcome of one satellite, used once to start its tracking.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    #[default]
    Idle,
    Tracking,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ChannelInitState {
    pub prn: u8,
    /// Doppler offset from the intermediate frequency [Hz]
    pub doppler_hz: f64,
    /// Code start within the first code period [samples]
    pub code_phase_samples: u64,
    #[serde(default)]
    pub status: ChannelStatus,
    /// Acquisition peak metric, when the acquisition reports one
    #[serde(default)]
    pub peak_metric: Option<f64>,
}

/// Picks the channels to track: acquired channels whose peak metric (when
/// known) reaches `threshold`, strongest first, at most `max_channels`.
pub fn select_channels(
    acquired: &[ChannelInitState],
    threshold: f64,
    max_channels: usize,
) -> Vec<ChannelInitState> {
    let mut channels: Vec<ChannelInitState> = acquired
        .iter()
        .filter(|c| c.status == ChannelStatus::Tracking)
        .filter(|c| c.peak_metric.map_or(true, |m| m >= threshold))
        .cloned()
        .collect();
    channels.sort_by(|a, b| {
        b.peak_metric
            .unwrap_or(f64::INFINITY)
            .total_cmp(&a.peak_metric.unwrap_or(f64::INFINITY))
    });
    channels.truncate(max_channels);
    channels
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingParams {
    pub f_sampling: f64,
    pub f_if: f64,
    pub code_freq_basis: f64,
    pub code_length: usize,
    pub dll_noise_bandwidth: f64,
    pub dll_damping_ratio: f64,
    pub dll_gain: f64,
    pub pll_noise_bandwidth: f64,
    pub pll_damping_ratio: f64,
    pub pll_gain: f64,
    /// Early-late correlator spacing [chips]
    pub early_late_spacing: f64,
    /// Summation interval of both loops [s]
    pub integration_time_s: f64,
    pub ms_to_process: usize,
    /// Samples skipped at the start of the recording
    pub skip_samples: u64,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            f_sampling: 38.192e6,
            f_if: 9.548e6,
            code_freq_basis: gps_constants::GPS_L1_CA_CODE_RATE_CHIPS_PER_S,
            code_length: gps_constants::GPS_L1_CA_CODE_LENGTH_CHIPS as usize,
            dll_noise_bandwidth: 2.0,
            dll_damping_ratio: 0.7,
            dll_gain: 1.0,
            pll_noise_bandwidth: 25.0,
            pll_damping_ratio: 0.7,
            pll_gain: 0.25,
            early_late_spacing: 0.5,
            integration_time_s: gps_constants::GPS_L1_CA_CODE_PERIOD_S,
            ms_to_process: 37000,
            skip_samples: 0,
        }
    }
}

impl TrackingParams {
    pub fn validate(&self) -> Result<(), TrackingError> {
        let positive = [
            ("f_sampling", self.f_sampling),
            ("code_freq_basis", self.code_freq_basis),
            ("dll_noise_bandwidth", self.dll_noise_bandwidth),
            ("dll_damping_ratio", self.dll_damping_ratio),
            ("dll_gain", self.dll_gain),
            ("pll_noise_bandwidth", self.pll_noise_bandwidth),
            ("pll_damping_ratio", self.pll_damping_ratio),
            ("pll_gain", self.pll_gain),
            ("integration_time_s", self.integration_time_s),
        ];
        if let Some((name, val)) = positive.iter().find(|(_, v)| !(*v > 0.0)) {
            return Err(TrackingError::InvalidParameter(format!(
                "{} must be positive, got {}",
                name, val
            )));
        }
        if self.code_length == 0 {
            return Err(TrackingError::InvalidParameter(
                "code_length must be positive".to_string(),
            ));
        }
        // Guard chips cover at most one chip of early/late offset
        if !(self.early_late_spacing > 0.0 && self.early_late_spacing < 1.0) {
            return Err(TrackingError::InvalidParameter(format!(
                "early_late_spacing must lie in (0, 1) chips, got {}",
                self.early_late_spacing
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Initializing,
    Tracking,
    Dropped,
}

/// Mutable state of one tracking channel, carried from one integration to
/// the next.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    pub prn: u8,
    pub code_freq: f64,
    /// Residual code phase [chips], in [0, code_length)
    pub rem_code_phase: f64,
    pub carrier_freq: f64,
    /// Acquired carrier frequency the PLL corrections apply to
    pub carrier_freq_basis: f64,
    /// Residual carrier phase [cycles], in [0, 1)
    pub rem_carrier_phase: f64,
    pub code_filter: LoopFilter,
    pub carrier_filter: LoopFilter,
    /// Next sample to read from the source
    pub sample_offset: u64,
    pub loop_count: usize,
}

/// Correlator outputs and loop values of one 1 ms integration.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Default)]
#[brw(little)]
pub struct CorrelationEpoch {
    pub i_early: f64,
    pub q_early: f64,
    pub i_prompt: f64,
    pub q_prompt: f64,
    pub i_late: f64,
    pub q_late: f64,
    pub dll_discriminator: f64,
    pub dll_filtered: f64,
    pub pll_discriminator: f64,
    pub pll_filtered: f64,
    /// Carrier frequency used over this epoch [Hz]
    pub carrier_freq: f64,
    /// Code frequency used over this epoch [chips/s]
    pub code_freq: f64,
    /// Source sample at which the epoch began
    pub absolute_sample: u64,
    pub rem_code_phase: f64,
    pub rem_carrier_phase: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingResults {
    pub prn: u8,
    pub status: TrackingState,
    pub epochs: Vec<CorrelationEpoch>,
    pub final_state: ChannelState,
}

impl TrackingResults {
    pub fn i_prompt(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.i_prompt).collect()
    }

    pub fn q_prompt(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.q_prompt).collect()
    }

    pub fn absolute_samples(&self) -> Vec<u64> {
        self.epochs.iter().map(|e| e.absolute_sample).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingProgress {
    pub prn: u8,
    pub processed_ms: usize,
    pub total_ms: usize,
}

impl TrackingProgress {
    pub fn fraction(&self) -> f64 {
        if self.total_ms == 0 {
            1.0
        } else {
            self.processed_ms as f64 / self.total_ms as f64
        }
    }
}

fn wrap_cycle(phase: f64) -> f64 {
    let phase = phase.rem_euclid(1.0);
    if phase >= 1.0 {
        0.0
    } else {
        phase
    }
}

/// Code (DLL) and carrier (Costas PLL) tracking loop of one channel.
pub struct TrackingLoop {
    params: TrackingParams,
    replica: Arc<CodeReplica>,
    state: ChannelState,
    status: TrackingState,
}

impl TrackingLoop {
    pub fn new(
        init: &ChannelInitState,
        replica: Arc<CodeReplica>,
        params: &TrackingParams,
    ) -> Result<Self, TrackingError> {
        params.validate()?;
        if replica.prn != init.prn {
            return Err(TrackingError::UnknownPrn(init.prn));
        }
        if replica.code_length() != params.code_length {
            return Err(TrackingError::InvalidParameter(format!(
                "PRN {} replica holds {} chips, code length is {}",
                init.prn,
                replica.code_length(),
                params.code_length
            )));
        }

        let code_coef = calculate_loop_coefficients(
            params.dll_noise_bandwidth,
            params.dll_damping_ratio,
            params.dll_gain,
        );
        let carrier_coef = calculate_loop_coefficients(
            params.pll_noise_bandwidth,
            params.pll_damping_ratio,
            params.pll_gain,
        );
        let carrier_freq = params.f_if + init.doppler_hz;

        Ok(Self {
            params: params.clone(),
            replica,
            state: ChannelState {
                prn: init.prn,
                code_freq: params.code_freq_basis,
                rem_code_phase: 0.0,
                carrier_freq,
                carrier_freq_basis: carrier_freq,
                rem_carrier_phase: 0.0,
                code_filter: LoopFilter::new(code_coef, params.integration_time_s),
                carrier_filter: LoopFilter::new(carrier_coef, params.integration_time_s),
                sample_offset: params.skip_samples + init.code_phase_samples,
                loop_count: 0,
            },
            status: TrackingState::Initializing,
        })
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn status(&self) -> TrackingState {
        self.status
    }

    /// Stops the channel; further integrations are refused.
    pub fn drop_channel(&mut self) {
        info!("PRN {}: channel dropped after {} ms", self.state.prn, self.state.loop_count);
        self.status = TrackingState::Dropped;
    }

    /// Number of samples covering the rest of the current code period.
    pub fn block_length(&self) -> Result<usize, TrackingError> {
        let code_phase_step = self.state.code_freq / self.params.f_sampling;
        if !(code_phase_step > 0.0) {
            return Err(TrackingError::InvalidParameter(format!(
                "PRN {}: code frequency {} is not positive",
                self.state.prn, self.state.code_freq
            )));
        }
        Ok(((self.params.code_length as f64 - self.state.rem_code_phase) / code_phase_step).ceil()
            as usize)
    }

    /// Reads the next code period from `source` and integrates it.
    pub fn step(&mut self, source: &dyn SampleSource) -> Result<CorrelationEpoch, TrackingError> {
        if self.status == TrackingState::Dropped {
            return Err(TrackingError::ChannelDropped(self.state.prn));
        }
        let blk_size = self.block_length()?;
        let samples = source
            .read(self.state.sample_offset, blk_size)
            .map_err(|e| TrackingError::InsufficientSamples {
                prn: self.state.prn,
                ms: self.state.loop_count,
                source: e,
            })?;
        self.process_block(&samples)
    }

    /// Integrates one code period of samples, whose length must equal
    /// [`TrackingLoop::block_length`], and updates both loops.
    pub fn process_block(
        &mut self,
        samples: &[Complex64],
    ) -> Result<CorrelationEpoch, TrackingError> {
        if self.status == TrackingState::Dropped {
            return Err(TrackingError::ChannelDropped(self.state.prn));
        }
        let blk_size = self.block_length()?;
        if samples.len() != blk_size {
            return Err(TrackingError::BlockLength {
                expected: blk_size,
                got: samples.len(),
            });
        }

        let f_sampling = self.params.f_sampling;
        let code_length = self.params.code_length as f64;
        let spacing = self.params.early_late_spacing;
        let code_freq = self.state.code_freq;
        let carrier_freq = self.state.carrier_freq;
        let rem_code_phase = self.state.rem_code_phase;
        let rem_carrier_phase = self.state.rem_carrier_phase;
        let absolute_sample = self.state.sample_offset;

        // Code replicas, indexed into the guarded chip sequence
        let code_phase_step = code_freq / f_sampling;
        let replica = &self.replica;
        let code_replica = |offset: f64| -> Vec<f64> {
            (0..blk_size)
                .map(|x| {
                    replica.chip((x as f64 * code_phase_step + rem_code_phase + offset).ceil() as usize)
                })
                .collect()
        };
        let ca_code_early = code_replica(-spacing);
        let ca_code_prompt = code_replica(0.0);
        let ca_code_late = code_replica(spacing);
        let rem_code_phase =
            blk_size as f64 * code_phase_step + rem_code_phase - code_length;

        // Carrier wipe-off
        let carrier_step = carrier_freq / f_sampling;
        let baseband: Vec<Complex64> = samples
            .iter()
            .enumerate()
            .map(|(x, s)| {
                let phase = TAU * (rem_carrier_phase + carrier_step * x as f64);
                s * Complex64::from_polar(1.0, -phase)
            })
            .collect();
        let rem_carrier_phase = wrap_cycle(rem_carrier_phase + carrier_step * blk_size as f64);

        let zero = Complex64::new(0.0, 0.0);
        let (early, prompt, late) = izip!(&baseband, &ca_code_early, &ca_code_prompt, &ca_code_late)
            .fold((zero, zero, zero), |(e, p, l), (b, ce, cp, cl)| {
                (e + b * ce, p + b * cp, l + b * cl)
            });

        // Costas discriminator [cycles]
        let carrier_error = if prompt.re == 0.0 {
            0.0
        } else {
            (prompt.im / prompt.re).atan() / TAU
        };
        let carrier_nco = self.state.carrier_filter.apply(carrier_error);

        // Normalised early minus late envelope discriminator [chips]
        let (early_mag, late_mag) = (early.norm(), late.norm());
        let code_error = if early_mag + late_mag == 0.0 {
            0.0
        } else {
            (early_mag - late_mag) / (early_mag + late_mag)
        };
        let code_nco = self.state.code_filter.apply(code_error);

        self.state.carrier_freq = self.state.carrier_freq_basis + carrier_nco;
        self.state.code_freq = self.params.code_freq_basis - code_nco;
        self.state.rem_code_phase = rem_code_phase;
        self.state.rem_carrier_phase = rem_carrier_phase;
        self.state.sample_offset += blk_size as u64;
        self.state.loop_count += 1;
        self.status = TrackingState::Tracking;

        Ok(CorrelationEpoch {
            i_early: early.re,
            q_early: early.im,
            i_prompt: prompt.re,
            q_prompt: prompt.im,
            i_late: late.re,
            q_late: late.im,
            dll_discriminator: code_error,
            dll_filtered: code_nco,
            pll_discriminator: carrier_error,
            pll_filtered: carrier_nco,
            carrier_freq,
            code_freq,
            absolute_sample,
            rem_code_phase,
            rem_carrier_phase,
        })
    }
}

/// Tracks one channel over `params.ms_to_process` code periods.
pub fn track_channel(
    init: &ChannelInitState,
    replica: Arc<CodeReplica>,
    source: &dyn SampleSource,
    params: &TrackingParams,
    progress: Option<&Sender<TrackingProgress>>,
) -> Result<TrackingResults, TrackingError> {
    let mut trk = TrackingLoop::new(init, replica, params)?;
    info!(
        "PRN {}: tracking from sample {} at {:.1} Hz",
        init.prn,
        trk.state().sample_offset,
        trk.state().carrier_freq
    );

    let mut epochs: Vec<CorrelationEpoch> = Vec::with_capacity(params.ms_to_process);
    for loop_cnt in 0..params.ms_to_process {
        if loop_cnt % gps_constants::PROGRESS_REPORT_INTERVAL_MS == 0 {
            let report = TrackingProgress {
                prn: init.prn,
                processed_ms: loop_cnt,
                total_ms: params.ms_to_process,
            };
            debug!(
                "PRN {}: {} of {} ms ({:.0}%)",
                init.prn,
                loop_cnt,
                params.ms_to_process,
                100.0 * report.fraction()
            );
            if let Some(tx) = progress {
                // A closed observer does not stop tracking
                let _ = tx.send(report);
            }
        }
        epochs.push(trk.step(source)?);
    }

    Ok(TrackingResults {
        prn: init.prn,
        status: trk.status(),
        epochs,
        final_state: trk.state().clone(),
    })
}
