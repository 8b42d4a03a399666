use serde::Deserialize;
use thiserror::Error;

use crate::code_replica::samples_per_code;
use crate::data_process::NavigationParams;
use crate::gps_constants;
use crate::stream::SampleFormat;
use crate::tracking::{ChannelInitState, TrackingParams};

pub static APP_CONFIG_FILE: &str = "config/app_config.toml";

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub receiver: ReceiverConfig,
    pub tracking: TrackingConfig,
    pub navigation: NavigationConfig,
    pub output: OutputConfig,
    /// Acquisition results, one entry per satellite
    pub channels: Vec<ChannelInitState>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub file_name: String,
    pub sample_format: SampleFormat,
    pub skip_samples: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            file_name: "data/GPSdata-DiscreteComponents-fs38_192-if9_548.bin".to_string(),
            sample_format: SampleFormat::Real,
            skip_samples: 0,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReceiverConfig {
    pub sampling_freq_hz: f64,
    pub intermediate_freq_hz: f64,
    pub code_freq_basis_hz: f64,
    pub code_length_chips: usize,
    pub ms_to_process: usize,
    pub number_of_channels: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            sampling_freq_hz: 38.192e6,
            intermediate_freq_hz: 9.548e6,
            code_freq_basis_hz: gps_constants::GPS_L1_CA_CODE_RATE_CHIPS_PER_S,
            code_length_chips: gps_constants::GPS_L1_CA_CODE_LENGTH_CHIPS as usize,
            ms_to_process: 37000,
            number_of_channels: 8,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    pub dll_noise_bandwidth_hz: f64,
    pub dll_damping_ratio: f64,
    pub dll_loop_gain: f64,
    pub pll_noise_bandwidth_hz: f64,
    pub pll_damping_ratio: f64,
    pub pll_loop_gain: f64,
    pub early_late_spacing_chips: f64,
    pub integration_time_s: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            dll_noise_bandwidth_hz: 2.0,
            dll_damping_ratio: 0.7,
            dll_loop_gain: 1.0,
            pll_noise_bandwidth_hz: 25.0,
            pll_damping_ratio: 0.7,
            pll_loop_gain: 0.25,
            early_late_spacing_chips: 0.5,
            integration_time_s: gps_constants::GPS_L1_CA_CODE_PERIOD_S,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NavigationConfig {
    pub search_start_offset_ms: usize,
    pub nav_sol_period_ms: usize,
    pub start_offset_ms: f64,
    pub speed_of_light_m_s: f64,
    pub acquisition_threshold: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            search_start_offset_ms: 0,
            nav_sol_period_ms: 500,
            start_offset_ms: 68.802,
            speed_of_light_m_s: gps_constants::SPEED_OF_LIGHT_M_S,
            acquisition_threshold: 2.5,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub tracking_results_file: String,
    pub navigation_results_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tracking_results_file: "trackingResults.bin".to_string(),
            navigation_results_file: "navigationResults.bin".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(String, #[source] std::io::Error),
    #[error("failed to parse toml file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn from_toml_file(file_path: &str) -> Result<Self, AppConfigError> {
        let config_str = std::fs::read_to_string(file_path)
            .map_err(|e| AppConfigError::Read(file_path.to_string(), e))?;
        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, AppConfigError> {
        let config: AppConfig = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppConfigError> {
        self.tracking_params()
            .validate()
            .map_err(|e| AppConfigError::Invalid(e.to_string()))?;
        let ca_code_length = gps_constants::GPS_L1_CA_CODE_LENGTH_CHIPS as usize;
        if self.receiver.code_length_chips != ca_code_length {
            return Err(AppConfigError::Invalid(format!(
                "code_length_chips {} differs from the {} chips of the C/A code",
                self.receiver.code_length_chips, ca_code_length
            )));
        }
        if self.receiver.intermediate_freq_hz < 0.0 {
            return Err(AppConfigError::Invalid(format!(
                "intermediate frequency {} Hz is negative",
                self.receiver.intermediate_freq_hz
            )));
        }
        if self.navigation.nav_sol_period_ms == 0 {
            return Err(AppConfigError::Invalid(
                "nav_sol_period_ms must be positive".to_string(),
            ));
        }
        if !(self.navigation.speed_of_light_m_s > 0.0) {
            return Err(AppConfigError::Invalid(
                "speed_of_light_m_s must be positive".to_string(),
            ));
        }
        if let Some(ch) = self
            .channels
            .iter()
            .find(|ch| !(1..=gps_constants::GPS_PRN_MAX).contains(&ch.prn))
        {
            return Err(AppConfigError::Invalid(format!(
                "PRN {} outside 1..={}",
                ch.prn,
                gps_constants::GPS_PRN_MAX
            )));
        }
        Ok(())
    }

    pub fn tracking_params(&self) -> TrackingParams {
        TrackingParams {
            f_sampling: self.receiver.sampling_freq_hz,
            f_if: self.receiver.intermediate_freq_hz,
            code_freq_basis: self.receiver.code_freq_basis_hz,
            code_length: self.receiver.code_length_chips,
            dll_noise_bandwidth: self.tracking.dll_noise_bandwidth_hz,
            dll_damping_ratio: self.tracking.dll_damping_ratio,
            dll_gain: self.tracking.dll_loop_gain,
            pll_noise_bandwidth: self.tracking.pll_noise_bandwidth_hz,
            pll_damping_ratio: self.tracking.pll_damping_ratio,
            pll_gain: self.tracking.pll_loop_gain,
            early_late_spacing: self.tracking.early_late_spacing_chips,
            integration_time_s: self.tracking.integration_time_s,
            ms_to_process: self.receiver.ms_to_process,
            skip_samples: self.input.skip_samples,
        }
    }

    pub fn navigation_params(&self) -> NavigationParams {
        NavigationParams {
            search_start_offset_ms: self.navigation.search_start_offset_ms,
            nav_sol_period_ms: self.navigation.nav_sol_period_ms,
            start_offset_ms: self.navigation.start_offset_ms,
            speed_of_light: self.navigation.speed_of_light_m_s,
            samples_per_code: samples_per_code(
                self.receiver.sampling_freq_hz,
                self.receiver.code_freq_basis_hz,
                self.receiver.code_length_chips,
            ) as f64,
        }
    }
}
