#![allow(dead_code)]

pub const GPS_L1_FREQ_HZ: f64 = 1.57542e9;
pub const GPS_L1_CA_CODE_RATE_CHIPS_PER_S: f64 = 1.023e6; // chips/s
pub const GPS_L1_CA_CODE_LENGTH_CHIPS: f64 = 1023.0; // chips
pub const GPS_L1_CA_CODE_PERIOD_S: f64 = 1.0e-3; // seconds
pub const GPS_L1_CA_CODE_PERIOD_MS: u16 = 1; // ms
pub const GPS_L1_CA_BIT_PERIOD_MS: usize = 20; // ms
pub const GPS_PRN_MAX: u8 = 32;

pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;
// Semi-circle to radian factor used by ICD-200C
pub const GPS_PI: f64 = 3.1415926535898;

// Navigation message
pub const GPS_CA_PREAMBLE: [i8; 8] = [1, -1, -1, -1, 1, -1, 1, 1];
pub const GPS_CA_PREAMBLE_LENGTH_BITS: usize = 8;
pub const GPS_CA_PREAMBLE_LENGTH_SYMBOLS: usize = 160;
pub const GPS_CA_TELEMETRY_SYMBOLS_PER_BIT: usize = 20;

pub const GPS_WORD_BITS: usize = 30;
pub const GPS_WORD_DATA_BITS: usize = 24;
pub const GPS_SUBFRAME_BITS: usize = 300;
pub const GPS_SUBFRAME_MS: usize = 6000;
pub const GPS_SUBFRAMES_PER_DECODE: usize = 5;

// Tracking loop
pub const LOOP_UPDATE_RATE_HZ: f64 = 1000.0;
pub const PROGRESS_REPORT_INTERVAL_MS: usize = 50;
