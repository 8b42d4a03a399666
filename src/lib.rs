#![doc = include_str!("../README.md")]

pub mod cn0_estimator;
pub mod code_replica;
pub mod comm_func;
pub mod config;
pub mod data_process;
pub mod decoding;
pub mod fft;
pub mod gps_ca_prn;
pub mod gps_constants;
pub mod loop_filter;
pub mod pseudorange;
pub mod results_store;
pub mod stream;
pub mod tracking;

#[cfg(test)]
mod test_utilities;

pub use crate::fft::FFT;
