//! Navigation message synchronisation and decoding.

pub mod ephemeris;
pub mod parity;
pub mod preamble;

use thiserror::Error;

use crate::comm_func::BitError;

pub use ephemeris::{decode_ephemeris, EphemerisSet};
pub use parity::parity_check;
pub use preamble::{find_preambles, find_subframe_start, SubframeSync};

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Bits(#[from] BitError),
    #[error("record of {0} ms is too short for navigation decoding, {1} ms needed")]
    RecordTooShort(usize, usize),
}
