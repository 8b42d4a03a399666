use thiserror::Error;

use crate::gps_constants::GPS_CA_TELEMETRY_SYMBOLS_PER_BIT;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid length {0}: expected a multiple of {1}")]
    InvalidLength(usize, usize),
}

fn check_binary(bits: &[u8]) -> Result<(), BitError> {
    if let Some(ind) = bits.iter().position(|&b| b > 1) {
        return Err(BitError::InvalidInput(format!(
            "element {} at position {} is not a binary digit",
            bits[ind], ind
        )));
    }
    Ok(())
}

/// Interprets `bits` (MSB first) as an unsigned integer.
pub fn bin2dec(bits: &[u8]) -> Result<u64, BitError> {
    check_binary(bits)?;
    if bits.len() > 64 {
        return Err(BitError::InvalidInput(format!(
            "{} bits do not fit in an unsigned 64-bit integer",
            bits.len()
        )));
    }
    Ok(bits.iter().fold(0u64, |acc, &b| (acc << 1) | b as u64))
}

/// Interprets `bits` (MSB first) as a two's complement integer, the first
/// bit being the sign.
pub fn twos_comp2dec(bits: &[u8]) -> Result<i64, BitError> {
    check_binary(bits)?;
    let (sign, magnitude) = match bits.split_first() {
        Some(split) => split,
        None => return Err(BitError::InvalidInput("empty bit group".to_string())),
    };
    if bits.len() > 63 {
        return Err(BitError::InvalidInput(format!(
            "{} bits do not fit in a signed 64-bit integer",
            bits.len()
        )));
    }
    let value = bin2dec(magnitude)? as i64;
    Ok(value - ((*sign as i64) << magnitude.len()))
}

/// Sums each block of 20 prompt correlations (one navigation bit) and hard
/// limits the sum.
///
/// With `signed` the bits are -1/0/+1, otherwise 0/1 where a zero sum
/// rounds up to 1.
pub fn correlations_to_bits(corrs: &[f64], signed: bool) -> Result<Vec<i8>, BitError> {
    if corrs.len() % GPS_CA_TELEMETRY_SYMBOLS_PER_BIT != 0 {
        return Err(BitError::InvalidLength(
            corrs.len(),
            GPS_CA_TELEMETRY_SYMBOLS_PER_BIT,
        ));
    }
    Ok(corrs
        .chunks_exact(GPS_CA_TELEMETRY_SYMBOLS_PER_BIT)
        .map(|block| {
            let sum: f64 = block.iter().sum();
            let bit = if sum > 0.0 {
                1
            } else if sum < 0.0 {
                -1
            } else {
                0
            };
            if signed {
                bit
            } else {
                ((bit as f64 + 1.0) / 2.0).round() as i8
            }
        })
        .collect())
}
