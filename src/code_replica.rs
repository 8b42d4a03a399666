use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeReplicaError {
    #[error("PRN {prn}: chip generator returned {got} chips, {expected} expected")]
    CodeLength { prn: u8, expected: usize, got: usize },
}

/// Spreading code of one PRN with a guard chip at each end: index 0 holds
/// the last chip and index `code_length + 1` the first one, so early and
/// late replicas can be read without wrapping.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeReplica {
    pub prn: u8,
    chips: Vec<f64>,
}

impl CodeReplica {
    pub fn new(prn: u8, code: &[i8]) -> Self {
        let mut chips: Vec<f64> = Vec::with_capacity(code.len() + 2);
        if let (Some(&first), Some(&last)) = (code.first(), code.last()) {
            chips.push(last as f64);
            chips.extend(code.iter().map(|&c| c as f64));
            chips.push(first as f64);
        }
        Self { prn, chips }
    }

    pub fn code_length(&self) -> usize {
        self.chips.len().saturating_sub(2)
    }

    /// Chips including both guard chips.
    pub fn chips(&self) -> &[f64] {
        &self.chips
    }

    /// Chip at `index` of the guarded sequence.
    #[inline]
    pub fn chip(&self, index: usize) -> f64 {
        self.chips[index]
    }
}

/// Per PRN code replicas shared read-only between tracking channels.
#[derive(Debug, Clone, Default)]
pub struct CodeReplicaTable {
    replicas: HashMap<u8, Arc<CodeReplica>>,
}

impl CodeReplicaTable {
    /// Builds guarded chip replicas for every PRN in `prns` from the
    /// sequences of `chip_generator`, which must be `code_length` chips long.
    pub fn new<G>(
        prns: impl IntoIterator<Item = u8>,
        code_length: usize,
        chip_generator: G,
    ) -> Result<Self, CodeReplicaError>
    where
        G: Fn(u8) -> Vec<i8>,
    {
        let mut table = Self::default();
        for prn in prns {
            let code = chip_generator(prn);
            if code.len() != code_length {
                return Err(CodeReplicaError::CodeLength {
                    prn,
                    expected: code_length,
                    got: code.len(),
                });
            }
            table
                .replicas
                .insert(prn, Arc::new(CodeReplica::new(prn, &code)));
        }
        Ok(table)
    }

    pub fn replica(&self, prn: u8) -> Option<Arc<CodeReplica>> {
        self.replicas.get(&prn).cloned()
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

/// Number of samples in one code period.
pub fn samples_per_code(f_sampling: f64, code_freq: f64, code_length: usize) -> usize {
    (f_sampling / (code_freq / code_length as f64)).round() as usize
}

/// Samples the chip sequence at `f_sampling`, sample `n` taking chip
/// `floor(n * code_freq / f_sampling) mod code_length`.
pub fn sample_code(
    prn: u8,
    code: &[i8],
    f_sampling: f64,
    code_freq: f64,
    code_length: usize,
) -> Result<Vec<f64>, CodeReplicaError> {
    if code.len() != code_length {
        return Err(CodeReplicaError::CodeLength {
            prn,
            expected: code_length,
            got: code.len(),
        });
    }
    let n_samples = samples_per_code(f_sampling, code_freq, code_length);
    Ok((0..n_samples)
        .map(|n| {
            let chip_ind = ((n as f64 * code_freq / f_sampling).floor() as usize) % code_length;
            code[chip_ind] as f64
        })
        .collect())
}
