use byteorder::ReadBytesExt;
use rustfft::num_complex::Complex64;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Layout of the recorded int8 samples.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// One real value per sample
    #[default]
    Real,
    /// Interleaved I and Q values
    Complex,
}

impl SampleFormat {
    pub fn values_per_sample(self) -> usize {
        match self {
            SampleFormat::Real => 1,
            SampleFormat::Complex => 2,
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("short read at sample {offset}: requested {requested} samples, {available} available")]
    ShortRead {
        offset: u64,
        requested: usize,
        available: usize,
    },
    #[error("sample source lock poisoned")]
    Poisoned,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Offset addressed access to a sample stream. Every read is positioned, so
/// channels tracking the same stream never share a cursor.
pub trait SampleSource: Send + Sync {
    /// Reads `count` samples starting at sample `offset`.
    fn read(&self, offset: u64, count: usize) -> Result<Vec<Complex64>, SourceError>;

    /// Total number of samples in the stream.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_available(total: u64, offset: u64, count: usize) -> Result<(), SourceError> {
    let available = total.saturating_sub(offset);
    if available < count as u64 {
        return Err(SourceError::ShortRead {
            offset,
            requested: count,
            available: available as usize,
        });
    }
    Ok(())
}

fn to_complex(raw: &[i8], format: SampleFormat) -> Vec<Complex64> {
    match format {
        SampleFormat::Real => raw
            .iter()
            .map(|&x| Complex64::new(x as f64, 0.0))
            .collect(),
        SampleFormat::Complex => raw
            .chunks_exact(2)
            .map(|iq| Complex64::new(iq[0] as f64, iq[1] as f64))
            .collect(),
    }
}

/// Recording of int8 samples on disk.
pub struct FileSource {
    reader: Mutex<BufReader<File>>,
    format: SampleFormat,
    total_samples: u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P, format: SampleFormat) -> Result<Self, SourceError> {
        let f = File::open(path)?;
        let n_bytes = f.metadata()?.len();
        Ok(Self {
            reader: Mutex::new(BufReader::new(f)),
            format,
            total_samples: n_bytes / format.values_per_sample() as u64,
        })
    }
}

impl SampleSource for FileSource {
    fn read(&self, offset: u64, count: usize) -> Result<Vec<Complex64>, SourceError> {
        check_available(self.total_samples, offset, count)?;
        let values_per_sample = self.format.values_per_sample();
        let mut raw = vec![0i8; count * values_per_sample];
        {
            let mut reader = self.reader.lock().map_err(|_| SourceError::Poisoned)?;
            reader.seek(SeekFrom::Start(offset * values_per_sample as u64))?;
            reader.read_i8_into(&mut raw)?;
        }
        Ok(to_complex(&raw, self.format))
    }

    fn len(&self) -> u64 {
        self.total_samples
    }
}

/// In-memory recording shared between channels.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[i8]>,
    format: SampleFormat,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[i8]>>, format: SampleFormat) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }
}

impl SampleSource for MemorySource {
    fn read(&self, offset: u64, count: usize) -> Result<Vec<Complex64>, SourceError> {
        check_available(self.len(), offset, count)?;
        let values_per_sample = self.format.values_per_sample();
        let start = offset as usize * values_per_sample;
        let end = start + count * values_per_sample;
        Ok(to_complex(&self.data[start..end], self.format))
    }

    fn len(&self) -> u64 {
        (self.data.len() / self.format.values_per_sample()) as u64
    }
}
