pub mod samples_source;

pub use samples_source::{FileSource, MemorySource, SampleFormat, SampleSource, SourceError};
