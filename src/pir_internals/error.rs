use std::{error::Error, fmt::Display};

/// Failure modes of the PIR engine. All of these are non-recoverable
/// programming or configuration faults: there is no retry policy anywhere in
/// this crate, every failure propagates immediately to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SimplePirError {
    /// Shapes of two matrix operands disagree; carries both shapes as
    /// `(rows, cols)` pairs.
    DimensionMismatch { lhs: (u64, u64), rhs: (u64, u64) },
    /// An index or coordinate lies beyond the valid bound.
    OutOfRange { index: u64, bound: u64 },
    /// Invalid or unsupported parameter combination (compression basis and
    /// factor, plaintext vs. ciphertext modulus, database size vs. chosen
    /// dimensions).
    ConfigurationError(String),
    /// The LWE parameter table holds no row for the requested
    /// (dimension, sample-count, modulus) triple.
    ParameterNotFound { n: u64, samples: u64, logq: u64 },
}

impl Display for SimplePirError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DimensionMismatch { lhs, rhs } => {
                write!(f, "Dimension mismatch: {}-by-{} vs. {}-by-{}", lhs.0, lhs.1, rhs.0, rhs.1)
            }
            Self::OutOfRange { index, bound } => write!(f, "Index '{}' is out of range: bound is '{}'", index, bound),
            Self::ConfigurationError(msg) => write!(f, "Bad configuration: {}", msg),
            Self::ParameterNotFound { n, samples, logq } => {
                write!(f, "No known LWE parameters for n = {}, samples = {}, logq = {}", n, samples, logq)
            }
        }
    }
}

impl Error for SimplePirError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
