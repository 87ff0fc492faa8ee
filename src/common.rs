//! Types needed in multiple modules

use serde::{Deserialize, Serialize};

/// Enumeration of binary symbol values
#[derive(Clone, Eq, PartialEq, Hash, Debug, Copy, Default, Deserialize, Serialize)]
pub enum Bit {
    /// Binary symbol `0`
    #[default]
    Zero = 0,
    /// Binary symbol `1`
    One = 1,
}

impl Bit {
    /// Returns hard decision on an LLR value (nonnegative values map to `One`).
    #[must_use]
    pub fn from_llr(llr: f64) -> Self {
        Self::from(llr >= 0.0)
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value {
            Bit::One
        } else {
            Bit::Zero
        }
    }
}

impl From<Bit> for bool {
    fn from(bit: Bit) -> Self {
        bit == Bit::One
    }
}

impl From<Bit> for usize {
    fn from(bit: Bit) -> Self {
        bit as usize
    }
}

/// Custom error type
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid input error
    #[error("{0}")]
    InvalidInput(String),
    /// File read/write error
    #[error("{0}")]
    FileReadWriteError(#[from] std::io::Error),
    /// Serde read/write error
    #[error("{0}")]
    SerdeReadWriteError(#[from] serde_json::Error),
}

/// Enumeration of metric algebras used by the soft-decision decoders
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub enum DecoderAlgorithm {
    /// Exact log-sum-exp (or tanh-domain box-plus)
    Exact,
    /// Log-sum-exp with a table-based linear correction term
    Linear,
    /// Max-log approximation (min-sum for LDPC codes)
    #[default]
    Approximate,
}

impl DecoderAlgorithm {
    /// Returns the name of the variant.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            DecoderAlgorithm::Exact => "Exact",
            DecoderAlgorithm::Linear => "Linear",
            DecoderAlgorithm::Approximate => "Approximate",
        }
    }
}

impl std::fmt::Display for DecoderAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} decoding", self.name())
    }
}

/// Returns error if `len` is not a positive multiple of `block_size`, and number of blocks
/// otherwise.
pub(crate) fn block_count(len: usize, block_size: usize, what: &str) -> Result<usize, Error> {
    if block_size == 0 || len % block_size != 0 {
        return Err(Error::InvalidInput(format!(
            "Invalid size for {what} (expected a multiple of {block_size}, found {len})"
        )));
    }
    Ok(len / block_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_conversions() {
        assert_eq!(Bit::from(true), Bit::One);
        assert_eq!(Bit::from(false), Bit::Zero);
        assert!(bool::from(Bit::One));
        assert_eq!(usize::from(Bit::One), 1);
        assert_eq!(Bit::from_llr(0.0), Bit::One);
        assert_eq!(Bit::from_llr(-0.01), Bit::Zero);
    }

    #[test]
    fn test_decoder_algorithm_display() {
        assert_eq!(DecoderAlgorithm::default(), DecoderAlgorithm::Approximate);
        assert_eq!(DecoderAlgorithm::Linear.to_string(), "Linear decoding");
    }

    #[test]
    fn test_block_count() {
        assert_eq!(block_count(0, 4, "message").unwrap(), 0);
        assert_eq!(block_count(12, 4, "message").unwrap(), 3);
        assert!(block_count(10, 4, "message").is_err());
        assert!(block_count(10, 0, "message").is_err());
    }
}
