//! # Helpers for simulating codes over a BPSK-AWGN channel
//!
//! LLR values follow the convention of the rest of the crate: `ln(P(One) / P(Zero))`, so that
//! positive values favor `One`. Bits map to BPSK symbols as `Zero -> -1.0` and `One -> +1.0`.
//!
//! # Examples
//!
//! ```
//! use fecl::utils;
//!
//! let bits = utils::random_bits(40);
//! let bits_llr = utils::bpsk_awgn_channel(&bits, 10.0);
//! let bits_hat = utils::bpsk_slicer(&bits_llr);
//! assert!(utils::error_count(&bits_hat, &bits) <= bits.len());
//! ```

use rand::Rng;
use rand_distr::StandardNormal;

use crate::Bit;

/// Returns given number of random bits.
#[must_use]
pub fn random_bits(num_bits: usize) -> Vec<Bit> {
    random_bits_with(&mut rand::rng(), num_bits)
}

/// Returns given number of random bits drawn from a given generator.
pub fn random_bits_with<R: Rng + ?Sized>(rng: &mut R, num_bits: usize) -> Vec<Bit> {
    (0 .. num_bits).map(|_| Bit::from(rng.random_bool(0.5))).collect()
}

/// Returns LLR values at BPSK-AWGN channel output corresponding to given input bits.
///
/// # Parameters
///
/// - `bits`: Bits to be transmitted over the channel.
///
/// - `es_over_n0_db`: Ratio (dB) of symbol energy to noise power spectral density. With unit
///   energy symbols, the noise variance is `0.5 / 10f64.powf(0.1 * es_over_n0_db)`.
#[must_use]
pub fn bpsk_awgn_channel(bits: &[Bit], es_over_n0_db: f64) -> Vec<f64> {
    bpsk_awgn_channel_with(&mut rand::rng(), bits, es_over_n0_db)
}

/// Returns LLR values at BPSK-AWGN channel output, with noise drawn from a given generator.
pub fn bpsk_awgn_channel_with<R: Rng + ?Sized>(
    rng: &mut R,
    bits: &[Bit],
    es_over_n0_db: f64,
) -> Vec<f64> {
    let es_over_n0 = 10f64.powf(0.1 * es_over_n0_db);
    let noise_std = (0.5 / es_over_n0).sqrt();
    bits.iter()
        .map(|&b| if b == Bit::One { 1.0 } else { -1.0 })
        .map(|x: f64| 4.0 * es_over_n0 * (x + noise_std * rng.sample::<f64, _>(StandardNormal)))
        .collect()
}

/// Returns hard decisions on LLR values (nonnegative values map to `One`).
#[must_use]
pub fn bpsk_slicer(llr: &[f64]) -> Vec<Bit> {
    llr.iter().map(|&x| Bit::from_llr(x)).collect()
}

/// Returns number of positions in which a sequence differs from a reference sequence.
///
/// If the two have different lengths, the longer one is truncated to the length of the shorter.
pub fn error_count<T: PartialEq>(seq: &[T], ref_seq: &[T]) -> usize {
    ref_seq.iter().zip(seq).filter(|&(x, y)| x != y).count()
}

/// Returns number of blocks of given size in which two sequences differ.
///
/// A trailing partial block is ignored.
pub fn block_error_count<T: PartialEq>(seq: &[T], ref_seq: &[T], block_size: usize) -> usize {
    if block_size == 0 {
        return 0;
    }
    ref_seq
        .chunks_exact(block_size)
        .zip(seq.chunks_exact(block_size))
        .filter(|&(x, y)| x != y)
        .count()
}
