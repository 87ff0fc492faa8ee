//! This crate implements forward error correction codecs for three families of binary codes:
//! convolutional codes, turbo codes (parallel concatenations of convolutional codes separated by
//! interleavers), and low-density parity-check (LDPC) codes.
//!
//! A code is described by an immutable structure built from encoder and decoder options
//! ([`convolutional::Structure`], [`turbo::Structure`], [`ldpc::Structure`]). A [`Codec`] wraps
//! any of them and encodes or decodes sequences of blocks on several threads. Decoding operates on
//! log-likelihood-ratio (LLR) values `ln(P(One) / P(Zero))`, so positive values favor `One`.
//!
//! Convolutional codes are decoded with the Viterbi algorithm (hard output) or the BCJR algorithm
//! (soft output), turbo codes with iterations between BCJR decoders, and LDPC codes with belief
//! propagation. The soft-decision decoders combine metrics exactly, with a linear approximation
//! of the correction term, or with the max-log (min-sum) approximation; see [`DecoderAlgorithm`].
//!
//! # Examples
//!
//! ```
//! use fecl::{ldpc, utils, Codec};
//! use fecl::ldpc::SparseBitMatrix;
//!
//! let checks = SparseBitMatrix::new(7, vec![vec![0, 1, 3, 4], vec![0, 2, 3, 5], vec![1, 2, 3, 6]])?;
//! let structure = ldpc::Structure::new(
//!     ldpc::EncoderOptions::new(checks),
//!     ldpc::DecoderOptions::default().iterations(10),
//! )?;
//! let codec = Codec::new(structure);
//! let msg = utils::random_bits(10 * codec.msg_size());
//! let parity = codec.encode(&msg)?;
//! let parity_llr = utils::bpsk_awgn_channel(&parity, 15.0);
//! let msg_llr = codec.soft_out_decode(&parity_llr)?;
//! assert_eq!(utils::bpsk_slicer(&msg_llr), msg);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(
    clippy::complexity,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    unused_import_braces,
    unused_qualifications
)]

pub mod bit_field;
pub mod codec;
pub mod convolutional;
pub mod ldpc;
pub mod metric;
pub mod permutation;
pub mod sim;
pub mod trellis;
pub mod turbo;
pub mod utils;

mod bp_decoder;
mod common;
mod map_decoder;
mod turbo_decoder;
mod viterbi;
mod work_group;

pub use codec::Codec;
pub use common::{Bit, DecoderAlgorithm, Error};
pub use permutation::Permutation;
pub use trellis::Trellis;
