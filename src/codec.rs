//! Block-parallel encoding and decoding for any supported code family
//!
//! A [`Codec`] wraps one code [`Structure`] and processes sequences made of whole blocks. Each
//! call splits its blocks into contiguous chunks, handled by fresh decoder workers on scoped
//! threads; results land at the same offsets as with sequential processing.
//!
//! # Examples
//!
//! ```
//! use fecl::codec::{Codec, Structure};
//! use fecl::convolutional::{self, DecoderOptions, EncoderOptions};
//! use fecl::{utils, Trellis};
//!
//! let trellis = Trellis::from_generators(&[3], &[vec![0o4, 0o5]], &[])?;
//! let structure = convolutional::Structure::new(
//!     EncoderOptions::new(trellis, 8),
//!     DecoderOptions::default(),
//! )?;
//! let codec = Codec::new(Structure::Convolutional(structure));
//! let msg = utils::random_bits(5 * codec.msg_size());
//! let parity = codec.encode(&msg)?;
//! assert!(codec.check(&parity)?);
//! let llr = utils::bpsk_awgn_channel(&parity, 20.0);
//! assert_eq!(codec.decode(&llr)?, msg);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use itertools::izip;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bp_decoder::BpDecoder;
use crate::common::block_count;
use crate::map_decoder::{MapDecoder, SoftOutputs};
use crate::metric::{
    ApproximateBoxSum, ApproximateLogSum, BoxSum, ExactBoxSum, ExactLogSum, LinearBoxSum,
    LinearLogSum, LogSum,
};
use crate::turbo_decoder::TurboDecoder;
use crate::viterbi::ViterbiDecoder;
use crate::work_group::{chunk_size, for_each_chunk};
use crate::{convolutional, ldpc, turbo, Bit, DecoderAlgorithm, Error, Permutation};

/// Enumeration of code structures
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum Structure {
    /// Convolutional code
    Convolutional(convolutional::Structure),
    /// Turbo code
    Turbo(turbo::Structure),
    /// Low-density parity-check code
    Ldpc(ldpc::Structure),
}

impl From<convolutional::Structure> for Structure {
    fn from(structure: convolutional::Structure) -> Self {
        Self::Convolutional(structure)
    }
}

impl From<turbo::Structure> for Structure {
    fn from(structure: turbo::Structure) -> Self {
        Self::Turbo(structure)
    }
}

impl From<ldpc::Structure> for Structure {
    fn from(structure: ldpc::Structure) -> Self {
        Self::Ldpc(structure)
    }
}

impl Structure {
    /// Returns name of the code family.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Convolutional(_) => "convolutional",
            Self::Turbo(_) => "turbo",
            Self::Ldpc(_) => "LDPC",
        }
    }

    /// Returns number of message bits per block.
    #[must_use]
    pub fn msg_size(&self) -> usize {
        match self {
            Self::Convolutional(structure) => structure.msg_size(),
            Self::Turbo(structure) => structure.msg_size(),
            Self::Ldpc(structure) => structure.msg_size(),
        }
    }

    /// Returns number of parity bits per block.
    #[must_use]
    pub fn parity_size(&self) -> usize {
        match self {
            Self::Convolutional(structure) => structure.parity_size(),
            Self::Turbo(structure) => structure.parity_size(),
            Self::Ldpc(structure) => structure.parity_size(),
        }
    }

    /// Returns number of extrinsic LLR values per block exchanged by a-posteriori decoding (one
    /// per message bit).
    #[must_use]
    pub fn extrinsic_size(&self) -> usize {
        self.msg_size()
    }

    /// Returns metric algebra of the decoders.
    #[must_use]
    pub fn algorithm(&self) -> DecoderAlgorithm {
        match self {
            Self::Convolutional(structure) => structure.algorithm(),
            Self::Turbo(structure) => structure.algorithm(),
            Self::Ldpc(structure) => structure.algorithm(),
        }
    }

    /// Encodes one block.
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer has the wrong length.
    pub fn encode(&self, msg: &[Bit], parity: &mut [Bit]) -> Result<(), Error> {
        match self {
            Self::Convolutional(structure) => structure.encode(msg, parity, None),
            Self::Turbo(structure) => structure.encode(msg, parity),
            Self::Ldpc(structure) => structure.encode(msg, parity),
        }
    }

    /// Returns whether a parity block is a valid codeword.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len()` is not `parity_size()`.
    pub fn check(&self, parity: &[Bit]) -> Result<bool, Error> {
        match self {
            Self::Convolutional(structure) => structure.check(parity),
            Self::Turbo(structure) => structure.check(parity),
            Self::Ldpc(structure) => structure.check(parity),
        }
    }

    /// Returns permutation selecting the transmitted parity bits.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are for another code family or are invalid.
    pub fn puncturing(&self, options: &PunctureOptions) -> Result<Permutation, Error> {
        match (self, options) {
            (Self::Convolutional(structure), PunctureOptions::Convolutional(options)) => {
                Ok(structure.puncturing(options))
            }
            (Self::Turbo(structure), PunctureOptions::Turbo(options)) => {
                structure.puncturing(options)
            }
            (Self::Ldpc(structure), PunctureOptions::Ldpc(options)) => {
                Ok(structure.puncturing(options))
            }
            _ => Err(Error::InvalidInput(format!(
                "Puncturing options don't apply to a {} code",
                self.name()
            ))),
        }
    }
}

/// Enumeration of puncturing patterns, one variant per code family
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum PunctureOptions {
    /// Pattern for a convolutional code
    Convolutional(convolutional::PunctureOptions),
    /// Pattern for a turbo code
    Turbo(turbo::PunctureOptions),
    /// Pattern for an LDPC code
    Ldpc(ldpc::PunctureOptions),
}

/// Hard-decision decoder of one block at a time
trait HardDecoder {
    fn decode_block(&mut self, parity: &[f64], msg: &mut [Bit]);
}

/// Soft-output decoder of one block at a time
trait SoftDecoder {
    fn so_decode_block(
        &mut self,
        parity: &[f64],
        extrinsic_in: Option<&[f64]>,
        msg: &mut [f64],
        extrinsic_out: Option<&mut [f64]>,
    );
}

impl HardDecoder for ViterbiDecoder<'_> {
    fn decode_block(&mut self, parity: &[f64], msg: &mut [Bit]) {
        self.decode(parity, msg);
    }
}

impl<L: LogSum> SoftDecoder for MapDecoder<'_, L> {
    fn so_decode_block(
        &mut self,
        parity: &[f64],
        extrinsic_in: Option<&[f64]>,
        msg: &mut [f64],
        extrinsic_out: Option<&mut [f64]>,
    ) {
        self.so_decode(
            parity,
            extrinsic_in,
            SoftOutputs {
                msg: Some(msg),
                syst: extrinsic_out,
                parity: None,
            },
        );
    }
}

impl<L: LogSum> HardDecoder for TurboDecoder<'_, L> {
    fn decode_block(&mut self, parity: &[f64], msg: &mut [Bit]) {
        TurboDecoder::decode_block(self, parity, msg);
    }
}

impl<L: LogSum> SoftDecoder for TurboDecoder<'_, L> {
    fn so_decode_block(
        &mut self,
        parity: &[f64],
        extrinsic_in: Option<&[f64]>,
        msg: &mut [f64],
        extrinsic_out: Option<&mut [f64]>,
    ) {
        TurboDecoder::so_decode_block(self, parity, extrinsic_in, msg, extrinsic_out);
    }
}

impl<B: BoxSum> HardDecoder for BpDecoder<'_, B> {
    fn decode_block(&mut self, parity: &[f64], msg: &mut [Bit]) {
        BpDecoder::decode_block(self, parity, msg);
    }
}

impl<B: BoxSum> SoftDecoder for BpDecoder<'_, B> {
    fn so_decode_block(
        &mut self,
        parity: &[f64],
        extrinsic_in: Option<&[f64]>,
        msg: &mut [f64],
        extrinsic_out: Option<&mut [f64]>,
    ) {
        BpDecoder::so_decode_block(self, parity, extrinsic_in, msg, extrinsic_out);
    }
}

/// Returns hard-decision decoder worker for a structure.
fn hard_decoder(structure: &Structure) -> Box<dyn HardDecoder + '_> {
    match structure {
        Structure::Convolutional(structure) => Box::new(ViterbiDecoder::new(structure)),
        Structure::Turbo(structure) => match structure.algorithm() {
            DecoderAlgorithm::Exact => Box::new(TurboDecoder::<ExactLogSum>::new(structure)),
            DecoderAlgorithm::Linear => Box::new(TurboDecoder::<LinearLogSum>::new(structure)),
            DecoderAlgorithm::Approximate => {
                Box::new(TurboDecoder::<ApproximateLogSum>::new(structure))
            }
        },
        Structure::Ldpc(structure) => match structure.algorithm() {
            DecoderAlgorithm::Exact => Box::new(BpDecoder::<ExactBoxSum>::new(structure)),
            DecoderAlgorithm::Linear => Box::new(BpDecoder::<LinearBoxSum>::new(structure)),
            DecoderAlgorithm::Approximate => {
                Box::new(BpDecoder::<ApproximateBoxSum>::new(structure))
            }
        },
    }
}

/// Returns soft-output decoder worker for a structure.
fn soft_decoder(structure: &Structure) -> Box<dyn SoftDecoder + '_> {
    match structure {
        Structure::Convolutional(structure) => match structure.algorithm() {
            DecoderAlgorithm::Exact => Box::new(MapDecoder::<ExactLogSum>::new(structure)),
            DecoderAlgorithm::Linear => Box::new(MapDecoder::<LinearLogSum>::new(structure)),
            DecoderAlgorithm::Approximate => {
                Box::new(MapDecoder::<ApproximateLogSum>::new(structure))
            }
        },
        Structure::Turbo(structure) => match structure.algorithm() {
            DecoderAlgorithm::Exact => Box::new(TurboDecoder::<ExactLogSum>::new(structure)),
            DecoderAlgorithm::Linear => Box::new(TurboDecoder::<LinearLogSum>::new(structure)),
            DecoderAlgorithm::Approximate => {
                Box::new(TurboDecoder::<ApproximateLogSum>::new(structure))
            }
        },
        Structure::Ldpc(structure) => match structure.algorithm() {
            DecoderAlgorithm::Exact => Box::new(BpDecoder::<ExactBoxSum>::new(structure)),
            DecoderAlgorithm::Linear => Box::new(BpDecoder::<LinearBoxSum>::new(structure)),
            DecoderAlgorithm::Approximate => {
                Box::new(BpDecoder::<ApproximateBoxSum>::new(structure))
            }
        },
    }
}

fn default_work_group_size() -> usize {
    4
}

/// LLR magnitude given to transmitted bits when checking a punctured block
const CHECK_LLR: f64 = 10.0;

/// Encoder and decoder for sequences of blocks of one code
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(try_from = "CodecOptions", into = "CodecOptions")]
pub struct Codec {
    structure: Structure,
    /// Selection of the transmitted parity bits, if punctured
    puncturing: Option<Permutation>,
    work_group_size: usize,
}

/// Serialized form of [`Codec`]
#[derive(Clone, Deserialize, Serialize)]
struct CodecOptions {
    structure: Structure,
    #[serde(default)]
    puncturing: Option<Permutation>,
    #[serde(default = "default_work_group_size")]
    work_group_size: usize,
}

impl TryFrom<CodecOptions> for Codec {
    type Error = Error;

    fn try_from(options: CodecOptions) -> Result<Self, Self::Error> {
        if let Some(puncturing) = &options.puncturing {
            if puncturing.input_size() != options.structure.parity_size() {
                return Err(Error::InvalidInput(format!(
                    "Puncturing selects from {} bits but the {} code has {} parity bits",
                    puncturing.input_size(),
                    options.structure.name(),
                    options.structure.parity_size()
                )));
            }
            if puncturing.is_empty() {
                return Err(Error::InvalidInput(
                    "Puncturing must keep at least one parity bit".to_string(),
                ));
            }
        }
        Ok(Self {
            structure: options.structure,
            puncturing: options.puncturing,
            work_group_size: options.work_group_size.max(1),
        })
    }
}

impl From<Codec> for CodecOptions {
    fn from(codec: Codec) -> Self {
        Self {
            structure: codec.structure,
            puncturing: codec.puncturing,
            work_group_size: codec.work_group_size,
        }
    }
}

impl Codec {
    /// Returns codec transmitting every parity bit.
    #[must_use]
    pub fn new(structure: impl Into<Structure>) -> Self {
        Self {
            structure: structure.into(),
            puncturing: None,
            work_group_size: default_work_group_size(),
        }
    }

    /// Returns codec transmitting the parity bits selected by a puncturing pattern.
    ///
    /// Decoding treats the parity bits that are not transmitted as erasures (zero LLR).
    ///
    /// # Errors
    ///
    /// Returns an error if the puncturing options are for another code family or are invalid.
    pub fn punctured(
        structure: impl Into<Structure>,
        options: &PunctureOptions,
    ) -> Result<Self, Error> {
        let structure = structure.into();
        let puncturing = structure.puncturing(options)?;
        debug!(
            family = structure.name(),
            kept = puncturing.output_size(),
            of = puncturing.input_size(),
            "Punctured codec"
        );
        Ok(Self {
            structure,
            puncturing: Some(puncturing),
            work_group_size: default_work_group_size(),
        })
    }

    /// Sets maximum number of threads used per call (at least `1`).
    #[must_use]
    pub fn with_work_group_size(mut self, work_group_size: usize) -> Self {
        self.work_group_size = work_group_size.max(1);
        self
    }

    /// Returns code structure.
    #[must_use]
    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Returns maximum number of threads used per call.
    #[must_use]
    pub fn work_group_size(&self) -> usize {
        self.work_group_size
    }

    /// Returns number of message bits per block.
    #[must_use]
    pub fn msg_size(&self) -> usize {
        self.structure.msg_size()
    }

    /// Returns number of transmitted parity bits per block.
    #[must_use]
    pub fn parity_size(&self) -> usize {
        self.puncturing
            .as_ref()
            .map_or(self.structure.parity_size(), Permutation::output_size)
    }

    /// Returns number of extrinsic LLR values per block.
    #[must_use]
    pub fn extrinsic_size(&self) -> usize {
        self.structure.extrinsic_size()
    }

    /// Encodes a sequence of message blocks into a sequence of transmitted parity blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if `msg.len()` is not a multiple of `msg_size()`.
    pub fn encode(&self, msg: &[Bit]) -> Result<Vec<Bit>, Error> {
        let msg_size = self.msg_size();
        let parity_size = self.parity_size();
        let num_blocks = block_count(msg.len(), msg_size, "message")?;
        let mut parity = vec![Bit::Zero; num_blocks * parity_size];
        let chunk = chunk_size(num_blocks, self.work_group_size);
        debug!(num_blocks, chunk, family = self.structure.name(), "Encoding");
        for_each_chunk(
            msg.chunks(chunk * msg_size)
                .zip(parity.chunks_mut(chunk * parity_size)),
            |(msg, parity)| {
                let mut codeword = vec![Bit::Zero; self.structure.parity_size()];
                for (msg, parity) in msg
                    .chunks_exact(msg_size)
                    .zip(parity.chunks_exact_mut(parity_size))
                {
                    self.structure.encode(msg, &mut codeword)?;
                    self.puncture(&codeword, parity);
                }
                Ok(())
            },
        )?;
        Ok(parity)
    }

    /// Decodes a sequence of received parity LLR blocks into a sequence of message blocks.
    ///
    /// Convolutional codes are decoded with the Viterbi algorithm; turbo and LDPC codes with
    /// their iterative decoders, followed by hard decisions.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len()` is not a multiple of `parity_size()`.
    pub fn decode(&self, parity: &[f64]) -> Result<Vec<Bit>, Error> {
        let msg_size = self.msg_size();
        let parity_size = self.parity_size();
        let num_blocks = block_count(parity.len(), parity_size, "parity")?;
        let mut msg = vec![Bit::Zero; num_blocks * msg_size];
        let chunk = chunk_size(num_blocks, self.work_group_size);
        debug!(num_blocks, chunk, family = self.structure.name(), "Decoding");
        for_each_chunk(
            parity
                .chunks(chunk * parity_size)
                .zip(msg.chunks_mut(chunk * msg_size)),
            |(parity, msg)| {
                let mut decoder = hard_decoder(&self.structure);
                let mut received = vec![0.0; self.structure.parity_size()];
                for (parity, msg) in parity
                    .chunks_exact(parity_size)
                    .zip(msg.chunks_exact_mut(msg_size))
                {
                    self.depuncture(parity, &mut received);
                    decoder.decode_block(&received, msg);
                }
                Ok(())
            },
        )?;
        Ok(msg)
    }

    /// Decodes a sequence of received parity LLR blocks into a-posteriori LLR values of the
    /// message bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len()` is not a multiple of `parity_size()`.
    pub fn soft_out_decode(&self, parity: &[f64]) -> Result<Vec<f64>, Error> {
        let (msg, _) = self.soft_decode(parity, None, false)?;
        Ok(msg)
    }

    /// Decodes a sequence of received parity LLR blocks, given prior LLR values of the message
    /// bits, into a-posteriori LLR values of the message bits and extrinsic LLR values.
    ///
    /// The extrinsic output excludes the prior input and the channel values of the message bits,
    /// so that it can feed another decoder as prior input.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len()` is not a multiple of `parity_size()` or if
    /// `extrinsic.len()` does not hold `extrinsic_size()` values per parity block.
    pub fn app_decode(
        &self,
        parity: &[f64],
        extrinsic: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), Error> {
        self.soft_decode(parity, Some(extrinsic), true)
    }

    /// Returns whether every block of a sequence of transmitted parity blocks is valid.
    ///
    /// An unpunctured block must be a codeword. A punctured block is valid when decoding it, with
    /// its erased bits at zero LLR, yields a message whose encoding matches every transmitted bit;
    /// a block accepted this way is always consistent with some codeword.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len()` is not a multiple of `parity_size()`.
    pub fn check(&self, parity: &[Bit]) -> Result<bool, Error> {
        let parity_size = self.parity_size();
        let num_blocks = block_count(parity.len(), parity_size, "parity")?;
        let chunk = chunk_size(num_blocks, self.work_group_size);
        let valid = AtomicBool::new(true);
        debug!(num_blocks, chunk, family = self.structure.name(), "Checking");
        for_each_chunk(parity.chunks(chunk * parity_size), |parity| {
            let mut erasures = self
                .puncturing
                .as_ref()
                .map(|_| ErasureCheck::new(&self.structure));
            for block in parity.chunks_exact(parity_size) {
                if !valid.load(Ordering::Relaxed) {
                    break;
                }
                let block_valid = match erasures.as_mut() {
                    Some(erasures) => self.check_punctured(block, erasures)?,
                    None => self.structure.check(block)?,
                };
                if !block_valid {
                    valid.store(false, Ordering::Relaxed);
                }
            }
            Ok(())
        })?;
        Ok(valid.into_inner())
    }

    /// Returns whether a punctured block re-encodes to itself after decoding.
    fn check_punctured(&self, block: &[Bit], erasures: &mut ErasureCheck) -> Result<bool, Error> {
        erasures.transmitted.clear();
        erasures.transmitted.extend(
            block
                .iter()
                .map(|&bit| if bit == Bit::One { CHECK_LLR } else { -CHECK_LLR }),
        );
        self.depuncture(&erasures.transmitted, &mut erasures.received);
        erasures
            .decoder
            .decode_block(&erasures.received, &mut erasures.msg);
        self.structure.encode(&erasures.msg, &mut erasures.codeword)?;
        erasures.reencoded.resize(block.len(), Bit::Zero);
        self.puncture(&erasures.codeword, &mut erasures.reencoded);
        Ok(erasures.reencoded == block)
    }

    fn soft_decode(
        &self,
        parity: &[f64],
        extrinsic_in: Option<&[f64]>,
        with_extrinsic: bool,
    ) -> Result<(Vec<f64>, Vec<f64>), Error> {
        let msg_size = self.msg_size();
        let parity_size = self.parity_size();
        let extrinsic_size = self.extrinsic_size();
        let num_blocks = block_count(parity.len(), parity_size, "parity")?;
        if let Some(extrinsic_in) = extrinsic_in {
            if extrinsic_in.len() != num_blocks * extrinsic_size {
                return Err(Error::InvalidInput(format!(
                    "Invalid extrinsic length (expected {}, found {})",
                    num_blocks * extrinsic_size,
                    extrinsic_in.len()
                )));
            }
        }
        let mut msg = vec![0.0; num_blocks * msg_size];
        let mut extrinsic_out = vec![0.0; if with_extrinsic { num_blocks * extrinsic_size } else { 0 }];
        let chunk = chunk_size(num_blocks, self.work_group_size);
        debug!(
            num_blocks,
            chunk,
            family = self.structure.name(),
            with_extrinsic,
            "Soft-output decoding"
        );
        let extrinsic_in_chunks = extrinsic_in
            .map(|e| e.chunks(chunk * extrinsic_size).map(Some).collect::<Vec<_>>())
            .unwrap_or_else(|| vec![None; num_blocks.div_ceil(chunk)]);
        let extrinsic_out_chunks: Vec<Option<&mut [f64]>> = if with_extrinsic {
            extrinsic_out.chunks_mut(chunk * extrinsic_size).map(Some).collect()
        } else {
            (0 .. num_blocks.div_ceil(chunk)).map(|_| None).collect()
        };
        for_each_chunk(
            izip!(
                parity.chunks(chunk * parity_size),
                msg.chunks_mut(chunk * msg_size),
                extrinsic_in_chunks,
                extrinsic_out_chunks
            ),
            |(parity, msg, extrinsic_in, mut extrinsic_out)| {
                let mut decoder = soft_decoder(&self.structure);
                let mut received = vec![0.0; self.structure.parity_size()];
                for (k, (parity, msg)) in parity
                    .chunks_exact(parity_size)
                    .zip(msg.chunks_exact_mut(msg_size))
                    .enumerate()
                {
                    let block = k * extrinsic_size .. (k + 1) * extrinsic_size;
                    self.depuncture(parity, &mut received);
                    decoder.so_decode_block(
                        &received,
                        extrinsic_in.map(|e| &e[block.clone()]),
                        msg,
                        extrinsic_out.as_deref_mut().map(|e| &mut e[block]),
                    );
                }
                Ok(())
            },
        )?;
        Ok((msg, extrinsic_out))
    }

    /// Writes the transmitted bits of a codeword.
    fn puncture(&self, codeword: &[Bit], parity: &mut [Bit]) {
        match &self.puncturing {
            Some(puncturing) => puncturing.permute_into(codeword, parity),
            None => parity.copy_from_slice(codeword),
        }
    }

    /// Writes received LLR values at their codeword positions, with zeros elsewhere.
    fn depuncture(&self, parity: &[f64], received: &mut [f64]) {
        match &self.puncturing {
            Some(puncturing) => {
                received.fill(0.0);
                puncturing.depermute_into(parity, received);
            }
            None => received.copy_from_slice(parity),
        }
    }
}

/// Worker state for checking punctured blocks
struct ErasureCheck<'a> {
    decoder: Box<dyn HardDecoder + 'a>,
    transmitted: Vec<f64>,
    received: Vec<f64>,
    msg: Vec<Bit>,
    codeword: Vec<Bit>,
    reencoded: Vec<Bit>,
}

impl<'a> ErasureCheck<'a> {
    fn new(structure: &'a Structure) -> Self {
        Self {
            decoder: hard_decoder(structure),
            transmitted: Vec::new(),
            received: vec![0.0; structure.parity_size()],
            msg: vec![Bit::Zero; structure.msg_size()],
            codeword: vec![Bit::Zero; structure.parity_size()],
            reencoded: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests_of_codec {
    use float_eq::assert_float_eq;

    use super::*;
    use crate::convolutional::Termination;
    use crate::ldpc::SparseBitMatrix;
    use crate::{utils, Trellis};

    fn convolutional(termination: Termination, algorithm: DecoderAlgorithm) -> Structure {
        let trellis = Trellis::from_generators(&[3], &[vec![0o4, 0o5]], &[]).unwrap();
        Structure::Convolutional(
            convolutional::Structure::new(
                convolutional::EncoderOptions::new(trellis, 8).termination(termination),
                convolutional::DecoderOptions::default().algorithm(algorithm),
            )
            .unwrap(),
        )
    }

    fn turbo(scheduling: turbo::SchedulingType, algorithm: DecoderAlgorithm) -> Structure {
        turbo_with(2, Termination::Tail, scheduling, algorithm)
    }

    fn turbo_with(
        num_constituents: usize,
        termination: Termination,
        scheduling: turbo::SchedulingType,
        algorithm: DecoderAlgorithm,
    ) -> Structure {
        let trellis = Trellis::from_generators(&[4], &[vec![0o15]], &[0o13]).unwrap();
        let interleavers = vec![
            Permutation::identity(16),
            Permutation::new(
                vec![13, 6, 0, 11, 3, 15, 8, 1, 10, 5, 14, 2, 7, 12, 4, 9],
                None,
            )
            .unwrap(),
            Permutation::new((0 .. 16).rev().collect(), None).unwrap(),
        ];
        Structure::Turbo(
            turbo::Structure::new(
                turbo::EncoderOptions::new(
                    vec![trellis],
                    interleavers.into_iter().take(num_constituents).collect(),
                )
                .terminations(vec![termination]),
                turbo::DecoderOptions::default()
                    .scheduling(scheduling)
                    .algorithm(algorithm),
            )
            .unwrap(),
        )
    }

    /// Three-constituent schedule where each stage passes on only some extrinsic outputs
    fn partial_transfer_scheduling() -> turbo::SchedulingType {
        turbo::SchedulingType::Custom(vec![
            turbo::Stage {
                activation: vec![0],
                transfer: vec![vec![1]],
            },
            turbo::Stage {
                activation: vec![1, 2],
                transfer: vec![vec![0], vec![0, 1]],
            },
        ])
    }

    fn ldpc(algorithm: DecoderAlgorithm) -> Structure {
        let checks = SparseBitMatrix::new(
            7,
            vec![vec![0, 1, 3, 4], vec![0, 2, 3, 5], vec![1, 2, 3, 6]],
        )
        .unwrap();
        Structure::Ldpc(
            ldpc::Structure::new(
                ldpc::EncoderOptions::new(checks),
                ldpc::DecoderOptions::default().algorithm(algorithm),
            )
            .unwrap(),
        )
    }

    fn all_structures() -> Vec<Structure> {
        let mut structures = Vec::new();
        for algorithm in [
            DecoderAlgorithm::Exact,
            DecoderAlgorithm::Linear,
            DecoderAlgorithm::Approximate,
        ] {
            structures.push(convolutional(Termination::Truncate, algorithm));
            structures.push(convolutional(Termination::Tail, algorithm));
            structures.push(turbo(turbo::SchedulingType::Serial, algorithm));
            structures.push(turbo(turbo::SchedulingType::Parallel, algorithm));
            structures.push(turbo_with(
                2,
                Termination::Truncate,
                turbo::SchedulingType::Serial,
                algorithm,
            ));
            structures.push(turbo_with(
                3,
                Termination::Tail,
                partial_transfer_scheduling(),
                algorithm,
            ));
            structures.push(ldpc(algorithm));
        }
        structures
    }

    fn noiseless(parity: &[Bit]) -> Vec<f64> {
        parity
            .iter()
            .map(|&b| if b == Bit::One { 10.0 } else { -10.0 })
            .collect()
    }

    #[test]
    fn test_noiseless_round_trip() {
        for structure in all_structures() {
            let codec = Codec::new(structure);
            let msg = utils::random_bits(7 * codec.msg_size());
            let parity = codec.encode(&msg).unwrap();
            assert_eq!(parity.len(), 7 * codec.parity_size());
            assert!(codec.check(&parity).unwrap());
            let llr = noiseless(&parity);
            assert_eq!(codec.decode(&llr).unwrap(), msg);
            let msg_llr = codec.soft_out_decode(&llr).unwrap();
            assert_eq!(utils::bpsk_slicer(&msg_llr), msg);
        }
    }

    #[test]
    fn test_all_zero_scenario() {
        let codec = Codec::new(convolutional(Termination::Truncate, DecoderAlgorithm::Approximate));
        assert_eq!(codec.parity_size(), 16);
        let parity = codec.encode(&[Bit::Zero; 8]).unwrap();
        assert_eq!(parity, [Bit::Zero; 16]);
        assert_eq!(codec.decode(&[-10.0; 16]).unwrap(), [Bit::Zero; 8]);
    }

    #[test]
    fn test_bad_sizes() {
        for structure in all_structures() {
            let codec = Codec::new(structure);
            assert!(codec.encode(&vec![Bit::Zero; codec.msg_size() + 1]).is_err());
            assert!(codec.decode(&vec![0.0; 2 * codec.parity_size() - 1]).is_err());
            assert!(codec.soft_out_decode(&vec![0.0; codec.parity_size() + 1]).is_err());
            let llr = vec![0.0; codec.parity_size()];
            assert!(codec.app_decode(&llr, &vec![0.0; codec.extrinsic_size() + 1]).is_err());
            assert!(codec.check(&vec![Bit::Zero; codec.parity_size() - 1]).is_err());
            assert!(codec.encode(&[]).unwrap().is_empty());
        }
    }

    #[test]
    fn test_work_group_determinism() {
        for structure in all_structures() {
            let codec = Codec::new(structure);
            let msg = utils::random_bits(13 * codec.msg_size());
            let llr = utils::bpsk_awgn_channel(&codec.encode(&msg).unwrap(), 1.0);
            let serial = codec.clone().with_work_group_size(1);
            let parallel = codec.with_work_group_size(8);
            assert_eq!(serial.decode(&llr).unwrap(), parallel.decode(&llr).unwrap());
            assert_eq!(
                serial.soft_out_decode(&llr).unwrap(),
                parallel.soft_out_decode(&llr).unwrap()
            );
        }
    }

    #[test]
    fn test_app_decode() {
        for structure in all_structures() {
            let codec = Codec::new(structure);
            let msg = utils::random_bits(3 * codec.msg_size());
            let llr = utils::bpsk_awgn_channel(&codec.encode(&msg).unwrap(), 3.0);
            // A zero prior input reproduces the soft-output decoder.
            let zeros = vec![0.0; 3 * codec.extrinsic_size()];
            let (msg_llr, _) = codec.app_decode(&llr, &zeros).unwrap();
            assert_eq!(msg_llr, codec.soft_out_decode(&llr).unwrap());
            // Repeated calls give identical results.
            let prior: Vec<f64> = (0 .. zeros.len()).map(|i| if i % 3 == 0 { 1.5 } else { -0.5 }).collect();
            let first = codec.app_decode(&llr, &prior).unwrap();
            let second = codec.app_decode(&llr, &prior).unwrap();
            assert_eq!(first, second);
            // The prior input is not echoed in the extrinsic output.
            assert_ne!(first.1, prior);
        }
    }

    #[test]
    fn test_extrinsic_excludes_prior() {
        let codec = Codec::new(convolutional(Termination::Tail, DecoderAlgorithm::Exact));
        let msg = utils::random_bits(codec.msg_size());
        let llr = utils::bpsk_awgn_channel(&codec.encode(&msg).unwrap(), 2.0);
        let prior = vec![0.75; codec.extrinsic_size()];
        let (msg_llr, extrinsic) = codec.app_decode(&llr, &prior).unwrap();
        for i in 0 .. codec.msg_size() {
            assert_float_eq!(msg_llr[i], prior[i] + extrinsic[i], abs <= 1e-8);
        }
    }

    #[test]
    fn test_algorithms_agree_at_high_snr() {
        let msg = utils::random_bits(16 * 4);
        let mut decisions = Vec::new();
        for algorithm in [
            DecoderAlgorithm::Exact,
            DecoderAlgorithm::Linear,
            DecoderAlgorithm::Approximate,
        ] {
            let codec = Codec::new(turbo(turbo::SchedulingType::Serial, algorithm));
            let llr = noiseless(&codec.encode(&msg).unwrap());
            decisions.push(utils::bpsk_slicer(&codec.soft_out_decode(&llr).unwrap()));
        }
        assert!(decisions.iter().all(|d| *d == msg));
    }

    #[test]
    fn test_punctured() {
        let options = PunctureOptions::Convolutional(convolutional::PunctureOptions {
            mask: vec![true, true, true, false],
            tail_mask: Vec::new(),
        });
        let structure = convolutional(Termination::Truncate, DecoderAlgorithm::Exact);
        let codec = Codec::punctured(structure.clone(), &options).unwrap();
        assert_eq!(codec.parity_size(), 12);
        let msg = utils::random_bits(5 * codec.msg_size());
        let parity = codec.encode(&msg).unwrap();
        assert_eq!(parity.len(), 60);
        let llr = noiseless(&parity);
        assert_eq!(codec.decode(&llr).unwrap(), msg);
        assert_eq!(utils::bpsk_slicer(&codec.soft_out_decode(&llr).unwrap()), msg);
        // Options of another family
        let options = PunctureOptions::Ldpc(ldpc::PunctureOptions::default());
        assert!(Codec::punctured(structure, &options).is_err());
    }

    #[test]
    fn test_check_punctured() {
        let options = PunctureOptions::Convolutional(convolutional::PunctureOptions {
            mask: vec![true, true, true, false],
            tail_mask: Vec::new(),
        });
        for termination in [Termination::Truncate, Termination::Tail] {
            let structure = convolutional(termination, DecoderAlgorithm::Linear);
            let codec = Codec::punctured(structure, &options)
                .unwrap()
                .with_work_group_size(2);
            let msg = utils::random_bits(6 * codec.msg_size());
            let mut parity = codec.encode(&msg).unwrap();
            assert!(codec.check(&parity).unwrap());
            // The transmitted layout is expected, not the full codeword.
            let full = vec![Bit::Zero; 6 * codec.structure().parity_size()];
            assert!(codec.check(&full).is_err());
            // Second transmitted bit of a block is the first parity bit of its first stage.
            let i = 3 * codec.parity_size() + 1;
            parity[i] = Bit::from(!bool::from(parity[i]));
            assert!(!codec.check(&parity).unwrap());
        }
        // Rate 1/2 turbo code: all message bits, alternate parity bits of each constituent
        let options = PunctureOptions::Turbo(turbo::PunctureOptions {
            mask: vec![vec![true], vec![true, false], vec![false, true]],
            ..turbo::PunctureOptions::default()
        });
        let structure = turbo(turbo::SchedulingType::Serial, DecoderAlgorithm::Approximate);
        let codec = Codec::punctured(structure, &options).unwrap();
        let parity = codec.encode(&utils::random_bits(3 * codec.msg_size())).unwrap();
        assert!(codec.check(&parity).unwrap());
    }

    #[test]
    fn test_check_detects_invalid_block() {
        let codec = Codec::new(ldpc(DecoderAlgorithm::Approximate)).with_work_group_size(2);
        let msg = utils::random_bits(6 * codec.msg_size());
        let mut parity = codec.encode(&msg).unwrap();
        assert!(codec.check(&parity).unwrap());
        let i = 4 * codec.parity_size() + 2;
        parity[i] = Bit::from(!bool::from(parity[i]));
        assert!(!codec.check(&parity).unwrap());
    }

    #[test]
    fn test_serde() {
        for structure in all_structures() {
            let codec = Codec::new(structure).with_work_group_size(2);
            let json = serde_json::to_string(&codec).unwrap();
            let restored: Codec = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, codec);
        }
        let json = serde_json::to_string(&ldpc(DecoderAlgorithm::Exact)).unwrap();
        assert!(json.contains("\"type\":\"Ldpc\""));
    }

    #[test]
    fn test_serde_rejects_invalid_codecs() {
        let structure = convolutional(Termination::Truncate, DecoderAlgorithm::Exact);
        let json = serde_json::to_string(&Codec::new(structure)).unwrap();
        assert!(serde_json::from_str::<Codec>(&json).is_ok());
        // Puncturing sized for another codeword length
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["puncturing"] = serde_json::json!({"input_size": 4, "seq": [0, 1, 2]});
        assert!(serde_json::from_value::<Codec>(value.clone()).is_err());
        value["puncturing"] = serde_json::json!({"input_size": 16, "seq": []});
        assert!(serde_json::from_value::<Codec>(value.clone()).is_err());
        value["puncturing"] = serde_json::json!({"input_size": 16, "seq": [0, 1, 2]});
        let codec: Codec = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(codec.parity_size(), 3);
        assert!(codec.encode(&[Bit::One; 8]).is_ok());
        value["work_group_size"] = serde_json::json!(0);
        assert_eq!(serde_json::from_value::<Codec>(value).unwrap().work_group_size(), 1);
        // Next-state table reaching a state outside a 1-bit state space
        let trellis = Trellis::from_generators(&[2], &[vec![0o2, 0o3]], &[]).unwrap();
        let narrow = Codec::new(
            convolutional::Structure::new(
                convolutional::EncoderOptions::new(trellis, 8),
                convolutional::DecoderOptions::default(),
            )
            .unwrap(),
        );
        let mut value = serde_json::to_value(&narrow).unwrap();
        let trellis = &mut value["structure"]["encoder"]["trellis"];
        assert_eq!(trellis["next_state"].as_array().unwrap().len(), 4);
        trellis["next_state"] = serde_json::json!([0, 7, 1, 0]);
        assert!(serde_json::from_value::<Codec>(value).is_err());
        // Interleaver indexing past its input
        let mut value = serde_json::to_value(Codec::new(turbo(
            turbo::SchedulingType::Serial,
            DecoderAlgorithm::Exact,
        )))
        .unwrap();
        let interleavers = &mut value["structure"]["encoder"]["interleavers"];
        assert_eq!(interleavers.as_array().unwrap().len(), 2);
        interleavers[1] = serde_json::json!({"input_size": 4, "seq": [0, 1, 2, 9]});
        assert!(serde_json::from_value::<Codec>(value).is_err());
    }
}
