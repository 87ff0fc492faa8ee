//! Convolutional code structure: trellis, block length and termination

use serde::{Deserialize, Serialize};

use crate::bit_field::BitField;
use crate::{Bit, DecoderAlgorithm, Error, Permutation, Trellis};

/// Enumeration of trellis termination policies
#[derive(Clone, Eq, PartialEq, Hash, Debug, Copy, Default, Deserialize, Serialize)]
pub enum Termination {
    /// Tail symbols drive the encoder back to state `0` after the message
    Tail,
    /// Encoder state is abandoned after the message
    #[default]
    Truncate,
}

/// Parameters of a convolutional encoder
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct EncoderOptions {
    /// Trellis of the code
    pub trellis: Trellis,
    /// Number of input symbols per block
    pub length: usize,
    /// Termination policy
    #[serde(default)]
    pub termination: Termination,
}

impl EncoderOptions {
    /// Returns encoder options with given trellis and block length, and truncated termination.
    #[must_use]
    pub fn new(trellis: Trellis, length: usize) -> Self {
        Self {
            trellis,
            length,
            termination: Termination::default(),
        }
    }

    /// Sets termination policy.
    #[must_use]
    pub fn termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }
}

/// Parameters of a convolutional decoder
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub struct DecoderOptions {
    /// Metric algebra for soft-output decoding
    #[serde(default)]
    pub algorithm: DecoderAlgorithm,
    /// Factor applied to soft outputs
    #[serde(default = "unit_scaling_factor")]
    pub scaling_factor: f64,
}

fn unit_scaling_factor() -> f64 {
    1.0
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            algorithm: DecoderAlgorithm::default(),
            scaling_factor: 1.0,
        }
    }
}

impl DecoderOptions {
    /// Sets metric algebra.
    #[must_use]
    pub fn algorithm(mut self, algorithm: DecoderAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets scaling factor for soft outputs.
    #[must_use]
    pub fn scaling_factor(mut self, scaling_factor: f64) -> Self {
        self.scaling_factor = scaling_factor;
        self
    }
}

/// Puncturing pattern for a convolutional code
///
/// A parity bit is transmitted if the mask entry at its index (taken cyclically) is `true`. Tail
/// parity bits use `tail_mask` if it is not empty, and `mask` otherwise. An empty mask keeps
/// everything.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct PunctureOptions {
    /// Mask for parity bits of message stages
    pub mask: Vec<bool>,
    /// Mask for parity bits of tail stages
    #[serde(default)]
    pub tail_mask: Vec<bool>,
}

/// Serialized form of [`Structure`]
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
struct StructureOptions {
    encoder: EncoderOptions,
    #[serde(default)]
    decoder: DecoderOptions,
}

/// Convolutional code structure
///
/// The parity sequence of a block holds `output_width` bits for each of the `length + tail_size`
/// trellis stages. With [`Termination::Tail`], the tail stages follow the message stages, and
/// their inputs are chosen so that the encoder ends in state `0`.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(try_from = "StructureOptions", into = "StructureOptions")]
pub struct Structure {
    trellis: Trellis,
    length: usize,
    termination: Termination,
    algorithm: DecoderAlgorithm,
    scaling_factor: f64,
    /// Number of tail stages
    tail_size: usize,
    /// Tail input to apply in each state
    tail_inputs: Vec<usize>,
}

impl TryFrom<StructureOptions> for Structure {
    type Error = Error;

    fn try_from(options: StructureOptions) -> Result<Self, Error> {
        Self::new(options.encoder, options.decoder)
    }
}

impl From<Structure> for StructureOptions {
    fn from(structure: Structure) -> Self {
        Self {
            encoder: structure.encoder_options(),
            decoder: structure.decoder_options(),
        }
    }
}

impl Structure {
    /// Returns convolutional code structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the block length is `0`, or if tail termination is requested for a
    /// trellis that cannot always be driven back to state `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecl::convolutional::{DecoderOptions, EncoderOptions, Structure, Termination};
    /// use fecl::Trellis;
    ///
    /// let trellis = Trellis::from_generators(&[3], &[vec![0o4, 0o5]], &[])?;
    /// let encoder = EncoderOptions::new(trellis, 8).termination(Termination::Tail);
    /// let structure = Structure::new(encoder, DecoderOptions::default())?;
    /// assert_eq!(structure.msg_size(), 8);
    /// assert_eq!(structure.tail_size(), 2);
    /// assert_eq!(structure.parity_size(), 20);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(encoder: EncoderOptions, decoder: DecoderOptions) -> Result<Self, Error> {
        if encoder.length == 0 {
            return Err(Error::InvalidInput(
                "Block length must be a positive integer".to_string(),
            ));
        }
        let (tail_size, tail_inputs) = match encoder.termination {
            Termination::Tail => tail_schedule(&encoder.trellis)?,
            Termination::Truncate => (0, Vec::new()),
        };
        Ok(Self {
            trellis: encoder.trellis,
            length: encoder.length,
            termination: encoder.termination,
            algorithm: decoder.algorithm,
            scaling_factor: decoder.scaling_factor,
            tail_size,
            tail_inputs,
        })
    }

    /// Returns options from which this structure can be rebuilt.
    #[must_use]
    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            trellis: self.trellis.clone(),
            length: self.length,
            termination: self.termination,
        }
    }

    /// Returns decoder options of this structure.
    #[must_use]
    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            algorithm: self.algorithm,
            scaling_factor: self.scaling_factor,
        }
    }

    /// Returns trellis of the code.
    #[must_use]
    pub fn trellis(&self) -> &Trellis {
        &self.trellis
    }

    /// Returns number of message stages per block.
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Returns termination policy.
    #[must_use]
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Returns number of tail stages per block.
    #[must_use]
    pub fn tail_size(&self) -> usize {
        self.tail_size
    }

    /// Returns metric algebra for soft-output decoding.
    #[must_use]
    pub fn algorithm(&self) -> DecoderAlgorithm {
        self.algorithm
    }

    /// Returns factor applied to soft outputs.
    #[must_use]
    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    /// Returns number of message bits per block.
    #[must_use]
    pub fn msg_size(&self) -> usize {
        self.length * self.trellis.input_width()
    }

    /// Returns number of systematic bits per block (message and tail inputs).
    #[must_use]
    pub fn syst_size(&self) -> usize {
        (self.length + self.tail_size) * self.trellis.input_width()
    }

    /// Returns number of parity bits per block.
    #[must_use]
    pub fn parity_size(&self) -> usize {
        (self.length + self.tail_size) * self.trellis.output_width()
    }

    /// Encodes one block.
    ///
    /// # Parameters
    ///
    /// - `msg`: Message bits (`msg_size()` of them).
    ///
    /// - `parity`: Buffer for the parity bits (`parity_size()` of them).
    ///
    /// - `tail_syst`: Optional buffer for the inputs of the tail stages
    ///   (`tail_size() * input_width` of them).
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer has the wrong length.
    pub fn encode(
        &self,
        msg: &[Bit],
        parity: &mut [Bit],
        mut tail_syst: Option<&mut [Bit]>,
    ) -> Result<(), Error> {
        let input_width = self.trellis.input_width();
        let output_width = self.trellis.output_width();
        check_len(msg.len(), self.msg_size(), "message")?;
        check_len(parity.len(), self.parity_size(), "parity")?;
        if let Some(tail) = &tail_syst {
            check_len(tail.len(), self.tail_size * input_width, "tail")?;
        }
        let (msg_parity, tail_parity) = parity.split_at_mut(self.length * output_width);
        let mut state = 0;
        for (input, out) in msg
            .chunks_exact(input_width)
            .zip(msg_parity.chunks_exact_mut(output_width))
        {
            let input = BitField::from_bits(input).0;
            BitField(self.trellis.output(state, input)).write_bits(out);
            state = self.trellis.next_state(state, input);
        }
        for (stage, out) in tail_parity.chunks_exact_mut(output_width).enumerate() {
            let input = self.tail_inputs[state];
            BitField(self.trellis.output(state, input)).write_bits(out);
            if let Some(tail) = tail_syst.as_deref_mut() {
                let tail = &mut tail[stage * input_width .. (stage + 1) * input_width];
                BitField(input).write_bits(tail);
            }
            state = self.trellis.next_state(state, input);
        }
        Ok(())
    }

    /// Returns whether a parity block is a valid codeword.
    ///
    /// Every path through the trellis consistent with the parity bits is followed; with tail
    /// termination, one of them must end in state `0`.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len()` is not equal to `self.parity_size()`.
    pub fn check(&self, parity: &[Bit]) -> Result<bool, Error> {
        check_len(parity.len(), self.parity_size(), "parity")?;
        let state_count = self.trellis.state_count();
        let mut reachable = vec![false; state_count];
        let mut next_reachable = vec![false; state_count];
        reachable[0] = true;
        for observed in parity.chunks_exact(self.trellis.output_width()) {
            let observed = BitField::from_bits(observed).0;
            next_reachable.fill(false);
            for state in (0 .. state_count).filter(|&s| reachable[s]) {
                for input in 0 .. self.trellis.input_count() {
                    if self.trellis.output(state, input) == observed {
                        next_reachable[self.trellis.next_state(state, input)] = true;
                    }
                }
            }
            if !next_reachable.contains(&true) {
                return Ok(false);
            }
            std::mem::swap(&mut reachable, &mut next_reachable);
        }
        Ok(match self.termination {
            Termination::Tail => reachable[0],
            Termination::Truncate => true,
        })
    }

    /// Returns permutation selecting the transmitted parity bits.
    #[must_use]
    pub fn puncturing(&self, options: &PunctureOptions) -> Permutation {
        let msg_parity_size = self.length * self.trellis.output_width();
        let tail_mask = if options.tail_mask.is_empty() {
            &options.mask
        } else {
            &options.tail_mask
        };
        let seq = (0 .. msg_parity_size)
            .filter(|&i| is_kept(&options.mask, i))
            .chain(
                (msg_parity_size .. self.parity_size())
                    .filter(|&i| is_kept(tail_mask, i - msg_parity_size)),
            )
            .collect();
        Permutation {
            input_size: self.parity_size(),
            seq,
        }
    }
}

/// Returns whether index `i` is kept by a cyclic puncturing mask.
pub(crate) fn is_kept(mask: &[bool], i: usize) -> bool {
    mask.is_empty() || mask[i % mask.len()]
}

/// Returns error unless a buffer has the expected length.
fn check_len(len: usize, expected: usize, what: &str) -> Result<(), Error> {
    if len == expected {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Invalid {what} length (expected {expected}, found {len})"
        )))
    }
}

/// Returns number of tail stages and tail input for each state.
///
/// In each state, the tail input is the one whose next state is closest to state `0` (lowest input
/// on ties), so every state reaches `0` within the returned number of stages and then stays there.
fn tail_schedule(trellis: &Trellis) -> Result<(usize, Vec<usize>), Error> {
    let distances = trellis
        .distances_to_zero()
        .into_iter()
        .collect::<Option<Vec<usize>>>()
        .ok_or_else(|| {
            Error::InvalidInput(
                "Tail termination requires every trellis state to reach state 0".to_string(),
            )
        })?;
    let tail_size = distances.iter().copied().max().unwrap_or(0);
    let tail_inputs: Vec<usize> = (0 .. trellis.state_count())
        .map(|state| {
            (0 .. trellis.input_count())
                .min_by_key(|&input| distances[trellis.next_state(state, input)])
                .unwrap_or(0)
        })
        .collect();
    if tail_size > 0 && trellis.next_state(0, tail_inputs[0]) != 0 {
        return Err(Error::InvalidInput(
            "Tail termination requires state 0 to have a transition to itself".to_string(),
        ));
    }
    Ok((tail_size, tail_inputs))
}
