//! Turbo code structure: parallel concatenation of convolutional constituents

use serde::{Deserialize, Serialize};

use crate::convolutional::{self, is_kept, Termination};
use crate::{Bit, DecoderAlgorithm, Error, Permutation, Trellis};

/// One step of a custom decoding schedule
///
/// Constituent `activation[k]` is decoded after its prior input has been rebuilt from the channel
/// and the extrinsic outputs of the constituents listed in `transfer[k]`.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Stage {
    /// Constituents decoded in this stage
    pub activation: Vec<usize>,
    /// For each activated constituent, the constituents feeding its prior input
    pub transfer: Vec<Vec<usize>>,
}

/// Ordered list of stages forming one decoding iteration
pub type Scheduling = Vec<Stage>;

/// Enumeration of turbo decoding schedules
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub enum SchedulingType {
    /// Constituents are decoded in order, each seeing the latest output of all others
    #[default]
    Serial,
    /// All constituents are decoded from the outputs of the previous iteration
    Parallel,
    /// Constituents are decoded according to an explicit schedule
    Custom(Scheduling),
}

/// Parameters of a turbo encoder
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct EncoderOptions {
    /// Trellis of each constituent (a single trellis is shared by all constituents)
    pub trellises: Vec<Trellis>,
    /// Interleaver of each constituent (an empty permutation is the identity)
    pub interleavers: Vec<Permutation>,
    /// Termination of each constituent (a single value is shared by all constituents)
    #[serde(default = "default_terminations")]
    pub terminations: Vec<Termination>,
}

fn default_terminations() -> Vec<Termination> {
    vec![Termination::Tail]
}

impl EncoderOptions {
    /// Returns encoder options with tail termination for all constituents.
    #[must_use]
    pub fn new(trellises: Vec<Trellis>, interleavers: Vec<Permutation>) -> Self {
        Self {
            trellises,
            interleavers,
            terminations: default_terminations(),
        }
    }

    /// Sets termination policies.
    #[must_use]
    pub fn terminations(mut self, terminations: Vec<Termination>) -> Self {
        self.terminations = terminations;
        self
    }
}

/// Parameters of a turbo decoder
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Number of decoding iterations
    pub iterations: usize,
    /// Decoding schedule
    pub scheduling: SchedulingType,
    /// Metric algebra of the constituent decoders
    pub algorithm: DecoderAlgorithm,
    /// Scaling factors of the extrinsic outputs, indexed by constituent and then by iteration
    /// (each level holds either one value per index or a single shared value)
    pub scaling_factor: Vec<Vec<f64>>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            iterations: 6,
            scheduling: SchedulingType::Serial,
            algorithm: DecoderAlgorithm::Linear,
            scaling_factor: vec![vec![1.0]],
        }
    }
}

impl DecoderOptions {
    /// Sets number of decoding iterations.
    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets decoding schedule.
    #[must_use]
    pub fn scheduling(mut self, scheduling: SchedulingType) -> Self {
        self.scheduling = scheduling;
        self
    }

    /// Sets metric algebra.
    #[must_use]
    pub fn algorithm(mut self, algorithm: DecoderAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets scaling factors.
    #[must_use]
    pub fn scaling_factor(mut self, scaling_factor: Vec<Vec<f64>>) -> Self {
        self.scaling_factor = scaling_factor;
        self
    }
}

/// Enumeration of the orders in which punctured turbo parity bits are transmitted
#[derive(Clone, Eq, PartialEq, Hash, Debug, Copy, Default, Deserialize, Serialize)]
pub enum BitOrdering {
    /// Each message bit is followed by the parity bits of the same stage of every constituent
    #[default]
    Alternate,
    /// Bits are transmitted in the order of the parity layout
    Group,
}

/// Puncturing pattern for a turbo code
///
/// `mask[0]` applies to the message bits, and `mask[j + 1]` to the parity bits of constituent
/// `j`. `tail_mask[2 * j]` applies to the tail inputs of constituent `j`, and
/// `tail_mask[2 * j + 1]` to its tail parity bits; an empty tail mask falls back to the
/// corresponding regular mask. Masks are applied cyclically, and an empty mask keeps everything.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PunctureOptions {
    /// Masks for message bits and constituent parity bits
    pub mask: Vec<Vec<bool>>,
    /// Masks for tail inputs and tail parity bits of each constituent
    pub tail_mask: Vec<Vec<bool>>,
    /// Transmission order
    pub bit_ordering: BitOrdering,
}

/// Serialized form of [`Structure`]
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
struct StructureOptions {
    encoder: EncoderOptions,
    #[serde(default)]
    decoder: DecoderOptions,
}

/// Turbo code structure
///
/// The parity sequence of a block is laid out as the message bits, then the tail inputs of each
/// constituent in turn, then the parity bits of each constituent in turn. Constituent `j` encodes
/// the message permuted by interleaver `j`.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(try_from = "StructureOptions", into = "StructureOptions")]
pub struct Structure {
    constituents: Vec<convolutional::Structure>,
    interleavers: Vec<Permutation>,
    iterations: usize,
    scheduling: SchedulingType,
    algorithm: DecoderAlgorithm,
    scaling_factor: Vec<Vec<f64>>,
    msg_size: usize,
    syst_size: usize,
    parity_size: usize,
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
    /// Returns turbo code structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the numbers of trellises, terminations and interleavers are
    /// inconsistent, if an interleaver output does not fill whole trellis stages, if a
    /// constituent is invalid, if the custom schedule refers to unknown constituents, or if the
    /// scaling factor table has the wrong shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecl::turbo::{DecoderOptions, EncoderOptions, Structure};
    /// use fecl::{Permutation, Trellis};
    ///
    /// let trellis = Trellis::from_generators(&[4], &[vec![0o15]], &[0o13])?;
    /// let interleavers = vec![Permutation::identity(16), Permutation::random(16)?];
    /// let encoder = EncoderOptions::new(vec![trellis], interleavers);
    /// let structure = Structure::new(encoder, DecoderOptions::default())?;
    /// assert_eq!(structure.msg_size(), 16);
    /// assert_eq!(structure.syst_size(), 22);
    /// assert_eq!(structure.parity_size(), 60);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(encoder: EncoderOptions, decoder: DecoderOptions) -> Result<Self, Error> {
        let num_constituents = encoder.interleavers.len();
        if num_constituents == 0 {
            return Err(Error::InvalidInput(
                "Turbo code needs at least one constituent".to_string(),
            ));
        }
        if encoder.trellises.len() != 1 && encoder.trellises.len() != num_constituents {
            return Err(Error::InvalidInput(
                "Trellis and permutation counts don't match".to_string(),
            ));
        }
        if encoder.terminations.len() != 1 && encoder.terminations.len() != num_constituents {
            return Err(Error::InvalidInput(
                "Termination and permutation counts don't match".to_string(),
            ));
        }
        let msg_size = encoder
            .interleavers
            .iter()
            .map(Permutation::input_size)
            .max()
            .unwrap_or(0);
        if msg_size == 0 {
            return Err(Error::InvalidInput(
                "Turbo message size must be positive".to_string(),
            ));
        }
        let mut interleavers = Vec::with_capacity(num_constituents);
        let mut constituents = Vec::with_capacity(num_constituents);
        for (i, interleaver) in encoder.interleavers.into_iter().enumerate() {
            let interleaver = if interleaver.is_empty() {
                Permutation::identity(msg_size)
            } else {
                interleaver
            };
            let trellis = &encoder.trellises[i % encoder.trellises.len()];
            let termination = encoder.terminations[i % encoder.terminations.len()];
            if interleaver.output_size() % trellis.input_width() != 0 {
                return Err(Error::InvalidInput(format!(
                    "Invalid size for interleaver {i} (expected a multiple of {}, found {})",
                    trellis.input_width(),
                    interleaver.output_size()
                )));
            }
            let length = interleaver.output_size() / trellis.input_width();
            constituents.push(convolutional::Structure::new(
                convolutional::EncoderOptions::new(trellis.clone(), length)
                    .termination(termination),
                convolutional::DecoderOptions::default().algorithm(decoder.algorithm),
            )?);
            interleavers.push(interleaver);
        }
        let scheduling = normalized_scheduling(decoder.scheduling, num_constituents)?;
        check_scaling_factor(&decoder.scaling_factor, num_constituents, decoder.iterations)?;
        let tail_syst_size: usize = constituents.iter().map(|c| c.syst_size() - c.msg_size()).sum();
        let constituent_parity_size: usize =
            constituents.iter().map(convolutional::Structure::parity_size).sum();
        Ok(Self {
            constituents,
            interleavers,
            iterations: decoder.iterations,
            scheduling,
            algorithm: decoder.algorithm,
            scaling_factor: decoder.scaling_factor,
            msg_size,
            syst_size: msg_size + tail_syst_size,
            parity_size: msg_size + tail_syst_size + constituent_parity_size,
        })
    }

    /// Returns options from which this structure can be rebuilt.
    #[must_use]
    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            trellises: self.constituents.iter().map(|c| c.trellis().clone()).collect(),
            interleavers: self.interleavers.clone(),
            terminations: self.constituents.iter().map(|c| c.termination()).collect(),
        }
    }

    /// Returns decoder options of this structure.
    #[must_use]
    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            iterations: self.iterations,
            scheduling: self.scheduling.clone(),
            algorithm: self.algorithm,
            scaling_factor: self.scaling_factor.clone(),
        }
    }

    /// Returns constituent structures.
    #[must_use]
    pub fn constituents(&self) -> &[convolutional::Structure] {
        &self.constituents
    }

    /// Returns interleavers of the constituents.
    #[must_use]
    pub fn interleavers(&self) -> &[Permutation] {
        &self.interleavers
    }

    /// Returns number of decoding iterations.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Returns decoding schedule (custom schedules are sorted by constituent).
    #[must_use]
    pub fn scheduling(&self) -> &SchedulingType {
        &self.scheduling
    }

    /// Returns metric algebra of the constituent decoders.
    #[must_use]
    pub fn algorithm(&self) -> DecoderAlgorithm {
        self.algorithm
    }

    /// Returns scaling factor of given constituent at given iteration.
    #[must_use]
    pub fn scaling_factor(&self, constituent: usize, iteration: usize) -> f64 {
        let factors = &self.scaling_factor[constituent % self.scaling_factor.len()];
        factors[iteration % factors.len()]
    }

    /// Returns number of message bits per block.
    #[must_use]
    pub fn msg_size(&self) -> usize {
        self.msg_size
    }

    /// Returns number of systematic bits per block (message and all tail inputs).
    #[must_use]
    pub fn syst_size(&self) -> usize {
        self.syst_size
    }

    /// Returns number of parity bits per block.
    #[must_use]
    pub fn parity_size(&self) -> usize {
        self.parity_size
    }

    /// Returns number of extrinsic values exchanged between constituents per block.
    #[must_use]
    pub fn state_size(&self) -> usize {
        self.constituents.iter().map(convolutional::Structure::syst_size).sum()
    }

    /// Returns, for each constituent, the offsets of its tail inputs and of its parity bits in
    /// the parity layout.
    pub(crate) fn offsets(&self) -> Vec<(usize, usize)> {
        let mut tail = self.msg_size;
        let mut parity = self.syst_size;
        self.constituents
            .iter()
            .map(|c| {
                let offsets = (tail, parity);
                tail += c.syst_size() - c.msg_size();
                parity += c.parity_size();
                offsets
            })
            .collect()
    }

    /// Encodes one block.
    ///
    /// # Errors
    ///
    /// Returns an error if `msg.len()` is not `msg_size()` or `parity.len()` is not
    /// `parity_size()`.
    pub fn encode(&self, msg: &[Bit], parity: &mut [Bit]) -> Result<(), Error> {
        if msg.len() != self.msg_size || parity.len() != self.parity_size {
            return Err(Error::InvalidInput(format!(
                "Invalid block lengths for turbo encoding (expected {} and {}, found {} and {})",
                self.msg_size,
                self.parity_size,
                msg.len(),
                parity.len()
            )));
        }
        parity[.. self.msg_size].copy_from_slice(msg);
        let mut local_msg = Vec::new();
        for ((constituent, interleaver), (tail, offset)) in self
            .constituents
            .iter()
            .zip(&self.interleavers)
            .zip(self.offsets())
        {
            local_msg.resize(constituent.msg_size(), Bit::Zero);
            interleaver.permute_into(&msg[.. interleaver.input_size()], &mut local_msg);
            let (syst, rest) = parity.split_at_mut(self.syst_size);
            let tail_syst = &mut syst[tail .. tail + constituent.syst_size() - constituent.msg_size()];
            let constituent_parity =
                &mut rest[offset - self.syst_size .. offset - self.syst_size + constituent.parity_size()];
            constituent.encode(&local_msg, constituent_parity, Some(tail_syst))?;
        }
        Ok(())
    }

    /// Returns whether a parity block is a valid codeword.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len()` is not `parity_size()`.
    pub fn check(&self, parity: &[Bit]) -> Result<bool, Error> {
        if parity.len() != self.parity_size {
            return Err(Error::InvalidInput(format!(
                "Invalid parity length (expected {}, found {})",
                self.parity_size,
                parity.len()
            )));
        }
        let mut expected = vec![Bit::Zero; self.parity_size];
        self.encode(&parity[.. self.msg_size], &mut expected)?;
        Ok(expected == parity)
    }

    /// Returns permutation selecting the transmitted parity bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `options.mask` is neither empty nor has one entry per constituent plus
    /// one, or if `options.tail_mask` is neither empty nor has two entries per constituent.
    pub fn puncturing(&self, options: &PunctureOptions) -> Result<Permutation, Error> {
        let num_constituents = self.constituents.len();
        let mask = match options.mask.len() {
            0 => vec![Vec::new(); num_constituents + 1],
            n if n == num_constituents + 1 => options.mask.clone(),
            _ => return Err(Error::InvalidInput("Invalid size for parity mask".to_string())),
        };
        let tail_mask = match options.tail_mask.len() {
            0 => vec![Vec::new(); 2 * num_constituents],
            n if n == 2 * num_constituents => options.tail_mask.clone(),
            _ => return Err(Error::InvalidInput("Invalid size for tail mask".to_string())),
        };
        let fallback = |tail: &[bool], regular: &[bool], tail_index: usize, index: usize| {
            if tail.is_empty() {
                is_kept(regular, index)
            } else {
                is_kept(tail, tail_index)
            }
        };
        let offsets = self.offsets();
        let mut seq = Vec::new();
        match options.bit_ordering {
            BitOrdering::Alternate => {
                for i in 0 .. self.msg_size {
                    if is_kept(&mask[0], i) {
                        seq.push(i);
                    }
                    for (j, constituent) in self.constituents.iter().enumerate() {
                        let width = constituent.trellis().output_width();
                        if i < constituent.length() {
                            seq.extend(
                                (i * width .. (i + 1) * width)
                                    .filter(|&k| is_kept(&mask[j + 1], k))
                                    .map(|k| offsets[j].1 + k),
                            );
                        }
                    }
                }
                for (j, constituent) in self.constituents.iter().enumerate() {
                    let input_width = constituent.trellis().input_width();
                    let output_width = constituent.trellis().output_width();
                    let first_tail_parity = constituent.length() * output_width;
                    for stage in 0 .. constituent.tail_size() {
                        for k in stage * input_width .. (stage + 1) * input_width {
                            let index = offsets[j].0 + k;
                            if fallback(&tail_mask[2 * j], &mask[0], k, index) {
                                seq.push(index);
                            }
                        }
                        for k in stage * output_width .. (stage + 1) * output_width {
                            let local = first_tail_parity + k;
                            if fallback(&tail_mask[2 * j + 1], &mask[j + 1], k, local) {
                                seq.push(offsets[j].1 + local);
                            }
                        }
                    }
                }
            }
            BitOrdering::Group => {
                seq.extend((0 .. self.msg_size).filter(|&i| is_kept(&mask[0], i)));
                for (j, constituent) in self.constituents.iter().enumerate() {
                    let tail_syst_size = constituent.syst_size() - constituent.msg_size();
                    seq.extend(
                        (0 .. tail_syst_size)
                            .filter(|&k| fallback(&tail_mask[2 * j], &mask[0], k, offsets[j].0 + k))
                            .map(|k| offsets[j].0 + k),
                    );
                }
                for (j, constituent) in self.constituents.iter().enumerate() {
                    let first_tail_parity =
                        constituent.length() * constituent.trellis().output_width();
                    seq.extend(
                        (0 .. constituent.parity_size())
                            .filter(|&k| {
                                if k < first_tail_parity {
                                    is_kept(&mask[j + 1], k)
                                } else {
                                    fallback(&tail_mask[2 * j + 1], &mask[j + 1], k - first_tail_parity, k)
                                }
                            })
                            .map(|k| offsets[j].1 + k),
                    );
                }
            }
        }
        Ok(Permutation {
            input_size: self.parity_size,
            seq,
        })
    }
}

/// Returns custom schedule with validated indices, sorted by activated constituent.
fn normalized_scheduling(
    scheduling: SchedulingType,
    num_constituents: usize,
) -> Result<SchedulingType, Error> {
    let SchedulingType::Custom(stages) = scheduling else {
        return Ok(scheduling);
    };
    let mut normalized = Vec::with_capacity(stages.len());
    for stage in stages {
        if stage.activation.len() != stage.transfer.len() {
            return Err(Error::InvalidInput(
                "Invalid scheduling: activation and transfer not the same size".to_string(),
            ));
        }
        if stage.activation.iter().any(|&i| i >= num_constituents) {
            return Err(Error::InvalidInput(
                "Invalid scheduling: activation of an invalid constituent".to_string(),
            ));
        }
        if stage.transfer.iter().flatten().any(|&i| i >= num_constituents) {
            return Err(Error::InvalidInput(
                "Invalid scheduling: transfer from an invalid constituent".to_string(),
            ));
        }
        let mut pairs: Vec<(usize, Vec<usize>)> =
            stage.activation.into_iter().zip(stage.transfer).collect();
        pairs.sort_by_key(|&(i, _)| i);
        let (activation, transfer): (Vec<usize>, Vec<Vec<usize>>) = pairs
            .into_iter()
            .map(|(i, mut sources)| {
                sources.sort_unstable();
                sources.dedup();
                (i, sources)
            })
            .unzip();
        normalized.push(Stage {
            activation,
            transfer,
        });
    }
    Ok(SchedulingType::Custom(normalized))
}

/// Checks shape of a scaling factor table.
fn check_scaling_factor(
    scaling_factor: &[Vec<f64>],
    num_constituents: usize,
    iterations: usize,
) -> Result<(), Error> {
    let valid = (scaling_factor.len() == 1 || scaling_factor.len() == num_constituents)
        && scaling_factor
            .iter()
            .all(|factors| factors.len() == 1 || (!factors.is_empty() && factors.len() == iterations));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput("Wrong size for scaling factor".to_string()))
    }
}

#[cfg(test)]
mod tests_of_structure {
    use super::*;
    use float_eq::assert_float_eq;
    use Bit::{One, Zero};

    fn lte_trellis() -> Trellis {
        Trellis::from_generators(&[4], &[vec![0o15]], &[0o13]).unwrap()
    }

    fn structure(decoder: DecoderOptions) -> Structure {
        let interleavers = vec![
            Permutation::identity(8),
            Permutation::new(vec![3, 0, 5, 6, 1, 7, 2, 4], None).unwrap(),
        ];
        let encoder = EncoderOptions::new(vec![lte_trellis()], interleavers);
        Structure::new(encoder, decoder).unwrap()
    }

    #[test]
    fn test_new() {
        let trellis = lte_trellis();
        // Invalid input
        let encoder = EncoderOptions::new(vec![trellis.clone(); 3], vec![Permutation::identity(4); 2]);
        assert!(Structure::new(encoder, DecoderOptions::default()).is_err());
        let encoder = EncoderOptions::new(vec![trellis.clone()], Vec::new());
        assert!(Structure::new(encoder, DecoderOptions::default()).is_err());
        let encoder = EncoderOptions::new(vec![trellis.clone()], vec![Permutation::default(); 2]);
        assert!(Structure::new(encoder, DecoderOptions::default()).is_err());
        let two_inputs = Trellis::from_generators(&[2, 1], &[vec![0o3], vec![0o1]], &[]).unwrap();
        let encoder = EncoderOptions::new(vec![two_inputs], vec![Permutation::identity(5)]);
        assert!(Structure::new(encoder, DecoderOptions::default()).is_err());
        // Valid input
        let structure = structure(DecoderOptions::default());
        assert_eq!(structure.msg_size(), 8);
        assert_eq!(structure.syst_size(), 14);
        assert_eq!(structure.parity_size(), 36);
        assert_eq!(structure.state_size(), 22);
        assert_eq!(structure.offsets(), [(8, 14), (11, 25)]);
        assert_eq!(structure.algorithm(), DecoderAlgorithm::Linear);
        assert_eq!(structure.constituents()[0].algorithm(), DecoderAlgorithm::Linear);
        // Empty interleaver stands for the identity
        let encoder = EncoderOptions::new(
            vec![trellis],
            vec![Permutation::default(), Permutation::random(6).unwrap()],
        );
        let structure = Structure::new(encoder, DecoderOptions::default()).unwrap();
        assert_eq!(structure.interleavers()[0], Permutation::identity(6));
    }

    #[test]
    fn test_scheduling() {
        let custom = SchedulingType::Custom(vec![Stage {
            activation: vec![1, 0],
            transfer: vec![vec![0], vec![1, 1]],
        }]);
        let structure = structure(DecoderOptions::default().scheduling(custom));
        assert_eq!(
            structure.scheduling(),
            &SchedulingType::Custom(vec![Stage {
                activation: vec![0, 1],
                transfer: vec![vec![1], vec![0]],
            }])
        );
        let encoder = structure.encoder_options();
        for invalid in [
            Stage {
                activation: vec![0, 1],
                transfer: vec![vec![1]],
            },
            Stage {
                activation: vec![2],
                transfer: vec![vec![0]],
            },
            Stage {
                activation: vec![0],
                transfer: vec![vec![2]],
            },
        ] {
            let decoder = DecoderOptions::default().scheduling(SchedulingType::Custom(vec![invalid]));
            assert!(Structure::new(encoder.clone(), decoder).is_err());
        }
    }

    #[test]
    fn test_scaling_factor() {
        let structure = structure(
            DecoderOptions::default()
                .iterations(3)
                .scaling_factor(vec![vec![0.5], vec![0.6, 0.7, 0.8]]),
        );
        assert_float_eq!(structure.scaling_factor(0, 2), 0.5, abs <= 1e-8);
        assert_float_eq!(structure.scaling_factor(1, 0), 0.6, abs <= 1e-8);
        assert_float_eq!(structure.scaling_factor(1, 2), 0.8, abs <= 1e-8);
        assert_float_eq!(structure.scaling_factor(1, 4), 0.7, abs <= 1e-8);
        let encoder = structure.encoder_options();
        for invalid in [
            vec![vec![1.0]; 3],
            vec![vec![1.0, 1.0]],
            vec![Vec::new()],
            Vec::new(),
        ] {
            let decoder = DecoderOptions::default().iterations(3).scaling_factor(invalid);
            assert!(Structure::new(encoder.clone(), decoder).is_err());
        }
    }

    #[test]
    fn test_encode_and_check() {
        let structure = structure(DecoderOptions::default());
        let msg = [One, Zero, Zero, One, One, One, Zero, One];
        let mut parity = vec![Zero; structure.parity_size()];
        assert!(structure.encode(&msg[.. 7], &mut parity).is_err());
        structure.encode(&msg, &mut parity).unwrap();
        assert_eq!(parity[.. 8], msg);
        assert!(structure.check(&parity).unwrap());
        // First constituent matches a standalone encoding of the message.
        let first = &structure.constituents()[0];
        let mut first_parity = vec![Zero; first.parity_size()];
        let mut first_tail = vec![Zero; 3];
        first.encode(&msg, &mut first_parity, Some(first_tail.as_mut_slice())).unwrap();
        assert_eq!(parity[8 .. 11], first_tail);
        assert_eq!(parity[14 .. 25], first_parity);
        for i in [0, 9, 20, 35] {
            let mut corrupted = parity.clone();
            corrupted[i] = if corrupted[i] == One { Zero } else { One };
            assert!(!structure.check(&corrupted).unwrap());
        }
        assert!(structure.check(&parity[1 ..]).is_err());
    }

    #[test]
    fn test_puncturing() {
        let structure = structure(DecoderOptions::default());
        // Rate 1/2: all message bits, alternate parity bits of each constituent
        let options = PunctureOptions {
            mask: vec![vec![true], vec![true, false], vec![false, true]],
            tail_mask: Vec::new(),
            bit_ordering: BitOrdering::Group,
        };
        let perm = structure.puncturing(&options).unwrap();
        assert_eq!(perm.input_size(), 36);
        assert_eq!(
            perm.seq,
            [
                0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 16, 18, 20, 22, 24, 26, 28, 30,
                32, 34
            ]
        );
        let options = PunctureOptions {
            bit_ordering: BitOrdering::Alternate,
            ..options
        };
        let perm = structure.puncturing(&options).unwrap();
        assert_eq!(perm.output_size(), 25);
        assert_eq!(perm.seq[.. 6], [0, 14, 1, 26, 2, 16]);
        let full = structure.puncturing(&PunctureOptions::default()).unwrap();
        assert_eq!(full.output_size(), 36);
        let invalid = PunctureOptions {
            mask: vec![vec![true]],
            ..PunctureOptions::default()
        };
        assert!(structure.puncturing(&invalid).is_err());
    }

    #[test]
    fn test_serde() {
        let structure = structure(DecoderOptions::default().iterations(4));
        let json = serde_json::to_string(&structure).unwrap();
        let restored: Structure = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, structure);
    }
}
