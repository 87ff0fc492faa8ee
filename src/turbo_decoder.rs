//! Iterative decoder for a turbo code

use itertools::izip;
use tracing::trace;

use crate::map_decoder::{MapDecoder, SoftOutputs};
use crate::metric::LogSum;
use crate::turbo::{SchedulingType, Structure};
use crate::Bit;

/// Turbo decoder state for one turbo code structure
///
/// The state buffer holds, for each constituent in turn, one value per systematic bit of that
/// constituent (message in constituent order, then tail). Between activations, each segment
/// holds the latest extrinsic output of its constituent.
#[derive(Debug)]
pub(crate) struct TurboDecoder<'a, L: LogSum> {
    structure: &'a Structure,
    constituents: Vec<MapDecoder<'a, L>>,
    /// Offsets of the tail inputs and parity bits of each constituent in a parity block
    offsets: Vec<(usize, usize)>,
    /// Offset of each constituent's segment in the state buffer
    segments: Vec<usize>,
    state: Vec<f64>,
    snapshot: Vec<f64>,
    /// Channel LLR values of the message bits, plus any prior input
    channel: Vec<f64>,
    /// Prior LLR values of the message bits in message order
    syst: Vec<f64>,
    /// Prior LLR values of the systematic bits of the active constituent
    prior: Vec<f64>,
}

impl<'a, L: LogSum> TurboDecoder<'a, L> {
    /// Returns decoder for given structure.
    pub(crate) fn new(structure: &'a Structure) -> Self {
        let mut segments = Vec::with_capacity(structure.constituents().len());
        let mut state_size = 0;
        for constituent in structure.constituents() {
            segments.push(state_size);
            state_size += constituent.syst_size();
        }
        Self {
            structure,
            constituents: structure.constituents().iter().map(MapDecoder::new).collect(),
            offsets: structure.offsets(),
            segments,
            state: vec![0.0; state_size],
            snapshot: vec![0.0; state_size],
            channel: vec![0.0; structure.msg_size()],
            syst: vec![0.0; structure.msg_size()],
            prior: Vec::new(),
        }
    }

    /// Decodes one block of parity LLR values (`parity_size` of them) into message bits.
    pub(crate) fn decode_block(&mut self, parity: &[f64], msg: &mut [Bit]) {
        self.channel.copy_from_slice(&parity[.. self.structure.msg_size()]);
        self.iterate(parity);
        self.a_posteriori_update();
        for (bit, &llr) in msg.iter_mut().zip(&self.syst) {
            *bit = if llr > 0.0 { Bit::One } else { Bit::Zero };
        }
    }

    /// Decodes one block of parity LLR values into a-posteriori LLR values of the message bits.
    ///
    /// The optional prior input adds to the channel values of the message bits. The extrinsic
    /// output, if requested, is the a-posteriori LLR minus the channel values and the prior input.
    pub(crate) fn so_decode_block(
        &mut self,
        parity: &[f64],
        extrinsic_in: Option<&[f64]>,
        msg: &mut [f64],
        extrinsic_out: Option<&mut [f64]>,
    ) {
        self.channel.copy_from_slice(&parity[.. self.structure.msg_size()]);
        if let Some(extrinsic_in) = extrinsic_in {
            for (x, &e) in self.channel.iter_mut().zip(extrinsic_in) {
                *x += e;
            }
        }
        self.iterate(parity);
        self.a_posteriori_update();
        if let Some(extrinsic_out) = extrinsic_out {
            extrinsic_out.copy_from_slice(&self.syst);
        }
        for (x, &c, &e) in izip!(msg.iter_mut(), &self.channel, &self.syst) {
            *x = c + e;
        }
    }

    /// Runs all decoding iterations on one block.
    fn iterate(&mut self, parity: &[f64]) {
        let structure = self.structure;
        let num_constituents = self.constituents.len();
        self.state.fill(0.0);
        for iteration in 0 .. structure.iterations() {
            match structure.scheduling() {
                SchedulingType::Serial => {
                    for i in 0 .. num_constituents {
                        self.gather(false, (0 .. num_constituents).filter(|&j| j != i));
                        self.load(i, parity);
                        self.activate(i, iteration, parity);
                    }
                }
                SchedulingType::Parallel => {
                    self.snapshot.copy_from_slice(&self.state);
                    for i in 0 .. num_constituents {
                        self.gather(true, (0 .. num_constituents).filter(|&j| j != i));
                        self.load(i, parity);
                    }
                    for i in 0 .. num_constituents {
                        self.activate(i, iteration, parity);
                    }
                }
                SchedulingType::Custom(stages) => {
                    for stage in stages {
                        self.snapshot.copy_from_slice(&self.state);
                        for (&i, sources) in stage.activation.iter().zip(&stage.transfer) {
                            self.gather(true, sources.iter().copied().filter(|&j| j != i));
                            self.load(i, parity);
                        }
                        for &i in &stage.activation {
                            self.activate(i, iteration, parity);
                        }
                    }
                }
            }
            trace!(iteration, "Completed turbo decoding iteration");
        }
    }

    /// Sums the channel values and the deinterleaved extrinsic outputs of `sources` into the
    /// message prior buffer, reading from the snapshot or from the live state.
    fn gather(&mut self, from_snapshot: bool, sources: impl Iterator<Item = usize>) {
        let structure = self.structure;
        let source = if from_snapshot {
            &self.snapshot
        } else {
            &self.state
        };
        self.syst.copy_from_slice(&self.channel);
        for j in sources {
            let msg_size = structure.constituents()[j].msg_size();
            let segment = &source[self.segments[j] .. self.segments[j] + msg_size];
            for (&k, &x) in structure.interleavers()[j].seq.iter().zip(segment) {
                self.syst[k] += x;
            }
        }
    }

    /// Writes the interleaved message prior and the channel values of the tail inputs into the
    /// state segment of constituent `i`.
    fn load(&mut self, i: usize, parity: &[f64]) {
        let constituent = &self.structure.constituents()[i];
        let msg_size = constituent.msg_size();
        let tail_size = constituent.syst_size() - msg_size;
        let segment = &mut self.state[self.segments[i] .. self.segments[i] + constituent.syst_size()];
        let (msg, tail) = segment.split_at_mut(msg_size);
        self.structure.interleavers()[i].permute_into(&self.syst, msg);
        let tail_offset = self.offsets[i].0;
        tail.copy_from_slice(&parity[tail_offset .. tail_offset + tail_size]);
    }

    /// Decodes constituent `i`, replacing its state segment by its extrinsic output.
    fn activate(&mut self, i: usize, iteration: usize, parity: &[f64]) {
        let structure = self.structure;
        let constituent = &structure.constituents()[i];
        let segment = self.segments[i] .. self.segments[i] + constituent.syst_size();
        self.prior.clear();
        self.prior.extend_from_slice(&self.state[segment.clone()]);
        let parity_offset = self.offsets[i].1;
        let decoder = &mut self.constituents[i];
        decoder.set_scaling_factor(structure.scaling_factor(i, iteration));
        decoder.so_decode(
            &parity[parity_offset .. parity_offset + constituent.parity_size()],
            Some(self.prior.as_slice()),
            SoftOutputs {
                syst: Some(&mut self.state[segment]),
                ..SoftOutputs::default()
            },
        );
    }

    /// Sums the deinterleaved message extrinsic outputs of all constituents into the message
    /// prior buffer.
    fn a_posteriori_update(&mut self) {
        let structure = self.structure;
        self.syst.fill(0.0);
        for (constituent, interleaver, &offset) in
            izip!(structure.constituents(), structure.interleavers(), &self.segments)
        {
            let segment = &self.state[offset .. offset + constituent.msg_size()];
            for (&k, &x) in interleaver.seq.iter().zip(segment) {
                self.syst[k] += x;
            }
        }
    }
}

#[cfg(test)]
mod tests_of_turbo_decoder {
    use float_eq::assert_float_eq;

    use super::*;
    use crate::metric::{ApproximateLogSum, ExactLogSum, LinearLogSum};
    use crate::turbo::{DecoderOptions, EncoderOptions, Stage};
    use crate::{DecoderAlgorithm, Permutation, Trellis};
    use Bit::{One, Zero};

    const MSG: [Bit; 12] = [One, Zero, Zero, One, One, One, Zero, One, Zero, Zero, One, Zero];

    fn structure(decoder: DecoderOptions) -> Structure {
        let trellis = Trellis::from_generators(&[4], &[vec![0o15]], &[0o13]).unwrap();
        let interleavers = vec![
            Permutation::identity(12),
            Permutation::new(vec![7, 2, 9, 0, 11, 4, 1, 8, 3, 10, 5, 6], None).unwrap(),
        ];
        Structure::new(EncoderOptions::new(vec![trellis], interleavers), decoder).unwrap()
    }

    fn llr_of(code: &[Bit]) -> Vec<f64> {
        code.iter()
            .map(|&b| if b == One { 4.0 } else { -4.0 })
            .collect()
    }

    fn channel(structure: &Structure) -> Vec<f64> {
        let mut code = vec![Zero; structure.parity_size()];
        structure.encode(&MSG, &mut code).unwrap();
        llr_of(&code)
    }

    fn hard_decode<L: LogSum>(structure: &Structure, llr: &[f64]) -> Vec<Bit> {
        let mut decoder = TurboDecoder::<L>::new(structure);
        let mut msg = vec![Zero; structure.msg_size()];
        decoder.decode_block(llr, &mut msg);
        msg
    }

    fn soft_decode(
        structure: &Structure,
        llr: &[f64],
        extrinsic_in: Option<&[f64]>,
    ) -> (Vec<f64>, Vec<f64>) {
        let mut decoder = TurboDecoder::<LinearLogSum>::new(structure);
        let mut msg = vec![0.0; structure.msg_size()];
        let mut extrinsic = vec![0.0; structure.msg_size()];
        decoder.so_decode_block(llr, extrinsic_in, &mut msg, Some(extrinsic.as_mut_slice()));
        (msg, extrinsic)
    }

    #[test]
    fn test_noiseless() {
        let custom = SchedulingType::Custom(vec![
            Stage {
                activation: vec![0],
                transfer: vec![vec![1]],
            },
            Stage {
                activation: vec![1],
                transfer: vec![vec![0]],
            },
        ]);
        for scheduling in [SchedulingType::Serial, SchedulingType::Parallel, custom] {
            for algorithm in [
                DecoderAlgorithm::Exact,
                DecoderAlgorithm::Linear,
                DecoderAlgorithm::Approximate,
            ] {
                let structure = structure(
                    DecoderOptions::default()
                        .scheduling(scheduling.clone())
                        .algorithm(algorithm),
                );
                let llr = channel(&structure);
                assert_eq!(hard_decode::<ExactLogSum>(&structure, &llr), MSG);
                assert_eq!(hard_decode::<LinearLogSum>(&structure, &llr), MSG);
                assert_eq!(hard_decode::<ApproximateLogSum>(&structure, &llr), MSG);
            }
        }
    }

    #[test]
    fn test_corrects_weak_error() {
        let structure = structure(DecoderOptions::default());
        let mut llr = channel(&structure);
        llr[3] = -1.0;
        llr[8] = 1.0;
        assert_eq!(hard_decode::<LinearLogSum>(&structure, &llr), MSG);
    }

    #[test]
    fn test_custom_matches_serial() {
        let serial = structure(DecoderOptions::default().iterations(3));
        let custom = structure(DecoderOptions::default().iterations(3).scheduling(
            SchedulingType::Custom(vec![
                Stage {
                    activation: vec![0],
                    transfer: vec![vec![1]],
                },
                Stage {
                    activation: vec![1],
                    transfer: vec![vec![0]],
                },
            ]),
        ));
        let mut llr = channel(&serial);
        llr[5] = 0.3;
        assert_eq!(soft_decode(&serial, &llr, None), soft_decode(&custom, &llr, None));
    }

    #[test]
    fn test_extrinsic() {
        let structure = structure(DecoderOptions::default());
        let mut llr = channel(&structure);
        llr[2] = 0.5;
        let (msg, extrinsic) = soft_decode(&structure, &llr, None);
        for i in 0 .. MSG.len() {
            assert_float_eq!(msg[i], llr[i] + extrinsic[i], abs <= 1e-9);
            assert_eq!(Bit::from_llr(msg[i]), MSG[i]);
        }
        // A zero prior input changes nothing.
        let zeros = vec![0.0; structure.msg_size()];
        assert_eq!(soft_decode(&structure, &llr, Some(zeros.as_slice())), (msg.clone(), extrinsic.clone()));
        // A prior input is not echoed in the extrinsic output.
        let prior = vec![0.25; structure.msg_size()];
        let (msg_with_prior, extrinsic_with_prior) = soft_decode(&structure, &llr, Some(prior.as_slice()));
        for i in 0 .. MSG.len() {
            assert_float_eq!(
                msg_with_prior[i],
                llr[i] + prior[i] + extrinsic_with_prior[i],
                abs <= 1e-9
            );
        }
        // Decoding twice gives identical results.
        assert_eq!(
            soft_decode(&structure, &llr, Some(prior.as_slice())),
            (msg_with_prior, extrinsic_with_prior)
        );
    }

    #[test]
    fn test_scaling_factor() {
        let mut llr = channel(&structure(DecoderOptions::default()));
        llr[4] = 0.2;
        let zero_scaled = structure(DecoderOptions::default().scaling_factor(vec![vec![0.0]]));
        let (msg, extrinsic) = soft_decode(&zero_scaled, &llr, None);
        assert_eq!(extrinsic, vec![0.0; MSG.len()]);
        assert_eq!(msg, llr[.. MSG.len()].to_vec());
    }
}
