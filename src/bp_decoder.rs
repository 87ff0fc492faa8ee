//! Belief propagation decoder for an LDPC code

use itertools::izip;
use tracing::trace;

use crate::ldpc::Structure;
use crate::metric::BoxSum;
use crate::Bit;

/// Belief propagation decoder state for one LDPC code structure
///
/// Messages live on the nonzero entries of the parity-check matrix, row by row. After a check
/// update an entry holds the check-to-bit message, and after a bit update it holds the
/// bit-to-check message.
#[derive(Debug)]
pub(crate) struct BpDecoder<'a, B: BoxSum> {
    structure: &'a Structure,
    box_sum: B,
    /// Column of each entry
    cols: Vec<usize>,
    /// Offset of the first entry of each row, followed by the entry count
    row_starts: Vec<usize>,
    /// Channel LLR values of the code bits, plus any prior input
    channel: Vec<f64>,
    messages: Vec<f64>,
    /// Scratch copy of the messages
    buffer: Vec<f64>,
    /// Running sum per code bit
    bit_metric: Vec<f64>,
    hard: Vec<Bit>,
}

impl<'a, B: BoxSum> BpDecoder<'a, B> {
    /// Returns decoder for given structure.
    pub(crate) fn new(structure: &'a Structure) -> Self {
        let checks = structure.checks();
        let cols: Vec<usize> = checks.row_entries().iter().flatten().copied().collect();
        let mut row_starts = Vec::with_capacity(checks.rows() + 1);
        row_starts.push(0);
        for row in checks.row_entries() {
            row_starts.push(row_starts[row_starts.len() - 1] + row.len());
        }
        Self {
            structure,
            box_sum: B::default(),
            messages: vec![0.0; cols.len()],
            buffer: vec![0.0; cols.len()],
            cols,
            row_starts,
            channel: vec![0.0; checks.cols()],
            bit_metric: vec![0.0; checks.cols()],
            hard: vec![Bit::Zero; checks.cols()],
        }
    }

    /// Decodes one block of code bit LLR values (`parity_size` of them) into message bits.
    pub(crate) fn decode_block(&mut self, parity: &[f64], msg: &mut [Bit]) {
        self.channel.copy_from_slice(parity);
        self.iterate();
        for (bit, &llr) in msg.iter_mut().zip(&self.bit_metric) {
            *bit = Bit::from_llr(llr);
        }
    }

    /// Decodes one block of code bit LLR values into a-posteriori LLR values of the message bits.
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
        self.channel.copy_from_slice(parity);
        if let Some(extrinsic_in) = extrinsic_in {
            for (x, &e) in self.channel.iter_mut().zip(extrinsic_in) {
                *x += e;
            }
        }
        self.iterate();
        msg.copy_from_slice(&self.bit_metric[.. msg.len()]);
        if let Some(extrinsic_out) = extrinsic_out {
            for (x, &llr, &c) in izip!(extrinsic_out.iter_mut(), &self.bit_metric, &self.channel) {
                *x = llr - c;
            }
        }
    }

    /// Runs belief propagation, leaving the a-posteriori LLR values in `bit_metric`.
    fn iterate(&mut self) {
        let structure = self.structure;
        for (m, &col) in self.messages.iter_mut().zip(&self.cols) {
            *m = self.channel[col];
        }
        let iterations = structure.iterations();
        // Index of the iteration whose check update ends decoding
        let mut last = iterations - 1;
        for iteration in 0 .. iterations - 1 {
            self.check_update(iteration);
            self.bit_update();
            for (bit, &llr) in self.hard.iter_mut().zip(&self.bit_metric) {
                *bit = Bit::from_llr(llr);
            }
            if structure.satisfies(&self.hard) {
                trace!(iteration, "Belief propagation converged");
                last = iteration + 1;
                break;
            }
        }
        self.check_update(last);
        self.bit_metric.copy_from_slice(&self.channel);
        for (&m, &col) in self.messages.iter().zip(&self.cols) {
            self.bit_metric[col] += m;
        }
    }

    /// Replaces bit-to-check messages by check-to-bit messages.
    fn check_update(&mut self, iteration: usize) {
        let structure = self.structure;
        let box_sum = &self.box_sum;
        for range in self.row_starts.windows(2) {
            let messages = &mut self.messages[range[0] .. range[1]];
            let prefix = &mut self.buffer[range[0] .. range[1]];
            let scaling_factor = structure.scaling_factor(iteration, messages.len());
            // Box-sum of the messages before each entry
            let mut acc = box_sum.one();
            for (p, &m) in prefix.iter_mut().zip(messages.iter()) {
                *p = acc;
                acc = box_sum.sum(acc, box_sum.prior(m));
            }
            // Combined with the box-sum of the messages after each entry
            let mut acc = box_sum.one();
            for (m, &p) in messages.iter_mut().zip(prefix.iter()).rev() {
                let prior = box_sum.prior(*m);
                *m = scaling_factor * box_sum.post(box_sum.sum(p, acc));
                acc = box_sum.sum(acc, prior);
            }
        }
    }

    /// Replaces check-to-bit messages by bit-to-check messages, leaving the total LLR value of
    /// each code bit in `bit_metric`.
    fn bit_update(&mut self) {
        // Sum of the messages before each entry of the same column
        self.bit_metric.fill(0.0);
        for ((m, b), &col) in self.messages.iter_mut().zip(&mut self.buffer).zip(&self.cols) {
            *b = *m;
            *m = self.bit_metric[col];
            self.bit_metric[col] += *b;
        }
        // Plus the channel value and the messages after each entry
        self.bit_metric.copy_from_slice(&self.channel);
        for ((m, &b), &col) in self.messages.iter_mut().zip(&self.buffer).zip(&self.cols).rev() {
            *m += self.bit_metric[col];
            self.bit_metric[col] += b;
        }
    }
}

#[cfg(test)]
mod tests_of_bp_decoder {
    use std::collections::BTreeMap;

    use float_eq::assert_float_eq;

    use super::*;
    use crate::ldpc::{DecoderOptions, EncoderOptions, SparseBitMatrix};
    use crate::metric::{ApproximateBoxSum, ExactBoxSum, LinearBoxSum};
    use Bit::{One, Zero};

    const MSG: [Bit; 4] = [One, Zero, One, One];

    fn structure(options: DecoderOptions) -> Structure {
        let checks = SparseBitMatrix::new(
            7,
            vec![vec![0, 1, 3, 4], vec![0, 2, 3, 5], vec![1, 2, 3, 6]],
        )
        .unwrap();
        Structure::new(EncoderOptions::new(checks), options).unwrap()
    }

    fn channel(structure: &Structure) -> Vec<f64> {
        let mut code = vec![Zero; structure.parity_size()];
        structure.encode(&MSG, &mut code).unwrap();
        code.iter()
            .map(|&b| if b == One { 4.0 } else { -4.0 })
            .collect()
    }

    fn hard_decode<B: BoxSum>(structure: &Structure, llr: &[f64]) -> Vec<Bit> {
        let mut decoder = BpDecoder::<B>::new(structure);
        let mut msg = vec![Zero; structure.msg_size()];
        decoder.decode_block(llr, &mut msg);
        msg
    }

    #[test]
    fn test_noiseless() {
        for iterations in [1, 5] {
            let structure = structure(DecoderOptions::default().iterations(iterations));
            let llr = channel(&structure);
            assert_eq!(hard_decode::<ExactBoxSum>(&structure, &llr), MSG);
            assert_eq!(hard_decode::<LinearBoxSum>(&structure, &llr), MSG);
            assert_eq!(hard_decode::<ApproximateBoxSum>(&structure, &llr), MSG);
        }
    }

    #[test]
    fn test_early_exit_uses_next_iteration_scaling() {
        // A noiseless block satisfies all checks after the first iteration, so the final check
        // update is the second one whatever the iteration limit.
        let factors = [1.0, 0.5, 0.25, 0.125, 0.0625];
        let decode = |iterations: usize| {
            let structure = structure(
                DecoderOptions::default()
                    .iterations(iterations)
                    .scaling_factor(BTreeMap::from([(4, factors[.. iterations].to_vec())])),
            );
            let llr = channel(&structure);
            let mut decoder = BpDecoder::<ExactBoxSum>::new(&structure);
            let mut msg = vec![0.0; structure.msg_size()];
            let mut extrinsic = vec![0.0; structure.msg_size()];
            decoder.so_decode_block(&llr, None, &mut msg, Some(extrinsic.as_mut_slice()));
            extrinsic
        };
        let early = decode(5);
        assert_float_eq!(early, decode(2), abs_all <= 1e-12);
        assert!(early.iter().all(|&x| x != 0.0));
    }

    #[test]
    fn test_corrects_weak_error() {
        let structure = structure(DecoderOptions::default().iterations(10));
        for i in 0 .. 7 {
            let mut llr = channel(&structure);
            llr[i] = -llr[i].signum();
            assert_eq!(hard_decode::<ExactBoxSum>(&structure, &llr), MSG);
            assert_eq!(hard_decode::<ApproximateBoxSum>(&structure, &llr), MSG);
        }
    }

    #[test]
    fn test_single_iteration() {
        // With one iteration, each check sends the min-sum of the channel values of its other bits.
        let structure = structure(DecoderOptions::default().iterations(1));
        let llr = [-1.0, 2.0, -3.0, 0.5, -2.5, 1.5, -0.5];
        let mut decoder = BpDecoder::<ApproximateBoxSum>::new(&structure);
        let mut msg = vec![0.0; 4];
        let mut extrinsic = vec![0.0; 4];
        decoder.so_decode_block(&llr, None, &mut msg, Some(extrinsic.as_mut_slice()));
        // Bit 0 is in checks {0, 1, 3, 4} and {0, 2, 3, 5}.
        assert_float_eq!(extrinsic[0], -0.5 - 0.5, abs <= 1e-8);
        assert_float_eq!(msg[0], -1.0 - 1.0, abs <= 1e-8);
        // Bit 3 is in all three checks.
        assert_float_eq!(extrinsic[3], 1.0 + 1.0 + 0.5, abs <= 1e-8);
    }

    #[test]
    fn test_extrinsic() {
        let structure = structure(DecoderOptions::default().iterations(4));
        let mut llr = channel(&structure);
        llr[1] = 0.5;
        let mut decoder = BpDecoder::<LinearBoxSum>::new(&structure);
        let mut msg = vec![0.0; 4];
        let mut extrinsic = vec![0.0; 4];
        let prior = [0.25, -0.5, 0.0, 1.0];
        decoder.so_decode_block(&llr, Some(&prior[..]), &mut msg, Some(extrinsic.as_mut_slice()));
        for i in 0 .. 4 {
            assert_float_eq!(msg[i], llr[i] + prior[i] + extrinsic[i], abs <= 1e-9);
            assert_eq!(Bit::from_llr(msg[i]), MSG[i]);
        }
        let mut again = vec![0.0; 4];
        decoder.so_decode_block(&llr, Some(&prior[..]), &mut again, None);
        assert_eq!(again, msg);
    }
}
