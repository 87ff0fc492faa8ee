//! Hard-decision maximum-likelihood decoder for a convolutional code

use crate::bit_field::BitField;
use crate::convolutional::{Structure, Termination};
use crate::metric::{correlation, INF};
use crate::Bit;

/// Viterbi decoder state for one convolutional code structure
#[derive(Debug)]
pub(crate) struct ViterbiDecoder<'a> {
    structure: &'a Structure,
    /// Path metric of each state before the current stage
    path_metric: Vec<f64>,
    /// Path metric of each state after the current stage
    next_metric: Vec<f64>,
    /// Metrics of the output symbols at one stage
    output_metric: Vec<f64>,
    /// Surviving `(state, input)` transition into each state, for each stage
    survivors: Vec<usize>,
}

impl<'a> ViterbiDecoder<'a> {
    /// Returns decoder for given structure.
    pub(crate) fn new(structure: &'a Structure) -> Self {
        let trellis = structure.trellis();
        let num_stages = structure.length() + structure.tail_size();
        Self {
            structure,
            path_metric: vec![-INF; trellis.state_count()],
            next_metric: vec![-INF; trellis.state_count()],
            output_metric: vec![0.0; trellis.output_count()],
            survivors: vec![0; num_stages * trellis.state_count()],
        }
    }

    /// Decodes one block of parity LLR values (`parity_size` of them) into message bits
    /// (`msg_size` of them).
    pub(crate) fn decode(&mut self, parity: &[f64], msg: &mut [Bit]) {
        let structure = self.structure;
        let trellis = structure.trellis();
        let state_count = trellis.state_count();
        let input_count = trellis.input_count();
        let input_width = trellis.input_width();
        self.path_metric.fill(-INF);
        self.path_metric[0] = 0.0;
        for (parity, survivors) in parity
            .chunks_exact(trellis.output_width())
            .zip(self.survivors.chunks_exact_mut(state_count))
        {
            for (symbol, metric) in self.output_metric.iter_mut().enumerate() {
                *metric = correlation(symbol, parity);
            }
            self.next_metric.fill(-INF);
            for t in 0 .. state_count * input_count {
                let (state, input) = (t / input_count, t % input_count);
                let target = trellis.next_state(state, input);
                let metric = self.path_metric[state] + self.output_metric[trellis.output(state, input)];
                if metric >= self.next_metric[target] {
                    self.next_metric[target] = metric;
                    survivors[target] = t;
                }
            }
            let max = self.next_metric.iter().copied().fold(-INF, f64::max);
            self.next_metric.iter_mut().for_each(|x| *x -= max);
            std::mem::swap(&mut self.path_metric, &mut self.next_metric);
        }
        let mut state = match structure.termination() {
            Termination::Tail => 0,
            Termination::Truncate => best_state(&self.path_metric),
        };
        for (stage, survivors) in self.survivors.chunks_exact(state_count).enumerate().rev() {
            let t = survivors[state];
            if stage < structure.length() {
                BitField(t % input_count)
                    .write_bits(&mut msg[stage * input_width .. (stage + 1) * input_width]);
            }
            state = t / input_count;
        }
    }
}

/// Returns index of the first state with the largest path metric.
fn best_state(path_metric: &[f64]) -> usize {
    path_metric
        .iter()
        .enumerate()
        .fold((0, -INF), |(best, best_metric), (state, &metric)| {
            if metric > best_metric {
                (state, metric)
            } else {
                (best, best_metric)
            }
        })
        .0
}
