//! Soft-output decoder for a convolutional code (BCJR forward-backward algorithm)

use crate::bit_field::BitField;
use crate::convolutional::{Structure, Termination};
use crate::metric::{correlation, LogSum, INF};

/// Destination buffers for the soft outputs of [`MapDecoder::so_decode`]
///
/// Every buffer that is present is filled; lengths are in bits.
#[derive(Debug, Default)]
pub(crate) struct SoftOutputs<'o> {
    /// A-posteriori LLR values of the message bits (`msg_size` of them)
    pub(crate) msg: Option<&'o mut [f64]>,
    /// Extrinsic LLR values of the systematic bits, message first and then tail (at most
    /// `syst_size` of them; a shorter buffer receives the leading values)
    pub(crate) syst: Option<&'o mut [f64]>,
    /// Extrinsic LLR values of the parity bits (`parity_size` of them)
    pub(crate) parity: Option<&'o mut [f64]>,
}

/// BCJR decoder state for one convolutional code structure
///
/// The scratch buffers are sized from the structure once and reused for every block.
#[derive(Debug)]
pub(crate) struct MapDecoder<'a, L: LogSum> {
    structure: &'a Structure,
    log_sum: L,
    scaling_factor: f64,
    /// Branch metric for each stage and `(state, input)` pair
    branch: Vec<f64>,
    /// Forward metric for each state, before each stage and after the last one
    forward: Vec<f64>,
    /// Backward metric for each state, before each stage and after the last one
    backward: Vec<f64>,
    /// Largest candidate metric per state in a reduction
    max_metric: Vec<f64>,
    /// Accumulated candidates per state in a reduction
    accum: Vec<f64>,
    /// Metrics of the output symbols at one stage
    output_metric: Vec<f64>,
    /// Metrics of the input symbols at one stage
    input_metric: Vec<f64>,
}

impl<'a, L: LogSum> MapDecoder<'a, L> {
    /// Returns decoder for given structure.
    pub(crate) fn new(structure: &'a Structure) -> Self {
        let trellis = structure.trellis();
        let num_stages = structure.length() + structure.tail_size();
        let table_size = trellis.state_count() * trellis.input_count();
        Self {
            structure,
            log_sum: L::default(),
            scaling_factor: structure.scaling_factor(),
            branch: vec![0.0; num_stages * table_size],
            forward: vec![0.0; (num_stages + 1) * trellis.state_count()],
            backward: vec![0.0; (num_stages + 1) * trellis.state_count()],
            max_metric: vec![-INF; trellis.state_count()],
            accum: vec![0.0; trellis.state_count()],
            output_metric: vec![0.0; trellis.output_count()],
            input_metric: vec![0.0; trellis.input_count()],
        }
    }

    /// Overrides the scaling factor of the structure for subsequent calls.
    pub(crate) fn set_scaling_factor(&mut self, scaling_factor: f64) {
        self.scaling_factor = scaling_factor;
    }

    /// Decodes one block.
    ///
    /// # Parameters
    ///
    /// - `parity`: LLR values of the parity bits (`parity_size` of them).
    ///
    /// - `syst`: Optional prior LLR values of the systematic bits. Positions beyond the end of the
    ///   slice (such as tail inputs) have no prior information.
    ///
    /// - `outputs`: Buffers for the soft outputs.
    pub(crate) fn so_decode(
        &mut self,
        parity: &[f64],
        syst: Option<&[f64]>,
        outputs: SoftOutputs<'_>,
    ) {
        self.branch_update(parity, syst);
        self.forward_update();
        self.backward_update();
        self.a_posteriori_update(parity, syst, outputs);
    }

    /// Computes branch metrics of all stages.
    fn branch_update(&mut self, parity: &[f64], syst: Option<&[f64]>) {
        let structure = self.structure;
        let trellis = structure.trellis();
        let input_width = trellis.input_width();
        let table_size = trellis.state_count() * trellis.input_count();
        for (stage, (branch, parity)) in self
            .branch
            .chunks_exact_mut(table_size)
            .zip(parity.chunks_exact(trellis.output_width()))
            .enumerate()
        {
            for (symbol, metric) in self.output_metric.iter_mut().enumerate() {
                *metric = correlation(symbol, parity);
            }
            for (symbol, metric) in self.input_metric.iter_mut().enumerate() {
                *metric = syst.map_or(0.0, |syst| {
                    (0 .. input_width)
                        .filter(|&k| BitField(symbol).test(k))
                        .map(|k| syst_prior(syst, stage * input_width + k))
                        .sum()
                });
            }
            for (t, metric) in branch.iter_mut().enumerate() {
                let (state, input) = (t / trellis.input_count(), t % trellis.input_count());
                *metric = self.output_metric[trellis.output(state, input)] + self.input_metric[input];
            }
        }
    }

    /// Computes forward metrics of all stages.
    fn forward_update(&mut self) {
        let structure = self.structure;
        let trellis = structure.trellis();
        let state_count = trellis.state_count();
        let table_size = state_count * trellis.input_count();
        self.forward[.. state_count].fill(-INF);
        self.forward[0] = 0.0;
        for (stage, branch) in self.branch.chunks_exact(table_size).enumerate() {
            let (done, rest) = self.forward.split_at_mut((stage + 1) * state_count);
            let current = &done[stage * state_count ..];
            let next = &mut rest[.. state_count];
            // Largest candidate per next state
            self.max_metric.fill(-INF);
            for (t, &b) in branch.iter().enumerate() {
                let (state, input) = (t / trellis.input_count(), t % trellis.input_count());
                let target = trellis.next_state(state, input);
                self.max_metric[target] = self.max_metric[target].max(current[state] + b);
            }
            self.accum.fill(self.log_sum.zero());
            for (t, &b) in branch.iter().enumerate() {
                let (state, input) = (t / trellis.input_count(), t % trellis.input_count());
                let target = trellis.next_state(state, input);
                self.accum[target] = self.log_sum.sum(
                    self.accum[target],
                    self.log_sum.prior(current[state] + b, self.max_metric[target]),
                );
            }
            for ((x, &acc), &max) in next.iter_mut().zip(&self.accum).zip(&self.max_metric) {
                *x = self.log_sum.post(acc, max);
            }
            renormalize(next);
        }
    }

    /// Computes backward metrics of all stages.
    fn backward_update(&mut self) {
        let structure = self.structure;
        let trellis = structure.trellis();
        let state_count = trellis.state_count();
        let input_count = trellis.input_count();
        let table_size = state_count * input_count;
        let num_stages = self.branch.len() / table_size;
        let last = &mut self.backward[num_stages * state_count ..];
        match structure.termination() {
            Termination::Tail => {
                last.fill(-INF);
                last[0] = 0.0;
            }
            Termination::Truncate => last.fill(0.0),
        }
        for (stage, branch) in self.branch.chunks_exact(table_size).enumerate().rev() {
            let (current, done) = self.backward.split_at_mut((stage + 1) * state_count);
            let current = &mut current[stage * state_count ..];
            let next = &done[.. state_count];
            for (state, (x, branch)) in current
                .iter_mut()
                .zip(branch.chunks_exact(input_count))
                .enumerate()
            {
                let candidate = |input: usize| next[trellis.next_state(state, input)] + branch[input];
                let max = (0 .. input_count).map(&candidate).fold(-INF, f64::max);
                let acc = (0 .. input_count).fold(self.log_sum.zero(), |acc, input| {
                    self.log_sum.sum(acc, self.log_sum.prior(candidate(input), max))
                });
                *x = self.log_sum.post(acc, max);
            }
            renormalize(current);
        }
    }

    /// Combines all metrics into soft outputs.
    fn a_posteriori_update(
        &mut self,
        parity: &[f64],
        syst: Option<&[f64]>,
        outputs: SoftOutputs<'_>,
    ) {
        let structure = self.structure;
        let trellis = structure.trellis();
        let state_count = trellis.state_count();
        let input_count = trellis.input_count();
        let input_width = trellis.input_width();
        let output_width = trellis.output_width();
        let table_size = state_count * input_count;
        let SoftOutputs {
            mut msg,
            syst: mut syst_out,
            parity: mut parity_out,
        } = outputs;
        for (stage, joint) in self.branch.chunks_exact_mut(table_size).enumerate() {
            let forward = &self.forward[stage * state_count .. (stage + 1) * state_count];
            let backward = &self.backward[(stage + 1) * state_count .. (stage + 2) * state_count];
            for (t, metric) in joint.iter_mut().enumerate() {
                let (state, input) = (t / input_count, t % input_count);
                *metric += forward[state] + backward[trellis.next_state(state, input)];
            }
            let joint = &*joint;
            for k in 0 .. input_width {
                let index = stage * input_width + k;
                let wants_syst = syst_out.as_ref().is_some_and(|out| index < out.len());
                let wants_msg = msg.is_some() && stage < structure.length();
                if !wants_syst && !wants_msg {
                    continue;
                }
                let llr = marginal_llr(&self.log_sum, joint, |t| BitField(t % input_count).test(k));
                if let Some(out) = syst_out.as_deref_mut().filter(|_| wants_syst) {
                    let prior = syst.map_or(0.0, |syst| syst_prior(syst, index));
                    out[index] = self.scaling_factor * (llr - prior);
                }
                if let Some(out) = msg.as_deref_mut().filter(|_| wants_msg) {
                    out[index] = self.scaling_factor * llr;
                }
            }
            if let Some(out) = parity_out.as_deref_mut() {
                for k in 0 .. output_width {
                    let index = stage * output_width + k;
                    let llr = marginal_llr(&self.log_sum, joint, |t| {
                        BitField(trellis.output(t / input_count, t % input_count)).test(k)
                    });
                    out[index] = self.scaling_factor * (llr - parity[index]);
                }
            }
        }
    }
}

/// Returns prior LLR of a systematic bit, or `0` past the end of the prior values.
fn syst_prior(syst: &[f64], index: usize) -> f64 {
    syst.get(index).copied().unwrap_or(0.0)
}

/// Subtracts the largest metric from all metrics.
fn renormalize(metrics: &mut [f64]) {
    let max = metrics.iter().copied().fold(-INF, f64::max);
    metrics.iter_mut().for_each(|x| *x -= max);
}

/// Returns LLR of a bit given joint metrics of all `(state, input)` pairs of a stage.
fn marginal_llr<L: LogSum>(log_sum: &L, joint: &[f64], bit_of: impl Fn(usize) -> bool) -> f64 {
    let mut max = [-INF; 2];
    for (t, &m) in joint.iter().enumerate() {
        let b = usize::from(bit_of(t));
        max[b] = max[b].max(m);
    }
    let mut acc = [log_sum.zero(); 2];
    for (t, &m) in joint.iter().enumerate() {
        let b = usize::from(bit_of(t));
        acc[b] = log_sum.sum(acc[b], log_sum.prior(m, max[b]));
    }
    log_sum.post(acc[1], max[1]) - log_sum.post(acc[0], max[0])
}
