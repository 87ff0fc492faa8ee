//! Trellis of a convolutional code

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::bit_field::BitField;
use crate::Error;

/// Largest number of bits indexing a trellis table
const MAX_TABLE_WIDTH: usize = 24;

/// Lookup tables mapping `(state, input)` to next state and output symbol
///
/// Symbols are integers whose bit `k` is bit `k` of the corresponding input, output or state word.
/// Both tables are indexed by `state * input_count + input`.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(try_from = "TrellisTables", into = "TrellisTables")]
pub struct Trellis {
    state_width: usize,
    input_width: usize,
    output_width: usize,
    next_state: Vec<usize>,
    output: Vec<usize>,
}

/// Serialized form of [`Trellis`]
#[derive(Clone, Deserialize, Serialize)]
struct TrellisTables {
    state_width: usize,
    input_width: usize,
    output_width: usize,
    next_state: Vec<usize>,
    output: Vec<usize>,
}

impl TryFrom<TrellisTables> for Trellis {
    type Error = Error;

    fn try_from(tables: TrellisTables) -> Result<Self, Error> {
        Self::new(
            tables.next_state,
            tables.output,
            tables.state_width,
            tables.input_width,
            tables.output_width,
        )
    }
}

impl From<Trellis> for TrellisTables {
    fn from(trellis: Trellis) -> Self {
        Self {
            state_width: trellis.state_width,
            input_width: trellis.input_width,
            output_width: trellis.output_width,
            next_state: trellis.next_state,
            output: trellis.output,
        }
    }
}

impl Trellis {
    /// Returns trellis from explicit next-state and output tables.
    ///
    /// # Parameters
    ///
    /// - `next_state`: Next state for each `(state, input)` pair, at index
    ///   `state * 2^input_width + input`.
    ///
    /// - `output`: Output symbol for each `(state, input)` pair, with the same indexing.
    ///
    /// - `state_width`, `input_width`, `output_width`: Number of bits in a state, an input symbol
    ///   and an output symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if a table does not have `2^state_width * 2^input_width` entries, or if an
    /// entry is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecl::Trellis;
    ///
    /// // Two-state accumulator: next state and output both equal `state ^ input`.
    /// let trellis = Trellis::new(vec![0, 1, 1, 0], vec![0, 1, 1, 0], 1, 1, 1)?;
    /// assert_eq!(trellis.next_state(1, 1), 0);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(
        next_state: Vec<usize>,
        output: Vec<usize>,
        state_width: usize,
        input_width: usize,
        output_width: usize,
    ) -> Result<Self, Error> {
        if input_width == 0 || output_width == 0 {
            return Err(Error::InvalidInput(
                "Trellis input and output widths must be positive".to_string(),
            ));
        }
        if state_width + input_width > MAX_TABLE_WIDTH || output_width > MAX_TABLE_WIDTH {
            return Err(Error::InvalidInput(format!(
                "Trellis widths exceed {MAX_TABLE_WIDTH} bits"
            )));
        }
        let num_transitions = (1 << state_width) * (1 << input_width);
        if next_state.len() != num_transitions || output.len() != num_transitions {
            return Err(Error::InvalidInput(format!(
                "Expected {num_transitions} entries in trellis tables (found {} and {})",
                next_state.len(),
                output.len()
            )));
        }
        if next_state.iter().any(|&s| s >= 1 << state_width) {
            return Err(Error::InvalidInput(format!(
                "Next state table has entries out of range [0, {})",
                1 << state_width
            )));
        }
        if output.iter().any(|&y| y >= 1 << output_width) {
            return Err(Error::InvalidInput(format!(
                "Output table has entries out of range [0, {})",
                1 << output_width
            )));
        }
        Ok(Self {
            state_width,
            input_width,
            output_width,
            next_state,
            output,
        })
    }

    /// Returns trellis of a shift-register encoder described by generator polynomials.
    ///
    /// # Parameters
    ///
    /// - `constraint_lengths`: Constraint length `K` of each input stream.
    ///
    /// - `generators`: For each input stream, one polynomial per output bit. Bit `K-1` of a
    ///   polynomial connects the (feedback-adjusted) input to the output, and bit `j < K-1`
    ///   connects register `j`, where register `K-2` holds the most recent input.
    ///
    /// - `feedback`: For each input stream, the feedback polynomial, using the same bit
    ///   convention (bit `K-1` must be set). Pass an empty slice for a feedforward encoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of generators or feedback polynomials does not match the
    /// number of input streams, if the streams disagree on the number of outputs, if a polynomial
    /// has bits beyond position `K-1`, or if a feedback polynomial does not have bit `K-1` set.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecl::Trellis;
    ///
    /// // Rate-1/2 feedforward code with constraint length 3
    /// let trellis = Trellis::from_generators(&[3], &[vec![0o4, 0o5]], &[])?;
    /// assert_eq!(trellis.state_count(), 4);
    /// assert_eq!(trellis.output(0, 1), 0b11);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_generators(
        constraint_lengths: &[usize],
        generators: &[Vec<usize>],
        feedback: &[usize],
    ) -> Result<Self, Error> {
        check_generators(constraint_lengths, generators, feedback)?;
        let feedback: Vec<usize> = if feedback.is_empty() {
            constraint_lengths.iter().map(|&k| 1 << (k - 1)).collect()
        } else {
            feedback.to_vec()
        };
        let input_width = constraint_lengths.len();
        let output_width = generators[0].len();
        let state_width: usize = constraint_lengths.iter().map(|&k| k - 1).sum();
        if state_width + input_width > MAX_TABLE_WIDTH || output_width > MAX_TABLE_WIDTH {
            return Err(Error::InvalidInput(format!(
                "Trellis widths exceed {MAX_TABLE_WIDTH} bits"
            )));
        }
        let input_count = 1 << input_width;
        let mut next_state = Vec::with_capacity((1 << state_width) * input_count);
        let mut output = Vec::with_capacity((1 << state_width) * input_count);
        for state in 0 .. 1 << state_width {
            for input in 0 .. input_count {
                let mut state_offset = 0;
                let mut next = BitField(0);
                let mut out = BitField(0);
                for (stream, &constraint_len) in constraint_lengths.iter().enumerate() {
                    let memory_len = constraint_len - 1;
                    let registers = (state >> state_offset) & ((1 << memory_len) - 1);
                    let mut shifted_in = BitField(input).test(stream);
                    shifted_in ^= bool::from(BitField(feedback[stream] & registers).parity());
                    for (k, &poly) in generators[stream].iter().enumerate() {
                        let mut tap = bool::from(BitField(poly & registers).parity());
                        if BitField(poly).test(memory_len) {
                            tap ^= shifted_in;
                        }
                        out.set(k, out.test(k) ^ tap);
                    }
                    if memory_len > 0 {
                        let next_registers =
                            (registers >> 1) | (usize::from(shifted_in) << (memory_len - 1));
                        next.0 |= next_registers << state_offset;
                    }
                    state_offset += memory_len;
                }
                next_state.push(next.0);
                output.push(out.0);
            }
        }
        Self::new(next_state, output, state_width, input_width, output_width)
    }

    /// Returns next state for given state and input symbol.
    #[must_use]
    pub fn next_state(&self, state: usize, input: usize) -> usize {
        self.next_state[state * self.input_count() + input]
    }

    /// Returns output symbol for given state and input symbol.
    #[must_use]
    pub fn output(&self, state: usize, input: usize) -> usize {
        self.output[state * self.input_count() + input]
    }

    /// Returns number of bits in a state.
    #[must_use]
    pub fn state_width(&self) -> usize {
        self.state_width
    }

    /// Returns number of bits in an input symbol.
    #[must_use]
    pub fn input_width(&self) -> usize {
        self.input_width
    }

    /// Returns number of bits in an output symbol.
    #[must_use]
    pub fn output_width(&self) -> usize {
        self.output_width
    }

    /// Returns number of states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        1 << self.state_width
    }

    /// Returns number of distinct input symbols.
    #[must_use]
    pub fn input_count(&self) -> usize {
        1 << self.input_width
    }

    /// Returns number of distinct output symbols.
    #[must_use]
    pub fn output_count(&self) -> usize {
        1 << self.output_width
    }

    /// Returns, for each state, the length of the shortest input sequence driving it to state
    /// `0` (`None` if state `0` cannot be reached).
    #[must_use]
    pub fn distances_to_zero(&self) -> Vec<Option<usize>> {
        let mut predecessors = vec![Vec::new(); self.state_count()];
        for state in 0 .. self.state_count() {
            for input in 0 .. self.input_count() {
                predecessors[self.next_state(state, input)].push(state);
            }
        }
        let mut distances = vec![None; self.state_count()];
        distances[0] = Some(0);
        let mut queue = VecDeque::from([0]);
        while let Some(state) = queue.pop_front() {
            let dist = distances[state].unwrap_or(0);
            for &prev in &predecessors[state] {
                if distances[prev].is_none() {
                    distances[prev] = Some(dist + 1);
                    queue.push_back(prev);
                }
            }
        }
        distances
    }
}

/// Checks consistency of generator and feedback polynomials.
fn check_generators(
    constraint_lengths: &[usize],
    generators: &[Vec<usize>],
    feedback: &[usize],
) -> Result<(), Error> {
    if constraint_lengths.is_empty() || constraint_lengths.len() != generators.len() {
        return Err(Error::InvalidInput(format!(
            "Invalid number of generators (expected {}, found {})",
            constraint_lengths.len(),
            generators.len()
        )));
    }
    if !feedback.is_empty() && feedback.len() != constraint_lengths.len() {
        return Err(Error::InvalidInput(format!(
            "Invalid number of feedback polynomials (expected {}, found {})",
            constraint_lengths.len(),
            feedback.len()
        )));
    }
    let output_width = generators[0].len();
    if output_width == 0 || generators.iter().any(|g| g.len() != output_width) {
        return Err(Error::InvalidInput(
            "Every input stream must have the same positive number of generators".to_string(),
        ));
    }
    for (stream, &constraint_len) in constraint_lengths.iter().enumerate() {
        if constraint_len == 0 || constraint_len > MAX_TABLE_WIDTH {
            return Err(Error::InvalidInput(format!(
                "Constraint lengths must be in the range [1, {MAX_TABLE_WIDTH}]"
            )));
        }
        if generators[stream].iter().any(|&g| g >> constraint_len != 0) {
            return Err(Error::InvalidInput(format!(
                "Invalid connection in generator for constraint length {constraint_len}"
            )));
        }
        if let Some(&fb) = feedback.get(stream) {
            if fb >> constraint_len != 0 || !BitField(fb).test(constraint_len - 1) {
                return Err(Error::InvalidInput(
                    "Feedback must connect systematic".to_string(),
                ));
            }
        }
    }
    Ok(())
}
