//! Index permutation between flat sequences (interleavers and puncturing patterns)

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Mapping from an input sequence to an output sequence by source index
///
/// Output element `i` is input element `seq[i]`. The input may be longer than needed, and not
/// every input element has to appear in the output.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(try_from = "PermutationIndices", into = "PermutationIndices")]
pub struct Permutation {
    /// Length of input sequence
    pub(crate) input_size: usize,
    /// Input index for each output index
    pub(crate) seq: Vec<usize>,
}

/// Serialized form of [`Permutation`]
#[derive(Clone, Deserialize, Serialize)]
struct PermutationIndices {
    input_size: usize,
    seq: Vec<usize>,
}

impl TryFrom<PermutationIndices> for Permutation {
    type Error = Error;

    fn try_from(indices: PermutationIndices) -> Result<Self, Error> {
        Self::new(indices.seq, Some(indices.input_size))
    }
}

impl From<Permutation> for PermutationIndices {
    fn from(perm: Permutation) -> Self {
        Self {
            input_size: perm.input_size,
            seq: perm.seq,
        }
    }
}

impl Permutation {
    /// Returns permutation defined by given source indices.
    ///
    /// # Parameters
    ///
    /// - `seq`: Input index for each output index. If the input is the sequence
    ///   `x[0], x[1], ...`, then the output is the sequence `x[seq[0]], x[seq[1]], ...`.
    ///
    /// - `input_size`: Length of input sequence. Defaults to `1 + max(seq)`, or `0` if `seq` is
    ///   empty.
    ///
    /// # Errors
    ///
    /// Returns an error if an element of `seq` is not smaller than `input_size`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecl::Permutation;
    ///
    /// let perm = Permutation::new(vec![0, 3, 2, 5, 4, 7, 6, 1], None)?;
    /// assert_eq!(perm.input_size(), 8);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(seq: Vec<usize>, input_size: Option<usize>) -> Result<Self, Error> {
        let min_input_size = seq.iter().max().map_or(0, |&m| m + 1);
        let input_size = input_size.unwrap_or(min_input_size);
        if input_size < min_input_size {
            return Err(Error::InvalidInput(format!(
                "Permutation index {} out of range for input size {input_size}",
                min_input_size - 1
            )));
        }
        Ok(Self { input_size, seq })
    }

    /// Returns identity permutation on sequences of given length.
    #[must_use]
    pub fn identity(length: usize) -> Self {
        Self {
            input_size: length,
            seq: (0 .. length).collect(),
        }
    }

    /// Returns random permutation of sequences of given length.
    ///
    /// # Errors
    ///
    /// Returns an error if `length` is `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecl::Permutation;
    ///
    /// let perm = Permutation::random(8)?;
    /// assert_eq!(perm.output_size(), 8);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn random(length: usize) -> Result<Self, Error> {
        if length == 0 {
            return Err(Error::InvalidInput(
                "Length of permutation must be a positive integer".to_string(),
            ));
        }
        let mut seq: Vec<usize> = (0 .. length).collect();
        seq.shuffle(&mut rand::rng());
        Ok(Self {
            input_size: length,
            seq,
        })
    }

    /// Returns length of input sequence.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Returns length of output sequence.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.seq.len()
    }

    /// Returns whether the permutation maps nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Returns input index for given output index.
    #[must_use]
    pub fn source(&self, out_index: usize) -> usize {
        self.seq[out_index]
    }

    /// Generates permutation output given its input.
    ///
    /// # Parameters
    ///
    /// - `input`: Permutation input.
    ///
    /// - `output`: Buffer for permutation output (any pre-existing contents will be cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `input.len()` is not equal to `self.input_size()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecl::Permutation;
    ///
    /// let perm = Permutation::new(vec![0, 3, 2, 5, 4, 7, 6, 1], None)?;
    /// let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
    /// let mut output = Vec::new();
    /// perm.permute(&input, &mut output)?;
    /// assert_eq!(output, ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn permute<T: Copy>(&self, input: &[T], output: &mut Vec<T>) -> Result<(), Error> {
        self.permute_blocks(input, output)
    }

    /// Generates permutation input given its output.
    ///
    /// Input positions not covered by the permutation are set to `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns an error if `output.len()` is not equal to `self.output_size()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecl::Permutation;
    ///
    /// let perm = Permutation::new(vec![2, 0], Some(4))?;
    /// let mut input = Vec::new();
    /// perm.depermute(&[1.5, -0.5], &mut input)?;
    /// assert_eq!(input, [-0.5, 0.0, 1.5, 0.0]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn depermute<T: Copy + Default>(
        &self,
        output: &[T],
        input: &mut Vec<T>,
    ) -> Result<(), Error> {
        self.depermute_blocks(output, input)
    }

    /// Applies the permutation to each of several consecutive input blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if `input.len()` is not a multiple of `self.input_size()`.
    pub fn permute_blocks<T: Copy>(&self, input: &[T], output: &mut Vec<T>) -> Result<(), Error> {
        let num_blocks = self.num_blocks(input.len(), self.input_size, "input")?;
        output.clear();
        output.reserve(num_blocks * self.output_size());
        for block in 0 .. num_blocks {
            let block_input = &input[block * self.input_size .. (block + 1) * self.input_size];
            output.extend(self.seq.iter().map(|&i| block_input[i]));
        }
        Ok(())
    }

    /// Applies the inverse permutation to each of several consecutive output blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if `output.len()` is not a multiple of `self.output_size()`.
    pub fn depermute_blocks<T: Copy + Default>(
        &self,
        output: &[T],
        input: &mut Vec<T>,
    ) -> Result<(), Error> {
        let num_blocks = self.num_blocks(output.len(), self.output_size(), "output")?;
        input.clear();
        input.resize(num_blocks * self.input_size, T::default());
        for block in 0 .. num_blocks {
            let block_input = &mut input[block * self.input_size .. (block + 1) * self.input_size];
            let block_output = &output[block * self.output_size() .. (block + 1) * self.output_size()];
            self.depermute_into(block_output, block_input);
        }
        Ok(())
    }

    /// Writes `input[seq[i]] = output[i]` for all `i`; other input positions are left alone.
    pub(crate) fn depermute_into<T: Copy>(&self, output: &[T], input: &mut [T]) {
        for (&i, &x) in self.seq.iter().zip(output) {
            input[i] = x;
        }
    }

    /// Writes `output[i] = input[seq[i]]` for all `i`.
    pub(crate) fn permute_into<T: Copy>(&self, input: &[T], output: &mut [T]) {
        for (y, &i) in output.iter_mut().zip(&self.seq) {
            *y = input[i];
        }
    }

    /// Returns number of blocks in a sequence of given length.
    fn num_blocks(&self, len: usize, block_size: usize, what: &str) -> Result<usize, Error> {
        if block_size == 0 {
            return if len == 0 {
                Ok(0)
            } else {
                Err(Error::InvalidInput(format!(
                    "Invalid permutation {what} length (expected 0, found {len})"
                )))
            };
        }
        if len % block_size != 0 {
            return Err(Error::InvalidInput(format!(
                "Invalid permutation {what} length (expected a multiple of {block_size}, found \
                 {len})"
            )));
        }
        Ok(len / block_size)
    }
}
