//! Low-density parity-check code structure

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bit_field::BitRow;
use crate::convolutional::is_kept;
use crate::{Bit, DecoderAlgorithm, Error, Permutation};

/// Sparse matrix over GF(2), stored as the sorted column indices of the nonzero entries of each
/// row
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct SparseBitMatrix {
    cols: usize,
    row_entries: Vec<Vec<usize>>,
}

impl SparseBitMatrix {
    /// Returns sparse matrix with given number of columns and nonzero entries in each row.
    ///
    /// Entries of a row are sorted; a repeated entry is kept once.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry is not less than `cols`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecl::ldpc::SparseBitMatrix;
    ///
    /// let matrix = SparseBitMatrix::new(4, vec![vec![3, 0], vec![1, 2, 3]])?;
    /// assert_eq!(matrix.rows(), 2);
    /// assert_eq!(matrix.row(0), [0, 3]);
    /// assert_eq!(matrix.col_entries(), [vec![0], vec![1], vec![1], vec![0, 1]]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(cols: usize, mut row_entries: Vec<Vec<usize>>) -> Result<Self, Error> {
        for row in &mut row_entries {
            if row.iter().any(|&j| j >= cols) {
                return Err(Error::InvalidInput(format!(
                    "Sparse matrix entries must be less than the number of columns ({cols})"
                )));
            }
            row.sort_unstable();
            row.dedup();
        }
        Ok(Self { cols, row_entries })
    }

    /// Returns sparse matrix with the nonzero entries of a dense matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows do not all have the same length.
    pub fn from_dense(dense: &[Vec<bool>]) -> Result<Self, Error> {
        let cols = dense.first().map_or(0, Vec::len);
        if dense.iter().any(|row| row.len() != cols) {
            return Err(Error::InvalidInput(
                "Rows of a dense matrix must have the same length".to_string(),
            ));
        }
        let row_entries = dense
            .iter()
            .map(|row| (0 .. cols).filter(|&j| row[j]).collect())
            .collect();
        Ok(Self { cols, row_entries })
    }

    /// Returns number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.row_entries.len()
    }

    /// Returns number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns column indices of the nonzero entries of row `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[usize] {
        &self.row_entries[i]
    }

    /// Returns column indices of the nonzero entries of every row.
    #[must_use]
    pub fn row_entries(&self) -> &[Vec<usize>] {
        &self.row_entries
    }

    /// Returns total number of nonzero entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.row_entries.iter().map(Vec::len).sum()
    }

    /// Returns row indices of the nonzero entries of every column.
    #[must_use]
    pub fn col_entries(&self) -> Vec<Vec<usize>> {
        let mut col_entries = vec![Vec::new(); self.cols];
        for (i, row) in self.row_entries.iter().enumerate() {
            for &j in row {
                col_entries[j].push(i);
            }
        }
        col_entries
    }

    /// Returns number of nonzero entries in each row.
    #[must_use]
    pub fn row_degrees(&self) -> Vec<usize> {
        self.row_entries.iter().map(Vec::len).collect()
    }

    fn to_dense(&self) -> Vec<BitRow> {
        self.row_entries
            .iter()
            .map(|row| {
                let mut dense = BitRow::zeros(self.cols);
                row.iter().for_each(|&j| dense.set(j));
                dense
            })
            .collect()
    }
}

/// Parameters of an LDPC encoder
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct EncoderOptions {
    /// Parity-check matrix (one row per check, one column per code bit)
    pub check_matrix: SparseBitMatrix,
}

impl EncoderOptions {
    /// Returns encoder options with given parity-check matrix.
    #[must_use]
    pub fn new(check_matrix: SparseBitMatrix) -> Self {
        Self { check_matrix }
    }
}

/// Parameters of an LDPC decoder
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Maximum number of belief propagation iterations
    pub iterations: usize,
    /// Box-sum algebra used at the check nodes
    pub algorithm: DecoderAlgorithm,
    /// Scaling factors of the check messages, keyed by check degree, with one value per iteration
    /// or a single shared value; key `0` holds the default for degrees without their own entry
    #[serde(with = "degree_table")]
    pub scaling_factor: BTreeMap<usize, Vec<f64>>,
}

/// (De)serializes a degree-keyed table as a list of `[degree, factors]` pairs, since integer map
/// keys don't survive buffered deserialization (as in tagged enums).
mod degree_table {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        table: &BTreeMap<usize, Vec<f64>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(table)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<usize, Vec<f64>>, D::Error> {
        Ok(Vec::<(usize, Vec<f64>)>::deserialize(deserializer)?
            .into_iter()
            .collect())
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            iterations: 50,
            algorithm: DecoderAlgorithm::Approximate,
            scaling_factor: BTreeMap::from([(0, vec![1.0])]),
        }
    }
}

impl DecoderOptions {
    /// Sets maximum number of iterations.
    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets box-sum algebra.
    #[must_use]
    pub fn algorithm(mut self, algorithm: DecoderAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets scaling factors.
    #[must_use]
    pub fn scaling_factor(mut self, scaling_factor: BTreeMap<usize, Vec<f64>>) -> Self {
        self.scaling_factor = scaling_factor;
        self
    }
}

/// Puncturing pattern for an LDPC code
///
/// With an empty `syst_mask`, `mask` applies to the message bits and, restarting from its first
/// entry, to the parity bits. Otherwise `syst_mask` applies to the message bits and `mask` to the
/// parity bits. Masks are applied cyclically, and an empty mask keeps everything.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PunctureOptions {
    /// Mask for the message bits
    pub syst_mask: Vec<bool>,
    /// Mask for the parity bits (and message bits when `syst_mask` is empty)
    pub mask: Vec<bool>,
}

/// Serialized form of [`Structure`]
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
struct StructureOptions {
    encoder: EncoderOptions,
    #[serde(default)]
    decoder: DecoderOptions,
}

/// LDPC code structure
///
/// The columns of the parity-check matrix are reordered at construction so that a codeword is the
/// message followed by the parity bits; [`Structure::checks`] returns the reordered matrix.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(try_from = "StructureOptions", into = "StructureOptions")]
pub struct Structure {
    checks: SparseBitMatrix,
    /// Message bits feeding each parity bit
    generator: Vec<Vec<usize>>,
    msg_size: usize,
    iterations: usize,
    algorithm: DecoderAlgorithm,
    scaling_options: BTreeMap<usize, Vec<f64>>,
    /// Scaling factor for each iteration (or one shared entry) and check degree
    scaling_factor: Vec<Vec<f64>>,
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
    /// Returns LDPC code structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the parity-check matrix is empty or leaves no message bits, if the
    /// number of iterations is `0`, or if the scaling factors are inconsistent with the number of
    /// iterations or do not cover every check degree.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecl::ldpc::{DecoderOptions, EncoderOptions, SparseBitMatrix, Structure};
    ///
    /// // Hamming (7, 4) code
    /// let checks = SparseBitMatrix::new(
    ///     7,
    ///     vec![vec![0, 1, 3, 4], vec![0, 2, 3, 5], vec![1, 2, 3, 6]],
    /// )?;
    /// let structure = Structure::new(EncoderOptions::new(checks), DecoderOptions::default())?;
    /// assert_eq!(structure.msg_size(), 4);
    /// assert_eq!(structure.parity_size(), 7);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(encoder: EncoderOptions, decoder: DecoderOptions) -> Result<Self, Error> {
        let matrix = SparseBitMatrix::new(encoder.check_matrix.cols, encoder.check_matrix.row_entries)?;
        if matrix.rows() == 0 || matrix.cols() == 0 {
            return Err(Error::InvalidInput(
                "Parity-check matrix must have at least one row and one column".to_string(),
            ));
        }
        if decoder.iterations == 0 {
            return Err(Error::InvalidInput(
                "Number of iterations must be positive".to_string(),
            ));
        }
        let (checks, generator) = systematic_form(&matrix)?;
        let msg_size = checks.cols() - generator.len();
        let scaling_factor =
            scaling_table(&decoder.scaling_factor, &checks.row_degrees(), decoder.iterations)?;
        Ok(Self {
            checks,
            generator,
            msg_size,
            iterations: decoder.iterations,
            algorithm: decoder.algorithm,
            scaling_options: decoder.scaling_factor,
            scaling_factor,
        })
    }

    /// Returns options from which this structure can be rebuilt (with the reordered matrix).
    #[must_use]
    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions::new(self.checks.clone())
    }

    /// Returns decoder options of this structure.
    #[must_use]
    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            iterations: self.iterations,
            algorithm: self.algorithm,
            scaling_factor: self.scaling_options.clone(),
        }
    }

    /// Returns parity-check matrix, with columns in codeword order.
    #[must_use]
    pub fn checks(&self) -> &SparseBitMatrix {
        &self.checks
    }

    /// Returns maximum number of decoding iterations.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Returns box-sum algebra of the decoder.
    #[must_use]
    pub fn algorithm(&self) -> DecoderAlgorithm {
        self.algorithm
    }

    /// Returns scaling factor of the messages of a check with given degree at given iteration
    /// (iterations beyond the table wrap around).
    #[must_use]
    pub fn scaling_factor(&self, iteration: usize, degree: usize) -> f64 {
        let factors = &self.scaling_factor[iteration % self.scaling_factor.len()];
        factors.get(degree).copied().unwrap_or(1.0)
    }

    /// Returns number of message bits per block.
    #[must_use]
    pub fn msg_size(&self) -> usize {
        self.msg_size
    }

    /// Returns number of systematic bits per block (the message bits).
    #[must_use]
    pub fn syst_size(&self) -> usize {
        self.msg_size
    }

    /// Returns number of code bits per block.
    #[must_use]
    pub fn parity_size(&self) -> usize {
        self.checks.cols()
    }

    /// Returns syndrome of a block of code bits (one bit per check).
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len()` is not `parity_size()`.
    pub fn syndrome(&self, parity: &[Bit]) -> Result<Vec<Bit>, Error> {
        self.check_parity_len(parity.len())?;
        Ok(self
            .checks
            .row_entries()
            .iter()
            .map(|row| xor_of(parity, row))
            .collect())
    }

    /// Returns whether a block of code bits satisfies every check.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len()` is not `parity_size()`.
    pub fn check(&self, parity: &[Bit]) -> Result<bool, Error> {
        self.check_parity_len(parity.len())?;
        Ok(self.satisfies(parity))
    }

    /// Returns whether code bits satisfy every check (no length check).
    pub(crate) fn satisfies(&self, parity: &[Bit]) -> bool {
        self.checks
            .row_entries()
            .iter()
            .all(|row| xor_of(parity, row) == Bit::Zero)
    }

    /// Encodes one block.
    ///
    /// # Errors
    ///
    /// Returns an error if `msg.len()` is not `msg_size()` or `parity.len()` is not
    /// `parity_size()`.
    pub fn encode(&self, msg: &[Bit], parity: &mut [Bit]) -> Result<(), Error> {
        if msg.len() != self.msg_size {
            return Err(Error::InvalidInput(format!(
                "Invalid message length (expected {}, found {})",
                self.msg_size,
                msg.len()
            )));
        }
        self.check_parity_len(parity.len())?;
        let (syst, rest) = parity.split_at_mut(self.msg_size);
        syst.copy_from_slice(msg);
        for (bit, taps) in rest.iter_mut().zip(&self.generator) {
            *bit = xor_of(msg, taps);
        }
        Ok(())
    }

    /// Returns permutation selecting the transmitted code bits.
    #[must_use]
    pub fn puncturing(&self, options: &PunctureOptions) -> Permutation {
        let syst_mask = if options.syst_mask.is_empty() {
            &options.mask
        } else {
            &options.syst_mask
        };
        let seq = (0 .. self.msg_size)
            .filter(|&i| is_kept(syst_mask, i))
            .chain(
                (self.msg_size .. self.parity_size())
                    .filter(|&i| is_kept(&options.mask, i - self.msg_size)),
            )
            .collect();
        Permutation {
            input_size: self.parity_size(),
            seq,
        }
    }

    fn check_parity_len(&self, len: usize) -> Result<(), Error> {
        if len == self.parity_size() {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "Invalid parity length (expected {}, found {len})",
                self.parity_size()
            )))
        }
    }
}

/// Returns XOR of the bits at given indices.
fn xor_of(bits: &[Bit], indices: &[usize]) -> Bit {
    Bit::from(indices.iter().filter(|&&j| bits[j] == Bit::One).count() % 2 == 1)
}

/// Returns check matrix with columns reordered to `[message | parity]`, and the message bits
/// feeding each parity bit.
///
/// Gauss-Jordan elimination picks pivot columns from the right; they become the parity bits, in
/// increasing order of their original column index. Applying this function to its own output
/// leaves the matrix unchanged.
fn systematic_form(matrix: &SparseBitMatrix) -> Result<(SparseBitMatrix, Vec<Vec<usize>>), Error> {
    let cols = matrix.cols();
    let mut rows = matrix.to_dense();
    let mut pivots = Vec::new();
    for col in (0 .. cols).rev() {
        let rank = pivots.len();
        if rank == rows.len() {
            break;
        }
        let Some(found) = (rank .. rows.len()).find(|&r| rows[r].test(col)) else {
            continue;
        };
        rows.swap(rank, found);
        let pivot_row = rows[rank].clone();
        for (r, row) in rows.iter_mut().enumerate() {
            if r != rank && row.test(col) {
                row.xor_assign(&pivot_row);
            }
        }
        pivots.push(col);
    }
    if pivots.len() == cols {
        return Err(Error::InvalidInput(
            "Parity-check matrix has full column rank and leaves no message bits".to_string(),
        ));
    }
    let mut is_pivot = vec![false; cols];
    pivots.iter().for_each(|&c| is_pivot[c] = true);
    let order: Vec<usize> = (0 .. cols)
        .filter(|&c| !is_pivot[c])
        .chain((0 .. cols).filter(|&c| is_pivot[c]))
        .collect();
    let mut position = vec![0; cols];
    for (new, &old) in order.iter().enumerate() {
        position[old] = new;
    }
    let msg_size = cols - pivots.len();
    let mut generator = vec![Vec::new(); pivots.len()];
    for (row, &pivot) in rows.iter().zip(&pivots) {
        generator[position[pivot] - msg_size] =
            (0 .. msg_size).filter(|&k| row.test(order[k])).collect();
    }
    let checks = SparseBitMatrix::new(
        cols,
        matrix
            .row_entries()
            .iter()
            .map(|row| row.iter().map(|&j| position[j]).collect())
            .collect(),
    )?;
    Ok((checks, generator))
}

/// Returns scaling factors indexed by iteration (or one shared entry) and check degree.
fn scaling_table(
    options: &BTreeMap<usize, Vec<f64>>,
    degrees: &[usize],
    iterations: usize,
) -> Result<Vec<Vec<f64>>, Error> {
    let max_degree = degrees.iter().copied().max().unwrap_or(0);
    let length = match options.get(&0) {
        Some(default) => default.len(),
        None => options.values().map(Vec::len).max().unwrap_or(0),
    };
    if length != 1 && length != iterations {
        return Err(Error::InvalidInput("Wrong size for scaling factor".to_string()));
    }
    let mut table = vec![vec![f64::NAN; max_degree + 1]; length];
    if let Some(default) = options.get(&0) {
        for (factors, &value) in table.iter_mut().zip(default) {
            factors.fill(value);
        }
    }
    for (&degree, values) in options.range(1 ..= max_degree) {
        if values.len() != length {
            return Err(Error::InvalidInput("Wrong size for scaling factor".to_string()));
        }
        for (factors, &value) in table.iter_mut().zip(values) {
            factors[degree] = value;
        }
    }
    if degrees.iter().any(|&d| table[0][d].is_nan()) {
        return Err(Error::InvalidInput(
            "Scaling factor not defined for every check degree and no default".to_string(),
        ));
    }
    // Degrees that no check has
    table.iter_mut().flatten().filter(|x| x.is_nan()).for_each(|x| *x = 1.0);
    Ok(table)
}

#[cfg(test)]
mod tests_of_sparse_bit_matrix {
    use super::*;

    #[test]
    fn test_new() {
        assert!(SparseBitMatrix::new(3, vec![vec![0, 3]]).is_err());
        let matrix = SparseBitMatrix::new(5, vec![vec![4, 1, 1], vec![], vec![0, 2, 4]]).unwrap();
        assert_eq!(matrix.rows(), 3);
        assert_eq!(matrix.cols(), 5);
        assert_eq!(matrix.row(0), [1, 4]);
        assert_eq!(matrix.entry_count(), 5);
        assert_eq!(matrix.row_degrees(), [2, 0, 3]);
        assert_eq!(
            matrix.col_entries(),
            [vec![2], vec![0], vec![2], vec![], vec![0, 2]]
        );
    }

    #[test]
    fn test_from_dense() {
        let matrix =
            SparseBitMatrix::from_dense(&[vec![true, false, true], vec![false, true, true]])
                .unwrap();
        assert_eq!(matrix.row_entries(), [vec![0, 2], vec![1, 2]]);
        assert!(SparseBitMatrix::from_dense(&[vec![true], vec![true, false]]).is_err());
    }
}

#[cfg(test)]
mod tests_of_structure {
    use super::*;
    use float_eq::assert_float_eq;
    use Bit::{One, Zero};

    fn hamming() -> SparseBitMatrix {
        SparseBitMatrix::new(7, vec![vec![0, 1, 3, 4], vec![0, 2, 3, 5], vec![1, 2, 3, 6]])
            .unwrap()
    }

    fn structure(checks: SparseBitMatrix) -> Structure {
        Structure::new(EncoderOptions::new(checks), DecoderOptions::default()).unwrap()
    }

    #[test]
    fn test_new() {
        let empty = SparseBitMatrix::new(4, Vec::new()).unwrap();
        assert!(Structure::new(EncoderOptions::new(empty), DecoderOptions::default()).is_err());
        let full_rank = SparseBitMatrix::new(2, vec![vec![0], vec![1]]).unwrap();
        assert!(Structure::new(EncoderOptions::new(full_rank), DecoderOptions::default()).is_err());
        let options = DecoderOptions::default().iterations(0);
        assert!(Structure::new(EncoderOptions::new(hamming()), options).is_err());
        let structure = structure(hamming());
        assert_eq!(structure.msg_size(), 4);
        assert_eq!(structure.syst_size(), 4);
        assert_eq!(structure.parity_size(), 7);
        assert_eq!(structure.checks(), &hamming());
        assert_eq!(structure.iterations(), 50);
        assert_eq!(structure.algorithm(), DecoderAlgorithm::Approximate);
    }

    #[test]
    fn test_column_reordering() {
        let checks = SparseBitMatrix::new(4, vec![vec![0, 2, 3], vec![1, 2, 3]]).unwrap();
        let structure = structure(checks);
        assert_eq!(structure.checks().row_entries(), [vec![0, 1, 3], vec![1, 2, 3]]);
        let mut parity = vec![Zero; 4];
        structure.encode(&[One, One], &mut parity).unwrap();
        assert_eq!(parity, [One, One, One, Zero]);
        structure.encode(&[One, Zero], &mut parity).unwrap();
        assert_eq!(parity, [One, Zero, One, One]);
        // Reordering is idempotent
        let rebuilt = Structure::new(structure.encoder_options(), structure.decoder_options()).unwrap();
        assert_eq!(rebuilt, structure);
    }

    #[test]
    fn test_rank_deficient() {
        let mut rows = hamming().row_entries().to_vec();
        rows.push(vec![1, 2, 4, 5]);
        let structure = structure(SparseBitMatrix::new(7, rows).unwrap());
        assert_eq!(structure.msg_size(), 4);
        let mut parity = vec![Zero; 7];
        structure.encode(&[One, Zero, One, One], &mut parity).unwrap();
        assert!(structure.check(&parity).unwrap());
    }

    #[test]
    fn test_encode_and_check() {
        let structure = structure(hamming());
        let mut parity = vec![Zero; 7];
        for word in 0 .. 16 {
            let msg: Vec<Bit> = (0 .. 4).map(|k| Bit::from((word >> k) & 1 == 1)).collect();
            structure.encode(&msg, &mut parity).unwrap();
            assert_eq!(parity[.. 4], msg);
            assert!(structure.check(&parity).unwrap());
            assert_eq!(structure.syndrome(&parity).unwrap(), [Zero; 3]);
        }
        structure.encode(&[One, Zero, Zero, Zero], &mut parity).unwrap();
        assert_eq!(parity, [One, Zero, Zero, Zero, One, One, Zero]);
        parity[2] = One;
        assert!(!structure.check(&parity).unwrap());
        assert_eq!(structure.syndrome(&parity).unwrap(), [Zero, One, One]);
        assert!(structure.check(&parity[.. 6]).is_err());
        assert!(structure.encode(&[One], &mut parity).is_err());
    }

    #[test]
    fn test_scaling_factor() {
        let options = DecoderOptions::default()
            .iterations(3)
            .scaling_factor(BTreeMap::from([(0, vec![1.0]), (4, vec![0.75])]));
        let structure = Structure::new(EncoderOptions::new(hamming()), options).unwrap();
        assert_float_eq!(structure.scaling_factor(0, 4), 0.75, abs <= 1e-8);
        assert_float_eq!(structure.scaling_factor(7, 4), 0.75, abs <= 1e-8);
        let options = DecoderOptions::default()
            .iterations(2)
            .scaling_factor(BTreeMap::from([(4, vec![0.5, 0.25])]));
        let structure = Structure::new(EncoderOptions::new(hamming()), options).unwrap();
        assert_float_eq!(structure.scaling_factor(0, 4), 0.5, abs <= 1e-8);
        assert_float_eq!(structure.scaling_factor(1, 4), 0.25, abs <= 1e-8);
        assert_float_eq!(structure.scaling_factor(2, 4), 0.5, abs <= 1e-8);
        for invalid in [
            BTreeMap::from([(0, vec![1.0, 1.0, 1.0])]),
            BTreeMap::from([(0, vec![1.0]), (4, vec![0.5, 0.5])]),
            BTreeMap::from([(3, vec![1.0])]),
        ] {
            let options = DecoderOptions::default().iterations(2).scaling_factor(invalid);
            assert!(Structure::new(EncoderOptions::new(hamming()), options).is_err());
        }
    }

    #[test]
    fn test_puncturing() {
        let structure = structure(hamming());
        let options = PunctureOptions {
            syst_mask: Vec::new(),
            mask: vec![true, false],
        };
        assert_eq!(structure.puncturing(&options).seq, [0, 2, 4, 6]);
        let options = PunctureOptions {
            syst_mask: vec![false],
            mask: vec![true],
        };
        assert_eq!(structure.puncturing(&options).seq, [4, 5, 6]);
        assert_eq!(structure.puncturing(&PunctureOptions::default()).output_size(), 7);
    }

    #[test]
    fn test_serde() {
        let structure = structure(hamming());
        let json = serde_json::to_string(&structure).unwrap();
        let restored: Structure = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, structure);
    }
}
