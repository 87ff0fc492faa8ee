//! # Simulator to evaluate code performance over a BPSK-AWGN channel
//!
//! The [`run_bpsk_awgn_sims`] function estimates the bit error rate (BER) and block error rate
//! (BLER) of a [`Codec`] at several values of Es/N0, evaluating the points in parallel and saving
//! the results to a JSON file. The [`preset`] function returns ready-made structures of each code
//! family for a given message size.
//!
//! # Examples
//!
//! ```
//! use fecl::sim::{self, CodeFamily, SimParams};
//! use fecl::{Codec, DecoderAlgorithm};
//!
//! let structure = sim::preset(CodeFamily::Convolutional, 16, DecoderAlgorithm::Approximate, 1)?;
//! let codec = Codec::new(structure);
//! let params = SimParams {
//!     es_over_n0_db: 10.0,
//!     num_block_errors_min: 10,
//!     num_blocks_per_run: 20,
//!     num_runs_min: 1,
//!     num_runs_max: 2,
//!     seed: Some(1),
//! };
//! let results = sim::run_bpsk_awgn_sim(&codec, &params)?;
//! assert_eq!(results.num_blocks, 40);
//! assert!(results.ber() < 0.01);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::File;
use std::io::BufWriter;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::{Codec, Structure};
use crate::convolutional::Termination;
use crate::ldpc::SparseBitMatrix;
use crate::{convolutional, ldpc, turbo, utils, DecoderAlgorithm, Error, Permutation, Trellis};

/// Parameters for a simulation at one value of Es/N0
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub struct SimParams {
    /// Ratio (dB) of symbol energy to noise power spectral density at the BPSK-AWGN channel output
    pub es_over_n0_db: f64,
    /// Desired minimum number of block errors
    pub num_block_errors_min: u32,
    /// Number of blocks to be transmitted per run
    pub num_blocks_per_run: u32,
    /// Minimum number of runs of blocks to be simulated
    pub num_runs_min: u32,
    /// Maximum number of runs of blocks to be simulated
    pub num_runs_max: u32,
    /// Seed of the random number generator (drawn from the thread generator if absent)
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimParams {
    /// Returns an error if the parameters are invalid.
    fn check(&self) -> Result<(), Error> {
        if self.num_blocks_per_run == 0 {
            return Err(Error::InvalidInput(
                "Number of blocks per run cannot be zero".to_string(),
            ));
        }
        if self.num_runs_min > self.num_runs_max {
            return Err(Error::InvalidInput(format!(
                "Minimum number of runs ({}) exceeds maximum number of runs ({})",
                self.num_runs_min, self.num_runs_max
            )));
        }
        Ok(())
    }
}

/// Results of a simulation at one value of Es/N0
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct SimResults {
    /// Simulation parameters
    pub params: SimParams,
    /// Code family
    pub family: String,
    /// Decoding algorithm
    pub algorithm: DecoderAlgorithm,
    /// Number of message bits per block
    pub msg_size: usize,
    /// Number of transmitted parity bits per block
    pub parity_size: usize,
    /// Number of blocks transmitted
    pub num_blocks: u64,
    /// Number of message bits transmitted
    pub num_info_bits: u64,
    /// Number of block errors
    pub num_block_errors: u64,
    /// Number of message bit errors
    pub num_info_bit_errors: u64,
}

impl SimResults {
    /// Returns initialized simulation results.
    #[must_use]
    fn new(codec: &Codec, params: &SimParams) -> Self {
        Self {
            params: *params,
            family: codec.structure().name().to_string(),
            algorithm: codec.structure().algorithm(),
            msg_size: codec.msg_size(),
            parity_size: codec.parity_size(),
            num_blocks: 0,
            num_info_bits: 0,
            num_block_errors: 0,
            num_info_bit_errors: 0,
        }
    }

    /// Returns block error rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bler(&self) -> f64 {
        if self.num_blocks > 0 {
            self.num_block_errors as f64 / self.num_blocks as f64
        } else {
            0.0
        }
    }

    /// Returns bit error rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ber(&self) -> f64 {
        if self.num_info_bits > 0 {
            self.num_info_bit_errors as f64 / self.num_info_bits as f64
        } else {
            0.0
        }
    }

    /// Returns number of runs completed so far.
    fn num_runs(&self) -> u64 {
        self.num_blocks / u64::from(self.params.num_blocks_per_run)
    }

    /// Returns `true` once enough runs and block errors have been accumulated.
    fn is_complete(&self) -> bool {
        let num_runs = self.num_runs();
        num_runs >= u64::from(self.params.num_runs_max)
            || (num_runs >= u64::from(self.params.num_runs_min)
                && self.num_block_errors >= u64::from(self.params.num_block_errors_min))
    }

    /// Accumulates errors of one run.
    fn update(&mut self, msg: &[crate::Bit], msg_hat: &[crate::Bit]) {
        let num_blocks = (msg.len() / self.msg_size.max(1)) as u64;
        self.num_blocks = self.num_blocks.saturating_add(num_blocks);
        self.num_info_bits = self.num_info_bits.saturating_add(msg.len() as u64);
        self.num_block_errors = self
            .num_block_errors
            .saturating_add(utils::block_error_count(msg_hat, msg, self.msg_size) as u64);
        self.num_info_bit_errors = self
            .num_info_bit_errors
            .saturating_add(utils::error_count(msg_hat, msg) as u64);
    }
}

/// Runs simulation of a codec over a BPSK-AWGN channel at one value of Es/N0.
///
/// Runs of `num_blocks_per_run` blocks are simulated until at least `num_runs_min` runs have
/// produced at least `num_block_errors_min` block errors, or `num_runs_max` runs are done.
///
/// # Errors
///
/// Returns an error if the simulation parameters are invalid.
pub fn run_bpsk_awgn_sim(codec: &Codec, params: &SimParams) -> Result<SimResults, Error> {
    params.check()?;
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let mut results = SimResults::new(codec, params);
    let num_msg_bits = params.num_blocks_per_run as usize * codec.msg_size();
    while !results.is_complete() {
        let msg = utils::random_bits_with(&mut rng, num_msg_bits);
        let parity = codec.encode(&msg)?;
        let parity_llr = utils::bpsk_awgn_channel_with(&mut rng, &parity, params.es_over_n0_db);
        let msg_hat = codec.decode(&parity_llr)?;
        results.update(&msg, &msg_hat);
    }
    info!(
        family = %results.family,
        es_over_n0_db = params.es_over_n0_db,
        num_blocks = results.num_blocks,
        ber = results.ber(),
        bler = results.bler(),
        "Simulation point done"
    );
    Ok(results)
}

/// Runs simulations of a codec at several values of Es/N0 and saves the results to a JSON file.
///
/// The simulation points are evaluated in parallel; the results keep the order of the
/// parameters.
///
/// # Errors
///
/// Returns an error if any simulation parameters are invalid or if the results cannot be saved.
pub fn run_bpsk_awgn_sims(
    codec: &Codec,
    all_params: &[SimParams],
    json_filename: &str,
) -> Result<Vec<SimResults>, Error> {
    info!(
        family = codec.structure().name(),
        msg_size = codec.msg_size(),
        parity_size = codec.parity_size(),
        num_points = all_params.len(),
        "Starting simulations"
    );
    let all_results = all_params
        .par_iter()
        .map(|params| run_bpsk_awgn_sim(codec, params))
        .collect::<Result<Vec<_>, _>>()?;
    save_results_to_file(&all_results, json_filename)?;
    info!(json_filename, "Saved simulation results");
    Ok(all_results)
}

/// Saves simulation results to a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_results_to_file(all_results: &[SimResults], json_filename: &str) -> Result<(), Error> {
    let writer = BufWriter::new(File::create(json_filename)?);
    serde_json::to_writer_pretty(writer, all_results)?;
    Ok(())
}

/// Reads a code structure from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold a valid structure.
pub fn structure_from_file(json_filename: &str) -> Result<Structure, Error> {
    let reader = std::io::BufReader::new(File::open(json_filename)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Enumeration of code families with preset structures
#[derive(Clone, Eq, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum CodeFamily {
    /// Rate-1/2 convolutional code with constraint length 7 (generators 133 and 171, octal)
    Convolutional,
    /// Rate-1/3 turbo code with two 8-state recursive constituents (generators 15 and 13, octal)
    Turbo,
    /// Rate-1/2 regular LDPC code (column weight 3, row weight 6) of Gallager's construction
    Ldpc,
}

/// Returns preset structure of a code family.
///
/// # Parameters
///
/// - `family`: Code family.
///
/// - `msg_size`: Number of message bits per block. For the LDPC family, the block length is
///   rounded up to a multiple of `6`, and the message size of the resulting code is at least the
///   requested one (Gallager matrices are rank-deficient).
///
/// - `algorithm`: Metric algebra of the decoder.
///
/// - `iterations`: Number of decoder iterations (turbo and LDPC families).
///
/// # Errors
///
/// Returns an error if `msg_size` or `iterations` is `0`.
pub fn preset(
    family: CodeFamily,
    msg_size: usize,
    algorithm: DecoderAlgorithm,
    iterations: usize,
) -> Result<Structure, Error> {
    if msg_size == 0 {
        return Err(Error::InvalidInput(
            "Message size cannot be zero".to_string(),
        ));
    }
    match family {
        CodeFamily::Convolutional => {
            let trellis = Trellis::from_generators(&[7], &[vec![0o133, 0o171]], &[])?;
            let structure = convolutional::Structure::new(
                convolutional::EncoderOptions::new(trellis, msg_size).termination(Termination::Tail),
                convolutional::DecoderOptions::default().algorithm(algorithm),
            )?;
            Ok(structure.into())
        }
        CodeFamily::Turbo => {
            let trellis = Trellis::from_generators(&[4], &[vec![0o15]], &[0o13])?;
            let interleavers = vec![
                Permutation::identity(msg_size),
                Permutation::random(msg_size)?,
            ];
            let structure = turbo::Structure::new(
                turbo::EncoderOptions::new(vec![trellis], interleavers),
                turbo::DecoderOptions::default()
                    .iterations(iterations)
                    .algorithm(algorithm),
            )?;
            Ok(structure.into())
        }
        CodeFamily::Ldpc => {
            let checks = gallager_matrix(msg_size.div_ceil(3) * 6, 3, 6)?;
            let structure = ldpc::Structure::new(
                ldpc::EncoderOptions::new(checks),
                ldpc::DecoderOptions::default()
                    .iterations(iterations)
                    .algorithm(algorithm),
            )?;
            Ok(structure.into())
        }
    }
}

/// Returns random regular parity-check matrix built from stacked column permutations of a
/// band matrix.
fn gallager_matrix(cols: usize, col_weight: usize, row_weight: usize) -> Result<SparseBitMatrix, Error> {
    let band_rows = cols / row_weight;
    let mut rows = Vec::with_capacity(col_weight * band_rows);
    for layer in 0 .. col_weight {
        let perm = if layer == 0 {
            Permutation::identity(cols)
        } else {
            Permutation::random(cols)?
        };
        for row in 0 .. band_rows {
            rows.push(
                (row * row_weight .. (row + 1) * row_weight)
                    .map(|k| perm.source(k))
                    .collect(),
            );
        }
    }
    SparseBitMatrix::new(cols, rows)
}

#[cfg(test)]
mod tests_of_sim {
    use super::*;
    use crate::Bit;

    fn params(es_over_n0_db: f64) -> SimParams {
        SimParams {
            es_over_n0_db,
            num_block_errors_min: 1,
            num_blocks_per_run: 10,
            num_runs_min: 1,
            num_runs_max: 3,
            seed: Some(42),
        }
    }

    #[test]
    fn test_check_sim_params() {
        // Invalid input
        let mut bad = params(0.0);
        bad.num_blocks_per_run = 0;
        assert!(bad.check().is_err());
        let mut bad = params(0.0);
        bad.num_runs_min = 4;
        assert!(bad.check().is_err());
        // Valid input
        assert!(params(0.0).check().is_ok());
    }

    #[test]
    fn test_preset() {
        assert!(preset(CodeFamily::Turbo, 0, DecoderAlgorithm::Linear, 4).is_err());
        let conv = preset(CodeFamily::Convolutional, 20, DecoderAlgorithm::Approximate, 1).unwrap();
        assert_eq!(conv.msg_size(), 20);
        assert_eq!(conv.parity_size(), 2 * (20 + 6));
        let turbo = preset(CodeFamily::Turbo, 40, DecoderAlgorithm::Linear, 4).unwrap();
        assert_eq!(turbo.msg_size(), 40);
        assert_eq!(turbo.parity_size(), 3 * 40 + 12);
        let ldpc = preset(CodeFamily::Ldpc, 30, DecoderAlgorithm::Approximate, 20).unwrap();
        assert_eq!(ldpc.parity_size(), 60);
        assert!(ldpc.msg_size() >= 30);
    }

    #[test]
    fn test_gallager_matrix() {
        let checks = gallager_matrix(24, 3, 6).unwrap();
        assert_eq!(checks.rows(), 12);
        assert!(checks.row_degrees().iter().all(|&d| d == 6));
        assert!(checks.col_entries().iter().all(|col| col.len() == 3));
    }

    #[test]
    fn test_run_bpsk_awgn_sim() {
        // Noiseless in practice: every run is needed, no errors
        let codec = Codec::new(
            preset(CodeFamily::Convolutional, 16, DecoderAlgorithm::Approximate, 1).unwrap(),
        );
        let results = run_bpsk_awgn_sim(&codec, &params(15.0)).unwrap();
        assert_eq!(results.num_blocks, 30);
        assert_eq!(results.num_info_bits, 30 * 16);
        assert_eq!(results.num_block_errors, 0);
        assert_eq!(results.family, "convolutional");
        // Very noisy: the first run is enough
        let results = run_bpsk_awgn_sim(&codec, &params(-10.0)).unwrap();
        assert_eq!(results.num_blocks, 10);
        assert!(results.num_block_errors > 0);
        assert!(results.bler() > 0.0 && results.bler() <= 1.0);
        // Same seed, same results
        assert_eq!(run_bpsk_awgn_sim(&codec, &params(-10.0)).unwrap(), results);
    }

    #[test]
    fn test_counts_grow_past_u32() {
        let codec = Codec::new(
            preset(CodeFamily::Convolutional, 4, DecoderAlgorithm::Approximate, 1).unwrap(),
        );
        let mut results = SimResults::new(&codec, &params(0.0));
        results.num_blocks = u64::from(u32::MAX) - 1;
        results.num_block_errors = u64::from(u32::MAX);
        let msg = vec![Bit::Zero; 3 * codec.msg_size()];
        let mut msg_hat = msg.clone();
        msg_hat[0] = Bit::One;
        results.update(&msg, &msg_hat);
        assert_eq!(results.num_blocks, u64::from(u32::MAX) + 2);
        assert_eq!(results.num_block_errors, u64::from(u32::MAX) + 1);
        assert_eq!(results.num_info_bit_errors, 1);
        assert!(results.is_complete());
        results.num_blocks = u64::MAX;
        results.update(&msg, &msg);
        assert_eq!(results.num_blocks, u64::MAX);
    }

    #[test]
    fn test_run_bpsk_awgn_sims() {
        let codec = Codec::new(preset(CodeFamily::Ldpc, 12, DecoderAlgorithm::Approximate, 10).unwrap());
        let path = std::env::temp_dir().join("fecl_test_run_bpsk_awgn_sims.json");
        let json_filename = path.to_str().unwrap();
        let all_params = [params(-2.0), params(0.0), params(2.0)];
        let all_results = run_bpsk_awgn_sims(&codec, &all_params, json_filename).unwrap();
        assert_eq!(all_results.len(), 3);
        for (results, params) in all_results.iter().zip(&all_params) {
            assert_eq!(results.params, *params);
        }
        let saved: Vec<SimResults> =
            serde_json::from_reader(File::open(json_filename).unwrap()).unwrap();
        assert_eq!(saved, all_results);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_structure_from_file() {
        let structure = preset(CodeFamily::Turbo, 8, DecoderAlgorithm::Exact, 2).unwrap();
        let path = std::env::temp_dir().join("fecl_test_structure_from_file.json");
        std::fs::write(&path, serde_json::to_string(&structure).unwrap()).unwrap();
        assert_eq!(structure_from_file(path.to_str().unwrap()).unwrap(), structure);
        std::fs::remove_file(&path).unwrap();
        assert!(structure_from_file("no_such_file.json").is_err());
    }
}
