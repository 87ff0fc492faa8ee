//! This binary simulates the BER-versus-SNR and BLER-versus-SNR performance of a preset
//! convolutional, turbo or LDPC code (or of a code structure read from a JSON file) over a
//! BPSK-AWGN channel. Simulation parameters are specified on the command line, and simulation
//! results are saved to a JSON file.
//!
//! Build the executable with `cargo build --release` and then run `./target/release/fecl -h` for
//! help on the command-line interface. Set `RUST_LOG` to change the log level (default `info`).

#![warn(
    clippy::complexity,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    unused_import_braces,
    unused_qualifications
)]

use std::time::Instant;

use anyhow::{Context, Result};
use clap::parser::ValueSource;
use clap::{crate_name, crate_version, value_parser, Arg, ArgMatches, Command};
use fecl::codec::Structure;
use fecl::sim::{self, CodeFamily, SimParams};
use fecl::{Codec, DecoderAlgorithm};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Main function
fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;
    let timer = Instant::now();
    let matches = command_line_parser().get_matches();
    let codec = Codec::new(structure_from_matches(&matches)?)
        .with_work_group_size(work_group_size_from_matches(&matches));
    let json_filename = json_filename_from_matches(&matches);
    sim::run_bpsk_awgn_sims(&codec, &all_sim_params(&matches), &json_filename)
        .with_context(|| format!("Simulation failed (results file {json_filename})"))?;
    info!("Elapsed time: {:.3?}", timer.elapsed());
    Ok(())
}

/// Returns command line parser.
fn command_line_parser() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about("Evaluates the performance of an FEC code over a BPSK-AWGN channel")
        .arg(code_family())
        .arg(structure_filename())
        .arg(msg_size())
        .arg(algorithm_name())
        .arg(iterations())
        .arg(first_snr_db())
        .arg(snr_step_db())
        .arg(num_snr())
        .arg(num_block_errors_min())
        .arg(num_blocks_per_run())
        .arg(num_runs_min())
        .arg(num_runs_max())
        .arg(work_group_size())
        .arg(json_filename())
}

/// Returns argument for preset code family.
fn code_family() -> Arg {
    Arg::new("code_family")
        .short('c')
        .value_parser(["convolutional", "turbo", "ldpc"])
        .default_value("turbo")
        .help("Preset code family")
}

/// Returns argument for name of JSON file holding a code structure.
fn structure_filename() -> Arg {
    Arg::new("structure_filename")
        .short('j')
        .help("Name of JSON file holding a code structure (overrides the preset options)")
}

/// Returns argument for number of message bits per block.
fn msg_size() -> Arg {
    Arg::new("msg_size")
        .short('i')
        .value_parser(value_parser!(u32).range(1 ..))
        .default_value("40")
        .help("Number of message bits per block")
}

/// Returns argument for decoding algorithm name.
fn algorithm_name() -> Arg {
    Arg::new("algorithm_name")
        .short('a')
        .value_parser(["Exact", "Linear", "Approximate"])
        .default_value("Linear")
        .help("Metric algebra of the decoder")
}

/// Returns argument for number of decoder iterations.
fn iterations() -> Arg {
    Arg::new("iterations")
        .short('t')
        .value_parser(value_parser!(u32).range(1 ..))
        .default_value("8")
        .help("Number of decoder iterations (turbo and LDPC codes)")
}

/// Returns argument for first Es/N0 (dB).
fn first_snr_db() -> Arg {
    Arg::new("first_snr_db")
        .short('r')
        .value_parser(value_parser!(f64))
        .allow_negative_numbers(true)
        .default_value("-5.0")
        .help("First Es/N0 (dB)")
}

/// Returns argument for Es/N0 step (dB).
fn snr_step_db() -> Arg {
    Arg::new("snr_step_db")
        .short('p')
        .value_parser(value_parser!(f64))
        .allow_negative_numbers(true)
        .default_value("1.0")
        .help("Es/N0 step (dB)")
}

/// Returns argument for number of Es/N0 values.
fn num_snr() -> Arg {
    Arg::new("num_snr")
        .short('s')
        .value_parser(value_parser!(u32))
        .default_value("4")
        .help("Number of Es/N0 values")
}

/// Returns argument for desired minimum number of block errors.
fn num_block_errors_min() -> Arg {
    Arg::new("num_block_errors_min")
        .short('e')
        .value_parser(value_parser!(u32))
        .default_value("500")
        .help("Desired minimum number of block errors")
}

/// Returns argument for number of blocks to be transmitted per run.
fn num_blocks_per_run() -> Arg {
    Arg::new("num_blocks_per_run")
        .short('b')
        .value_parser(value_parser!(u32))
        .default_value("1000")
        .help("Number of blocks to be transmitted per run")
}

/// Returns argument for minimum number of runs of blocks to be simulated.
fn num_runs_min() -> Arg {
    Arg::new("num_runs_min")
        .short('n')
        .value_parser(value_parser!(u32))
        .default_value("10")
        .help("Minimum number of runs of blocks to be simulated")
}

/// Returns argument for maximum number of runs of blocks to be simulated.
fn num_runs_max() -> Arg {
    Arg::new("num_runs_max")
        .short('x')
        .value_parser(value_parser!(u32))
        .default_value("100")
        .help("Maximum number of runs of blocks to be simulated")
}

/// Returns argument for maximum number of threads per codec call.
fn work_group_size() -> Arg {
    Arg::new("work_group_size")
        .short('w')
        .value_parser(value_parser!(u32).range(1 ..))
        .default_value("4")
        .help("Maximum number of threads per encode or decode call")
}

/// Returns argument for name of JSON file to which results must be saved.
fn json_filename() -> Arg {
    Arg::new("json_filename")
        .short('f')
        .default_value("results.json")
        .help("Name of JSON file to which results must be saved")
}

// OK to unwrap in the functions below: all command-line arguments they read have default values
// or are checked for presence.

/// Returns code structure, read from a file or built from the preset options.
fn structure_from_matches(matches: &ArgMatches) -> Result<Structure> {
    if let Some(filename) = matches.get_one::<String>("structure_filename") {
        return sim::structure_from_file(filename)
            .with_context(|| format!("Failed to read code structure from {filename}"));
    }
    let family = match matches.get_one::<String>("code_family").unwrap().as_str() {
        "convolutional" => CodeFamily::Convolutional,
        "ldpc" => CodeFamily::Ldpc,
        _ => CodeFamily::Turbo,
    };
    let msg_size: u32 = *matches.get_one("msg_size").unwrap();
    let iterations: u32 = *matches.get_one("iterations").unwrap();
    Ok(sim::preset(
        family,
        msg_size as usize,
        algorithm_from_matches(matches),
        iterations as usize,
    )?)
}

/// Returns decoding algorithm.
fn algorithm_from_matches(matches: &ArgMatches) -> DecoderAlgorithm {
    match matches.get_one::<String>("algorithm_name").unwrap().as_str() {
        "Exact" => DecoderAlgorithm::Exact,
        "Approximate" => DecoderAlgorithm::Approximate,
        _ => DecoderAlgorithm::Linear,
    }
}

/// Returns simulation parameters based on command-line arguments.
fn all_sim_params(matches: &ArgMatches) -> Vec<SimParams> {
    let mut num_runs_min: u32 = *matches.get_one("num_runs_min").unwrap();
    let mut num_runs_max: u32 = *matches.get_one("num_runs_max").unwrap();
    if num_runs_min > num_runs_max {
        if let Some(ValueSource::DefaultValue) = matches.value_source("num_runs_min") {
            num_runs_min = num_runs_max;
        }
        if let Some(ValueSource::DefaultValue) = matches.value_source("num_runs_max") {
            num_runs_max = num_runs_min;
        }
    }
    all_es_over_n0_db_from_matches(matches)
        .into_iter()
        .map(|es_over_n0_db| SimParams {
            es_over_n0_db,
            num_block_errors_min: *matches.get_one("num_block_errors_min").unwrap(),
            num_blocks_per_run: *matches.get_one("num_blocks_per_run").unwrap(),
            num_runs_min,
            num_runs_max,
            seed: None,
        })
        .collect()
}

/// Returns all Es/N0 (dB) values.
fn all_es_over_n0_db_from_matches(matches: &ArgMatches) -> Vec<f64> {
    let first_snr_db: f64 = *matches.get_one("first_snr_db").unwrap();
    let snr_step_db: f64 = *matches.get_one("snr_step_db").unwrap();
    let num_snr: u32 = *matches.get_one("num_snr").unwrap();
    (0 .. num_snr)
        .map(|n| first_snr_db + snr_step_db * f64::from(n))
        .collect()
}

/// Returns maximum number of threads per codec call.
fn work_group_size_from_matches(matches: &ArgMatches) -> usize {
    let work_group_size: u32 = *matches.get_one("work_group_size").unwrap();
    work_group_size as usize
}

/// Returns name of JSON file to which simulation results must be saved.
fn json_filename_from_matches(matches: &ArgMatches) -> String {
    matches
        .get_one::<String>("json_filename")
        .unwrap()
        .to_string()
}
