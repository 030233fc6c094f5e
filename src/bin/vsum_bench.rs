//! Benchmark driver: sums K random vectors with each kernel variant and checks
//! the result against a serial column sum.

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use vsum_core::{Accelerator, DeviceConfig, InputSet, Variant};

const DEFAULT_INPUTS: usize = 10;
const MIN_INPUTS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    Baseline,
    O1,
    O2,
    All,
}

impl VariantArg {
    fn variants(self) -> Vec<Variant> {
        match self {
            VariantArg::Baseline => vec![Variant::Baseline],
            VariantArg::O1 => vec![Variant::Coalesced],
            VariantArg::O2 => vec![Variant::SharedStaged],
            VariantArg::All => Variant::ALL.to_vec(),
        }
    }
}

/// Multi-vector summation benchmark
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of input vectors; values below 3 fall back to 10
    #[arg(allow_negative_numbers = true)]
    inputs: Option<i64>,

    /// Length of every vector
    #[arg(short = 'n', long, default_value_t = 1 << 16)]
    len: usize,

    /// Kernel variant to run
    #[arg(short, long, value_enum, default_value_t = VariantArg::All)]
    variant: VariantArg,

    /// Seed for the input generator
    #[arg(short, long, default_value_t = 0)]
    seed: u64,
}

/// Number of vectors to sum: absent or too small requests get the default.
fn resolve_input_count(requested: Option<i64>) -> usize {
    match requested {
        Some(k) if k >= MIN_INPUTS => usize::try_from(k).unwrap_or(DEFAULT_INPUTS),
        _ => DEFAULT_INPUTS,
    }
}

/// K vectors of length N with elements in [0, 100)
fn random_inputs(k: usize, n: usize, seed: u64) -> Vec<Vec<i32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..k)
        .map(|_| (0..n).map(|_| rng.gen_range(0..100)).collect())
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let k = resolve_input_count(args.inputs);
    if args.inputs.is_some() {
        println!("Using input size {k}");
    }

    let rows = random_inputs(k, args.len, args.seed);
    let inputs = InputSet::from_rows(&rows)?;
    let expected = inputs.column_sums();

    let accelerator = Accelerator::new(DeviceConfig::from_env());
    for variant in args.variant.variants() {
        let (output, stats) = accelerator.sum_timed(variant, &inputs)?;
        if let Some(i) = output.iter().zip(&expected).position(|(got, want)| got != want) {
            bail!(
                "{variant}: element {i} is {} but the serial sum is {}",
                output[i],
                expected[i]
            );
        }
        println!(
            "[vsum] {variant:<8} upload {:>10.3?}  launch {:>10.3?}  download {:>10.3?}  ({} groups x {} units, {} waves)",
            stats.upload, stats.launch, stats.download, stats.groups, stats.units_per_group, stats.waves
        );
    }

    println!("COMPLETED SUCCESSFULLY");
    Ok(())
}
