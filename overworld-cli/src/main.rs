use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use overworld_core::{run, GenerationOptions, GenerationOutcome, RandomiserSettings};

#[derive(Debug, Parser)]
#[command(name = "overworld-randomiser", version, about = "Overworld and item placement randomiser")]
struct Args {
    /// Seed string; the same seed and options always produce the same output.
    #[arg(long)]
    seed: String,

    /// Directory the per-seed output folder is created in.
    #[arg(long)]
    output: PathBuf,

    /// Base image. Without it the built-in synthetic layout is used.
    #[arg(long, requires = "layout")]
    input: Option<PathBuf>,

    /// JSON table layout of the base image.
    #[arg(long)]
    layout: Option<PathBuf>,

    /// JSON file of generation options; missing fields keep their defaults.
    #[arg(long, value_name = "JSON")]
    preset: Option<PathBuf>,

    /// Write the spoiler log and the world model next to the output.
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn load_preset(path: &PathBuf) -> Result<GenerationOptions, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
    serde_json::from_str(&text).map_err(|e| format!("Failed to parse {:?}: {}", path, e))
}

fn main() {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .init();

    let options = match args.preset.as_ref().map(load_preset).transpose() {
        Ok(options) => options.unwrap_or_default(),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    let settings = RandomiserSettings {
        seed: args.seed,
        input_path: args.input,
        layout_path: args.layout,
        output_path: args.output,
        debug: args.debug,
        options,
    };

    match run(settings) {
        Ok(GenerationOutcome::Completed { stats, .. }) => {
            info!(
                "Done after {} overworld attempt(s), {} terrain round(s), {} shuffle(s)",
                stats.overworld_attempts, stats.terrain_rounds, stats.shuffle_attempts
            );
        }
        Ok(GenerationOutcome::Cancelled { .. }) => {
            warn!("Generation cancelled");
            std::process::exit(1);
        }
        Ok(GenerationOutcome::Exhausted { stats }) => {
            eprintln!(
                "Error: no completable world found after {} overworld attempts; try another seed",
                stats.overworld_attempts
            );
            for (cause, count) in &stats.certification_failures {
                eprintln!("  {cause}: {count}");
            }
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
