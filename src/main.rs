//! Medir CLI - throughput benchmarking for locally served LLMs

use clap::Parser;
use medir::cli::{entrypoint, Cli};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = entrypoint(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
