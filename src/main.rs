use clap::Parser;

use crate::cli::Cli;
use gltf_runtime::run;

mod cli;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli.into()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
