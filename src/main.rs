use std::process;

use clap::Parser;

use lassi::interfaces::cli::{run, Cli};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        if cli.output.is_some() {
            eprintln!("lassi terminated with an error: {err:#}");
        }
        process::exit(1);
    }
}
