//! Command-line interface of the `lassi` binary.

use std::path::{Path, PathBuf};

use anyhow::{self, format_err};
use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::interfaces::input::Input;
use crate::interfaces::InputHandle;
use crate::io::format::{lassi_error, lassi_output};
use crate::io::read_lassi_yaml;

const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// Logs a nicely formatted `lassi` heading to the `lassi-output` logger.
pub fn log_heading() {
    let version = if let Some(ver) = VERSION {
        format!("v{ver}")
    } else {
        "v unknown".to_string()
    };
    lassi_output!("╭─────────────────────────────────────────────────────────────────────────────────────────────────────╮");
    lassi_output!("│                                                                                                     │");
    lassi_output!("│   LL                  AAA            SSSSSSSSSSS     SSSSSSSSSSS    IIIIIIIII                       │");
    lassi_output!("│   LL                 AA:AA          SS:::::::::SS   SS:::::::::SS   IIIIIIIII                       │");
    lassi_output!("│   LL                AA:::AA         S:::SSSSS::::S  S:::SSSSS::::S     III                          │");
    lassi_output!("│   LL               AA:::::AA        S:::S     SSSS  S:::S     SSSS     III                          │");
    lassi_output!("│   LL              AA:::A:::AA        SS:::SSSS       SS:::SSSS         III                          │");
    lassi_output!("│   LL             AA:::A A:::AA         SSS:::::SS      SSS:::::SS      III                          │");
    lassi_output!("│   LL            AA:::AAAAA:::AA             SS:::S          SS:::S     III                          │");
    lassi_output!("│   LL           AA:::::::::::::AA   SSSS     S:::S  SSSS     S:::S      III                          │");
    lassi_output!("│   LLLLLLLLLL  AA:::AAAAAAAAA:::AA  S::::SSSSS:::S  S::::SSSSS:::S   IIIIIIIII                       │");
    lassi_output!("│   LLLLLLLLLL AAAAA           AAAAA  SSSSSSSSSSSS    SSSSSSSSSSSS    IIIIIIIII                       │");
    lassi_output!("│                                                                                                     │");
    lassi_output!("│   Localised Active Space State Interaction                                            {version:>13} │");
    lassi_output!("╰─────────────────────────────────────────────────────────────────────────────────────────────────────╯");
    lassi_output!("");
}

/// Command-line arguments of the `lassi` binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML input file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Name of the output files (without extensions). The main output is written to
    /// `<OUTPUT>.out` and diagnostic logs to `<OUTPUT>.log`. If not given, everything is written
    /// to the terminal.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Writes the default input specification to this YAML file and exits.
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Includes debug messages in the diagnostic logs.
    #[arg(short, long)]
    pub debug: bool,
}

/// Configures `log4rs` so that the `lassi-output` logger carries the main output and the root
/// logger carries diagnostics.
///
/// # Arguments
///
/// * `output` - The name of the output files (without extensions). If `None`, the main output
/// goes to standard output and diagnostics to standard error.
/// * `debug` - Boolean indicating if debug messages are to be kept.
pub fn init_logging(output: Option<&Path>, debug: bool) -> Result<(), anyhow::Error> {
    let main_encoder = || Box::new(PatternEncoder::new("{m}{n}"));
    let diag_encoder = || Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}"));

    let (output_appender, diag_appender) = match output {
        Some(name) => {
            let out = FileAppender::builder()
                .append(false)
                .encoder(main_encoder())
                .build(name.with_extension("out"))?;
            let diag = FileAppender::builder()
                .append(false)
                .encoder(diag_encoder())
                .build(name.with_extension("log"))?;
            (
                Appender::builder().build("output", Box::new(out)),
                Appender::builder().build("diagnostics", Box::new(diag)),
            )
        }
        None => {
            let out = ConsoleAppender::builder()
                .target(Target::Stdout)
                .encoder(main_encoder())
                .build();
            let diag = ConsoleAppender::builder()
                .target(Target::Stderr)
                .encoder(diag_encoder())
                .build();
            (
                Appender::builder().build("output", Box::new(out)),
                Appender::builder().build("diagnostics", Box::new(diag)),
            )
        }
    };

    let root_level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let config = Config::builder()
        .appender(output_appender)
        .appender(diag_appender)
        .logger(
            Logger::builder()
                .appender("output")
                .additive(false)
                .build("lassi-output", LevelFilter::Info),
        )
        .build(Root::builder().appender("diagnostics").build(root_level))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Runs the `lassi` binary with the parsed command-line arguments.
///
/// Failures after logging has been configured are also reported to the `lassi-output` logger.
pub fn run(cli: &Cli) -> Result<(), anyhow::Error> {
    if let Some(template) = cli.template.as_ref() {
        return crate::io::write_lassi_yaml(template, &Input::default());
    }

    init_logging(cli.output.as_deref(), cli.debug)?;
    log_heading();
    let outcome = cli
        .config
        .as_ref()
        .ok_or_else(|| format_err!("No input configuration file specified."))
        .and_then(|config| read_lassi_yaml::<Input, _>(config))
        .and_then(|input| input.handle());
    if let Err(err) = outcome.as_ref() {
        lassi_error!("{err:#}");
    }
    outcome
}
