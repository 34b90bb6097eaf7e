//! Formatting of the `lassi-output` log.
//!
//! Everything meant for the main output file goes through the `lassi-output` logger target,
//! which the command-line interface routes to its own appender.

use std::fmt;

use log;

#[cfg(test)]
#[path = "format_tests.rs"]
mod format_tests;

/// Width of section banners in the main output.
const BANNER_WIDTH: usize = 103;

/// Logs an error to both the diagnostic log and the `lassi-output` logger.
macro_rules! lassi_error {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::error!($fmt, $($($arg)*)?);
        log::error!(target: "lassi-output", $fmt, $($($arg)*)?);
    }
}

/// Logs a warning to the `lassi-output` logger.
macro_rules! lassi_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::warn!(target: "lassi-output", $fmt, $($($arg)*)?); }
}

/// Logs a main output line to the `lassi-output` logger.
macro_rules! lassi_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "lassi-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {lassi_error, lassi_output, lassi_warn};

/// Returns the three lines of a boxed section banner around `title`.
fn banner_lines(title: &str) -> [String; 3] {
    let length = title.chars().count().max(BANNER_WIDTH - 6);
    let bar = "─".repeat(length);
    [
        format!("┌──{bar}──┐"),
        format!("│§ {title:^length$} §│"),
        format!("└──{bar}──┘"),
    ]
}

/// Returns the line opening (`begin = true`) or closing a group of related output, such as the
/// cross-tier certification.
fn section_line(sectitle: &str, begin: bool) -> String {
    let width = BANNER_WIDTH - 14;
    let sectitle_space = format!("{sectitle} ");
    if begin {
        format!("❬❬❬❬❬ [Begin] {sectitle_space:❬<width$}")
    } else {
        format!("❭❭❭❭❭ [ End ] {sectitle_space:❭<width$}")
    }
}

/// Writes a section banner into a [`fmt::Formatter`].
pub(crate) fn write_title(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    for line in banner_lines(title) {
        writeln!(f, "{line}")?;
    }
    Ok(())
}

/// Logs a section banner to the `lassi-output` logger.
pub(crate) fn log_title(title: &str) {
    for line in banner_lines(title) {
        lassi_output!("{line}");
    }
}

/// Logs an underlined subtitle to the `lassi-output` logger.
pub(crate) fn log_subtitle(subtitle: &str) {
    lassi_output!("{subtitle}");
    lassi_output!("{}", "═".repeat(subtitle.chars().count()));
}

pub(crate) fn log_macsec_begin(sectitle: &str) {
    lassi_output!("{}", section_line(sectitle, true));
}

pub(crate) fn log_macsec_end(sectitle: &str) {
    lassi_output!("{}", section_line(sectitle, false));
}

/// Renders a switch in the parameter summary.
pub(crate) fn nice_bool(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

/// Renders the outcome of a fingerprint comparison.
pub(crate) fn verdict(passed: bool) -> &'static str {
    if passed {
        "ok"
    } else {
        "MISMATCH"
    }
}

/// Logs the [`fmt::Display`] rendering of a value line by line, so that every line carries the
/// log prefix of the `lassi-output` appender.
pub(crate) trait LassiOutput: fmt::Display {
    fn log_output_display(&self) {
        self.to_string().lines().for_each(|line| {
            lassi_output!("{line}");
        })
    }
}

impl<T> LassiOutput for T where T: fmt::Display {}

