//! Progress reporting for a materialization run
//!
//! Provides a live spinner using indicatif and the start/end banners.

use crate::context::RunProgress;
use crate::coordinator::RunStats;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays run status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &RunProgress) {
        self.bar.set_message(progress_message(progress));
    }

    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// One-line progress message
fn progress_message(progress: &RunProgress) -> String {
    format!(
        "Dirs: {} | Secrets: {}/{} | Fields: {} | Size: {}",
        format_number(progress.dirs_listed),
        format_number(progress.leaves_fetched),
        format_number(progress.leaves_found),
        format_number(progress.fields_written),
        format_size(progress.bytes_written, BINARY),
    )
}

/// Print a summary of the run
pub fn print_summary(stats: &RunStats, output_dir: &str) {
    let duration_secs = stats.duration.as_secs_f64();

    println!();
    println!("{}", style("Secrets Materialized").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(stats.dirs_listed)
    );
    println!(
        "  {} {}",
        style("Secrets:").bold(),
        format_number(stats.leaves as u64)
    );
    if stats.empty_leaves > 0 {
        println!(
            "  {} {}",
            style("Empty:").yellow().bold(),
            format_number(stats.empty_leaves as u64)
        );
    }
    println!(
        "  {} {} ({})",
        style("Fields:").bold(),
        format_number(stats.fields_written),
        format_size(stats.bytes_written, BINARY)
    );
    println!("  {} {:.1}s", style("Duration:").bold(), duration_secs);
    println!("  {} {}", style("Output:").bold(), output_dir);
    println!();
}

/// Print a header at the start of the run
pub fn print_header(store: &str, group: &str, output: &str) {
    println!();
    println!(
        "{} {}",
        style("secrets-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Store:").bold(), store);
    println!("  {} {}", style("Group:").bold(), group);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_progress_message() {
        let progress = RunProgress {
            dirs_listed: 3,
            leaves_found: 1200,
            leaves_fetched: 40,
            fields_written: 7,
            ..Default::default()
        };
        assert_eq!(
            progress_message(&progress),
            "Dirs: 3 | Secrets: 40/1,200 | Fields: 7 | Size: 0 B"
        );
    }
}
