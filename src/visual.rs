// src/visual.rs
// Terminal rendering: progress bars keyed off compressed-byte offsets and a
// handful of colored status helpers.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;

pub fn print_main_header(title: &str) {
    println!("\n{}", title.blue().bold());
    println!("{}", "=".repeat(title.len().max(20)).cyan());
}

pub fn print_error(message: &str) {
    eprintln!("{}", message.red().bold());
}

pub fn print_success(message: &str) {
    println!("{}", message.green().bold());
}

pub fn print_warning(message: &str) {
    println!("{}", message.yellow());
}

/// Progress bar over compressed bytes read, with an adaptive refresh so
/// small files don't spam redraws and large ones don't look frozen.
pub fn byte_progress_bar(total_bytes: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.blue} {msg} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

pub fn print_export_summary(path: &Path, games_kept: u64, games_rejected: u64) {
    println!(
        "{} {} ({} kept, {} rejected)",
        "wrote".green().bold(),
        path.display().to_string().cyan(),
        games_kept,
        games_rejected,
    );
}

pub fn print_rejection_breakdown(reasons: &HashMap<String, u64>) {
    if reasons.is_empty() {
        return;
    }
    println!("{}", "rejections:".yellow());
    for (reason, count) in reasons {
        println!("  - {}: {}", reason, count);
    }
}
