//! Status command for showing extraction progress.

use chrono::Local;
use console::style;

use crate::checkpoint::CheckpointStore;
use crate::cli::helpers::{format_number, open_checkpoint};
use crate::config::Settings;

/// Show per-category done / abandoned / in-progress counts.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let checkpoint = open_checkpoint(settings)?;
    let snapshot = checkpoint.snapshot().await;

    let separator = "─".repeat(60);
    println!();
    println!(
        "{:<40} {}",
        style("manuals status").bold(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("{}", separator);
    println!("Checkpoint: {}", settings.checkpoint_path.display());
    println!("Output:     {}", settings.output_dir.display());
    println!();

    if snapshot.is_empty() {
        println!("{} No progress recorded yet", style("!").yellow());
        return Ok(());
    }

    println!(
        "  {:<24} {:>10} {:>10} {:>12}",
        style("CATEGORY").cyan().bold(),
        "DONE",
        "ABANDONED",
        "IN PROGRESS"
    );

    let (mut done, mut abandoned, mut partial) = (0usize, 0usize, 0usize);
    for (category, progress) in &snapshot {
        // Abandoned ids are also in `done`
        let completed = progress.done.difference(&progress.abandoned).count();
        println!(
            "  {:<24} {:>10} {:>10} {:>12}",
            category,
            format_number(completed),
            format_number(progress.abandoned.len()),
            format_number(progress.partial.len())
        );
        done += completed;
        abandoned += progress.abandoned.len();
        partial += progress.partial.len();
    }

    println!("{}", separator);
    println!(
        "  {:<24} {:>10} {:>10} {:>12}",
        "Total",
        format_number(done),
        format_number(abandoned),
        format_number(partial)
    );

    Ok(())
}
