//! Reset command: forget progress so manuals are extracted again.

use console::style;

use crate::checkpoint::CheckpointStore;
use crate::cli::helpers::open_checkpoint;
use crate::config::Settings;
use crate::storage::PartialStore;

/// Clear one manual's progress, or every abandoned mark in a category.
pub async fn cmd_reset(
    settings: &Settings,
    category: &str,
    id: Option<&str>,
    abandoned: bool,
) -> anyhow::Result<()> {
    if id.is_none() && !abandoned {
        anyhow::bail!("Specify a manual id or --abandoned");
    }

    let checkpoint = open_checkpoint(settings)?;
    let partials = PartialStore::new(&settings.partial_dir);

    if abandoned {
        let ids: Vec<String> = checkpoint
            .snapshot()
            .await
            .get(category)
            .map(|p| p.abandoned.iter().cloned().collect())
            .unwrap_or_default();

        let cleared = checkpoint.clear_abandoned(category).await?;
        for abandoned_id in &ids {
            partials.clear_by_id(category, abandoned_id)?;
        }
        println!(
            "{} Cleared {} abandoned manuals in {}",
            style("✓").green(),
            cleared,
            category
        );
    }

    if let Some(id) = id {
        let in_checkpoint = checkpoint.reset_document(category, id).await?;
        let had_partial = partials.clear_by_id(category, id)?;
        if in_checkpoint || had_partial {
            println!("{} Reset {} in {}", style("✓").green(), id, category);
        } else {
            println!(
                "{} No progress recorded for {} in {}",
                style("!").yellow(),
                id,
                category
            );
        }
    }

    Ok(())
}
