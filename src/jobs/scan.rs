//! SCAN stage: inventory a company folder and flag duplicate candidates.

use super::{JobContext, ProgressSink};
use crate::dupes::detect_duplicates;
use crate::error::Result;
use crate::model::Run;
use crate::provider::walk_folder;

pub(super) fn run_scan(
    ctx: &JobContext,
    run: &Run,
    sink: &ProgressSink,
    folder_id: &str,
    company_name: Option<&str>,
) -> Result<()> {
    sink.update(10, "listing folder contents")?;

    let inventory = walk_folder(ctx.provider.as_ref(), folder_id, &ctx.retry)?;
    tracing::info!(
        run_id = %run.id,
        files = inventory.files.len(),
        folders = inventory.folders.len(),
        "scan inventory complete"
    );
    sink.update(50, "detecting duplicates")?;

    let flags = detect_duplicates(&inventory.files, Some(&run.id), &run.workspace_id);
    if !flags.is_empty() {
        tracing::info!(run_id = %run.id, flags = flags.len(), "duplicate candidates found");
    }
    ctx.repo.insert_duplicate_flags(flags)?;
    sink.update(90, "recording results")?;

    let mut run = ctx.repo.get_run(&run.id)?;
    run.company_folder_id = Some(folder_id.to_string());
    if let Some(name) = company_name {
        run.company_name = Some(name.to_string());
    }
    run.links.original_folder_id = Some(folder_id.to_string());
    ctx.repo.update_run(run)?;

    Ok(())
}
