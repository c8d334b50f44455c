//! COPY stage: materialize approved plan items into a fresh clean folder.
//!
//! Originals are never touched; every destination folder from the template
//! tree is created under a new `{company}__CLEAN__{date}` root and approved
//! or overridden items are copied into it. Per-file copy failures are
//! logged and skipped so one bad file does not abort the stage.

use super::{JobContext, ProgressSink};
use crate::error::{ClerkError, Result};
use crate::model::{today_stamp, FolderNode, ItemDecision, Run};
use crate::provider::retry::with_retry;
use std::collections::HashMap;

pub(super) fn run_copy(
    ctx: &JobContext,
    run: &Run,
    sink: &ProgressSink,
    plan_run_id: &str,
    target_folder_id: &str,
) -> Result<()> {
    let template_id = run
        .template_id
        .as_deref()
        .ok_or_else(|| ClerkError::validation("copy requires a template id"))?;
    let template = ctx.repo.get_template(template_id)?;
    sink.update(5, "loading plan")?;

    // Surfaces NotFound for a bad plan run id; an existing run with zero
    // eligible items still gets its (empty) clean tree built.
    ctx.repo.get_run(plan_run_id)?;
    let items = ctx.repo.list_plan_items(plan_run_id)?;
    let to_copy: Vec<_> = items
        .into_iter()
        .filter(|item| item.decision != ItemDecision::Excluded)
        .collect();
    sink.update(10, "creating clean folder")?;

    let company = run.company_name.as_deref().unwrap_or("Company");
    let clean_name = format!("{company}__CLEAN__{}", today_stamp());
    let clean_root = with_retry(&ctx.retry, "create clean root", || {
        ctx.provider.create_folder(target_folder_id, &clean_name)
    })?;
    tracing::info!(run_id = %run.id, folder = %clean_name, "clean root created");

    // Mirror the template tree under the clean root, mapping each folder
    // key to the physical folder id it was created as.
    let mut key_to_id: HashMap<String, String> = HashMap::new();
    key_to_id.insert(template.folder_tree.key.clone(), clean_root.id.clone());
    let mut worklist: Vec<(&FolderNode, String)> = template
        .folder_tree
        .children
        .iter()
        .map(|child| (child, clean_root.id.clone()))
        .collect();
    while let Some((node, parent_id)) = worklist.pop() {
        let created = with_retry(&ctx.retry, "create template folder", || {
            ctx.provider.create_folder(&parent_id, &node.name)
        })?;
        key_to_id.insert(node.key.clone(), created.id.clone());
        for child in &node.children {
            worklist.push((child, created.id.clone()));
        }
    }
    sink.update(40, "copying files")?;

    let total = to_copy.len();
    let mut copied = 0usize;
    let mut skipped = 0usize;
    for (index, item) in to_copy.iter().enumerate() {
        let Some(dest_id) = item
            .effective_folder_key()
            .and_then(|key| key_to_id.get(key))
        else {
            tracing::warn!(
                run_id = %run.id,
                file = %item.file_name,
                key = item.effective_folder_key().unwrap_or("<none>"),
                "no physical folder for routed key, skipping"
            );
            skipped += 1;
            continue;
        };

        match with_retry(&ctx.retry, "copy file", || {
            ctx.provider.copy_file(&item.file_id, dest_id, None)
        }) {
            Ok(_) => copied += 1,
            Err(err) => {
                tracing::warn!(run_id = %run.id, file = %item.file_name, error = %err, "copy failed, skipping");
                skipped += 1;
            }
        }

        if (index + 1) % 10 == 0 {
            let fraction = (index + 1) as f64 / total as f64;
            sink.update(40 + (fraction * 50.0) as u8, "copying files")?;
        }
    }
    tracing::info!(run_id = %run.id, copied, skipped, total, "copy sweep finished");
    sink.update(90, "recording clean folder")?;

    let mut run = ctx.repo.get_run(&run.id)?;
    run.links.clean_folder_id = Some(clean_root.id);
    ctx.repo.update_run(run)?;

    Ok(())
}
