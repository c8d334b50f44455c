//! PLAN stage: route every scanned file and persist the reviewable plan.

use super::{JobContext, ProgressSink};
use crate::error::{ClerkError, Result};
use crate::model::{now_millis, ItemDecision, PlanItem, Run};
use crate::planner::generate_plan;
use crate::provider::walk_folder;
use uuid::Uuid;

pub(super) fn run_plan(
    ctx: &JobContext,
    run: &Run,
    sink: &ProgressSink,
    file_ids: Option<&[String]>,
) -> Result<()> {
    let template_id = run
        .template_id
        .as_deref()
        .ok_or_else(|| ClerkError::validation("plan requires a template id"))?;
    let folder_id = run.company_folder_id.as_deref().ok_or_else(|| {
        ClerkError::validation("no company folder recorded; run a scan first")
    })?;

    let template = ctx.repo.get_template(template_id)?;
    sink.update(10, "template loaded")?;

    let inventory = walk_folder(ctx.provider.as_ref(), folder_id, &ctx.retry)?;
    sink.update(20, "folder inventoried")?;

    let files: Vec<_> = match file_ids {
        Some(ids) => inventory
            .files
            .into_iter()
            .filter(|f| ids.iter().any(|id| id == &f.id))
            .collect(),
        None => inventory.files,
    };
    tracing::info!(run_id = %run.id, files = files.len(), template = %template.name, "routing files");
    sink.update(40, "routing files")?;

    let decisions = generate_plan(&files, &template, &ctx.classifier, &ctx.plan_options);
    sink.update(80, "persisting plan")?;

    let created_at = now_millis();
    let items: Vec<PlanItem> = decisions
        .into_iter()
        .map(|d| PlanItem {
            id: Uuid::new_v4().to_string(),
            run_id: run.id.clone(),
            file_id: d.file_id,
            file_name: d.file_name,
            mime_type: d.mime_type,
            source_path: d.source_path,
            target_path: d.target_path,
            proposed_folder_key: d.proposed_folder_key,
            final_folder_key: None,
            confidence: d.confidence,
            router_type: d.router_type,
            decision: ItemDecision::Approved,
            needs_approval: d.needs_approval,
            reason: d.reason,
            keyword_matches: d.keyword_matches,
            created_at,
        })
        .collect();
    ctx.repo.insert_plan_items(items)?;

    Ok(())
}
