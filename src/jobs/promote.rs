//! PROMOTE stage: swap the clean folder into the original's place.
//!
//! The original folder is renamed `{name}__OLD__{date}` and moved under an
//! `__OLD__/Archive` folder next to it; the clean folder then takes over
//! the original's parent and name. Preconditions are checked before any
//! provider mutation so a rejected promote has zero side effects.

use super::{JobContext, ProgressSink};
use crate::error::{ClerkError, Result};
use crate::model::{today_stamp, Run};
use crate::provider::retry::with_retry;
use crate::provider::{FolderMeta, ListOptions, StorageProvider};
use crate::provider::RetryPolicy;
use regex::Regex;
use std::sync::LazyLock;

const OLD_FOLDER_NAME: &str = "__OLD__";
const ARCHIVE_FOLDER_NAME: &str = "Archive";

static CLEAN_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__CLEAN__.*$").expect("literal pattern"));

pub(super) fn run_promote(ctx: &JobContext, run: &Run, sink: &ProgressSink) -> Result<()> {
    let original_id = run.links.original_folder_id.clone().ok_or_else(|| {
        ClerkError::invariant("promote run has no original folder link")
    })?;
    let clean_id = run.links.clean_folder_id.clone().ok_or_else(|| {
        ClerkError::invariant("promote run has no clean folder link")
    })?;
    sink.update(10, "resolving folders")?;

    let original = with_retry(&ctx.retry, "stat original folder", || {
        ctx.provider.get_metadata(&original_id)
    })?;
    let parent_id = original
        .parents
        .first()
        .cloned()
        .ok_or_else(|| ClerkError::invariant("original folder has no parent"))?;

    let old_folder = ensure_child_folder(
        ctx.provider.as_ref(),
        &ctx.retry,
        &parent_id,
        OLD_FOLDER_NAME,
    )?;
    let archive = ensure_child_folder(
        ctx.provider.as_ref(),
        &ctx.retry,
        &old_folder.id,
        ARCHIVE_FOLDER_NAME,
    )?;
    sink.update(40, "archiving original")?;

    let archived_name = format!("{}__OLD__{}", original.name, today_stamp());
    let archived_id = with_retry(&ctx.retry, "archive original folder", || {
        ctx.provider
            .move_and_rename(&original_id, &parent_id, &archive.id, Some(&archived_name))
    })?;
    tracing::info!(run_id = %run.id, archived = %archived_name, "original folder archived");
    sink.update(70, "promoting clean folder")?;

    let clean = with_retry(&ctx.retry, "stat clean folder", || {
        ctx.provider.get_metadata(&clean_id)
    })?;
    let clean_parent = clean
        .parents
        .first()
        .cloned()
        .ok_or_else(|| ClerkError::invariant("clean folder has no parent"))?;
    let restored_name = strip_clean_suffix(&original.name);
    let promoted_id = with_retry(&ctx.retry, "promote clean folder", || {
        ctx.provider
            .move_and_rename(&clean_id, &clean_parent, &parent_id, Some(&restored_name))
    })?;
    tracing::info!(run_id = %run.id, name = %restored_name, "clean folder promoted");
    sink.update(90, "recording links")?;

    // Links carry the post-move ids; path-id providers change ids on moves.
    let mut run = ctx.repo.get_run(&run.id)?;
    run.links.promoted_folder_id = Some(promoted_id);
    run.links.archived_folder_id = Some(archived_id);
    ctx.repo.update_run(run)?;

    Ok(())
}

/// Strip a trailing `__CLEAN__...` marker so a promoted folder never carries
/// staging decoration in its final name.
fn strip_clean_suffix(name: &str) -> String {
    CLEAN_SUFFIX.replace(name, "").into_owned()
}

/// Find a child folder by name, creating it when absent.
fn ensure_child_folder(
    provider: &dyn StorageProvider,
    retry: &RetryPolicy,
    parent_id: &str,
    name: &str,
) -> Result<FolderMeta> {
    let mut page_token = None;
    loop {
        let page = with_retry(retry, "list for ensure folder", || {
            provider.list_children(
                parent_id,
                &ListOptions {
                    include_trashed: false,
                    page_token: page_token.clone(),
                },
            )
        })?;
        if let Some(found) = page.folders.into_iter().find(|f| f.name == name) {
            return Ok(found);
        }
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }
    with_retry(retry, "create ensure folder", || {
        provider.create_folder(parent_id, name)
    })
}
