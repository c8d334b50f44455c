//! Missing-item report: checks a template's expectations against live
//! folder contents.
//!
//! Runs independently of the job state machine; it only needs a provider
//! and a template. Per-item lookup failures (absent folder, listing error)
//! are reported as missing rather than aborting the whole report.

use crate::error::Result;
use crate::model::{now_millis, ExpectedItem, ItemPriority, ScannedFile, SearchScope, Template};
use crate::provider::retry::with_retry;
use crate::provider::{walk_folder, ListOptions, RetryPolicy, StorageProvider};
use serde::Serialize;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Files and criteria that supported a "found" verdict.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Evidence {
    pub found_files: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub matched_mime_types: Vec<String>,
}

/// One expected item's verdict.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub expected_item_id: String,
    pub name: String,
    pub priority: ItemPriority,
    pub missing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Evaluate every expected item of `template` against the physical folder
/// `company_folder_id`, whose layout is assumed to mirror the template tree.
pub fn generate_report(
    provider: &dyn StorageProvider,
    retry: &RetryPolicy,
    template: &Template,
    company_folder_id: &str,
) -> Result<Vec<ReportRow>> {
    let now = now_millis();
    let mut rows = Vec::with_capacity(template.expected_items.len());
    for item in &template.expected_items {
        rows.push(evaluate_item(
            provider,
            retry,
            template,
            company_folder_id,
            item,
            now,
        ));
    }
    let missing = rows.iter().filter(|r| r.missing).count();
    tracing::info!(
        template = %template.name,
        expected = rows.len(),
        missing,
        "report generated"
    );
    Ok(rows)
}

fn evaluate_item(
    provider: &dyn StorageProvider,
    retry: &RetryPolicy,
    template: &Template,
    company_folder_id: &str,
    item: &ExpectedItem,
    now: i64,
) -> ReportRow {
    let missing = |reason: String| ReportRow {
        expected_item_id: item.id.clone(),
        name: item.name.clone(),
        priority: item.priority,
        missing: true,
        evidence: None,
        reason: Some(reason),
    };

    let Some(node) = crate::template::find_by_key(&template.folder_tree, &item.folder_key) else {
        return missing(format!("folder key {} not in template", item.folder_key));
    };
    // Relative path under the company folder: the node's path minus the
    // template root segment.
    let segments: Vec<&str> = node.path.split('/').skip(1).collect();

    let folder_id = match resolve_folder(provider, retry, company_folder_id, &segments) {
        Ok(Some(id)) => id,
        Ok(None) => return missing(format!("folder {} not present", node.path)),
        Err(err) => return missing(format!("folder lookup failed: {err}")),
    };

    let files = match list_scope(provider, retry, &folder_id, item.search_scope) {
        Ok(files) => files,
        Err(err) => return missing(format!("listing failed: {err}")),
    };

    let mut evidence = Evidence::default();
    let has_criteria = !item.keywords.is_empty() || !item.required_mime_types.is_empty();
    let mut matched: Vec<&ScannedFile> = Vec::new();
    for file in &files {
        let name_lower = file.name.to_lowercase();
        let keyword_hits: Vec<&String> = item
            .keywords
            .iter()
            .filter(|kw| name_lower.contains(&kw.to_lowercase()))
            .collect();
        let mime_hits: Vec<&String> = item
            .required_mime_types
            .iter()
            .filter(|req| file.mime_type == **req || file.mime_type.starts_with(req.as_str()))
            .collect();
        let is_match = if has_criteria {
            !keyword_hits.is_empty() || !mime_hits.is_empty()
        } else {
            true
        };
        if is_match {
            matched.push(file);
            for kw in keyword_hits {
                if !evidence.matched_keywords.contains(kw) {
                    evidence.matched_keywords.push(kw.clone());
                }
            }
            for mime in mime_hits {
                if !evidence.matched_mime_types.contains(mime) {
                    evidence.matched_mime_types.push(mime.clone());
                }
            }
        }
    }

    if matched.is_empty() {
        return missing("no matching file found".to_string());
    }

    if let Some(days) = item.recency_days {
        let cutoff = now - i64::from(days) * MILLIS_PER_DAY;
        let recent = matched
            .iter()
            .any(|file| file.modified_at.is_some_and(|ts| ts >= cutoff));
        if !recent {
            evidence.found_files = matched.iter().map(|f| f.name.clone()).collect();
            return ReportRow {
                expected_item_id: item.id.clone(),
                name: item.name.clone(),
                priority: item.priority,
                missing: true,
                evidence: Some(evidence),
                reason: Some(format!("no matching file modified within {days} days")),
            };
        }
    }

    evidence.found_files = matched.iter().map(|f| f.name.clone()).collect();
    ReportRow {
        expected_item_id: item.id.clone(),
        name: item.name.clone(),
        priority: item.priority,
        missing: false,
        evidence: Some(evidence),
        reason: None,
    }
}

/// Descend from `root_id` through named child folders. `Ok(None)` means a
/// segment was absent.
fn resolve_folder(
    provider: &dyn StorageProvider,
    retry: &RetryPolicy,
    root_id: &str,
    segments: &[&str],
) -> Result<Option<String>> {
    let mut current = root_id.to_string();
    for segment in segments {
        let mut page_token = None;
        let mut found = None;
        loop {
            let page = with_retry(retry, "list for report", || {
                provider.list_children(
                    &current,
                    &ListOptions {
                        include_trashed: false,
                        page_token: page_token.clone(),
                    },
                )
            })?;
            if let Some(folder) = page.folders.into_iter().find(|f| f.name == *segment) {
                found = Some(folder.id);
                break;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        match found {
            Some(id) => current = id,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn list_scope(
    provider: &dyn StorageProvider,
    retry: &RetryPolicy,
    folder_id: &str,
    scope: SearchScope,
) -> Result<Vec<ScannedFile>> {
    match scope {
        SearchScope::Subtree => Ok(walk_folder(provider, folder_id, retry)?.files),
        SearchScope::FolderOnly => {
            let mut files = Vec::new();
            let mut page_token = None;
            loop {
                let page = with_retry(retry, "list folder for report", || {
                    provider.list_children(
                        folder_id,
                        &ListOptions {
                            include_trashed: false,
                            page_token: page_token.clone(),
                        },
                    )
                })?;
                files.extend(page.files);
                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
            Ok(files)
        }
    }
}
