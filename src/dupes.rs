//! Duplicate detection over a scanned file list.
//!
//! Three independent hash-map grouping passes: content hash, lower-cased
//! name + size, lower-cased name + MIME type. Each pass tracks its own
//! grouping, so a file can legitimately appear in groups from different
//! bases but in at most one group per basis. Groups of size 1 are never
//! emitted.

use crate::model::{now_millis, DuplicateBasis, DuplicateFlag, DuplicateSeverity, ScannedFile};
use std::collections::HashMap;
use uuid::Uuid;

/// Pure grouping pass over an in-memory file list. Persistence is the
/// caller's concern (the SCAN stage writes the flags it gets back).
pub fn detect_duplicates(
    files: &[ScannedFile],
    run_id: Option<&str>,
    workspace_id: &str,
) -> Vec<DuplicateFlag> {
    let mut flags = Vec::new();

    // Pass 1: exact duplicates by provider content hash, when present.
    let mut by_hash: HashMap<String, Vec<String>> = HashMap::new();
    let mut hash_order: Vec<String> = Vec::new();
    for file in files {
        if let Some(hash) = &file.content_hash {
            let group = by_hash.entry(hash.clone()).or_default();
            if group.is_empty() {
                hash_order.push(hash.clone());
            }
            group.push(file.id.clone());
        }
    }
    emit_groups(
        &mut flags,
        &by_hash,
        &hash_order,
        run_id,
        workspace_id,
        DuplicateBasis::ContentHash,
        DuplicateSeverity::Exact,
    );

    // Pass 2: probable duplicates by name + size.
    let mut by_name_size: HashMap<String, Vec<String>> = HashMap::new();
    let mut name_size_order: Vec<String> = Vec::new();
    for file in files {
        let key = format!(
            "{}|{}",
            file.name.to_lowercase(),
            file.size.map(|s| s.to_string()).unwrap_or_default()
        );
        let group = by_name_size.entry(key.clone()).or_default();
        if group.is_empty() {
            name_size_order.push(key);
        }
        group.push(file.id.clone());
    }
    emit_groups(
        &mut flags,
        &by_name_size,
        &name_size_order,
        run_id,
        workspace_id,
        DuplicateBasis::NameSize,
        DuplicateSeverity::Probable,
    );

    // Pass 3: probable duplicates by name + MIME type.
    let mut by_name_mime: HashMap<String, Vec<String>> = HashMap::new();
    let mut name_mime_order: Vec<String> = Vec::new();
    for file in files {
        let key = format!("{}|{}", file.name.to_lowercase(), file.mime_type);
        let group = by_name_mime.entry(key.clone()).or_default();
        if group.is_empty() {
            name_mime_order.push(key);
        }
        group.push(file.id.clone());
    }
    emit_groups(
        &mut flags,
        &by_name_mime,
        &name_mime_order,
        run_id,
        workspace_id,
        DuplicateBasis::NameMime,
        DuplicateSeverity::Probable,
    );

    flags
}

fn emit_groups(
    flags: &mut Vec<DuplicateFlag>,
    groups: &HashMap<String, Vec<String>>,
    key_order: &[String],
    run_id: Option<&str>,
    workspace_id: &str,
    basis: DuplicateBasis,
    severity: DuplicateSeverity,
) {
    // key_order keeps output deterministic in file-discovery order.
    for key in key_order {
        let file_ids = &groups[key];
        if file_ids.len() < 2 {
            continue;
        }
        flags.push(DuplicateFlag {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.map(|id| id.to_string()),
            workspace_id: workspace_id.to_string(),
            group_id: Uuid::new_v4().to_string(),
            file_ids: file_ids.clone(),
            basis,
            severity,
            detected_at: now_millis(),
        });
    }
}
