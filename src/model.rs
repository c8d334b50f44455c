//! Persisted entity types shared across stages.
//!
//! These are the shapes the repository stores and the stages exchange. Every
//! snapshot the repository writes carries `STATE_SCHEMA_VERSION` so future
//! migrations can detect stale state files.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current schema version for the repository state snapshot.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Current schema version for imported template documents.
pub const TEMPLATE_SCHEMA_VERSION: u32 = 1;

/// Epoch milliseconds, the timestamp unit used throughout persisted state.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Today's date as `YYYY-MM-DD`, used in clean/archive folder names.
pub fn today_stamp() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// A file as reported by the storage provider during a scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScannedFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Slash-joined path from the scan root, filled in during traversal.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Provider-supplied content hash when available.
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Last-modified time in epoch milliseconds.
    #[serde(default)]
    pub modified_at: Option<i64>,
}

/// Stage kind; one persisted run per stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunType {
    Scan,
    Plan,
    Copy,
    Promote,
}

impl std::fmt::Display for RunType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunType::Scan => "SCAN",
            RunType::Plan => "PLAN",
            RunType::Copy => "COPY",
            RunType::Promote => "PROMOTE",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Cleanup,
    Ingest,
}

/// Physical folder ids accumulated across the stages of one cleanup flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunLinks {
    #[serde(default)]
    pub original_folder_id: Option<String>,
    #[serde(default)]
    pub clean_folder_id: Option<String>,
    #[serde(default)]
    pub promoted_folder_id: Option<String>,
    #[serde(default)]
    pub archived_folder_id: Option<String>,
}

/// One execution instance of a stage, with persisted status and progress.
///
/// Status and progress transitions are owned exclusively by the job runner;
/// everything else is set at creation or by the stage that completes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub workspace_id: String,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub company_folder_id: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub mode: Option<RunMode>,
    pub run_type: RunType,
    pub status: RunStatus,
    /// 0-100, monotonically non-decreasing while the run is live.
    pub progress: u8,
    pub started_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub links: RunLinks,
}

/// Which router produced a plan item's proposed destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterType {
    Keyword,
    Llm,
    Other,
}

/// Human review verdict on a plan item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemDecision {
    Approved,
    Overridden,
    Excluded,
}

/// One file's proposed (and eventually reviewed) routing destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: String,
    pub run_id: String,
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub source_path: String,
    pub target_path: String,
    #[serde(default)]
    pub proposed_folder_key: Option<String>,
    /// Set by review when the decision is `Overridden`.
    #[serde(default)]
    pub final_folder_key: Option<String>,
    pub confidence: f64,
    pub router_type: RouterType,
    pub decision: ItemDecision,
    pub needs_approval: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub keyword_matches: Vec<String>,
    pub created_at: i64,
}

impl PlanItem {
    /// The folder key the COPY stage should honor: review override first,
    /// planner proposal otherwise.
    pub fn effective_folder_key(&self) -> Option<&str> {
        self.final_folder_key
            .as_deref()
            .or(self.proposed_folder_key.as_deref())
    }
}

/// The grouping criterion a duplicate flag was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateBasis {
    #[serde(rename = "content-hash")]
    ContentHash,
    #[serde(rename = "name+size")]
    NameSize,
    #[serde(rename = "name+mimetype")]
    NameMime,
}

impl std::fmt::Display for DuplicateBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DuplicateBasis::ContentHash => "content-hash",
            DuplicateBasis::NameSize => "name+size",
            DuplicateBasis::NameMime => "name+mimetype",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateSeverity {
    Exact,
    Probable,
}

impl std::fmt::Display for DuplicateSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DuplicateSeverity::Exact => "exact",
            DuplicateSeverity::Probable => "probable",
        };
        f.pad(s)
    }
}

/// A cluster of files flagged as duplicates under one basis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateFlag {
    pub id: String,
    #[serde(default)]
    pub run_id: Option<String>,
    pub workspace_id: String,
    pub group_id: String,
    /// At least two members, in discovery order.
    pub file_ids: Vec<String>,
    pub basis: DuplicateBasis,
    pub severity: DuplicateSeverity,
    pub detected_at: i64,
}

/// A node in a template's folder tree.
///
/// `key` is the stable semantic identifier referenced by routing rules, plan
/// items, and expected items; it survives renames and moves and is never
/// regenerated once assigned. `path` is derived by `resolve_paths` and never
/// hand-edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub children: Vec<FolderNode>,
}

/// An ordered keyword rule: any keyword substring-matching the filename
/// routes the file to `target_path`. Higher priority wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    #[serde(default)]
    pub id: String,
    pub folder_key: String,
    pub keywords: Vec<String>,
    pub target_path: String,
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    FolderOnly,
    Subtree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemPriority {
    Essential,
    Important,
    #[serde(rename = "Nice-to-have")]
    NiceToHave,
}

/// A compliance expectation: some file matching these criteria should exist
/// under the template folder identified by `folder_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedItem {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub folder_key: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub required_mime_types: Vec<String>,
    pub search_scope: SearchScope,
    /// When set, evidence must additionally be newer than this many days.
    #[serde(default)]
    pub recency_days: Option<u32>,
    pub priority: ItemPriority,
}

/// A folder template: the canonical tree plus routing rules and expectations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub version: u32,
    pub folder_tree: FolderNode,
    #[serde(default)]
    pub routing_rules: Vec<RoutingRule>,
    #[serde(default)]
    pub expected_items: Vec<ExpectedItem>,
    pub created_at: i64,
}
