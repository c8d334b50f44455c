//! Repository capability: persistence for runs, templates, plan items, and
//! duplicate flags.
//!
//! The `JsonStore` implementation keeps the whole state behind one mutex and
//! rewrites a single JSON snapshot on every commit, so multi-row mutations
//! are all-or-nothing and concurrent stage threads never interleave writes.
//! Absence of an id is always a NotFound error, never a panic.

use crate::error::{ClerkError, Result};
use crate::model::{
    DuplicateFlag, ItemDecision, PlanItem, Run, RunType, Template, STATE_SCHEMA_VERSION,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// One review mutation applied by `update_plan_items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItemUpdate {
    pub item_id: String,
    pub decision: ItemDecision,
    #[serde(default)]
    pub final_folder_key: Option<String>,
}

/// The repository capability consumed by the run stages and the CLI.
pub trait Repository: Send + Sync {
    fn insert_run(&self, run: Run) -> Result<()>;
    fn get_run(&self, id: &str) -> Result<Run>;
    /// Replace a run row by id. The job runner is the sole writer of
    /// status/progress, so replace semantics are safe here.
    fn update_run(&self, run: Run) -> Result<()>;
    /// Runs for a workspace, newest first.
    fn list_runs(&self, workspace_id: &str) -> Result<Vec<Run>>;
    /// Most recent run of a given type for a workspace, if any.
    fn latest_run(&self, workspace_id: &str, run_type: RunType) -> Result<Option<Run>>;

    fn insert_template(&self, template: Template) -> Result<()>;
    fn get_template(&self, id: &str) -> Result<Template>;
    fn list_templates(&self) -> Result<Vec<Template>>;

    fn insert_plan_items(&self, items: Vec<PlanItem>) -> Result<()>;
    /// Plan items for a run, in insertion order.
    fn list_plan_items(&self, run_id: &str) -> Result<Vec<PlanItem>>;
    /// Apply review updates transactionally: every update is validated
    /// before any is applied, and either all land or none do. Each update
    /// replaces `final_folder_key`, so a non-override decision clears any
    /// earlier override.
    fn update_plan_items(&self, run_id: &str, updates: &[PlanItemUpdate]) -> Result<usize>;

    fn insert_duplicate_flags(&self, flags: Vec<DuplicateFlag>) -> Result<()>;
    fn list_duplicate_flags(
        &self,
        workspace_id: &str,
        run_id: Option<&str>,
    ) -> Result<Vec<DuplicateFlag>>;
}

/// Serialized snapshot shape.
#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    schema_version: u32,
    #[serde(default)]
    runs: Vec<Run>,
    #[serde(default)]
    templates: Vec<Template>,
    #[serde(default)]
    plan_items: Vec<PlanItem>,
    #[serde(default)]
    duplicate_flags: Vec<DuplicateFlag>,
}

/// Snapshot-file repository. `path: None` keeps state purely in memory,
/// which tests use for isolation.
pub struct JsonStore {
    path: Option<PathBuf>,
    state: Mutex<State>,
}

impl JsonStore {
    /// Open (or initialize) a store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.is_file() {
            let text = fs::read_to_string(&path)?;
            let state: State = serde_json::from_str(&text)?;
            if state.schema_version > STATE_SCHEMA_VERSION {
                return Err(ClerkError::validation(format!(
                    "state file {} has schema version {} newer than supported {}",
                    path.display(),
                    state.schema_version,
                    STATE_SCHEMA_VERSION
                )));
            }
            state
        } else {
            State {
                schema_version: STATE_SCHEMA_VERSION,
                ..State::default()
            }
        };
        Ok(JsonStore {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub fn in_memory() -> Self {
        JsonStore {
            path: None,
            state: Mutex::new(State {
                schema_version: STATE_SCHEMA_VERSION,
                ..State::default()
            }),
        }
    }

    /// Run a mutation under the lock and persist the snapshot afterwards.
    fn commit<T>(&self, mutate: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let value = mutate(&mut state)?;
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let text = serde_json::to_string_pretty(&*state)?;
            fs::write(path, text.as_bytes())?;
        }
        Ok(value)
    }

    fn read<T>(&self, view: impl FnOnce(&State) -> Result<T>) -> Result<T> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        view(&state)
    }
}

impl Repository for JsonStore {
    fn insert_run(&self, run: Run) -> Result<()> {
        self.commit(|state| {
            state.runs.push(run);
            Ok(())
        })
    }

    fn get_run(&self, id: &str) -> Result<Run> {
        self.read(|state| {
            state
                .runs
                .iter()
                .find(|run| run.id == id)
                .cloned()
                .ok_or_else(|| ClerkError::not_found("run", id))
        })
    }

    fn update_run(&self, run: Run) -> Result<()> {
        self.commit(|state| {
            let slot = state
                .runs
                .iter_mut()
                .find(|existing| existing.id == run.id)
                .ok_or_else(|| ClerkError::not_found("run", &run.id))?;
            *slot = run;
            Ok(())
        })
    }

    fn list_runs(&self, workspace_id: &str) -> Result<Vec<Run>> {
        self.read(|state| {
            let mut runs: Vec<Run> = state
                .runs
                .iter()
                .filter(|run| run.workspace_id == workspace_id)
                .cloned()
                .collect();
            runs.sort_by_key(|run| std::cmp::Reverse(run.started_at));
            Ok(runs)
        })
    }

    fn latest_run(&self, workspace_id: &str, run_type: RunType) -> Result<Option<Run>> {
        Ok(self
            .list_runs(workspace_id)?
            .into_iter()
            .find(|run| run.run_type == run_type))
    }

    fn insert_template(&self, template: Template) -> Result<()> {
        self.commit(|state| {
            if state.templates.iter().any(|t| t.id == template.id) {
                return Err(ClerkError::validation(format!(
                    "template {} already exists",
                    template.id
                )));
            }
            state.templates.push(template);
            Ok(())
        })
    }

    fn get_template(&self, id: &str) -> Result<Template> {
        self.read(|state| {
            state
                .templates
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .ok_or_else(|| ClerkError::not_found("template", id))
        })
    }

    fn list_templates(&self) -> Result<Vec<Template>> {
        self.read(|state| Ok(state.templates.clone()))
    }

    fn insert_plan_items(&self, items: Vec<PlanItem>) -> Result<()> {
        self.commit(|state| {
            state.plan_items.extend(items);
            Ok(())
        })
    }

    fn list_plan_items(&self, run_id: &str) -> Result<Vec<PlanItem>> {
        self.read(|state| {
            Ok(state
                .plan_items
                .iter()
                .filter(|item| item.run_id == run_id)
                .cloned()
                .collect())
        })
    }

    fn update_plan_items(&self, run_id: &str, updates: &[PlanItemUpdate]) -> Result<usize> {
        self.commit(|state| {
            // Validate every update before touching anything.
            for update in updates {
                if update.decision == ItemDecision::Overridden
                    && update.final_folder_key.is_none()
                {
                    return Err(ClerkError::validation(format!(
                        "override of item {} requires a final folder key",
                        update.item_id
                    )));
                }
                let known = state
                    .plan_items
                    .iter()
                    .any(|item| item.run_id == run_id && item.id == update.item_id);
                if !known {
                    return Err(ClerkError::not_found("plan item", &update.item_id));
                }
            }
            for update in updates {
                let item = state
                    .plan_items
                    .iter_mut()
                    .find(|item| item.run_id == run_id && item.id == update.item_id)
                    .ok_or_else(|| ClerkError::not_found("plan item", &update.item_id))?;
                item.decision = update.decision;
                // Replaced wholesale: approving or excluding an item clears
                // any earlier override key.
                item.final_folder_key = update.final_folder_key.clone();
            }
            Ok(updates.len())
        })
    }

    fn insert_duplicate_flags(&self, flags: Vec<DuplicateFlag>) -> Result<()> {
        self.commit(|state| {
            state.duplicate_flags.extend(flags);
            Ok(())
        })
    }

    fn list_duplicate_flags(
        &self,
        workspace_id: &str,
        run_id: Option<&str>,
    ) -> Result<Vec<DuplicateFlag>> {
        self.read(|state| {
            Ok(state
                .duplicate_flags
                .iter()
                .filter(|flag| flag.workspace_id == workspace_id)
                .filter(|flag| match run_id {
                    Some(run_id) => flag.run_id.as_deref() == Some(run_id),
                    None => true,
                })
                .cloned()
                .collect())
        })
    }
}
