//! Run state machine: sequences SCAN, PLAN, COPY, and PROMOTE stages.
//!
//! `start_job` persists a `pending` run row and spawns the stage on its own
//! thread; callers poll the repository for progress rather than blocking.
//! Status and progress transitions are owned exclusively by this module:
//! `pending -> running -> completed | failed`, progress monotonically
//! non-decreasing while running. A failed stage keeps its last reported
//! progress and records the error message verbatim.

mod copy;
mod plan;
mod promote;
mod scan;

use crate::error::{ClerkError, Result};
use crate::model::{now_millis, Run, RunMode, RunStatus, RunType};
use crate::planner::{ClassifierAdapter, PlanOptions};
use crate::provider::{RetryPolicy, StorageProvider};
use crate::repo::Repository;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use uuid::Uuid;

/// Everything a stage needs, shared across job threads.
pub struct JobContext {
    pub repo: Arc<dyn Repository>,
    pub provider: Arc<dyn StorageProvider>,
    pub classifier: Arc<ClassifierAdapter>,
    pub retry: RetryPolicy,
    pub plan_options: PlanOptions,
}

/// Stage-specific inputs supplied when a job is started.
#[derive(Debug, Clone)]
pub enum JobPayload {
    Scan {
        folder_id: String,
        company_name: Option<String>,
    },
    Plan {
        /// Restrict planning to these file ids; `None` plans everything.
        file_ids: Option<Vec<String>>,
    },
    Copy {
        /// The PLAN run whose reviewed items should be materialized.
        plan_run_id: String,
        /// Parent under which the clean root folder is created.
        target_folder_id: String,
    },
    Promote {
        /// A prior run whose links carry both original and clean folder ids.
        source_run_id: String,
    },
}

impl JobPayload {
    fn run_type(&self) -> RunType {
        match self {
            JobPayload::Scan { .. } => RunType::Scan,
            JobPayload::Plan { .. } => RunType::Plan,
            JobPayload::Copy { .. } => RunType::Copy,
            JobPayload::Promote { .. } => RunType::Promote,
        }
    }
}

/// Persists progress for one run, clamping to keep the observed sequence
/// monotonically non-decreasing.
pub(crate) struct ProgressSink {
    repo: Arc<dyn Repository>,
    run_id: String,
    last: Mutex<u8>,
}

impl ProgressSink {
    fn new(repo: Arc<dyn Repository>, run_id: String) -> Self {
        ProgressSink {
            repo,
            run_id,
            last: Mutex::new(0),
        }
    }

    pub(crate) fn update(&self, progress: u8, message: &str) -> Result<()> {
        let progress = {
            let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
            *last = (*last).max(progress.min(100));
            *last
        };
        let mut run = self.repo.get_run(&self.run_id)?;
        run.progress = progress;
        self.repo.update_run(run)?;
        tracing::debug!(run_id = %self.run_id, progress, message, "progress");
        Ok(())
    }
}

/// Tracks in-flight stage executions so they can be awaited and are pruned
/// when they settle. Instantiate one per process (or per test) and inject
/// it; there is no global instance.
#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<Inner>,
}

struct Inner {
    ctx: JobContext,
    running: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl JobRunner {
    pub fn new(ctx: JobContext) -> Self {
        JobRunner {
            inner: Arc::new(Inner {
                ctx,
                running: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a `pending` run row, start the stage on its own thread, and
    /// return the job id immediately.
    ///
    /// PLAN and COPY runs inherit company info and links from the
    /// workspace's most recent SCAN run; PROMOTE inherits from its explicit
    /// source run and fails validation before any row is written if the
    /// required links are missing.
    pub fn start_job(
        &self,
        workspace_id: &str,
        template_id: Option<String>,
        payload: JobPayload,
    ) -> Result<String> {
        let repo = &self.inner.ctx.repo;
        let run_type = payload.run_type();
        let job_id = Uuid::new_v4().to_string();

        let mut run = Run {
            id: job_id.clone(),
            workspace_id: workspace_id.to_string(),
            template_id,
            company_folder_id: None,
            company_name: None,
            mode: Some(RunMode::Cleanup),
            run_type,
            status: RunStatus::Pending,
            progress: 0,
            started_at: now_millis(),
            completed_at: None,
            error_message: None,
            links: Default::default(),
        };

        match &payload {
            JobPayload::Scan {
                folder_id,
                company_name,
            } => {
                run.company_folder_id = Some(folder_id.clone());
                run.company_name = company_name.clone();
            }
            JobPayload::Plan { .. } | JobPayload::Copy { .. } => {
                if let Some(scan) = repo.latest_run(workspace_id, RunType::Scan)? {
                    run.company_folder_id = scan.company_folder_id;
                    run.company_name = scan.company_name;
                    run.links = scan.links;
                }
            }
            JobPayload::Promote { source_run_id } => {
                let source = repo.get_run(source_run_id)?;
                if source.links.original_folder_id.is_none()
                    || source.links.clean_folder_id.is_none()
                {
                    return Err(ClerkError::validation(format!(
                        "run {source_run_id} is missing original/clean folder links; \
                         promote requires a completed copy"
                    )));
                }
                run.company_folder_id = source.company_folder_id;
                run.company_name = source.company_name;
                run.links = source.links;
            }
        }

        repo.insert_run(run)?;

        let runner = self.clone();
        let id_for_thread = job_id.clone();
        let handle = std::thread::Builder::new()
            .name(format!("job-{run_type}"))
            .spawn(move || {
                runner.execute(&id_for_thread, payload);
                runner
                    .inner
                    .running
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .remove(&id_for_thread);
            })
            .map_err(|err| {
                ClerkError::provider_terminal(format!("spawn job thread: {err}"))
            })?;

        self.inner
            .running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(job_id.clone(), handle);

        Ok(job_id)
    }

    /// Block until the job's thread settles, then return the terminal run.
    pub fn wait(&self, job_id: &str) -> Result<Run> {
        let handle = self
            .inner
            .running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(job_id);
        if let Some(handle) = handle {
            // A stage panic still leaves the run row readable.
            let _ = handle.join();
        }
        self.inner.ctx.repo.get_run(job_id)
    }

    fn execute(&self, job_id: &str, payload: JobPayload) {
        let ctx = &self.inner.ctx;
        let result = self.execute_stage(job_id, &payload);

        let mut terminal = match ctx.repo.get_run(job_id) {
            Ok(run) => run,
            Err(err) => {
                tracing::error!(job_id, error = %err, "run row vanished during execution");
                return;
            }
        };
        terminal.completed_at = Some(now_millis());
        match result {
            Ok(()) => {
                terminal.status = RunStatus::Completed;
                terminal.progress = 100;
                tracing::info!(job_id, run_type = %terminal.run_type, "job completed");
            }
            Err(err) => {
                // Progress keeps its last reported value.
                terminal.status = RunStatus::Failed;
                terminal.error_message = Some(err.to_string());
                tracing::error!(job_id, run_type = %terminal.run_type, error = %err, "job failed");
            }
        }
        if let Err(err) = ctx.repo.update_run(terminal) {
            tracing::error!(job_id, error = %err, "failed to persist terminal run state");
        }
    }

    fn execute_stage(&self, job_id: &str, payload: &JobPayload) -> Result<()> {
        let ctx = &self.inner.ctx;

        let mut run = ctx.repo.get_run(job_id)?;
        run.status = RunStatus::Running;
        run.started_at = now_millis();
        ctx.repo.update_run(run.clone())?;

        let sink = ProgressSink::new(ctx.repo.clone(), job_id.to_string());
        match payload {
            JobPayload::Scan {
                folder_id,
                company_name,
            } => scan::run_scan(ctx, &run, &sink, folder_id, company_name.as_deref()),
            JobPayload::Plan { file_ids } => plan::run_plan(ctx, &run, &sink, file_ids.as_deref()),
            JobPayload::Copy {
                plan_run_id,
                target_folder_id,
            } => copy::run_copy(ctx, &run, &sink, plan_run_id, target_folder_id),
            JobPayload::Promote { .. } => promote::run_promote(ctx, &run, &sink),
        }
    }
}
