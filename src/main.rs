use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod cli;
mod config;
mod dupes;
mod error;
mod jobs;
mod model;
mod planner;
mod provider;
mod repo;
mod report;
mod template;

use cli::{Command, RootArgs, TemplateCommand};
use config::WorkspaceConfig;
use jobs::{JobContext, JobPayload, JobRunner};
use model::{
    now_millis, ExpectedItem, FolderNode, ItemDecision, RoutingRule, Run, RunStatus, Template,
    TEMPLATE_SCHEMA_VERSION,
};
use planner::{ClassifierAdapter, ClassifierBackend, CommandClassifier, HttpClassifier, PlanOptions};
use provider::{LocalDirProvider, RetryPolicy};
use repo::{JsonStore, PlanItemUpdate, Repository};

fn main() -> Result<()> {
    let args = RootArgs::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let state_dir = resolve_state_dir(&args)?;
    std::fs::create_dir_all(&state_dir)
        .with_context(|| format!("create state dir {}", state_dir.display()))?;
    let config = WorkspaceConfig::load(&state_dir.join("config.json"))?;
    let repo: Arc<dyn Repository> = Arc::new(JsonStore::open(state_dir.join("state.json"))?);

    match args.command {
        Command::Scan(ref scan) => {
            let runner = build_runner(&args, &config, repo.clone())?;
            let job_id = runner.start_job(
                &args.workspace,
                None,
                JobPayload::Scan {
                    folder_id: scan.folder.clone(),
                    company_name: scan.company_name.clone(),
                },
            )?;
            finish_job(&runner, &job_id, scan.wait)
        }
        Command::Plan(ref plan) => {
            let runner = build_runner(&args, &config, repo.clone())?;
            let file_ids = if plan.file_ids.is_empty() {
                None
            } else {
                Some(plan.file_ids.clone())
            };
            let job_id = runner.start_job(
                &args.workspace,
                Some(plan.template.clone()),
                JobPayload::Plan { file_ids },
            )?;
            finish_job(&runner, &job_id, plan.wait)
        }
        Command::Copy(ref copy) => {
            let template_id = match &copy.template {
                Some(id) => id.clone(),
                None => repo
                    .get_run(&copy.plan_run)?
                    .template_id
                    .ok_or_else(|| anyhow!("plan run {} has no template id", copy.plan_run))?,
            };
            let runner = build_runner(&args, &config, repo.clone())?;
            let job_id = runner.start_job(
                &args.workspace,
                Some(template_id),
                JobPayload::Copy {
                    plan_run_id: copy.plan_run.clone(),
                    target_folder_id: copy.target.clone(),
                },
            )?;
            finish_job(&runner, &job_id, copy.wait)
        }
        Command::Promote(ref promote) => {
            let template_id = repo.get_run(&promote.run)?.template_id;
            let runner = build_runner(&args, &config, repo.clone())?;
            let job_id = runner.start_job(
                &args.workspace,
                template_id,
                JobPayload::Promote {
                    source_run_id: promote.run.clone(),
                },
            )?;
            finish_job(&runner, &job_id, promote.wait)
        }
        Command::Review(ref review) => cmd_review(repo.as_ref(), review),
        Command::Report(ref report_args) => cmd_report(&args, repo.as_ref(), report_args),
        Command::Runs(ref runs) => cmd_runs(&args, repo.as_ref(), runs),
        Command::Dupes(ref dupes) => cmd_dupes(&args, repo.as_ref(), dupes),
        Command::Template(ref template_cmd) => cmd_template(repo.as_ref(), template_cmd),
    }
}

fn resolve_state_dir(args: &RootArgs) -> Result<PathBuf> {
    let base = match &args.state_dir {
        Some(dir) => dir.clone(),
        None => dirs::data_local_dir()
            .ok_or_else(|| anyhow!("no platform data directory; pass --state-dir"))?
            .join("dclerk"),
    };
    Ok(base.join(&args.workspace))
}

fn build_runner(args: &RootArgs, config: &WorkspaceConfig, repo: Arc<dyn Repository>) -> Result<JobRunner> {
    let root = args
        .root
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let provider = Arc::new(LocalDirProvider::new(root));
    let classifier = Arc::new(resolve_classifier(args, config));
    if !classifier.is_configured() {
        tracing::info!("no classifier configured; unmatched files go to the catch-all folder");
    }
    let plan_options = PlanOptions {
        llm_threshold: args
            .llm_threshold
            .or(config.llm_threshold)
            .unwrap_or(planner::DEFAULT_LLM_THRESHOLD),
        approval_threshold: args
            .approval_threshold
            .or(config.approval_threshold)
            .unwrap_or(planner::DEFAULT_APPROVAL_THRESHOLD),
    };
    Ok(JobRunner::new(JobContext {
        repo,
        provider,
        classifier,
        retry: RetryPolicy::default(),
        plan_options,
    }))
}

/// Classifier resolution order: CLI flag, then config, then the
/// `DCLERK_CLASSIFIER` environment variable. Unconfigured is allowed; unmatched
/// files then degrade to the catch-all folder.
fn resolve_classifier(args: &RootArgs, config: &WorkspaceConfig) -> ClassifierAdapter {
    let backend: Option<Box<dyn ClassifierBackend>> = if let Some(cmd) = &args.classifier_cmd {
        Some(Box::new(CommandClassifier {
            command: cmd.clone(),
        }))
    } else if let Some(url) = &args.classifier_url {
        Some(Box::new(HttpClassifier {
            endpoint: url.clone(),
            api_key: std::env::var("DCLERK_API_KEY")
                .ok()
                .or_else(|| config.classifier_api_key.clone())
                .unwrap_or_default(),
            model: args
                .classifier_model
                .clone()
                .or_else(|| config.classifier_model.clone())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }))
    } else if let Some(cmd) = &config.classifier_command {
        Some(Box::new(CommandClassifier {
            command: cmd.clone(),
        }))
    } else if let Some(url) = &config.classifier_endpoint {
        Some(Box::new(HttpClassifier {
            endpoint: url.clone(),
            api_key: std::env::var("DCLERK_API_KEY")
                .ok()
                .or_else(|| config.classifier_api_key.clone())
                .unwrap_or_default(),
            model: config
                .classifier_model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }))
    } else if let Ok(cmd) = std::env::var(config::CLASSIFIER_ENV_VAR) {
        Some(Box::new(CommandClassifier { command: cmd }))
    } else {
        None
    };
    ClassifierAdapter::new(backend)
}

/// Print the job id, then join the worker thread. With `--wait` the terminal
/// status is reported and a failed run becomes a process error; without it
/// the join is silent so the process never exits mid-stage.
fn finish_job(runner: &JobRunner, job_id: &str, wait: bool) -> Result<()> {
    println!("{job_id}");
    let run = runner.wait(job_id)?;
    if !wait {
        if run.status == RunStatus::Failed {
            tracing::warn!(job_id, error = run.error_message.as_deref(), "job failed");
        }
        return Ok(());
    }
    match run.status {
        RunStatus::Completed => {
            println!("{} completed", run.run_type);
            print_links(&run);
            Ok(())
        }
        RunStatus::Failed => bail!(
            "{} failed: {}",
            run.run_type,
            run.error_message.as_deref().unwrap_or("unknown error")
        ),
        _ => bail!("{} did not reach a terminal state", run.run_type),
    }
}

fn print_links(run: &Run) {
    if let Some(id) = &run.links.original_folder_id {
        println!("  original: {id}");
    }
    if let Some(id) = &run.links.clean_folder_id {
        println!("  clean:    {id}");
    }
    if let Some(id) = &run.links.promoted_folder_id {
        println!("  promoted: {id}");
    }
    if let Some(id) = &run.links.archived_folder_id {
        println!("  archived: {id}");
    }
}

fn cmd_review(repo: &dyn Repository, args: &cli::ReviewArgs) -> Result<()> {
    if args.list {
        for item in repo.list_plan_items(&args.run)? {
            let flag = if item.needs_approval { "?" } else { " " };
            println!(
                "{} {} {:<9} {:.2} {:<40} -> {}",
                flag,
                item.id,
                format!("{:?}", item.decision).to_lowercase(),
                item.confidence,
                item.file_name,
                item.target_path
            );
        }
        return Ok(());
    }

    let mut updates = Vec::new();
    for item_id in &args.approve {
        updates.push(PlanItemUpdate {
            item_id: item_id.clone(),
            decision: ItemDecision::Approved,
            final_folder_key: None,
        });
    }
    for item_id in &args.exclude {
        updates.push(PlanItemUpdate {
            item_id: item_id.clone(),
            decision: ItemDecision::Excluded,
            final_folder_key: None,
        });
    }
    for spec_pair in &args.overrides {
        let (item_id, folder_key) = spec_pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected ITEM_ID=FOLDER_KEY, got {spec_pair}"))?;
        updates.push(PlanItemUpdate {
            item_id: item_id.to_string(),
            decision: ItemDecision::Overridden,
            final_folder_key: Some(folder_key.to_string()),
        });
    }
    if updates.is_empty() {
        bail!("nothing to review; pass --approve, --exclude, or --override (or --list)");
    }
    let applied = repo.update_plan_items(&args.run, &updates)?;
    println!("updated {applied} items");
    Ok(())
}

fn cmd_report(root: &RootArgs, repo: &dyn Repository, args: &cli::ReportArgs) -> Result<()> {
    let template = repo.get_template(&args.template)?;
    let provider_root = root.root.clone().unwrap_or_else(|| PathBuf::from("."));
    let provider = LocalDirProvider::new(provider_root);
    let rows = report::generate_report(&provider, &RetryPolicy::default(), &template, &args.folder)?;
    let json = serde_json::to_string_pretty(&rows)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("write report {}", path.display()))?;
            println!("wrote report to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_runs(root: &RootArgs, repo: &dyn Repository, args: &cli::RunsArgs) -> Result<()> {
    if let Some(id) = &args.id {
        let run = repo.get_run(id)?;
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(());
    }
    for run in repo.list_runs(&root.workspace)? {
        println!(
            "{}  {:<7}  {:<9}  {:>3}%  {}",
            run.id,
            run.run_type,
            format!("{:?}", run.status).to_lowercase(),
            run.progress,
            run.company_name.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cmd_dupes(root: &RootArgs, repo: &dyn Repository, args: &cli::DupesArgs) -> Result<()> {
    let flags = repo.list_duplicate_flags(&root.workspace, args.run.as_deref())?;
    for flag in flags {
        println!(
            "{}  {:<13}  {:<8}  {}",
            flag.group_id,
            flag.basis,
            flag.severity,
            flag.file_ids.join(", ")
        );
    }
    Ok(())
}

/// Template document as authored by hand: ids, versions, and derived paths
/// are filled in on import.
#[derive(Debug, Deserialize)]
struct TemplateDoc {
    #[serde(default)]
    schema_version: Option<u32>,
    name: String,
    folder_tree: FolderNode,
    #[serde(default)]
    routing_rules: Vec<RoutingRule>,
    #[serde(default)]
    expected_items: Vec<ExpectedItem>,
}

fn cmd_template(repo: &dyn Repository, cmd: &TemplateCommand) -> Result<()> {
    match cmd {
        TemplateCommand::Import(args) => {
            let content = std::fs::read_to_string(&args.file)
                .with_context(|| format!("read template {}", args.file.display()))?;
            let doc: TemplateDoc = serde_json::from_str(&content)
                .with_context(|| format!("parse template {}", args.file.display()))?;
            if let Some(version) = doc.schema_version {
                if version != TEMPLATE_SCHEMA_VERSION {
                    bail!("unsupported template schema_version {version} (expected {TEMPLATE_SCHEMA_VERSION})");
                }
            }
            let template = import_template(doc);
            let id = template.id.clone();
            let name = template.name.clone();
            repo.insert_template(template)?;
            println!("imported template {name} as {id}");
            Ok(())
        }
        TemplateCommand::List => {
            for template in repo.list_templates()? {
                println!("{}  v{}  {}", template.id, template.version, template.name);
            }
            Ok(())
        }
        TemplateCommand::Show(args) => {
            let template = repo.get_template(&args.id)?;
            println!("{}", serde_json::to_string_pretty(&template)?);
            Ok(())
        }
        TemplateCommand::Edit(args) => {
            if args.add_children.is_empty() && args.renames.is_empty() && args.removals.is_empty()
            {
                bail!("nothing to edit; pass --add-child, --rename, or --remove");
            }
            let mut next = repo.get_template(&args.id)?;
            for spec_pair in &args.add_children {
                let (parent_id, name) = spec_pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("expected PARENT_ID=NAME, got {spec_pair}"))?;
                template::add_child(&mut next.folder_tree, parent_id, FolderNode::new(name))?;
            }
            for spec_pair in &args.renames {
                let (node_id, name) = spec_pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("expected NODE_ID=NAME, got {spec_pair}"))?;
                template::rename_node(&mut next.folder_tree, node_id, name)?;
            }
            for node_id in &args.removals {
                template::remove_node(&mut next.folder_tree, node_id)?;
            }
            // Published as a new version; downstream runs keep referencing
            // the version they started with.
            template::resolve_paths(&mut next.folder_tree);
            next.id = Uuid::new_v4().to_string();
            next.version += 1;
            next.created_at = now_millis();
            let id = next.id.clone();
            let version = next.version;
            repo.insert_template(next)?;
            println!("published version {version} as {id}");
            Ok(())
        }
    }
}

fn import_template(doc: TemplateDoc) -> Template {
    let mut tree = doc.folder_tree;
    template::resolve_paths(&mut tree);
    let mut rules = doc.routing_rules;
    for rule in &mut rules {
        if rule.id.is_empty() {
            rule.id = Uuid::new_v4().to_string();
        }
    }
    let mut expected = doc.expected_items;
    for item in &mut expected {
        if item.id.is_empty() {
            item.id = Uuid::new_v4().to_string();
        }
    }
    Template {
        id: Uuid::new_v4().to_string(),
        name: doc.name,
        version: 1,
        folder_tree: tree,
        routing_rules: rules,
        expected_items: expected,
        created_at: now_millis(),
    }
}
