//! CLI argument parsing for the drive-clerk workflow.
//!
//! The CLI is intentionally thin: it wires collaborators together and routes
//! to the job runner, review, and report layers without embedding policy.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint for the folder-cleanup workflow.
///
/// Keeping a single `RootArgs` type makes command routing obvious and avoids
/// hidden defaults in subcommand constructors.
#[derive(Parser, Debug)]
#[command(
    name = "dclerk",
    version,
    about = "Organize a company folder against a standard template",
    after_help = "Commands:\n  template import --file <JSON>   Import a folder template document\n  template edit --id <ID> ...     Publish an edited template version\n  scan --folder <ID>              Inventory a folder and flag duplicates\n  plan --template <ID>            Propose a routing plan for review\n  review --run <ID> ...           Approve/override/exclude plan items\n  copy --plan-run <ID> --target <ID>  Materialize the clean folder\n  promote --run <ID>              Swap the clean folder over the original\n  report --template <ID> --folder <ID>  Missing expected-item report\n  runs [--id <ID>]                List runs or show one run\n  dupes [--run <ID>]              List duplicate-file flags\n\nExamples:\n  dclerk --root /data template import --file standard.json\n  dclerk --root /data scan --folder acme --company-name Acme --wait\n  dclerk --root /data plan --template <TPL_ID> --wait\n  dclerk --root /data review --run <RUN_ID> --exclude <ITEM_ID>\n  dclerk --root /data copy --plan-run <RUN_ID> --target staging --wait\n  dclerk --root /data promote --run <COPY_RUN_ID> --wait\n  dclerk --root /data report --template <TPL_ID> --folder acme",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// State directory (default: platform data dir + /dclerk)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Workspace name; state is kept per workspace
    #[arg(long, global = true, value_name = "NAME", default_value = "default")]
    pub workspace: String,

    /// Root directory the local storage provider serves folders from
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Classifier subprocess command (prompt on stdin, JSON verdict on stdout)
    #[arg(long, global = true, value_name = "CMD")]
    pub classifier_cmd: Option<String>,

    /// OpenAI-compatible chat-completions endpoint for the classifier
    #[arg(long, global = true, value_name = "URL", conflicts_with = "classifier_cmd")]
    pub classifier_url: Option<String>,

    /// Model name for the HTTP classifier
    #[arg(long, global = true, value_name = "MODEL")]
    pub classifier_model: Option<String>,

    /// Keyword-router confidence below which files go to the classifier
    #[arg(long, global = true, value_name = "F")]
    pub llm_threshold: Option<f64>,

    /// Confidence below which a decision needs human approval
    #[arg(long, global = true, value_name = "F")]
    pub approval_threshold: Option<f64>,

    /// Emit info-level logs to stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Scan(ScanArgs),
    Plan(PlanArgs),
    Review(ReviewArgs),
    Copy(CopyArgs),
    Promote(PromoteArgs),
    Report(ReportArgs),
    Runs(RunsArgs),
    Dupes(DupesArgs),
    #[command(subcommand)]
    Template(TemplateCommand),
}

/// Scan command inputs.
#[derive(Parser, Debug)]
#[command(about = "Inventory a company folder and flag duplicate files")]
pub struct ScanArgs {
    /// Folder id to scan
    #[arg(long, value_name = "ID")]
    pub folder: String,

    /// Company name used later for the clean-folder name
    #[arg(long, value_name = "NAME")]
    pub company_name: Option<String>,

    /// Block until the job finishes and report its terminal status
    #[arg(long)]
    pub wait: bool,
}

/// Plan command inputs.
#[derive(Parser, Debug)]
#[command(about = "Propose a routing plan for the last scanned folder")]
pub struct PlanArgs {
    /// Template id to route against
    #[arg(long, value_name = "ID")]
    pub template: String,

    /// Restrict planning to these file ids (repeatable)
    #[arg(long = "file-id", value_name = "ID")]
    pub file_ids: Vec<String>,

    /// Block until the job finishes and report its terminal status
    #[arg(long)]
    pub wait: bool,
}

/// Review command inputs: bulk plan-item decisions in one transaction.
#[derive(Parser, Debug)]
#[command(about = "Approve, override, or exclude plan items")]
pub struct ReviewArgs {
    /// PLAN run whose items are being reviewed
    #[arg(long, value_name = "ID")]
    pub run: String,

    /// Item ids to approve (repeatable)
    #[arg(long = "approve", value_name = "ITEM_ID")]
    pub approve: Vec<String>,

    /// Item ids to exclude from copying (repeatable)
    #[arg(long = "exclude", value_name = "ITEM_ID")]
    pub exclude: Vec<String>,

    /// Overrides as ITEM_ID=FOLDER_KEY (repeatable)
    #[arg(long = "override", value_name = "ITEM_ID=KEY")]
    pub overrides: Vec<String>,

    /// List the run's items instead of updating them
    #[arg(long)]
    pub list: bool,
}

/// Copy command inputs.
#[derive(Parser, Debug)]
#[command(about = "Copy approved items into a fresh clean folder")]
pub struct CopyArgs {
    /// PLAN run whose reviewed items should be copied
    #[arg(long, value_name = "ID")]
    pub plan_run: String,

    /// Folder id under which the clean root is created
    #[arg(long, value_name = "ID")]
    pub target: String,

    /// Template id; defaults to the plan run's template
    #[arg(long, value_name = "ID")]
    pub template: Option<String>,

    /// Block until the job finishes and report its terminal status
    #[arg(long)]
    pub wait: bool,
}

/// Promote command inputs.
#[derive(Parser, Debug)]
#[command(about = "Archive the original folder and promote the clean copy")]
pub struct PromoteArgs {
    /// Run carrying the original/clean folder links (usually the COPY run)
    #[arg(long, value_name = "ID")]
    pub run: String,

    /// Block until the job finishes and report its terminal status
    #[arg(long)]
    pub wait: bool,
}

/// Report command inputs.
#[derive(Parser, Debug)]
#[command(about = "Report expected items missing from a folder")]
pub struct ReportArgs {
    /// Template whose expected items are evaluated
    #[arg(long, value_name = "ID")]
    pub template: String,

    /// Folder id to evaluate against
    #[arg(long, value_name = "ID")]
    pub folder: String,

    /// Write the JSON report here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Runs command inputs.
#[derive(Parser, Debug)]
#[command(about = "List workspace runs, newest first")]
pub struct RunsArgs {
    /// Show one run in full instead of the listing
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,
}

/// Duplicate-flag listing inputs.
#[derive(Parser, Debug)]
#[command(about = "List duplicate-file flags found by scans")]
pub struct DupesArgs {
    /// Limit to flags from one scan run
    #[arg(long, value_name = "ID")]
    pub run: Option<String>,
}

/// Template management subcommands.
#[derive(Subcommand, Debug)]
#[command(about = "Import and inspect folder templates")]
pub enum TemplateCommand {
    Import(TemplateImportArgs),
    List,
    Show(TemplateShowArgs),
    Edit(TemplateEditArgs),
}

/// Template import inputs.
#[derive(Parser, Debug)]
#[command(about = "Import a template document (tree + rules + expected items)")]
pub struct TemplateImportArgs {
    /// Path to the template JSON document
    #[arg(long, value_name = "PATH")]
    pub file: PathBuf,
}

/// Template show inputs.
#[derive(Parser, Debug)]
#[command(about = "Print one template as JSON")]
pub struct TemplateShowArgs {
    /// Template id
    #[arg(long, value_name = "ID")]
    pub id: String,
}

/// Template edit inputs. Edits publish a new template version; the source
/// template is left untouched.
#[derive(Parser, Debug)]
#[command(about = "Edit a template's tree and publish it as a new version")]
pub struct TemplateEditArgs {
    /// Template id to edit
    #[arg(long, value_name = "ID")]
    pub id: String,

    /// Add a folder named NAME under the node PARENT_ID
    #[arg(long = "add-child", value_name = "PARENT_ID=NAME")]
    pub add_children: Vec<String>,

    /// Rename the node NODE_ID to NAME
    #[arg(long = "rename", value_name = "NODE_ID=NAME")]
    pub renames: Vec<String>,

    /// Remove the node NODE_ID and its subtree
    #[arg(long = "remove", value_name = "NODE_ID")]
    pub removals: Vec<String>,
}
