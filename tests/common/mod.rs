//! Shared test infrastructure for integration tests.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A workspace fixture: a provider root and a state directory, both
/// temporary, plus helpers to run the binary against them.
pub struct Fixture {
    pub root: TempDir,
    pub state: TempDir,
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        Fixture {
            root: TempDir::new().expect("create provider root"),
            state: TempDir::new().expect("create state dir"),
        }
    }

    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Run `dclerk` with the fixture's root and state dir prepended.
    pub fn run(&self, args: &[&str]) -> Output {
        let bin = env!("CARGO_BIN_EXE_dclerk");
        Command::new(bin)
            .arg("--state-dir")
            .arg(self.state.path())
            .arg("--root")
            .arg(self.root.path())
            .args(args)
            .output()
            .expect("run dclerk")
    }

    /// Run and require success, returning stdout.
    pub fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "dclerk {:?} failed\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// The persisted workspace state, parsed as JSON.
    pub fn state_json(&self) -> Value {
        let path = self.state_file();
        let content = std::fs::read_to_string(&path)
            .unwrap_or_else(|err| panic!("read {}: {err}", path.display()));
        serde_json::from_str(&content).expect("parse state.json")
    }

    pub fn state_file(&self) -> PathBuf {
        self.state.path().join("default").join("state.json")
    }

    /// Seed a file under the provider root, creating parent directories.
    pub fn seed_file(&self, rel: &str, contents: &[u8]) {
        let path = self.root.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(path, contents).expect("seed file");
    }

    /// Write a template document and import it, returning the template id.
    pub fn import_template(&self, doc: &Value) -> String {
        let path = self.root.path().join("template-doc.json");
        std::fs::write(&path, serde_json::to_string_pretty(doc).unwrap())
            .expect("write template doc");
        let stdout = self.run_ok(&["template", "import", "--file", path.to_str().unwrap()]);
        stdout
            .split_whitespace()
            .last()
            .expect("template id in import output")
            .to_string()
    }
}

/// First line of a job command's stdout is the job id.
pub fn job_id(stdout: &str) -> String {
    stdout
        .lines()
        .next()
        .expect("job id on first stdout line")
        .trim()
        .to_string()
}

/// Plan items for one run from the persisted state.
pub fn plan_items_for(state: &Value, run_id: &str) -> Vec<Value> {
    state["plan_items"]
        .as_array()
        .expect("plan_items array")
        .iter()
        .filter(|item| item["run_id"] == run_id)
        .cloned()
        .collect()
}

/// The run row with the given id from the persisted state.
pub fn run_row(state: &Value, run_id: &str) -> Value {
    state["runs"]
        .as_array()
        .expect("runs array")
        .iter()
        .find(|run| run["id"] == run_id)
        .cloned()
        .unwrap_or_else(|| panic!("run {run_id} not in state"))
}
