//! Semantic classifier adapter: the one place external non-determinism
//! enters the planner.
//!
//! A backend is any text-completion capability. Two are provided: an
//! OpenAI-compatible HTTP endpoint and a user-configured command invoked with
//! the prompt on stdin and JSON on stdout (any tool that reads text and
//! writes text works, e.g. `llm`, `ollama run`, custom scripts).
//!
//! The adapter owns validation and degradation: an unconfigured backend, a
//! failed call, unparseable output, or a path outside the candidate set all
//! fall back to the designated catch-all path with low confidence.
//! Classification failure is never fatal to a planning run.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Confidence reported when no backend is configured.
pub const UNCONFIGURED_CONFIDENCE: f64 = 0.2;
/// Confidence reported when the backend call or its output failed.
pub const ERROR_CONFIDENCE: f64 = 0.1;
/// Confidence assumed when the backend omits the field.
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Parse-failure retries before giving up on a backend response.
const MAX_PARSE_RETRIES: usize = 2;

/// Rule examples included in the prompt are capped to keep requests small.
pub const MAX_RULE_EXAMPLES: usize = 10;

const ROUTE_SYSTEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/route_system.md"
));
const ROUTE_USER: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/route_user.md"
));

/// One classification request: a file plus the template context that bounds
/// the answer.
#[derive(Debug, Clone)]
pub struct ClassifyRequest<'a> {
    pub file_name: &'a str,
    pub source_path: &'a str,
    /// Every known template path; the verdict must name one of these.
    pub candidate_paths: &'a [String],
    /// Up to `MAX_RULE_EXAMPLES` `(keywords, target_path)` hints.
    pub rule_examples: Vec<(String, String)>,
    /// Top-level folder names, a cheap summary of the template shape.
    pub top_level_folders: Vec<String>,
}

/// A validated classifier verdict. `target_path` is always a member of the
/// request's candidate set (or the catch-all fallback).
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub target_path: String,
    pub confidence: f64,
    pub reasoning: String,
    /// True when this verdict is a degradation rather than a real answer.
    pub fallback: bool,
}

/// Raw JSON shape produced by backends.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    target_path: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// A text-completion capability the adapter can route through.
pub trait ClassifierBackend: Send + Sync {
    /// Human-readable label for logs.
    fn label(&self) -> &str;
    /// Run one completion: system prompt + user prompt in, raw text out.
    fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Backend that spawns a user-configured command (parsed via shell-words),
/// writes the prompt to stdin, and reads the response from stdout.
pub struct CommandClassifier {
    pub command: String,
}

impl ClassifierBackend for CommandClassifier {
    fn label(&self) -> &str {
        "command"
    }

    fn complete(&self, system: &str, user: &str) -> Result<String> {
        let args = shell_words::split(&self.command)
            .with_context(|| format!("parse classifier command: {}", self.command))?;
        if args.is_empty() {
            return Err(anyhow!("classifier command is empty"));
        }

        let prompt = format!("{system}\n\n{user}");
        let start = Instant::now();
        let mut child = Command::new(&args[0])
            .args(&args[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn classifier command: {}", args[0]))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .context("write prompt to classifier stdin")?;
        }

        let output = child.wait_with_output().context("wait for classifier")?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "classifier command complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "classifier command failed with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout).context("decode classifier stdout as UTF-8")
    }
}

/// Backend for an OpenAI-compatible chat-completions endpoint.
pub struct HttpClassifier {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

impl ClassifierBackend for HttpClassifier {
    fn label(&self) -> &str {
        "http"
    }

    fn complete(&self, system: &str, user: &str) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.3,
            "max_tokens": 200,
            "response_format": {"type": "json_object"},
        });

        let start = Instant::now();
        let mut response = ureq::post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&payload)
            .with_context(|| format!("call classifier endpoint {}", self.endpoint))?;

        let body: serde_json::Value = response
            .body_mut()
            .read_json()
            .context("decode classifier response body")?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            model = %self.model,
            "classifier http call complete"
        );

        body.pointer("/choices/0/message/content")
            .and_then(|content| content.as_str())
            .map(|content| content.to_string())
            .ok_or_else(|| anyhow!("classifier response has no message content"))
    }
}

/// The adapter the planner talks to. Holds an optional backend; `None` means
/// every classification degrades to the catch-all path.
pub struct ClassifierAdapter {
    backend: Option<Box<dyn ClassifierBackend>>,
}

impl ClassifierAdapter {
    pub fn new(backend: Option<Box<dyn ClassifierBackend>>) -> Self {
        ClassifierAdapter { backend }
    }

    pub fn unconfigured() -> Self {
        ClassifierAdapter { backend: None }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Classify one file among the candidate paths. Total: always returns a
    /// verdict whose target path is valid.
    pub fn classify(&self, request: &ClassifyRequest<'_>) -> Verdict {
        let fallback_path = catch_all_path(request.candidate_paths);

        let backend = match &self.backend {
            Some(backend) => backend,
            None => {
                return Verdict {
                    target_path: fallback_path,
                    confidence: UNCONFIGURED_CONFIDENCE,
                    reasoning: "classifier not configured - defaulting to Other".to_string(),
                    fallback: true,
                }
            }
        };

        let system = ROUTE_SYSTEM;
        let user = build_user_prompt(request);

        let mut last_error = String::new();
        for attempt in 0..=MAX_PARSE_RETRIES {
            // Include the previous parse error so the model can correct itself.
            let user_prompt = if attempt == 0 {
                user.clone()
            } else {
                format!(
                    "{user}\n\nYour previous response could not be used: {last_error}\n\
                     Respond again with only the corrected JSON object."
                )
            };

            let text = match backend.complete(system, &user_prompt) {
                Ok(text) => text,
                Err(err) => {
                    // Call failures are not retried here; the per-call retry
                    // budget belongs to the transport, not the adapter.
                    tracing::warn!(
                        backend = backend.label(),
                        file_name = request.file_name,
                        error = %err,
                        "classifier call failed, defaulting to catch-all"
                    );
                    return Verdict {
                        target_path: fallback_path,
                        confidence: ERROR_CONFIDENCE,
                        reasoning: format!("classifier error: {err}"),
                        fallback: true,
                    };
                }
            };

            match parse_verdict(&text) {
                Ok(raw) => return self.validate(request, raw, &fallback_path),
                Err(err) => {
                    last_error = err.to_string();
                    tracing::warn!(
                        backend = backend.label(),
                        attempt,
                        error = %err,
                        "classifier response unparseable"
                    );
                }
            }
        }

        Verdict {
            target_path: fallback_path,
            confidence: ERROR_CONFIDENCE,
            reasoning: format!("classifier returned unusable output: {last_error}"),
            fallback: true,
        }
    }

    /// Validate a raw verdict: clamp confidence, force the target path into
    /// the candidate set.
    fn validate(
        &self,
        request: &ClassifyRequest<'_>,
        raw: RawVerdict,
        fallback_path: &str,
    ) -> Verdict {
        let confidence = raw.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0);
        let reasoning = raw
            .reasoning
            .unwrap_or_else(|| "classifier routing decision".to_string());

        if request.candidate_paths.iter().any(|p| *p == raw.target_path) {
            Verdict {
                target_path: raw.target_path,
                confidence,
                reasoning,
                fallback: false,
            }
        } else {
            tracing::warn!(
                file_name = request.file_name,
                returned_path = %raw.target_path,
                "classifier returned a path outside the candidate set"
            );
            Verdict {
                target_path: fallback_path.to_string(),
                confidence: UNCONFIGURED_CONFIDENCE,
                reasoning: format!(
                    "classifier chose unknown path {:?}; using catch-all",
                    raw.target_path
                ),
                fallback: true,
            }
        }
    }
}

/// The designated catch-all: the first candidate whose path contains "other"
/// case-insensitively, or the literal "Other" when none exists.
pub fn catch_all_path(candidate_paths: &[String]) -> String {
    candidate_paths
        .iter()
        .find(|path| path.to_lowercase().contains("other"))
        .cloned()
        .unwrap_or_else(|| crate::template::CATCH_ALL_NAME.to_string())
}

fn build_user_prompt(request: &ClassifyRequest<'_>) -> String {
    let folder_list = request
        .candidate_paths
        .iter()
        .enumerate()
        .map(|(i, path)| format!("  {}. {}", i + 1, path))
        .collect::<Vec<_>>()
        .join("\n");

    let rule_examples = if request.rule_examples.is_empty() {
        String::new()
    } else {
        let lines = request
            .rule_examples
            .iter()
            .take(MAX_RULE_EXAMPLES)
            .map(|(keywords, target)| format!("  - Keywords: {keywords} -> {target}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\n\nExample routing rules (for reference):\n{lines}")
    };

    let template_context = if request.top_level_folders.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nTemplate structure (top-level): {}",
            request.top_level_folders.join(", ")
        )
    };

    ROUTE_USER
        .replace("{file_name}", request.file_name)
        .replace("{source_path}", request.source_path)
        .replace("{folder_list}", &folder_list)
        .replace("{rule_examples}", &rule_examples)
        .replace("{template_context}", &template_context)
}

fn parse_verdict(text: &str) -> Result<RawVerdict> {
    let json_text = extract_json(text);
    serde_json::from_str(json_text).with_context(|| {
        let sample: String = text.chars().take(500).collect();
        format!("parse classifier verdict: {sample}")
    })
}

/// Extract JSON from text that might be wrapped in markdown code fences.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    text
}
