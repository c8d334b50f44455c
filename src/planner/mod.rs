//! Planner: decides one routing destination per scanned file.
//!
//! The keyword router runs first; files it cannot place confidently go to
//! the semantic classifier with the template's full path list as the
//! candidate set. A classifier failure degrades that one file to the
//! catch-all path and never aborts the batch. Output order always equals
//! input order.

pub(crate) mod classifier;
pub(crate) mod keyword;

pub use classifier::{
    ClassifierAdapter, ClassifierBackend, ClassifyRequest, CommandClassifier, HttpClassifier,
};
pub use keyword::route_by_keywords;

use crate::model::{RouterType, ScannedFile, Template};
use crate::template::{all_paths, find_catch_all, path_key_index, CATCH_ALL_NAME};

/// Default confidence below which a keyword match is handed to the
/// classifier instead of accepted.
pub const DEFAULT_LLM_THRESHOLD: f64 = 0.5;
/// Default confidence below which a decision needs human approval.
pub const DEFAULT_APPROVAL_THRESHOLD: f64 = 0.7;

/// Tunables for one planning pass.
#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    pub llm_threshold: f64,
    pub approval_threshold: f64,
}

impl Default for PlanOptions {
    fn default() -> Self {
        PlanOptions {
            llm_threshold: DEFAULT_LLM_THRESHOLD,
            approval_threshold: DEFAULT_APPROVAL_THRESHOLD,
        }
    }
}

/// One file's proposed destination, before persistence.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub file_id: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub source_path: String,
    pub target_path: String,
    pub proposed_folder_key: Option<String>,
    pub confidence: f64,
    pub router_type: RouterType,
    pub needs_approval: bool,
    pub reason: Option<String>,
    pub keyword_matches: Vec<String>,
}

/// Generate a routing plan: one decision per input file, order-preserving.
pub fn generate_plan(
    files: &[ScannedFile],
    template: &Template,
    classifier: &ClassifierAdapter,
    options: &PlanOptions,
) -> Vec<RoutingDecision> {
    let candidate_paths = all_paths(&template.folder_tree);
    let path_to_key = path_key_index(&template.folder_tree);
    let lookup_key = |path: &str| -> Option<String> {
        path_to_key
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, k)| k.clone())
    };

    // Catch-all key: the "other" node's key, or a literal marker when the
    // template has no such node.
    let other_key = find_catch_all(&template.folder_tree)
        .map(|node| node.key.clone())
        .unwrap_or_else(|| "other".to_string());

    let rule_examples: Vec<(String, String)> = template
        .routing_rules
        .iter()
        .take(classifier::MAX_RULE_EXAMPLES)
        .map(|rule| (rule.keywords.join(", "), rule.target_path.clone()))
        .collect();
    let top_level_folders: Vec<String> = template
        .folder_tree
        .children
        .iter()
        .map(|child| child.name.clone())
        .collect();

    let mut decisions = Vec::with_capacity(files.len());

    for file in files {
        let source_path = file.path.clone().unwrap_or_else(|| file.name.clone());
        let keyword_route = route_by_keywords(&file.name, &template.routing_rules);

        if keyword_route.matched && keyword_route.confidence >= options.llm_threshold {
            let target_path = keyword_route
                .target_path
                .unwrap_or_else(|| CATCH_ALL_NAME.to_string());
            let proposed_key = lookup_key(&target_path).unwrap_or_else(|| other_key.clone());
            let matched_rule = keyword_route.matched_rule_id.unwrap_or_default();

            decisions.push(RoutingDecision {
                file_id: file.id.clone(),
                file_name: file.name.clone(),
                mime_type: Some(file.mime_type.clone()),
                source_path,
                target_path,
                proposed_folder_key: Some(proposed_key),
                confidence: keyword_route.confidence,
                router_type: RouterType::Keyword,
                needs_approval: keyword_route.confidence < options.approval_threshold,
                reason: Some(format!("Matched rule: {matched_rule}")),
                keyword_matches: vec![matched_rule],
            });
            continue;
        }

        // Ambiguous: ask the classifier. The adapter is total, so this never
        // fails; a degraded verdict carries its own explanation.
        let verdict = classifier.classify(&ClassifyRequest {
            file_name: &file.name,
            source_path: &source_path,
            candidate_paths: &candidate_paths,
            rule_examples: rule_examples.clone(),
            top_level_folders: top_level_folders.clone(),
        });

        let proposed_key = lookup_key(&verdict.target_path).unwrap_or_else(|| other_key.clone());
        let router_type = if verdict.fallback {
            RouterType::Other
        } else {
            RouterType::Llm
        };
        let needs_approval = verdict.confidence < options.approval_threshold;

        decisions.push(RoutingDecision {
            file_id: file.id.clone(),
            file_name: file.name.clone(),
            mime_type: Some(file.mime_type.clone()),
            source_path,
            target_path: verdict.target_path,
            proposed_folder_key: Some(proposed_key),
            confidence: verdict.confidence,
            router_type,
            needs_approval,
            reason: Some(verdict.reasoning),
            keyword_matches: Vec::new(),
        });
    }

    let needs_approval = decisions.iter().filter(|d| d.needs_approval).count();
    tracing::info!(
        total_files = files.len(),
        keyword = decisions
            .iter()
            .filter(|d| d.router_type == RouterType::Keyword)
            .count(),
        llm = decisions
            .iter()
            .filter(|d| d.router_type == RouterType::Llm)
            .count(),
        other = decisions
            .iter()
            .filter(|d| d.router_type == RouterType::Other)
            .count(),
        needs_approval,
        "plan generated"
    );

    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FolderNode, RoutingRule};
    use crate::template::resolve_paths;

    fn template() -> Template {
        let mut tree = FolderNode::with_children(
            "Root",
            vec![
                FolderNode::new("Finance"),
                FolderNode::new("Legal"),
                FolderNode::new("Other"),
            ],
        );
        resolve_paths(&mut tree);
        Template {
            id: "tpl-1".to_string(),
            name: "Standard".to_string(),
            version: 1,
            routing_rules: vec![RoutingRule {
                id: "rule-invoice".to_string(),
                folder_key: crate::template::find_by_path(&tree, "Root/Finance")
                    .unwrap()
                    .key
                    .clone(),
                keywords: vec!["invoice".to_string()],
                target_path: "Root/Finance".to_string(),
                priority: 10,
            }],
            expected_items: Vec::new(),
            folder_tree: tree,
            created_at: 0,
        }
    }

    fn file(id: &str, name: &str) -> ScannedFile {
        ScannedFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: "application/pdf".to_string(),
            path: Some(format!("Inbox/{name}")),
            size: Some(100),
            content_hash: None,
            modified_at: None,
        }
    }

    #[test]
    fn keyword_match_is_accepted_without_classifier() {
        let template = template();
        let classifier = ClassifierAdapter::unconfigured();
        let decisions = generate_plan(
            &[file("f1", "invoice_march.pdf")],
            &template,
            &classifier,
            &PlanOptions::default(),
        );
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].router_type, RouterType::Keyword);
        assert_eq!(decisions[0].target_path, "Root/Finance");
        assert!(!decisions[0].needs_approval);
        assert_eq!(decisions[0].keyword_matches, vec!["rule-invoice"]);
    }

    #[test]
    fn unmatched_files_degrade_to_catch_all_when_unconfigured() {
        let template = template();
        let classifier = ClassifierAdapter::unconfigured();
        let decisions = generate_plan(
            &[file("f1", "mystery.bin"), file("f2", "notes.txt")],
            &template,
            &classifier,
            &PlanOptions::default(),
        );
        for decision in &decisions {
            assert_eq!(decision.router_type, RouterType::Other);
            assert_eq!(decision.target_path, "Root/Other");
            assert!(decision.confidence <= 0.2);
            assert!(decision.needs_approval);
            // Never left without a target.
            assert!(!decision.target_path.is_empty());
        }
    }

    #[test]
    fn approval_gating_holds_for_every_router_type() {
        let template = template();
        let classifier = ClassifierAdapter::unconfigured();
        let options = PlanOptions::default();
        let decisions = generate_plan(
            &[file("f1", "invoice.pdf"), file("f2", "mystery.bin")],
            &template,
            &classifier,
            &options,
        );
        for decision in &decisions {
            if decision.confidence < options.approval_threshold {
                assert!(decision.needs_approval);
            } else {
                assert!(!decision.needs_approval);
            }
        }
    }

    #[test]
    fn output_order_matches_input_order() {
        let template = template();
        let classifier = ClassifierAdapter::unconfigured();
        let files = vec![
            file("a", "zeta.bin"),
            file("b", "invoice.pdf"),
            file("c", "alpha.bin"),
        ];
        let decisions = generate_plan(&files, &template, &classifier, &PlanOptions::default());
        let ids: Vec<&str> = decisions.iter().map(|d| d.file_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn proposed_key_maps_through_path_index() {
        let template = template();
        let classifier = ClassifierAdapter::unconfigured();
        let decisions = generate_plan(
            &[file("f1", "invoice.pdf")],
            &template,
            &classifier,
            &PlanOptions::default(),
        );
        let finance_key = crate::template::find_by_path(&template.folder_tree, "Root/Finance")
            .unwrap()
            .key
            .clone();
        assert_eq!(
            decisions[0].proposed_folder_key.as_deref(),
            Some(finance_key.as_str())
        );
    }
}
