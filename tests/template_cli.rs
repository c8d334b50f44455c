//! Template import, listing, and versioned edits.

mod common;

use common::Fixture;
use serde_json::{json, Value};

fn doc() -> Value {
    json!({
        "name": "Standard",
        "folder_tree": {
            "name": "Company",
            "key": "root",
            "children": [
                {"name": "Finance", "key": "finance"},
                {"name": "Other", "key": "other"}
            ]
        }
    })
}

#[test]
fn import_assigns_keys_and_paths() {
    let fixture = Fixture::new();
    let id = fixture.import_template(&doc());

    let stdout = fixture.run_ok(&["template", "show", "--id", &id]);
    let template: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(template["version"], 1);
    assert_eq!(template["folder_tree"]["path"], "Company");
    let finance = &template["folder_tree"]["children"][0];
    assert_eq!(finance["key"], "finance");
    assert_eq!(finance["path"], "Company/Finance");
    assert!(finance["id"].as_str().is_some_and(|s| !s.is_empty()));
}

#[test]
fn edit_publishes_a_new_version_and_keeps_the_old() {
    let fixture = Fixture::new();
    let id = fixture.import_template(&doc());

    let template: Value =
        serde_json::from_str(&fixture.run_ok(&["template", "show", "--id", &id])).unwrap();
    let finance_id = template["folder_tree"]["children"][0]["id"].as_str().unwrap();
    let root_id = template["folder_tree"]["id"].as_str().unwrap();

    let rename = format!("{finance_id}=Accounting");
    let add = format!("{root_id}=Legal");
    let stdout = fixture.run_ok(&[
        "template", "edit", "--id", &id, "--rename", &rename, "--add-child", &add,
    ]);
    let new_id = stdout.split_whitespace().last().unwrap();
    assert_ne!(new_id, id);

    let edited: Value =
        serde_json::from_str(&fixture.run_ok(&["template", "show", "--id", new_id])).unwrap();
    assert_eq!(edited["version"], 2);
    let children = edited["folder_tree"]["children"].as_array().unwrap();
    let renamed = children.iter().find(|c| c["name"] == "Accounting").unwrap();
    // Rename keeps the stable key but re-derives the path.
    assert_eq!(renamed["key"], "finance");
    assert_eq!(renamed["path"], "Company/Accounting");
    assert!(children.iter().any(|c| c["name"] == "Legal"));

    // The original version is untouched.
    let listing = fixture.run_ok(&["template", "list"]);
    assert_eq!(listing.lines().count(), 2);
    let original: Value =
        serde_json::from_str(&fixture.run_ok(&["template", "show", "--id", &id])).unwrap();
    assert_eq!(original["folder_tree"]["children"][0]["name"], "Finance");
}

#[test]
fn listing_dupes_after_scan() {
    let fixture = Fixture::new();
    fixture.seed_file("acme/a.txt", b"same bytes");
    fixture.seed_file("acme/b.txt", b"same bytes");
    fixture.run_ok(&["scan", "--folder", "acme", "--wait"]);

    let stdout = fixture.run_ok(&["dupes"]);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("content-hash"));
    assert!(stdout.contains("exact"));
    assert!(stdout.contains("acme/a.txt"));
}
