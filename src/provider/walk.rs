//! Recursive folder traversal over the paged listing surface.
//!
//! Iterative worklist, depth-capped, and pagination-complete: every page
//! token is followed before a folder's children are considered enumerated.

use crate::error::Result;
use crate::model::ScannedFile;
use crate::provider::retry::{with_retry, RetryPolicy};
use crate::provider::{FolderMeta, ListOptions, StorageProvider};

/// Maximum folder depth a scan will descend. Guarantees termination on
/// pathological structures.
pub const MAX_SCAN_DEPTH: usize = 10;

/// Everything a recursive walk found, with slash-joined paths from the root.
#[derive(Debug, Default)]
pub struct ScanInventory {
    pub files: Vec<ScannedFile>,
    pub folders: Vec<(FolderMeta, String)>,
}

/// Enumerate the whole tree under `root_id`. Provider calls go through the
/// retry policy.
pub fn walk_folder(
    provider: &dyn StorageProvider,
    root_id: &str,
    policy: &RetryPolicy,
) -> Result<ScanInventory> {
    let mut inventory = ScanInventory::default();
    // (folder id, depth, path prefix)
    let mut work: Vec<(String, usize, String)> = vec![(root_id.to_string(), 0, String::new())];

    while let Some((folder_id, depth, prefix)) = work.pop() {
        if depth > MAX_SCAN_DEPTH {
            continue;
        }

        let mut page_token: Option<String> = None;
        loop {
            let options = ListOptions {
                include_trashed: false,
                page_token: page_token.clone(),
            };
            let page = with_retry(policy, "list_children", || {
                provider.list_children(&folder_id, &options)
            })?;

            for folder in page.folders {
                let path = join_path(&prefix, &folder.name);
                work.push((folder.id.clone(), depth + 1, path.clone()));
                inventory.folders.push((folder, path));
            }
            for mut file in page.files {
                file.path = Some(join_path(&prefix, &file.name));
                inventory.files.push(file);
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
    }

    Ok(inventory)
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClerkError;
    use crate::provider::{ItemMeta, ListPage};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory provider with scripted pages per folder.
    struct PagedProvider {
        // folder id -> pages in order
        pages: HashMap<String, Vec<ListPage>>,
        served: Mutex<HashMap<String, usize>>,
    }

    impl StorageProvider for PagedProvider {
        fn list_children(&self, folder_id: &str, options: &ListOptions) -> Result<ListPage> {
            let pages = self
                .pages
                .get(folder_id)
                .ok_or_else(|| ClerkError::not_found("folder", folder_id))?;
            let index = match &options.page_token {
                Some(token) => token
                    .parse::<usize>()
                    .map_err(|_| ClerkError::validation("bad page token"))?,
                None => 0,
            };
            self.served
                .lock()
                .unwrap()
                .entry(folder_id.to_string())
                .and_modify(|n| *n += 1)
                .or_insert(1);
            Ok(pages[index].clone())
        }

        fn copy_file(&self, _: &str, _: &str, _: Option<&str>) -> Result<ScannedFile> {
            unimplemented!("not needed for walk tests")
        }

        fn create_folder(&self, _: &str, _: &str) -> Result<FolderMeta> {
            unimplemented!("not needed for walk tests")
        }

        fn move_and_rename(&self, _: &str, _: &str, _: &str, _: Option<&str>) -> Result<String> {
            unimplemented!("not needed for walk tests")
        }

        fn get_metadata(&self, _: &str) -> Result<ItemMeta> {
            unimplemented!("not needed for walk tests")
        }
    }

    fn file(id: &str, name: &str) -> ScannedFile {
        ScannedFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            path: None,
            size: Some(1),
            content_hash: None,
            modified_at: None,
        }
    }

    #[test]
    fn pagination_tokens_are_followed() {
        let mut pages = HashMap::new();
        pages.insert(
            "root".to_string(),
            vec![
                ListPage {
                    files: vec![file("f1", "one.txt")],
                    folders: vec![],
                    next_page_token: Some("1".to_string()),
                },
                ListPage {
                    files: vec![file("f2", "two.txt")],
                    folders: vec![],
                    next_page_token: None,
                },
            ],
        );
        let provider = PagedProvider {
            pages,
            served: Mutex::new(HashMap::new()),
        };
        let inventory =
            walk_folder(&provider, "root", &RetryPolicy::immediate(1)).unwrap();
        assert_eq!(inventory.files.len(), 2);
        assert_eq!(provider.served.lock().unwrap()["root"], 2);
    }

    #[test]
    fn nested_files_carry_joined_paths() {
        let mut pages = HashMap::new();
        pages.insert(
            "root".to_string(),
            vec![ListPage {
                files: vec![file("f1", "top.txt")],
                folders: vec![FolderMeta {
                    id: "sub".to_string(),
                    name: "Reports".to_string(),
                }],
                next_page_token: None,
            }],
        );
        pages.insert(
            "sub".to_string(),
            vec![ListPage {
                files: vec![file("f2", "q3.pdf")],
                folders: vec![],
                next_page_token: None,
            }],
        );
        let provider = PagedProvider {
            pages,
            served: Mutex::new(HashMap::new()),
        };
        let inventory =
            walk_folder(&provider, "root", &RetryPolicy::immediate(1)).unwrap();
        let paths: Vec<&str> = inventory
            .files
            .iter()
            .map(|f| f.path.as_deref().unwrap())
            .collect();
        assert!(paths.contains(&"top.txt"));
        assert!(paths.contains(&"Reports/q3.pdf"));
    }

    #[test]
    fn depth_cap_terminates_degenerate_trees() {
        // Each folder contains one subfolder pointing back at itself by a
        // new id; build 30 levels and expect the walk to stop at the cap.
        let mut pages = HashMap::new();
        for level in 0..30 {
            let id = if level == 0 {
                "root".to_string()
            } else {
                format!("d{level}")
            };
            pages.insert(
                id,
                vec![ListPage {
                    files: vec![file(&format!("f{level}"), &format!("file{level}.txt"))],
                    folders: vec![FolderMeta {
                        id: format!("d{}", level + 1),
                        name: format!("level{}", level + 1),
                    }],
                    next_page_token: None,
                }],
            );
        }
        let provider = PagedProvider {
            pages,
            served: Mutex::new(HashMap::new()),
        };
        let inventory =
            walk_folder(&provider, "root", &RetryPolicy::immediate(1)).unwrap();
        assert_eq!(inventory.files.len(), MAX_SCAN_DEPTH + 1);
    }
}
