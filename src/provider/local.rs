//! Local-directory storage provider.
//!
//! Item ids are paths relative to the provider root ("" is the root folder
//! itself). Content hashes are blake3 over file bytes, so exact-duplicate
//! detection works without any cloud checksum. Listing returns a single
//! page; this provider has no pagination.

use crate::error::{ClerkError, Result};
use crate::model::ScannedFile;
use crate::provider::{FolderMeta, ItemMeta, ListOptions, ListPage, StorageProvider, FOLDER_MIME};
use std::fs;
use std::path::{Path, PathBuf};

pub struct LocalDirProvider {
    root: PathBuf,
}

impl LocalDirProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalDirProvider { root: root.into() }
    }

    fn resolve(&self, item_id: &str) -> PathBuf {
        if item_id.is_empty() || item_id == "." {
            self.root.clone()
        } else {
            self.root.join(item_id)
        }
    }

    fn id_for(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn file_meta(&self, path: &Path) -> Result<ScannedFile> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let metadata = fs::metadata(path)?;
        let bytes = fs::read(path)?;
        let modified_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64);
        Ok(ScannedFile {
            id: self.id_for(path),
            mime_type: guess_mime(&name).to_string(),
            name,
            path: None,
            size: Some(metadata.len()),
            content_hash: Some(blake3::hash(&bytes).to_hex().to_string()),
            modified_at,
        })
    }
}

impl StorageProvider for LocalDirProvider {
    fn list_children(&self, folder_id: &str, _options: &ListOptions) -> Result<ListPage> {
        let dir = self.resolve(folder_id);
        if !dir.is_dir() {
            return Err(ClerkError::not_found("folder", folder_id));
        }

        let mut page = ListPage::default();
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                page.folders.push(FolderMeta {
                    id: self.id_for(&path),
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                });
            } else {
                page.files.push(self.file_meta(&path)?);
            }
        }
        Ok(page)
    }

    fn copy_file(
        &self,
        file_id: &str,
        target_parent_id: &str,
        new_name: Option<&str>,
    ) -> Result<ScannedFile> {
        let source = self.resolve(file_id);
        if !source.is_file() {
            return Err(ClerkError::not_found("file", file_id));
        }
        let target_dir = self.resolve(target_parent_id);
        if !target_dir.is_dir() {
            return Err(ClerkError::not_found("folder", target_parent_id));
        }
        let name = match new_name {
            Some(name) => name.to_string(),
            None => source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        let target = target_dir.join(&name);
        fs::copy(&source, &target)?;
        self.file_meta(&target)
    }

    fn create_folder(&self, parent_id: &str, name: &str) -> Result<FolderMeta> {
        let parent = self.resolve(parent_id);
        if !parent.is_dir() {
            return Err(ClerkError::not_found("folder", parent_id));
        }
        let path = parent.join(name);
        // Idempotent: an existing folder is returned, not an error.
        fs::create_dir_all(&path)?;
        Ok(FolderMeta {
            id: self.id_for(&path),
            name: name.to_string(),
        })
    }

    fn move_and_rename(
        &self,
        item_id: &str,
        remove_parent: &str,
        add_parent: &str,
        new_name: Option<&str>,
    ) -> Result<String> {
        let source = self.resolve(item_id);
        if !source.exists() {
            return Err(ClerkError::not_found("item", item_id));
        }
        let old_parent = self.resolve(remove_parent);
        if source.parent() != Some(old_parent.as_path()) {
            return Err(ClerkError::validation(format!(
                "item {item_id} is not a child of {remove_parent}"
            )));
        }
        let target_dir = self.resolve(add_parent);
        if !target_dir.is_dir() {
            return Err(ClerkError::not_found("folder", add_parent));
        }
        let name = match new_name {
            Some(name) => name.to_string(),
            None => source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        let target = target_dir.join(name);
        fs::rename(&source, &target)?;
        Ok(self.id_for(&target))
    }

    fn get_metadata(&self, item_id: &str) -> Result<ItemMeta> {
        let path = self.resolve(item_id);
        if !path.exists() {
            return Err(ClerkError::not_found("item", item_id));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let parents = if path == self.root {
            Vec::new()
        } else {
            vec![path
                .parent()
                .map(|p| self.id_for(p))
                .unwrap_or_default()]
        };
        let mime_type = if path.is_dir() {
            FOLDER_MIME.to_string()
        } else {
            guess_mime(&name).to_string()
        };
        Ok(ItemMeta {
            id: item_id.to_string(),
            name,
            mime_type,
            parents,
        })
    }
}

/// Extension-based MIME guess, enough for routing and report matching.
fn guess_mime(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" | "docx" => "application/msword",
        "xls" | "xlsx" => "application/vnd.ms-excel",
        "csv" => "text/csv",
        "txt" | "md" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "zip" => "application/zip",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, LocalDirProvider) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("invoice.pdf"), b"contents-a").unwrap();
        fs::write(dir.path().join("copy.pdf"), b"contents-a").unwrap();
        fs::create_dir(dir.path().join("Reports")).unwrap();
        fs::write(dir.path().join("Reports").join("q3.txt"), b"report").unwrap();
        let provider = LocalDirProvider::new(dir.path());
        (dir, provider)
    }

    #[test]
    fn listing_splits_files_and_folders() {
        let (_dir, provider) = seeded();
        let page = provider
            .list_children("", &ListOptions::default())
            .unwrap();
        assert_eq!(page.files.len(), 2);
        assert_eq!(page.folders.len(), 1);
        assert_eq!(page.folders[0].name, "Reports");
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn identical_contents_share_a_hash() {
        let (_dir, provider) = seeded();
        let page = provider
            .list_children("", &ListOptions::default())
            .unwrap();
        let hashes: Vec<_> = page
            .files
            .iter()
            .map(|f| f.content_hash.clone().unwrap())
            .collect();
        assert_eq!(hashes[0], hashes[1]);
    }

    #[test]
    fn copy_then_move_round_trip() {
        let (_dir, provider) = seeded();
        let clean = provider.create_folder("", "Clean").unwrap();
        let copied = provider
            .copy_file("invoice.pdf", &clean.id, Some("renamed.pdf"))
            .unwrap();
        assert_eq!(copied.name, "renamed.pdf");

        let moved_id = provider
            .move_and_rename(&copied.id, &clean.id, "Reports", Some("final.pdf"))
            .unwrap();
        assert_eq!(moved_id, "Reports/final.pdf");
        let reports = provider
            .list_children("Reports", &ListOptions::default())
            .unwrap();
        assert!(reports.files.iter().any(|f| f.name == "final.pdf"));
    }

    #[test]
    fn create_folder_is_idempotent() {
        let (_dir, provider) = seeded();
        let first = provider.create_folder("", "Clean").unwrap();
        let second = provider.create_folder("", "Clean").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn metadata_reports_folder_mime_and_parent() {
        let (_dir, provider) = seeded();
        let meta = provider.get_metadata("Reports").unwrap();
        assert!(meta.is_folder());
        let file_meta = provider.get_metadata("Reports/q3.txt").unwrap();
        assert!(!file_meta.is_folder());
        assert_eq!(file_meta.parents, vec!["Reports".to_string()]);
    }

    #[test]
    fn missing_items_surface_not_found() {
        let (_dir, provider) = seeded();
        assert!(matches!(
            provider.list_children("nope", &ListOptions::default()),
            Err(ClerkError::NotFound { .. })
        ));
        assert!(matches!(
            provider.copy_file("nope.pdf", "", None),
            Err(ClerkError::NotFound { .. })
        ));
    }
}
