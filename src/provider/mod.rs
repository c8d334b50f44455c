//! Storage provider capability: the abstract surface the run stages drive.
//!
//! A provider is any service that can list, copy, create, and move items in
//! a folder hierarchy. Listing is paged; callers follow `next_page_token`.
//! All methods are suspension points from the stages' perspective and may
//! fail with retryable or terminal provider errors.

pub(crate) mod local;
pub(crate) mod retry;
pub(crate) mod walk;

pub use local::LocalDirProvider;
pub use retry::RetryPolicy;
pub use walk::{walk_folder, ScanInventory};

use crate::error::Result;
use crate::model::ScannedFile;
use serde::{Deserialize, Serialize};

/// MIME type providers report for folders.
pub const FOLDER_MIME: &str = "inode/directory";

/// A folder descriptor as returned by listing and creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderMeta {
    pub id: String,
    pub name: String,
}

/// One page of a folder's children.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub files: Vec<ScannedFile>,
    pub folders: Vec<FolderMeta>,
    pub next_page_token: Option<String>,
}

/// Listing knobs; `page_token` continues a previous page.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub include_trashed: bool,
    pub page_token: Option<String>,
}

/// Item metadata for a single file or folder.
#[derive(Debug, Clone)]
pub struct ItemMeta {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
}

impl ItemMeta {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }
}

/// The storage provider capability consumed by the run stages.
pub trait StorageProvider: Send + Sync {
    /// One page of the folder's children.
    fn list_children(&self, folder_id: &str, options: &ListOptions) -> Result<ListPage>;

    /// Copy a file into a target folder, optionally renaming the copy.
    fn copy_file(
        &self,
        file_id: &str,
        target_parent_id: &str,
        new_name: Option<&str>,
    ) -> Result<ScannedFile>;

    /// Create a folder under a parent. Creating an already-existing folder
    /// returns the existing descriptor (idempotent retries).
    fn create_folder(&self, parent_id: &str, name: &str) -> Result<FolderMeta>;

    /// Reparent and/or rename an item in one operation. Returns the item's
    /// id after the move; providers with path-based ids hand back a new id.
    fn move_and_rename(
        &self,
        item_id: &str,
        remove_parent: &str,
        add_parent: &str,
        new_name: Option<&str>,
    ) -> Result<String>;

    /// Metadata for one item, including its parents.
    fn get_metadata(&self, item_id: &str) -> Result<ItemMeta>;
}
