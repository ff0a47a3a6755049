//! # contract: interfaces to the outside world
//!
//! Two traits describe everything the engine needs from remote systems:
//!
//! - [`Repository`]: the source-control host's object API (commit diffs, file
//!   contents, blobs, trees, commits and refs).
//! - [`Silo`]: one third-party publishing platform (list posts, create drafts).
//!
//! Both are async, `Send + Sync`, and annotated for `mockall` so tests and
//! downstream crates (with the `test-export-mocks` feature) get
//! `MockRepository` and `MockSilo`.
//!
//! ## Adding a silo
//! - Implement [`Silo`] in a submodule of [`crate::silo`].
//! - Register its name in [`crate::silo::SiloKind`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
use mockall::{automock, predicate::*};

use crate::error::{RepositoryError, SiloError};
use crate::syndication::{Post, SyndicationId};

/// Status of a file in a commit diff, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    #[serde(alias = "deleted")]
    Removed,
    Renamed,
    Copied,
    Changed,
    Unchanged,
    #[serde(other)]
    Unknown,
}

impl FileStatus {
    pub fn is_deleted(&self) -> bool {
        matches!(self, FileStatus::Removed)
    }
}

/// One entry of a commit's file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: FileStatus,
}

/// A blob placed at `path` in a new tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    /// A regular (non-executable) file entry.
    pub fn file(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644".to_string(),
            kind: "blob".to_string(),
            sha: sha.into(),
        }
    }
}

/// The source-control host's object API.
///
/// Implementations perform one network call per method and never retry.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// Files touched by commit `sha`.
    async fn changed_files(&self, sha: &str) -> Result<Vec<ChangedFile>, RepositoryError>;

    /// Decoded contents of `path` as of `git_ref`.
    async fn file_contents(&self, path: &str, git_ref: &str) -> Result<String, RepositoryError>;

    /// Store `content` as a blob, returning its sha.
    async fn create_blob(&self, content: &str) -> Result<String, RepositoryError>;

    /// Overlay `entries` on `base_tree`, returning the new tree sha.
    async fn create_tree(
        &self,
        entries: Vec<TreeEntry>,
        base_tree: &str,
    ) -> Result<String, RepositoryError>;

    /// Create a commit object, returning its sha.
    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: Vec<String>,
    ) -> Result<String, RepositoryError>;

    /// Fast-forward `git_ref` to `sha`. Must fail rather than force.
    async fn update_ref(&self, git_ref: &str, sha: &str) -> Result<(), RepositoryError>;
}

/// A post as listed by a silo. Only `id` is interpreted; the rest is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiloPost {
    pub id: SyndicationId,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of [`Silo::fetch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// Every post of the account, when no id was requested.
    All(Vec<SiloPost>),
    /// The post matching the requested id.
    One(SiloPost),
    /// The requested id does not exist on the silo.
    NotFound,
}

/// One third-party publishing platform.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Silo: Send + Sync {
    /// Display name; also the basis of the frontmatter key.
    fn name(&self) -> String;

    /// Fail with [`SiloError::MissingCredential`] unless a credential is
    /// configured. Makes no request.
    fn check_credential(&self) -> Result<(), SiloError>;

    /// List the account's posts, or look one up by id.
    async fn fetch(&self, id: Option<SyndicationId>) -> Result<Fetched, SiloError>;

    /// Submit `post` as an unpublished draft.
    ///
    /// `Ok(None)` means the silo refused; the refusal has already been logged.
    async fn draft(&self, post: &Post) -> Result<Option<SyndicationId>, SiloError>;
}
