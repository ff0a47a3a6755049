#![doc = "GitHub implementation of the core `Repository` contract over the REST git-data API."]
//
//! # GitHub Repository Client
//!
//! [`GithubRepository`] speaks to `https://api.github.com` (or `GITHUB_API_URL`
//! on GitHub Enterprise) on behalf of one repository:
//!
//! - `GET  /repos/{repo}/commits/{sha}?page=N`: files changed by a commit,
//!   300 per page
//! - `GET  /repos/{repo}/contents/{path}?ref=`: raw file contents, with every
//!   path segment percent-encoded
//! - `POST /repos/{repo}/git/blobs`, `/git/trees`, `/git/commits`
//! - `PATCH /repos/{repo}/git/refs/{ref}` with `force: false`, so a branch that
//!   moved underneath us is rejected instead of overwritten
//!
//! Every non-success status becomes [`RepositoryError::Rejected`] with the
//! response body attached. Nothing is retried.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use syndicate_core::contract::{ChangedFile, Repository, TreeEntry};
use syndicate_core::error::RepositoryError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// GitHub's page size for the file list of a commit.
const FILES_PER_PAGE: usize = 300;

/// Credentials and endpoint for the GitHub API.
#[derive(Clone)]
pub struct GithubSettings {
    pub token: String,
    pub api_url: String,
}

impl std::fmt::Debug for GithubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubSettings")
            .field("token_set", &!self.token.is_empty())
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(default)]
    files: Vec<ChangedFile>,
}

pub struct GithubRepository {
    client: reqwest::Client,
    api_url: String,
    repository: String,
    token: String,
}

impl GithubRepository {
    /// `repository` is `owner/name`.
    pub fn new(
        settings: &GithubSettings,
        repository: impl Into<String>,
    ) -> Result<Self, RepositoryError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("syndicate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let repository = repository.into();
        tracing::info!(
            repository = %repository,
            api_url = %settings.api_url,
            token_set = !settings.token.is_empty(),
            "Initialized GithubRepository"
        );
        Ok(Self {
            client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            repository,
            token: settings.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.repository, path)
    }

    /// `contents/{path}` with each segment of the repository path encoded, so
    /// `#`, `?` and `%` in a filename stay part of the path.
    fn contents_url(&self, path: &str) -> Result<Url, RepositoryError> {
        let mut url = Url::parse(&self.url("contents"))
            .map_err(|e| RepositoryError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RepositoryError::InvalidUrl(self.api_url.clone()))?
            .extend(path.split('/'));
        Ok(url)
    }

    async fn send(
        &self,
        operation: &'static str,
        req: RequestBuilder,
        accept: &str,
    ) -> Result<reqwest::Response, RepositoryError> {
        let resp = req
            .bearer_auth(&self.token)
            .header(ACCEPT, accept)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(operation, status = %status, "GitHub API returned error. Response body: {body}");
            return Err(RepositoryError::Rejected {
                operation,
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        req: RequestBuilder,
    ) -> Result<T, RepositoryError> {
        let resp = self.send(operation, req, JSON_MEDIA_TYPE).await?;
        resp.json::<T>()
            .await
            .map_err(|e| RepositoryError::Decode(format!("{operation}: {e}")))
    }
}

/// `refs/heads/main` and `heads/main` both address `git/refs/heads/main`.
fn ref_path(git_ref: &str) -> String {
    format!("git/refs/{}", git_ref.trim_start_matches("refs/"))
}

#[async_trait]
impl Repository for GithubRepository {
    async fn changed_files(&self, sha: &str) -> Result<Vec<ChangedFile>, RepositoryError> {
        tracing::info!(sha, "Fetching files of triggering commit");
        let mut files = Vec::new();
        let mut page = 1;
        loop {
            let req = self
                .client
                .get(self.url(&format!("commits/{sha}")))
                .query(&[("page", page)]);
            let commit: CommitResponse = self.send_json("get commit", req).await?;
            let count = commit.files.len();
            tracing::debug!(sha, page, files = count, "Fetched page of commit files");
            files.extend(commit.files);
            if count < FILES_PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(files)
    }

    async fn file_contents(&self, path: &str, git_ref: &str) -> Result<String, RepositoryError> {
        tracing::debug!(path, git_ref, "Fetching file contents");
        let req = self
            .client
            .get(self.contents_url(path)?)
            .query(&[("ref", git_ref)]);
        let resp = self.send("get contents", req, RAW_MEDIA_TYPE).await?;
        Ok(resp.text().await?)
    }

    async fn create_blob(&self, content: &str) -> Result<String, RepositoryError> {
        let req = self
            .client
            .post(self.url("git/blobs"))
            .json(&json!({ "content": content, "encoding": "utf-8" }));
        let blob: ShaResponse = self.send_json("create blob", req).await?;
        Ok(blob.sha)
    }

    async fn create_tree(
        &self,
        entries: Vec<TreeEntry>,
        base_tree: &str,
    ) -> Result<String, RepositoryError> {
        let req = self
            .client
            .post(self.url("git/trees"))
            .json(&json!({ "base_tree": base_tree, "tree": entries }));
        let tree: ShaResponse = self.send_json("create tree", req).await?;
        Ok(tree.sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: Vec<String>,
    ) -> Result<String, RepositoryError> {
        let req = self.client.post(self.url("git/commits")).json(&json!({
            "message": message,
            "tree": tree,
            "parents": parents,
        }));
        let commit: ShaResponse = self.send_json("create commit", req).await?;
        Ok(commit.sha)
    }

    async fn update_ref(&self, git_ref: &str, sha: &str) -> Result<(), RepositoryError> {
        tracing::info!(git_ref, sha, "Updating branch reference");
        let req = self
            .client
            .patch(self.url(&ref_path(git_ref)))
            .json(&json!({ "sha": sha, "force": false }));
        self.send("update ref", req, JSON_MEDIA_TYPE).await?;
        Ok(())
    }
}
