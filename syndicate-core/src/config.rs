use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_POSTS_DIR: &str = "posts";

/// One silo to syndicate to.
#[derive(Clone, Serialize, Deserialize)]
pub struct SiloConfig {
    pub name: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for SiloConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiloConfig")
            .field("name", &self.name)
            .field("api_key_set", &self.api_key.is_some())
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Everything a run needs to know, resolved once at the edge.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// `owner/name` on the source-control host.
    pub repository: String,
    /// Branch to advance, e.g. `refs/heads/main`.
    pub branch_ref: String,
    /// Commit whose file list triggered the run.
    pub trigger_sha: String,
    /// Initial commit cursor; the trigger unless an earlier step committed.
    pub parent_sha: String,
    pub posts_dir: String,
    pub silos: Vec<SiloConfig>,
}

impl RunConfig {
    pub fn trace_loaded(&self) {
        info!(
            repository = %self.repository,
            branch_ref = %self.branch_ref,
            trigger_sha = %self.trigger_sha,
            parent_sha = %self.parent_sha,
            posts_dir = %self.posts_dir,
            silos_count = self.silos.len(),
            "Loaded RunConfig"
        );
        debug!(?self, "RunConfig loaded (full debug)");
    }
}
