//! Commit protocol: persist a batch of rewritten posts as one commit.
//!
//! ## `commit_updated_posts`: 4-step protocol
//!
//! 1. Create one blob per post from its serialized text.
//! 2. Create one tree overlaying every blob on the cursor's tree.
//! 3. Create one commit whose parent is the cursor.
//! 4. Fast-forward the branch to that commit; only then advance the cursor.
//!
//! Every post is serialized before the first network call. Any failure
//! aborts the remaining steps, so the branch either moves to a commit holding
//! the whole batch or does not move at all. Objects created before a failure
//! are unreferenced and left for the host to collect.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error, info};

use crate::contract::{Repository, TreeEntry};
use crate::error::CommitError;
use crate::frontmatter::Frontmatter;

/// The latest commit known to this run.
///
/// Starts at the trigger (or an override from an earlier step) and moves
/// forward only after a successful ref update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitCursor {
    sha: String,
}

impl CommitCursor {
    pub fn new(sha: impl Into<String>) -> Self {
        Self { sha: sha.into() }
    }

    pub fn sha(&self) -> &str {
        &self.sha
    }

    fn advance(&mut self, sha: String) {
        debug!(from = %self.sha, to = %sha, "[COMMIT] Advancing commit cursor");
        self.sha = sha;
    }
}

/// What [`commit_updated_posts`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing to write; no request was made.
    UpToDate,
    /// The branch now points at `sha`.
    Committed { sha: String },
}

pub fn commit_message(silos: &BTreeSet<String>) -> String {
    let names: Vec<&str> = silos.iter().map(String::as_str).collect();
    format!("(syndicate): adding IDs for {}", names.join(", "))
}

/// Write `posts` (path -> document) to `branch_ref` as a single commit.
pub async fn commit_updated_posts<R>(
    repo: &R,
    cursor: &mut CommitCursor,
    branch_ref: &str,
    posts: &BTreeMap<String, Frontmatter>,
    silos: &BTreeSet<String>,
) -> Result<CommitOutcome, CommitError>
where
    R: Repository + ?Sized,
{
    if posts.is_empty() {
        info!("[COMMIT] All good: already marked.");
        return Ok(CommitOutcome::UpToDate);
    }

    let rendered = posts
        .iter()
        .map(|(path, doc)| -> Result<_, CommitError> { Ok((path, doc.serialize()?)) })
        .collect::<Result<Vec<_>, _>>()?;

    // Step 1
    let mut entries = Vec::with_capacity(rendered.len());
    for (path, text) in &rendered {
        let blob = repo.create_blob(text).await?;
        debug!(path = %path, blob = %blob, "[COMMIT] Created blob");
        entries.push(TreeEntry::file(path.as_str(), blob));
    }

    // Step 2
    let parent = cursor.sha().to_string();
    let tree = repo.create_tree(entries, &parent).await?;
    debug!(tree = %tree, base = %parent, "[COMMIT] Created tree");

    // Step 3
    let message = commit_message(silos);
    let commit = repo
        .create_commit(&message, &tree, vec![parent.clone()])
        .await?;
    debug!(commit = %commit, parent = %parent, "[COMMIT] Created commit");

    // Step 4
    if let Err(source) = repo.update_ref(branch_ref, &commit).await {
        error!(
            git_ref = %branch_ref,
            commit = %commit,
            error = %source,
            "[COMMIT] Failed to mark syndicated posts"
        );
        return Err(CommitError::ReferenceConflict {
            git_ref: branch_ref.to_string(),
            sha: commit,
            source,
        });
    }

    cursor.advance(commit.clone());
    info!(
        commit = %commit,
        posts = posts.len(),
        "[COMMIT] Syndicated posts marked."
    );
    Ok(CommitOutcome::Committed { sha: commit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_lists_silos_in_order() {
        let silos: BTreeSet<String> = ["medium", "dev"].into_iter().map(String::from).collect();
        assert_eq!(
            commit_message(&silos),
            "(syndicate): adding IDs for dev, medium"
        );
    }
}
