//! High-level pipeline: read changed posts → draft on each silo → mark and commit.
//!
//! This module decides which `(post, silo)` pairs still need a draft and
//! writes the resulting ids back into the posts. A run:
//!   - Lists the files of the triggering commit and keeps the live ones under
//!     the posts directory ([`get_posts`])
//!   - Reads each post as of the commit cursor, so ids written by an earlier
//!     step of the same job are already visible
//!   - Checks every silo's credential before the first draft is requested
//!   - Asks each silo for a draft of every post that has no id for it yet,
//!     recording each new id in the job's accumulator as soon as it exists
//!     ([`syndicate`])
//!   - Rewrites the affected
//!     headers in one commit ([`mark_syndicated_posts`],
//!     [`crate::commit::commit_updated_posts`])
//!
//! # Error Handling
//! A silo refusing or failing to draft one post is logged and the run goes on
//! with the next post. Missing credentials, an empty trigger and any commit
//! failure end the run with an error. Once drafting has begun, errors come
//! back as [`SyndicateError::Interrupted`] carrying the accumulator, so ids of
//! drafts that already exist are never lost.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Report types: [`SynchroniseReport`], [`SiloReport`]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::commit::{commit_updated_posts, CommitCursor, CommitOutcome};
use crate::config::RunConfig;
use crate::contract::{Repository, Silo};
use crate::error::{SiloError, SyndicateError};
use crate::frontmatter::Frontmatter;
use crate::syndication::{syndicate_key_for, PendingUpdate, Post, SyndicationId};

/// What one silo did with the run's posts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiloReport {
    pub silo: String,
    /// New drafts, `path -> id`.
    pub drafted: BTreeMap<String, SyndicationId>,
    /// Posts that already carried an id for this silo.
    pub skipped: Vec<String>,
    /// Posts the silo did not accept.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynchroniseReport {
    pub posts: Vec<String>,
    pub silos: Vec<SiloReport>,
    /// Accumulated ids, including those handed in from earlier steps.
    pub pending: PendingUpdate,
    pub commit: CommitOutcome,
}

fn in_posts_dir(filename: &str, posts_dir: &str) -> bool {
    let dir = posts_dir.trim_start_matches("./");
    Path::new(filename).starts_with(dir)
}

/// The live posts touched by `trigger_sha`, read as of the cursor.
///
/// Posts that cannot be read or parsed are logged and left out.
pub async fn get_posts<R>(
    repo: &R,
    trigger_sha: &str,
    cursor: &CommitCursor,
    posts_dir: &str,
) -> Result<Vec<Post>, SyndicateError>
where
    R: Repository + ?Sized,
{
    let files = repo.changed_files(trigger_sha).await?;
    if files.is_empty() {
        return Err(SyndicateError::Precondition(format!(
            "target commit {trigger_sha} was empty"
        )));
    }

    let mut posts = Vec::new();
    for file in files {
        if !in_posts_dir(&file.filename, posts_dir) {
            continue;
        }
        if file.status.is_deleted() {
            debug!(path = %file.filename, "[SYNDICATE] Ignoring deleted post");
            continue;
        }

        let raw = match repo.file_contents(&file.filename, cursor.sha()).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(path = %file.filename, error = %e, "[SYNDICATE] Failed to read post");
                continue;
            }
        };
        match Frontmatter::parse(&raw) {
            Ok(frontmatter) => posts.push(Post::new(file.filename, frontmatter)),
            Err(e) => {
                warn!(path = %file.filename, error = %e, "[SYNDICATE] Skipping file without frontmatter");
            }
        }
    }

    info!(count = posts.len(), posts_dir = %posts_dir, "[SYNDICATE] Collected posts");
    Ok(posts)
}

/// Draft every post that has no id on `silo` yet.
///
/// Each new id is recorded in `pending` the moment the silo returns it.
pub async fn syndicate<S>(
    silo: &S,
    posts: &[Post],
    pending: &mut PendingUpdate,
) -> Result<SiloReport, SyndicateError>
where
    S: Silo + ?Sized,
{
    let name = silo.name();
    let mut report = SiloReport {
        silo: name.clone(),
        ..SiloReport::default()
    };

    for post in posts {
        if let Some(existing) = post.syndicate_id_for(&name) {
            debug!(path = %post.path, silo = %name, id = ?existing, "[SYNDICATE] Already syndicated");
            report.skipped.push(post.path.clone());
            continue;
        }

        match silo.draft(post).await {
            Ok(Some(id)) if id.is_valid() => {
                info!(path = %post.path, silo = %name, id = %id, "[SYNDICATE] Drafted");
                pending.record(&post.path, &name, id.clone());
                report.drafted.insert(post.path.clone(), id);
            }
            Ok(_) => {
                warn!(path = %post.path, silo = %name, "[SYNDICATE] Silo returned no draft id");
                report.failed.push(post.path.clone());
            }
            Err(e @ SiloError::MissingCredential { .. }) => return Err(e.into()),
            Err(e) => {
                error!(path = %post.path, silo = %name, error = %e, "[SYNDICATE] Drafting failed");
                report.failed.push(post.path.clone());
            }
        }
    }

    info!(
        silo = %name,
        drafted = report.drafted.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "[SYNDICATE] Silo pass complete"
    );
    Ok(report)
}

/// Headers to rewrite, with the silos whose keys they gain.
///
/// A post only appears if at least one of its pending ids is for a silo it
/// has no id for yet; existing ids are never replaced.
pub fn mark_syndicated_posts(
    pending: &PendingUpdate,
    posts: &[Post],
) -> (BTreeMap<String, Frontmatter>, BTreeSet<String>) {
    let mut updated = BTreeMap::new();
    let mut silos_included = BTreeSet::new();

    for (path, ids_by_silo) in pending.iter() {
        let Some(post) = posts.iter().find(|p| &p.path == path) else {
            warn!(path = %path, "[SYNDICATE] Pending ids for a post outside this run");
            continue;
        };

        let new_ids: Vec<_> = ids_by_silo
            .iter()
            .filter(|(silo, _)| !post.is_syndicated_to(silo))
            .map(|(silo, id)| {
                silos_included.insert(silo.clone());
                (syndicate_key_for(silo), id.to_yaml())
            })
            .collect();
        if new_ids.is_empty() {
            continue;
        }

        let mut frontmatter = post.frontmatter.clone();
        let written = frontmatter.merge_new_keys(new_ids);
        debug!(path = %path, keys = ?written, "[SYNDICATE] Marked post");
        updated.insert(path.clone(), frontmatter);
    }

    (updated, silos_included)
}

fn interrupted(pending: PendingUpdate, source: SyndicateError) -> SyndicateError {
    warn!(pending = ?pending, "[SYNDICATE] Run interrupted; handing back recorded ids");
    SyndicateError::Interrupted {
        pending,
        source: Box::new(source),
    }
}

/// Run every configured silo over the triggering commit's posts and commit
/// the new ids.
///
/// `prior` carries ids recorded by earlier steps of the same job; it is
/// merged with this run's ids (never overwritten) and returned in the report,
/// or inside [`SyndicateError::Interrupted`] when the run fails after drafting.
pub async fn synchronise<R>(
    repo: &R,
    silos: &[Box<dyn Silo>],
    config: &RunConfig,
    cursor: &mut CommitCursor,
    prior: PendingUpdate,
) -> Result<SynchroniseReport, SyndicateError>
where
    R: Repository + ?Sized,
{
    info!("[SYNDICATE] Starting syndication run");
    if silos.is_empty() {
        return Err(SyndicateError::Precondition(
            "no silos configured".to_string(),
        ));
    }

    for silo in silos {
        if let Err(e) = silo.check_credential() {
            error!(silo = %silo.name(), error = %e, "[SYNDICATE] Silo is not usable");
            return Err(e.into());
        }
    }

    let posts = get_posts(repo, &config.trigger_sha, cursor, &config.posts_dir).await?;

    let mut pending = prior;
    let mut silo_reports = Vec::with_capacity(silos.len());
    for silo in silos {
        let title = format!("Syndicating to {}", silo.name());
        match syndicate(silo.as_ref(), &posts, &mut pending)
            .instrument(info_span!("group", title = %title))
            .await
        {
            Ok(report) => silo_reports.push(report),
            Err(e) => return Err(interrupted(pending, e)),
        }
    }

    let (updated, silos_included) = mark_syndicated_posts(&pending, &posts);
    let commit = match commit_updated_posts(
        repo,
        cursor,
        &config.branch_ref,
        &updated,
        &silos_included,
    )
    .await
    {
        Ok(commit) => commit,
        Err(e) => return Err(interrupted(pending, e.into())),
    };

    Ok(SynchroniseReport {
        posts: posts.into_iter().map(|p| p.path).collect(),
        silos: silo_reports,
        pending,
        commit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posts_dir_matches_whole_components() {
        assert!(in_posts_dir("posts/a.md", "posts"));
        assert!(in_posts_dir("posts/2020/a.md", "posts/"));
        assert!(in_posts_dir("posts/a.md", "./posts"));
        assert!(!in_posts_dir("postscript.md", "posts"));
        assert!(!in_posts_dir("drafts/a.md", "posts"));
    }

    #[test]
    fn marking_skips_silos_already_recorded() {
        let posts = vec![
            Post::new(
                "posts/a.md",
                Frontmatter::parse("---\ntitle: A\n---\nbody").unwrap(),
            ),
            Post::new(
                "posts/b.md",
                Frontmatter::parse("---\ntitle: B\ndev_syndicate_id: 1\n---\nbody").unwrap(),
            ),
        ];
        let mut pending = PendingUpdate::new();
        pending.record("posts/a.md", "dev", 42.into());
        pending.record("posts/b.md", "dev", 99.into());

        let (updated, silos) = mark_syndicated_posts(&pending, &posts);
        assert_eq!(updated.len(), 1);
        assert_eq!(
            updated["posts/a.md"].get("dev_syndicate_id"),
            Some(&serde_yaml::Value::from(42))
        );
        assert_eq!(silos.into_iter().collect::<Vec<_>>(), vec!["dev"]);
    }
}
