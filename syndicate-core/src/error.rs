//! Error types for syndicate-core.
//!
//! Each component owns one enum; [`SyndicateError`] is what a whole run
//! surfaces to the orchestrator.

use thiserror::Error;

use crate::syndication::PendingUpdate;

/// Failure to split or encode a frontmatter document.
#[derive(Debug, Error)]
pub enum FrontmatterError {
    /// The document does not open with a `---` delimiter line.
    #[error("document does not begin with a frontmatter block")]
    MissingHeader,

    /// An opening delimiter was found but no closing one.
    #[error("frontmatter block is never closed")]
    UnterminatedHeader,

    /// The header parsed as YAML, but not as a key-value mapping.
    #[error("frontmatter header is not a mapping")]
    NotAMapping,

    #[error("frontmatter YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised by a silo adapter.
#[derive(Debug, Error)]
pub enum SiloError {
    /// No API credential was configured for the silo.
    #[error("missing API key for silo {silo}")]
    MissingCredential { silo: String },

    /// `draft` was called with a post that has neither header nor body.
    #[error("missing post")]
    EmptyPost,

    /// The silo answered with a non-success status.
    #[error("silo rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("silo transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// No adapter exists for the configured silo name.
    #[error("unknown silo: {0}")]
    UnknownSilo(String),
}

/// Errors raised by the source-control host.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{operation} rejected with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("repository transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode repository response: {0}")]
    Decode(String),

    /// A request URL could not be built from the configured API base.
    #[error("invalid repository request url: {0}")]
    InvalidUrl(String),
}

/// Errors raised by the commit protocol. Any of them means nothing was pushed.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),

    /// The branch could not be fast-forwarded to the new commit.
    #[error("failed to update {git_ref} to {sha}: {source}")]
    ReferenceConflict {
        git_ref: String,
        sha: String,
        #[source]
        source: RepositoryError,
    },
}

/// Run-level error surfaced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum SyndicateError {
    /// A required value or argument was missing; the run aborts before writing.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Silo(#[from] SiloError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    /// The run failed after drafting began. `pending` holds every id known
    /// so far, including drafts that were created but never committed.
    #[error("run interrupted after drafting: {source}")]
    Interrupted {
        pending: PendingUpdate,
        #[source]
        source: Box<SyndicateError>,
    },
}

impl SyndicateError {
    /// Ids that must still be handed to later steps of the job.
    pub fn pending(&self) -> Option<&PendingUpdate> {
        match self {
            SyndicateError::Interrupted { pending, .. } => Some(pending),
            _ => None,
        }
    }

    /// The failure underneath any [`SyndicateError::Interrupted`] wrapper.
    pub fn root(&self) -> &SyndicateError {
        match self {
            SyndicateError::Interrupted { source, .. } => source.root(),
            other => other,
        }
    }
}
