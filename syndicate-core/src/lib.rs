#![doc = "syndicate-core: core logic library for syndicate."]

//! This crate holds the logic for cross-posting blog posts to publishing
//! silos: the frontmatter codec, silo adapters, the reconciliation engine and
//! the commit protocol that writes syndication ids back to the repository.
//!
//! # Usage
//! The `syndicate` binary wires these pieces to the environment of a CI job.
//! Everything here takes its collaborators as arguments; nothing reads
//! process-wide state.

pub mod commit;
pub mod config;
pub mod contract;
pub mod error;
pub mod frontmatter;
pub mod reconcile;
pub mod silo;
pub mod syndication;
