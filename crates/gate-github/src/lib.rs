//! # Gate-GitHub
//!
//! GitHub REST API integration for the Eval-Gate quality gate.
//!
//! Provides the concrete implementations of the gate-core seams:
//!
//! - [`CheckRunClient`] implements [`gate_core::CheckRunReporter`]
//! - [`ArtifactClient`] implements [`gate_core::ArtifactFetcher`]
//! - [`MetaClient`] implements [`gate_core::AllowedRangeSource`]
//!
//! All three share one [`GitHubClient`] carrying the base URL, access token,
//! and bounded per-request timeout.

pub mod artifacts;
pub mod check_runs;
pub mod client;
pub mod error;
pub mod meta;

pub use artifacts::{ArtifactClient, WorkflowArtifact};
pub use check_runs::{CheckRun, CheckRunClient, CreateCheckRunRequest, UpdateCheckRunRequest};
pub use client::{ClientConfig, GitHubClient};
pub use error::ApiError;
pub use meta::MetaClient;
