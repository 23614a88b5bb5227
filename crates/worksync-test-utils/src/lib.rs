//! Shared test utilities for the worksync workspace.
//!
//! Provides the scripted [`MockVcs`] client and archive fixtures used by
//! unit and integration tests. Dev-dependency only, never published.

pub mod archive;
pub mod mock_vcs;

pub use archive::targz;
pub use mock_vcs::{MockVcs, opened};
