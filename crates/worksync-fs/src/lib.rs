//! Path normalization and safe I/O for Worksync
//!
//! Provides forward-slash-normalized path handling shared by the filter,
//! manifest, and engine crates, plus atomic write primitives used for
//! manifest and version-stamp files.

pub mod error;
pub mod io;
pub mod path;

pub use error::{Error, Result};
pub use io::{read_text, write_atomic, write_text_if_changed};
pub use path::{WorkspacePath, split_path_tokens};
