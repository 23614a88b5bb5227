//! Path-pattern filter tree for Worksync
//!
//! Decides which candidate files participate in a workspace sync. Rules are
//! path patterns with `*`, `?` and `...` wildcards and an Include/Exclude
//! polarity; when several rules match one path, the rule added most recently
//! wins. The compiled [`FilterTree`] is immutable and lock-free to query.

pub mod rule;
pub mod tree;

pub use rule::{FilterRule, RulePolarity};
pub use tree::{FilterTree, FilterTreeBuilder};
