//! Build step model and layered merge for Worksync
//!
//! Build steps are typed actions (compile, cook, other) identified by a
//! stable GUID and merged from three configuration layers: engine defaults,
//! project overrides, and user overrides.

pub mod error;
pub mod merge;
pub mod step;
pub mod vars;

pub use error::{Error, Result};
pub use merge::{BuildStepSet, StepLayerFile, StepOverride, load_step_layer};
pub use step::{BuildStep, StepAction, StepKind};
pub use vars::{expand_variables, split_command_line};
