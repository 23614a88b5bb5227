//! Three-layer build step merge
//!
//! Build steps come from three configuration layers: engine defaults, the
//! project, and the user. Layers are merged by step GUID; each later layer
//! overrides only the fields it explicitly sets, and may suppress a step
//! entirely with `remove`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::step::{BuildStep, StepAction, StepKind};
use crate::{Error, Result};

/// A partially specified build step contributed by one configuration layer.
///
/// `None` fields inherit whatever an earlier layer set; fields carrying a
/// value override it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOverride {
    pub id: Uuid,
    /// Suppress the step entirely from this layer onward
    #[serde(default)]
    pub remove: bool,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub kind: Option<StepKind>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub configuration: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default)]
    pub use_log_window: Option<bool>,
    #[serde(default)]
    pub normal_sync: Option<bool>,
    #[serde(default)]
    pub scheduled_sync: Option<bool>,
}

impl StepOverride {
    /// An empty override for the given step id.
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            remove: false,
            order_index: None,
            description: None,
            status_text: None,
            kind: None,
            target: None,
            platform: None,
            configuration: None,
            arguments: None,
            profile: None,
            executable: None,
            use_log_window: None,
            normal_sync: None,
            scheduled_sync: None,
        }
    }
}

/// The merged, ordered collection of build steps for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildStepSet {
    steps: Vec<BuildStep>,
}

impl BuildStepSet {
    /// Merge the three configuration layers into a final step set.
    ///
    /// Layers apply in order (defaults, project, user); later layers
    /// override only the fields they set. The result is sorted by order
    /// index, ties broken by first appearance.
    pub fn merge(
        default_layer: &[StepOverride],
        project_layer: &[StepOverride],
        user_layer: &[StepOverride],
    ) -> Self {
        let mut drafts: Vec<Draft> = Vec::new();

        for (layer_idx, layer) in [default_layer, project_layer, user_layer]
            .into_iter()
            .enumerate()
        {
            let from_user = layer_idx == 2;
            for patch in layer {
                if patch.remove {
                    drafts.retain(|d| d.id != patch.id);
                    continue;
                }
                match drafts.iter_mut().find(|d| d.id == patch.id) {
                    Some(draft) => draft.apply(patch, from_user),
                    None => {
                        let mut draft = Draft::new(patch.id);
                        draft.apply(patch, from_user);
                        drafts.push(draft);
                    }
                }
            }
        }

        let mut steps: Vec<BuildStep> = drafts.into_iter().map(Draft::finish).collect();
        steps.sort_by_key(|s| s.order_index);
        Self { steps }
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    /// True when any step was introduced or modified by the user layer.
    pub fn any_user_defined(&self) -> bool {
        self.steps.iter().any(|s| s.user_defined)
    }

    /// Keep only the steps whose id appears in `ids`, preserving order.
    pub fn subset(&self, ids: &[Uuid]) -> Self {
        Self {
            steps: self
                .steps
                .iter()
                .filter(|s| ids.contains(&s.id))
                .cloned()
                .collect(),
        }
    }

    /// Keep only the steps enabled for a scheduled or a normal sync.
    pub fn for_schedule(&self, scheduled: bool) -> Self {
        Self {
            steps: self
                .steps
                .iter()
                .filter(|s| if scheduled { s.scheduled_sync } else { s.normal_sync })
                .cloned()
                .collect(),
        }
    }
}

/// Accumulates field overrides for one step id across layers.
#[derive(Debug)]
struct Draft {
    id: Uuid,
    order_index: Option<i32>,
    description: Option<String>,
    status_text: Option<String>,
    kind: Option<StepKind>,
    target: Option<String>,
    platform: Option<String>,
    configuration: Option<String>,
    arguments: Option<String>,
    profile: Option<String>,
    executable: Option<String>,
    use_log_window: Option<bool>,
    normal_sync: Option<bool>,
    scheduled_sync: Option<bool>,
    user_defined: bool,
}

impl Draft {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            order_index: None,
            description: None,
            status_text: None,
            kind: None,
            target: None,
            platform: None,
            configuration: None,
            arguments: None,
            profile: None,
            executable: None,
            use_log_window: None,
            normal_sync: None,
            scheduled_sync: None,
            user_defined: false,
        }
    }

    fn apply(&mut self, patch: &StepOverride, from_user: bool) {
        fn take<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *slot = value.clone();
            }
        }
        take(&mut self.order_index, &patch.order_index);
        take(&mut self.description, &patch.description);
        take(&mut self.status_text, &patch.status_text);
        take(&mut self.kind, &patch.kind);
        take(&mut self.target, &patch.target);
        take(&mut self.platform, &patch.platform);
        take(&mut self.configuration, &patch.configuration);
        take(&mut self.arguments, &patch.arguments);
        take(&mut self.profile, &patch.profile);
        take(&mut self.executable, &patch.executable);
        take(&mut self.use_log_window, &patch.use_log_window);
        take(&mut self.normal_sync, &patch.normal_sync);
        take(&mut self.scheduled_sync, &patch.scheduled_sync);
        if from_user {
            self.user_defined = true;
        }
    }

    fn finish(self) -> BuildStep {
        let action = match self.kind.unwrap_or(StepKind::Other) {
            StepKind::Compile => StepAction::Compile {
                target: self.target.unwrap_or_default(),
                platform: self.platform.unwrap_or_default(),
                configuration: self.configuration.unwrap_or_default(),
                arguments: self.arguments.unwrap_or_default(),
            },
            StepKind::Cook => StepAction::Cook {
                profile: self.profile.unwrap_or_default(),
            },
            StepKind::Other => StepAction::Other {
                executable: self.executable.unwrap_or_default(),
                arguments: self.arguments.unwrap_or_default(),
                use_log_window: self.use_log_window.unwrap_or(true),
            },
        };
        let description = self.description.unwrap_or_default();
        BuildStep {
            id: self.id,
            order_index: self.order_index.unwrap_or(0),
            status_text: self.status_text.unwrap_or_else(|| description.clone()),
            description,
            action,
            normal_sync: self.normal_sync.unwrap_or(true),
            scheduled_sync: self.scheduled_sync.unwrap_or(false),
            user_defined: self.user_defined,
        }
    }
}

/// Step overrides as stored in a layer's configuration file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StepLayerFile {
    #[serde(default)]
    pub steps: Vec<StepOverride>,
}

/// Load one layer of step overrides from a TOML file.
///
/// A missing file is an empty layer; invalid TOML is an error.
pub fn load_step_layer(path: &Path) -> Result<Vec<StepOverride>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: StepLayerFile = toml::from_str(&content).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), steps = file.steps.len(), "Loaded step layer");
    Ok(file.steps)
}
