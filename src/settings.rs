//! Client-local view state: editor preferences and per-project moodboard
//! viewports. Never synchronized, never part of undo.

use crate::error::SettingsError;
use crate::model::{AspectRatio, CanvasBackground, EntityId};
use crate::spatial::Transform;
use eframe::egui;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStyle {
    #[default]
    Curved,
    Straight,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SavedViewport {
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl From<Transform> for SavedViewport {
    fn from(t: Transform) -> Self {
        Self {
            zoom: t.zoom,
            pan_x: t.pan.x,
            pan_y: t.pan.y,
        }
    }
}

impl From<SavedViewport> for Transform {
    fn from(v: SavedViewport) -> Self {
        Self {
            pan: egui::vec2(v.pan_x, v.pan_y),
            zoom: v.zoom,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewState {
    pub sidebar_width: f32,
    pub font_size: f32,
    pub grid_style: CanvasBackground,
    pub connector_style: ConnectorStyle,
    pub default_aspect_ratio: AspectRatio,
    pub snap_threshold: f32,
    /// Keyed by project id.
    pub moodboards: BTreeMap<String, SavedViewport>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            sidebar_width: 280.0,
            font_size: 14.0,
            grid_style: CanvasBackground::Dots,
            connector_style: ConnectorStyle::Curved,
            default_aspect_ratio: AspectRatio::default(),
            snap_threshold: 8.0,
            moodboards: BTreeMap::new(),
        }
    }
}

/// Default location: `$HOME/.config/storyframe.toml` when it exists, else
/// `storyframe.toml` in the working directory.
pub fn config_path() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(home).join(".config").join("storyframe.toml");
        if path.exists() {
            return path;
        }
    }
    PathBuf::from("storyframe.toml")
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

fn parse(path: &Path, s: &str) -> Result<ViewState, SettingsError> {
    if is_toml(path) {
        match toml::from_str::<ViewState>(s) {
            Ok(state) => Ok(state),
            Err(e) => serde_json::from_str(s).map_err(|_| e.into()),
        }
    } else {
        match serde_json::from_str::<ViewState>(s) {
            Ok(state) => Ok(state),
            Err(e) => toml::from_str(s).map_err(|_| e.into()),
        }
    }
}

pub struct ViewStateStore {
    path: PathBuf,
    state: ViewState,
}

impl ViewStateStore {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(s) => parse(&path, &s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ViewState::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, state })
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let text = if is_toml(&self.path) {
            toml::to_string_pretty(&self.state)?
        } else {
            serde_json::to_string_pretty(&self.state)?
        };
        std::fs::write(&self.path, text)?;
        tracing::debug!(path = %self.path.display(), "saved view state");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    pub fn moodboard_viewport(&self, project: EntityId) -> Option<Transform> {
        self.state
            .moodboards
            .get(&project.to_string())
            .copied()
            .map(Transform::from)
    }

    pub fn set_moodboard_viewport(&mut self, project: EntityId, transform: Transform) {
        self.state
            .moodboards
            .insert(project.to_string(), transform.into());
    }

    pub fn forget_project(&mut self, project: EntityId) {
        self.state.moodboards.remove(&project.to_string());
    }
}
