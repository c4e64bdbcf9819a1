use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use anyhow::Result;

use crate::params::Selection;

/// The last launched link and, from the selector, what it was launched with.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct LaunchState {
    pub link: Option<PathBuf>,
    #[serde(default)]
    pub archive: bool,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
}

impl LaunchState {
    pub fn selection(&self) -> Option<Selection> {
        self.file
            .as_ref()
            .filter(|f| !f.is_empty())
            .map(|f| Selection::new(f.clone(), self.dir.clone()))
    }
}

/// Persistent menu state: which link was last chosen.
pub fn state_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "linkapp", "linkapp")
        .map(|dirs| {
            let data_dir = dirs.data_dir();
            let _ = fs::create_dir_all(data_dir);
            data_dir.join("state.json")
        })
}

/// Temporary selection, gone after a reboot.
pub fn tmp_path() -> PathBuf {
    env::temp_dir().join("linkapp.tmp.json")
}

pub fn load_state(path: &Path) -> LaunchState {
    if let Ok(content) = fs::read_to_string(path) {
        if let Ok(state) = serde_json::from_str(&content) {
            return state;
        }
    }
    LaunchState::default()
}

pub fn save_state(path: &Path, state: &LaunchState) -> Result<()> {
    let content = serde_json::to_string_pretty(state)?;
    fs::write(path, content)?;
    Ok(())
}
