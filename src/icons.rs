use std::path::{Path, PathBuf};
use log::debug;

use crate::config::Config;
use crate::model::LinkFields;

/// Icon every skin is expected to ship.
pub const GENERIC_ICON: &str = "icons/generic.png";
/// Prefix of icons named relative to the active skin.
pub const SKIN_PREFIX: &str = "skin:";
/// Separates the archive path from the member name in an in-archive locator.
pub const ARCHIVE_SEPARATOR: char = '#';

/// Skin asset lookup.
pub trait Skin {
    /// Path of `name` (e.g. `icons/foo.png`) in the active skin, if it exists.
    fn file_path(&self, name: &str) -> Option<PathBuf>;
}

/// Skin roots searched in order, see [`Config::skin_roots`].
pub struct SkinDirs {
    roots: Vec<PathBuf>,
}

impl SkinDirs {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.skin_roots())
    }
}

impl Skin for SkinDirs {
    fn file_path(&self, name: &str) -> Option<PathBuf> {
        for root in &self.roots {
            let candidate = root.join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        None
    }
}

/// Picks the icon shown for a link: explicit icon, then the skin's icon for
/// the executable, then a `.png` next to the executable, then the generic one.
pub struct IconResolver<'a> {
    skin: &'a dyn Skin,
}

impl<'a> IconResolver<'a> {
    pub fn new(skin: &'a dyn Skin) -> Self {
        Self { skin }
    }

    pub fn resolve(&self, fields: &LinkFields) -> String {
        if let Some(path) = self.explicit(&fields.icon) {
            return path;
        }
        self.search(&fields.exec)
    }

    /// The configured icon, if it points at something that exists.
    pub fn explicit(&self, icon: &str) -> Option<String> {
        if icon.is_empty() {
            return None;
        }
        if let Some(name) = icon.strip_prefix(SKIN_PREFIX) {
            return self.skin.file_path(name).map(|p| p.to_string_lossy().into_owned());
        }
        if let Some((archive, _)) = icon.split_once(ARCHIVE_SEPARATOR) {
            if Path::new(archive).is_file() {
                return Some(icon.to_string());
            }
        }
        if Path::new(icon).exists() {
            return Some(icon.to_string());
        }
        None
    }

    /// Icon derived from the executable name.
    pub fn search(&self, exec: &str) -> String {
        if !exec.is_empty() {
            let exec_icon = Path::new(exec).with_extension("png");
            if let Some(name) = exec_icon.file_name().and_then(|n| n.to_str()) {
                if let Some(path) = self.skin.file_path(&format!("icons/{}", name)) {
                    return path.to_string_lossy().into_owned();
                }
            }
            if exec_icon.is_file() {
                return exec_icon.to_string_lossy().into_owned();
            }
        }

        debug!("No icon for '{}', using generic", exec);
        self.skin
            .file_path(GENERIC_ICON)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}{}", SKIN_PREFIX, GENERIC_ICON))
    }
}
