use serde::Deserialize;
use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use anyhow::Result;
use std::fs;

use crate::model::DEFAULT_CLOCK;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub skin: SkinConfig,
    #[serde(default)]
    pub opk: OpkConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GeneralConfig {
    /// Launcher home: sections, sidecars, skins and the output log live here
    #[serde(default = "default_home")]
    pub home: PathBuf,
    #[serde(default = "default_menu_clock")]
    pub menu_clock: u32,
    #[serde(default)]
    pub output_logs: bool,
    #[serde(default = "default_true")]
    pub save_selection: bool,
    /// File receiving the CPU clock in MHz (e.g. a cpufreq sysfs node)
    #[serde(default)]
    pub clock_control: Option<PathBuf>,
    /// Menu command to re-exec when a launch fails after handoff
    #[serde(default)]
    pub restart_command: Option<String>,
}

fn default_home() -> PathBuf {
    ProjectDirs::from("org", "linkapp", "linkapp")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".linkapp"))
}
fn default_menu_clock() -> u32 { DEFAULT_CLOCK }
fn default_true() -> bool { true }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            menu_clock: default_menu_clock(),
            output_logs: false,
            save_selection: true,
            clock_control: None,
            restart_command: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PathConfig {
    #[serde(default = "default_mount_root")]
    pub mount_root: PathBuf,
    /// Directories scanned for package archives
    #[serde(default = "default_apps")]
    pub apps: Vec<PathBuf>,
}

fn default_mount_root() -> PathBuf { PathBuf::from("/mnt") }
fn default_apps() -> Vec<PathBuf> {
    vec![PathBuf::from("/media/data/apps"), PathBuf::from("/media/sdcard/apps")]
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            mount_root: default_mount_root(),
            apps: default_apps(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SkinConfig {
    #[serde(default = "default_skin")]
    pub name: String,
    /// Extra skin roots searched after `<home>/skins`
    #[serde(default = "default_skin_dirs")]
    pub dirs: Vec<PathBuf>,
}

fn default_skin() -> String { "Default".to_string() }
fn default_skin_dirs() -> Vec<PathBuf> { vec![PathBuf::from("/usr/share/linkapp/skins")] }

impl Default for SkinConfig {
    fn default() -> Self {
        Self {
            name: default_skin(),
            dirs: default_skin_dirs(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct OpkConfig {
    #[serde(default = "default_platform")]
    pub platform: String,
}

fn default_platform() -> String { "gcw0".to_string() }

impl Default for OpkConfig {
    fn default() -> Self {
        Self { platform: default_platform() }
    }
}

impl Config {
    pub fn sections_dir(&self) -> PathBuf {
        self.general.home.join("sections")
    }

    /// Root of the per-category override files of package archives.
    pub fn sidecar_dir(&self) -> PathBuf {
        self.general.home.join("opk")
    }

    pub fn log_file(&self) -> PathBuf {
        self.general.home.join("log.txt")
    }

    /// Skin roots in lookup order: active skin first, then `Default`.
    pub fn skin_roots(&self) -> Vec<PathBuf> {
        let mut bases = vec![self.general.home.join("skins")];
        bases.extend(self.skin.dirs.iter().cloned());

        let mut names = vec![self.skin.name.as_str()];
        if self.skin.name != "Default" {
            names.push("Default");
        }

        let mut roots = Vec::new();
        for name in names {
            for base in &bases {
                roots.push(base.join(name));
            }
        }
        roots
    }
}

pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "linkapp", "linkapp")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };

    if !config_path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            "[general]\nhome = \"/media/home\"\noutput_logs = true\n\n[skin]\nname = \"Blue\"\n",
        )
        .unwrap();

        assert_eq!(config.general.home, PathBuf::from("/media/home"));
        assert!(config.general.output_logs);
        assert!(config.general.save_selection);
        assert_eq!(config.general.menu_clock, DEFAULT_CLOCK);
        assert_eq!(config.paths.mount_root, PathBuf::from("/mnt"));
        assert_eq!(config.opk.platform, "gcw0");
        assert_eq!(config.log_file(), PathBuf::from("/media/home/log.txt"));
    }

    #[test]
    fn skin_roots_fall_back_to_default_skin() {
        let mut config = Config::default();
        config.general.home = PathBuf::from("/h");
        config.skin.name = "Blue".to_string();
        config.skin.dirs = vec![PathBuf::from("/usr/share/skins")];

        assert_eq!(
            config.skin_roots(),
            vec![
                PathBuf::from("/h/skins/Blue"),
                PathBuf::from("/usr/share/skins/Blue"),
                PathBuf::from("/h/skins/Default"),
                PathBuf::from("/usr/share/skins/Default"),
            ]
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.skin.name, "Default");
    }
}
