use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use log::{debug, info};

use crate::config::Config;
use crate::error::{LinkWarning, OpkError};
use crate::icons::{ARCHIVE_SEPARATOR, IconResolver, Skin};
use crate::model::{Link, LinkFields, LinkSource};
use crate::sources::linkfile::{log_warnings, read_link_file};

/// Named parameters read from a package archive.
pub trait PackageMetadata {
    fn param(&self, key: &str) -> Option<&str>;
}

/// The `[Desktop Entry]` group of a desktop-entry file.
#[derive(Debug, Clone, Default)]
pub struct DesktopMetadata {
    entries: HashMap<String, String>,
}

impl DesktopMetadata {
    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        let mut is_desktop_entry = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') { continue; }

            if line == "[Desktop Entry]" {
                is_desktop_entry = true;
                continue;
            }

            if line.starts_with('[') {
                is_desktop_entry = false;
                continue;
            }

            if !is_desktop_entry { continue; }

            if let Some((key, value)) = line.split_once('=') {
                entries
                    .entry(key.trim().to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }

        Self { entries }
    }
}

impl PackageMetadata for DesktopMetadata {
    fn param(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// A squashfs package image, read through `unsquashfs`.
pub struct OpkArchive {
    path: PathBuf,
}

const UNSQUASHFS: &str = "unsquashfs";
const LIST_ROOT: &str = "squashfs-root/";

impl OpkArchive {
    pub fn open(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    fn run(&self, args: &[&str], member: Option<&str>) -> Result<String, OpkError> {
        let mut command = Command::new(UNSQUASHFS);
        command.args(args).arg(&self.path);
        if let Some(member) = member {
            command.arg(member);
        }

        let output = command
            .output()
            .map_err(|source| OpkError::Io { path: self.path.clone(), source })?;

        if !output.status.success() {
            return Err(OpkError::Tool {
                tool: UNSQUASHFS,
                path: self.path.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Names of the files in the image's root directory.
    pub fn root_files(&self) -> Result<Vec<String>, OpkError> {
        let listing = self.run(&["-l", "-no-progress"], None)?;
        Ok(listing
            .lines()
            .filter_map(|l| l.trim().strip_prefix(LIST_ROOT))
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .map(str::to_string)
            .collect())
    }

    pub fn read_file(&self, name: &str) -> Result<String, OpkError> {
        self.run(&["-cat"], Some(name))
    }

    pub fn read_metadata(&self, platform: &str) -> Result<DesktopMetadata, OpkError> {
        let files = self.root_files()?;
        let name = pick_metadata(&files, platform)
            .ok_or_else(|| OpkError::NoMetadata(self.path.clone()))?;
        debug!("Reading metadata {} from {}", name, self.path.display());
        Ok(DesktopMetadata::parse(&self.read_file(name)?))
    }
}

/// The platform's metadata file if present, else the first desktop entry.
pub fn pick_metadata<'a>(files: &'a [String], platform: &str) -> Option<&'a str> {
    let wanted = format!(".{}.desktop", platform);
    files
        .iter()
        .find(|f| f.ends_with(&wanted))
        .or_else(|| files.iter().find(|f| f.ends_with(".desktop")))
        .map(String::as_str)
}

/// `<mount_root>/<archive file name without extension>`
pub fn mount_point_for(archive: &Path, mount_root: &Path) -> PathBuf {
    let name = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    mount_root.join(name)
}

/// Where the user overrides of an archive live.
pub fn sidecar_path(sidecar_root: &Path, category: &str, mount_point: &Path) -> PathBuf {
    let name = mount_point.file_name().unwrap_or_default();
    if category.is_empty() {
        sidecar_root.join(name)
    } else {
        sidecar_root.join(category).join(name)
    }
}

/// First word of a desktop `Exec` as the executable, the rest (minus field
/// codes) as arguments.
fn split_exec(exec: &str) -> (String, String) {
    let mut words = exec.split_whitespace().filter(|s| !s.starts_with('%'));
    let program = words.next().unwrap_or_default().to_string();
    let args = words.collect::<Vec<_>>().join(" ");
    (program, args)
}

/// Builds an archive link from its metadata, then layers its sidecar on top.
pub fn load_opk(
    archive: &Path,
    metadata: &dyn PackageMetadata,
    config: &Config,
    skin: &dyn Skin,
) -> (Link, Vec<LinkWarning>) {
    let mut warnings = Vec::new();
    let mut fields = LinkFields::default();
    let mount_point = mount_point_for(archive, &config.paths.mount_root);

    let category = match metadata.param("Categories") {
        Some(c) => c.split(';').next().unwrap_or_default().to_string(),
        None => {
            warnings.push(LinkWarning::MissingParam("Categories"));
            String::new()
        }
    };

    match metadata.param("Name") {
        Some(name) => fields.title = name.to_string(),
        None => warnings.push(LinkWarning::MissingParam("Name")),
    }

    if let Some(comment) = metadata.param("Comment") {
        fields.description = comment.to_string();
    }

    // The skin may ship its own icon for the package
    if let Some(icon) = metadata.param("Icon") {
        let file = format!("{}.png", icon);
        fields.icon = match skin.file_path(&format!("icons/{}", file)) {
            Some(p) => p.to_string_lossy().into_owned(),
            None => format!("{}{}{}", archive.display(), ARCHIVE_SEPARATOR, file),
        };
        fields.icon_path = fields.icon.clone();
    }

    match metadata.param("Exec") {
        Some(exec) => {
            let (program, args) = split_exec(exec);
            fields.exec = program;
            fields.params = args;
        }
        None => warnings.push(LinkWarning::MissingParam("Exec")),
    }

    if cfg!(feature = "dingux") {
        if let Some(terminal) = metadata.param("Terminal") {
            fields.console_app = terminal == "true";
        }
    }

    if let Some(manual) = metadata.param("X-OD-Manual") {
        fields.manual = manual.to_string();
    }

    if let Some(daemon) = metadata.param("X-OD-Daemon") {
        fields.dont_leave = daemon == "true";
    }

    let file = sidecar_path(&config.sidecar_dir(), &category, &mount_point);
    warnings.extend(read_link_file(&file, &mut fields, true, skin));
    log_warnings(archive, &warnings);

    if fields.icon_path.is_empty() {
        fields.icon_path = IconResolver::new(skin).search(&fields.exec);
    }

    let source = LinkSource::PackageArchive {
        archive: archive.to_path_buf(),
        mount_point,
        category,
    };
    (Link::new(file, source, fields), warnings)
}

/// Opens the archive at `archive` and loads it as a link.
pub fn load_opk_file(
    archive: &Path,
    config: &Config,
    skin: &dyn Skin,
) -> Result<(Link, Vec<LinkWarning>), OpkError> {
    let metadata = OpkArchive::open(archive).read_metadata(&config.opk.platform)?;
    info!("Loaded package {}", archive.display());
    Ok(load_opk(archive, &metadata, config, skin))
}
