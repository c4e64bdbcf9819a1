//! The `key=value` link descriptor: parsing, the shared key table, and
//! writing it back.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use log::{debug, error, warn};

use crate::error::LinkWarning;
use crate::icons::{IconResolver, Skin};
use crate::model::{DEFAULT_CLOCK, Link, LinkFields, LinkSource, normalize_selector_dir};

/// Keys an archive's metadata owns; a sidecar can't override them.
pub const ARCHIVE_OWNED_KEYS: &[&str] = &[
    "title",
    "description",
    "icon",
    "exec",
    "params",
    "manual",
    "dontleave",
    "consoleapp",
    "editable",
];

fn parse_clock(value: &str) -> Result<u32, LinkWarning> {
    value.parse().map_err(|_| LinkWarning::InvalidClock(value.to_string()))
}

/// Applies one setting to `fields`. `sidecar` restricts the accepted keys to
/// those an archive's sidecar may override.
pub fn apply_setting(
    fields: &mut LinkFields,
    key: &str,
    value: &str,
    sidecar: bool,
    skin: &dyn Skin,
) -> Result<(), LinkWarning> {
    match key {
        "clock" => fields.clock = parse_clock(value)?,
        "selectordir" => fields.selector_dir = normalize_selector_dir(value),
        "selectorbrowser" => fields.selector_browser = value == "true",
        "selectorscreens" => fields.selector_screens = value.to_string(),
        "selectoraliases" => {
            if !Path::new(value).exists() {
                return Err(LinkWarning::MissingAliasFile(value.to_string()));
            }
            fields.alias_file = value.to_string();
        }
        "selectorfilter" => fields.selector_filter = value.to_string(),
        _ if sidecar && ARCHIVE_OWNED_KEYS.contains(&key) => {
            return Err(LinkWarning::ArchiveOwnedKey(key.to_string()));
        }
        "title" => fields.title = value.to_string(),
        "description" => fields.description = value.to_string(),
        "icon" => {
            fields.icon = value.to_string();
            fields.icon_path = IconResolver::new(skin).explicit(value).unwrap_or_default();
        }
        "exec" => fields.exec = value.to_string(),
        "params" => fields.params = value.to_string(),
        "manual" => fields.manual = value.to_string(),
        "dontleave" => fields.dont_leave = value == "true",
        "consoleapp" if cfg!(feature = "dingux") => fields.console_app = value == "true",
        "editable" => fields.editable = value != "false",
        _ => return Err(LinkWarning::UnrecognizedKey(key.to_string())),
    }
    Ok(())
}

/// Parses descriptor text into `fields`, line by line. Bad lines are
/// reported and skipped.
pub fn parse_link_text(
    text: &str,
    fields: &mut LinkFields,
    sidecar: bool,
    skin: &dyn Skin,
) -> Vec<LinkWarning> {
    let mut warnings = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') { continue; }

        let Some((key, value)) = line.split_once('=') else {
            warnings.push(LinkWarning::MalformedLine(line.to_string()));
            continue;
        };

        if let Err(w) = apply_setting(fields, key.trim(), value.trim(), sidecar, skin) {
            warnings.push(w);
        }
    }

    warnings
}

/// Reads `path` into `fields`. A missing file is reported, not fatal.
pub(crate) fn read_link_file(
    path: &Path,
    fields: &mut LinkFields,
    sidecar: bool,
    skin: &dyn Skin,
) -> Vec<LinkWarning> {
    match fs::read_to_string(path) {
        Ok(text) => parse_link_text(&text, fields, sidecar, skin),
        Err(e) if sidecar && e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => vec![LinkWarning::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }],
    }
}

pub(crate) fn log_warnings(path: &Path, warnings: &[LinkWarning]) {
    for w in warnings {
        match w {
            LinkWarning::MissingAliasFile(_) => debug!("{}: {}", path.display(), w),
            _ => warn!("{}: {}", path.display(), w),
        }
    }
}

/// Loads a plain descriptor file.
pub fn load_link_file(path: &Path, skin: &dyn Skin) -> (Link, Vec<LinkWarning>) {
    let mut fields = LinkFields::default();
    let warnings = read_link_file(path, &mut fields, false, skin);
    log_warnings(path, &warnings);

    if fields.icon_path.is_empty() {
        fields.icon_path = IconResolver::new(skin).search(&fields.exec);
    }

    (Link::new(PathBuf::from(path), LinkSource::ConfigFile, fields), warnings)
}

/// Renders the fields a link's file owns, skipping empty and default values.
pub fn render(link: &Link) -> String {
    let f = link.fields();
    let mut out = String::new();
    let mut put = |key: &str, value: &str| {
        if !value.is_empty() {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
    };

    if !link.is_archive() {
        put("title", &f.title);
        put("description", &f.description);
        put("icon", &f.icon);
        put("exec", &f.exec);
        put("params", &f.params);
        put("manual", &f.manual);
        if f.dont_leave { put("dontleave", "true"); }
        if cfg!(feature = "dingux") && f.console_app { put("consoleapp", "true"); }
        if !f.editable { put("editable", "false"); }
    }
    if f.clock != DEFAULT_CLOCK { put("clock", &f.clock.to_string()); }
    put("selectorfilter", &f.selector_filter);
    put("selectordir", &f.selector_dir);
    if f.selector_browser { put("selectorbrowser", "true"); }
    put("selectorscreens", &f.selector_screens);
    put("selectoraliases", &f.alias_file);

    out
}

fn write_link_file(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

impl Link {
    /// Writes the link back if it was edited. Returns whether it wrote.
    pub fn save(&mut self) -> bool {
        if !self.is_dirty() {
            return false;
        }

        match write_link_file(self.file(), &render(self)) {
            Ok(()) => {
                debug!("Saved link {}", self.file().display());
                self.mark_saved();
                true
            }
            Err(e) => {
                error!("Error while opening the file '{}' for write: {}", self.file().display(), e);
                false
            }
        }
    }

    /// String-keyed edit using the descriptor's key names.
    pub fn set(&mut self, key: &str, value: &str, skin: &dyn Skin) -> Result<(), LinkWarning> {
        if self.is_archive() && ARCHIVE_OWNED_KEYS.contains(&key) {
            return Err(LinkWarning::ArchiveOwnedKey(key.to_string()));
        }

        match key {
            "clock" => self.set_clock(parse_clock(value)?),
            "selectordir" => self.set_selector_dir(value),
            "selectorbrowser" => self.set_selector_browser(value == "true"),
            "selectorscreens" => self.set_selector_screens(value),
            "selectoraliases" => {
                if !self.set_alias_file(value) {
                    return Err(LinkWarning::MissingAliasFile(value.to_string()));
                }
            }
            "selectorfilter" => self.set_selector_filter(value),
            "title" => self.set_title(value),
            "description" => self.set_description(value),
            "icon" => self.set_icon(value, skin),
            "exec" => self.set_exec(value),
            "params" => self.set_params(value),
            "manual" => self.set_manual(value),
            "dontleave" => self.set_dont_leave(value == "true"),
            "consoleapp" if cfg!(feature = "dingux") => self.set_console_app(value == "true"),
            "editable" => self.set_editable(value != "false"),
            _ => return Err(LinkWarning::UnrecognizedKey(key.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icons::tests::FakeSkin;
    use crate::icons::GENERIC_ICON;

    const SAMPLE: &str = "\
# Emulator link
title = Game Boy
description=Portable classic
exec=/usr/games/gambatte.dge
params=-rom [selFullPath]
manual=/usr/share/gambatte/readme.txt
dontleave=true
clock=400
selectordir=/cards/gb//
selectorbrowser=true
selectorfilter=.gb,.gbc
selectorscreens=/cards/gb/screens
editable=false

";

    fn skin() -> FakeSkin {
        FakeSkin::with(&[GENERIC_ICON, "icons/gambatte.png"])
    }

    #[test]
    fn parses_known_keys() {
        let mut fields = LinkFields::default();
        let warnings = parse_link_text(SAMPLE, &mut fields, false, &skin());

        assert!(warnings.is_empty(), "{:?}", warnings);
        assert_eq!(fields.title, "Game Boy");
        assert_eq!(fields.description, "Portable classic");
        assert_eq!(fields.exec, "/usr/games/gambatte.dge");
        assert_eq!(fields.params, "-rom [selFullPath]");
        assert!(fields.dont_leave);
        assert_eq!(fields.clock, 400);
        assert_eq!(fields.selector_dir, "/cards/gb/");
        assert!(fields.selector_browser);
        assert_eq!(fields.selector_filter, ".gb,.gbc");
        assert!(!fields.editable);
    }

    #[test]
    fn bad_lines_do_not_stop_parsing() {
        let text = "nonsense\ncolour=blue\nclock=fast\ntitle=Still here\nselectoraliases=/no/such/file\n";
        let mut fields = LinkFields::default();
        let warnings = parse_link_text(text, &mut fields, false, &skin());

        assert_eq!(
            warnings,
            vec![
                LinkWarning::MalformedLine("nonsense".to_string()),
                LinkWarning::UnrecognizedKey("colour".to_string()),
                LinkWarning::InvalidClock("fast".to_string()),
                LinkWarning::MissingAliasFile("/no/such/file".to_string()),
            ]
        );
        assert_eq!(fields.title, "Still here");
        assert_eq!(fields.clock, DEFAULT_CLOCK);
        assert!(fields.alias_file.is_empty());
    }

    #[test]
    fn value_keeps_everything_after_first_equals() {
        let mut fields = LinkFields::default();
        parse_link_text("params= --opt=a=b ", &mut fields, false, &skin());
        assert_eq!(fields.params, "--opt=a=b");
    }

    #[test]
    fn keys_are_case_sensitive() {
        let mut fields = LinkFields::default();
        let warnings = parse_link_text("Title=Nope", &mut fields, false, &skin());
        assert_eq!(warnings, vec![LinkWarning::UnrecognizedKey("Title".to_string())]);
        assert!(fields.title.is_empty());
    }

    #[test]
    fn sidecar_ignores_archive_owned_keys() {
        let text = "title=Hijack\nexec=/bin/evil\nclock=200\nselectordir=/roms\nselectorfilter=.zip\n";
        let mut fields = LinkFields::default();
        let warnings = parse_link_text(text, &mut fields, true, &skin());

        assert_eq!(
            warnings,
            vec![
                LinkWarning::ArchiveOwnedKey("title".to_string()),
                LinkWarning::ArchiveOwnedKey("exec".to_string()),
            ]
        );
        assert!(fields.title.is_empty());
        assert!(fields.exec.is_empty());
        assert_eq!(fields.clock, 200);
        assert_eq!(fields.selector_dir, "/roms/");
        assert_eq!(fields.selector_filter, ".zip");
    }

    #[cfg(not(feature = "dingux"))]
    #[test]
    fn consoleapp_needs_platform_support() {
        let mut fields = LinkFields::default();
        let warnings = parse_link_text("consoleapp=true", &mut fields, false, &skin());
        assert_eq!(warnings, vec![LinkWarning::UnrecognizedKey("consoleapp".to_string())]);
        assert!(!fields.console_app);
    }

    #[cfg(feature = "dingux")]
    #[test]
    fn consoleapp_on_platform() {
        let mut fields = LinkFields::default();
        assert!(parse_link_text("consoleapp=true", &mut fields, false, &skin()).is_empty());
        assert!(fields.console_app);
    }

    #[test]
    fn load_resolves_icon_and_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gambatte");
        fs::write(&path, SAMPLE).unwrap();

        let (link, warnings) = load_link_file(&path, &skin());
        assert!(warnings.is_empty());
        assert!(!link.is_dirty());
        assert_eq!(link.icon_path(), "/skin/icons/gambatte.png");
        assert_eq!(link.source(), &LinkSource::ConfigFile);
    }

    #[test]
    fn missing_descriptor_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (link, warnings) = load_link_file(&dir.path().join("gone"), &skin());
        assert!(matches!(warnings.as_slice(), [LinkWarning::Unreadable { .. }]));
        assert_eq!(link.icon_path(), "/skin/icons/generic.png");
    }

    #[test]
    fn parse_render_parse_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gambatte");
        fs::write(&path, SAMPLE).unwrap();

        let (mut link, _) = load_link_file(&path, &skin());
        link.set_title("Game Boy");
        assert!(link.save());

        let (again, warnings) = load_link_file(&path, &skin());
        assert!(warnings.is_empty());
        assert_eq!(again.fields(), link.fields());
    }

    #[test]
    fn render_skips_defaults() {
        let link = Link::new(PathBuf::from("/x"), LinkSource::ConfigFile, LinkFields::default());
        assert_eq!(render(&link), "");

        let mut fields = LinkFields::default();
        fields.exec = "/a/b".to_string();
        fields.clock = 200;
        let link = Link::new(PathBuf::from("/x"), LinkSource::ConfigFile, fields);
        assert_eq!(render(&link), "exec=/a/b\nclock=200\n");
    }

    #[test]
    fn archive_render_writes_only_secondary_fields() {
        let mut fields = LinkFields::default();
        parse_link_text(SAMPLE, &mut fields, false, &skin());
        let link = Link::new(
            PathBuf::from("/h/opk/games/gambatte"),
            LinkSource::PackageArchive {
                archive: PathBuf::from("/apps/gambatte.opk"),
                mount_point: PathBuf::from("/mnt/gambatte/"),
                category: "games".to_string(),
            },
            fields,
        );

        let text = render(&link);
        for key in ["title=", "exec=", "params=", "manual=", "dontleave=", "description=", "icon=", "editable="] {
            assert!(!text.contains(key), "{} leaked into {:?}", key, text);
        }
        assert_eq!(
            text,
            "clock=400\nselectorfilter=.gb,.gbc\nselectordir=/cards/gb/\nselectorbrowser=true\nselectorscreens=/cards/gb/screens\n"
        );
    }

    #[test]
    fn clean_link_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never");
        let mut link = Link::new(path.clone(), LinkSource::ConfigFile, LinkFields::default());

        assert!(!link.save());
        assert!(!path.exists());
    }

    #[test]
    fn save_creates_sidecar_dir_and_clears_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opk/games/foo");
        let mut link = Link::new(path.clone(), LinkSource::ConfigFile, LinkFields::default());
        link.set_clock(500);

        assert!(link.save());
        assert!(!link.is_dirty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "clock=500\n");
        assert!(!link.save());
    }

    #[test]
    fn unwritable_destination_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();
        let mut link = Link::new(blocker.join("child"), LinkSource::ConfigFile, LinkFields::default());
        link.set_clock(500);

        assert!(!link.save());
        assert!(link.is_dirty());
    }

    #[test]
    fn keyed_set_marks_dirty_and_respects_sidecar() {
        let mut link = Link::new(
            PathBuf::from("/h/opk/games/foo"),
            LinkSource::PackageArchive {
                archive: PathBuf::from("/apps/foo.opk"),
                mount_point: PathBuf::from("/mnt/foo/"),
                category: "games".to_string(),
            },
            LinkFields::default(),
        );

        assert_eq!(
            link.set("exec", "/bin/sh", &skin()),
            Err(LinkWarning::ArchiveOwnedKey("exec".to_string()))
        );
        assert!(!link.is_dirty());

        link.set("selectordir", "/roms", &skin()).unwrap();
        assert!(link.is_dirty());
        assert_eq!(link.selector_dir(), "/roms/");
    }

    #[test]
    fn keyed_set_goes_through_typed_setters() {
        let mut link = Link::new(PathBuf::from("/x"), LinkSource::ConfigFile, LinkFields::default());

        link.set("exec", "/usr/games/gambatte.dge", &skin()).unwrap();
        link.set("icon", "", &skin()).unwrap();
        link.set("editable", "false", &skin()).unwrap();
        assert_eq!(
            link.set("clock", "fast", &skin()),
            Err(LinkWarning::InvalidClock("fast".to_string()))
        );
        assert_eq!(
            link.set("selectoraliases", "/no/such/aliases", &skin()),
            Err(LinkWarning::MissingAliasFile("/no/such/aliases".to_string()))
        );

        assert_eq!(link.exec(), "/usr/games/gambatte.dge");
        assert_eq!(link.icon_path(), "/skin/icons/gambatte.png");
        assert_eq!(link.clock(), DEFAULT_CLOCK);
        assert!(link.alias_file().is_empty());
        assert!(!link.is_editable());
        assert!(link.is_dirty());
    }
}
