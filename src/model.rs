use std::path::{Path, PathBuf};

use crate::icons::{IconResolver, Skin};

/// Clock a link runs at unless it says otherwise.
pub const DEFAULT_CLOCK: u32 = 336;

/// Where a link's primary fields come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSource {
    /// Plain key=value descriptor; the file owns every field.
    ConfigFile,
    /// Package archive; its metadata owns the primary fields and the link
    /// file is only a sidecar holding clock and selector overrides.
    PackageArchive {
        archive: PathBuf,
        mount_point: PathBuf,
        category: String,
    },
}

/// Plain field storage, filled by the parser or the archive adapter before a
/// [`Link`] exists. Writing here never marks anything dirty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFields {
    pub title: String,
    pub description: String,
    /// Icon as configured (`skin:` name, path or archive locator)
    pub icon: String,
    /// Icon as resolved for display
    pub icon_path: String,
    pub clock: u32,
    pub exec: String,
    pub params: String,
    pub manual: String,
    pub dont_leave: bool,
    pub console_app: bool,
    pub selector_dir: String,
    pub selector_filter: String,
    pub selector_screens: String,
    pub alias_file: String,
    pub selector_browser: bool,
    pub editable: bool,
}

impl Default for LinkFields {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            icon: String::new(),
            icon_path: String::new(),
            clock: DEFAULT_CLOCK,
            exec: String::new(),
            params: String::new(),
            manual: String::new(),
            dont_leave: false,
            console_app: false,
            selector_dir: String::new(),
            selector_filter: String::new(),
            selector_screens: String::new(),
            alias_file: String::new(),
            selector_browser: false,
            editable: true,
        }
    }
}

/// One launchable entry of the menu.
#[derive(Debug, Clone)]
pub struct Link {
    file: PathBuf,
    source: LinkSource,
    fields: LinkFields,
    dirty: bool,
}

impl Link {
    /// Wraps freshly loaded fields. The result is never dirty.
    pub fn new(file: PathBuf, source: LinkSource, fields: LinkFields) -> Self {
        Self {
            file,
            source,
            fields,
            dirty: false,
        }
    }

    /// Path of the descriptor (or sidecar) this link persists to.
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn source(&self) -> &LinkSource {
        &self.source
    }

    pub fn fields(&self) -> &LinkFields {
        &self.fields
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_archive(&self) -> bool {
        matches!(self.source, LinkSource::PackageArchive { .. })
    }

    pub fn category(&self) -> Option<&str> {
        match &self.source {
            LinkSource::PackageArchive { category, .. } => Some(category),
            LinkSource::ConfigFile => None,
        }
    }

    /// Archive metadata can't be edited from the menu.
    pub fn is_editable(&self) -> bool {
        self.fields.editable && !self.is_archive()
    }

    pub fn title(&self) -> &str { &self.fields.title }
    pub fn description(&self) -> &str { &self.fields.description }
    pub fn icon(&self) -> &str { &self.fields.icon }
    pub fn icon_path(&self) -> &str { &self.fields.icon_path }
    pub fn clock(&self) -> u32 { self.fields.clock }
    pub fn exec(&self) -> &str { &self.fields.exec }
    pub fn params(&self) -> &str { &self.fields.params }
    pub fn manual(&self) -> &str { &self.fields.manual }
    pub fn dont_leave(&self) -> bool { self.fields.dont_leave }
    pub fn console_app(&self) -> bool { self.fields.console_app }
    pub fn selector_dir(&self) -> &str { &self.fields.selector_dir }
    pub fn selector_filter(&self) -> &str { &self.fields.selector_filter }
    pub fn selector_screens(&self) -> &str { &self.fields.selector_screens }
    pub fn alias_file(&self) -> &str { &self.fields.alias_file }
    pub fn selector_browser(&self) -> bool { self.fields.selector_browser }

    pub fn set_title(&mut self, title: &str) {
        self.fields.title = title.to_string();
        self.dirty = true;
    }

    pub fn set_description(&mut self, description: &str) {
        self.fields.description = description.to_string();
        self.dirty = true;
    }

    pub fn set_icon(&mut self, icon: &str, skin: &dyn Skin) {
        self.fields.icon = icon.to_string();
        self.fields.icon_path = IconResolver::new(skin).resolve(&self.fields);
        self.dirty = true;
    }

    pub fn set_clock(&mut self, mhz: u32) {
        self.fields.clock = mhz;
        self.dirty = true;
    }

    pub fn set_exec(&mut self, exec: &str) {
        self.fields.exec = exec.to_string();
        self.dirty = true;
    }

    pub fn set_params(&mut self, params: &str) {
        self.fields.params = params.to_string();
        self.dirty = true;
    }

    pub fn set_manual(&mut self, manual: &str) {
        self.fields.manual = manual.to_string();
        self.dirty = true;
    }

    pub fn set_dont_leave(&mut self, value: bool) {
        self.fields.dont_leave = value;
        self.dirty = true;
    }

    pub fn set_console_app(&mut self, value: bool) {
        self.fields.console_app = value;
        self.dirty = true;
    }

    pub fn set_selector_dir(&mut self, dir: &str) {
        self.fields.selector_dir = normalize_selector_dir(dir);
        self.dirty = true;
    }

    pub fn set_selector_filter(&mut self, filter: &str) {
        self.fields.selector_filter = filter.to_string();
        self.dirty = true;
    }

    pub fn set_selector_screens(&mut self, screens: &str) {
        self.fields.selector_screens = screens.to_string();
        self.dirty = true;
    }

    pub fn set_selector_browser(&mut self, value: bool) {
        self.fields.selector_browser = value;
        self.dirty = true;
    }

    pub fn set_editable(&mut self, value: bool) {
        self.fields.editable = value;
        self.dirty = true;
    }

    /// Returns false, leaving the link untouched, if `path` doesn't exist.
    pub fn set_alias_file(&mut self, path: &str) -> bool {
        if !Path::new(path).exists() {
            return false;
        }
        self.fields.alias_file = path.to_string();
        self.dirty = true;
        true
    }

    /// Clamps the clock to `max` and renders it for display.
    #[allow(dead_code)]
    pub fn clock_str(&mut self, max: u32) -> String {
        if self.fields.clock > max {
            self.set_clock(max);
        }
        format!("{}MHz", self.fields.clock)
    }

    pub fn target_exists(&self) -> bool {
        !self.fields.exec.is_empty() && Path::new(&self.fields.exec).exists()
    }

    #[allow(dead_code)]
    pub fn rename_file(&mut self, file: PathBuf) {
        self.file = file;
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
    }
}

/// Non-empty directories end in exactly one `/`.
pub fn normalize_selector_dir(dir: &str) -> String {
    if dir.is_empty() {
        return String::new();
    }
    let trimmed = dir.trim_end_matches('/');
    format!("{}/", trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icons::tests::FakeSkin;

    fn link() -> Link {
        Link::new(PathBuf::from("/tmp/link"), LinkSource::ConfigFile, LinkFields::default())
    }

    #[test]
    fn selector_dir_gets_single_trailing_slash() {
        assert_eq!(normalize_selector_dir(""), "");
        assert_eq!(normalize_selector_dir("/roms"), "/roms/");
        assert_eq!(normalize_selector_dir("/roms/"), "/roms/");
        assert_eq!(normalize_selector_dir("/roms///"), "/roms/");
        assert_eq!(normalize_selector_dir("/"), "/");
        assert_eq!(normalize_selector_dir("///"), "/");
    }

    #[test]
    fn new_link_is_clean_and_setters_dirty_it() {
        let mut l = link();
        assert!(!l.is_dirty());
        l.set_selector_dir("/cards//");
        assert!(l.is_dirty());
        assert_eq!(l.selector_dir(), "/cards/");
    }

    #[test]
    fn alias_file_must_exist() {
        let mut l = link();
        assert!(!l.set_alias_file("/definitely/not/here.txt"));
        assert!(!l.is_dirty());

        let f = tempfile::NamedTempFile::new().unwrap();
        let p = f.path().to_str().unwrap();
        assert!(l.set_alias_file(p));
        assert_eq!(l.alias_file(), p);
        assert!(l.is_dirty());
    }

    #[test]
    fn clock_str_clamps() {
        let mut l = link();
        assert_eq!(l.clock_str(400), "336MHz");
        assert!(!l.is_dirty());
        assert_eq!(l.clock_str(200), "200MHz");
        assert_eq!(l.clock(), 200);
        assert!(l.is_dirty());
    }

    #[test]
    fn set_icon_falls_back_to_generic() {
        let skin = FakeSkin::with(&["icons/generic.png"]);
        let mut l = link();
        l.set_icon("/no/such/icon.png", &skin);
        assert_eq!(l.icon(), "/no/such/icon.png");
        assert_eq!(l.icon_path(), "/skin/icons/generic.png");
    }

    #[test]
    fn archive_links_are_not_editable() {
        let l = Link::new(
            PathBuf::from("/h/opk/games/foo"),
            LinkSource::PackageArchive {
                archive: PathBuf::from("/apps/foo.opk"),
                mount_point: PathBuf::from("/mnt/foo/"),
                category: "games".to_string(),
            },
            LinkFields::default(),
        );
        assert!(!l.is_editable());
        assert_eq!(l.category(), Some("games"));
        assert!(link().is_editable());
    }
}
