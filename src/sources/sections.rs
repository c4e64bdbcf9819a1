use crate::icons::Skin;
use crate::model::Link;
use crate::sources::Source;
use crate::sources::linkfile::load_link_file;
use anyhow::Result;
use std::path::PathBuf;
use log::{info, debug};
use walkdir::WalkDir;

/// Plain descriptors laid out as `<sections>/<section>/<link>`.
pub struct SectionSource<'a> {
    dir: PathBuf,
    skin: &'a dyn Skin,
}

impl<'a> SectionSource<'a> {
    pub fn new(dir: PathBuf, skin: &'a dyn Skin) -> Self {
        Self { dir, skin }
    }
}

impl Source for SectionSource<'_> {
    fn scan(&self) -> Result<Vec<Link>> {
        let mut links = Vec::new();

        if !self.dir.exists() {
            debug!("Sections directory {:?} does not exist, skipping", self.dir);
            return Ok(links);
        }

        debug!("Scanning sections in {:?}", self.dir);
        let walker = WalkDir::new(&self.dir)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name();
        for entry in walker.into_iter().flatten() {
            let hidden = entry.file_name().to_str().is_some_and(|n| n.starts_with('.'));
            if hidden || !entry.file_type().is_file() {
                continue;
            }
            let (link, _) = load_link_file(entry.path(), self.skin);
            links.push(link);
        }

        info!("SectionSource: found {} links", links.len());
        Ok(links)
    }
}
