use crate::config::Config;
use crate::icons::Skin;
use crate::model::Link;
use crate::sources::Source;
use crate::sources::opk::load_opk_file;
use anyhow::Result;
use std::fs;
use log::{info, debug, warn};

/// Package archives (`*.opk`) found in the configured app directories.
pub struct AppsSource<'a> {
    config: &'a Config,
    skin: &'a dyn Skin,
}

impl<'a> AppsSource<'a> {
    pub fn new(config: &'a Config, skin: &'a dyn Skin) -> Self {
        Self { config, skin }
    }
}

impl Source for AppsSource<'_> {
    fn scan(&self) -> Result<Vec<Link>> {
        let mut links = Vec::new();

        for dir in &self.config.paths.apps {
            if !dir.exists() { continue; }

            debug!("Scanning packages in {:?}", dir);
            let mut archives: Vec<_> = fs::read_dir(dir)?
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("opk"))
                .collect();
            archives.sort();

            for archive in archives {
                match load_opk_file(&archive, self.config, self.skin) {
                    Ok((link, _)) => links.push(link),
                    Err(e) => warn!("Skipping {}: {}", archive.display(), e),
                }
            }
        }

        info!("AppsSource: found {} packages", links.len());
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icons::tests::FakeSkin;
    use std::path::PathBuf;

    #[test]
    fn missing_app_dirs_are_skipped() {
        let mut config = Config::default();
        config.paths.apps = vec![PathBuf::from("/no/apps/here")];
        let skin = FakeSkin::with(&[]);

        assert!(AppsSource::new(&config, &skin).scan().unwrap().is_empty());
    }

    #[test]
    fn non_archives_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), "hi").unwrap();
        let mut config = Config::default();
        config.paths.apps = vec![dir.path().to_path_buf()];
        let skin = FakeSkin::with(&[]);

        assert!(AppsSource::new(&config, &skin).scan().unwrap().is_empty());
    }
}
