use std::fs;
use std::io::{self, Write};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{self, Command};
use log::{debug, error, info, warn};

use crate::config::Config;
use crate::model::Link;
use crate::params::Selection;
use crate::state::{LaunchState, load_state, save_state};

/// The menu a link is launched from.
pub trait Host {
    /// Shows the "launching" indication.
    fn show_launching(&mut self, link: &Link);
    /// Clock the menu idles at.
    fn menu_clock(&self) -> u32;
    fn set_clock(&mut self, mhz: u32);
    /// Whether the current menu selection differs from the saved one.
    fn selection_changed(&self) -> bool;
    /// Persists the menu selection.
    fn write_config(&mut self);
    /// Records what is about to be launched so a restarted menu can return to it.
    fn write_tmp(&mut self, selection: Option<&Selection>);
    /// Tears down display and input.
    fn quit(&mut self);
    /// Starts the menu over after a failed handoff.
    fn restart_main_loop(&mut self) -> !;
}

/// Host for the command line: no display, state kept in small JSON files.
pub struct HeadlessHost<'a> {
    config: &'a Config,
    link: PathBuf,
    archive: bool,
    state_path: Option<PathBuf>,
    tmp_path: PathBuf,
}

impl<'a> HeadlessHost<'a> {
    pub fn new(
        config: &'a Config,
        link: PathBuf,
        archive: bool,
        state_path: Option<PathBuf>,
        tmp_path: PathBuf,
    ) -> Self {
        Self { config, link, archive, state_path, tmp_path }
    }

    fn current(&self) -> LaunchState {
        LaunchState {
            link: Some(self.link.clone()),
            archive: self.archive,
            ..LaunchState::default()
        }
    }
}

impl Host for HeadlessHost<'_> {
    fn show_launching(&mut self, link: &Link) {
        info!("Launching {}", link.title());
    }

    fn menu_clock(&self) -> u32 {
        self.config.general.menu_clock
    }

    fn set_clock(&mut self, mhz: u32) {
        match &self.config.general.clock_control {
            Some(path) => {
                if let Err(e) = fs::write(path, mhz.to_string()) {
                    warn!("Unable to set clock via {}: {}", path.display(), e);
                }
            }
            None => debug!("No clock control configured, ignoring {}MHz", mhz),
        }
    }

    fn selection_changed(&self) -> bool {
        match &self.state_path {
            Some(path) => load_state(path).link.as_ref() != Some(&self.link),
            None => false,
        }
    }

    fn write_config(&mut self) {
        if let Some(path) = &self.state_path {
            if let Err(e) = save_state(path, &self.current()) {
                warn!("Unable to save menu state: {}", e);
            }
        }
    }

    fn write_tmp(&mut self, selection: Option<&Selection>) {
        let mut state = self.current();
        if let Some(sel) = selection {
            state.file = Some(sel.file.clone());
            state.dir = sel.dir.clone();
        }
        if let Err(e) = save_state(&self.tmp_path, &state) {
            warn!("Unable to write {}: {}", self.tmp_path.display(), e);
        }
    }

    fn quit(&mut self) {
        log::logger().flush();
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }

    fn restart_main_loop(&mut self) -> ! {
        if let Some(menu) = &self.config.general.restart_command {
            error!("Restarting menu: {}", menu);
            let err = Command::new("/bin/sh").arg("-c").arg(menu).exec();
            error!("Unable to restart menu: {}", err);
        }
        process::exit(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        let tmp = dir.path().join("tmp.json");
        let config = Config::default();
        let link = PathBuf::from("/h/sections/games/gambatte");
        let mut host = HeadlessHost::new(&config, link.clone(), false, Some(state.clone()), tmp.clone());

        assert!(host.selection_changed());
        host.write_config();
        assert!(!host.selection_changed());

        host.write_tmp(Some(&Selection::new("tetris.gb", None)));
        let written = load_state(&tmp);
        assert_eq!(written.link, Some(link));
        assert_eq!(written.file.as_deref(), Some("tetris.gb"));
    }

    #[test]
    fn clock_goes_to_control_file() {
        let dir = tempfile::tempdir().unwrap();
        let control = dir.path().join("cpufreq");
        let mut config = Config::default();
        config.general.clock_control = Some(control.clone());
        let mut host = HeadlessHost::new(&config, PathBuf::from("/l"), false, None, dir.path().join("t"));

        host.set_clock(500);
        assert_eq!(fs::read_to_string(&control).unwrap(), "500");
        assert!(!host.selection_changed());
    }
}
