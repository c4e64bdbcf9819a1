use std::env;
use std::fs::{self, DirBuilder, Permissions};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use log::{debug, error, info, warn};

use crate::config::Config;
use crate::error::LaunchError;
use crate::host::Host;
use crate::model::{Link, LinkSource};
use crate::params::{Selection, apply_selection, shell_escape};
use crate::terminal;

/// Loop mounts of package archives.
pub trait Mounter {
    /// Best-effort removal of a stale mount.
    fn force_unmount(&self, mount_point: &Path);
    fn mount_read_only(&self, archive: &Path, mount_point: &Path) -> Result<(), String>;
}

/// Mounts through the system `mount`/`umount` tools.
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn force_unmount(&self, mount_point: &Path) {
        match Command::new("umount").arg("-f").arg(mount_point).output() {
            Ok(output) if !output.status.success() => {
                debug!("umount -f {}: {}", mount_point.display(), String::from_utf8_lossy(&output.stderr).trim());
            }
            Ok(_) => debug!("Unmounted stale {}", mount_point.display()),
            Err(e) => warn!("Unable to run umount: {}", e),
        }
    }

    fn mount_read_only(&self, archive: &Path, mount_point: &Path) -> Result<(), String> {
        let output = Command::new("mount")
            .args(["-o", "loop,nosuid,ro"])
            .arg(archive)
            .arg(mount_point)
            .output()
            .map_err(|e| e.to_string())?;

        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

/// What's left to do once a link is ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub work_dir: Option<PathBuf>,
    pub command: String,
}

fn mount_archive(archive: &Path, mount_point: &Path, mounter: &dyn Mounter) -> Result<(), LaunchError> {
    if !archive.is_file() {
        return Err(LaunchError::MissingArchive(archive.to_path_buf()));
    }

    mounter.force_unmount(mount_point);

    let mount_error = |reason: String| LaunchError::Mount {
        archive: archive.to_path_buf(),
        mount_point: mount_point.to_path_buf(),
        reason,
    };

    DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(mount_point)
        .map_err(|e| mount_error(e.to_string()))?;

    mounter.mount_read_only(archive, mount_point).map_err(mount_error)
}

/// A reference `/bin/sh` resolves against the working directory rather
/// than `$PATH`.
fn local_command(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("./{}", name)
    }
}

/// Working directory and the exec reference relative to it.
fn split_work_dir(exec: &str) -> (Option<PathBuf>, String) {
    match exec.rfind('/') {
        Some(pos) => (
            Some(PathBuf::from(&exec[..=pos])),
            local_command(&exec[pos + 1..]),
        ),
        None => (None, exec.to_string()),
    }
}

/// Sets owner read and execute on `path` if it exists and lacks them.
fn ensure_owner_rx(path: &Path) -> Result<(), LaunchError> {
    let Ok(meta) = fs::metadata(path) else {
        return Ok(());
    };

    let mode = meta.permissions().mode() & 0o7777;
    let wanted = mode | 0o500;
    if wanted != mode {
        debug!("chmod {:o} {}", wanted, path.display());
        fs::set_permissions(path, Permissions::from_mode(wanted)).map_err(|source| {
            LaunchError::Permissions {
                path: path.to_path_buf(),
                source,
            }
        })?;
    }
    Ok(())
}

/// The single shell command line a launch runs.
pub fn assemble_command(
    exec: &str,
    params: &str,
    log_file: Option<&Path>,
    unmount: Option<&Path>,
) -> String {
    let mut command = shell_escape(exec);
    if !params.is_empty() {
        command.push(' ');
        command.push_str(params);
    }
    if let Some(log) = log_file {
        command.push_str(&format!(" > {} 2>&1", shell_escape(&log.to_string_lossy())));
    }
    if let Some(mount_point) = unmount {
        command.push_str(&format!(" ; umount -l {}", shell_escape(&mount_point.to_string_lossy())));
    }
    command
}

/// Mounts, templates, fixes permissions and builds the command. Nothing
/// here is irreversible apart from the mount, and `link` itself is left as
/// loaded.
pub fn prepare(
    link: &Link,
    selection: Option<&Selection>,
    config: &Config,
    mounter: &dyn Mounter,
) -> Result<LaunchPlan, LaunchError> {
    let (work_dir, exec, unmount) = match link.source() {
        LinkSource::PackageArchive { archive, mount_point, .. } => {
            mount_archive(archive, mount_point, mounter).inspect_err(|e| error!("{}", e))?;
            (Some(mount_point.clone()), local_command(link.exec()), Some(mount_point.clone()))
        }
        LinkSource::ConfigFile => {
            let (work_dir, exec) = split_work_dir(link.exec());
            (work_dir, exec, None)
        }
    };

    let params = match selection.filter(|sel| !sel.file.is_empty()) {
        Some(sel) => apply_selection(link.params(), sel, link.selector_dir()),
        None => link.params().to_string(),
    };

    info!("Executing '{}' ({} {})", link.title(), exec, params);

    let target = match &work_dir {
        Some(dir) => dir.join(&exec),
        None => PathBuf::from(&exec),
    };
    ensure_owner_rx(&target).inspect_err(|e| error!("{}", e))?;

    let log_file = config.log_file();
    let log_file = (config.general.output_logs && !link.console_app()).then_some(log_file.as_path());

    let command = assemble_command(&exec, &params, log_file, unmount.as_deref());
    Ok(LaunchPlan { work_dir, command })
}

/// Runs `link`.
///
/// With `dontleave` the command runs as a child and its status is returned.
/// Otherwise the terminal is handed over and the process image replaced; if
/// that fails the host's main loop is restarted, so this never returns.
pub fn launch(
    link: &mut Link,
    selection: Option<&Selection>,
    config: &Config,
    host: &mut dyn Host,
    mounter: &dyn Mounter,
) -> Result<ExitStatus, LaunchError> {
    host.show_launching(link);
    link.save();

    let plan = prepare(link, selection, config, mounter)?;

    if let Some(dir) = &plan.work_dir {
        env::set_current_dir(dir)
            .map_err(|source| LaunchError::WorkDir {
                path: dir.clone(),
                source,
            })
            .inspect_err(|e| error!("{}", e))?;
    }

    if link.dont_leave() {
        let status = Command::new("/bin/sh")
            .arg("-c")
            .arg(&plan.command)
            .status()
            .map_err(|source| LaunchError::Spawn {
                command: plan.command.clone(),
                source,
            })
            .inspect_err(|e| error!("{}", e))?;
        debug!("'{}' exited with {}", link.title(), status);
        return Ok(status);
    }

    hand_over(link, selection, config, host, &plan.command)
}

fn hand_over(
    link: &Link,
    selection: Option<&Selection>,
    config: &Config,
    host: &mut dyn Host,
    command: &str,
) -> ! {
    if config.general.save_selection && host.selection_changed() {
        host.write_config();
    }
    host.write_tmp(selection);

    if link.clock() != host.menu_clock() {
        host.set_clock(link.clock());
    }
    host.quit();

    let err = match terminal::exec_in_foreground(command, link.console_app()) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    error!("{}", err);
    host.restart_main_loop()
}
