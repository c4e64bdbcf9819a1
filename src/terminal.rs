use std::convert::Infallible;
use std::fs::{self, OpenOptions};
use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::Command;
use log::{debug, warn};
use nix::libc;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::unistd::{close, dup2, getpgrp, setsid, tcsetpgrp};

use crate::error::HandoffError;

/// The terminal we were started on, reached through stdout.
const TTY: RawFd = libc::STDOUT_FILENO;

const FBCON_BIND: &str = "/sys/devices/virtual/vtconsole/vtcon1/bind";
const TTY1: &str = "/dev/tty1";
const VT_ACTIVATE: libc::c_ulong = 0x5606;

nix::ioctl_write_int_bad!(tiocsctty, libc::TIOCSCTTY);
nix::ioctl_write_int_bad!(vt_activate, VT_ACTIVATE);

/// Makes the terminal on stdout ours and replaces this process with
/// `/bin/sh -c <command>`.
///
/// Runs strictly in this order, each step relying on the one before:
///
/// 1. `setsid`: become a session leader without a controlling terminal
///    (fails harmlessly if we already lead a process group);
/// 2. `TIOCSCTTY` on the tty: it becomes the session's controlling terminal,
///    taken from any previous session;
/// 3. stdin, stdout and stderr are all duplicated from the tty;
/// 4. a tty handle above 2 is closed so the child doesn't inherit it;
/// 5. our process group is made the tty's foreground group with `SIGTTOU`
///    ignored, otherwise the call would stop us;
/// 6. console apps on the framebuffer platform get fbcon bound and tty1
///    activated;
/// 7. exec.
///
/// Steps 1-6 only warn on failure. The display is already gone when this is
/// called, so an `Err` means the caller has nothing to return to.
pub fn exec_in_foreground(command: &str, framebuffer_console: bool) -> Result<Infallible, HandoffError> {
    if let Err(e) = setsid() {
        debug!("setsid: {}", e);
    }

    // SAFETY: TIOCSCTTY takes an int argument; 1 steals the tty if needed.
    if let Err(e) = unsafe { tiocsctty(TTY, 1) } {
        warn!("Unable to acquire controlling terminal: {}", e);
    }

    for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        if let Err(e) = dup2(TTY, fd) {
            warn!("dup2({}, {}): {}", TTY, fd, e);
        }
    }
    if TTY > libc::STDERR_FILENO {
        let _ = close(TTY);
    }

    // SAFETY: SigIgn installs no handler code.
    let previous = unsafe { signal(Signal::SIGTTOU, SigHandler::SigIgn) };
    // stdout is the tty after the dup2 above
    if let Err(e) = tcsetpgrp(io::stdout().as_fd(), getpgrp()) {
        warn!("Unable to become the terminal's foreground group: {}", e);
    }
    match previous {
        Ok(handler) => {
            // SAFETY: restores the disposition replaced above.
            let _ = unsafe { signal(Signal::SIGTTOU, handler) };
        }
        Err(e) => warn!("Unable to ignore SIGTTOU: {}", e),
    }

    if cfg!(feature = "dingux") && framebuffer_console {
        enable_framebuffer_console();
    }

    let err = Command::new("/bin/sh").arg("-c").arg(command).exec();
    Err(HandoffError::Exec(err))
}

fn enable_framebuffer_console() {
    if let Err(e) = fs::write(FBCON_BIND, b"1") {
        warn!("Unable to open fbcon handle: {}", e);
    }

    match OpenOptions::new().read(true).write(true).open(TTY1) {
        Ok(tty) => {
            // SAFETY: VT_ACTIVATE takes the VT number as its int argument.
            if let Err(e) = unsafe { vt_activate(tty.as_raw_fd(), 1) } {
                warn!("Unable to activate tty1: {}", e);
            }
        }
        Err(e) => warn!("Unable to open tty1 handle: {}", e),
    }
}
