use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Non-fatal findings while loading a link. The link stays usable; the
/// affected field keeps its default.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkWarning {
    #[error("Unrecognized option: '{0}'")]
    UnrecognizedKey(String),

    #[error("Option '{0}' is owned by the package archive, ignoring")]
    ArchiveOwnedKey(String),

    #[error("Malformed line (no '='): '{0}'")]
    MalformedLine(String),

    #[error("Invalid clock value: '{0}'")]
    InvalidClock(String),

    #[error("Alias file '{0}' does not exist")]
    MissingAliasFile(String),

    #[error("Missing \"{0}\" parameter")]
    MissingParam(&'static str),

    #[error("Unable to read '{path}': {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum OpkError {
    #[error("I/O error while reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{tool}' failed on {path}: {stderr}")]
    Tool {
        tool: &'static str,
        path: PathBuf,
        stderr: String,
    },

    #[error("No metadata file found in {0}")]
    NoMetadata(PathBuf),
}

/// Environment errors: the launch is aborted and the caller keeps running.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Package archive {0} does not exist")]
    MissingArchive(PathBuf),

    #[error("Unable to mount {archive} at {mount_point}: {reason}")]
    Mount {
        archive: PathBuf,
        mount_point: PathBuf,
        reason: String,
    },

    #[error("Unable to enter working directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to fix permissions of {path}: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Returned only when replacing the process image failed after the terminal
/// and display have already been handed over.
#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("exec of /bin/sh failed: {0}")]
    Exec(#[source] io::Error),
}
