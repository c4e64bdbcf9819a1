//! Selection placeholders in a link's argument string and the shell quoting
//! shared with command assembly.

use std::path::Path;

pub const SEL_FULL_PATH: &str = "[selFullPath]";
pub const SEL_PATH: &str = "[selPath]";
pub const SEL_FILE: &str = "[selFile]";
pub const SEL_EXT: &str = "[selExt]";

const SHELL_SPECIAL: &str = "\\`$();|{}&'\"*?<>[]!^~-#\r\t ";

/// Backslash-quotes every character `/bin/sh` would treat specially, so the
/// value stays one word.
pub fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\n' {
            // a backslash-newline is a line continuation
            escaped.push_str("'\n'");
        } else {
            if SHELL_SPECIAL.contains(c) {
                escaped.push('\\');
            }
            escaped.push(c);
        }
    }
    escaped
}

/// A file picked in the selector, optionally with the directory it was
/// picked from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub file: String,
    pub dir: Option<String>,
}

impl Selection {
    pub fn new(file: impl Into<String>, dir: Option<String>) -> Self {
        Self { file: file.into(), dir }
    }
}

/// Rewrites `params` for one launch of `selection`.
///
/// An empty argument string becomes the selected path. Otherwise each
/// placeholder is replaced literally; if none occurred the selected path is
/// appended.
pub fn apply_selection(params: &str, selection: &Selection, selector_dir: &str) -> String {
    let mut dir = selection
        .dir
        .clone()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| selector_dir.to_string());
    if dir.is_empty() && selection.file.starts_with('/') {
        if let Some(parent) = Path::new(&selection.file).parent() {
            dir = parent.to_string_lossy().into_owned();
        }
    }
    if !dir.is_empty() && !dir.ends_with('/') {
        dir.push('/');
    }

    let full_path = if selection.file.starts_with('/') {
        selection.file.clone()
    } else {
        format!("{}{}", dir, selection.file)
    };

    let base = Path::new(&selection.file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = match base.rfind('.') {
        Some(i) => (&base[..i], &base[i..]),
        None => (base.as_str(), ""),
    };

    let escaped_full = shell_escape(&full_path);
    if params.is_empty() {
        return escaped_full;
    }

    let substituted = params
        .replace(SEL_FULL_PATH, &escaped_full)
        .replace(SEL_PATH, &shell_escape(&dir))
        .replace(SEL_FILE, &shell_escape(stem))
        .replace(SEL_EXT, &shell_escape(ext));

    if substituted == params {
        format!("{} {}", params, escaped_full)
    } else {
        substituted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(file: &str) -> Selection {
        Selection::new(file, None)
    }

    #[test]
    fn empty_params_become_selected_path() {
        assert_eq!(apply_selection("", &sel("/cards/game.zip"), ""), "/cards/game.zip");
    }

    #[test]
    fn full_path_placeholder() {
        assert_eq!(
            apply_selection("-rom [selFullPath]", &sel("/cards/game.zip"), ""),
            "-rom /cards/game.zip"
        );
    }

    #[test]
    fn no_placeholder_appends() {
        assert_eq!(apply_selection("-f", &sel("/cards/game.zip"), ""), "-f /cards/game.zip");
    }

    #[test]
    fn all_placeholders_from_selector_dir() {
        let got = apply_selection(
            "--dir [selPath] --name [selFile] --ext [selExt] [selFullPath]",
            &sel("my game.gba"),
            "/roms/gba/",
        );
        assert_eq!(
            got,
            "--dir /roms/gba/ --name my\\ game --ext .gba /roms/gba/my\\ game.gba"
        );
    }

    #[test]
    fn explicit_dir_overrides_selector_dir() {
        let selection = Selection::new("a.nes", Some("/media/nes".to_string()));
        assert_eq!(apply_selection("", &selection, "/roms/"), "/media/nes/a.nes");
    }

    #[test]
    fn file_without_extension() {
        let got = apply_selection("[selFile]|[selExt]", &sel("README"), "/d/");
        assert_eq!(got, "README|");
    }

    #[test]
    fn spaces_and_metacharacters_stay_one_word() {
        assert_eq!(shell_escape("/cards/my game.zip"), "/cards/my\\ game.zip");
        assert_eq!(shell_escape("a;rm -rf $(x)"), "a\\;rm\\ \\-rf\\ \\$\\(x\\)");
        assert_eq!(shell_escape("it's"), "it\\'s");
        assert_eq!(shell_escape("a\nb"), "a'\n'b");
    }

    #[test]
    fn placeholder_text_in_value_is_not_expanded_again() {
        let got = apply_selection("[selFile] [selExt]", &sel("[selExt].x"), "/d/");
        assert_eq!(got, "\\[selExt\\] .x");
    }
}
