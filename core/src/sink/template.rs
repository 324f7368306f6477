//! Template expansion and filename selection for [`super::FileSink`].
//!
//! Placeholders are replaced against a wall-clock timestamp the same way
//! `hdds-recording`'s `RotationPolicy::generate_filename` formats its
//! timestamp-pattern filenames with `chrono::Local::now().format(...)`,
//! except here the whole template (not just a suffix) is placeholder-driven
//! and rollover indices are discovered from the directory rather than kept
//! in memory, so a restarted sink picks up where a prior run left off.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Timelike};

/// Expands `%Y %m %d %H %M %S %NS` placeholders in `template` against
/// `now`. All fields but `%NS` are zero-padded; `%NS` is the nanosecond
/// component as a plain decimal (no padding).
pub fn expand(template: &str, now: DateTime<Local>) -> String {
    // %NS first: it is a strict superset prefix of no other token, but
    // scanning it before %N-less tokens keeps the replacement set simple
    // and order-independent.
    template
        .replace("%NS", &now.nanosecond().to_string())
        .replace("%Y", &format!("{:04}", now.year()))
        .replace("%m", &format!("{:02}", now.month()))
        .replace("%d", &format!("{:02}", now.day()))
        .replace("%H", &format!("{:02}", now.hour()))
        .replace("%M", &format!("{:02}", now.minute()))
        .replace("%S", &format!("{:02}", now.second()))
}

/// Splits an expanded template path into its parent directory, extension-
/// free file stem, and extension (including the leading dot, empty if
/// none).
pub fn split(expanded: &str) -> (PathBuf, String, String) {
    let path = Path::new(expanded);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => (dir, file_name[..pos].to_string(), file_name[pos..].to_string()),
        _ => (dir, file_name, String::new()),
    }
}

/// Scans `dir` for files named `<stem>_<N><ext>` and returns every `N`
/// found. Returns an empty vector if `dir` doesn't exist yet (nothing has
/// been written there).
pub fn glob_indices(dir: &Path, stem: &str, ext: &str) -> Vec<usize> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let prefix = format!("{stem}_");
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let rest = name.strip_prefix(prefix.as_str())?;
            let digits = rest.strip_suffix(ext)?;
            digits.parse::<usize>().ok()
        })
        .collect()
}

/// Builds `<dir>/<stem>_<index><ext>`.
pub fn indexed_path(dir: &Path, stem: &str, ext: &str, index: usize) -> PathBuf {
    dir.join(format!("{stem}_{index}{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expand_replaces_all_placeholders() {
        let now = Local.with_ymd_and_hms(2026, 7, 28, 9, 5, 3).unwrap();
        let expanded = expand("out_%Y%m%d_%H%M%S.log", now);
        assert_eq!(expanded, "out_20260728_090503.log");
    }

    #[test]
    fn split_extracts_stem_and_extension() {
        let (dir, stem, ext) = split("/var/log/out_20260728.log");
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(stem, "out_20260728");
        assert_eq!(ext, ".log");
    }

    #[test]
    fn split_handles_no_directory() {
        let (dir, stem, ext) = split("out_20260728.log");
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(stem, "out_20260728");
        assert_eq!(ext, ".log");
    }

    #[test]
    fn glob_indices_finds_matching_files_only() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["out_0.log", "out_1.log", "out_7.log", "other_2.log", "out_x.log"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        let mut found = glob_indices(tmp.path(), "out", ".log");
        found.sort();
        assert_eq!(found, vec![0, 1, 7]);
    }

    #[test]
    fn glob_indices_empty_for_missing_dir() {
        let found = glob_indices(Path::new("/nonexistent/path/xyz"), "out", ".log");
        assert!(found.is_empty());
    }

    #[test]
    fn indexed_path_has_no_padding() {
        let path = indexed_path(Path::new("/tmp"), "out", ".log", 12);
        assert_eq!(path, PathBuf::from("/tmp/out_12.log"));
    }
}
