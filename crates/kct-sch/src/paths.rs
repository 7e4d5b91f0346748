//! Cross-platform path normalization for paths recorded inside design
//! files.
//!
//! BOM files and schematics written on Windows or under Cygwin carry paths
//! in whichever style the authoring tool used (`C:\…`, `/cygdrive/c/…`,
//! plain `/…`). These helpers bring any of them into one canonical shape so
//! they can be resolved and relativized on the current platform.

use std::path::{Component, Path, PathBuf};

/// Split a path on whichever separator it uses. Returns the parts and the
/// detected separator, or `None` when the path has no separator at all.
pub fn split_any_path(path: &str) -> (Vec<&str>, Option<char>) {
    for sep in ['/', '\\'] {
        if path.contains(sep) {
            return (path.split(sep).collect(), Some(sep));
        }
    }
    (vec![path], None)
}

/// Normalize a Linux, Windows or Cygwin style path.
///
/// Absolute paths are returned in canonical form (`/cygdrive/c/…` becomes
/// `C:/…`, drive letters are upper-cased); relative paths are joined onto
/// `base` and lexically normalized.
pub fn norm_path(path: &str, base: &Path) -> PathBuf {
    if path.is_empty() {
        return base.to_path_buf();
    }
    let (parts, _) = split_any_path(path);

    if parts[0].is_empty() {
        // Absolute unix-style path.
        if parts.len() > 2 && parts[1].eq_ignore_ascii_case("cygdrive") {
            let mut out = PathBuf::from(format!("{}:", parts[2].to_uppercase()));
            for part in &parts[3..] {
                out.push(part);
            }
            return out;
        }
        let mut out = PathBuf::from("/");
        for part in &parts[1..] {
            out.push(part);
        }
        return out;
    }

    if parts[0].ends_with(':') {
        // Windows drive prefix.
        let mut out = PathBuf::from(parts[0].to_uppercase());
        for part in &parts[1..] {
            out.push(part);
        }
        return out;
    }

    let mut out = base.to_path_buf();
    for part in &parts {
        out.push(part);
    }
    lexical_normalize(&out)
}

/// Path of `path` relative to `base`, after normalizing both.
pub fn rel_path(path: &str, base: &str) -> PathBuf {
    let here = Path::new(".");
    let path = norm_path(path, here);
    let base = norm_path(base, here);
    pathdiff::diff_paths(&path, &base).unwrap_or(path)
}

/// Collapse `.` and `..` components without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_any_path() {
        assert_eq!(
            split_any_path(r"C:\XXX\YYY\ZZZ"),
            (vec!["C:", "XXX", "YYY", "ZZZ"], Some('\\'))
        );
        assert_eq!(split_any_path("XXX"), (vec!["XXX"], None));
        assert_eq!(
            split_any_path("/XXX/YYY/ZZZ"),
            (vec!["", "XXX", "YYY", "ZZZ"], Some('/'))
        );
    }

    #[test]
    fn test_norm_path() {
        let base = Path::new("AAA/BBB");
        assert_eq!(norm_path(r"c:\XXX\YYY\ZZZ", base), PathBuf::from("C:/XXX/YYY/ZZZ"));
        assert_eq!(norm_path(r"XXX\YYY\ZZZ", base), PathBuf::from("AAA/BBB/XXX/YYY/ZZZ"));
        assert_eq!(norm_path("XXX", base), PathBuf::from("AAA/BBB/XXX"));
        assert_eq!(norm_path("/XXX/YYY/ZZZ", base), PathBuf::from("/XXX/YYY/ZZZ"));
        assert_eq!(norm_path("", base), PathBuf::from("AAA/BBB"));
        assert_eq!(norm_path("../XXX", base), PathBuf::from("AAA/XXX"));
    }

    #[test]
    fn test_norm_path_cygdrive() {
        let base = Path::new(".");
        assert_eq!(
            norm_path("/cygdrive/c/XXX/YYY", base),
            PathBuf::from("C:/XXX/YYY")
        );
        assert_eq!(
            norm_path("/CYGDRIVE/d/stuff", base),
            PathBuf::from("D:/stuff")
        );
    }

    #[test]
    fn test_rel_path_mixed_styles() {
        assert_eq!(
            rel_path(r"C:\XXX\YYY\ZZZ", "/cygdrivE/c/XXX/BBB"),
            PathBuf::from("../YYY/ZZZ")
        );
        assert_eq!(
            rel_path("/cygdrive/c/XXX/YYY/ZZZ", r"C:\XXX\BBB"),
            PathBuf::from("../YYY/ZZZ")
        );
        assert_eq!(
            rel_path("/XXX/YYY/ZZZ", r"\XXX\BBB"),
            PathBuf::from("../YYY/ZZZ")
        );
    }
}
