//! Path policy and size filtering for archive entries.
//!
//! Every entry name goes through [`resolve_target`] before anything touches
//! the disk. A name that could escape the destination directory is rejected
//! with a [`SecurityError`], which aborts the whole unpack.

use crate::error::SecurityError;
use crate::types::{EntryType, UnpackOptions};
use std::path::{Component, Path, PathBuf};

/// Validates an archive entry name and normalizes it to a relative path.
///
/// Rejects names that:
/// - are empty
/// - contain a backslash
/// - start with `/`
/// - contain a `..` segment anywhere
///
/// `.` segments and repeated separators are dropped, so the result may be
/// empty for names like `./`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use cmdutil::safety::validate_entry_path;
///
/// let safe_path = validate_entry_path("./dir//file.txt").unwrap();
/// assert_eq!(safe_path, Path::new("dir/file.txt"));
///
/// assert!(validate_entry_path("../../etc/passwd").is_err());
/// assert!(validate_entry_path("/etc/passwd").is_err());
/// assert!(validate_entry_path(r"dir\file.txt").is_err());
/// ```
pub fn validate_entry_path(name: &str) -> Result<PathBuf, SecurityError> {
    if name.is_empty() {
        return Err(SecurityError::EmptyName);
    }
    if name.contains('\\') {
        return Err(SecurityError::Backslash(name.to_string()));
    }
    if name.starts_with('/') {
        return Err(SecurityError::AbsolutePath(name.to_string()));
    }

    let mut normalized = PathBuf::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(SecurityError::PathTraversal(name.to_string())),
            part => {
                // A segment such as "C:" would turn into a prefix component on Windows.
                let mut components = Path::new(part).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => normalized.push(part),
                    _ => return Err(SecurityError::AbsolutePath(name.to_string())),
                }
            }
        }
    }

    Ok(normalized)
}

/// Drops the first `count` components of an already validated path.
///
/// Returns `None` when nothing would be left, i.e. when the path has `count`
/// components or fewer.
pub fn strip_path_components(path: &Path, count: u32) -> Option<PathBuf> {
    let components: Vec<_> = path.components().collect();
    let skip = count as usize;

    if components.len() <= skip {
        return None;
    }

    Some(components[skip..].iter().collect())
}

/// Computes the destination of an entry relative to the unpack directory.
///
/// `Ok(None)` means the entry has no target and is dropped silently.
pub fn resolve_target(name: &str, strip_components: u32) -> Result<Option<PathBuf>, SecurityError> {
    let validated = validate_entry_path(name)?;
    Ok(strip_path_components(&validated, strip_components))
}

/// Size bounds applied to regular files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFilter {
    /// Skip files smaller than this
    pub min_size: Option<u64>,
    /// Skip files larger than this
    pub max_size: Option<u64>,
}

impl EntryFilter {
    /// Takes the bounds from unpack options.
    pub fn from_options(options: &UnpackOptions) -> Self {
        Self {
            min_size: options.min_size.filter(|&n| n > 0),
            max_size: options.max_size.filter(|&n| n > 0),
        }
    }

    /// Whether an entry should be skipped.
    ///
    /// Only regular files are size-filtered.
    pub fn should_skip(&self, entry_type: EntryType, size: u64) -> bool {
        if entry_type != EntryType::File {
            return false;
        }
        if self.min_size.is_some_and(|min| size < min) {
            return true;
        }
        self.max_size.is_some_and(|max| size > max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_entry_path_valid() {
        assert_eq!(validate_entry_path("file.txt").unwrap(), Path::new("file.txt"));
        assert_eq!(
            validate_entry_path("dir/subdir/file.txt").unwrap(),
            Path::new("dir/subdir/file.txt")
        );
        assert_eq!(validate_entry_path("./dir/file.txt").unwrap(), Path::new("dir/file.txt"));
        assert_eq!(validate_entry_path("dir/subdir/").unwrap(), Path::new("dir/subdir"));
    }

    #[test]
    fn test_validate_entry_path_empty() {
        assert_eq!(validate_entry_path(""), Err(SecurityError::EmptyName));

        // Only current-dir segments: valid, but normalizes to nothing
        assert_eq!(validate_entry_path("./").unwrap(), PathBuf::new());
        assert_eq!(validate_entry_path("././.").unwrap(), PathBuf::new());
    }

    #[test]
    fn test_validate_entry_path_absolute() {
        assert!(matches!(
            validate_entry_path("/etc/passwd"),
            Err(SecurityError::AbsolutePath(_))
        ));
        assert!(matches!(
            validate_entry_path("//tmp/file.txt"),
            Err(SecurityError::AbsolutePath(_))
        ));
    }

    #[test]
    fn test_validate_entry_path_backslash() {
        assert!(matches!(
            validate_entry_path(r"..\evil.txt"),
            Err(SecurityError::Backslash(_))
        ));
        assert!(matches!(
            validate_entry_path(r"dir\file.txt"),
            Err(SecurityError::Backslash(_))
        ));
    }

    #[test]
    fn test_validate_entry_path_traversal() {
        for name in [
            "../etc/passwd",
            "../../etc/passwd",
            "dir/../etc/passwd",
            "safe/../../etc/passwd",
            "./../../etc/passwd",
            "dir/..",
            "..",
        ] {
            assert!(
                matches!(validate_entry_path(name), Err(SecurityError::PathTraversal(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_entry_path_dots_inside_names() {
        // Only whole ".." segments are traversal
        assert!(validate_entry_path("dir/..hidden").is_ok());
        assert!(validate_entry_path("archive..tar/file").is_ok());
        assert!(validate_entry_path("v1.2.3/file...txt").is_ok());
    }

    #[test]
    fn test_validate_entry_path_unicode() {
        assert_eq!(
            validate_entry_path("日本語/ファイル.txt").unwrap(),
            Path::new("日本語/ファイル.txt")
        );
        assert!(validate_entry_path("日本語/../etc/passwd").is_err());
    }

    #[test]
    fn test_strip_path_components() {
        let path = Path::new("a/b/c/file.txt");
        assert_eq!(strip_path_components(path, 0).unwrap(), path);
        assert_eq!(strip_path_components(path, 1).unwrap(), Path::new("b/c/file.txt"));
        assert_eq!(strip_path_components(path, 3).unwrap(), Path::new("file.txt"));
    }

    #[test]
    fn test_strip_path_components_boundary() {
        let path = Path::new("a/b/c/file.txt");

        // Exactly as many components as stripped: nothing left
        assert_eq!(strip_path_components(path, 4), None);
        // More than available
        assert_eq!(strip_path_components(path, 10), None);
        // An empty path has no target even without stripping
        assert_eq!(strip_path_components(Path::new(""), 0), None);
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("pkg-1.0/bin/tool", 1).unwrap(),
            Some(PathBuf::from("bin/tool"))
        );
        assert_eq!(resolve_target("pkg-1.0/", 1).unwrap(), None);
        assert_eq!(resolve_target("./", 0).unwrap(), None);
        assert!(resolve_target("pkg/../../x", 1).is_err());
    }

    #[test]
    fn test_entry_filter_bounds() {
        let filter = EntryFilter {
            min_size: Some(10),
            max_size: Some(100),
        };
        assert!(filter.should_skip(EntryType::File, 5));
        assert!(filter.should_skip(EntryType::File, 200));
        assert!(!filter.should_skip(EntryType::File, 50));

        // Bounds are inclusive
        assert!(!filter.should_skip(EntryType::File, 10));
        assert!(!filter.should_skip(EntryType::File, 100));
    }

    #[test]
    fn test_entry_filter_only_regular_files() {
        let filter = EntryFilter {
            min_size: Some(10),
            max_size: Some(100),
        };
        assert!(!filter.should_skip(EntryType::Directory, 0));
        assert!(!filter.should_skip(EntryType::Symlink, 0));
        assert!(!filter.should_skip(EntryType::Other, 1000));
    }

    #[test]
    fn test_entry_filter_unbounded() {
        let filter = EntryFilter::from_options(&UnpackOptions::default());
        assert!(!filter.should_skip(EntryType::File, 0));
        assert!(!filter.should_skip(EntryType::File, u64::MAX));
    }
}
