//! Filesystem helpers built on `cap-std` and `camino`.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Ensure the parent directory of `path` exists.
///
/// Absolute parents are created relative to the filesystem root, relative
/// parents relative to the working directory.
pub(crate) fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let (base, relative) = split_base(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    dir.create_dir_all(&relative)
}

fn split_base(parent: &Utf8Path) -> io::Result<(Utf8PathBuf, Utf8PathBuf)> {
    if parent.is_absolute() {
        let root = parent
            .ancestors()
            .last()
            .ok_or_else(|| io::Error::other("absolute path has no root"))?;
        let relative = parent
            .strip_prefix(root)
            .map_err(|_| io::Error::other("failed to strip root from absolute path"))?;
        Ok((root.to_path_buf(), relative.to_path_buf()))
    } else {
        Ok((Utf8PathBuf::from("."), parent.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn creates_nested_parents() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp dir");
        let target = root.join("a/b/geosync.db");
        ensure_parent_dir(&target).expect("create parents");
        assert!(root.join("a/b").is_dir());
    }

    #[rstest]
    #[case("geosync.db")]
    #[case("/geosync.db")]
    fn bare_file_names_need_no_directory(#[case] path: &str) {
        ensure_parent_dir(Utf8Path::new(path)).expect("nothing to create");
    }

    #[rstest]
    fn absolute_parents_split_at_the_root() {
        let (base, relative) = split_base(Utf8Path::new("/var/lib/geosync")).expect("split");
        assert_eq!(base, Utf8PathBuf::from("/"));
        assert_eq!(relative, Utf8PathBuf::from("var/lib/geosync"));
    }
}
