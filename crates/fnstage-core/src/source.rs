use std::path::Path;

/// A function source directory must exist and contain at least one entry.
///
/// The error is a short reason suitable for a user-facing message.
pub fn check_source_dir(path: &Path) -> Result<(), &'static str> {
    if !path.is_dir() {
        return Err("directory does not exist");
    }
    match std::fs::read_dir(path) {
        Ok(mut entries) => match entries.next() {
            Some(_) => Ok(()),
            None => Err("directory is empty"),
        },
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cannot read source directory");
            Err("directory is not readable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populated_directory_passes() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("index.js"), "").unwrap();
        assert_eq!(check_source_dir(tmp.path()), Ok(()));
    }

    #[test]
    fn empty_or_missing_directory_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(check_source_dir(tmp.path()), Err("directory is empty"));
        assert_eq!(
            check_source_dir(&tmp.path().join("missing")),
            Err("directory does not exist")
        );
    }

    #[test]
    fn file_is_not_a_source_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("index.js");
        std::fs::write(&file, "").unwrap();
        assert_eq!(check_source_dir(&file), Err("directory does not exist"));
    }
}
