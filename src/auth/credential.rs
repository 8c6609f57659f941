use std::{collections::BTreeMap, fs, io::ErrorKind, path::Path};

use subtle::ConstantTimeEq;

use crate::error::StorageError;

/// username -> password hash, ordered so every rewrite is byte-for-byte reproducible.
pub type Users = BTreeMap<String, String>;

pub fn matches(stored: &str, candidate: &str) -> bool {
    stored.as_bytes().ct_eq(candidate.as_bytes()).into()
}

pub fn load_or_initialize(path: &Path) -> Result<Users, StorageError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("Initializing new database in file \"{}\"", path.display());
            commit(path, &Users::new())?;
            return load(path);
        }
        Err(source) => {
            return Err(StorageError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse(path, &contents)
}

fn load(path: &Path) -> Result<Users, StorageError> {
    let contents = fs::read_to_string(path).map_err(|source| StorageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(path, &contents)
}

fn parse(path: &Path, contents: &str) -> Result<Users, StorageError> {
    serde_json::from_str(contents).map_err(|source| StorageError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Rewrites the whole file: the new content lands in a sibling file which is then
/// renamed over `path`.
pub fn commit(path: &Path, users: &Users) -> Result<(), StorageError> {
    let contents = serde_json::to_string_pretty(users)?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = Path::new(&staging);

    let write_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };
    fs::write(staging, contents).map_err(write_err)?;
    fs::rename(staging, path).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_initialized_empty() {
        let workspace = tempfile::tempdir().unwrap();
        let path = workspace.path().join("dbfile.json");
        assert!(!path.exists());

        let users = load_or_initialize(&path).unwrap();
        assert!(users.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn commit_is_sorted_and_reloadable() {
        let workspace = tempfile::tempdir().unwrap();
        let path = workspace.path().join("dbfile.json");
        let mut users = Users::new();
        users.insert("bob".into(), "h2".into());
        users.insert("alice".into(), "h1".into());

        commit(&path, &users).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\n  \"alice\": \"h1\",\n  \"bob\": \"h2\"\n}"
        );
        assert_eq!(load_or_initialize(&path).unwrap(), users);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let workspace = tempfile::tempdir().unwrap();
        let path = workspace.path().join("dbfile.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let err = load_or_initialize(&path).unwrap_err();
        assert!(matches!(err, StorageError::Malformed { .. }));
    }

    #[test]
    fn hashes_compare_structurally() {
        assert!(matches("h1", "h1"));
        assert!(!matches("h1", "h1 "));
        assert!(!matches("h1", ""));
    }
}
