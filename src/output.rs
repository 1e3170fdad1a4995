//! Writing the serialized filter to its destination
//!
//! Symlinks are followed, as `fopen` would. A regular file destination is never left half-written: the bytes go
//! to a temporary file next to the resolved destination, which is synced and then renamed over it. Destinations that
//! can't be replaced by a rename (pipes, character devices, `/dev/fd/N` pointing at either, dangling links) are
//! written in place.

use std::{
    fs::{self, OpenOptions, Permissions},
    io::{self, Write},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use log::debug;
use tempfile::Builder;

#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum WriteError {
    /// Cannot open '{0}': {1}
    Open(PathBuf, io::Error),
    /// Write to '{0}' failed: {1}
    Write(PathBuf, io::Error),
    /// Cannot flush '{0}' to disk: {1}
    Sync(PathBuf, io::Error),
    /// Cannot move the filter into place at '{0}': {1}
    Persist(PathBuf, io::Error),
    /// '{0}' does not name a file
    NotAFile(PathBuf),
}

enum Destination {
    /// Regular file, existing or not, replaced by a rename
    Replace(PathBuf),
    /// Opened and written through
    InPlace,
}

fn resolve(path: &Path) -> Destination {
    match fs::canonicalize(path) {
        Ok(resolved) => match fs::metadata(&resolved) {
            Ok(metadata) if !metadata.is_file() && !metadata.is_dir() => Destination::InPlace,
            _ => Destination::Replace(resolved),
        },
        // `/proc/self/fd/N` of a pipe or a deleted file, or a link to a file yet to be created
        Err(_) if path.is_symlink() => Destination::InPlace,
        Err(_) => Destination::Replace(path.to_path_buf()),
    }
}

/// Writes `bytes` to `path`, replacing any existing regular file; errors name `path` as given
pub fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    match resolve(path) {
        Destination::InPlace => {
            debug!("writing '{}' in place", path.display());
            write_in_place(path, bytes)
        }
        Destination::Replace(resolved) => write_atomically(path, &resolved, bytes),
    }
}

fn write_in_place(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|err| WriteError::Open(path.to_path_buf(), err))?;
    file.write_all(bytes)
        .map_err(|err| WriteError::Write(path.to_path_buf(), err))
}

fn write_atomically(path: &Path, resolved: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let file_name = resolved
        .file_name()
        .ok_or_else(|| WriteError::NotAFile(path.to_path_buf()))?;
    // the temporary file lives in the destination directory, so the rename stays on one filesystem
    let dir = match resolved.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut prefix = std::ffi::OsString::from(".");
    prefix.push(file_name);
    prefix.push(".");

    // removed when dropped, unless persisted
    let mut staged = Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .permissions(Permissions::from_mode(0o644))
        .tempfile_in(dir)
        .map_err(|err| WriteError::Open(path.to_path_buf(), err))?;
    debug!("staging filter in '{}'", staged.path().display());

    staged
        .write_all(bytes)
        .map_err(|err| WriteError::Write(path.to_path_buf(), err))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|err| WriteError::Sync(path.to_path_buf(), err))?;
    staged
        .persist(resolved)
        .map_err(|err| WriteError::Persist(path.to_path_buf(), err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs::File, os::fd::AsRawFd, os::unix::fs::symlink, process};

    use vmm_sys_util::tempdir::TempDir;

    use super::*;

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    fn temp_dir() -> TempDir {
        TempDir::new_with_prefix("/tmp/tiocsti-filter").unwrap()
    }

    #[test]
    fn writes_new_file() {
        let dir = temp_dir();
        let path = dir.as_path().join("filter.bpf");

        write_artifact(&path, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(dir_entries(dir.as_path()), vec!["filter.bpf"]);
    }

    #[test]
    fn replaces_existing_file() {
        let dir = temp_dir();
        let path = dir.as_path().join("filter.bpf");
        fs::write(&path, b"a much longer stale artifact").unwrap();

        write_artifact(&path, &[0; 8]).unwrap();

        assert_eq!(fs::read(&path).unwrap(), vec![0; 8]);
    }

    #[test]
    fn missing_directory_is_reported_by_destination() {
        let dir = temp_dir();
        let path = dir.as_path().join("missing").join("filter.bpf");

        let err = write_artifact(&path, &[0; 8]).unwrap_err();

        assert!(
            matches!(err, WriteError::Open(ref reported, ref source)
                if *reported == path && source.kind() == io::ErrorKind::NotFound)
        );
        let message = err.to_string();
        assert!(message.starts_with(&format!("Cannot open '{}'", path.display())));
        assert!(!path.exists());
    }

    #[test]
    fn directory_destination_leaves_nothing_behind() {
        let dir = temp_dir();
        let path = dir.as_path().join("filter.bpf");
        fs::create_dir(&path).unwrap();

        let err = write_artifact(&path, &[0; 8]).unwrap_err();

        assert!(matches!(err, WriteError::Persist(ref reported, _) if *reported == path));
        assert!(path.is_dir());
        assert_eq!(dir_entries(dir.as_path()), vec!["filter.bpf"]);
    }

    #[test]
    fn leaves_unrelated_files_alone() {
        let dir = temp_dir();
        let path = dir.as_path().join("filter.bpf");
        let lookalike = format!(".filter.bpf.{}.tmp", process::id());
        fs::write(dir.as_path().join(&lookalike), b"not ours").unwrap();

        write_artifact(&path, &[3; 8]).unwrap();

        assert_eq!(fs::read(&path).unwrap(), vec![3; 8]);
        assert_eq!(
            fs::read(dir.as_path().join(&lookalike)).unwrap(),
            b"not ours".to_vec()
        );
        assert_eq!(
            dir_entries(dir.as_path()),
            vec![lookalike, "filter.bpf".to_string()]
        );
    }

    #[test]
    fn writes_through_symlinks() {
        let dir = temp_dir();
        let real = dir.as_path().join("real.bpf");
        let link = dir.as_path().join("link.bpf");
        fs::write(&real, b"old").unwrap();
        symlink(&real, &link).unwrap();

        write_artifact(&link, &[5; 8]).unwrap();

        assert_eq!(fs::read(&real).unwrap(), vec![5; 8]);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }

    #[test]
    fn creates_target_of_dangling_symlink() {
        let dir = temp_dir();
        let real = dir.as_path().join("real.bpf");
        let link = dir.as_path().join("link.bpf");
        symlink(&real, &link).unwrap();

        write_artifact(&link, &[6; 8]).unwrap();

        assert_eq!(fs::read(&real).unwrap(), vec![6; 8]);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }

    #[test]
    fn writes_through_open_descriptor() {
        let dir = temp_dir();
        let real = dir.as_path().join("filter.bpf");
        let file = File::create(&real).unwrap();
        let path = PathBuf::from(format!("/proc/self/fd/{}", file.as_raw_fd()));

        write_artifact(&path, &[7; 8]).unwrap();

        assert_eq!(fs::read(&real).unwrap(), vec![7; 8]);
        drop(file);
    }

    #[test]
    fn rejects_paths_without_file_name() {
        assert!(matches!(
            write_artifact(Path::new("/"), &[0; 8]),
            Err(WriteError::NotAFile(_))
        ));
    }

    #[test]
    fn writes_character_devices_in_place() {
        write_artifact(Path::new("/dev/null"), &[0; 8]).unwrap();
        assert!(Path::new("/dev/null").exists());
    }
}
