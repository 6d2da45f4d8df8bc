use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Resolve a data directory: empty input falls back to `./data`, relative paths are made absolute.
#[must_use]
pub fn normalize_data_dir(dir: Option<&Path>) -> PathBuf {
    let raw = match dir {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("data"),
    };
    if raw.is_absolute() {
        raw
    } else {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(raw)
    }
}

/// Open a file for appending, creating it with restrictive permissions where supported.
///
/// On Unix, new files get 0o600.
///
/// # Errors
/// Returns an error if the file cannot be created/opened.
pub fn open_append(path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts.open(path)
}

/// Replace `path` with `bytes` atomically: write a sibling temp file, sync it, then rename over.
///
/// Readers see either the old contents or the new ones, never a torn write.
///
/// # Errors
/// Returns an error if the temp file cannot be written or the rename fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Copy a damaged file aside as `<file>.corrupt` before it gets rewritten. Best effort.
pub fn backup_corrupt(path: &Path) -> Option<PathBuf> {
    let mut name = path.file_name()?.to_os_string();
    name.push(".corrupt");
    let dest = path.with_file_name(name);
    match fs::copy(path, &dest) {
        Ok(_) => Some(dest),
        Err(e) => {
            log::warn!("could not back up {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x.json");
        write_atomic(&p, b"one").unwrap();
        write_atomic(&p, b"two").unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "two");
    }

    #[test]
    fn backup_corrupt_copies_alongside() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bills.db");
        fs::write(&p, "garbage").unwrap();
        let b = backup_corrupt(&p).unwrap();
        assert_eq!(b.file_name().unwrap(), "bills.db.corrupt");
        assert_eq!(fs::read_to_string(b).unwrap(), "garbage");
    }

    #[test]
    fn normalize_defaults_to_data() {
        let p = normalize_data_dir(None);
        assert!(p.is_absolute());
        assert!(p.ends_with("data"));
    }
}
