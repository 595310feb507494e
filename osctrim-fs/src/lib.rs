//! Capability-based filesystem helpers shared by the osc-trim crates.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

/// Open an existing file for reading using ambient authority.
///
/// # Errors
/// Propagates the I/O error raised while opening `path`.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// File written under a hidden sibling name and moved over its target on
/// [`StagedFile::commit`].
///
/// Dropping a staged file without committing removes the partial file and
/// leaves any existing target untouched.
#[derive(Debug)]
pub struct StagedFile {
    dir: fs_utf8::Dir,
    staging: String,
    target: String,
    committed: bool,
}

impl StagedFile {
    /// Create the staging file next to `path`, creating missing parent
    /// directories first.
    ///
    /// # Errors
    /// Propagates failures to create the parent directories or the file.
    pub fn create(path: &Utf8Path) -> io::Result<(Self, fs_utf8::File)> {
        ensure_parent_dir(path)?;
        let (dir, target) = open_dir_and_file(path)?;
        let staging = format!(".{target}.{}.partial", std::process::id());
        let file = dir.create(staging.as_str())?;
        let staged = Self {
            dir,
            staging,
            target,
            committed: false,
        };
        Ok((staged, file))
    }

    /// Flush `file` to disk and rename it over the target.
    ///
    /// # Errors
    /// Propagates sync and rename failures; the staging file is removed.
    pub fn commit(mut self, file: fs_utf8::File) -> io::Result<()> {
        file.sync_all()?;
        drop(file);
        self.dir
            .rename(self.staging.as_str(), &self.dir, self.target.as_str())?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _removed = self.dir.remove_file(self.staging.as_str());
        }
    }
}

/// Resolve the directory holding `path` and return it with the file name.
///
/// # Errors
/// Fails when `path` has no file name or its directory cannot be opened.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Ensure the parent directory for `path` exists, handling absolute paths safely for cap-std.
///
/// # Errors
/// Propagates failures to open the base directory or create the missing ones.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let (base_dir, relative) = base_dir_and_relative(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)?;
    Ok(())
}

/// Return whether a path exists and is a regular file using capability-based IO.
///
/// # Errors
/// Returns the underlying error, including [`io::ErrorKind::NotFound`] when
/// `path` does not exist.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name.as_str()).map(|meta| meta.is_file())
}

/// Split an absolute or relative parent path into an ambient base directory and a relative suffix.
///
/// # Errors
/// Fails for non-UTF-8 prefixes or when the base directory cannot be opened.
pub fn base_dir_and_relative(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();

    let (base, relative) = match std_parent.components().next() {
        // Windows absolute path with a drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;

            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_parent.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from parent path"))?
                .to_path_buf();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_parent.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative = Utf8PathBuf::from_path_buf(relative)
        .map_err(|_| io::Error::other("non-UTF-8 parent path"))?;

    Ok((dir, relative))
}
