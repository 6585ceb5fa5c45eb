use crate::commit::patch_to_commit;
use crate::error::PatchError;
use crate::model::{ActionType, Commit, Originals};
use crate::parser::{identify_files_needed, text_to_patch, BEGIN_PATCH};
use log::{debug, info, trace};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// The file operations the engine needs, injected by the caller.
///
/// Keeping these behind a trait lets the whole pipeline run against an
/// in-memory store in tests. [`DirAccess`] is the filesystem implementation.
pub trait FileAccess {
    /// Returns the full text of the file at `path`.
    fn read(&self, path: &Path) -> io::Result<String>;
    /// Replaces (or creates) the file at `path` with `content`.
    fn write(&mut self, path: &Path, content: &str) -> io::Result<()>;
    /// Deletes the file at `path`.
    fn remove(&mut self, path: &Path) -> io::Result<()>;
}

/// Reads every file in `paths` through `access`.
///
/// # Errors
///
/// Returns [`PatchError::FileNotFound`] for the first path that cannot be read.
pub fn load_files<A, I, P>(paths: I, access: &A) -> Result<Originals, PatchError>
where
    A: FileAccess + ?Sized,
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut originals = Originals::new();
    for path in paths {
        let path = path.as_ref();
        trace!("  Reading '{}'", path.display());
        let content = access.read(path).map_err(|source| PatchError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        originals.insert(path.to_path_buf(), content);
    }
    Ok(originals)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PatchError + '_ {
    move |source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes a [`Commit`] through `access`.
///
/// Deletes are removed, adds are written, updates are written in place or,
/// when moved, written to the new path and then removed from the old one.
/// A move onto the file's own path is a plain in-place write.
///
/// Entries are applied in the commit's order and the first failure is
/// returned immediately. Entries applied before the failure are not rolled
/// back.
pub fn apply_commit<A>(commit: &Commit, access: &mut A) -> Result<(), PatchError>
where
    A: FileAccess + ?Sized,
{
    for (path, change) in commit.iter() {
        let new_content = change.new_content.as_deref().unwrap_or_default();
        match (change.kind, &change.move_path) {
            (ActionType::Delete, _) => {
                info!("  Deleting '{}'", path.display());
                access.remove(path).map_err(io_error(path))?;
            }
            (ActionType::Add, _) => {
                info!("  Adding '{}'", path.display());
                access.write(path, new_content).map_err(io_error(path))?;
            }
            (ActionType::Update, Some(move_path)) if move_path != path => {
                info!(
                    "  Updating '{}' and moving it to '{}'",
                    path.display(),
                    move_path.display()
                );
                access
                    .write(move_path, new_content)
                    .map_err(io_error(move_path))?;
                access.remove(path).map_err(io_error(path))?;
            }
            (ActionType::Update, _) => {
                info!("  Updating '{}'", path.display());
                access.write(path, new_content).map_err(io_error(path))?;
            }
        }
    }
    Ok(())
}

/// A parsed and materialized patch that has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan {
    pub commit: Commit,
    /// Total fuzz spent locating hunks. 0 means every hunk matched exactly.
    pub fuzz: usize,
}

/// Runs every step of [`process_patch`] except writing.
///
/// Useful for previewing a patch, e.g. with [`Commit::unified_diff`].
pub fn plan_patch<A>(text: &str, access: &A) -> Result<PatchPlan, PatchError>
where
    A: FileAccess + ?Sized,
{
    if !text.trim_start().starts_with(BEGIN_PATCH) {
        return Err(PatchError::InvalidPatchText {
            reason: format!("patch must start with '{}'", BEGIN_PATCH),
        });
    }

    let needed = identify_files_needed(text);
    debug!("Patch needs {} existing file(s).", needed.len());
    let originals = load_files(&needed, access)?;
    let (patch, fuzz) = text_to_patch(text, &originals)?;
    let commit = patch_to_commit(&patch, &originals)?;
    Ok(PatchPlan { commit, fuzz })
}

/// Parses `text` and applies it through `access`, end to end.
///
/// Reads the files the patch updates or deletes, parses the patch against
/// them, builds the commit and applies it. Returns `"Done!"` on success.
///
/// Files named by `*** Add File:` are not read first, so an add whose path
/// already exists overwrites it. Call [`text_to_patch`] with that file in the
/// originals to have it rejected with [`PatchError::FileAlreadyExists`].
///
/// # Example
///
/// ```
/// # use apatch::{process_patch, DirAccess};
/// # use std::fs;
/// # use tempfile::tempdir;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempdir()?;
/// fs::write(dir.path().join("a.txt"), "one\ntwo\nthree")?;
///
/// let text = "*** Begin Patch\n*** Update File: a.txt\n one\n-two\n three\n*** End Patch";
/// let mut access = DirAccess::new(dir.path());
/// assert_eq!(process_patch(text, &mut access)?, "Done!");
///
/// assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "one\nthree");
/// # Ok(())
/// # }
/// ```
pub fn process_patch<A>(text: &str, access: &mut A) -> Result<String, PatchError>
where
    A: FileAccess + ?Sized,
{
    let plan = plan_patch(text, &*access)?;
    if plan.fuzz > 0 {
        info!("Patch located with total fuzz {}.", plan.fuzz);
    }
    apply_commit(&plan.commit, access)?;
    Ok("Done!".to_string())
}

/// [`FileAccess`] for a directory on disk.
///
/// Paths are resolved against the root. Absolute paths, paths that climb out
/// of the root and paths that leave it through a symlink are rejected for
/// every operation. Missing parent directories are created before writing.
#[derive(Debug, Clone)]
pub struct DirAccess {
    root: PathBuf,
}

impl DirAccess {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins a patch path onto the root after rejecting unsafe forms.
    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        if path.is_absolute() || path.has_root() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("absolute paths are not supported: {}", path.display()),
            ));
        }
        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path resolves outside the target directory: {}", path.display()),
            ));
        }
        Ok(self.root.join(path))
    }

    /// Resolves `path` and checks that its longest existing prefix is still
    /// inside the root once symlinks are followed.
    ///
    /// Covers symlinked directories on the way to the file as well as a
    /// symlink at the file itself.
    fn resolve_checked(&self, path: &Path) -> io::Result<PathBuf> {
        let target = self.resolve(path)?;
        let existing = target
            .ancestors()
            .find(|p| p.symlink_metadata().is_ok())
            .unwrap_or(self.root.as_path());

        let base = fs::canonicalize(&self.root)?;
        let resolved = fs::canonicalize(existing)?;
        if !resolved.starts_with(&base) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("path resolves outside the target directory: {}", path.display()),
            ));
        }
        Ok(target)
    }
}

impl FileAccess for DirAccess {
    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(self.resolve_checked(path)?)
    }

    fn write(&mut self, path: &Path, content: &str) -> io::Result<()> {
        let target = self.resolve_checked(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        trace!("  Writing {} bytes to '{}'", content.len(), target.display());
        fs::write(&target, content)
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        fs::remove_file(self.resolve_checked(path)?)
    }
}
