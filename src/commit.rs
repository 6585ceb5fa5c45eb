use crate::error::PatchError;
use crate::model::{ActionType, Commit, FileChange, Originals, Patch, PatchAction};
use log::{debug, trace};
use similar::TextDiff;
use std::collections::BTreeMap;
use std::path::Path;

/// Rebuilds the content of a file from its original text and an update action.
///
/// Original lines between chunks are copied unchanged, each chunk's inserted
/// lines replace its deleted lines, and whatever follows the last chunk is
/// copied verbatim. Lines are split and joined on `\n` only, so a trailing
/// newline in the original survives.
///
/// # Errors
///
/// - [`PatchError::ChunkOutOfBounds`] if a chunk starts past the end of the file.
/// - [`PatchError::ChunkOverlap`] if a chunk starts inside lines already
///   consumed by the previous one.
///
/// # Example
///
/// ```
/// # use apatch::{get_updated_file, Chunk, PatchAction};
/// # use std::path::Path;
/// let action = PatchAction::update(
///     vec![Chunk {
///         orig_index: 1,
///         del_lines: vec!["two".to_string()],
///         ins_lines: vec!["2".to_string(), "2.5".to_string()],
///     }],
///     None,
/// );
/// let updated = get_updated_file("one\ntwo\nthree\n", &action, Path::new("a.txt")).unwrap();
/// assert_eq!(updated, "one\n2\n2.5\nthree\n");
/// ```
pub fn get_updated_file(text: &str, action: &PatchAction, path: &Path) -> Result<String, PatchError> {
    let orig_lines: Vec<&str> = text.split('\n').collect();
    let mut dest_lines: Vec<&str> = Vec::with_capacity(orig_lines.len());
    let mut cursor = 0;

    for chunk in &action.chunks {
        if chunk.orig_index > orig_lines.len() {
            return Err(PatchError::ChunkOutOfBounds {
                path: path.to_path_buf(),
                orig_index: chunk.orig_index,
                line_count: orig_lines.len(),
            });
        }
        if cursor > chunk.orig_index {
            return Err(PatchError::ChunkOverlap {
                path: path.to_path_buf(),
                cursor,
                orig_index: chunk.orig_index,
            });
        }
        trace!(
            "  Copying lines {}..{}, then -{} +{}",
            cursor,
            chunk.orig_index,
            chunk.del_lines.len(),
            chunk.ins_lines.len()
        );
        dest_lines.extend_from_slice(&orig_lines[cursor..chunk.orig_index]);
        dest_lines.extend(chunk.ins_lines.iter().map(String::as_str));
        cursor = chunk.orig_index + chunk.del_lines.len();
    }

    dest_lines.extend_from_slice(orig_lines.get(cursor..).unwrap_or_default());
    Ok(dest_lines.join("\n"))
}

fn original_content<'a>(
    originals: &'a Originals,
    action: ActionType,
    path: &Path,
) -> Result<&'a String, PatchError> {
    originals.get(path).ok_or_else(|| PatchError::MissingFile {
        action,
        path: path.to_path_buf(),
    })
}

/// Materializes a parsed [`Patch`] into a [`Commit`] of final file contents.
///
/// Pure: reads nothing but `originals` and writes nothing.
///
/// # Example
///
/// ```
/// # use apatch::{patch_to_commit, text_to_patch, ActionType, Originals};
/// let text = "*** Begin Patch\n*** Add File: a.txt\n+hello\n+world\n*** End Patch";
/// let originals = Originals::new();
/// let (patch, _) = text_to_patch(text, &originals).unwrap();
/// let commit = patch_to_commit(&patch, &originals).unwrap();
///
/// let change = commit.get("a.txt").unwrap();
/// assert_eq!(change.kind, ActionType::Add);
/// assert_eq!(change.new_content.as_deref(), Some("hello\nworld"));
/// assert_eq!(change.old_content, None);
/// ```
pub fn patch_to_commit(patch: &Patch, originals: &Originals) -> Result<Commit, PatchError> {
    let mut changes = BTreeMap::new();
    for (path, action) in patch.iter() {
        let change = match action.kind {
            ActionType::Delete => FileChange {
                kind: ActionType::Delete,
                old_content: Some(original_content(originals, action.kind, path)?.clone()),
                new_content: None,
                move_path: None,
            },
            ActionType::Add => FileChange {
                kind: ActionType::Add,
                old_content: None,
                new_content: Some(action.new_file.clone().unwrap_or_default()),
                move_path: None,
            },
            ActionType::Update => {
                let old_content = original_content(originals, action.kind, path)?;
                let new_content = get_updated_file(old_content, action, path)?;
                FileChange {
                    kind: ActionType::Update,
                    old_content: Some(old_content.clone()),
                    new_content: Some(new_content),
                    move_path: action.move_path.clone(),
                }
            }
        };
        debug!("Committed {} of '{}'", change.kind, path.display());
        changes.insert(path.clone(), change);
    }
    Ok(Commit { changes })
}

impl Commit {
    /// Renders every change as a unified diff, in application order.
    ///
    /// Added files are diffed against `/dev/null`, deleted files against it
    /// on the other side, and moved files show both names.
    pub fn unified_diff(&self) -> String {
        let mut out = String::new();
        for (path, change) in self.iter() {
            let path_str = path.to_string_lossy();
            let old_header = match change.kind {
                ActionType::Add => "/dev/null".to_string(),
                _ => format!("a/{}", path_str),
            };
            let new_header = match change.destination(path) {
                Some(dest) => format!("b/{}", dest.to_string_lossy()),
                None => "/dev/null".to_string(),
            };
            let old_text = change.old_content.as_deref().unwrap_or_default();
            let new_text = change.new_content.as_deref().unwrap_or_default();
            let diff = TextDiff::from_lines(old_text, new_text);
            out.push_str(&format!(
                "{}",
                diff.unified_diff()
                    .context_radius(3)
                    .header(&old_header, &new_header)
            ));
        }
        out
    }
}
