use apatch::{
    apply_commit, load_files, patch_to_commit, plan_patch, process_patch, text_to_patch,
    DirAccess, FileAccess, Originals, PatchError,
};
use indoc::indoc;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An in-memory file store that records every write and remove, and can be
/// told to fail on one path.
#[derive(Debug, Default)]
struct MemoryFs {
    files: BTreeMap<PathBuf, String>,
    ops: Vec<String>,
    fail_on: Option<PathBuf>,
}

impl MemoryFs {
    fn with_files(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, content)| (PathBuf::from(path), content.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    fn content(&self, path: &str) -> Option<&str> {
        self.files.get(Path::new(path)).map(String::as_str)
    }

    fn check_failure(&self, path: &Path) -> io::Result<()> {
        if self.fail_on.as_deref() == Some(path) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
        }
        Ok(())
    }
}

impl FileAccess for MemoryFs {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    fn write(&mut self, path: &Path, content: &str) -> io::Result<()> {
        self.check_failure(path)?;
        self.ops.push(format!("write {}", path.display()));
        self.files.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        self.check_failure(path)?;
        self.ops.push(format!("remove {}", path.display()));
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }
}

// --- In-Memory Application ---

#[test]
fn test_process_patch_adds_file() {
    init_logger();
    let mut fs = MemoryFs::default();
    let text = indoc! {"
        *** Begin Patch
        *** Add File: a.txt
        +hello
        +world
        *** End Patch
    "};
    assert_eq!(process_patch(text, &mut fs).unwrap(), "Done!");
    assert_eq!(fs.content("a.txt"), Some("hello\nworld"));
    assert_eq!(fs.ops, vec!["write a.txt"]);
}

#[test]
fn test_process_patch_mixed_directives_in_path_order() {
    init_logger();
    let mut fs = MemoryFs::with_files(&[("b.txt", "one\ntwo\nthree\n"), ("c.txt", "bye")]);
    let text = indoc! {"
        *** Begin Patch
        *** Delete File: c.txt
        *** Update File: b.txt
         one
        -two
         three
        *** Add File: a.txt
        +new
        *** End Patch
    "};
    process_patch(text, &mut fs).unwrap();

    assert_eq!(fs.ops, vec!["write a.txt", "write b.txt", "remove c.txt"]);
    assert_eq!(fs.content("a.txt"), Some("new"));
    assert_eq!(fs.content("b.txt"), Some("one\nthree\n"));
    assert_eq!(fs.content("c.txt"), None);
}

#[test]
fn test_process_patch_move_writes_then_removes() {
    let mut fs = MemoryFs::with_files(&[("old.rs", "fn old() {}\n")]);
    let text = indoc! {"
        *** Begin Patch
        *** Update File: old.rs
        *** Move to: renamed.rs
        @@
        -fn old() {}
        +fn renamed() {}
        *** End Patch
    "};
    process_patch(text, &mut fs).unwrap();

    assert_eq!(fs.ops, vec!["write renamed.rs", "remove old.rs"]);
    assert_eq!(fs.content("renamed.rs"), Some("fn renamed() {}\n"));
    assert_eq!(fs.content("old.rs"), None);
}

#[test]
fn test_process_patch_rejects_text_without_begin_marker() {
    let mut fs = MemoryFs::with_files(&[("a.txt", "x")]);
    let err = process_patch("*** Delete File: a.txt\n*** End Patch", &mut fs).unwrap_err();
    assert!(matches!(err, PatchError::InvalidPatchText { .. }));
    assert!(fs.ops.is_empty());
    assert_eq!(fs.content("a.txt"), Some("x"));
}

#[test]
fn test_process_patch_accepts_leading_whitespace() {
    let mut fs = MemoryFs::default();
    let text = "\n\n  *** Begin Patch\n*** Add File: a.txt\n+x\n*** End Patch\n\n";
    assert_eq!(process_patch(text, &mut fs).unwrap(), "Done!");
    assert_eq!(fs.content("a.txt"), Some("x"));
}

#[test]
fn test_process_patch_missing_file_is_not_found() {
    let mut fs = MemoryFs::default();
    let text = "*** Begin Patch\n*** Update File: ghost.txt\n-x\n*** End Patch";
    let err = process_patch(text, &mut fs).unwrap_err();
    match err {
        PatchError::FileNotFound { path, source } => {
            assert_eq!(path, PathBuf::from("ghost.txt"));
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(fs.ops.is_empty());
}

#[test]
fn test_parse_failure_writes_nothing() {
    let mut fs = MemoryFs::with_files(&[("a.txt", "one\ntwo")]);
    let text = indoc! {"
        *** Begin Patch
        *** Add File: new.txt
        +content
        *** Update File: a.txt
        -missing line
        *** End Patch
    "};
    let err = process_patch(text, &mut fs).unwrap_err();
    assert!(matches!(err, PatchError::ContextNotFound { .. }));
    assert!(fs.ops.is_empty());
    assert_eq!(fs.content("new.txt"), None);
}

#[test]
fn test_load_files_reports_first_missing_path() {
    let fs = MemoryFs::with_files(&[("a.txt", "a")]);
    let err = load_files(["a.txt", "b.txt"], &fs).unwrap_err();
    assert!(matches!(err, PatchError::FileNotFound { ref path, .. } if path == Path::new("b.txt")));
    assert_eq!(err.to_string(), "File not found: b.txt");

    let loaded = load_files(["a.txt"], &fs).unwrap();
    assert_eq!(loaded.get(Path::new("a.txt")).map(String::as_str), Some("a"));
}

// --- Partial Failure ---

fn mixed_commit_fs(fail_on: &str) -> (MemoryFs, apatch::Commit) {
    let fs = MemoryFs {
        fail_on: Some(PathBuf::from(fail_on)),
        ..MemoryFs::with_files(&[("b.txt", "old"), ("c.txt", "doomed")])
    };
    let text = indoc! {"
        *** Begin Patch
        *** Delete File: c.txt
        *** Update File: b.txt
        -old
        +new
        *** Add File: a.txt
        +fresh
        *** End Patch
    "};
    let originals: Originals = load_files(["b.txt", "c.txt"], &fs).unwrap();
    let (patch, _) = text_to_patch(text, &originals).unwrap();
    let commit = patch_to_commit(&patch, &originals).unwrap();
    (fs, commit)
}

#[test]
fn test_apply_commit_stops_at_first_failure_without_rollback() {
    init_logger();
    let (mut fs, commit) = mixed_commit_fs("b.txt");
    let err = apply_commit(&commit, &mut fs).unwrap_err();

    match &err {
        PatchError::Io { path, source } => {
            assert_eq!(path, Path::new("b.txt"));
            assert_eq!(source.to_string(), "injected failure");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // a.txt was applied before the failure and stays; c.txt was never reached.
    assert_eq!(fs.ops, vec!["write a.txt"]);
    assert_eq!(fs.content("a.txt"), Some("fresh"));
    assert_eq!(fs.content("b.txt"), Some("old"));
    assert_eq!(fs.content("c.txt"), Some("doomed"));
}

#[test]
fn test_apply_commit_failure_on_last_entry_keeps_earlier_changes() {
    let (mut fs, commit) = mixed_commit_fs("c.txt");
    let err = apply_commit(&commit, &mut fs).unwrap_err();

    assert!(matches!(err, PatchError::Io { ref path, .. } if path == Path::new("c.txt")));
    assert_eq!(fs.ops, vec!["write a.txt", "write b.txt"]);
    assert_eq!(fs.content("b.txt"), Some("new"));
    assert_eq!(fs.content("c.txt"), Some("doomed"));
}

#[test]
fn test_apply_commit_move_failure_after_write_leaves_both_files() {
    let mut fs = MemoryFs {
        fail_on: Some(PathBuf::from("old.txt")),
        ..MemoryFs::with_files(&[("old.txt", "a")])
    };
    let text = "*** Begin Patch\n*** Update File: old.txt\n*** Move to: new.txt\n-a\n+b\n*** End Patch";
    let err = process_patch(text, &mut fs).unwrap_err();

    assert!(matches!(err, PatchError::Io { ref path, .. } if path == Path::new("old.txt")));
    assert_eq!(fs.content("new.txt"), Some("b"));
    assert_eq!(fs.content("old.txt"), Some("a"));
}

#[test]
fn test_move_onto_own_path_updates_in_place() {
    let mut fs = MemoryFs::with_files(&[("a.txt", "one\ntwo")]);
    let text = indoc! {"
        *** Begin Patch
        *** Update File: a.txt
        *** Move to: a.txt
         one
        -two
        +2
        *** End Patch
    "};
    assert_eq!(process_patch(text, &mut fs).unwrap(), "Done!");

    assert_eq!(fs.ops, vec!["write a.txt"]);
    assert_eq!(fs.content("a.txt"), Some("one\n2"));
}

#[test]
fn test_process_patch_add_overwrites_existing_file() {
    let mut fs = MemoryFs::with_files(&[("a.txt", "old")]);
    let text = "*** Begin Patch\n*** Add File: a.txt\n+new\n*** End Patch";
    assert_eq!(process_patch(text, &mut fs).unwrap(), "Done!");
    assert_eq!(fs.content("a.txt"), Some("new"));

    // With the file among the originals the add is refused.
    let originals: Originals = load_files(["a.txt"], &fs).unwrap();
    let err = text_to_patch(text, &originals).unwrap_err();
    assert!(matches!(err, PatchError::FileAlreadyExists { .. }));
}

// --- Planning ---

#[test]
fn test_plan_patch_reports_fuzz_and_writes_nothing() {
    let fs = MemoryFs::with_files(&[("a.txt", "end\nmiddle\nlast")]);
    let text = indoc! {"
        *** Begin Patch
        *** Update File: a.txt
        -end
        +END
        *** EOF
        *** End Patch
    "};
    let plan = plan_patch(text, &fs).unwrap();
    assert!(plan.fuzz >= 10_000);
    assert_eq!(
        plan.commit.get("a.txt").unwrap().new_content.as_deref(),
        Some("END\nmiddle\nlast")
    );
    assert!(fs.ops.is_empty());
}

#[test]
fn test_unified_diff_renders_every_change() {
    let fs = MemoryFs::with_files(&[("a.txt", "one\ntwo\nthree\n"), ("gone.txt", "bye\n")]);
    let text = indoc! {"
        *** Begin Patch
        *** Update File: a.txt
         one
        -two
        +2
         three
        *** Delete File: gone.txt
        *** Add File: new.txt
        +hi
        *** End Patch
    "};
    let diff = plan_patch(text, &fs).unwrap().commit.unified_diff();

    assert!(diff.contains("--- a/a.txt\n+++ b/a.txt\n"));
    assert!(diff.contains("-two\n"));
    assert!(diff.contains("+2\n"));
    assert!(diff.contains("--- a/gone.txt\n+++ /dev/null\n"));
    assert!(diff.contains("-bye\n"));
    assert!(diff.contains("--- /dev/null\n+++ b/new.txt\n"));
    assert!(diff.contains("+hi"));
}

// --- Filesystem Application ---

#[test]
fn test_dir_access_end_to_end() {
    init_logger();
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(
        dir.path().join("src/lib.rs"),
        "pub fn greet() -> &'static str {\n    \"hello\"\n}\n",
    )
    .unwrap();
    fs::write(dir.path().join("obsolete.txt"), "remove me").unwrap();

    let text = indoc! {r#"
        *** Begin Patch
        *** Update File: src/lib.rs
        @@ pub fn greet() -> &'static str {
        -    "hello"
        +    "hello, world"
         }
        *** Delete File: obsolete.txt
        *** Add File: docs/new/readme.md
        +# Readme
        +
        +Generated.
        *** End Patch
    "#};
    let mut access = DirAccess::new(dir.path());
    assert_eq!(process_patch(text, &mut access).unwrap(), "Done!");

    assert_eq!(
        fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(),
        "pub fn greet() -> &'static str {\n    \"hello, world\"\n}\n"
    );
    assert!(!dir.path().join("obsolete.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("docs/new/readme.md")).unwrap(),
        "# Readme\n\nGenerated."
    );
}

#[test]
fn test_dir_access_move_into_new_directory() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("old.txt"), "a\nb\n").unwrap();

    let text = indoc! {"
        *** Begin Patch
        *** Update File: old.txt
        *** Move to: nested/dir/new.txt
        @@
         a
        -b
        +c
        *** End Patch
    "};
    let mut access = DirAccess::new(dir.path());
    process_patch(text, &mut access).unwrap();

    assert!(!dir.path().join("old.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("nested/dir/new.txt")).unwrap(),
        "a\nc\n"
    );
}

#[test]
fn test_dir_access_rejects_parent_traversal() {
    let root = tempdir().unwrap();
    let workspace = root.path().join("workspace");
    fs::create_dir_all(&workspace).unwrap();

    let text = "*** Begin Patch\n*** Add File: ../escape.txt\n+x\n*** End Patch";
    let mut access = DirAccess::new(&workspace);
    let err = process_patch(text, &mut access).unwrap_err();

    match err {
        PatchError::Io { path, source } => {
            assert_eq!(path, PathBuf::from("../escape.txt"));
            assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!root.path().join("escape.txt").exists());
}

#[test]
fn test_dir_access_rejects_absolute_paths() {
    let dir = tempdir().unwrap();
    let outside = tempdir().unwrap();
    let target = outside.path().join("victim.txt");
    fs::write(&target, "keep me").unwrap();

    let text = format!(
        "*** Begin Patch\n*** Delete File: {}\n*** End Patch",
        target.display()
    );
    let mut access = DirAccess::new(dir.path());
    let err = process_patch(&text, &mut access).unwrap_err();

    match err {
        PatchError::FileNotFound { source, .. } => {
            assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fs::read_to_string(&target).unwrap(), "keep me");
}

#[test]
fn test_dir_access_missing_file() {
    let dir = tempdir().unwrap();
    let access = DirAccess::new(dir.path());
    assert_eq!(access.root(), dir.path());

    let err = plan_patch(
        "*** Begin Patch\n*** Delete File: nope.txt\n*** End Patch",
        &access,
    )
    .unwrap_err();
    assert!(matches!(err, PatchError::FileNotFound { .. }));
}

#[cfg(unix)]
mod symlinks {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    /// A root containing `link -> <outside>` and `alias.txt -> <outside>/victim.txt`.
    fn linked_root() -> (TempDir, TempDir) {
        let root = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("victim.txt"), "keep me").unwrap();
        symlink(outside.path(), root.path().join("link")).unwrap();
        symlink(
            outside.path().join("victim.txt"),
            root.path().join("alias.txt"),
        )
        .unwrap();
        (root, outside)
    }

    fn assert_escape_denied(err: &io::Error) {
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(err.to_string().contains("outside the target directory"));
    }

    #[test]
    fn test_delete_through_symlinked_directory_is_rejected() {
        init_logger();
        let (root, outside) = linked_root();
        let text = "*** Begin Patch\n*** Delete File: link/victim.txt\n*** End Patch";
        let mut access = DirAccess::new(root.path());
        let err = process_patch(text, &mut access).unwrap_err();

        match &err {
            PatchError::FileNotFound { source, .. } => assert_escape_denied(source),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(outside.path().join("victim.txt").exists());
    }

    #[test]
    fn test_add_through_symlinked_directory_is_rejected() {
        let (root, outside) = linked_root();
        let text = indoc! {"
            *** Begin Patch
            *** Add File: link/new.txt
            +x
            *** Add File: link/sub/deeper.txt
            +y
            *** End Patch
        "};
        let mut access = DirAccess::new(root.path());
        let err = process_patch(text, &mut access).unwrap_err();

        match &err {
            PatchError::Io { path, source } => {
                assert_eq!(path, Path::new("link/new.txt"));
                assert_escape_denied(source);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!outside.path().join("new.txt").exists());

        let nested = "*** Begin Patch\n*** Add File: link/sub/deeper.txt\n+y\n*** End Patch";
        let err = process_patch(nested, &mut access).unwrap_err();
        assert!(matches!(err, PatchError::Io { .. }));
        assert!(!outside.path().join("sub").exists());
    }

    #[test]
    fn test_symlinked_file_is_not_read() {
        let (root, outside) = linked_root();
        let mut access = DirAccess::new(root.path());

        let err = access.read(Path::new("alias.txt")).unwrap_err();
        assert_escape_denied(&err);

        let update = "*** Begin Patch\n*** Update File: alias.txt\n-keep me\n+gotcha\n*** End Patch";
        let err = process_patch(update, &mut access).unwrap_err();
        assert!(matches!(err, PatchError::FileNotFound { .. }));
        assert_eq!(
            fs::read_to_string(outside.path().join("victim.txt")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn test_symlink_inside_root_is_allowed() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("real")).unwrap();
        fs::write(root.path().join("real/a.txt"), "one\ntwo").unwrap();
        symlink(root.path().join("real"), root.path().join("alias")).unwrap();

        let text = "*** Begin Patch\n*** Update File: alias/a.txt\n one\n-two\n+2\n*** End Patch";
        let mut access = DirAccess::new(root.path());
        assert_eq!(process_patch(text, &mut access).unwrap(), "Done!");
        assert_eq!(
            fs::read_to_string(root.path().join("real/a.txt")).unwrap(),
            "one\n2"
        );
    }
}
