//! A patch engine that applies compact, model-friendly patch directives to
//! a set of text files.
//!
//! `apatch` reads patches written in the `*** Begin Patch` / `*** End Patch`
//! format and turns them into concrete add, update, delete and move
//! operations. It does not rely on line numbers. Each hunk is located by
//! searching for its context lines, tolerating the small inaccuracies that
//! language models tend to introduce: trailing or leading whitespace drift,
//! typographic quotes and dashes, and context that stops short of the end of
//! the file.
//!
//! ## Getting Started
//!
//! The simplest entry point is [`process_patch`], which reads the files a
//! patch needs, parses it, and writes the result through a [`FileAccess`]
//! implementation such as [`DirAccess`].
//!
//! ```rust
//! use apatch::{process_patch, DirAccess};
//! use std::fs;
//! use tempfile::tempdir;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 1. Set up a temporary directory and a file to be patched.
//! let dir = tempdir()?;
//! fs::create_dir_all(dir.path().join("src"))?;
//! fs::write(
//!     dir.path().join("src/main.rs"),
//!     "fn main() {\n    println!(\"Hello, world!\");\n}\n",
//! )?;
//!
//! // 2. Define the patch.
//! let patch = "\
//! *** Begin Patch
//! *** Update File: src/main.rs
//! @@ fn main() {
//! -    println!(\"Hello, world!\");
//! +    println!(\"Hello, apatch!\");
//!  }
//! *** Add File: NOTES.md
//! +patched
//! *** End Patch";
//!
//! // 3. Apply it.
//! let mut access = DirAccess::new(dir.path());
//! assert_eq!(process_patch(patch, &mut access)?, "Done!");
//!
//! // 4. Verify the files were changed correctly.
//! assert_eq!(
//!     fs::read_to_string(dir.path().join("src/main.rs"))?,
//!     "fn main() {\n    println!(\"Hello, apatch!\");\n}\n"
//! );
//! assert_eq!(fs::read_to_string(dir.path().join("NOTES.md"))?, "patched");
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! ### The Patching Workflow
//!
//! Applying a patch is split into a pure phase and a side-effecting phase:
//!
//! 1.  **Parsing:** [`text_to_patch`] turns the text into a [`Patch`], locating
//!     every hunk in a snapshot of the original files. [`identify_files_needed`]
//!     tells you which files to read for that snapshot.
//! 2.  **Committing:** [`patch_to_commit`] materializes the final content of
//!     every file into a [`Commit`].
//! 3.  **Applying:** [`apply_commit`] writes and removes files through an
//!     injected [`FileAccess`].
//!
//! Steps 1 and 2 never touch the filesystem, so they can be run and tested
//! entirely in memory.
//!
//! ### The Patch Format
//!
//! ```text
//! *** Begin Patch
//! *** Add File: path/to/new.txt
//! +first line
//! +second line
//! *** Delete File: path/to/old.txt
//! *** Update File: path/to/existing.txt
//! *** Move to: path/to/renamed.txt
//! @@ optional line to search for first
//!  context line
//! -removed line
//! +added line
//!  context line
//! *** End of File
//! *** End Patch
//! ```
//!
//! Update hunks start with `@@` (optional for the first hunk of a file) and
//! end at the next hunk, directive, or end-of-file marker (`*** End of File`
//! or `*** EOF`). An end-of-file marker says the hunk's context is the tail
//! of the file.
//!
//! ### Context-Driven Matching
//!
//! [`find_context`] searches for a hunk's context (its unchanged and deleted
//! lines) at or after the end of the previous hunk:
//!
//! - **Exact:** the lines match after Unicode canonicalization ([`canon`]).
//! - **Ignoring trailing whitespace:** costs 1 point of fuzz.
//! - **Ignoring surrounding whitespace:** costs 100 points of fuzz.
//!
//! End-of-file hunks are searched at the tail first; if they are only found
//! further up, 10000 points of fuzz are added. The total fuzz is reported by
//! [`text_to_patch`] for diagnostics.
//!
//! ## Advanced Usage
//!
//! ### In-Memory Operations
//!
//! ```rust
//! use apatch::{patch_to_commit, text_to_patch, ActionType, Originals};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut originals = Originals::new();
//! originals.insert(PathBuf::from("quote.txt"), "it's fine\nreally\n".to_string());
//!
//! // The patch uses a typographic apostrophe; the file does not.
//! let text = "\
//! *** Begin Patch
//! *** Update File: quote.txt
//! -it\u{2019}s fine
//! +it is fine
//!  really
//! *** End Patch";
//!
//! let (patch, fuzz) = text_to_patch(text, &originals)?;
//! assert_eq!(fuzz, 0);
//!
//! let commit = patch_to_commit(&patch, &originals)?;
//! let change = commit.get("quote.txt").unwrap();
//! assert_eq!(change.kind, ActionType::Update);
//! assert_eq!(change.new_content.as_deref(), Some("it is fine\nreally\n"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Custom File Access
//!
//! Implement [`FileAccess`] to apply patches to something other than a local
//! directory, such as a virtual filesystem or an editor buffer set.
//!
//! Application is not transactional: [`apply_commit`] stops at the first
//! failing write or remove and leaves the entries already applied in place.
mod apply;
mod canon;
mod chunk;
mod commit;
mod error;
mod matcher;
mod model;
mod parser;

pub use apply::{
    apply_commit, load_files, plan_patch, process_patch, DirAccess, FileAccess, PatchPlan,
};
pub use canon::canon;
pub use chunk::{peek_next_section, Section};
pub use commit::{get_updated_file, patch_to_commit};
pub use error::PatchError;
pub use matcher::{
    find_context, find_context_core, ContextMatch, MatchTier, FUZZ_EOF_FALLBACK,
    FUZZ_SURROUNDING_WHITESPACE, FUZZ_TRAILING_WHITESPACE,
};
pub use model::{ActionType, Chunk, Commit, FileChange, Originals, Patch, PatchAction};
pub use parser::{
    identify_files_added, identify_files_needed, text_to_patch, ADD_FILE, BEGIN_PATCH,
    DELETE_FILE, END_OF_FILE, END_OF_FILE_SHORT, END_PATCH, MOVE_TO, UPDATE_FILE,
};
