use crate::canon::canon;
use log::{debug, trace, warn};

/// Fuzz charged when a hunk only matches after ignoring trailing whitespace.
pub const FUZZ_TRAILING_WHITESPACE: usize = 1;
/// Fuzz charged when a hunk only matches after ignoring surrounding whitespace.
pub const FUZZ_SURROUNDING_WHITESPACE: usize = 100;
/// Extra fuzz charged when an end-of-file hunk does not match the file's tail
/// and is found further up instead.
pub const FUZZ_EOF_FALLBACK: usize = 10_000;

/// Describes how strictly a context block had to be compared to be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// The canonicalized lines are identical.
    Exact,
    /// Identical after stripping trailing whitespace from every line.
    IgnoringTrailingWhitespace,
    /// Identical after stripping leading and trailing whitespace from every line.
    IgnoringSurroundingWhitespace,
}

impl MatchTier {
    /// The tiers, strictest first.
    pub const ALL: [MatchTier; 3] = [
        MatchTier::Exact,
        MatchTier::IgnoringTrailingWhitespace,
        MatchTier::IgnoringSurroundingWhitespace,
    ];

    /// The fuzz penalty for a match found at this tier.
    pub fn fuzz(self) -> usize {
        match self {
            MatchTier::Exact => 0,
            MatchTier::IgnoringTrailingWhitespace => FUZZ_TRAILING_WHITESPACE,
            MatchTier::IgnoringSurroundingWhitespace => FUZZ_SURROUNDING_WHITESPACE,
        }
    }

    fn strip(self, line: &str) -> &str {
        match self {
            MatchTier::Exact => line,
            MatchTier::IgnoringTrailingWhitespace => line.trim_end(),
            MatchTier::IgnoringSurroundingWhitespace => line.trim(),
        }
    }

    /// Builds the comparison key of a block of lines for this tier.
    fn key<S: AsRef<str>>(self, lines: &[S]) -> String {
        let stripped: Vec<&str> = lines.iter().map(|l| self.strip(l.as_ref())).collect();
        canon(&stripped.join("\n"))
    }
}

/// Where a context block was found and how much approximation it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextMatch {
    /// 0-based index of the first matched line in the file.
    pub index: usize,
    /// Penalty for the match; 0 means exact.
    pub fuzz: usize,
    /// The tier at which the match was found.
    pub tier: MatchTier,
}

/// Searches `lines` for `context`, starting at line `start`.
///
/// Every tier of [`MatchTier::ALL`] scans the whole searchable range before
/// the next, more lenient tier is tried. The first window that matches wins.
/// An empty context matches at `start` with no fuzz. Returns `None` when no
/// tier finds the block.
pub fn find_context_core<L, C>(lines: &[L], context: &[C], start: usize) -> Option<ContextMatch>
where
    L: AsRef<str>,
    C: AsRef<str>,
{
    if context.is_empty() {
        trace!("    Context is empty, matching at start index {}.", start);
        return Some(ContextMatch {
            index: start,
            fuzz: 0,
            tier: MatchTier::Exact,
        });
    }

    let len = context.len();
    // The last index at which a full window still fits.
    let Some(last) = lines.len().checked_sub(len) else {
        trace!(
            "    Context ({} lines) is longer than the file ({} lines).",
            len,
            lines.len()
        );
        return None;
    };
    if start > last {
        trace!("    No window of {} lines starts at or after {}.", len, start);
        return None;
    }

    for tier in MatchTier::ALL {
        trace!("    Attempting {:?} match from index {}...", tier, start);
        let wanted = tier.key(context);
        if let Some(index) = (start..=last).find(|&i| tier.key(&lines[i..i + len]) == wanted) {
            debug!(
                "    Found {:?} match at index {} (fuzz {}).",
                tier,
                index,
                tier.fuzz()
            );
            return Some(ContextMatch {
                index,
                fuzz: tier.fuzz(),
                tier,
            });
        }
    }

    debug!("    Failed to find context in any tier.");
    None
}

/// Locates a hunk's context block in a file.
///
/// When `anchor_at_eof` is set, the block is first expected to be the tail of
/// the file. If it is not, the normal search from `start` is retried and a
/// successful result is charged an extra [`FUZZ_EOF_FALLBACK`], so that a
/// hunk found that way is never mistaken for a true tail match.
///
/// # Example
///
/// ```
/// # use apatch::{find_context, MatchTier};
/// let file = ["fn main() {", "    run();", "}", ""];
///
/// let found = find_context(&file, &["    run();  ", "}"], 0, false).unwrap();
/// assert_eq!(found.index, 1);
/// assert_eq!(found.tier, MatchTier::IgnoringTrailingWhitespace);
///
/// // `"}"` is not the file's last line, so an EOF-anchored search falls back.
/// let found = find_context(&file, &["}"], 0, true).unwrap();
/// assert_eq!(found.index, 2);
/// assert_eq!(found.fuzz, 10_000);
///
/// assert!(find_context(&file, &["missing"], 0, false).is_none());
/// ```
pub fn find_context<L, C>(
    lines: &[L],
    context: &[C],
    start: usize,
    anchor_at_eof: bool,
) -> Option<ContextMatch>
where
    L: AsRef<str>,
    C: AsRef<str>,
{
    if !anchor_at_eof {
        return find_context_core(lines, context, start);
    }

    if let Some(tail_start) = lines.len().checked_sub(context.len()) {
        trace!("    Trying end-of-file anchor at index {}.", tail_start);
        if let Some(found) = find_context_core(lines, context, tail_start) {
            return Some(found);
        }
    }

    warn!("    End-of-file context does not match the file's tail. Searching from line {}.", start + 1);
    find_context_core(lines, context, start).map(|found| ContextMatch {
        fuzz: found.fuzz + FUZZ_EOF_FALLBACK,
        ..found
    })
}
