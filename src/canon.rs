use unicode_normalization::UnicodeNormalization;

/// Normalizes a string so that visually equivalent text compares equal.
///
/// The input is first brought into Unicode composed form (NFC). Then dash,
/// quote and space variants that models and editors like to substitute for
/// one another are folded onto a single ASCII character each.
///
/// The function is total and idempotent. Callers apply it to whole
/// newline-joined blocks rather than to individual lines.
///
/// # Example
///
/// ```
/// # use apatch::canon;
/// assert_eq!(canon("it\u{2019}s \u{201C}done\u{201D} \u{2014} ok"), "it's \"done\" - ok");
/// assert_eq!(canon(&canon("caf\u{0065}\u{0301}")), canon("caf\u{00E9}"));
/// ```
pub fn canon(s: &str) -> String {
    s.nfc().map(fold_punctuation).collect()
}

/// Maps a single code point onto its ASCII representative, if it has one.
fn fold_punctuation(c: char) -> char {
    match c {
        // Hyphens, dashes and the minus sign.
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => '-',
        // Double quotes and guillemets.
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => '"',
        // Single quotes.
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
        // Non-breaking, fixed-width and narrow spaces.
        '\u{00A0}' | '\u{2002}' | '\u{2003}' | '\u{2004}' | '\u{2005}' | '\u{2006}'
        | '\u{2007}' | '\u{2008}' | '\u{2009}' | '\u{200A}' | '\u{202F}' | '\u{205F}'
        | '\u{3000}' => ' ',
        other => other,
    }
}
