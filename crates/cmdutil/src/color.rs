//! ANSI colour stripping.

use once_cell::sync::Lazy;
use regex::Regex;

static COLOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[\d+m").unwrap());

/// Removes `ESC[<n>m` colour sequences from `text`.
///
/// ```
/// assert_eq!(cmdutil::clean_color("\x1b[31mred\x1b[0m"), "red");
/// ```
pub fn clean_color(text: &str) -> String {
    COLOR_RE.replace_all(text, "").into_owned()
}
