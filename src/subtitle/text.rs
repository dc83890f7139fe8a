//! Cue text cleanup before synthesis

use once_cell::sync::Lazy;
use regex::Regex;

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"</?[A-Za-z][^>]*>|\{\\[^}]*\}").expect("markup regex is valid")
});

/// Strip markup, unescape the usual entities and collapse whitespace.
///
/// Handles the HTML-like tags SRT files carry (`<i>`, `<font ...>`) and
/// ASS-style override blocks (`{\an8}`).
pub fn clean_cue_text(text: &str) -> String {
    let text = MARKUP_TAG.replace_all(text, "");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}
