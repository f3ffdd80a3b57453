//! Helpers for putting player-supplied text into log lines.
//!
//! Chat messages can carry newlines, tabs and other control characters; logging them raw
//! splits one event across several lines and makes the log file hard to grep.

use std::fmt::Write;

/// Longest preview of a chat message kept in a log line, in characters.
pub const MAX_LOG_PREVIEW: usize = 200;

/// Render `s` on a single line: backslash escapes for `\\`, `\n`, `\r`, `\t`, `\xNN` for
/// any other control character, cut at [`MAX_LOG_PREVIEW`] characters with a trailing `…`.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_LOG_PREVIEW) + 4);
    let mut chars = s.chars();
    for ch in chars.by_ref().take(MAX_LOG_PREVIEW) {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    if chars.next().is_some() {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_text_stays_on_one_line() {
        assert_eq!(escape_log("lift\nlift\t\\"), "lift\\nlift\\t\\\\");
        assert_eq!(escape_log("a\u{7}b"), "a\\x07b");
    }

    #[test]
    fn long_messages_are_cut() {
        let long = "x".repeat(MAX_LOG_PREVIEW + 10);
        let out = escape_log(&long);
        assert!(out.ends_with('…'));
        assert_eq!(out.chars().count(), MAX_LOG_PREVIEW + 1);
        assert_eq!(escape_log(&"y".repeat(MAX_LOG_PREVIEW)).chars().count(), MAX_LOG_PREVIEW);
    }
}
