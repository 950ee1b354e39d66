//! Word wrapping for report lines.
//!
//! Widths are display columns (`unicode-width`). A line that fits is kept whole. A longer
//! one breaks before the last whitespace run inside the width, or is cut hard at the width
//! when there is none. A newline inside the window always ends the line.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Wraps `text` to `width` columns, prefixing every produced line with `prefix`.
pub fn word_wrap(text: &str, width: usize, prefix: &str) -> Vec<String> {
    let available = width.saturating_sub(prefix.width()).max(1);
    let mut out = Vec::new();
    let mut rest = text;

    if rest.is_empty() {
        return vec![prefix.trim_end().to_string()];
    }

    while !rest.is_empty() {
        let (line, next) = cut_line(rest, available);
        out.push(format!("{}{}", prefix, line.trim_end()));
        rest = next;
    }
    out
}

/// Splits off the first line of `text`; returns it and the remainder.
fn cut_line(text: &str, available: usize) -> (&str, &str) {
    let mut columns = 0;
    let mut boundary = text.len();
    let mut last_space: Option<(usize, usize)> = None;
    let mut run_start: Option<usize> = None;

    for (index, ch) in text.char_indices() {
        if ch == '\n' || ch == '\r' {
            let after = if text[index..].starts_with("\r\n") {
                index + 2
            } else {
                index + ch.len_utf8()
            };
            return (&text[..index], &text[after..]);
        }

        let ch_width = ch.width().unwrap_or(0);
        if columns + ch_width > available && index > 0 {
            boundary = index;
            break;
        }
        columns += ch_width;

        if ch.is_whitespace() {
            if run_start.is_none() {
                run_start = Some(index);
            }
        } else if let Some(start) = run_start.take() {
            if start > 0 {
                last_space = Some((start, index));
            }
        }
    }

    if boundary == text.len() {
        return (text, "");
    }

    let tail = &text[boundary..];
    // The window ends inside a whitespace run, or right before one.
    if let Some(start) = run_start.filter(|start| *start > 0) {
        return (&text[..start], tail.trim_start_matches(is_blank));
    }
    if tail.starts_with(is_blank) {
        return (&text[..boundary], tail.trim_start_matches(is_blank));
    }
    match last_space {
        Some((start, end)) => (&text[..start], &text[end..]),
        None => (&text[..boundary], tail),
    }
}

fn is_blank(ch: char) -> bool {
    ch.is_whitespace() && ch != '\n' && ch != '\r'
}
