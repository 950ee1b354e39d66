//! The YAML-ish body of a TAP diagnostic block.

/// A diagnostic field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Scalar(String),
    List(Vec<Entry>),
}

/// A list item; `muted` entries are dimmed when colour is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub text: String,
    pub muted: bool,
}

/// One rendered line of the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlLine {
    /// Columns the line sits in from the block margin. Wrapped continuations keep it.
    pub indent: usize,
    pub text: String,
    pub muted: bool,
}

impl YamlLine {
    fn plain(text: String) -> Self {
        Self {
            indent: 0,
            text,
            muted: false,
        }
    }

    fn folded(text: &str) -> Self {
        Self {
            indent: FOLD_INDENT,
            text: text.to_string(),
            muted: false,
        }
    }
}

/// Indentation of the body of a folded `>` scalar.
const FOLD_INDENT: usize = 2;

/// Renders `fields` in order. Scalar keys are padded to the longest scalar key; empty
/// lists are left out.
pub fn render(fields: &[(&str, Field)]) -> Vec<YamlLine> {
    let key_width = fields
        .iter()
        .filter(|(_, value)| matches!(value, Field::Scalar(_)))
        .map(|(key, _)| key.len())
        .max()
        .unwrap_or(0);

    let mut out = Vec::new();
    for (key, value) in fields {
        match value {
            Field::Scalar(text) if is_multiline(text) => {
                out.push(YamlLine::plain(format!("{}: >", key)));
                out.extend(text.lines().map(YamlLine::folded));
            }
            Field::Scalar(text) => {
                let align = " ".repeat(key_width - key.len());
                out.push(YamlLine::plain(format!("{}: {}{}", key, align, quote(text))));
            }
            Field::List(entries) if entries.is_empty() => {}
            Field::List(entries) => {
                out.push(YamlLine::plain(format!("{}:", key)));
                out.extend(entries.iter().map(|entry| YamlLine {
                    indent: 0,
                    text: format!("  - {}", quote(&entry.text)),
                    muted: entry.muted,
                }));
            }
        }
    }
    out
}

fn is_multiline(text: &str) -> bool {
    text.contains('\n') || text.contains('\r')
}

/// Double-quoted scalar with `\` and `"` escaped.
pub fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: Vec<YamlLine>) -> Vec<String> {
        lines.into_iter().map(|line| line.text).collect()
    }

    #[test]
    fn scalars_are_quoted_and_aligned() {
        let lines = render(&[
            ("message", Field::Scalar("boom".into())),
            ("operator", Field::Scalar("==".into())),
        ]);
        assert_eq!(texts(lines), vec!["message:  \"boom\"", "operator: \"==\""]);
    }

    #[test]
    fn list_keys_do_not_widen_alignment() {
        let lines = render(&[
            ("message", Field::Scalar("boom".into())),
            (
                "location",
                Field::List(vec![Entry {
                    text: "run (tests/a.rs:1:2)".into(),
                    muted: true,
                }]),
            ),
        ]);
        assert_eq!(lines[0].text, "message: \"boom\"");
        assert_eq!(lines[1].text, "location:");
        assert_eq!(lines[2].text, "  - \"run (tests/a.rs:1:2)\"");
        assert!(lines[2].muted);
    }

    #[test]
    fn multiline_scalars_fold() {
        let lines = render(&[("message", Field::Scalar("one\ntwo".into()))]);
        assert_eq!(lines[1].indent, 2);
        assert_eq!(lines[2].indent, 2);
        assert_eq!(texts(lines), vec!["message: >", "one", "two"]);
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(quote(r#"say "hi" \o/"#), r#""say \"hi\" \\o/""#);
    }

    #[test]
    fn empty_lists_are_dropped() {
        let lines = render(&[
            ("message", Field::Scalar("x".into())),
            ("location", Field::List(Vec::new())),
        ]);
        assert_eq!(lines.len(), 1);
    }
}
