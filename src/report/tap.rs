//! TAP version 13 rendering.

use std::io::Write;
use std::path::{Path, PathBuf};

use termcolor::{Ansi, Color, ColorSpec, WriteColor};

use crate::errors::Failure;
use crate::report::output::OutputSink;
use crate::report::wrap::word_wrap;
use crate::report::yaml::{self, Entry, Field};
use crate::report::{CaseReport, FatalReport, Reporter};
use crate::suite::Totals;

/// Indentation of diagnostic blocks.
const BLOCK_PREFIX: &str = "  ";

/// Fallback width when stdout is not a terminal.
pub const DEFAULT_LINE_LENGTH: usize = 80;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Rendering options for [`TapReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapConfig {
    /// Column width every output line is wrapped to.
    pub line_length: usize,
    /// Emit ANSI colour sequences.
    pub color: bool,
    /// Suite directory, relative to the working directory. Location entries outside it are
    /// dimmed.
    pub dir: Option<PathBuf>,
}

impl Default for TapConfig {
    fn default() -> Self {
        let is_tty = atty::is(atty::Stream::Stdout);
        let line_length = if is_tty {
            terminal_size::terminal_size()
                .map(|(width, _)| usize::from(width.0))
                .unwrap_or(DEFAULT_LINE_LENGTH)
        } else {
            DEFAULT_LINE_LENGTH
        };
        Self {
            line_length,
            color: is_tty,
            dir: None,
        }
    }
}

impl TapConfig {
    /// Uncoloured output at a fixed width.
    pub fn plain(line_length: usize) -> Self {
        Self {
            line_length,
            color: false,
            dir: None,
        }
    }
}

// ============================================================================
// REPORTER
// ============================================================================

/// Writes TAP 13 to an [`OutputSink`], one line at a time.
pub struct TapReporter<S: OutputSink> {
    sink: S,
    config: TapConfig,
}

impl<S: OutputSink> TapReporter<S> {
    pub fn new(sink: S, config: TapConfig) -> Self {
        Self { sink, config }
    }

    pub fn config(&self) -> &TapConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn emit(&mut self, line: &str) {
        self.sink.emit(line);
    }

    /// Wraps `text` at the full width; `paint` is applied to each produced line.
    fn emit_wrapped(&mut self, text: &str, paint: Option<&ColorSpec>) {
        for line in word_wrap(text, self.config.line_length, "") {
            let line = match paint {
                Some(spec) if self.config.color => paint_text(&line, spec),
                _ => line,
            };
            self.emit(&line);
        }
    }

    fn emit_status(&mut self, case: &CaseReport<'_>) {
        let word = if case.passed() { "ok" } else { "not ok" };
        let line = format!("{} {} - {}", word, case.number, case.title);
        let lines = word_wrap(&line, self.config.line_length, "");

        for (index, line) in lines.into_iter().enumerate() {
            if index == 0 && self.config.color {
                let spec = status_spec(case.passed());
                let rest = line.strip_prefix(word).unwrap_or(&line);
                self.emit(&format!("{}{}", paint_text(word, &spec), rest));
            } else {
                self.emit(&line);
            }
        }
    }

    fn emit_diagnostics(&mut self, failure: &Failure) {
        let mut fields = vec![("message", Field::Scalar(failure.message().to_string()))];
        if let Some(assertion) = failure.assertion_details() {
            fields.push(("operator", Field::Scalar(assertion.operator.clone())));
            fields.push(("actual", Field::Scalar(assertion.actual.clone())));
            fields.push(("expected", Field::Scalar(assertion.expected.clone())));
        }
        fields.push(("location", Field::List(self.locations(failure))));

        let width = self.config.line_length;
        let muted = muted_spec();
        self.emit(&format!("{}---", BLOCK_PREFIX));
        for line in yaml::render(&fields) {
            let prefix = format!("{}{}", BLOCK_PREFIX, " ".repeat(line.indent));
            for wrapped in word_wrap(&line.text, width, &prefix) {
                if line.muted && self.config.color {
                    let body = wrapped.strip_prefix(prefix.as_str()).unwrap_or(&wrapped);
                    self.emit(&format!("{}{}", prefix, paint_text(body, &muted)));
                } else {
                    self.emit(&wrapped);
                }
            }
        }
        self.emit(&format!("{}...", BLOCK_PREFIX));
    }

    fn locations(&self, failure: &Failure) -> Vec<Entry> {
        let Some(trace) = failure.trace() else {
            return Vec::new();
        };
        trace
            .frames()
            .iter()
            .map(|frame| Entry {
                text: format!("{} ({})", frame.label(), frame.position()),
                muted: !self.is_inside_dir(&frame.file),
            })
            .collect()
    }

    fn is_inside_dir(&self, file: &Path) -> bool {
        match &self.config.dir {
            Some(dir) => file.starts_with(dir),
            None => true,
        }
    }

    fn emit_count(&mut self, name: &str, value: String) {
        let value = if self.config.color {
            paint_text(&value, ColorSpec::new().set_bold(true))
        } else {
            value
        };
        self.emit(&format!("# {}: {}", name, value));
    }
}

impl<S: OutputSink> Reporter for TapReporter<S> {
    fn report_start(&mut self, total: usize) {
        self.emit("TAP version 13");
        self.emit(&format!("1..{}", total));
        self.emit("");
    }

    fn report_case(&mut self, case: &CaseReport<'_>) {
        let comment = format!("# {}", case.path.join(" :: "));
        self.emit_wrapped(&comment, Some(&muted_spec()));
        self.emit_status(case);
        if let Some(failure) = case.failure {
            self.emit_diagnostics(failure);
        }
    }

    fn report_end(&mut self, totals: &Totals) {
        self.emit("");
        self.emit_count("test", totals.total.to_string());
        self.emit_count("pass", totals.pass.to_string());
        self.emit_count("fail", totals.fail().to_string());
        let rate = format!("{:.2}", totals.rate());
        let rate = if self.config.color {
            paint_text(&rate, ColorSpec::new().set_bold(true))
        } else {
            rate
        };
        self.emit(&format!("# rate: {}%", rate));
    }

    fn report_fatal(&mut self, fatal: &FatalReport) {
        self.emit("");
        let headline = format!("Bail out! {} at {}", fatal.label, fatal.path.join(" / "));
        self.emit_wrapped(&headline, None);
        if let Some(stack) = &fatal.stack {
            self.emit_wrapped(stack.trim_end(), None);
        }
    }
}

// ============================================================================
// COLOUR
// ============================================================================

fn status_spec(passed: bool) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_bold(true)
        .set_fg(Some(if passed { Color::Green } else { Color::Red }));
    spec
}

fn muted_spec() -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(Color::Black)).set_intense(true);
    spec
}

/// Wraps `text` in the ANSI sequences for `spec`.
fn paint_text(text: &str, spec: &ColorSpec) -> String {
    let mut ansi = Ansi::new(Vec::new());
    if ansi.set_color(spec).is_err()
        || ansi.write_all(text.as_bytes()).is_err()
        || ansi.reset().is_err()
    {
        return text.to_string();
    }
    String::from_utf8(ansi.into_inner()).unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Assertion;
    use crate::report::OutputBuffer;
    use crate::suite::Kind;

    fn reporter(width: usize) -> TapReporter<OutputBuffer> {
        TapReporter::new(OutputBuffer::new(), TapConfig::plain(width))
    }

    fn lines(reporter: TapReporter<OutputBuffer>) -> Vec<String> {
        reporter.into_sink().lines().map(str::to_string).collect()
    }

    #[test]
    fn header_and_plan() {
        let mut tap = reporter(80);
        tap.report_start(2);
        assert_eq!(lines(tap), vec!["TAP version 13", "1..2", ""]);
    }

    #[test]
    fn empty_plan_starts_at_one() {
        let mut tap = reporter(80);
        tap.report_start(0);
        assert_eq!(lines(tap)[1], "1..0");
    }

    #[test]
    fn passing_and_failing_cases() {
        let path = vec!["Token".to_string(), "mints".to_string()];
        let failure = Failure::thrown("boom");
        let mut tap = reporter(80);
        tap.report_case(&CaseReport {
            number: 1,
            title: "mints",
            path: &path,
            failure: None,
        });
        tap.report_case(&CaseReport {
            number: 2,
            title: "mints",
            path: &path,
            failure: Some(&failure),
        });

        assert_eq!(
            lines(tap),
            vec![
                "# Token :: mints",
                "ok 1 - mints",
                "# Token :: mints",
                "not ok 2 - mints",
                "  ---",
                "  message: \"boom\"",
                "  ...",
            ]
        );
    }

    #[test]
    fn assertion_fields_follow_message() {
        let path = vec!["sum".to_string()];
        let failure = Failure::assertion("bad sum", Assertion::new("==", 3, 4));
        let mut tap = reporter(200);
        tap.report_case(&CaseReport {
            number: 1,
            title: "sum",
            path: &path,
            failure: Some(&failure),
        });

        let out = lines(tap);
        assert_eq!(out[3], "  message:  \"bad sum\"");
        assert_eq!(out[4], "  operator: \"==\"");
        assert_eq!(out[5], "  actual:   \"3\"");
        assert_eq!(out[6], "  expected: \"4\"");
        assert_eq!(out[7], "  location:");
        assert!(out[8].starts_with("    - \""));
        assert_eq!(out.last().map(String::as_str), Some("  ..."));
    }

    #[test]
    fn summary_rates() {
        let mut tap = reporter(80);
        tap.report_end(&Totals { total: 3, pass: 2 });
        assert_eq!(
            lines(tap),
            vec!["", "# test: 3", "# pass: 2", "# fail: 1", "# rate: 66.67%"]
        );

        let mut tap = reporter(80);
        tap.report_end(&Totals::default());
        assert_eq!(lines(tap).last().map(String::as_str), Some("# rate: 0.00%"));
    }

    #[test]
    fn bail_out_names_the_item() {
        let failure = Failure::thrown("no ledger");
        let fatal = FatalReport::new(
            Kind::Before,
            "before".to_string(),
            vec!["Ledger".to_string(), "transfers".to_string()],
            Some(&failure),
        );
        let mut tap = reporter(80);
        tap.report_fatal(&fatal);
        assert_eq!(
            lines(tap),
            vec!["", "Bail out! before at Ledger / transfers", "no ledger"]
        );
    }

    #[test]
    fn folded_messages_keep_their_indent_when_wrapped() {
        let path = vec!["x".to_string()];
        let failure = Failure::thrown("first line\nsecond line is rather long and must wrap here");
        let mut tap = reporter(30);
        tap.report_case(&CaseReport {
            number: 1,
            title: "x",
            path: &path,
            failure: Some(&failure),
        });

        assert_eq!(
            lines(tap),
            vec![
                "# x",
                "not ok 1 - x",
                "  ---",
                "  message: >",
                "    first line",
                "    second line is rather long",
                "    and must wrap here",
                "  ...",
            ]
        );
    }

    #[test]
    fn long_titles_wrap() {
        let path = vec!["x".to_string()];
        let mut tap = reporter(12);
        tap.report_case(&CaseReport {
            number: 1,
            title: "moves funds",
            path: &path,
            failure: None,
        });
        assert_eq!(lines(tap), vec!["# x", "ok 1 - moves", "funds"]);
    }

    #[test]
    fn colour_paints_status_word() {
        let path = vec!["x".to_string()];
        let mut tap = TapReporter::new(
            OutputBuffer::new(),
            TapConfig {
                line_length: 80,
                color: true,
                dir: None,
            },
        );
        tap.report_case(&CaseReport {
            number: 1,
            title: "x",
            path: &path,
            failure: None,
        });
        let out = lines(tap);
        assert!(out[1].contains("\u{1b}["));
        assert!(out[1].ends_with(" 1 - x"));
    }
}
