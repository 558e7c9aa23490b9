//! Build diagnostics and their compiler-style rendering.
//!
//! The rendered log is the contract: it is handed back verbatim inside
//! `BuildOutcome::Failed` and must carry everything needed to fix the
//! source, positions included.

use super::ast::Span;

/// The pseudo file name used in diagnostic positions. Kernel source arrives
/// as a string, so there is no real path to point at.
pub const SOURCE_NAME: &str = "<kernel-source>";

#[derive(Debug, Clone)]
pub struct Diag {
    pub span: Span,
    pub message: String,
}

impl Diag {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self { span, message: message.into() }
    }
}

/// Byte-offset → line/column mapping for one source string.
pub struct LineMap<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineMap<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.char_indices().filter(|&(_, c)| c == '\n').map(|(i, _)| i + 1));
        Self { source, line_starts }
    }

    /// 1-based (line, column) of a byte offset.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line - 1];
        let column = self.source[line_start..offset].chars().count() + 1;
        (line, column)
    }

    fn line_text(&self, line: usize) -> &'a str {
        let start = self.line_starts[line - 1];
        let end = self.line_starts.get(line).map_or(self.source.len(), |&next| next);
        self.source[start..end].trim_end_matches(['\n', '\r'])
    }

    /// Render one diagnostic with the offending line and a caret.
    fn render(&self, diag: &Diag) -> String {
        let offset = diag.span.start.min(self.source.len());
        let (line, column) = self.position(offset);
        let text = self.line_text(line);

        let mut out = format!("{SOURCE_NAME}:{line}:{column}: error: {}\n", diag.message);
        out.push_str(text);
        out.push('\n');
        out.extend(std::iter::repeat_n(' ', column - 1));
        out.push('^');
        out
    }
}

/// Render all diagnostics into the build log, in source order.
pub fn render_log(source: &str, diags: &[Diag]) -> String {
    let map = LineMap::new(source);

    let mut ordered: Vec<&Diag> = diags.iter().collect();
    ordered.sort_by_key(|d| d.span.start);

    let body: Vec<String> = ordered.iter().map(|d| map.render(d)).collect();
    let noun = if diags.len() == 1 { "error" } else { "errors" };
    format!("{}\n{} {noun} generated.", body.join("\n"), diags.len())
}
