//! Rendering errors for the host.
//!
//! Two formats, selected by host configuration: `Snippet` embeds an
//! annotated code excerpt (what an editor panel wants), `LineOnly` is a
//! single `file:line:` prefixed line (what a log or a status bar wants).

use ariadne::{Config, Label, Report, ReportKind, Source};

use crate::Error;

/// Host-selectable diagnostic format.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum ReportFormat {
    /// Annotated source excerpt.
    #[default]
    Snippet,
    /// `file:line: error[code]: message`
    LineOnly,
}

/// Render one error against the preprocessed source it points into.
pub fn render(error: &Error, file_name: &str, source: &str, format: ReportFormat) -> String {
    match format {
        ReportFormat::LineOnly => render_line_only(error, file_name, source),
        ReportFormat::Snippet => render_snippet(error, file_name, source),
    }
}

fn line_of_offset(source: &str, offset: usize) -> usize {
    let clamped = offset.min(source.len());
    source[..clamped].bytes().filter(|&b| b == b'\n').count() + 1
}

fn render_line_only(error: &Error, file_name: &str, source: &str) -> String {
    match error.location() {
        Some(location) => {
            let line = line_of_offset(source, location.span.start as usize);
            format!("{file_name}:{line}: error[{}]: {error}", error.code())
        }
        None => format!("{file_name}: error[{}]: {error}", error.code()),
    }
}

fn render_snippet(error: &Error, file_name: &str, source: &str) -> String {
    let Some(location) = error.location() else {
        // No span to excerpt (bind-time errors); fall back.
        return render_line_only(error, file_name, source);
    };

    let start = (location.span.start as usize).min(source.len());
    let mut end = (location.span.end as usize).clamp(start, source.len());
    if end == start {
        // Zero-width spans (EOF errors) still need a visible marker.
        end = (start + 1).min(source.len()).max(start);
    }

    let report = Report::build(ReportKind::Error, file_name, start)
        .with_config(Config::default().with_color(false))
        .with_code(error.code().as_str())
        .with_message(error.to_string())
        .with_label(Label::new((file_name, start..end)))
        .finish();

    let mut out = Vec::new();
    if report
        .write((file_name, Source::from(source)), &mut out)
        .is_err()
    {
        return render_line_only(error, file_name, source);
    }
    String::from_utf8(out).unwrap_or_else(|_| render_line_only(error, file_name, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sono_ir::Span;

    const SOURCE: &str = "int main(int x)\n{\n    return y + 1;\n}\n";

    #[test]
    fn line_only_points_at_the_right_line() {
        let error = Error::unresolved("y", Span::new(29, 30));
        let text = render(&error, "kernel.sono", SOURCE, ReportFormat::LineOnly);
        assert_eq!(text, "kernel.sono:3: error[E0002]: unresolved symbol 'y'");
    }

    #[test]
    fn snippet_contains_the_offending_source() {
        let error = Error::unresolved("y", Span::new(29, 30));
        let text = render(&error, "kernel.sono", SOURCE, ReportFormat::Snippet);
        assert!(text.contains("return y + 1;"), "snippet missing excerpt: {text}");
        assert!(text.contains("E0002"));
    }

    #[test]
    fn missing_location_degrades_to_line_only() {
        let error = Error::signature_mismatch("expected float return");
        let text = render(&error, "kernel.sono", SOURCE, ReportFormat::Snippet);
        assert!(text.starts_with("kernel.sono: error[E0007]"));
    }
}
