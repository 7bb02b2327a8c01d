//! Rendering binder failures for humans.
//!
//! A [`Diagnostic`] is built from a [`BindError`] and rendered through
//! `ariadne` with colour disabled, so the output is stable in tests and logs.

use ariadne::{Config, Label, Report, ReportKind, Source};

use crate::error::{BindError, SynthesisFailure};
use crate::span::Span;

/// A labelled source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticLabel {
    pub span: Span,
    pub message: String,
}

/// A renderable binder failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    /// Secondary locations, e.g. every tied candidate of an ambiguous call.
    pub labels: Vec<DiagnosticLabel>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn from_error(error: &BindError) -> Self {
        let mut diagnostic = Self {
            message: error.to_string(),
            span: error.span(),
            labels: Vec::new(),
            notes: Vec::new(),
        };
        match error {
            BindError::AmbiguousCall { candidates, .. } => {
                for candidate in candidates {
                    diagnostic.labels.push(DiagnosticLabel {
                        span: candidate.span,
                        message: format!("candidate: {}", candidate.signature),
                    });
                }
                if candidates.iter().all(|c| c.span.is_dummy()) {
                    diagnostic.notes.extend(candidates.iter().map(|c| format!("candidate: {}", c.signature)));
                }
            }
            BindError::SpecialMemberGeneration { reason: SynthesisFailure::SubOperation(inner), .. } => {
                if !inner.span().is_dummy() {
                    diagnostic.labels.push(DiagnosticLabel {
                        span: inner.span(),
                        message: "required here".to_string(),
                    });
                }
            }
            _ => {}
        }
        diagnostic
    }

    /// Render against the source text of `file_name`.
    pub fn render(&self, file_name: &str, source: &str) -> String {
        let mut report = Report::build(ReportKind::Error, file_name, self.span.start)
            .with_config(Config::default().with_color(false))
            .with_message(&self.message);
        if !self.span.is_dummy() {
            report = report.with_label(Label::new((file_name, self.span.range())).with_message(&self.message));
        }
        for label in self.labels.iter().filter(|l| !l.span.is_dummy()) {
            report = report.with_label(Label::new((file_name, label.span.range())).with_message(&label.message));
        }
        if !self.notes.is_empty() {
            report = report.with_note(self.notes.join("\n"));
        }

        let mut out = Vec::new();
        match report.finish().write((file_name, Source::from(source)), &mut out) {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => format!("error: {}", self.message),
        }
    }
}

impl From<&BindError> for Diagnostic {
    fn from(error: &BindError) -> Self {
        Diagnostic::from_error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CandidateNote;

    #[test]
    fn test_ambiguity_lists_every_candidate() {
        let error = BindError::AmbiguousCall {
            name: "f".to_string(),
            candidates: vec![
                CandidateNote { signature: "f(int, long)".to_string(), span: Span::new(0, 5) },
                CandidateNote { signature: "f(long, int)".to_string(), span: Span::new(7, 12) },
            ],
            span: Span::new(14, 22),
        };
        let diagnostic = Diagnostic::from_error(&error);
        assert_eq!(diagnostic.labels.len(), 2);
        assert_eq!(diagnostic.span, Span::new(14, 22));

        let source = "f(a,b)\nf(c,d)\ncall(1,2)\n";
        let rendered = diagnostic.render("test.cm", source);
        assert!(rendered.contains("ambiguous"));
        assert!(rendered.contains("candidate: f(int, long)"));
        assert!(rendered.contains("candidate: f(long, int)"));
    }

    #[test]
    fn test_render_without_span_still_reports_message() {
        let error = BindError::DivisionByZero { span: Span::dummy() };
        let rendered = Diagnostic::from_error(&error).render("test.cm", "const int x = 1 / 0;");
        assert!(rendered.contains("division by zero"));
    }
}
