//! Structured compile-time diagnostics.
//!
//! Every stage reports problems as [Diagnostic] values rather than strings so
//! that tooling can inspect the kind and position without re-parsing the
//! rendered message. [SourceFile] turns spans into line/column pairs for the
//! command-line renderer.

use std::fmt::{self, Write};

use crate::{
    lexer::LexErrorKind,
    token::{Span, TokenKind},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lex(LexErrorKind),

    UnexpectedToken {
        expected: &'static [TokenKind],
        found: TokenKind,
    },
    InvalidLiteral {
        text: String,
        reason: &'static str,
    },
    NestingTooDeep {
        limit: usize,
    },

    DuplicateDeclaration {
        name: String,
        /// `None` when the earlier declaration is a built-in.
        previous: Option<Span>,
    },
    UndefinedSymbol {
        name: String,
    },
    ImmutableAssignment {
        name: String,
    },

    UnknownType {
        name: String,
    },
    TypeMismatch {
        op: String,
        left: String,
        right: String,
    },
    UnexpectedType {
        expected: String,
        found: String,
    },
    InvalidOperand {
        op: String,
        ty: String,
    },
    LiteralOutOfRange {
        literal: String,
        ty: String,
    },
    MissingReturn {
        proc_name: String,
        ty: String,
    },
    ReturnTypeMismatch {
        expected: String,
        found: String,
    },
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },
    ArgumentMismatch {
        callee: String,
        index: usize,
        expected: String,
        found: String,
    },
    NotCallable {
        name: String,
    },
    NotAValue {
        name: String,
    },
    VoidValue,
    FormatString {
        reason: &'static str,
    },
    FormatArity {
        expected: usize,
        found: usize,
    },
    MissingEntryPoint,
    InvalidEntryPoint {
        reason: &'static str,
    },
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::Lex(kind) => match kind {
                LexErrorKind::UnterminatedString => "E0101",
                LexErrorKind::UnterminatedComment => "E0102",
                LexErrorKind::InvalidCharacter(_) => "E0103",
                LexErrorKind::InvalidEscape(_) => "E0104",
                LexErrorKind::InvalidNumber => "E0105",
            },
            DiagnosticKind::UnexpectedToken { .. } => "E0201",
            DiagnosticKind::InvalidLiteral { .. } => "E0202",
            DiagnosticKind::NestingTooDeep { .. } => "E0203",
            DiagnosticKind::DuplicateDeclaration { .. } => "E0301",
            DiagnosticKind::UndefinedSymbol { .. } => "E0302",
            DiagnosticKind::ImmutableAssignment { .. } => "E0303",
            DiagnosticKind::UnknownType { .. } => "E0401",
            DiagnosticKind::TypeMismatch { .. } => "E0402",
            DiagnosticKind::UnexpectedType { .. } => "E0403",
            DiagnosticKind::InvalidOperand { .. } => "E0404",
            DiagnosticKind::LiteralOutOfRange { .. } => "E0405",
            DiagnosticKind::MissingReturn { .. } => "E0406",
            DiagnosticKind::ReturnTypeMismatch { .. } => "E0407",
            DiagnosticKind::ArityMismatch { .. } => "E0408",
            DiagnosticKind::ArgumentMismatch { .. } => "E0409",
            DiagnosticKind::NotCallable { .. } => "E0410",
            DiagnosticKind::NotAValue { .. } => "E0411",
            DiagnosticKind::VoidValue => "E0412",
            DiagnosticKind::FormatString { .. } => "E0413",
            DiagnosticKind::FormatArity { .. } => "E0414",
            DiagnosticKind::MissingEntryPoint => "E0415",
            DiagnosticKind::InvalidEntryPoint { .. } => "E0416",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Lex(kind) => kind.fmt(f),
            DiagnosticKind::UnexpectedToken { expected, found } => {
                write!(f, "expected ")?;
                match expected {
                    [] => write!(f, "something else")?,
                    [only] => write!(f, "{}", only)?,
                    [init @ .., last] => {
                        write!(f, "one of ")?;
                        for kind in init {
                            write!(f, "{}, ", kind)?;
                        }
                        write!(f, "or {}", last)?;
                    }
                }
                write!(f, ", found {}", found)
            }
            DiagnosticKind::InvalidLiteral { text, reason } => {
                write!(f, "invalid literal `{}`: {}", text, reason)
            }
            DiagnosticKind::NestingTooDeep { limit } => {
                write!(f, "nesting exceeds the limit of {} levels", limit)
            }
            DiagnosticKind::DuplicateDeclaration { name, previous } => match previous {
                Some(_) => write!(f, "`{}` is already declared in this scope", name),
                None => write!(f, "`{}` is a built-in and cannot be redeclared", name),
            },
            DiagnosticKind::UndefinedSymbol { name } => {
                write!(f, "cannot find `{}` in this scope", name)
            }
            DiagnosticKind::ImmutableAssignment { name } => {
                write!(f, "cannot assign to loop variable `{}`", name)
            }
            DiagnosticKind::UnknownType { name } => write!(f, "unknown type `{}`", name),
            DiagnosticKind::TypeMismatch { op, left, right } => write!(
                f,
                "mismatched types for `{}`: left is `{}`, right is `{}`",
                op, left, right
            ),
            DiagnosticKind::UnexpectedType { expected, found } => {
                write!(f, "expected `{}`, found `{}`", expected, found)
            }
            DiagnosticKind::InvalidOperand { op, ty } => {
                write!(f, "operator `{}` cannot be applied to `{}`", op, ty)
            }
            DiagnosticKind::LiteralOutOfRange { literal, ty } => {
                write!(f, "literal `{}` does not fit in `{}`", literal, ty)
            }
            DiagnosticKind::MissingReturn { proc_name, ty } => write!(
                f,
                "procedure `{}` returns `{}` but not every path ends in `return`",
                proc_name, ty
            ),
            DiagnosticKind::ReturnTypeMismatch { expected, found } => write!(
                f,
                "return type mismatch: expected `{}`, found `{}`",
                expected, found
            ),
            DiagnosticKind::ArityMismatch {
                callee,
                expected,
                found,
            } => write!(
                f,
                "`{}` takes {} argument(s) but {} were supplied",
                callee, expected, found
            ),
            DiagnosticKind::ArgumentMismatch {
                callee,
                index,
                expected,
                found,
            } => write!(
                f,
                "argument {} of `{}` must be `{}`, found `{}`",
                index + 1,
                callee,
                expected,
                found
            ),
            DiagnosticKind::NotCallable { name } => write!(f, "`{}` is not a procedure", name),
            DiagnosticKind::NotAValue { name } => {
                write!(f, "procedure `{}` cannot be used as a value", name)
            }
            DiagnosticKind::VoidValue => write!(f, "a `void` expression has no value"),
            DiagnosticKind::FormatString { reason } => {
                write!(f, "invalid format string: {}", reason)
            }
            DiagnosticKind::FormatArity { expected, found } => write!(
                f,
                "format string has {} placeholder(s) but {} argument(s) were supplied",
                expected, found
            ),
            DiagnosticKind::MissingEntryPoint => write!(f, "no `main` procedure found"),
            DiagnosticKind::InvalidEntryPoint { reason } => {
                write!(f, "invalid `main` procedure: {}", reason)
            }
        }
    }
}

/// Pipeline stage that produced a batch of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lex,
    Parse,
    Resolve,
    Check,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Lex => "lexing",
            Stage::Parse => "parsing",
            Stage::Resolve => "name resolution",
            Stage::Check => "type checking",
        };
        f.write_str(name)
    }
}

/// Capped diagnostic collector shared by the stages.
#[derive(Debug)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    limit: usize,
    suppressed: usize,
}

impl Diagnostics {
    pub fn new(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit: limit.max(1),
            suppressed: 0,
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.items.len() < self.limit {
            self.items.push(diagnostic);
        } else {
            self.suppressed += 1;
        }
    }

    pub fn report(&mut self, kind: DiagnosticKind, span: Span) {
        self.push(Diagnostic::new(kind, span));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    /// Number of diagnostics dropped after the limit was reached.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// A named source text with a line index.
pub struct SourceFile<'a> {
    name: &'a str,
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceFile<'a> {
    pub fn new(name: &'a str, text: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();

        Self {
            name,
            text,
            line_starts,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    fn line_index(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        }
    }

    /// 1-based line and column (in characters) of a byte offset.
    pub fn location(&self, offset: usize) -> Location {
        let offset = offset.min(self.text.len());
        let line = self.line_index(offset);
        let start = self.line_starts[line];
        let column = self
            .text
            .get(start..offset)
            .map_or(0, |prefix| prefix.chars().count());

        Location {
            line: line + 1,
            column: column + 1,
        }
    }

    fn line_text(&self, line: usize) -> &str {
        let start = self.line_starts[line];
        let end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.text.len());
        self.text[start..end].trim_end_matches(['\n', '\r'])
    }

    /// Renders `file:line:col: error[CODE]: message` plus the offending line.
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let location = self.location(diagnostic.span.start);
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}:{}:{}: error[{}]: {}",
            self.name,
            location.line,
            location.column,
            diagnostic.code(),
            diagnostic
        );

        let line = self.line_text(location.line - 1);
        let line_end = self.line_starts[location.line - 1] + line.len();
        let marked = self
            .text
            .get(diagnostic.span.start.min(line_end)..diagnostic.span.end.min(line_end))
            .map_or(0, |text| text.chars().count())
            .max(1);

        let gutter = location.line.to_string().len();
        let _ = writeln!(out, "{:>gutter$} | {}", location.line, line, gutter = gutter);
        let _ = writeln!(
            out,
            "{:>gutter$} | {}{}",
            "",
            " ".repeat(location.column - 1),
            "^".repeat(marked),
            gutter = gutter
        );
        out
    }
}
