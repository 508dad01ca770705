//! Format strings for `print` and `println`.
//!
//! `{}` is a positional placeholder, `{{` and `}}` are literal braces.
//! Anything else between braces is rejected.

use std::fmt;

use crate::object::Object;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    UnclosedPlaceholder,
    UnsupportedPlaceholder,
    UnmatchedClose,
}

impl FormatError {
    pub fn reason(&self) -> &'static str {
        match self {
            FormatError::UnclosedPlaceholder => "`{` is never closed; use `{{` for a literal brace",
            FormatError::UnsupportedPlaceholder => "only empty `{}` placeholders are supported",
            FormatError::UnmatchedClose => "unmatched `}`; use `}}` for a literal brace",
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

enum Piece<'a> {
    Text(&'a str),
    Placeholder,
}

fn walk<'a>(template: &'a str, mut on_piece: impl FnMut(Piece<'a>)) -> Result<(), FormatError> {
    let mut rest = template;

    while let Some(idx) = rest.find(['{', '}']) {
        if idx > 0 {
            on_piece(Piece::Text(&rest[..idx]));
        }

        let tail = &rest[idx..];
        if tail.starts_with("{{") {
            on_piece(Piece::Text("{"));
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            on_piece(Piece::Text("}"));
            rest = &tail[2..];
        } else if tail.starts_with("{}") {
            on_piece(Piece::Placeholder);
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            return Err(if tail.contains('}') {
                FormatError::UnsupportedPlaceholder
            } else {
                FormatError::UnclosedPlaceholder
            });
        } else {
            return Err(FormatError::UnmatchedClose);
        }
    }

    if !rest.is_empty() {
        on_piece(Piece::Text(rest));
    }
    Ok(())
}

/// Validates `template` and returns its number of placeholders.
pub fn count_placeholders(template: &str) -> Result<usize, FormatError> {
    let mut count = 0;
    walk(template, |piece| {
        if let Piece::Placeholder = piece {
            count += 1;
        }
    })?;
    Ok(count)
}

/// Substitutes `args` into `template`. Returns `None` if the template is
/// malformed or the argument count does not match.
pub fn format_template(template: &str, args: &[Object]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut args_iter = args.iter();
    let mut missing = false;

    walk(template, |piece| match piece {
        Piece::Text(text) => out.push_str(text),
        Piece::Placeholder => match args_iter.next() {
            Some(arg) => out.push_str(&arg.to_string()),
            None => missing = true,
        },
    })
    .ok()?;

    if missing || args_iter.next().is_some() {
        return None;
    }
    Some(out)
}
