//! Reporte de errores.
//!
//! Todo error del compilador es fatal para la unidad que se compila, por
//! lo que un reporte describe exactamente un error junto con la línea de
//! código fuente donde ocurrió.

use crate::{
    lex::LexerError,
    parse::ParserError,
    source::{Located, Location},
};

use std::{
    error::Error as StdError,
    fmt::{self, Display},
};

use thiserror::Error;

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn error(&self) -> &dyn StdError;
    fn location(&self) -> &Location;
}

/// Falla de compilación de una unidad.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Lexical(#[from] Located<LexerError>),

    #[error(transparent)]
    Syntax(#[from] Located<ParserError>),
}

/// Un error ubicado, listo para presentarse al usuario.
pub struct Diagnostics {
    kind: &'static str,
    error: Box<dyn 'static + LocatedError>,
}

impl Diagnostics {
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            kind: "error",
            error: Box::new(error),
        }
    }
}

impl From<CompileError> for Diagnostics {
    fn from(error: CompileError) -> Self {
        match error {
            CompileError::Lexical(error) => Diagnostics::from(error).kind("Lexical error"),
            CompileError::Syntax(error) => Diagnostics::from(error).kind("Syntax error"),
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, error } = self;

        writeln!(fmt, "{}: {}", kind, error.error())?;

        let location = error.location();
        writeln!(fmt, " --> {}", location)?;

        let (start, end) = (location.start(), location.end());
        let digits = end.line().to_string().chars().count();
        writeln!(fmt, "{:digits$} |", "", digits = digits)?;

        location.source().with_line(start.line(), |line| {
            writeln!(fmt, "{:>digits$} | {}", start.line(), line, digits = digits)
        })?;

        // Los rangos de varias líneas solo se subrayan en su primera columna
        let from = start.column().max(1);
        let to = if end.line() == start.line() {
            end.column().saturating_sub(1).max(from)
        } else {
            from
        };

        let skip = (from - 1) as usize;
        let highlight = (to - from + 1) as usize;

        writeln!(
            fmt,
            "{:digits$} | {:skip$}{:^<highlight$}",
            "",
            "",
            "",
            digits = digits,
            skip = skip,
            highlight = highlight
        )
    }
}

impl<E: StdError> sealed::Sealed for Located<E> {}

impl<E: StdError> LocatedError for Located<E> {
    fn error(&self) -> &dyn StdError {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}
