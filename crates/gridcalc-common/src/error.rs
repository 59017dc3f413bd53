//! Typed cell errors.
//!
//! - **`ExcelErrorKind`**: the closed set of error codes a cell can hold
//! - **`ExcelError`**: kind plus an optional message and origin cell
//!
//! Cell errors are *values*: they flow through formulas like numbers do and
//! are never surfaced as Rust `Err`s by the engine.

use std::{error::Error, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::LiteralValue;

/// All recognised error codes.
///
/// Names are CamelCase while `Display` renders the spreadsheet spelling
/// (`#DIV/0!`, `#CYCLE!`, ...).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExcelErrorKind {
    Div,
    Value,
    Num,
    Na,
    Name,
    Ref,
    /// Produced by the engine for every member of a dependency cycle.
    Cycle,
    /// Formula text could not be parsed.
    Error,
    /// Feature gated by licensing or configuration.
    Lic,
    /// Array result blocked by occupied cells.
    Spill,
}

impl fmt::Display for ExcelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Div => "#DIV/0!",
            Self::Value => "#VALUE!",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
            Self::Name => "#NAME?",
            Self::Ref => "#REF!",
            Self::Cycle => "#CYCLE!",
            Self::Error => "#ERROR!",
            Self::Lic => "#LIC!",
            Self::Spill => "#SPILL!",
        })
    }
}

impl ExcelErrorKind {
    /// Parse the spreadsheet spelling of an error code (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_uppercase().as_str() {
            "#DIV/0!" => Self::Div,
            "#VALUE!" => Self::Value,
            "#NUM!" => Self::Num,
            "#N/A" => Self::Na,
            "#NAME?" => Self::Name,
            "#REF!" => Self::Ref,
            "#CYCLE!" => Self::Cycle,
            "#ERROR!" => Self::Error,
            "#LIC!" => Self::Lic,
            "#SPILL!" => Self::Spill,
            _ => return None,
        })
    }

    pub const ALL: [ExcelErrorKind; 10] = [
        Self::Div,
        Self::Value,
        Self::Num,
        Self::Na,
        Self::Name,
        Self::Ref,
        Self::Cycle,
        Self::Error,
        Self::Lic,
        Self::Spill,
    ];
}

/// Where an error was first produced.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ErrorOrigin {
    pub sheet: Option<String>,
    pub row: u32,
    pub col: u32,
}

/// The error value passed around by the engine and the interpreter.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExcelError {
    pub kind: ExcelErrorKind,
    pub message: Option<String>,
    pub origin: Option<ErrorOrigin>,
}

impl From<ExcelErrorKind> for ExcelError {
    fn from(kind: ExcelErrorKind) -> Self {
        Self {
            kind,
            message: None,
            origin: None,
        }
    }
}

impl ExcelError {
    pub fn new(kind: ExcelErrorKind) -> Self {
        kind.into()
    }

    /// Attach a human-readable explanation.
    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Record the cell the error originated from.
    pub fn with_origin(mut self, sheet: Option<String>, row: u32, col: u32) -> Self {
        self.origin = Some(ErrorOrigin { sheet, row, col });
        self
    }

    pub fn new_div() -> Self {
        Self::new(ExcelErrorKind::Div)
    }

    pub fn new_value() -> Self {
        Self::new(ExcelErrorKind::Value)
    }

    pub fn new_num() -> Self {
        Self::new(ExcelErrorKind::Num)
    }

    pub fn new_na() -> Self {
        Self::new(ExcelErrorKind::Na)
    }

    pub fn new_name() -> Self {
        Self::new(ExcelErrorKind::Name)
    }

    pub fn new_ref() -> Self {
        Self::new(ExcelErrorKind::Ref)
    }

    pub fn new_cycle() -> Self {
        Self::new(ExcelErrorKind::Cycle)
    }

    pub fn new_spill() -> Self {
        Self::new(ExcelErrorKind::Spill)
    }

    pub fn from_error_string(s: &str) -> Option<Self> {
        ExcelErrorKind::parse(s).map(Self::new)
    }
}

impl fmt::Display for ExcelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }

        if let Some(ref origin) = self.origin {
            match origin.sheet {
                Some(ref sheet) => write!(f, " [origin: {sheet}!R{}C{}]", origin.row, origin.col)?,
                None => write!(f, " [origin: R{}C{}]", origin.row, origin.col)?,
            }
        }
        Ok(())
    }
}

impl Error for ExcelError {}

impl From<ExcelError> for LiteralValue {
    fn from(error: ExcelError) -> Self {
        LiteralValue::Error(error)
    }
}

impl From<ExcelErrorKind> for LiteralValue {
    fn from(kind: ExcelErrorKind) -> Self {
        LiteralValue::Error(ExcelError::new(kind))
    }
}

impl PartialEq<str> for ExcelErrorKind {
    fn eq(&self, other: &str) -> bool {
        self.to_string() == other
    }
}

impl PartialEq<&str> for ExcelError {
    fn eq(&self, other: &&str) -> bool {
        self.kind.to_string() == *other
    }
}
