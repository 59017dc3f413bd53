use std::fmt::{self, Display};

use crate::{ExcelError, ExcelErrorKind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A value as seen by the interpreter and stored in cells.
///
/// `Array` only ever appears as a formula result (it spills) or as an
/// intermediate inside the interpreter; cells themselves hold scalars.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Array(Vec<Vec<LiteralValue>>),
    Empty,
    Error(ExcelError),
}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Number(n) => write!(f, "{n}"),
            LiteralValue::Text(s) => write!(f, "{s}"),
            LiteralValue::Boolean(true) => write!(f, "TRUE"),
            LiteralValue::Boolean(false) => write!(f, "FALSE"),
            LiteralValue::Error(e) => write!(f, "{}", e.kind),
            LiteralValue::Array(a) => write!(f, "{a:?}"),
            LiteralValue::Empty => Ok(()),
        }
    }
}

impl LiteralValue {
    pub fn error(kind: ExcelErrorKind) -> Self {
        LiteralValue::Error(ExcelError::new(kind))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LiteralValue::Error(_))
    }

    pub fn error_kind(&self) -> Option<ExcelErrorKind> {
        match self {
            LiteralValue::Error(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Blank for the purposes of COUNTBLANK/ISBLANK style checks.
    pub fn is_blank(&self) -> bool {
        match self {
            LiteralValue::Empty => true,
            LiteralValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric view used by range reductions: only real numbers count.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            LiteralValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Collapse a 1x1 array to its single element; larger arrays yield their
    /// top-left element (implicit intersection is out of scope).
    pub fn into_scalar(self) -> LiteralValue {
        match self {
            LiteralValue::Array(rows) => rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next())
                .unwrap_or(LiteralValue::Empty),
            other => other,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            LiteralValue::Boolean(b) => *b,
            LiteralValue::Number(n) => *n != 0.0,
            LiteralValue::Text(s) => !s.is_empty(),
            LiteralValue::Array(arr) => !arr.is_empty(),
            LiteralValue::Error(_) | LiteralValue::Empty => false,
        }
    }

    /// Dimensions of an array value, `(1, 1)` for scalars.
    pub fn dims(&self) -> (u32, u32) {
        match self {
            LiteralValue::Array(rows) => {
                let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
                (rows.len() as u32, width as u32)
            }
            _ => (1, 1),
        }
    }
}

impl From<f64> for LiteralValue {
    fn from(n: f64) -> Self {
        LiteralValue::Number(n)
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        LiteralValue::Boolean(b)
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::Text(s.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(s: String) -> Self {
        LiteralValue::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_cell_rendering() {
        assert_eq!(LiteralValue::Number(1.5).to_string(), "1.5");
        assert_eq!(LiteralValue::Boolean(true).to_string(), "TRUE");
        assert_eq!(LiteralValue::error(ExcelErrorKind::Na).to_string(), "#N/A");
        assert_eq!(LiteralValue::Empty.to_string(), "");
    }

    #[test]
    fn into_scalar_takes_top_left() {
        let arr = LiteralValue::Array(vec![
            vec![LiteralValue::Number(1.0), LiteralValue::Number(2.0)],
            vec![LiteralValue::Number(3.0), LiteralValue::Number(4.0)],
        ]);
        assert_eq!(arr.dims(), (2, 2));
        assert_eq!(arr.into_scalar(), LiteralValue::Number(1.0));
        assert_eq!(LiteralValue::Array(vec![]).into_scalar(), LiteralValue::Empty);
    }

    #[test]
    fn blank_includes_empty_text() {
        assert!(LiteralValue::Empty.is_blank());
        assert!(LiteralValue::Text(String::new()).is_blank());
        assert!(!LiteralValue::Number(0.0).is_blank());
    }
}
