//! References as they appear inside formulas.
//!
//! A reference names its sheet textually (or not at all, meaning "the
//! formula's own sheet"); the engine resolves names to [`SheetId`]s.
//!
//! [`SheetId`]: crate::SheetId

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::address::col_to_letters;

/// A 0-based grid coordinate plus its `$` anchoring flags.
///
/// Anchors only matter when a formula is copied; structural edits shift
/// anchored and relative coordinates alike.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Coord {
    pub row: u32,
    pub col: u32,
    pub row_abs: bool,
    pub col_abs: bool,
}

impl Coord {
    pub const fn new(row: u32, col: u32, row_abs: bool, col_abs: bool) -> Self {
        Self {
            row,
            col,
            row_abs,
            col_abs,
        }
    }

    pub const fn relative(row: u32, col: u32) -> Self {
        Self::new(row, col, false, false)
    }

    /// Same anchors, new position.
    pub fn moved_to(self, row: u32, col: u32) -> Self {
        Self { row, col, ..self }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.col_abs {
            f.write_str("$")?;
        }
        f.write_str(&col_to_letters(self.col))?;
        if self.row_abs {
            f.write_str("$")?;
        }
        write!(f, "{}", self.row + 1)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    Cell {
        sheet: Option<String>,
        coord: Coord,
    },
    Range {
        sheet: Option<String>,
        start: Coord,
        end: Coord,
    },
    /// A reference invalidated by a structural edit; renders and evaluates as `#REF!`.
    Invalid,
}

impl ReferenceType {
    pub fn cell(sheet: Option<&str>, row: u32, col: u32) -> Self {
        ReferenceType::Cell {
            sheet: sheet.map(str::to_string),
            coord: Coord::relative(row, col),
        }
    }

    pub fn range(sheet: Option<&str>, r1: u32, c1: u32, r2: u32, c2: u32) -> Self {
        ReferenceType::Range {
            sheet: sheet.map(str::to_string),
            start: Coord::relative(r1.min(r2), c1.min(c2)),
            end: Coord::relative(r1.max(r2), c1.max(c2)),
        }
    }

    pub fn sheet(&self) -> Option<&str> {
        match self {
            ReferenceType::Cell { sheet, .. } | ReferenceType::Range { sheet, .. } => {
                sheet.as_deref()
            }
            ReferenceType::Invalid => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ReferenceType::Invalid)
    }
}

/// Quote a sheet name when it is not a plain identifier.
pub fn format_sheet_name(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = self.sheet() {
            write!(f, "{}!", format_sheet_name(sheet))?;
        }
        match self {
            ReferenceType::Cell { coord, .. } => write!(f, "{coord}"),
            ReferenceType::Range { start, end, .. } => write!(f, "{start}:{end}"),
            ReferenceType::Invalid => f.write_str("#REF!"),
        }
    }
}
