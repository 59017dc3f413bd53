use gridcalc_common::AddressError;
use gridcalc_eval::EditorError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkbookError {
    #[error("sheet '{0}' does not exist")]
    UnknownSheet(String),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("invalid range '{0}'")]
    InvalidRange(String),
    /// Row and column numbers in the facade are 1-based.
    #[error("row and column numbers start at 1")]
    ZeroIndex,
    #[error(transparent)]
    Editor(#[from] EditorError),
}
