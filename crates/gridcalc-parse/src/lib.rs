pub mod parser;
pub mod pretty;
pub mod tokenizer;

pub use parser::{ASTNode, ASTNodeType, Parser, ParserError, parse, parse_reference};
pub use pretty::to_formula;
pub use tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};

pub use gridcalc_common::{Coord, ExcelError, ExcelErrorKind, LiteralValue, ReferenceType};
