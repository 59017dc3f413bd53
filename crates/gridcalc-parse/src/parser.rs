use std::error::Error;
use std::fmt;

use gridcalc_common::{
    Coord, ExcelError, ExcelErrorKind, LiteralValue, ReferenceType, parse_a1_parts,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::tokenizer::{Associativity, Token, TokenSubType, TokenType, Tokenizer, TokenizerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserError {
    pub message: String,
    pub position: Option<usize>,
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "ParserError at position {pos}: {}", self.message),
            None => write!(f, "ParserError: {}", self.message),
        }
    }
}

impl Error for ParserError {}

impl From<TokenizerError> for ParserError {
    fn from(err: TokenizerError) -> Self {
        ParserError {
            message: err.message,
            position: Some(err.pos),
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ASTNodeType {
    Literal(LiteralValue),
    Reference(ReferenceType),
    UnaryOp {
        op: String,
        expr: Box<ASTNode>,
    },
    BinaryOp {
        op: String,
        left: Box<ASTNode>,
        right: Box<ASTNode>,
    },
    Function {
        name: String,
        args: Vec<ASTNode>,
    },
    Array(Vec<Vec<ASTNode>>),
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ASTNode {
    pub node_type: ASTNodeType,
}

impl ASTNode {
    pub fn new(node_type: ASTNodeType) -> Self {
        ASTNode { node_type }
    }

    pub fn literal(value: impl Into<LiteralValue>) -> Self {
        ASTNode::new(ASTNodeType::Literal(value.into()))
    }

    pub fn reference(reference: ReferenceType) -> Self {
        ASTNode::new(ASTNodeType::Reference(reference))
    }

    pub fn function(name: &str, args: Vec<ASTNode>) -> Self {
        ASTNode::new(ASTNodeType::Function {
            name: name.to_ascii_uppercase(),
            args,
        })
    }

    pub fn binary(op: &str, left: ASTNode, right: ASTNode) -> Self {
        ASTNode::new(ASTNodeType::BinaryOp {
            op: op.to_string(),
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Every reference in the tree, in source order.
    pub fn references(&self) -> Vec<&ReferenceType> {
        let mut out = Vec::new();
        self.visit(&mut |node| {
            if let ASTNodeType::Reference(r) = &node.node_type {
                out.push(r);
            }
        });
        out
    }

    /// Every function name in the tree, in source order.
    pub fn function_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.visit(&mut |node| {
            if let ASTNodeType::Function { name, .. } = &node.node_type {
                out.push(name.as_str());
            }
        });
        out
    }

    /// Pre-order traversal.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a ASTNode)) {
        f(self);
        match &self.node_type {
            ASTNodeType::Literal(_) | ASTNodeType::Reference(_) => {}
            ASTNodeType::UnaryOp { expr, .. } => expr.visit(f),
            ASTNodeType::BinaryOp { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            ASTNodeType::Function { args, .. } => args.iter().for_each(|a| a.visit(f)),
            ASTNodeType::Array(rows) => rows.iter().flatten().for_each(|a| a.visit(f)),
        }
    }

    /// Rebuild the tree with every reference passed through `f`.
    pub fn map_references(&self, f: &mut dyn FnMut(&ReferenceType) -> ReferenceType) -> ASTNode {
        let node_type = match &self.node_type {
            ASTNodeType::Literal(v) => ASTNodeType::Literal(v.clone()),
            ASTNodeType::Reference(r) => ASTNodeType::Reference(f(r)),
            ASTNodeType::UnaryOp { op, expr } => ASTNodeType::UnaryOp {
                op: op.clone(),
                expr: Box::new(expr.map_references(f)),
            },
            ASTNodeType::BinaryOp { op, left, right } => ASTNodeType::BinaryOp {
                op: op.clone(),
                left: Box::new(left.map_references(f)),
                right: Box::new(right.map_references(f)),
            },
            ASTNodeType::Function { name, args } => ASTNodeType::Function {
                name: name.clone(),
                args: args.iter().map(|a| a.map_references(f)).collect(),
            },
            ASTNodeType::Array(rows) => ASTNodeType::Array(
                rows.iter()
                    .map(|row| row.iter().map(|a| a.map_references(f)).collect())
                    .collect(),
            ),
        };
        ASTNode::new(node_type)
    }
}

/// Parse a textual reference such as `B2`, `$A$1:C3`, `Sheet2!A1` or
/// `'My Sheet'!A1:B2`.
pub fn parse_reference(text: &str) -> Result<ReferenceType, ParserError> {
    let invalid = || ParserError {
        message: format!("invalid reference '{text}'"),
        position: None,
    };

    let (sheet, body) = match text.rfind('!') {
        Some(idx) => {
            let raw = &text[..idx];
            let sheet = if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
                inner.replace("''", "'")
            } else {
                raw.to_string()
            };
            if sheet.is_empty() {
                return Err(invalid());
            }
            (Some(sheet), &text[idx + 1..])
        }
        None => (None, text),
    };

    let mut parts = body.split(':');
    let first = parts.next().ok_or_else(invalid)?;
    let second = parts.next();
    if parts.next().is_some() {
        return Err(invalid());
    }

    let to_coord = |s: &str| {
        parse_a1_parts(s)
            .map(|(row, col, row_abs, col_abs)| Coord::new(row, col, row_abs, col_abs))
            .ok_or_else(invalid)
    };

    let start = to_coord(first)?;
    match second {
        None => Ok(ReferenceType::Cell {
            sheet,
            coord: start,
        }),
        Some(second) => {
            let end = to_coord(second)?;
            // Normalize corners, each coordinate keeps its own anchor flag.
            let (top, bottom) = if start.row <= end.row {
                ((start.row, start.row_abs), (end.row, end.row_abs))
            } else {
                ((end.row, end.row_abs), (start.row, start.row_abs))
            };
            let (left, right) = if start.col <= end.col {
                ((start.col, start.col_abs), (end.col, end.col_abs))
            } else {
                ((end.col, end.col_abs), (start.col, start.col_abs))
            };
            Ok(ReferenceType::Range {
                sheet,
                start: Coord::new(top.0, left.0, top.1, left.1),
                end: Coord::new(bottom.0, right.0, bottom.1, right.1),
            })
        }
    }
}

/// Precedence-climbing parser over a token stream.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<ASTNode, ParserError> {
        if self.tokens.is_empty() {
            return Err(ParserError {
                message: "empty formula".into(),
                position: Some(0),
            });
        }
        let ast = self.parse_expression(0)?;
        if let Some(tok) = self.peek() {
            return Err(self.unexpected(tok));
        }
        Ok(ast)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.position).cloned();
        self.position += 1;
        tok
    }

    fn unexpected(&self, tok: &Token) -> ParserError {
        ParserError {
            message: format!("unexpected token '{}'", tok.value),
            position: Some(tok.start),
        }
    }

    fn eof() -> ParserError {
        ParserError {
            message: "unexpected end of formula".into(),
            position: None,
        }
    }

    fn parse_expression(&mut self, min_prec: u8) -> Result<ASTNode, ParserError> {
        let mut lhs = self.parse_prefix()?;

        while let Some(tok) = self.peek() {
            if !matches!(tok.token_type, TokenType::OpInfix | TokenType::OpPostfix) {
                break;
            }
            let Some((prec, assoc)) = tok.get_precedence() else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let Some(op) = self.next() else { break };

            if op.token_type == TokenType::OpPostfix {
                lhs = ASTNode::new(ASTNodeType::UnaryOp {
                    op: op.value,
                    expr: Box::new(lhs),
                });
                continue;
            }

            let next_min = match assoc {
                Associativity::Left => prec + 1,
                Associativity::Right => prec,
            };
            let rhs = self.parse_expression(next_min)?;
            lhs = ASTNode::binary(&op.value, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<ASTNode, ParserError> {
        let tok = self.next().ok_or_else(Self::eof)?;
        match tok.token_type {
            TokenType::OpPrefix => {
                let (prec, _) = tok.get_precedence().ok_or_else(|| self.unexpected(&tok))?;
                let expr = self.parse_expression(prec)?;
                Ok(ASTNode::new(ASTNodeType::UnaryOp {
                    op: tok.value,
                    expr: Box::new(expr),
                }))
            }
            TokenType::Operand => self.parse_operand(tok),
            TokenType::Func if tok.subtype == TokenSubType::Open => self.parse_function(tok),
            TokenType::Paren if tok.subtype == TokenSubType::Open => {
                let inner = self.parse_expression(0)?;
                match self.next() {
                    Some(t) if t.token_type == TokenType::Paren && t.subtype == TokenSubType::Close => {
                        Ok(inner)
                    }
                    Some(t) => Err(self.unexpected(&t)),
                    None => Err(Self::eof()),
                }
            }
            TokenType::Array if tok.subtype == TokenSubType::Open => self.parse_array(),
            _ => Err(self.unexpected(&tok)),
        }
    }

    fn parse_operand(&self, tok: Token) -> Result<ASTNode, ParserError> {
        let value = match tok.subtype {
            TokenSubType::Number => tok
                .value
                .parse::<f64>()
                .map(LiteralValue::Number)
                .map_err(|_| self.unexpected(&tok))?,
            TokenSubType::Text => LiteralValue::Text(tok.value),
            TokenSubType::Logical => LiteralValue::Boolean(tok.value == "TRUE"),
            TokenSubType::Error => {
                let kind = ExcelErrorKind::parse(&tok.value).ok_or_else(|| self.unexpected(&tok))?;
                LiteralValue::Error(ExcelError::new(kind))
            }
            TokenSubType::Range => {
                let reference = parse_reference(&tok.value).map_err(|mut e| {
                    e.position = Some(tok.start);
                    e
                })?;
                return Ok(ASTNode::reference(reference));
            }
            _ => return Err(self.unexpected(&tok)),
        };
        Ok(ASTNode::literal(value))
    }

    fn parse_function(&mut self, open: Token) -> Result<ASTNode, ParserError> {
        let mut args = Vec::new();
        if let Some(t) = self.peek() {
            if t.token_type == TokenType::Func && t.subtype == TokenSubType::Close {
                self.position += 1;
                return Ok(ASTNode::function(&open.value, args));
            }
        }
        loop {
            args.push(self.parse_expression(0)?);
            match self.next() {
                Some(t) if t.token_type == TokenType::Sep && t.subtype == TokenSubType::Arg => {}
                Some(t) if t.token_type == TokenType::Func && t.subtype == TokenSubType::Close => {
                    return Ok(ASTNode::function(&open.value, args));
                }
                Some(t) => return Err(self.unexpected(&t)),
                None => return Err(Self::eof()),
            }
        }
    }

    fn parse_array(&mut self) -> Result<ASTNode, ParserError> {
        let mut rows = vec![Vec::new()];
        loop {
            let item = self.parse_expression(0)?;
            if let Some(row) = rows.last_mut() {
                row.push(item);
            }
            match self.next() {
                Some(t) if t.token_type == TokenType::Sep && t.subtype == TokenSubType::Arg => {}
                Some(t) if t.token_type == TokenType::Sep && t.subtype == TokenSubType::Row => {
                    rows.push(Vec::new());
                }
                Some(t) if t.token_type == TokenType::Array && t.subtype == TokenSubType::Close => {
                    break;
                }
                Some(t) => return Err(self.unexpected(&t)),
                None => return Err(Self::eof()),
            }
        }
        let width = rows[0].len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(ParserError {
                message: "array rows must have equal length".into(),
                position: None,
            });
        }
        Ok(ASTNode::new(ASTNodeType::Array(rows)))
    }
}

/// Tokenize and parse formula text (leading `=` optional).
pub fn parse(formula: &str) -> Result<ASTNode, ParserError> {
    let tokenizer = Tokenizer::new(formula)?;
    Parser::new(tokenizer.items).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> ASTNode {
        ASTNode::literal(n)
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let ast = parse("=1+2*3").unwrap();
        assert_eq!(
            ast,
            ASTNode::binary("+", num(1.0), ASTNode::binary("*", num(2.0), num(3.0)))
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        let ast = parse("=10-4-3").unwrap();
        assert_eq!(
            ast,
            ASTNode::binary("-", ASTNode::binary("-", num(10.0), num(4.0)), num(3.0))
        );
    }

    #[test]
    fn unary_minus_binds_tighter_than_power() {
        let ast = parse("=-2^2").unwrap();
        let ASTNodeType::BinaryOp { op, left, .. } = ast.node_type else {
            panic!("expected binary op");
        };
        assert_eq!(op, "^");
        assert!(matches!(left.node_type, ASTNodeType::UnaryOp { .. }));
    }

    #[test]
    fn references_parse_with_sheets_and_anchors() {
        assert_eq!(
            parse_reference("'My Sheet'!$B$2:A1").unwrap(),
            ReferenceType::Range {
                sheet: Some("My Sheet".into()),
                start: Coord::new(0, 0, false, false),
                end: Coord::new(1, 1, true, true),
            }
        );
        assert_eq!(
            parse_reference("Sheet2!C3").unwrap(),
            ReferenceType::cell(Some("Sheet2"), 2, 2)
        );
        assert!(parse_reference("NotARef").is_err());
        assert!(parse_reference("!A1").is_err());
    }

    #[test]
    fn functions_collect_arguments() {
        let ast = parse("=SUM(A1, B1:C1, 3)").unwrap();
        let ASTNodeType::Function { name, args } = &ast.node_type else {
            panic!("expected function");
        };
        assert_eq!(name, "SUM");
        assert_eq!(args.len(), 3);
        assert_eq!(ast.references().len(), 2);
        assert_eq!(parse("=NOW()").unwrap(), ASTNode::function("NOW", vec![]));
    }

    #[test]
    fn array_literals_must_be_rectangular() {
        let ast = parse("={1,2;3,4}").unwrap();
        let ASTNodeType::Array(rows) = &ast.node_type else {
            panic!("expected array");
        };
        assert_eq!(rows.len(), 2);
        assert!(parse("={1,2;3}").is_err());
    }

    #[test]
    fn percent_is_postfix() {
        let ast = parse("=50%").unwrap();
        assert_eq!(
            ast,
            ASTNode::new(ASTNodeType::UnaryOp {
                op: "%".into(),
                expr: Box::new(num(50.0)),
            })
        );
    }

    #[test]
    fn malformed_formulas_are_rejected() {
        assert!(parse("=1+").is_err());
        assert!(parse("=SUM(1,)").is_err());
        assert!(parse("=1 2").is_err());
        assert!(parse("=").is_err());
    }

    #[test]
    fn map_references_rewrites_in_place() {
        let ast = parse("=A1+SUM(B1:B2)").unwrap();
        let shifted = ast.map_references(&mut |_| ReferenceType::Invalid);
        assert!(shifted.references().iter().all(|r| r.is_invalid()));
        assert_eq!(shifted.function_names(), vec!["SUM"]);
    }
}
