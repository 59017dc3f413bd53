use std::error::Error;
use std::fmt::{self, Display};

use smallvec::SmallVec;

static ERROR_CODES: &[&str] = &[
    "#DIV/0!", "#VALUE!", "#NUM!", "#N/A", "#NAME?", "#REF!", "#CYCLE!", "#ERROR!", "#LIC!",
    "#SPILL!",
];

/// Represents operator associativity.
#[derive(Debug, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenizerError at {}: {}", self.pos, self.message)
    }
}

impl Error for TokenizerError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Operand,
    Func,
    Array,
    Paren,
    Sep,
    OpPrefix,
    OpInfix,
    OpPostfix,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSubType {
    None,
    Text,
    Number,
    Logical,
    Error,
    Range,
    Open,
    Close,
    Arg,
    Row,
}

/// A lexical token. `value` holds the unescaped text (strings lose their
/// quotes, function tokens carry the upper-cased name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub subtype: TokenSubType,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} subtype: {:?} value: {}>",
            self.token_type, self.subtype, self.value
        )
    }
}

impl Token {
    pub fn new(
        value: impl Into<String>,
        token_type: TokenType,
        subtype: TokenSubType,
        start: usize,
        end: usize,
    ) -> Self {
        Token {
            value: value.into(),
            token_type,
            subtype,
            start,
            end,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::OpPrefix | TokenType::OpInfix | TokenType::OpPostfix
        )
    }

    /// Binding power of an operator token.
    pub fn get_precedence(&self) -> Option<(u8, Associativity)> {
        let op = if self.token_type == TokenType::OpPrefix {
            "u"
        } else {
            self.value.as_str()
        };

        match op {
            "u" => Some((7, Associativity::Right)),
            "%" => Some((6, Associativity::Left)),
            "^" => Some((5, Associativity::Left)),
            "*" | "/" => Some((4, Associativity::Left)),
            "+" | "-" => Some((3, Associativity::Left)),
            "&" => Some((2, Associativity::Left)),
            "=" | "<" | ">" | "<=" | ">=" | "<>" => Some((1, Associativity::Left)),
            _ => None,
        }
    }

    /// True if an operator following this token must be a prefix operator.
    fn expects_operand_next(&self) -> bool {
        match self.token_type {
            TokenType::OpPrefix | TokenType::OpInfix | TokenType::Sep => true,
            TokenType::Func | TokenType::Paren | TokenType::Array => {
                self.subtype == TokenSubType::Open
            }
            TokenType::Operand | TokenType::OpPostfix => false,
        }
    }
}

/// Splits formula text into [`Token`]s.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    formula: String,
    pub items: Vec<Token>,
}

impl Tokenizer {
    pub fn new(formula: &str) -> Result<Self, TokenizerError> {
        let mut tokenizer = Tokenizer {
            formula: formula.to_string(),
            items: Vec::new(),
        };
        tokenizer.tokenize()?;
        Ok(tokenizer)
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    fn err<T>(message: impl Into<String>, pos: usize) -> Result<T, TokenizerError> {
        Err(TokenizerError {
            message: message.into(),
            pos,
        })
    }

    fn tokenize(&mut self) -> Result<(), TokenizerError> {
        let chars: Vec<char> = self.formula.chars().collect();
        let mut pos = usize::from(chars.first() == Some(&'='));
        let mut brackets: SmallVec<[TokenType; 8]> = SmallVec::new();

        while pos < chars.len() {
            let c = chars[pos];
            let start = pos;
            match c {
                c if c.is_whitespace() => {
                    pos += 1;
                }
                '"' => {
                    let (text, next) = read_quoted(&chars, pos, '"')
                        .ok_or_else(|| TokenizerError {
                            message: "unterminated string literal".into(),
                            pos,
                        })?;
                    pos = next;
                    self.push(text, TokenType::Operand, TokenSubType::Text, start, pos);
                }
                '\'' => {
                    // Quoted sheet name; the reference continues after the closing quote.
                    let (_, next) = read_quoted(&chars, pos, '\'').ok_or_else(|| {
                        TokenizerError {
                            message: "unterminated sheet name".into(),
                            pos,
                        }
                    })?;
                    if chars.get(next) != Some(&'!') {
                        return Self::err("expected '!' after quoted sheet name", next);
                    }
                    pos = read_word(&chars, next + 1);
                    let text: String = chars[start..pos].iter().collect();
                    self.push(text, TokenType::Operand, TokenSubType::Range, start, pos);
                }
                '#' => {
                    let rest: String = chars[pos..].iter().collect::<String>().to_ascii_uppercase();
                    let Some(code) = ERROR_CODES.iter().find(|code| rest.starts_with(**code)) else {
                        return Self::err("unknown error literal", pos);
                    };
                    pos += code.chars().count();
                    self.push(*code, TokenType::Operand, TokenSubType::Error, start, pos);
                }
                c if c.is_ascii_digit() || c == '.' => {
                    pos = read_number(&chars, pos);
                    let text: String = chars[start..pos].iter().collect();
                    if text.parse::<f64>().is_err() {
                        return Self::err(format!("invalid number '{text}'"), start);
                    }
                    self.push(text, TokenType::Operand, TokenSubType::Number, start, pos);
                }
                c if c.is_alphabetic() || c == '$' || c == '_' => {
                    pos = read_word(&chars, pos);
                    let text: String = chars[start..pos].iter().collect();
                    if chars.get(pos) == Some(&'(') {
                        pos += 1;
                        brackets.push(TokenType::Func);
                        self.push(
                            text.to_ascii_uppercase(),
                            TokenType::Func,
                            TokenSubType::Open,
                            start,
                            pos,
                        );
                    } else if text.eq_ignore_ascii_case("TRUE") || text.eq_ignore_ascii_case("FALSE")
                    {
                        self.push(
                            text.to_ascii_uppercase(),
                            TokenType::Operand,
                            TokenSubType::Logical,
                            start,
                            pos,
                        );
                    } else {
                        self.push(text, TokenType::Operand, TokenSubType::Range, start, pos);
                    }
                }
                '(' => {
                    pos += 1;
                    brackets.push(TokenType::Paren);
                    self.push("(", TokenType::Paren, TokenSubType::Open, start, pos);
                }
                ')' => {
                    pos += 1;
                    match brackets.pop() {
                        Some(TokenType::Paren) => {
                            self.push(")", TokenType::Paren, TokenSubType::Close, start, pos)
                        }
                        Some(TokenType::Func) => {
                            self.push(")", TokenType::Func, TokenSubType::Close, start, pos)
                        }
                        _ => return Self::err("unmatched ')'", start),
                    }
                }
                '{' => {
                    pos += 1;
                    brackets.push(TokenType::Array);
                    self.push("{", TokenType::Array, TokenSubType::Open, start, pos);
                }
                '}' => {
                    pos += 1;
                    if brackets.pop() != Some(TokenType::Array) {
                        return Self::err("unmatched '}'", start);
                    }
                    self.push("}", TokenType::Array, TokenSubType::Close, start, pos);
                }
                ',' => {
                    pos += 1;
                    self.push(",", TokenType::Sep, TokenSubType::Arg, start, pos);
                }
                ';' => {
                    pos += 1;
                    self.push(";", TokenType::Sep, TokenSubType::Row, start, pos);
                }
                '%' => {
                    pos += 1;
                    self.push("%", TokenType::OpPostfix, TokenSubType::None, start, pos);
                }
                '+' | '-' => {
                    pos += 1;
                    let prefix = self.items.last().is_none_or(Token::expects_operand_next);
                    let token_type = if prefix {
                        TokenType::OpPrefix
                    } else {
                        TokenType::OpInfix
                    };
                    self.push(c.to_string(), token_type, TokenSubType::None, start, pos);
                }
                '*' | '/' | '^' | '&' | '=' => {
                    pos += 1;
                    self.push(c.to_string(), TokenType::OpInfix, TokenSubType::None, start, pos);
                }
                '<' | '>' => {
                    pos += 1;
                    let mut op = c.to_string();
                    if let Some(&next) = chars.get(pos) {
                        if next == '=' || (c == '<' && next == '>') {
                            op.push(next);
                            pos += 1;
                        }
                    }
                    self.push(op, TokenType::OpInfix, TokenSubType::None, start, pos);
                }
                other => return Self::err(format!("unexpected character '{other}'"), pos),
            }
        }

        if !brackets.is_empty() {
            return Self::err("unbalanced brackets", chars.len());
        }
        Ok(())
    }

    fn push(
        &mut self,
        value: impl Into<String>,
        token_type: TokenType,
        subtype: TokenSubType,
        start: usize,
        end: usize,
    ) {
        self.items
            .push(Token::new(value, token_type, subtype, start, end));
    }
}

/// Read a `q`-delimited literal starting at `pos` (doubled quotes escape).
/// Returns the unescaped body and the index just past the closing quote.
fn read_quoted(chars: &[char], pos: usize, q: char) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut i = pos + 1;
    while i < chars.len() {
        if chars[i] == q {
            if chars.get(i + 1) == Some(&q) {
                out.push(q);
                i += 2;
                continue;
            }
            return Some((out, i + 1));
        }
        out.push(chars[i]);
        i += 1;
    }
    None
}

fn read_word(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() {
        let c = chars[pos];
        if c.is_alphanumeric() || matches!(c, '_' | '.' | '$' | '!' | ':') {
            pos += 1;
        } else {
            break;
        }
    }
    pos
}

fn read_number(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
        pos += 1;
    }
    if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
        let mut look = pos + 1;
        if look < chars.len() && (chars[look] == '+' || chars[look] == '-') {
            look += 1;
        }
        if look < chars.len() && chars[look].is_ascii_digit() {
            pos = look;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}
