//! Render an AST back to canonical formula text.

use gridcalc_common::LiteralValue;

use crate::parser::{ASTNode, ASTNodeType};

fn binary_precedence(op: &str) -> u8 {
    match op {
        "^" => 5,
        "*" | "/" => 4,
        "+" | "-" => 3,
        "&" => 2,
        _ => 1,
    }
}

fn node_precedence(node: &ASTNode) -> u8 {
    match &node.node_type {
        ASTNodeType::BinaryOp { op, .. } => binary_precedence(op),
        ASTNodeType::UnaryOp { op, .. } if op == "%" => 6,
        ASTNodeType::UnaryOp { .. } => 7,
        _ => u8::MAX,
    }
}

fn literal(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        LiteralValue::Error(e) => e.kind.to_string(),
        other => other.to_string(),
    }
}

fn render(node: &ASTNode, out: &mut String) {
    match &node.node_type {
        ASTNodeType::Literal(v) => out.push_str(&literal(v)),
        ASTNodeType::Reference(r) => out.push_str(&r.to_string()),
        ASTNodeType::UnaryOp { op, expr } => {
            let wrap = node_precedence(expr) < node_precedence(node);
            if op == "%" {
                render_wrapped(expr, wrap, out);
                out.push('%');
            } else {
                out.push_str(op);
                render_wrapped(expr, wrap, out);
            }
        }
        ASTNodeType::BinaryOp { op, left, right } => {
            let prec = binary_precedence(op);
            render_wrapped(left, node_precedence(left) < prec, out);
            out.push_str(op);
            // Left associative: an equal-precedence right child needs parens.
            render_wrapped(right, node_precedence(right) <= prec, out);
        }
        ASTNodeType::Function { name, args } => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                render(arg, out);
            }
            out.push(')');
        }
        ASTNodeType::Array(rows) => {
            out.push('{');
            for (r, row) in rows.iter().enumerate() {
                if r > 0 {
                    out.push(';');
                }
                for (c, item) in row.iter().enumerate() {
                    if c > 0 {
                        out.push(',');
                    }
                    render(item, out);
                }
            }
            out.push('}');
        }
    }
}

fn render_wrapped(node: &ASTNode, wrap: bool, out: &mut String) {
    if wrap {
        out.push('(');
        render(node, out);
        out.push(')');
    } else {
        render(node, out);
    }
}

/// Formula text with a leading `=`.
pub fn to_formula(ast: &ASTNode) -> String {
    let mut out = String::from("=");
    render(ast, &mut out);
    out
}
