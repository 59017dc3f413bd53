use std::cmp::Ordering;

use gridcalc_common::{
    CellAddress, ExcelError, ExcelErrorKind, LiteralValue, RangeAddress, ReferenceType,
};
use gridcalc_parse::{ASTNode, ASTNodeType};

use crate::traits::{ArgumentHandle, EvaluationContext, Interpreter};

/// Tree-walking evaluator for parsed formulas.
///
/// Errors are ordinary values: every operator propagates the first error
/// operand it sees, so evaluation itself never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormulaInterpreter;

impl FormulaInterpreter {
    pub fn new() -> Self {
        FormulaInterpreter
    }

    pub fn eval_node(&self, node: &ASTNode, ctx: &dyn EvaluationContext) -> LiteralValue {
        match &node.node_type {
            ASTNodeType::Literal(v) => v.clone(),
            ASTNodeType::Reference(r) => self.eval_reference(r, ctx),
            ASTNodeType::UnaryOp { op, expr } => self.eval_unary(op, expr, ctx),
            ASTNodeType::BinaryOp { op, left, right } => self.eval_binary(op, left, right, ctx),
            ASTNodeType::Function { name, args } => self.eval_function(name, args, ctx),
            ASTNodeType::Array(rows) => self.eval_array_literal(rows, ctx),
        }
    }

    /* ===================  references  =================== */

    fn eval_reference(&self, reference: &ReferenceType, ctx: &dyn EvaluationContext) -> LiteralValue {
        let Some(sheet_id) = ctx.resolve_sheet(reference.sheet()) else {
            return LiteralValue::error(ExcelErrorKind::Ref);
        };
        match reference {
            ReferenceType::Cell { coord, .. } => {
                ctx.cell_value(CellAddress::new(sheet_id, coord.row, coord.col))
            }
            ReferenceType::Range { start, end, .. } => {
                let range = RangeAddress::new(sheet_id, start.row, start.col, end.row, end.col);
                let cells = range.height() as u64 * range.width() as u64;
                if cells > ctx.max_array_cells() as u64 {
                    return LiteralValue::Error(
                        ExcelError::new_num().with_message(format!("range of {cells} cells is too large for an array")),
                    );
                }
                let mut data = ctx.range_values(&range);
                if data.len() == 1 && data[0].len() == 1 {
                    data.swap_remove(0).swap_remove(0)
                } else {
                    LiteralValue::Array(data)
                }
            }
            ReferenceType::Invalid => LiteralValue::error(ExcelErrorKind::Ref),
        }
    }

    /* ===================  operators  =================== */

    fn eval_unary(&self, op: &str, expr: &ASTNode, ctx: &dyn EvaluationContext) -> LiteralValue {
        let v = self.eval_node(expr, ctx);
        let apply = |v: LiteralValue| match coerce_number(&v) {
            Ok(n) => number(match op {
                "-" => -n,
                "%" => n / 100.0,
                _ => n,
            }),
            Err(e) => LiteralValue::Error(e),
        };
        match v {
            LiteralValue::Array(rows) => LiteralValue::Array(
                rows.into_iter()
                    .map(|row| row.into_iter().map(apply).collect())
                    .collect(),
            ),
            other => apply(other),
        }
    }

    fn eval_binary(
        &self,
        op: &str,
        left: &ASTNode,
        right: &ASTNode,
        ctx: &dyn EvaluationContext,
    ) -> LiteralValue {
        let l = self.eval_node(left, ctx);
        let r = self.eval_node(right, ctx);
        match op {
            "+" => broadcast(l, r, |a, b| arithmetic(a, b, |x, y| Ok(x + y))),
            "-" => broadcast(l, r, |a, b| arithmetic(a, b, |x, y| Ok(x - y))),
            "*" => broadcast(l, r, |a, b| arithmetic(a, b, |x, y| Ok(x * y))),
            "/" => broadcast(l, r, |a, b| {
                arithmetic(a, b, |x, y| {
                    if y == 0.0 {
                        Err(ExcelError::new_div())
                    } else {
                        Ok(x / y)
                    }
                })
            }),
            "^" => broadcast(l, r, |a, b| {
                arithmetic(a, b, |x, y| {
                    if x < 0.0 && y.fract() != 0.0 {
                        Err(ExcelError::new_num())
                    } else {
                        Ok(x.powf(y))
                    }
                })
            }),
            "&" => broadcast(l, r, |a, b| match (a, b) {
                (LiteralValue::Error(e), _) | (_, LiteralValue::Error(e)) => LiteralValue::Error(e),
                (a, b) => LiteralValue::Text(format!("{}{}", coerce_text(&a), coerce_text(&b))),
            }),
            "=" | "<>" | "<" | ">" | "<=" | ">=" => broadcast(l, r, |a, b| compare(op, a, b)),
            _ => LiteralValue::Error(
                ExcelError::new(ExcelErrorKind::Value).with_message(format!("unknown operator '{op}'")),
            ),
        }
    }

    /* ===================  function calls  =================== */

    fn eval_function(&self, name: &str, args: &[ASTNode], ctx: &dyn EvaluationContext) -> LiteralValue {
        let Some(fun) = ctx.function(name) else {
            return LiteralValue::Error(
                ExcelError::new(ExcelErrorKind::Name).with_message(format!("unknown function {name}")),
            );
        };
        if args.len() < fun.min_args() || fun.max_args().is_some_and(|max| args.len() > max) {
            return LiteralValue::Error(ExcelError::new(ExcelErrorKind::Value).with_message(format!(
                "{} does not take {} argument(s)",
                fun.name(),
                args.len()
            )));
        }
        let handles: Vec<ArgumentHandle<'_>> = args
            .iter()
            .map(|node| ArgumentHandle::new(node, self, ctx))
            .collect();
        fun.eval(&handles, ctx).unwrap_or_else(LiteralValue::Error)
    }

    fn eval_array_literal(&self, rows: &[Vec<ASTNode>], ctx: &dyn EvaluationContext) -> LiteralValue {
        LiteralValue::Array(
            rows.iter()
                .map(|row| row.iter().map(|n| self.eval_node(n, ctx).into_scalar()).collect())
                .collect(),
        )
    }
}

impl Interpreter for FormulaInterpreter {
    type Ast = ASTNode;

    fn references(&self, ast: &ASTNode) -> Vec<ReferenceType> {
        ast.references().into_iter().cloned().collect()
    }

    fn function_names(&self, ast: &ASTNode) -> Vec<String> {
        ast.function_names()
            .into_iter()
            .map(str::to_ascii_uppercase)
            .collect()
    }

    fn rewrite_references(
        &self,
        ast: &ASTNode,
        f: &mut dyn FnMut(&ReferenceType) -> ReferenceType,
    ) -> ASTNode {
        ast.map_references(f)
    }

    /// A formula whose result is blank shows `0`, also inside spilled arrays.
    fn evaluate(&self, ast: &ASTNode, ctx: &dyn EvaluationContext) -> LiteralValue {
        match self.eval_node(ast, ctx) {
            LiteralValue::Empty => LiteralValue::Number(0.0),
            LiteralValue::Array(rows) => {
                let rows: Vec<Vec<LiteralValue>> = rows
                    .into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|v| match v {
                                LiteralValue::Empty => LiteralValue::Number(0.0),
                                v => v,
                            })
                            .collect()
                    })
                    .collect();
                if rows.len() == 1 && rows[0].len() == 1 {
                    LiteralValue::Array(rows).into_scalar()
                } else {
                    LiteralValue::Array(rows)
                }
            }
            v => v,
        }
    }
}

/* ---------- coercion ---------- */

/// Scalar-to-number coercion used by operators and scalar function arguments.
pub fn coerce_number(v: &LiteralValue) -> Result<f64, ExcelError> {
    match v {
        LiteralValue::Number(n) => Ok(*n),
        LiteralValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        LiteralValue::Empty => Ok(0.0),
        LiteralValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            ExcelError::new(ExcelErrorKind::Value).with_message(format!("cannot convert '{s}' to a number"))
        }),
        LiteralValue::Error(e) => Err(e.clone()),
        LiteralValue::Array(_) => coerce_number(&v.clone().into_scalar()),
    }
}

pub fn coerce_text(v: &LiteralValue) -> String {
    match v {
        LiteralValue::Array(_) => coerce_text(&v.clone().into_scalar()),
        other => other.to_string(),
    }
}

/// Non-finite results become `#NUM!`.
fn number(n: f64) -> LiteralValue {
    if n.is_finite() {
        LiteralValue::Number(n)
    } else {
        LiteralValue::Error(ExcelError::new_num())
    }
}

fn arithmetic<F>(a: LiteralValue, b: LiteralValue, f: F) -> LiteralValue
where
    F: Fn(f64, f64) -> Result<f64, ExcelError>,
{
    let (x, y) = match (coerce_number(&a), coerce_number(&b)) {
        (Ok(x), Ok(y)) => (x, y),
        (Err(e), _) | (_, Err(e)) => return LiteralValue::Error(e),
    };
    match f(x, y) {
        Ok(n) => number(n),
        Err(e) => LiteralValue::Error(e),
    }
}

/* ---------- broadcasting ---------- */

fn shape(rows: &[Vec<LiteralValue>]) -> (usize, usize) {
    (rows.len(), rows.iter().map(Vec::len).max().unwrap_or(0))
}

/// Element of `rows` at `(i, j)`, stretching singleton dimensions. Positions
/// outside a non-singleton dimension are `#N/A`.
fn project(rows: &[Vec<LiteralValue>], (h, w): (usize, usize), i: usize, j: usize) -> LiteralValue {
    let r = if h == 1 { 0 } else { i };
    let c = if w == 1 { 0 } else { j };
    if r >= h || c >= w {
        return LiteralValue::error(ExcelErrorKind::Na);
    }
    rows.get(r)
        .and_then(|row| row.get(c))
        .cloned()
        .unwrap_or(LiteralValue::Empty)
}

/// Apply a scalar operator element-wise when either side is an array.
fn broadcast<F>(left: LiteralValue, right: LiteralValue, f: F) -> LiteralValue
where
    F: Fn(LiteralValue, LiteralValue) -> LiteralValue,
{
    let (l, r) = match (left, right) {
        (LiteralValue::Array(l), LiteralValue::Array(r)) => (l, r),
        (LiteralValue::Array(l), v) => (l, vec![vec![v]]),
        (v, LiteralValue::Array(r)) => (vec![vec![v]], r),
        (a, b) => return f(a, b),
    };
    let (ls, rs) = (shape(&l), shape(&r));
    let (h, w) = (ls.0.max(rs.0), ls.1.max(rs.1));
    LiteralValue::Array(
        (0..h)
            .map(|i| {
                (0..w)
                    .map(|j| f(project(&l, ls, i, j), project(&r, rs, i, j)))
                    .collect()
            })
            .collect(),
    )
}

/* ---------- comparison ---------- */

/// Type rank for mixed comparisons: numbers < text < booleans.
fn rank(v: &LiteralValue) -> u8 {
    match v {
        LiteralValue::Number(_) => 0,
        LiteralValue::Text(_) => 1,
        LiteralValue::Boolean(_) => 2,
        _ => 3,
    }
}

fn compare(op: &str, a: LiteralValue, b: LiteralValue) -> LiteralValue {
    use LiteralValue::*;
    let ord = match (&a, &b) {
        (Error(e), _) | (_, Error(e)) => return Error(e.clone()),
        (Empty, Empty) => Ordering::Equal,
        (Number(x), Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Number(x), Empty) => x.partial_cmp(&0.0).unwrap_or(Ordering::Equal),
        (Empty, Number(y)) => 0.0_f64.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Text(x), Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Text(x), Empty) => x.as_str().cmp(""),
        (Empty, Text(y)) => "".cmp(y.as_str()),
        (Boolean(x), Boolean(y)) => x.cmp(y),
        (Boolean(x), Empty) => x.cmp(&false),
        (Empty, Boolean(y)) => false.cmp(y),
        (x, y) => rank(x).cmp(&rank(y)),
    };
    Boolean(match op {
        "=" => ord == Ordering::Equal,
        "<>" => ord != Ordering::Equal,
        "<" => ord == Ordering::Less,
        ">" => ord == Ordering::Greater,
        "<=" => ord != Ordering::Greater,
        _ => ord != Ordering::Less,
    })
}
