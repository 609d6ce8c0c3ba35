use std::collections::HashMap;

use crate::error::{CostError, CostResult};
use crate::names::normalize;
use crate::parser::{parse, BinaryOp, Expr, UnaryOp};

/// Values available to a formula, keyed by normalized name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolTable {
    values: HashMap<String, f64>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` (normalized first), replacing any previous binding.
    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(normalize(name), value);
    }

    pub(crate) fn insert_normalized(&mut self, key: String, value: f64) {
        self.values.insert(key, value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(&normalize(name)).copied()
    }

    pub(crate) fn contains_normalized(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: AsRef<str>> FromIterator<(K, f64)> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut table = SymbolTable::new();
        for (name, value) in iter {
            table.insert(name.as_ref(), value);
        }
        table
    }
}

/// Parses `formula` and evaluates it against `symbols`.
///
/// Only numeric literals, `+ - * /`, unary signs, parentheses, and names bound in `symbols`
/// are accepted. A name with no binding is reported as a syntax error at its offset.
pub fn evaluate(formula: &str, symbols: &SymbolTable) -> CostResult<f64> {
    let expr = parse(formula)?;
    eval_expr(&expr, symbols)
}

/// Evaluates a parsed formula. Any non-finite intermediate value is a
/// [`CostError::NonFinite`] error rather than a cost.
pub fn eval_expr(expr: &Expr, symbols: &SymbolTable) -> CostResult<f64> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Ident { name, offset } => {
            let value = symbols.get(name).ok_or_else(|| {
                CostError::syntax(format!("unresolved name {name:?}"), *offset)
            })?;
            finite(value, *offset)
        }
        Expr::UnaryOp { op, expr } => {
            let value = eval_expr(expr, symbols)?;
            Ok(match op {
                UnaryOp::Negate => -value,
                UnaryOp::Plus => value,
            })
        }
        Expr::BinaryOp {
            op,
            left,
            right,
            offset,
        } => {
            let l = eval_expr(left, symbols)?;
            let r = eval_expr(right, symbols)?;
            let value = match op {
                BinaryOp::Add => l + r,
                BinaryOp::Subtract => l - r,
                BinaryOp::Multiply => l * r,
                BinaryOp::Divide => {
                    if r == 0.0 {
                        return Err(CostError::DivisionByZero);
                    }
                    l / r
                }
            };
            finite(value, *offset)
        }
    }
}

fn finite(value: f64, offset: usize) -> CostResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CostError::NonFinite { offset })
    }
}
