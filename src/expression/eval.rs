//! Tree-walking evaluator for compiled expressions.
//!
//! Evaluation is pure: the same `(source, root, current, collation,
//! parameters)` inputs always produce the same output sequence.
//! Type mismatches and division by zero yield `Null`; only malformed
//! inputs (reserved update keys, invalid document keys) raise.

use std::cmp::Ordering;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::document::{Collation, Document, Value};
use crate::error::Result;
use crate::expression::node::{BinaryOp, Node, Quantifier, Shape};

/// Inputs for one evaluation pass.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// Root document (`$`).
    pub root: &'a Value,
    /// Current value (`@`), equal to `root` at the top level.
    pub current: &'a Value,
    /// External sequence backing `*`.
    pub source: &'a [Value],
    /// Collation for string comparisons.
    pub collation: &'a Collation,
    /// Parameters document; `@i` reads its `i`-th key.
    pub parameters: &'a Document,
}

impl<'a> EvalContext<'a> {
    /// Rebinds `@` for MAP/FILTER projections.
    fn nested<'b>(&'b self, current: &'b Value) -> EvalContext<'b> {
        EvalContext {
            root: self.root,
            current,
            source: self.source,
            collation: self.collation,
            parameters: self.parameters,
        }
    }
}

/// First element of a sequence, or `Null` when empty. This is the
/// scalar view of any evaluation result.
pub fn first_or_null(mut values: Vec<Value>) -> Value {
    if values.is_empty() {
        Value::Null
    } else {
        values.swap_remove(0)
    }
}

/// Evaluates a node, yielding a finite sequence of values. Scalar
/// nodes yield exactly one element; missing path segments yield none.
pub fn evaluate(node: &Arc<Node>, ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    match &node.shape {
        Shape::Literal(value) => Ok(vec![value.clone()]),
        Shape::ArrayInit(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.extend(evaluate(item, ctx)?);
            }
            Ok(vec![Value::Array(out)])
        }
        Shape::DocumentInit(pairs) => {
            let mut doc = Document::new();
            for (key, value) in pairs {
                doc.insert(key.clone(), first_or_null(evaluate(value, ctx)?))?;
            }
            Ok(vec![Value::Document(doc)])
        }
        Shape::Parameter(name) => {
            let value = if name.bytes().all(|b| b.is_ascii_digit()) {
                let index: usize = name.parse().unwrap_or(usize::MAX);
                ctx.parameters.get_index(index)
            } else {
                ctx.parameters.get(name)
            };
            Ok(vec![value.cloned().unwrap_or(Value::Null)])
        }
        Shape::Call { func, args } => func.invoke(args, ctx),
        Shape::Root => Ok(vec![ctx.root.clone()]),
        Shape::Current => Ok(vec![ctx.current.clone()]),
        Shape::Field { base, name } => {
            let mut out = Vec::new();
            for value in evaluate(base, ctx)? {
                if let Value::Document(doc) = value {
                    if let Some(found) = doc.get(name) {
                        out.push(found.clone());
                    }
                }
            }
            Ok(out)
        }
        Shape::IndexAccess { base, index } => {
            let idx = first_or_null(evaluate(index, ctx)?);
            let Some(idx) = idx.to_int64() else {
                return Ok(Vec::new());
            };
            let mut out = Vec::new();
            for value in evaluate(base, ctx)? {
                if let Value::Array(items) = value {
                    let resolved = if idx < 0 { items.len() as i64 + idx } else { idx };
                    if resolved >= 0 && (resolved as usize) < items.len() {
                        out.push(items[resolved as usize].clone());
                    }
                }
            }
            Ok(out)
        }
        Shape::FilterAccess { base, predicate } => {
            let mut out = Vec::new();
            for value in evaluate(base, ctx)? {
                if let Value::Array(items) = value {
                    for item in items {
                        let keep =
                            first_or_null(evaluate(predicate, &ctx.nested(&item))?).is_truthy();
                        if keep {
                            out.push(item);
                        }
                    }
                }
            }
            Ok(out)
        }
        Shape::AllAccess { base } => {
            let mut out = Vec::new();
            for value in evaluate(base, ctx)? {
                if let Value::Array(items) = value {
                    out.extend(items);
                }
            }
            Ok(out)
        }
        Shape::Source => Ok(ctx.source.to_vec()),
        Shape::Map { input, projection } => {
            let mut out = Vec::new();
            for element in evaluate(input, ctx)? {
                out.extend(evaluate(projection, &ctx.nested(&element))?);
            }
            Ok(out)
        }
        Shape::Filter { input, predicate } => {
            let mut out = Vec::new();
            for element in evaluate(input, ctx)? {
                let keep = first_or_null(evaluate(predicate, &ctx.nested(&element))?).is_truthy();
                if keep {
                    out.push(element);
                }
            }
            Ok(out)
        }
        Shape::Binary {
            op,
            quantifier,
            left,
            right,
        } => evaluate_binary(*op, *quantifier, left, right, ctx),
    }
}

fn evaluate_binary(
    op: BinaryOp,
    quantifier: Quantifier,
    left: &Arc<Node>,
    right: &Arc<Node>,
    ctx: &EvalContext<'_>,
) -> Result<Vec<Value>> {
    match op {
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide
        | BinaryOp::Modulo => {
            let l = first_or_null(evaluate(left, ctx)?);
            let r = first_or_null(evaluate(right, ctx)?);
            Ok(vec![arithmetic(op, &l, &r)])
        }
        BinaryOp::And => {
            let l = first_or_null(evaluate(left, ctx)?).is_truthy();
            if !l {
                return Ok(vec![Value::Boolean(false)]);
            }
            let r = first_or_null(evaluate(right, ctx)?).is_truthy();
            Ok(vec![Value::Boolean(r)])
        }
        BinaryOp::Or => {
            let l = first_or_null(evaluate(left, ctx)?).is_truthy();
            if l {
                return Ok(vec![Value::Boolean(true)]);
            }
            let r = first_or_null(evaluate(right, ctx)?).is_truthy();
            Ok(vec![Value::Boolean(r)])
        }
        BinaryOp::Like => {
            let l = first_or_null(evaluate(left, ctx)?);
            let r = first_or_null(evaluate(right, ctx)?);
            let matched = match (l.as_str(), r.as_str()) {
                (Some(text), Some(pattern)) => like_match(text, pattern, ctx.collation),
                _ => false,
            };
            Ok(vec![Value::Boolean(matched)])
        }
        BinaryOp::In => {
            let l = first_or_null(evaluate(left, ctx)?);
            let r = first_or_null(evaluate(right, ctx)?);
            let contained = match &r {
                Value::Array(items) => items.iter().any(|item| l.eq_with(item, ctx.collation)),
                other => l.eq_with(other, ctx.collation),
            };
            Ok(vec![Value::Boolean(contained)])
        }
        BinaryOp::Between => {
            let l = first_or_null(evaluate(left, ctx)?);
            let bounds = first_or_null(evaluate(right, ctx)?);
            let result = match bounds.as_array() {
                Some([low, high]) => {
                    l.compare(low, ctx.collation) != Ordering::Less
                        && l.compare(high, ctx.collation) != Ordering::Greater
                }
                _ => false,
            };
            Ok(vec![Value::Boolean(result)])
        }
        BinaryOp::Equal
        | BinaryOp::NotEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual
        | BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual => {
            let quantified = !left.scalar || quantifier != Quantifier::Implicit;
            if quantified {
                let elements = evaluate(left, ctx)?;
                let r = first_or_null(evaluate(right, ctx)?);
                let all = quantifier == Quantifier::All;
                let result = if all {
                    elements
                        .iter()
                        .all(|el| compare_values(op, el, &r, ctx.collation))
                } else {
                    elements
                        .iter()
                        .any(|el| compare_values(op, el, &r, ctx.collation))
                };
                Ok(vec![Value::Boolean(result)])
            } else {
                let l = first_or_null(evaluate(left, ctx)?);
                let r = first_or_null(evaluate(right, ctx)?);
                Ok(vec![Value::Boolean(compare_values(op, &l, &r, ctx.collation))])
            }
        }
    }
}

fn compare_values(op: BinaryOp, left: &Value, right: &Value, collation: &Collation) -> bool {
    let ordering = left.compare(right, collation);
    match op {
        BinaryOp::Equal => ordering == Ordering::Equal,
        BinaryOp::NotEqual => ordering != Ordering::Equal,
        BinaryOp::GreaterThan => ordering == Ordering::Greater,
        BinaryOp::GreaterThanOrEqual => ordering != Ordering::Less,
        BinaryOp::LessThan => ordering == Ordering::Less,
        BinaryOp::LessThanOrEqual => ordering != Ordering::Greater,
        _ => false,
    }
}

/// Widened numeric addition shared with SUM/AVG.
pub(crate) fn numeric_add(left: &Value, right: &Value) -> Value {
    arithmetic(BinaryOp::Add, left, right)
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Value {
    if op == BinaryOp::Add {
        if let (Value::String(a), Value::String(b)) = (left, right) {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            return Value::String(out);
        }
    }
    if !left.is_number() || !right.is_number() {
        return Value::Null;
    }
    // Widest operand type wins: Decimal > Double > Int64 > Int32.
    if matches!(left, Value::Decimal(_)) || matches!(right, Value::Decimal(_)) {
        let (Some(a), Some(b)) = (left.to_decimal(), right.to_decimal()) else {
            return Value::Null;
        };
        return decimal_arithmetic(op, a, b);
    }
    if matches!(left, Value::Double(_)) || matches!(right, Value::Double(_)) {
        let (Some(a), Some(b)) = (left.to_double(), right.to_double()) else {
            return Value::Null;
        };
        return double_arithmetic(op, a, b);
    }
    let (Some(a), Some(b)) = (left.to_int64(), right.to_int64()) else {
        return Value::Null;
    };
    let narrow = matches!(left, Value::Int32(_)) && matches!(right, Value::Int32(_));
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Subtract => a.checked_sub(b),
        BinaryOp::Multiply => a.checked_mul(b),
        BinaryOp::Divide => {
            if b == 0 {
                return Value::Null;
            }
            // Integer division follows the widened double semantics.
            return double_arithmetic(op, a as f64, b as f64);
        }
        BinaryOp::Modulo => {
            if b == 0 {
                return Value::Null;
            }
            a.checked_rem(b)
        }
        _ => None,
    };
    match result {
        Some(v) if narrow && i32::try_from(v).is_ok() => Value::Int32(v as i32),
        Some(v) => Value::Int64(v),
        None => double_arithmetic(op, a as f64, b as f64),
    }
}

fn double_arithmetic(op: BinaryOp, a: f64, b: f64) -> Value {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => {
            if b == 0.0 {
                return Value::Null;
            }
            a / b
        }
        BinaryOp::Modulo => {
            if b == 0.0 {
                return Value::Null;
            }
            a % b
        }
        _ => return Value::Null,
    };
    Value::Double(result)
}

fn decimal_arithmetic(op: BinaryOp, a: Decimal, b: Decimal) -> Value {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Subtract => a.checked_sub(b),
        BinaryOp::Multiply => a.checked_mul(b),
        BinaryOp::Divide => {
            if b.is_zero() {
                return Value::Null;
            }
            a.checked_div(b)
        }
        BinaryOp::Modulo => {
            if b.is_zero() {
                return Value::Null;
            }
            a.checked_rem(b)
        }
        _ => None,
    };
    result.map(Value::Decimal).unwrap_or(Value::Null)
}

/// `%` matches any run of characters (including empty), `_` matches
/// exactly one; everything else matches itself under the collation.
pub(crate) fn like_match(text: &str, pattern: &str, collation: &Collation) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like_rec(&text, &pattern, collation)
}

fn like_rec(text: &[char], pattern: &[char], collation: &Collation) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => {
            like_rec(text, &pattern[1..], collation)
                || (!text.is_empty() && like_rec(&text[1..], pattern, collation))
        }
        Some('_') => !text.is_empty() && like_rec(&text[1..], &pattern[1..], collation),
        Some(&expected) => text
            .first()
            .is_some_and(|&actual| collation.eq_char(actual, expected))
            && like_rec(&text[1..], &pattern[1..], collation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards() {
        let c = Collation::binary();
        assert!(like_match("hello", "h%", &c));
        assert!(like_match("hello", "%llo", &c));
        assert!(like_match("hello", "h_llo", &c));
        assert!(like_match("hello", "%", &c));
        assert!(like_match("", "%", &c));
        assert!(!like_match("hello", "h_o", &c));
        assert!(!like_match("hello", "ello", &c));
    }

    #[test]
    fn like_respects_collation() {
        assert!(!like_match("HELLO", "he%", &Collation::binary()));
        assert!(like_match("HELLO", "he%", &Collation::case_insensitive("en")));
    }

    #[test]
    fn arithmetic_widens() {
        assert_eq!(
            arithmetic(BinaryOp::Add, &Value::Int32(1), &Value::Int32(2)),
            Value::Int32(3)
        );
        assert_eq!(
            arithmetic(BinaryOp::Add, &Value::Int32(1), &Value::Int64(2)),
            Value::Int64(3)
        );
        assert_eq!(
            arithmetic(BinaryOp::Multiply, &Value::Int32(2), &Value::Double(1.5)),
            Value::Double(3.0)
        );
    }

    #[test]
    fn division_by_zero_is_null() {
        assert_eq!(
            arithmetic(BinaryOp::Divide, &Value::Int32(1), &Value::Int32(0)),
            Value::Null
        );
        assert_eq!(
            arithmetic(BinaryOp::Modulo, &Value::Double(1.0), &Value::Double(0.0)),
            Value::Null
        );
    }

    #[test]
    fn string_plus_concatenates_mixed_is_null() {
        assert_eq!(
            arithmetic(BinaryOp::Add, &Value::String("a".into()), &Value::String("b".into())),
            Value::String("ab".into())
        );
        assert_eq!(
            arithmetic(BinaryOp::Add, &Value::String("a".into()), &Value::Int32(1)),
            Value::Null
        );
    }

    #[test]
    fn integer_overflow_escapes_to_double() {
        let huge = arithmetic(BinaryOp::Multiply, &Value::Int64(i64::MAX), &Value::Int64(2));
        assert!(matches!(huge, Value::Double(_)));
    }
}
