//! Expression tree with per-node metadata and canonical rendering.
//!
//! Every node carries the metadata the planner interrogates (kind,
//! scalar/sequence shape, immutability, referenced root fields, `*`
//! usage) plus its normalized source text, all computed bottom-up at
//! construction time. Nodes are immutable and shared behind `Arc` so
//! splitting a predicate into terms never copies subtrees.

use std::fmt;
use std::sync::Arc;

use crate::document::Value;
use crate::expression::functions::FunctionDef;

/// Enumerated kind tag exposed by compiled expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExprKind {
    /// Integer literal.
    Int,
    /// Floating point literal.
    Double,
    /// String literal.
    String,
    /// Boolean literal.
    Boolean,
    /// Null literal.
    Null,
    /// Array initializer.
    Array,
    /// Document initializer.
    Document,
    /// `@name` / `@0` parameter reference.
    Parameter,
    /// Built-in function call.
    Call,
    /// Path rooted at `$` or `@`.
    Path,
    /// The `*` source reference.
    Source,
    /// `MAP(input => projection)`.
    Map,
    /// `FILTER(input => predicate)`.
    Filter,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*` (binary)
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `LIKE`
    Like,
    /// `BETWEEN ... AND ...`
    Between,
    /// `IN`
    In,
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl ExprKind {
    /// True for the kinds usable as where-clause predicates.
    pub fn is_predicate(self) -> bool {
        matches!(
            self,
            ExprKind::Equal
                | ExprKind::NotEqual
                | ExprKind::GreaterThan
                | ExprKind::GreaterThanOrEqual
                | ExprKind::LessThan
                | ExprKind::LessThanOrEqual
                | ExprKind::Like
                | ExprKind::Between
                | ExprKind::In
                | ExprKind::And
                | ExprKind::Or
        )
    }
}

/// Binary operator tag with its canonical rendering and precedence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    Between,
    In,
    And,
    Or,
}

impl BinaryOp {
    /// Expression kind this operator produces.
    pub fn kind(self) -> ExprKind {
        match self {
            BinaryOp::Add => ExprKind::Add,
            BinaryOp::Subtract => ExprKind::Subtract,
            BinaryOp::Multiply => ExprKind::Multiply,
            BinaryOp::Divide => ExprKind::Divide,
            BinaryOp::Modulo => ExprKind::Modulo,
            BinaryOp::Equal => ExprKind::Equal,
            BinaryOp::NotEqual => ExprKind::NotEqual,
            BinaryOp::GreaterThan => ExprKind::GreaterThan,
            BinaryOp::GreaterThanOrEqual => ExprKind::GreaterThanOrEqual,
            BinaryOp::LessThan => ExprKind::LessThan,
            BinaryOp::LessThanOrEqual => ExprKind::LessThanOrEqual,
            BinaryOp::Like => ExprKind::Like,
            BinaryOp::Between => ExprKind::Between,
            BinaryOp::In => ExprKind::In,
            BinaryOp::And => ExprKind::And,
            BinaryOp::Or => ExprKind::Or,
        }
    }

    /// Precedence level; higher binds tighter. Comparisons share level
    /// 3 and are non-associative.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual
            | BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::Like
            | BinaryOp::Between
            | BinaryOp::In => 3,
            BinaryOp::Add | BinaryOp::Subtract => 4,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 5,
        }
    }

    /// Canonical operator text. Symbol operators render with no
    /// surrounding spaces; keyword operators render with single spaces.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::Like => " LIKE ",
            BinaryOp::Between => " BETWEEN ",
            BinaryOp::In => " IN ",
            BinaryOp::And => " AND ",
            BinaryOp::Or => " OR ",
        }
    }

    /// True for the six comparison operators that accept ANY/ALL.
    pub fn accepts_quantifier(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
        )
    }
}

/// Quantifier written on a comparison; `Implicit` means none was
/// written and sequence left sides default to ANY semantics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Quantifier {
    /// No quantifier keyword in the source.
    #[default]
    Implicit,
    /// Explicit `ANY`.
    Any,
    /// Explicit `ALL`.
    All,
}

/// Structural shape of a node; children are shared subtrees.
#[derive(Debug)]
pub enum Shape {
    /// Constant value.
    Literal(Value),
    /// `[a, b, ...]`
    ArrayInit(Vec<Arc<Node>>),
    /// `{key: value, ...}`
    DocumentInit(Vec<(String, Arc<Node>)>),
    /// `@name` or positional `@0`.
    Parameter(String),
    /// Built-in call with pre-resolved definition.
    Call {
        /// Resolved registry entry.
        func: &'static FunctionDef,
        /// Ordered argument expressions.
        args: Vec<Arc<Node>>,
    },
    /// `$`
    Root,
    /// `@`
    Current,
    /// `base.name`
    Field {
        base: Arc<Node>,
        name: String,
    },
    /// `base[index]` with a scalar index expression.
    IndexAccess {
        base: Arc<Node>,
        index: Arc<Node>,
    },
    /// `base[predicate]`
    FilterAccess {
        base: Arc<Node>,
        predicate: Arc<Node>,
    },
    /// `base[*]`
    AllAccess {
        base: Arc<Node>,
    },
    /// `*`
    Source,
    /// `MAP(input => projection)`
    Map {
        input: Arc<Node>,
        projection: Arc<Node>,
    },
    /// `FILTER(input => predicate)`
    Filter {
        input: Arc<Node>,
        predicate: Arc<Node>,
    },
    /// Binary operator application.
    Binary {
        op: BinaryOp,
        quantifier: Quantifier,
        left: Arc<Node>,
        right: Arc<Node>,
    },
}

/// Immutable expression node with precomputed metadata.
#[derive(Debug)]
pub struct Node {
    /// Structural shape.
    pub shape: Shape,
    /// Kind tag.
    pub kind: ExprKind,
    /// Canonical normalized source.
    pub source: String,
    /// True when the node yields at most one value per invocation.
    pub scalar: bool,
    /// True when no subtree depends on ambient state or parameters.
    pub immutable: bool,
    /// True when any subtree is the `*` source reference.
    pub uses_source: bool,
    /// First-level root field names, case-insensitively deduplicated.
    pub fields: Vec<String>,
}

impl Node {
    /// Builds a node, deriving all metadata from the shape.
    pub fn build(shape: Shape) -> Arc<Node> {
        let kind = shape_kind(&shape);
        let scalar = shape_scalar(&shape);
        let immutable = shape_immutable(&shape);
        let uses_source = shape_uses_source(&shape);
        let mut fields = Vec::new();
        collect_fields(&shape, &mut fields);
        let source = render(&shape);
        Arc::new(Node {
            shape,
            kind,
            source,
            scalar,
            immutable,
            uses_source,
            fields,
        })
    }

    /// Quantifier on a comparison node, `Implicit` otherwise.
    pub fn quantifier(&self) -> Quantifier {
        match &self.shape {
            Shape::Binary { quantifier, .. } => *quantifier,
            _ => Quantifier::Implicit,
        }
    }

    /// Left child of a binary node.
    pub fn left(&self) -> Option<&Arc<Node>> {
        match &self.shape {
            Shape::Binary { left, .. } => Some(left),
            _ => None,
        }
    }

    /// Right child of a binary node.
    pub fn right(&self) -> Option<&Arc<Node>> {
        match &self.shape {
            Shape::Binary { right, .. } => Some(right),
            _ => None,
        }
    }

    /// Rendering precedence; atoms bind tightest.
    fn precedence(&self) -> u8 {
        match &self.shape {
            Shape::Binary { op, .. } => op.precedence(),
            _ => 6,
        }
    }
}

/// Adds a root field name, deduplicating case-insensitively while
/// preserving the first form seen.
pub fn add_field(fields: &mut Vec<String>, name: &str) {
    if !fields.iter().any(|f| f.eq_ignore_ascii_case(name)) {
        fields.push(name.to_owned());
    }
}

fn shape_kind(shape: &Shape) -> ExprKind {
    match shape {
        Shape::Literal(value) => match value {
            Value::Int32(_) | Value::Int64(_) => ExprKind::Int,
            Value::Double(_) | Value::Decimal(_) => ExprKind::Double,
            Value::String(_) => ExprKind::String,
            Value::Boolean(_) => ExprKind::Boolean,
            _ => ExprKind::Null,
        },
        Shape::ArrayInit(_) => ExprKind::Array,
        Shape::DocumentInit(_) => ExprKind::Document,
        Shape::Parameter(_) => ExprKind::Parameter,
        Shape::Call { .. } => ExprKind::Call,
        Shape::Root
        | Shape::Current
        | Shape::Field { .. }
        | Shape::IndexAccess { .. }
        | Shape::FilterAccess { .. }
        | Shape::AllAccess { .. } => ExprKind::Path,
        Shape::Source => ExprKind::Source,
        Shape::Map { .. } => ExprKind::Map,
        Shape::Filter { .. } => ExprKind::Filter,
        Shape::Binary { op, .. } => op.kind(),
    }
}

fn shape_scalar(shape: &Shape) -> bool {
    match shape {
        Shape::Literal(_)
        | Shape::ArrayInit(_)
        | Shape::DocumentInit(_)
        | Shape::Parameter(_)
        | Shape::Root
        | Shape::Current
        | Shape::Field { .. }
        | Shape::IndexAccess { .. }
        | Shape::Binary { .. } => true,
        Shape::Call { func, .. } => !func.sequence,
        Shape::FilterAccess { .. }
        | Shape::AllAccess { .. }
        | Shape::Source
        | Shape::Map { .. }
        | Shape::Filter { .. } => false,
    }
}

fn shape_immutable(shape: &Shape) -> bool {
    match shape {
        Shape::Literal(_) | Shape::Root | Shape::Current | Shape::Source => true,
        Shape::Parameter(_) => false,
        Shape::ArrayInit(items) => items.iter().all(|n| n.immutable),
        Shape::DocumentInit(pairs) => pairs.iter().all(|(_, n)| n.immutable),
        Shape::Call { func, args } => {
            func.is_immutable(args.len()) && args.iter().all(|n| n.immutable)
        }
        Shape::Field { base, .. } => base.immutable,
        Shape::IndexAccess { base, index } => base.immutable && index.immutable,
        Shape::FilterAccess { base, predicate } => base.immutable && predicate.immutable,
        Shape::AllAccess { base } => base.immutable,
        Shape::Map { input, projection } => input.immutable && projection.immutable,
        Shape::Filter { input, predicate } => input.immutable && predicate.immutable,
        Shape::Binary { left, right, .. } => left.immutable && right.immutable,
    }
}

fn shape_uses_source(shape: &Shape) -> bool {
    match shape {
        Shape::Source => true,
        Shape::Literal(_) | Shape::Parameter(_) | Shape::Root | Shape::Current => false,
        Shape::ArrayInit(items) => items.iter().any(|n| n.uses_source),
        Shape::DocumentInit(pairs) => pairs.iter().any(|(_, n)| n.uses_source),
        Shape::Call { args, .. } => args.iter().any(|n| n.uses_source),
        Shape::Field { base, .. } | Shape::AllAccess { base } => base.uses_source,
        Shape::IndexAccess { base, index } => base.uses_source || index.uses_source,
        Shape::FilterAccess { base, predicate } => base.uses_source || predicate.uses_source,
        Shape::Map { input, projection } => input.uses_source || projection.uses_source,
        Shape::Filter { input, predicate } => input.uses_source || predicate.uses_source,
        Shape::Binary { left, right, .. } => left.uses_source || right.uses_source,
    }
}

fn collect_fields(shape: &Shape, fields: &mut Vec<String>) {
    match shape {
        Shape::Literal(_) | Shape::Parameter(_) | Shape::Current => {}
        Shape::Root | Shape::Source => add_field(fields, "$"),
        Shape::Field { base, name } => {
            if matches!(base.shape, Shape::Root) {
                add_field(fields, name);
            } else {
                merge_fields(base, fields);
            }
        }
        Shape::IndexAccess { base, index } => {
            merge_fields(base, fields);
            merge_fields(index, fields);
        }
        Shape::FilterAccess { base, predicate } => {
            merge_fields(base, fields);
            merge_fields(predicate, fields);
        }
        Shape::AllAccess { base } => merge_fields(base, fields),
        Shape::ArrayInit(items) => {
            for item in items {
                merge_fields(item, fields);
            }
        }
        Shape::DocumentInit(pairs) => {
            for (_, value) in pairs {
                merge_fields(value, fields);
            }
        }
        Shape::Call { args, .. } => {
            for arg in args {
                merge_fields(arg, fields);
            }
        }
        Shape::Map { input, projection } => {
            merge_fields(input, fields);
            merge_fields(projection, fields);
        }
        Shape::Filter { input, predicate } => {
            merge_fields(input, fields);
            merge_fields(predicate, fields);
        }
        Shape::Binary { left, right, .. } => {
            merge_fields(left, fields);
            merge_fields(right, fields);
        }
    }
}

fn merge_fields(node: &Node, fields: &mut Vec<String>) {
    for name in &node.fields {
        add_field(fields, name);
    }
}

/// True when the identifier can render without bracketing.
pub fn is_safe_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn escape_string(text: &str, out: &mut String) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

fn render(shape: &Shape) -> String {
    let mut out = String::new();
    write_shape(shape, &mut out);
    out
}

fn write_child(node: &Node, parent: BinaryOp, right_side: bool, out: &mut String) {
    let child_prec = node.precedence();
    let parent_prec = parent.precedence();
    // Comparisons (level 3) are non-associative and re-parenthesize on
    // both sides; left-associative operators only on the right.
    let parens = child_prec < parent_prec
        || (child_prec == parent_prec && (right_side || parent_prec == 3));
    if parens {
        out.push('(');
        out.push_str(&node.source);
        out.push(')');
    } else {
        out.push_str(&node.source);
    }
}

fn write_shape(shape: &Shape, out: &mut String) {
    match shape {
        Shape::Literal(value) => write_literal(value, out),
        Shape::ArrayInit(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&item.source);
            }
            out.push(']');
        }
        Shape::DocumentInit(pairs) => {
            out.push('{');
            for (i, (key, value)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if is_safe_identifier(key) {
                    out.push_str(key);
                } else {
                    escape_string(key, out);
                }
                out.push(':');
                out.push_str(&value.source);
            }
            out.push('}');
        }
        Shape::Parameter(name) => {
            out.push('@');
            out.push_str(name);
        }
        Shape::Call { func, args } => {
            out.push_str(func.name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&arg.source);
            }
            out.push(')');
        }
        Shape::Root => out.push('$'),
        Shape::Current => out.push('@'),
        Shape::Field { base, name } => {
            out.push_str(&base.source);
            out.push('.');
            if is_safe_identifier(name) {
                out.push_str(name);
            } else {
                out.push('[');
                escape_string(name, out);
                out.push(']');
            }
        }
        Shape::IndexAccess { base, index } => {
            out.push_str(&base.source);
            out.push('[');
            out.push_str(&index.source);
            out.push(']');
        }
        Shape::FilterAccess { base, predicate } => {
            out.push_str(&base.source);
            out.push('[');
            out.push_str(&predicate.source);
            out.push(']');
        }
        Shape::AllAccess { base } => {
            out.push_str(&base.source);
            out.push_str("[*]");
        }
        Shape::Source => out.push('*'),
        Shape::Map { input, projection } => {
            out.push_str("MAP(");
            out.push_str(&input.source);
            out.push_str("=>");
            out.push_str(&projection.source);
            out.push(')');
        }
        Shape::Filter { input, predicate } => {
            out.push_str("FILTER(");
            out.push_str(&input.source);
            out.push_str("=>");
            out.push_str(&predicate.source);
            out.push(')');
        }
        Shape::Binary {
            op: BinaryOp::Between,
            left,
            right,
            ..
        } => {
            write_child(left, BinaryOp::Between, false, out);
            out.push_str(" BETWEEN ");
            let (low, high) = between_bounds(right);
            write_child(low, BinaryOp::Between, true, out);
            out.push_str(" AND ");
            write_child(high, BinaryOp::Between, true, out);
        }
        Shape::Binary {
            op,
            quantifier,
            left,
            right,
        } => {
            write_child(left, *op, false, out);
            match quantifier {
                Quantifier::Implicit => {}
                Quantifier::Any => out.push_str(" ANY"),
                Quantifier::All => out.push_str(" ALL"),
            }
            out.push_str(op.symbol());
            write_child(right, *op, true, out);
        }
    }
}

/// The right side of BETWEEN is always a two-element array initializer
/// holding the bounds.
fn between_bounds(right: &Node) -> (&Node, &Node) {
    match &right.shape {
        Shape::ArrayInit(items) if items.len() == 2 => (items[0].as_ref(), items[1].as_ref()),
        _ => (right, right),
    }
}

fn write_literal(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Boolean(true) => out.push_str("true"),
        Value::Boolean(false) => out.push_str("false"),
        Value::Int32(i) => out.push_str(&i.to_string()),
        Value::Int64(i) => out.push_str(&i.to_string()),
        Value::Double(d) => out.push_str(&crate::document::format_double(*d)),
        Value::String(s) => escape_string(s, out),
        other => out.push_str(&other.to_string()),
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
