//! Expression sublanguage: tokenizing, parsing, compilation, and
//! evaluation of path-and-predicate expressions.
//!
//! A compiled [`Expression`] is immutable and freely shareable across
//! threads; its metadata (normalized source, kind, scalar shape,
//! immutability, referenced fields) drives index selection in the
//! planner. Compilation results are cached process-wide by source
//! text.

pub mod eval;
pub mod functions;
pub mod node;
pub mod parser;
pub mod tokenizer;

use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::trace;

use crate::document::{Collation, Document, Value};
use crate::error::{Error, Result};
use eval::{evaluate, first_or_null};
use node::{Node, Quantifier, Shape};

pub use eval::EvalContext;
pub use node::ExprKind;
pub use parser::MAX_EXPRESSION_DEPTH;

static CACHE: OnceLock<DashMap<String, Arc<Node>>> = OnceLock::new();

fn cache() -> &'static DashMap<String, Arc<Node>> {
    CACHE.get_or_init(DashMap::new)
}

/// Compiled, immutable expression with planner-facing metadata.
///
/// Cloning is cheap: the node tree and the parameters document are
/// shared.
#[derive(Clone, Debug)]
pub struct Expression {
    node: Arc<Node>,
    parameters: Arc<Document>,
}

impl Expression {
    /// Parses and compiles an expression, consulting the process-wide
    /// compile cache first.
    pub fn parse(source: &str) -> Result<Expression> {
        Ok(Expression {
            node: parse_cached(source)?,
            parameters: Arc::new(Document::new()),
        })
    }

    /// Like [`Expression::parse`], attaching a parameters document
    /// resolved by `@0` / `@name` references.
    pub fn parse_with(source: &str, parameters: Document) -> Result<Expression> {
        Ok(Expression {
            node: parse_cached(source)?,
            parameters: Arc::new(parameters),
        })
    }

    /// Parses an expression required to be stable across documents:
    /// parameters, `*`, volatile calls, and operators outside bracket
    /// filter predicates are rejected.
    pub fn parse_for_index(source: &str) -> Result<Expression> {
        let node = parse_cached(source)?;
        validate_index_node(&node, false)?;
        Ok(Expression {
            node,
            parameters: Arc::new(Document::new()),
        })
    }

    pub(crate) fn from_node(node: Arc<Node>, parameters: Arc<Document>) -> Expression {
        Expression { node, parameters }
    }

    pub(crate) fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub(crate) fn share_parameters(&self) -> Arc<Document> {
        Arc::clone(&self.parameters)
    }

    /// Canonical normalized source text.
    pub fn source(&self) -> &str {
        &self.node.source
    }

    /// Kind tag of the root node.
    pub fn kind(&self) -> ExprKind {
        self.node.kind
    }

    /// True when the expression yields at most one value.
    pub fn is_scalar(&self) -> bool {
        self.node.scalar
    }

    /// True when no subtree depends on ambient state or parameters.
    pub fn is_immutable(&self) -> bool {
        self.node.immutable
    }

    /// True when any subtree is the `*` source reference.
    pub fn uses_source(&self) -> bool {
        self.node.uses_source
    }

    /// True for predicate kinds (comparisons, LIKE, BETWEEN, IN,
    /// AND, OR).
    pub fn is_predicate(&self) -> bool {
        self.node.kind.is_predicate()
    }

    /// True for ANY-quantified comparisons; sequence-vs-scalar
    /// comparisons default to ANY when no quantifier is written.
    pub fn is_any(&self) -> bool {
        match &self.node.shape {
            Shape::Binary {
                op,
                quantifier,
                left,
                ..
            } if op.accepts_quantifier() => match quantifier {
                Quantifier::Any => true,
                Quantifier::All => false,
                Quantifier::Implicit => !left.scalar,
            },
            _ => false,
        }
    }

    /// True for explicitly ALL-quantified comparisons.
    pub fn is_all(&self) -> bool {
        self.node.quantifier() == Quantifier::All
    }

    /// First-level root field names referenced by the expression;
    /// `"$"` means the whole document.
    pub fn fields(&self) -> &[String] {
        &self.node.fields
    }

    /// Attached parameters document.
    pub fn parameters(&self) -> &Document {
        &self.parameters
    }

    /// Left child of a binary expression.
    pub fn left(&self) -> Option<Expression> {
        self.node
            .left()
            .map(|node| Expression::from_node(Arc::clone(node), Arc::clone(&self.parameters)))
    }

    /// Right child of a binary expression.
    pub fn right(&self) -> Option<Expression> {
        self.node
            .right()
            .map(|node| Expression::from_node(Arc::clone(node), Arc::clone(&self.parameters)))
    }

    /// Pointer identity over the shared node tree; used by the planner
    /// to track which term an index consumed.
    pub fn same_node(&self, other: &Expression) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Runs the expression against an explicit evaluation context.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
        evaluate(&self.node, ctx)
    }

    /// Runs the expression against a root document with the attached
    /// parameters, yielding the full result sequence.
    pub fn execute(&self, root: &Value, collation: &Collation) -> Result<Vec<Value>> {
        let ctx = EvalContext {
            root,
            current: root,
            source: &[],
            collation,
            parameters: &self.parameters,
        };
        evaluate(&self.node, &ctx)
    }

    /// Scalar view of [`Expression::execute`]: the first emitted value,
    /// or `Null` on an empty sequence. Root and collation default to an
    /// empty document and the binary collation.
    pub fn execute_scalar(
        &self,
        root: Option<&Value>,
        collation: Option<&Collation>,
    ) -> Result<Value> {
        let default_root = Value::Document(Document::new());
        let default_collation = Collation::binary();
        let values = self.execute(
            root.unwrap_or(&default_root),
            collation.unwrap_or(&default_collation),
        )?;
        Ok(first_or_null(values))
    }

    /// The root reference `$`, shared process-wide.
    pub fn root() -> Expression {
        static ROOT: OnceLock<Expression> = OnceLock::new();
        ROOT.get_or_init(|| Expression::parse("$").expect("root expression parses"))
            .clone()
    }

    /// The primary-key path `$._id`, shared process-wide.
    pub fn id_path() -> Expression {
        static ID: OnceLock<Expression> = OnceLock::new();
        ID.get_or_init(|| Expression::parse("$._id").expect("id path parses"))
            .clone()
    }

    /// Aggregation selector counting the source documents.
    pub fn count_documents() -> Expression {
        static COUNT: OnceLock<Expression> = OnceLock::new();
        COUNT
            .get_or_init(|| {
                Expression::parse("{count: COUNT(*._id)}").expect("count selector parses")
            })
            .clone()
    }

    /// Aggregation selector testing for any source document.
    pub fn any_document() -> Expression {
        static EXISTS: OnceLock<Expression> = OnceLock::new();
        EXISTS
            .get_or_init(|| {
                Expression::parse("{exists: ANY(*._id)}").expect("exists selector parses")
            })
            .clone()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source() == other.source()
    }
}

impl Eq for Expression {}

fn parse_cached(source: &str) -> Result<Arc<Node>> {
    if let Some(node) = cache().get(source) {
        trace!(source, "expression cache hit");
        return Ok(Arc::clone(&node));
    }
    trace!(source, "expression cache miss");
    let node = parser::parse_source(source)?;
    let entry = cache()
        .entry(source.to_owned())
        .or_insert_with(|| Arc::clone(&node));
    Ok(Arc::clone(&entry))
}

/// Rejects constructs that would make an index expression unstable or
/// dependent on an ambient environment.
fn validate_index_node(node: &Arc<Node>, inside_filter: bool) -> Result<()> {
    let reject = |reason: &'static str| -> Result<()> {
        Err(Error::InvalidExpressionType {
            expression: node.source.clone(),
            reason,
        })
    };
    match &node.shape {
        Shape::Parameter(_) => return reject("index expressions cannot reference parameters"),
        Shape::Source => return reject("index expressions cannot reference `*`"),
        Shape::Binary { .. } if !inside_filter => {
            return reject("index expressions cannot contain operators")
        }
        Shape::Call { func, args } if !func.is_immutable(args.len()) => {
            return reject("index expressions cannot call volatile functions")
        }
        _ => {}
    }
    match &node.shape {
        Shape::Literal(_) | Shape::Parameter(_) | Shape::Root | Shape::Current | Shape::Source => {}
        Shape::ArrayInit(items) => {
            for item in items {
                validate_index_node(item, inside_filter)?;
            }
        }
        Shape::DocumentInit(pairs) => {
            for (_, value) in pairs {
                validate_index_node(value, inside_filter)?;
            }
        }
        Shape::Call { args, .. } => {
            for arg in args {
                validate_index_node(arg, inside_filter)?;
            }
        }
        Shape::Field { base, .. } | Shape::AllAccess { base } => {
            validate_index_node(base, inside_filter)?;
        }
        Shape::IndexAccess { base, index } => {
            validate_index_node(base, inside_filter)?;
            validate_index_node(index, true)?;
        }
        Shape::FilterAccess { base, predicate } => {
            validate_index_node(base, inside_filter)?;
            validate_index_node(predicate, true)?;
        }
        Shape::Map { input, projection } => {
            validate_index_node(input, inside_filter)?;
            validate_index_node(projection, inside_filter)?;
        }
        Shape::Filter { input, predicate } => {
            validate_index_node(input, inside_filter)?;
            validate_index_node(predicate, true)?;
        }
        Shape::Binary { left, right, .. } => {
            validate_index_node(left, inside_filter)?;
            validate_index_node(right, inside_filter)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_shares_node_trees() {
        let a = Expression::parse("$.cache_probe + 1").unwrap();
        let b = Expression::parse("$.cache_probe + 1").unwrap();
        assert!(Arc::ptr_eq(a.node(), b.node()));
    }

    #[test]
    fn roundtrip_normalization_is_idempotent() {
        for source in [
            "items[*].id any=5",
            "a.b = 1 AND c != 2 OR d LIKE 'x%'",
            "{ a: 1, n: UPPER(name) }",
            "1 + 1 / 3",
            "(1 + 1) / 3",
            "x BETWEEN 1 AND 2",
            "$.[\"my key\"] = 'v'",
        ] {
            let once = Expression::parse(source).unwrap();
            let twice = Expression::parse(once.source()).unwrap();
            assert_eq!(once.source(), twice.source(), "input: {source}");
        }
    }

    #[test]
    fn normalize_lowers_map_sugar() {
        let expr = Expression::parse("items[*].id any=5").unwrap();
        assert_eq!(expr.source(), "MAP($.items[*]=>@.id) ANY=5");
    }

    #[test]
    fn fields_scenarios() {
        let expr = Expression::parse("$.Items[*].Type").unwrap();
        assert_eq!(expr.fields(), ["Items"]);
        let expr = Expression::parse("Items[$.Root = 1].Type all = Age").unwrap();
        assert_eq!(expr.fields(), ["Items", "Root", "Age"]);
        let expr = Expression::parse("{Active: active, NewActive: ACTIVE}").unwrap();
        assert_eq!(expr.fields(), ["active"]);
    }

    #[test]
    fn immutability_scenarios() {
        assert!(!Expression::parse("_id + DAY(NOW())").unwrap().is_immutable());
        assert!(Expression::parse("{ a: 1, n: UPPER(name) }")
            .unwrap()
            .is_immutable());
        assert!(!Expression::parse("@0 = 1").unwrap().is_immutable());
    }

    #[test]
    fn kind_scenarios() {
        assert_eq!(Expression::parse("(1 + 1) / 3").unwrap().kind(), ExprKind::Divide);
        assert_eq!(Expression::parse("1 + 1 / 3").unwrap().kind(), ExprKind::Add);
    }

    #[test]
    fn quantifier_flags() {
        let expr = Expression::parse("items[*] any = 5").unwrap();
        assert!(expr.is_any());
        assert!(!expr.is_all());
        let expr = Expression::parse("items[*] all = 5").unwrap();
        assert!(expr.is_all());
        // Sequence left side defaults to ANY without a keyword.
        let expr = Expression::parse("items[*] = 5").unwrap();
        assert!(expr.is_any());
        let expr = Expression::parse("a = 5").unwrap();
        assert!(!expr.is_any());
    }

    #[test]
    fn uses_source_flag() {
        assert!(Expression::parse("COUNT(*._id)").unwrap().uses_source());
        assert!(Expression::parse("*").unwrap().uses_source());
        assert!(!Expression::parse("$._id").unwrap().uses_source());
    }

    #[test]
    fn index_expressions_reject_unstable_constructs() {
        assert!(Expression::parse_for_index("$.name").is_ok());
        assert!(Expression::parse_for_index("$.items[*].price").is_ok());
        assert!(Expression::parse_for_index("$.items[@.x = 1].id").is_ok());
        assert!(Expression::parse_for_index("LOWER($.name)").is_ok());
        assert!(Expression::parse_for_index("@0").is_err());
        assert!(Expression::parse_for_index("*._id").is_err());
        assert!(Expression::parse_for_index("$.a + 1").is_err());
        assert!(Expression::parse_for_index("GUID()").is_err());
        let err = Expression::parse_for_index("NOW()").unwrap_err();
        assert_eq!(err.code(), "InvalidExpressionType");
    }

    #[test]
    fn execute_scalar_defaults() {
        let expr = Expression::parse("[1,2]").unwrap();
        let value = expr.execute_scalar(None, None).unwrap();
        assert_eq!(value, Value::Array(vec![Value::Int32(1), Value::Int32(2)]));
    }

    #[test]
    fn parameters_resolve_by_index_and_name() {
        let mut params = Document::new();
        params.insert("limit", Value::Int32(7)).unwrap();
        let expr = Expression::parse_with("@0 + 1", params.clone()).unwrap();
        assert_eq!(expr.execute_scalar(None, None).unwrap(), Value::Int32(8));
        let expr = Expression::parse_with("@limit + 1", params).unwrap();
        assert_eq!(expr.execute_scalar(None, None).unwrap(), Value::Int32(8));
    }

    #[test]
    fn prebuilt_singletons_share_metadata() {
        assert_eq!(Expression::root().source(), "$");
        assert_eq!(Expression::id_path().source(), "$._id");
        assert!(Expression::count_documents().uses_source());
        assert!(Expression::any_document().uses_source());
    }
}
