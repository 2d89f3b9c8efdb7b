//! Registry of built-in expression functions.
//!
//! Functions are resolved at compile time by uppercased name; arity is
//! validated by the parser so evaluation never sees a wrong-shaped
//! call. Volatile functions read ambient state (clock, RNG) and make
//! the enclosing expression non-immutable.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};
use uuid::Uuid;

use crate::document::{ObjectId, Value};
use crate::error::Result;
use crate::expression::eval::{evaluate, first_or_null, EvalContext};
use crate::expression::node::Node;

/// How a function interacts with ambient state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Volatility {
    /// Value depends only on the arguments.
    Pure,
    /// Reads ambient state on every call.
    Volatile,
    /// Reads ambient state only when called with no arguments
    /// (`GUID()` makes a fresh value, `GUID("...")` parses one).
    VolatileWhenEmpty,
}

type FnImpl = fn(&[Arc<Node>], &EvalContext<'_>) -> Result<Vec<Value>>;

/// Registry entry for a built-in function.
pub struct FunctionDef {
    /// Uppercase canonical name.
    pub name: &'static str,
    /// Minimum argument count.
    pub min_args: usize,
    /// Maximum argument count.
    pub max_args: usize,
    /// True when the function yields a sequence rather than a scalar.
    pub sequence: bool,
    volatility: Volatility,
    call: FnImpl,
}

impl FunctionDef {
    /// True when a call with `argc` arguments is deterministic.
    pub fn is_immutable(&self, argc: usize) -> bool {
        match self.volatility {
            Volatility::Pure => true,
            Volatility::Volatile => false,
            Volatility::VolatileWhenEmpty => argc > 0,
        }
    }

    /// True when the arity is within bounds.
    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.min_args && argc <= self.max_args
    }

    /// Runs the function against already-compiled argument nodes.
    pub fn invoke(&self, args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
        (self.call)(args, ctx)
    }
}

impl std::fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Looks up a function by name, case-insensitively.
pub fn lookup(name: &str) -> Option<&'static FunctionDef> {
    REGISTRY
        .iter()
        .find(|def| def.name.eq_ignore_ascii_case(name))
}

macro_rules! def {
    ($name:literal, $min:expr, $max:expr, $seq:expr, $vol:expr, $call:expr) => {
        FunctionDef {
            name: $name,
            min_args: $min,
            max_args: $max,
            sequence: $seq,
            volatility: $vol,
            call: $call,
        }
    };
}

static REGISTRY: &[FunctionDef] = &[
    // aggregates
    def!("COUNT", 1, 1, false, Volatility::Pure, fn_count),
    def!("MIN", 1, 1, false, Volatility::Pure, fn_min),
    def!("MAX", 1, 1, false, Volatility::Pure, fn_max),
    def!("FIRST", 1, 1, false, Volatility::Pure, fn_first),
    def!("LAST", 1, 1, false, Volatility::Pure, fn_last),
    def!("AVG", 1, 1, false, Volatility::Pure, fn_avg),
    def!("SUM", 1, 1, false, Volatility::Pure, fn_sum),
    def!("ANY", 1, 1, false, Volatility::Pure, fn_any),
    // sequences
    def!("ITEMS", 1, 1, true, Volatility::Pure, fn_items),
    def!("ARRAY", 1, 1, false, Volatility::Pure, fn_array),
    def!("KEYS", 1, 1, true, Volatility::Pure, fn_keys),
    def!("VALUES", 1, 1, true, Volatility::Pure, fn_values),
    // strings
    def!("UPPER", 1, 1, false, Volatility::Pure, fn_upper),
    def!("LOWER", 1, 1, false, Volatility::Pure, fn_lower),
    def!("TRIM", 1, 1, false, Volatility::Pure, fn_trim),
    def!("LTRIM", 1, 1, false, Volatility::Pure, fn_ltrim),
    def!("RTRIM", 1, 1, false, Volatility::Pure, fn_rtrim),
    def!("LENGTH", 1, 1, false, Volatility::Pure, fn_length),
    def!("SUBSTRING", 2, 3, false, Volatility::Pure, fn_substring),
    def!("REPLACE", 3, 3, false, Volatility::Pure, fn_replace),
    def!("INDEXOF", 2, 3, false, Volatility::Pure, fn_indexof),
    def!("SPLIT", 2, 2, true, Volatility::Pure, fn_split),
    def!("JOIN", 1, 2, false, Volatility::Pure, fn_join),
    // conversions
    def!("STRING", 1, 1, false, Volatility::Pure, fn_string),
    def!("INT32", 1, 1, false, Volatility::Pure, fn_int32),
    def!("INT64", 1, 1, false, Volatility::Pure, fn_int64),
    def!("DOUBLE", 1, 1, false, Volatility::Pure, fn_double),
    def!("DECIMAL", 1, 1, false, Volatility::Pure, fn_decimal),
    // dates
    def!("NOW", 0, 0, false, Volatility::Volatile, fn_now),
    def!("TODAY", 0, 0, false, Volatility::Volatile, fn_today),
    def!("DATETIME", 0, 6, false, Volatility::VolatileWhenEmpty, fn_datetime),
    def!("YEAR", 1, 1, false, Volatility::Pure, fn_year),
    def!("MONTH", 1, 1, false, Volatility::Pure, fn_month),
    def!("DAY", 1, 1, false, Volatility::Pure, fn_day),
    def!("HOUR", 1, 1, false, Volatility::Pure, fn_hour),
    def!("MINUTE", 1, 1, false, Volatility::Pure, fn_minute),
    def!("SECOND", 1, 1, false, Volatility::Pure, fn_second),
    def!("DATEADD", 3, 3, false, Volatility::Pure, fn_dateadd),
    def!("DATEDIFF", 3, 3, false, Volatility::Pure, fn_datediff),
    // misc
    def!("GUID", 0, 1, false, Volatility::VolatileWhenEmpty, fn_guid),
    def!("OBJECTID", 0, 1, false, Volatility::VolatileWhenEmpty, fn_objectid),
    def!("IIF", 3, 3, false, Volatility::Pure, fn_iif),
    def!("COALESCE", 2, 2, false, Volatility::Pure, fn_coalesce),
    def!("EXTEND", 2, 2, false, Volatility::Pure, fn_extend),
];

fn seq(arg: &Arc<Node>, ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    evaluate(arg, ctx)
}

fn scalar(arg: &Arc<Node>, ctx: &EvalContext<'_>) -> Result<Value> {
    Ok(first_or_null(evaluate(arg, ctx)?))
}

fn one(value: Value) -> Result<Vec<Value>> {
    Ok(vec![value])
}

// ---- aggregates ------------------------------------------------------

fn fn_count(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let items = seq(&args[0], ctx)?;
    one(Value::Int32(items.len() as i32))
}

fn fn_min(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let items = seq(&args[0], ctx)?;
    let min = items.into_iter().reduce(|a, b| {
        if b.compare(&a, ctx.collation).is_lt() {
            b
        } else {
            a
        }
    });
    one(min.unwrap_or(Value::Null))
}

fn fn_max(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let items = seq(&args[0], ctx)?;
    let max = items.into_iter().reduce(|a, b| {
        if b.compare(&a, ctx.collation).is_gt() {
            b
        } else {
            a
        }
    });
    one(max.unwrap_or(Value::Null))
}

fn fn_first(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let mut items = seq(&args[0], ctx)?;
    one(if items.is_empty() {
        Value::Null
    } else {
        items.remove(0)
    })
}

fn fn_last(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let items = seq(&args[0], ctx)?;
    one(items.into_iter().last().unwrap_or(Value::Null))
}

fn fn_sum(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let items = seq(&args[0], ctx)?;
    let mut total = Value::Int32(0);
    for item in items.iter().filter(|v| v.is_number()) {
        total = crate::expression::eval::numeric_add(&total, item);
    }
    one(total)
}

fn fn_avg(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let items = seq(&args[0], ctx)?;
    let numbers: Vec<&Value> = items.iter().filter(|v| v.is_number()).collect();
    if numbers.is_empty() {
        return one(Value::Null);
    }
    let mut total = Value::Int32(0);
    for item in &numbers {
        total = crate::expression::eval::numeric_add(&total, item);
    }
    let avg = total.to_double().unwrap_or(0.0) / numbers.len() as f64;
    one(Value::Double(avg))
}

fn fn_any(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let items = seq(&args[0], ctx)?;
    one(Value::Boolean(!items.is_empty()))
}

// ---- sequences -------------------------------------------------------

fn fn_items(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    for value in seq(&args[0], ctx)? {
        match value {
            Value::Array(elements) => out.extend(elements),
            Value::Null => {}
            other => out.push(other),
        }
    }
    Ok(out)
}

fn fn_array(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    one(Value::Array(seq(&args[0], ctx)?))
}

fn fn_keys(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    match scalar(&args[0], ctx)? {
        Value::Document(doc) => Ok(doc.keys().map(|k| Value::String(k.to_owned())).collect()),
        _ => Ok(Vec::new()),
    }
}

fn fn_values(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    match scalar(&args[0], ctx)? {
        Value::Document(doc) => Ok(doc.values().cloned().collect()),
        _ => Ok(Vec::new()),
    }
}

// ---- strings ---------------------------------------------------------

fn str_map(args: &[Arc<Node>], ctx: &EvalContext<'_>, f: impl Fn(&str) -> String) -> Result<Vec<Value>> {
    one(match scalar(&args[0], ctx)? {
        Value::String(s) => Value::String(f(&s)),
        _ => Value::Null,
    })
}

fn fn_upper(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    str_map(args, ctx, |s| s.to_uppercase())
}

fn fn_lower(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    str_map(args, ctx, |s| s.to_lowercase())
}

fn fn_trim(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    str_map(args, ctx, |s| s.trim().to_owned())
}

fn fn_ltrim(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    str_map(args, ctx, |s| s.trim_start().to_owned())
}

fn fn_rtrim(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    str_map(args, ctx, |s| s.trim_end().to_owned())
}

fn fn_length(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    one(match scalar(&args[0], ctx)? {
        Value::String(s) => Value::Int32(s.chars().count() as i32),
        Value::Binary(b) => Value::Int32(b.len() as i32),
        Value::Array(a) => Value::Int32(a.len() as i32),
        Value::Document(d) => Value::Int32(d.len() as i32),
        Value::Null => Value::Int32(0),
        _ => Value::Null,
    })
}

fn fn_substring(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let text = scalar(&args[0], ctx)?;
    let offset = scalar(&args[1], ctx)?;
    let (Some(text), Some(offset)) = (text.as_str(), offset.to_int64()) else {
        return one(Value::Null);
    };
    let chars: Vec<char> = text.chars().collect();
    let start = offset.max(0).min(chars.len() as i64) as usize;
    let end = match args.get(2) {
        Some(len_arg) => match scalar(len_arg, ctx)?.to_int64() {
            Some(len) => (start as i64 + len.max(0)).min(chars.len() as i64) as usize,
            None => return one(Value::Null),
        },
        None => chars.len(),
    };
    one(Value::String(chars[start..end].iter().collect()))
}

fn fn_replace(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let text = scalar(&args[0], ctx)?;
    let find = scalar(&args[1], ctx)?;
    let with = scalar(&args[2], ctx)?;
    one(match (text.as_str(), find.as_str(), with.as_str()) {
        (Some(t), Some(f), Some(w)) if !f.is_empty() => Value::String(t.replace(f, w)),
        (Some(t), Some(_), Some(_)) => Value::String(t.to_owned()),
        _ => Value::Null,
    })
}

fn fn_indexof(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let text = scalar(&args[0], ctx)?;
    let needle = scalar(&args[1], ctx)?;
    let (Some(text), Some(needle)) = (text.as_str(), needle.as_str()) else {
        return one(Value::Null);
    };
    let start = match args.get(2) {
        Some(arg) => match scalar(arg, ctx)?.to_int64() {
            Some(s) => s.max(0) as usize,
            None => return one(Value::Null),
        },
        None => 0,
    };
    let haystack: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = needle.chars().collect();
    if pattern.is_empty() {
        return one(Value::Int32(start.min(haystack.len()) as i32));
    }
    let mut idx = start;
    while idx + pattern.len() <= haystack.len() {
        if haystack[idx..idx + pattern.len()]
            .iter()
            .zip(pattern.iter())
            .all(|(&a, &b)| ctx.collation.eq_char(a, b))
        {
            return one(Value::Int32(idx as i32));
        }
        idx += 1;
    }
    one(Value::Int32(-1))
}

fn fn_split(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let text = scalar(&args[0], ctx)?;
    let sep = scalar(&args[1], ctx)?;
    match (text.as_str(), sep.as_str()) {
        (Some(t), Some(s)) if !s.is_empty() => {
            Ok(t.split(s).map(|part| Value::String(part.to_owned())).collect())
        }
        (Some(t), Some(_)) => Ok(vec![Value::String(t.to_owned())]),
        _ => Ok(Vec::new()),
    }
}

fn fn_join(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let items = seq(&args[0], ctx)?;
    let sep = match args.get(1) {
        Some(arg) => match scalar(arg, ctx)? {
            Value::String(s) => s,
            _ => return one(Value::Null),
        },
        None => String::new(),
    };
    let parts: Vec<String> = items.iter().map(value_to_text).collect();
    one(Value::String(parts.join(&sep)))
}

// ---- conversions -----------------------------------------------------

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn fn_string(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    one(Value::String(value_to_text(&scalar(&args[0], ctx)?)))
}

fn fn_int32(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    one(scalar(&args[0], ctx)?
        .to_int32()
        .map(Value::Int32)
        .unwrap_or(Value::Null))
}

fn fn_int64(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    one(scalar(&args[0], ctx)?
        .to_int64()
        .map(Value::Int64)
        .unwrap_or(Value::Null))
}

fn fn_double(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    one(scalar(&args[0], ctx)?
        .to_double()
        .map(Value::Double)
        .unwrap_or(Value::Null))
}

fn fn_decimal(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    one(scalar(&args[0], ctx)?
        .to_decimal()
        .map(Value::Decimal)
        .unwrap_or(Value::Null))
}

// ---- dates -----------------------------------------------------------

fn as_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        _ => None,
    }
}

fn fn_now(_args: &[Arc<Node>], _ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    one(Value::DateTime(Utc::now()))
}

fn fn_today(_args: &[Arc<Node>], _ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let today = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    one(Value::DateTime(today))
}

fn fn_datetime(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    if args.is_empty() {
        return one(Value::DateTime(Utc::now()));
    }
    // Year is required; month and day default to 1, the time to zero.
    let mut parts = [0i64, 1, 1, 0, 0, 0];
    for (slot, arg) in parts.iter_mut().zip(args.iter()) {
        match scalar(arg, ctx)?.to_int64() {
            Some(v) => *slot = v,
            None => return one(Value::Null),
        }
    }
    let built = Utc
        .with_ymd_and_hms(
            parts[0] as i32,
            parts[1] as u32,
            parts[2] as u32,
            parts[3] as u32,
            parts[4] as u32,
            parts[5] as u32,
        )
        .single();
    one(built.map(Value::DateTime).unwrap_or(Value::Null))
}

fn date_part(
    args: &[Arc<Node>],
    ctx: &EvalContext<'_>,
    f: impl Fn(DateTime<Utc>) -> i32,
) -> Result<Vec<Value>> {
    one(match as_datetime(&scalar(&args[0], ctx)?) {
        Some(dt) => Value::Int32(f(dt)),
        None => Value::Null,
    })
}

fn fn_year(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    date_part(args, ctx, |dt| dt.year())
}

fn fn_month(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    date_part(args, ctx, |dt| dt.month() as i32)
}

fn fn_day(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    date_part(args, ctx, |dt| dt.day() as i32)
}

fn fn_hour(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    date_part(args, ctx, |dt| dt.hour() as i32)
}

fn fn_minute(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    date_part(args, ctx, |dt| dt.minute() as i32)
}

fn fn_second(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    date_part(args, ctx, |dt| dt.second() as i32)
}

fn fn_dateadd(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let part = scalar(&args[0], ctx)?;
    let amount = scalar(&args[1], ctx)?;
    let date = scalar(&args[2], ctx)?;
    let (Some(part), Some(amount), Some(dt)) =
        (part.as_str(), amount.to_int64(), as_datetime(&date))
    else {
        return one(Value::Null);
    };
    let added = match part {
        "y" => add_months(dt, amount.saturating_mul(12)),
        "M" => add_months(dt, amount),
        "d" => dt.checked_add_signed(Duration::days(amount)),
        "h" => dt.checked_add_signed(Duration::hours(amount)),
        "m" => dt.checked_add_signed(Duration::minutes(amount)),
        "s" => dt.checked_add_signed(Duration::seconds(amount)),
        _ => None,
    };
    one(added.map(Value::DateTime).unwrap_or(Value::Null))
}

fn add_months(dt: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(months.unsigned_abs().min(u32::MAX as u64) as u32);
    if months >= 0 {
        dt.checked_add_months(magnitude)
    } else {
        dt.checked_sub_months(magnitude)
    }
}

fn fn_datediff(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let part = scalar(&args[0], ctx)?;
    let start = scalar(&args[1], ctx)?;
    let end = scalar(&args[2], ctx)?;
    let (Some(part), Some(start), Some(end)) =
        (part.as_str(), as_datetime(&start), as_datetime(&end))
    else {
        return one(Value::Null);
    };
    let span = end.signed_duration_since(start);
    let diff = match part {
        "y" => i64::from(end.year() - start.year()),
        "M" => i64::from(end.year() - start.year()) * 12
            + i64::from(end.month() as i32 - start.month() as i32),
        "d" => span.num_days(),
        "h" => span.num_hours(),
        "m" => span.num_minutes(),
        "s" => span.num_seconds(),
        _ => return one(Value::Null),
    };
    one(Value::Int64(diff))
}

// ---- misc ------------------------------------------------------------

fn fn_guid(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    if args.is_empty() {
        return one(Value::Guid(Uuid::new_v4()));
    }
    one(match scalar(&args[0], ctx)? {
        Value::String(s) => Uuid::parse_str(&s).map(Value::Guid).unwrap_or(Value::Null),
        Value::Guid(g) => Value::Guid(g),
        _ => Value::Null,
    })
}

fn fn_objectid(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    if args.is_empty() {
        return one(Value::ObjectId(ObjectId::new()));
    }
    one(match scalar(&args[0], ctx)? {
        Value::String(s) => s
            .parse::<ObjectId>()
            .map(Value::ObjectId)
            .unwrap_or(Value::Null),
        Value::ObjectId(id) => Value::ObjectId(id),
        _ => Value::Null,
    })
}

fn fn_iif(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let condition = scalar(&args[0], ctx)?;
    if condition.is_truthy() {
        one(scalar(&args[1], ctx)?)
    } else {
        one(scalar(&args[2], ctx)?)
    }
}

fn fn_coalesce(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let first = scalar(&args[0], ctx)?;
    if first.is_null() {
        one(scalar(&args[1], ctx)?)
    } else {
        one(first)
    }
}

fn fn_extend(args: &[Arc<Node>], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let base = scalar(&args[0], ctx)?;
    let overlay = scalar(&args[1], ctx)?;
    match (base, overlay) {
        (Value::Document(mut base), Value::Document(overlay)) => {
            base.extend_from(&overlay)?;
            one(Value::Document(base))
        }
        _ => one(Value::Null),
    }
}
