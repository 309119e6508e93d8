//! Dynamically-typed field values and their reduction to JSON-safe form.
//!
//! A [`Value`] is what callers attach to a [`LogEntry`](crate::record::LogEntry)
//! as context. Each variant stands for one capability or concrete kind a field
//! can have: an error with a message, a (possibly null) reference, a scalar,
//! text, something that describes itself through [`Display`], a composite
//! (array, slice, map, record), or an opaque value with no JSON form.
//!
//! [`normalize`] turns any `Value` into a [`NormalizedValue`] and never fails.
//! Composites are rendered as verbose text, e.g. `{Username:gopher Age:8}`,
//! `[0 1]` or `map[k1:v1 k2:v2]`.

use serde::ser::{Error as _, Serialize, Serializer};
use std::error::Error as StdError;
use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::sync::Arc;

/// Arbitrary field value attached to a log entry.
#[derive(Clone)]
pub enum Value {
    /// A failure with a describable message.
    Error(Arc<dyn StdError + Send + Sync>),
    /// A reference to another value; `None` is a null reference.
    Ref(Option<Arc<Value>>),
    Bool(bool),
    I64(i64),
    U64(u64),
    I128(i128),
    U128(u128),
    F32(f32),
    F64(f64),
    Str(String),
    /// A value that describes itself as text.
    Display(Arc<dyn Display + Send + Sync>),
    /// Fixed-size sequence.
    Array(Vec<Value>),
    /// Growable sequence.
    Slice(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Record(Record),
    /// An untyped absent value.
    Nil,
    /// A value of the named type that has no JSON representation
    /// (channels, functions and the like).
    Opaque(&'static str),
}

impl Value {
    pub fn error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Value::Error(Arc::new(err))
    }

    pub fn display<D>(value: D) -> Self
    where
        D: Display + Send + Sync + 'static,
    {
        Value::Display(Arc::new(value))
    }

    pub fn reference(value: impl Into<Value>) -> Self {
        Value::Ref(Some(Arc::new(value.into())))
    }

    pub fn null_ref() -> Self {
        Value::Ref(None)
    }

    pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn slice<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Slice(items.into_iter().map(Into::into).collect())
    }

    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Byte buffers are plain sequences of small integers.
    pub fn bytes(bytes: &[u8]) -> Self {
        Value::Slice(bytes.iter().map(|b| Value::U64(u64::from(*b))).collect())
    }

    pub fn opaque(type_name: &'static str) -> Self {
        Value::Opaque(type_name)
    }

    /// Verbose text rendering of this value; see [`Verbose`].
    pub fn verbose(&self) -> Verbose<'_> {
        Verbose(self)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Value::Ref(inner) => f.debug_tuple("Ref").field(inner).finish(),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::I64(n) => f.debug_tuple("I64").field(n).finish(),
            Value::U64(n) => f.debug_tuple("U64").field(n).finish(),
            Value::I128(n) => f.debug_tuple("I128").field(n).finish(),
            Value::U128(n) => f.debug_tuple("U128").field(n).finish(),
            Value::F32(n) => f.debug_tuple("F32").field(n).finish(),
            Value::F64(n) => f.debug_tuple("F64").field(n).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Display(d) => f
                .debug_tuple("Display")
                .field(&format_args!("{}", d))
                .finish(),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Slice(items) => f.debug_tuple("Slice").field(items).finish(),
            Value::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Value::Record(record) => f.debug_tuple("Record").field(record).finish(),
            Value::Nil => f.write_str("Nil"),
            Value::Opaque(name) => f.debug_tuple("Opaque").field(name).finish(),
        }
    }
}

/// Struct-like value: an ordered list of named fields.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::I64(n as i64)
            }
        }
    )*};
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::U64(n as u64)
            }
        }
    )*};
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::I128(n)
    }
}

impl From<u128> for Value {
    fn from(n: u128) -> Self {
        Value::U128(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::F32(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::F64(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// `Option` is the optional-reference kind: `None` is a null reference.
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Value::reference(v),
            None => Value::Ref(None),
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::slice(items)
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::array(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::I64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::U64(u)
                } else {
                    Value::F64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::slice(items),
            serde_json::Value::Object(obj) => Value::map(obj),
        }
    }
}

/// JSON-safe reduction of a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedValue {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    I128(i128),
    U128(u128),
    /// Kept at single precision so it serializes with its shortest
    /// 32-bit representation.
    F32(f32),
    F64(f64),
    Text(String),
    /// Passed through untouched; serializing it fails.
    Unsupported(&'static str),
}

impl From<&str> for NormalizedValue {
    fn from(s: &str) -> Self {
        NormalizedValue::Text(s.to_string())
    }
}

impl From<String> for NormalizedValue {
    fn from(s: String) -> Self {
        NormalizedValue::Text(s)
    }
}

impl Serialize for NormalizedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NormalizedValue::Null => serializer.serialize_unit(),
            NormalizedValue::Bool(b) => serializer.serialize_bool(*b),
            NormalizedValue::I64(n) => serializer.serialize_i64(*n),
            NormalizedValue::U64(n) => serializer.serialize_u64(*n),
            NormalizedValue::I128(n) => serializer.serialize_i128(*n),
            NormalizedValue::U128(n) => serializer.serialize_u128(*n),
            NormalizedValue::F32(n) if n.is_finite() => serializer.serialize_f32(*n),
            NormalizedValue::F32(n) => Err(S::Error::custom(format!(
                "json: unsupported value: {}",
                non_finite_name(f64::from(*n))
            ))),
            NormalizedValue::F64(n) if n.is_finite() => serializer.serialize_f64(*n),
            NormalizedValue::F64(n) => Err(S::Error::custom(format!(
                "json: unsupported value: {}",
                non_finite_name(*n)
            ))),
            NormalizedValue::Text(s) => serializer.serialize_str(s),
            NormalizedValue::Unsupported(name) => {
                Err(S::Error::custom(format!("json: unsupported type: {}", name)))
            }
        }
    }
}

fn non_finite_name(n: f64) -> &'static str {
    if n.is_nan() {
        "NaN"
    } else if n.is_sign_positive() {
        "+Inf"
    } else {
        "-Inf"
    }
}

/// Reduce an arbitrary field value to a JSON-safe form.
///
/// Checks run in a fixed order and the first match wins: error message,
/// reference (followed until a non-reference, null becomes `null`), scalar,
/// text, [`Display`], composite rendered as verbose text, and finally the
/// untouched fallback for anything else.
pub fn normalize(value: &Value) -> NormalizedValue {
    match value {
        Value::Error(err) => NormalizedValue::Text(err.to_string()),
        Value::Ref(Some(inner)) => normalize(inner),
        Value::Ref(None) => NormalizedValue::Null,
        Value::Bool(b) => NormalizedValue::Bool(*b),
        Value::I64(n) => NormalizedValue::I64(*n),
        Value::U64(n) => NormalizedValue::U64(*n),
        Value::I128(n) => NormalizedValue::I128(*n),
        Value::U128(n) => NormalizedValue::U128(*n),
        Value::F32(n) => NormalizedValue::F32(*n),
        Value::F64(n) => NormalizedValue::F64(*n),
        Value::Str(s) => NormalizedValue::Text(s.clone()),
        Value::Display(d) => NormalizedValue::Text(d.to_string()),
        Value::Array(_) | Value::Slice(_) | Value::Map(_) | Value::Record(_) => {
            NormalizedValue::Text(value.verbose().to_string())
        }
        Value::Nil => NormalizedValue::Null,
        Value::Opaque(name) => NormalizedValue::Unsupported(*name),
    }
}

/// Verbose text rendering: records as `{A:1 B:x}`, sequences as `[1 2]`,
/// maps as `map[a:1 b:2]` with entries sorted by key (numbers by value,
/// everything else by rendered text).
pub struct Verbose<'a>(&'a Value);

impl Display for Verbose<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Error(err) => write!(f, "{}", err),
            Value::Ref(Some(inner)) => write!(f, "&{}", inner.verbose()),
            Value::Ref(None) | Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I64(n) => write!(f, "{}", n),
            Value::U64(n) => write!(f, "{}", n),
            Value::I128(n) => write!(f, "{}", n),
            Value::U128(n) => write!(f, "{}", n),
            Value::F32(n) => write!(f, "{}", n),
            Value::F64(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::Display(d) => write!(f, "{}", d),
            Value::Array(items) | Value::Slice(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item.verbose())?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                let mut rendered: Vec<(&Value, String, String)> = entries
                    .iter()
                    .map(|(k, v)| (k, k.verbose().to_string(), v.verbose().to_string()))
                    .collect();
                rendered.sort_by(|(a, a_text, _), (b, b_text, _)| {
                    compare_keys(a, b).then_with(|| a_text.cmp(b_text))
                });
                f.write_str("map[")?;
                for (i, (_, k, v)) in rendered.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                f.write_str("]")
            }
            Value::Record(record) => {
                f.write_str("{")?;
                for (i, (name, value)) in record.fields().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", name, value.verbose())?;
                }
                f.write_str("}")
            }
            Value::Opaque(name) => write!(f, "<{}>", name),
        }
    }
}

fn integer_key(value: &Value) -> Option<i128> {
    match value {
        Value::I64(n) => Some(i128::from(*n)),
        Value::U64(n) => Some(i128::from(*n)),
        Value::I128(n) => Some(*n),
        Value::U128(n) => i128::try_from(*n).ok(),
        _ => None,
    }
}

fn float_key(value: &Value) -> Option<f64> {
    match value {
        Value::F32(n) => Some(f64::from(*n)),
        Value::F64(n) => Some(*n),
        _ => integer_key(value).map(|n| n as f64),
    }
}

/// Map key order: integers and floats by value, booleans `false` first,
/// anything else left to the rendered-text tie-break.
fn compare_keys(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (integer_key(a), integer_key(b)) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (float_key(a), float_key(b)) {
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[derive(thiserror::Error, Debug)]
    #[error("not found")]
    struct NotFound;

    fn user() -> Record {
        Record::new()
            .field("Username", "gopher")
            .field("Age", 8)
            .field("ID", 1024u64)
    }

    #[rstest]
    #[case::int(Value::from(0), NormalizedValue::I64(0))]
    #[case::uint(Value::from(42u32), NormalizedValue::U64(42))]
    #[case::float(Value::from(3.25), NormalizedValue::F64(3.25))]
    #[case::float32(Value::from(0.1f32), NormalizedValue::F32(0.1))]
    #[case::int128(Value::from(-5i128), NormalizedValue::I128(-5))]
    #[case::uint128(Value::from(u128::MAX), NormalizedValue::U128(u128::MAX))]
    #[case::boolean(Value::from(true), NormalizedValue::Bool(true))]
    #[case::string(Value::from("hello, world"), "hello, world".into())]
    #[case::array(Value::from([0, 1]), "[0 1]".into())]
    #[case::slice(Value::from(vec![0u64, 1]), "[0 1]".into())]
    #[case::map(Value::map([("string", "goher")]), "map[string:goher]".into())]
    #[case::error(Value::error(NotFound), "not found".into())]
    #[case::record(Value::from(user()), "{Username:gopher Age:8 ID:1024}".into())]
    #[case::pointer(Value::reference(user()), "{Username:gopher Age:8 ID:1024}".into())]
    #[case::stringer(Value::display("2024-01-02 03:04:05 +0000 UTC"), "2024-01-02 03:04:05 +0000 UTC".into())]
    #[case::nil_interface(Value::Nil, NormalizedValue::Null)]
    #[case::chan(Value::opaque("chan bool"), NormalizedValue::Unsupported("chan bool"))]
    fn normalizes(#[case] input: Value, #[case] expected: NormalizedValue) {
        assert_eq!(normalize(&input), expected);
    }

    #[test]
    fn error_behind_references_yields_message() {
        let wrapped = Value::reference(Value::reference(Value::error(NotFound)));
        assert_eq!(normalize(&wrapped), "not found".into());
    }

    #[test]
    fn null_reference_becomes_null() {
        assert_eq!(normalize(&Value::null_ref()), NormalizedValue::Null);
        assert_eq!(normalize(&Value::from(None::<i32>)), NormalizedValue::Null);
        assert_eq!(
            normalize(&Value::reference(Value::null_ref())),
            NormalizedValue::Null
        );
    }

    #[test]
    fn composite_rendering_is_stable() {
        let rec = Value::from(Record::new().field("Username", "gopher").field("Age", 8));
        let first = normalize(&rec);
        assert_eq!(first, "{Username:gopher Age:8}".into());
        assert_eq!(normalize(&rec), first);
    }

    #[test]
    fn map_entries_sorted_by_key() {
        let a = Value::map([("b", 2), ("a", 1), ("c", 3)]);
        let b = Value::map([("c", 3), ("a", 1), ("b", 2)]);
        assert_eq!(normalize(&a), "map[a:1 b:2 c:3]".into());
        assert_eq!(normalize(&a), normalize(&b));
    }

    #[test]
    fn nested_composites_render_inner_values() {
        let header = Value::map([("Content-Type", vec!["plain/text"])]);
        assert_eq!(normalize(&header), "map[Content-Type:[plain/text]]".into());

        let rec = Value::from(
            Record::new()
                .field("Err", Value::error(NotFound))
                .field("Next", Value::null_ref())
                .field("Owner", Value::reference(Record::new().field("Name", "x"))),
        );
        assert_eq!(
            normalize(&rec),
            "{Err:not found Next:<nil> Owner:&{Name:x}}".into()
        );
    }

    #[test]
    fn numeric_map_keys_sort_by_value() {
        let m = Value::map([(10, "a"), (9, "b"), (100, "c")]);
        assert_eq!(normalize(&m), "map[9:b 10:a 100:c]".into());

        let f = Value::map([(2.5, "x"), (-1.0, "y"), (10.0, "z")]);
        assert_eq!(normalize(&f), "map[-1:y 2.5:x 10:z]".into());

        let b = Value::map([(true, 1), (false, 0)]);
        assert_eq!(normalize(&b), "map[false:0 true:1]".into());
    }

    #[test]
    fn wide_and_narrow_numbers_keep_their_json_form() {
        let json = |v: Value| serde_json::to_string(&normalize(&v)).unwrap();
        assert_eq!(json(Value::from(0.1f32)), "0.1");
        assert_eq!(json(Value::from(1.5f32)), "1.5");
        assert_eq!(
            json(Value::from(i128::MIN)),
            "-170141183460469231731687303715884105728"
        );
        assert_eq!(
            json(Value::from(u128::MAX)),
            "340282366920938463463374607431768211455"
        );
        assert!(serde_json::to_string(&NormalizedValue::F32(f32::INFINITY)).is_err());
    }

    #[test]
    fn bytes_render_as_numbers() {
        assert_eq!(normalize(&Value::bytes(b"Hi")), "[72 105]".into());
    }

    #[test]
    fn json_values_convert() {
        let v = Value::from(serde_json::json!({"a": [1, true], "b": null}));
        assert_eq!(normalize(&v), "map[a:[1 true] b:<nil>]".into());
        assert_eq!(normalize(&Value::from(serde_json::json!(-5))), NormalizedValue::I64(-5));
        assert_eq!(normalize(&Value::from(serde_json::json!(1.5))), NormalizedValue::F64(1.5));
    }

    #[test]
    fn unsupported_values_fail_to_serialize() {
        let err = serde_json::to_string(&NormalizedValue::Unsupported("func()")).unwrap_err();
        assert!(err.to_string().contains("json: unsupported type: func()"));

        let err = serde_json::to_string(&NormalizedValue::F64(f64::NAN)).unwrap_err();
        assert!(err.to_string().contains("unsupported value: NaN"));

        assert_eq!(serde_json::to_string(&NormalizedValue::Null).unwrap(), "null");
        assert_eq!(serde_json::to_string(&NormalizedValue::F64(3.5)).unwrap(), "3.5");
    }
}
