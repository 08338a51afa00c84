// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::mem;

use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::xmlrpc::custom::{CustomType, CustomValue};

/// Represents an XML-RPC data value
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    String(String),
    Int(i32),
    Double(f64),
    Boolean(bool),
    DateTime(OffsetDateTime),
    Base64(Vec<u8>),
    Array(self::Array),
    Struct(self::Struct),
    Custom(CustomValue),
}

pub type Array = Vec<Value>;

/// Struct members keep their insertion order so that encoding is stable.
pub type Struct = IndexMap<String, Value>;

pub const TAG_STRING: &str = "string";
pub const TAG_INT: &str = "int";
pub const TAG_I4: &str = "i4";
pub const TAG_I8: &str = "i8";
pub const TAG_DOUBLE: &str = "double";
pub const TAG_BOOLEAN: &str = "boolean";
pub const TAG_DATETIME: &str = "dateTime.iso8601";
pub const TAG_BASE64: &str = "base64";
pub const TAG_ARRAY: &str = "array";
pub const TAG_STRUCT: &str = "struct";

/// Element names with a fixed meaning in the envelope or type grammar. None
/// of these may be claimed by a custom type.
pub const RESERVED_TAGS: &[&str] = &[
    TAG_STRING, TAG_INT, TAG_I4, TAG_I8, TAG_DOUBLE, TAG_BOOLEAN, TAG_DATETIME,
    TAG_BASE64, TAG_ARRAY, TAG_STRUCT,
    "methodCall", "methodResponse", "methodName", "params", "param", "fault",
    "value", "data", "member", "name",
];

impl Value {
    /// Infers the wire type of a plain number: finite integers inside the
    /// signed 32-bit range become `Int`, everything else (fractions, larger
    /// magnitudes, NaN and the infinities) becomes `Double`.
    pub fn number(n: f64) -> Value {
        if n.is_finite() && n.fract() == 0.0 {
            if let Some(i) = num::cast::<f64, i32>(n) {
                return Value::Int(i);
            }
        }
        Value::Double(n)
    }

    /// Wraps any `CustomType` implementor.
    pub fn custom<T: CustomType + ?Sized>(value: &T) -> Value {
        Value::Custom(CustomValue::new(value.tag_name(), value.raw()))
    }

    /// The wire tag this value is written with.
    pub fn tag(&self) -> &str {
        match *self {
            Value::String(_) => TAG_STRING,
            Value::Int(_) => TAG_INT,
            Value::Double(_) => TAG_DOUBLE,
            Value::Boolean(_) => TAG_BOOLEAN,
            Value::DateTime(_) => TAG_DATETIME,
            Value::Base64(_) => TAG_BASE64,
            Value::Array(_) => TAG_ARRAY,
            Value::Struct(_) => TAG_STRUCT,
            Value::Custom(ref c) => c.tag(),
        }
    }

    /// If the value is a Struct, returns the member named `key`.
    pub fn find(&self, key: &str) -> Option<&Value> {
        match *self {
            Value::Struct(ref map) => map.get(key),
            _ => None,
        }
    }

    /// Follows `keys` through nested structs.
    pub fn find_path(&self, keys: &[&str]) -> Option<&Value> {
        let mut target = self;
        for key in keys {
            target = target.find(key)?;
        }
        Some(target)
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::String(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the number as f64 for both `Int` and `Double`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(n) => Some(f64::from(n)),
            Value::Double(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&OffsetDateTime> {
        match *self {
            Value::DateTime(ref d) => Some(d),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match *self {
            Value::Base64(ref b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match *self {
            Value::Array(ref a) => Some(a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match *self {
            Value::Struct(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_custom(&self) -> Option<&CustomValue> {
        match *self {
            Value::Custom(ref c) => Some(c),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.as_array().is_some()
    }

    pub fn is_struct(&self) -> bool {
        self.as_struct().is_some()
    }
}

// Children are moved onto a heap worklist so that tearing down a deeply
// nested value never recurses.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending: Vec<Value> = match *self {
            Value::Array(ref mut items) if !items.is_empty() => mem::take(items),
            Value::Struct(ref mut members) if !members.is_empty() => {
                members.drain(..).map(|(_, v)| v).collect()
            }
            _ => return,
        };
        while let Some(mut value) = pending.pop() {
            match value {
                Value::Array(ref mut items) => pending.append(items),
                Value::Struct(ref mut members) => pending.extend(members.drain(..).map(|(_, v)| v)),
                _ => {}
            }
        }
    }
}

macro_rules! from_narrow_int {
    ($($t:ty),+) => (
        $(impl From<$t> for Value {
            fn from(v: $t) -> Value { Value::Int(i32::from(v)) }
        })+
    )
}

from_narrow_int! { i8, i16, i32, u8, u16 }

// Wider integers keep the int tag only while they fit in 32 bits.
macro_rules! from_wide_int {
    ($($t:ty),+) => (
        $(impl From<$t> for Value {
            fn from(v: $t) -> Value {
                match num::cast::<$t, i32>(v) {
                    Some(n) => Value::Int(n),
                    None => Value::Double(v as f64),
                }
            }
        })+
    )
}

from_wide_int! { i64, isize, u32, u64, usize }

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::Double(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Boolean(v)
    }
}

impl<'a> From<&'a str> for Value {
    fn from(v: &'a str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(v)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(v: OffsetDateTime) -> Value {
        Value::DateTime(v)
    }
}

impl<'a> From<&'a [u8]> for Value {
    fn from(v: &'a [u8]) -> Value {
        Value::Base64(v.to_vec())
    }
}

impl From<CustomValue> for Value {
    fn from(v: CustomValue) -> Value {
        Value::Custom(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Value {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<IndexMap<String, T>> for Value {
    fn from(v: IndexMap<String, T>) -> Value {
        Value::Struct(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Value {
        Value::Struct(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(v: HashMap<String, T>) -> Value {
        Value::Struct(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl fmt::Display for Value {
    /// Human readable rendering, used by the command line client.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::String(ref s) => write!(f, "{:?}", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{:?}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::DateTime(ref d) => write!(f, "{}", d),
            Value::Base64(ref b) => write!(f, "<{} bytes>", b.len()),
            Value::Array(ref items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Struct(ref members) => {
                f.write_str("{")?;
                for (i, (key, item)) in members.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", key, item)?;
                }
                f.write_str("}")
            }
            Value::Custom(ref c) => write!(f, "<{}>{}", c.tag(), c.raw()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_inference_boundary() {
        assert_eq!(Value::number(2147483647.0), Value::Int(i32::MAX));
        assert_eq!(Value::number(-2147483648.0), Value::Int(i32::MIN));
        assert_eq!(Value::number(2147483648.0), Value::Double(2147483648.0));
        assert_eq!(Value::number(-2147483649.0), Value::Double(-2147483649.0));
        assert_eq!(Value::number(1.5), Value::Double(1.5));
        assert_eq!(Value::number(42.0).tag(), "int");
    }

    #[test]
    fn test_number_inference_non_finite() {
        assert_eq!(Value::number(f64::INFINITY).tag(), "double");
        assert_eq!(Value::number(f64::NEG_INFINITY).tag(), "double");
        assert_eq!(Value::number(f64::NAN).tag(), "double");
    }

    #[test]
    fn test_wide_integers() {
        assert_eq!(Value::from(2147483647i64), Value::Int(2147483647));
        assert_eq!(Value::from(2147483648i64), Value::Double(2147483648.0));
        assert_eq!(Value::from(4000000000u32).tag(), "double");
        assert_eq!(Value::from(7usize), Value::Int(7));
    }

    #[test]
    fn test_find_path() {
        let mut inner = Struct::new();
        inner.insert("leaf".to_string(), Value::from(true));
        let mut outer = Struct::new();
        outer.insert("inner".to_string(), Value::Struct(inner));
        let value = Value::Struct(outer);

        assert_eq!(value.find_path(&["inner", "leaf"]), Some(&Value::Boolean(true)));
        assert_eq!(value.find_path(&["inner", "missing"]), None);
        assert_eq!(Value::Int(1).find("x"), None);
    }

    #[test]
    fn test_display() {
        let value = Value::from(vec![Value::from("a"), Value::Int(2)]);
        assert_eq!(value.to_string(), "[\"a\", 2]");
    }

    #[test]
    fn test_deep_values_drop_without_recursion() {
        let mut value = Value::Int(0);
        for i in 0..200_000 {
            value = if i % 2 == 0 {
                Value::Array(vec![value])
            } else {
                let mut members = Struct::new();
                members.insert("next".to_string(), value);
                Value::Struct(members)
            };
        }
        assert!(value.is_struct());
        drop(value);
    }
}
