// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Extension types carried under their own wire tag.
//!
//! Encoding side: anything implementing [`CustomType`] can be turned into a
//! [`Value::Custom`] and is written as `<value><tag>raw</tag></value>`.
//!
//! Decoding side: a [`CustomTypeRegistry`] maps a tag name to the function
//! that rebuilds the value from the element's text. A tag the registry does
//! not know is a protocol error when it shows up on the wire.
//!
//! Custom elements are text-only: the reconstruct function sees the
//! concatenated character data, and a child element inside a custom tag is
//! rejected as an unexpected element.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::xmlrpc::value::{Value, RESERVED_TAGS};

/// Tag of the common `<nil/>` extension.
pub const NIL_TAG: &str = "nil";

/// A value outside the base XML-RPC types, tagged with its own element name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CustomValue {
    tag: String,
    raw: String,
}

impl CustomValue {
    pub fn new<T: Into<String>, R: Into<String>>(tag: T, raw: R) -> CustomValue {
        CustomValue {
            tag: tag.into(),
            raw: raw.into(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Text content of the element, unescaped.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Opt-in contract for native types that want their own wire tag.
pub trait CustomType {
    /// Element name written inside `<value>`.
    fn tag_name(&self) -> &str;

    /// Text content of the element. Escaped by the encoder.
    fn raw(&self) -> String;

    fn to_value(&self) -> Value {
        Value::custom(self)
    }
}

/// The `<nil/>` marker used by many servers for "no value".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Nil;

impl CustomType for Nil {
    fn tag_name(&self) -> &str {
        NIL_TAG
    }

    fn raw(&self) -> String {
        String::new()
    }
}

/// Rebuilds a custom value from the text found inside its element (custom
/// elements carry no child elements). The error string ends up in the
/// resulting protocol error.
pub type Reconstruct =
    Arc<dyn Fn(&str) -> std::result::Result<CustomValue, String> + Send + Sync>;

/// Registered custom tags, consulted by the deserializer.
#[derive(Clone, Default)]
pub struct CustomTypeRegistry {
    entries: HashMap<String, Reconstruct>,
}

impl CustomTypeRegistry {
    pub fn new() -> CustomTypeRegistry {
        CustomTypeRegistry::default()
    }

    /// Registers `reconstruct` for `tag`.
    ///
    /// Fails with a configuration error when the tag is already taken, is one
    /// of the protocol's own element names, or is not a plain XML name.
    pub fn register<F>(&mut self, tag: &str, reconstruct: F) -> Result<()>
    where
        F: Fn(&str) -> std::result::Result<CustomValue, String> + Send + Sync + 'static,
    {
        validate_tag(tag).map_err(Error::Configuration)?;
        if self.entries.contains_key(tag) {
            return Err(Error::Configuration(format!(
                "custom type <{}> is already registered",
                tag
            )));
        }
        self.entries.insert(tag.to_string(), Arc::new(reconstruct));
        Ok(())
    }

    /// Registers the `<nil/>` extension. Its element must be empty.
    pub fn register_nil(&mut self) -> Result<()> {
        self.register(NIL_TAG, |raw| {
            if raw.trim().is_empty() {
                Ok(CustomValue::new(NIL_TAG, ""))
            } else {
                Err(format!("unexpected content {:?}", raw))
            }
        })
    }

    pub fn get(&self, tag: &str) -> Option<&Reconstruct> {
        self.entries.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CustomTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut tags: Vec<&String> = self.entries.keys().collect();
        tags.sort();
        f.debug_struct("CustomTypeRegistry").field("tags", &tags).finish()
    }
}

/// Checks that `tag` can stand as an element name of its own.
pub fn validate_tag(tag: &str) -> std::result::Result<(), String> {
    if RESERVED_TAGS.contains(&tag) {
        return Err(format!("<{}> is reserved by the protocol", tag));
    }
    let mut chars = tag.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => chars
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!("{:?} is not a valid element name", tag))
    }
}
