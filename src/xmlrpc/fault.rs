// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use thiserror::Error;

use crate::xmlrpc::value::{Struct, Value};

pub const DEFAULT_FAULT_CODE: i32 = 0;
pub const DEFAULT_FAULT_MESSAGE: &str = "Unknown XML-RPC fault";

/// An application-level failure reported by the server.
///
/// This is a normal outcome of a call, not a transport or parse error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("XML-RPC fault {code}: {message}")]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    pub fn new<S: Into<String>>(code: i32, message: S) -> Fault {
        Fault {
            code,
            message: message.into(),
        }
    }

    /// Reads `faultCode` and `faultString` from a fault struct. A member that
    /// is missing or has the wrong type falls back to its default.
    pub fn from_struct(members: &Struct) -> Fault {
        let code = members
            .get("faultCode")
            .and_then(Value::as_i32)
            .unwrap_or(DEFAULT_FAULT_CODE);
        let message = members
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_FAULT_MESSAGE);
        Fault::new(code, message)
    }

    /// The `{faultCode, faultString}` struct sent on the wire.
    pub fn to_value(&self) -> Value {
        let mut members = Struct::new();
        members.insert("faultCode".to_string(), Value::Int(self.code));
        members.insert("faultString".to_string(), Value::String(self.message.clone()));
        Value::Struct(members)
    }
}

impl Default for Fault {
    fn default() -> Fault {
        Fault::new(DEFAULT_FAULT_CODE, DEFAULT_FAULT_MESSAGE)
    }
}
