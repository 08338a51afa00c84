// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use crate::xmlrpc::encoding::{EncodeError, Serializer};
use crate::xmlrpc::fault::Fault;
use crate::xmlrpc::value::{Struct, Value};

/// Name of the batching method understood by multicall-capable servers.
pub const MULTICALL_METHOD: &str = "system.multicall";

/// A method name and its positional parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: String,
    pub params: Vec<Value>,
}

/// The outcome of one call: the returned value, or the fault the server
/// reported instead.
pub type Response = Result<Value, Fault>;

impl Request {
    pub fn new(method: &str) -> Request {
        Request {
            method: method.to_string(),
            params: Vec::new(),
        }
    }

    pub fn argument<T: Into<Value>>(mut self, object: T) -> Request {
        self.params.push(object.into());
        self
    }

    /// The `{methodName, params}` struct used inside a multicall batch.
    pub fn to_value(&self) -> Value {
        let mut call = Struct::new();
        call.insert("methodName".to_string(), Value::from(self.method.as_str()));
        call.insert("params".to_string(), Value::Array(self.params.clone()));
        Value::Struct(call)
    }

    pub fn to_xml(&self, serializer: &Serializer) -> Result<String, EncodeError> {
        serializer.serialize_method_call(&self.method, &self.params)
    }
}
