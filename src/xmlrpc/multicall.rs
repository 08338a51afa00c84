// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Packing several calls into one `system.multicall` exchange.

use std::mem;

use crate::xmlrpc::decoding::ProtocolError;
use crate::xmlrpc::fault::Fault;
use crate::xmlrpc::protocol::{Request, Response, MULTICALL_METHOD};
use crate::xmlrpc::value::Value;

/// One `system.multicall` request whose only parameter is the array of
/// `{methodName, params}` structs, in order.
pub fn multicall_request(calls: &[Request]) -> Request {
    let batch: Vec<Value> = calls.iter().map(Request::to_value).collect();
    Request::new(MULTICALL_METHOD).argument(batch)
}

/// Splits a multicall result into one response per call.
///
/// The result must be an array with exactly `expected` entries. A one-element
/// array is a success, a struct is a fault; any other entry becomes a default
/// fault for that position only.
pub fn unpack_multicall(mut result: Value, expected: usize) -> Result<Vec<Response>, ProtocolError> {
    let entries = match result {
        Value::Array(ref mut entries) => mem::take(entries),
        ref other => {
            return Err(ProtocolError::MalformedMulticall(format!(
                "expected an array, got <{}>",
                other.tag()
            )))
        }
    };
    if entries.len() != expected {
        return Err(ProtocolError::MalformedMulticall(format!(
            "{} results for {} calls",
            entries.len(),
            expected
        )));
    }

    let responses = entries
        .into_iter()
        .enumerate()
        .map(|(index, mut entry)| match entry {
            Value::Array(ref mut values) if values.len() == 1 => Ok(values.remove(0)),
            Value::Struct(ref members) => Err(Fault::from_struct(members)),
            ref other => {
                warn!("multicall entry {} is neither a result nor a fault: {}", index, other);
                Err(Fault::default())
            }
        })
        .collect();
    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmlrpc::value::Struct;

    fn fault_value(code: i32, message: &str) -> Value {
        Fault::new(code, message).to_value()
    }

    #[test]
    fn test_request_shape() {
        let calls = vec![
            Request::new("add").argument(1).argument(2),
            Request::new("system.listMethods"),
        ];
        let request = multicall_request(&calls);

        assert_eq!(request.method, "system.multicall");
        assert_eq!(request.params.len(), 1);
        let batch = request.params[0].as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].find("methodName"), Some(&Value::from("add")));
        assert_eq!(batch[1].find("params"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn test_middle_call_fails() {
        let result = Value::Array(vec![
            Value::Array(vec![Value::Int(3)]),
            fault_value(4, "too many parameters"),
            Value::Array(vec![Value::from("ok")]),
        ]);

        let responses = unpack_multicall(result, 3).unwrap();
        assert_eq!(
            responses,
            vec![
                Ok(Value::Int(3)),
                Err(Fault::new(4, "too many parameters")),
                Ok(Value::from("ok")),
            ]
        );
    }

    #[test]
    fn test_length_mismatch() {
        let result = Value::Array(vec![Value::Array(vec![Value::Int(1)]), Value::Array(vec![Value::Int(2)])]);
        match unpack_multicall(result, 3) {
            Err(ProtocolError::MalformedMulticall(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_an_array() {
        match unpack_multicall(Value::Struct(Struct::new()), 0) {
            Err(ProtocolError::MalformedMulticall(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_entries_become_default_faults() {
        let result = Value::Array(vec![
            Value::Int(7),
            Value::Array(vec![]),
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
            Value::Array(vec![Value::Array(vec![])]),
        ]);

        let responses = unpack_multicall(result, 4).unwrap();
        assert_eq!(responses[0], Err(Fault::default()));
        assert_eq!(responses[1], Err(Fault::default()));
        assert_eq!(responses[2], Err(Fault::default()));
        assert_eq!(responses[3], Ok(Value::Array(vec![])));
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(unpack_multicall(Value::Array(vec![]), 0).unwrap(), vec![]);
    }
}
