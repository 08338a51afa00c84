// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::xmlrpc::decoding::Deserializer;
use crate::xmlrpc::encoding::Serializer;
use crate::xmlrpc::multicall::{multicall_request, unpack_multicall};
use crate::xmlrpc::protocol::{Request, Response, MULTICALL_METHOD};
use crate::xmlrpc::transport::{HttpTransport, Transport};
use crate::xmlrpc::value::Value;

/// Standard introspection methods, by short name.
static SYSTEM_METHODS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        "system.listMethods",
        "system.methodHelp",
        "system.methodSignature",
        MULTICALL_METHOD,
    ]
    .iter()
    .map(|&method| (method.rsplit('.').next().unwrap_or(method), method))
    .collect()
});

/// Full wire name for a catalog method given by short or full name.
pub fn catalog_method(name: &str) -> Option<&'static str> {
    SYSTEM_METHODS
        .get(name)
        .copied()
        .or_else(|| SYSTEM_METHODS.values().find(|&&full| full == name).copied())
}

pub struct Client<T = HttpTransport> {
    url: String,
    headers: Vec<(String, String)>,
    serializer: Serializer,
    deserializer: Deserializer,
    transport: T,
}

impl Client<HttpTransport> {
    /// Blocking client over `HttpTransport`; not for use inside a tokio
    /// runtime.
    pub fn new(url: &str) -> Client {
        Client::from_config(ClientConfig::new(url))
    }

    pub fn from_config(config: ClientConfig) -> Client {
        Client::with_transport(config, HttpTransport::new())
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Client<T> {
        let dates = config.date_formatter();
        Client {
            serializer: Serializer::new(config.encoding, dates),
            deserializer: Deserializer::new(dates, config.custom_types),
            url: config.url,
            headers: config.headers,
            transport,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Calls `method` once. A fault from the server is `Ok(Err(fault))`.
    pub fn method_call(&self, method: &str, params: &[Value]) -> Result<Response> {
        let body = self.serializer.serialize_method_call(method, params)?;

        debug!("Send XMLRPC request {:?} to: {}", method, &self.url);
        trace!("XMLRPC body: {}", &body);

        let bytes = match self.transport.send(&self.url, body.as_bytes(), &self.headers) {
            Ok(bytes) => bytes,
            Err(err) if err.is_connectivity() => {
                return Err(Error::Connectivity {
                    method: method.to_string(),
                    url: self.url.clone(),
                    source: err,
                })
            }
            Err(err) => return Err(Error::Transport(err)),
        };
        trace!("Response body: {}", String::from_utf8_lossy(&bytes));

        Ok(self.deserializer.deserialize_method_response_bytes(&bytes)?)
    }

    pub fn call(&self, request: &Request) -> Result<Response> {
        self.method_call(&request.method, &request.params)
    }

    /// Sends every call in one `system.multicall` exchange and returns one
    /// response per call, in order. A fault on one call does not affect the
    /// others; a fault for the whole batch is an error.
    pub fn multi_method_call(&self, calls: &[Request]) -> Result<Vec<Response>> {
        let batch = multicall_request(calls);
        match self.call(&batch)? {
            Ok(result) => Ok(unpack_multicall(result, calls.len())?),
            Err(fault) => Err(Error::Fault(fault)),
        }
    }

    /// Calls a catalog method by short (`listMethods`) or full name.
    pub fn invoke(&self, name: &str, params: &[Value]) -> Result<Response> {
        match catalog_method(name) {
            Some(method) => self.method_call(method, params),
            None => Err(Error::Configuration(format!("{:?} is not a known method", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog() {
        assert_eq!(catalog_method("listMethods"), Some("system.listMethods"));
        assert_eq!(catalog_method("system.methodHelp"), Some("system.methodHelp"));
        assert_eq!(catalog_method("multicall"), Some("system.multicall"));
        assert_eq!(catalog_method("reboot"), None);
    }
}
