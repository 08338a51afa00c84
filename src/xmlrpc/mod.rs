// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

#![forbid(non_camel_case_types)]
#![allow(missing_docs)]

//! XML-RPC library, including both serialization and remote procedure calling
//!
//! # What is XML-RPC?
//!
//! A remote procedure call encoding where a method name and its parameters
//! travel as an XML document over HTTP POST, and the answer is either a
//! single value or a fault.
//!
//! Basic documentation found on Wikipedia
//! http://en.wikipedia.org/wiki/XML-RPC
//!
//! Full specification of the XML-RPC protocol is found here:
//! http://xmlrpc.scripting.com/spec.html
//!
//! Additional errata and hints can be found here:
//! http://effbot.org/zone/xmlrpc-errata.htm
//!
//! Batching follows the `system.multicall` convention, see [`multicall`].

pub use self::client::Client;
pub use self::custom::{CustomType, CustomTypeRegistry, CustomValue, Nil};
pub use self::date::{DateFormatter, DateFormatterOptions};
pub use self::decoding::{Deserializer, ProtocolError};
pub use self::encoding::{encode, serialize_method_call, EncodeError, Serializer};
pub use self::fault::Fault;
pub use self::protocol::{Request, Response};
pub use self::transport::{HttpTransport, Transport, TransportError};
pub use self::value::{Array, Struct, Value};

pub mod client;
pub mod custom;
pub mod date;
pub mod decoding;
pub mod encoding;
pub mod fault;
pub mod multicall;
pub mod protocol;
pub mod transport;
pub mod value;
