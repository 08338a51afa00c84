// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Parsing of call and response envelopes.
//!
//! The envelope is walked by a small state machine (see [`State`]); every
//! `<value>` inside it is handed to a second machine that keeps an explicit
//! stack of open arrays, structs and members instead of recursing, so
//! nesting depth is bounded only by memory.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use xml::reader::{EventReader, ParserConfig, XmlEvent};

use crate::xmlrpc::custom::CustomTypeRegistry;
use crate::xmlrpc::date::DateFormatter;
use crate::xmlrpc::fault::Fault;
use crate::xmlrpc::protocol::{Request, Response};
use crate::xmlrpc::value::*;

/// The wire text does not follow the XML-RPC grammar.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed XML: {0}")]
    Malformed(#[from] xml::reader::Error),
    #[error("unexpected end of document")]
    UnexpectedEof,
    #[error("unexpected <{found}> (expected {expected})")]
    UnexpectedElement { found: String, expected: &'static str },
    #[error("unexpected </{0}>")]
    UnexpectedEnd(String),
    #[error("unexpected text {0:?}")]
    UnexpectedText(String),
    #[error("unknown value type <{0}>")]
    UnknownType(String),
    #[error("invalid <{tag}> content {text:?}")]
    InvalidScalar { tag: &'static str, text: String },
    #[error("invalid dateTime.iso8601 {0:?}")]
    InvalidDateTime(String),
    #[error("invalid <{tag}> content: {reason}")]
    InvalidCustom { tag: String, reason: String },
    #[error("<value> holds more than one typed element")]
    MultipleTypes,
    #[error("<member> without {0}")]
    IncompleteMember(&'static str),
    #[error("<array> without <data>")]
    MissingData,
    #[error("fault value is not a struct")]
    FaultNotStruct,
    #[error("response holds both a fault and params")]
    FaultAndParams,
    #[error("response holds neither a fault nor a value")]
    EmptyResponse,
    #[error("response holds more than one value")]
    MultipleValues,
    #[error("malformed system.multicall response: {0}")]
    MalformedMulticall(String),
}

pub type DecodeResult<T> = Result<T, ProtocolError>;

#[derive(Debug, PartialEq)]
enum Token {
    Start(String),
    End(String),
    Text(String),
    Eof,
}

struct Reader<'a> {
    parser: EventReader<&'a [u8]>,
}

impl<'a> Reader<'a> {
    fn new(src: &'a [u8]) -> Reader<'a> {
        // Text is kept verbatim: whitespace inside <string> is data.
        let config = ParserConfig::new()
            .trim_whitespace(false)
            .whitespace_to_characters(true)
            .cdata_to_characters(true)
            .coalesce_characters(true)
            .ignore_comments(true);
        Reader { parser: EventReader::new_with_config(src, config) }
    }

    fn next(&mut self) -> DecodeResult<Token> {
        loop {
            match self.parser.next()? {
                XmlEvent::EndDocument => return Ok(Token::Eof),
                XmlEvent::StartElement { name, .. } => return Ok(Token::Start(name.local_name)),
                XmlEvent::EndElement { name } => return Ok(Token::End(name.local_name)),
                XmlEvent::Characters(s) | XmlEvent::CData(s) | XmlEvent::Whitespace(s) => {
                    return Ok(Token::Text(s))
                }
                _ => continue,
            }
        }
    }

    /// Next token that is not inter-element whitespace.
    fn next_tag(&mut self) -> DecodeResult<Token> {
        loop {
            match self.next()? {
                Token::Text(ref s) if s.trim().is_empty() => continue,
                Token::Text(s) => return Err(ProtocolError::UnexpectedText(s)),
                token => return Ok(token),
            }
        }
    }

    fn expect_start(&mut self, tag: &'static str) -> DecodeResult<()> {
        match self.next_tag()? {
            Token::Start(ref name) if name == tag => Ok(()),
            token => Err(unexpected(token, tag)),
        }
    }

    /// Collects text up to the end of the current element.
    fn text_until_end(&mut self, tag: &'static str) -> DecodeResult<String> {
        let mut text = String::new();
        loop {
            match self.next()? {
                Token::Text(s) => text.push_str(&s),
                Token::End(_) => return Ok(text),
                token => return Err(unexpected(token, tag)),
            }
        }
    }
}

fn unexpected(token: Token, expected: &'static str) -> ProtocolError {
    match token {
        Token::Start(found) => ProtocolError::UnexpectedElement { found, expected },
        Token::End(name) => ProtocolError::UnexpectedEnd(name),
        Token::Text(text) => ProtocolError::UnexpectedText(text),
        Token::Eof => ProtocolError::UnexpectedEof,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Envelope {
    Call,
    Response,
}

/// Envelope states. `InParam` doubles as the single-value state of a
/// response; `InFaultStruct` reads the one value inside `<fault>`.
#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
    ExpectEnvelope,
    ExpectMethodName,
    InParamsOrFault,
    InParams,
    InParam,
    AfterParam,
    InFaultStruct,
    AfterFault,
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Scalar {
    String,
    Int,
    I8,
    Double,
    Boolean,
    DateTime,
    Base64,
}

impl Scalar {
    fn from_tag(tag: &str) -> Option<Scalar> {
        match tag {
            TAG_STRING => Some(Scalar::String),
            TAG_INT | TAG_I4 => Some(Scalar::Int),
            TAG_I8 => Some(Scalar::I8),
            TAG_DOUBLE => Some(Scalar::Double),
            TAG_BOOLEAN => Some(Scalar::Boolean),
            TAG_DATETIME => Some(Scalar::DateTime),
            TAG_BASE64 => Some(Scalar::Base64),
            _ => None,
        }
    }

    fn tag(&self) -> &'static str {
        match *self {
            Scalar::String => TAG_STRING,
            Scalar::Int => TAG_INT,
            Scalar::I8 => TAG_I8,
            Scalar::Double => TAG_DOUBLE,
            Scalar::Boolean => TAG_BOOLEAN,
            Scalar::DateTime => TAG_DATETIME,
            Scalar::Base64 => TAG_BASE64,
        }
    }
}

/// One open element of the value grammar.
enum Frame {
    Value { text: String, typed: Option<Value> },
    Scalar { kind: Scalar, text: String },
    Custom { tag: String, text: String },
    Array { items: Array, data: DataState },
    Struct { members: Struct },
    Member { name: Option<String>, value: Option<Value> },
    Name { text: String },
}

/// Position relative to the single `<data>` element of an array.
#[derive(Clone, Copy, Debug, PartialEq)]
enum DataState {
    Before,
    Open,
    Closed,
}

/// What a closed frame hands to its parent.
enum Finished {
    Value(Value),
    Name(String),
    Member(String, Value),
}

/// Parses responses (and calls) with a fixed date format and custom tags.
#[derive(Clone, Debug, Default)]
pub struct Deserializer {
    dates: DateFormatter,
    custom: CustomTypeRegistry,
}

impl Deserializer {
    pub fn new(dates: DateFormatter, custom: CustomTypeRegistry) -> Deserializer {
        Deserializer { dates, custom }
    }

    /// Parses a `methodResponse` into its value or its fault.
    pub fn deserialize_method_response(&self, xml: &str) -> DecodeResult<Response> {
        self.deserialize_method_response_bytes(xml.as_bytes())
    }

    /// Like `deserialize_method_response`, for a raw body. The character
    /// encoding is taken from the XML declaration (UTF-8 when absent).
    pub fn deserialize_method_response_bytes(&self, body: &[u8]) -> DecodeResult<Response> {
        let (_, mut params, fault) = self.run(body, Envelope::Response)?;
        if params.len() > 1 {
            return Err(ProtocolError::MultipleValues);
        }
        match (params.pop(), fault) {
            (Some(value), None) => Ok(Ok(value)),
            (None, Some(fault)) => Ok(Err(fault)),
            (Some(_), Some(_)) => Err(ProtocolError::FaultAndParams),
            (None, None) => Err(ProtocolError::EmptyResponse),
        }
    }

    /// Parses a `methodCall` into the method name and its parameters.
    pub fn deserialize_method_call(&self, xml: &str) -> DecodeResult<Request> {
        self.deserialize_method_call_bytes(xml.as_bytes())
    }

    pub fn deserialize_method_call_bytes(&self, body: &[u8]) -> DecodeResult<Request> {
        let (method, params, _) = self.run(body, Envelope::Call)?;
        Ok(Request { method, params })
    }

    fn run(&self, src: &[u8], envelope: Envelope) -> DecodeResult<(String, Vec<Value>, Option<Fault>)> {
        let root = match envelope {
            Envelope::Call => "methodCall",
            Envelope::Response => "methodResponse",
        };
        let mut reader = Reader::new(src);
        let mut state = State::ExpectEnvelope;
        let mut method = String::new();
        let mut params = Vec::new();
        let mut fault = None;
        let mut seen_params = false;

        while state != State::Done {
            state = match state {
                State::ExpectEnvelope => {
                    reader.expect_start(root)?;
                    match envelope {
                        Envelope::Call => State::ExpectMethodName,
                        Envelope::Response => State::InParamsOrFault,
                    }
                }
                State::ExpectMethodName => {
                    reader.expect_start("methodName")?;
                    method = reader.text_until_end("method name")?.trim().to_string();
                    State::InParamsOrFault
                }
                State::InParamsOrFault => match reader.next_tag()? {
                    Token::Start(tag) => {
                        if tag == "params" && !seen_params {
                            if fault.is_some() {
                                return Err(ProtocolError::FaultAndParams);
                            }
                            seen_params = true;
                            State::InParams
                        } else if tag == "fault" && envelope == Envelope::Response && fault.is_none() {
                            if seen_params {
                                return Err(ProtocolError::FaultAndParams);
                            }
                            State::InFaultStruct
                        } else {
                            return Err(ProtocolError::UnexpectedElement {
                                found: tag,
                                expected: "a single <params> or <fault>",
                            });
                        }
                    }
                    Token::End(ref tag) if tag == root => {
                        if envelope == Envelope::Response && !seen_params && fault.is_none() {
                            return Err(ProtocolError::EmptyResponse);
                        }
                        match reader.next_tag()? {
                            Token::Eof => State::Done,
                            token => return Err(unexpected(token, "end of document")),
                        }
                    }
                    token => return Err(unexpected(token, "<params> or <fault>")),
                },
                State::InParams => match reader.next_tag()? {
                    Token::Start(ref tag) if tag == "param" => {
                        if envelope == Envelope::Response && !params.is_empty() {
                            return Err(ProtocolError::MultipleValues);
                        }
                        State::InParam
                    }
                    Token::End(ref tag) if tag == "params" => State::InParamsOrFault,
                    token => return Err(unexpected(token, "<param>")),
                },
                State::InParam => {
                    reader.expect_start("value")?;
                    params.push(self.read_value(&mut reader)?);
                    State::AfterParam
                }
                State::AfterParam => match reader.next_tag()? {
                    Token::End(ref tag) if tag == "param" => State::InParams,
                    token => return Err(unexpected(token, "</param>")),
                },
                State::InFaultStruct => {
                    reader.expect_start("value")?;
                    match self.read_value(&mut reader)? {
                        Value::Struct(ref members) => fault = Some(Fault::from_struct(members)),
                        _ => return Err(ProtocolError::FaultNotStruct),
                    }
                    State::AfterFault
                }
                State::AfterFault => match reader.next_tag()? {
                    Token::End(ref tag) if tag == "fault" => State::InParamsOrFault,
                    token => return Err(unexpected(token, "</fault>")),
                },
                State::Done => State::Done,
            };
        }

        Ok((method, params, fault))
    }

    /// Reads one value; the opening `<value>` has just been consumed.
    fn read_value(&self, reader: &mut Reader) -> DecodeResult<Value> {
        let mut stack = vec![Frame::Value { text: String::new(), typed: None }];

        loop {
            match reader.next()? {
                Token::Text(s) => on_text(&mut stack, s)?,
                Token::Start(tag) => {
                    if let Some(frame) = self.open(&mut stack, tag)? {
                        stack.push(frame);
                    }
                }
                Token::End(tag) => {
                    if let Some(Frame::Array { data, .. }) = stack.last_mut() {
                        if *data == DataState::Open {
                            // </data> closes the list, the array stays open
                            *data = DataState::Closed;
                            continue;
                        }
                    }
                    let frame = match stack.pop() {
                        Some(frame) => frame,
                        None => return Err(ProtocolError::UnexpectedEnd(tag)),
                    };
                    let finished = self.close(frame)?;
                    match stack.last_mut() {
                        Some(parent) => deliver(parent, finished, tag)?,
                        None => match finished {
                            Finished::Value(value) => return Ok(value),
                            _ => return Err(ProtocolError::UnexpectedEnd(tag)),
                        },
                    }
                }
                Token::Eof => return Err(ProtocolError::UnexpectedEof),
            }
        }
    }

    /// Decides what a start tag means under the current top frame. `None`
    /// means the top frame changed in place and nothing new was opened.
    fn open(&self, stack: &mut [Frame], tag: String) -> DecodeResult<Option<Frame>> {
        let top = match stack.last_mut() {
            Some(top) => top,
            None => return Err(ProtocolError::UnexpectedElement { found: tag, expected: "<value>" }),
        };
        let frame = match *top {
            Frame::Value { ref text, ref typed } => {
                if typed.is_some() {
                    return Err(ProtocolError::MultipleTypes);
                }
                if !text.trim().is_empty() {
                    return Err(ProtocolError::UnexpectedText(text.clone()));
                }
                self.type_frame(tag)?
            }
            Frame::Array { ref mut data, .. } => {
                if *data == DataState::Before && tag == "data" {
                    *data = DataState::Open;
                    return Ok(None);
                }
                if *data == DataState::Open && tag == "value" {
                    Frame::Value { text: String::new(), typed: None }
                } else {
                    return Err(ProtocolError::UnexpectedElement { found: tag, expected: "<data> holding <value>s" });
                }
            }
            Frame::Struct { .. } => {
                if tag != "member" {
                    return Err(ProtocolError::UnexpectedElement { found: tag, expected: "<member>" });
                }
                Frame::Member { name: None, value: None }
            }
            Frame::Member { ref name, ref value } => {
                if tag == "name" && name.is_none() && value.is_none() {
                    Frame::Name { text: String::new() }
                } else if tag == "value" && name.is_some() && value.is_none() {
                    Frame::Value { text: String::new(), typed: None }
                } else {
                    return Err(ProtocolError::UnexpectedElement { found: tag, expected: "<name> then <value>" });
                }
            }
            Frame::Scalar { kind, .. } => {
                return Err(ProtocolError::UnexpectedElement { found: tag, expected: kind.tag() });
            }
            Frame::Custom { .. } | Frame::Name { .. } => {
                return Err(ProtocolError::UnexpectedElement { found: tag, expected: "text" });
            }
        };
        Ok(Some(frame))
    }

    fn type_frame(&self, tag: String) -> DecodeResult<Frame> {
        if let Some(kind) = Scalar::from_tag(&tag) {
            return Ok(Frame::Scalar { kind, text: String::new() });
        }
        if tag == TAG_ARRAY {
            return Ok(Frame::Array { items: Vec::new(), data: DataState::Before });
        }
        if tag == TAG_STRUCT {
            return Ok(Frame::Struct { members: Struct::new() });
        }
        if self.custom.contains(&tag) {
            return Ok(Frame::Custom { tag, text: String::new() });
        }
        Err(ProtocolError::UnknownType(tag))
    }

    fn close(&self, frame: Frame) -> DecodeResult<Finished> {
        let value = match frame {
            Frame::Value { text, typed } => typed.unwrap_or(Value::String(text)),
            Frame::Scalar { kind, text } => self.scalar(kind, text)?,
            Frame::Custom { tag, text } => {
                let reconstruct = match self.custom.get(&tag) {
                    Some(f) => f,
                    None => return Err(ProtocolError::UnknownType(tag)),
                };
                match reconstruct(&text) {
                    Ok(custom) => Value::Custom(custom),
                    Err(reason) => return Err(ProtocolError::InvalidCustom { tag, reason }),
                }
            }
            Frame::Array { items, data } => {
                if data != DataState::Closed {
                    return Err(ProtocolError::MissingData);
                }
                Value::Array(items)
            }
            Frame::Struct { members } => Value::Struct(members),
            Frame::Member { name, value } => {
                return match (name, value) {
                    (Some(name), Some(value)) => Ok(Finished::Member(name, value)),
                    (None, _) => Err(ProtocolError::IncompleteMember("<name>")),
                    (Some(_), None) => Err(ProtocolError::IncompleteMember("<value>")),
                };
            }
            Frame::Name { text } => return Ok(Finished::Name(text)),
        };
        Ok(Finished::Value(value))
    }

    fn scalar(&self, kind: Scalar, text: String) -> DecodeResult<Value> {
        let invalid = |text: String| ProtocolError::InvalidScalar { tag: kind.tag(), text };
        let value = match kind {
            Scalar::String => Value::String(text),
            Scalar::Int => match text.trim().parse::<i32>() {
                Ok(n) => Value::Int(n),
                Err(_) => return Err(invalid(text)),
            },
            Scalar::I8 => match text.trim().parse::<i64>().ok().and_then(num::cast::<i64, i32>) {
                Some(n) => Value::Int(n),
                None => return Err(invalid(text)),
            },
            Scalar::Double => match text.trim().parse::<f64>() {
                Ok(n) => Value::Double(n),
                Err(_) => return Err(invalid(text)),
            },
            Scalar::Boolean => match text.trim() {
                "0" => Value::Boolean(false),
                "1" => Value::Boolean(true),
                _ => return Err(invalid(text)),
            },
            Scalar::DateTime => Value::DateTime(self.dates.decode(&text)?),
            Scalar::Base64 => {
                let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                match STANDARD.decode(compact.as_bytes()) {
                    Ok(bytes) => Value::Base64(bytes),
                    Err(_) => return Err(invalid(text)),
                }
            }
        };
        Ok(value)
    }
}

fn on_text(stack: &mut [Frame], s: String) -> DecodeResult<()> {
    match stack.last_mut() {
        Some(Frame::Value { text, typed }) => {
            if typed.is_some() && !s.trim().is_empty() {
                return Err(ProtocolError::UnexpectedText(s));
            }
            text.push_str(&s);
        }
        Some(Frame::Scalar { text, .. }) | Some(Frame::Custom { text, .. }) | Some(Frame::Name { text }) => {
            text.push_str(&s)
        }
        _ => {
            if !s.trim().is_empty() {
                return Err(ProtocolError::UnexpectedText(s));
            }
        }
    }
    Ok(())
}

fn deliver(parent: &mut Frame, finished: Finished, tag: String) -> DecodeResult<()> {
    match (parent, finished) {
        (&mut Frame::Value { ref mut typed, .. }, Finished::Value(v)) => *typed = Some(v),
        (&mut Frame::Array { ref mut items, .. }, Finished::Value(v)) => items.push(v),
        (&mut Frame::Member { ref mut name, .. }, Finished::Name(n)) => *name = Some(n),
        (&mut Frame::Member { ref mut value, .. }, Finished::Value(v)) => *value = Some(v),
        (&mut Frame::Struct { ref mut members }, Finished::Member(n, v)) => {
            // duplicate names: the last member wins
            members.insert(n, v);
        }
        _ => return Err(ProtocolError::UnexpectedEnd(tag)),
    }
    Ok(())
}
