// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use xml::escape::escape_str_pcdata;

use crate::xmlrpc::custom::{self, CustomValue};
use crate::xmlrpc::date::DateFormatter;
use crate::xmlrpc::fault::Fault;
use crate::xmlrpc::value::{Struct, Value};

/// Values that cannot be put on the wire.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("cannot encode custom value: {0}")]
    InvalidCustomTag(String),
    #[error("character {0:?} cannot be represented in XML 1.0")]
    UnrepresentableChar(char),
    #[error("year {0} does not fit dateTime.iso8601")]
    DateOutOfRange(i32),
    #[error("formatter error")]
    Fmt(#[from] fmt::Error),
}

pub type EncodeResult = Result<(), EncodeError>;

fn escape_str(wr: &mut dyn fmt::Write, v: &str) -> EncodeResult {
    if let Some(c) = v.chars().find(|&c| !is_xml_char(c)) {
        return Err(EncodeError::UnrepresentableChar(c));
    }
    let escaped = escape_str_pcdata(v);
    // a literal CR would be normalised away by the receiving parser
    if escaped.contains('\r') {
        wr.write_str(&escaped.replace('\r', "&#13;"))?;
    } else {
        wr.write_str(&escaped)?;
    }
    Ok(())
}

fn is_xml_char(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => true,
        '\u{0}'..='\u{1f}' => false,
        '\u{fffe}' | '\u{ffff}' => false,
        _ => true,
    }
}

/// Writes `<value>` elements to any `fmt::Write`.
pub struct Encoder<'a> {
    writer: &'a mut (dyn fmt::Write + 'a),
    dates: &'a DateFormatter,
}

impl<'a> Encoder<'a> {
    /// Creates a new XML-RPC encoder whose output will be written to the writer
    /// specified.
    pub fn new(writer: &'a mut dyn fmt::Write, dates: &'a DateFormatter) -> Encoder<'a> {
        Encoder { writer, dates }
    }

    /// Writes `<value>...</value>`. Nesting is unbounded.
    pub fn emit_value(&mut self, v: &Value) -> EncodeResult {
        self.writer.write_str("<value>")?;
        match *v {
            Value::String(ref s) => self.emit_str(s)?,
            Value::Int(n) => write!(self.writer, "<int>{}</int>", n)?,
            Value::Double(n) => self.emit_f64(n)?,
            Value::Boolean(b) => write!(self.writer, "<boolean>{}</boolean>", b as u8)?,
            Value::DateTime(ref d) => {
                let text = self.dates.encode(d)?;
                write!(self.writer, "<dateTime.iso8601>{}</dateTime.iso8601>", text)?
            }
            Value::Base64(ref bytes) => {
                write!(self.writer, "<base64>{}</base64>", STANDARD.encode(bytes))?
            }
            Value::Array(ref items) => self.emit_seq(items)?,
            Value::Struct(ref members) => self.emit_struct(members)?,
            Value::Custom(ref c) => self.emit_custom(c)?,
        }
        self.writer.write_str("</value>")?;
        Ok(())
    }

    fn emit_str(&mut self, v: &str) -> EncodeResult {
        self.writer.write_str("<string>")?;
        escape_str(self.writer, v)?;
        self.writer.write_str("</string>")?;
        Ok(())
    }

    fn emit_f64(&mut self, v: f64) -> EncodeResult {
        // Display gives the shortest text that parses back to the same bits
        write!(self.writer, "<double>{}</double>", v)?;
        Ok(())
    }

    fn emit_seq(&mut self, items: &[Value]) -> EncodeResult {
        self.writer.write_str("<array><data>")?;
        for item in items {
            self.emit_value(item)?;
        }
        self.writer.write_str("</data></array>")?;
        Ok(())
    }

    fn emit_struct(&mut self, members: &Struct) -> EncodeResult {
        self.writer.write_str("<struct>")?;
        for (name, value) in members {
            self.writer.write_str("<member><name>")?;
            escape_str(self.writer, name)?;
            self.writer.write_str("</name>")?;
            self.emit_value(value)?;
            self.writer.write_str("</member>")?;
        }
        self.writer.write_str("</struct>")?;
        Ok(())
    }

    fn emit_custom(&mut self, c: &CustomValue) -> EncodeResult {
        custom::validate_tag(c.tag()).map_err(EncodeError::InvalidCustomTag)?;
        if c.raw().is_empty() {
            write!(self.writer, "<{}/>", c.tag())?;
        } else {
            write!(self.writer, "<{}>", c.tag())?;
            escape_str(self.writer, c.raw())?;
            write!(self.writer, "</{}>", c.tag())?;
        }
        Ok(())
    }
}

/// Builds call and response envelopes.
#[derive(Clone, Debug, Default)]
pub struct Serializer {
    encoding: Option<String>,
    dates: DateFormatter,
}

impl Serializer {
    pub fn new(encoding: Option<String>, dates: DateFormatter) -> Serializer {
        Serializer { encoding, dates }
    }

    fn declaration(&self, out: &mut String) {
        match self.encoding {
            Some(ref enc) => {
                out.push_str("<?xml version=\"1.0\" encoding=\"");
                out.push_str(enc);
                out.push_str("\"?>");
            }
            None => out.push_str("<?xml version=\"1.0\"?>"),
        }
    }

    fn emit_params(&self, out: &mut String, params: &[Value]) -> EncodeResult {
        let mut encoder = Encoder::new(out, &self.dates);
        encoder.writer.write_str("<params>")?;
        for param in params {
            encoder.writer.write_str("<param>")?;
            encoder.emit_value(param)?;
            encoder.writer.write_str("</param>")?;
        }
        encoder.writer.write_str("</params>")?;
        Ok(())
    }

    pub fn serialize_method_call(&self, method: &str, params: &[Value]) -> Result<String, EncodeError> {
        let mut out = String::new();
        self.declaration(&mut out);
        out.push_str("<methodCall><methodName>");
        escape_str(&mut out, method)?;
        out.push_str("</methodName>");
        self.emit_params(&mut out, params)?;
        out.push_str("</methodCall>");
        Ok(out)
    }

    /// Success envelope carrying exactly one value.
    pub fn serialize_method_response(&self, value: &Value) -> Result<String, EncodeError> {
        let mut out = String::new();
        self.declaration(&mut out);
        out.push_str("<methodResponse>");
        self.emit_params(&mut out, std::slice::from_ref(value))?;
        out.push_str("</methodResponse>");
        Ok(out)
    }

    pub fn serialize_fault(&self, fault: &Fault) -> Result<String, EncodeError> {
        let mut out = String::new();
        self.declaration(&mut out);
        out.push_str("<methodResponse><fault>");
        Encoder::new(&mut out, &self.dates).emit_value(&fault.to_value())?;
        out.push_str("</fault></methodResponse>");
        Ok(out)
    }
}

/// Shortcut for a call envelope with the default date format.
pub fn serialize_method_call(method: &str, params: &[Value], encoding: Option<&str>) -> Result<String, EncodeError> {
    Serializer::new(encoding.map(str::to_string), DateFormatter::default()).serialize_method_call(method, params)
}

/// Shortcut to encode a single `<value>` with the given date format
pub fn encode(value: &Value, dates: &DateFormatter) -> Result<String, EncodeError> {
    let mut s = String::new();
    Encoder::new(&mut s, dates).emit_value(value)?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmlrpc::custom::{CustomType, Nil};
    use crate::xmlrpc::date::DateFormatterOptions;
    use time::macros::datetime;
    use time::UtcOffset;

    fn utc_dates() -> DateFormatter {
        let options = DateFormatterOptions { local: false, ..DateFormatterOptions::default() };
        DateFormatter::with_local_offset(options, UtcOffset::UTC)
    }

    #[test]
    fn test_encode_call() {
        let expected = "<?xml version=\"1.0\"?><methodCall><methodName>method_name_value</methodName><params><param><value><string>string_value</string></value></param><param><value><double>4.2</double></value></param><param><value><boolean>1</boolean></value></param></params></methodCall>";

        let params = vec![Value::from("string_value"), Value::from(4.2), Value::from(true)];
        let body = Serializer::default().serialize_method_call("method_name_value", &params).unwrap();

        assert_eq!(expected, body);
    }

    #[test]
    fn test_encoding_declaration() {
        let body = serialize_method_call("system.listMethods", &[], Some("utf-8")).unwrap();
        assert_eq!(
            body,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><methodCall><methodName>system.listMethods</methodName><params></params></methodCall>"
        );
    }

    #[test]
    fn test_integer_boundary() {
        let dates = utc_dates();
        assert_eq!(encode(&Value::number(2147483647.0), &dates).unwrap(), "<value><int>2147483647</int></value>");
        assert_eq!(encode(&Value::number(2147483648.0), &dates).unwrap(), "<value><double>2147483648</double></value>");
        assert_eq!(encode(&Value::number(0.5), &dates).unwrap(), "<value><double>0.5</double></value>");
        assert_eq!(encode(&Value::from(2147483648i64), &dates).unwrap(), "<value><double>2147483648</double></value>");
    }

    #[test]
    fn test_struct_member_order_is_insertion_order() {
        let mut members = Struct::new();
        members.insert("zeta".to_string(), Value::Int(1));
        members.insert("alpha".to_string(), Value::Int(2));
        let xml = encode(&Value::Struct(members), &utc_dates()).unwrap();
        assert_eq!(
            xml,
            "<value><struct><member><name>zeta</name><value><int>1</int></value></member><member><name>alpha</name><value><int>2</int></value></member></struct></value>"
        );
    }

    #[test]
    fn test_escaping() {
        let xml = encode(&Value::from("a<b & c>"), &utc_dates()).unwrap();
        assert_eq!(xml, "<value><string>a&lt;b &amp; c&gt;</string></value>");
        let xml = encode(&Value::from("line\r\n"), &utc_dates()).unwrap();
        assert!(!xml.contains('\r'));
    }

    #[test]
    fn test_unrepresentable_char() {
        match encode(&Value::from("bell\u{7}"), &utc_dates()) {
            Err(EncodeError::UnrepresentableChar('\u{7}')) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scalars() {
        let dates = utc_dates();
        assert_eq!(encode(&Value::Base64(b"hello".to_vec()), &dates).unwrap(), "<value><base64>aGVsbG8=</base64></value>");
        assert_eq!(
            encode(&Value::DateTime(datetime!(1998-07-17 14:08:55 UTC)), &dates).unwrap(),
            "<value><dateTime.iso8601>19980717T14:08:55</dateTime.iso8601></value>"
        );
        assert_eq!(encode(&Value::from(false), &dates).unwrap(), "<value><boolean>0</boolean></value>");
        assert_eq!(
            encode(&Value::from(vec![Value::Int(1)]), &dates).unwrap(),
            "<value><array><data><value><int>1</int></value></data></array></value>"
        );
    }

    #[test]
    fn test_custom_values() {
        let dates = utc_dates();
        assert_eq!(encode(&Nil.to_value(), &dates).unwrap(), "<value><nil/></value>");
        let money = Value::Custom(CustomValue::new("ext.money", "1 < 2"));
        assert_eq!(encode(&money, &dates).unwrap(), "<value><ext.money>1 &lt; 2</ext.money></value>");

        for bad in &["int", "two words", ""] {
            match encode(&Value::Custom(CustomValue::new(*bad, "x")), &dates) {
                Err(EncodeError::InvalidCustomTag(_)) => {}
                other => panic!("{:?} encoded to {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_fault_envelope() {
        let body = Serializer::default().serialize_fault(&Fault::new(4, "Too many parameters.")).unwrap();
        assert_eq!(
            body,
            "<?xml version=\"1.0\"?><methodResponse><fault><value><struct><member><name>faultCode</name><value><int>4</int></value></member><member><name>faultString</name><value><string>Too many parameters.</string></value></member></struct></value></fault></methodResponse>"
        );
    }

    #[test]
    fn test_response_envelope() {
        let body = Serializer::default().serialize_method_response(&Value::from("ok")).unwrap();
        assert_eq!(
            body,
            "<?xml version=\"1.0\"?><methodResponse><params><param><value><string>ok</string></value></param></params></methodResponse>"
        );
    }
}
