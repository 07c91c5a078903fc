// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed field access on property-list dictionaries.

use std::io::Cursor;

use plist::{Dictionary, Value};

use crate::error::{Error, ProtocolError, Result};

/// Required/optional accessors for decoded plist payloads.
///
/// A required field that is absent or has the wrong type yields
/// [`ProtocolError::MissingField`].
pub(crate) trait DictionaryExt {
    fn required_string(&self, key: &'static str) -> std::result::Result<&str, ProtocolError>;
    fn required_data(&self, key: &'static str) -> std::result::Result<&[u8], ProtocolError>;
    fn required_integer(&self, key: &'static str) -> std::result::Result<i64, ProtocolError>;
    fn required_dictionary(
        &self,
        key: &'static str,
    ) -> std::result::Result<&Dictionary, ProtocolError>;

    fn optional_string(&self, key: &str) -> Option<&str>;
    fn optional_data(&self, key: &str) -> Option<&[u8]>;
    fn optional_integer(&self, key: &str) -> Option<i64>;
}

impl DictionaryExt for Dictionary {
    fn required_string(&self, key: &'static str) -> std::result::Result<&str, ProtocolError> {
        self.optional_string(key)
            .ok_or(ProtocolError::MissingField(key))
    }

    fn required_data(&self, key: &'static str) -> std::result::Result<&[u8], ProtocolError> {
        self.optional_data(key).ok_or(ProtocolError::MissingField(key))
    }

    fn required_integer(&self, key: &'static str) -> std::result::Result<i64, ProtocolError> {
        self.optional_integer(key)
            .ok_or(ProtocolError::MissingField(key))
    }

    fn required_dictionary(
        &self,
        key: &'static str,
    ) -> std::result::Result<&Dictionary, ProtocolError> {
        self.get(key)
            .and_then(Value::as_dictionary)
            .ok_or(ProtocolError::MissingField(key))
    }

    fn optional_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_string)
    }

    fn optional_data(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Value::as_data)
    }

    // Some services encode integers as strings.
    fn optional_integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Integer(value) => value.as_signed(),
            Value::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Decode a binary or XML property list whose root is a dictionary.
pub(crate) fn parse_dictionary(bytes: &[u8], what: &'static str) -> Result<Dictionary> {
    let value = Value::from_reader(Cursor::new(bytes)).map_err(|e| Error::decode(what, e))?;
    value
        .into_dictionary()
        .ok_or_else(|| Error::decode(what, "root is not a dictionary"))
}

/// Encode a dictionary as an XML property list.
pub(crate) fn to_xml_bytes(dictionary: Dictionary) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    Value::Dictionary(dictionary).to_writer_xml(&mut buffer)?;
    Ok(buffer)
}
