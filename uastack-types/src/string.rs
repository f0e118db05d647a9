// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `UAString`.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::encoding::{
    process_decode_io_result, process_encode_io_result, read_i32, write_i32, DecodingOptions,
    EncodingResult, Error, SimpleBinaryDecodable, SimpleBinaryEncodable, UaNullable,
};

/// To avoid naming conflict hell, the OPC UA String type is typed `UAString` so it does not collide
/// with the Rust `String`.
///
/// A string contains UTF-8 encoded characters or a null value. A null value is distinct from
/// being an empty string.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default)]
pub struct UAString {
    value: Option<String>,
}

impl fmt::Display for UAString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref value) = self.value {
            write!(f, "{}", value)
        } else {
            write!(f, "[null]")
        }
    }
}

impl UaNullable for UAString {
    fn is_ua_null(&self) -> bool {
        self.is_null()
    }
}

impl SimpleBinaryEncodable for UAString {
    fn byte_len(&self) -> usize {
        // Length plus the actual string length in bytes for a non-null string.
        4 + match self.value {
            Some(ref value) => value.len(),
            None => 0,
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // Strings are uncoded as UTF8 chars preceded by an i32 length. A -1 indicates a null string.
        match self.value {
            Some(ref value) => {
                write_i32(stream, value.len() as i32)?;
                process_encode_io_result(stream.write_all(value.as_bytes()))
            }
            None => write_i32(stream, -1),
        }
    }
}

impl SimpleBinaryDecodable for UAString {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        // Null string?
        if len == -1 {
            Ok(UAString::null())
        } else if len < -1 {
            Err(Error::decoding(format!(
                "String buf length is a negative number {len}"
            )))
        } else if len as usize > decoding_options.max_string_length {
            Err(Error::decoding(format!(
                "String buf length {} exceeds decoding limit {}",
                len, decoding_options.max_string_length
            )))
        } else {
            // Create the actual UTF8 string
            let mut string_buf: Vec<u8> = vec![0u8; len as usize];
            process_decode_io_result(stream.read_exact(&mut string_buf))?;
            Ok(UAString::from(String::from_utf8(string_buf).map_err(
                |err| {
                    Error::decoding(format!(
                        "Decoded string was not valid UTF-8, raw error: {err}"
                    ))
                },
            )?))
        }
    }
}

impl From<UAString> for String {
    fn from(value: UAString) -> Self {
        value.as_ref().to_string()
    }
}

impl AsRef<str> for UAString {
    fn as_ref(&self) -> &str {
        if self.is_null() {
            ""
        } else {
            self.value.as_ref().unwrap()
        }
    }
}

impl<'a> From<&'a str> for UAString {
    fn from(value: &'a str) -> Self {
        Self {
            value: Some(value.to_string()),
        }
    }
}

impl From<&String> for UAString {
    fn from(value: &String) -> Self {
        Self {
            value: Some(value.clone()),
        }
    }
}

impl From<String> for UAString {
    fn from(value: String) -> Self {
        Self { value: Some(value) }
    }
}

impl From<Option<String>> for UAString {
    fn from(value: Option<String>) -> Self {
        Self { value }
    }
}

impl PartialEq<str> for UAString {
    fn eq(&self, other: &str) -> bool {
        self.as_ref() == other
    }
}

impl UAString {
    /// Get the inner value.
    pub fn value(&self) -> &Option<String> {
        &self.value
    }

    /// Set the inner value of the string.
    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    /// Returns true if the string is null. Null is distinct from being empty.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Returns a null string.
    pub fn null() -> UAString {
        UAString { value: None }
    }

    /// Returns the length of the string in bytes or -1 for null.
    pub fn len(&self) -> isize {
        if self.value.is_none() {
            -1
        } else {
            self.value.as_ref().unwrap().len() as isize
        }
    }

    /// Returns true if the string is null or empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() || self.value.as_ref().unwrap().is_empty()
    }
}

/// An XML element inside an extension object body. Bit-compatible with String on the
/// wire; the content is carried opaquely.
pub type XmlElement = UAString;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn null_and_empty_are_distinct() {
        let null = UAString::null();
        let empty = UAString::from("");
        assert!(null.is_null());
        assert!(!empty.is_null());
        assert!(null.is_empty());
        assert!(empty.is_empty());
        assert_ne!(null, empty);

        assert_eq!(null.encode_to_vec(), vec![0xff, 0xff, 0xff, 0xff]);
        assert_eq!(empty.encode_to_vec(), vec![0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn string_limits() {
        let s = UAString::from("hello world");
        let buf = s.encode_to_vec();
        let options = DecodingOptions {
            max_string_length: 5,
            ..Default::default()
        };
        let mut stream = Cursor::new(buf);
        assert!(UAString::decode(&mut stream, &options).is_err());
    }
}
