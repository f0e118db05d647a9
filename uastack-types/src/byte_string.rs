// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `ByteString`.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::encoding::{
    process_decode_io_result, process_encode_io_result, read_i32, write_i32, DecodingOptions,
    EncodingResult, Error, SimpleBinaryDecodable, SimpleBinaryEncodable, UaNullable,
};

/// A sequence of octets. A null byte string is distinct from an empty one.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default)]
pub struct ByteString {
    /// The raw bytes, `None` when the byte string is null.
    pub value: Option<Vec<u8>>,
}

impl UaNullable for ByteString {
    fn is_ua_null(&self) -> bool {
        self.is_null()
    }
}

impl AsRef<[u8]> for ByteString {
    fn as_ref(&self) -> &[u8] {
        if self.value.is_none() {
            &[]
        } else {
            self.value.as_ref().unwrap()
        }
    }
}

impl SimpleBinaryEncodable for ByteString {
    fn byte_len(&self) -> usize {
        4 + match self.value {
            Some(ref value) => value.len(),
            None => 0,
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // Byte strings are encoded as a length prefixed sequence of bytes, -1 for null.
        match self.value {
            Some(ref value) => {
                write_i32(stream, value.len() as i32)?;
                process_encode_io_result(stream.write_all(value))
            }
            None => write_i32(stream, -1),
        }
    }
}

impl SimpleBinaryDecodable for ByteString {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len == -1 {
            Ok(ByteString::null())
        } else if len < -1 {
            Err(Error::decoding(format!(
                "ByteString length is a negative number {len}"
            )))
        } else if len as usize > decoding_options.max_byte_string_length {
            Err(Error::decoding(format!(
                "ByteString length {} exceeds decoding limit {}",
                len, decoding_options.max_byte_string_length
            )))
        } else {
            let mut value = vec![0u8; len as usize];
            process_decode_io_result(stream.read_exact(&mut value))?;
            Ok(ByteString { value: Some(value) })
        }
    }
}

impl<'a, T> From<&'a T> for ByteString
where
    T: AsRef<[u8]> + ?Sized,
{
    fn from(value: &'a T) -> Self {
        ByteString::from(value.as_ref().to_vec())
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(value: Vec<u8>) -> Self {
        ByteString { value: Some(value) }
    }
}

impl ByteString {
    /// Create a null byte string, not the same as an empty byte string.
    pub fn null() -> ByteString {
        ByteString { value: None }
    }

    /// Test if the byte string is null.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Test if the byte string is null or empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() || self.value.as_ref().unwrap().is_empty()
    }

    /// Get the length of the byte string, or -1 for null.
    pub fn len(&self) -> isize {
        if self.value.is_none() {
            -1
        } else {
            self.value.as_ref().unwrap().len() as isize
        }
    }

    /// Create a byte string from the base64 encoded value.
    pub fn from_base64(data: &str) -> Option<ByteString> {
        STANDARD.decode(data).map(Self::from).ok()
    }

    /// Encode the byte string to base64.
    pub fn as_base64(&self) -> String {
        STANDARD.encode(self.as_ref())
    }

    /// Copy the content as a `Vec<u8>`, empty for null.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_ref().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_empty() {
        assert!(ByteString::null().is_null());
        assert!(!ByteString::from(vec![]).is_null());
        assert_eq!(ByteString::null().encode_to_vec(), vec![0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn base64_round_trip() {
        let b = ByteString::from(&[0x01u8, 0x02, 0x03, 0xff]);
        assert_eq!(ByteString::from_base64(&b.as_base64()).unwrap(), b);
    }
}
