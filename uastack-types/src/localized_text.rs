// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `LocalizedText`.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::{
    encoding::{
        read_u8, write_u8, DecodingOptions, EncodingResult, SimpleBinaryDecodable,
        SimpleBinaryEncodable, UaNullable,
    },
    string::UAString,
};

/// Human readable text with an optional locale identifier. Either field may be absent, which is
/// flagged in an encoding mask on the wire.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Default)]
pub struct LocalizedText {
    /// The locale, e.g. "en-US".
    pub locale: UAString,
    /// The text in the specified locale.
    pub text: UAString,
}

impl UaNullable for LocalizedText {
    fn is_ua_null(&self) -> bool {
        self.is_null()
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl SimpleBinaryEncodable for LocalizedText {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if !self.locale.is_null() {
            size += self.locale.byte_len();
        }
        if !self.text.is_null() {
            size += self.text.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let mut encoding_mask: u8 = 0;
        if !self.locale.is_null() {
            encoding_mask |= 0x1;
        }
        if !self.text.is_null() {
            encoding_mask |= 0x2;
        }
        write_u8(stream, encoding_mask)?;
        if !self.locale.is_null() {
            self.locale.encode(stream)?;
        }
        if !self.text.is_null() {
            self.text.encode(stream)?;
        }
        Ok(())
    }
}

impl SimpleBinaryDecodable for LocalizedText {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let encoding_mask = read_u8(stream)?;
        let locale = if encoding_mask & 0x1 != 0 {
            UAString::decode(stream, decoding_options)?
        } else {
            UAString::null()
        };
        let text = if encoding_mask & 0x2 != 0 {
            UAString::decode(stream, decoding_options)?
        } else {
            UAString::null()
        };
        Ok(LocalizedText { locale, text })
    }
}

impl<'a> From<&'a str> for LocalizedText {
    fn from(value: &'a str) -> Self {
        Self {
            locale: UAString::null(),
            text: UAString::from(value),
        }
    }
}

impl From<String> for LocalizedText {
    fn from(value: String) -> Self {
        Self {
            locale: UAString::null(),
            text: UAString::from(value),
        }
    }
}

impl LocalizedText {
    /// Create a new localized text value.
    pub fn new(locale: &str, text: &str) -> LocalizedText {
        LocalizedText {
            locale: UAString::from(locale),
            text: UAString::from(text),
        }
    }

    /// Return the null localized text.
    pub fn null() -> LocalizedText {
        LocalizedText {
            locale: UAString::null(),
            text: UAString::null(),
        }
    }

    /// Test if both fields are null.
    pub fn is_null(&self) -> bool {
        self.locale.is_null() && self.text.is_null()
    }
}
