// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `DiagnosticInfo`.

use std::io::{Read, Write};

use bitflags::bitflags;

use crate::{
    encoding::{
        read_u8, write_u8, DecodingOptions, EncodingResult, SimpleBinaryDecodable,
        SimpleBinaryEncodable, UaNullable,
    },
    status_code::StatusCode,
    string::UAString,
};

bitflags! {
    /// Mask of fields present in a `DiagnosticInfo`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct DiagnosticInfoMask: u8 {
        /// Symbolic id present.
        const HAS_SYMBOLIC_ID = 0x01;
        /// Namespace present.
        const HAS_NAMESPACE = 0x02;
        /// Localized text present.
        const HAS_LOCALIZED_TEXT = 0x04;
        /// Locale present.
        const HAS_LOCALE = 0x08;
        /// Additional info present.
        const HAS_ADDITIONAL_INFO = 0x10;
        /// Inner status code present.
        const HAS_INNER_STATUS_CODE = 0x20;
        /// Inner diagnostic info present.
        const HAS_INNER_DIAGNOSTIC_INFO = 0x40;
    }
}

/// Vendor-specific diagnostic information associated with a status code. The string fields are
/// indexes into the string table carried in the response header.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct DiagnosticInfo {
    /// Index into the string table of the symbolic name of the status code.
    pub symbolic_id: Option<i32>,
    /// Index into the string table of the namespace the symbolic id belongs to.
    pub namespace_uri: Option<i32>,
    /// Index into the string table of the locale of the localized text.
    pub locale: Option<i32>,
    /// Index into the string table of a human readable error description.
    pub localized_text: Option<i32>,
    /// Vendor-specific detail.
    pub additional_info: Option<UAString>,
    /// Status code from an inner operation.
    pub inner_status_code: Option<StatusCode>,
    /// Diagnostics from an inner operation.
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl UaNullable for DiagnosticInfo {
    fn is_ua_null(&self) -> bool {
        self.encoding_mask().is_empty()
    }
}

impl SimpleBinaryEncodable for DiagnosticInfo {
    fn byte_len(&self) -> usize {
        let mut size: usize = 1;
        if self.symbolic_id.is_some() {
            size += 4;
        }
        if self.namespace_uri.is_some() {
            size += 4;
        }
        if self.locale.is_some() {
            size += 4;
        }
        if self.localized_text.is_some() {
            size += 4;
        }
        if let Some(ref additional_info) = self.additional_info {
            size += additional_info.byte_len();
        }
        if self.inner_status_code.is_some() {
            size += 4;
        }
        if let Some(ref inner_diagnostic_info) = self.inner_diagnostic_info {
            size += inner_diagnostic_info.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, self.encoding_mask().bits())?;
        // Note the wire order: locale precedes localized text even though the mask bit for
        // localized text is the lower one.
        if let Some(symbolic_id) = self.symbolic_id {
            symbolic_id.encode(stream)?;
        }
        if let Some(namespace_uri) = self.namespace_uri {
            namespace_uri.encode(stream)?;
        }
        if let Some(locale) = self.locale {
            locale.encode(stream)?;
        }
        if let Some(localized_text) = self.localized_text {
            localized_text.encode(stream)?;
        }
        if let Some(ref additional_info) = self.additional_info {
            additional_info.encode(stream)?;
        }
        if let Some(inner_status_code) = self.inner_status_code {
            inner_status_code.encode(stream)?;
        }
        if let Some(ref inner_diagnostic_info) = self.inner_diagnostic_info {
            inner_diagnostic_info.encode(stream)?;
        }
        Ok(())
    }
}

impl SimpleBinaryDecodable for DiagnosticInfo {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        // Inner diagnostic infos are recursive, so capacity is bounded by the depth gauge.
        let _depth_lock = decoding_options.depth_lock()?;
        let encoding_mask = DiagnosticInfoMask::from_bits_truncate(read_u8(stream)?);
        let mut diagnostic_info = DiagnosticInfo::default();
        if encoding_mask.contains(DiagnosticInfoMask::HAS_SYMBOLIC_ID) {
            diagnostic_info.symbolic_id = Some(i32::decode(stream, decoding_options)?);
        }
        if encoding_mask.contains(DiagnosticInfoMask::HAS_NAMESPACE) {
            diagnostic_info.namespace_uri = Some(i32::decode(stream, decoding_options)?);
        }
        if encoding_mask.contains(DiagnosticInfoMask::HAS_LOCALE) {
            diagnostic_info.locale = Some(i32::decode(stream, decoding_options)?);
        }
        if encoding_mask.contains(DiagnosticInfoMask::HAS_LOCALIZED_TEXT) {
            diagnostic_info.localized_text = Some(i32::decode(stream, decoding_options)?);
        }
        if encoding_mask.contains(DiagnosticInfoMask::HAS_ADDITIONAL_INFO) {
            diagnostic_info.additional_info = Some(UAString::decode(stream, decoding_options)?);
        }
        if encoding_mask.contains(DiagnosticInfoMask::HAS_INNER_STATUS_CODE) {
            diagnostic_info.inner_status_code = Some(StatusCode::decode(stream, decoding_options)?);
        }
        if encoding_mask.contains(DiagnosticInfoMask::HAS_INNER_DIAGNOSTIC_INFO) {
            diagnostic_info.inner_diagnostic_info =
                Some(Box::new(DiagnosticInfo::decode(stream, decoding_options)?));
        }
        Ok(diagnostic_info)
    }
}

impl DiagnosticInfo {
    /// Return a diagnostic info with no fields set.
    pub fn null() -> DiagnosticInfo {
        DiagnosticInfo::default()
    }

    /// Get the encoding mask describing which fields are present.
    pub fn encoding_mask(&self) -> DiagnosticInfoMask {
        let mut encoding_mask = DiagnosticInfoMask::empty();
        if self.symbolic_id.is_some() {
            encoding_mask |= DiagnosticInfoMask::HAS_SYMBOLIC_ID;
        }
        if self.namespace_uri.is_some() {
            encoding_mask |= DiagnosticInfoMask::HAS_NAMESPACE;
        }
        if self.locale.is_some() {
            encoding_mask |= DiagnosticInfoMask::HAS_LOCALE;
        }
        if self.localized_text.is_some() {
            encoding_mask |= DiagnosticInfoMask::HAS_LOCALIZED_TEXT;
        }
        if self.additional_info.is_some() {
            encoding_mask |= DiagnosticInfoMask::HAS_ADDITIONAL_INFO;
        }
        if self.inner_status_code.is_some() {
            encoding_mask |= DiagnosticInfoMask::HAS_INNER_STATUS_CODE;
        }
        if self.inner_diagnostic_info.is_some() {
            encoding_mask |= DiagnosticInfoMask::HAS_INNER_DIAGNOSTIC_INFO;
        }
        encoding_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn nested_round_trip() {
        let info = DiagnosticInfo {
            symbolic_id: Some(10),
            locale: Some(3),
            additional_info: Some("more detail".into()),
            inner_status_code: Some(StatusCode::BadNodeIdUnknown),
            inner_diagnostic_info: Some(Box::new(DiagnosticInfo {
                localized_text: Some(1),
                ..Default::default()
            })),
            ..Default::default()
        };
        let buf = info.encode_to_vec();
        let mut stream = Cursor::new(buf);
        let decoded = DiagnosticInfo::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn recursion_bounded() {
        let mut info = DiagnosticInfo::null();
        for _ in 0..64 {
            info = DiagnosticInfo {
                inner_diagnostic_info: Some(Box::new(info)),
                ..Default::default()
            };
        }
        let buf = info.encode_to_vec();
        let mut stream = Cursor::new(buf);
        assert!(DiagnosticInfo::decode(&mut stream, &DecodingOptions::test()).is_err());
    }
}
