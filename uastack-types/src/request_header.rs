// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `RequestHeader`.

use std::io::{Read, Write};

use crate::{
    basic_types::IntegerId,
    date_time::DateTime,
    encoding::{BinaryDecodable, BinaryEncodable, EncodingResult},
    extension_object::ExtensionObject,
    message_info::MessageInfo,
    node_id::NodeId,
    string::UAString,
    Context, DataTypeId, ObjectId,
};

bitflags::bitflags! {
    /// Mask of diagnostics requested in the request header.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct DiagnosticBits: u32 {
        /// Service level symbolic id.
        const SERVICE_LEVEL_SYMBOLIC_ID = 0x01;
        /// Service level localized text.
        const SERVICE_LEVEL_LOCALIZED_TEXT = 0x02;
        /// Service level additional info.
        const SERVICE_LEVEL_ADDITIONAL_INFO = 0x04;
        /// Service level inner status code.
        const SERVICE_LEVEL_INNER_STATUS_CODE = 0x08;
        /// Service level inner diagnostics.
        const SERVICE_LEVEL_INNER_DIAGNOSTICS = 0x10;
        /// Operation level symbolic id.
        const OPERATION_LEVEL_SYMBOLIC_ID = 0x20;
        /// Operation level localized text.
        const OPERATION_LEVEL_LOCALIZED_TEXT = 0x40;
        /// Operation level additional info.
        const OPERATION_LEVEL_ADDITIONAL_INFO = 0x80;
        /// Operation level inner status code.
        const OPERATION_LEVEL_INNER_STATUS_CODE = 0x100;
        /// Operation level inner diagnostics.
        const OPERATION_LEVEL_INNER_DIAGNOSTICS = 0x200;
    }
}

/// The header carried by every service request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestHeader {
    /// The session authentication token.
    pub authentication_token: NodeId,
    /// The time the request was sent.
    pub timestamp: DateTime,
    /// A client-assigned identifier, returned in the response header.
    pub request_handle: IntegerId,
    /// Bit mask of requested diagnostics.
    pub return_diagnostics: DiagnosticBits,
    /// Identifies the client's audit log entry associated with this request.
    pub audit_entry_id: UAString,
    /// Requested timeout in milliseconds. Servers may abandon requests that take longer.
    pub timeout_hint: u32,
    /// Reserved for protocol extensions.
    pub additional_header: ExtensionObject,
}

impl MessageInfo for RequestHeader {
    fn type_id(&self) -> ObjectId {
        ObjectId::RequestHeader_Encoding_DefaultBinary
    }

    fn data_type_id(&self) -> DataTypeId {
        DataTypeId::RequestHeader
    }
}

impl BinaryEncodable for RequestHeader {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        self.authentication_token.byte_len(ctx)
            + self.timestamp.byte_len(ctx)
            + self.request_handle.byte_len(ctx)
            + 4
            + self.audit_entry_id.byte_len(ctx)
            + self.timeout_hint.byte_len(ctx)
            + self.additional_header.byte_len(ctx)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        self.authentication_token.encode(stream, ctx)?;
        self.timestamp.encode(stream, ctx)?;
        self.request_handle.encode(stream, ctx)?;
        self.return_diagnostics.bits().encode(stream, ctx)?;
        self.audit_entry_id.encode(stream, ctx)?;
        self.timeout_hint.encode(stream, ctx)?;
        self.additional_header.encode(stream, ctx)
    }
}

impl BinaryDecodable for RequestHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        let authentication_token = NodeId::decode(stream, ctx)?;
        let timestamp = DateTime::decode(stream, ctx)?;
        let request_handle = IntegerId::decode(stream, ctx)?;
        let return_diagnostics = DiagnosticBits::from_bits_truncate(u32::decode(stream, ctx)?);
        let audit_entry_id = UAString::decode(stream, ctx)?;
        let timeout_hint = u32::decode(stream, ctx)?;
        let additional_header = ExtensionObject::decode(stream, ctx)?;
        Ok(RequestHeader {
            authentication_token,
            timestamp,
            request_handle,
            return_diagnostics,
            audit_entry_id,
            timeout_hint,
            additional_header,
        })
    }
}

impl RequestHeader {
    /// Create a new request header.
    pub fn new(
        authentication_token: &NodeId,
        timestamp: &DateTime,
        request_handle: IntegerId,
    ) -> RequestHeader {
        RequestHeader {
            authentication_token: authentication_token.clone(),
            timestamp: *timestamp,
            request_handle,
            return_diagnostics: DiagnosticBits::empty(),
            audit_entry_id: UAString::null(),
            timeout_hint: 0,
            additional_header: ExtensionObject::null(),
        }
    }

    /// A dummy header, used for the requests that carry no meaningful header content.
    pub fn dummy() -> RequestHeader {
        RequestHeader::new(&NodeId::null(), &DateTime::now(), 1)
    }
}
