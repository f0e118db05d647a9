// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `ResponseHeader`.

use std::io::{Read, Write};

use crate::{
    basic_types::IntegerId,
    date_time::DateTime,
    diagnostic_info::DiagnosticInfo,
    encoding::{byte_len_array, BinaryDecodable, BinaryEncodable, EncodingResult},
    extension_object::ExtensionObject,
    message_info::MessageInfo,
    status_code::StatusCode,
    string::UAString,
    Context, DataTypeId, ObjectId,
};

/// The header carried by every service response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseHeader {
    /// The time the server sent the response.
    pub timestamp: DateTime,
    /// The request handle copied from the matching request.
    pub request_handle: IntegerId,
    /// The overall result of the service call.
    pub service_result: StatusCode,
    /// Diagnostics for the service as a whole.
    pub service_diagnostics: DiagnosticInfo,
    /// Strings referenced by index from the diagnostic infos in this response.
    pub string_table: Option<Vec<UAString>>,
    /// Reserved for protocol extensions.
    pub additional_header: ExtensionObject,
}

impl MessageInfo for ResponseHeader {
    fn type_id(&self) -> ObjectId {
        ObjectId::ResponseHeader_Encoding_DefaultBinary
    }

    fn data_type_id(&self) -> DataTypeId {
        DataTypeId::ResponseHeader
    }
}

impl BinaryEncodable for ResponseHeader {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        self.timestamp.byte_len(ctx)
            + self.request_handle.byte_len(ctx)
            + self.service_result.byte_len(ctx)
            + self.service_diagnostics.byte_len(ctx)
            + byte_len_array(&self.string_table, ctx)
            + self.additional_header.byte_len(ctx)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        self.timestamp.encode(stream, ctx)?;
        self.request_handle.encode(stream, ctx)?;
        self.service_result.encode(stream, ctx)?;
        self.service_diagnostics.encode(stream, ctx)?;
        self.string_table.encode(stream, ctx)?;
        self.additional_header.encode(stream, ctx)
    }
}

impl BinaryDecodable for ResponseHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        let timestamp = DateTime::decode(stream, ctx)?;
        let request_handle = IntegerId::decode(stream, ctx)?;
        let service_result = StatusCode::decode(stream, ctx)?;
        let service_diagnostics = DiagnosticInfo::decode(stream, ctx)?;
        let string_table = BinaryDecodable::decode(stream, ctx)?;
        let additional_header = ExtensionObject::decode(stream, ctx)?;
        Ok(ResponseHeader {
            timestamp,
            request_handle,
            service_result,
            service_diagnostics,
            string_table,
            additional_header,
        })
    }
}

impl ResponseHeader {
    /// Create a response header with the given request handle and result.
    pub fn new_service_result(
        request_handle: IntegerId,
        service_result: StatusCode,
    ) -> ResponseHeader {
        ResponseHeader {
            timestamp: DateTime::now(),
            request_handle,
            service_result,
            ..Default::default()
        }
    }
}
