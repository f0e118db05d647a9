// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Attribute services: Read and Write.

use super::ua_structure;
use crate::{
    AttributeId, DataValue, DiagnosticInfo, NodeId, QualifiedName, RequestHeader, ResponseHeader,
    StatusCode, TimestampsToReturn, UAString,
};

ua_structure! {
    /// Identifies an attribute of a node, and optionally a range within an array value.
    pub struct ReadValueId: ReadValueId_Encoding_DefaultBinary, ReadValueId {
        pub node_id: NodeId,
        pub attribute_id: u32,
        pub index_range: UAString,
        pub data_encoding: QualifiedName,
    }
}

impl ReadValueId {
    /// A read value id for the value attribute of the given node.
    pub fn value_of(node_id: impl Into<NodeId>) -> ReadValueId {
        ReadValueId {
            node_id: node_id.into(),
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            data_encoding: QualifiedName::null(),
        }
    }
}

impl From<NodeId> for ReadValueId {
    fn from(value: NodeId) -> Self {
        Self::value_of(value)
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.10.2/
    pub struct ReadRequest: ReadRequest_Encoding_DefaultBinary, ReadRequest {
        pub request_header: RequestHeader,
        pub max_age: f64,
        pub timestamps_to_return: TimestampsToReturn,
        pub nodes_to_read: Option<Vec<ReadValueId>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.10.2/
    pub struct ReadResponse: ReadResponse_Encoding_DefaultBinary, ReadResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<DataValue>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// A value to write to an attribute of a node.
    pub struct WriteValue: WriteValue_Encoding_DefaultBinary, WriteValue {
        pub node_id: NodeId,
        pub attribute_id: u32,
        pub index_range: UAString,
        pub value: DataValue,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.10.4/
    pub struct WriteRequest: WriteRequest_Encoding_DefaultBinary, WriteRequest {
        pub request_header: RequestHeader,
        pub nodes_to_write: Option<Vec<WriteValue>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.10.4/
    pub struct WriteResponse: WriteResponse_Encoding_DefaultBinary, WriteResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
