// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! The Call service.

use super::ua_structure;
use crate::{DiagnosticInfo, NodeId, RequestHeader, ResponseHeader, StatusCode, Variant};

ua_structure! {
    /// A single method invocation: the object, the method, and its input arguments.
    pub struct CallMethodRequest: CallMethodRequest_Encoding_DefaultBinary, CallMethodRequest {
        pub object_id: NodeId,
        pub method_id: NodeId,
        pub input_arguments: Option<Vec<Variant>>,
    }
}

ua_structure! {
    /// The result of a single method invocation.
    pub struct CallMethodResult: CallMethodResult_Encoding_DefaultBinary, CallMethodResult {
        pub status_code: StatusCode,
        pub input_argument_results: Option<Vec<StatusCode>>,
        pub input_argument_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
        pub output_arguments: Option<Vec<Variant>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.11.2/
    pub struct CallRequest: CallRequest_Encoding_DefaultBinary, CallRequest {
        pub request_header: RequestHeader,
        pub methods_to_call: Option<Vec<CallMethodRequest>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.11.2/
    pub struct CallResponse: CallResponse_Encoding_DefaultBinary, CallResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<CallMethodResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
