// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Discovery services: GetEndpoints and FindServers.

use super::{ua_structure, ApplicationDescription, EndpointDescription};
use crate::{RequestHeader, ResponseHeader, UAString};

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.4.4/
    pub struct GetEndpointsRequest: GetEndpointsRequest_Encoding_DefaultBinary, GetEndpointsRequest {
        pub request_header: RequestHeader,
        pub endpoint_url: UAString,
        pub locale_ids: Option<Vec<UAString>>,
        pub profile_uris: Option<Vec<UAString>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.4.4/
    pub struct GetEndpointsResponse: GetEndpointsResponse_Encoding_DefaultBinary, GetEndpointsResponse {
        pub response_header: ResponseHeader,
        pub endpoints: Option<Vec<EndpointDescription>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.4.2/
    pub struct FindServersRequest: FindServersRequest_Encoding_DefaultBinary, FindServersRequest {
        pub request_header: RequestHeader,
        pub endpoint_url: UAString,
        pub locale_ids: Option<Vec<UAString>>,
        pub server_uris: Option<Vec<UAString>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.4.2/
    pub struct FindServersResponse: FindServersResponse_Encoding_DefaultBinary, FindServersResponse {
        pub response_header: ResponseHeader,
        pub servers: Option<Vec<ApplicationDescription>>,
    }
}
