// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! OpenSecureChannel and CloseSecureChannel.

use super::{ua_structure, ChannelSecurityToken};
use crate::{
    ByteString, MessageSecurityMode, RequestHeader, ResponseHeader, SecurityTokenRequestType,
};

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.5.2/
    pub struct OpenSecureChannelRequest: OpenSecureChannelRequest_Encoding_DefaultBinary, OpenSecureChannelRequest {
        pub request_header: RequestHeader,
        pub client_protocol_version: u32,
        pub request_type: SecurityTokenRequestType,
        pub security_mode: MessageSecurityMode,
        pub client_nonce: ByteString,
        pub requested_lifetime: u32,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.5.2/
    pub struct OpenSecureChannelResponse: OpenSecureChannelResponse_Encoding_DefaultBinary, OpenSecureChannelResponse {
        pub response_header: ResponseHeader,
        pub server_protocol_version: u32,
        pub security_token: ChannelSecurityToken,
        pub server_nonce: ByteString,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.5.3/
    pub struct CloseSecureChannelRequest: CloseSecureChannelRequest_Encoding_DefaultBinary, CloseSecureChannelRequest {
        pub request_header: RequestHeader,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.5.3/
    pub struct CloseSecureChannelResponse: CloseSecureChannelResponse_Encoding_DefaultBinary, CloseSecureChannelResponse {
        pub response_header: ResponseHeader,
    }
}
