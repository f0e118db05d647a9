// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Structures shared between multiple services.

use super::ua_structure;
use crate::{
    ApplicationType, ByteString, DateTime, LocalizedText, MessageSecurityMode, NodeId,
    ResponseHeader, UAString, UserTokenType,
};

ua_structure! {
    /// Describes an OPC UA application, client or server.
    pub struct ApplicationDescription: ApplicationDescription_Encoding_DefaultBinary, ApplicationDescription {
        pub application_uri: UAString,
        pub product_uri: UAString,
        pub application_name: LocalizedText,
        pub application_type: ApplicationType,
        pub gateway_server_uri: UAString,
        pub discovery_profile_uri: UAString,
        pub discovery_urls: Option<Vec<UAString>>,
    }
}

ua_structure! {
    /// A user identity token type accepted by an endpoint, and the security policy applied
    /// to tokens of that type.
    pub struct UserTokenPolicy: UserTokenPolicy_Encoding_DefaultBinary, UserTokenPolicy {
        pub policy_id: UAString,
        pub token_type: UserTokenType,
        pub issued_token_type: UAString,
        pub issuer_endpoint_url: UAString,
        pub security_policy_uri: UAString,
    }
}

ua_structure! {
    /// An endpoint advertised by a server: URL, security settings and accepted identities.
    pub struct EndpointDescription: EndpointDescription_Encoding_DefaultBinary, EndpointDescription {
        pub endpoint_url: UAString,
        pub server: ApplicationDescription,
        pub server_certificate: ByteString,
        pub security_mode: MessageSecurityMode,
        pub security_policy_uri: UAString,
        pub user_identity_tokens: Option<Vec<UserTokenPolicy>>,
        pub transport_profile_uri: UAString,
        pub security_level: u8,
    }
}

impl EndpointDescription {
    /// Find the user token policy for the given token type, if the endpoint supports it.
    pub fn find_policy(&self, token_type: UserTokenType) -> Option<&UserTokenPolicy> {
        self.user_identity_tokens
            .as_ref()
            .and_then(|tokens| tokens.iter().find(|t| t.token_type == token_type))
    }

    /// Find the user token policy with the given id.
    pub fn find_policy_by_id(&self, policy_id: &str) -> Option<&UserTokenPolicy> {
        self.user_identity_tokens
            .as_ref()
            .and_then(|tokens| tokens.iter().find(|t| t.policy_id.as_ref() == policy_id))
    }
}

/// A convenience conversion from a tuple of (url, policy uri, mode), primarily for tests
/// and for connecting to an endpoint whose certificate is fetched by discovery.
impl<'a> From<(&'a str, &'a str, MessageSecurityMode)> for EndpointDescription {
    fn from(v: (&'a str, &'a str, MessageSecurityMode)) -> Self {
        EndpointDescription {
            endpoint_url: v.0.into(),
            security_policy_uri: v.1.into(),
            security_mode: v.2,
            ..Default::default()
        }
    }
}

ua_structure! {
    /// A digital signature and the algorithm that produced it.
    pub struct SignatureData: SignatureData_Encoding_DefaultBinary, SignatureData {
        pub algorithm: UAString,
        pub signature: ByteString,
    }
}

impl SignatureData {
    /// An empty signature.
    pub fn null() -> SignatureData {
        SignatureData::default()
    }
}

ua_structure! {
    /// A software certificate with a signature.
    pub struct SignedSoftwareCertificate: SignedSoftwareCertificate_Encoding_DefaultBinary, SignedSoftwareCertificate {
        pub certificate_data: ByteString,
        pub signature: ByteString,
    }
}

ua_structure! {
    /// The security token of a secure channel, issued and renewed by OpenSecureChannel.
    pub struct ChannelSecurityToken: ChannelSecurityToken_Encoding_DefaultBinary, ChannelSecurityToken {
        pub channel_id: u32,
        pub token_id: u32,
        pub created_at: DateTime,
        pub revised_lifetime: u32,
    }
}

ua_structure! {
    /// The response sent when a service call fails as a whole.
    pub struct ServiceFault: ServiceFault_Encoding_DefaultBinary, ServiceFault {
        pub response_header: ResponseHeader,
    }
}

ua_structure! {
    /// A method argument description.
    pub struct Argument: Argument_Encoding_DefaultBinary, Argument {
        pub name: UAString,
        pub data_type: NodeId,
        pub value_rank: i32,
        pub array_dimensions: Option<Vec<u32>>,
        pub description: LocalizedText,
    }
}
