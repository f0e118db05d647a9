// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Session services and the user identity tokens.

use super::{
    ua_structure, ApplicationDescription, EndpointDescription, SignatureData,
    SignedSoftwareCertificate,
};
use crate::{
    ByteString, DiagnosticInfo, ExtensionObject, IntegerId, NodeId, RequestHeader, ResponseHeader,
    StatusCode, UAString,
};

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.6.2/
    pub struct CreateSessionRequest: CreateSessionRequest_Encoding_DefaultBinary, CreateSessionRequest {
        pub request_header: RequestHeader,
        pub client_description: ApplicationDescription,
        pub server_uri: UAString,
        pub endpoint_url: UAString,
        pub session_name: UAString,
        pub client_nonce: ByteString,
        pub client_certificate: ByteString,
        pub requested_session_timeout: f64,
        pub max_response_message_size: u32,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.6.2/
    pub struct CreateSessionResponse: CreateSessionResponse_Encoding_DefaultBinary, CreateSessionResponse {
        pub response_header: ResponseHeader,
        pub session_id: NodeId,
        pub authentication_token: NodeId,
        pub revised_session_timeout: f64,
        pub server_nonce: ByteString,
        pub server_certificate: ByteString,
        pub server_endpoints: Option<Vec<EndpointDescription>>,
        pub server_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        pub server_signature: SignatureData,
        pub max_request_message_size: u32,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.6.3/
    pub struct ActivateSessionRequest: ActivateSessionRequest_Encoding_DefaultBinary, ActivateSessionRequest {
        pub request_header: RequestHeader,
        pub client_signature: SignatureData,
        pub client_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        pub locale_ids: Option<Vec<UAString>>,
        pub user_identity_token: ExtensionObject,
        pub user_token_signature: SignatureData,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.6.3/
    pub struct ActivateSessionResponse: ActivateSessionResponse_Encoding_DefaultBinary, ActivateSessionResponse {
        pub response_header: ResponseHeader,
        pub server_nonce: ByteString,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.6.4/
    pub struct CloseSessionRequest: CloseSessionRequest_Encoding_DefaultBinary, CloseSessionRequest {
        pub request_header: RequestHeader,
        pub delete_subscriptions: bool,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.6.4/
    pub struct CloseSessionResponse: CloseSessionResponse_Encoding_DefaultBinary, CloseSessionResponse {
        pub response_header: ResponseHeader,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.6.5/
    pub struct CancelRequest: CancelRequest_Encoding_DefaultBinary, CancelRequest {
        pub request_header: RequestHeader,
        pub request_handle: IntegerId,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.6.5/
    pub struct CancelResponse: CancelResponse_Encoding_DefaultBinary, CancelResponse {
        pub response_header: ResponseHeader,
        pub cancel_count: u32,
    }
}

ua_structure! {
    /// An identity token for an unauthenticated user.
    pub struct AnonymousIdentityToken: AnonymousIdentityToken_Encoding_DefaultBinary, AnonymousIdentityToken {
        pub policy_id: UAString,
    }
}

ua_structure! {
    /// An identity token carrying a user name and a password, the password encrypted with
    /// the server's public key unless the user token security policy is None.
    pub struct UserNameIdentityToken: UserNameIdentityToken_Encoding_DefaultBinary, UserNameIdentityToken {
        pub policy_id: UAString,
        pub user_name: UAString,
        pub password: ByteString,
        pub encryption_algorithm: UAString,
    }
}

ua_structure! {
    /// An identity token proving the identity through an X.509 certificate. The proof of
    /// possession travels separately as the user token signature.
    pub struct X509IdentityToken: X509IdentityToken_Encoding_DefaultBinary, X509IdentityToken {
        pub policy_id: UAString,
        pub certificate_data: ByteString,
    }
}

ua_structure! {
    /// An identity token issued by an external authority, carried opaquely.
    pub struct IssuedIdentityToken: IssuedIdentityToken_Encoding_DefaultBinary, IssuedIdentityToken {
        pub policy_id: UAString,
        pub token_data: ByteString,
        pub encryption_algorithm: UAString,
    }
}
