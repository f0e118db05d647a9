// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the [`StatusCode`] type, a packed 32 bit value defined by
//! OPC UA Part 4 and enumerated in Part 6 Annex A.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::encoding::{
    read_u32, write_u32, DecodingOptions, EncodingResult, SimpleBinaryDecodable,
    SimpleBinaryEncodable, UaNullable,
};

macro_rules! status_codes {
    ($($name:ident = $value:literal, $doc:literal;)*) => {
        impl StatusCode {
            $(
                #[doc = $doc]
                #[allow(non_upper_case_globals)]
                pub const $name: StatusCode = StatusCode($value);
            )*

            /// Get the symbolic name of this status code, sub-code only,
            /// or `None` for a code outside the known set.
            pub fn name(&self) -> Option<&'static str> {
                match self.0 & !Self::INFO_MASK {
                    $( $value => Some(stringify!($name)), )*
                    _ => None,
                }
            }
        }
    };
}

/// A 32 bit packed status code. The top two bits carry severity, bits 16-27
/// the sub-code, and the low half word structure/semantics-changed flags and
/// data value info bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(u32);

impl StatusCode {
    const SEVERITY_MASK: u32 = 0xc000_0000;
    const SEVERITY_GOOD: u32 = 0x0000_0000;
    const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;
    const SEVERITY_BAD: u32 = 0x8000_0000;

    const SUB_CODE_MASK: u32 = 0x0fff_0000;

    /// Flag set when the structure of the associated data value has changed.
    pub const STRUCTURE_CHANGED: u32 = 1 << 15;
    /// Flag set when the semantics of the associated data value have changed.
    pub const SEMANTICS_CHANGED: u32 = 1 << 14;

    const INFO_TYPE_DATA_VALUE: u32 = 1 << 10;
    const INFO_BITS_MASK: u32 = 0x0000_03ff;
    const OVERFLOW: u32 = 1 << 7;
    const INFO_MASK: u32 =
        Self::STRUCTURE_CHANGED | Self::SEMANTICS_CHANGED | (0x3 << 10) | Self::INFO_BITS_MASK;

    /// Build a status code from the raw 32 bit value.
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// The raw 32 bit value.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// The severity is good.
    pub const fn is_good(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == Self::SEVERITY_GOOD
    }

    /// The severity is uncertain.
    pub const fn is_uncertain(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == Self::SEVERITY_UNCERTAIN
    }

    /// The severity is bad.
    pub const fn is_bad(&self) -> bool {
        self.0 & Self::SEVERITY_BAD != 0
    }

    /// The sub-code, bits 16-27.
    pub const fn sub_code(&self) -> u32 {
        (self.0 & Self::SUB_CODE_MASK) >> 16
    }

    /// Structure-changed flag, bit 15.
    pub const fn structure_changed(&self) -> bool {
        self.0 & Self::STRUCTURE_CHANGED != 0
    }

    /// Semantics-changed flag, bit 14.
    pub const fn semantics_changed(&self) -> bool {
        self.0 & Self::SEMANTICS_CHANGED != 0
    }

    /// The overflow info bit. Only meaningful when the info type is DataValue.
    pub const fn overflow(&self) -> bool {
        self.0 & Self::INFO_TYPE_DATA_VALUE != 0 && self.0 & Self::OVERFLOW != 0
    }

    /// Return this code with the DataValue info type and the overflow bit set.
    pub const fn set_overflow(self, overflow: bool) -> Self {
        if overflow {
            Self(self.0 | Self::INFO_TYPE_DATA_VALUE | Self::OVERFLOW)
        } else {
            Self(self.0 & !(Self::INFO_TYPE_DATA_VALUE | Self::OVERFLOW))
        }
    }
}

impl UaNullable for StatusCode {
    fn is_ua_null(&self) -> bool {
        self.is_good()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "StatusCode({:#010x})", self.0),
        }
    }
}

impl std::error::Error for StatusCode {}

impl From<StatusCode> for u32 {
    fn from(value: StatusCode) -> Self {
        value.0
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        StatusCode(value)
    }
}

impl From<StatusCode> for std::io::Error {
    fn from(value: StatusCode) -> Self {
        std::io::Error::other(format!("StatusCode {}", value))
    }
}

impl SimpleBinaryEncodable for StatusCode {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.0)
    }
}

impl SimpleBinaryDecodable for StatusCode {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(StatusCode(read_u32(stream)?))
    }
}

status_codes! {
    Good = 0x0000_0000, "The operation succeeded.";
    GoodSubscriptionTransferred = 0x002d_0000, "The subscription was transferred to another session.";
    GoodCompletesAsynchronously = 0x002e_0000, "The processing will complete asynchronously.";
    GoodOverload = 0x002f_0000, "Sampling has slowed down due to resource limitations.";
    GoodClamped = 0x0030_0000, "The value written was accepted but was clamped.";
    Uncertain = 0x4000_0000, "The operation result is uncertain.";
    UncertainLastUsableValue = 0x4090_0000, "Whatever was updating this value has stopped doing so.";
    Bad = 0x8000_0000, "The operation failed.";
    BadUnexpectedError = 0x8001_0000, "An unexpected error occurred.";
    BadInternalError = 0x8002_0000, "An internal error occurred as a result of a programming or configuration error.";
    BadOutOfMemory = 0x8003_0000, "Not enough memory to complete the operation.";
    BadResourceUnavailable = 0x8004_0000, "An operating system resource is not available.";
    BadCommunicationError = 0x8005_0000, "A low level communication error occurred.";
    BadEncodingError = 0x8006_0000, "Encoding halted because of invalid data in the objects being serialized.";
    BadDecodingError = 0x8007_0000, "Decoding halted because of invalid data in the stream.";
    BadEncodingLimitsExceeded = 0x8008_0000, "The message encoding/decoding limits imposed by the stack have been exceeded.";
    BadUnknownResponse = 0x8009_0000, "An unrecognized response was received from the server.";
    BadTimeout = 0x800a_0000, "The operation timed out.";
    BadServiceUnsupported = 0x800b_0000, "The server does not support the requested service.";
    BadShutdown = 0x800c_0000, "The operation was cancelled because the application is shutting down.";
    BadServerNotConnected = 0x800d_0000, "The operation could not complete because the client is not connected to the server.";
    BadServerHalted = 0x800e_0000, "The server has stopped and cannot process any requests.";
    BadNothingToDo = 0x800f_0000, "No processing could be done because there was nothing to do.";
    BadTooManyOperations = 0x8010_0000, "The request could not be processed because it specified too many operations.";
    BadDataTypeIdUnknown = 0x8011_0000, "The data type is not supported by the server.";
    BadCertificateInvalid = 0x8012_0000, "The certificate provided as a parameter is not valid.";
    BadSecurityChecksFailed = 0x8013_0000, "An error occurred verifying security.";
    BadCertificateTimeInvalid = 0x8014_0000, "The certificate has expired or is not yet valid.";
    BadCertificateIssuerTimeInvalid = 0x8015_0000, "An issuer certificate has expired or is not yet valid.";
    BadCertificateHostNameInvalid = 0x8016_0000, "The HostName used to connect to a server does not match a HostName in the certificate.";
    BadCertificateUriInvalid = 0x8017_0000, "The URI specified in the ApplicationDescription does not match the URI in the certificate.";
    BadCertificateUseNotAllowed = 0x8018_0000, "The certificate may not be used for the requested operation.";
    BadCertificateIssuerUseNotAllowed = 0x8019_0000, "The issuer certificate may not be used for the requested operation.";
    BadCertificateUntrusted = 0x801a_0000, "The certificate is not trusted.";
    BadCertificateRevocationUnknown = 0x801b_0000, "It was not possible to determine if the certificate has been revoked.";
    BadCertificateIssuerRevocationUnknown = 0x801c_0000, "It was not possible to determine if the issuer certificate has been revoked.";
    BadCertificateRevoked = 0x801d_0000, "The certificate has been revoked.";
    BadCertificateIssuerRevoked = 0x801e_0000, "The issuer certificate has been revoked.";
    BadUserAccessDenied = 0x801f_0000, "User does not have permission to perform the requested operation.";
    BadIdentityTokenInvalid = 0x8020_0000, "The user identity token is not valid.";
    BadIdentityTokenRejected = 0x8021_0000, "The user identity token is valid but the server has rejected it.";
    BadSecureChannelIdInvalid = 0x8022_0000, "The specified secure channel is no longer valid.";
    BadInvalidTimestamp = 0x8023_0000, "The timestamp is outside the range allowed by the server.";
    BadNonceInvalid = 0x8024_0000, "The nonce does appear to be not a random value or it is not the correct length.";
    BadSessionIdInvalid = 0x8025_0000, "The session id is not valid.";
    BadSessionClosed = 0x8026_0000, "The session was closed by the client.";
    BadSessionNotActivated = 0x8027_0000, "The session cannot be used because ActivateSession has not been called.";
    BadSubscriptionIdInvalid = 0x8028_0000, "The subscription id is not valid.";
    BadRequestHeaderInvalid = 0x802a_0000, "The header for the request is missing or invalid.";
    BadTimestampsToReturnInvalid = 0x802b_0000, "The timestamps to return parameter is invalid.";
    BadRequestCancelledByClient = 0x802c_0000, "The request was cancelled by the client.";
    BadNoCommunication = 0x8031_0000, "Communication with the data source is defined, but not established, and there is no last known value available.";
    BadWaitingForInitialData = 0x8032_0000, "Waiting for the server to obtain values from the underlying data source.";
    BadNodeIdInvalid = 0x8033_0000, "The syntax of the node id is not valid.";
    BadNodeIdUnknown = 0x8034_0000, "The node id refers to a node that does not exist in the server address space.";
    BadAttributeIdInvalid = 0x8035_0000, "The attribute is not supported for the specified Node.";
    BadIndexRangeInvalid = 0x8036_0000, "The syntax of the index range parameter is invalid.";
    BadIndexRangeNoData = 0x8037_0000, "No data exists within the range of indexes specified.";
    BadDataEncodingInvalid = 0x8038_0000, "The data encoding is invalid.";
    BadDataEncodingUnsupported = 0x8039_0000, "The server does not support the requested data encoding for the node.";
    BadNotReadable = 0x803a_0000, "The access level does not allow reading or subscribing to the Node.";
    BadNotWritable = 0x803b_0000, "The access level does not allow writing to the Node.";
    BadOutOfRange = 0x803c_0000, "The value was out of range.";
    BadNotSupported = 0x803d_0000, "The requested operation is not supported.";
    BadNotFound = 0x803e_0000, "A requested item was not found or a search operation ended without success.";
    BadMonitoredItemIdInvalid = 0x8042_0000, "The monitoring item id does not refer to a valid monitored item.";
    BadMonitoredItemFilterInvalid = 0x8043_0000, "The monitored item filter parameter is not valid.";
    BadMonitoredItemFilterUnsupported = 0x8044_0000, "The server does not support the requested monitored item filter.";
    BadFilterNotAllowed = 0x8045_0000, "A monitoring filter cannot be used in combination with the attribute specified.";
    BadStructureMissing = 0x8046_0000, "A mandatory structured parameter was missing or null.";
    BadEventFilterInvalid = 0x8047_0000, "The event filter is not valid.";
    BadContentFilterInvalid = 0x8048_0000, "The content filter is not valid.";
    BadServerUriInvalid = 0x8050_0000, "The ServerUri is not a valid URI.";
    BadServerNameMissing = 0x8051_0000, "No ServerName was specified.";
    BadDiscoveryUrlMissing = 0x8052_0000, "No DiscoveryUrl was specified.";
    BadSempahoreFileMissing = 0x8053_0000, "The semaphore file specified by the client is not valid.";
    BadRequestTypeInvalid = 0x8054_0000, "The security token request type is not valid.";
    BadSecurityModeRejected = 0x8055_0000, "The security mode does not meet the requirements set by the server.";
    BadSecurityPolicyRejected = 0x8056_0000, "The security policy does not meet the requirements set by the server.";
    BadTooManySessions = 0x8057_0000, "The server has reached its maximum number of sessions.";
    BadUserSignatureInvalid = 0x8058_0000, "The user token signature is missing or invalid.";
    BadApplicationSignatureInvalid = 0x8059_0000, "The signature generated with the client certificate is missing or invalid.";
    BadNoValidCertificates = 0x805a_0000, "The client did not provide at least one software certificate that is valid and meets the profile requirements for the server.";
    BadIdentityChangeNotSupported = 0x805b_0000, "The server does not support changing the user identity assigned to the session.";
    BadRequestCancelledByRequest = 0x805c_0000, "The request was cancelled by the client with the Cancel service.";
    BadTypeMismatch = 0x8074_0000, "The value supplied for the attribute is not of the same type as the attribute's value.";
    BadMethodInvalid = 0x8075_0000, "The method id does not refer to a method for the specified object.";
    BadArgumentsMissing = 0x8076_0000, "The client did not specify all of the input arguments for the method.";
    BadTooManySubscriptions = 0x8077_0000, "The server has reached its maximum number of subscriptions.";
    BadTooManyPublishRequests = 0x8078_0000, "The server has reached the maximum number of queued publish requests.";
    BadNoSubscription = 0x8079_0000, "There is no subscription available for this session.";
    BadSequenceNumberUnknown = 0x807a_0000, "The sequence number is unknown to the server.";
    BadMessageNotAvailable = 0x807b_0000, "The requested notification message is no longer available.";
    BadInsufficientClientProfile = 0x807c_0000, "The client of the current session does not support one or more Profiles that are necessary for the subscription.";
    BadTcpServerTooBusy = 0x807d_0000, "The server cannot process the request because it is too busy.";
    BadTcpMessageTypeInvalid = 0x807e_0000, "The type of the message specified in the header invalid.";
    BadTcpSecureChannelUnknown = 0x807f_0000, "The SecureChannelId and/or TokenId are not currently in use.";
    BadTcpMessageTooLarge = 0x8080_0000, "The size of the message chunk specified in the header is too large.";
    BadTcpNotEnoughResources = 0x8081_0000, "There are not enough resources to process the request.";
    BadTcpInternalError = 0x8082_0000, "An internal error occurred.";
    BadTcpEndpointUrlInvalid = 0x8083_0000, "The server does not recognize the QueryString specified.";
    BadRequestInterrupted = 0x8084_0000, "The request could not be sent because of a network interruption.";
    BadRequestTimeout = 0x8085_0000, "Timeout occurred while processing the request.";
    BadSecureChannelClosed = 0x8086_0000, "The secure channel has been closed.";
    BadSecureChannelTokenUnknown = 0x8087_0000, "The token has expired or is not recognized.";
    BadSequenceNumberInvalid = 0x8088_0000, "The sequence number is not valid.";
    BadConfigurationError = 0x8089_0000, "There is a problem with the configuration that affects the usefulness of the value.";
    BadNotConnected = 0x808a_0000, "The variable should receive its value from another variable, but has never been configured to do so.";
    BadDeviceFailure = 0x808b_0000, "There has been a failure in the device/data source that generates the value that has affected the value.";
    BadSensorFailure = 0x808c_0000, "There has been a failure in the sensor from which the value is derived by the device/data source.";
    BadOutOfService = 0x808d_0000, "The source of the data is not operational.";
    BadDeadbandFilterInvalid = 0x808e_0000, "The deadband filter is not valid.";
    BadInvalidArgument = 0x80ab_0000, "One or more arguments are invalid.";
    BadConnectionRejected = 0x80ac_0000, "Could not establish a network connection to remote server.";
    BadDisconnect = 0x80ad_0000, "The server has disconnected from the client.";
    BadConnectionClosed = 0x80ae_0000, "The network connection has been closed.";
    BadInvalidState = 0x80af_0000, "The operation cannot be completed because the object is closed, uninitialized or in some other invalid state.";
    BadEndOfStream = 0x80b0_0000, "Cannot move beyond end of the stream.";
    BadMaxConnectionsReached = 0x80b7_0000, "The operation could not be finished because all available connections are in use.";
    BadRequestTooLarge = 0x80b8_0000, "The request message size exceeds limits set by the server.";
    BadResponseTooLarge = 0x80b9_0000, "The response message size exceeds limits set by the client.";
    BadProtocolVersionUnsupported = 0x80be_0000, "The applications do not have compatible protocol versions.";
}

#[cfg(test)]
mod tests {
    use super::StatusCode;

    #[test]
    fn severity() {
        assert!(StatusCode::Good.is_good());
        assert!(!StatusCode::Good.is_bad());
        assert!(StatusCode::UncertainLastUsableValue.is_uncertain());
        assert!(StatusCode::BadTimeout.is_bad());
        assert!(!StatusCode::BadTimeout.is_good());
    }

    #[test]
    fn info_bits() {
        let code = StatusCode::Good.set_overflow(true);
        assert!(code.overflow());
        assert!(code.is_good());
        assert_eq!(code.name(), Some("Good"));
        let code = code.set_overflow(false);
        assert!(!code.overflow());
        assert_eq!(code, StatusCode::Good);
    }

    #[test]
    fn sub_code() {
        assert_eq!(StatusCode::BadTimeout.sub_code(), 0xa);
        assert_eq!(
            StatusCode::from_raw(StatusCode::BadUnexpectedError.bits() | StatusCode::STRUCTURE_CHANGED)
                .name(),
            Some("BadUnexpectedError")
        );
    }
}
