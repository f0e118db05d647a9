// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Enumerations from the core namespace used by the services this stack speaks.
//! Enumerations are signed 32 bit values on the wire.

use std::io::{Read, Write};

use crate::encoding::{
    read_i32, write_i32, DecodingOptions, EncodingResult, Error, SimpleBinaryDecodable,
    SimpleBinaryEncodable, UaNullable,
};

macro_rules! ua_enum {
    ($name:ident, $doc:literal, $default:ident, { $($(#[doc = $vdoc:literal])? $variant:ident = $value:literal),* $(,)? }) => {
        #[doc = $doc]
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $(
                $(#[doc = $vdoc])?
                #[doc = stringify!($variant)]
                $variant = $value,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl $name {
            #[doc = concat!("Parse a ", stringify!($name), " from the raw enum value.")]
            pub fn try_from_i32(value: i32) -> EncodingResult<Self> {
                match value {
                    $( $value => Ok(Self::$variant), )*
                    _ => Err(Error::decoding(format!(
                        concat!("Invalid ", stringify!($name), " value {}"), value
                    ))),
                }
            }
        }

        impl UaNullable for $name {
            fn is_ua_null(&self) -> bool {
                *self == Self::$default
            }
        }

        impl SimpleBinaryEncodable for $name {
            fn byte_len(&self) -> usize {
                4
            }

            fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
                write_i32(stream, *self as i32)
            }
        }

        impl SimpleBinaryDecodable for $name {
            fn decode<S: Read + ?Sized>(
                stream: &mut S,
                _: &DecodingOptions,
            ) -> EncodingResult<Self> {
                Self::try_from_i32(read_i32(stream)?)
            }
        }
    };
}

ua_enum!(MessageSecurityMode, "The security applied to messages on a secure channel.", Invalid, {
    Invalid = 0,
    None = 1,
    Sign = 2,
    SignAndEncrypt = 3,
});

impl From<MessageSecurityMode> for crate::string::UAString {
    fn from(value: MessageSecurityMode) -> Self {
        match value {
            MessageSecurityMode::None => "None".into(),
            MessageSecurityMode::Sign => "Sign".into(),
            MessageSecurityMode::SignAndEncrypt => "SignAndEncrypt".into(),
            MessageSecurityMode::Invalid => "".into(),
        }
    }
}

impl From<&str> for MessageSecurityMode {
    fn from(value: &str) -> Self {
        match value {
            "None" => MessageSecurityMode::None,
            "Sign" => MessageSecurityMode::Sign,
            "SignAndEncrypt" => MessageSecurityMode::SignAndEncrypt,
            _ => MessageSecurityMode::Invalid,
        }
    }
}

ua_enum!(UserTokenType, "The kind of a user identity token.", Anonymous, {
    Anonymous = 0,
    UserName = 1,
    Certificate = 2,
    IssuedToken = 3,
});

ua_enum!(ApplicationType, "The kind of OPC UA application.", Server, {
    Server = 0,
    Client = 1,
    ClientAndServer = 2,
    DiscoveryServer = 3,
});

ua_enum!(SecurityTokenRequestType, "Whether an OpenSecureChannel request issues a new token or renews an existing one.", Issue, {
    Issue = 0,
    Renew = 1,
});

ua_enum!(TimestampsToReturn, "Which timestamps the server should return on reads and in notifications.", Source, {
    Source = 0,
    Server = 1,
    Both = 2,
    Neither = 3,
    Invalid = 4,
});

ua_enum!(MonitoringMode, "The monitoring mode of a monitored item.", Disabled, {
    Disabled = 0,
    Sampling = 1,
    Reporting = 2,
});

ua_enum!(ServerState, "The running state of a server, from the Server_ServerStatus_State variable.", Unknown, {
    Running = 0,
    Failed = 1,
    NoConfiguration = 2,
    Suspended = 3,
    Shutdown = 4,
    Test = 5,
    CommunicationFault = 6,
    Unknown = 7,
});

ua_enum!(FilterOperator, "Operators for content filter elements.", Equals, {
    Equals = 0,
    IsNull = 1,
    GreaterThan = 2,
    LessThan = 3,
    GreaterThanOrEqual = 4,
    LessThanOrEqual = 5,
    Like = 6,
    Not = 7,
    Between = 8,
    InList = 9,
    And = 10,
    Or = 11,
    Cast = 12,
    InView = 13,
    OfType = 14,
    RelatedTo = 15,
    BitwiseAnd = 16,
    BitwiseOr = 17,
});

ua_enum!(DataChangeTrigger, "What changes to a value trigger a data change notification.", StatusValue, {
    Status = 0,
    StatusValue = 1,
    StatusValueTimestamp = 2,
});

/// Attribute ids of node attributes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AttributeId {
    /// The node's node id.
    NodeId = 1,
    /// The node's class.
    NodeClass = 2,
    /// The node's browse name.
    BrowseName = 3,
    /// The node's display name.
    DisplayName = 4,
    /// The node's description.
    Description = 5,
    /// The node's write mask.
    WriteMask = 6,
    /// The node's user write mask.
    UserWriteMask = 7,
    /// Whether a type is abstract.
    IsAbstract = 8,
    /// Whether a reference type is symmetric.
    Symmetric = 9,
    /// The inverse name of a reference type.
    InverseName = 10,
    /// Whether a view contains loops.
    ContainsNoLoops = 11,
    /// The event notifier of an object or view.
    EventNotifier = 12,
    /// The value of a variable.
    Value = 13,
    /// The data type of a variable.
    DataType = 14,
    /// The value rank of a variable.
    ValueRank = 15,
    /// The array dimensions of a variable.
    ArrayDimensions = 16,
    /// The access level of a variable.
    AccessLevel = 17,
    /// The user access level of a variable.
    UserAccessLevel = 18,
    /// The minimum sampling interval of a variable.
    MinimumSamplingInterval = 19,
    /// Whether a variable is historizing.
    Historizing = 20,
    /// Whether a method is executable.
    Executable = 21,
    /// Whether a method is executable by the current user.
    UserExecutable = 22,
}

/// A numeric identifier repeated in a response to correlate it with its request.
pub type IntegerId = u32;
