// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Numeric node ids in the core namespace used by this stack. The full nodeset defines tens of
//! thousands of these, only the ones the client actually speaks are carried here.

use std::convert::TryFrom;

use crate::node_id::NodeId;

macro_rules! id_enum {
    ($name:ident, $doc:literal, { $($variant:ident = $value:literal),* $(,)? }) => {
        #[doc = $doc]
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        #[repr(u32)]
        pub enum $name {
            $(
                #[doc = stringify!($variant)]
                $variant = $value,
            )*
        }

        impl TryFrom<u32> for $name {
            type Error = ();

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Self::$variant), )*
                    _ => Err(()),
                }
            }
        }

        impl From<$name> for NodeId {
            fn from(value: $name) -> Self {
                NodeId::new(0, value as u32)
            }
        }
    };
}

id_enum!(ObjectId, "Object node ids, these are the binary encoding ids of the structures the stack can speak.", {
    Argument_Encoding_DefaultBinary = 298,
    UserTokenPolicy_Encoding_DefaultBinary = 306,
    ApplicationDescription_Encoding_DefaultBinary = 310,
    EndpointDescription_Encoding_DefaultBinary = 314,
    AnonymousIdentityToken_Encoding_DefaultBinary = 321,
    UserNameIdentityToken_Encoding_DefaultBinary = 324,
    X509IdentityToken_Encoding_DefaultBinary = 327,
    SignedSoftwareCertificate_Encoding_DefaultBinary = 346,
    RequestHeader_Encoding_DefaultBinary = 391,
    ResponseHeader_Encoding_DefaultBinary = 394,
    ServiceFault_Encoding_DefaultBinary = 397,
    FindServersRequest_Encoding_DefaultBinary = 422,
    FindServersResponse_Encoding_DefaultBinary = 425,
    GetEndpointsRequest_Encoding_DefaultBinary = 428,
    GetEndpointsResponse_Encoding_DefaultBinary = 431,
    ChannelSecurityToken_Encoding_DefaultBinary = 443,
    OpenSecureChannelRequest_Encoding_DefaultBinary = 446,
    OpenSecureChannelResponse_Encoding_DefaultBinary = 449,
    CloseSecureChannelRequest_Encoding_DefaultBinary = 452,
    CloseSecureChannelResponse_Encoding_DefaultBinary = 455,
    SignatureData_Encoding_DefaultBinary = 458,
    CreateSessionRequest_Encoding_DefaultBinary = 461,
    CreateSessionResponse_Encoding_DefaultBinary = 464,
    ActivateSessionRequest_Encoding_DefaultBinary = 467,
    ActivateSessionResponse_Encoding_DefaultBinary = 470,
    CloseSessionRequest_Encoding_DefaultBinary = 473,
    CloseSessionResponse_Encoding_DefaultBinary = 476,
    CancelRequest_Encoding_DefaultBinary = 479,
    CancelResponse_Encoding_DefaultBinary = 482,
    ContentFilterElement_Encoding_DefaultBinary = 585,
    ContentFilter_Encoding_DefaultBinary = 588,
    SimpleAttributeOperand_Encoding_DefaultBinary = 603,
    ReadValueId_Encoding_DefaultBinary = 628,
    ReadRequest_Encoding_DefaultBinary = 631,
    ReadResponse_Encoding_DefaultBinary = 634,
    WriteValue_Encoding_DefaultBinary = 670,
    WriteRequest_Encoding_DefaultBinary = 673,
    WriteResponse_Encoding_DefaultBinary = 676,
    CallMethodRequest_Encoding_DefaultBinary = 706,
    CallMethodResult_Encoding_DefaultBinary = 709,
    CallRequest_Encoding_DefaultBinary = 712,
    CallResponse_Encoding_DefaultBinary = 715,
    DataChangeFilter_Encoding_DefaultBinary = 724,
    EventFilter_Encoding_DefaultBinary = 727,
    MonitoringParameters_Encoding_DefaultBinary = 742,
    MonitoredItemCreateRequest_Encoding_DefaultBinary = 745,
    MonitoredItemCreateResult_Encoding_DefaultBinary = 748,
    CreateMonitoredItemsRequest_Encoding_DefaultBinary = 751,
    CreateMonitoredItemsResponse_Encoding_DefaultBinary = 754,
    MonitoredItemModifyRequest_Encoding_DefaultBinary = 757,
    MonitoredItemModifyResult_Encoding_DefaultBinary = 760,
    ModifyMonitoredItemsRequest_Encoding_DefaultBinary = 763,
    ModifyMonitoredItemsResponse_Encoding_DefaultBinary = 766,
    SetMonitoringModeRequest_Encoding_DefaultBinary = 769,
    SetMonitoringModeResponse_Encoding_DefaultBinary = 772,
    SetTriggeringRequest_Encoding_DefaultBinary = 775,
    SetTriggeringResponse_Encoding_DefaultBinary = 778,
    DeleteMonitoredItemsRequest_Encoding_DefaultBinary = 781,
    DeleteMonitoredItemsResponse_Encoding_DefaultBinary = 784,
    CreateSubscriptionRequest_Encoding_DefaultBinary = 787,
    CreateSubscriptionResponse_Encoding_DefaultBinary = 790,
    ModifySubscriptionRequest_Encoding_DefaultBinary = 793,
    ModifySubscriptionResponse_Encoding_DefaultBinary = 796,
    SetPublishingModeRequest_Encoding_DefaultBinary = 799,
    SetPublishingModeResponse_Encoding_DefaultBinary = 802,
    NotificationMessage_Encoding_DefaultBinary = 805,
    MonitoredItemNotification_Encoding_DefaultBinary = 808,
    DataChangeNotification_Encoding_DefaultBinary = 811,
    StatusChangeNotification_Encoding_DefaultBinary = 820,
    SubscriptionAcknowledgement_Encoding_DefaultBinary = 823,
    PublishRequest_Encoding_DefaultBinary = 826,
    PublishResponse_Encoding_DefaultBinary = 829,
    RepublishRequest_Encoding_DefaultBinary = 832,
    RepublishResponse_Encoding_DefaultBinary = 835,
    TransferResult_Encoding_DefaultBinary = 838,
    TransferSubscriptionsRequest_Encoding_DefaultBinary = 841,
    TransferSubscriptionsResponse_Encoding_DefaultBinary = 844,
    DeleteSubscriptionsRequest_Encoding_DefaultBinary = 847,
    DeleteSubscriptionsResponse_Encoding_DefaultBinary = 850,
    EventNotificationList_Encoding_DefaultBinary = 916,
    EventFieldList_Encoding_DefaultBinary = 919,
    IssuedIdentityToken_Encoding_DefaultBinary = 940,
});

id_enum!(DataTypeId, "Data type node ids of the structures the stack can speak.", {
    Argument = 296,
    UserTokenPolicy = 304,
    ApplicationDescription = 308,
    EndpointDescription = 312,
    AnonymousIdentityToken = 319,
    UserNameIdentityToken = 322,
    X509IdentityToken = 325,
    SignedSoftwareCertificate = 344,
    RequestHeader = 389,
    ResponseHeader = 392,
    ServiceFault = 395,
    FindServersRequest = 420,
    FindServersResponse = 423,
    GetEndpointsRequest = 426,
    GetEndpointsResponse = 429,
    ChannelSecurityToken = 441,
    OpenSecureChannelRequest = 444,
    OpenSecureChannelResponse = 447,
    CloseSecureChannelRequest = 450,
    CloseSecureChannelResponse = 453,
    SignatureData = 456,
    CreateSessionRequest = 459,
    CreateSessionResponse = 462,
    ActivateSessionRequest = 465,
    ActivateSessionResponse = 468,
    CloseSessionRequest = 471,
    CloseSessionResponse = 474,
    CancelRequest = 477,
    CancelResponse = 480,
    ContentFilterElement = 583,
    ContentFilter = 586,
    SimpleAttributeOperand = 601,
    ReadValueId = 626,
    ReadRequest = 629,
    ReadResponse = 632,
    WriteValue = 668,
    WriteRequest = 671,
    WriteResponse = 674,
    CallMethodRequest = 704,
    CallMethodResult = 707,
    CallRequest = 710,
    CallResponse = 713,
    DataChangeFilter = 722,
    EventFilter = 725,
    MonitoringParameters = 740,
    MonitoredItemCreateRequest = 743,
    MonitoredItemCreateResult = 746,
    CreateMonitoredItemsRequest = 749,
    CreateMonitoredItemsResponse = 752,
    MonitoredItemModifyRequest = 755,
    MonitoredItemModifyResult = 758,
    ModifyMonitoredItemsRequest = 761,
    ModifyMonitoredItemsResponse = 764,
    SetMonitoringModeRequest = 767,
    SetMonitoringModeResponse = 770,
    SetTriggeringRequest = 773,
    SetTriggeringResponse = 776,
    DeleteMonitoredItemsRequest = 779,
    DeleteMonitoredItemsResponse = 782,
    CreateSubscriptionRequest = 785,
    CreateSubscriptionResponse = 788,
    ModifySubscriptionRequest = 791,
    ModifySubscriptionResponse = 794,
    SetPublishingModeRequest = 797,
    SetPublishingModeResponse = 800,
    NotificationMessage = 803,
    MonitoredItemNotification = 806,
    DataChangeNotification = 809,
    StatusChangeNotification = 818,
    SubscriptionAcknowledgement = 821,
    PublishRequest = 824,
    PublishResponse = 827,
    RepublishRequest = 830,
    RepublishResponse = 833,
    TransferResult = 836,
    TransferSubscriptionsRequest = 839,
    TransferSubscriptionsResponse = 842,
    DeleteSubscriptionsRequest = 845,
    DeleteSubscriptionsResponse = 848,
    EventNotificationList = 914,
    EventFieldList = 917,
    IssuedIdentityToken = 938,
});

id_enum!(VariableId, "Variable node ids for well-known server variables.", {
    Server_NamespaceArray = 2255,
    Server_ServerArray = 2254,
    Server_ServerStatus = 2256,
    Server_ServerStatus_StartTime = 2257,
    Server_ServerStatus_CurrentTime = 2258,
    Server_ServerStatus_State = 2259,
});
