// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

use super::serialize_test;
use crate::{
    ApplicationDescription, ApplicationType, AttributeId, ByteString, DataValue, DateTime,
    EndpointDescription, ExtensionObject, LocalizedText, MessageSecurityMode,
    MonitoredItemNotification, DataChangeNotification, NodeId, NotificationMessage, PublishRequest,
    PublishResponse, ReadRequest, ReadValueId, RequestHeader, ResponseHeader, StatusCode,
    SubscriptionAcknowledgement, TimestampsToReturn, UAString, UserNameIdentityToken,
    UserTokenPolicy, UserTokenType, VariableId, Variant,
};

fn request_header() -> RequestHeader {
    RequestHeader {
        authentication_token: NodeId::new(0, ByteString::from(&[1u8; 16])),
        timestamp: DateTime::from_ticks(300_000_000),
        request_handle: 77,
        timeout_hint: 15_000,
        ..Default::default()
    }
}

#[test]
fn read_request() {
    serialize_test(ReadRequest {
        request_header: request_header(),
        max_age: 0.0,
        timestamps_to_return: TimestampsToReturn::Both,
        nodes_to_read: Some(vec![ReadValueId {
            node_id: VariableId::Server_ServerStatus_CurrentTime.into(),
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            data_encoding: Default::default(),
        }]),
    });
}

#[test]
fn endpoint_description() {
    serialize_test(EndpointDescription {
        endpoint_url: "opc.tcp://localhost:4840".into(),
        server: ApplicationDescription {
            application_uri: "urn:server".into(),
            product_uri: "urn:product".into(),
            application_name: LocalizedText::new("en", "server"),
            application_type: ApplicationType::Server,
            gateway_server_uri: UAString::null(),
            discovery_profile_uri: UAString::null(),
            discovery_urls: Some(vec!["opc.tcp://localhost:4840".into()]),
        },
        server_certificate: ByteString::from(&[5u8; 32]),
        security_mode: MessageSecurityMode::SignAndEncrypt,
        security_policy_uri: "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256".into(),
        user_identity_tokens: Some(vec![UserTokenPolicy {
            policy_id: "username".into(),
            token_type: UserTokenType::UserName,
            issued_token_type: UAString::null(),
            issuer_endpoint_url: UAString::null(),
            security_policy_uri: UAString::null(),
        }]),
        transport_profile_uri: "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary"
            .into(),
        security_level: 3,
    });
}

#[test]
fn identity_token_in_extension_object() {
    let token = UserNameIdentityToken {
        policy_id: "username".into(),
        user_name: "operator".into(),
        password: ByteString::from(&[1u8, 2, 3]),
        encryption_algorithm: "http://www.w3.org/2001/04/xmlenc#rsa-oaep".into(),
    };
    serialize_test(ExtensionObject::from_message(token));
}

#[test]
fn publish_round_trip_with_notifications() {
    serialize_test(PublishRequest {
        request_header: request_header(),
        subscription_acknowledgements: Some(vec![
            SubscriptionAcknowledgement {
                subscription_id: 1,
                sequence_number: 4,
            },
            SubscriptionAcknowledgement {
                subscription_id: 1,
                sequence_number: 5,
            },
        ]),
    });

    let notification = DataChangeNotification {
        monitored_items: Some(vec![MonitoredItemNotification {
            client_handle: 9,
            value: DataValue {
                value: Some(Variant::from(88u16)),
                source_timestamp: Some(DateTime::from_ticks(10_000_000)),
                ..Default::default()
            },
        }]),
        diagnostic_infos: None,
    };
    serialize_test(PublishResponse {
        response_header: ResponseHeader {
            timestamp: DateTime::from_ticks(400_000_000),
            request_handle: 77,
            service_result: StatusCode::Good,
            ..Default::default()
        },
        subscription_id: 1,
        available_sequence_numbers: Some(vec![6]),
        more_notifications: false,
        notification_message: NotificationMessage {
            sequence_number: 6,
            publish_time: DateTime::from_ticks(400_000_000),
            notification_data: Some(vec![ExtensionObject::from_message(notification)]),
        },
        results: Some(vec![StatusCode::Good, StatusCode::BadSequenceNumberUnknown]),
        diagnostic_infos: None,
    });
}

#[test]
fn notification_keep_alive() {
    let message = NotificationMessage {
        sequence_number: 8,
        publish_time: DateTime::now(),
        notification_data: None,
    };
    assert!(message.is_keep_alive());
}
