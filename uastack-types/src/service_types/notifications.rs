// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Notification messages delivered through the publish pipeline.

use super::ua_structure;
use crate::{DataValue, DateTime, DiagnosticInfo, ExtensionObject, StatusCode, Variant};

ua_structure! {
    /// Acknowledges receipt of a notification message for a subscription.
    pub struct SubscriptionAcknowledgement: SubscriptionAcknowledgement_Encoding_DefaultBinary, SubscriptionAcknowledgement {
        pub subscription_id: u32,
        pub sequence_number: u32,
    }
}

ua_structure! {
    /// A sequenced batch of notifications for one subscription. The notification data
    /// objects are data change notifications, event notification lists, or status
    /// change notifications.
    pub struct NotificationMessage: NotificationMessage_Encoding_DefaultBinary, NotificationMessage {
        pub sequence_number: u32,
        pub publish_time: DateTime,
        pub notification_data: Option<Vec<ExtensionObject>>,
    }
}

impl NotificationMessage {
    /// A keep-alive carries a sequence number but no notification data.
    pub fn is_keep_alive(&self) -> bool {
        self.notification_data
            .as_ref()
            .map(|d| d.is_empty())
            .unwrap_or(true)
    }
}

ua_structure! {
    /// A changed value of one monitored item, tagged with the client handle assigned
    /// when the item was created.
    pub struct MonitoredItemNotification: MonitoredItemNotification_Encoding_DefaultBinary, MonitoredItemNotification {
        pub client_handle: u32,
        pub value: DataValue,
    }
}

ua_structure! {
    /// Data change notifications for a batch of monitored items.
    pub struct DataChangeNotification: DataChangeNotification_Encoding_DefaultBinary, DataChangeNotification {
        pub monitored_items: Option<Vec<MonitoredItemNotification>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// The field values of one event, in the order of the select clauses registered
    /// with the monitored item's event filter.
    pub struct EventFieldList: EventFieldList_Encoding_DefaultBinary, EventFieldList {
        pub client_handle: u32,
        pub event_fields: Option<Vec<Variant>>,
    }
}

ua_structure! {
    /// Event notifications for a batch of monitored items.
    pub struct EventNotificationList: EventNotificationList_Encoding_DefaultBinary, EventNotificationList {
        pub events: Option<Vec<EventFieldList>>,
    }
}

ua_structure! {
    /// Reports a change of the subscription's state on the server, e.g. BadTimeout when
    /// the server has abandoned the subscription.
    pub struct StatusChangeNotification: StatusChangeNotification_Encoding_DefaultBinary, StatusChangeNotification {
        pub status: StatusCode,
        pub diagnostic_info: DiagnosticInfo,
    }
}
