// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Subscription and monitored item services.

use super::{ua_structure, NotificationMessage, ReadValueId, SubscriptionAcknowledgement};
use crate::{
    DiagnosticInfo, ExtensionObject, MonitoringMode, RequestHeader, ResponseHeader, StatusCode,
    TimestampsToReturn,
};

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.2/
    pub struct CreateSubscriptionRequest: CreateSubscriptionRequest_Encoding_DefaultBinary, CreateSubscriptionRequest {
        pub request_header: RequestHeader,
        pub requested_publishing_interval: f64,
        pub requested_lifetime_count: u32,
        pub requested_max_keep_alive_count: u32,
        pub max_notifications_per_publish: u32,
        pub publishing_enabled: bool,
        pub priority: u8,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.2/
    pub struct CreateSubscriptionResponse: CreateSubscriptionResponse_Encoding_DefaultBinary, CreateSubscriptionResponse {
        pub response_header: ResponseHeader,
        pub subscription_id: u32,
        pub revised_publishing_interval: f64,
        pub revised_lifetime_count: u32,
        pub revised_max_keep_alive_count: u32,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.3/
    pub struct ModifySubscriptionRequest: ModifySubscriptionRequest_Encoding_DefaultBinary, ModifySubscriptionRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub requested_publishing_interval: f64,
        pub requested_lifetime_count: u32,
        pub requested_max_keep_alive_count: u32,
        pub max_notifications_per_publish: u32,
        pub priority: u8,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.3/
    pub struct ModifySubscriptionResponse: ModifySubscriptionResponse_Encoding_DefaultBinary, ModifySubscriptionResponse {
        pub response_header: ResponseHeader,
        pub revised_publishing_interval: f64,
        pub revised_lifetime_count: u32,
        pub revised_max_keep_alive_count: u32,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.4/
    pub struct SetPublishingModeRequest: SetPublishingModeRequest_Encoding_DefaultBinary, SetPublishingModeRequest {
        pub request_header: RequestHeader,
        pub publishing_enabled: bool,
        pub subscription_ids: Option<Vec<u32>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.4/
    pub struct SetPublishingModeResponse: SetPublishingModeResponse_Encoding_DefaultBinary, SetPublishingModeResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.8/
    pub struct DeleteSubscriptionsRequest: DeleteSubscriptionsRequest_Encoding_DefaultBinary, DeleteSubscriptionsRequest {
        pub request_header: RequestHeader,
        pub subscription_ids: Option<Vec<u32>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.8/
    pub struct DeleteSubscriptionsResponse: DeleteSubscriptionsResponse_Encoding_DefaultBinary, DeleteSubscriptionsResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// The outcome of transferring one subscription to the current session.
    pub struct TransferResult: TransferResult_Encoding_DefaultBinary, TransferResult {
        pub status_code: StatusCode,
        pub available_sequence_numbers: Option<Vec<u32>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.7/
    pub struct TransferSubscriptionsRequest: TransferSubscriptionsRequest_Encoding_DefaultBinary, TransferSubscriptionsRequest {
        pub request_header: RequestHeader,
        pub subscription_ids: Option<Vec<u32>>,
        pub send_initial_values: bool,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.7/
    pub struct TransferSubscriptionsResponse: TransferSubscriptionsResponse_Encoding_DefaultBinary, TransferSubscriptionsResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<TransferResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// The monitoring settings of a monitored item.
    pub struct MonitoringParameters: MonitoringParameters_Encoding_DefaultBinary, MonitoringParameters {
        pub client_handle: u32,
        pub sampling_interval: f64,
        pub filter: ExtensionObject,
        pub queue_size: u32,
        pub discard_oldest: bool,
    }
}

ua_structure! {
    /// A request to create one monitored item.
    pub struct MonitoredItemCreateRequest: MonitoredItemCreateRequest_Encoding_DefaultBinary, MonitoredItemCreateRequest {
        pub item_to_monitor: ReadValueId,
        pub monitoring_mode: MonitoringMode,
        pub requested_parameters: MonitoringParameters,
    }
}

ua_structure! {
    /// The outcome of creating one monitored item, with the server-revised parameters.
    pub struct MonitoredItemCreateResult: MonitoredItemCreateResult_Encoding_DefaultBinary, MonitoredItemCreateResult {
        pub status_code: StatusCode,
        pub monitored_item_id: u32,
        pub revised_sampling_interval: f64,
        pub revised_queue_size: u32,
        pub filter_result: ExtensionObject,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.12.2/
    pub struct CreateMonitoredItemsRequest: CreateMonitoredItemsRequest_Encoding_DefaultBinary, CreateMonitoredItemsRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub timestamps_to_return: TimestampsToReturn,
        pub items_to_create: Option<Vec<MonitoredItemCreateRequest>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.12.2/
    pub struct CreateMonitoredItemsResponse: CreateMonitoredItemsResponse_Encoding_DefaultBinary, CreateMonitoredItemsResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<MonitoredItemCreateResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// A request to modify one monitored item.
    pub struct MonitoredItemModifyRequest: MonitoredItemModifyRequest_Encoding_DefaultBinary, MonitoredItemModifyRequest {
        pub monitored_item_id: u32,
        pub requested_parameters: MonitoringParameters,
    }
}

ua_structure! {
    /// The outcome of modifying one monitored item.
    pub struct MonitoredItemModifyResult: MonitoredItemModifyResult_Encoding_DefaultBinary, MonitoredItemModifyResult {
        pub status_code: StatusCode,
        pub revised_sampling_interval: f64,
        pub revised_queue_size: u32,
        pub filter_result: ExtensionObject,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.12.3/
    pub struct ModifyMonitoredItemsRequest: ModifyMonitoredItemsRequest_Encoding_DefaultBinary, ModifyMonitoredItemsRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub timestamps_to_return: TimestampsToReturn,
        pub items_to_modify: Option<Vec<MonitoredItemModifyRequest>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.12.3/
    pub struct ModifyMonitoredItemsResponse: ModifyMonitoredItemsResponse_Encoding_DefaultBinary, ModifyMonitoredItemsResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<MonitoredItemModifyResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.12.4/
    pub struct SetMonitoringModeRequest: SetMonitoringModeRequest_Encoding_DefaultBinary, SetMonitoringModeRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub monitoring_mode: MonitoringMode,
        pub monitored_item_ids: Option<Vec<u32>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.12.4/
    pub struct SetMonitoringModeResponse: SetMonitoringModeResponse_Encoding_DefaultBinary, SetMonitoringModeResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.12.5/
    pub struct SetTriggeringRequest: SetTriggeringRequest_Encoding_DefaultBinary, SetTriggeringRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub triggering_item_id: u32,
        pub links_to_add: Option<Vec<u32>>,
        pub links_to_remove: Option<Vec<u32>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.12.5/
    pub struct SetTriggeringResponse: SetTriggeringResponse_Encoding_DefaultBinary, SetTriggeringResponse {
        pub response_header: ResponseHeader,
        pub add_results: Option<Vec<StatusCode>>,
        pub add_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
        pub remove_results: Option<Vec<StatusCode>>,
        pub remove_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.12.6/
    pub struct DeleteMonitoredItemsRequest: DeleteMonitoredItemsRequest_Encoding_DefaultBinary, DeleteMonitoredItemsRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub monitored_item_ids: Option<Vec<u32>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.12.6/
    pub struct DeleteMonitoredItemsResponse: DeleteMonitoredItemsResponse_Encoding_DefaultBinary, DeleteMonitoredItemsResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.5/
    pub struct PublishRequest: PublishRequest_Encoding_DefaultBinary, PublishRequest {
        pub request_header: RequestHeader,
        pub subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.5/
    pub struct PublishResponse: PublishResponse_Encoding_DefaultBinary, PublishResponse {
        pub response_header: ResponseHeader,
        pub subscription_id: u32,
        pub available_sequence_numbers: Option<Vec<u32>>,
        pub more_notifications: bool,
        pub notification_message: NotificationMessage,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.6/
    pub struct RepublishRequest: RepublishRequest_Encoding_DefaultBinary, RepublishRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub retransmit_sequence_number: u32,
    }
}

ua_structure! {
    /// https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.6/
    pub struct RepublishResponse: RepublishResponse_Encoding_DefaultBinary, RepublishResponse {
        pub response_header: ResponseHeader,
        pub notification_message: NotificationMessage,
    }
}
