//! Subscription and monitored item services, and the session-level bookkeeping that
//! keeps the client's view of its subscriptions in sync with the server.

use std::time::Duration;

use log::debug;

use uastack_core::ResponseMessage;
use uastack_types::{
    CreateMonitoredItemsRequest, CreateMonitoredItemsResponse, CreateSubscriptionRequest,
    CreateSubscriptionResponse, DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse,
    DeleteSubscriptionsRequest, DeleteSubscriptionsResponse, ExtensionObject,
    ModifyMonitoredItemsRequest, ModifyMonitoredItemsResponse, ModifySubscriptionRequest,
    ModifySubscriptionResponse, MonitoredItemCreateRequest, MonitoredItemModifyRequest,
    MonitoringMode, MonitoringParameters, NotificationMessage, PublishRequest, PublishResponse,
    RepublishRequest, SetMonitoringModeRequest, SetMonitoringModeResponse,
    SetPublishingModeRequest, SetPublishingModeResponse, SetTriggeringRequest,
    SetTriggeringResponse, StatusCode, TimestampsToReturn, TransferSubscriptionsRequest,
    TransferSubscriptionsResponse,
};

use crate::{
    session::{
        process_service_result, process_unexpected_response,
        request_builder::{builder_base, RequestHeaderBuilder},
        session_debug, session_warn,
    },
    AsyncSecureChannel, Session, UARequest,
};

use super::{CreateMonitoredItem, OnSubscriptionNotification, Subscription};

#[derive(Debug, Clone)]
/// Create a subscription on the server by sending a [`CreateSubscriptionRequest`].
///
/// See OPC UA Part 4 - Services 5.13.2 for a complete description of the service and
/// error responses.
///
/// Note: this does not register the subscription with the session. Prefer
/// [`Session::create_subscription`] which keeps the client-side bookkeeping and the
/// publish pipeline in sync.
pub struct CreateSubscription {
    publishing_interval: Duration,
    lifetime_count: u32,
    max_keep_alive_count: u32,
    max_notifications_per_publish: u32,
    publishing_enabled: bool,
    priority: u8,
    header: RequestHeaderBuilder,
}

builder_base!(CreateSubscription);

impl CreateSubscription {
    /// Create a new `CreateSubscription` request with common defaults for the counts.
    pub fn new(session: &Session, publishing_interval: Duration) -> Self {
        Self {
            publishing_interval,
            lifetime_count: 60,
            max_keep_alive_count: 20,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }

    /// Set the requested lifetime count. Must be at least three times the keep alive
    /// count; the server revises it if not.
    pub fn lifetime_count(mut self, lifetime_count: u32) -> Self {
        self.lifetime_count = lifetime_count;
        self
    }

    /// Set the requested maximum keep alive count.
    pub fn max_keep_alive_count(mut self, max_keep_alive_count: u32) -> Self {
        self.max_keep_alive_count = max_keep_alive_count;
        self
    }

    /// Set the maximum number of notifications per publish response, 0 for no limit.
    pub fn max_notifications_per_publish(mut self, max: u32) -> Self {
        self.max_notifications_per_publish = max;
        self
    }

    /// Set whether publishing is enabled from the start.
    pub fn publishing_enabled(mut self, enabled: bool) -> Self {
        self.publishing_enabled = enabled;
        self
    }

    /// Set the subscription priority relative to the session's other subscriptions.
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

impl UARequest for CreateSubscription {
    type Out = CreateSubscriptionResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = CreateSubscriptionRequest {
            request_header: self.header.header,
            requested_publishing_interval: self.publishing_interval.as_millis() as f64,
            requested_lifetime_count: self.lifetime_count,
            requested_max_keep_alive_count: self.max_keep_alive_count,
            max_notifications_per_publish: self.max_notifications_per_publish,
            publishing_enabled: self.publishing_enabled,
            priority: self.priority,
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::CreateSubscription(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Modify a subscription on the server by sending a [`ModifySubscriptionRequest`].
///
/// See OPC UA Part 4 - Services 5.13.3 for a complete description of the service and
/// error responses.
pub struct ModifySubscription {
    subscription_id: u32,
    publishing_interval: Duration,
    lifetime_count: u32,
    max_keep_alive_count: u32,
    max_notifications_per_publish: u32,
    priority: u8,
    header: RequestHeaderBuilder,
}

builder_base!(ModifySubscription);

impl ModifySubscription {
    /// Create a new `ModifySubscription` request from the subscription's current
    /// parameters. Fails if the subscription is not known to the session.
    pub fn new(session: &Session, subscription_id: u32) -> Result<Self, StatusCode> {
        let state = session.subscription_state.lock();
        let subscription = state
            .get(subscription_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        Ok(Self {
            subscription_id,
            publishing_interval: subscription.publishing_interval(),
            lifetime_count: subscription.lifetime_count(),
            max_keep_alive_count: subscription.max_keep_alive_count(),
            max_notifications_per_publish: subscription.max_notifications_per_publish(),
            priority: subscription.priority(),
            header: RequestHeaderBuilder::new_from_session(session),
        })
    }

    /// Set the requested publishing interval.
    pub fn publishing_interval(mut self, publishing_interval: Duration) -> Self {
        self.publishing_interval = publishing_interval;
        self
    }

    /// Set the requested lifetime count.
    pub fn lifetime_count(mut self, lifetime_count: u32) -> Self {
        self.lifetime_count = lifetime_count;
        self
    }

    /// Set the requested maximum keep alive count.
    pub fn max_keep_alive_count(mut self, max_keep_alive_count: u32) -> Self {
        self.max_keep_alive_count = max_keep_alive_count;
        self
    }

    /// Set the maximum number of notifications per publish response, 0 for no limit.
    pub fn max_notifications_per_publish(mut self, max: u32) -> Self {
        self.max_notifications_per_publish = max;
        self
    }

    /// Set the subscription priority.
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

impl UARequest for ModifySubscription {
    type Out = ModifySubscriptionResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = ModifySubscriptionRequest {
            request_header: self.header.header,
            subscription_id: self.subscription_id,
            requested_publishing_interval: self.publishing_interval.as_millis() as f64,
            requested_lifetime_count: self.lifetime_count,
            requested_max_keep_alive_count: self.max_keep_alive_count,
            max_notifications_per_publish: self.max_notifications_per_publish,
            priority: self.priority,
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::ModifySubscription(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Enable or disable publishing on subscriptions by sending a
/// [`SetPublishingModeRequest`].
///
/// See OPC UA Part 4 - Services 5.13.4 for a complete description of the service and
/// error responses.
pub struct SetPublishingMode {
    publishing_enabled: bool,
    subscription_ids: Vec<u32>,
    header: RequestHeaderBuilder,
}

builder_base!(SetPublishingMode);

impl SetPublishingMode {
    /// Create a new `SetPublishingMode` request.
    pub fn new(session: &Session, subscription_ids: Vec<u32>, publishing_enabled: bool) -> Self {
        Self {
            publishing_enabled,
            subscription_ids,
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }
}

impl UARequest for SetPublishingMode {
    type Out = SetPublishingModeResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = SetPublishingModeRequest {
            request_header: self.header.header,
            publishing_enabled: self.publishing_enabled,
            subscription_ids: Some(self.subscription_ids),
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::SetPublishingMode(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Delete subscriptions by sending a [`DeleteSubscriptionsRequest`].
///
/// See OPC UA Part 4 - Services 5.13.8 for a complete description of the service and
/// error responses.
pub struct DeleteSubscriptions {
    subscription_ids: Vec<u32>,
    header: RequestHeaderBuilder,
}

builder_base!(DeleteSubscriptions);

impl DeleteSubscriptions {
    /// Create a new `DeleteSubscriptions` request.
    pub fn new(session: &Session, subscription_ids: Vec<u32>) -> Self {
        Self {
            subscription_ids,
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }
}

impl UARequest for DeleteSubscriptions {
    type Out = DeleteSubscriptionsResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = DeleteSubscriptionsRequest {
            request_header: self.header.header,
            subscription_ids: Some(self.subscription_ids),
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::DeleteSubscriptions(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Transfer subscriptions from another session to this one by sending a
/// [`TransferSubscriptionsRequest`]. Used during reconnection when the session had to
/// be recreated while its predecessor still owns the subscriptions.
///
/// See OPC UA Part 4 - Services 5.13.7 for a complete description of the service and
/// error responses.
pub struct TransferSubscriptions {
    subscription_ids: Vec<u32>,
    send_initial_values: bool,
    header: RequestHeaderBuilder,
}

builder_base!(TransferSubscriptions);

impl TransferSubscriptions {
    /// Create a new `TransferSubscriptions` request.
    pub fn new(session: &Session, subscription_ids: Vec<u32>, send_initial_values: bool) -> Self {
        Self {
            subscription_ids,
            send_initial_values,
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }
}

impl UARequest for TransferSubscriptions {
    type Out = TransferSubscriptionsResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = TransferSubscriptionsRequest {
            request_header: self.header.header,
            subscription_ids: Some(self.subscription_ids),
            send_initial_values: self.send_initial_values,
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::TransferSubscriptions(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Create monitored items on a subscription by sending a
/// [`CreateMonitoredItemsRequest`].
///
/// See OPC UA Part 4 - Services 5.12.2 for a complete description of the service and
/// error responses.
///
/// Note: this does not register the items with the session. Prefer
/// [`Session::create_monitored_items`].
pub struct CreateMonitoredItems {
    subscription_id: u32,
    timestamps_to_return: TimestampsToReturn,
    items_to_create: Vec<MonitoredItemCreateRequest>,
    header: RequestHeaderBuilder,
}

builder_base!(CreateMonitoredItems);

impl CreateMonitoredItems {
    /// Create a new `CreateMonitoredItems` request.
    pub fn new(session: &Session, subscription_id: u32) -> Self {
        Self {
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Vec::new(),
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }

    /// Set which timestamps the notifications carry.
    pub fn timestamps_to_return(mut self, timestamps_to_return: TimestampsToReturn) -> Self {
        self.timestamps_to_return = timestamps_to_return;
        self
    }

    /// Set the items to create.
    pub fn items_to_create(mut self, items_to_create: Vec<MonitoredItemCreateRequest>) -> Self {
        self.items_to_create = items_to_create;
        self
    }
}

impl UARequest for CreateMonitoredItems {
    type Out = CreateMonitoredItemsResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = CreateMonitoredItemsRequest {
            request_header: self.header.header,
            subscription_id: self.subscription_id,
            timestamps_to_return: self.timestamps_to_return,
            items_to_create: Some(self.items_to_create),
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::CreateMonitoredItems(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Modify monitored items on a subscription by sending a
/// [`ModifyMonitoredItemsRequest`].
///
/// See OPC UA Part 4 - Services 5.12.3 for a complete description of the service and
/// error responses.
pub struct ModifyMonitoredItems {
    subscription_id: u32,
    timestamps_to_return: TimestampsToReturn,
    items_to_modify: Vec<MonitoredItemModifyRequest>,
    header: RequestHeaderBuilder,
}

builder_base!(ModifyMonitoredItems);

impl ModifyMonitoredItems {
    /// Create a new `ModifyMonitoredItems` request.
    pub fn new(session: &Session, subscription_id: u32) -> Self {
        Self {
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_modify: Vec::new(),
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }

    /// Set which timestamps the notifications carry.
    pub fn timestamps_to_return(mut self, timestamps_to_return: TimestampsToReturn) -> Self {
        self.timestamps_to_return = timestamps_to_return;
        self
    }

    /// Set the items to modify.
    pub fn items_to_modify(mut self, items_to_modify: Vec<MonitoredItemModifyRequest>) -> Self {
        self.items_to_modify = items_to_modify;
        self
    }
}

impl UARequest for ModifyMonitoredItems {
    type Out = ModifyMonitoredItemsResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = ModifyMonitoredItemsRequest {
            request_header: self.header.header,
            subscription_id: self.subscription_id,
            timestamps_to_return: self.timestamps_to_return,
            items_to_modify: Some(self.items_to_modify),
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::ModifyMonitoredItems(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Change the monitoring mode of monitored items by sending a
/// [`SetMonitoringModeRequest`].
///
/// See OPC UA Part 4 - Services 5.12.4 for a complete description of the service and
/// error responses.
pub struct SetMonitoringMode {
    subscription_id: u32,
    monitoring_mode: MonitoringMode,
    monitored_item_ids: Vec<u32>,
    header: RequestHeaderBuilder,
}

builder_base!(SetMonitoringMode);

impl SetMonitoringMode {
    /// Create a new `SetMonitoringMode` request.
    pub fn new(
        session: &Session,
        subscription_id: u32,
        monitoring_mode: MonitoringMode,
        monitored_item_ids: Vec<u32>,
    ) -> Self {
        Self {
            subscription_id,
            monitoring_mode,
            monitored_item_ids,
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }
}

impl UARequest for SetMonitoringMode {
    type Out = SetMonitoringModeResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = SetMonitoringModeRequest {
            request_header: self.header.header,
            subscription_id: self.subscription_id,
            monitoring_mode: self.monitoring_mode,
            monitored_item_ids: Some(self.monitored_item_ids),
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::SetMonitoringMode(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Change the triggering links of a monitored item by sending a
/// [`SetTriggeringRequest`].
///
/// See OPC UA Part 4 - Services 5.12.5 for a complete description of the service and
/// error responses.
pub struct SetTriggering {
    subscription_id: u32,
    triggering_item_id: u32,
    links_to_add: Vec<u32>,
    links_to_remove: Vec<u32>,
    header: RequestHeaderBuilder,
}

builder_base!(SetTriggering);

impl SetTriggering {
    /// Create a new `SetTriggering` request.
    pub fn new(session: &Session, subscription_id: u32, triggering_item_id: u32) -> Self {
        Self {
            subscription_id,
            triggering_item_id,
            links_to_add: Vec::new(),
            links_to_remove: Vec::new(),
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }

    /// Set the items to trigger when the triggering item changes.
    pub fn links_to_add(mut self, links_to_add: Vec<u32>) -> Self {
        self.links_to_add = links_to_add;
        self
    }

    /// Set the triggering links to remove.
    pub fn links_to_remove(mut self, links_to_remove: Vec<u32>) -> Self {
        self.links_to_remove = links_to_remove;
        self
    }
}

impl UARequest for SetTriggering {
    type Out = SetTriggeringResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = SetTriggeringRequest {
            request_header: self.header.header,
            subscription_id: self.subscription_id,
            triggering_item_id: self.triggering_item_id,
            links_to_add: if self.links_to_add.is_empty() {
                None
            } else {
                Some(self.links_to_add)
            },
            links_to_remove: if self.links_to_remove.is_empty() {
                None
            } else {
                Some(self.links_to_remove)
            },
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::SetTriggering(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Delete monitored items from a subscription by sending a
/// [`DeleteMonitoredItemsRequest`].
///
/// See OPC UA Part 4 - Services 5.12.6 for a complete description of the service and
/// error responses.
pub struct DeleteMonitoredItems {
    subscription_id: u32,
    monitored_item_ids: Vec<u32>,
    header: RequestHeaderBuilder,
}

builder_base!(DeleteMonitoredItems);

impl DeleteMonitoredItems {
    /// Create a new `DeleteMonitoredItems` request.
    pub fn new(session: &Session, subscription_id: u32, monitored_item_ids: Vec<u32>) -> Self {
        Self {
            subscription_id,
            monitored_item_ids,
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }
}

impl UARequest for DeleteMonitoredItems {
    type Out = DeleteMonitoredItemsResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = DeleteMonitoredItemsRequest {
            request_header: self.header.header,
            subscription_id: self.subscription_id,
            monitored_item_ids: Some(self.monitored_item_ids),
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::DeleteMonitoredItems(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

impl Session {
    /// Create a subscription on the server and register it with the session's publish
    /// pipeline, returning the server-assigned subscription id.
    ///
    /// `callback` receives the subscription's data change, event and status change
    /// notifications. Monitored items are added separately with
    /// [`Session::create_monitored_items`].
    #[allow(clippy::too_many_arguments)]
    pub async fn create_subscription(
        &self,
        publishing_interval: Duration,
        lifetime_count: u32,
        max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
        publishing_enabled: bool,
        callback: impl OnSubscriptionNotification + 'static,
    ) -> Result<u32, StatusCode> {
        let response = CreateSubscription::new(self, publishing_interval)
            .lifetime_count(lifetime_count)
            .max_keep_alive_count(max_keep_alive_count)
            .max_notifications_per_publish(max_notifications_per_publish)
            .priority(priority)
            .publishing_enabled(publishing_enabled)
            .send(&self.channel)
            .await?;

        let subscription = Subscription::new(
            response.subscription_id,
            Duration::from_millis(response.revised_publishing_interval.max(0.0) as u64),
            response.revised_lifetime_count,
            response.revised_max_keep_alive_count,
            max_notifications_per_publish,
            priority,
            publishing_enabled,
            Box::new(callback),
        );
        {
            let mut state = self.subscription_state.lock();
            state.insert(subscription);
        }
        // Wake the publish worker so it starts pulling notifications.
        self.trigger_publish();

        session_debug!(self, "Created subscription {}", response.subscription_id);
        Ok(response.subscription_id)
    }

    /// Modify a subscription's parameters on the server and in the local bookkeeping.
    #[allow(clippy::too_many_arguments)]
    pub async fn modify_subscription(
        &self,
        subscription_id: u32,
        publishing_interval: Duration,
        lifetime_count: u32,
        max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
    ) -> Result<(), StatusCode> {
        let response = ModifySubscription::new(self, subscription_id)?
            .publishing_interval(publishing_interval)
            .lifetime_count(lifetime_count)
            .max_keep_alive_count(max_keep_alive_count)
            .max_notifications_per_publish(max_notifications_per_publish)
            .priority(priority)
            .send(&self.channel)
            .await?;

        let mut state = self.subscription_state.lock();
        if let Some(subscription) = state.get_mut(subscription_id) {
            subscription.set_publishing_interval(Duration::from_millis(
                response.revised_publishing_interval.max(0.0) as u64,
            ));
            subscription.set_lifetime_count(response.revised_lifetime_count);
            subscription.set_max_keep_alive_count(response.revised_max_keep_alive_count);
            subscription.set_max_notifications_per_publish(max_notifications_per_publish);
            subscription.set_priority(priority);
        }
        Ok(())
    }

    /// Enable or disable publishing on a set of subscriptions.
    pub async fn set_publishing_mode(
        &self,
        subscription_ids: Vec<u32>,
        publishing_enabled: bool,
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let response = SetPublishingMode::new(self, subscription_ids.clone(), publishing_enabled)
            .send(&self.channel)
            .await?;
        let results = response.results.unwrap_or_default();
        let mut state = self.subscription_state.lock();
        for (subscription_id, result) in subscription_ids.iter().zip(results.iter()) {
            if result.is_good() {
                if let Some(subscription) = state.get_mut(*subscription_id) {
                    subscription.set_publishing_enabled(publishing_enabled);
                }
            }
        }
        Ok(results)
    }

    /// Delete a subscription on the server and drop the local bookkeeping. The publish
    /// worker finishes dispatching anything already received.
    pub async fn delete_subscription(&self, subscription_id: u32) -> Result<(), StatusCode> {
        let response = DeleteSubscriptions::new(self, vec![subscription_id])
            .send(&self.channel)
            .await?;
        let result = response
            .results
            .as_ref()
            .and_then(|r| r.first())
            .copied()
            .unwrap_or(StatusCode::BadUnexpectedError);

        {
            let mut state = self.subscription_state.lock();
            state.remove(subscription_id);
        }
        self.trigger_publish();

        // The subscription already being gone on the server is not an error worth
        // surfacing, the local state is consistent either way.
        if result.is_bad() && result != StatusCode::BadSubscriptionIdInvalid {
            return Err(result);
        }
        Ok(())
    }

    /// Create monitored items on a subscription. Client handles are assigned from the
    /// session-wide counter for any item that does not carry one; revised parameters
    /// are stored in the local bookkeeping.
    ///
    /// Returns (client handle, create status) pairs in input order.
    pub async fn create_monitored_items(
        &self,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        mut items_to_create: Vec<MonitoredItemCreateRequest>,
    ) -> Result<Vec<(u32, StatusCode)>, StatusCode> {
        for item in items_to_create.iter_mut() {
            if item.requested_parameters.client_handle == 0 {
                item.requested_parameters.client_handle = self.next_monitored_item_handle();
            }
        }
        let requested = items_to_create.clone();

        let response = CreateMonitoredItems::new(self, subscription_id)
            .timestamps_to_return(timestamps_to_return)
            .items_to_create(items_to_create)
            .send(&self.channel)
            .await?;

        let results = response.results.unwrap_or_default();
        let mut created = Vec::with_capacity(requested.len());
        let mut to_insert = Vec::new();
        for (request, result) in requested.into_iter().zip(results.into_iter()) {
            let client_handle = request.requested_parameters.client_handle;
            created.push((client_handle, result.status_code));
            if result.status_code.is_good() {
                to_insert.push(CreateMonitoredItem {
                    id: result.monitored_item_id,
                    client_handle,
                    item_to_monitor: request.item_to_monitor,
                    monitoring_mode: request.monitoring_mode,
                    queue_size: result.revised_queue_size,
                    discard_oldest: request.requested_parameters.discard_oldest,
                    sampling_interval: result.revised_sampling_interval,
                    filter: request.requested_parameters.filter,
                });
            }
        }

        let mut state = self.subscription_state.lock();
        if let Some(subscription) = state.get_mut(subscription_id) {
            subscription.insert_monitored_items(to_insert);
        }
        Ok(created)
    }

    /// Modify monitored items on a subscription, updating the local bookkeeping with
    /// the revised values.
    pub async fn modify_monitored_items(
        &self,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        items_to_modify: Vec<MonitoredItemModifyRequest>,
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let ids = items_to_modify
            .iter()
            .map(|i| i.monitored_item_id)
            .collect::<Vec<_>>();
        let response = ModifyMonitoredItems::new(self, subscription_id)
            .timestamps_to_return(timestamps_to_return)
            .items_to_modify(items_to_modify)
            .send(&self.channel)
            .await?;
        let results = response.results.unwrap_or_default();

        let revised = ids
            .iter()
            .zip(results.iter())
            .filter(|(_, r)| r.status_code.is_good())
            .map(|(id, r)| (*id, r.revised_sampling_interval, r.revised_queue_size))
            .collect::<Vec<_>>();
        {
            let mut state = self.subscription_state.lock();
            if let Some(subscription) = state.get_mut(subscription_id) {
                subscription.modify_monitored_items(&revised);
            }
        }
        Ok(results.into_iter().map(|r| r.status_code).collect())
    }

    /// Delete monitored items from a subscription.
    pub async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        monitored_item_ids: Vec<u32>,
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let response = DeleteMonitoredItems::new(self, subscription_id, monitored_item_ids.clone())
            .send(&self.channel)
            .await?;
        {
            let mut state = self.subscription_state.lock();
            if let Some(subscription) = state.get_mut(subscription_id) {
                subscription.delete_monitored_items(&monitored_item_ids);
            }
        }
        Ok(response.results.unwrap_or_default())
    }

    /// Change the monitoring mode of monitored items.
    pub async fn set_monitoring_mode(
        &self,
        subscription_id: u32,
        monitoring_mode: MonitoringMode,
        monitored_item_ids: Vec<u32>,
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let response = SetMonitoringMode::new(
            self,
            subscription_id,
            monitoring_mode,
            monitored_item_ids.clone(),
        )
        .send(&self.channel)
        .await?;
        let results = response.results.unwrap_or_default();
        {
            let mut state = self.subscription_state.lock();
            if let Some(subscription) = state.get_mut(subscription_id) {
                for (id, result) in monitored_item_ids.iter().zip(results.iter()) {
                    if result.is_good() {
                        subscription.set_monitoring_mode_of(*id, monitoring_mode);
                    }
                }
            }
        }
        Ok(results)
    }

    /// Change the items triggered by a monitored item.
    pub async fn set_triggering(
        &self,
        subscription_id: u32,
        triggering_item_id: u32,
        links_to_add: Vec<u32>,
        links_to_remove: Vec<u32>,
    ) -> Result<(), StatusCode> {
        SetTriggering::new(self, subscription_id, triggering_item_id)
            .links_to_add(links_to_add.clone())
            .links_to_remove(links_to_remove.clone())
            .send(&self.channel)
            .await?;
        let mut state = self.subscription_state.lock();
        if let Some(subscription) = state.get_mut(subscription_id) {
            subscription.set_triggering(triggering_item_id, &links_to_add, &links_to_remove);
        }
        Ok(())
    }

    /// Send one publish request carrying the accumulated acknowledgements, returning
    /// the server's next notification message.
    pub(crate) async fn publish(&self) -> Result<Box<PublishResponse>, StatusCode> {
        let acks = {
            let mut state = self.subscription_state.lock();
            state.take_acknowledgements()
        };
        let request = PublishRequest {
            request_header: self.channel.make_request_header(self.publish_timeout()),
            subscription_acknowledgements: if acks.is_empty() {
                None
            } else {
                Some(acks.clone())
            },
        };
        let result = self.channel.send(request, self.publish_timeout()).await;
        match result {
            Ok(ResponseMessage::Publish(response)) => {
                process_service_result(&response.response_header)?;
                Ok(response)
            }
            Ok(other) => Err(process_unexpected_response(other)),
            Err(e) => {
                // The acknowledgements never made it, queue them again.
                let mut state = self.subscription_state.lock();
                state.return_acknowledgements(acks);
                Err(e)
            }
        }
    }

    /// Ask the server to retransmit a missed notification message.
    pub(crate) async fn republish(
        &self,
        subscription_id: u32,
        retransmit_sequence_number: u32,
    ) -> Result<NotificationMessage, StatusCode> {
        let request = RepublishRequest {
            request_header: self.make_request_header(),
            subscription_id,
            retransmit_sequence_number,
        };
        let response = self.channel.send(request, self.request_timeout()).await?;
        if let ResponseMessage::Republish(response) = response {
            process_service_result(&response.response_header)?;
            Ok(response.notification_message)
        } else {
            Err(process_unexpected_response(response))
        }
    }

    /// Transfer the session's subscriptions to the current (new) session, recreating
    /// any the server refuses to carry over.
    pub(crate) async fn transfer_subscriptions_from_old_session(&self) {
        let subscription_ids = {
            let state = self.subscription_state.lock();
            state.subscription_ids()
        };
        if subscription_ids.is_empty() {
            return;
        }

        let results = match TransferSubscriptions::new(self, subscription_ids.clone(), true)
            .send(&self.channel)
            .await
        {
            Ok(response) => response.results.unwrap_or_default(),
            Err(e) => {
                session_warn!(
                    self,
                    "TransferSubscriptions failed wholesale ({e}), recreating all subscriptions"
                );
                Vec::new()
            }
        };

        for (index, subscription_id) in subscription_ids.iter().enumerate() {
            let transferred = results
                .get(index)
                .map(|r| r.status_code.is_good())
                .unwrap_or(false);
            if transferred {
                debug!("Subscription {subscription_id} transferred to the new session");
                continue;
            }
            if let Err(e) = self.recreate_subscription(*subscription_id).await {
                session_warn!(
                    self,
                    "Failed to recreate subscription {subscription_id}: {e}"
                );
            }
        }
    }

    /// Recreate a subscription and all its monitored items on the server from the local
    /// bookkeeping. Used when the server refused to transfer it after a reconnect, or
    /// dropped it with a status change notification.
    pub(crate) async fn recreate_subscription(&self, subscription_id: u32) -> Result<(), StatusCode> {
        struct Params {
            publishing_interval: Duration,
            lifetime_count: u32,
            max_keep_alive_count: u32,
            max_notifications_per_publish: u32,
            priority: u8,
            publishing_enabled: bool,
            items: Vec<MonitoredItemCreateRequest>,
        }

        let params = {
            let state = self.subscription_state.lock();
            let Some(subscription) = state.get(subscription_id) else {
                return Err(StatusCode::BadSubscriptionIdInvalid);
            };
            Params {
                publishing_interval: subscription.publishing_interval(),
                lifetime_count: subscription.lifetime_count(),
                max_keep_alive_count: subscription.max_keep_alive_count(),
                max_notifications_per_publish: subscription.max_notifications_per_publish(),
                priority: subscription.priority(),
                publishing_enabled: subscription.publishing_enabled(),
                items: subscription
                    .monitored_items()
                    .values()
                    .map(|item| MonitoredItemCreateRequest {
                        item_to_monitor: item.item_to_monitor().clone(),
                        monitoring_mode: item.monitoring_mode(),
                        requested_parameters: MonitoringParameters {
                            client_handle: item.client_handle(),
                            sampling_interval: item.sampling_interval(),
                            filter: item.filter().clone(),
                            queue_size: item.queue_size() as u32,
                            discard_oldest: item.discard_oldest(),
                        },
                    })
                    .collect(),
            }
        };

        let response = CreateSubscription::new(self, params.publishing_interval)
            .lifetime_count(params.lifetime_count)
            .max_keep_alive_count(params.max_keep_alive_count)
            .max_notifications_per_publish(params.max_notifications_per_publish)
            .priority(params.priority)
            .publishing_enabled(params.publishing_enabled)
            .send(&self.channel)
            .await?;
        let new_subscription_id = response.subscription_id;

        {
            let mut state = self.subscription_state.lock();
            state.rekey(subscription_id, new_subscription_id);
            if let Some(subscription) = state.get_mut(new_subscription_id) {
                subscription.set_publishing_interval(Duration::from_millis(
                    response.revised_publishing_interval.max(0.0) as u64,
                ));
                subscription.set_lifetime_count(response.revised_lifetime_count);
                subscription.set_max_keep_alive_count(response.revised_max_keep_alive_count);
            }
        }

        debug!(
            "Recreated subscription {subscription_id} as {new_subscription_id} with {} monitored items",
            params.items.len()
        );

        if !params.items.is_empty() {
            let response = CreateMonitoredItems::new(self, new_subscription_id)
                .timestamps_to_return(TimestampsToReturn::Both)
                .items_to_create(params.items.clone())
                .send(&self.channel)
                .await?;
            let results = response.results.unwrap_or_default();
            let to_insert = params
                .items
                .into_iter()
                .zip(results.into_iter())
                .filter(|(_, result)| result.status_code.is_good())
                .map(|(request, result)| CreateMonitoredItem {
                    id: result.monitored_item_id,
                    client_handle: request.requested_parameters.client_handle,
                    item_to_monitor: request.item_to_monitor,
                    monitoring_mode: request.monitoring_mode,
                    queue_size: result.revised_queue_size,
                    discard_oldest: request.requested_parameters.discard_oldest,
                    sampling_interval: result.revised_sampling_interval,
                    filter: request.requested_parameters.filter,
                })
                .collect::<Vec<_>>();

            let mut state = self.subscription_state.lock();
            if let Some(subscription) = state.get_mut(new_subscription_id) {
                // The recreated items keep their existing client handles, so user
                // callbacks keep working without re-registration.
                subscription.insert_monitored_items(to_insert);
            }
        }

        self.trigger_publish();
        Ok(())
    }

    /// Build an event filter selecting fields of the base event type by name, for use
    /// as a monitored item filter.
    pub fn event_filter_from_fields(fields: &[&str]) -> ExtensionObject {
        use uastack_types::{ContentFilter, EventFilter, SimpleAttributeOperand};
        ExtensionObject::from_message(EventFilter {
            select_clauses: Some(
                fields
                    .iter()
                    .map(|f| SimpleAttributeOperand::event_field(f))
                    .collect(),
            ),
            where_clause: ContentFilter { elements: None },
        })
    }
}

impl Subscription {
    pub(crate) fn set_monitoring_mode_of(&mut self, item_id: u32, mode: MonitoringMode) {
        if let Some(item) = self.monitored_items.get_mut(&item_id) {
            item.set_monitoring_mode(mode);
        }
    }
}
