pub(crate) mod event_loop;
pub use event_loop::SubscriptionActivity;

mod service;
pub(crate) mod state;

use std::collections::BTreeSet;
use std::time::Duration;

use hashbrown::HashMap;

use uastack_types::{
    match_extension_object_owned, DataChangeNotification, DataValue, EventNotificationList,
    ExtensionObject, MonitoringMode, NotificationMessage, ReadValueId, StatusChangeNotification,
    StatusCode, Variant,
};

pub use service::{
    CreateMonitoredItems, CreateSubscription, DeleteMonitoredItems, DeleteSubscriptions,
    ModifyMonitoredItems, ModifySubscription, SetMonitoringMode, SetPublishingMode, SetTriggering,
    TransferSubscriptions,
};

pub(crate) struct CreateMonitoredItem {
    pub id: u32,
    pub client_handle: u32,
    pub item_to_monitor: ReadValueId,
    pub monitoring_mode: MonitoringMode,
    pub queue_size: u32,
    pub discard_oldest: bool,
    pub sampling_interval: f64,
    pub filter: ExtensionObject,
}

/// A set of callbacks for notifications on a subscription.
/// You may implement this on your own struct, or simply use [`SubscriptionCallbacks`]
/// for a simple collection of closures.
pub trait OnSubscriptionNotification: Send + Sync {
    /// Called when a subscription changes state on the server.
    #[allow(unused)]
    fn on_subscription_status_change(&mut self, notification: StatusChangeNotification) {}

    /// Called for each data value change.
    #[allow(unused)]
    fn on_data_value(&mut self, notification: DataValue, item: &MonitoredItem) {}

    /// Called for each received event. The fields arrive in the order of the select
    /// clauses registered with the item's event filter.
    #[allow(unused)]
    fn on_event(&mut self, event_fields: Option<Vec<Variant>>, item: &MonitoredItem) {}
}

type StatusChangeCallbackFun = dyn FnMut(StatusChangeNotification) + Send + Sync;
type DataChangeCallbackFun = dyn FnMut(DataValue, &MonitoredItem) + Send + Sync;
type EventCallbackFun = dyn FnMut(Option<Vec<Variant>>, &MonitoredItem) + Send + Sync;

/// A convenient wrapper around a set of callback functions that implements
/// [`OnSubscriptionNotification`].
pub struct SubscriptionCallbacks {
    status_change: Box<StatusChangeCallbackFun>,
    data_value: Box<DataChangeCallbackFun>,
    event: Box<EventCallbackFun>,
}

impl SubscriptionCallbacks {
    /// Create a new subscription callback wrapper.
    ///
    /// # Arguments
    ///
    /// * `status_change` - Called when a subscription changes state on the server.
    /// * `data_value` - Called for each received data value.
    /// * `event` - Called for each received event.
    pub fn new(
        status_change: impl FnMut(StatusChangeNotification) + Send + Sync + 'static,
        data_value: impl FnMut(DataValue, &MonitoredItem) + Send + Sync + 'static,
        event: impl FnMut(Option<Vec<Variant>>, &MonitoredItem) + Send + Sync + 'static,
    ) -> Self {
        Self {
            status_change: Box::new(status_change) as Box<StatusChangeCallbackFun>,
            data_value: Box::new(data_value) as Box<DataChangeCallbackFun>,
            event: Box::new(event) as Box<EventCallbackFun>,
        }
    }
}

impl OnSubscriptionNotification for SubscriptionCallbacks {
    fn on_subscription_status_change(&mut self, notification: StatusChangeNotification) {
        (self.status_change)(notification);
    }

    fn on_data_value(&mut self, notification: DataValue, item: &MonitoredItem) {
        (self.data_value)(notification, item);
    }

    fn on_event(&mut self, event_fields: Option<Vec<Variant>>, item: &MonitoredItem) {
        (self.event)(event_fields, item);
    }
}

/// A wrapper around a data change callback that implements [`OnSubscriptionNotification`].
pub struct DataChangeCallback {
    data_value: Box<DataChangeCallbackFun>,
}

impl DataChangeCallback {
    /// Create a new data change callback wrapper.
    pub fn new(data_value: impl FnMut(DataValue, &MonitoredItem) + Send + Sync + 'static) -> Self {
        Self {
            data_value: Box::new(data_value) as Box<DataChangeCallbackFun>,
        }
    }
}

impl OnSubscriptionNotification for DataChangeCallback {
    fn on_data_value(&mut self, notification: DataValue, item: &MonitoredItem) {
        (self.data_value)(notification, item);
    }
}

/// A wrapper around an event callback that implements [`OnSubscriptionNotification`].
pub struct EventCallback {
    event: Box<EventCallbackFun>,
}

impl EventCallback {
    /// Create a new event callback wrapper.
    pub fn new(
        event: impl FnMut(Option<Vec<Variant>>, &MonitoredItem) + Send + Sync + 'static,
    ) -> Self {
        Self {
            event: Box::new(event) as Box<EventCallbackFun>,
        }
    }
}

impl OnSubscriptionNotification for EventCallback {
    fn on_event(&mut self, event_fields: Option<Vec<Variant>>, item: &MonitoredItem) {
        (self.event)(event_fields, item);
    }
}

#[derive(Debug, Clone)]
/// Client-side representation of a monitored item.
pub struct MonitoredItem {
    /// The server-assigned id of the monitored item within the subscription.
    id: u32,
    /// The session-wide client handle the item's notifications are tagged with.
    client_handle: u32,
    /// The thing that is actually being monitored - the node id, attribute, index range
    /// and data encoding.
    item_to_monitor: ReadValueId,
    /// Revised queue size.
    queue_size: usize,
    /// Monitoring mode.
    monitoring_mode: MonitoringMode,
    /// Revised sampling interval.
    sampling_interval: f64,
    /// Items triggered by this item.
    triggered_items: BTreeSet<u32>,
    /// Whether to discard oldest values on queue overflow.
    discard_oldest: bool,
    /// Active filter.
    filter: ExtensionObject,
}

impl MonitoredItem {
    /// Server assigned ID of the monitored item.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Client assigned handle for the monitored item.
    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    /// Attribute and node ID for the item the monitored item receives notifications for.
    pub fn item_to_monitor(&self) -> &ReadValueId {
        &self.item_to_monitor
    }

    /// Revised sampling interval.
    pub fn sampling_interval(&self) -> f64 {
        self.sampling_interval
    }

    /// Revised queue size on the server.
    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// Whether the oldest values are discarded on queue overflow on the server.
    pub fn discard_oldest(&self) -> bool {
        self.discard_oldest
    }

    /// The active monitoring mode.
    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.monitoring_mode
    }

    /// The active filter. For event items this carries the select clauses used to
    /// decode event field lists.
    pub fn filter(&self) -> &ExtensionObject {
        &self.filter
    }

    pub(crate) fn set_sampling_interval(&mut self, value: f64) {
        self.sampling_interval = value;
    }

    pub(crate) fn set_queue_size(&mut self, value: usize) {
        self.queue_size = value;
    }

    pub(crate) fn set_monitoring_mode(&mut self, monitoring_mode: MonitoringMode) {
        self.monitoring_mode = monitoring_mode;
    }

    pub(crate) fn set_triggering(&mut self, links_to_add: &[u32], links_to_remove: &[u32]) {
        links_to_remove.iter().for_each(|i| {
            self.triggered_items.remove(i);
        });
        links_to_add.iter().for_each(|i| {
            self.triggered_items.insert(*i);
        });
    }

    /// The ids of the items this item triggers reporting for.
    pub fn triggered_items(&self) -> &BTreeSet<u32> {
        &self.triggered_items
    }
}

/// Client-side representation of a subscription.
pub struct Subscription {
    /// Subscription id, supplied by the server.
    subscription_id: u32,
    /// Publishing interval, revised by the server.
    publishing_interval: Duration,
    /// Lifetime count, revised by the server.
    lifetime_count: u32,
    /// Max keep alive count, revised by the server.
    max_keep_alive_count: u32,
    /// Max notifications per publish.
    max_notifications_per_publish: u32,
    /// Publishing enabled.
    publishing_enabled: bool,
    /// Subscription priority.
    priority: u8,
    /// The sequence number of the last notification dispatched to callbacks.
    /// Zero before the first notification.
    last_sequence_number: u32,

    /// The monitored items of the subscription, by server-assigned id.
    monitored_items: HashMap<u32, MonitoredItem>,
    /// Client handle to monitored item id.
    client_handles: HashMap<u32, u32>,

    callback: Box<dyn OnSubscriptionNotification>,
}

impl Subscription {
    /// Creates a new subscription from the revised server parameters and a callback.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        subscription_id: u32,
        publishing_interval: Duration,
        lifetime_count: u32,
        max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
        publishing_enabled: bool,
        callback: Box<dyn OnSubscriptionNotification>,
    ) -> Subscription {
        Subscription {
            subscription_id,
            publishing_interval,
            lifetime_count,
            max_keep_alive_count,
            max_notifications_per_publish,
            publishing_enabled,
            priority,
            last_sequence_number: 0,
            monitored_items: HashMap::new(),
            client_handles: HashMap::new(),
            callback,
        }
    }

    /// Get the monitored items in this subscription, by server-assigned id.
    pub fn monitored_items(&self) -> &HashMap<u32, MonitoredItem> {
        &self.monitored_items
    }

    /// Get the subscription ID.
    pub fn subscription_id(&self) -> u32 {
        self.subscription_id
    }

    /// Get the revised publishing interval.
    pub fn publishing_interval(&self) -> Duration {
        self.publishing_interval
    }

    /// Get the revised `LifetimeCount` parameter for this subscription.
    pub fn lifetime_count(&self) -> u32 {
        self.lifetime_count
    }

    /// Get the configured priority.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Get the revised maximum keep alive count.
    pub fn max_keep_alive_count(&self) -> u32 {
        self.max_keep_alive_count
    }

    /// Get the configured maximum number of notifications per publish response.
    pub fn max_notifications_per_publish(&self) -> u32 {
        self.max_notifications_per_publish
    }

    /// Get whether publishing is enabled.
    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    /// The sequence number of the last notification dispatched to user callbacks.
    pub fn last_sequence_number(&self) -> u32 {
        self.last_sequence_number
    }

    pub(crate) fn set_last_sequence_number(&mut self, sequence_number: u32) {
        self.last_sequence_number = sequence_number;
    }

    pub(crate) fn set_publishing_interval(&mut self, publishing_interval: Duration) {
        self.publishing_interval = publishing_interval;
    }

    pub(crate) fn set_lifetime_count(&mut self, lifetime_count: u32) {
        self.lifetime_count = lifetime_count;
    }

    pub(crate) fn set_max_keep_alive_count(&mut self, max_keep_alive_count: u32) {
        self.max_keep_alive_count = max_keep_alive_count;
    }

    pub(crate) fn set_max_notifications_per_publish(&mut self, max_notifications_per_publish: u32) {
        self.max_notifications_per_publish = max_notifications_per_publish;
    }

    pub(crate) fn set_publishing_enabled(&mut self, publishing_enabled: bool) {
        self.publishing_enabled = publishing_enabled;
    }

    pub(crate) fn set_priority(&mut self, priority: u8) {
        self.priority = priority;
    }

    pub(crate) fn set_subscription_id(&mut self, subscription_id: u32) {
        self.subscription_id = subscription_id;
    }

    /// Insert a monitored item that has been created on the server.
    pub(crate) fn insert_existing_monitored_item(&mut self, item: MonitoredItem) {
        let client_handle = item.client_handle();
        let monitored_item_id = item.id();
        self.monitored_items.insert(monitored_item_id, item);
        self.client_handles.insert(client_handle, monitored_item_id);
    }

    pub(crate) fn insert_monitored_items(&mut self, items_to_create: Vec<CreateMonitoredItem>) {
        items_to_create.into_iter().for_each(|i| {
            let monitored_item = MonitoredItem {
                id: i.id,
                client_handle: i.client_handle,
                item_to_monitor: i.item_to_monitor,
                queue_size: i.queue_size as usize,
                monitoring_mode: i.monitoring_mode,
                sampling_interval: i.sampling_interval,
                triggered_items: BTreeSet::new(),
                discard_oldest: i.discard_oldest,
                filter: i.filter,
            };

            self.insert_existing_monitored_item(monitored_item);
        });
    }

    pub(crate) fn modify_monitored_items(&mut self, items_to_modify: &[(u32, f64, u32)]) {
        items_to_modify
            .iter()
            .for_each(|(id, sampling_interval, queue_size)| {
                if let Some(monitored_item) = self.monitored_items.get_mut(id) {
                    monitored_item.set_sampling_interval(*sampling_interval);
                    monitored_item.set_queue_size(*queue_size as usize);
                }
            });
    }

    pub(crate) fn delete_monitored_items(&mut self, items_to_delete: &[u32]) {
        items_to_delete.iter().for_each(|id| {
            if let Some(monitored_item) = self.monitored_items.remove(id) {
                let _ = self.client_handles.remove(&monitored_item.client_handle());
            }
        })
    }

    pub(crate) fn set_triggering(
        &mut self,
        triggering_item_id: u32,
        links_to_add: &[u32],
        links_to_remove: &[u32],
    ) {
        if let Some(monitored_item) = self.monitored_items.get_mut(&triggering_item_id) {
            monitored_item.set_triggering(links_to_add, links_to_remove);
        }
    }

    /// Dispatch a notification message to the user callbacks, in wire order. Returns
    /// the status of a status change notification, if the message carried one.
    pub(crate) fn on_notification(
        &mut self,
        notification: NotificationMessage,
    ) -> Option<StatusCode> {
        let mut status_change = None;
        let notifications = notification.notification_data?;

        for obj in notifications {
            match_extension_object_owned!(obj,
                v: DataChangeNotification => {
                    for notif in v.monitored_items.into_iter().flatten() {
                        let item = self
                            .client_handles
                            .get(&notif.client_handle)
                            .and_then(|id| self.monitored_items.get(id));

                        if let Some(item) = item {
                            self.callback.on_data_value(notif.value, item);
                        }
                    }
                },
                v: EventNotificationList => {
                    for notif in v.events.into_iter().flatten() {
                        let item = self
                            .client_handles
                            .get(&notif.client_handle)
                            .and_then(|id| self.monitored_items.get(id));

                        if let Some(item) = item {
                            self.callback.on_event(notif.event_fields, item);
                        }
                    }
                },
                v: StatusChangeNotification => {
                    status_change = Some(v.status);
                    self.callback.on_subscription_status_change(v);
                }
            )
        }
        status_change
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use uastack_types::{
        DataChangeNotification, DataValue, DateTime, ExtensionObject, MonitoredItemNotification,
        NotificationMessage, StatusChangeNotification, StatusCode, Variant,
    };

    use super::*;

    fn test_subscription(callback: impl OnSubscriptionNotification + 'static) -> Subscription {
        let mut subscription = Subscription::new(
            1,
            Duration::from_millis(100),
            60,
            20,
            0,
            0,
            true,
            Box::new(callback),
        );
        subscription.insert_monitored_items(vec![CreateMonitoredItem {
            id: 10,
            client_handle: 7,
            item_to_monitor: ReadValueId::default(),
            monitoring_mode: MonitoringMode::Reporting,
            queue_size: 1,
            discard_oldest: true,
            sampling_interval: 50.0,
            filter: ExtensionObject::null(),
        }]);
        subscription
    }

    fn data_change_message(sequence_number: u32, client_handle: u32) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time: DateTime::now(),
            notification_data: Some(vec![ExtensionObject::from_message(DataChangeNotification {
                monitored_items: Some(vec![MonitoredItemNotification {
                    client_handle,
                    value: DataValue::from(Variant::from(1i32)),
                }]),
                diagnostic_infos: None,
            })]),
        }
    }

    #[test]
    fn notifications_demultiplex_by_client_handle() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = hits.clone();
        let mut subscription = test_subscription(DataChangeCallback::new(move |_value, item| {
            assert_eq!(item.client_handle(), 7);
            assert_eq!(item.id(), 10);
            hits_clone.fetch_add(1, Ordering::Relaxed);
        }));

        assert!(subscription.on_notification(data_change_message(1, 7)).is_none());
        // A notification for a handle this subscription doesn't know is skipped.
        assert!(subscription.on_notification(data_change_message(2, 99)).is_none());
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn status_change_is_surfaced() {
        let mut subscription = test_subscription(SubscriptionCallbacks::new(
            |status: StatusChangeNotification| {
                assert_eq!(status.status, StatusCode::BadTimeout);
            },
            |_, _| {},
            |_, _| {},
        ));
        let message = NotificationMessage {
            sequence_number: 1,
            publish_time: DateTime::now(),
            notification_data: Some(vec![ExtensionObject::from_message(
                StatusChangeNotification {
                    status: StatusCode::BadTimeout,
                    diagnostic_info: Default::default(),
                },
            )]),
        };
        assert_eq!(
            subscription.on_notification(message),
            Some(StatusCode::BadTimeout)
        );
    }

    #[test]
    fn deleting_item_unregisters_handle() {
        let mut subscription = test_subscription(DataChangeCallback::new(|_, _| {
            panic!("no notification expected after delete");
        }));
        subscription.delete_monitored_items(&[10]);
        assert!(subscription.monitored_items().is_empty());
        assert!(subscription.on_notification(data_change_message(1, 7)).is_none());
    }
}
