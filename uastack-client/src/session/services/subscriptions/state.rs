//! Bookkeeping for the session's subscriptions: the subscription map, the pending
//! acknowledgements, and per-subscription sequence number tracking.

use hashbrown::HashMap;

use uastack_types::SubscriptionAcknowledgement;

use super::Subscription;

/// The subscription bookkeeping of one session. Lives behind the session's subscription
/// state mutex; the publish worker and user calls both go through it.
pub(crate) struct SubscriptionState {
    /// Subscriptions by server-assigned id.
    subscriptions: HashMap<u32, Subscription>,
    /// Sequence numbers received since the last successful publish, to be acknowledged
    /// in the next publish request.
    pending_acks: Vec<SubscriptionAcknowledgement>,
}

impl SubscriptionState {
    pub(crate) fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            pending_acks: Vec::new(),
        }
    }

    /// The number of subscriptions.
    pub(crate) fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// The ids of all subscriptions.
    pub(crate) fn subscription_ids(&self) -> Vec<u32> {
        self.subscriptions.keys().copied().collect()
    }

    pub(crate) fn get(&self, subscription_id: u32) -> Option<&Subscription> {
        self.subscriptions.get(&subscription_id)
    }

    pub(crate) fn get_mut(&mut self, subscription_id: u32) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(&subscription_id)
    }

    /// Add a subscription created on the server.
    pub(crate) fn insert(&mut self, subscription: Subscription) {
        self.subscriptions
            .insert(subscription.subscription_id(), subscription);
    }

    /// Remove a subscription, dropping any acks still pending for it.
    pub(crate) fn remove(&mut self, subscription_id: u32) -> Option<Subscription> {
        self.pending_acks
            .retain(|ack| ack.subscription_id != subscription_id);
        self.subscriptions.remove(&subscription_id)
    }

    /// Re-key a subscription after it was recreated on the server under a new id.
    pub(crate) fn rekey(&mut self, old_subscription_id: u32, new_subscription_id: u32) {
        if let Some(mut subscription) = self.remove(old_subscription_id) {
            subscription.set_subscription_id(new_subscription_id);
            // Sequence numbers restart with the new server-side subscription.
            subscription.set_last_sequence_number(0);
            self.insert(subscription);
        }
    }

    /// Queue an acknowledgement for delivery with the next publish request.
    pub(crate) fn add_acknowledgement(&mut self, subscription_id: u32, sequence_number: u32) {
        self.pending_acks.push(SubscriptionAcknowledgement {
            subscription_id,
            sequence_number,
        });
    }

    /// Take all pending acknowledgements. The caller returns them with
    /// [`Self::return_acknowledgements`] if the publish request fails.
    pub(crate) fn take_acknowledgements(&mut self) -> Vec<SubscriptionAcknowledgement> {
        std::mem::take(&mut self.pending_acks)
    }

    /// Put unsent acknowledgements back for the next attempt.
    pub(crate) fn return_acknowledgements(&mut self, acks: Vec<SubscriptionAcknowledgement>) {
        let known = |ack: &SubscriptionAcknowledgement| {
            self.subscriptions.contains_key(&ack.subscription_id)
        };
        self.pending_acks.extend(acks.into_iter().filter(known));
    }
}
