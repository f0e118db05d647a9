//! The publish worker: a single task per session that keeps a window of outstanding
//! publish requests open against the server, demultiplexes the notification messages to
//! subscription callbacks, acknowledges sequence numbers, and fills gaps with republish
//! requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::FuturesUnordered;
use futures::{Future, Stream, StreamExt};
use log::debug;

use uastack_core::comms::chunker::next_sequence_number;
use uastack_types::{NotificationMessage, PublishResponse, StatusCode};

use crate::session::{session_debug, session_warn, Session};

/// The number of missing sequence numbers the worker is willing to republish for one
/// response. A gap beyond this indicates a counting bug on one side, chasing it with
/// thousands of republish requests helps nobody.
const MAX_REPUBLISH_GAP: usize = 256;

/// Delay between publish attempts after a failure, so a persistently failing channel
/// does not busy-loop.
const PUBLISH_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Subscription-related activity yielded by the session event loop.
#[derive(Debug, Clone)]
pub enum SubscriptionActivity {
    /// A publish response was processed and its notifications dispatched.
    Publish,
    /// A publish request failed.
    PublishFailed(StatusCode),
    /// A missed notification was recovered through republish.
    Republish(u32),
    /// A subscription was dropped by the server and recreated.
    SubscriptionRecreated(u32),
}

/// The publish side of the subscription pipeline. Constructed by the session event loop
/// whenever a connection is established.
pub(crate) struct SubscriptionEventLoop {
    session: Arc<Session>,
    trigger_publish_recv: tokio::sync::watch::Receiver<Instant>,
}

impl SubscriptionEventLoop {
    pub(crate) fn new(
        session: Arc<Session>,
        trigger_publish_recv: tokio::sync::watch::Receiver<Instant>,
    ) -> Self {
        Self {
            session,
            trigger_publish_recv,
        }
    }

    /// Run the worker as a stream of activity events. The stream never ends on its own,
    /// it is dropped together with the connection that spawned it.
    pub(crate) fn run(self) -> impl Stream<Item = SubscriptionActivity> {
        futures::stream::unfold(
            SubscriptionEventLoopState {
                session: self.session,
                trigger_publish_recv: self.trigger_publish_recv,
                futures: FuturesUnordered::new(),
                target_override: None,
                retry_at: None,
            },
            |mut state| async move {
                loop {
                    state.top_up();

                    if state.futures.is_empty() {
                        // Nothing outstanding: either in a failure backoff, or there are
                        // no subscriptions. Wait for the backoff or for a trigger.
                        if let Some(retry_at) = state.retry_at {
                            tokio::select! {
                                _ = tokio::time::sleep_until(retry_at.into()) => {}
                                r = state.trigger_publish_recv.changed() => {
                                    if r.is_err() {
                                        return None;
                                    }
                                    state.target_override = None;
                                }
                            }
                            continue;
                        }
                        if state.trigger_publish_recv.changed().await.is_err() {
                            // The session is gone, wind the stream down.
                            return None;
                        }
                        continue;
                    }

                    tokio::select! {
                        r = state.trigger_publish_recv.changed() => {
                            if r.is_err() {
                                return None;
                            }
                            // Subscription set changed, recompute the window.
                            state.target_override = None;
                            continue;
                        }
                        r = state.futures.next() => {
                            let Some(r) = r else { continue };
                            let activity = state.handle_publish_result(r).await;
                            return Some((activity, state));
                        }
                    }
                }
            },
        )
    }
}

type PublishFuture =
    std::pin::Pin<Box<dyn Future<Output = Result<Box<PublishResponse>, StatusCode>> + Send>>;

struct SubscriptionEventLoopState {
    session: Arc<Session>,
    trigger_publish_recv: tokio::sync::watch::Receiver<Instant>,
    futures: FuturesUnordered<PublishFuture>,
    /// A window ceiling imposed by the server through BadTooManyPublishRequests.
    target_override: Option<usize>,
    /// Do not issue new publish requests before this instant.
    retry_at: Option<Instant>,
}

impl SubscriptionEventLoopState {
    /// The number of publish requests to keep outstanding: two, or one per
    /// subscription if there are more, clamped by the configured ceiling and by
    /// whatever the server told us it will tolerate.
    fn target_outstanding(&self) -> usize {
        let subscriptions = {
            let state = self.session.subscription_state.lock();
            state.len()
        };
        if subscriptions == 0 {
            return 0;
        }
        let scaled = subscriptions.max(2).min(self.session.max_publish_requests);
        match self.target_override {
            Some(limit) => scaled.min(limit),
            None => scaled,
        }
    }

    /// Issue publish requests until the window is full.
    fn top_up(&mut self) {
        if self
            .retry_at
            .is_some_and(|retry_at| retry_at > Instant::now())
        {
            return;
        }
        self.retry_at = None;
        let target = self.target_outstanding();
        while self.futures.len() < target {
            let session = self.session.clone();
            self.futures
                .push(Box::pin(async move { session.publish().await }));
        }
    }

    async fn handle_publish_result(
        &mut self,
        result: Result<Box<PublishResponse>, StatusCode>,
    ) -> SubscriptionActivity {
        match result {
            Ok(response) => {
                let activity = self.handle_publish_response(*response).await;
                self.top_up();
                activity
            }
            Err(e) => {
                match e {
                    StatusCode::BadTooManyPublishRequests => {
                        // The server will not queue this many requests. Shrink the
                        // window by one and carry on; it re-grows when the
                        // subscription set changes.
                        let new_limit = self.futures.len().max(1);
                        session_debug!(
                            self.session,
                            "Server refused publish request, limiting outstanding requests to {new_limit}"
                        );
                        self.target_override = Some(new_limit);
                    }
                    StatusCode::BadNoSubscription | StatusCode::BadSessionClosed => {
                        // Nothing to publish for. The worker idles until triggered.
                        self.retry_at = Some(Instant::now() + PUBLISH_RETRY_DELAY);
                    }
                    StatusCode::BadTimeout => {
                        // The local timer beat the server's keep alive cadence, which
                        // is routine when nothing changes. Just re-issue.
                    }
                    _ => {
                        self.retry_at = Some(Instant::now() + PUBLISH_RETRY_DELAY);
                    }
                }
                SubscriptionActivity::PublishFailed(e)
            }
        }
    }

    /// Process one publish response: check sequence continuity, recover any gap with
    /// republish, dispatch to callbacks and queue the acknowledgement.
    async fn handle_publish_response(&mut self, response: PublishResponse) -> SubscriptionActivity {
        let subscription_id = response.subscription_id;
        let message = response.notification_message;
        let sequence_number = message.sequence_number;

        let expected = {
            let state = self.session.subscription_state.lock();
            let Some(subscription) = state.get(subscription_id) else {
                // Deleted locally while the response was in flight; drain silently.
                debug!("Discarding notification for unknown subscription {subscription_id}");
                return SubscriptionActivity::Publish;
            };
            match subscription.last_sequence_number() {
                0 => sequence_number,
                last => next_sequence_number(last),
            }
        };

        // Notifications across responses are delivered in sequence number order. A gap
        // blocks delivery of this message until republish resolves or fails.
        let mut republished = 0u32;
        if !message.is_keep_alive() && sequence_number != expected {
            let mut missing = Vec::new();
            let mut cursor = expected;
            while cursor != sequence_number && missing.len() < MAX_REPUBLISH_GAP {
                missing.push(cursor);
                cursor = next_sequence_number(cursor);
            }
            if missing.len() >= MAX_REPUBLISH_GAP {
                session_warn!(
                    self.session,
                    "Subscription {subscription_id} sequence jumped from {expected} to {sequence_number}, not recoverable by republish"
                );
            } else {
                for seq in missing {
                    match self.session.republish(subscription_id, seq).await {
                        Ok(notification) => {
                            session_debug!(
                                self.session,
                                "Republished message {seq} for subscription {subscription_id}"
                            );
                            self.dispatch(subscription_id, notification);
                            republished += 1;
                        }
                        Err(StatusCode::BadMessageNotAvailable) => {
                            // The server has discarded the message. Advance past the
                            // gap, with a note for whoever audits data completeness.
                            session_warn!(
                                self.session,
                                "Subscription {subscription_id} integrity: message {seq} was lost, the server no longer has it"
                            );
                            self.skip_sequence(subscription_id, seq);
                        }
                        Err(e) => {
                            session_warn!(
                                self.session,
                                "Republish of {seq} for subscription {subscription_id} failed: {e}, abandoning the gap"
                            );
                            self.skip_sequence(subscription_id, seq);
                        }
                    }
                }
            }
        }

        let mut recreated = None;
        if message.is_keep_alive() {
            // Keep alives carry the next expected sequence number and are not
            // acknowledged.
        } else {
            if let Some(status) = self.dispatch(subscription_id, message) {
                // A status change closed the subscription server-side. BadTimeout means
                // it ran out of lifetime, the session recreates it.
                if status == StatusCode::BadTimeout {
                    session_warn!(
                        self.session,
                        "Subscription {subscription_id} timed out on the server, recreating it"
                    );
                    if self.session.recreate_subscription(subscription_id).await.is_ok() {
                        recreated = Some(subscription_id);
                    }
                }
            }
        }

        if let Some(id) = recreated {
            SubscriptionActivity::SubscriptionRecreated(id)
        } else if republished > 0 {
            SubscriptionActivity::Republish(republished)
        } else {
            SubscriptionActivity::Publish
        }
    }

    /// Dispatch a notification message to its subscription, in wire order, advancing
    /// the sequence tracking and queueing the acknowledgement. Returns the status of a
    /// status change notification if the message carried one.
    fn dispatch(
        &mut self,
        subscription_id: u32,
        message: NotificationMessage,
    ) -> Option<StatusCode> {
        let sequence_number = message.sequence_number;
        let mut state = self.session.subscription_state.lock();
        let subscription = state.get_mut(subscription_id)?;
        let status_change = subscription.on_notification(message);
        subscription.set_last_sequence_number(sequence_number);
        state.add_acknowledgement(subscription_id, sequence_number);
        status_change
    }

    fn skip_sequence(&mut self, subscription_id: u32, sequence_number: u32) {
        let mut state = self.session.subscription_state.lock();
        if let Some(subscription) = state.get_mut(subscription_id) {
            subscription.set_last_sequence_number(sequence_number);
        }
    }
}

#[cfg(test)]
mod tests {
    use uastack_core::comms::chunker::next_sequence_number;

    #[test]
    fn gap_walk_respects_wrap() {
        // Counting from just below the wrap point crosses over to 1.
        let mut cursor = 4_294_966_270;
        let mut seen = Vec::new();
        for _ in 0..3 {
            cursor = next_sequence_number(cursor);
            seen.push(cursor);
        }
        assert_eq!(seen, vec![4_294_966_271, 1, 2]);
    }
}
