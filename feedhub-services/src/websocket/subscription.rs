//! Per-session channel subscriptions
//!
//! A session subscribes to channels by wire name. Each subscription owns a
//! bounded inbound queue drained by its own task, which runs the channel's
//! reply function and puts the reply straight onto the session's outbound
//! queue.

use feedhub_core::{ChannelKind, Envelope, FeedError, FeedResult};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::hub::SessionId;
use super::replies::ChannelReplies;

/// One channel subscription, owned by its session
#[derive(Debug)]
pub struct Subscription {
    channel: ChannelKind,
    inbound: mpsc::Sender<Envelope>,
    task: JoinHandle<()>,
    cancelled: bool,
}

impl Subscription {
    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Stop the channel task; queued requests are discarded
    pub fn cancel(&mut self) {
        if !self.cancelled {
            self.cancelled = true;
            self.task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// What happened to a dispatched envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Queued on the channel's inbound queue
    Queued,
    /// The event names no known channel
    UnknownChannel,
    /// Known channel, but this session is not subscribed to it
    NotSubscribed,
    /// The channel's inbound queue is full; the envelope was dropped
    QueueFull,
}

/// Channel name -> subscription map for one session
#[derive(Debug)]
pub struct SubscriptionMap {
    session: SessionId,
    outbound: mpsc::Sender<String>,
    replies: Arc<ChannelReplies>,
    queue_capacity: usize,
    subscriptions: HashMap<ChannelKind, Subscription>,
}

impl SubscriptionMap {
    pub fn new(
        session: SessionId,
        outbound: mpsc::Sender<String>,
        replies: Arc<ChannelReplies>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            session,
            outbound,
            replies,
            queue_capacity: queue_capacity.max(1),
            subscriptions: HashMap::new(),
        }
    }

    /// Subscribe to `channel_name`
    ///
    /// An existing subscription to the same channel is cancelled and
    /// replaced. Unknown names are rejected.
    pub fn subscribe(&mut self, channel_name: &str) -> FeedResult<&Subscription> {
        let channel = ChannelKind::parse(channel_name)
            .ok_or_else(|| FeedError::unknown_channel(channel_name))?;
        let subscription = self.spawn_channel(channel);

        match self.subscriptions.entry(channel) {
            Entry::Occupied(mut entry) => {
                debug!(session = %self.session, %channel, "Replacing subscription");
                entry.get_mut().cancel();
                entry.insert(subscription);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                debug!(session = %self.session, %channel, "Subscribed");
                Ok(entry.insert(subscription))
            }
        }
    }

    /// Subscribe to every known channel
    pub fn subscribe_all(&mut self) -> FeedResult<()> {
        for channel in ChannelKind::ALL {
            self.subscribe(channel.as_str())?;
        }
        Ok(())
    }

    /// Route an inbound envelope to the subscription named by its event
    pub fn dispatch(&self, envelope: Envelope) -> Dispatch {
        let Some(channel) = ChannelKind::parse(&envelope.event) else {
            debug!(session = %self.session, event = %envelope.event, "Dropping frame for unknown channel");
            return Dispatch::UnknownChannel;
        };

        let Some(subscription) = self.subscriptions.get(&channel) else {
            debug!(session = %self.session, %channel, "Dropping frame for unsubscribed channel");
            return Dispatch::NotSubscribed;
        };

        match subscription.inbound.try_send(envelope) {
            Ok(()) => Dispatch::Queued,
            Err(TrySendError::Full(_)) => {
                warn!(session = %self.session, %channel, "Subscription queue full, dropping frame");
                Dispatch::QueueFull
            }
            // Task gone: treat like not subscribed
            Err(TrySendError::Closed(_)) => Dispatch::NotSubscribed,
        }
    }

    /// Cancel and remove the subscription to `channel`
    pub fn unsubscribe(&mut self, channel: ChannelKind) -> bool {
        match self.subscriptions.remove(&channel) {
            Some(mut subscription) => {
                subscription.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every subscription
    pub fn cancel_all(&mut self) {
        for (_, mut subscription) in self.subscriptions.drain() {
            subscription.cancel();
        }
    }

    pub fn get(&self, channel: ChannelKind) -> Option<&Subscription> {
        self.subscriptions.get(&channel)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    fn spawn_channel(&self, channel: ChannelKind) -> Subscription {
        let (inbound, inbound_rx) = mpsc::channel(self.queue_capacity);
        let task = tokio::spawn(run_channel(
            self.session,
            channel,
            inbound_rx,
            Arc::clone(&self.replies),
            self.outbound.clone(),
        ));

        Subscription {
            channel,
            inbound,
            task,
            cancelled: false,
        }
    }
}

impl Drop for SubscriptionMap {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn run_channel(
    session: SessionId,
    channel: ChannelKind,
    mut inbound: mpsc::Receiver<Envelope>,
    replies: Arc<ChannelReplies>,
    outbound: mpsc::Sender<String>,
) {
    while let Some(request) = inbound.recv().await {
        let frame = match replies.reply(channel, &request).and_then(|reply| reply.to_json()) {
            Ok(frame) => frame,
            Err(e) => {
                error!(%session, %channel, "Failed to build reply: {}", e);
                continue;
            }
        };

        match outbound.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(%session, %channel, "Outbound queue full, dropping reply");
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }
}
