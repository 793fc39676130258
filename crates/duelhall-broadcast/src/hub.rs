//! In-process subscriber registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use duelhall_protocol::{Channel, Event};
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::Broadcaster;

/// Events a subscriber may have queued before it counts as lagging.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Where a subscriber receives events. The channel travels with the event
/// so one receiver can serve several subscriptions.
pub type EventSender = mpsc::Sender<(Channel, Event)>;

pub type EventReceiver = mpsc::Receiver<(Channel, Event)>;

/// Identifies one listener across all the channels it joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A listener registered with [`ChannelHub::register`].
///
/// If the listener's queue fills up, the hub drops it from every channel
/// and [`evicted`](Self::evicted) completes.
pub struct Registration {
    pub id: SubscriberId,
    evicted: Arc<Notify>,
}

impl Registration {
    /// Completes once the hub has evicted this listener.
    pub async fn evicted(&self) {
        self.evicted.notified().await;
    }
}

/// A receiver bound to a single channel, returned by
/// [`ChannelHub::subscribe`].
pub struct Subscription {
    pub id: SubscriberId,
    pub channel: Channel,
    receiver: EventReceiver,
}

impl Subscription {
    /// Waits for the next event. `None` once the hub dropped the sender.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await.map(|(_, event)| event)
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok().map(|(_, event)| event)
    }

    /// Everything queued right now, in publish order.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

type Subscribers = HashMap<SubscriberId, EventSender>;

/// Maps each channel to its live subscribers.
///
/// Every subscriber has a bounded queue. Publishing never waits: a
/// subscriber whose queue is full is evicted from all channels instead.
/// The lock is only held while cloning events into senders; it is never
/// held across an `.await`.
pub struct ChannelHub {
    channels: Mutex<HashMap<Channel, Subscribers>>,
    /// Eviction signals of registered listeners. Locked after `channels`.
    signals: Mutex<HashMap<SubscriberId, Arc<Notify>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::with_buffer(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub whose subscribers may queue up to `buffer` events.
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            signals: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            buffer: buffer.max(1),
        }
    }

    /// Queue size to use for senders passed to [`attach`](Self::attach).
    pub fn buffer(&self) -> usize {
        self.buffer
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Channel, Subscribers>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signals(&self) -> MutexGuard<'_, HashMap<SubscriberId, Arc<Notify>>> {
        self.signals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Registers a listener that will [`attach`](Self::attach) its own
    /// sender to one or more channels.
    pub fn register(&self) -> Registration {
        let id = self.next_id();
        let evicted = Arc::new(Notify::new());
        self.signals().insert(id, Arc::clone(&evicted));
        Registration { id, evicted }
    }

    /// Subscribes a fresh receiver to `channel`.
    pub fn subscribe(&self, channel: Channel) -> Subscription {
        let id = self.next_id();
        let (tx, rx) = mpsc::channel(self.buffer);
        self.attach(channel, id, tx);
        Subscription {
            id,
            channel,
            receiver: rx,
        }
    }

    /// Routes events on `channel` to `sender`. Re-attaching the same id
    /// replaces its sender.
    pub fn attach(&self, channel: Channel, id: SubscriberId, sender: EventSender) {
        self.lock().entry(channel).or_default().insert(id, sender);
        tracing::debug!(%channel, subscriber = %id, "subscribed");
    }

    /// Removes `id` from `channel`. Returns `false` if it was not there.
    pub fn unsubscribe(&self, channel: Channel, id: SubscriberId) -> bool {
        let mut channels = self.lock();
        let Some(subscribers) = channels.get_mut(&channel) else {
            return false;
        };
        let removed = subscribers.remove(&id).is_some();
        if subscribers.is_empty() {
            channels.remove(&channel);
        }
        removed
    }

    /// Removes `id` from every channel and forgets it, e.g. when its
    /// socket closes.
    pub fn unsubscribe_all(&self, id: SubscriberId) {
        remove_everywhere(&mut self.lock(), id);
        self.signals().remove(&id);
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.lock().get(&channel).map_or(0, HashMap::len)
    }
}

fn remove_everywhere(channels: &mut HashMap<Channel, Subscribers>, id: SubscriberId) {
    channels.retain(|_, subscribers| {
        subscribers.remove(&id);
        !subscribers.is_empty()
    });
}

impl Broadcaster for ChannelHub {
    fn publish(&self, channel: Channel, event: Event) {
        let mut channels = self.lock();
        let Some(subscribers) = channels.get_mut(&channel) else {
            tracing::trace!(%channel, event = event.name(), "no subscribers");
            return;
        };

        // Receivers that hung up are pruned on the way.
        let mut lagging = Vec::new();
        subscribers.retain(|id, sender| match sender.try_send((channel, event.clone())) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                lagging.push(*id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
        tracing::trace!(
            %channel,
            event = event.name(),
            delivered = subscribers.len(),
            "published"
        );
        if subscribers.is_empty() {
            channels.remove(&channel);
        }

        for id in lagging {
            tracing::warn!(%channel, subscriber = %id, "subscriber queue full, evicted");
            remove_everywhere(&mut channels, id);
            if let Some(signal) = self.signals().remove(&id) {
                signal.notify_one();
            }
        }
    }
}
