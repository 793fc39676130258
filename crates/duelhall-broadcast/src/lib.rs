//! Channel fan-out for Duelhall.
//!
//! Engine components publish [`Event`]s to a [`Channel`] through the
//! [`Broadcaster`] trait and never see who is listening. [`ChannelHub`] is
//! the in-process implementation: each subscriber is a bounded mpsc
//! sender fed with `try_send`, so publishing never blocks an actor or the
//! request manager, and a subscriber that stops reading is evicted rather
//! than buffered without limit.
//!
//! # Key types
//!
//! - [`Broadcaster`]: what publishers depend on
//! - [`ChannelHub`]: subscriber registry keyed by channel
//! - [`Subscription`]: a receiver bound to one channel

mod hub;

use std::sync::Arc;

use duelhall_protocol::{Channel, Event};

pub use hub::{
    ChannelHub, DEFAULT_SUBSCRIBER_BUFFER, EventReceiver, EventSender, Registration, SubscriberId,
    Subscription,
};

/// Publishes events to everyone subscribed to a channel.
///
/// `publish` is synchronous and infallible: a missing or slow listener is
/// never the publisher's problem.
pub trait Broadcaster: Send + Sync + 'static {
    fn publish(&self, channel: Channel, event: Event);
}

impl<B: Broadcaster + ?Sized> Broadcaster for Arc<B> {
    fn publish(&self, channel: Channel, event: Event) {
        (**self).publish(channel, event);
    }
}
