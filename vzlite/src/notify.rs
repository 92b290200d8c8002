//! Unbounded broadcast channel.
//!
//! Producers never block: each subscriber owns an unbounded queue and a
//! publish appends a clone of the value to every queue. A subscriber receives
//! every value published after it subscribed, in publish order. Closing is
//! terminal: subscribers drain what was already queued and then observe the
//! end of the stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Broadcast sender side, shared by producers.
pub struct NotifyChannel<T> {
    inner: Mutex<NotifyInner<T>>,
}

struct NotifyInner<T> {
    subscribers: Vec<UnboundedSender<T>>,
    closed: bool,
}

impl<T: Clone + Send + 'static> NotifyChannel<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(NotifyInner {
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Attach a new subscriber.
    ///
    /// Subscribing to a closed channel yields a stream that ends immediately.
    pub fn subscribe(&self) -> NotifyReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        NotifyReceiver { rx }
    }

    /// Deliver a value to every live subscriber.
    ///
    /// Returns the number of subscribers that received it. Subscribers whose
    /// receiver was dropped are pruned. Publishing after close delivers nothing.
    pub fn publish(&self, value: T) -> usize {
        let mut inner = self.inner.lock();
        if inner.closed {
            tracing::trace!("Dropping value published after close");
            return 0;
        }
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(value.clone()).is_ok());
        inner.subscribers.len()
    }

    /// Close the channel. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        inner.closed = true;
        inner.subscribers.clear();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl<T: Clone + Send + 'static> Default for NotifyChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive-only side of one subscription.
///
/// Usable from plain threads (`blocking_recv`) and from async code (`recv`,
/// or as a [`Stream`]).
#[derive(Debug)]
pub struct NotifyReceiver<T> {
    rx: UnboundedReceiver<T>,
}

impl<T> NotifyReceiver<T> {
    /// Wait for the next value. `None` once the channel is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Block the current thread until the next value arrives.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_recv(&mut self) -> Option<T> {
        self.rx.blocking_recv()
    }

    /// Take the next value if one is queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Blocking iterator over the remaining values, for plain threads.
    pub fn blocking_iter(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.blocking_recv())
    }
}

impl<T> Stream for NotifyReceiver<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}
