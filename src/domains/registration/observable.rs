//! Reactive state holders shared with the presentation layer.
//!
//! `Observable` carries persistent state: the latest value is always readable and
//! late subscribers see it immediately. `EventChannel` carries one-shot commands
//! that are consumed exactly once and never replayed.

use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// Last-value-wins cell with change notification
pub struct Observable<T> {
    sender: Arc<watch::Sender<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Replace the value and notify subscribers, even if nobody is subscribed yet
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Read the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.sender.borrow())
    }
}

impl<T: Clone> Observable<T> {
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }
}

impl<T: PartialEq> Observable<T> {
    /// Store `value` only when it differs. Returns whether it changed.
    pub fn set_if_changed(&self, value: T) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

/// Single-consumer queue of one-shot events
pub struct EventChannel<T> {
    sender: mpsc::UnboundedSender<T>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<T>>>,
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventChannel<T> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    pub fn emit(&self, event: T) {
        // Only fails once the consumer dropped its receiver; nothing is listening then.
        if self.sender.send(event).is_err() {
            log::debug!("Event dropped: receiver closed");
        }
    }

    /// Hand the receiving end to the presentation layer. Only the first call gets it.
    pub fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<T>> {
        self.receiver.lock().ok().and_then(|mut slot| slot.take())
    }
}
