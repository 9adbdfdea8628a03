//! Ordered fan-out of one event kind to any number of receivers.

use tokio::sync::mpsc;

#[derive(Debug)]
pub struct Subscribers<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            senders: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    /// Deliver to every live receiver in registration order; receivers that
    /// have been dropped are pruned.
    pub fn publish(&mut self, value: &T) {
        self.senders.retain(|tx| tx.send(value.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl<T: Clone> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}
