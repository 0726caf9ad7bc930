//! Loopback endpoints for exercising devices without hardware.
//!
//! [`pair`] returns two full-duplex endpoints: whatever one end sends, the
//! other end receives, with the same last-write-wins semantics as every other
//! device channel.

use std::sync::{Arc, Mutex, PoisonError};

use hs_system::SystemSnapshot;

use crate::device::{InputDevice, OutputDevice};
use crate::error::{DeviceError, DeviceResult};
use crate::slot::{LatestSlot, SlotReader, SlotWriter};

/// One side of a loopback link.
#[derive(Debug)]
pub struct LoopbackEnd<T> {
    tx: SlotWriter<T>,
    rx: SlotReader<T>,
}

/// Create two connected endpoints.
pub fn pair<T>() -> (LoopbackEnd<T>, LoopbackEnd<T>) {
    let (a_tx, b_rx) = LatestSlot::new();
    let (b_tx, a_rx) = LatestSlot::new();
    (
        LoopbackEnd { tx: a_tx, rx: a_rx },
        LoopbackEnd { tx: b_tx, rx: b_rx },
    )
}

impl<T> LoopbackEnd<T> {
    pub fn send(&self, value: T) {
        self.tx.put(value);
    }

    pub fn recv(&self) -> Option<T> {
        self.rx.take()
    }

    /// Separate the two directions so each can be owned by its own device.
    pub fn split(self) -> (SlotWriter<T>, SlotReader<T>) {
        (self.tx, self.rx)
    }
}

/// Shared record of the most recent value a loopback device handled.
#[derive(Debug)]
pub struct LastValue<T>(Arc<Mutex<Option<T>>>);

impl<T> Clone for LastValue<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for LastValue<T> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }
}

impl<T: Clone> LastValue<T> {
    pub fn get(&self) -> Option<T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, value: T) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }
}

/// Output device that extracts a value from each snapshot and sends it
/// down a loopback direction.
pub struct LoopbackSender<T, F> {
    name: String,
    tx: SlotWriter<T>,
    extract: F,
    last: LastValue<T>,
}

impl<T, F> LoopbackSender<T, F>
where
    T: Clone + Send + 'static,
    F: FnMut(&SystemSnapshot) -> Option<T> + Send + 'static,
{
    pub fn new(name: impl Into<String>, tx: SlotWriter<T>, extract: F) -> Self {
        Self {
            name: name.into(),
            tx,
            extract,
            last: LastValue::default(),
        }
    }

    /// Handle to the last value written, readable after the device is attached.
    pub fn last_sent(&self) -> LastValue<T> {
        self.last.clone()
    }
}

impl<T, F> OutputDevice for LoopbackSender<T, F>
where
    T: Clone + Send + 'static,
    F: FnMut(&SystemSnapshot) -> Option<T> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, snapshot: &SystemSnapshot) -> DeviceResult<()> {
        if self.tx.is_closed() {
            return Err(DeviceError::Disconnected {
                device: self.name.clone(),
            });
        }
        if let Some(value) = (self.extract)(snapshot) {
            self.tx.put(value.clone());
            self.last.set(value);
        }
        Ok(())
    }
}

/// Input device that forwards whatever arrives on a loopback direction.
pub struct LoopbackReceiver<T> {
    name: String,
    rx: SlotReader<T>,
    last: LastValue<T>,
}

impl<T: Clone + Send + 'static> LoopbackReceiver<T> {
    pub fn new(name: impl Into<String>, rx: SlotReader<T>) -> Self {
        Self {
            name: name.into(),
            rx,
            last: LastValue::default(),
        }
    }

    pub fn last_received(&self) -> LastValue<T> {
        self.last.clone()
    }
}

impl<T: Clone + Send + 'static> InputDevice<T> for LoopbackReceiver<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> DeviceResult<Option<T>> {
        let value = self.rx.take();
        if let Some(v) = &value {
            self.last.set(v.clone());
        }
        Ok(value)
    }
}
