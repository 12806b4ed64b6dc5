//! Bounded, interrupt-safe FIFO of Micronet frames between the radio ISR
//! (producer) and the foreground task (consumer).
//!
//! The store is a fixed ring guarded by a critical section, so `push` may
//! be called from interrupt context. A full FIFO drops the incoming frame;
//! frames are delivered strictly in capture order and consumed by exactly
//! one pop.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::protocol::frame::MicronetMessage;

/// Default capacity of the frame FIFO.
pub const MESSAGE_STORE_SIZE: usize = 16;

/// Ring storage. Only touched under the critical section.
struct Store<const N: usize> {
    slots: [MicronetMessage; N],
    write_index: usize,
    read_index: usize,
    count: usize,
}

impl<const N: usize> Store<N> {
    const fn new() -> Self {
        Self {
            slots: [MicronetMessage::new(); N],
            write_index: 0,
            read_index: 0,
            count: 0,
        }
    }
}

/// Interrupt-safe bounded frame queue.
pub struct MessageFifo<const N: usize = MESSAGE_STORE_SIZE> {
    store: Mutex<CriticalSectionRawMutex, RefCell<Store<N>>>,
}

impl<const N: usize> Default for MessageFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MessageFifo<N> {
    pub const fn new() -> Self {
        Self {
            store: Mutex::new(RefCell::new(Store::new())),
        }
    }

    /// Append a frame. Returns `false` when the FIFO is full; the frame is
    /// then dropped. Callable from interrupt context.
    pub fn push(&self, message: &MicronetMessage) -> bool {
        self.store.lock(|store| {
            let mut store = store.borrow_mut();
            if store.count >= N {
                return false;
            }
            let index = store.write_index;
            store.slots[index] = *message;
            store.write_index = (index + 1) % N;
            store.count += 1;
            true
        })
    }

    /// Remove and return the oldest frame, if any.
    pub fn pop(&self) -> Option<MicronetMessage> {
        self.store.lock(|store| {
            let mut store = store.borrow_mut();
            if store.count == 0 {
                return None;
            }
            let index = store.read_index;
            let message = store.slots[index];
            store.read_index = (index + 1) % N;
            store.count -= 1;
            Some(message)
        })
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.store.lock(|store| store.borrow().count)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard everything queued.
    pub fn reset(&self) {
        self.store.lock(|store| {
            let mut store = store.borrow_mut();
            store.read_index = store.write_index;
            store.count = 0;
        });
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
