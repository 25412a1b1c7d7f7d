//! Reorders video emissions into output order.
//!
//! Pieces emit video slightly out of order (gap fill, 3D eyes, several
//! pieces interleaving). The shuffler holds emissions until the player
//! knows nothing earlier can still arrive, then hands them back sorted by
//! time with the left eye before the right.

use reelsync_core::limits::SHUFFLER_CAPACITY;
use reelsync_core::{DCPTime, Eyes, ReelError, Result};
use std::collections::BTreeMap;
use tracing::trace;

type Key = (DCPTime, u8);

/// Bounded reorder queue of items tagged with a time and an eye.
pub struct Shuffler<T> {
    queue: BTreeMap<Key, (usize, T)>,
    last_released: Option<Key>,
    capacity: usize,
}

impl<T> Shuffler<T> {
    pub fn new() -> Self {
        Self::with_capacity(SHUFFLER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: BTreeMap::new(),
            last_released: None,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue `item`. At an identical time and eye, the higher `layer` wins.
    pub fn push(&mut self, time: DCPTime, eyes: Eyes, layer: usize, item: T) -> Result<()> {
        let key = (time, eyes.order());
        if let Some(last) = self.last_released {
            if key < last {
                return Err(ReelError::Ordering(format!(
                    "video at {} ({:?}) arrived after {} was released",
                    time, eyes, last.0
                )));
            }
            if key == last {
                trace!(%time, ?eyes, "Dropping video for a slot already released");
                return Ok(());
            }
        }

        if let Some((existing, _)) = self.queue.get(&key) {
            if layer >= *existing {
                self.queue.insert(key, (layer, item));
            }
            return Ok(());
        }

        if self.queue.len() >= self.capacity {
            return Err(ReelError::Ordering(format!(
                "reorder queue full ({} entries) at {}",
                self.capacity, time
            )));
        }
        self.queue.insert(key, (layer, item));
        Ok(())
    }

    /// Everything earlier than `watermark`, in order.
    pub fn release(&mut self, watermark: DCPTime) -> Vec<(DCPTime, T)> {
        let later = self.queue.split_off(&(watermark, 0));
        let ready = std::mem::replace(&mut self.queue, later);
        self.take(ready)
    }

    /// Everything, in order.
    pub fn flush(&mut self) -> Vec<(DCPTime, T)> {
        let ready = std::mem::take(&mut self.queue);
        self.take(ready)
    }

    /// Forget everything, for a seek.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.last_released = None;
    }

    fn take(&mut self, ready: BTreeMap<Key, (usize, T)>) -> Vec<(DCPTime, T)> {
        if let Some((&key, _)) = ready.iter().next_back() {
            self.last_released = Some(key);
        }
        ready.into_iter().map(|((time, _), (_, item))| (time, item)).collect()
    }
}

impl<T> Default for Shuffler<T> {
    fn default() -> Self {
        Self::new()
    }
}
