//! Duplicate suppression for explorer frames.

use super::timer::{expired, remaining};
use crate::{Duration, Instant};

/// Entries in the table.
pub const IGNORE_SIZE: usize = 2;

/// How long a repeated frame's source and sequence stay ignored, in ms.
pub const IGNORE_TIMEOUT: u32 = 3600;

/// How long a stop request suppresses inclusion frames, in ms.
pub const STOP_TIMEOUT: u32 = 6000;

/// Id that node 0 (a controller not yet included) is tracked under.
pub const NODE_CONTROLLER_OLD: u8 = 0xef;

/// Entry id that, while active, suppresses every inclusion request.
pub const INCLUSION_PENDING: u8 = crate::frame::NODE_BROADCAST as u8 - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Entry {
    id: u8,
    handle: u8,
    expiry: Instant,
    active: bool,
}

impl Entry {
    const fn empty() -> Self {
        Self {
            id: 0,
            handle: 0xff,
            expiry: Instant::from_ticks(0),
            active: false,
        }
    }
}

fn alias(source: u8) -> u8 {
    if source == 0 {
        NODE_CONTROLLER_OLD
    } else {
        source
    }
}

/// Recently seen `(source, sequence)` pairs, each ignored until its
/// entry expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IgnoreQueue {
    entries: [Entry; IGNORE_SIZE],
}

impl Default for IgnoreQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl IgnoreQueue {
    pub const fn new() -> Self {
        Self {
            entries: [Entry::empty(); IGNORE_SIZE],
        }
    }

    /// Slot to use for `source`: the one already tracking it, else an
    /// empty one, else the one closest to expiry.
    fn index_for(&mut self, source: u8, now: Instant) -> usize {
        let source = alias(source);
        if let Some(i) = self.entries.iter().position(|e| e.id == source) {
            return i;
        }
        let i = match self.entries.iter().rposition(|e| !e.active) {
            Some(i) => i,
            None => self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| remaining(e.expiry, now))
                .map_or(0, |(i, _)| i),
        };
        self.entries[i].id = source;
        i
    }

    /// Ignore frames from `source` with sequence `handle` for
    /// `timeout_ms`.
    pub fn record(&mut self, source: u8, handle: u8, timeout_ms: u32, now: Instant) {
        let i = self.index_for(source, now);
        let entry = &mut self.entries[i];
        entry.handle = handle;
        entry.expiry = now + Duration::millis(timeout_ms);
        entry.active = true;
        log::trace!("ignoring explore frames from {} seq {} for {} ms", entry.id, handle, timeout_ms);
    }

    /// Drop every expired entry.
    pub fn retire(&mut self, now: Instant) {
        for entry in self.entries.iter_mut() {
            if entry.active && expired(entry.expiry, now) {
                *entry = Entry::empty();
            }
        }
    }

    /// Whether an explorer frame from `source` with sequence `sequence`
    /// should be dropped. Frames this node sent itself always are.
    pub fn check(&mut self, source: u8, sequence: u8, own_id: u8, now: Instant) -> bool {
        self.retire(now);
        if source == own_id {
            return true;
        }
        let source = alias(source);
        self.entries.iter().filter(|e| e.active).any(|e| {
            (source == NODE_CONTROLLER_OLD && e.id == INCLUSION_PENDING)
                || (e.id == source && (e.handle == sequence || source == NODE_CONTROLLER_OLD))
        })
    }

    /// Soonest expiry of any active entry.
    pub fn next_expiry(&self, now: Instant) -> Option<Instant> {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.expiry)
            .min_by_key(|&expiry| remaining(expiry, now))
    }
}
