use bitflags::bitflags;

use crate::frame::{DecodedFrame, FrameType, HOME_ID_LEN};
use crate::Error;

/// Filters each frame type can hold at once.
pub const FILTERS_PER_TYPE: usize = 5;

bitflags! {
    /// Which fields a receive filter compares.
    ///
    /// Read as a number, the flags also rank filters: when several
    /// match a frame, the one with the largest value wins.
    #[repr(transparent)]
    #[derive(Default)]
    pub struct FilterFlags: u8 {
        const HOME_ID = 0x80;
        const SOURCE = 0x40;
        const DESTINATION = 0x20;
        const PAYLOAD_1 = 0x10;
        const PAYLOAD_2 = 0x08;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FilterFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FilterFlags({=u8:x})", self.bits)
    }
}

/// Routes matching received frames to a handler.
///
/// Fields not named in `flags` are ignored, both when matching frames
/// and when [FilterTable::remove] looks for a filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiveFilter<H> {
    pub frame_type: FrameType,
    pub flags: FilterFlags,
    pub home_id: [u8; HOME_ID_LEN],
    pub source: u16,
    pub destination: u16,
    /// (payload index, expected value) pairs, for
    /// [FilterFlags::PAYLOAD_1] and [FilterFlags::PAYLOAD_2].
    pub payload: [(u8, u8); 2],
    pub handler: H,
}

impl<H> ReceiveFilter<H> {
    /// A catch-all filter for one frame type.
    pub fn new(frame_type: FrameType, handler: H) -> Self {
        Self {
            frame_type,
            flags: FilterFlags::empty(),
            home_id: [0; HOME_ID_LEN],
            source: 0,
            destination: 0,
            payload: [(0, 0); 2],
            handler,
        }
    }

    pub fn home_id(mut self, home_id: [u8; HOME_ID_LEN]) -> Self {
        self.flags |= FilterFlags::HOME_ID;
        self.home_id = home_id;
        self
    }

    pub fn source(mut self, source: u16) -> Self {
        self.flags |= FilterFlags::SOURCE;
        self.source = source;
        self
    }

    pub fn destination(mut self, destination: u16) -> Self {
        self.flags |= FilterFlags::DESTINATION;
        self.destination = destination;
        self
    }

    /// Require `payload[index] == value`.
    pub fn payload_1(mut self, index: u8, value: u8) -> Self {
        self.flags |= FilterFlags::PAYLOAD_1;
        self.payload[0] = (index, value);
        self
    }

    pub fn payload_2(mut self, index: u8, value: u8) -> Self {
        self.flags |= FilterFlags::PAYLOAD_2;
        self.payload[1] = (index, value);
        self
    }

    /// The same filter, routing to a different handler.
    pub fn map_handler<G, F>(self, f: F) -> ReceiveFilter<G>
    where
        F: FnOnce(H) -> G,
    {
        ReceiveFilter {
            frame_type: self.frame_type,
            flags: self.flags,
            home_id: self.home_id,
            source: self.source,
            destination: self.destination,
            payload: self.payload,
            handler: f(self.handler),
        }
    }

    /// Whether every condition this filter sets holds for `frame`.
    ///
    /// A payload index past the end of the payload never matches.
    pub fn matches(&self, frame: &DecodedFrame) -> bool {
        let options = &frame.options;
        if options.frame_type != self.frame_type {
            return false;
        }
        if self.flags.contains(FilterFlags::HOME_ID) && options.home_id != self.home_id {
            return false;
        }
        if self.flags.contains(FilterFlags::SOURCE) && options.source != self.source {
            return false;
        }
        if self.flags.contains(FilterFlags::DESTINATION) && options.destination != self.destination {
            return false;
        }
        let payload_at = |(index, value): (u8, u8)| frame.payload.get(index as usize) == Some(&value);
        if self.flags.contains(FilterFlags::PAYLOAD_1) && !payload_at(self.payload[0]) {
            return false;
        }
        if self.flags.contains(FilterFlags::PAYLOAD_2) && !payload_at(self.payload[1]) {
            return false;
        }
        true
    }
}

impl<H: PartialEq> ReceiveFilter<H> {
    /// Whether `other` sets the same conditions and routes to the same
    /// handler. Fields not named in `flags` are not compared.
    pub fn same_filter(&self, other: &Self) -> bool {
        let flag = |f| self.flags.contains(f);
        self.frame_type == other.frame_type
            && self.flags == other.flags
            && (!flag(FilterFlags::HOME_ID) || self.home_id == other.home_id)
            && (!flag(FilterFlags::SOURCE) || self.source == other.source)
            && (!flag(FilterFlags::DESTINATION) || self.destination == other.destination)
            && (!flag(FilterFlags::PAYLOAD_1) || self.payload[0] == other.payload[0])
            && (!flag(FilterFlags::PAYLOAD_2) || self.payload[1] == other.payload[1])
            && self.handler == other.handler
    }
}

/// The installed receive filters, a bounded list per frame type.
#[derive(Debug, Clone)]
pub struct FilterTable<H> {
    lists: [[Option<ReceiveFilter<H>>; FILTERS_PER_TYPE]; FrameType::ALL.len()],
    paused: bool,
}

impl<H> Default for FilterTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> FilterTable<H> {
    pub fn new() -> Self {
        Self {
            lists: core::array::from_fn(|_| core::array::from_fn(|_| None)),
            paused: false,
        }
    }

    fn list(&self, frame_type: FrameType) -> &[Option<ReceiveFilter<H>>; FILTERS_PER_TYPE] {
        &self.lists[frame_type.index()]
    }

    /// Number of filters installed for a frame type.
    pub fn count(&self, frame_type: FrameType) -> usize {
        self.list(frame_type).iter().take_while(|f| f.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        FrameType::ALL.iter().all(|&t| self.count(t) == 0)
    }

    /// Filters for a frame type, in insertion order.
    pub fn filters(&self, frame_type: FrameType) -> impl Iterator<Item = &ReceiveFilter<H>> {
        self.list(frame_type).iter().map_while(Option::as_ref)
    }

    /// Install a filter after the others of its frame type.
    pub fn add(&mut self, filter: ReceiveFilter<H>) -> Result<(), Error> {
        let count = self.count(filter.frame_type);
        if count >= FILTERS_PER_TYPE {
            return Err(Error::NoMemory);
        }
        match filter.frame_type {
            FrameType::Multicast if filter.flags.contains(FilterFlags::DESTINATION) => {
                return Err(Error::InvalidParameters);
            }
            FrameType::Ack
                if filter
                    .flags
                    .intersects(FilterFlags::PAYLOAD_1 | FilterFlags::PAYLOAD_2) =>
            {
                return Err(Error::InvalidParameters);
            }
            _ => (),
        }
        let index = filter.frame_type.index();
        self.lists[index][count] = Some(filter);
        Ok(())
    }

    /// Suspend or resume dispatch. The table itself is untouched.
    pub fn pause(&mut self, pause: bool) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::Unsupported);
        }
        self.paused = pause;
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Remove every filter.
    pub fn clear(&mut self) {
        for list in self.lists.iter_mut() {
            for slot in list.iter_mut() {
                *slot = None;
            }
        }
    }

    /// Handler of the most specific filter matching `frame`.
    ///
    /// Among matching filters the largest flag value wins, and the
    /// earliest installed among equals.
    pub fn select(&self, frame: &DecodedFrame) -> Option<&H> {
        if self.paused {
            return None;
        }
        let mut best: Option<&ReceiveFilter<H>> = None;
        for filter in self.filters(frame.options.frame_type) {
            if !filter.matches(frame) {
                continue;
            }
            if best.map_or(true, |b| filter.flags.bits() > b.flags.bits()) {
                best = Some(filter);
            }
        }
        best.map(|f| &f.handler)
    }
}

impl<H: PartialEq> FilterTable<H> {
    /// Remove the first filter that is the [same
    /// filter](ReceiveFilter::same_filter) as `filter`, keeping the
    /// order of the rest.
    pub fn remove(&mut self, filter: &ReceiveFilter<H>) -> Result<(), Error> {
        let list = &mut self.lists[filter.frame_type.index()];
        let position = list
            .iter()
            .map_while(Option::as_ref)
            .position(|f| f.same_filter(filter))
            .ok_or(Error::InvalidParameters)?;
        list[position] = None;
        list[position..].rotate_left(1);
        Ok(())
    }
}
