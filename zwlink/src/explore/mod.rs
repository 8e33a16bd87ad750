//! Explorer frame queue.
//!
//! Each queued frame walks a small state machine: it waits out a
//! delay, goes on air, then either waits for a search result from its
//! destination or, for frames repeated on behalf of other nodes, just
//! lingers long enough to absorb the transmit report. Every slot ends
//! by reporting a status to whoever queued it.
//!
//! The engine does no I/O. Frames leave through [ExploreTransmit],
//! time comes in as an [Instant] on every call, and completions are
//! handed to a closure.

use bitflags::bitflags;
use rand_core::RngCore;

mod ignore;
pub use ignore::*;

mod timer;
pub use timer::{expired, remaining, SharedTimer};

pub use crate::frame::explore::{
    ExploreCommand, ExploreHeader, ExploreOption, RepeaterCountTtl, HEADER_LEN, MAX_REPEATERS,
    SEARCH_RESULT_LEN,
};

use crate::frame::explore::{AUTO_INCLUSION_MIN_LEN, VERSION};
use crate::frame::parse::DecodedFrame;
use crate::frame::serialize::Serializer;
use crate::frame::{FrameBuffer, FrameType, HOME_ID_LEN, NODE_BROADCAST};
use crate::{Duration, Error, Instant};

/// Frames the queue holds at once.
pub const QUEUE_SIZE: usize = 4;

/// Pending events, beyond which new ones are dropped.
pub const EVENT_QUEUE_SIZE: usize = 8;

/// Largest piggy-backed payload after the explorer header.
pub const MAX_PAYLOAD: usize = 46;

/// Fixed part of a repeater's delay, in ms.
pub const REPEATER_DELAY_OFFSET: u32 = 50;

/// Added delay per hop already taken, in ms.
pub const HOP_FACTOR: u32 = 200;

/// How long a repeated frame lingers after going on air, in ms.
pub const REPEAT_TIMEOUT: u32 = 200;

/// How long to wait for a search result, in ms.
pub const FRAME_TIMEOUT: u32 = 4000;

/// Search result wait when [ExploreTxOptions::DO_ACK_TIMEOUT] is set, in ms.
pub const ACK_TIMEOUT: u32 = 2000;

bitflags! {
    /// Transmit options of a queued explorer frame.
    #[repr(transparent)]
    #[derive(Default)]
    pub struct ExploreTxOptions: u8 {
        /// Wait for a search result from the destination.
        const ACK = 0x01;
        const LOW_POWER = 0x02;
        /// Wait for a search result, but only [ACK_TIMEOUT].
        const DO_ACK_TIMEOUT = 0x08;
        /// A frame repeated for another node: send as is.
        const REPEAT = 0x40;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ExploreTxOptions {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ExploreTxOptions({=u8:x})", self.bits)
    }
}

/// Final outcome of a queued frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStatus {
    Ok,
    NoAck,
    Fail,
}

/// Details handed along with a [TxStatus].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxStatusReport {
    /// Milliseconds between queueing and completion.
    pub transmit_ticks: u32,
    /// Channel the search result arrived on.
    pub ack_channel: u8,
    /// Channel the frame went out on.
    pub tx_channel: u8,
}

/// Where a queued frame is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExploreState {
    New,
    Delayed,
    Transmit,
    Search,
    Repeat,
    Execute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Event {
    Idle,
    Timeout,
    FrameTransmitted,
    TransmitFailed(TxStatus),
    SearchResultReceived(u8),
}

/// Fixed ring of pending events.
#[derive(Debug, Clone, Copy)]
struct Events {
    ring: [Event; EVENT_QUEUE_SIZE],
    head: usize,
    len: usize,
}

impl Events {
    const fn new() -> Self {
        Self {
            ring: [Event::Idle; EVENT_QUEUE_SIZE],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, event: Event) {
        if self.len == EVENT_QUEUE_SIZE {
            log::warn!("explore event queue full, dropping {:?}", event);
            return;
        }
        self.ring[(self.head + self.len) % EVENT_QUEUE_SIZE] = event;
        self.len += 1;
    }

    fn pop(&mut self) -> Option<Event> {
        if self.len == 0 {
            return None;
        }
        let event = self.ring[self.head];
        self.head = (self.head + 1) % EVENT_QUEUE_SIZE;
        self.len -= 1;
        Some(event)
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn clear(&mut self) {
        *self = Self::new();
    }
}

/// An explorer frame ready for the air.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExploreFrame<'a> {
    pub home_id: [u8; HOME_ID_LEN],
    pub source: u8,
    pub destination: u8,
    /// Sequence number to reuse, or `None` to take a fresh one.
    pub sequence: Option<u8>,
    pub acknowledge: bool,
    pub low_power: bool,
    pub header: ExploreHeader,
    /// Data following the explorer header.
    pub payload: &'a [u8],
}

impl<'a> ExploreFrame<'a> {
    /// Explorer header and payload, as carried in the frame body.
    pub fn body(&self) -> Result<FrameBuffer<{ HEADER_LEN + MAX_PAYLOAD }>, Error> {
        let mut out = FrameBuffer::new();
        self.header.write(&mut out)?;
        out.write_bytes(self.payload)?;
        Ok(out)
    }
}

/// Whatever puts explorer frames on air.
pub trait ExploreTransmit {
    /// Hand a frame to the transmitter. Completion is reported later
    /// through [ExploreEngine::transmit_complete].
    fn enqueue(&mut self, frame: &ExploreFrame, options: ExploreTxOptions) -> Result<(), Error>;
}

/// A frame to queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExploreRequest<'a> {
    pub home_id: [u8; HOME_ID_LEN],
    pub source: u8,
    pub destination: u8,
    pub command: ExploreCommand,
    pub options: ExploreTxOptions,
    pub payload: &'a [u8],
}

/// This node, as the receive path needs to know it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExploreNode {
    pub node_id: u8,
    pub home_id: [u8; HOME_ID_LEN],
    /// Repeat explorer floods for other nodes.
    pub repeater: bool,
    /// Also repeat inclusion requests from nodes outside the network.
    pub repeat_inclusion: bool,
    /// Deliver inclusion requests upwards.
    pub accept_inclusion: bool,
}

impl ExploreNode {
    fn network_home_valid(&self, network_home: &[u8]) -> bool {
        network_home == &self.home_id[..] || network_home.iter().all(|&b| b == 0)
    }
}

/// What became of a received explorer frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExploreReceive<'a> {
    /// Not for this node, or not acceptable.
    Dropped,
    /// Handled here: a search result, or a frame queued for repeating.
    Consumed,
    /// For the layers above.
    Deliver {
        source: u8,
        acknowledge: bool,
        header: ExploreHeader,
        payload: &'a [u8],
    },
}

#[derive(Debug)]
struct Slot<H> {
    state: ExploreState,
    status: TxStatus,
    home_id: [u8; HOME_ID_LEN],
    source: u8,
    destination: u8,
    options: ExploreTxOptions,
    acknowledge: bool,
    low_power: bool,
    sequence: Option<u8>,
    header: ExploreHeader,
    payload: FrameBuffer<MAX_PAYLOAD>,
    deadline: Option<Instant>,
    start: Instant,
    report: TxStatusReport,
    callback: Option<H>,
}

impl<H> Slot<H> {
    fn frame(&self) -> ExploreFrame<'_> {
        ExploreFrame {
            home_id: self.home_id,
            source: self.source,
            destination: self.destination,
            sequence: self.sequence,
            acknowledge: self.acknowledge,
            low_power: self.low_power,
            header: self.header,
            payload: self.payload.as_slice(),
        }
    }

    /// True, once, if the slot's deadline has passed.
    fn take_timeout(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if expired(deadline, now) => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    fn finish(&mut self, status: TxStatus) {
        self.status = status;
        self.state = ExploreState::Execute;
    }
}

/// Arm a slot's deadline. A zero delay fires on the next event.
fn arm<H>(slot: &mut Slot<H>, events: &mut Events, delay_ms: u32, now: Instant) {
    slot.deadline = Some(now + Duration::millis(delay_ms));
    if delay_ms == 0 {
        events.push(Event::Timeout);
    }
}

/// The explorer frame queue.
///
/// `H` is whatever the caller wants back when a frame completes.
#[derive(Debug)]
pub struct ExploreEngine<H> {
    slots: [Option<Slot<H>>; QUEUE_SIZE],
    events: Events,
    ignore: IgnoreQueue,
    timer: SharedTimer,
    search_result_needed: bool,
    current_rx_channel: u8,
    current_report: TxStatusReport,
}

impl<H> Default for ExploreEngine<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ExploreEngine<H> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            events: Events::new(),
            ignore: IgnoreQueue::new(),
            timer: SharedTimer::new(),
            search_result_needed: false,
            current_rx_channel: 0,
            current_report: TxStatusReport::default(),
        }
    }

    /// Drop everything without reporting.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Queue a frame this node originates. Returns its handle, from 1.
    pub fn queue_frame(
        &mut self,
        request: ExploreRequest,
        callback: Option<H>,
        now: Instant,
    ) -> Result<u8, Error> {
        if request.payload.len() > MAX_PAYLOAD {
            return Err(Error::InvalidParameters);
        }
        let index = self.free_slot().ok_or(Error::NoMemory)?;
        let payload = FrameBuffer::from_slice(request.payload)?;

        let mut header = ExploreHeader::new(request.command);
        if request.options.contains(ExploreTxOptions::REPEAT) {
            header.random_interval = 0;
        }
        self.slots[index] = Some(Slot {
            state: ExploreState::New,
            status: TxStatus::Ok,
            home_id: request.home_id,
            source: request.source,
            destination: request.destination,
            options: request.options,
            acknowledge: request.options.contains(ExploreTxOptions::ACK),
            low_power: request.options.contains(ExploreTxOptions::LOW_POWER),
            sequence: None,
            header,
            payload,
            deadline: None,
            start: now,
            report: TxStatusReport::default(),
            callback,
        });
        log::debug!(
            "explore queued slot {} {} -> {} {:?}",
            index,
            request.source,
            request.destination,
            request.command
        );
        Ok(index as u8 + 1)
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// State of the frame queued under `handle`, if it is still queued.
    pub fn state(&self, handle: u8) -> Option<ExploreState> {
        let index = (handle as usize).checked_sub(1)?;
        self.slots.get(index)?.as_ref().map(|slot| slot.state)
    }

    /// Frames still queued.
    pub fn pending(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0 && self.events.is_empty()
    }

    /// When [Self::run] next has timed work to do.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Report the outcome of the last frame passed to
    /// [ExploreTransmit::enqueue].
    pub fn transmit_complete(&mut self, status: TxStatus, report: TxStatusReport) {
        self.current_report = report;
        match status {
            TxStatus::Ok => self.events.push(Event::FrameTransmitted),
            failed => self.events.push(Event::TransmitFailed(failed)),
        }
    }

    /// Advance every slot as far as it can go at `now`.
    ///
    /// Each pending event is offered to every slot in order; the loop
    /// stops once no event is pending and no slot moved.
    pub fn run<T, R, F>(&mut self, now: Instant, tx: &mut T, rng: &mut R, mut complete: F)
    where
        T: ExploreTransmit,
        R: RngCore,
        F: FnMut(H, TxStatus, &TxStatusReport),
    {
        if self.timer.poll(now) {
            self.events.push(Event::Timeout);
        }

        loop {
            let event = self.events.pop().unwrap_or(Event::Idle);
            let mut update = false;
            for index in 0..QUEUE_SIZE {
                update |= self.step(index, event, now, tx, rng, &mut complete);
            }
            self.timer
                .rearm(self.slots.iter().flatten().filter_map(|s| s.deadline), now);
            if !update && self.events.is_empty() {
                break;
            }
        }
    }

    /// Run one slot against one event. True if the slot wants another
    /// pass.
    fn step<T, R, F>(
        &mut self,
        index: usize,
        event: Event,
        now: Instant,
        tx: &mut T,
        rng: &mut R,
        complete: &mut F,
    ) -> bool
    where
        T: ExploreTransmit,
        R: RngCore,
        F: FnMut(H, TxStatus, &TxStatusReport),
    {
        if self.state(index as u8 + 1) == Some(ExploreState::Execute) {
            self.execute(index, now, complete);
            return false;
        }
        let Some(slot) = self.slots[index].as_mut() else {
            return false;
        };
        let before = slot.state;
        let mut update = false;

        match slot.state {
            ExploreState::New => match slot.header.command() {
                Some(ExploreCommand::Normal | ExploreCommand::AutoInclusion) => {
                    let hops = slot.header.repeater_count() as u32;
                    let delay = if hops > 0 {
                        let window = slot.header.random_interval as u32 + 1;
                        REPEATER_DELAY_OFFSET + (hops - 1) * HOP_FACTOR + 2 * (rng.next_u32() % window)
                    } else {
                        0
                    };
                    arm(slot, &mut self.events, delay, now);
                    slot.state = ExploreState::Delayed;
                }
                _ => {
                    log::warn!("explore slot {} has unsendable command {}", index, slot.header.command);
                    slot.finish(TxStatus::Fail);
                    update = true;
                }
            },

            ExploreState::Delayed => match event {
                Event::Timeout if slot.take_timeout(now) => {
                    slot.state = ExploreState::Transmit;
                    update = true;
                }
                Event::TransmitFailed(status) => {
                    slot.finish(status);
                    update = true;
                }
                _ => {}
            },

            ExploreState::Transmit => {
                if event == Event::Idle {
                    let timeout = if slot.options.contains(ExploreTxOptions::REPEAT) {
                        slot.state = ExploreState::Repeat;
                        REPEAT_TIMEOUT
                    } else {
                        slot.header.version = VERSION;
                        slot.header.hops = RepeaterCountTtl::fresh();
                        slot.header.repeaters = [0; MAX_REPEATERS];
                        slot.sequence = None;
                        slot.state = ExploreState::Search;
                        if slot.options.contains(ExploreTxOptions::DO_ACK_TIMEOUT) {
                            ACK_TIMEOUT
                        } else {
                            FRAME_TIMEOUT
                        }
                    };
                    arm(slot, &mut self.events, timeout, now);

                    let options = slot.options - ExploreTxOptions::DO_ACK_TIMEOUT;
                    if let Err(err) = tx.enqueue(&slot.frame(), options) {
                        log::debug!("explore slot {} refused by transmitter: {}", index, err);
                        slot.finish(TxStatus::Fail);
                        update = true;
                    }
                }
            }

            ExploreState::Search => match event {
                Event::Timeout if slot.take_timeout(now) => {
                    self.search_result_needed = false;
                    slot.finish(TxStatus::NoAck);
                    update = true;
                }
                Event::FrameTransmitted => {
                    slot.report = self.current_report;
                    if slot
                        .options
                        .intersects(ExploreTxOptions::ACK | ExploreTxOptions::DO_ACK_TIMEOUT)
                    {
                        slot.report.ack_channel = self.current_rx_channel;
                        self.search_result_needed = true;
                    } else {
                        slot.state = ExploreState::Execute;
                        update = true;
                    }
                }
                Event::SearchResultReceived(node) if node == slot.destination => {
                    slot.state = ExploreState::Execute;
                    update = true;
                }
                Event::TransmitFailed(status) => {
                    slot.finish(status);
                    update = true;
                }
                _ => {}
            },

            ExploreState::Repeat => match event {
                Event::Timeout if slot.take_timeout(now) => {
                    slot.state = ExploreState::Execute;
                    update = true;
                }
                Event::FrameTransmitted | Event::SearchResultReceived(_) => {
                    slot.state = ExploreState::Execute;
                    update = true;
                }
                Event::TransmitFailed(status) => {
                    slot.finish(status);
                    update = true;
                }
                _ => {}
            },

            ExploreState::Execute => {}
        }

        if slot.state != before {
            log::debug!("explore slot {} {:?} -> {:?}", index, before, slot.state);
        }
        update
    }

    /// Empty a finished slot and report its outcome.
    fn execute<F>(&mut self, index: usize, now: Instant, complete: &mut F)
    where
        F: FnMut(H, TxStatus, &TxStatusReport),
    {
        if let Some(slot) = self.slots[index].take() {
            let mut report = slot.report;
            report.transmit_ticks = now.ticks().wrapping_sub(slot.start.ticks());
            log::debug!("explore slot {} done: {:?}", index, slot.status);
            if let Some(callback) = slot.callback {
                complete(callback, slot.status, &report);
            }
        }
    }

    /// Abandon every queued frame, reporting [TxStatus::NoAck] for each.
    ///
    /// Does nothing if `source` is this node. A `source` of
    /// [INCLUSION_PENDING] also blocks inclusion requests for
    /// [STOP_TIMEOUT].
    pub fn purge<F>(&mut self, source: u8, own_id: u8, now: Instant, mut complete: F)
    where
        F: FnMut(H, TxStatus, &TxStatusReport),
    {
        if source == own_id {
            return;
        }
        for entry in self.slots.iter_mut() {
            if let Some(slot) = entry.take() {
                let mut report = slot.report;
                report.transmit_ticks = now.ticks().wrapping_sub(slot.start.ticks());
                if let Some(callback) = slot.callback {
                    complete(callback, TxStatus::NoAck, &report);
                }
            }
        }
        self.timer.stop();
        self.events.clear();
        log::debug!("explore queue purged by {}", source);

        if source == INCLUSION_PENDING {
            self.ignore.record(INCLUSION_PENDING, 0, STOP_TIMEOUT, now);
        }
    }

    /// Handle a received explorer frame.
    ///
    /// Search results are matched against frames waiting for one, or
    /// relayed if this node is their next hop. Floods not addressed to
    /// this node are queued for repeating when it is a repeater. Frames
    /// for this node (or broadcast) come back as
    /// [ExploreReceive::Deliver].
    pub fn receive<'a, T, F>(
        &mut self,
        node: &ExploreNode,
        frame: &DecodedFrame<'a>,
        rx_channel: u8,
        now: Instant,
        tx: &mut T,
        complete: F,
    ) -> ExploreReceive<'a>
    where
        T: ExploreTransmit,
        F: FnMut(H, TxStatus, &TxStatusReport),
    {
        let options = &frame.options;
        if options.frame_type != FrameType::Explore {
            return ExploreReceive::Dropped;
        }
        let raw: &'a [u8] = frame.payload;
        let Ok((header, data)) = ExploreHeader::decode(raw) else {
            return ExploreReceive::Dropped;
        };
        let command = header.command();
        let short = match command {
            Some(ExploreCommand::SearchResult) => raw.len() < SEARCH_RESULT_LEN,
            Some(ExploreCommand::AutoInclusion) => raw.len() < AUTO_INCLUSION_MIN_LEN,
            _ => false,
        };
        if short {
            log::trace!("explore frame too short for its command");
            return ExploreReceive::Dropped;
        }

        let source = options.source as u8;
        let destination = options.destination as u8;
        let sequence = options.sequence;
        let my_home = options.home_id == node.home_id;

        if header.option.contains(ExploreOption::STOP) && destination != node.node_id {
            self.purge(source, node.node_id, now, complete);
        }

        if !header.route_valid() {
            log::trace!("explore frame from {} has a bad route", source);
            return ExploreReceive::Dropped;
        }

        self.current_rx_channel = rx_channel;

        if command == Some(ExploreCommand::SearchResult) {
            let routed = ExploreOption::DIRECTION | ExploreOption::SOURCE_ROUTED;
            if my_home && header.option.contains(routed) {
                if destination == node.node_id {
                    if self.search_result_needed {
                        self.search_result_needed = false;
                        self.events.push(Event::SearchResultReceived(source));
                    }
                } else if node.repeater {
                    Self::relay_search_result(node, frame, header, data, tx);
                }
            }
            return ExploreReceive::Consumed;
        }

        if node.repeater && header.has_repeater(node.node_id) {
            return ExploreReceive::Dropped;
        }
        if self.ignore.check(source, sequence, node.node_id, now) {
            log::trace!("explore frame {} from {} ignored", sequence, source);
            return ExploreReceive::Dropped;
        }

        let network_home = data.get(..HOME_ID_LEN).unwrap_or(&[]);
        let mut consumed = false;
        if node.repeater && destination != node.node_id {
            let repeatable = match command {
                Some(ExploreCommand::AutoInclusion) => {
                    node.repeat_inclusion && node.network_home_valid(network_home)
                }
                _ => my_home,
            };
            if repeatable {
                consumed = self.queue_repeat(node, frame, header, data, now);
            }
        }

        let for_me = destination == node.node_id || destination as u16 == NODE_BROADCAST;
        let delivered = match command {
            Some(ExploreCommand::Normal) if for_me && my_home => Some(data),
            Some(ExploreCommand::AutoInclusion)
                if for_me && node.accept_inclusion && node.network_home_valid(network_home) =>
            {
                data.get(HOME_ID_LEN..)
            }
            _ => None,
        };

        match delivered {
            Some(payload) => ExploreReceive::Deliver {
                source,
                acknowledge: options.acknowledge,
                header,
                payload,
            },
            None if consumed => ExploreReceive::Consumed,
            None => ExploreReceive::Dropped,
        }
    }

    /// Pass a search result one hop further back along its route.
    fn relay_search_result<T: ExploreTransmit>(
        node: &ExploreNode,
        frame: &DecodedFrame,
        header: ExploreHeader,
        data: &[u8],
        tx: &mut T,
    ) {
        let count = header.repeater_count();
        if count == 0
            || header.repeaters[count as usize - 1] != node.node_id
            || frame.payload.len() != SEARCH_RESULT_LEN
        {
            return;
        }

        let mut relay = header;
        relay.hops = header.hops.with_ttl(header.ttl() + 1).with_count(count - 1);
        relay.random_interval = 0;
        let out = ExploreFrame {
            home_id: frame.options.home_id,
            source: frame.options.source as u8,
            destination: frame.options.destination as u8,
            sequence: Some(frame.options.sequence),
            acknowledge: false,
            low_power: false,
            header: relay,
            payload: data,
        };
        if let Err(err) = tx.enqueue(&out, ExploreTxOptions::REPEAT) {
            log::debug!("search result relay refused: {}", err);
        }
    }

    /// Queue a flood for repeating. True if the frame was taken on.
    fn queue_repeat(
        &mut self,
        node: &ExploreNode,
        frame: &DecodedFrame,
        header: ExploreHeader,
        data: &[u8],
        now: Instant,
    ) -> bool {
        let Some(index) = self.free_slot() else {
            log::debug!("explore queue full, not repeating");
            return false;
        };
        let Ok(mut payload) = FrameBuffer::<MAX_PAYLOAD>::from_slice(data) else {
            return false;
        };
        if header.command() == Some(ExploreCommand::AutoInclusion) {
            payload.as_mut_slice()[..HOME_ID_LEN].copy_from_slice(&node.home_id);
        }

        let options = &frame.options;
        let source = options.source as u8;
        self.ignore.record(source, options.sequence, IGNORE_TIMEOUT, now);

        let ttl = header.ttl();
        let count = header.repeater_count();
        if ttl == 0 || ttl as usize > MAX_REPEATERS || count as usize >= MAX_REPEATERS {
            return false;
        }

        let mut repeat = header;
        repeat.repeaters[count as usize] = node.node_id;
        repeat.hops = header.hops.with_ttl(ttl - 1).with_count(count + 1);

        self.slots[index] = Some(Slot {
            state: ExploreState::New,
            status: TxStatus::Ok,
            home_id: options.home_id,
            source,
            destination: options.destination as u8,
            options: ExploreTxOptions::REPEAT,
            acknowledge: options.acknowledge,
            low_power: options.low_power,
            sequence: Some(options.sequence),
            header: repeat,
            payload,
            deadline: None,
            start: now,
            report: TxStatusReport::default(),
            callback: None,
        });
        log::debug!("explore frame {} from {} queued for repeat in slot {}", options.sequence, source, index);
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::{FrameOptions, HeaderFormat};
    use std::vec::Vec;

    const HOME: [u8; 4] = [0xca, 0xfe, 0xba, 0xbe];

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Queued {
        source: u8,
        destination: u8,
        sequence: Option<u8>,
        acknowledge: bool,
        header: ExploreHeader,
        payload: Vec<u8>,
        options: ExploreTxOptions,
    }

    #[derive(Default)]
    struct RecordingTx {
        frames: Vec<Queued>,
        refuse: bool,
    }

    impl ExploreTransmit for RecordingTx {
        fn enqueue(&mut self, frame: &ExploreFrame, options: ExploreTxOptions) -> Result<(), Error> {
            if self.refuse {
                return Err(Error::Busy);
            }
            self.frames.push(Queued {
                source: frame.source,
                destination: frame.destination,
                sequence: frame.sequence,
                acknowledge: frame.acknowledge,
                header: frame.header,
                payload: frame.payload.to_vec(),
                options,
            });
            Ok(())
        }
    }

    /// Always returns the same number.
    struct FixedRng(u32);

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.0
        }

        fn next_u64(&mut self) -> u64 {
            self.0 as u64
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(self.0 as u8);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    type Done = Vec<(u32, TxStatus, TxStatusReport)>;

    struct Harness {
        engine: ExploreEngine<u32>,
        tx: RecordingTx,
        rng: FixedRng,
        done: Done,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                engine: ExploreEngine::new(),
                tx: RecordingTx::default(),
                rng: FixedRng(10),
                done: Vec::new(),
            }
        }

        fn run(&mut self, ms: u32) {
            let done = &mut self.done;
            self.engine.run(at(ms), &mut self.tx, &mut self.rng, |cb, status, report| {
                done.push((cb, status, *report))
            });
        }

        fn receive<'a>(&mut self, node: &ExploreNode, frame: &DecodedFrame<'a>, ms: u32) -> ExploreReceive<'a> {
            let done = &mut self.done;
            self.engine
                .receive(node, frame, 1, at(ms), &mut self.tx, |cb, status, report| {
                    done.push((cb, status, *report))
                })
        }
    }

    fn at(ms: u32) -> Instant {
        Instant::from_ticks(ms)
    }

    fn request(destination: u8, options: ExploreTxOptions) -> ExploreRequest<'static> {
        ExploreRequest {
            home_id: HOME,
            source: 1,
            destination,
            command: ExploreCommand::Normal,
            options,
            payload: &[0x20, 0x01, 0xff],
        }
    }

    fn node(node_id: u8, repeater: bool) -> ExploreNode {
        ExploreNode {
            node_id,
            home_id: HOME,
            repeater,
            repeat_inclusion: false,
            accept_inclusion: false,
        }
    }

    fn options(source: u8, destination: u8, sequence: u8) -> FrameOptions {
        let mut options = FrameOptions::new(FrameType::Explore, HOME, source as u16, destination as u16);
        options.sequence = sequence;
        options
    }

    fn body(header: ExploreHeader, data: &[u8]) -> Vec<u8> {
        let mut out = header.to_bytes().to_vec();
        out.extend_from_slice(data);
        out
    }

    fn decoded<'a>(options: FrameOptions, body: &'a [u8]) -> DecodedFrame<'a> {
        DecodedFrame {
            format: HeaderFormat::TwoChannel,
            options,
            route: &[],
            payload: body,
            content: body,
        }
    }

    fn search_result(hops: RepeaterCountTtl, repeaters: [u8; 4]) -> ExploreHeader {
        let mut header = ExploreHeader::new(ExploreCommand::SearchResult);
        header.option = ExploreOption::DIRECTION | ExploreOption::SOURCE_ROUTED;
        header.hops = hops;
        header.repeaters = repeaters;
        header
    }

    #[test]
    fn completes_on_transmit_without_ack() {
        let mut h = Harness::new();
        let handle = h.engine.queue_frame(request(0xff, ExploreTxOptions::empty()), Some(7), at(0)).unwrap();
        assert_eq!(handle, 1);
        assert_eq!(h.engine.state(handle), Some(ExploreState::New));

        h.run(0);
        assert_eq!(h.engine.state(handle), Some(ExploreState::Search));
        assert_eq!(h.tx.frames.len(), 1);
        let sent = &h.tx.frames[0];
        assert_eq!(sent.destination, 0xff);
        assert_eq!(sent.sequence, None);
        assert_eq!(u8::from(sent.header.hops), 0x40);
        assert_eq!(sent.payload, [0x20, 0x01, 0xff]);
        assert_eq!(h.engine.next_wakeup(), Some(at(FRAME_TIMEOUT)));

        h.engine.transmit_complete(
            TxStatus::Ok,
            TxStatusReport {
                tx_channel: 2,
                ..Default::default()
            },
        );
        h.run(10);
        assert_eq!(h.done.len(), 1);
        assert_eq!(h.done[0].0, 7);
        assert_eq!(h.done[0].1, TxStatus::Ok);
        assert_eq!(h.done[0].2.transmit_ticks, 10);
        assert_eq!(h.done[0].2.tx_channel, 2);
        assert!(h.engine.is_idle());
        assert_eq!(h.engine.next_wakeup(), None);
    }

    #[test]
    fn search_result_completes() {
        let mut h = Harness::new();
        h.engine.queue_frame(request(5, ExploreTxOptions::ACK), Some(1), at(0)).unwrap();
        h.run(0);
        assert!(h.tx.frames[0].acknowledge);
        h.engine.transmit_complete(TxStatus::Ok, TxStatusReport::default());
        h.run(5);
        assert!(h.done.is_empty());

        let header = search_result(RepeaterCountTtl::fresh(), [0; 4]);
        let raw = body(header, &[5, 0, 0x40, 0, 0, 0, 0]);
        let frame = decoded(options(5, 1, 3), &raw);
        assert_eq!(h.receive(&node(1, false), &frame, 80), ExploreReceive::Consumed);

        h.run(100);
        assert_eq!(h.done.len(), 1);
        assert_eq!(h.done[0].1, TxStatus::Ok);
        assert_eq!(h.done[0].2.transmit_ticks, 100);
    }

    #[test]
    fn search_result_from_elsewhere_ignored() {
        let mut h = Harness::new();
        h.engine.queue_frame(request(5, ExploreTxOptions::ACK), Some(1), at(0)).unwrap();
        h.run(0);
        h.engine.transmit_complete(TxStatus::Ok, TxStatusReport::default());
        h.run(5);

        let raw = body(search_result(RepeaterCountTtl::fresh(), [0; 4]), &[6, 0, 0x40, 0, 0, 0, 0]);
        let frame = decoded(options(6, 1, 3), &raw);
        h.receive(&node(1, false), &frame, 80);
        h.run(100);
        assert!(h.done.is_empty());
        assert_eq!(h.engine.state(1), Some(ExploreState::Search));
    }

    #[test]
    fn search_times_out() {
        let mut h = Harness::new();
        h.engine.queue_frame(request(5, ExploreTxOptions::ACK), Some(2), at(100)).unwrap();
        h.run(100);
        h.engine.transmit_complete(TxStatus::Ok, TxStatusReport::default());
        h.run(110);
        h.run(4099);
        assert!(h.done.is_empty());
        h.run(4100);
        assert_eq!(h.done, [(2, TxStatus::NoAck, TxStatusReport {
            transmit_ticks: 4000,
            ack_channel: 0,
            tx_channel: 0,
        })]);
    }

    #[test]
    fn short_ack_timeout() {
        let mut h = Harness::new();
        h.engine.queue_frame(request(5, ExploreTxOptions::DO_ACK_TIMEOUT), Some(2), at(0)).unwrap();
        h.run(0);
        assert_eq!(h.engine.next_wakeup(), Some(at(ACK_TIMEOUT)));
        assert_eq!(h.tx.frames[0].options, ExploreTxOptions::empty());
        h.run(2000);
        assert_eq!(h.done[0].1, TxStatus::NoAck);
    }

    #[test]
    fn transmit_failure_reported() {
        let mut h = Harness::new();
        h.engine.queue_frame(request(5, ExploreTxOptions::ACK), Some(3), at(0)).unwrap();
        h.run(0);
        h.engine.transmit_complete(TxStatus::Fail, TxStatusReport::default());
        h.run(1);
        assert_eq!(h.done[0].1, TxStatus::Fail);
        assert!(h.engine.is_idle());
    }

    #[test]
    fn refused_enqueue_fails() {
        let mut h = Harness::new();
        h.tx.refuse = true;
        h.engine.queue_frame(request(5, ExploreTxOptions::ACK), Some(4), at(0)).unwrap();
        h.run(0);
        assert_eq!(h.done.len(), 1);
        assert_eq!(h.done[0].1, TxStatus::Fail);
        assert!(h.engine.is_idle());
    }

    #[test]
    fn search_result_command_not_queued_for_air() {
        let mut h = Harness::new();
        let mut req = request(5, ExploreTxOptions::empty());
        req.command = ExploreCommand::SearchResult;
        h.engine.queue_frame(req, Some(9), at(0)).unwrap();
        h.run(0);
        assert!(h.tx.frames.is_empty());
        assert_eq!(h.done[0].1, TxStatus::Fail);
    }

    #[test]
    fn queue_limits() {
        let mut engine = ExploreEngine::<u32>::new();
        for i in 0..QUEUE_SIZE {
            let handle = engine.queue_frame(request(5, ExploreTxOptions::empty()), None, at(0));
            assert_eq!(handle, Ok(i as u8 + 1));
        }
        assert_eq!(
            engine.queue_frame(request(5, ExploreTxOptions::empty()), None, at(0)),
            Err(Error::NoMemory)
        );

        let mut engine = ExploreEngine::<u32>::new();
        let big = [0u8; MAX_PAYLOAD + 1];
        let mut req = request(5, ExploreTxOptions::empty());
        req.payload = &big;
        assert_eq!(engine.queue_frame(req, None, at(0)), Err(Error::InvalidParameters));
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn every_slot_drains() {
        let mut h = Harness::new();
        for i in 0..QUEUE_SIZE as u32 {
            h.engine.queue_frame(request(5, ExploreTxOptions::ACK), Some(i), at(0)).unwrap();
        }
        h.run(0);
        assert_eq!(h.tx.frames.len(), QUEUE_SIZE);
        h.run(FRAME_TIMEOUT);
        assert_eq!(h.done.len(), QUEUE_SIZE);
        assert!(h.done.iter().all(|d| d.1 == TxStatus::NoAck));
        assert!(h.engine.is_idle());
    }

    #[test]
    fn repeats_flood_after_delay() {
        let mut h = Harness::new();
        let me = node(4, true);
        let raw = body(ExploreHeader::new(ExploreCommand::Normal), &[0x20, 0x01]);
        let frame = decoded(options(3, 0xff, 9), &raw);

        match h.receive(&me, &frame, 0) {
            ExploreReceive::Deliver { source, payload, .. } => {
                assert_eq!(source, 3);
                assert_eq!(payload, &[0x20, 0x01]);
            }
            other => panic!("not delivered: {:?}", other),
        }
        assert_eq!(h.engine.pending(), 1);

        h.run(0);
        assert!(h.tx.frames.is_empty());
        // one hop, rng 10: 50 + 0 * 200 + 2 * 10
        assert_eq!(h.engine.next_wakeup(), Some(at(70)));
        h.run(69);
        assert!(h.tx.frames.is_empty());
        h.run(70);

        let sent = &h.tx.frames[0];
        assert_eq!(sent.options, ExploreTxOptions::REPEAT);
        assert_eq!(sent.source, 3);
        assert_eq!(sent.sequence, Some(9));
        assert_eq!(sent.header.repeaters, [4, 0, 0, 0]);
        assert_eq!(sent.header.repeater_count(), 1);
        assert_eq!(sent.header.ttl(), 3);

        h.run(270);
        assert!(h.engine.is_idle());
        assert!(h.done.is_empty());

        // already seen
        assert_eq!(h.receive(&me, &frame, 300), ExploreReceive::Dropped);
    }

    #[test]
    fn timer_serves_every_slot() {
        let mut h = Harness::new();
        let me = node(4, true);

        let mut two_hops = ExploreHeader::new(ExploreCommand::Normal);
        two_hops.hops = RepeaterCountTtl::new().with_count(1).with_ttl(3);
        two_hops.repeaters = [8, 0, 0, 0];
        let far = body(two_hops, &[]);
        let near = body(ExploreHeader::new(ExploreCommand::Normal), &[]);

        h.receive(&me, &decoded(options(3, 9, 1), &far), 0);
        h.receive(&me, &decoded(options(5, 9, 1), &near), 0);
        h.run(0);
        // the later frame's deadline must not hide the sooner one
        assert_eq!(h.engine.next_wakeup(), Some(at(70)));
        h.run(70);
        assert_eq!(h.tx.frames.len(), 1);
        assert_eq!(h.tx.frames[0].source, 5);
        assert_eq!(h.engine.next_wakeup(), Some(at(270)));
        h.run(270);
        assert_eq!(h.tx.frames.len(), 2);
        assert_eq!(h.tx.frames[1].source, 3);
        assert_eq!(h.tx.frames[1].header.repeaters, [8, 4, 0, 0]);
    }

    #[test]
    fn never_repeats_twice() {
        let mut h = Harness::new();
        let mut header = ExploreHeader::new(ExploreCommand::Normal);
        header.hops = RepeaterCountTtl::new().with_count(1).with_ttl(3);
        header.repeaters = [4, 0, 0, 0];
        let raw = body(header, &[]);
        let frame = decoded(options(3, 0xff, 9), &raw);
        assert_eq!(h.receive(&node(4, true), &frame, 0), ExploreReceive::Dropped);
        assert_eq!(h.engine.pending(), 0);
    }

    #[test]
    fn bad_route_dropped() {
        let mut h = Harness::new();
        let mut header = ExploreHeader::new(ExploreCommand::Normal);
        header.hops = RepeaterCountTtl::new().with_count(2).with_ttl(2);
        header.repeaters = [6, 6, 0, 0];
        let raw = body(header, &[]);
        let frame = decoded(options(3, 4, 9), &raw);
        assert_eq!(h.receive(&node(4, true), &frame, 0), ExploreReceive::Dropped);
        assert_eq!(h.engine.pending(), 0);
    }

    #[test]
    fn foreign_home_not_delivered() {
        let mut h = Harness::new();
        let raw = body(ExploreHeader::new(ExploreCommand::Normal), &[1]);
        let mut opts = options(3, 4, 9);
        opts.home_id = [1, 2, 3, 4];
        let frame = decoded(opts, &raw);
        assert_eq!(h.receive(&node(4, true), &frame, 0), ExploreReceive::Dropped);
    }

    #[test]
    fn relays_search_result() {
        let mut h = Harness::new();
        let header = search_result(RepeaterCountTtl::new().with_count(1).with_ttl(3), [4, 0, 0, 0]);
        let raw = body(header, &[5, 0x12, 0x31, 4, 0, 0, 0]);
        let frame = decoded(options(5, 1, 3), &raw);
        assert_eq!(h.receive(&node(4, true), &frame, 0), ExploreReceive::Consumed);

        let sent = &h.tx.frames[0];
        assert_eq!(sent.options, ExploreTxOptions::REPEAT);
        assert_eq!((sent.source, sent.destination, sent.sequence), (5, 1, Some(3)));
        assert_eq!(sent.header.repeater_count(), 0);
        assert_eq!(sent.header.ttl(), 4);
        assert_eq!(sent.header.random_interval, 0);
        assert_eq!(sent.payload.len(), SEARCH_RESULT_LEN - HEADER_LEN);

        // not the next hop
        let mut h = Harness::new();
        assert_eq!(h.receive(&node(7, true), &frame, 0), ExploreReceive::Consumed);
        assert!(h.tx.frames.is_empty());
    }

    #[test]
    fn stop_purges_queue() {
        let mut h = Harness::new();
        h.engine.queue_frame(request(5, ExploreTxOptions::ACK), Some(11), at(0)).unwrap();
        h.engine.queue_frame(request(6, ExploreTxOptions::ACK), None, at(0)).unwrap();
        h.run(0);

        let mut header = ExploreHeader::new(ExploreCommand::Normal);
        header.option = ExploreOption::STOP;
        let raw = body(header, &[]);
        let frame = decoded(options(9, 0xff, 1), &raw);
        h.receive(&node(1, false), &frame, 30);

        assert_eq!(h.done.len(), 1);
        assert_eq!(h.done[0].0, 11);
        assert_eq!(h.done[0].1, TxStatus::NoAck);
        assert_eq!(h.done[0].2.transmit_ticks, 30);
        assert_eq!(h.engine.pending(), 0);
        assert_eq!(h.engine.next_wakeup(), None);
    }

    #[test]
    fn own_purge_ignored() {
        let mut h = Harness::new();
        h.engine.queue_frame(request(5, ExploreTxOptions::ACK), Some(11), at(0)).unwrap();
        h.engine.purge(1, 1, at(0), |_, _, _| panic!("purged"));
        assert_eq!(h.engine.pending(), 1);
    }

    #[test]
    fn inclusion_requests() {
        let mut me = node(4, true);
        me.repeat_inclusion = true;
        me.accept_inclusion = true;
        let mut network = [0u8; 10];
        network[4..].copy_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        let raw = body(ExploreHeader::new(ExploreCommand::AutoInclusion), &network);
        let mut opts = options(0, 0xff, 2);
        opts.home_id = [0xd0, 0x0d, 0xd0, 0x0d];
        let frame = decoded(opts, &raw);

        let mut h = Harness::new();
        match h.receive(&me, &frame, 0) {
            ExploreReceive::Deliver { payload, .. } => assert_eq!(payload, &network[4..]),
            other => panic!("not delivered: {:?}", other),
        }
        h.run(0);
        h.run(1000);
        assert_eq!(h.tx.frames.len(), 1);
        assert_eq!(&h.tx.frames[0].payload[..4], &HOME);

        // an inclusion in progress silences them
        let mut h = Harness::new();
        h.engine.purge(INCLUSION_PENDING, 4, at(0), |_, _, _| {});
        assert_eq!(h.receive(&me, &frame, 100), ExploreReceive::Dropped);
        assert!(matches!(h.receive(&me, &frame, 6000), ExploreReceive::Deliver { .. }));
    }

    #[test]
    fn inclusion_for_other_network() {
        let mut me = node(4, true);
        me.repeat_inclusion = true;
        me.accept_inclusion = true;
        let mut network = [0u8; 10];
        network[..4].copy_from_slice(&[9, 9, 9, 9]);
        let raw = body(ExploreHeader::new(ExploreCommand::AutoInclusion), &network);
        let frame = decoded(options(0, 0xff, 2), &raw);
        let mut h = Harness::new();
        assert_eq!(h.receive(&me, &frame, 0), ExploreReceive::Dropped);
    }

    #[test]
    fn frame_body() {
        let header = ExploreHeader::new(ExploreCommand::Normal);
        let frame = ExploreFrame {
            home_id: HOME,
            source: 1,
            destination: 2,
            sequence: None,
            acknowledge: false,
            low_power: false,
            header,
            payload: &[0xaa],
        };
        let out = frame.body().unwrap();
        assert_eq!(out.as_slice(), &[0x20, 0, 250, 0x40, 0, 0, 0, 0, 0xaa]);
    }
}
