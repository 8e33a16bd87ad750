//! The link layer as one value: radio, filters, transmitter, noise
//! history and explore queue, owned together.

use rand_core::RngCore;

use crate::explore::{
    ExploreCommand, ExploreEngine, ExploreFrame, ExploreHeader, ExploreNode, ExploreReceive,
    ExploreRequest, ExploreTransmit, ExploreTxOptions, TxStatus, TxStatusReport,
};
use crate::frame::{decode, DecodedFrame, FrameOptions, FrameType, HOME_ID_LEN};
use crate::noise::{NoiseTracker, MAX_CHANNELS};
use crate::{
    active_profiles, receive_crc, CommunicationProfile, Error, FilterTable, Instant,
    LrChannelConfig, ProtocolMode, Radio, ReceiveFilter, RxParameters, TransmitFrame, Transmitter,
    ACTIVE_PROFILES,
};

/// Run-time settings for a [LinkLayer].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    pub home_id: [u8; HOME_ID_LEN],
    pub node_id: u16,
    /// Repeat explorer floods for other nodes.
    pub repeater: bool,
    /// Repeat inclusion requests from nodes not yet in a network.
    pub repeat_inclusion: bool,
    /// Deliver inclusion requests upwards.
    pub accept_inclusion: bool,
    /// Profile explorer frames go out on. Defaults per protocol mode.
    pub explore_profile: Option<CommunicationProfile>,
}

/// Who a receive filter routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Handler<H> {
    /// The explore engine's own catch-all.
    Explore,
    User(H),
}

/// What became of a received frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxOutcome<'a, H> {
    /// Undecodable, unexpected, or matched by no filter.
    Dropped,
    /// Taken care of inside the link layer.
    Consumed,
    /// Matched a user filter.
    Frame {
        handler: H,
        profile: CommunicationProfile,
        rssi: i8,
        frame: DecodedFrame<'a>,
    },
    /// An explorer frame for this node, header already stripped.
    Explore {
        source: u8,
        acknowledge: bool,
        header: ExploreHeader,
        payload: &'a [u8],
    },
}

/// Hands explorer frames to the transmitter.
struct ExploreSender<'l, R> {
    radio: &'l mut R,
    transmitter: &'l mut Transmitter,
    noise: &'l NoiseTracker,
    profile: CommunicationProfile,
    sequence: &'l mut u8,
}

impl<R: Radio> ExploreTransmit for ExploreSender<'_, R> {
    fn enqueue(&mut self, frame: &ExploreFrame, options: ExploreTxOptions) -> Result<(), Error> {
        let mut header = FrameOptions::new(
            FrameType::Explore,
            frame.home_id,
            frame.source as u16,
            frame.destination as u16,
        );
        header.sequence = match frame.sequence {
            Some(sequence) => sequence,
            None => {
                *self.sequence = self.sequence.wrapping_add(1);
                *self.sequence
            }
        };
        header.acknowledge = frame.acknowledge;
        header.low_power = frame.low_power;

        let body = frame.body()?;
        let mut out = TransmitFrame::new(header, &body)?;
        log::trace!("explore out {:?} {:?}", options, frame.header);
        self.transmitter.transmit(self.radio, self.noise, self.profile, &mut out)
    }
}

/// A complete link layer over radio `R`.
///
/// `H` identifies upper-layer consumers: it comes back from matching
/// receive filters and from completed explorer frames.
#[derive(Debug)]
pub struct LinkLayer<R, H> {
    radio: R,
    config: LinkConfig,
    mode: Option<ProtocolMode>,
    profiles: [CommunicationProfile; ACTIVE_PROFILES],
    filters: FilterTable<Handler<H>>,
    transmitter: Transmitter,
    noise: NoiseTracker,
    explore: ExploreEngine<H>,
    sequence: u8,
}

impl<R, H> LinkLayer<R, H>
where
    R: Radio,
    H: Clone,
{
    /// Wrap a radio. Nothing works until [Self::init].
    pub fn new(radio: R, config: LinkConfig) -> Self {
        Self {
            radio,
            config,
            mode: None,
            profiles: [CommunicationProfile::Unsupported; ACTIVE_PROFILES],
            filters: FilterTable::new(),
            transmitter: Transmitter::new(),
            noise: NoiseTracker::new(),
            explore: ExploreEngine::new(),
            sequence: 0,
        }
    }

    /// Reset all state and set up for the radio's current region.
    pub fn init(&mut self) -> Result<(), Error> {
        let Some(mode) = self.radio.protocol_mode() else {
            log::warn!("radio has no protocol mode");
            return Err(Error::InvalidParameters);
        };
        self.mode = Some(mode);
        self.profiles = active_profiles(mode, self.radio.lr_channel_config());
        self.filters = FilterTable::new();
        self.transmitter = Transmitter::new();
        self.noise.reset();
        self.explore.reset();
        self.filters
            .add(ReceiveFilter::new(FrameType::Explore, Handler::Explore))?;
        self.program_network_ids(mode);
        log::debug!("link layer up in {:?}, profiles {:?}", mode, self.profiles);
        Ok(())
    }

    fn program_network_ids(&mut self, mode: ProtocolMode) {
        let LinkConfig { home_id, node_id, .. } = self.config;
        let hash = self
            .radio
            .home_id_hash(u32::from_le_bytes(home_id), node_id, mode);
        self.radio.set_network_ids(home_id, node_id, hash);
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Profiles that receive channel ids map to.
    pub fn active_profiles(&self) -> &[CommunicationProfile; ACTIVE_PROFILES] {
        &self.profiles
    }

    pub fn is_header_format_3ch(&self) -> bool {
        self.mode == Some(ProtocolMode::ThreeChannel)
    }

    /// Change this node's address and reprogram the radio.
    pub fn set_network_id(&mut self, home_id: [u8; HOME_ID_LEN], node_id: u16) -> Result<(), Error> {
        let mode = self.mode.ok_or(Error::InvalidParameters)?;
        self.config.home_id = home_id;
        self.config.node_id = node_id;
        self.program_network_ids(mode);
        Ok(())
    }

    /// Switch Long Range channel configuration, updating the receive
    /// profile table to match.
    pub fn change_lr_channel_config(&mut self, config: LrChannelConfig) -> Result<(), Error> {
        self.radio.change_lr_channel_config(config)?;
        if let Some(mode) = self.mode {
            self.profiles = active_profiles(mode, config);
        }
        Ok(())
    }

    /// Decode a frame the radio received and find out who gets it.
    pub fn receive<'a, F>(
        &mut self,
        rx: &RxParameters,
        raw: &'a [u8],
        now: Instant,
        complete: F,
    ) -> RxOutcome<'a, H>
    where
        F: FnMut(H, TxStatus, &TxStatusReport),
    {
        let Some(mode) = self.mode else {
            return RxOutcome::Dropped;
        };
        let Some(&profile) = self.profiles.get(rx.channel as usize) else {
            log::trace!("frame on unknown channel {}", rx.channel);
            return RxOutcome::Dropped;
        };
        if !mode.accepts(rx.header_format) {
            log::trace!("{:?} frame not expected in {:?}", rx.header_format, mode);
            return RxOutcome::Dropped;
        }
        let Some(crc) = receive_crc(profile) else {
            log::trace!("frame on inactive channel {}", rx.channel);
            return RxOutcome::Dropped;
        };

        let frame = match decode(raw, rx.header_format, crc) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("dropping frame on {}: {}", profile, err);
                return RxOutcome::Dropped;
            }
        };
        log::trace!(
            "rx {:?} {} -> {} on {}",
            frame.options.frame_type,
            frame.options.source,
            frame.options.destination,
            profile
        );

        match self.filters.select(&frame).cloned() {
            None => RxOutcome::Dropped,
            Some(Handler::User(handler)) => RxOutcome::Frame {
                handler,
                profile,
                rssi: rx.rssi,
                frame,
            },
            Some(Handler::Explore) => self.receive_explore(&frame, rx.channel, now, complete),
        }
    }

    fn explore_node(&self) -> ExploreNode {
        ExploreNode {
            node_id: self.config.node_id as u8,
            home_id: self.config.home_id,
            repeater: self.config.repeater,
            repeat_inclusion: self.config.repeat_inclusion,
            accept_inclusion: self.config.accept_inclusion,
        }
    }

    fn explore_profile(&self) -> CommunicationProfile {
        self.config.explore_profile.unwrap_or(match self.mode {
            Some(ProtocolMode::ThreeChannel) => CommunicationProfile::ThreeChannelA,
            _ => CommunicationProfile::Rate40k,
        })
    }

    fn receive_explore<'a, F>(
        &mut self,
        frame: &DecodedFrame<'a>,
        channel: u8,
        now: Instant,
        complete: F,
    ) -> RxOutcome<'a, H>
    where
        F: FnMut(H, TxStatus, &TxStatusReport),
    {
        let node = self.explore_node();
        let profile = self.explore_profile();
        let mut sender = ExploreSender {
            radio: &mut self.radio,
            transmitter: &mut self.transmitter,
            noise: &self.noise,
            profile,
            sequence: &mut self.sequence,
        };
        match self
            .explore
            .receive(&node, frame, channel, now, &mut sender, complete)
        {
            ExploreReceive::Dropped => RxOutcome::Dropped,
            ExploreReceive::Consumed => RxOutcome::Consumed,
            ExploreReceive::Deliver {
                source,
                acknowledge,
                header,
                payload,
            } => RxOutcome::Explore {
                source,
                acknowledge,
                header,
                payload,
            },
        }
    }

    /// Send a frame on `profile`.
    pub fn transmit(&mut self, profile: CommunicationProfile, frame: &mut TransmitFrame) -> Result<(), Error> {
        self.transmitter
            .transmit(&mut self.radio, &self.noise, profile, frame)
    }

    /// Install a receive filter routing to `H`.
    ///
    /// The explore engine's own catch-all takes one of the
    /// [FILTERS_PER_TYPE](crate::filter::FILTERS_PER_TYPE) explorer
    /// slots, leaving one fewer for user filters of that type.
    pub fn filter_add(&mut self, filter: ReceiveFilter<H>) -> Result<(), Error> {
        self.filters.add(filter.map_handler(Handler::User))
    }

    /// Stop or resume handing received frames to filters.
    pub fn filter_pause(&mut self, pause: bool) -> Result<(), Error> {
        self.filters.pause(pause)
    }

    /// Read background RSSI on every channel into the noise history.
    pub fn sample_noise_level(&mut self) {
        self.noise.sample(&mut self.radio);
    }

    /// Averaged background RSSI per channel.
    pub fn background_rssi(&self) -> [i8; MAX_CHANNELS] {
        self.noise.levels()
    }

    /// How long the last wakeup beam fragment kept the air busy, in ms.
    pub fn wakeup_beam_fragment_time(&self) -> u16 {
        self.transmitter.wakeup_beam_fragment_time(&self.radio)
    }

    /// Queue an explorer frame from this node. Returns its handle.
    pub fn explore_queue_frame(
        &mut self,
        destination: u8,
        command: ExploreCommand,
        options: ExploreTxOptions,
        payload: &[u8],
        callback: Option<H>,
        now: Instant,
    ) -> Result<u8, Error> {
        let request = ExploreRequest {
            home_id: self.config.home_id,
            source: self.config.node_id as u8,
            destination,
            command,
            options,
            payload,
        };
        self.explore.queue_frame(request, callback, now)
    }

    /// Drive the explore queue. Call when an explore transmit
    /// completes, after every received frame, and at
    /// [Self::explore_next_wakeup].
    pub fn explore_run<G, F>(&mut self, now: Instant, rng: &mut G, complete: F)
    where
        G: RngCore,
        F: FnMut(H, TxStatus, &TxStatusReport),
    {
        let profile = self.explore_profile();
        let mut sender = ExploreSender {
            radio: &mut self.radio,
            transmitter: &mut self.transmitter,
            noise: &self.noise,
            profile,
            sequence: &mut self.sequence,
        };
        self.explore.run(now, &mut sender, rng, complete);
    }

    pub fn explore_next_wakeup(&self) -> Option<Instant> {
        self.explore.next_wakeup()
    }

    /// Report the radio's verdict on the last explorer frame sent.
    pub fn explore_transmit_complete(&mut self, status: TxStatus, report: TxStatusReport) {
        self.explore.transmit_complete(status, report);
    }

    /// Abandon queued explorer frames, see [ExploreEngine::purge].
    pub fn explore_purge<F>(&mut self, source: u8, now: Instant, complete: F)
    where
        F: FnMut(H, TxStatus, &TxStatusReport),
    {
        let own_id = self.config.node_id as u8;
        self.explore.purge(source, own_id, now, complete);
    }
}

impl<R, H> LinkLayer<R, H>
where
    R: Radio,
    H: Clone + PartialEq,
{
    /// Remove a filter added earlier with the same conditions and handler.
    pub fn filter_remove(&mut self, filter: ReceiveFilter<H>) -> Result<(), Error> {
        self.filters.remove(&filter.map_handler(Handler::User))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::crc::CrcWidth;
    use crate::frame::explore::{ExploreOption, HEADER_LEN};
    use crate::frame::{decode_header, encode_frame, HeaderFormat};
    use crate::radio::mock::MockRadio;
    use crate::power::RSSI_INVALID;
    use std::vec::Vec;

    const HOME: [u8; 4] = [0xca, 0xfe, 0xba, 0xbf];

    fn config() -> LinkConfig {
        LinkConfig {
            home_id: HOME,
            node_id: 1,
            ..Default::default()
        }
    }

    fn link(mode: ProtocolMode) -> LinkLayer<MockRadio, u8> {
        let mut link = LinkLayer::new(MockRadio::new(mode), config());
        link.init().unwrap();
        link
    }

    fn rx(channel: u8, header_format: HeaderFormat) -> RxParameters {
        RxParameters {
            channel,
            header_format,
            rssi: -60,
        }
    }

    fn at(ms: u32) -> Instant {
        Instant::from_ticks(ms)
    }

    fn singlecast(source: u16, payload: &[u8], crc: CrcWidth) -> Vec<u8> {
        let options = FrameOptions::new(FrameType::Singlecast, HOME, source, 1);
        encode_frame(&options, HeaderFormat::TwoChannel, payload, crc)
            .unwrap()
            .to_vec()
    }

    fn no_callbacks(_: u8, _: TxStatus, _: &TxStatusReport) {
        panic!("unexpected explore completion");
    }

    #[test]
    fn init_needs_a_region() {
        let mut radio = MockRadio::new(ProtocolMode::TwoChannel);
        radio.mode = None;
        let mut link = LinkLayer::<_, u8>::new(radio, config());
        assert_eq!(link.init(), Err(Error::InvalidParameters));
    }

    #[test]
    fn init_programs_radio() {
        let link = link(ProtocolMode::TwoChannelLongRange);
        assert_eq!(link.radio().network, Some((HOME, 1, 0x5a)));
        use CommunicationProfile::*;
        assert_eq!(
            link.active_profiles(),
            &[Rate9k6, Rate40k, Rate100k, LongRangeB, Unsupported]
        );
        assert!(!link.is_header_format_3ch());
    }

    #[test]
    fn network_id_change() {
        let mut link = link(ProtocolMode::TwoChannel);
        link.set_network_id([1, 2, 3, 4], 9).unwrap();
        assert_eq!(link.radio().network, Some(([1, 2, 3, 4], 9, 0x5a)));
        assert_eq!(link.config().node_id, 9);
    }

    #[test]
    fn lr_config_change() {
        let mut link = link(ProtocolMode::TwoChannelLongRange);
        link.change_lr_channel_config(LrChannelConfig::Config1).unwrap();
        assert_eq!(link.radio().lr_config, LrChannelConfig::Config1);
        assert_eq!(link.active_profiles()[3], CommunicationProfile::LongRangeA);
    }

    #[test]
    fn dispatch_to_user_filter() {
        let mut link = link(ProtocolMode::TwoChannel);
        link.filter_add(ReceiveFilter::new(FrameType::Singlecast, 3).source(2))
            .unwrap();
        link.filter_add(ReceiveFilter::new(FrameType::Singlecast, 4))
            .unwrap();

        let raw = singlecast(2, &[0x20, 0x01], CrcWidth::Crc8);
        match link.receive(&rx(1, HeaderFormat::TwoChannel), &raw, at(0), no_callbacks) {
            RxOutcome::Frame {
                handler,
                profile,
                rssi,
                frame,
            } => {
                assert_eq!(handler, 3);
                assert_eq!(profile, CommunicationProfile::Rate40k);
                assert_eq!(rssi, -60);
                assert_eq!(frame.payload, &[0x20, 0x01]);
            }
            other => panic!("not dispatched: {:?}", other),
        }

        let raw = singlecast(7, &[0x20], CrcWidth::Crc16);
        assert!(matches!(
            link.receive(&rx(2, HeaderFormat::TwoChannel), &raw, at(0), no_callbacks),
            RxOutcome::Frame { handler: 4, .. }
        ));
    }

    #[test]
    fn bad_frames_dropped() {
        let mut link = link(ProtocolMode::TwoChannel);
        link.filter_add(ReceiveFilter::new(FrameType::Singlecast, 3))
            .unwrap();

        let mut raw = singlecast(2, &[0x20, 0x01], CrcWidth::Crc8);
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        assert_eq!(
            link.receive(&rx(1, HeaderFormat::TwoChannel), &raw, at(0), no_callbacks),
            RxOutcome::Dropped
        );

        let raw = singlecast(2, &[0x20, 0x01], CrcWidth::Crc8);
        // crc width follows the channel's profile
        assert_eq!(
            link.receive(&rx(2, HeaderFormat::TwoChannel), &raw, at(0), no_callbacks),
            RxOutcome::Dropped
        );
        // unused and out of range channels
        assert_eq!(
            link.receive(&rx(3, HeaderFormat::TwoChannel), &raw, at(0), no_callbacks),
            RxOutcome::Dropped
        );
        assert_eq!(
            link.receive(&rx(5, HeaderFormat::TwoChannel), &raw, at(0), no_callbacks),
            RxOutcome::Dropped
        );
        // format the region does not use
        assert_eq!(
            link.receive(&rx(1, HeaderFormat::ThreeChannel), &raw, at(0), no_callbacks),
            RxOutcome::Dropped
        );
        // too short to hold a header
        assert_eq!(
            link.receive(&rx(1, HeaderFormat::TwoChannel), &raw[..5], at(0), no_callbacks),
            RxOutcome::Dropped
        );
    }

    #[test]
    fn pause_and_remove() {
        let mut link = link(ProtocolMode::TwoChannel);
        let filter = ReceiveFilter::new(FrameType::Singlecast, 3);
        link.filter_add(filter.clone()).unwrap();
        let raw = singlecast(2, &[0x20], CrcWidth::Crc8);
        let rx = rx(1, HeaderFormat::TwoChannel);

        link.filter_pause(true).unwrap();
        assert_eq!(link.receive(&rx, &raw, at(0), no_callbacks), RxOutcome::Dropped);
        link.filter_pause(false).unwrap();
        assert!(matches!(
            link.receive(&rx, &raw, at(0), no_callbacks),
            RxOutcome::Frame { .. }
        ));

        link.filter_remove(filter.clone()).unwrap();
        assert_eq!(link.receive(&rx, &raw, at(0), no_callbacks), RxOutcome::Dropped);
        assert_eq!(link.filter_remove(filter), Err(Error::InvalidParameters));
    }

    #[test]
    fn explore_catch_all_takes_a_slot() {
        use crate::filter::FILTERS_PER_TYPE;

        let mut link = link(ProtocolMode::TwoChannel);
        for n in 1..FILTERS_PER_TYPE as u8 {
            link.filter_add(ReceiveFilter::new(FrameType::Explore, n).source(n as u16))
                .unwrap();
        }
        assert_eq!(
            link.filter_add(ReceiveFilter::new(FrameType::Explore, 9)),
            Err(Error::NoMemory)
        );
        // singlecast slots are all still free
        for n in 0..FILTERS_PER_TYPE as u8 {
            link.filter_add(ReceiveFilter::new(FrameType::Singlecast, n).source(n as u16))
                .unwrap();
        }
    }

    #[test]
    fn transmit_through_link() {
        let mut link = link(ProtocolMode::TwoChannel);
        let mut options = FrameOptions::new(FrameType::Singlecast, HOME, 1, 2);
        options.sequence = 5;
        let mut frame = TransmitFrame::new(options, &[0x20, 0x02]).unwrap();
        link.transmit(CommunicationProfile::Rate40k, &mut frame).unwrap();

        let sent = &link.radio().sent[0];
        let mut raw = sent.header.clone();
        raw.extend_from_slice(&sent.payload);
        let decoded = decode_header(&raw, HeaderFormat::TwoChannel).unwrap();
        assert_eq!(decoded.options.destination, 2);
        assert_eq!(decoded.options.sequence, 5);
        assert_eq!(decoded.payload, &[0x20, 0x02]);

        assert_eq!(
            link.transmit(CommunicationProfile::ThreeChannelA, &mut frame),
            Err(Error::Unsupported)
        );
    }

    #[test]
    fn noise_sampling() {
        let mut link = link(ProtocolMode::TwoChannel);
        assert_eq!(link.background_rssi(), [RSSI_INVALID; MAX_CHANNELS]);
        link.radio_mut().rssi = [Some(-90), Some(-91), Some(-92), None, None];
        link.sample_noise_level();
        assert_eq!(link.background_rssi(), [-90, -91, -92, RSSI_INVALID]);
    }

    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    #[test]
    fn explore_round_trip() {
        let mut link = link(ProtocolMode::TwoChannel);
        let handle = link
            .explore_queue_frame(
                0xff,
                ExploreCommand::Normal,
                ExploreTxOptions::empty(),
                &[0x01, 0x02],
                Some(6),
                at(0),
            )
            .unwrap();
        assert_eq!(handle, 1);

        link.explore_run(at(0), &mut ZeroRng, no_callbacks);
        let sent = &link.radio().sent[0];
        assert_eq!(sent.params.channel, 1);
        assert_eq!(sent.payload, [0x20, 0, 250, 0x40, 0, 0, 0, 0, 0x01, 0x02]);

        let mut done = Vec::new();
        link.explore_transmit_complete(TxStatus::Ok, TxStatusReport::default());
        link.explore_run(at(12), &mut ZeroRng, |cb, status, report| {
            done.push((cb, status, report.transmit_ticks))
        });
        assert_eq!(done, [(6, TxStatus::Ok, 12)]);
    }

    #[test]
    fn explore_frames_reach_engine() {
        let mut link = LinkLayer::<_, u8>::new(
            MockRadio::new(ProtocolMode::TwoChannel),
            LinkConfig {
                repeater: true,
                ..config()
            },
        );
        link.init().unwrap();

        let mut header = ExploreHeader::new(ExploreCommand::Normal);
        header.option = ExploreOption::empty();
        let mut body = header.to_bytes().to_vec();
        body.extend_from_slice(&[0x55]);
        let mut options = FrameOptions::new(FrameType::Explore, HOME, 3, 0xff);
        options.sequence = 4;
        let raw = encode_frame(&options, HeaderFormat::TwoChannel, &body, CrcWidth::Crc8)
            .unwrap()
            .to_vec();

        match link.receive(&rx(1, HeaderFormat::TwoChannel), &raw, at(0), no_callbacks) {
            RxOutcome::Explore {
                source, payload, ..
            } => {
                assert_eq!(source, 3);
                assert_eq!(payload, &[0x55]);
            }
            other => panic!("not delivered: {:?}", other),
        }

        // repeated after 50 ms, keeping the sender's sequence number
        link.explore_run(at(0), &mut ZeroRng, no_callbacks);
        link.explore_run(at(50), &mut ZeroRng, no_callbacks);
        let sent = &link.radio().sent[0];
        assert_eq!(sent.payload[..HEADER_LEN], [0x20, 0, 250, 0x31, 1, 0, 0, 0]);
        let mut raw = sent.header.clone();
        raw.extend_from_slice(&sent.payload);
        let frame = decode_header(&raw, HeaderFormat::TwoChannel).unwrap();
        assert_eq!(frame.options.source, 3);
        assert_eq!(frame.options.sequence, 4);
    }
}
