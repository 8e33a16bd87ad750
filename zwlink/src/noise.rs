//! Rolling background noise levels, per channel.

use crate::power::RSSI_INVALID;
use crate::{CommunicationProfile, LrChannelConfig, ProtocolMode, Radio};

/// Most channels any region samples.
pub const MAX_CHANNELS: usize = 4;

/// Samples averaged per channel.
pub const HISTORY: usize = 8;

/// Channels a region samples.
pub fn channel_count(mode: ProtocolMode, lr_config: LrChannelConfig) -> usize {
    if lr_config == LrChannelConfig::Config3 {
        2
    } else if mode.has_long_range() {
        4
    } else {
        3
    }
}

/// Index into [NoiseTracker::levels] holding a Long Range profile's
/// noise floor.
pub fn lr_channel_index(profile: CommunicationProfile, lr_config: LrChannelConfig) -> usize {
    if lr_config != LrChannelConfig::Config3 {
        return 3;
    }
    match profile.data_profile() {
        CommunicationProfile::LongRangeB => 1,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Ring {
    samples: [i8; HISTORY],
    next: usize,
}

impl Ring {
    const fn new() -> Self {
        Self {
            samples: [RSSI_INVALID; HISTORY],
            next: 0,
        }
    }

    fn push(&mut self, rssi: i8) {
        self.samples[self.next] = rssi;
        self.next = (self.next + 1) % HISTORY;
    }

    fn mean(&self) -> i8 {
        let (sum, count) = self
            .samples
            .iter()
            .filter(|&&s| s != RSSI_INVALID)
            .fold((0i32, 0i32), |(sum, count), &s| (sum + s as i32, count + 1));
        if count == 0 {
            RSSI_INVALID
        } else {
            (sum / count) as i8
        }
    }
}

/// Background RSSI history for every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoiseTracker {
    rings: [Ring; MAX_CHANNELS],
}

impl Default for NoiseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseTracker {
    pub const fn new() -> Self {
        Self {
            rings: [Ring::new(); MAX_CHANNELS],
        }
    }

    /// Forget every sample.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Record one reading for a channel. Out of range channels and
    /// invalid readings are ignored.
    pub fn record(&mut self, channel: usize, rssi: i8) {
        if rssi == RSSI_INVALID {
            return;
        }
        if let Some(ring) = self.rings.get_mut(channel) {
            ring.push(rssi);
        }
    }

    /// Read the radio's background RSSI on every channel the region uses.
    pub fn sample<R: Radio>(&mut self, radio: &mut R) {
        let Some(mode) = radio.protocol_mode() else {
            return;
        };
        let count = channel_count(mode, radio.lr_channel_config());
        for channel in 0..count {
            if let Some(rssi) = radio.background_rssi(channel as u8) {
                self.record(channel, rssi);
            } else {
                log::trace!("no background rssi on channel {}", channel);
            }
        }
    }

    /// Averaged level per channel, [RSSI_INVALID] where nothing was sampled.
    pub fn levels(&self) -> [i8; MAX_CHANNELS] {
        let mut out = [RSSI_INVALID; MAX_CHANNELS];
        for (level, ring) in out.iter_mut().zip(self.rings.iter()) {
            *level = ring.mean();
        }
        out
    }

    pub fn level(&self, channel: usize) -> i8 {
        self.rings.get(channel).map_or(RSSI_INVALID, Ring::mean)
    }

    /// Noise floor a Long Range frame on `profile` reports.
    pub fn lr_noise_floor(&self, profile: CommunicationProfile, lr_config: LrChannelConfig) -> i8 {
        self.level(lr_channel_index(profile, lr_config))
    }
}
