//! Long Range transmit power control.

/// RSSI reported when the radio could not measure one.
pub const RSSI_UNAVAILABLE: i8 = 127;

/// RSSI or noise floor that was never measured.
pub const RSSI_INVALID: i8 = i8::MIN;

/// RSSI outside this range leaves power untouched.
pub const RSSI_LOWEST: i8 = -120;
pub const RSSI_HIGHEST: i8 = 10;

/// Noise floor is clamped into this range before use.
pub const NOISE_FLOOR_LOWEST: i8 = -102;
pub const NOISE_FLOOR_HIGHEST: i8 = -65;

/// RSSI margin is clamped into this range before use.
pub const MARGIN_LOWEST: i8 = -5;
pub const MARGIN_HIGHEST: i8 = 26;

/// Margin below which power goes up.
pub const MARGIN_LOW: i8 = 6;

/// Margin above which power goes down.
pub const MARGIN_HIGH: i8 = 10;

/// Adjustment step, in dB.
pub const STEP: i8 = 3;

/// Why a frame is being sent again, if it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Retransmission {
    #[default]
    None,
    /// An ordinary retry after a missing ACK.
    Retry,
    /// A retry that now uses a wakeup beam, after singlecast retries failed.
    Beamed,
}

/// Pick the transmit power for the next Long Range frame, given the
/// power and RSSI last seen on the link and the local noise floor.
///
/// The result is always within `min..=max`.
pub fn adjust(tx_power: i8, rssi: i8, noise_floor: i8, retransmit: Retransmission, min: i8, max: i8) -> i8 {
    let optimal = if retransmit == Retransmission::Retry || rssi == RSSI_UNAVAILABLE {
        tx_power.saturating_add(STEP)
    } else if retransmit == Retransmission::Beamed {
        tx_power.saturating_sub(STEP)
    } else if noise_floor == RSSI_INVALID || rssi == RSSI_INVALID {
        tx_power
    } else if !(RSSI_LOWEST..=RSSI_HIGHEST).contains(&rssi) {
        tx_power
    } else {
        let noise_floor = noise_floor.clamp(NOISE_FLOOR_LOWEST, NOISE_FLOOR_HIGHEST);
        let margin = rssi.saturating_sub(noise_floor).clamp(MARGIN_LOWEST, MARGIN_HIGHEST);
        if margin < MARGIN_LOW {
            tx_power.saturating_add(STEP)
        } else if margin > MARGIN_HIGH {
            tx_power.saturating_sub(STEP)
        } else {
            // margin within MARGIN_LOW..=MARGIN_HIGH holds the
            // current power rather than dropping to 0 dBm
            tx_power
        }
    };

    if min > max {
        return max;
    }
    optimal.clamp(min, max)
}

/// Power levels a 4 bit Long Range beam field can express.
pub const BEAM_POWER_TABLE: [i8; 16] = [-6, -2, 2, 6, 10, 13, 16, 19, 21, 23, 25, 26, 27, 28, 29, 30];

/// Index of the lowest table power at or above `tx_power`.
pub fn tx_power_index(tx_power: i8) -> u8 {
    BEAM_POWER_TABLE
        .iter()
        .position(|&p| tx_power <= p)
        .unwrap_or(BEAM_POWER_TABLE.len() - 1) as u8
}
