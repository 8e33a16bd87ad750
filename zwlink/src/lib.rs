#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

mod error;
pub use error::*;

pub mod frame;

mod profile;
pub use profile::*;

pub mod radio;
pub use radio::{Radio, RadioError, RxParameters};

mod filter;
pub use filter::*;

pub mod noise;
pub mod power;

mod transmit;
pub use transmit::*;

pub mod explore;

mod link;
pub use link::*;

/// Milliseconds since some fixed point, as kept by the caller's clock.
pub type Instant = fugit::TimerInstantU32<1000>;

/// Millisecond durations.
pub type Duration = fugit::MillisDurationU32;
