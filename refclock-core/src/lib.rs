//! Software-radio reference-clock demodulators for CHU (Canada,
//! 300-baud FSK), WWV/WWVH (USA, AM subcarrier + BCD), and IRIG-B/E
//! (local timecode). Each pipeline consumes 8 kHz/16-bit mono PCM
//! audio plus capture timestamps and produces reconstructed UTC
//! timecodes and clock-discipline offsets, fed through a shared
//! [`offset::OffsetFilter`] and published over the NTP SHM wire
//! protocol ([`shm`]).

pub mod calendar;
pub mod chu;
pub mod config;
pub mod error;
pub mod fixed;
pub mod irig;
pub mod offset;
pub mod pcm;
pub mod shm;
pub mod wwv;

pub use error::{RefclockError, Result};
pub use fixed::Timestamp;
