//! IRIG-B/E (local timecode) reference-clock demodulator (spec §4.5).

mod dsp;
mod frame;
mod pipeline;

pub use frame::{error_bits, Timecode};
pub use pipeline::IrigUnit;
