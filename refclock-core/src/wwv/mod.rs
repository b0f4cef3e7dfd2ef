//! WWV/WWVH (USA, AM subcarrier + BCD) reference-clock demodulator
//! (spec §4.4).

mod dsp;
mod pipeline;
mod seconds;
mod sync;
mod tables;

pub use pipeline::{alarm_bits, Timecode, WwvUnit};
pub use tables::DSTCOD;
