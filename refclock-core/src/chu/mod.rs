//! CHU (Canada, 300-baud FSK) reference-clock demodulator (spec §4.3).

mod burst;
mod dsp;
mod pipeline;

pub use pipeline::{Alarm, ChuUnit, Timecode};
