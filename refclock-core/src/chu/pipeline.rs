//! The CHU station unit: wires the signal chain, the eight UART
//! survivors, and the burst/minute state machine together behind the
//! `receive()` entry point (`chu_receive`/`chu_second` in `chu.c`).

use super::burst::{status_bits, BurstState, MINMETRIC};
use super::dsp::{Survivor, SignalChain, AGAIN, BAUD, MAXAMP, MAXCLP, SECOND};
use crate::fixed::Timestamp;
use crate::offset::{FilterResult, OffsetFilter};

const MAXGAIN: i32 = 16383;

/// Errors/alarms accumulated at minute rollover (spec §7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alarm {
    pub synerr: bool,
    pub fmterr: bool,
    pub decerr: bool,
    pub tsperr: bool,
}

/// One emitted CHU timecode line's worth of data (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct Timecode {
    pub in_sync: bool,
    pub alarm: Alarm,
    pub year: u32,
    pub day: u32,
    pub hour: u32,
    pub min: u32,
    pub sec: u32,
    pub dst: u8,
    pub minset: u32,
    pub gain: i32,
    pub metric: i32,
    pub ntstamp: usize,
}

pub struct ChuUnit {
    chain: SignalChain,
    survivors: [Survivor; 8],
    decptr: usize,
    decpha: usize,
    dbrk: i32,
    baud_accum: f32,
    burst: BurstState,
    offset_filter: OffsetFilter,
    laststamp: Timestamp,
    timestamp: Timestamp,
    tick: Timestamp,
    sec: u32,
    gain: i32,
    clipcnt: u32,
    seccnt: usize,
    pub fudgetime1: f64,
}

impl Default for ChuUnit {
    fn default() -> Self {
        ChuUnit {
            chain: SignalChain::default(),
            survivors: [Survivor::default(); 8],
            decptr: 0,
            decpha: 0,
            dbrk: 0,
            baud_accum: 0.0,
            burst: BurstState::default(),
            offset_filter: OffsetFilter::new(),
            laststamp: Timestamp::ZERO,
            timestamp: Timestamp::ZERO,
            tick: Timestamp::from_f64(1.0 / SECOND as f64),
            sec: 0,
            gain: 127,
            clipcnt: 0,
            seccnt: 0,
            fudgetime1: 0.0,
        }
    }
}

impl ChuUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one buffer of 16-bit PCM samples with its capture timestamp
    /// (`chu_receive`). The timestamp assigned to the i-th sample is
    /// `capture_timestamp - (len - i) / SECOND`, per spec §5.
    pub fn receive(&mut self, samples: &[i16], capture_timestamp: Timestamp) -> Vec<Timecode> {
        let buf_duration = Timestamp::from_f64(samples.len() as f64 / SECOND as f64);
        self.timestamp = capture_timestamp.wrapping_sub(buf_duration);

        let mut out = Vec::new();
        for &raw in samples {
            let mut sample = raw as f32;
            if sample > MAXAMP {
                sample = MAXAMP;
                self.clipcnt += 1;
            } else if sample < -MAXAMP {
                sample = -MAXAMP;
                self.clipcnt += 1;
            }
            self.process_sample(sample);
            self.timestamp = self.timestamp.wrapping_add(self.tick);

            self.seccnt = (self.seccnt + 1) % SECOND;
            if self.seccnt == 0 {
                self.ride_gain();
                if let Some(tc) = self.tick_second() {
                    out.push(tc);
                }
            }
        }
        out
    }

    fn process_sample(&mut self, sample: f32) {
        let (lpf, _monitor) = self.chain.process(sample);

        self.baud_accum += 1.0 / SECOND as f32;
        if self.baud_accum <= 1.0 / (BAUD * 8.0) {
            return;
        }
        self.baud_accum -= 1.0 / (BAUD * 8.0);
        self.decptr = (self.decptr + 1) % 8;
        let stamp = self.timestamp;
        let uart_input = -lpf * AGAIN;
        self.survivors[self.decptr].cstamp = stamp;
        self.survivors[self.decptr].update(uart_input);

        if self.dbrk > 0 {
            self.dbrk -= 1;
            if self.dbrk > 0 {
                return;
            }
            self.decpha = self.decptr;
        }
        if self.decptr != self.decpha {
            return;
        }

        let mut best_dist = 0.0f32;
        let mut best: Option<usize> = None;
        for (i, sp) in self.survivors.iter().enumerate() {
            if sp.uart & 0x601 != 0x600 || sp.span < super::dsp::SPAN {
                continue;
            }
            if sp.dist > best_dist {
                best_dist = sp.dist;
                best = Some(i);
            }
        }
        let Some(j) = best else { return };

        let hexhex = (self.survivors[j].uart >> 1) & 0xff;
        let cstamp = self.survivors[j].cstamp;
        self.decode_char(hexhex, cstamp);
        self.dbrk = 88;
    }

    fn decode_char(&mut self, hexhex: i32, cstamp: Timestamp) {
        if self.laststamp.is_zero() {
            self.laststamp = self.timestamp;
        }
        let gap = self.timestamp.wrapping_sub(self.laststamp).to_f64() as f32;
        self.laststamp = self.timestamp;
        self.burst.decode_char(hexhex, cstamp, gap);
    }

    fn ride_gain(&mut self) {
        if self.clipcnt == 0 {
            self.gain += 4;
            if self.gain > MAXGAIN {
                self.gain = MAXGAIN;
            }
        } else if self.clipcnt > MAXCLP {
            self.gain -= 4;
            if self.gain < 0 {
                self.gain = 0;
            }
        }
        self.clipcnt = 0;
    }

    /// Advance the seconds-of-minute counter; at minute rollover process
    /// the accumulated bursts and emit a timecode (`chu_second`).
    fn tick_second(&mut self) -> Option<Timecode> {
        self.sec = (self.sec + 1) % 60;
        if self.sec != 0 {
            return None;
        }

        self.burst.flush_burst();
        let metric = self.burst.majority_decode();

        let mut alarm = Alarm::default();
        if self.burst.status & (status_bits::BFRAME | status_bits::AFRAME) != 0 {
            alarm.synerr = true;
        }
        if self.burst.status & (status_bits::BFORMAT | status_bits::AFORMAT) != 0 {
            alarm.fmterr = true;
        }
        if self.burst.status & status_bits::DECODE != 0 {
            alarm.decerr = true;
        }
        if self.burst.status & status_bits::STAMP != 0 {
            alarm.tsperr = true;
        }
        if self.burst.status & status_bits::BVALID != 0 && metric >= MINMETRIC {
            self.burst.status |= status_bits::INSYNC;
        }

        let tc = Timecode {
            in_sync: self.burst.status & status_bits::INSYNC != 0,
            alarm,
            year: self.burst.year,
            day: self.burst.day,
            hour: self.burst.hour,
            min: self.burst.min,
            sec: self.burst.sec,
            dst: self.burst.dst,
            minset: 0,
            gain: self.gain,
            metric,
            ntstamp: self.burst.ntstamp,
        };

        for ts in &self.burst.tstamp[..self.burst.ntstamp] {
            self.offset_filter.push(ts.to_f64());
        }
        self.burst.clear_minute();
        Some(tc)
    }

    /// Current accumulated offset-filter statistics (spec §3: every
    /// station unit owns one filter).
    pub fn offset(&self) -> FilterResult {
        self.offset_filter.request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_silence_never_panics() {
        let mut unit = ChuUnit::new();
        let samples = vec![0i16; SECOND * 2];
        let ts = Timestamp::new(0xe800_0000, 0);
        let codes = unit.receive(&samples, ts);
        assert!(codes.is_empty() || codes.iter().all(|c| !c.in_sync));
    }

    #[test]
    fn gain_rides_up_on_silence() {
        let mut unit = ChuUnit::new();
        let samples = vec![0i16; SECOND];
        let ts = Timestamp::new(0, 0);
        unit.receive(&samples, ts);
        assert!(unit.gain >= 127);
    }
}
