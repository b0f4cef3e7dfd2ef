//! The WWV/WWVH station unit: wires the RF filters, quadrature
//! matched-filter accumulators, minute/second sync acquisition, PLL, and
//! the seconds state machine together behind the `receive()` entry
//! point (`wwv_receive`/`wwv_rf`/`wwv_epoch`/`wwv_clock` in `wwv.c`).
//!
//! Channel (frequency) mitigation across the four WWV/WWVH carrier
//! frequencies is out of scope here: the driver is fed a single
//! pre-tuned 8 kHz baseband stream (spec.md §4.4), so only station
//! mitigation (WWV vs WWVH) on that one stream applies.

use super::dsp::{
    DataLowpass, MatchedAccumulator, Oscillator, SyncBandpass, DATSIZ, IN100, IN1000, IN1200, MS,
    MINUTE, SECOND, SYNSIZ, TCKCYC, TCKSIZ,
};
use super::seconds::{status_bits as sec_status, SecondsState};
use super::sync::{wwv_snr, SecondSync, SyncChannel};
use super::tables::{DST1, DST2, DUT1, DUT2, DUT4, DUTS, SECWAR};
use crate::fixed::Timestamp;
use crate::offset::{FilterResult, OffsetFilter};

const MAXGAIN: i32 = 16383;
const MAXCLP: u32 = 100;
const MAXAMP: f32 = 6000.0;

const QTHR: f32 = 2500.0;
const QSNR: f32 = 10.0;
const DTHR: f32 = 1000.0;
const DSNR: f32 = 5.0;
const MAXERR: u32 = 3;

const AMAX_BIT: u32 = 1 << super::sync::AMAX;
const PROGX_LEN: usize = 61;

const DATA_TIMEOUT: u32 = 15;
const SYNCH_TIMEOUT: u32 = 40;
const PANIC_TIMEOUT: u32 = 2880;

pub mod alarm_bits {
    pub const CMPERR: u32 = 0x1;
    pub const LOWERR: u32 = 0x2;
    pub const NINERR: u32 = 0x4;
    pub const SYNERR: u32 = 0x8;
}

/// One emitted WWV/WWVH timecode line's worth of data (spec §6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timecode {
    pub in_sync: bool,
    pub alarm: u32,
    pub year: u32,
    pub yearday: u32,
    pub hour: u32,
    pub min: u32,
    pub sec: u32,
    pub gain: i32,
    pub station_is_h: bool,
    /// DST code, 0-3, indexing [`super::tables::DSTCOD`] (`DST2 DST1`).
    pub dst: u8,
    /// Signed DUT1 in tenths of a second (`DUTS` sign, `DUT1`/`DUT2`/`DUT4` magnitude).
    pub dut1: f32,
    /// Leap second warning bit (`SECWAR`): a leap second is scheduled this month.
    pub leap: bool,
}

struct Station {
    sync: SyncChannel,
    select: bool,
}

impl Default for Station {
    fn default() -> Self {
        Station { sync: SyncChannel::default(), select: false }
    }
}

pub struct WwvUnit {
    data_lpf: DataLowpass,
    sync_bpf: SyncBandpass,

    osc_data: Oscillator,
    osc_wwv: Oscillator,
    osc_wwvh: Oscillator,

    dat_i: MatchedAccumulator,
    dat_q: MatchedAccumulator,
    syn_i_wwv: MatchedAccumulator,
    syn_q_wwv: MatchedAccumulator,
    syn_i_wwvh: MatchedAccumulator,
    syn_q_wwvh: MatchedAccumulator,
    tck_i_wwv: MatchedAccumulator,
    tck_q_wwv: MatchedAccumulator,
    tck_i_wwvh: MatchedAccumulator,
    tck_q_wwvh: MatchedAccumulator,

    epobuf: Vec<f32>,
    epomax: f32,
    epopos: i64,
    nxtmax: f32,

    wwv: Station,
    wwvh: Station,

    secsync: SecondSync,
    seconds: SecondsState,
    offset_filter: OffsetFilter,

    /// Receiver second-of-minute, 0-60. Tracked independently of `mphase`
    /// so a leap-second minute can hold it at 60 for `PROGX[60]`
    /// (`SecOp::Min2`) instead of wrapping at a fixed 60-wide modulus.
    rsec: usize,

    mphase: i64,
    rphase: i64,
    repoch: i64,
    yepoch: i64,

    status: u32,
    alarm: u32,
    errcnt: u32,
    watch: u32,

    gain: i32,
    clipcnt: u32,

    sigmin: f32,
    sigzer: f32,
    sigone: f32,
    engmax: f32,

    timestamp: Timestamp,
    tick: Timestamp,
    pub fudgetime1: f64,
}

impl Default for WwvUnit {
    fn default() -> Self {
        WwvUnit {
            data_lpf: DataLowpass::default(),
            sync_bpf: SyncBandpass::default(),
            osc_data: Oscillator::default(),
            osc_wwv: Oscillator::default(),
            osc_wwvh: Oscillator::default(),
            dat_i: MatchedAccumulator::new(DATSIZ),
            dat_q: MatchedAccumulator::new(DATSIZ),
            syn_i_wwv: MatchedAccumulator::new(SYNSIZ),
            syn_q_wwv: MatchedAccumulator::new(SYNSIZ),
            syn_i_wwvh: MatchedAccumulator::new(SYNSIZ),
            syn_q_wwvh: MatchedAccumulator::new(SYNSIZ),
            tck_i_wwv: MatchedAccumulator::new(TCKSIZ),
            tck_q_wwv: MatchedAccumulator::new(TCKSIZ),
            tck_i_wwvh: MatchedAccumulator::new(TCKSIZ),
            tck_q_wwvh: MatchedAccumulator::new(TCKSIZ),
            epobuf: vec![0.0; SECOND],
            epomax: 0.0,
            epopos: 0,
            nxtmax: 0.0,
            wwv: Station::default(),
            wwvh: Station::default(),
            secsync: SecondSync::new(),
            seconds: SecondsState::default(),
            offset_filter: OffsetFilter::new(),
            rsec: 0,
            mphase: 0,
            rphase: 0,
            repoch: 0,
            yepoch: 0,
            status: 0,
            alarm: 0,
            errcnt: 0,
            watch: 0,
            gain: MAXGAIN / 2,
            clipcnt: 0,
            sigmin: 0.0,
            sigzer: 0.0,
            sigone: 0.0,
            engmax: 0.0,
            timestamp: Timestamp::ZERO,
            tick: Timestamp::from_f64(1.0 / SECOND as f64),
            fudgetime1: 0.0,
        }
    }
}

impl WwvUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one buffer of 16-bit PCM samples with its capture timestamp
    /// (`wwv_receive`).
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
            if let Some(tc) = self.process_sample(sample) {
                out.push(tc);
            }
            self.timestamp = self.timestamp.wrapping_add(self.tick);
        }
        out
    }

    fn process_sample(&mut self, sample: f32) -> Option<Timecode> {
        let data = self.data_lpf.process(sample);
        let sync = self.sync_bpf.process(sample);

        let (di, dq) = self.osc_data.sample(IN100);
        self.dat_i.push(data * di);
        self.dat_q.push(data * dq);

        let (vi, vq) = self.osc_wwv.sample(IN1000);
        self.syn_i_wwv.push(sync * vi);
        self.syn_q_wwv.push(sync * vq);
        self.tck_i_wwv.push(sync * vi);
        self.tck_q_wwv.push(sync * vq);

        let (hi, hq) = self.osc_wwvh.sample(IN1200);
        self.syn_i_wwvh.push(sync * hi);
        self.syn_q_wwvh.push(sync * hq);
        self.tck_i_wwvh.push(sync * hi);
        self.tck_q_wwvh.push(sync * hq);

        self.wwv.sync.amp = (self.syn_i_wwv.sum * self.syn_i_wwv.sum
            + self.syn_q_wwv.sum * self.syn_q_wwv.sum)
            .sqrt();
        self.wwvh.sync.amp = (self.syn_i_wwvh.sum * self.syn_i_wwvh.sum
            + self.syn_q_wwvh.sum * self.syn_q_wwvh.sum)
            .sqrt();

        let mphase_is_zero = self.mphase == 0;
        let epoch = {
            let e = self.mphase - SYNSIZ as i64;
            if e < 0 {
                e + MINUTE as i64
            } else {
                e
            }
        };
        self.wwv.sync.qrz(epoch, mphase_is_zero, self.watch);
        self.wwvh.sync.qrz(epoch, mphase_is_zero, self.watch);
        if mphase_is_zero {
            self.select_station();
        }

        if self.status & sec_status::MSYNC != 0 {
            self.run_epoch_scanner();
        } else {
            let best = if self.wwv.sync.metric >= self.wwvh.sync.metric {
                &self.wwv.sync
            } else {
                &self.wwvh.sync
            };
            if best.metric >= 50.0 {
                let sec_epoch = self.mphase % SECOND as i64;
                if sec_epoch == self.wwv.sync.mepoch % SECOND as i64 {
                    self.status |= sec_status::MSYNC;
                    self.watch = 0;
                }
            }
        }

        let selected_amp = if self.status & sec_status::SELV != 0 {
            self.tck_i_wwv.sum.hypot(self.tck_q_wwv.sum)
        } else if self.status & sec_status::SELH != 0 {
            self.tck_i_wwvh.sum.hypot(self.tck_q_wwvh.sum)
        } else {
            0.0
        };
        let mfsync = selected_amp / TCKCYC as f32;
        let e = self.mphase % SECOND as i64;
        self.epobuf[e as usize] += (mfsync - self.epobuf[e as usize]) / self.secsync.avgint as f32;
        let dtemp = self.epobuf[e as usize];
        if dtemp > self.epomax {
            self.epomax = dtemp;
            self.epopos = e;
            let mut j = e - 6 * MS as i64;
            if j < 0 {
                j += SECOND as i64;
            }
            self.nxtmax = self.epobuf[j as usize].abs();
        }

        let mut emitted = None;
        if e == 0 {
            let eposnr = wwv_snr(self.epomax, self.nxtmax);
            let mut epopos = self.epopos - TCKCYC as i64 * MS as i64;
            if epopos < 0 {
                epopos += SECOND as i64;
            }
            let selected = self.status & (sec_status::SELV | sec_status::SELH) != 0;
            self.secsync.endpoc(
                self.epomax,
                eposnr,
                epopos as i32,
                self.status & sec_status::MSYNC != 0,
                selected,
            );
            if self.secsync.ssync {
                self.status |= sec_status::SSYNC;
                self.yepoch = self.secsync.yepoch as i64;
                let mut residual = self.yepoch as f64 / SECOND as f64;
                if residual > 0.5 {
                    residual -= 1.0;
                }
                self.offset_filter.push(residual);
            } else if !selected {
                self.alarm |= alarm_bits::SYNERR;
            }
            self.epomax = 0.0;
            if self.status & sec_status::MSYNC == 0 {
                self.ride_gain();
            }
        }

        self.rphase += 1;
        if self.mphase % SECOND as i64 == self.repoch {
            emitted = self.end_of_second();
            self.rphase = 0;
        }

        self.mphase = (self.mphase + 1) % MINUTE as i64;
        emitted
    }

    fn select_station(&mut self) {
        self.status &= !(sec_status::SELV | sec_status::SELH);
        if self.wwv.sync.metric >= self.wwvh.sync.metric {
            self.status |= sec_status::SELV;
            self.wwv.select = true;
            self.wwvh.select = false;
        } else {
            self.status |= sec_status::SELH;
            self.wwv.select = false;
            self.wwvh.select = true;
        }
    }

    fn run_epoch_scanner(&mut self) {
        if self.wwv.sync.amp > self.wwv.sync.syneng {
            self.wwv.sync.syneng = self.wwv.sync.amp;
        }
        if self.wwvh.sync.amp > self.wwvh.sync.syneng {
            self.wwvh.sync.syneng = self.wwvh.sync.amp;
        }
        if self.rphase == 800 * MS as i64 {
            self.repoch = self.yepoch;
        }
        if self.rphase == 15 * MS as i64 {
            self.sigmin = self.dat_i.sum;
            self.sigzer = self.sigmin;
            self.sigone = self.sigmin;
        }
        if self.rphase == 200 * MS as i64 {
            self.sigzer = self.dat_i.sum;
            self.engmax = self.dat_i.sum.hypot(self.dat_q.sum);
        } else if self.rphase == 500 * MS as i64 {
            self.sigone = self.dat_i.sum;
        }
    }

    fn end_of_second(&mut self) -> Option<Timecode> {
        self.status &= !(sec_status::DGATE | sec_status::BGATE);
        let engmin = self.dat_i.sum.hypot(self.dat_q.sum);
        let datsnr = wwv_snr(self.engmax, engmin);

        let bit = if self.engmax < DTHR || datsnr < DSNR {
            self.status |= sec_status::DGATE;
            0.0
        } else {
            let zero = self.sigzer - self.sigone;
            let one = self.sigone - self.sigmin;
            one - zero
        };
        if self.status & (sec_status::DGATE | sec_status::BGATE) != 0 {
            self.errcnt += 1;
        }
        if self.errcnt > MAXERR {
            self.alarm |= alarm_bits::LOWERR;
        }
        self.ride_gain();
        self.wwv.sync.syneng = 0.0;
        self.wwvh.sync.syneng = 0.0;

        let (outcome, new_status) = self.seconds.rsec(self.rsec, bit, self.status);
        self.status = new_status;
        if outcome.cmperr {
            self.alarm |= alarm_bits::CMPERR;
        }
        if outcome.bgate {
            self.status |= sec_status::BGATE;
        }
        self.rsec = if outcome.minute_rollover { 0 } else { (self.rsec + 1) % PROGX_LEN };

        self.watch += 1;
        let mut reset = false;
        let mut result = None;
        if outcome.minute_rollover {
            result = self.clock_tick();
            self.errcnt = 0;
            self.seconds.digcnt = 0;
            self.alarm = 0;
            if self.status & sec_status::INSYNC != 0 {
                if self.watch > PANIC_TIMEOUT {
                    reset = true;
                }
            } else if self.status & sec_status::DSYNC != 0 {
                if self.watch > SYNCH_TIMEOUT {
                    reset = true;
                }
            } else if self.watch > DATA_TIMEOUT {
                reset = true;
            }
        }
        if reset {
            self.newgame();
        }
        result
    }

    fn clock_tick(&mut self) -> Option<Timecode> {
        if self.status & sec_status::SSYNC == 0 {
            self.alarm |= alarm_bits::SYNERR;
        }
        if self.seconds.digcnt < 9 {
            self.alarm |= alarm_bits::NINERR;
        }
        if self.alarm == 0 {
            self.status |= sec_status::INSYNC;
        }

        if self.status & sec_status::INSYNC == 0 || self.status & sec_status::SSYNC == 0 {
            return None;
        }

        let dv = &self.seconds.decvec;
        let min = dv[0].digit as u32 + dv[1].digit as u32 * 10;
        let hour = dv[2].digit as u32 + dv[3].digit as u32 * 10;
        let yearday = dv[4].digit as u32 + dv[5].digit as u32 * 10 + dv[6].digit as u32 * 100;
        let year = dv[7].digit as u32 + dv[8].digit as u32 * 10 + 2000;
        let sec = (self.mphase / SECOND as i64) as u32 % 60;

        let misc = self.seconds.misc;
        let dst = ((misc & DST2 as u32 != 0) as u8) << 1 | (misc & DST1 as u32 != 0) as u8;
        let magnitude = (misc & DUT1 as u32 != 0) as i32
            + 2 * (misc & DUT2 as u32 != 0) as i32
            + 4 * (misc & DUT4 as u32 != 0) as i32;
        let dut1 = if misc & DUTS as u32 != 0 { -0.1 * magnitude as f32 } else { 0.1 * magnitude as f32 };
        let leap = misc & SECWAR as u32 != 0;

        Some(Timecode {
            in_sync: self.status & sec_status::INSYNC != 0,
            alarm: self.alarm,
            year,
            yearday,
            hour,
            min,
            sec,
            gain: self.gain,
            station_is_h: self.status & sec_status::SELH != 0,
            dst,
            dut1,
            leap,
        })
    }

    /// Current accumulated offset-filter statistics (spec §3: every
    /// station unit owns one filter).
    pub fn offset(&self) -> FilterResult {
        self.offset_filter.request()
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

    /// Reset all acquisition state and start over (`wwv_newgame`).
    fn newgame(&mut self) {
        self.watch = 0;
        self.status = 0;
        self.alarm = 0;
        self.secsync.avgint = super::sync::MINAVG;
        self.secsync.freq = 0.0;
        self.gain = MAXGAIN / 2;
        self.wwv = Station::default();
        self.wwvh = Station::default();
        self.seconds.clear();
        self.epobuf.iter_mut().for_each(|v| *v = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_silence_never_panics() {
        let mut unit = WwvUnit::new();
        let samples = vec![0i16; SECOND * 3];
        let ts = Timestamp::new(0xe800_0000, 0);
        let codes = unit.receive(&samples, ts);
        assert!(codes.iter().all(|c| !c.in_sync));
    }

    #[test]
    fn gain_rides_up_on_silence() {
        let mut unit = WwvUnit::new();
        let samples = vec![0i16; SECOND];
        let ts = Timestamp::new(0, 0);
        unit.receive(&samples, ts);
        assert!(unit.gain >= MAXGAIN / 2);
    }

    #[test]
    fn newgame_resets_sync_state() {
        let mut unit = WwvUnit::new();
        unit.status = sec_status::INSYNC | sec_status::SSYNC;
        unit.watch = 9999;
        unit.newgame();
        assert_eq!(unit.status, 0);
        assert_eq!(unit.watch, 0);
        assert_eq!(unit.secsync.avgint, super::super::sync::MINAVG);
    }
}
