//! The IRIG-B/E station unit: wires the RF filters, baud integrator/PLL,
//! and frame decoder together behind the `receive()` entry point
//! (`irig_receive` in `irig.c`).

use super::dsp::{BaudIntegrator, RfFilters, MAXTC, MINTC, SECOND};
use super::frame::{classify_pulse, error_bits, BaudDecoder, Timecode};
use crate::fixed::Timestamp;
use crate::offset::{FilterResult, OffsetFilter};

pub struct IrigUnit {
    rf: RfFilters,
    baud: BaudIntegrator,
    decoder: BaudDecoder,
    offset_filter: OffsetFilter,

    decim: u32,
    fdelay: f32,
    seccnt: usize,

    pulse: usize,
    cycles: u32,
    dcycles: u32,
    envmin: f32,
    envmax: f32,
    slice: f32,

    errflg: u32,
    badcnt: u32,
    timestamp: Timestamp,
    tick: Timestamp,
    chrstamp: Timestamp,
    pub fudgetime1: f64,
}

impl Default for IrigUnit {
    fn default() -> Self {
        IrigUnit {
            rf: RfFilters::default(),
            baud: BaudIntegrator::default(),
            decoder: BaudDecoder::default(),
            offset_filter: OffsetFilter::new(),
            decim: 1,
            fdelay: super::dsp::IRIG_B_DELAY,
            seccnt: 0,
            pulse: 0,
            cycles: 0,
            dcycles: 0,
            envmin: 1e6,
            envmax: -1e6,
            slice: 0.0,
            errflg: 0,
            badcnt: 0,
            timestamp: Timestamp::ZERO,
            tick: Timestamp::from_f64(1.0 / SECOND as f64),
            chrstamp: Timestamp::ZERO,
            fudgetime1: 0.0,
        }
    }
}

impl IrigUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one buffer of 16-bit PCM samples with its capture timestamp
    /// (`irig_receive`).
    pub fn receive(&mut self, samples: &[i16], capture_timestamp: Timestamp) -> Vec<Timecode> {
        let buf_duration = Timestamp::from_f64(samples.len() as f64 / SECOND as f64);
        self.timestamp = capture_timestamp.wrapping_sub(buf_duration);

        let mut out = Vec::new();
        for &raw in samples {
            let sample = raw as f32;
            if let Some(tc) = self.process_sample(sample) {
                out.push(tc);
            }
            self.timestamp = self.timestamp.wrapping_add(self.tick);

            self.seccnt = (self.seccnt + 1) % SECOND;
            if self.seccnt == 0 {
                let (decim, fdelay) = self.rf.vote_format();
                self.decim = decim;
                self.fdelay = fdelay;
            }
        }
        out
    }

    fn process_sample(&mut self, sample: f32) -> Option<Timecode> {
        let (irig_b, irig_e) = self.rf.process(sample);

        self.badcnt = (self.badcnt + 1) % self.decim.max(1);
        if self.badcnt != 0 {
            return None;
        }
        let baseband = if self.fdelay == super::dsp::IRIG_E_DELAY { irig_e } else { irig_b };
        self.baseband_step(baseband)
    }

    fn baseband_step(&mut self, baseband: f32) -> Option<Timecode> {
        let sample = self.baud.step(baseband, self.decim, self.fdelay, &mut self.errflg)?;

        self.pulse = (self.pulse + 1) % 10;
        self.cycles <<= 1;
        if sample.lope >= (self.baud.maxsignal + self.baud.noise) / 2.0 {
            self.cycles |= 1;
        }
        if self.cycles & 0x303c0f03 == 0x300c0300 {
            if self.pulse != 0 {
                self.errflg |= error_bits::SYNCH;
            }
            self.pulse = 0;
        }

        self.dcycles <<= 1;
        if sample.env >= self.slice {
            self.dcycles |= 1;
        }

        let mut completed_baud = None;
        match self.pulse {
            0 => {
                self.baud.update_time_constant(sample.carphase as i32);
                self.chrstamp = self.timestamp;
                let (bit, bad) = classify_pulse((self.dcycles & 0xff) as u8);
                if bad {
                    self.errflg |= error_bits::DECODE;
                }
                completed_baud = self.decoder.decode(bit, self.chrstamp, self.decim, &mut self.errflg);

                if sample.env < self.envmin {
                    self.envmin = sample.env;
                }
                self.slice = (self.envmax + self.envmin) / 2.0;
                self.envmin = 1e6;
                self.envmax = -1e6;
            }
            1 => self.envmax = sample.env,
            2 => {
                if sample.env > self.envmax {
                    self.envmax = sample.env;
                }
            }
            9 => self.envmin = sample.env,
            _ => {}
        }

        if let Some(tc) = completed_baud {
            let emit = self.errflg == 0 && self.baud.tc == MAXTC;
            self.errflg = 0;
            if emit {
                self.offset_filter.push(tc.ref_timestamp.wrapping_sub(self.timestamp).to_f64());
                return Some(tc);
            }
        }
        None
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
        let mut unit = IrigUnit::new();
        let samples = vec![0i16; SECOND * 2];
        let ts = Timestamp::new(0, 0);
        let codes = unit.receive(&samples, ts);
        assert!(codes.is_empty());
    }

    #[test]
    fn tc_ratchets_up_from_mintc_on_stable_silence() {
        let mut unit = IrigUnit::new();
        let samples = vec![0i16; SECOND * 3];
        let ts = Timestamp::new(0, 0);
        unit.receive(&samples, ts);
        assert!(unit.baud.tc >= MINTC);
    }
}
