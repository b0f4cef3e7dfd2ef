//! IRIG-B/E RF filters, format-selection energy accumulators, the
//! synchronous baud integrator, and the type-II PLL phase/frequency
//! tracker. Grounded bit-for-bit on `irig_rf`/`irig_base`/`irig_baud` in
//! `irig.c`.

pub const SECOND: usize = 8000;
pub const BAUD: usize = 80;
pub const CYCLE: usize = 8;
pub const SUBFLD: usize = 10;
pub const FIELD: usize = 100;
pub const MINTC: i32 = 2;
pub const MAXTC: i32 = 10;
pub const MAXAMP: f32 = 3000.0;
pub const DRPOUT: f32 = 100.0;
pub const MODMIN: f32 = 0.5;
pub const MAXFREQ: f32 = 250e-6 * SECOND as f32;

pub const IRIG_B_DELAY: f32 = (1.03 + 2.68) / 1000.0;
pub const IRIG_E_DELAY: f32 = (3.47 + 2.68) / 1000.0;

/// IRIG-B 800-1200 Hz bandpass and IRIG-E 130 Hz lowpass, run every
/// sample; the squared outputs accumulate over one second to pick the
/// format (`irig_rf`).
#[derive(Debug, Clone, Default)]
pub struct RfFilters {
    bpf: [f32; 9],
    lpf: [f32; 5],
    pub irig_b_energy: f32,
    pub irig_e_energy: f32,
}

impl RfFilters {
    /// Runs both filters on one sample, returns (irig_b, irig_e) baseband
    /// outputs and accumulates their squared energy for format voting.
    pub fn process(&mut self, sample: f32) -> (f32, f32) {
        self.bpf[8] = self.bpf[7];
        self.bpf[7] = self.bpf[6];
        self.bpf[6] = self.bpf[5];
        self.bpf[5] = self.bpf[4];
        self.bpf[4] = self.bpf[3];
        self.bpf[3] = self.bpf[2];
        self.bpf[2] = self.bpf[1];
        self.bpf[1] = self.bpf[0];
        let mut irig_b = self.bpf[8] * 0.6505491
            + self.bpf[7] * -3.87518
            + self.bpf[6] * 11.5118
            + self.bpf[5] * -21.41264
            + self.bpf[4] * 27.12837
            + self.bpf[3] * -23.84486
            + self.bpf[2] * 14.27663
            + self.bpf[1] * -5.352734;
        self.bpf[0] = sample - irig_b;
        irig_b = self.bpf[0] * 4.952157e-03
            + self.bpf[1] * -2.055878e-02
            + self.bpf[2] * 4.401413e-02
            + self.bpf[3] * -6.558851e-02
            + self.bpf[4] * 7.462108e-02
            + self.bpf[5] * -6.558851e-02
            + self.bpf[6] * 4.401413e-02
            + self.bpf[7] * -2.055878e-02
            + self.bpf[8] * 4.952157e-03;
        self.irig_b_energy += irig_b * irig_b;

        self.lpf[4] = self.lpf[3];
        self.lpf[3] = self.lpf[2];
        self.lpf[2] = self.lpf[1];
        self.lpf[1] = self.lpf[0];
        let mut irig_e = self.lpf[4] * 0.8694604
            + self.lpf[3] * -3.589893
            + self.lpf[2] * 5.570154
            + self.lpf[1] * -3.849667;
        self.lpf[0] = sample - irig_e;
        irig_e = self.lpf[0] * 3.215696e-03
            + self.lpf[1] * -1.174951e-02
            + self.lpf[2] * 1.712074e-02
            + self.lpf[3] * -1.174951e-02
            + self.lpf[4] * 3.215696e-03;
        self.irig_e_energy += irig_e * irig_e;

        (irig_b, irig_e)
    }

    /// Pick decimation factor and baseband delay from the accumulated
    /// per-second energies, then reset them (`irig_receive`'s once-a-second
    /// format vote).
    pub fn vote_format(&mut self) -> (u32, f32) {
        let result = if self.irig_b_energy > self.irig_e_energy {
            (1, IRIG_B_DELAY)
        } else {
            (10, IRIG_E_DELAY)
        };
        self.irig_b_energy = 0.0;
        self.irig_e_energy = 0.0;
        result
    }
}

/// Synchronous baud integrator, phase detector, and type-II PLL
/// (`irig_base`'s envelope/PLL half).
#[derive(Debug, Clone)]
pub struct BaudIntegrator {
    integ: [f32; BAUD],
    lastenv: [f32; CYCLE],
    lastint: [f32; CYCLE],
    lastsig: f32,
    envphase: usize,
    zxing: f32,
    pub yxing: f32,
    pub exing: f32,
    pub phase: f32,
    pub freq: f32,
    pub tc: i32,
    tcount: i32,
    envxing: i32,
    intmin: f32,
    intmax: f32,
    pub maxsignal: f32,
    pub noise: f32,
    pub modndx: f32,
}

impl Default for BaudIntegrator {
    fn default() -> Self {
        BaudIntegrator {
            integ: [0.0; BAUD],
            lastenv: [0.0; CYCLE],
            lastint: [0.0; CYCLE],
            lastsig: 0.0,
            envphase: 0,
            zxing: 0.0,
            yxing: 0.0,
            exing: 0.0,
            phase: 0.0,
            freq: 0.0,
            tc: MINTC,
            tcount: 0,
            envxing: 0,
            intmin: 1e6,
            intmax: -1e6,
            maxsignal: 0.0,
            noise: 0.0,
            modndx: 0.0,
        }
    }
}

/// Outcome of one baseband sample at the end of a baud (8th sample of
/// the cycle), carrying the integrated and raw envelope differences
/// used by the bit demodulator.
pub struct BaudSample {
    pub carphase: usize,
    pub lope: f32,
    pub env: f32,
}

impl BaudIntegrator {
    /// Advance the integrator one baseband sample. Returns `Some` only
    /// on the 8th sample of each cycle (`carphase == 7`), when the bit
    /// demodulator should run (`irig_base`).
    pub fn step(&mut self, sample: f32, decim: u32, fdelay: f32, errflg: &mut u32) -> Option<BaudSample> {
        self.envphase = (self.envphase + 1) % BAUD;
        self.integ[self.envphase] += (sample - self.integ[self.envphase]) / (5.0 * self.tc as f32);
        let lope = self.integ[self.envphase];
        let carphase = self.envphase % CYCLE;
        self.lastenv[carphase] = sample;
        self.lastint[carphase] = lope;

        if self.lastsig > 0.0 && lope <= 0.0 {
            self.zxing += (carphase as f32 - 4.0) / CYCLE as f32;
        }
        self.lastsig = lope;

        if self.envphase == 0 {
            self.maxsignal = self.intmax;
            self.noise = self.intmin;
            self.intmin = 1e6;
            self.intmax = -1e6;
            if self.maxsignal < DRPOUT {
                *errflg |= super::frame::error_bits::AMP;
            }
            self.modndx = if self.maxsignal > 0.0 { (self.maxsignal - self.noise) / self.maxsignal } else { 0.0 };
            if self.modndx < MODMIN {
                *errflg |= super::frame::error_bits::MOD;
            }
            if *errflg
                & (super::frame::error_bits::AMP
                    | super::frame::error_bits::FREQ
                    | super::frame::error_bits::MOD
                    | super::frame::error_bits::SYNCH)
                != 0
            {
                self.tc = MINTC;
                self.tcount = 0;
            }

            let dtemp = self.zxing * decim as f32 / BAUD as f32;
            self.yxing = dtemp;
            self.zxing = 0.0;
            self.phase += dtemp / self.tc as f32;
            self.freq += dtemp / (4.0 * self.tc as f32 * self.tc as f32);
            if self.freq > MAXFREQ {
                self.freq = MAXFREQ;
                *errflg |= super::frame::error_bits::FREQ;
            } else if self.freq < -MAXFREQ {
                self.freq = -MAXFREQ;
                *errflg |= super::frame::error_bits::FREQ;
            }
        }

        if carphase != 7 {
            return None;
        }

        let lope_out = (self.lastint[2] - self.lastint[6]) / 2.0;
        if lope_out > self.intmax {
            self.intmax = lope_out;
        }
        if lope_out < self.intmin {
            self.intmin = lope_out;
        }
        let env = (self.lastenv[2] - self.lastenv[6]) / 2.0;
        let _ = fdelay;
        Some(BaudSample { carphase, lope: lope_out, env })
    }

    /// PLL time-constant ratchet and exing adjustment, called once per
    /// baud at the pulse boundary (`irig_baud`'s PLL half).
    pub fn update_time_constant(&mut self, envphase: i32) {
        self.exing = -self.yxing;
        if (self.envxing - envphase).abs() <= 1 {
            self.tcount += 1;
            if self.tcount > 20 * self.tc {
                self.tc += 1;
                if self.tc > MAXTC {
                    self.tc = MAXTC;
                }
                self.tcount = 0;
                self.envxing = envphase;
            } else {
                self.exing -= (self.envxing - envphase) as f32;
            }
        } else {
            self.tcount = 0;
            self.envxing = envphase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rf_filters_stable_on_silence() {
        let mut f = RfFilters::default();
        for _ in 0..1000 {
            let (b, e) = f.process(0.0);
            assert!(b.is_finite() && e.is_finite());
        }
    }

    #[test]
    fn vote_format_picks_b_on_stronger_bandpass_energy() {
        let mut f = RfFilters::default();
        f.irig_b_energy = 10.0;
        f.irig_e_energy = 1.0;
        let (decim, delay) = f.vote_format();
        assert_eq!(decim, 1);
        assert_eq!(delay, IRIG_B_DELAY);
        assert_eq!(f.irig_b_energy, 0.0);
    }

    #[test]
    fn vote_format_picks_e_on_stronger_lowpass_energy() {
        let mut f = RfFilters::default();
        f.irig_b_energy = 1.0;
        f.irig_e_energy = 10.0;
        let (decim, delay) = f.vote_format();
        assert_eq!(decim, 10);
        assert_eq!(delay, IRIG_E_DELAY);
    }

    #[test]
    fn baud_integrator_emits_sample_every_eight_steps() {
        let mut bi = BaudIntegrator::default();
        let mut errflg = 0u32;
        let mut hits = 0;
        for _ in 0..80 {
            if bi.step(0.0, 1, IRIG_B_DELAY, &mut errflg).is_some() {
                hits += 1;
            }
        }
        assert_eq!(hits, 10);
    }
}
