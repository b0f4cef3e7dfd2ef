//! Maximum-likelihood BCD digit decoding and the per-second state
//! machine that drives the nine-digit decoding matrix from the
//! [`PROGX`] dispatch table. Grounded on `wwv_rsec`/`wwv_corr4` in
//! `wwv.c`.

use super::sync::wwv_snr;
use super::tables::{SecOp, BCD2, BCD3, BCD6, BCD9, PROGX};

pub const TCONST: f32 = 16.0;
pub const BCMP: i32 = 3;
pub const BTHR: f32 = 1000.0;
pub const BSNR: f32 = 1.5;
const MAXAMP: f32 = 6000.0;

pub mod status_bits {
    pub const MSYNC: u32 = 0x0001;
    pub const SSYNC: u32 = 0x0002;
    pub const DSYNC: u32 = 0x0004;
    pub const INSYNC: u32 = 0x0008;
    pub const FGATE: u32 = 0x0010;
    pub const DGATE: u32 = 0x0020;
    pub const BGATE: u32 = 0x0040;
    pub const LEPSEC: u32 = 0x1000;
    pub const SELV: u32 = 0x0100;
    pub const SELH: u32 = 0x0200;
}

pub mod alarm_bits {
    pub const CMPERR: u32 = 0x1;
    pub const LOWERR: u32 = 0x2;
}

/// One digit's worth of maximum-likelihood decoder state (`struct
/// decvec`).
#[derive(Debug, Clone, Copy)]
pub struct DecodeVector {
    pub radix: usize,
    pub digit: usize,
    pub count: i32,
    pub digprb: f32,
    pub digsnr: f32,
    pub like: [f32; 10],
}

impl DecodeVector {
    pub fn new(radix: usize) -> Self {
        DecodeVector { radix, digit: 0, count: 0, digprb: 0.0, digsnr: 0.0, like: [0.0; 10] }
    }
}

impl Default for DecodeVector {
    fn default() -> Self {
        DecodeVector::new(10)
    }
}

/// Correlate the received 4-bit coefficient vector against a BCD
/// correlation table and update the maximum-likelihood digit, its
/// compare counter, and likelihood SNR (`wwv_corr4`). Returns `true` if
/// the digit reached full compare agreement this call (setting DSYNC).
pub fn corr4(vp: &mut DecodeVector, data: [f32; 4], table: &[[f32; 4]]) -> (bool, bool) {
    let mut mldigit = 0usize;
    let mut topmax = -MAXAMP;
    let mut nxtmax = -MAXAMP;
    for (i, row) in table.iter().enumerate() {
        if row[0] == 0.0 && i != 0 {
            break;
        }
        let mut acc = 0.0f32;
        for j in 0..4 {
            acc += data[j] * row[j];
        }
        vp.like[i] += (acc - vp.like[i]) / TCONST;
        let acc = vp.like[i];
        if acc > topmax {
            nxtmax = topmax;
            topmax = acc;
            mldigit = i;
        } else if acc > nxtmax {
            nxtmax = acc;
        }
    }
    vp.digprb = topmax;
    vp.digsnr = wwv_snr(topmax, nxtmax);

    let mut cmperr = false;
    let mut dsync = false;
    if vp.digprb < BTHR || vp.digsnr < BSNR {
        return (false, false);
    }
    if vp.digit != mldigit {
        cmperr = true;
        if vp.count > 0 {
            vp.count -= 1;
        }
        if vp.count == 0 {
            vp.digit = mldigit;
        }
    } else {
        if vp.count < BCMP {
            vp.count += 1;
        }
        if vp.count == BCMP {
            dsync = true;
        }
    }
    (cmperr, dsync)
}

/// Outcome of processing one receiver second (`wwv_rsec`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SecondOutcome {
    pub cmperr: bool,
    pub dsync: bool,
    pub bgate: bool,
    pub minute_rollover: bool,
}

/// The nine-digit decoding matrix plus the BCD coefficient staging
/// vector and miscellaneous-bit integrator, indexed by the receiver
/// second 0-60 (`wwv_rsec`/`decvec[9]`).
#[derive(Debug, Clone)]
pub struct SecondsState {
    pub decvec: [DecodeVector; 9],
    bcddld: [f32; 4],
    bitvec: [f32; 61],
    pub misc: u32,
    pub digcnt: u32,
}

use super::tables::YR;

impl Default for SecondsState {
    fn default() -> Self {
        SecondsState {
            decvec: [
                DecodeVector::new(9), // MN units
                DecodeVector::new(6), // MN tens
                DecodeVector::new(9), // HR units
                DecodeVector::new(2), // HR tens
                DecodeVector::new(9), // DA units
                DecodeVector::new(9), // DA tens
                DecodeVector::new(3), // DA hundreds
                DecodeVector::new(9), // YR units
                DecodeVector::new(9), // YR tens
            ],
            bcddld: [0.0; 4],
            bitvec: [0.0; 61],
            misc: 0,
            digcnt: 0,
        }
    }
}

impl SecondsState {
    /// Process one second's bit likelihood (-1..1 bipolar, 0 for a miss)
    /// for receiver second `nsec`, given the current sync status bits.
    /// Returns the set of conditions raised and whether this was the
    /// minute (or leap-extended) rollover second.
    pub fn rsec(&mut self, nsec: usize, bit: f32, status: u32) -> (SecondOutcome, u32) {
        let mut out = SecondOutcome::default();
        let mut status = status;
        self.bitvec[nsec] += (bit - self.bitvec[nsec]) / TCONST;
        let row = PROGX[nsec];

        match row.op {
            SecOp::Idle => {}
            SecOp::Sync2 | SecOp::Sync3 => {
                // Minute/second sync amplitude bookkeeping lives in the
                // channel mitigation state, handled by the pipeline.
            }
            SecOp::Coef1 => {
                self.bcddld[row.arg as usize] = bit;
            }
            SecOp::Coef => {
                self.bcddld[row.arg as usize] = if status & status_bits::DSYNC != 0 { bit } else { 0.0 };
            }
            SecOp::Coef2 => {
                self.bcddld[row.arg as usize] = 0.0;
            }
            SecOp::Decim2 => {
                let (cmperr, dsync) = corr4(&mut self.decvec[row.arg as usize], self.bcddld, &BCD2);
                self.apply(cmperr, dsync, &mut out, &mut status);
            }
            SecOp::Decim3 => {
                let (cmperr, dsync) = corr4(&mut self.decvec[row.arg as usize], self.bcddld, &BCD3);
                self.apply(cmperr, dsync, &mut out, &mut status);
            }
            SecOp::Decim6 => {
                let (cmperr, dsync) = corr4(&mut self.decvec[row.arg as usize], self.bcddld, &BCD6);
                self.apply(cmperr, dsync, &mut out, &mut status);
            }
            SecOp::Decim9 => {
                let (cmperr, dsync) = corr4(&mut self.decvec[row.arg as usize], self.bcddld, &BCD9);
                self.apply(cmperr, dsync, &mut out, &mut status);
            }
            SecOp::Msc20 => {
                let (cmperr, dsync) = corr4(&mut self.decvec[(YR + 1) as usize], self.bcddld, &BCD9);
                self.apply(cmperr, dsync, &mut out, &mut status);
                self.misc_bit(nsec, row.arg, &mut out);
            }
            SecOp::MscBit => {
                self.misc_bit(nsec, row.arg, &mut out);
            }
            SecOp::Msc21 => {
                self.misc_bit(nsec, row.arg, &mut out);
                status &= !(status_bits::SELV | status_bits::SELH);
            }
            SecOp::Min1 => {
                if status & status_bits::LEPSEC == 0 {
                    out.minute_rollover = true;
                }
            }
            SecOp::Min2 => {
                status &= !status_bits::LEPSEC;
                out.minute_rollover = true;
            }
        }
        (out, status)
    }

    fn apply(&mut self, cmperr: bool, dsync: bool, out: &mut SecondOutcome, status: &mut u32) {
        out.cmperr |= cmperr;
        if dsync {
            out.dsync = true;
            *status |= status_bits::DSYNC;
            self.digcnt += 1;
        }
    }

    fn misc_bit(&mut self, nsec: usize, arg: u8, out: &mut SecondOutcome) {
        if self.bitvec[nsec] > BTHR {
            if self.misc & arg as u32 == 0 {
                out.cmperr = true;
            }
            self.misc |= arg as u32;
        } else if self.bitvec[nsec] < -BTHR {
            if self.misc & arg as u32 != 0 {
                out.cmperr = true;
            }
            self.misc &= !(arg as u32);
        } else {
            out.bgate = true;
        }
    }

    pub fn clear(&mut self) {
        for v in self.decvec.iter_mut() {
            v.count = 0;
        }
        self.digcnt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corr4_locks_on_repeated_digit() {
        let mut vp = DecodeVector::new(9);
        let data = BCD9[3];
        let mut dsync = false;
        for _ in 0..(BCMP + 1) {
            let (_, d) = corr4(&mut vp, data, &BCD9);
            dsync |= d;
        }
        assert!(dsync);
        assert_eq!(vp.digit, 3);
    }

    #[test]
    fn corr4_below_threshold_sets_no_decision() {
        let mut vp = DecodeVector::new(9);
        let (cmperr, dsync) = corr4(&mut vp, [0.0, 0.0, 0.0, 0.0], &BCD9);
        assert!(!cmperr);
        assert!(!dsync);
    }

    #[test]
    fn misc_bit_toggles_and_flags_compare_error_on_change() {
        let mut st = SecondsState::default();
        let mut out = SecondOutcome::default();
        st.bitvec[2] = 2000.0;
        st.misc_bit(2, 0x08, &mut out);
        assert!(!out.cmperr);
        assert_eq!(st.misc, 0x08);

        st.bitvec[2] = -2000.0;
        let mut out2 = SecondOutcome::default();
        st.misc_bit(2, 0x08, &mut out2);
        assert!(out2.cmperr);
        assert_eq!(st.misc, 0);
    }

    #[test]
    fn min1_flags_minute_rollover_without_lepsec() {
        let mut st = SecondsState::default();
        let (out, _status) = st.rsec(59, 0.0, 0);
        assert!(out.minute_rollover);
    }
}
