//! NTP SHM wire protocol: the fixed byte layout shared with a host NTP
//! daemon over a System-V shared-memory segment keyed `0x4e545030 + unit`
//! (spec §6, §5 "Shared resources"). Attaching to the actual segment is an
//! external collaborator (spec §1); this module only encodes/decodes the
//! wire struct and implements the barrier-write-barrier-valid protocol
//! against an in-memory byte buffer, so a real SHM transport can be
//! layered on top without touching the bit layout.

use crate::error::{RefclockError, Result};

/// Base System-V IPC key; the key for `unit` is `SHM_KEY_BASE + unit`.
pub const SHM_KEY_BASE: u32 = 0x4e54_5030;

/// Total wire size of the segment, per spec §6's offset table
/// (`dummy[10]` of `i32` starting at offset 56).
pub const SEGMENT_SIZE: usize = 56 + 10 * 4;

/// Valid unit range for the NTP SHM protocol (spec §6).
pub const MAX_UNITS: u32 = 64;

/// One NTP SHM segment snapshot, bit-exact with the table in spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShmSegment {
    pub mode: i32,
    pub count: i32,
    pub clock_sec: i64,
    pub clock_usec: i32,
    pub receive_sec: i64,
    pub receive_usec: i32,
    pub leap: i32,
    pub precision: i32,
    pub nsamples: i32,
    pub valid: i32,
}

impl ShmSegment {
    /// Serialize to the exact on-wire byte layout (little-endian, the only
    /// byte order this protocol is deployed on).
    pub fn to_bytes(&self) -> [u8; SEGMENT_SIZE] {
        let mut buf = [0u8; SEGMENT_SIZE];
        buf[0..4].copy_from_slice(&self.mode.to_le_bytes());
        buf[4..8].copy_from_slice(&self.count.to_le_bytes());
        buf[8..16].copy_from_slice(&self.clock_sec.to_le_bytes());
        buf[16..20].copy_from_slice(&self.clock_usec.to_le_bytes());
        buf[24..32].copy_from_slice(&self.receive_sec.to_le_bytes());
        buf[32..36].copy_from_slice(&self.receive_usec.to_le_bytes());
        buf[40..44].copy_from_slice(&self.leap.to_le_bytes());
        buf[44..48].copy_from_slice(&self.precision.to_le_bytes());
        buf[48..52].copy_from_slice(&self.nsamples.to_le_bytes());
        buf[52..56].copy_from_slice(&self.valid.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<ShmSegment> {
        if buf.len() < SEGMENT_SIZE {
            return Err(RefclockError::Shm(format!(
                "segment too short: {} < {SEGMENT_SIZE}",
                buf.len()
            )));
        }
        let i32_at = |off: usize| i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        let i64_at = |off: usize| i64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
        Ok(ShmSegment {
            mode: i32_at(0),
            count: i32_at(4),
            clock_sec: i64_at(8),
            clock_usec: i32_at(16),
            receive_sec: i64_at(24),
            receive_usec: i32_at(32),
            leap: i32_at(40),
            precision: i32_at(44),
            nsamples: i32_at(48),
            valid: i32_at(52),
        })
    }
}

/// Writer side of the barrier-write-barrier-valid protocol (spec §5): clear
/// `valid`, barrier, update the timestamp/leap/precision fields, barrier,
/// set `valid = 1`. `buf` must be at least [`SEGMENT_SIZE`] bytes.
pub fn publish(buf: &mut [u8], segment: &ShmSegment) -> Result<()> {
    if buf.len() < SEGMENT_SIZE {
        return Err(RefclockError::Shm(format!(
            "segment too short: {} < {SEGMENT_SIZE}",
            buf.len()
        )));
    }
    buf[52..56].copy_from_slice(&0i32.to_le_bytes());
    std::sync::atomic::fence(std::sync::atomic::Ordering::Release);

    let mut published = *segment;
    published.valid = 0;
    buf[..SEGMENT_SIZE].copy_from_slice(&published.to_bytes());
    std::sync::atomic::fence(std::sync::atomic::Ordering::Release);

    buf[52..56].copy_from_slice(&1i32.to_le_bytes());
    Ok(())
}

/// Reader side: checks `valid` before and after decoding so a torn write is
/// rejected (spec §5's "readers check `valid` before and after").
pub fn read_valid(buf: &[u8]) -> Result<Option<ShmSegment>> {
    let before = ShmSegment::from_bytes(buf)?;
    if before.valid == 0 {
        return Ok(None);
    }
    std::sync::atomic::fence(std::sync::atomic::Ordering::Acquire);
    let after = ShmSegment::from_bytes(buf)?;
    if after.valid == 0 || after != before {
        return Ok(None);
    }
    Ok(Some(after))
}

/// System-V IPC key for the given unit (spec §6).
pub fn shm_key(unit: u32) -> Result<u32> {
    if unit >= MAX_UNITS {
        return Err(RefclockError::Shm(format!("unit {unit} out of range [0, {MAX_UNITS})")));
    }
    Ok(SHM_KEY_BASE + unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_bytes() {
        let seg = ShmSegment {
            mode: 1,
            count: 7,
            clock_sec: 1_700_000_000,
            clock_usec: 123_456,
            receive_sec: 1_700_000_000,
            receive_usec: 123_000,
            leap: 0,
            precision: -20,
            nsamples: 1,
            valid: 1,
        };
        let bytes = seg.to_bytes();
        let back = ShmSegment::from_bytes(&bytes).unwrap();
        assert_eq!(seg, back);
    }

    #[test]
    fn publish_then_read_sees_valid_segment() {
        let mut buf = [0u8; SEGMENT_SIZE];
        let seg = ShmSegment { mode: 1, count: 1, leap: 0, precision: -20, valid: 1, ..Default::default() };
        publish(&mut buf, &seg).unwrap();
        let read = read_valid(&buf).unwrap();
        assert!(read.is_some());
        assert_eq!(read.unwrap().count, 1);
    }

    #[test]
    fn key_range_enforced() {
        assert!(shm_key(0).is_ok());
        assert!(shm_key(63).is_ok());
        assert!(shm_key(64).is_err());
    }
}
