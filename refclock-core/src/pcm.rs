//! µ-law decompanding for 8 kHz codec input (spec §6: "Implementations may
//! also accept µ-law companded input, decoded via a 256-entry table mapping
//! to linear samples in ±MAXAMP"). Grounded on the standard ITU-T G.711
//! µ-law expansion used by the original driver's codec layer.

/// Clamp applied to expanded samples, matching the original's `MAXAMP`.
pub const MAXAMP: i16 = 8159;

const BIAS: i32 = 0x84;

/// Expand one µ-law octet to a signed 16-bit linear PCM sample.
pub fn ulaw_decode(byte: u8) -> i16 {
    let inverted = !byte;
    let sign = inverted & 0x80;
    let exponent = (inverted >> 4) & 0x07;
    let mantissa = inverted & 0x0f;

    let mut magnitude = ((mantissa as i32) << 3) + BIAS;
    magnitude <<= exponent as i32;
    magnitude -= BIAS;

    let sample = if sign != 0 { -magnitude } else { magnitude };
    sample.clamp(-(MAXAMP as i32), MAXAMP as i32) as i16
}

/// 256-entry µ-law → linear decompanding table, built once at first use.
pub fn table() -> [i16; 256] {
    let mut out = [0i16; 256];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = ulaw_decode(i as u8);
    }
    out
}

/// Decode a buffer of µ-law octets into linear samples.
pub fn decode_buffer(input: &[u8], table: &[i16; 256]) -> Vec<i16> {
    input.iter().map(|&b| table[b as usize]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_maps_near_zero() {
        // 0xFF is the conventional µ-law encoding of (positive) zero.
        let t = table();
        assert!(t[0xff].abs() <= 8);
    }

    #[test]
    fn full_scale_clamped_to_maxamp() {
        let t = table();
        for &v in t.iter() {
            assert!(v.unsigned_abs() <= MAXAMP as u16);
        }
    }

    #[test]
    fn sign_bit_flips_output_sign() {
        let t = table();
        // bit 7 of the raw octet (inverted per the µ-law convention) flips
        // the decoded sample's sign for a given magnitude code.
        let positive = t[0x20];
        let negative = t[0x20 ^ 0x80];
        assert!(positive >= 0);
        assert!(negative <= 0);
    }
}
