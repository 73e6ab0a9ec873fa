//! BSD rotate-and-add checksums at 8- and 16-bit widths.
//!
//! These are the format's corruption detectors, not tamper resistance; the
//! Poly1305 MAC covers that. Each header record's checksum covers the
//! record's bytes minus the trailing checksum byte itself.

/// Continue an 8-bit BSD checksum from a running value.
///
/// Used when a record is validated in pieces; seeding with 0 is the common
/// whole-record case.
pub fn checksum8_from(start: u8, data: &[u8]) -> u8 {
    let mut cs = start;
    for &b in data {
        cs = (cs >> 1) | (cs << 7);
        cs = cs.wrapping_add(b);
    }
    cs
}

/// 8-bit BSD checksum seeded from zero.
pub fn checksum8(data: &[u8]) -> u8 {
    checksum8_from(0, data)
}

/// 16-bit BSD checksum. Covers block ciphertexts and the whole plaintext.
pub fn checksum16(data: &[u8]) -> u16 {
    let mut cs: u16 = 0;
    for &b in data {
        cs = (cs >> 1) | (cs << 15);
        cs = cs.wrapping_add(u16::from(b));
    }
    cs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum8_empty_is_zero() {
        assert_eq!(checksum8(&[]), 0);
    }

    #[test]
    fn checksum8_single_byte_is_the_byte() {
        assert_eq!(checksum8(&[0x41]), 0x41);
    }

    #[test]
    fn checksum8_rotates_before_adding() {
        // After the first byte cs = 1; the rotate moves the low bit to the
        // high bit before the second byte is added.
        assert_eq!(checksum8(&[1, 0]), 0x80);
        assert_eq!(checksum8(&[1, 1]), 0x81);
    }

    #[test]
    fn checksum16_rotates_before_adding() {
        assert_eq!(checksum16(&[1, 0]), 0x8000);
        assert_eq!(checksum16(&[0x41, 0x42, 0x43]), {
            let mut cs: u16 = 0;
            for b in [0x41u16, 0x42, 0x43] {
                cs = (cs >> 1) | (cs << 15);
                cs = cs.wrapping_add(b);
            }
            cs
        });
    }

    #[test]
    fn checksum8_from_resumes() {
        let whole = checksum8(b"abcdef");
        let part = checksum8(b"abc");
        assert_eq!(checksum8_from(part, b"def"), whole);
    }

    #[test]
    fn flips_on_single_bit_error() {
        let data = b"the quick brown fox";
        let mut corrupt = data.to_vec();
        corrupt[7] ^= 0x10;
        assert_ne!(checksum16(data), checksum16(&corrupt));
        assert_ne!(checksum8(data), checksum8(&corrupt));
    }
}
