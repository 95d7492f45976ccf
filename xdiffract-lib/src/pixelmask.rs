//! Pixel validity bits. A pixel with any `IN_MASK` bit set carries no
//! physically meaningful value.

pub type MaskBits = u16;

pub const PERFECT: MaskBits = 0;
pub const INVALID: MaskBits = 1;
pub const SATURATED: MaskBits = 1 << 1;
pub const HOT: MaskBits = 1 << 2;
pub const DEAD: MaskBits = 1 << 3;
pub const SHADOWED: MaskBits = 1 << 4;
pub const IN_PEAKMASK: MaskBits = 1 << 5;
pub const TO_BE_IGNORED: MaskBits = 1 << 6;
pub const BAD: MaskBits = 1 << 7;
pub const OUT_OF_RESOLUTION_LIMITS: MaskBits = 1 << 8;
pub const MISSING: MaskBits = 1 << 9;
pub const NOISY: MaskBits = 1 << 10;
pub const ARTIFACT_CORRECTED: MaskBits = 1 << 11;
pub const FAILED_ARTIFACT_CORRECTION: MaskBits = 1 << 12;
pub const PEAK_FOR_HITFINDER: MaskBits = 1 << 13;
pub const PHOTON_BACKGROUND_CORRECTED: MaskBits = 1 << 14;

/// Union of all bits that exclude a pixel from analysis.
pub const IN_MASK: MaskBits = INVALID
    | SATURATED
    | HOT
    | DEAD
    | SHADOWED
    | IN_PEAKMASK
    | TO_BE_IGNORED
    | BAD
    | OUT_OF_RESOLUTION_LIMITS
    | MISSING;

#[inline]
pub fn is_valid(bits: MaskBits) -> bool {
    bits & IN_MASK == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_informational_bits_stay_valid() {
        assert!(is_valid(PERFECT));
        assert!(is_valid(NOISY | ARTIFACT_CORRECTED | PEAK_FOR_HITFINDER));
        assert!(!is_valid(SATURATED));
        assert!(!is_valid(MISSING | NOISY));
    }
}
