//! Sample format conversion between 16-bit PCM and 32-bit transport words.
//!
//! Playback applies a quadratic volume law in 16.16 fixed point and saturates
//! to the i32 range. Capture shifts the wide word back down and clips
//! symmetrically to `[-32767, 32767]`.

use crate::constants::UNITY_GAIN;

const PCM_LIMIT: i32 = i16::MAX as i32;

/// Gain for `volume` percent: `(volume / 100)^2 * 65536`, truncated.
pub fn volume_factor(volume: u8) -> i32 {
    let v = i64::from(volume.min(100));
    (v * v * UNITY_GAIN / 10_000) as i32
}

/// Scales one PCM sample up to a transport word at the given volume.
pub fn scale(sample: i16, volume: u8) -> i32 {
    apply_factor(sample, volume_factor(volume))
}

#[inline]
fn apply_factor(sample: i16, factor: i32) -> i32 {
    let wide = i64::from(sample) * i64::from(factor);
    wide.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Scales `samples` into `out`, which must be at least as long.
pub fn scale_into(samples: &[i16], volume: u8, out: &mut [i32]) {
    let factor = volume_factor(volume);
    for (word, &sample) in out.iter_mut().zip(samples) {
        *word = apply_factor(sample, factor);
    }
}

/// Brings a captured transport word down to 16-bit PCM.
pub fn downscale(word: i32, shift: u32) -> i16 {
    (word >> shift).clamp(-PCM_LIMIT, PCM_LIMIT) as i16
}

/// Downscales `words` into `out`, which must be at least as long.
pub fn downscale_into(words: &[i32], shift: u32, out: &mut [i16]) {
    for (sample, &word) in out.iter_mut().zip(words) {
        *sample = downscale(word, shift);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_factor_endpoints() {
        assert_eq!(volume_factor(0), 0);
        assert_eq!(volume_factor(100), 65536);
        assert_eq!(volume_factor(50), 16384);
        // 0.49 * 65536 = 32112.64
        assert_eq!(volume_factor(70), 32112);
    }

    #[test]
    fn test_volume_above_100_is_clamped() {
        assert_eq!(volume_factor(200), volume_factor(100));
    }

    #[test]
    fn test_zero_volume_is_silent() {
        for sample in [i16::MIN, -1000, -1, 0, 1, 1000, i16::MAX] {
            assert_eq!(scale(sample, 0), 0);
        }
    }

    #[test]
    fn test_volume_is_monotonic() {
        for sample in [i16::MIN, -12345, -1, 1, 777, i16::MAX] {
            let mut last = 0i64;
            for volume in 0..=100u8 {
                let magnitude = i64::from(scale(sample, volume)).abs();
                assert!(
                    magnitude >= last,
                    "magnitude dropped at volume {} for sample {}",
                    volume,
                    sample
                );
                last = magnitude;
            }
        }
    }

    #[test]
    fn test_full_scale_stays_in_range() {
        // i16::MIN * 65536 == i32::MIN exactly, i16::MAX * 65536 fits below i32::MAX
        assert_eq!(scale(i16::MIN, 100), i32::MIN);
        assert_eq!(scale(i16::MAX, 100), i32::from(i16::MAX) << 16);
    }

    #[test]
    fn test_apply_factor_saturates() {
        assert_eq!(apply_factor(i16::MAX, i32::MAX), i32::MAX);
        assert_eq!(apply_factor(i16::MIN, i32::MAX), i32::MIN);
    }

    #[test]
    fn test_downscale_shift() {
        assert_eq!(downscale(1000 << 12, 12), 1000);
        assert_eq!(downscale(-1000 << 12, 12), -1000);
        // Arithmetic shift rounds toward negative infinity
        assert_eq!(downscale(-1, 12), -1);
    }

    #[test]
    fn test_downscale_clips_symmetrically() {
        assert_eq!(downscale(i32::MAX, 12), 32767);
        assert_eq!(downscale(i32::MIN, 12), -32767);
        assert_eq!(downscale(i32::MIN, 16), -32767);
    }

    #[test]
    fn test_slice_helpers() {
        let pcm = [1000i16, -1000, 500];
        let mut words = [0i32; 3];
        scale_into(&pcm, 100, &mut words);
        assert_eq!(words, [1000 << 16, -1000 << 16, 500 << 16]);

        let mut back = [0i16; 3];
        downscale_into(&words, 16, &mut back);
        assert_eq!(back, pcm);
    }
}
