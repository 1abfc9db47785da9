//! Fixed-width byte comparison used to find delimiters without walking bytes one at a time.

/// Number of bytes compared at once.
pub const LANES: usize = 32;

/// Longest name the scanner supports: the name and its delimiter must fit in two windows.
pub const MAX_NAME_LEN: usize = 2 * LANES - 1;

/// Bitmask with bit `i` set where `bytes[i] == needle`, for the first [LANES] bytes.
/// Windows that run past the end of `bytes` are padded with zeroes, which never match
/// a non-zero needle.
#[inline]
pub fn eq_mask(bytes: &[u8], needle: u8) -> u32 {
    match bytes.first_chunk::<LANES>() {
        Some(window) => eq_mask_full(window, needle),
        None => {
            let mut window = [0u8; LANES];
            window[..bytes.len()].copy_from_slice(bytes);
            eq_mask_full(&window, needle)
        }
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
#[inline]
fn eq_mask_full(window: &[u8; LANES], needle: u8) -> u32 {
    use std::arch::x86_64::{
        __m128i, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8,
    };

    // SAFETY: sse2 is enabled for this target, and both loads read 16 bytes from
    // within the 32 byte `window`.
    unsafe {
        let splat = _mm_set1_epi8(needle as i8);
        let lo = _mm_loadu_si128(window.as_ptr() as *const __m128i);
        let hi = _mm_loadu_si128(window.as_ptr().add(16) as *const __m128i);
        let lo = _mm_movemask_epi8(_mm_cmpeq_epi8(lo, splat)) as u32;
        let hi = _mm_movemask_epi8(_mm_cmpeq_epi8(hi, splat)) as u32;
        lo | (hi << 16)
    }
}

#[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
#[inline]
fn eq_mask_full(window: &[u8; LANES], needle: u8) -> u32 {
    window
        .iter()
        .enumerate()
        .fold(0, |mask, (i, b)| mask | (((*b == needle) as u32) << i))
}

#[cfg(test)]
mod test {
    use super::{eq_mask, LANES};

    #[test]
    fn masks_match_positions() {
        for (input, expected) in [
            (&b"Abha;5.2\n"[..], 1 << 4),
            (b";;", 0b11),
            (b"", 0),
            (b"no delimiter here", 0),
            (b"0123456789abcdef0123456789abcde;", 1 << 31),
            (b"0123456789abcdef0123456789abcdef;", 0),
            (b"a;0123456789abcde;0123456789abcdef;", (1 << 1) | (1 << 17)),
        ] {
            assert_eq!(
                expected,
                eq_mask(input, b';'),
                "input: `{}`",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn mask_agrees_with_scalar_search() {
        let input: Vec<u8> = (0..3 * LANES as u8).map(|i| i % 7 + b'0').collect();
        for start in 0..input.len() {
            let mask = eq_mask(&input[start..], b'3');
            for i in 0..LANES {
                let expected = input.get(start + i) == Some(&b'3');
                assert_eq!(expected, mask & (1 << i) != 0, "start {start}, lane {i}");
            }
        }
    }
}
