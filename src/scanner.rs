use std::ops::Range;

use crate::{
    dictionary::Dictionary,
    error::Error,
    lane::{eq_mask, LANES},
    stats::StatRecord,
};

/// Delimiter bitmask for the [LANES] bytes starting at `base`.
#[derive(Clone, Copy)]
struct Window {
    base: usize,
    mask: u32,
}

impl Window {
    const EMPTY: Self = Self { base: 0, mask: 0 };

    #[inline]
    fn load(input: &[u8], base: usize) -> Self {
        Self {
            base,
            mask: eq_mask(input.get(base..).unwrap_or_default(), b';'),
        }
    }

    /// First delimiter at or after `pos` that this window already knows about.
    #[inline]
    fn next_from(&self, pos: usize) -> Option<usize> {
        let consumed = pos.checked_sub(self.base)?;
        if consumed >= LANES {
            return None;
        }
        match self.mask >> consumed {
            0 => None,
            mask => Some(pos + mask.trailing_zeros() as usize),
        }
    }
}

/// Parses every record in `range` and folds it into `stats`, indexed by dictionary id.
/// `range` must start at a record and end one past a newline, or at the end of `input`.
/// Returns the number of records seen.
pub fn scan(
    input: &[u8],
    range: Range<usize>,
    dict: &Dictionary,
    stats: &mut [StatRecord],
) -> Result<u64, Error> {
    debug_assert_eq!(dict.len(), stats.len());
    let end = range.end;
    let mut pos = range.start;
    let mut window = Window::EMPTY;
    let mut records = 0;

    while pos < end {
        // reuse the delimiters found by the last load before touching memory again,
        // then widen to a second window for long names
        let semi = match window.next_from(pos) {
            Some(semi) => semi,
            None => {
                window = Window::load(input, pos);
                match window.next_from(pos) {
                    Some(semi) => semi,
                    None => {
                        window = Window::load(input, pos + LANES);
                        window
                            .next_from(pos + LANES)
                            .ok_or(Error::MalformedRecord { offset: pos })?
                    }
                }
            }
        };
        if semi >= end {
            return Err(Error::MalformedRecord { offset: pos });
        }

        let name = &input[pos..semi];
        let id = dict.id(name).ok_or_else(|| Error::UnknownName {
            offset: pos,
            name: String::from_utf8_lossy(name).into_owned(),
        })?;

        let (value, len) =
            parse_value(&input[semi + 1..end]).ok_or(Error::MalformedRecord { offset: pos })?;
        let terminator = semi + 1 + len;
        if terminator < end && input[terminator] != b'\n' {
            return Err(Error::MalformedRecord { offset: pos });
        }

        stats[id].update(value);
        records += 1;
        pos = terminator + 1;
    }

    Ok(records)
}

/// Parses a temperature in tenths from the start of `field`, returning it with the number
/// of bytes it occupies. The three accepted shapes are `D.D`, `DD.D` or `-D.D`, and `-DD.D`,
/// told apart by where the decimal point sits.
#[inline]
pub fn parse_value(field: &[u8]) -> Option<(i16, usize)> {
    let mut b = [0u8; 5];
    let n = field.len().min(b.len());
    b[..n].copy_from_slice(&field[..n]);
    let d = |i: usize| b[i].wrapping_sub(b'0') as i16;

    let (value, len) = if b[1] == b'.' {
        (d(0) * 10 + d(2), 3)
    } else if b[2] == b'.' {
        if b[0] == b'-' {
            (-(d(1) * 10 + d(3)), 4)
        } else {
            (d(0) * 100 + d(1) * 10 + d(3), 4)
        }
    } else {
        (-(d(1) * 100 + d(2) * 10 + d(4)), 5)
    };

    (len <= field.len()).then_some((value, len))
}
