use std::ops::Range;

use memchr::memchr;

/// Splits `input` into `workers` contiguous ranges of roughly equal size.
/// Every range starts at the beginning of a record and ends one past a newline
/// (or at the end of input), so no record is split between two ranges.
/// Ranges may be empty when there are more workers than records.
pub fn partition(input: &[u8], workers: usize) -> Vec<Range<usize>> {
    assert!(workers > 0);
    let chunk_size = input.len() / workers;
    align_ranges(input, (1..workers).map(|i| chunk_size * i))
}

/// Turns ascending split points into record aligned ranges covering all of `input`.
/// One range is produced per split point, plus one.
pub fn align_ranges(input: &[u8], split_points: impl IntoIterator<Item = usize>) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for point in split_points {
        let end = next_record_start(input, point).max(start);
        ranges.push(start..end);
        start = end;
    }
    ranges.push(start..input.len());
    ranges
}

/// Offset one past the first newline at or after `point`, or the end of input if there is none.
fn next_record_start(input: &[u8], point: usize) -> usize {
    if point >= input.len() {
        return input.len();
    }
    match memchr(b'\n', &input[point..]) {
        Some(num_bytes_to_next_newline) => point + num_bytes_to_next_newline + 1,
        None => input.len(),
    }
}
