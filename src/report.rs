use std::{fmt, io::Write};

use clap::ValueEnum;

use crate::{dictionary::Dictionary, stats::StatRecord};

/// What to print for a station that never appeared in the input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum EmptyPolicy {
    /// Leave the station out of the report.
    #[default]
    Skip,
    /// Print `0.0/0.0/0.0`.
    Zero,
}

/// Exact decimal rendering of a value held in tenths.
struct Tenths(i64);

impl fmt::Display for Tenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

/// Writes `{name=min/mean/max, ...}` in dictionary order.
pub fn write_report(
    out: &mut impl Write,
    dict: &Dictionary,
    stats: &[StatRecord],
    empty: EmptyPolicy,
) -> std::io::Result<()> {
    write!(out, "{{")?;
    let mut first = true;
    for (id, record) in stats.iter().enumerate() {
        let separator = if first { "" } else { ", " };
        let name = dict.name(id);
        match record.mean() {
            Some(mean) => write!(
                out,
                "{}{}={}/{:.1}/{}",
                separator,
                name,
                Tenths(record.min as i64),
                mean,
                Tenths(record.max as i64)
            )?,
            None if empty == EmptyPolicy::Zero => {
                write!(out, "{}{}=0.0/0.0/0.0", separator, name)?
            }
            None => continue,
        }
        first = false;
    }
    write!(out, "}}")
}
