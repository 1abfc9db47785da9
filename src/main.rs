use std::{
    fs::File,
    io::{BufWriter, Write},
    num::NonZeroUsize,
    ops::Range,
    path::{Path, PathBuf},
    sync::Mutex,
    thread,
    time::Instant,
};

use anyhow::Context;
use clap::Parser;
use memmap2::{Mmap, MmapOptions};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod affinity;
mod cities;
mod dictionary;
mod error;
mod lane;
mod partition;
mod report;
mod scanner;
mod stats;

use dictionary::Dictionary;
use error::Error;
use report::EmptyPolicy;
use stats::StatRecord;

/// A Rust implementation of the One Billion Row Challenge over a known set of stations:
/// station names resolve through a perfect hash instead of a general purpose map.
#[derive(Debug, Parser)]
#[command(name = "perfect-1brc", about = "Min, mean and max temperature per station.")]
struct Cli {
    /// File of `<station>;<temperature>` lines.
    #[arg(default_value = "measurements.txt")]
    input: PathBuf,

    /// Number of worker threads. Defaults to the available parallelism.
    #[arg(short, long)]
    workers: Option<NonZeroUsize>,

    /// Don't pin worker threads to logical processors.
    #[arg(long)]
    no_pin: bool,

    /// How to report stations that never appear in the input.
    #[arg(long, value_enum, default_value_t = EmptyPolicy::Skip)]
    empty: EmptyPolicy,

    /// Log progress to stderr; repeat for per-worker detail. `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let started = Instant::now();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let dict = Dictionary::new(cities::CITIES)?;
    let mmap = map_input(&cli.input)?;
    let input: &[u8] = mmap.as_deref().unwrap_or_default();

    let num_workers = cli
        .workers
        .map_or_else(default_workers, NonZeroUsize::get)
        .min(input.len())
        .max(1);
    info!(
        bytes = input.len(),
        workers = num_workers,
        "processing {}",
        cli.input.display()
    );

    let merged = process(num_workers, input, &dict, !cli.no_pin)?;

    let mut buffered_stdout = BufWriter::with_capacity(2 * 1024 * 1024, std::io::stdout());
    report::write_report(&mut buffered_stdout, &dict, &merged, cli.empty)
        .context("writing report")?;
    writeln!(buffered_stdout).context("writing report")?;
    buffered_stdout.flush().context("writing report")?;

    info!("time used: {:?}", started.elapsed());
    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_workers() -> usize {
    match thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            warn!("couldn't query the available parallelism ({e}), going single-threaded");
            1
        }
    }
}

/// Maps `path` read-only. An empty file is not mapped.
fn map_input(path: &Path) -> anyhow::Result<Option<Mmap>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .len();
    if len == 0 {
        return Ok(None);
    }

    // SAFETY: the mapping is only read, and the file must not change while we run.
    let mmap = unsafe { MmapOptions::new().map(&file) }
        .with_context(|| format!("mapping {}", path.display()))?;
    #[cfg(unix)]
    if let Err(e) = mmap.advise(memmap2::Advice::Sequential) {
        warn!("madvise(sequential) failed: {e}");
    }
    Ok(Some(mmap))
}

/// Collects min, mean and max for each station from lines in `input`, using `num_workers`
/// threads. The result is indexed by dictionary id.
/// Returns the first error any worker ran into; nothing is merged in that case.
fn process(
    num_workers: usize,
    input: &[u8],
    dict: &Dictionary,
    pin: bool,
) -> Result<Vec<StatRecord>, Error> {
    process_ranges(input, partition::partition(input, num_workers), dict, pin)
}

/// Scans each range on its own thread, then merges the per-thread tables.
fn process_ranges(
    input: &[u8],
    ranges: Vec<Range<usize>>,
    dict: &Dictionary,
    pin: bool,
) -> Result<Vec<StatRecord>, Error> {
    let mut tables = ranges
        .iter()
        .map(|_| stats::table(dict.len()))
        .collect::<Vec<_>>();
    let processing_error = Mutex::new(None);
    let pin = pin && affinity::SUPPORTED;

    thread::scope(|s| {
        for (worker, (table, range)) in tables.iter_mut().zip(ranges).enumerate() {
            let pe = &processing_error;
            s.spawn(move || {
                if pin && !affinity::pin_current_thread(worker) {
                    debug!(worker, "could not pin worker thread");
                }
                let started = Instant::now();
                let bytes = range.len();
                match scanner::scan(input, range, dict, table) {
                    Ok(records) => debug!(
                        worker,
                        records,
                        bytes,
                        elapsed = ?started.elapsed(),
                        "worker finished"
                    ),
                    Err(e) => {
                        pe.lock().unwrap().get_or_insert(e);
                    }
                }
            });
        }
    }); // scope ends, all threads were joined

    if let Some(e) = processing_error.into_inner().unwrap() {
        return Err(e);
    }

    Ok(stats::reduce(tables).unwrap_or_else(|| stats::table(dict.len())))
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use crate::{
        cities::CITIES,
        dictionary::Dictionary,
        error::Error,
        partition::align_ranges,
        process, process_ranges,
        report::{write_report, EmptyPolicy},
        stats::StatRecord,
    };

    const INPUT: &str = "Abha;5.2\nAbha;-1.0\nAbidjan;30.0\n";

    fn render(stats: &[StatRecord], dict: &Dictionary, empty: EmptyPolicy) -> String {
        let mut out = Vec::<u8>::with_capacity(1024);
        write_report(&mut out, dict, stats, empty).unwrap();
        match String::from_utf8(out) {
            Ok(s) => s,
            Err(e) => panic!("produced non-UTF8 output, `{e}`"),
        }
    }

    #[test]
    fn process_singlethreaded() {
        let dict = Dictionary::new(CITIES).unwrap();
        for (input, exp_out) in [
            ("Abha;-1.1\n", "{Abha=-1.1/-1.1/-1.1}"),
            (INPUT, "{Abha=-1.0/2.1/5.2, Abidjan=30.0/30.0/30.0}"),
            (
                "Zürich;12.3\nAbéché;-0.5\nJos;99.9\nAbha;0.0\nJos;-99.9",
                "{Abha=0.0/0.0/0.0, Abéché=-0.5/-0.5/-0.5, Jos=-99.9/0.0/99.9, Zürich=12.3/12.3/12.3}",
            ),
            ("", "{}"),
        ] {
            let merged = match process(1, input.as_bytes(), &dict, false) {
                Ok(m) => m,
                Err(e) => panic!("shouldn't encounter error `{e}`, was given valid input: `{input}`"),
            };
            let string = render(&merged, &dict, EmptyPolicy::Skip);
            assert_eq!(string, exp_out, "bad output for input: `{input}`");
        }
    }

    #[test]
    fn split_inside_a_line_matches_single_worker() {
        let dict = Dictionary::new(CITIES).unwrap();
        let single = process(1, INPUT.as_bytes(), &dict, false).unwrap();
        // every offset inside the second line, and everywhere else too
        for split in 0..=INPUT.len() {
            let ranges = align_ranges(INPUT.as_bytes(), [split]);
            let merged = process_ranges(INPUT.as_bytes(), ranges, &dict, false).unwrap();
            assert_eq!(single, merged, "split at {split}");
        }
    }

    #[test]
    fn more_workers_than_records() {
        let dict = Dictionary::new(CITIES).unwrap();
        let single = process(1, INPUT.as_bytes(), &dict, false).unwrap();
        for workers in [2, 3, 7, 32, 100] {
            let merged = process(workers, INPUT.as_bytes(), &dict, true).unwrap();
            assert_eq!(single, merged, "workers: {workers}");
        }
    }

    #[test]
    fn unknown_name_fails_the_run() {
        let dict = Dictionary::new(CITIES).unwrap();
        let input = format!("{INPUT}Nowhereville;1.0\nAbha;3.0\n");
        for workers in [1, 2, 4] {
            assert_eq!(
                Err(Error::UnknownName {
                    offset: INPUT.len(),
                    name: "Nowhereville".to_owned()
                }),
                process(workers, input.as_bytes(), &dict, false),
                "workers: {workers}"
            );
        }
    }

    #[test]
    fn zero_policy_lists_every_station() {
        let dict = Dictionary::new(CITIES).unwrap();
        let merged = process(2, INPUT.as_bytes(), &dict, false).unwrap();
        let out = render(&merged, &dict, EmptyPolicy::Zero);
        assert!(out.starts_with("{Abha=-1.0/2.1/5.2, Abidjan=30.0/30.0/30.0, Abéché=0.0/0.0/0.0"));
        assert!(out.ends_with("İzmir=0.0/0.0/0.0}"));
        assert_eq!(CITIES.len() - 1, out.matches(", ").count());
    }

    #[test]
    fn worker_count_does_not_change_results() {
        let dict = Dictionary::new(CITIES).unwrap();

        // deterministic pseudo-random rows over every value shape
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        let mut input = String::new();
        let mut expected = BTreeMap::<usize, (u64, i64, i16, i16)>::new();
        for _ in 0..20_000 {
            let id = (next() % CITIES.len() as u64) as usize;
            let value = (next() % 1999) as i16 - 999;
            let sign = if value < 0 { "-" } else { "" };
            input.push_str(&format!(
                "{};{}{}.{}\n",
                CITIES[id],
                sign,
                value.abs() / 10,
                value.abs() % 10
            ));
            let e = expected.entry(id).or_insert((0, 0, i16::MAX, i16::MIN));
            e.0 += 1;
            e.1 += value as i64;
            e.2 = e.2.min(value);
            e.3 = e.3.max(value);
        }

        for workers in [1, 2, 3, 8, 13] {
            let merged = process(workers, input.as_bytes(), &dict, false).unwrap();
            for (id, record) in merged.iter().enumerate() {
                let exp = expected.get(&id).copied().unwrap_or((0, 0, i16::MAX, i16::MIN));
                assert_eq!(
                    exp,
                    (record.count, record.sum, record.min, record.max),
                    "workers: {workers}, station: {}",
                    CITIES[id]
                );
            }
        }
    }
}
