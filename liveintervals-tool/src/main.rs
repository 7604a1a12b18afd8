use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arbitrary::Unstructured;
use clap::Parser;
use liveintervals::debug_utils::{self, ArbitraryRangeConfig, DisplayLiveInterval, GenericFunction};
use liveintervals::function::VirtReg;
use liveintervals::reginfo::LaneMask;
use liveintervals::value::ValueArena;
use liveintervals::{ConnectedSubRegClasses, LiveInterval, SplitOptions};
use rand::RngCore;

#[derive(Parser)]
/// Tool for testing liveintervals.
enum Args {
    /// Parses the given intervals and re-dumps them with proper formatting.
    ///
    /// Note that this will strip all comments.
    Fmt {
        /// File containing the intervals.
        intervals: PathBuf,
    },

    /// Checks that the given intervals are well-formed.
    Verify {
        /// File containing the intervals.
        intervals: PathBuf,

        /// Lanes of the register, as a hexadecimal mask. Sub-ranges must not
        /// use any other lane.
        #[clap(long, value_parser = parse_lane_mask)]
        lanes: Option<LaneMask>,
    },

    /// Generate random intervals.
    Gen {
        /// Number of intervals to generate.
        #[clap(long, default_value_t = 1)]
        count: usize,

        /// Maximum number of segments in each range.
        #[clap(long, default_value_t = 12)]
        segments: usize,

        /// Maximum number of lanes of each register.
        #[clap(long, default_value_t = 4)]
        lanes: u32,
    },

    /// Splits intervals whose sub-ranges form disconnected components.
    ///
    /// The intervals are laid out in a single block. Every value defined at
    /// an instruction gets a def operand for the lanes of its sub-range and
    /// every segment ending at an instruction gets a use operand.
    Split {
        /// Print the function operands after splitting.
        #[clap(short = 'v')]
        verbose: bool,

        /// File containing the intervals.
        intervals: PathBuf,

        /// Splitting options.
        #[clap(flatten)]
        options: SplitOptions,
    },
}

fn parse_lane_mask(s: &str) -> Result<LaneMask> {
    let s = s.trim_start_matches("0x");
    let mask = u32::from_str_radix(s, 16).context("invalid lane mask")?;
    Ok(LaneMask(mask))
}

fn load_intervals(path: &Path, arena: &mut ValueArena) -> Result<Vec<LiveInterval>> {
    let input = fs::read(path).context("could not read intervals input file")?;
    let input = String::from_utf8(input).context("intervals input is not UTF-8")?;
    let intervals = debug_utils::parse_live_intervals(&input, arena)
        .context("could not parse intervals input file")?;
    Ok(intervals)
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    match args {
        Args::Fmt { ref intervals } => {
            let mut arena = ValueArena::new();
            let intervals = load_intervals(intervals, &mut arena)?;
            for li in &intervals {
                println!("{}", DisplayLiveInterval(li, &arena));
            }
        }
        Args::Verify {
            ref intervals,
            lanes,
        } => {
            let mut arena = ValueArena::new();
            let intervals = load_intervals(intervals, &mut arena)?;
            for li in &intervals {
                debug_utils::verify_live_interval(li, &arena, lanes)
                    .with_context(|| format!("{} failed verification", li.reg()))?;
            }
            println!("{} intervals OK", intervals.len());
        }
        Args::Gen {
            count,
            segments,
            lanes,
        } => {
            let config = ArbitraryRangeConfig {
                segments: 0..=segments,
                lanes: 1..=lanes.clamp(1, 32),
                ..Default::default()
            };
            let mut bytes = vec![0; 4096 * count.max(1)];
            rand::rng().fill_bytes(&mut bytes);
            let mut u = Unstructured::new(&bytes);
            let mut arena = ValueArena::new();
            for i in 0..count {
                let (li, _) =
                    debug_utils::arbitrary_live_interval(&mut u, &mut arena, VirtReg::new(i), &config)
                        .context("failed to generate arbitrary interval")?;
                println!("{}", DisplayLiveInterval(&li, &arena));
            }
        }
        Args::Split {
            verbose,
            ref intervals,
            ref options,
        } => {
            let mut arena = ValueArena::new();
            let mut intervals = load_intervals(intervals, &mut arena)?;
            for li in &intervals {
                debug_utils::verify_live_interval(li, &arena, None)
                    .with_context(|| format!("{} failed verification", li.reg()))?;
            }
            let (mut func, reginfo) = GenericFunction::from_intervals(&intervals, &arena);

            let mut splitter = ConnectedSubRegClasses::new(options.clone());
            let mut new_intervals = vec![];
            for li in &mut intervals {
                let split = splitter.rename_components(li, &mut func, &reginfo, &mut arena);
                if !split.is_empty() {
                    let regs: Vec<String> = split.iter().map(|new| new.reg().to_string()).collect();
                    println!("Split {} into {}", li.reg(), regs.join(" "));
                }
                new_intervals.extend(split);
            }

            println!("================ Intervals ================");
            for li in intervals.iter().chain(&new_intervals) {
                println!("{}", DisplayLiveInterval(li, &arena));
            }
            if verbose {
                println!("================ Function ================\n{func:#?}");
            }
            println!("{}", splitter.stats());
        }
    }
    Ok(())
}
