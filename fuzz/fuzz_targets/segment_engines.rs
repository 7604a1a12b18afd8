//! Checks that the vector form, the segment set form and the updater build
//! the same range from the same segments, in any order.

#![no_main]

use arbitrary::{Arbitrary, Result, Unstructured};
use libfuzzer_sys::fuzz_target;
use liveintervals::debug_utils::{self, ArbitraryRangeConfig, DisplayLiveRange};
use liveintervals::live_range::{LiveRange, Segment};
use liveintervals::slot::SlotIndex;
use liveintervals::updater::LiveRangeUpdater;
use liveintervals::value::ValueArena;

struct Pieces {
    arena: ValueArena,
    reference: LiveRange,
    pieces: Vec<Segment>,
}

impl Arbitrary<'_> for Pieces {
    fn arbitrary(u: &mut Unstructured) -> Result<Self> {
        let mut arena = ValueArena::new();
        let reference =
            debug_utils::arbitrary_live_range(u, &mut arena, &ArbitraryRangeConfig::default())?;

        // Cut every segment into overlapping pieces.
        let mut pieces = vec![];
        for seg in reference.segments() {
            let (start, end) = (seg.start.bits(), seg.end.bits());
            let mut pos = start;
            while pos < end {
                let piece_end = u.int_in_range(pos + 1..=end)?;
                let piece_start = u.int_in_range(start..=pos)?;
                pieces.push(Segment::new(
                    SlotIndex::from_bits(piece_start),
                    SlotIndex::from_bits(piece_end),
                    seg.valno,
                ));
                pos = piece_end;
            }
        }

        // Mostly ordered, with some pieces moved around.
        for i in 0..pieces.len() {
            if u.ratio(1, 4)? {
                let j = u.choose_index(pieces.len())?;
                pieces.swap(i, j);
            }
        }
        Ok(Pieces {
            arena,
            reference,
            pieces,
        })
    }
}

impl std::fmt::Debug for Pieces {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", DisplayLiveRange(&self.reference, &self.arena))?;
        writeln!(f, "{:?}", self.pieces)
    }
}

/// An empty range owning the values of `reference`.
fn same_values(reference: &LiveRange, arena: &mut ValueArena) -> LiveRange {
    let mut lr = reference.clone();
    for seg in reference.segments() {
        lr.remove_segment(seg.start, seg.end, false, arena);
    }
    lr
}

fuzz_target!(|t: Pieces| {
    // Ensure the logger is initialized.
    let _ = pretty_env_logger::try_init();

    let mut arena = t.arena.clone();
    let mut vec_form = same_values(&t.reference, &mut arena);
    let mut set_form = same_values(&t.reference, &mut arena);
    let mut updated = same_values(&t.reference, &mut arena);
    set_form.use_segment_set();
    {
        let mut updater = LiveRangeUpdater::new(&mut updated);
        for &seg in &t.pieces {
            vec_form.add_segment(seg);
            set_form.add_segment(seg);
            updater.add(seg);
        }
    }
    set_form.flush_segment_set();

    for lr in [&vec_form, &set_form, &updated] {
        debug_utils::verify_live_range(lr, &arena).unwrap();
        assert_eq!(
            lr.segments(),
            t.reference.segments(),
            "{}",
            DisplayLiveRange(lr, &arena)
        );
    }
});
