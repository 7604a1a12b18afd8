//! Checks the overlap and coverage queries against a position by position
//! comparison of the two ranges.

#![no_main]

use libfuzzer_sys::fuzz_target;
use liveintervals::function::Inst;
use liveintervals_fuzz::{RangePair, coverage};

fuzz_target!(|t: RangePair| {
    // Ensure the logger is initialized.
    let _ = pretty_env_logger::try_init();

    let limit = t
        .a
        .segments()
        .iter()
        .chain(t.b.segments())
        .map(|seg| seg.end.bits() + 1)
        .max()
        .unwrap_or(0);
    let live_a = coverage(&t.a, limit);
    let live_b = coverage(&t.b, limit);

    let overlap = live_a
        .iter()
        .zip(&live_b)
        .any(|(a, b)| a.is_some() && b.is_some());
    assert_eq!(t.a.overlaps(&t.b), overlap);
    assert_eq!(t.b.overlaps(&t.a), overlap);

    if !t.a.is_empty() && !t.b.is_empty() {
        let begin = t.a.segments()[0].start;
        let hint = t
            .b
            .segments()
            .partition_point(|seg| seg.start <= begin)
            .saturating_sub(1);
        assert_eq!(t.a.overlaps_from(&t.b, hint), overlap);
    }

    // Without any copies, nothing is excused.
    assert_eq!(t.a.overlaps_coalescable(&t.b, &|_: Inst| false), overlap);

    // If every instruction is a copy, only overlaps starting at a block
    // boundary remain.
    let block_overlap = t.a.segments().iter().any(|a| {
        t.b.segments().iter().any(|b| {
            a.start < b.end && b.start < a.end && a.start.max(b.start).is_block()
        })
    });
    assert_eq!(t.a.overlaps_coalescable(&t.b, &|_: Inst| true), block_overlap);

    let covers = live_b
        .iter()
        .zip(&live_a)
        .all(|(b, a)| b.is_none() || a.is_some());
    assert_eq!(t.a.covers(&t.b), covers);

    for seg in t.b.segments() {
        let expected = (seg.start.bits()..seg.end.bits()).any(|pos| live_a[pos as usize].is_some());
        assert_eq!(t.a.overlaps_range(seg.start, seg.end), expected);
    }
});
