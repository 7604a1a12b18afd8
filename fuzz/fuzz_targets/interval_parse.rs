//! Checks that dumping intervals and then re-parsing them is lossless.

#![no_main]

use libfuzzer_sys::fuzz_target;
use liveintervals::debug_utils::{self, DisplayLiveInterval};
use liveintervals::value::ValueArena;
use liveintervals_fuzz::TestCase;

fuzz_target!(|t: TestCase| {
    // Ensure the logger is initialized.
    let _ = pretty_env_logger::try_init();

    for (li, &lanes) in t.intervals.iter().zip(&t.lanes) {
        debug_utils::verify_live_interval(li, &t.arena, Some(lanes)).unwrap();
    }

    let dumped: String = t
        .intervals
        .iter()
        .map(|li| format!("{}\n", DisplayLiveInterval(li, &t.arena)))
        .collect();
    let mut arena = ValueArena::new();
    let parsed = debug_utils::parse_live_intervals(&dumped, &mut arena).unwrap();
    let dumped2: String = parsed
        .iter()
        .map(|li| format!("{}\n", DisplayLiveInterval(li, &arena)))
        .collect();
    assert_eq!(dumped, dumped2);
});
