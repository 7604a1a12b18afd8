//! Checks that distributing the value classes of a range moves every segment
//! exactly once and leaves well-formed ranges behind.

#![no_main]

use libfuzzer_sys::fuzz_target;
use liveintervals::debug_utils::{self, DisplayLiveRange, GenericFunction};
use liveintervals::{ConnectedValueClasses, LiveRange};
use liveintervals_fuzz::TestCase;

fuzz_target!(|t: TestCase| {
    // Ensure the logger is initialized.
    let _ = pretty_env_logger::try_init();

    let TestCase {
        mut arena,
        intervals,
        ..
    } = t;
    let (func, _) = GenericFunction::from_intervals(&intervals, &arena);
    let mut classes = ConnectedValueClasses::new();

    for mut li in intervals {
        let lr = li.main_range_mut();
        let mut expected: Vec<_> = lr.segments().iter().map(|seg| (seg.start, seg.end)).collect();
        let num_values = lr.num_values();

        let n = classes.classify(lr, &arena, &func);
        assert!(n >= 1 || lr.values().is_empty());
        let mut targets: Vec<LiveRange> = (1..n.max(1)).map(|_| LiveRange::new()).collect();
        classes.distribute_range(lr, &mut targets, &mut arena);

        let mut found = vec![];
        let mut total_values = 0;
        for part in std::iter::once(&*lr).chain(&targets) {
            debug_utils::verify_live_range(part, &arena)
                .unwrap_or_else(|err| panic!("{err}: {}", DisplayLiveRange(part, &arena)));
            found.extend(part.segments().iter().map(|seg| (seg.start, seg.end)));
            total_values += part.num_values();
        }
        for target in &targets {
            assert!(!target.values().is_empty());
        }
        expected.sort();
        found.sort();
        assert_eq!(expected, found);
        assert_eq!(num_values, total_values);
    }
});
