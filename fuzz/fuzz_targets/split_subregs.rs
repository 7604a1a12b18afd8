//! Runs the sub-register splitter on arbitrary intervals with verification
//! enabled.

#![no_main]

use libfuzzer_sys::fuzz_target;
use liveintervals::debug_utils::{DisplayLiveInterval, GenericFunction};
use liveintervals::{ConnectedSubRegClasses, SplitOptions};
use liveintervals_fuzz::TestCase;

fuzz_target!(|t: TestCase| {
    // Ensure the logger is initialized.
    let _ = pretty_env_logger::try_init();

    let TestCase {
        mut arena,
        mut intervals,
        ..
    } = t;
    let (mut func, reginfo) = GenericFunction::from_intervals(&intervals, &arena);
    let options = SplitOptions {
        verify: true,
        ..Default::default()
    };
    let mut splitter = ConnectedSubRegClasses::new(options);

    for li in &mut intervals {
        let lanes_before = li
            .subranges()
            .iter()
            .fold(0, |acc, sr| acc | sr.lane_mask.0);
        let split = splitter.rename_components(li, &mut func, &reginfo, &mut arena);
        for new_li in &split {
            log::trace!("Split into {}", DisplayLiveInterval(new_li, &arena));
            assert!(new_li.has_subranges());
            for sr in new_li.subranges() {
                assert_eq!(sr.lane_mask.0 & !lanes_before, 0);
            }
        }
    }
});
