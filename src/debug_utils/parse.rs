//! Parser for the text format of [`DisplayLiveRange`] and
//! [`DisplayLiveInterval`].
//!
//! [`DisplayLiveRange`]: super::DisplayLiveRange
//! [`DisplayLiveInterval`]: super::DisplayLiveInterval

use alloc::vec;
use alloc::vec::Vec;
use core::str::FromStr;

use anyhow::Result;
use pest::error::{Error, ErrorVariant};
use pest::iterators::Pair;
use pest::{Parser, Span};
use pest_derive::Parser;

use crate::entity::EntityRef;
use crate::function::{Inst, VirtReg};
use crate::live_interval::LiveInterval;
use crate::live_range::{LiveRange, Segment};
use crate::reginfo::LaneMask;
use crate::slot::{Slot, SlotIndex};
use crate::value::ValueArena;

#[derive(Parser)]
#[grammar = "debug_utils/grammar.pest"]
struct LiveIntervalParser;

/// Helper function to extract N sub-pairs when the layout of a rule is fixed.
fn extract<const N: usize>(pair: Pair<'_, Rule>, expected_rules: [Rule; N]) -> [Pair<'_, Rule>; N] {
    let mut out = [(); N].map(|()| pair.clone());
    let mut i = 0;
    for pair in pair.into_inner() {
        assert_eq!(pair.as_rule(), expected_rules[i]);
        out[i] = pair;
        i += 1;
    }
    assert_eq!(i, N);
    out
}

/// Helper function to emit a custom error at the given span.
fn custom_error(span: Span<'_>, msg: &str) -> Error<Rule> {
    Error::new_from_span(
        ErrorVariant::<Rule>::CustomError {
            message: msg.into(),
        },
        span,
    )
}

fn parse_number<T: FromStr>(pair: Pair<'_, Rule>) -> Result<T> {
    Ok(pair.as_str().parse().map_err(|_| {
        // This can only fail due to integer overflow, the rule only allows
        // digits.
        custom_error(pair.as_span(), "integer overflow")
    })?)
}

fn parse_slot_index(pair: Pair<'_, Rule>) -> Result<SlotIndex> {
    let [number, letter] = extract(pair, [Rule::number, Rule::slot_letter]);
    let span = number.as_span();
    let inst: usize = parse_number(number)?;
    if inst > SlotIndex::MAX_INST {
        Err(custom_error(span, "instruction number out of range"))?;
    }
    let slot = match letter.as_str() {
        "B" => Slot::Block,
        "e" => Slot::EarlyClobber,
        "r" => Slot::Register,
        "d" => Slot::Dead,
        _ => unreachable!(),
    };
    Ok(Inst::new(inst).slot(slot))
}

fn parse_value_def(pair: Pair<'_, Rule>, lr: &mut LiveRange, arena: &mut ValueArena) -> Result<()> {
    let mut inner = pair.into_inner();
    let id = inner.next().unwrap();
    let id_span = id.as_span();
    if parse_number::<usize>(id)? != lr.num_values() {
        Err(custom_error(
            id_span,
            "values must be declared in order and with no gaps",
        ))?;
    }

    let def = inner.next().unwrap();
    match def.as_rule() {
        Rule::unused => {
            let vn = lr.next_value(SlotIndex::from_bits(0), arena);
            arena.mark_unused(vn);
        }
        Rule::slot_index => {
            let span = def.as_span();
            let def = parse_slot_index(def)?;
            let is_phi = inner.next().is_some();
            if is_phi && !def.is_block() {
                Err(custom_error(span, "PHI values must be defined at a block slot"))?;
            }
            if !is_phi && def.is_block() {
                Err(custom_error(
                    span,
                    "values defined at a block slot must be marked -phi",
                ))?;
            }
            lr.next_value(def, arena);
        }
        _ => unreachable!(),
    }
    Ok(())
}

fn parse_live_range_pair(
    pair: Pair<'_, Rule>,
    lr: &mut LiveRange,
    arena: &mut ValueArena,
) -> Result<()> {
    // Segments refer to values that are only declared after them.
    let mut segments = vec![];
    for pair in pair.into_inner() {
        match pair.as_rule() {
            Rule::empty => {}
            Rule::segment => {
                let span = pair.as_span();
                let [start, end, id] =
                    extract(pair, [Rule::slot_index, Rule::slot_index, Rule::number]);
                let start = parse_slot_index(start)?;
                let end = parse_slot_index(end)?;
                let id: usize = parse_number(id)?;
                segments.push((span, start, end, id));
            }
            Rule::value_def => parse_value_def(pair, lr, arena)?,
            _ => unreachable!(),
        }
    }

    for (span, start, end, id) in segments {
        if start >= end {
            Err(custom_error(span, "empty segment"))?;
        }
        let Some(&valno) = lr.values().get(id) else {
            Err(custom_error(span, "segment refers to an undeclared value"))?
        };
        if arena.is_unused(valno) {
            Err(custom_error(span, "segment refers to a deleted value"))?;
        }
        if let Some(last) = lr.segments().last() {
            if last.end > start {
                Err(custom_error(
                    span,
                    "segments must be sorted and must not overlap",
                ))?;
            }
            if last.end == start && last.valno == valno {
                Err(custom_error(
                    span,
                    "touching segments with the same value must be merged",
                ))?;
            }
        }
        lr.append(Segment::new(start, end, valno));
    }
    Ok(())
}

fn parse_interval(pair: Pair<'_, Rule>, arena: &mut ValueArena) -> Result<LiveInterval> {
    let mut inner = pair.into_inner();
    let [number] = extract(inner.next().unwrap(), [Rule::number]);
    let reg = VirtReg::new(parse_number::<u32>(number)? as usize);
    let mut li = LiveInterval::new(reg);
    parse_live_range_pair(inner.next().unwrap(), li.main_range_mut(), arena)?;

    for pair in inner {
        let span = pair.as_span();
        let [lane_mask, range] = extract(pair, [Rule::lane_mask, Rule::live_range]);
        let [hex] = extract(lane_mask, [Rule::hex]);
        let mask = u32::from_str_radix(hex.as_str(), 16)
            .map_err(|_| custom_error(hex.as_span(), "lane mask overflow"))?;
        let mask = LaneMask(mask);
        if mask.is_empty() {
            Err(custom_error(span, "sub-range with an empty lane mask"))?;
        }
        if li.subranges().iter().any(|sr| sr.lane_mask.intersects(mask)) {
            Err(custom_error(
                span,
                "sub-range lane masks must be disjoint",
            ))?;
        }
        parse_live_range_pair(range, li.create_subrange(mask).range_mut(), arena)?;
    }
    Ok(li)
}

/// Parses a list of live intervals in the format printed by
/// [`DisplayLiveInterval`], allocating their values in `arena`.
///
/// Intervals are separated by whitespace. `#` starts a comment that extends
/// to the end of the line.
///
/// [`DisplayLiveInterval`]: super::DisplayLiveInterval
pub fn parse_live_intervals(input: &str, arena: &mut ValueArena) -> Result<Vec<LiveInterval>> {
    let file = LiveIntervalParser::parse(Rule::intervals, input)?
        .next()
        .unwrap();
    let mut out = vec![];
    for pair in file.into_inner() {
        match pair.as_rule() {
            Rule::interval => out.push(parse_interval(pair, arena)?),
            Rule::EOI => {}
            _ => unreachable!(),
        }
    }
    Ok(out)
}

/// Parses a single live range in the format printed by
/// [`DisplayLiveRange`], allocating its values in `arena`.
///
/// [`DisplayLiveRange`]: super::DisplayLiveRange
pub fn parse_live_range(input: &str, arena: &mut ValueArena) -> Result<LiveRange> {
    let file = LiveIntervalParser::parse(Rule::range_file, input)?
        .next()
        .unwrap();
    let mut lr = LiveRange::new();
    for pair in file.into_inner() {
        match pair.as_rule() {
            Rule::live_range => parse_live_range_pair(pair, &mut lr, arena)?,
            Rule::EOI => {}
            _ => unreachable!(),
        }
    }
    Ok(lr)
}
