//! Row addressing: where a record lands in the output sheet.
//!
//! Match rows are laid out one block of six per match, one row per
//! station, below a single header row. Pit rows follow roster order.

use std::num::NonZeroU32;

use crate::model::Station;

/// First data row; row 1 holds headers.
pub const BASE_ROW: u32 = 2;

/// Rows per match, one per station.
pub const BLOCK_SIZE: u32 = 6;

/// Row for one station in one match.
///
/// Returns `None` when the match's block lies past the last addressable row.
pub fn match_row(match_number: NonZeroU32, station: Station) -> Option<u32> {
    let (first, _) = match_block(match_number)?;
    first.checked_add(u32::from(station.offset()))
}

/// Row for a team's pit report: its 1-based position in the roster.
///
/// Returns `None` when the team is not on the roster.
pub fn pit_row(team: u64, roster: &[u64]) -> Option<u32> {
    let index = roster.iter().position(|t| *t == team)?;
    u32::try_from(index + 1).ok()
}

/// First and last row of a match's six-row block, if the whole block is
/// addressable.
pub fn match_block(match_number: NonZeroU32) -> Option<(u32, u32)> {
    let first = (match_number.get() - 1)
        .checked_mul(BLOCK_SIZE)?
        .checked_add(BASE_ROW)?;
    Some((first, first.checked_add(BLOCK_SIZE - 1)?))
}
