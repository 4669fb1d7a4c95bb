//! Reading order for item groups.

use std::cmp::Ordering;

use crate::models::menu::{ItemGroup, OrderedMenu};

/// Width of the horizontal buckets that absorb column jitter.
pub const COLUMN_BUCKET_PX: f32 = 10.0;

/// Column bucket of a left edge: `x1` rounded to the nearest multiple of 10.
///
/// Halfway values round to the even multiple (`15 -> 20`, `25 -> 20`).
pub fn column_bucket(x1: f32) -> i64 {
    (x1 / COLUMN_BUCKET_PX).round_ties_even() as i64 * COLUMN_BUCKET_PX as i64
}

fn reading_order(a: &ItemGroup, b: &ItemGroup) -> Ordering {
    column_bucket(a.item.x1)
        .cmp(&column_bucket(b.item.x1))
        .then_with(|| a.item.y1.total_cmp(&b.item.y1))
}

/// Order groups column by column (left to right), then top to bottom.
///
/// The sort is stable: groups with the same bucket and top edge keep their
/// input order.
pub fn sort_reading_order(mut groups: Vec<ItemGroup>) -> OrderedMenu {
    groups.sort_by(reading_order);
    OrderedMenu::from_ordered(groups)
}
