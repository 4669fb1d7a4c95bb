//! Item filtering.

use tracing::debug;

use crate::models::menu::ItemGroup;

/// Keep only groups that have a price component, preserving order.
pub fn filter_priced(groups: Vec<ItemGroup>) -> Vec<ItemGroup> {
    let before = groups.len();
    let priced: Vec<ItemGroup> = groups.into_iter().filter(ItemGroup::has_price).collect();
    debug!("Kept {} of {} item groups with a price", priced.len(), before);
    priced
}
