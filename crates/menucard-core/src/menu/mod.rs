//! Menu structure reconstruction from classified boxes.
//!
//! Raw boxes flow through three pure stages:
//! [`BoxAssociator`] groups components under their item box,
//! [`filter_priced`] drops groups without a price and
//! [`sort_reading_order`] produces the [`OrderedMenu`](crate::OrderedMenu).

mod association;
mod filter;
mod ordering;

pub use association::{AssociationStrategy, BoxAssociator, DEFAULT_OVERLAP_THRESHOLD};
pub use filter::filter_priced;
pub use ordering::{COLUMN_BUCKET_PX, column_bucket, sort_reading_order};
