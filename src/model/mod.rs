pub mod bucket;
pub mod row;

pub use bucket::{BucketSummary, StrikeBucket};
pub use row::{OptionRow, OptionType};
