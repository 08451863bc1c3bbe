pub mod buckets;
pub mod percentile;
pub mod summary;

pub use buckets::{bucket_key, render_bucket_start};
pub use percentile::percentile;
pub use summary::{mean, success_rate, StatusPartition};
