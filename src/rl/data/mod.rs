//! Price history input

mod sample;
mod series;

pub use sample::{generate_sample_data, SampleDataConfig};
pub use series::{PriceBar, PriceSeries};
