//! Built-in forecast providers.

pub mod arima;
pub mod sequence;
pub mod xgb;

pub use arima::ArimaProvider;
pub use sequence::SequenceProvider;
pub use xgb::GradientBoostedProvider;
