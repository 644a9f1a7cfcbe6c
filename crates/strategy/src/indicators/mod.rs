pub mod alignment;
pub mod moving_average;
pub mod volatility;
pub mod volume;

pub use alignment::{alignment_from_averages, classify_alignment};
pub use moving_average::{attach_moving_averages, moving_average, MA_PERIODS};
pub use volatility::PriceVolatility;
pub use volume::VolumeRatio;
