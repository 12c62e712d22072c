pub mod autoplay;
pub mod chart;
pub mod error;
pub mod events;
pub mod gameplay;
pub mod judgment;
pub mod parsing;
pub mod tails;
pub mod timing_windows;
