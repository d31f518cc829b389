//! Stream adapters for view subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
