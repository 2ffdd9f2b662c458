pub mod device_feed;

pub use device_feed::{DeviceFeed, FeedError, HttpDeviceFeed};

#[cfg(test)]
pub use device_feed::MockDeviceFeed;
