pub mod bus;
pub mod metrics;

pub use bus::NotificationBus;
pub use metrics::{LiveMetrics, MetricsSnapshot};
