pub mod jobs;
pub mod reaper;
pub mod robots;

pub use jobs::MemoryJobStore;
pub use robots::MemoryRobotStore;
