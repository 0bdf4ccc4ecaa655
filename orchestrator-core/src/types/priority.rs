use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Job priority, `0`–`20` inclusive, higher is more urgent.
///
/// Claim ordering is `(priority DESC, created_at ASC)`; this is a
/// plain bounded integer rather than a fixed set of tiers so that
/// submitters can express fine-grained ordering within a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(u8);

pub const PRIORITY_MIN: u8 = 0;
pub const PRIORITY_MAX: u8 = 20;
pub const PRIORITY_NORMAL: u8 = 5;

impl Priority {
    pub fn new(value: u8) -> Result<Self, OrchestratorError> {
        if value > PRIORITY_MAX {
            return Err(OrchestratorError::InvalidArgument(format!(
                "priority {value} out of range 0..={PRIORITY_MAX}"
            )));
        }
        Ok(Self(value))
    }

    pub fn normal() -> Self {
        Self(PRIORITY_NORMAL)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::normal()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Priority {
    type Error = OrchestratorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert!(Priority::new(21).is_err());
        assert!(Priority::new(20).is_ok());
        assert!(Priority::new(0).is_ok());
    }

    #[test]
    fn orders_numerically() {
        assert!(Priority::new(10).unwrap() > Priority::new(5).unwrap());
    }
}
