use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CategoryId, UserId};

/// Per-category counts from one completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryTally {
    pub category_id: CategoryId,
    pub total: u32,
    pub correct: u32,
}

/// Running per-user, per-category accuracy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub user_id: UserId,
    pub category_id: CategoryId,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    pub updated_at: DateTime<Utc>,
}

impl CategoryStats {
    /// Accuracy in whole percent, rounded half up. Zero when nothing was attempted.
    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        if self.total_attempts == 0 {
            return 0;
        }
        let t = u64::from(self.total_attempts);
        let c = u64::from(self.correct_attempts.min(self.total_attempts));
        u32::try_from((c * 200 + t) / (2 * t)).unwrap_or(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn accuracy_rounds_and_handles_zero() {
        let mut stats = CategoryStats {
            user_id: UserId::random(),
            category_id: CategoryId::random(),
            total_attempts: 0,
            correct_attempts: 0,
            updated_at: fixed_now(),
        };
        assert_eq!(stats.accuracy_percent(), 0);

        stats.total_attempts = 3;
        stats.correct_attempts = 2;
        assert_eq!(stats.accuracy_percent(), 67);
    }
}
