use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Granted course access. At most one row per (user_id, course_id) no matter
/// how many payments or free-enrollment paths led to it. Progress fields are
/// owned by the playback subsystem after creation.
#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub enrollment_id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentSummary {
    pub enrollment_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn summary(&self) -> EnrollmentSummary {
        EnrollmentSummary {
            enrollment_id: self.enrollment_id,
            enrolled_at: self.enrolled_at,
        }
    }
}
