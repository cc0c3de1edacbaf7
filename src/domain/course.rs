use uuid::Uuid;

/// Read-only view of a course. The catalog is owned by another subsystem;
/// this core only checks purchasability.
#[derive(Debug, Clone)]
pub struct Course {
    pub course_id: Uuid,
    pub title: String,
    pub price_cents: i64,
    pub currency: String,
    pub is_published: bool,
}
