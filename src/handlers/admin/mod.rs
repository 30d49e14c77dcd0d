// handlers/admin/mod.rs - Admin-only endpoints under /api/admin
//
// Every route here sits behind require_auth and require_admin.

pub mod courses;
pub mod enrollments;
pub mod schedules;
pub mod users;
