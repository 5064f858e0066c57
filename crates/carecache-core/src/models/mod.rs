//! Data models for the school's collections.
//!
//! - `User`: parents, teachers and admins
//! - `Student`, `AuthorisedPerson`: children and who may collect them
//! - `AttendanceRecord`: daily check-in and pickup
//! - `Announcement`: school notices
//! - `Question`, `Answer`: the parent Q&A board

pub mod announcement;
pub mod attendance;
pub mod forum;
pub mod student;
pub mod user;

pub use announcement::Announcement;
pub use attendance::{AttendanceRecord, AttendanceStatus};
pub use forum::{Answer, Question};
pub use student::{AuthorisedPerson, Student};
pub use user::{Role, User};
