pub mod assignments;
pub mod classes;
pub mod core;
pub mod dashboard;
pub mod enrollments;
pub mod progress;
pub mod session;
pub mod submissions;
pub mod users;
