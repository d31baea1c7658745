pub mod attendance;
pub mod classes;
pub mod core;
pub mod diary;
pub mod setup;
pub mod students;
