pub mod api;
pub mod cylinder;
pub mod profile;
