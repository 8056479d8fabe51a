pub mod conflict;
pub mod lifecycle;
pub mod models;
pub mod status;
