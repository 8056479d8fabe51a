pub mod bootstrap;
pub mod calendar_controller;
pub mod commands;
