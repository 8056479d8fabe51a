pub mod config;
pub mod dashboard_client;
pub mod error;
pub mod event_mapper;
pub mod event_store;
pub mod notifier;
pub mod settings;
