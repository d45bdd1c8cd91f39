// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod link;
pub mod logging;
pub mod observer;
pub mod passage;
pub mod protocol;
pub mod runtime;
pub mod scheduler;
pub mod score;
pub mod settings;
pub mod typing;
pub mod typist;
