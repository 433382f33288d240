pub mod api;
pub mod board;
pub mod cli;
pub mod logging;
pub mod notification;
pub mod session;
pub mod settings;
pub mod sync;
pub mod types;
