pub mod app;
pub mod arguments;
pub mod error;
pub mod host;
pub mod logging;
