pub mod channel;
pub mod config;
pub mod frame;
pub mod logging;
pub mod stage;
