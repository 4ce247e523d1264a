pub mod core;
pub mod network;
pub mod packet_analysis;
pub mod security;
pub mod select_device;
pub mod setup_logger;
