pub mod client;
pub mod configuration;
pub mod data_capture;
pub mod error_handling;
pub mod storage;
pub mod web_interface;
