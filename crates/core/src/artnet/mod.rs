pub mod network_config;
pub mod output;
pub mod packet;
pub mod transmitter;
