//! Port traits: the seams between the domain and the outside world.

pub mod config_port;
pub mod data_port;
pub mod notification_port;
pub mod result_sink_port;
