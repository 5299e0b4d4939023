pub mod chunk;
pub mod config;
pub mod connection_string;
pub mod error;
pub mod path;
