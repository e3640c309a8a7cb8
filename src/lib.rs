pub mod acquisition;
pub mod error_log;
pub mod header;
pub mod link;
pub mod normalizer;
pub mod ports;
pub mod profile;
pub mod reader;
pub mod scheduler;
