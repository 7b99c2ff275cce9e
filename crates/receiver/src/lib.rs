// Module structure for the log event receiver.

// Core model
pub mod record;
pub mod parser;

// Network and process lifecycle
pub mod receiver;
pub mod conf;
pub mod runtime;
