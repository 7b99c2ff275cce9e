/// Schema parsers, one per XML vocabulary

pub mod log4j;
pub mod log4j2;
pub mod log4net;

pub use log4j::Log4jParser;
pub use log4j2::Log4j2Parser;
pub use log4net::Log4NetParser;
