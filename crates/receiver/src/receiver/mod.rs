//! Receiver module: TCP listener, per-connection worker and notification sink.

pub mod error;
pub mod sink;
pub mod tcp;

pub use error::ReceiverError;
pub use sink::{ChannelSink, Notifiable};
pub use tcp::{ReceiverState, TcpReceiver};
