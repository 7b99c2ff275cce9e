use tokio::sync::mpsc;
use tracing::trace;

use crate::record::LogRecord;

/// Consumer of normalized records.
///
/// Called from the receiver's worker task once per record, in stream order.
/// Implementations must not block; hand the record off instead.
pub trait Notifiable: Send + Sync {
    fn notify(&self, record: LogRecord);
}

impl<F> Notifiable for F
where
    F: Fn(LogRecord) + Send + Sync,
{
    fn notify(&self, record: LogRecord) {
        self(record)
    }
}

/// Sink that forwards records to another task over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LogRecord>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifiable for ChannelSink {
    fn notify(&self, record: LogRecord) {
        if self.tx.send(record).is_err() {
            trace!("Record consumer gone, dropping record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SeverityLevel;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.notify(LogRecord::new("a", SeverityLevel::info()));
        sink.notify(LogRecord::new("b", SeverityLevel::error()));

        assert_eq!(rx.recv().await.unwrap().logger_name, "a");
        assert_eq!(rx.recv().await.unwrap().logger_name, "b");
    }

    #[test]
    fn test_channel_sink_survives_closed_consumer() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.notify(LogRecord::new("a", SeverityLevel::info()));
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |r: LogRecord| seen.lock().unwrap().push(r.logger_name);
        sink.notify(LogRecord::new("x", SeverityLevel::info()));
        assert_eq!(*seen.lock().unwrap(), vec!["x".to_string()]);
    }
}
