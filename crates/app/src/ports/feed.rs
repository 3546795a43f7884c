//! Sensor feed port: where an adapter pulls its raw signals from.

use std::future::Future;

use tokio::sync::mpsc;

use shipsafe_domain::signal::RawSignal;

/// A stream of raw signals for one subsystem.
///
/// `None` is end-of-stream. Silence afterwards is handled by the watchdog,
/// never read as "all clear".
pub trait SensorFeed: Send {
    fn next_raw_signal(&mut self) -> impl Future<Output = Option<RawSignal>> + Send;
}

/// A [`SensorFeed`] backed by an mpsc channel.
#[derive(Debug)]
pub struct ChannelFeed {
    receiver: mpsc::Receiver<RawSignal>,
}

impl ChannelFeed {
    /// Create a feed and the sender that drives it.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<RawSignal>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver })
    }
}

impl SensorFeed for ChannelFeed {
    fn next_raw_signal(&mut self) -> impl Future<Output = Option<RawSignal>> + Send {
        self.receiver.recv()
    }
}
