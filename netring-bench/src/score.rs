use core::fmt;
use std::time::Duration;

/// The result of running the benchmark.
#[derive(Clone, Copy, Debug, Default)]
pub struct Score {
    /// Packets accepted into the transmit ring.
    pub(crate) sent: u64,
    /// Packets taken out of the receive ring.
    pub(crate) received: u64,
    /// Packets the device dropped on a full receive ring.
    pub(crate) dropped: u64,
    /// Packets that arrived truncated.
    pub(crate) truncated: u64,
    /// Bytes taken out of the receive ring.
    pub(crate) data_len: u64,
    /// Notifications emitted by the coalescer.
    pub(crate) notifications: u64,
    /// Times the receiver woke up from waiting.
    pub(crate) wakeups: u64,
    /// Duration from the first packet sent to the last received.
    pub(crate) time: Duration,
}

impl Score {
    /// Packets that were sent but never received.
    pub fn lost(&self) -> u64 {
        self.sent.saturating_sub(self.received)
    }

    fn total_kb(&self) -> u64 {
        self.data_len / 1024
    }

    fn elapsed_secs(&self) -> f64 {
        self.time.as_secs_f64().max(f64::EPSILON)
    }

    fn packet_rate(&self) -> f64 {
        self.received as f64 / self.elapsed_secs()
    }

    fn effective_rate(&self) -> f64 {
        self.data_len as f64 / self.elapsed_secs()
    }

    fn packets_per_wakeup(&self) -> f64 {
        self.received as f64 / self.wakeups.max(1) as f64
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{:.3} sec\t{} KBytes\t{:.0} Byte/sec\t{:.0} pkt/sec",
            self.elapsed_secs(), self.total_kb(), self.effective_rate(), self.packet_rate())?;
        writeln!(f, "sent {}\treceived {}\tdropped {}\ttruncated {}",
            self.sent, self.received, self.dropped, self.truncated)?;
        write!(f, "notifications {}\twakeups {}\t{:.1} pkt/wakeup",
            self.notifications, self.wakeups, self.packets_per_wakeup())
    }
}
