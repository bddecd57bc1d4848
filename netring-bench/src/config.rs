use structopt::StructOpt;

use netring::ring;
use netring::time::Duration;

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "netring-bench", about = "Push packets through a loopback ring pair")]
pub struct Config {
    /// Slots per ring.
    #[structopt(long, default_value = "256")]
    pub slots: u32,

    /// Bytes per slot buffer.
    #[structopt(long = "buf-size", default_value = "2048")]
    pub buf_size: u16,

    /// Mark the first slot of every packet with the virtio-net header flag.
    #[structopt(long = "vnet-header")]
    pub vnet_header: bool,

    /// Notification mitigation interval in microseconds.
    #[structopt(short = "i", long = "interval-us", default_value = "100")]
    pub interval_us: u64,

    /// Notify on every arrival instead of coalescing.
    #[structopt(long = "no-mitigation")]
    pub no_mitigation: bool,

    /// Number of packets to send.
    #[structopt(short = "n", long, default_value = "100000")]
    pub packets: usize,

    /// Bytes per packet.
    #[structopt(short = "l", long = "length", default_value = "1470")]
    pub length: usize,

    /// Segments each packet is split into on the send side.
    #[structopt(long, default_value = "1")]
    pub segments: usize,

    /// Packets the device moves per poll.
    #[structopt(long, default_value = "32")]
    pub burst: usize,
}

impl Config {
    pub fn from_args() -> Self {
        StructOpt::from_args()
    }

    pub fn ring(&self) -> ring::Config {
        let config = ring::Config::new(self.slots, self.buf_size);
        if self.vnet_header {
            config.with_vnet_header()
        } else {
            config
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let config = Config::from_iter(["netring-bench"]);
        assert_eq!(config.slots, 256);
        assert_eq!(config.buf_size, 2048);
        assert_eq!(config.interval(), Duration::from_micros(100));
        assert!(!config.ring().vnet_header);
    }

    #[test]
    fn parse_options() {
        let config = Config::from_iter([
            "netring-bench", "--slots", "16", "--buf-size", "64", "-n", "10", "-l", "100",
            "--vnet-header", "--no-mitigation",
        ]);
        assert_eq!(config.ring(), netring::ring::Config::new(16, 64).with_vnet_header());
        assert_eq!(config.packets, 10);
        assert_eq!(config.length, 100);
        assert!(config.no_mitigation);
    }
}
