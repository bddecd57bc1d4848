//! Ring pair throughput benchmark.
//!
//! Sends packets through a transmit ring, a loopback device and a receive ring, each side on its
//! own thread, and reports the rate and how many wakeups the receiver needed. Call example:
//!
//! * `netring-bench --slots 1024 -n 1000000 -l 1470 --segments 2 -i 50`
//!
//! Log verbosity follows `RUST_LOG`.
use netring_bench::{config, run};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_thread_names(true)
        .init();

    let config = config::Config::from_args();
    tracing::info!(slots = config.slots, buf_size = config.buf_size, packets = config.packets,
        "starting");

    match run(&config) {
        Ok(score) => {
            println!("[+] Done\n");
            println!("{}", score);
        },
        Err(err) => {
            tracing::error!("benchmark failed: {}", err);
            std::process::exit(1);
        },
    }
}
