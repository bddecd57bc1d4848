//! Producer and consumer on separate threads.
use std::thread;

use netring::ring::{Config, Publish, Ring};
use netring::sg::{drain, ingest};
use netring::Error;

fn packet(seq: u32) -> Vec<u8> {
    let len = 1 + (seq as usize * 37) % 300;
    (0..len).map(|i| (seq as usize + i) as u8).collect()
}

#[test]
fn packets_arrive_in_order() {
    const COUNT: u32 = 5_000;
    let (mut producer, mut consumer) = Ring::pair(Config::new(16, 64)).unwrap();

    let sender = thread::spawn(move || {
        for seq in 0..COUNT {
            let data = packet(seq);
            let (head, tail) = data.split_at(data.len() / 2);
            loop {
                match ingest(&mut producer, &[head, tail], Publish) {
                    Ok(len) => {
                        assert_eq!(len, data.len());
                        break;
                    },
                    Err(Error::OutOfSpace) => {
                        producer.sync();
                        thread::yield_now();
                    },
                    Err(err) => panic!("unexpected {:?}", err),
                }
            }
        }
        producer
    });

    let mut buffer = [0u8; 512];
    let mut seq = 0;
    while seq < COUNT {
        if consumer.avail() == 0 && consumer.sync() == 0 {
            thread::yield_now();
            continue;
        }

        let drained = drain(&mut consumer, &mut [&mut buffer[..]]);
        assert!(!drained.loss);
        assert!(!drained.incomplete);
        assert_eq!(&buffer[..drained.copied], &packet(seq)[..]);
        seq += 1;
    }

    let mut producer: Ring = sender.join().unwrap();
    // Everything has been handed back.
    assert_eq!(producer.sync(), 16);
    assert_eq!(consumer.sync(), 0);
}

#[test]
fn full_ring_reports_out_of_space() {
    let (mut producer, _consumer) = Ring::pair(Config::new(3, 10)).unwrap();
    assert_eq!(ingest(&mut producer, &[&[0u8; 30][..]], Publish), Ok(30));
    assert_eq!(ingest(&mut producer, &[&[0u8; 1][..]], Publish), Err(Error::OutOfSpace));
    assert_eq!(producer.sync(), 0);
}
