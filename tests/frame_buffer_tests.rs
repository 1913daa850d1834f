use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use amscope::{Frame, FrameBuffer, TestPattern, ToupcamError};

#[test]
fn overflow_keeps_the_last_n_items_in_order() {
    for capacity in [1usize, 2, 3, 10] {
        let buffer = FrameBuffer::new(capacity).unwrap();
        let total = capacity * 3 + 1;
        for i in 0..total {
            buffer.put(i).unwrap();
        }
        assert_eq!(buffer.len(), capacity);
        assert_eq!(buffer.dropped(), (total - capacity) as u64);

        let drained: Vec<usize> = std::iter::from_fn(|| buffer.try_get().ok()).collect();
        let expected: Vec<usize> = (total - capacity..total).collect();
        assert_eq!(drained, expected, "capacity {capacity}");
    }
}

#[test]
fn capacity_two_drops_oldest() {
    let buffer = FrameBuffer::new(2).unwrap();
    buffer.put("A").unwrap();
    buffer.put("B").unwrap();
    buffer.put("C").unwrap();
    assert!(buffer.is_full());

    assert_eq!(buffer.get(true, None).unwrap(), "B");
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.try_get().unwrap(), "C");
}

#[test]
fn non_blocking_get_on_empty_fails_immediately() {
    let buffer: FrameBuffer<u32> = FrameBuffer::new(3).unwrap();
    let start = Instant::now();
    let err = buffer.get(false, Some(Duration::from_secs(5))).unwrap_err();
    assert!(err.is_empty());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn blocking_get_times_out_after_the_deadline() {
    let buffer: FrameBuffer<u32> = FrameBuffer::new(3).unwrap();
    let timeout = Duration::from_millis(80);
    let start = Instant::now();
    let err = buffer.get(true, Some(timeout)).unwrap_err();
    assert!(matches!(err, ToupcamError::Empty));
    assert!(start.elapsed() >= timeout);
}

#[test]
fn blocking_get_wakes_on_concurrent_put() {
    let buffer: FrameBuffer<u32> = FrameBuffer::new(3).unwrap();
    let producer = buffer.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        producer.put(42).unwrap();
    });

    let start = Instant::now();
    let item = buffer.get_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(item, 42);
    assert!(start.elapsed() < Duration::from_secs(5));
    handle.join().unwrap();
}

#[test]
fn put_then_get_returns_the_same_frame() {
    let buffer = FrameBuffer::new(10).unwrap();
    let frame = Frame::test_pattern(32, 24, TestPattern::Noise).with_sequence(3);
    let expected = frame.clone();

    buffer.put(frame).unwrap();
    let got = buffer.try_get().unwrap();
    assert_eq!(got.sequence(), 3);
    assert_eq!(got.timestamp(), expected.timestamp());
    assert_eq!(got.pixels(), expected.pixels());
}

#[test]
fn one_producer_two_consumers_deliver_each_item_once() {
    const ITEMS: u32 = 2_000;
    // Large enough that nothing is evicted, so every item must arrive.
    let buffer = FrameBuffer::new(ITEMS as usize).unwrap();
    let start = Arc::new(Barrier::new(3));

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let buffer = buffer.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut seen = Vec::new();
                loop {
                    match buffer.get(true, Some(Duration::from_secs(5))) {
                        Ok(item) => seen.push(item),
                        Err(ToupcamError::Closed) => break,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
                seen
            })
        })
        .collect();

    start.wait();
    for i in 0..ITEMS {
        buffer.put(i).unwrap();
    }
    buffer.join();
    buffer.close();

    let mut all = HashSet::new();
    let mut count = 0;
    for consumer in consumers {
        for item in consumer.join().unwrap() {
            assert!(all.insert(item), "item {item} delivered twice");
            count += 1;
        }
    }
    assert_eq!(count, ITEMS);
    assert_eq!(all.len(), ITEMS as usize);
    assert_eq!(buffer.dropped(), 0);
}

#[test]
fn overflow_under_contention_only_loses_evicted_items() {
    const ITEMS: u32 = 5_000;
    let buffer = FrameBuffer::new(4).unwrap();

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let buffer = buffer.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Ok(item) = buffer.get(true, Some(Duration::from_secs(5))) {
                    seen.push(item);
                }
                seen
            })
        })
        .collect();

    for i in 0..ITEMS {
        buffer.put(i).unwrap();
    }
    buffer.join();
    buffer.close();

    let mut delivered = HashSet::new();
    for consumer in consumers {
        let seen = consumer.join().unwrap();
        // Each consumer observes items in put order.
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        for item in seen {
            assert!(delivered.insert(item), "item {item} delivered twice");
        }
    }
    assert_eq!(delivered.len() as u64 + buffer.dropped(), ITEMS as u64);
}

#[test]
fn join_returns_once_everything_is_consumed() {
    let buffer = FrameBuffer::new(8).unwrap();
    for i in 0..5 {
        buffer.put(i).unwrap();
    }
    assert!(!buffer.join_timeout(Duration::from_millis(20)));

    let consumer = buffer.clone();
    let handle = thread::spawn(move || {
        for _ in 0..5 {
            consumer.get_timeout(Duration::from_secs(5)).unwrap();
            thread::sleep(Duration::from_millis(5));
        }
    });

    buffer.join();
    assert_eq!(buffer.unfinished(), 0);
    assert!(buffer.is_empty());
    handle.join().unwrap();
}

#[test]
fn evicted_items_count_as_processed() {
    let buffer = FrameBuffer::new(2).unwrap();
    for i in 0..6 {
        buffer.put(i).unwrap();
    }
    assert_eq!(buffer.unfinished(), 2);
    buffer.try_get().unwrap();
    buffer.try_get().unwrap();
    assert!(buffer.join_timeout(Duration::from_millis(10)));
}

#[test]
fn close_wakes_blocked_consumers_with_closed() {
    let buffer: FrameBuffer<u32> = FrameBuffer::new(2).unwrap();
    let consumer = buffer.clone();
    let handle = thread::spawn(move || consumer.get(true, None));

    thread::sleep(Duration::from_millis(30));
    buffer.close();

    let result = handle.join().unwrap();
    assert!(matches!(result, Err(ToupcamError::Closed)));
    assert!(matches!(buffer.put(1), Err(ToupcamError::Closed)));
}

#[test]
fn closed_buffer_drains_before_reporting_closed() {
    let buffer = FrameBuffer::new(4).unwrap();
    buffer.put(1).unwrap();
    buffer.put(2).unwrap();
    buffer.close();
    assert!(buffer.is_closed());

    assert_eq!(buffer.get(true, None).unwrap(), 1);
    assert_eq!(buffer.try_get().unwrap(), 2);
    assert!(matches!(buffer.try_get(), Err(ToupcamError::Closed)));
    assert!(matches!(
        buffer.get(true, Some(Duration::from_millis(10))),
        Err(ToupcamError::Closed)
    ));
}

#[test]
fn unrepresentable_timeout_waits_without_deadline() {
    let buffer: FrameBuffer<u32> = FrameBuffer::new(2).unwrap();
    let producer = buffer.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        producer.put(9).unwrap();
    });

    assert_eq!(buffer.get(true, Some(Duration::MAX)).unwrap(), 9);
    assert!(buffer.join_timeout(Duration::MAX));
    handle.join().unwrap();
}
