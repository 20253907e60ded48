//! `transfer_semantics`：覆盖搬运引擎对外承诺的终止与报告语义。
//!
//! # 测试总览（Why）
//! - 三种策略共享同一套终止规则，逐条验证完整搬运、分隔符、永久耗尽、空闲超时与零长度请求；
//! - 超时场景同时使用虚拟时钟（调度器周期回调推进时间）与系统时钟，保证语义不依赖测试机负载。

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use spark_pump::{
    ByteStream, MockClock, NoYield, NullStream, ReadError, RingBuffer, RingStream,
    Scheduler, Sink, SliceSource, Source, StopReason, Strategy, StreamPump, SystemClock,
    TimedReader, Transfer, TransferError, TransferReport, TransferTimeout,
};

/// 由调度器回调投递数据的串口类端点，数据只在让步期间到达。
struct FedLine {
    ring: Rc<RefCell<RingBuffer>>,
}

impl Source for FedLine {
    fn available(&self) -> usize {
        self.ring.borrow().available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.ring.borrow_mut().read_byte()
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.ring.borrow_mut().peek_byte()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        Ok(self.ring.borrow_mut().read(buf))
    }
}

/// 宣称有空间、实际只接受 `accept` 字节的目标端。
struct StingySink {
    accept: usize,
    taken: Vec<u8>,
}

impl Sink for StingySink {
    fn available_for_write(&self) -> usize {
        16
    }

    fn write_byte(&mut self, byte: u8) -> bool {
        if self.taken.len() >= self.accept {
            return false;
        }
        self.taken.push(byte);
        true
    }
}

/// 每次批量写入只接受第一个字节的目标端。
struct TrickleSink {
    taken: Vec<u8>,
}

impl Sink for TrickleSink {
    fn available_for_write(&self) -> usize {
        16
    }

    fn write_byte(&mut self, byte: u8) -> bool {
        self.taken.push(byte);
        true
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        match buf.first() {
            Some(&byte) => {
                self.taken.push(byte);
                1
            }
            None => 0,
        }
    }
}

/// 前 `closed_polls` 次查询报告没有空间，之后才开放的目标端。
struct LateSink {
    closed_polls: Cell<usize>,
    taken: Vec<u8>,
}

impl Sink for LateSink {
    fn available_for_write(&self) -> usize {
        let closed = self.closed_polls.get();
        if closed > 0 {
            self.closed_polls.set(closed - 1);
            return 0;
        }
        16
    }

    fn write_byte(&mut self, byte: u8) -> bool {
        self.taken.push(byte);
        true
    }
}

fn mock_pump(clock: &MockClock) -> StreamPump<'_> {
    StreamPump::new(clock, &NoYield)
}

#[test]
fn complete_transfer_when_source_holds_enough() {
    let clock = MockClock::new();
    let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    for direct in [true, false] {
        let mut pump = mock_pump(&clock);
        let mut source = if direct {
            SliceSource::new(&data)
        } else {
            SliceSource::without_direct_buffer(&data)
        };
        let mut sink = ByteStream::new();
        let outcome = pump.send_size(&mut source, &mut sink, 700, TransferTimeout::Default);
        assert_eq!(outcome.moved, 700);
        assert_eq!(outcome.report, TransferReport::Success);
        assert_eq!(outcome.stop, StopReason::GoalReached);
        assert_eq!(sink.as_bytes(), &data[..700]);
        assert_eq!(source.available(), 300);
    }
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

#[test]
fn delimiter_stops_and_next_call_resumes_after_it() {
    let clock = MockClock::new();
    for (direct, strategy) in [(true, Strategy::Direct), (false, Strategy::BytewiseUntil)] {
        let mut pump = mock_pump(&clock);
        let mut source = if direct {
            SliceSource::from("abc;def")
        } else {
            SliceSource::without_direct_buffer(b"abc;def")
        };
        let mut sink = ByteStream::new();
        let outcome = pump.send_until(&mut source, &mut sink, b';', TransferTimeout::Default);
        assert_eq!(outcome.strategy, strategy);
        assert_eq!(outcome.moved, 3);
        assert_eq!(outcome.report, TransferReport::Success);
        assert_eq!(sink.as_bytes(), b"abc");

        let mut rest = ByteStream::new();
        let outcome = pump.send_all(&mut source, &mut rest, TransferTimeout::Default);
        assert_eq!(outcome.moved, 3);
        assert_eq!(outcome.stop, StopReason::InputExhausted);
        assert_eq!(rest.as_bytes(), b"def");
    }
}

#[test]
fn delimiter_under_finite_goal_is_success() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut source = SliceSource::from("ab;cd");
    let mut sink = ByteStream::new();
    let outcome = pump.transfer(&mut source, &mut sink, Transfer::size(4).with_delimiter(b';'));
    assert_eq!(outcome.moved, 2);
    assert_eq!(outcome.stop, StopReason::DelimiterFound);
    assert_eq!(outcome.into_result(), Ok(2));
}

#[test]
fn permanently_exhausted_source_returns_immediately() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut empty = SliceSource::new(&[]);
    let mut sink = ByteStream::new();

    let outcome = pump.send_size(&mut empty, &mut sink, 10, TransferTimeout::Default);
    assert_eq!(outcome.moved, 0);
    assert_eq!(outcome.report, TransferReport::ShortTransfer);
    assert_eq!(outcome.stop, StopReason::InputExhausted);

    let outcome = pump.send_all(&mut empty, &mut sink, TransferTimeout::Default);
    assert_eq!(outcome.report, TransferReport::Success);
    assert_eq!(pump.last_report(), TransferReport::Success);
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

#[test]
fn idle_timeout_on_virtual_clock() {
    let clock = MockClock::new();
    let scheduler = Scheduler::new(Arc::new(clock.clone()));
    {
        let clock = clock.clone();
        scheduler.schedule_recurrent_function(
            move || {
                clock.advance(Duration::from_millis(10));
                true
            },
            Duration::ZERO,
        );
    }
    let mut pump = StreamPump::with_scheduler(&scheduler);
    let mut silent = RingStream::new(16);
    let mut sink = ByteStream::new();

    let outcome = pump.send_size(
        &mut silent,
        &mut sink,
        10,
        TransferTimeout::After(Duration::from_millis(50)),
    );
    assert_eq!(outcome.moved, 0);
    assert_eq!(outcome.report, TransferReport::TimedOut);
    assert_eq!(outcome.stop, StopReason::IdleTimeout);
    assert_eq!(clock.elapsed(), Duration::from_millis(50));
    assert_eq!(
        outcome.into_result(),
        Err(TransferError::TimedOut { moved: 0, goal: 10 })
    );
}

#[test]
fn idle_timeout_on_system_clock() {
    let clock = SystemClock;
    let mut pump = StreamPump::new(&clock, &NoYield);
    let mut silent = RingStream::new(16);
    let mut sink = NullStream;
    let started = Instant::now();
    let outcome = pump.send_size(
        &mut silent,
        &mut sink,
        10,
        TransferTimeout::After(Duration::from_millis(50)),
    );
    let waited = started.elapsed();
    assert_eq!(outcome.report, TransferReport::TimedOut);
    assert!(waited >= Duration::from_millis(50), "过早返回: {waited:?}");
    assert!(waited < Duration::from_secs(5), "等待过久: {waited:?}");
}

#[test]
fn unbounded_starvation_is_never_timed_out() {
    let clock = MockClock::new();
    let scheduler = Scheduler::new(Arc::new(clock.clone()));
    {
        let clock = clock.clone();
        scheduler.schedule_recurrent_function(
            move || {
                clock.advance(Duration::from_millis(25));
                true
            },
            Duration::ZERO,
        );
    }
    let mut pump = StreamPump::with_scheduler(&scheduler).with_idle_timeout(Duration::from_millis(100));
    let mut silent = RingStream::new(16);
    let mut sink = ByteStream::new();
    let outcome = pump.send_all(&mut silent, &mut sink, TransferTimeout::Default);
    assert_eq!(outcome.stop, StopReason::IdleTimeout);
    assert_eq!(outcome.report, TransferReport::Success);
}

#[test]
fn zero_length_request_ignores_endpoint_state() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut silent = RingStream::new(4);
    let mut full = ByteStream::with_limit(0);
    let outcome = pump.send_size(&mut silent, &mut full, 0, TransferTimeout::Default);
    assert_eq!(outcome.moved, 0);
    assert_eq!(outcome.report, TransferReport::Success);
    assert_eq!(outcome.stop, StopReason::EmptyRequest);
}

#[test]
fn progress_resets_idle_deadline() {
    let clock = MockClock::new();
    let scheduler = Scheduler::new(Arc::new(clock.clone()));
    let line = Rc::new(RefCell::new(RingBuffer::new(64)));
    {
        let clock = clock.clone();
        let line = Rc::clone(&line);
        let mut next = 0u8;
        scheduler.schedule_recurrent_function(
            move || {
                clock.advance(Duration::from_millis(3));
                let chunk = [next, next + 1, next + 2, next + 3];
                line.borrow_mut().write(&chunk);
                next += 4;
                next < 40
            },
            Duration::ZERO,
        );
    }
    let mut pump = StreamPump::with_scheduler(&scheduler);
    let mut source = FedLine {
        ring: Rc::clone(&line),
    };
    let mut sink = ByteStream::new();
    let outcome = pump.send_size(
        &mut source,
        &mut sink,
        40,
        TransferTimeout::After(Duration::from_millis(5)),
    );
    assert_eq!(outcome.report, TransferReport::Success);
    assert_eq!(outcome.strategy, Strategy::Chunked);
    assert_eq!(sink.as_bytes(), (0..40u8).collect::<Vec<_>>().as_slice());
    assert!(clock.elapsed() > Duration::from_millis(5), "总耗时应超过单次空闲期限");
}

#[test]
fn timed_reader_waits_for_scheduled_input() {
    let clock = MockClock::new();
    let scheduler = Scheduler::new(Arc::new(clock.clone()));
    let line = Rc::new(RefCell::new(RingBuffer::new(32)));
    {
        let clock = clock.clone();
        let line = Rc::clone(&line);
        let mut pending = b"speed=1,500 rpm\n".iter().copied();
        scheduler.schedule_recurrent_function(
            move || {
                clock.advance(Duration::from_millis(1));
                if let Some(byte) = pending.next() {
                    line.borrow_mut().write_byte(byte);
                }
                true
            },
            Duration::ZERO,
        );
    }
    let mut source = FedLine {
        ring: Rc::clone(&line),
    };
    let mut reader =
        TimedReader::with_scheduler(&mut source, &scheduler).with_timeout(Duration::from_millis(20));
    assert!(reader.find(b"="));
    assert_eq!(reader.parse_int(Some(b',')), 1500);
    assert_eq!(reader.read_string_until(b'\n'), " rpm");
    assert_eq!(reader.timed_read(), None);
}

#[test]
fn rejected_byte_is_write_error() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut source = SliceSource::without_direct_buffer(b"hello;");
    let mut sink = StingySink {
        accept: 2,
        taken: Vec::new(),
    };
    let outcome = pump.send_until(&mut source, &mut sink, b';', TransferTimeout::Default);
    assert_eq!(outcome.report, TransferReport::WriteError);
    assert_eq!(outcome.moved, 2);
    assert_eq!(sink.taken, b"he");
}

#[test]
fn partial_chunk_write_is_write_error() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut source = SliceSource::without_direct_buffer(b"0123456789");
    let mut sink = StingySink {
        accept: 3,
        taken: Vec::new(),
    };
    let outcome = pump.send_size(&mut source, &mut sink, 10, TransferTimeout::Default);
    assert_eq!(outcome.report, TransferReport::WriteError);
    assert_eq!(outcome.stop, StopReason::WriteFailed);
    assert_eq!(outcome.moved, 3);
    assert_eq!(outcome.into_result(), Err(TransferError::Write { moved: 3 }));
}

#[test]
fn wrapped_ring_is_drained_in_two_direct_runs() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut ring = RingBuffer::new(8);
    ring.write(b"xxxxxx");
    ring.read(&mut [0u8; 6]);
    ring.write(b"abcdef");
    let mut source = RingStream::from(ring);
    let mut sink = ByteStream::new();
    let outcome = pump.send_size(&mut source, &mut sink, 6, TransferTimeout::Default);
    assert_eq!(outcome.strategy, Strategy::Direct);
    assert_eq!(outcome.report, TransferReport::Success);
    assert_eq!(sink.as_bytes(), b"abcdef");
    assert!(source.ring().is_empty());
}

#[test]
fn pipe_follows_source_size_knowledge() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);

    let mut known = SliceSource::from("known size");
    let mut sink = ByteStream::new();
    let outcome = pump.pipe(&mut known, &mut sink);
    assert_eq!(outcome.goal.limit(), Some(10));
    assert_eq!(outcome.report, TransferReport::Success);
    assert_eq!(sink.as_bytes(), b"known size");

    let mut line = RingStream::new(16);
    line.write(b"buffered");
    let mut sink = ByteStream::new();
    let outcome = pump.pipe(&mut line, &mut sink);
    assert_eq!(outcome.goal.limit(), None);
    assert_eq!(sink.as_bytes(), b"buffered");
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

#[test]
fn send_available_takes_only_buffered_bytes() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut line = RingStream::new(16);
    line.write(b"now");
    let mut sink = ByteStream::new();
    let outcome = pump.send_available(&mut line, &mut sink);
    assert_eq!(outcome.moved, 3);
    assert_eq!(outcome.report, TransferReport::Success);
    let outcome = pump.send_available(&mut line, &mut sink);
    assert_eq!(outcome.moved, 0);
    assert_eq!(outcome.report, TransferReport::Success);
}

#[test]
fn null_sink_swallows_zero_source() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut zeros = spark_pump::ZeroStream::new(0);
    let outcome = pump.send_size(&mut zeros, &mut NullStream, 4096, TransferTimeout::Default);
    assert_eq!(outcome.moved, 4096);
    assert_eq!(outcome.strategy, Strategy::Chunked);
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

#[test]
fn direct_delimiter_survives_partial_writes() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut source = SliceSource::from("abc;d");
    let mut sink = TrickleSink { taken: Vec::new() };
    let outcome = pump.send_until(&mut source, &mut sink, b';', TransferTimeout::Default);
    assert_eq!(outcome.strategy, Strategy::Direct);
    assert_eq!(outcome.moved, 3);
    assert_eq!(outcome.report, TransferReport::Success);
    assert_eq!(outcome.stop, StopReason::DelimiterFound);
    assert_eq!(sink.taken, b"abc");
    assert_eq!(source.direct_buffer(), b"d");
}

#[test]
fn bytewise_waits_for_sink_room_without_losing_bytes() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut source = SliceSource::without_direct_buffer(b"ab;c");
    let mut sink = LateSink {
        closed_polls: Cell::new(3),
        taken: Vec::new(),
    };
    let outcome = pump.send_until(&mut source, &mut sink, b';', TransferTimeout::Default);
    assert_eq!(outcome.strategy, Strategy::BytewiseUntil);
    assert_eq!(outcome.moved, 2);
    assert_eq!(outcome.report, TransferReport::Success);
    assert_eq!(outcome.stop, StopReason::DelimiterFound);
    assert_eq!(sink.taken, b"ab");
    assert_eq!(sink.closed_polls.get(), 0);
    assert_eq!(source.available(), 1);
    assert_eq!(source.read_byte(), Some(b'c'));
}

#[test]
fn send_available_moves_one_contiguous_run_per_call() {
    let clock = MockClock::new();
    let mut pump = mock_pump(&clock);
    let mut ring = RingBuffer::new(8);
    ring.write(b"xxxxxx");
    ring.read(&mut [0u8; 6]);
    ring.write(b"abcdef");
    let mut line = RingStream::from(ring);
    let mut sink = ByteStream::new();

    let outcome = pump.send_available(&mut line, &mut sink);
    assert_eq!(outcome.strategy, Strategy::Direct);
    assert_eq!(outcome.moved, 2);
    assert_eq!(outcome.report, TransferReport::Success);
    assert_eq!(line.direct_buffer(), b"cdef");

    let outcome = pump.send_available(&mut line, &mut sink);
    assert_eq!(outcome.moved, 4);
    assert_eq!(sink.as_bytes(), b"abcdef");
    assert!(line.ring().is_empty());
}
