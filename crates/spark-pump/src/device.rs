//! 内存端点：黑洞、零源、常量切片、字节串与环形队列。
//!
//! # 模块定位（Why）
//! - 搬运引擎只认能力契约，这里提供不依赖硬件的标准端点，既用于应用层拼装，也用于测试驱动三种策略；
//! - [`RingStream`] 是“后台投递、前台消费”的串口类端点在内存中的对应物。
//!
//! # 能力一览（What）
//! | 端点 | 直接缓冲 | 输入可超时 | 输出可超时 |
//! | --- | --- | --- | --- |
//! | [`NullStream`] | 否 | 否 | 否 |
//! | [`ZeroStream`] | 否 | 否 | 否 |
//! | [`SliceSource`] | 可字节寻址时 | 否 | 否 |
//! | [`ByteStream`] | 是 | 否 | 否 |
//! | [`RingStream`] | 是 | 可配置，默认是 | 是 |

use spark_ringbuf::RingBuffer;

use crate::endpoint::{Sink, Source};
use crate::error::ReadError;

/// 无上限端点对外宣称的可读量与可写空间。
pub const UNBOUNDED_LEN: usize = i16::MAX as usize;

/// `/dev/null`：吞掉所有写入，从不产生数据。
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStream;

impl Source for NullStream {
    fn available(&self) -> usize {
        0
    }

    fn read_byte(&mut self) -> Option<u8> {
        None
    }

    fn peek_byte(&mut self) -> Option<u8> {
        None
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, ReadError> {
        Ok(0)
    }

    fn can_input_time_out(&self) -> bool {
        false
    }

    fn remaining(&self) -> Option<usize> {
        Some(0)
    }
}

impl Sink for NullStream {
    fn available_for_write(&self) -> usize {
        UNBOUNDED_LEN
    }

    fn write_byte(&mut self, _byte: u8) -> bool {
        true
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        buf.len()
    }

    fn can_output_time_out(&self) -> bool {
        false
    }
}

/// `/dev/zero`：源源不断地产生同一个填充字节，写入同样被吞掉。
///
/// 作为无上限目标的源端时 `send_all` 不会自行结束，应使用 `send_size`。
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroStream {
    fill: u8,
}

impl ZeroStream {
    pub fn new(fill: u8) -> Self {
        Self { fill }
    }
}

impl Source for ZeroStream {
    fn available(&self) -> usize {
        UNBOUNDED_LEN
    }

    fn read_byte(&mut self) -> Option<u8> {
        Some(self.fill)
    }

    fn peek_byte(&mut self) -> Option<u8> {
        Some(self.fill)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        buf.fill(self.fill);
        Ok(buf.len())
    }

    fn can_input_time_out(&self) -> bool {
        false
    }

    fn remaining(&self) -> Option<usize> {
        Some(UNBOUNDED_LEN)
    }
}

impl Sink for ZeroStream {
    fn available_for_write(&self) -> usize {
        UNBOUNDED_LEN
    }

    fn write_byte(&mut self, _byte: u8) -> bool {
        true
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        buf.len()
    }

    fn can_output_time_out(&self) -> bool {
        false
    }
}

/// 借用的常量字节序列，游标可重置。
///
/// `byte_addressable == false` 时不暴露直接缓冲（对应只能逐字读取的存储），
/// 搬运引擎会退回逐字节或分块策略。
#[derive(Clone, Debug)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    position: usize,
    byte_addressable: bool,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            byte_addressable: true,
        }
    }

    /// 构造不提供直接缓冲的源端。
    pub fn without_direct_buffer(data: &'a [u8]) -> Self {
        Self {
            byte_addressable: false,
            ..Self::new(data)
        }
    }

    pub fn reset_pointer(&mut self, position: usize) {
        self.position = position.min(self.data.len());
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn unread(&self) -> &'a [u8] {
        &self.data[self.position..]
    }
}

impl<'a> From<&'a str> for SliceSource<'a> {
    fn from(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl Source for SliceSource<'_> {
    fn available(&self) -> usize {
        self.data.len() - self.position
    }

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.peek_byte()?;
        self.position += 1;
        Some(byte)
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.unread().first().copied()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let len = buf.len().min(self.available());
        buf[..len].copy_from_slice(&self.unread()[..len]);
        self.position += len;
        Ok(len)
    }

    fn can_input_time_out(&self) -> bool {
        false
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.available())
    }

    fn has_direct_buffer(&self) -> bool {
        self.byte_addressable
    }

    fn direct_available(&self) -> usize {
        self.available()
    }

    fn direct_buffer(&self) -> &[u8] {
        self.unread()
    }

    fn direct_consume(&mut self, count: usize) {
        self.position = (self.position + count).min(self.data.len());
    }
}

impl Sink for SliceSource<'_> {
    fn available_for_write(&self) -> usize {
        UNBOUNDED_LEN
    }

    fn write_byte(&mut self, _byte: u8) -> bool {
        true
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        buf.len()
    }

    fn can_output_time_out(&self) -> bool {
        false
    }
}

/// 自有字节串：写入追加到末尾，读取从游标处消费。
///
/// 可选的 `limit` 限制未读字节总量，用来模拟“写满即永久耗尽”的目标端。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteStream {
    data: Vec<u8>,
    position: usize,
    limit: Option<usize>,
}

impl ByteStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// 尚未读取的内容。
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[self.position..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.position = 0;
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.drain(..self.position);
        self.data
    }

    fn consume(&mut self, count: usize) {
        self.position = (self.position + count).min(self.data.len());
        if self.position == self.data.len() {
            self.clear();
        }
    }
}

impl From<Vec<u8>> for ByteStream {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}

impl From<&[u8]> for ByteStream {
    fn from(data: &[u8]) -> Self {
        Self::from(data.to_vec())
    }
}

impl From<&str> for ByteStream {
    fn from(text: &str) -> Self {
        Self::from(text.as_bytes())
    }
}

impl Source for ByteStream {
    fn available(&self) -> usize {
        self.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.peek_byte()?;
        self.consume(1);
        Some(byte)
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.as_bytes().first().copied()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let len = buf.len().min(self.len());
        buf[..len].copy_from_slice(&self.as_bytes()[..len]);
        self.consume(len);
        Ok(len)
    }

    fn can_input_time_out(&self) -> bool {
        false
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.len())
    }

    fn has_direct_buffer(&self) -> bool {
        true
    }

    fn direct_available(&self) -> usize {
        self.len()
    }

    fn direct_buffer(&self) -> &[u8] {
        self.as_bytes()
    }

    fn direct_consume(&mut self, count: usize) {
        self.consume(count);
    }
}

impl Sink for ByteStream {
    fn available_for_write(&self) -> usize {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.len()),
            None => UNBOUNDED_LEN,
        }
    }

    fn write_byte(&mut self, byte: u8) -> bool {
        if self.available_for_write() == 0 {
            return false;
        }
        self.data.push(byte);
        true
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        let len = match self.limit {
            Some(_) => buf.len().min(self.available_for_write()),
            None => buf.len(),
        };
        self.data.extend_from_slice(&buf[..len]);
        len
    }

    fn can_output_time_out(&self) -> bool {
        false
    }
}

/// 以 [`RingBuffer`] 为底座的队列端点。
///
/// # 教案式注释
/// - **意图 (Why)**：串口、Socket 一类端点由后台处理往环形队列投递数据，前台在让步之间消费；
/// - **契约 (What)**：直接缓冲视图是环形缓冲的第一段连续区间，回绕后的部分在下一轮迭代中暴露；
///   输入默认可超时（暂时为空不代表结束），可通过 [`set_input_can_time_out`](Self::set_input_can_time_out) 改为
///   “读空即终止”；
/// - **注意 (Trade-offs)**：类型本身不加锁，若与中断上下文共享需由持有者管理临界区。
#[derive(Clone, Debug)]
pub struct RingStream {
    ring: RingBuffer,
    input_can_time_out: bool,
}

impl RingStream {
    pub fn new(size: usize) -> Self {
        Self::from(RingBuffer::new(size))
    }

    pub fn set_input_can_time_out(&mut self, can_time_out: bool) {
        self.input_can_time_out = can_time_out;
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    pub fn ring_mut(&mut self) -> &mut RingBuffer {
        &mut self.ring
    }

    pub fn into_inner(self) -> RingBuffer {
        self.ring
    }
}

impl From<RingBuffer> for RingStream {
    fn from(ring: RingBuffer) -> Self {
        Self {
            ring,
            input_can_time_out: true,
        }
    }
}

impl Source for RingStream {
    fn available(&self) -> usize {
        self.ring.available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.ring.read_byte()
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.ring.peek_byte()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        Ok(self.ring.read(buf))
    }

    fn can_input_time_out(&self) -> bool {
        self.input_can_time_out
    }

    fn has_direct_buffer(&self) -> bool {
        true
    }

    fn direct_available(&self) -> usize {
        self.ring.as_slices().0.len()
    }

    fn direct_buffer(&self) -> &[u8] {
        self.ring.as_slices().0
    }

    fn direct_consume(&mut self, count: usize) {
        self.ring.remove(count);
    }
}

impl Sink for RingStream {
    fn available_for_write(&self) -> usize {
        self.ring.room()
    }

    fn write_byte(&mut self, byte: u8) -> bool {
        self.ring.write_byte(byte)
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.ring.write(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_direct_view_tracks_cursor() {
        let mut source = SliceSource::from("hello");
        assert_eq!(source.read_byte(), Some(b'h'));
        assert_eq!(source.direct_buffer(), b"ello");
        source.direct_consume(2);
        assert_eq!(source.peek_byte(), Some(b'l'));
        assert_eq!(source.remaining(), Some(2));
        source.reset_pointer(0);
        assert_eq!(source.available(), 5);
        source.direct_consume(99);
        assert_eq!(source.available(), 0);
        assert_eq!(source.read_byte(), None);
    }

    #[test]
    fn byte_stream_limit_bounds_writes() {
        let mut stream = ByteStream::with_limit(4);
        assert_eq!(stream.write(b"abcdef"), 4);
        assert!(!stream.write_byte(b'g'));
        assert_eq!(stream.read_byte(), Some(b'a'));
        assert!(stream.write_byte(b'g'));
        assert_eq!(stream.as_bytes(), b"bcdg");
        assert_eq!(stream.into_vec(), b"bcdg".to_vec());
    }

    #[test]
    fn byte_stream_recycles_storage_once_drained() {
        let mut stream = ByteStream::from("xy");
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf), Ok(2));
        assert!(stream.is_empty());
        assert_eq!(stream.write_str("z"), 1);
        assert_eq!(stream.as_bytes(), b"z");
    }

    #[test]
    fn ring_stream_exposes_first_contiguous_run() {
        let mut stream = RingStream::new(8);
        stream.write(b"123456");
        let mut sink = [0u8; 6];
        assert_eq!(stream.read(&mut sink), Ok(6));
        stream.write(b"abcd");
        assert_eq!(stream.direct_buffer(), b"ab");
        assert_eq!(stream.direct_available(), 2);
        stream.direct_consume(2);
        assert_eq!(stream.direct_buffer(), b"cd");
        assert_eq!(stream.available_for_write(), 5);
    }

    #[test]
    fn zero_stream_fills_every_read() {
        let mut zero = ZeroStream::new(b'0');
        let mut buf = [1u8; 3];
        assert_eq!(zero.read(&mut buf), Ok(3));
        assert_eq!(&buf, b"000");
        assert!(!zero.can_input_time_out());
        assert_eq!(zero.available(), UNBOUNDED_LEN);
        assert_eq!(zero.remaining(), Some(UNBOUNDED_LEN));
        assert_eq!(NullStream.available_for_write(), UNBOUNDED_LEN);
    }
}
