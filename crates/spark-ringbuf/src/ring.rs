use alloc::{boxed::Box, vec};
use core::fmt;

use bytes::Buf;

/// 单槽留空的环形字节缓冲。
///
/// # 设计动机（Why）
/// - 端点需要一个“写满即拒绝、读空即返回”的队列：写入永不覆盖未消费数据，读取永不阻塞；
/// - 仅凭两个游标区分空与满，需要始终保留一个空槽，因此 `available() + room() == size() - 1`。
///
/// # 结构设计（How）
/// - `storage`：独占的连续存储，长度即 `size()`；
/// - `read`：下一个待读字节的下标；`write`：下一个待写入位置的下标；
/// - 两个游标都在 `[0, size)` 内回绕，`read == write` 表示空。
///
/// # 契约说明（What）
/// - 批量读写返回实际搬运的字节数，可能小于请求量；
/// - [`resize`](Self::resize) 只会在不丢失数据时生效，并把存量字节线性化到新存储起点；
/// - 容量为 0 的缓冲合法，但永远无法容纳任何字节。
#[derive(Clone)]
pub struct RingBuffer {
    storage: Box<[u8]>,
    read: usize,
    write: usize,
}

impl RingBuffer {
    /// 创建容量为 `size` 字节的空缓冲，最多可容纳 `size - 1` 字节。
    pub fn new(size: usize) -> Self {
        Self {
            storage: vec![0u8; size].into_boxed_slice(),
            read: 0,
            write: 0,
        }
    }

    /// 底层存储容量。
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// 尚未消费的字节数。
    pub fn available(&self) -> usize {
        if self.write >= self.read {
            self.write - self.read
        } else {
            self.size() - (self.read - self.write)
        }
    }

    /// 还能写入的字节数。
    pub fn room(&self) -> usize {
        self.size().saturating_sub(1) - self.available()
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    pub fn is_full(&self) -> bool {
        self.room() == 0
    }

    /// 写入单个字节；缓冲已满时返回 `false` 且不产生任何副作用。
    pub fn write_byte(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.storage[self.write] = byte;
        self.write = self.wrap(self.write + 1);
        true
    }

    /// 写入 `min(src.len(), room())` 字节并返回实际写入量。
    ///
    /// 写游标距物理末尾不足时拆成两段：先填满末尾，再从起点写入剩余部分。
    pub fn write(&mut self, src: &[u8]) -> usize {
        let len = src.len().min(self.room());
        if len == 0 {
            return 0;
        }
        let run = self.size() - self.write;
        if len > run {
            self.storage[self.write..].copy_from_slice(&src[..run]);
            self.storage[..len - run].copy_from_slice(&src[run..len]);
            self.write = len - run;
        } else {
            self.storage[self.write..self.write + len].copy_from_slice(&src[..len]);
            self.write = self.wrap(self.write + len);
        }
        len
    }

    /// 读取并消费一个字节，空缓冲返回 `None`。
    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = self.peek_byte()?;
        self.read = self.wrap(self.read + 1);
        Some(byte)
    }

    /// 查看下一个字节但不消费。
    pub fn peek_byte(&self) -> Option<u8> {
        if self.is_empty() {
            None
        } else {
            Some(self.storage[self.read])
        }
    }

    /// 拷贝出 `min(dst.len(), available())` 字节并推进读游标。
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let copied = self.peek(dst);
        self.advance_read(copied);
        copied
    }

    /// 与 [`read`](Self::read) 相同的拷贝规则，但不推进读游标。
    pub fn peek(&self, dst: &mut [u8]) -> usize {
        let len = dst.len().min(self.available());
        if len == 0 {
            return 0;
        }
        let run = self.size() - self.read;
        if len > run {
            dst[..run].copy_from_slice(&self.storage[self.read..]);
            dst[run..len].copy_from_slice(&self.storage[..len - run]);
        } else {
            dst[..len].copy_from_slice(&self.storage[self.read..self.read + len]);
        }
        len
    }

    /// 丢弃前 `count` 字节，返回丢弃后剩余的字节数。
    ///
    /// `count >= available()` 等价于 [`flush`](Self::flush)。
    pub fn remove(&mut self, count: usize) -> usize {
        if count >= self.available() {
            self.flush();
            return 0;
        }
        self.advance_read(count);
        self.available()
    }

    /// 清空缓冲，游标复位到存储起点。
    pub fn flush(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// 将存储替换为 `new_size` 字节，返回生效后的容量。
    ///
    /// # 契约说明（What）
    /// - `new_size == size()` 或 `new_size <= available()`（会截断存量数据）时不做任何事，返回原容量；
    /// - 否则分配新存储，把存量字节按逻辑顺序拷贝到偏移 0 处，其余位置清零，返回 `new_size`；
    /// - 允许在不丢数据的前提下缩容。
    pub fn resize(&mut self, new_size: usize) -> usize {
        let live = self.available();
        if new_size == self.size() || new_size <= live {
            return self.size();
        }
        let mut storage = vec![0u8; new_size].into_boxed_slice();
        self.peek(&mut storage[..live]);
        self.storage = storage;
        self.read = 0;
        self.write = live;
        new_size
    }

    /// 在当前容量基础上追加 `extra` 字节。
    pub fn resize_add(&mut self, extra: usize) -> usize {
        self.resize(self.size().saturating_add(extra))
    }

    /// 以至多两段连续切片返回存量字节，拼接后即逻辑顺序。
    ///
    /// 第一段从读游标开始，是 `spark-pump` 直接缓冲路径使用的视图。
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        if self.write >= self.read {
            (&self.storage[self.read..self.write], &[])
        } else {
            (&self.storage[self.read..], &self.storage[..self.write])
        }
    }

    fn advance_read(&mut self, count: usize) {
        self.read = self.wrap(self.read + count);
    }

    // 游标推进量不超过一圈，减一次容量即可回绕。
    fn wrap(&self, index: usize) -> usize {
        if index >= self.size() {
            index - self.size()
        } else {
            index
        }
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("size", &self.size())
            .field("available", &self.available())
            .field("read", &self.read)
            .field("write", &self.write)
            .finish()
    }
}

impl Buf for RingBuffer {
    fn remaining(&self) -> usize {
        self.available()
    }

    fn chunk(&self) -> &[u8] {
        self.as_slices().0
    }

    fn advance(&mut self, cnt: usize) {
        self.remove(cnt);
    }
}
