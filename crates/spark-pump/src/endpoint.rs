//! 端点能力契约：可读的源端与可写的目标端。
//!
//! # 设计概要（How）
//! - 必选方法覆盖逐字节与批量读写；可选的“直接缓冲”扩展以 `has_direct_buffer` 守卫，
//!   默认实现表示不支持；
//! - 搬运引擎在调用边界探测能力、选定策略后，以泛型单态化各策略的循环体，
//!   热路径内不存在虚调用。
//!
//! # 契约说明（What）
//! - `can_input_time_out() == false` 表示“数据永远不会再增加”，源端读空即可停止；
//! - `can_output_time_out() == false` 表示“空间永远不会再释放”，目标端写满即可停止；
//! - 直接缓冲视图借用自源端，借用期间无法调用任何 `&mut self` 方法，
//!   从类型上保证“取得视图后、消费之前不得读取”。

use crate::error::ReadError;

/// 字节源。
pub trait Source {
    /// 当前可立即读取的字节数。
    fn available(&self) -> usize;

    /// 读取并消费一个字节，暂无数据时返回 `None`。
    fn read_byte(&mut self) -> Option<u8>;

    /// 查看下一个字节但不消费。
    fn peek_byte(&mut self) -> Option<u8>;

    /// 读取当前可得的数据填充 `buf`，不等待。
    ///
    /// 默认实现逐字节读取，直到 `buf` 填满或 `available()` 归零。
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let mut count = 0;
        while count < buf.len() && self.available() > 0 {
            match self.read_byte() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    /// 暂时无数据是否可能在之后恢复。
    fn can_input_time_out(&self) -> bool {
        true
    }

    /// 剩余总字节数，未知时为 `None`。
    fn remaining(&self) -> Option<usize> {
        None
    }

    fn has_direct_buffer(&self) -> bool {
        false
    }

    /// [`direct_buffer`](Self::direct_buffer) 视图的长度。
    fn direct_available(&self) -> usize {
        0
    }

    /// 借出内部已缓冲字节的只读视图。
    fn direct_buffer(&self) -> &[u8] {
        &[]
    }

    /// 跳过视图前部已处理的 `count` 字节。
    fn direct_consume(&mut self, count: usize) {
        let _ = count;
    }
}

/// 字节目标端。
pub trait Sink {
    /// 当前可立即写入的字节数。
    fn available_for_write(&self) -> usize;

    /// 写入单个字节，被拒绝时返回 `false`。
    fn write_byte(&mut self, byte: u8) -> bool;

    /// 写入 `buf` 的前缀并返回接受的字节数。
    fn write(&mut self, buf: &[u8]) -> usize {
        let mut count = 0;
        for &byte in buf {
            if !self.write_byte(byte) {
                break;
            }
            count += 1;
        }
        count
    }

    fn can_output_time_out(&self) -> bool {
        true
    }

    fn write_str(&mut self, text: &str) -> usize {
        self.write(text.as_bytes())
    }
}

impl<S: Source + ?Sized> Source for &mut S {
    fn available(&self) -> usize {
        (**self).available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn peek_byte(&mut self) -> Option<u8> {
        (**self).peek_byte()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        (**self).read(buf)
    }

    fn can_input_time_out(&self) -> bool {
        (**self).can_input_time_out()
    }

    fn remaining(&self) -> Option<usize> {
        (**self).remaining()
    }

    fn has_direct_buffer(&self) -> bool {
        (**self).has_direct_buffer()
    }

    fn direct_available(&self) -> usize {
        (**self).direct_available()
    }

    fn direct_buffer(&self) -> &[u8] {
        (**self).direct_buffer()
    }

    fn direct_consume(&mut self, count: usize) {
        (**self).direct_consume(count)
    }
}

impl<K: Sink + ?Sized> Sink for &mut K {
    fn available_for_write(&self) -> usize {
        (**self).available_for_write()
    }

    fn write_byte(&mut self, byte: u8) -> bool {
        (**self).write_byte(byte)
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        (**self).write(buf)
    }

    fn can_output_time_out(&self) -> bool {
        (**self).can_output_time_out()
    }
}
