//! 带超时的逐字节读取与文本解析。
//!
//! # 契约说明（What）
//! - 每次取字节都在空闲期限内轮询，轮询之间协作式让步；期限为零时只轮询一次；
//! - 超时不视为错误：读取类方法返回已读内容，解析类方法在没有遇到数字时返回 0，
//!   `find` 类方法返回 `false`；
//! - 解析遵循“跳过前导非数字、遇到首个非数字即停止”的经典流解析规则，
//!   可选的 `skip` 字节（通常是千分位逗号）在数字内部被忽略。

use std::time::Duration;

use crate::clock::{Clock, PolledTimeout};
use crate::config::PumpConfig;
use crate::endpoint::Source;
use crate::schedule::{Cooperative, Scheduler};

/// 在源端之上附加超时读取与解析能力。
pub struct TimedReader<'a, S: Source + ?Sized> {
    source: &'a mut S,
    clock: &'a dyn Clock,
    cooperative: &'a dyn Cooperative,
    timeout: Duration,
}

impl<'a, S: Source + ?Sized> TimedReader<'a, S> {
    pub fn new(source: &'a mut S, clock: &'a dyn Clock, cooperative: &'a dyn Cooperative) -> Self {
        Self {
            source,
            clock,
            cooperative,
            timeout: PumpConfig::default().idle_timeout(),
        }
    }

    pub fn with_scheduler(source: &'a mut S, scheduler: &'a Scheduler) -> Self {
        Self::new(source, scheduler.clock().as_ref(), scheduler)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn source(&mut self) -> &mut S {
        &mut *self.source
    }

    /// 读取一个字节，期限内没有数据时返回 `None`。
    pub fn timed_read(&mut self) -> Option<u8> {
        self.poll(|source| source.read_byte())
    }

    /// 查看下一个字节但不消费。
    pub fn timed_peek(&mut self) -> Option<u8> {
        self.poll(|source| source.peek_byte())
    }

    fn poll(&mut self, mut attempt: impl FnMut(&mut S) -> Option<u8>) -> Option<u8> {
        let deadline = PolledTimeout::new(self.clock.now(), self.timeout);
        loop {
            if let Some(byte) = attempt(&mut *self.source) {
                return Some(byte);
            }
            if self.timeout.is_zero() {
                return None;
            }
            self.cooperative.yield_now();
            if deadline.expired(self.clock.now()) {
                return None;
            }
        }
    }

    /// 读满 `buf` 或超时，返回读取的字节数。
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let mut count = 0;
        while count < buf.len() {
            match self.timed_read() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// 与 [`read_bytes`](Self::read_bytes) 相同，遇到 `terminator` 时停止；终止符被消费但不写入 `buf`。
    pub fn read_bytes_until(&mut self, terminator: u8, buf: &mut [u8]) -> usize {
        let mut count = 0;
        while count < buf.len() {
            match self.timed_read() {
                Some(byte) if byte != terminator => {
                    buf[count] = byte;
                    count += 1;
                }
                _ => break,
            }
        }
        count
    }

    /// 读取直到超时；非 UTF-8 字节以替换字符呈现。
    pub fn read_string(&mut self) -> String {
        let mut bytes = Vec::new();
        while let Some(byte) = self.timed_read() {
            bytes.push(byte);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn read_string_until(&mut self, terminator: u8) -> String {
        let mut bytes = Vec::new();
        while let Some(byte) = self.timed_read() {
            if byte == terminator {
                break;
            }
            bytes.push(byte);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// 消费输入直到找到 `target`；找到返回 `true`，超时返回 `false`。
    pub fn find(&mut self, target: &[u8]) -> bool {
        self.find_until(target, &[])
    }

    /// 与 [`find`](Self::find) 相同，但先遇到 `terminator` 时返回 `false`。
    ///
    /// 匹配失败时只回退到目标开头重新比较当前字节，不做部分匹配回溯。
    pub fn find_until(&mut self, target: &[u8], terminator: &[u8]) -> bool {
        if target.is_empty() {
            return true;
        }
        let mut index = 0;
        let mut term_index = 0;
        while let Some(byte) = self.timed_read() {
            if byte != target[index] {
                index = 0;
            }
            if byte == target[index] {
                index += 1;
                if index == target.len() {
                    return true;
                }
            }
            if !terminator.is_empty() && byte == terminator[term_index] {
                term_index += 1;
                if term_index == terminator.len() {
                    return false;
                }
            } else {
                term_index = 0;
            }
        }
        false
    }

    /// 跳过非数字字节，返回下一个数字（或负号、可选的小数点）而不消费它。
    fn peek_next_digit(&mut self, detect_decimal: bool) -> Option<u8> {
        loop {
            let byte = self.timed_peek()?;
            if byte == b'-' || byte.is_ascii_digit() || (detect_decimal && byte == b'.') {
                return Some(byte);
            }
            self.source.read_byte();
        }
    }

    /// 解析下一个整数；超时前未遇到数字时返回 0。溢出按补码回绕。
    pub fn parse_int(&mut self, skip: Option<u8>) -> i64 {
        let Some(mut byte) = self.peek_next_digit(false) else {
            return 0;
        };
        let mut negative = false;
        let mut value: i64 = 0;
        loop {
            match byte {
                _ if Some(byte) == skip => {}
                b'-' => negative = true,
                b'0'..=b'9' => value = value.wrapping_mul(10).wrapping_add(i64::from(byte - b'0')),
                _ => {}
            }
            self.source.read_byte();
            match self.timed_peek() {
                Some(next) if next.is_ascii_digit() || Some(next) == skip => byte = next,
                _ => break,
            }
        }
        if negative { value.wrapping_neg() } else { value }
    }

    /// 解析下一个浮点数；超时前未遇到数字时返回 0.0。
    pub fn parse_float(&mut self, skip: Option<u8>) -> f32 {
        let Some(mut byte) = self.peek_next_digit(true) else {
            return 0.0;
        };
        let mut negative = false;
        let mut fraction_seen = false;
        let mut value: i64 = 0;
        let mut scale = 1.0f32;
        loop {
            match byte {
                _ if Some(byte) == skip => {}
                b'-' => negative = true,
                b'.' => fraction_seen = true,
                b'0'..=b'9' => {
                    value = value.wrapping_mul(10).wrapping_add(i64::from(byte - b'0'));
                    if fraction_seen {
                        scale *= 0.1;
                    }
                }
                _ => {}
            }
            self.source.read_byte();
            match self.timed_peek() {
                Some(next) if next.is_ascii_digit() || next == b'.' || Some(next) == skip => {
                    byte = next
                }
                _ => break,
            }
        }
        if negative {
            value = value.wrapping_neg();
        }
        if fraction_seen {
            value as f32 * scale
        } else {
            value as f32
        }
    }
}
