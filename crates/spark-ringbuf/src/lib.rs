#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

//! `spark-ringbuf` 提供单线程独占的环形字节缓冲 [`RingBuffer`]。
//!
//! # 模块定位（Why）
//! - 串口、Socket 等“后台持续投递、前台按需消费”的端点需要一个不阻塞、不覆盖的字节队列；
//! - `spark-pump` 的 `RingStream` 以本类型为底座，通过 [`RingBuffer::as_slices`] 暴露直接缓冲视图，
//!   让搬运引擎一次拷贝即可把数据写入目标端。
//!
//! # 设计概要（How）
//! - 底层存储为独占的 `Box<[u8]>`，读写游标均为下标而非裸指针，扩容时整体替换存储，
//!   不存在悬垂引用；
//! - 始终保留一个空槽区分“空”与“满”，因此容量为 `size` 的缓冲最多容纳 `size - 1` 字节；
//! - 所有批量拷贝遵循“先拷贝到物理末尾、再回绕到起点”的两段式规则。
//!
//! # 契约说明（What）
//! - 所有操作均为全函数：在边界处饱和并返回实际搬运的字节数，调用方负责比对请求量；
//! - 类型不含任何锁，若被中断上下文共享，临界区由持有者自行管理。

extern crate alloc;

mod ring;

pub use ring::RingBuffer;
