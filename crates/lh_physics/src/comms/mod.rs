// crates/lh_physics/src/comms/mod.rs

//! 消息传输层
//!
//! [`Transport`] 抽象了 rank 间的点对点 halo 消息与全局归约：
//!
//! - [`LocalTransport`]: 进程内多 rank，每个 rank 一个线程，经 crossbeam 通道通信
//! - `MpiTransport`: 多进程 MPI（需启用 `distributed` 特性）
//!
//! 点对点消息按 `(对端, 标签)` 匹配，同一对端同一标签的消息保持发送次序。

pub mod local;
#[cfg(feature = "distributed")]
pub mod mpi;

pub use local::{local_universe, LocalTransport};
#[cfg(feature = "distributed")]
pub use self::mpi::MpiTransport;

use crate::error::HydroResult;
use crate::mesh::Face;

/// 一条双向 halo 消息：向 `peer` 发送 `send`，从 `peer` 接收到 `recv`
#[derive(Debug)]
pub struct HaloMessage<'a> {
    /// 本地面
    pub face: Face,
    /// 对端 rank
    pub peer: usize,
    /// 发送标签
    pub send_tag: i32,
    /// 接收标签
    pub recv_tag: i32,
    /// 发送数据
    pub send: &'a [f64],
    /// 接收缓冲
    pub recv: &'a mut [f64],
}

impl<'a> HaloMessage<'a> {
    /// 按面的标签约定构造消息
    pub fn for_face(face: Face, peer: usize, send: &'a [f64], recv: &'a mut [f64]) -> Self {
        Self { face, peer, send_tag: face.send_tag(), recv_tag: face.recv_tag(), send, recv }
    }
}

/// rank 间传输
pub trait Transport {
    /// 传输名称
    fn name(&self) -> &'static str;

    /// 本 rank
    fn rank(&self) -> usize;

    /// rank 总数
    fn size(&self) -> usize;

    /// 先发起全部发送与接收，再等待全部完成
    fn exchange(&self, messages: &mut [HaloMessage<'_>]) -> HydroResult<()>;

    /// 全局求和
    fn all_reduce_sum(&self, local: f64) -> HydroResult<f64>;

    /// 全局最小值
    fn all_reduce_min(&self, local: f64) -> HydroResult<f64>;

    /// 全局最大值
    fn all_reduce_max(&self, local: f64) -> HydroResult<f64>;

    /// 全局屏障
    fn barrier(&self) -> HydroResult<()>;

    /// 终止整个进程组
    fn abort(&self, code: i32) -> !;
}
