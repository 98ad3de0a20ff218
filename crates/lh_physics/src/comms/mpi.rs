// crates/lh_physics/src/comms/mpi.rs

//! MPI 传输（`distributed` 特性）
//!
//! 调用方须先执行 `mpi::initialize()` 并在整个运行期间持有返回的 `Universe`。
//! halo 交换使用非阻塞发送/接收：在同一个请求作用域内发起全部请求后逐个等待。

use mpi::collective::SystemOperation;
use mpi::request::WaitGuard;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use tracing::{error, trace};

use super::{HaloMessage, Transport};
use crate::error::{HydroError, HydroResult};

/// 基于 MPI world 通信子的传输
pub struct MpiTransport {
    world: SimpleCommunicator,
}

impl MpiTransport {
    /// 绑定 world 通信子
    pub fn new() -> Self {
        Self { world: SimpleCommunicator::world() }
    }

    fn all_reduce(&self, local: f64, op: SystemOperation) -> HydroResult<f64> {
        let mut global = 0.0f64;
        self.world.all_reduce_into(&local, &mut global, op);
        Ok(global)
    }
}

impl Default for MpiTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MpiTransport {
    fn name(&self) -> &'static str {
        "mpi"
    }

    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn exchange(&self, messages: &mut [HaloMessage<'_>]) -> HydroResult<()> {
        let size = self.size();
        if let Some(bad) = messages.iter().find(|m| m.peer >= size) {
            return Err(HydroError::communication(
                bad.face.name(),
                Some(bad.peer),
                format!("对端 rank 超出通信子大小 {}", size),
            ));
        }

        mpi::request::scope(|scope| {
            let mut guards = Vec::with_capacity(messages.len() * 2);
            for message in messages.iter_mut() {
                let peer = self.world.process_at_rank(message.peer as i32);
                trace!(face = %message.face, peer = message.peer, len = message.send.len(), "发起非阻塞交换");
                guards.push(WaitGuard::from(peer.immediate_receive_into_with_tag(
                    scope,
                    &mut *message.recv,
                    message.recv_tag,
                )));
                guards.push(WaitGuard::from(peer.immediate_send_with_tag(
                    scope,
                    message.send,
                    message.send_tag,
                )));
            }
            // WaitGuard 析构时等待对应请求
            drop(guards);
        });
        Ok(())
    }

    fn all_reduce_sum(&self, local: f64) -> HydroResult<f64> {
        self.all_reduce(local, SystemOperation::sum())
    }

    fn all_reduce_min(&self, local: f64) -> HydroResult<f64> {
        self.all_reduce(local, SystemOperation::min())
    }

    fn all_reduce_max(&self, local: f64) -> HydroResult<f64> {
        self.all_reduce(local, SystemOperation::max())
    }

    fn barrier(&self) -> HydroResult<()> {
        self.world.barrier();
        Ok(())
    }

    fn abort(&self, code: i32) -> ! {
        error!(rank = self.rank(), code, "MPI_Abort");
        self.world.abort(code)
    }
}
