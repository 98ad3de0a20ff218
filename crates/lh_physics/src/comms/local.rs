// crates/lh_physics/src/comms/local.rs

//! 进程内传输
//!
//! 每个 rank 拥有一个无界收件通道，持有所有其他 rank 收件通道的发送端。
//! 发送从不阻塞，因此“先发起全部发送、再等待全部接收”的次序不会死锁。
//!
//! 接收按 `(来源, 标签)` 匹配，先到但暂不匹配的消息进入暂存区。
//! 所有其他 rank 都退出后接收返回通信错误，而不是永久阻塞。

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{error, trace};

use super::{HaloMessage, Transport};
use crate::error::{HydroError, HydroResult};

/// 归约上行标签
const REDUCE_TAG: i32 = 1 << 20;
/// 归约结果广播标签
const BROADCAST_TAG: i32 = REDUCE_TAG + 1;

#[derive(Debug)]
struct Envelope {
    source: usize,
    tag: i32,
    payload: Vec<f64>,
}

/// 进程内 rank 的传输端
pub struct LocalTransport {
    rank: usize,
    size: usize,
    outboxes: Vec<Option<Sender<Envelope>>>,
    inbox: Receiver<Envelope>,
    stash: Mutex<Vec<Envelope>>,
    timeout: Option<Duration>,
}

/// 创建 `size` 个互联的传输端，下标即 rank
pub fn local_universe(size: usize) -> Vec<LocalTransport> {
    let (senders, receivers): (Vec<Sender<Envelope>>, Vec<Receiver<Envelope>>) =
        (0..size).map(|_| unbounded()).unzip();

    receivers
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| LocalTransport {
            rank,
            size,
            outboxes: senders
                .iter()
                .enumerate()
                .map(|(peer, s)| (peer != rank).then(|| s.clone()))
                .collect(),
            inbox,
            stash: Mutex::new(Vec::new()),
            timeout: None,
        })
        .collect()
}

impl LocalTransport {
    /// 设置接收超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn send(&self, peer: usize, tag: i32, payload: Vec<f64>) -> HydroResult<()> {
        let sender = self.outboxes.get(peer).and_then(Option::as_ref).ok_or_else(|| {
            HydroError::communication(
                "send",
                Some(peer),
                format!("无效的对端 rank (rank {} / size {})", self.rank, self.size),
            )
        })?;
        trace!(rank = self.rank, peer, tag, len = payload.len(), "发送消息");
        sender
            .send(Envelope { source: self.rank, tag, payload })
            .map_err(|_| HydroError::communication("send", Some(peer), "对端已断开"))
    }

    fn receive(&self, source: usize, tag: i32) -> HydroResult<Vec<f64>> {
        {
            let mut stash = self.stash.lock();
            if let Some(pos) = stash.iter().position(|e| e.source == source && e.tag == tag) {
                return Ok(stash.remove(pos).payload);
            }
        }

        loop {
            let envelope = match self.timeout {
                Some(timeout) => self.inbox.recv_timeout(timeout).map_err(|e| match e {
                    RecvTimeoutError::Timeout => HydroError::communication(
                        "recv",
                        Some(source),
                        format!("等待标签 {} 超时 ({:?})", tag, timeout),
                    ),
                    RecvTimeoutError::Disconnected => {
                        HydroError::communication("recv", Some(source), "所有对端已断开")
                    }
                })?,
                None => self
                    .inbox
                    .recv()
                    .map_err(|_| HydroError::communication("recv", Some(source), "所有对端已断开"))?,
            };

            if envelope.source == source && envelope.tag == tag {
                return Ok(envelope.payload);
            }
            self.stash.lock().push(envelope);
        }
    }

    fn scalar(payload: Vec<f64>, source: usize) -> HydroResult<f64> {
        payload
            .first()
            .copied()
            .ok_or_else(|| HydroError::communication("reduce", Some(source), "空的归约消息"))
    }

    fn all_reduce(&self, local: f64, op: fn(f64, f64) -> f64) -> HydroResult<f64> {
        if self.size == 1 {
            return Ok(local);
        }
        if self.rank == 0 {
            let mut acc = local;
            for peer in 1..self.size {
                acc = op(acc, Self::scalar(self.receive(peer, REDUCE_TAG)?, peer)?);
            }
            for peer in 1..self.size {
                self.send(peer, BROADCAST_TAG, vec![acc])?;
            }
            Ok(acc)
        } else {
            self.send(0, REDUCE_TAG, vec![local])?;
            Self::scalar(self.receive(0, BROADCAST_TAG)?, 0)
        }
    }
}

impl Transport for LocalTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn exchange(&self, messages: &mut [HaloMessage<'_>]) -> HydroResult<()> {
        for message in messages.iter() {
            self.send(message.peer, message.send_tag, message.send.to_vec())?;
        }
        for message in messages.iter_mut() {
            let payload = self.receive(message.peer, message.recv_tag)?;
            if payload.len() != message.recv.len() {
                return Err(HydroError::communication(
                    message.face.name(),
                    Some(message.peer),
                    format!("消息长度 {} 与接收缓冲 {} 不一致", payload.len(), message.recv.len()),
                ));
            }
            message.recv.copy_from_slice(&payload);
        }
        Ok(())
    }

    fn all_reduce_sum(&self, local: f64) -> HydroResult<f64> {
        self.all_reduce(local, |a, b| a + b)
    }

    fn all_reduce_min(&self, local: f64) -> HydroResult<f64> {
        self.all_reduce(local, f64::min)
    }

    fn all_reduce_max(&self, local: f64) -> HydroResult<f64> {
        self.all_reduce(local, f64::max)
    }

    fn barrier(&self) -> HydroResult<()> {
        self.all_reduce(0.0, |a, b| a + b).map(|_| ())
    }

    fn abort(&self, code: i32) -> ! {
        error!(rank = self.rank, code, "终止进程组");
        std::process::exit(code)
    }
}
