// crates/lh_physics/src/halo/exchange.rs

//! chunk 间 halo 交换协调器
//!
//! 协调器拥有八个设备交换缓冲区（四个面各一发一收），在初始化时按
//! 最大深度与全部场的需求一次性分配，整个运行期间复用。
//!
//! # 交换流程
//!
//! 先左右轴、后下上轴，每个轴依次经过：
//!
//! ```text
//! Pack ─> [StageOut] ─> Communicate ─> [StageIn] ─> Unpack
//! ```
//!
//! - `Pack`: 打包该轴上所有存在邻居的面，结束于队列同步点
//! - `StageOut`: 暂存模式下将发送缓冲与接收缓冲复制到主机
//! - `Communicate`: 发起全部非阻塞发送/接收并等待全部完成
//! - `StageIn`: 暂存模式下将主机接收数据复制回设备
//! - `Unpack`: 解包全部接收缓冲，结束于队列同步点
//!
//! 外部边界面没有消息，也不打包或解包；该轴两面都是外部边界时整轴跳过。
//! 任一步骤失败都是致命的，错误携带所在轴的信息向上传播。

use std::fmt;

use lh_runtime::{Buffer1D, Context};
use tracing::{debug, info, trace};

use super::pack::{field_stride, pack_tile, unpack_tile, HaloOffsets};
use crate::comms::{HaloMessage, Transport};
use crate::error::{HydroError, HydroResult};
use crate::fields::{FieldSelection, NUM_FIELDS};
use crate::mesh::{Axis, Chunk, Face};
use lh_config::MAX_HALO_DEPTH;

/// 交换阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStage {
    /// 打包
    Pack,
    /// 设备到主机暂存
    StageOut,
    /// 消息传输
    Communicate,
    /// 主机到设备暂存
    StageIn,
    /// 解包
    Unpack,
}

impl ExchangeStage {
    /// 阶段名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pack => "pack",
            Self::StageOut => "stage-out",
            Self::Communicate => "communicate",
            Self::StageIn => "stage-in",
            Self::Unpack => "unpack",
        }
    }
}

impl fmt::Display for ExchangeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 一个面的发送/接收缓冲
pub struct FaceBuffers {
    /// 发送缓冲
    pub send: Buffer1D<f64>,
    /// 接收缓冲
    pub recv: Buffer1D<f64>,
}

impl FaceBuffers {
    fn allocate(context: &Context, len: usize) -> HydroResult<Self> {
        Ok(Self { send: Buffer1D::new(context, len)?, recv: Buffer1D::new(context, len)? })
    }
}

/// 一次交换的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeReport {
    /// 发送的消息数
    pub messages: usize,
    /// 发送的数值个数
    pub values_sent: usize,
    /// 处理的轴数（未被跳过）
    pub axes: usize,
    /// 是否经主机暂存
    pub staged: bool,
}

/// chunk 间 halo 交换协调器
pub struct ExchangeCoordinator {
    buffers: [FaceBuffers; 4],
    capacity: [usize; 2],
    max_depth: usize,
    staging: bool,
    chunk_cells: (usize, usize),
}

impl ExchangeCoordinator {
    /// 为 chunk 分配交换缓冲
    pub fn new(context: &Context, chunk: &Chunk, max_depth: usize, staging: bool) -> HydroResult<Self> {
        if !(1..=MAX_HALO_DEPTH).contains(&max_depth) {
            return Err(HydroError::InvalidHaloDepth { depth: max_depth, max: MAX_HALO_DEPTH });
        }

        let lr = NUM_FIELDS * field_stride(chunk.y_cells(), max_depth);
        let bt = NUM_FIELDS * field_stride(chunk.x_cells(), max_depth);
        let buffers = [
            FaceBuffers::allocate(context, lr)?,
            FaceBuffers::allocate(context, lr)?,
            FaceBuffers::allocate(context, bt)?,
            FaceBuffers::allocate(context, bt)?,
        ];

        info!(
            task = chunk.task(),
            left_right = lr,
            bottom_top = bt,
            max_depth,
            staging,
            "分配 halo 交换缓冲"
        );

        Ok(Self {
            buffers,
            capacity: [lr, bt],
            max_depth,
            staging,
            chunk_cells: (chunk.x_cells(), chunk.y_cells()),
        })
    }

    /// 是否经主机暂存
    pub fn staging(&self) -> bool {
        self.staging
    }

    /// 支持的最大深度
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// 某轴缓冲容量（元素数）
    pub fn capacity(&self, axis: Axis) -> usize {
        match axis {
            Axis::LeftRight => self.capacity[0],
            Axis::BottomTop => self.capacity[1],
        }
    }

    /// 某一面的缓冲
    pub fn buffers(&self, face: Face) -> &FaceBuffers {
        &self.buffers[face.index()]
    }

    /// 与邻居 chunk 交换所选场的 halo
    pub fn exchange<T: Transport + ?Sized>(
        &mut self,
        context: &Context,
        chunk: &Chunk,
        transport: &T,
        selection: &FieldSelection,
        depth: usize,
    ) -> HydroResult<ExchangeReport> {
        if depth == 0 || depth > self.max_depth {
            return Err(HydroError::InvalidHaloDepth { depth, max: self.max_depth });
        }
        if self.chunk_cells != (chunk.x_cells(), chunk.y_cells()) {
            return Err(HydroError::configuration(format!(
                "交换缓冲按 {:?} 的 chunk 分配, 实际 chunk 为 {} × {}",
                self.chunk_cells,
                chunk.x_cells(),
                chunk.y_cells()
            )));
        }
        context.ensure_owned(&self.buffers[0].send)?;

        let mut report = ExchangeReport { staged: self.staging, ..Default::default() };
        if selection.is_empty() {
            return Ok(report);
        }

        for axis in Axis::ORDER {
            self.exchange_axis(context, chunk, transport, selection, depth, axis, &mut report)
                .map_err(|e| e.in_stage(axis.name()))?;
        }

        debug!(
            task = chunk.task(),
            depth,
            fields = selection.count(),
            messages = report.messages,
            values = report.values_sent,
            "halo 交换完成"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn exchange_axis<T: Transport + ?Sized>(
        &mut self,
        context: &Context,
        chunk: &Chunk,
        transport: &T,
        selection: &FieldSelection,
        depth: usize,
        axis: Axis,
        report: &mut ExchangeReport,
    ) -> HydroResult<()> {
        let active: Vec<(Face, usize)> = axis
            .faces()
            .into_iter()
            .filter_map(|face| chunk.neighbour(face).rank().map(|peer| (face, peer)))
            .collect();
        if active.is_empty() {
            trace!(axis = %axis, "两面均为外部边界, 跳过");
            return Ok(());
        }

        let edge_cells = match axis {
            Axis::LeftRight => chunk.y_cells(),
            Axis::BottomTop => chunk.x_cells(),
        };
        let offsets = HaloOffsets::new(selection, depth, edge_cells);
        let len = offsets.end();
        let capacity = self.capacity(axis);
        if len > capacity {
            return Err(HydroError::HaloCapacity { axis: axis.name(), required: len, capacity });
        }

        // ---------- Pack ----------
        let buffers = &self.buffers;
        context.deferred(|queue| {
            for &(face, _) in &active {
                let view = buffers[face.index()].send.view();
                for tile in chunk.tiles.iter().filter(|t| t.info.on_chunk_edge(face)) {
                    pack_tile(queue, face, tile, &chunk.layout, view, selection, depth, &offsets);
                }
            }
        })?;
        context.synchronize()?;
        trace!(axis = %axis, stage = %ExchangeStage::Pack, len);

        // ---------- Communicate ----------
        if self.staging {
            self.communicate_staged(transport, &active, len)?;
        } else {
            self.communicate_direct(transport, &active, len)?;
        }
        report.messages += active.len();
        report.values_sent += active.len() * len;
        report.axes += 1;

        // ---------- Unpack ----------
        let buffers = &self.buffers;
        context.deferred(|queue| {
            for &(face, _) in &active {
                let view = buffers[face.index()].recv.view();
                for tile in chunk.tiles.iter().filter(|t| t.info.on_chunk_edge(face)) {
                    unpack_tile(queue, face, tile, &chunk.layout, view, selection, depth, &offsets);
                }
            }
        })?;
        context.synchronize()?;
        trace!(axis = %axis, stage = %ExchangeStage::Unpack, len);
        Ok(())
    }

    /// 传输层直接读写设备缓冲
    fn communicate_direct<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        active: &[(Face, usize)],
        len: usize,
    ) -> HydroResult<()> {
        let mut messages = Vec::with_capacity(active.len());
        for (face, buffers) in Face::ALL.into_iter().zip(self.buffers.iter_mut()) {
            let Some(&(_, peer)) = active.iter().find(|(f, _)| *f == face) else {
                continue;
            };
            let FaceBuffers { send, recv } = buffers;
            let send: &[f64] = &send.host_slice_mut()[..len];
            let recv = &mut recv.host_slice_mut()[..len];
            messages.push(HaloMessage::for_face(face, peer, send, recv));
        }
        transport
            .exchange(&mut messages)
            .map_err(|e| e.in_stage(ExchangeStage::Communicate.name()))?;
        trace!(stage = %ExchangeStage::Communicate, messages = messages.len());
        Ok(())
    }

    /// 经主机内存暂存后传输
    fn communicate_staged<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        active: &[(Face, usize)],
        len: usize,
    ) -> HydroResult<()> {
        let mut host = Vec::with_capacity(active.len());
        for &(face, peer) in active {
            let buffers = &self.buffers[face.index()];
            let mut send = vec![0.0; len];
            let mut recv = vec![0.0; len];
            let (sent, received) = rayon::join(
                || buffers.send.copy_to_host(&mut send),
                || buffers.recv.copy_to_host(&mut recv),
            );
            sent?;
            received?;
            host.push((face, peer, send, recv));
        }
        trace!(stage = %ExchangeStage::StageOut, faces = host.len());

        {
            let mut messages: Vec<HaloMessage<'_>> = host
                .iter_mut()
                .map(|(face, peer, send, recv)| HaloMessage::for_face(*face, *peer, send, recv))
                .collect();
            transport
                .exchange(&mut messages)
                .map_err(|e| e.in_stage(ExchangeStage::Communicate.name()))?;
        }

        for (face, _, _, recv) in &host {
            self.buffers[face.index()].recv.copy_from_host(recv)?;
        }
        trace!(stage = %ExchangeStage::StageIn, faces = host.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::local_universe;
    use crate::fields::FieldId;
    use crate::mesh::Decomposition;
    use lh_runtime::ContextConfig;

    fn context() -> Context {
        Context::new(ContextConfig::default().with_threads(2)).unwrap()
    }

    fn single_chunk(ctx: &Context, x: usize, y: usize) -> Chunk {
        let d = Decomposition::new(x, y, 1, 1).unwrap();
        Chunk::allocate(ctx, d.chunk(0).unwrap().clone(), d.tiles(0).unwrap()).unwrap()
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ExchangeStage::Communicate.name(), "communicate");
        assert_eq!(ExchangeStage::StageOut.to_string(), "stage-out");
        let err = HydroError::communication("recv", Some(1), "断开").in_stage(ExchangeStage::Communicate.name());
        assert!(matches!(err, HydroError::Communication { ref stage, .. } if stage == "communicate/recv"));
    }

    #[test]
    fn test_buffer_capacity() {
        let ctx = context();
        let chunk = single_chunk(&ctx, 6, 4);
        let coordinator = ExchangeCoordinator::new(&ctx, &chunk, 2, false).unwrap();
        assert_eq!(coordinator.capacity(Axis::LeftRight), 15 * 2 * 9);
        assert_eq!(coordinator.capacity(Axis::BottomTop), 15 * 2 * 11);
        assert_eq!(coordinator.buffers(Face::Top).send.len(), 15 * 2 * 11);
    }

    #[test]
    fn test_invalid_depth_rejected() {
        let ctx = context();
        let chunk = single_chunk(&ctx, 4, 4);
        assert!(matches!(
            ExchangeCoordinator::new(&ctx, &chunk, 3, false),
            Err(HydroError::InvalidHaloDepth { depth: 3, .. })
        ));

        let mut coordinator = ExchangeCoordinator::new(&ctx, &chunk, 1, false).unwrap();
        let universe = local_universe(1);
        let err = coordinator
            .exchange(&ctx, &chunk, &universe[0], &FieldSelection::all(), 2)
            .unwrap_err();
        assert!(matches!(err, HydroError::InvalidHaloDepth { depth: 2, max: 1 }));
    }

    #[test]
    fn test_single_chunk_is_noop() {
        let ctx = context();
        let chunk = single_chunk(&ctx, 4, 4);
        chunk.fill(FieldId::Density0, 7.0);
        let mut coordinator = ExchangeCoordinator::new(&ctx, &chunk, 2, true).unwrap();
        let universe = local_universe(1);
        let report = coordinator
            .exchange(&ctx, &chunk, &universe[0], &FieldSelection::all(), 2)
            .unwrap();
        assert_eq!(report.messages, 0);
        assert_eq!(report.axes, 0);
        assert!(chunk.tiles[0].field.density0.mirrored().iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_foreign_context_rejected() {
        let ctx = context();
        let other = context();
        let chunk = single_chunk(&ctx, 4, 4);
        let mut coordinator = ExchangeCoordinator::new(&ctx, &chunk, 2, false).unwrap();
        let universe = local_universe(1);
        let err = coordinator
            .exchange(&other, &chunk, &universe[0], &FieldSelection::all(), 1)
            .unwrap_err();
        assert_eq!(err.stage(), "device");
    }
}
