// crates/lh_runtime/src/context.rs

//! 执行上下文
//!
//! `Context` 封装一个计算设备及其有序队列。主机实现中设备即一个独立的
//! rayon 线程池，队列即在该线程池上顺序执行的内核分发。
//!
//! 上下文是廉价可克隆的共享句柄，每个设备缓冲区持有其分配时的上下文，
//! 保证上下文的生命周期覆盖其上所有缓冲区。
//!
//! # 内存记账
//!
//! 上下文记录当前分配字节数与峰值，可选的 `memory_limit_bytes` 上限
//! 用于在主机上复现设备内存耗尽的行为（分配返回 `RuntimeError::Allocation`）。

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::dispatch::Range2dMode;
use crate::error::{RuntimeError, RuntimeResult};

/// 上下文 ID 分配器
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// 上下文配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// 工作线程数（`None` 使用 rayon 默认值）
    pub threads: Option<usize>,
    /// 二维分发布局策略
    pub range2d_mode: Range2dMode,
    /// 延迟作用域内的分发是否逐个阻塞
    pub sync_kernels: bool,
    /// 设备内存上限（字节）
    pub memory_limit_bytes: Option<usize>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            threads: None,
            range2d_mode: Range2dMode::Normal,
            sync_kernels: true,
            memory_limit_bytes: None,
        }
    }
}

impl ContextConfig {
    /// 设置线程数
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// 设置二维布局策略
    pub fn with_range2d_mode(mut self, mode: Range2dMode) -> Self {
        self.range2d_mode = mode;
        self
    }

    /// 设置是否逐个阻塞
    pub fn with_sync_kernels(mut self, sync: bool) -> Self {
        self.sync_kernels = sync;
        self
    }

    /// 设置内存上限
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit_bytes = Some(bytes);
        self
    }
}

/// 绑定到某个上下文的资源
pub trait ContextBound {
    /// 所属上下文 ID
    fn context_id(&self) -> u64;
}

/// 执行上下文（设备 + 有序队列）
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    id: u64,
    pool: rayon::ThreadPool,
    config: ContextConfig,
    allocated: AtomicUsize,
    peak: AtomicUsize,
    open_scopes: AtomicUsize,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("threads", &self.num_threads())
            .field("range2d_mode", &self.inner.config.range2d_mode)
            .field("sync_kernels", &self.inner.config.sync_kernels)
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

impl Context {
    /// 按配置创建上下文
    pub fn new(config: ContextConfig) -> RuntimeResult<Self> {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(move |i| format!("lh-queue-{}-{}", id, i));
        if let Some(threads) = config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| RuntimeError::ThreadPool { message: e.to_string() })?;

        info!(
            context = id,
            threads = pool.current_num_threads(),
            mode = %config.range2d_mode,
            sync = config.sync_kernels,
            "创建执行上下文"
        );

        Ok(Self {
            inner: Arc::new(ContextInner {
                id,
                pool,
                config,
                allocated: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                open_scopes: AtomicUsize::new(0),
            }),
        })
    }

    /// 默认配置的主机上下文
    pub fn host() -> RuntimeResult<Self> {
        Self::new(ContextConfig::default())
    }

    /// 上下文 ID（进程内唯一）
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// 上下文配置
    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// 默认二维布局策略
    #[inline]
    pub fn range2d_mode(&self) -> Range2dMode {
        self.inner.config.range2d_mode
    }

    /// 延迟作用域内是否逐个阻塞
    #[inline]
    pub fn sync_kernels(&self) -> bool {
        self.inner.config.sync_kernels
    }

    /// 工作线程数
    pub fn num_threads(&self) -> usize {
        self.inner.pool.current_num_threads()
    }

    /// 当前分配字节数
    pub fn allocated_bytes(&self) -> usize {
        self.inner.allocated.load(Ordering::Acquire)
    }

    /// 峰值分配字节数
    pub fn peak_bytes(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }

    /// 校验资源属于本上下文
    pub fn ensure_owned<B: ContextBound + ?Sized>(&self, resource: &B) -> RuntimeResult<()> {
        let owner = resource.context_id();
        if owner == self.inner.id {
            Ok(())
        } else {
            Err(RuntimeError::ContextMismatch { owner, current: self.inner.id })
        }
    }

    /// 队列同步点
    ///
    /// 阻塞分发在返回时已经完成；延迟作用域在离开时完成。
    /// 在延迟作用域内部调用同步点是次序错误，返回 `RuntimeError::PendingWork`。
    pub fn synchronize(&self) -> RuntimeResult<()> {
        let pending = self.inner.open_scopes.load(Ordering::Acquire);
        if pending > 0 {
            return Err(RuntimeError::PendingWork { pending });
        }
        Ok(())
    }

    // ========== 内部接口 ==========

    pub(crate) fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.inner.pool.install(op)
    }

    pub(crate) fn pool(&self) -> &rayon::ThreadPool {
        &self.inner.pool
    }

    pub(crate) fn enter_scope(&self) -> ScopeGuard<'_> {
        self.inner.open_scopes.fetch_add(1, Ordering::AcqRel);
        ScopeGuard { context: self }
    }

    /// 记账一次分配
    pub(crate) fn reserve(
        &self,
        label: &'static str,
        elements: usize,
        bytes: usize,
    ) -> RuntimeResult<()> {
        let limit = self.inner.config.memory_limit_bytes;
        let reserved = self
            .inner
            .allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = current.checked_add(bytes)?;
                match limit {
                    Some(limit) if next > limit => None,
                    _ => Some(next),
                }
            });

        match reserved {
            Ok(previous) => {
                self.inner.peak.fetch_max(previous + bytes, Ordering::AcqRel);
                debug!(context = self.inner.id, label, elements, bytes, "设备内存分配");
                Ok(())
            }
            Err(current) => Err(RuntimeError::Allocation {
                label,
                elements,
                bytes,
                reason: format!(
                    "超出上下文内存上限 (已分配 {} 字节, 上限 {} 字节)",
                    current,
                    limit.unwrap_or(usize::MAX)
                ),
            }),
        }
    }

    /// 归还一次分配
    pub(crate) fn release(&self, bytes: usize) {
        self.inner.allocated.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// 延迟作用域计数守卫
pub(crate) struct ScopeGuard<'a> {
    context: &'a Context,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.context.inner.open_scopes.fetch_sub(1, Ordering::AcqRel);
    }
}
