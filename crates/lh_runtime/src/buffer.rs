// crates/lh_runtime/src/buffer.rs

//! 设备缓冲区
//!
//! 提供上下文绑定的一维/二维设备缓冲区：
//!
//! - [`Buffer1D`]: 一维缓冲区
//! - [`Buffer2D`]: 二维缓冲区，存储顺序 `data[j + i * size_y]`（Y 方向连续）
//! - [`View1D`] / [`View2D`]: 可复制的轻量视图，供内核闭包按值捕获
//! - [`BufferMirror2D`]: 二维缓冲区的主机快照
//!
//! # 所有权
//!
//! 缓冲区只能移动不能复制，`Drop` 时恰好释放一次并归还上下文记账。
//! 缓冲区持有上下文句柄，因此上下文总是比其上的缓冲区活得久。
//!
//! # 越界
//!
//! 所有索引访问都做边界检查，越界直接 panic。

use std::mem::size_of;

use bytemuck::Zeroable;
use rayon::prelude::*;

use crate::context::{Context, ContextBound};
use crate::error::{RuntimeError, RuntimeResult};
use crate::scalar::DeviceScalar;

/// 在上下文上分配并零初始化 `len` 个单元
fn allocate_cells<T: DeviceScalar>(
    context: &Context,
    label: &'static str,
    len: usize,
) -> RuntimeResult<Box<[T::Cell]>> {
    let bytes = len.checked_mul(size_of::<T>()).ok_or_else(|| RuntimeError::Allocation {
        label,
        elements: len,
        bytes: usize::MAX,
        reason: "字节数溢出".into(),
    })?;
    context.reserve(label, len, bytes)?;

    let mut cells = Vec::new();
    if let Err(e) = cells.try_reserve_exact(len) {
        context.release(bytes);
        return Err(RuntimeError::Allocation { label, elements: len, bytes, reason: e.to_string() });
    }
    cells.extend((0..len).map(|_| T::new_cell(<T as Zeroable>::zeroed())));
    Ok(cells.into_boxed_slice())
}

// ============================================================
// Buffer1D
// ============================================================

/// 一维设备缓冲区
pub struct Buffer1D<T: DeviceScalar> {
    cells: Box<[T::Cell]>,
    context: Context,
}

impl<T: DeviceScalar> Buffer1D<T> {
    /// 分配长度为 `len` 的零初始化缓冲区
    pub fn new(context: &Context, len: usize) -> RuntimeResult<Self> {
        let cells = allocate_cells::<T>(context, "Buffer1D", len)?;
        Ok(Self { cells, context: context.clone() })
    }

    /// 从主机数据构造
    pub fn from_host(context: &Context, data: &[T]) -> RuntimeResult<Self> {
        let buffer = Self::new(context, data.len())?;
        buffer.copy_from_host(data)?;
        Ok(buffer)
    }

    /// 元素数量
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 字节数
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.cells.len() * size_of::<T>()
    }

    /// 所属上下文
    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// 读取元素
    #[inline]
    pub fn get(&self, i: usize) -> T {
        T::load(&self.cells[i])
    }

    /// 写入元素
    #[inline]
    pub fn set(&self, i: usize, value: T) {
        T::store(&self.cells[i], value);
    }

    /// 内核视图
    #[inline]
    pub fn view(&self) -> View1D<'_, T> {
        View1D { cells: &self.cells }
    }

    /// 用常数填充
    pub fn fill(&self, value: T) {
        let cells = &self.cells;
        self.context.install(|| cells.par_iter().for_each(|c| T::store(c, value)));
    }

    /// 阻塞复制整个缓冲区到主机
    pub fn mirrored(&self) -> Vec<T> {
        let cells = &self.cells;
        self.context.install(|| cells.par_iter().map(T::load).collect())
    }

    /// 复制前 `dst.len()` 个元素到主机
    pub fn copy_to_host(&self, dst: &mut [T]) -> RuntimeResult<()> {
        if dst.len() > self.len() {
            return Err(RuntimeError::SizeMismatch { expected: self.len(), actual: dst.len() });
        }
        let cells = &self.cells[..dst.len()];
        self.context.install(|| {
            dst.par_iter_mut().zip(cells.par_iter()).for_each(|(d, c)| *d = T::load(c));
        });
        Ok(())
    }

    /// 从主机复制到前 `src.len()` 个元素
    pub fn copy_from_host(&self, src: &[T]) -> RuntimeResult<()> {
        if src.len() > self.len() {
            return Err(RuntimeError::SizeMismatch { expected: self.len(), actual: src.len() });
        }
        let cells = &self.cells[..src.len()];
        self.context.install(|| {
            cells.par_iter().zip(src.par_iter()).for_each(|(c, s)| T::store(c, *s));
        });
        Ok(())
    }

    /// 独占访问时以连续主机切片形式借出
    ///
    /// 供直接访问设备内存的传输层使用（设备地址可被通信库直接寻址）。
    pub fn host_slice_mut(&mut self) -> &mut [T] {
        let len = self.cells.len();
        let ptr = self.cells.as_mut_ptr().cast::<T>();
        // SAFETY: DeviceScalar 是密封 trait，每个实现的 Cell 都是与 T 同大小、同对齐的原子整数，
        // 且原子类型与其底层整数内存表示相同；`&mut self` 保证此刻不存在任何视图或并发访问。
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }

    /// 显式释放
    pub fn free(self) {
        drop(self);
    }
}

impl<T: DeviceScalar> Drop for Buffer1D<T> {
    fn drop(&mut self) {
        self.context.release(self.size_bytes());
    }
}

impl<T: DeviceScalar> ContextBound for Buffer1D<T> {
    fn context_id(&self) -> u64 {
        self.context.id()
    }
}

impl<T: DeviceScalar> std::fmt::Debug for Buffer1D<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer1D")
            .field("type", &T::NAME)
            .field("len", &self.len())
            .field("context", &self.context.id())
            .finish()
    }
}

/// 一维内核视图
pub struct View1D<'a, T: DeviceScalar> {
    cells: &'a [T::Cell],
}

// 原子单元本身不可复制，视图只复制引用
impl<'a, T: DeviceScalar> Clone for View1D<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T: DeviceScalar> Copy for View1D<'a, T> {}

impl<'a, T: DeviceScalar> View1D<'a, T> {
    /// 元素数量
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 读取元素
    #[inline]
    pub fn get(&self, i: usize) -> T {
        T::load(&self.cells[i])
    }

    /// 写入元素
    #[inline]
    pub fn set(&self, i: usize, value: T) {
        T::store(&self.cells[i], value);
    }
}

// ============================================================
// Buffer2D
// ============================================================

/// 二维设备缓冲区，`(i, j)` 存储在 `j + i * size_y`
pub struct Buffer2D<T: DeviceScalar> {
    cells: Box<[T::Cell]>,
    size_x: usize,
    size_y: usize,
    context: Context,
}

impl<T: DeviceScalar> Buffer2D<T> {
    /// 分配 `size_x × size_y` 的零初始化缓冲区
    pub fn new(context: &Context, size_x: usize, size_y: usize) -> RuntimeResult<Self> {
        let len = size_x.checked_mul(size_y).ok_or_else(|| RuntimeError::Allocation {
            label: "Buffer2D",
            elements: usize::MAX,
            bytes: usize::MAX,
            reason: format!("尺寸溢出 {} × {}", size_x, size_y),
        })?;
        let cells = allocate_cells::<T>(context, "Buffer2D", len)?;
        Ok(Self { cells, size_x, size_y, context: context.clone() })
    }

    /// X 方向大小
    #[inline]
    pub fn size_x(&self) -> usize {
        self.size_x
    }

    /// Y 方向大小
    #[inline]
    pub fn size_y(&self) -> usize {
        self.size_y
    }

    /// 总元素数量
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 字节数
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.cells.len() * size_of::<T>()
    }

    /// 所属上下文
    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// 读取 `(i, j)`
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.view().get(i, j)
    }

    /// 写入 `(i, j)`
    #[inline]
    pub fn set(&self, i: usize, j: usize, value: T) {
        self.view().set(i, j, value);
    }

    /// 内核视图
    #[inline]
    pub fn view(&self) -> View2D<'_, T> {
        View2D { cells: &self.cells, size_x: self.size_x, size_y: self.size_y }
    }

    /// 用常数填充
    pub fn fill(&self, value: T) {
        let cells = &self.cells;
        self.context.install(|| cells.par_iter().for_each(|c| T::store(c, value)));
    }

    /// 阻塞复制为扁平主机数组
    pub fn mirrored(&self) -> Vec<T> {
        let cells = &self.cells;
        self.context.install(|| cells.par_iter().map(T::load).collect())
    }

    /// 阻塞复制为带二维索引的主机快照
    pub fn mirrored2(&self) -> BufferMirror2D<T> {
        BufferMirror2D { data: self.mirrored(), size_x: self.size_x, size_y: self.size_y }
    }

    /// 从扁平主机数组复制（长度必须相等）
    pub fn copy_from_host(&self, src: &[T]) -> RuntimeResult<()> {
        if src.len() != self.len() {
            return Err(RuntimeError::SizeMismatch { expected: self.len(), actual: src.len() });
        }
        let cells = &self.cells;
        self.context.install(|| {
            cells.par_iter().zip(src.par_iter()).for_each(|(c, s)| T::store(c, *s));
        });
        Ok(())
    }

    /// 显式释放
    pub fn free(self) {
        drop(self);
    }
}

impl<T: DeviceScalar> Drop for Buffer2D<T> {
    fn drop(&mut self) {
        self.context.release(self.size_bytes());
    }
}

impl<T: DeviceScalar> ContextBound for Buffer2D<T> {
    fn context_id(&self) -> u64 {
        self.context.id()
    }
}

impl<T: DeviceScalar> std::fmt::Debug for Buffer2D<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer2D")
            .field("type", &T::NAME)
            .field("size_x", &self.size_x)
            .field("size_y", &self.size_y)
            .field("context", &self.context.id())
            .finish()
    }
}

/// 二维内核视图
pub struct View2D<'a, T: DeviceScalar> {
    cells: &'a [T::Cell],
    size_x: usize,
    size_y: usize,
}

impl<'a, T: DeviceScalar> Clone for View2D<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T: DeviceScalar> Copy for View2D<'a, T> {}

impl<'a, T: DeviceScalar> View2D<'a, T> {
    /// X 方向大小
    #[inline]
    pub fn size_x(&self) -> usize {
        self.size_x
    }

    /// Y 方向大小
    #[inline]
    pub fn size_y(&self) -> usize {
        self.size_y
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.size_x && j < self.size_y,
            "View2D 越界: ({}, {}) 超出 {} × {}",
            i,
            j,
            self.size_x,
            self.size_y
        );
        j + i * self.size_y
    }

    /// 读取 `(i, j)`
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        T::load(&self.cells[self.offset(i, j)])
    }

    /// 写入 `(i, j)`
    #[inline]
    pub fn set(&self, i: usize, j: usize, value: T) {
        T::store(&self.cells[self.offset(i, j)], value);
    }
}

// ============================================================
// BufferMirror2D
// ============================================================

/// 二维缓冲区的主机快照
#[derive(Debug, Clone, PartialEq)]
pub struct BufferMirror2D<T> {
    data: Vec<T>,
    size_x: usize,
    size_y: usize,
}

impl<T: Copy> BufferMirror2D<T> {
    /// X 方向大小
    pub fn size_x(&self) -> usize {
        self.size_x
    }

    /// Y 方向大小
    pub fn size_y(&self) -> usize {
        self.size_y
    }

    /// 读取 `(i, j)`
    pub fn get(&self, i: usize, j: usize) -> T {
        assert!(i < self.size_x && j < self.size_y, "BufferMirror2D 越界: ({}, {})", i, j);
        self.data[j + i * self.size_y]
    }

    /// 扁平数据
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// 取出扁平数据
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Copy> std::ops::Index<(usize, usize)> for BufferMirror2D<T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        assert!(i < self.size_x && j < self.size_y, "BufferMirror2D 越界: ({}, {})", i, j);
        &self.data[j + i * self.size_y]
    }
}
