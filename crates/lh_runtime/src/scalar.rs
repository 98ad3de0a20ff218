// crates/lh_runtime/src/scalar.rs

//! DeviceScalar - 密封的设备元素类型
//!
//! 设备缓冲区按元素存储为原子单元，多个工作项可以在同一次分发中并发读写
//! 同一缓冲区的不同位置，语义与统一共享内存的设备指针一致。
//!
//! 浮点类型通过 `to_bits`/`from_bits` 映射到同宽整数原子，
//! 读写均使用 `Relaxed` 次序；跨分发的可见性由队列同步点保证。
//!
//! # 表示约定
//!
//! 每个实现的 `Cell` 与元素类型具有相同的大小和对齐，
//! 因此在独占访问时缓冲区可以被视为连续的 `[T]`（见 `Buffer1D::host_slice_mut`）。

use std::fmt::Debug;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use bytemuck::Pod;

/// 密封模块，禁止外部实现
mod private {
    /// 密封 trait
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
    impl Sealed for usize {}
}

/// 设备缓冲区元素类型（密封）
///
/// 只有固定宽度的数值类型可以实现，保证 `Cell` 与 `Self` 内存布局相同。
pub trait DeviceScalar:
    private::Sealed + Pod + Default + Debug + PartialEq + Send + Sync + 'static
{
    /// 存储单元类型
    type Cell: Send + Sync + Debug;

    /// 类型名称（用于日志与错误信息）
    const NAME: &'static str;

    /// 构造存储单元
    fn new_cell(value: Self) -> Self::Cell;

    /// 读取单元
    fn load(cell: &Self::Cell) -> Self;

    /// 写入单元
    fn store(cell: &Self::Cell, value: Self);
}

macro_rules! impl_float_scalar {
    ($ty:ty, $atomic:ty) => {
        impl DeviceScalar for $ty {
            type Cell = $atomic;
            const NAME: &'static str = stringify!($ty);

            #[inline]
            fn new_cell(value: Self) -> Self::Cell {
                <$atomic>::new(value.to_bits())
            }

            #[inline]
            fn load(cell: &Self::Cell) -> Self {
                <$ty>::from_bits(cell.load(Ordering::Relaxed))
            }

            #[inline]
            fn store(cell: &Self::Cell, value: Self) {
                cell.store(value.to_bits(), Ordering::Relaxed);
            }
        }
    };
}

macro_rules! impl_int_scalar {
    ($ty:ty, $atomic:ty) => {
        impl DeviceScalar for $ty {
            type Cell = $atomic;
            const NAME: &'static str = stringify!($ty);

            #[inline]
            fn new_cell(value: Self) -> Self::Cell {
                <$atomic>::new(value)
            }

            #[inline]
            fn load(cell: &Self::Cell) -> Self {
                cell.load(Ordering::Relaxed)
            }

            #[inline]
            fn store(cell: &Self::Cell, value: Self) {
                cell.store(value, Ordering::Relaxed);
            }
        }
    };
}

impl_float_scalar!(f32, AtomicU32);
impl_float_scalar!(f64, AtomicU64);
impl_int_scalar!(i32, AtomicI32);
impl_int_scalar!(i64, AtomicI64);
impl_int_scalar!(u32, AtomicU32);
impl_int_scalar!(u64, AtomicU64);
impl_int_scalar!(usize, AtomicUsize);
