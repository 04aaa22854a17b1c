//! 操作系统抽象层
//!
//! 控制器核心只依赖这里的接口：延时以及 DMA 内存的分配和映射。
//! 具体实现由平台提供。

use core::{alloc::Layout, ptr::NonNull, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToDevice,
    FromDevice,
    Bidirectional,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaError {
    #[error("no memory")]
    NoMemory,
    #[error("layout error")]
    LayoutError,
    #[error("dma mapping failed")]
    MappingFailed,
}

/// 一致性 DMA 内存
#[derive(Debug, Clone, Copy)]
pub struct DmaHandle {
    pub cpu_addr: NonNull<u8>,
    pub dma_addr: u64,
    pub layout: Layout,
}

/// 流式 DMA 映射
#[derive(Debug, Clone, Copy)]
pub struct MapHandle {
    pub cpu_addr: NonNull<u8>,
    pub dma_addr: u64,
    pub size: usize,
    pub direction: Direction,
}

unsafe impl Send for DmaHandle {}
unsafe impl Send for MapHandle {}

pub trait KernelOp: Send + Sync + 'static {
    fn delay(&self, duration: Duration);

    fn page_size(&self) -> usize {
        0x1000
    }

    /// 分配一致性 DMA 内存，内存不足时返回 `None`
    ///
    /// # Safety
    ///
    /// 返回的内存必须通过 [`KernelOp::dealloc_coherent`] 释放
    unsafe fn alloc_coherent(&self, layout: Layout) -> Option<DmaHandle>;

    /// # Safety
    ///
    /// `handle` 必须来自同一个 `KernelOp` 的 `alloc_coherent`，且只能释放一次
    unsafe fn dealloc_coherent(&self, handle: DmaHandle);

    /// 将一段 CPU 内存映射给设备
    ///
    /// # Safety
    ///
    /// 映射期间 `addr..addr+size` 必须保持有效
    unsafe fn map_single(
        &self,
        addr: NonNull<u8>,
        size: usize,
        direction: Direction,
    ) -> Result<MapHandle, DmaError>;

    /// # Safety
    ///
    /// `handle` 必须来自 `map_single`，且只能解除一次
    unsafe fn unmap_single(&self, handle: MapHandle);
}

pub(crate) fn delay_us(kernel: &dyn KernelOp, us: u64) {
    kernel.delay(Duration::from_micros(us));
}

pub(crate) fn delay_ms(kernel: &dyn KernelOp, ms: u64) {
    kernel.delay(Duration::from_millis(ms));
}
