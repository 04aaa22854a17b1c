//! 事件缓冲区
//!
//! 硬件通过 DMA 一致性内存中的环形缓冲区上报异步事件。主机模式的
//! 硬件不需要事件缓冲区。

use alloc::vec::Vec;
use core::alloc::Layout;

use mbarrier::mb;
use tock_registers::interfaces::{Readable, Writeable};

use super::{
    Dwc3,
    consts::{DWC3_EVENT_BUFFER_MAX_SIZE, lower_32_bits, upper_32_bits},
    hwparams::HwMode,
    notify::NotifyEvent,
    reg::{DSTS, GEVNTSIZ},
};
use crate::{
    err::{Dwc3Error, Result},
    osal::{DmaError, DmaHandle, KernelOp},
};

pub struct EventBuffer {
    handle: DmaHandle,
    /// 中断上下文拷贝事件时使用的镜像
    cache: Vec<u8>,
    length: usize,
    lpos: usize,
    kernel: &'static dyn KernelOp,
}

impl EventBuffer {
    pub fn new(length: usize, kernel: &'static dyn KernelOp) -> Result<Self> {
        let mut cache = Vec::new();
        cache
            .try_reserve_exact(length)
            .map_err(|_| Dwc3Error::NoMemory)?;
        cache.resize(length, 0);

        let layout =
            Layout::from_size_align(length, kernel.page_size()).map_err(|_| DmaError::LayoutError)?;
        let handle = unsafe { kernel.alloc_coherent(layout) }.ok_or(Dwc3Error::NoMemory)?;
        unsafe { core::ptr::write_bytes(handle.cpu_addr.as_ptr(), 0, length) };

        Ok(Self {
            handle,
            cache,
            length,
            lpos: 0,
            kernel,
        })
    }

    pub fn dma_addr(&self) -> u64 {
        self.handle.dma_addr
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn lpos(&self) -> usize {
        self.lpos
    }

    pub fn cache(&self) -> &[u8] {
        &self.cache
    }
}

impl Drop for EventBuffer {
    fn drop(&mut self) {
        unsafe { self.kernel.dealloc_coherent(self.handle) };
    }
}

/// GEVNTSIZ.SIZE 只有 16 位，长度以 4 字节事件为单位
fn check_event_buffer_length(length: usize) -> Result {
    if length == 0 || length > DWC3_EVENT_BUFFER_MAX_SIZE || length % 4 != 0 {
        error!("DWC3: invalid event buffer length {:#x}", length);
        return Err(Dwc3Error::Configuration("Invalid event buffer length."));
    }
    Ok(())
}

impl Dwc3 {
    /// 分配事件缓冲区，主机模式硬件上不分配
    pub fn alloc_event_buffer(&mut self, length: usize) -> Result {
        if self.hwparams.mode() == HwMode::Host {
            self.event_buffer = None;
            return Ok(());
        }
        check_event_buffer_length(length)?;

        let evt = EventBuffer::new(length, self.kernel).inspect_err(|e| {
            error!("DWC3: can't allocate event buffer: {:?}", e);
        })?;
        debug!(
            "DWC3: event buffer {} bytes at {:#x}",
            evt.length(),
            evt.dma_addr()
        );
        self.event_buffer = Some(evt);

        self.notify(NotifyEvent::GsiEvtBufAlloc, 0);
        Ok(())
    }

    /// 把事件缓冲区地址和大小写入硬件，并清零读指针与事件计数
    pub fn program_event_buffer(&mut self) {
        let Some(evt) = self.event_buffer.as_mut() else {
            return;
        };
        let g = self.regs.globals();

        evt.lpos = 0;
        g.gevntadrlo.set(lower_32_bits(evt.dma_addr()));
        g.gevntadrhi.set(upper_32_bits(evt.dma_addr()));
        g.gevntsiz.write(GEVNTSIZ::SIZE.val(evt.length() as u32));
        g.gevntcount.set(0);
        mb();

        self.notify(NotifyEvent::GsiEvtBufSetup, 0);
    }

    /// 控制器已停止时才清除事件缓冲区配置，否则不碰寄存器
    pub fn cleanup_event_buffer(&mut self) {
        let Some(evt) = self.event_buffer.as_mut() else {
            return;
        };
        let g = self.regs.globals();

        if !g.dsts.is_set(DSTS::DEVCTRLHLT) {
            debug!("DWC3: controller not halted, keep event buffer");
            return;
        }

        evt.lpos = 0;
        g.gevntadrlo.set(0);
        g.gevntadrhi.set(0);
        g.gevntsiz
            .write(GEVNTSIZ::INTMASK::SET + GEVNTSIZ::SIZE.val(0));
        g.gevntcount.set(0);
        mb();

        self.notify(NotifyEvent::GsiEvtBufCleanup, 0);
    }

    pub fn free_event_buffer(&mut self) {
        if self.event_buffer.take().is_some() {
            self.notify(NotifyEvent::GsiEvtBufFree, 0);
        }
    }

    pub fn event_buffer(&self) -> Option<&EventBuffer> {
        self.event_buffer.as_ref()
    }
}
