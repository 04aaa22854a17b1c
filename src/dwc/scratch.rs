//! 休眠暂存缓冲区
//!
//! 仅在硬件支持休眠且 GHWPARAMS4 报告的暂存缓冲区个数非零时使用。
//! 内存是普通的主机内存，初始化时双向映射给硬件。

use alloc::vec::Vec;
use core::ptr::NonNull;

use super::{
    Dwc3,
    consts::{
        DWC3_DGCMD_SET_SCRATCHPAD_ADDR_HI, DWC3_DGCMD_SET_SCRATCHPAD_ADDR_LO,
        DWC3_SCRATCHBUF_SIZE, lower_32_bits, upper_32_bits,
    },
};
use crate::{
    err::{Dwc3Error, Result},
    osal::{Direction, KernelOp, MapHandle},
};

pub struct ScratchBuffer {
    buf: Vec<u8>,
    map: Option<MapHandle>,
    kernel: &'static dyn KernelOp,
}

impl ScratchBuffer {
    pub fn new(nr_scratch: u32, kernel: &'static dyn KernelOp) -> Result<Self> {
        let size = nr_scratch as usize * DWC3_SCRATCHBUF_SIZE;
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| Dwc3Error::NoMemory)?;
        buf.resize(size, 0);
        Ok(Self {
            buf,
            map: None,
            kernel,
        })
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn dma_addr(&self) -> Option<u64> {
        self.map.map(|m| m.dma_addr)
    }

    pub fn is_mapped(&self) -> bool {
        self.map.is_some()
    }

    fn map(&mut self) -> Result<u64> {
        if let Some(map) = self.map {
            return Ok(map.dma_addr);
        }
        let addr = NonNull::new(self.buf.as_mut_ptr()).ok_or(Dwc3Error::NoMemory)?;
        let map = unsafe {
            self.kernel
                .map_single(addr, self.buf.len(), Direction::Bidirectional)
        }
        .map_err(|_| Dwc3Error::DmaMapping)?;
        self.map = Some(map);
        Ok(map.dma_addr)
    }

    fn unmap(&mut self) {
        if let Some(map) = self.map.take() {
            unsafe { self.kernel.unmap_single(map) };
        }
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        self.unmap();
    }
}

impl Dwc3 {
    fn scratch_supported(&self) -> bool {
        self.has_hibernation && self.nr_scratch > 0
    }

    pub(crate) fn alloc_scratch_buffers(&mut self) -> Result {
        if !self.scratch_supported() || self.scratch.is_some() {
            return Ok(());
        }
        self.scratch = Some(ScratchBuffer::new(self.nr_scratch, self.kernel)?);
        Ok(())
    }

    /// 映射暂存缓冲区并把地址通过 generic command 告诉硬件
    ///
    /// 任一命令失败都会解除映射，缓冲区由调用者释放。
    pub(crate) fn setup_scratch_buffers(&mut self) -> Result {
        if !self.scratch_supported() {
            return Ok(());
        }
        let Some(scratch) = self.scratch.as_mut() else {
            warn!("DWC3: scratch buffer missing, should never happen");
            return Ok(());
        };

        let addr = scratch.map().inspect_err(|_| {
            error!("DWC3: failed to map scratch buffer");
        })?;

        let ret = self
            .send_generic_command(DWC3_DGCMD_SET_SCRATCHPAD_ADDR_LO, lower_32_bits(addr))
            .and_then(|_| {
                self.send_generic_command(DWC3_DGCMD_SET_SCRATCHPAD_ADDR_HI, upper_32_bits(addr))
            });

        if ret.is_err() {
            self.unmap_scratch_buffers();
        }
        ret
    }

    pub(crate) fn unmap_scratch_buffers(&mut self) {
        if let Some(scratch) = self.scratch.as_mut() {
            scratch.unmap();
        }
    }

    pub(crate) fn free_scratch_buffers(&mut self) {
        if !self.scratch_supported() {
            return;
        }
        match self.scratch.take() {
            Some(scratch) => drop(scratch),
            None => warn!("DWC3: scratch buffer already freed, should never happen"),
        }
    }

    pub fn scratch_buffer(&self) -> Option<&ScratchBuffer> {
        self.scratch.as_ref()
    }
}
