//! DWC3 (DesignWare USB3 DRD Controller) 核心驱动
//!
//! 负责控制器核心的识别、软复位、PHY 配置、事件/暂存缓冲区管理、
//! 双角色模式切换以及电源管理流程。Host/Device 协议栈本身不在此处实现，
//! 通过 [`RoleOp`] 等 trait 与外部协作者交互。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
extern crate log;

use core::ptr::NonNull;

pub mod dwc;
pub mod err;
pub mod osal;
pub mod registry;
pub mod types;

pub use dwc::{
    Dwc3, Dwc3NewParams,
    drd::DrdHandle,
    hwparams::{Dwc3Hwparams, HwMode},
    notify::{Dwc3Notifier, NotifyEvent},
    params::{Dwc3Params, PhyLookupStyle, PropValue, Property},
    phy::{GenericPhy, PhyLookup, PhyProvider, UsbPhy, UsbPhyType},
    pm::PmState,
    quirks::Dwc3Quirks,
    RoleOp, resolve_dr_mode,
};
pub use err::{Dwc3Error, PhyError, Result};
pub use osal::{Direction, DmaError, DmaHandle, KernelOp, MapHandle};
pub use registry::Dwc3Registry;
pub use types::*;

/// 控制器寄存器区域起始地址（xHCI 寄存器基址）
pub type Mmio = NonNull<u8>;
