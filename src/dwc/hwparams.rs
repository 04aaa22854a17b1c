//! GHWPARAMS0..8 缓存和字段解码

use num_enum::TryFromPrimitive;
use tock_registers::interfaces::Readable;

use super::reg::Dwc3Regs;

/// GHWPARAMS0.MODE
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum HwMode {
    Gadget = 0,
    Host = 1,
    Drd = 2,
}

/// GHWPARAMS1.EN_PWROPT
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum PowerOpt {
    None = 0,
    Clock = 1,
    Hibernation = 2,
}

/// GHWPARAMS3.SSPHY_IFC
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum SsphyIfc {
    Disabled = 0,
    Gen1 = 1,
    Gen2 = 2,
}

/// GHWPARAMS3.HSPHY_IFC
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum HsphyIfc {
    Disabled = 0,
    Utmi = 1,
    Ulpi = 2,
    UtmiUlpi = 3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dwc3Hwparams {
    pub hwparams0: u32,
    pub hwparams1: u32,
    pub hwparams2: u32,
    pub hwparams3: u32,
    pub hwparams4: u32,
    pub hwparams5: u32,
    pub hwparams6: u32,
    pub hwparams7: u32,
    pub hwparams8: u32,
}

impl Dwc3Hwparams {
    pub fn read(regs: &Dwc3Regs) -> Self {
        let g = regs.globals();
        Self {
            hwparams0: g.ghwparams[0].get(),
            hwparams1: g.ghwparams[1].get(),
            hwparams2: g.ghwparams[2].get(),
            hwparams3: g.ghwparams[3].get(),
            hwparams4: g.ghwparams[4].get(),
            hwparams5: g.ghwparams[5].get(),
            hwparams6: g.ghwparams[6].get(),
            hwparams7: g.ghwparams[7].get(),
            hwparams8: g.ghwparams8.get(),
        }
    }

    /// 未定义的编码按双角色处理
    pub fn mode(&self) -> HwMode {
        HwMode::try_from(self.hwparams0 & 0x3).unwrap_or(HwMode::Drd)
    }

    pub fn power_opt(&self) -> PowerOpt {
        PowerOpt::try_from((self.hwparams1 >> 24) & 0x3).unwrap_or(PowerOpt::None)
    }

    pub fn num_event_buffers(&self) -> usize {
        ((self.hwparams1 >> 15) & 0x3f) as usize
    }

    pub fn ssphy_ifc(&self) -> SsphyIfc {
        SsphyIfc::try_from(self.hwparams3 & 0x3).unwrap_or(SsphyIfc::Gen1)
    }

    pub fn hsphy_ifc(&self) -> HsphyIfc {
        // 两位字段，四种取值都有定义
        HsphyIfc::try_from((self.hwparams3 >> 2) & 0x3).unwrap_or(HsphyIfc::Disabled)
    }

    pub fn num_eps(&self) -> u8 {
        ((self.hwparams3 >> 12) & 0x3f) as u8
    }

    pub fn num_in_eps(&self) -> u8 {
        ((self.hwparams3 >> 18) & 0x1f) as u8
    }

    /// 休眠所需的暂存缓冲区个数
    pub fn hiber_scratchbufs(&self) -> u32 {
        (self.hwparams4 >> 13) & 0xf
    }

    pub fn is_fpga(&self) -> bool {
        self.hwparams6 & (1 << 7) != 0
    }
}
