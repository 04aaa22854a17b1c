//! DWC3 寄存器定义
//! 基于 Linux drivers/usb/dwc3/core.h，只保留核心初始化和模式切换用到的寄存器

use tock_registers::{
    register_bitfields, register_structs,
    registers::{ReadOnly, ReadWrite},
};

use super::consts::DWC3_GLOBALS_REGS_START;

register_structs! {
    /// DWC3 全局寄存器，偏移相对于 0xc100
    pub Dwc3Globals {
        (0x000 => _reserved0),
        (0x010 => pub gctl: ReadWrite<u32, GCTL::Register>),
        (0x014 => pub gevten: ReadWrite<u32>),
        (0x018 => pub gsts: ReadWrite<u32>),
        (0x01c => pub guctl1: ReadWrite<u32, GUCTL1::Register>),
        (0x020 => pub gsnpsid: ReadOnly<u32>),
        (0x024 => _reserved1),
        (0x028 => pub guid: ReadWrite<u32>),
        (0x02c => _reserved2),
        (0x040 => pub ghwparams: [ReadOnly<u32>; 8]),
        (0x060 => _reserved3),
        (0x0a0 => pub ver_number: ReadOnly<u32>),
        (0x0a4 => pub ver_type: ReadOnly<u32>),
        (0x0a8 => _reserved4),
        (0x100 => pub gusb2phycfg: [ReadWrite<u32, GUSB2PHYCFG::Register>; 2]),
        (0x108 => _reserved5),
        (0x1c0 => pub gusb3pipectl: [ReadWrite<u32, GUSB3PIPECTL::Register>; 2]),
        (0x1c8 => _reserved6),
        (0x300 => pub gevntadrlo: ReadWrite<u32>),
        (0x304 => pub gevntadrhi: ReadWrite<u32>),
        (0x308 => pub gevntsiz: ReadWrite<u32, GEVNTSIZ::Register>),
        (0x30c => pub gevntcount: ReadWrite<u32>),
        (0x310 => _reserved7),
        (0x500 => pub ghwparams8: ReadOnly<u32>),
        (0x504 => _reserved8),
        (0x508 => pub guctl2: ReadWrite<u32, GUCTL2::Register>),
        (0x50c => pub guctl3: ReadWrite<u32, GUCTL3::Register>),
        (0x510 => _reserved9),
        (0x530 => pub gfladj: ReadWrite<u32, GFLADJ::Register>),
        (0x534 => _reserved10),
        (0x600 => pub dcfg: ReadWrite<u32>),
        (0x604 => pub dctl: ReadWrite<u32, DCTL::Register>),
        (0x608 => pub devten: ReadWrite<u32>),
        (0x60c => pub dsts: ReadOnly<u32, DSTS::Register>),
        (0x610 => pub dgcmdpar: ReadWrite<u32>),
        (0x614 => pub dgcmd: ReadWrite<u32, DGCMD::Register>),
        (0x618 => @END),
    }
}

// =============================================================================
// 寄存器位字段定义
// =============================================================================

register_bitfields![u32,
    pub GCTL [
        /// 禁止时钟门控
        DSBLCLKGTNG OFFSET(0) NUMBITS(1) [],
        /// 全局休眠使能
        GBLHIBERNATIONEN OFFSET(1) NUMBITS(1) [],
        U2EXIT_LFPS OFFSET(2) NUMBITS(1) [],
        /// 禁止 scrambler，仅 FPGA 上允许
        DISSCRAMBLE OFFSET(3) NUMBITS(1) [],
        SCALEDOWN OFFSET(4) NUMBITS(2) [],
        SOFITPSYNC OFFSET(10) NUMBITS(1) [],
        CORESOFTRESET OFFSET(11) NUMBITS(1) [],
        /// 端口能力方向
        PRTCAPDIR OFFSET(12) NUMBITS(2) [
            Host = 1,
            Device = 2,
            Otg = 3
        ],
        U2RSTECN OFFSET(16) NUMBITS(1) []
    ],

    pub GUSB2PHYCFG [
        PHYIF OFFSET(3) NUMBITS(1) [],
        /// 0 = UTMI+, 1 = ULPI
        ULPI_UTMI OFFSET(4) NUMBITS(1) [],
        SUSPHY OFFSET(6) NUMBITS(1) [],
        USBTRDTIM OFFSET(10) NUMBITS(4) [],
        ENBLSLPM OFFSET(29) NUMBITS(1) [],
        U2_FREECLK_EXISTS OFFSET(30) NUMBITS(1) [],
        PHYSOFTRST OFFSET(31) NUMBITS(1) []
    ],

    pub GUSB3PIPECTL [
        TX_DEEPH OFFSET(1) NUMBITS(2) [],
        RX_DETOPOLL OFFSET(8) NUMBITS(1) [],
        LFPSFILT OFFSET(9) NUMBITS(1) [],
        P3EXSIGP2 OFFSET(10) NUMBITS(1) [],
        SUSPHY OFFSET(17) NUMBITS(1) [],
        DEPOCHANGE OFFSET(18) NUMBITS(1) [],
        /// 仅使用 bit19 作为使能
        DEP1P2P3 OFFSET(19) NUMBITS(3) [
            Enable = 1
        ],
        REQP1P2P3 OFFSET(24) NUMBITS(1) [],
        UX_EXIT_PX OFFSET(27) NUMBITS(1) [],
        DISRXDETINP3 OFFSET(28) NUMBITS(1) [],
        U2SSINP3OK OFFSET(29) NUMBITS(1) [],
        PHYSOFTRST OFFSET(31) NUMBITS(1) []
    ],

    pub GUCTL1 [
        PARKMODE_DISABLE_FSLS OFFSET(15) NUMBITS(1) [],
        PARKMODE_DISABLE_HS OFFSET(16) NUMBITS(1) [],
        PARKMODE_DISABLE_SS OFFSET(17) NUMBITS(1) [],
        IP_GAP_ADD_ON OFFSET(21) NUMBITS(2) [],
        DEV_L1_EXIT_BY_HW OFFSET(24) NUMBITS(1) [],
        TX_IPGAP_LINECHECK_DIS OFFSET(28) NUMBITS(1) []
    ],

    pub GUCTL2 [
        /// ENDXFER 轮询
        RST_ACTBITLATER OFFSET(14) NUMBITS(1) [],
        LC_TIMER OFFSET(19) NUMBITS(1) [],
        HP_TIMER OFFSET(21) NUMBITS(5) []
    ],

    pub GUCTL3 [
        USB20_RETRY_DISABLE OFFSET(16) NUMBITS(1) []
    ],

    pub GFLADJ [
        FLADJ_30MHZ OFFSET(0) NUMBITS(6) [],
        FLADJ_30MHZ_SDBND_SEL OFFSET(7) NUMBITS(1) []
    ],

    pub GEVNTSIZ [
        SIZE OFFSET(0) NUMBITS(16) [],
        INTMASK OFFSET(31) NUMBITS(1) []
    ],

    pub DCTL [
        /// 核心软复位，硬件完成后自动清零
        CSFTRST OFFSET(30) NUMBITS(1) []
    ],

    pub DSTS [
        DEVCTRLHLT OFFSET(22) NUMBITS(1) []
    ],

    pub DGCMD [
        CMD OFFSET(0) NUMBITS(8) [],
        CMDIOC OFFSET(8) NUMBITS(1) [],
        CMDACT OFFSET(10) NUMBITS(1) [],
        STATUS OFFSET(12) NUMBITS(4) []
    ]
];

/// DWC3 寄存器访问器
pub struct Dwc3Regs {
    base: usize,
}

unsafe impl Send for Dwc3Regs {}
unsafe impl Sync for Dwc3Regs {}

impl Dwc3Regs {
    /// 创建新的 DWC3 寄存器访问器
    ///
    /// # Safety
    ///
    /// 调用者必须确保 `base` 指向的控制器寄存器区域在访问器生命周期内有效
    pub unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// 获取全局寄存器
    pub fn globals(&self) -> &'static Dwc3Globals {
        let addr = self.base + DWC3_GLOBALS_REGS_START;
        unsafe { &*(addr as *const Dwc3Globals) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals_layout() {
        assert_eq!(core::mem::size_of::<Dwc3Globals>(), 0x618);
    }

    #[test]
    fn test_register_bitfields() {
        assert_eq!(GCTL::PRTCAPDIR::Otg.value, 3 << 12);
        assert_eq!(GCTL::SCALEDOWN.mask << GCTL::SCALEDOWN.shift, 0x30);
        assert_eq!(GUSB3PIPECTL::DEP1P2P3::Enable.value, 1 << 19);
        assert_eq!(GUSB3PIPECTL::TX_DEEPH.val(1).value, 1 << 1);
        assert_eq!(GUCTL2::HP_TIMER.val(11).value, 11 << 21);
        assert_eq!(GUCTL1::IP_GAP_ADD_ON.val(1).value, 1 << 21);
        assert_eq!(DCTL::CSFTRST::SET.value, 1 << 30);
        assert_eq!(DGCMD::CMDACT::SET.value, 1 << 10);
    }
}
