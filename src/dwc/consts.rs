/// DWC3 全局寄存器相对控制器基址的偏移
pub const DWC3_GLOBALS_REGS_START: usize = 0xc100;

pub const DWC3_SCRATCHBUF_SIZE: usize = 0x1000;

pub const DWC3_EVENT_BUFFERS_SIZE: usize = 4 * 64;
pub const DWC3_EVENT_BUFFER_MAX_SIZE: usize = 0xffff;

pub const DWC3_DEFAULT_AUTOSUSPEND_DELAY_MS: u64 = 500;

/// GUID 中写入的驱动版本号
pub const DWC3_DRIVER_VERSION_CODE: u32 = 0x0001_0000;

pub const DWC3_GSNPSID_MASK: u32 = 0xffff_0000;
pub const DWC3_GSNPSID_USB3: u32 = 0x5533_0000;
pub const DWC3_GSNPSID_USB31: u32 = 0x3331_0000;

pub const DWC3_REVISION_190A: u32 = 0x5533190a;
pub const DWC3_REVISION_194A: u32 = 0x5533194a;
pub const DWC3_REVISION_210A: u32 = 0x5533210a;
pub const DWC3_REVISION_250A: u32 = 0x5533250a;
pub const DWC3_REVISION_290A: u32 = 0x5533290a;
pub const DWC3_REVISION_300A: u32 = 0x5533300a;
pub const DWC3_REVISION_310A: u32 = 0x5533310a;
pub const DWC3_REVISION_320A: u32 = 0x5533320a;

pub const DWC3_REVISION_IS_DWC31: u32 = 0x8000_0000;
pub const DWC3_USB31_REVISION_120A: u32 = 0x3132302a | DWC3_REVISION_IS_DWC31;
pub const DWC3_USB31_REVISION_170A: u32 = 0x3137302a | DWC3_REVISION_IS_DWC31;

pub const DWC3_USB31_VER_TYPE_GA: u32 = 0x6131_0000;

pub const DWC3_DGCMD_SET_SCRATCHPAD_ADDR_LO: u32 = 0x04;
pub const DWC3_DGCMD_SET_SCRATCHPAD_ADDR_HI: u32 = 0x05;

/// 软复位轮询次数，每次间隔 1us
pub const DWC3_SOFT_RESET_RETRIES: u32 = 1000;
/// generic command 轮询次数，每次间隔 1us
pub const DWC3_GENERIC_CMD_TIMEOUT: u32 = 500;
/// DWC_usb31 软复位完成后访问 PHY 前的同步延时
pub const DWC31_SOFT_RESET_SETTLE_MS: u64 = 50;
/// probe 时因复位超时而重新初始化的总尝试次数
pub const DWC3_PROBE_INIT_ATTEMPTS: usize = 3;

pub const UTMI_PHYIF_8_BIT: u32 = 0;
pub const UTMI_PHYIF_16_BIT: u32 = 1;
pub const USBTRDTIM_UTMI_8_BIT: u32 = 9;
pub const USBTRDTIM_UTMI_16_BIT: u32 = 5;

pub const fn genmask(h: u32, l: u32) -> u32 {
    (!0u32 >> (31 - h)) & (!0u32 << l)
}

pub const fn lower_32_bits(v: u64) -> u32 {
    v as u32
}

pub const fn upper_32_bits(v: u64) -> u32 {
    (v >> 32) as u32
}
