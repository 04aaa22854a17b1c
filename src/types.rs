use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 配置的双角色模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrMode {
    #[default]
    Unknown,
    Host,
    Peripheral,
    Otg,
}

/// USB 速度，按能力从低到高排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DeviceSpeed {
    #[default]
    Unknown = 0,
    Low,
    Full,
    High,
    Wireless,
    SuperSpeed,
    SuperSpeedPlus,
}

/// HS PHY 总线模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UsbPhyInterfaceMode {
    #[default]
    Unknown,
    /// 8-bit UTMI+
    Utmi,
    /// 16-bit UTMI+
    UtmiWide,
    Ulpi,
    Serial,
    Hsic,
}

/// UTMI+ULPI 双接口硬件上选择使用哪一个
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsphyInterface {
    Utmi,
    Ulpi,
}

/// GCTL.PRTCAPDIR 中锁存的端口角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum PrtCap {
    Host = 1,
    Device = 2,
    Otg = 3,
}

/// 构建时启用的角色支持
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    HostOnly,
    GadgetOnly,
    #[default]
    DualRole,
}

impl DrMode {
    /// 模式切换时对应的 PRTCAPDIR 值
    pub fn prtcap(self) -> Option<PrtCap> {
        match self {
            DrMode::Host => Some(PrtCap::Host),
            DrMode::Peripheral => Some(PrtCap::Device),
            DrMode::Otg => Some(PrtCap::Otg),
            DrMode::Unknown => None,
        }
    }

    /// 是否包含 gadget 侧
    pub fn has_gadget(self) -> bool {
        matches!(self, DrMode::Peripheral | DrMode::Otg)
    }
}
