use crate::osal::DmaError;

pub type Result<T = ()> = core::result::Result<T, Dwc3Error>;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dwc3Error {
    /// GSNPSID 不是 DWC_usb3 / DWC_usb31 的签名
    #[error("not a DesignWare USB3 DRD core (GSNPSID {snpsid:#010x})")]
    UnrecognizedHardware { snpsid: u32 },
    #[error("configuration error: {0}")]
    Configuration(&'static str),
    /// 依赖尚未就绪，调用者需要稍后重新执行完整的初始化
    #[error("dependency not ready, retry later")]
    DeferredRetry,
    #[error("core soft reset timeout")]
    ResetTimeout,
    #[error("timeout")]
    Timeout,
    #[error("no memory")]
    NoMemory,
    #[error("failed to map dma buffer")]
    DmaMapping,
    #[error("busy")]
    Busy,
    #[error("phy: {0}")]
    Phy(#[from] PhyError),
    #[error("generic command {cmd:#04x} failed with status {status}")]
    Command { cmd: u32, status: u32 },
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyError {
    /// USB3 PHY 返回该错误时降级到 High-Speed 继续
    #[error("phy busy")]
    Busy,
    #[error("phy timeout")]
    Timeout,
    #[error("operation not supported by phy")]
    NotSupported,
    #[error("phy io error")]
    Io,
}

impl From<DmaError> for Dwc3Error {
    fn from(value: DmaError) -> Self {
        match value {
            DmaError::NoMemory => Self::NoMemory,
            DmaError::LayoutError => Self::NoMemory,
            DmaError::MappingFailed => Self::DmaMapping,
        }
    }
}
