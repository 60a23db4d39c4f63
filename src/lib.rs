pub mod builder;
mod common;

pub use builder::{Module, QRBuilder, TraceFn, TracePhase, QR};
pub use common::codec::Mode;
pub use common::error::{QRError, QRResult};
pub use common::mask::MaskPattern;
pub use common::metadata::{Color, ECLevel, Version};
