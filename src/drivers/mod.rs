// src/drivers/mod.rs
// 数据源、解码与导出
pub mod decoder;
pub mod error;
pub mod plot;
pub mod source;
// 公开导出
pub use decoder::{Frame, FrameDecoder};
pub use error::{DecodeError, RasterError};
pub use plot::{render_raster_png, PlotStyle};
pub use source::{
    fill_frame, is_idle, ByteSource, Endpoint, ManualSource, SimulatedSource,
    CONNECT_RETRY_DELAY, DEFAULT_SERIAL_BAUD,
};
