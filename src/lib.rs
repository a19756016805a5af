//! Live spike-raster engine: a blocking receiver publishes per-channel counts
//! from a byte stream, and a render-driven tick turns them into scrolling
//! synthetic spike marks.
pub mod config;
pub mod drivers;
pub mod engine;
pub mod gui;
pub mod network;
pub mod receiver;
pub mod scheduler;
pub mod state;
pub mod types;
pub mod window;
pub use config::RasterConfig;
pub use drivers::{ByteSource, DecodeError, Endpoint, Frame, FrameDecoder, RasterError};
pub use engine::SpikeEngine;
pub use types::{ChannelRender, LinkEvent, LinkStatus, RenderFrame, WireFormat};
