// src/types.rs
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Neuron alias as it appears in the network description.
pub type ChannelId = u32;

// 帧格式
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// One count per source channel, in channel-index order.
    #[default]
    RateCount,
    /// Legacy format: each frame names the single channel that fired.
    OneHot,
}

// 每个整数的字节宽度 (小端)
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntWidth {
    #[default]
    U8,
    U16Le,
    U32Le,
}

impl IntWidth {
    pub fn bytes(self) -> usize {
        match self {
            IntWidth::U8 => 1,
            IntWidth::U16Le => 2,
            IntWidth::U32Le => 4,
        }
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(IntWidth::U8),
            2 => Some(IntWidth::U16Le),
            4 => Some(IntWidth::U32Le),
            _ => None,
        }
    }

    /// Reads one integer from the front of `raw`, which must hold exactly `bytes()`.
    pub fn read(self, raw: &[u8]) -> u32 {
        match self {
            IntWidth::U8 => raw[0] as u32,
            IntWidth::U16Le => u16::from_le_bytes([raw[0], raw[1]]) as u32,
            IntWidth::U32Le => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        }
    }

    /// Appends `value` in this width, saturating at the width's maximum.
    pub fn write(self, value: u32, out: &mut Vec<u8>) {
        match self {
            IntWidth::U8 => out.push(value.min(u8::MAX as u32) as u8),
            IntWidth::U16Le => out.extend_from_slice(&(value.min(u16::MAX as u32) as u16).to_le_bytes()),
            IntWidth::U32Le => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

// 连接状态: Waiting -> Connected -> Disconnected, 单向
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum LinkStatus {
    Waiting,
    Connected,
    Disconnected,
}

impl LinkStatus {
    pub fn label(self) -> &'static str {
        match self {
            LinkStatus::Waiting => "waiting for source",
            LinkStatus::Connected => "connected",
            LinkStatus::Disconnected => "disconnected",
        }
    }
}

// 后台接收线程发给界面的消息
#[derive(Clone, Debug, PartialEq)]
pub enum LinkEvent {
    Waiting(String),
    Connected(String),
    Disconnected(String),
    Stopped,
}

/// Shared shutdown flag, polled by the receiver loop and by the tick driver.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What the display needs to draw one channel strip for the current tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelRender {
    pub id: ChannelId,
    pub rate: u32,
    /// Count text for the legend, `None` when the legend is disabled.
    pub legend: Option<String>,
    /// Rate exceeds the tick resolution; draw a continuous bar instead of marks.
    pub saturated: bool,
    /// Spike positions in `[0, W)`, oldest (leftmost) first.
    pub spikes: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderFrame {
    pub tick: u64,
    pub status: LinkStatus,
    pub window_width: u32,
    /// Caption for the time axis, e.g. "1 sec".
    pub span_label: String,
    pub channels: Vec<ChannelRender>,
}
