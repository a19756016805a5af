use crate::drivers::DecodeError;
use crate::types::{IntWidth, WireFormat};
/// One decoded sample period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// One count per source channel.
    Rates(Vec<u32>),
    /// Index of the single source channel that fired.
    Fired(usize),
}
/// Turns fixed-size byte frames into [`Frame`]s. The wire format is chosen
/// once at configuration time.
#[derive(Clone, Copy, Debug)]
pub struct FrameDecoder {
    format: WireFormat,
    width: IntWidth,
    source_channels: usize,
}
impl FrameDecoder {
    pub fn new(format: WireFormat, width: IntWidth, source_channels: usize) -> Self {
        Self {
            format,
            width,
            source_channels,
        }
    }
    pub fn format(&self) -> WireFormat {
        self.format
    }
    pub fn source_channels(&self) -> usize {
        self.source_channels
    }
    /// Exact byte length of one frame.
    pub fn frame_len(&self) -> usize {
        match self.format {
            WireFormat::RateCount => self.source_channels * self.width.bytes(),
            WireFormat::OneHot => self.width.bytes(),
        }
    }
    pub fn decode(&self, raw: &[u8]) -> Result<Frame, DecodeError> {
        let expected = self.frame_len();
        if raw.len() != expected || expected == 0 {
            return Err(DecodeError::Length {
                expected,
                actual: raw.len(),
            });
        }
        match self.format {
            WireFormat::RateCount => Ok(Frame::Rates(
                raw.chunks_exact(self.width.bytes())
                    .map(|chunk| self.width.read(chunk))
                    .collect(),
            )),
            WireFormat::OneHot => {
                let index = self.width.read(raw) as usize;
                if index >= self.source_channels {
                    return Err(DecodeError::ChannelOutOfRange {
                        index,
                        channels: self.source_channels,
                    });
                }
                Ok(Frame::Fired(index))
            }
        }
    }
    /// Inverse of [`decode`](Self::decode); used by the simulated source and tests.
    pub fn encode(&self, frame: &Frame) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.frame_len());
        match frame {
            Frame::Rates(counts) => {
                for &count in counts {
                    self.width.write(count, &mut out);
                }
            }
            Frame::Fired(index) => self.width.write(*index as u32, &mut out),
        }
        out
    }
}
