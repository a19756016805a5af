// src/receiver.rs
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::drivers::{is_idle, ByteSource, FrameDecoder};
use crate::state::RateState;
use crate::types::{LinkEvent, ShutdownSignal};

/// Poll interval once the stream is gone and only shutdown is left to watch.
const DISCONNECTED_POLL: Duration = Duration::from_millis(50);

/// Blocking read loop feeding [`RateState`]. Owns the byte source.
pub struct Receiver {
    source: Box<dyn ByteSource>,
    decoder: FrameDecoder,
    state: Arc<RateState>,
    shutdown: ShutdownSignal,
    events: Sender<LinkEvent>,
    buf: Vec<u8>,
}

impl Receiver {
    pub fn new(
        source: Box<dyn ByteSource>,
        decoder: FrameDecoder,
        state: Arc<RateState>,
        shutdown: ShutdownSignal,
        events: Sender<LinkEvent>,
    ) -> Self {
        let buf = vec![0u8; decoder.frame_len()];
        Self {
            source,
            decoder,
            state,
            shutdown,
            events,
            buf,
        }
    }

    /// Runs until shutdown. After the stream fails the loop keeps polling the
    /// shutdown signal but never touches the state again.
    pub fn run(mut self) {
        if self.state.mark_connected() {
            let peer = self.source.describe();
            info!("Streaming from {peer}");
            self.events.send(LinkEvent::Connected(peer)).ok();
        }
        let mut streaming = true;
        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            if !streaming {
                thread::sleep(DISCONNECTED_POLL);
                continue;
            }
            if let Err(reason) = self.read_once() {
                warn!("Stream ended: {reason}");
                if self.state.mark_disconnected() {
                    self.events.send(LinkEvent::Disconnected(reason)).ok();
                }
                streaming = false;
            }
        }
        debug!(
            "receiver loop exited after {} frames",
            self.state.frames_received()
        );
        self.events.send(LinkEvent::Stopped).ok();
    }

    /// One blocking read. `Err` carries the reason the stream is considered lost.
    fn read_once(&mut self) -> Result<(), String> {
        match self.source.read_frame(&mut self.buf, &self.shutdown) {
            Ok(0) => Err("source closed the stream".to_owned()),
            Ok(n) => {
                let frame = self
                    .decoder
                    .decode(&self.buf[..n])
                    .map_err(|e| e.to_string())?;
                self.state.publish(frame);
                Ok(())
            }
            // 读超时: 还没有数据, 回到循环顶部检查关闭信号
            Err(e) if is_idle(&e) => Ok(()),
            Err(e) => Err(format!("read failed: {e}")),
        }
    }
}
