// src/engine.rs
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};

use crate::config::RasterConfig;
use crate::drivers::{ByteSource, Endpoint, FrameDecoder, RasterError};
use crate::receiver::Receiver;
use crate::scheduler::{Channel, RateScheduler};
use crate::state::RateState;
use crate::types::{ChannelId, ChannelRender, LinkEvent, LinkStatus, RenderFrame, ShutdownSignal};

/// Ingestion and scheduling core: one receiver thread feeding shared rates,
/// and a tick that turns those rates into scrolling spike marks.
pub struct SpikeEngine {
    config: RasterConfig,
    decoder: FrameDecoder,
    channels: Vec<Channel>,
    state: Arc<RateState>,
    scheduler: RateScheduler,
    shutdown: ShutdownSignal,
    worker: Option<JoinHandle<()>>,
    events_tx: Sender<LinkEvent>,
    events_rx: mpsc::Receiver<LinkEvent>,
}

impl SpikeEngine {
    /// `aliases` is the full, ordered list of channels the source reports;
    /// `selection` the subset to display, in display order.
    pub fn configure(
        aliases: &[ChannelId],
        selection: &[ChannelId],
        config: RasterConfig,
    ) -> Result<Self, RasterError> {
        config.validate()?;
        if selection.is_empty() {
            return Err(RasterError::NoChannels);
        }
        let channels = selection
            .iter()
            .map(|&id| {
                aliases
                    .iter()
                    .position(|&alias| alias == id)
                    .map(|index| Channel::new(id, index, config.window_width))
                    .ok_or(RasterError::UnknownChannel(id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let decoder = FrameDecoder::new(config.wire_format, config.int_width, aliases.len());
        let (events_tx, events_rx) = mpsc::channel();
        info!(
            "Configured {} of {} channels, frame {} bytes, {:?}",
            channels.len(),
            aliases.len(),
            decoder.frame_len(),
            config.wire_format
        );
        Ok(Self {
            scheduler: RateScheduler::new(&config),
            state: Arc::new(RateState::new(aliases.len())),
            config,
            decoder,
            channels,
            shutdown: ShutdownSignal::new(),
            worker: None,
            events_tx,
            events_rx,
        })
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    pub fn decoder(&self) -> FrameDecoder {
        self.decoder
    }

    pub fn status(&self) -> LinkStatus {
        self.state.status()
    }

    /// Starts the receiver on an already-open source.
    pub fn start(&mut self, source: Box<dyn ByteSource>) -> Result<(), RasterError> {
        if self.worker.is_some() {
            return Err(RasterError::AlreadyStarted);
        }
        let receiver = Receiver::new(
            source,
            self.decoder,
            Arc::clone(&self.state),
            self.shutdown.clone(),
            self.events_tx.clone(),
        );
        self.worker = Some(thread::spawn(move || receiver.run()));
        Ok(())
    }

    /// Starts the receiver thread, which first opens `endpoint` (retrying a
    /// server that is not up yet) and then streams from it.
    pub fn start_endpoint(&mut self, endpoint: Endpoint) -> Result<(), RasterError> {
        if self.worker.is_some() {
            return Err(RasterError::AlreadyStarted);
        }
        let decoder = self.decoder;
        let state = Arc::clone(&self.state);
        let shutdown = self.shutdown.clone();
        let events = self.events_tx.clone();
        self.worker = Some(thread::spawn(move || {
            let waiting = events.clone();
            let opened = endpoint.open(decoder, &shutdown, |msg| {
                waiting.send(LinkEvent::Waiting(msg.to_owned())).ok();
            });
            match opened {
                Ok(Some(source)) => Receiver::new(source, decoder, state, shutdown, events).run(),
                Ok(None) => {
                    events.send(LinkEvent::Stopped).ok();
                }
                Err(e) => {
                    error!("Unable to open {}: {e}", endpoint.describe());
                    state.mark_disconnected();
                    events
                        .send(LinkEvent::Disconnected(format!(
                            "unable to open {}: {e}",
                            endpoint.describe()
                        )))
                        .ok();
                }
            }
        }));
        Ok(())
    }

    /// Advances every channel by one tick and returns what to draw.
    pub fn on_tick(&mut self) -> RenderFrame {
        let tick = self.scheduler.tick();
        if !self.shutdown.is_triggered() {
            self.scheduler.step(&self.state, &mut self.channels);
        }
        self.render(tick)
    }

    /// Snapshot of the current windows without advancing.
    pub fn render(&self, tick: u64) -> RenderFrame {
        let channels = self
            .channels
            .iter()
            .map(|channel| ChannelRender {
                id: channel.id,
                rate: channel.rate,
                legend: self.config.show_legend.then(|| self.legend_text(channel.rate)),
                saturated: channel.saturated,
                spikes: channel.window.positions().map(|p| p as f32).collect(),
            })
            .collect();
        RenderFrame {
            tick,
            status: self.state.status(),
            window_width: self.config.window_width,
            span_label: self.config.span_label(),
            channels,
        }
    }

    fn legend_text(&self, rate: u32) -> String {
        if self.config.logarithmic {
            format!("{:.2}", (rate as f64 + 1.0).ln())
        } else {
            format!("{rate}")
        }
    }

    /// Pending link events, oldest first. Never blocks.
    pub fn drain_events(&self) -> Vec<LinkEvent> {
        self.events_rx.try_iter().collect()
    }

    /// Signals the receiver to stop and waits for it. Further ticks are no-ops.
    pub fn shutdown(&mut self) {
        self.shutdown.trigger();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("receiver thread panicked");
            }
            info!("Receiver stopped");
        }
    }
}

impl Drop for SpikeEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
