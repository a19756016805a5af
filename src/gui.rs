// src/gui.rs
use std::path::PathBuf;
use std::time::{Duration, Instant};

use eframe::egui;
use egui::Color32;
use egui_plot::{Line, Plot, PlotPoints};
use log::{error, info};

use crate::drivers::{render_raster_png, PlotStyle};
use crate::engine::SpikeEngine;
use crate::types::{LinkEvent, LinkStatus, RenderFrame};

/// Ticks run per repaint at most; a stalled window does not try to catch up
/// on seconds of missed ticks at once.
const MAX_TICKS_PER_FRAME: u32 = 50;
const STRIP_HEIGHT: f32 = 70.0;

pub struct RasterApp {
    engine: SpikeEngine,
    tick_period: Duration,
    last_tick: Instant,
    frame: RenderFrame,
    title: String,
    snapshot: Option<PathBuf>,
    log_messages: Vec<String>,
}

impl RasterApp {
    pub fn new(engine: SpikeEngine, snapshot: Option<PathBuf>) -> Self {
        let config = engine.config();
        let tick_period = config.tick_period();
        let title = config.title.clone();
        let frame = engine.render(0);
        Self {
            engine,
            tick_period,
            last_tick: Instant::now(),
            frame,
            title,
            snapshot,
            log_messages: Vec::new(),
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > 6 {
            self.log_messages.remove(0);
        }
    }

    /// Runs as many engine ticks as wall time allows since the last repaint.
    fn drive_ticks(&mut self) {
        let mut ran = 0;
        while self.last_tick.elapsed() >= self.tick_period && ran < MAX_TICKS_PER_FRAME {
            self.frame = self.engine.on_tick();
            self.last_tick += self.tick_period;
            ran += 1;
        }
        if ran == MAX_TICKS_PER_FRAME {
            self.last_tick = Instant::now();
        }
    }

    fn draw_strip(&self, ui: &mut egui::Ui, index: usize) {
        let channel = &self.frame.channels[index];
        let width = self.frame.window_width as f64;
        let is_last = index + 1 == self.frame.channels.len();
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(channel.id.to_string()).monospace());
            if let Some(legend) = &channel.legend {
                ui.label(egui::RichText::new(legend).small().color(Color32::GRAY));
            }
        });
        let mut plot = Plot::new(format!("strip-{}", channel.id))
            .height(STRIP_HEIGHT)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .show_axes([false, false])
            .show_x(false)
            .show_y(false)
            .include_x(0.0)
            .include_x(width)
            .include_y(0.0)
            .include_y(1.1);
        if is_last {
            plot = plot.x_axis_label(self.frame.span_label.clone());
        }
        plot.show(ui, |plot_ui| {
            if channel.saturated {
                // 高频通道: 画一条粗线
                plot_ui.line(
                    Line::new(PlotPoints::new(vec![[0.0, 0.5], [width, 0.5]]))
                        .color(Color32::WHITE)
                        .width(STRIP_HEIGHT * 0.5),
                );
            } else {
                for &x in &channel.spikes {
                    let x = x as f64;
                    plot_ui.line(
                        Line::new(PlotPoints::new(vec![[x, 0.0], [x, 1.0]]))
                            .color(Color32::WHITE)
                            .width(1.5),
                    );
                }
            }
        });
    }

    fn save_snapshot(&self) {
        let Some(path) = &self.snapshot else {
            return;
        };
        info!("Saving raster snapshot to {}", path.display());
        match render_raster_png(&self.frame, PlotStyle::default()) {
            Ok(png) => {
                if let Err(e) = std::fs::write(path, png) {
                    error!("failed to write {}: {e}", path.display());
                }
            }
            Err(e) => error!("failed to render snapshot: {e}"),
        }
    }
}

impl eframe::App for RasterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        for event in self.engine.drain_events() {
            match event {
                LinkEvent::Waiting(msg) => self.log(&msg),
                LinkEvent::Connected(peer) => self.log(&format!("Connected to {peer}")),
                LinkEvent::Disconnected(reason) => self.log(&format!("Disconnected: {reason}")),
                LinkEvent::Stopped => self.log("Receiver stopped"),
            }
        }
        self.drive_ticks();

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            let status = self.frame.status;
            let color = match status {
                LinkStatus::Waiting => Color32::YELLOW,
                LinkStatus::Connected => Color32::GREEN,
                LinkStatus::Disconnected => Color32::RED,
            };
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(status.label()).color(color));
                ui.label(format!("tick {}", self.frame.tick));
            });
            for m in &self.log_messages {
                ui.monospace(m);
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(&self.title);
            egui::ScrollArea::vertical().show(ui, |ui| {
                for index in 0..self.frame.channels.len() {
                    self.draw_strip(ui, index);
                }
            });
        });

        ctx.request_repaint(); // continuous scrolling
    }
}

impl Drop for RasterApp {
    fn drop(&mut self) {
        self.engine.shutdown();
        self.save_snapshot();
    }
}
