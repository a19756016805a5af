// src/scheduler.rs
use crate::config::RasterConfig;
use crate::state::RateState;
use crate::types::{ChannelId, WireFormat};
use crate::window::SpikeWindow;

/// One displayed channel: its alias, where its count sits in a frame, and its
/// scrolling marks.
pub struct Channel {
    pub id: ChannelId,
    pub source_index: usize,
    pub rate: u32,
    pub saturated: bool,
    pub window: SpikeWindow,
}

impl Channel {
    pub fn new(id: ChannelId, source_index: usize, window_width: u32) -> Self {
        Self {
            id,
            source_index,
            rate: 0,
            saturated: false,
            window: SpikeWindow::new(window_width),
        }
    }
}

/// What a channel does on the current tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emission {
    Idle,
    Spike,
    /// Rate is above the tick resolution.
    Saturated,
}

/// Decides, once per tick, which channels get a new synthetic spike.
pub struct RateScheduler {
    ticks_per_rate_interval: f64,
    format: WireFormat,
    tick: u64,
}

impl RateScheduler {
    pub fn new(config: &RasterConfig) -> Self {
        Self {
            ticks_per_rate_interval: config.ticks_per_rate_interval(),
            format: config.wire_format,
            tick: 0,
        }
    }

    /// Shared tick counter; the index of the next tick to run.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Ticks between synthesized spikes for `rate`, rounded half to even.
    /// `None` for a silent channel, `Some(0)` when saturated.
    pub fn period(&self, rate: u32) -> Option<u64> {
        if rate == 0 {
            return None;
        }
        let period = (self.ticks_per_rate_interval / rate as f64).round_ties_even();
        Some(period as u64)
    }

    pub fn decide(&self, rate: u32, connected: bool) -> Emission {
        if !connected {
            return Emission::Idle;
        }
        match self.period(rate) {
            None => Emission::Idle,
            Some(0) => Emission::Saturated,
            Some(period) if self.tick % period == 0 => Emission::Spike,
            Some(_) => Emission::Idle,
        }
    }

    /// Runs one tick over every channel: age and prune first, then append.
    pub fn step(&mut self, state: &RateState, channels: &mut [Channel]) {
        let connected = state.is_connected();
        let fired = match self.format {
            WireFormat::OneHot => state.take_fired().filter(|_| connected),
            WireFormat::RateCount => None,
        };
        for channel in channels.iter_mut() {
            channel.window.advance();
            channel.rate = state.rate(channel.source_index);
            match self.format {
                WireFormat::RateCount => {
                    let emission = self.decide(channel.rate, connected);
                    channel.saturated = emission == Emission::Saturated;
                    if emission == Emission::Spike {
                        channel.window.push();
                    }
                }
                WireFormat::OneHot => {
                    channel.saturated = false;
                    if fired == Some(channel.source_index) {
                        channel.window.push();
                    }
                }
            }
        }
        self.tick += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Frame;

    fn scheduler(format: WireFormat) -> RateScheduler {
        RateScheduler::new(&RasterConfig {
            wire_format: format,
            ..RasterConfig::default()
        })
    }

    fn connected_state(counts: Vec<u32>) -> RateState {
        let state = RateState::new(counts.len());
        state.mark_connected();
        state.publish(Frame::Rates(counts));
        state
    }

    #[test]
    fn period_matches_window_over_rate() {
        let s = scheduler(WireFormat::RateCount);
        assert_eq!(s.period(25), Some(4));
        assert_eq!(s.period(50), Some(2));
        assert_eq!(s.period(0), None);
        // 100 / 40 = 2.5 rounds to even
        assert_eq!(s.period(40), Some(2));
        // 100 / 200 = 0.5 rounds to 0
        assert_eq!(s.period(200), Some(0));
    }

    #[test]
    fn period_never_grows_with_rate() {
        let s = scheduler(WireFormat::RateCount);
        let mut last = u64::MAX;
        for rate in 1..=1000 {
            let period = s.period(rate).unwrap();
            assert!(period <= last, "rate {rate}: {period} > {last}");
            last = period;
        }
    }

    #[test]
    fn constant_rate_spikes_on_even_ticks_then_drains_after_disconnect() {
        let state = connected_state(vec![50]);
        let mut s = scheduler(WireFormat::RateCount);
        let mut channels = vec![Channel::new(0, 0, 100)];
        let mut spike_ticks = Vec::new();
        for _ in 0..10 {
            let before = channels[0].window.len();
            let tick = s.tick();
            s.step(&state, &mut channels);
            if channels[0].window.len() > before {
                spike_ticks.push(tick);
            }
        }
        assert_eq!(spike_ticks, vec![0, 2, 4, 6, 8]);

        state.mark_disconnected();
        let mut size = channels[0].window.len();
        for _ in 0..100 {
            s.step(&state, &mut channels);
            assert!(channels[0].window.len() <= size);
            size = channels[0].window.len();
        }
        assert!(channels[0].window.is_empty());
    }

    #[test]
    fn silent_channel_only_ages() {
        let state = connected_state(vec![20, 0]);
        let mut s = scheduler(WireFormat::RateCount);
        let mut channels = vec![Channel::new(10, 0, 100), Channel::new(11, 1, 100)];
        for _ in 0..30 {
            s.step(&state, &mut channels);
        }
        // period 5 over ticks 0..30
        assert_eq!(channels[0].window.len(), 6);
        state.publish(Frame::Rates(vec![0, 0]));
        let mut size = channels[0].window.len();
        for _ in 0..150 {
            s.step(&state, &mut channels);
            assert!(channels[0].window.len() <= size);
            size = channels[0].window.len();
            assert!(channels[1].window.is_empty());
        }
        assert_eq!(size, 0);
    }

    #[test]
    fn saturated_channel_synthesizes_nothing() {
        let state = connected_state(vec![250]);
        let mut s = scheduler(WireFormat::RateCount);
        let mut channels = vec![Channel::new(0, 0, 100)];
        for _ in 0..20 {
            s.step(&state, &mut channels);
            assert!(channels[0].saturated);
        }
        assert!(channels[0].window.is_empty());
    }

    #[test]
    fn waiting_link_emits_nothing() {
        let state = RateState::new(1);
        state.publish(Frame::Rates(vec![50]));
        let mut s = scheduler(WireFormat::RateCount);
        let mut channels = vec![Channel::new(0, 0, 100)];
        for _ in 0..10 {
            s.step(&state, &mut channels);
        }
        assert!(channels[0].window.is_empty());
        assert_eq!(s.tick(), 10);
    }

    #[test]
    fn one_hot_frame_adds_exactly_one_mark_to_named_channel() {
        let state = RateState::new(4);
        state.mark_connected();
        let mut s = scheduler(WireFormat::OneHot);
        // display source channels 1 and 3 only
        let mut channels = vec![Channel::new(7, 1, 100), Channel::new(9, 3, 100)];
        state.publish(Frame::Fired(3));
        s.step(&state, &mut channels);
        assert_eq!(channels[0].window.len(), 0);
        assert_eq!(channels[1].window.len(), 1);
        // consumed: the next tick adds nothing
        s.step(&state, &mut channels);
        assert_eq!(channels[1].window.len(), 1);
        // a channel that is not displayed changes nothing
        state.publish(Frame::Fired(0));
        s.step(&state, &mut channels);
        assert_eq!(channels[0].window.len() + channels[1].window.len(), 1);
    }
}
