// src/state.rs
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

use crate::drivers::Frame;
use crate::types::LinkStatus;

const WAITING: u8 = 0;
const CONNECTED: u8 = 1;
const DISCONNECTED: u8 = 2;

/// Latest-value store shared between the receiver thread and the tick.
///
/// Counts are per source channel and overwritten on every decoded frame, so a
/// reader sees either the old or the new value of a channel, never a mix.
pub struct RateState {
    counts: Vec<AtomicU32>,
    fired: Mutex<Option<usize>>,
    status: AtomicU8,
    frames: AtomicU64,
}

impl RateState {
    pub fn new(source_channels: usize) -> Self {
        Self {
            counts: (0..source_channels).map(|_| AtomicU32::new(0)).collect(),
            fired: Mutex::new(None),
            status: AtomicU8::new(WAITING),
            frames: AtomicU64::new(0),
        }
    }

    /// Overwrites the state with a decoded frame. Ignored once disconnected.
    pub fn publish(&self, frame: Frame) {
        if self.status() == LinkStatus::Disconnected {
            return;
        }
        match frame {
            Frame::Rates(values) => {
                for (slot, value) in self.counts.iter().zip(values) {
                    slot.store(value, Ordering::Release);
                }
            }
            Frame::Fired(index) => {
                // 只保留最新一次
                if let Ok(mut fired) = self.fired.lock() {
                    *fired = Some(index);
                }
            }
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rate(&self, source_index: usize) -> u32 {
        self.counts
            .get(source_index)
            .map(|c| c.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Consumes the channel named by the latest one-hot frame, if any.
    pub fn take_fired(&self) -> Option<usize> {
        // A poisoned lock only means a writer panicked mid-store of an Option.
        match self.fired.lock() {
            Ok(mut fired) => fired.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn frames_received(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> LinkStatus {
        match self.status.load(Ordering::Acquire) {
            WAITING => LinkStatus::Waiting,
            CONNECTED => LinkStatus::Connected,
            _ => LinkStatus::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status() == LinkStatus::Connected
    }

    /// Waiting -> Connected. Returns false if the link already left `Waiting`.
    pub fn mark_connected(&self) -> bool {
        self.status
            .compare_exchange(WAITING, CONNECTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Any state -> Disconnected. Returns true only on the first transition.
    pub fn mark_disconnected(&self) -> bool {
        self.status.swap(DISCONNECTED, Ordering::AcqRel) != DISCONNECTED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_overwrite_previous_counts() {
        let state = RateState::new(3);
        state.mark_connected();
        state.publish(Frame::Rates(vec![5, 6, 7]));
        state.publish(Frame::Rates(vec![0, 9, 1]));
        assert_eq!((state.rate(0), state.rate(1), state.rate(2)), (0, 9, 1));
        assert_eq!(state.rate(7), 0);
        assert_eq!(state.frames_received(), 2);
    }

    #[test]
    fn fired_index_is_consumed_once() {
        let state = RateState::new(4);
        state.publish(Frame::Fired(1));
        state.publish(Frame::Fired(3));
        assert_eq!(state.take_fired(), Some(3));
        assert_eq!(state.take_fired(), None);
    }

    #[test]
    fn status_is_one_way() {
        let state = RateState::new(1);
        assert_eq!(state.status(), LinkStatus::Waiting);
        assert!(state.mark_connected());
        assert!(state.is_connected());
        assert!(state.mark_disconnected());
        assert!(!state.mark_disconnected());
        assert!(!state.mark_connected());
        assert_eq!(state.status(), LinkStatus::Disconnected);
    }

    #[test]
    fn publish_after_disconnect_is_dropped() {
        let state = RateState::new(2);
        state.mark_connected();
        state.publish(Frame::Rates(vec![4, 4]));
        state.mark_disconnected();
        state.publish(Frame::Rates(vec![9, 9]));
        assert_eq!(state.rate(0), 4);
        assert_eq!(state.frames_received(), 1);
    }
}
