use std::collections::VecDeque;

/// Scrolling buffer of one channel's visible spike marks.
///
/// Marks are stored by the window tick they were born on, so aging is a clock
/// increment instead of a pass over every mark. A mark born at clock `b` sits at
/// position `W - 1 - (clock - b)` and is dropped once that goes below zero.
pub struct SpikeWindow {
    births: VecDeque<u64>,
    width: u32,
    clock: u64,
}

impl SpikeWindow {
    pub fn new(width: u32) -> Self {
        Self {
            births: VecDeque::with_capacity(width as usize),
            width,
            clock: 0,
        }
    }

    /// Shifts every mark left by one and prunes the ones that left the window.
    pub fn advance(&mut self) {
        self.clock += 1;
        let width = self.width as u64;
        while let Some(&born) = self.births.front() {
            if self.clock - born >= width {
                self.births.pop_front();
            } else {
                break;
            }
        }
    }

    /// Appends a mark at the right edge (`W - 1`).
    pub fn push(&mut self) {
        if self.births.back() == Some(&self.clock) {
            // one slot per position
            return;
        }
        self.births.push_back(self.clock);
        debug_assert!(self.births.len() <= self.width as usize);
    }

    pub fn len(&self) -> usize {
        self.births.len()
    }

    pub fn is_empty(&self) -> bool {
        self.births.is_empty()
    }

    /// Positions oldest first; strictly increasing left to right.
    pub fn positions(&self) -> impl Iterator<Item = i64> + '_ {
        let right = self.width as i64 - 1;
        self.births
            .iter()
            .map(move |&born| right - (self.clock - born) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_is_pruned_after_exactly_width_ticks() {
        let mut window = SpikeWindow::new(100);
        window.push();
        assert_eq!(window.positions().collect::<Vec<_>>(), vec![99]);
        for tick in 1..100 {
            window.advance();
            assert_eq!(window.positions().next(), Some(99 - tick));
        }
        assert_eq!(window.positions().next(), Some(0));
        window.advance();
        assert!(window.is_empty());
    }

    #[test]
    fn fresh_mark_survives_the_tick_it_is_pushed_on() {
        let mut window = SpikeWindow::new(3);
        for _ in 0..10 {
            window.advance();
            window.push();
            assert_eq!(window.positions().last(), Some(2));
        }
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn never_holds_more_than_width() {
        let mut window = SpikeWindow::new(5);
        for _ in 0..50 {
            window.push();
            window.push();
            assert!(window.len() <= 5);
            window.advance();
        }
    }

    #[test]
    fn positions_are_ordered_oldest_first() {
        let mut window = SpikeWindow::new(10);
        window.push();
        window.advance();
        window.advance();
        window.push();
        window.advance();
        window.push();
        assert_eq!(window.positions().collect::<Vec<_>>(), vec![6, 8, 9]);
    }
}
