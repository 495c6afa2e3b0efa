//! Rotating counter broadcast on the slow schedule.

/// Bounded counter cycling through `1..=max`.
#[derive(Debug, Clone)]
pub struct RotatingCounter {
    current: u32,
    max: u32,
}

impl RotatingCounter {
    /// Create a counter starting at 1. A `max` of 0 is treated as 1.
    pub fn new(max: u32) -> Self {
        Self { current: 1, max: max.max(1) }
    }

    /// Current value.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Step to the next value, wrapping from `max` back to 1.
    pub fn advance(&mut self) -> u32 {
        self.current = if self.current >= self.max { 1 } else { self.current + 1 };
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_after_max() {
        let mut counter = RotatingCounter::new(3);
        assert_eq!(counter.current(), 1);
        let seen: Vec<u32> = (0..5).map(|_| counter.advance()).collect();
        assert_eq!(seen, vec![2, 3, 1, 2, 3]);
    }

    #[test]
    fn single_value_counter_stays_put() {
        let mut counter = RotatingCounter::new(0);
        assert_eq!(counter.advance(), 1);
        assert_eq!(counter.advance(), 1);
    }
}
