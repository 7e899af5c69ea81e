//! Hardware time source for the controller.

use esp_hal::delay::Delay;

use crate::controller::Clock;
use crate::cooldown::Millis;

/// Longest stretch between watchdog feeds while delaying.
const FEED_SLICE_MS: u32 = 1_000;

pub fn uptime_ms() -> u64 {
    esp_hal::time::Instant::now().duration_since_epoch().as_millis()
}

/// Millisecond clock over the system timer. Delays busy-wait and keep the
/// watchdog fed, so long reaction sequences never trip it.
#[derive(Clone, Copy)]
pub struct EspClock {
    delay: Delay,
}

impl EspClock {
    pub fn new() -> Self {
        Self { delay: Delay::new() }
    }
}

impl Clock for EspClock {
    fn now_ms(&self) -> Millis {
        // Truncation is the wraparound the cooldown arithmetic expects
        uptime_ms() as Millis
    }

    fn delay_ms(&mut self, ms: Millis) {
        let mut left = ms;
        while left > 0 {
            let slice = left.min(FEED_SLICE_MS);
            self.delay.delay_millis(slice);
            crate::feed_watchdog();
            left -= slice;
        }
    }
}
