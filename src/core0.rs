//! Core 0: the detection-reaction loop.
//!
//! This core handles everything the visitor sees:
//! - Polling the token reader
//! - Running detection windows and reactions
//! - Reporting activations into `SHARED`
//! - Feeding the watchdog timer

use esp_hal::delay::Delay;

use crate::clock::EspClock;
use crate::controller::{Clock, Controller, Outcome, Tick};
use crate::presentation::Presentation;
use crate::shared::SharedRemote;
use crate::token::TokenReader;

// Timing constants
const LOOP_INTERVAL_MS: u32 = 100;
const WATCHDOG_FEED_MS: u32 = 10_000;

/// Core 0 main loop.
pub fn run<R, P>(mut controller: Controller<R, P, SharedRemote, EspClock>) -> !
where
    R: TokenReader,
    P: Presentation,
{
    let delay = Delay::new();
    let mut last_watchdog_feed: u32 = 0;
    let mut was_enabled = true;

    loop {
        let now = controller.clock_mut().now_ms();

        match controller.run_iteration(now) {
            Tick::Disabled => {
                if was_enabled {
                    log::info!("core0: detection disabled remotely");
                    was_enabled = false;
                }
            }
            Tick::Reacted(outcome) => {
                was_enabled = true;
                match outcome {
                    Outcome::Recognized { index } => {
                        if let Some(entry) = controller.catalog().get(index) {
                            log::info!(
                                "core0: reaction done for {}, next sound slot {}",
                                entry.display_name,
                                entry.rotation_cursor()
                            );
                        }
                    }
                    Outcome::Unknown { token_id } => {
                        log::info!("core0: unknown token {} rejected", token_id)
                    }
                    Outcome::ReadFailure => log::info!("core0: read failure"),
                }
            }
            _ => {
                if !was_enabled {
                    log::info!("core0: detection enabled");
                    was_enabled = true;
                }
            }
        }

        // Feed watchdog to prove this loop isn't deadlocked
        let now = controller.clock_mut().now_ms();
        if now.wrapping_sub(last_watchdog_feed) >= WATCHDOG_FEED_MS {
            last_watchdog_feed = now;
            crate::feed_watchdog();
        }

        delay.delay_millis(LOOP_INTERVAL_MS);
    }
}
