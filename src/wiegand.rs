//! RFID band reader with a Wiegand output, captured with GPIO interrupts.

use core::cell::RefCell;
use core::sync::atomic::Ordering;
use critical_section::Mutex;
use esp_hal::gpio::{Event, Input, InputConfig, InputPin, Io, Pull};
use esp_hal::handler;
use esp_hal::interrupt::Priority;
use esp_hal::peripherals::IO_MUX;
use portable_atomic::AtomicU64;

use crate::token::{PendingRead, ReadHealth, TokenReader};
use crate::wiegand_frame;

const DEBOUNCE_US: u64 = 200;
const END_OF_TX_US: u64 = 25_000;

// Upper 8 bits = bit count, lower 56 bits = accumulated bits, so the ISR can
// update both in one CAS.
static WIEGAND_STATE: AtomicU64 = AtomicU64::new(0);
static LAST_BIT_US: AtomicU64 = AtomicU64::new(0);

const COUNT_SHIFT: u32 = 56;
const BITS_MASK: u64 = (1u64 << COUNT_SHIFT) - 1;

static D0_PIN: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));
static D1_PIN: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));

#[handler(priority = Priority::Priority3)]
fn wiegand_gpio_handler() {
    let (d0, d1) = critical_section::with(|cs| {
        let mut d0 = false;
        let mut d1 = false;

        if let Some(ref mut pin) = *D0_PIN.borrow_ref_mut(cs) {
            if pin.is_interrupt_set() {
                pin.clear_interrupt();
                d0 = true;
            }
        }
        if let Some(ref mut pin) = *D1_PIN.borrow_ref_mut(cs) {
            if pin.is_interrupt_set() {
                pin.clear_interrupt();
                d1 = true;
            }
        }

        (d0, d1)
    });

    if d0 {
        record_bit(0);
    }
    if d1 {
        record_bit(1);
    }
}

fn record_bit(bit: u8) {
    let now = esp_hal::time::Instant::now().duration_since_epoch().as_micros();
    let last = LAST_BIT_US.load(Ordering::Relaxed);

    if last != 0 && now.saturating_sub(last) < DEBOUNCE_US {
        return;
    }

    loop {
        let state = WIEGAND_STATE.load(Ordering::Acquire);
        let count = (state >> COUNT_SHIFT) as u32;
        if count >= 56 {
            return;
        }

        let bits = ((state & BITS_MASK) << 1) | bit as u64;
        let next = (((count + 1) as u64) << COUNT_SHIFT) | (bits & BITS_MASK);

        if WIEGAND_STATE
            .compare_exchange(state, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            LAST_BIT_US.store(now, Ordering::Release);
            return;
        }
    }
}

/// Claim a finished frame as `(bit_count, bits)`, or `None` while idle or
/// still receiving.
fn take_frame() -> Option<(u32, u64)> {
    loop {
        let state = WIEGAND_STATE.load(Ordering::Acquire);
        let count = (state >> COUNT_SHIFT) as u32;
        if count == 0 {
            return None;
        }

        let last = LAST_BIT_US.load(Ordering::Acquire);
        let now = esp_hal::time::Instant::now().duration_since_epoch().as_micros();
        if now.saturating_sub(last) < END_OF_TX_US {
            return None;
        }

        // If the ISR adds a bit between the load and the CAS, retry
        if WIEGAND_STATE
            .compare_exchange(state, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            LAST_BIT_US.store(0, Ordering::Release);
            return Some((count, state & BITS_MASK));
        }
    }
}

/// Wiegand band reader. Pins live in statics for the ISR.
pub struct Wiegand {
    pending: PendingRead<u64>,
    health: ReadHealth,
}

impl Wiegand {
    /// Listen on D0 and D1 (falling edge, pulled up).
    pub fn new<D0, D1>(d0: D0, d1: D1, io_mux: IO_MUX<'static>) -> Self
    where
        D0: InputPin + 'static,
        D1: InputPin + 'static,
    {
        let input_config = InputConfig::default().with_pull(Pull::Up);
        let mut d0_pin: Input<'static> = Input::new(d0, input_config);
        let mut d1_pin: Input<'static> = Input::new(d1, input_config);

        d0_pin.listen(Event::FallingEdge);
        d1_pin.listen(Event::FallingEdge);

        critical_section::with(|cs| {
            D0_PIN.borrow_ref_mut(cs).replace(d0_pin);
            D1_PIN.borrow_ref_mut(cs).replace(d1_pin);
        });

        let mut io = Io::new(io_mux);
        io.set_interrupt_handler(wiegand_gpio_handler);

        log::info!("wiegand: reader listening");
        Self {
            pending: PendingRead::new(),
            health: ReadHealth::new(),
        }
    }

    /// Decode any finished frame into the pending slot.
    fn collect(&mut self) {
        let Some((count, bits)) = take_frame() else {
            return;
        };
        match wiegand_frame::decode(count, bits) {
            Some(read) => {
                log::info!(
                    "wiegand: facility={} card={} uid={:08X}",
                    read.facility,
                    read.card,
                    read.to_uid()
                );
                self.health.record_success();
                self.pending.stash(read.token_id());
            }
            None => self.health.record_failure(now_ms()),
        }
    }
}

impl TokenReader for Wiegand {
    type Id = u64;

    fn poll(&mut self) -> u64 {
        if !self.pending.is_some() {
            self.collect();
        }
        self.pending.take()
    }

    fn is_present(&mut self) -> bool {
        self.collect();
        self.pending.is_some()
    }

    fn is_healthy(&self) -> bool {
        self.health.is_healthy(now_ms())
    }

    fn discard(&mut self) {
        let _ = take_frame();
        self.pending.take();
    }
}

fn now_ms() -> u32 {
    crate::clock::uptime_ms() as u32
}
