//! MagiQuest IR wand receiver.
//!
//! The demodulating receiver pulls its output low during a mark. Every edge is
//! timestamped in the GPIO interrupt; the gaps between edges are the
//! mark/space durations that `magiquest::decode` consumes once the line has
//! been idle long enough to end the frame.

use core::cell::RefCell;
use critical_section::Mutex;
use esp_hal::gpio::{Event, Input, InputConfig, InputPin, Io, Pull};
use esp_hal::handler;
use esp_hal::interrupt::Priority;
use esp_hal::peripherals::IO_MUX;
use heapless::Vec;

use crate::magiquest;
use crate::token::{PendingRead, ReadHealth, TokenReader};

const FRAME_GAP_US: u64 = 5_000;
const MAX_EDGES: usize = 128;

struct Capture {
    last_edge_us: u64,
    durations: Vec<u32, MAX_EDGES>,
    overflowed: bool,
}

impl Capture {
    const fn new() -> Self {
        Self {
            last_edge_us: 0,
            durations: Vec::new(),
            overflowed: false,
        }
    }
}

static CAPTURE: Mutex<RefCell<Capture>> = Mutex::new(RefCell::new(Capture::new()));
static IR_PIN: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));

#[handler(priority = Priority::Priority3)]
fn ir_gpio_handler() {
    let now = esp_hal::time::Instant::now().duration_since_epoch().as_micros();

    critical_section::with(|cs| {
        if let Some(ref mut pin) = *IR_PIN.borrow_ref_mut(cs) {
            if !pin.is_interrupt_set() {
                return;
            }
            pin.clear_interrupt();
        }

        let mut capture = CAPTURE.borrow_ref_mut(cs);
        let gap = now.saturating_sub(capture.last_edge_us);
        if capture.last_edge_us == 0 || gap > FRAME_GAP_US {
            // First edge of a new frame: the leading idle time is not a bit
            capture.durations.clear();
            capture.overflowed = false;
        } else if capture.durations.push(gap as u32).is_err() {
            capture.overflowed = true;
        }
        capture.last_edge_us = now;
    });
}

/// Take the durations of a finished frame, if the line has gone idle.
fn take_frame() -> Option<Result<Vec<u32, MAX_EDGES>, &'static str>> {
    let now = esp_hal::time::Instant::now().duration_since_epoch().as_micros();

    critical_section::with(|cs| {
        let mut capture = CAPTURE.borrow_ref_mut(cs);
        if capture.durations.is_empty() || now.saturating_sub(capture.last_edge_us) <= FRAME_GAP_US {
            return None;
        }
        if capture.overflowed {
            capture.durations.clear();
            capture.overflowed = false;
            return Some(Err("frame overflowed capture buffer"));
        }
        let frame = capture.durations.clone();
        capture.durations.clear();
        Some(Ok(frame))
    })
}

/// MagiQuest wand receiver on a single GPIO.
pub struct IrReceiver {
    pending: PendingRead<u32>,
    health: ReadHealth,
}

impl IrReceiver {
    pub fn new<P>(pin: P, io_mux: IO_MUX<'static>) -> Self
    where
        P: InputPin + 'static,
    {
        let mut input: Input<'static> = Input::new(pin, InputConfig::default().with_pull(Pull::Up));
        input.listen(Event::AnyEdge);

        critical_section::with(|cs| {
            IR_PIN.borrow_ref_mut(cs).replace(input);
        });

        let mut io = Io::new(io_mux);
        io.set_interrupt_handler(ir_gpio_handler);

        log::info!("ir: receiver listening");
        Self {
            pending: PendingRead::new(),
            health: ReadHealth::new(),
        }
    }

    fn collect(&mut self) {
        let decoded = match take_frame() {
            None => return,
            Some(Ok(frame)) => magiquest::decode(&frame),
            Some(Err(e)) => Err(e),
        };
        match decoded {
            Ok(cast) => {
                log::info!("ir: wand_id={} magnitude={}", cast.wand_id, cast.magnitude);
                self.health.record_success();
                self.pending.stash(cast.wand_id);
            }
            Err(e) => {
                log::debug!("ir: {}", e);
                self.health.record_failure(now_ms());
            }
        }
    }
}

impl TokenReader for IrReceiver {
    type Id = u32;

    fn poll(&mut self) -> u32 {
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
