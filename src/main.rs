//! MagicBand Controller - ESP32 dual-core firmware for a themed prop.
//!
//! Architecture:
//! - Core 0 (`core0`): token reader, detection window, LED and sound reactions
//! - Core 1 (`core1`): WiFi and the Home Assistant MQTT session
//!
//! Cross-core communication uses atomics and the activation queue in `shared`.
//!
//! The token reader is picked at build time: `rfid` (Wiegand band reader, the
//! default) or `wand` (MagiQuest IR receiver).

#![no_std]
#![no_main]

#[cfg(all(feature = "rfid", feature = "wand"))]
compile_error!("features `rfid` and `wand` are mutually exclusive");
#[cfg(not(any(feature = "rfid", feature = "wand")))]
compile_error!("enable one token reader feature: `rfid` or `wand`");

use esp_bootloader_esp_idf::esp_app_desc;
esp_app_desc!();

mod audio;
mod bands;
mod broker;
mod catalog;
mod clock;
mod config;
mod controller;
mod cooldown;
mod core0;
mod core1;
mod detection;
mod dfplayer;
mod events;
mod heap_debug;
mod homeassistant;
#[cfg(feature = "wand")]
mod ir;
mod led;
#[cfg(feature = "wand")]
mod magiquest;
mod mqtt;
mod presentation;
mod remote;
mod shared;
mod stage;
mod token;
#[cfg(feature = "rfid")]
mod wiegand;
#[cfg(feature = "rfid")]
mod wiegand_frame;

extern crate alloc;

use alloc::boxed::Box;
use core::cell::RefCell;
use core::mem::MaybeUninit;
use critical_section::Mutex;
use esp_alloc as _;
use esp_hal::{
    clock::CpuClock,
    interrupt::software::SoftwareInterruptControl,
    main,
    rmt::Rmt,
    system::Stack,
    time::{Duration, Rate},
    timer::timg::{TimerGroup, Wdt},
    uart::{Config as UartConfig, Uart},
};
use esp_hal_smartled::{smart_led_buffer, SmartLedsAdapter};
use esp_println::logger::init_logger;
use esp_radio::wifi::{Config as WifiConfig, WifiController, WifiDevice};

use crate::audio::DfPlayer;
use crate::catalog::Catalog;
use crate::clock::EspClock;
use crate::config::Config;
use crate::controller::Controller;
use crate::led::{LedStrip, NUM_LEDS};
use crate::shared::{SharedRemote, SHARED};
use crate::stage::Stage;

// Core 1 stack (WiFi + smoltcp + MQTT buffers)
static mut CORE1_STACK: Stack<32768> = Stack::new();

// WiFi handles passed from Core 0 to Core 1
pub(crate) static WIFI_DEVICE: Mutex<RefCell<Option<WifiDevice<'static>>>> =
    Mutex::new(RefCell::new(None));
pub(crate) static WIFI_CONTROLLER: Mutex<RefCell<Option<WifiController<'static>>>> =
    Mutex::new(RefCell::new(None));

// Watchdog timer (shared between cores)
pub(crate) static WATCHDOG: Mutex<RefCell<Option<Wdt<esp_hal::peripherals::TIMG1>>>> =
    Mutex::new(RefCell::new(None));

/// Feed the watchdog timer. Safe to call from any core.
pub fn feed_watchdog() {
    critical_section::with(|cs| {
        if let Some(ref mut wdt) = *WATCHDOG.borrow_ref_mut(cs) {
            wdt.feed();
        }
    });
}

#[main]
fn main() -> ! {
    init_logger(log::LevelFilter::Info);
    log::info!("MagicBand Controller starting...");

    // Initialize heap
    const HEAP_SIZE: usize = 72 * 1024;
    static mut HEAP: MaybeUninit<[u8; HEAP_SIZE]> = MaybeUninit::uninit();
    unsafe {
        esp_alloc::HEAP.add_region(esp_alloc::HeapRegion::new(
            HEAP.as_mut_ptr() as *mut u8,
            HEAP_SIZE,
            esp_alloc::MemoryCapability::Internal.into(),
        ));
    }

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // LEDs first so there is visible life even if the rest fails
    let rmt = Rmt::new(peripherals.RMT, Rate::from_mhz(80)).unwrap();
    let writer = SmartLedsAdapter::new(rmt.channel0, peripherals.GPIO13, smart_led_buffer!(NUM_LEDS));
    let mut strip = LedStrip::new(writer);
    strip.boot_indicator();

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let esp_radio_ctrl = esp_radio::init().unwrap();
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(&esp_radio_ctrl, peripherals.WIFI, WifiConfig::default()).unwrap();

    // SAFETY: the handles borrow from esp_radio_ctrl, which is leaked to
    // 'static right below. Core 1 takes exclusive ownership of both.
    critical_section::with(|cs| {
        WIFI_DEVICE
            .borrow_ref_mut(cs)
            .replace(unsafe { core::mem::transmute(interfaces.sta) });
        WIFI_CONTROLLER
            .borrow_ref_mut(cs)
            .replace(unsafe { core::mem::transmute(wifi_controller) });
    });
    let _esp_radio_ctrl: &'static _ = Box::leak(Box::new(unsafe {
        core::mem::transmute::<_, esp_radio::Controller<'static>>(esp_radio_ctrl)
    }));

    // Watchdog on TIMG1 (TIMG0 drives the scheduler)
    let timg1 = TimerGroup::new(peripherals.TIMG1);
    let mut wdt = timg1.wdt;
    wdt.enable();
    wdt.set_timeout(
        esp_hal::timer::timg::MwdtStage::Stage0,
        Duration::from_secs(30),
    );
    critical_section::with(|cs| {
        WATCHDOG
            .borrow_ref_mut(cs)
            .replace(unsafe { core::mem::transmute(wdt) });
    });

    // DFPlayer on UART2 (GPIO16 = RX from player, GPIO17 = TX to player)
    let uart = Uart::new(peripherals.UART2, UartConfig::default().with_baudrate(9600))
        .unwrap()
        .with_rx(peripherals.GPIO16)
        .with_tx(peripherals.GPIO17);
    let player = DfPlayer::new(uart);

    let settings = Config::get();

    let mut stage = Stage::new(strip, player, EspClock::new());
    stage.startup();

    // Token reader and its catalog
    #[cfg(feature = "rfid")]
    let (reader, catalog) = (
        crate::wiegand::Wiegand::new(peripherals.GPIO14, peripherals.GPIO27, peripherals.IO_MUX),
        Catalog::from_specs(bands::BANDS),
    );
    #[cfg(feature = "wand")]
    let (reader, catalog) = (
        crate::ir::IrReceiver::new(peripherals.GPIO4, peripherals.IO_MUX),
        Catalog::from_specs(bands::WANDS),
    );
    log::info!("catalog: {} entries", catalog.len());

    let remote = SharedRemote::new(&SHARED, clock::uptime_ms);
    let controller = Controller::new(reader, stage, remote, EspClock::new(), catalog)
        .with_unknown_reporting(settings.report_unknown);

    heap_debug::log_heap_stats("boot");

    let sw_ints = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start_second_core(
        peripherals.CPU_CTRL,
        sw_ints.software_interrupt0,
        sw_ints.software_interrupt1,
        unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) },
        || {
            core1::run();
        },
    );

    core0::run(controller);
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    critical_section::with(|_| {
        log::error!("PANIC: {}", info);
    });

    // Spin without feeding watchdog. The 30s timeout will trigger a full system reset.
    loop {
        core::hint::spin_loop();
    }
}
