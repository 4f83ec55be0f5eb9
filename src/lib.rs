//! # LD2410 presence radar driver
//!
//! Async driver for the Hi-Link LD2410 family of 24 GHz presence radars
//! (LD2410, LD2410B, LD2410C) speaking the vendor binary protocol over
//! UART. The device multiplexes two frame dialects on one bytestream:
//! request/ack command frames, and periodic sensor reports emitted about
//! ten times per second while not in configuration mode.
//!
//! ## Usage
//!
//! The driver is split in the usual embassy fashion: a [`State`] holding
//! the shared session primitives, a [`Runner`] owning the UART RX half,
//! and an [`Ld2410`] control handle owning the TX half. Create the three
//! with [`new`], spawn or await [`Runner::run`], and drive the device
//! through the control handle. The UART must already be configured to the
//! device's serial settings (factory default 256000 baud, 8N1).
//!
//! All commands except enter/leave require configuration mode: call
//! [`Ld2410::configure`] to obtain a [`ConfigMode`] guard carrying the
//! command methods, and [`ConfigMode::exit`] to hand the device back to
//! reporting. Reports are consumed through [`Ld2410::last_report`],
//! [`Ld2410::next_report`] and [`Ld2410::subscribe`], or through the
//! copyable [`Reports`] handle from [`Ld2410::reports`].
//!
//! The session ends when the byte source does: [`Runner::run`] returns,
//! and every further operation fails with
//! [`Ld2410Error::Disconnected`]. Starting over requires a fresh
//! [`State`] and transport.

#![no_std]
#![deny(unsafe_code)]

pub mod cmd;
pub mod config;
pub mod detection;
pub mod frame;
pub mod report;
pub mod stream;
pub mod system;

// host unit tests need a critical-section implementation linked in
#[cfg(test)]
use critical_section as _;

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{PubSubBehavior, PubSubChannel};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, with_timeout};
use embedded_io_async::{Read, Write};

use crate::frame::{Ack, Frame, FrameKind};
use crate::stream::{FrameStream, StreamError};

pub use crate::cmd::cmd_config::ConfigHandshake;
pub use crate::cmd::cmd_detection::{GateSelect, MAX_ENERGY, MAX_GATE, Parameters};
pub use crate::cmd::cmd_system::{
    BaudRate, DistanceResolution, FirmwareVersion, LightControl, LightFunction,
    MacAddress, OutPinLevel,
};
pub use crate::config::ConfigMode;
pub use crate::report::{
    EngineeringData, GATE_COUNT, Report, ReportStream, Reports, TargetState,
};

/// Time a command waits for its ack before failing
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Concurrent report consumers per session (subscriptions plus pending
/// `next_report` calls)
pub(crate) const MAX_SUBSCRIBERS: usize = 8;

/// Driver error
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ld2410Error<E = core::convert::Infallible> {
    /// The session is over: the transport reported EOF or a read error,
    /// or the module was restarted
    Disconnected,
    /// The in-flight command was cut short by a restart-induced loss of
    /// the transport
    ModuleRestarted,
    /// Transport write failure
    Serial(E),
    /// The operation requires configuration mode
    NotConfiguring,
    /// Configuration mode is already active
    AlreadyConfiguring,
    /// Argument validation failed; nothing was transmitted
    InvalidParam,
    /// No ack arrived within the command timeout
    ReplyTimeout,
    /// The ack arrived but its arguments did not match the expected layout
    BadReply,
    /// The device rejected the command with a non-zero status word
    CmdFailed { code: u16, status: u16 },
    /// All subscriber slots are taken
    TooManySubscribers,
}

/// Why the reader terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum LinkDown {
    /// EOF or read error on the transport
    Closed,
    /// Transport loss while a module restart was expected
    Restarted,
}

impl LinkDown {
    /// Error reported to a command interrupted mid-flight. Operations
    /// started after the loss report `Disconnected` regardless.
    fn interrupt_error<E>(self) -> Ld2410Error<E> {
        match self {
            LinkDown::Closed => Ld2410Error::Disconnected,
            LinkDown::Restarted => Ld2410Error::ModuleRestarted,
        }
    }
}

/// Session mode gating command issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Connected,
    Configuring,
}

/// Broadcast to report consumers
#[derive(Clone)]
pub(crate) enum Event {
    Report(Report),
    Down(LinkDown),
}

type CellMutex<T> = Mutex<CriticalSectionRawMutex, Cell<T>>;

/// State shared between the runner and the handles
pub(crate) struct Shared<const QUEUE: usize> {
    mode: CellMutex<Mode>,
    link: CellMutex<Option<LinkDown>>,
    /// Code of the single in-flight command, if any
    pending: CellMutex<Option<u16>>,
    ack: Signal<CriticalSectionRawMutex, Ack>,
    link_sig: Signal<CriticalSectionRawMutex, LinkDown>,
    pub(crate) latest: CellMutex<Option<Report>>,
    pub(crate) events:
        PubSubChannel<CriticalSectionRawMutex, Event, QUEUE, MAX_SUBSCRIBERS, 1>,
    restart_pending: AtomicBool,
}

impl<const QUEUE: usize> Shared<QUEUE> {
    pub(crate) fn link_down(&self) -> Option<LinkDown> {
        self.link.lock(|cell| cell.get())
    }

    pub(crate) fn mode(&self) -> Mode {
        self.mode.lock(|cell| cell.get())
    }

    pub(crate) fn set_mode(&self, mode: Mode) {
        self.mode.lock(|cell| cell.set(mode));
    }

    pub(crate) fn expect_restart(&self) {
        self.restart_pending.store(true, Ordering::Relaxed);
    }

    pub(crate) fn clear_restart(&self) {
        self.restart_pending.store(false, Ordering::Relaxed);
    }
}

/// Per-session storage for the shared primitives. One `State` backs
/// exactly one session; start a new session with a fresh one.
pub struct State<const QUEUE: usize = 64> {
    shared: Shared<QUEUE>,
}

impl<const QUEUE: usize> State<QUEUE> {
    pub const fn new() -> Self {
        State {
            shared: Shared {
                mode: Mutex::new(Cell::new(Mode::Connected)),
                link: Mutex::new(Cell::new(None)),
                pending: Mutex::new(Cell::new(None)),
                ack: Signal::new(),
                link_sig: Signal::new(),
                latest: Mutex::new(Cell::new(None)),
                events: PubSubChannel::new(),
                restart_pending: AtomicBool::new(false),
            },
        }
    }
}

impl<const QUEUE: usize> Default for State<QUEUE> {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a session into its control handle and its reader. The transport
/// halves must belong to the same already-configured UART.
pub fn new<'d, W: Write, R: Read, const QUEUE: usize>(
    state: &'d mut State<QUEUE>,
    tx: W,
    rx: R,
) -> (Ld2410<'d, W, QUEUE>, Runner<'d, R, QUEUE>) {
    let shared = &state.shared;
    (
        Ld2410 { tx, shared, timeout: DEFAULT_COMMAND_TIMEOUT },
        Runner { stream: FrameStream::new(rx), shared },
    )
}

/// Clears the pending-reply slot on every exit path, so a cancelled
/// command never leaves it occupied and a late ack is simply dropped.
struct PendingGuard<'d, const QUEUE: usize> {
    shared: &'d Shared<QUEUE>,
}

impl<const QUEUE: usize> Drop for PendingGuard<'_, QUEUE> {
    fn drop(&mut self) {
        self.shared.pending.lock(|cell| cell.set(None));
        self.shared.ack.reset();
    }
}

/// Control handle: owns the UART TX half and issues commands.
///
/// Methods take `&mut self`, which serialises command issue for the whole
/// session; at most one command is ever in flight.
pub struct Ld2410<'d, W, const QUEUE: usize = 64> {
    tx: W,
    shared: &'d Shared<QUEUE>,
    timeout: Duration,
}

impl<'d, W: Write, const QUEUE: usize> Ld2410<'d, W, QUEUE> {
    /// Replace the per-command ack timeout (default 2 s)
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Handle onto the report side, freely copyable into consumer tasks
    pub fn reports(&self) -> Reports<'d, QUEUE> {
        Reports { shared: self.shared }
    }

    /// Latest report seen this session, or `None` before the first one
    pub fn last_report(&self) -> Option<Report> {
        self.reports().last_report()
    }

    /// Wait for the next report to arrive after this call
    pub async fn next_report(&self) -> Result<Report, Ld2410Error> {
        self.reports().next_report().await
    }

    /// Subscribe to every report arriving after this call
    pub fn subscribe(&self) -> Result<ReportStream<'d, QUEUE>, Ld2410Error> {
        self.reports().subscribe()
    }

    /// Send one command payload and await its ack.
    ///
    /// `required` is the session mode the command is legal in: enter-config
    /// runs from `Connected`, everything else from `Configuring`.
    pub(crate) async fn command(
        &mut self,
        payload: &[u8],
        required: Mode,
    ) -> Result<Ack, Ld2410Error<W::Error>> {
        if self.shared.link_down().is_some() {
            return Err(Ld2410Error::Disconnected);
        }
        if self.shared.mode() != required {
            return Err(match required {
                Mode::Connected => Ld2410Error::AlreadyConfiguring,
                Mode::Configuring => Ld2410Error::NotConfiguring,
            });
        }
        let code = u16::from_le_bytes([payload[0], payload[1]]);
        let frame = Frame::command(payload).map_err(|_| Ld2410Error::InvalidParam)?;

        let shared = self.shared;
        shared.ack.reset();
        shared.pending.lock(|cell| cell.set(Some(code)));
        let _guard = PendingGuard { shared };

        let wire = frame.encode();
        self.tx.write_all(&wire).await.map_err(Ld2410Error::Serial)?;
        self.tx.flush().await.map_err(Ld2410Error::Serial)?;

        match select(
            with_timeout(self.timeout, shared.ack.wait()),
            shared.link_sig.wait(),
        )
        .await
        {
            Either::First(Ok(ack)) => {
                if ack.ok() {
                    Ok(ack)
                } else {
                    Err(Ld2410Error::CmdFailed { code, status: ack.status })
                }
            }
            Either::First(Err(_)) => Err(Ld2410Error::ReplyTimeout),
            Either::Second(down) => Err(down.interrupt_error()),
        }
    }
}

/// Reader: owns the UART RX half, demultiplexes inbound frames, routes
/// acks to the in-flight command and fans reports out to consumers.
pub struct Runner<'d, R, const QUEUE: usize = 64> {
    stream: FrameStream<R>,
    shared: &'d Shared<QUEUE>,
}

impl<R: Read, const QUEUE: usize> Runner<'_, R, QUEUE> {
    /// Drive the session until the transport closes. Never blocks on slow
    /// report consumers; codec errors are logged and resynchronised.
    pub async fn run(mut self) {
        let down = loop {
            match self.stream.next().await {
                Ok(frame) => self.dispatch(frame),
                Err(StreamError::Eof) => break self.down_reason(),
                Err(StreamError::Read(_e)) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("transport read failed: {}", defmt::Debug2Format(&_e));
                    break self.down_reason();
                }
            }
        };
        self.shared.link.lock(|cell| cell.set(Some(down)));
        self.shared.link_sig.signal(down);
        self.shared.events.publish_immediate(Event::Down(down));
    }

    fn down_reason(&self) -> LinkDown {
        if self.shared.restart_pending.load(Ordering::Relaxed) {
            LinkDown::Restarted
        } else {
            LinkDown::Closed
        }
    }

    fn dispatch(&mut self, frame: Frame) {
        match frame.kind {
            FrameKind::Command => match Ack::parse(&frame.payload) {
                Ok(ack) => {
                    let expected = self.shared.pending.lock(|cell| cell.get());
                    if expected == Some(ack.code) {
                        self.shared.ack.signal(ack);
                    } else {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("dropping ack for command {=u16:x}", ack.code);
                    }
                }
                Err(_e) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("dropping malformed ack: {}", _e);
                }
            },
            FrameKind::Report => match Report::from_payload(&frame.payload) {
                Ok(report) => {
                    // frames flowing again means any expected restart is over
                    self.shared.clear_restart();
                    self.shared.latest.lock(|cell| cell.set(Some(report)));
                    self.shared.events.publish_immediate(Event::Report(report));
                }
                Err(_e) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("dropping malformed report: {}", _e);
                }
            },
        }
    }
}
