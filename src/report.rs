//! # Sensor reports and report distribution
//!
//! The device emits a report frame roughly every 100 ms whenever it is not
//! in configuration mode. Two payload layouts share a common envelope: the
//! *basic* report carries target classification plus moving/static
//! distance and energy, the *engineering* report appends per-gate energy
//! values and, on firmwares that have the light sensor path, a light level
//! and the OUT pin state.
//!
//! ## Consuming reports
//!
//! - [`Reports::last_report`] - latest report seen this session, if any
//! - [`Reports::next_report`] - wait for the next report to arrive
//! - [`Reports::subscribe`] - stream of every subsequent report, in
//!   arrival order, with bounded drop-oldest buffering
//!
//! The same accessors are available directly on [`Ld2410`](crate::Ld2410);
//! [`Reports`] is a freely copyable handle so a consumer task does not
//! need the control half.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{Subscriber, WaitResult};

use crate::frame::FrameError;
use crate::{Event, Ld2410Error, MAX_SUBSCRIBERS, Shared};

/// Report payload type byte for the engineering layout
pub(crate) const REPORT_ENGINEERING: u8 = 0x01;
/// Report payload type byte for the basic layout
pub(crate) const REPORT_BASIC: u8 = 0x02;

/// Marker byte between the type byte and the report body
const REPORT_MARK: u8 = 0xAA;
/// Two-byte terminator closing every report body
const REPORT_TERM: [u8; 2] = [0x55, 0x00];

/// Distance gates per direction, gate indices 0..=8
pub const GATE_COUNT: usize = 9;

/// Target classification reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetState {
    NoTarget = 0,
    Moving = 1,
    Static = 2,
    MovingAndStatic = 3,
}

impl TargetState {
    fn from_bits(value: u8) -> Option<TargetState> {
        match value {
            0 => Some(TargetState::NoTarget),
            1 => Some(TargetState::Moving),
            2 => Some(TargetState::Static),
            3 => Some(TargetState::MovingAndStatic),
            _ => None,
        }
    }

    /// True if a moving target is detected
    pub fn moving(&self) -> bool {
        matches!(self, TargetState::Moving | TargetState::MovingAndStatic)
    }

    /// True if a static target is detected
    pub fn stationary(&self) -> bool {
        matches!(self, TargetState::Static | TargetState::MovingAndStatic)
    }
}

/// Per-gate data appended by the engineering report layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineeringData {
    pub max_gate: u8,
    pub max_moving_gate: u8,
    pub max_static_gate: u8,
    /// Moving energy per gate; entries `0..=max_gate` are valid
    pub moving_gate_energy: [u8; GATE_COUNT],
    /// Static energy per gate; entries `0..=max_gate` are valid
    pub static_gate_energy: [u8; GATE_COUNT],
    /// Light sensor level, on firmwares that append it
    pub light_level: Option<u8>,
    /// OUT pin state, on firmwares that append it
    pub out_pin_high: Option<bool>,
}

/// One periodic sensor report. Distances in centimetres, energies 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Report {
    pub target_state: TargetState,
    pub moving_distance_cm: u16,
    pub moving_energy: u8,
    pub static_distance_cm: u16,
    pub static_energy: u8,
    pub detection_distance_cm: u16,
    /// Present on engineering-mode reports only
    pub engineering: Option<EngineeringData>,
}

impl Report {
    /// True if any target (moving or static) is currently detected
    pub fn presence_detected(&self) -> bool {
        self.target_state != TargetState::NoTarget
    }

    /// Parse a report-dialect frame payload
    pub(crate) fn from_payload(p: &[u8]) -> Result<Report, FrameError> {
        // kind, mark, state, 3x (distance u16 + energy u8), terminator
        if p.len() < 13 {
            return Err(FrameError::TooShort);
        }
        if p[1] != REPORT_MARK || p[p.len() - 2..] != REPORT_TERM {
            return Err(FrameError::SchemaMismatch);
        }
        let target_state =
            TargetState::from_bits(p[2]).ok_or(FrameError::SchemaMismatch)?;
        let report = Report {
            target_state,
            moving_distance_cm: u16::from_le_bytes([p[3], p[4]]),
            moving_energy: p[5],
            static_distance_cm: u16::from_le_bytes([p[6], p[7]]),
            static_energy: p[8],
            detection_distance_cm: u16::from_le_bytes([p[9], p[10]]),
            engineering: None,
        };
        match p[0] {
            REPORT_BASIC => {
                if p.len() != 13 {
                    return Err(FrameError::SchemaMismatch);
                }
                Ok(report)
            }
            REPORT_ENGINEERING => {
                let engineering = parse_engineering(&p[11..p.len() - 2])?;
                Ok(Report { engineering: Some(engineering), ..report })
            }
            _ => Err(FrameError::SchemaMismatch),
        }
    }
}

fn parse_engineering(body: &[u8]) -> Result<EngineeringData, FrameError> {
    if body.len() < 3 {
        return Err(FrameError::TooShort);
    }
    let max_gate = body[0];
    let gates = max_gate as usize + 1;
    if gates > GATE_COUNT {
        return Err(FrameError::SchemaMismatch);
    }
    let energies = &body[3..];
    let (light_level, out_pin_high) = match energies.len().checked_sub(2 * gates) {
        Some(0) => (None, None),
        Some(2) => (
            Some(energies[2 * gates]),
            Some(energies[2 * gates + 1] != 0),
        ),
        _ => return Err(FrameError::SchemaMismatch),
    };
    let mut moving_gate_energy = [0u8; GATE_COUNT];
    let mut static_gate_energy = [0u8; GATE_COUNT];
    moving_gate_energy[..gates].copy_from_slice(&energies[..gates]);
    static_gate_energy[..gates].copy_from_slice(&energies[gates..2 * gates]);
    Ok(EngineeringData {
        max_gate,
        max_moving_gate: body[1],
        max_static_gate: body[2],
        moving_gate_energy,
        static_gate_energy,
        light_level,
        out_pin_high,
    })
}

/// Copyable handle onto the session's report distribution
pub struct Reports<'d, const QUEUE: usize = 64> {
    pub(crate) shared: &'d Shared<QUEUE>,
}

impl<const QUEUE: usize> Clone for Reports<'_, QUEUE> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<const QUEUE: usize> Copy for Reports<'_, QUEUE> {}

impl<'d, const QUEUE: usize> Reports<'d, QUEUE> {
    /// Latest report seen this session, or `None` before the first one
    pub fn last_report(&self) -> Option<Report> {
        self.shared.latest.lock(|cell| cell.get())
    }

    /// Wait for the next report to arrive after this call
    pub async fn next_report(&self) -> Result<Report, Ld2410Error> {
        let mut sub = self
            .shared
            .events
            .subscriber()
            .map_err(|_| Ld2410Error::TooManySubscribers)?;
        if self.shared.link_down().is_some() {
            return Err(Ld2410Error::Disconnected);
        }
        loop {
            match sub.next_message_pure().await {
                Event::Report(report) => return Ok(report),
                Event::Down(_) => return Err(Ld2410Error::Disconnected),
            }
        }
    }

    /// Subscribe to every report arriving after this call. The stream ends
    /// when the session does; a slow consumer loses oldest reports only.
    pub fn subscribe(&self) -> Result<ReportStream<'d, QUEUE>, Ld2410Error> {
        let sub = self
            .shared
            .events
            .subscriber()
            .map_err(|_| Ld2410Error::TooManySubscribers)?;
        if self.shared.link_down().is_some() {
            return Err(Ld2410Error::Disconnected);
        }
        Ok(ReportStream { sub, done: false })
    }
}

/// Ordered, bounded stream of reports for one subscriber
pub struct ReportStream<'d, const QUEUE: usize = 64> {
    sub: Subscriber<'d, CriticalSectionRawMutex, Event, QUEUE, MAX_SUBSCRIBERS, 1>,
    done: bool,
}

impl<const QUEUE: usize> ReportStream<'_, QUEUE> {
    /// Next report in arrival order, or `None` once the session ends
    pub async fn next(&mut self) -> Option<Report> {
        if self.done {
            return None;
        }
        loop {
            match self.sub.next_message().await {
                WaitResult::Message(Event::Report(report)) => return Some(report),
                WaitResult::Message(Event::Down(_)) => {
                    self.done = true;
                    return None;
                }
                WaitResult::Lagged(_n) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("report subscriber lagged, {} reports lost", _n);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_report() {
        let payload = [
            0x02, 0xAA, 0x01, 0x78, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x78, 0x00, 0x55, 0x00,
        ];
        let report = Report::from_payload(&payload).unwrap();
        assert_eq!(report.target_state, TargetState::Moving);
        assert!(report.target_state.moving());
        assert!(!report.target_state.stationary());
        assert!(report.presence_detected());
        assert_eq!(report.moving_distance_cm, 120);
        assert_eq!(report.moving_energy, 42);
        assert_eq!(report.static_distance_cm, 0);
        assert_eq!(report.static_energy, 0);
        assert_eq!(report.detection_distance_cm, 120);
        assert!(report.engineering.is_none());
    }

    #[test]
    fn engineering_report_with_light() {
        let mut payload = heapless::Vec::<u8, 48>::new();
        payload
            .extend_from_slice(&[
                0x01, 0xAA, 0x03, 0x50, 0x00, 0x37, 0x4B, 0x00, 0x28, 0x50, 0x00,
            ])
            .unwrap();
        payload.extend_from_slice(&[0x08, 0x08, 0x08]).unwrap();
        payload
            .extend_from_slice(&[90, 80, 70, 60, 50, 40, 30, 20, 10])
            .unwrap();
        payload
            .extend_from_slice(&[9, 8, 7, 6, 5, 4, 3, 2, 1])
            .unwrap();
        payload.extend_from_slice(&[0x80, 0x01]).unwrap();
        payload.extend_from_slice(&REPORT_TERM).unwrap();

        let report = Report::from_payload(&payload).unwrap();
        assert_eq!(report.target_state, TargetState::MovingAndStatic);
        let eng = report.engineering.unwrap();
        assert_eq!(eng.max_gate, 8);
        assert_eq!(eng.moving_gate_energy, [90, 80, 70, 60, 50, 40, 30, 20, 10]);
        assert_eq!(eng.static_gate_energy, [9, 8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(eng.light_level, Some(0x80));
        assert_eq!(eng.out_pin_high, Some(true));
    }

    #[test]
    fn engineering_report_without_light() {
        let mut payload = heapless::Vec::<u8, 48>::new();
        payload
            .extend_from_slice(&[
                0x01, 0xAA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ])
            .unwrap();
        // two gates only on this (hypothetical) configuration
        payload.extend_from_slice(&[0x01, 0x01, 0x01]).unwrap();
        payload.extend_from_slice(&[15, 25]).unwrap();
        payload.extend_from_slice(&[35, 45]).unwrap();
        payload.extend_from_slice(&REPORT_TERM).unwrap();

        let report = Report::from_payload(&payload).unwrap();
        assert!(!report.presence_detected());
        let eng = report.engineering.unwrap();
        assert_eq!(eng.max_gate, 1);
        assert_eq!(eng.moving_gate_energy[..2], [15, 25]);
        assert_eq!(eng.static_gate_energy[..2], [35, 45]);
        assert_eq!(eng.light_level, None);
        assert_eq!(eng.out_pin_high, None);
    }

    #[test]
    fn rejects_malformed_payloads() {
        // missing terminator
        let payload = [
            0x02, 0xAA, 0x01, 0x78, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x78, 0x00, 0x55, 0x01,
        ];
        assert_eq!(Report::from_payload(&payload), Err(FrameError::SchemaMismatch));
        // unknown type byte
        let payload = [
            0x03, 0xAA, 0x01, 0x78, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x78, 0x00, 0x55, 0x00,
        ];
        assert_eq!(Report::from_payload(&payload), Err(FrameError::SchemaMismatch));
        // out-of-range target state
        let payload = [
            0x02, 0xAA, 0x07, 0x78, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x78, 0x00, 0x55, 0x00,
        ];
        assert_eq!(Report::from_payload(&payload), Err(FrameError::SchemaMismatch));
        assert_eq!(Report::from_payload(&[0x02, 0xAA]), Err(FrameError::TooShort));
    }
}
