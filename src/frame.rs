//! # Wire frame codec
//!
//! The LD2410 multiplexes two frame dialects on one UART bytestream,
//! distinguished by their magic markers:
//!
//! - Command/Ack: `FD FC FB FA | len:u16 le | payload | 04 03 02 01`
//! - Report:      `F4 F3 F2 F1 | len:u16 le | payload | F8 F7 F6 F5`
//!
//! `len` counts payload bytes only. Command payloads start with a
//! little-endian command code; the matching ack carries the same code with
//! bit 8 set, a status word, and optional reply arguments.

use heapless::Vec;

/// Head marker of the command/ack dialect
pub const CMD_HEAD: [u8; 4] = [0xFD, 0xFC, 0xFB, 0xFA];
/// Trailer marker of the command/ack dialect
pub const CMD_TAIL: [u8; 4] = [0x04, 0x03, 0x02, 0x01];
/// Head marker of the report dialect
pub const REPORT_HEAD: [u8; 4] = [0xF4, 0xF3, 0xF2, 0xF1];
/// Trailer marker of the report dialect
pub const REPORT_TAIL: [u8; 4] = [0xF8, 0xF7, 0xF6, 0xF5];

/// Bit set in the command code of every ack
pub const ACK_FLAG: u16 = 0x0100;

/// Largest payload either dialect carries (engineering report with all
/// nine gates plus light/pin bytes, or a full set-parameters command)
pub const MAX_PAYLOAD: usize = 48;
/// Largest complete frame on the wire
pub const MAX_FRAME: usize = MAX_PAYLOAD + 10;

/// Frame dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameKind {
    Command,
    Report,
}

impl FrameKind {
    pub fn head(&self) -> &'static [u8; 4] {
        match self {
            FrameKind::Command => &CMD_HEAD,
            FrameKind::Report => &REPORT_HEAD,
        }
    }

    pub fn tail(&self) -> &'static [u8; 4] {
        match self {
            FrameKind::Command => &CMD_TAIL,
            FrameKind::Report => &REPORT_TAIL,
        }
    }
}

/// Codec error. All variants are recoverable at the stream layer by
/// resynchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Not enough bytes for a complete frame
    TooShort,
    /// Head or trailer marker does not match the dialect
    BadMagic,
    /// Length field points past the supplied bytes
    Truncated,
    /// Payload does not match the expected layout
    SchemaMismatch,
}

/// A validated whole frame of either dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl Frame {
    /// Build a command frame around an already-serialised command payload
    pub fn command(payload: &[u8]) -> Result<Frame, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::SchemaMismatch)?;
        Ok(Frame { kind: FrameKind::Command, payload })
    }

    /// Serialise to the full wire image: head, length, payload, trailer
    pub fn encode(&self) -> Vec<u8, MAX_FRAME> {
        let mut out = Vec::new();
        // capacity is MAX_PAYLOAD + 10, payload is bounded by MAX_PAYLOAD
        let _ = out.extend_from_slice(self.kind.head());
        let _ = out.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        let _ = out.extend_from_slice(&self.payload);
        let _ = out.extend_from_slice(self.kind.tail());
        out
    }

    /// Decode exactly one frame of the given dialect from `bytes`
    pub fn decode(kind: FrameKind, bytes: &[u8]) -> Result<Frame, FrameError> {
        if bytes.len() < 10 {
            return Err(FrameError::TooShort);
        }
        if bytes[..4] != *kind.head() {
            return Err(FrameError::BadMagic);
        }
        let len = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;
        if len > MAX_PAYLOAD {
            return Err(FrameError::SchemaMismatch);
        }
        let total = 6 + len + 4;
        if bytes.len() < total {
            return Err(FrameError::Truncated);
        }
        if bytes[6 + len..total] != *kind.tail() {
            return Err(FrameError::BadMagic);
        }
        let payload = Vec::from_slice(&bytes[6..6 + len]).map_err(|_| FrameError::SchemaMismatch)?;
        Ok(Frame { kind, payload })
    }
}

/// Parsed ack payload: request code with the ack flag stripped, device
/// status word, and any reply arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub code: u16,
    pub status: u16,
    pub args: Vec<u8, MAX_PAYLOAD>,
}

impl Ack {
    /// Parse a command-dialect payload as an ack
    pub fn parse(payload: &[u8]) -> Result<Ack, FrameError> {
        if payload.len() < 4 {
            return Err(FrameError::TooShort);
        }
        let raw = u16::from_le_bytes([payload[0], payload[1]]);
        if raw & ACK_FLAG == 0 {
            // the device never echoes bare commands back
            return Err(FrameError::SchemaMismatch);
        }
        let status = u16::from_le_bytes([payload[2], payload[3]]);
        let args =
            Vec::from_slice(&payload[4..]).map_err(|_| FrameError::SchemaMismatch)?;
        Ok(Ack { code: raw & !ACK_FLAG, status, args })
    }

    pub fn ok(&self) -> bool {
        self.status == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_enter_config() {
        let frame = Frame::command(&[0xFF, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(
            frame.encode().as_slice(),
            &[
                0xFD, 0xFC, 0xFB, 0xFA, 0x04, 0x00, 0xFF, 0x00, 0x01, 0x00, 0x04, 0x03,
                0x02, 0x01
            ]
        );
    }

    #[test]
    fn roundtrip_both_dialects() {
        let cmd = Frame::command(&[0x61, 0x00]).unwrap();
        assert_eq!(Frame::decode(FrameKind::Command, &cmd.encode()).unwrap(), cmd);

        let report = Frame {
            kind: FrameKind::Report,
            payload: Vec::from_slice(&[
                0x02, 0xAA, 0x01, 0x78, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x78, 0x00, 0x55,
                0x00,
            ])
            .unwrap(),
        };
        assert_eq!(Frame::decode(FrameKind::Report, &report.encode()).unwrap(), report);
    }

    #[test]
    fn decode_rejects_bad_markers() {
        let mut bytes = Frame::command(&[0xFE, 0x00]).unwrap().encode();
        assert_eq!(
            Frame::decode(FrameKind::Report, &bytes),
            Err(FrameError::BadMagic)
        );
        let last = bytes.len() - 1;
        bytes[last] = 0xEE;
        assert_eq!(
            Frame::decode(FrameKind::Command, &bytes),
            Err(FrameError::BadMagic)
        );
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(
            Frame::decode(FrameKind::Command, &CMD_HEAD),
            Err(FrameError::TooShort)
        );
        // valid header claiming more payload than supplied
        let bytes = [0xFD, 0xFC, 0xFB, 0xFA, 0x20, 0x00, 0x61, 0x00, 0x04, 0x03, 0x02, 0x01];
        assert_eq!(
            Frame::decode(FrameKind::Command, &bytes),
            Err(FrameError::Truncated)
        );
    }

    #[test]
    fn ack_parse() {
        let ack = Ack::parse(&[0xFF, 0x01, 0x00, 0x00, 0x01, 0x00, 0x40, 0x00]).unwrap();
        assert_eq!(ack.code, 0x00FF);
        assert_eq!(ack.status, 0);
        assert!(ack.ok());
        assert_eq!(ack.args.as_slice(), &[0x01, 0x00, 0x40, 0x00]);

        let failed = Ack::parse(&[0x60, 0x01, 0x01, 0x00]).unwrap();
        assert_eq!(failed.code, 0x0060);
        assert_eq!(failed.status, 1);
        assert!(!failed.ok());
    }

    #[test]
    fn ack_parse_rejects_non_ack() {
        assert_eq!(Ack::parse(&[0x61, 0x00]), Err(FrameError::TooShort));
        // code without the ack flag
        assert_eq!(
            Ack::parse(&[0x61, 0x00, 0x00, 0x00]),
            Err(FrameError::SchemaMismatch)
        );
    }
}
