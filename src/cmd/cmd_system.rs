// System commands API

use core::fmt;

/// Serial speed selection. The index is what goes on the wire; the new
/// speed only applies after a module restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaudRate {
    B9600 = 1,
    B19200 = 2,
    B38400 = 3,
    B57600 = 4,
    B115200 = 5,
    B230400 = 6,
    /// Factory default
    B256000 = 7,
    B460800 = 8,
}

impl BaudRate {
    /// Speed in bits per second
    pub fn bps(&self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
            BaudRate::B230400 => 230400,
            BaudRate::B256000 => 256000,
            BaudRate::B460800 => 460800,
        }
    }
}

/// Gate width selection. Applies after a module restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DistanceResolution {
    /// 75 cm per gate
    Coarse = 0,
    /// 20 cm per gate
    Fine = 1,
}

impl TryFrom<u16> for DistanceResolution {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, ()> {
        match value {
            0 => Ok(DistanceResolution::Coarse),
            1 => Ok(DistanceResolution::Fine),
            _ => Err(()),
        }
    }
}

/// Condition under which the light threshold gates the OUT pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LightFunction {
    /// Light level is ignored
    Off = 0,
    /// OUT asserts only when the light level is below the threshold
    Below = 1,
    /// OUT asserts only when the light level is above the threshold
    Above = 2,
}

impl TryFrom<u8> for LightFunction {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(LightFunction::Off),
            1 => Ok(LightFunction::Below),
            2 => Ok(LightFunction::Above),
            _ => Err(()),
        }
    }
}

/// Idle level of the OUT pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutPinLevel {
    Low = 0,
    High = 1,
}

/// Auxiliary light control configuration. Not all firmwares support it;
/// unsupported ones fail the command with a non-zero status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LightControl {
    pub function: LightFunction,
    pub threshold: u8,
    pub default_level: OutPinLevel,
}

/// Firmware version triple as reported by the device. The revision is a
/// BCD-coded word, rendered digit for digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub revision: u32,
}

impl FirmwareVersion {
    pub(crate) fn from_ack_args(args: &[u8]) -> Option<FirmwareVersion> {
        // leading u16 firmware type, then major, minor, revision
        if args.len() < 8 {
            return None;
        }
        Some(FirmwareVersion {
            major: args[2],
            minor: args[3],
            revision: u32::from_le_bytes([args[4], args[5], args[6], args[7]]),
        })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{:X}.{:02X}.{:08X}", self.major, self.minor, self.revision)
    }
}

/// Bluetooth MAC address. All-zero when the module has no bluetooth chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub(crate) fn from_ack_args(args: &[u8]) -> Option<MacAddress> {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(args.get(..6)?);
        Some(MacAddress(mac))
    }

    /// True for the all-zero sentinel reported by bluetooth-less modules
    pub fn is_absent(&self) -> bool {
        self.0 == [0u8; 6]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Read the firmware version
pub fn firmware_version_req() -> [u8; 2] {
    [0xA0, 0x00]
}

/// Select the serial speed. Takes effect after restart.
pub fn set_baud_rate_cmd(baud: BaudRate) -> [u8; 4] {
    let mut cmd = [0u8; 4];
    cmd[0] = 0xA1;
    cmd[1] = 0x00;
    cmd[2..4].copy_from_slice(&(baud as u16).to_le_bytes());
    cmd
}

/// Restore factory configuration. Takes effect after restart.
pub fn factory_reset_cmd() -> [u8; 2] {
    [0xA2, 0x00]
}

/// Reboot the module. The device leaves configuration mode and stops
/// responding while it re-enumerates.
pub fn restart_module_cmd() -> [u8; 2] {
    [0xA3, 0x00]
}

/// Enable or disable the bluetooth radio
pub fn set_bluetooth_mode_cmd(enabled: bool) -> [u8; 4] {
    let mut cmd = [0u8; 4];
    cmd[0] = 0xA4;
    cmd[1] = 0x00;
    if enabled {
        cmd[2] = 0x01;
    }
    cmd
}

/// Read the bluetooth MAC address
pub fn mac_address_req() -> [u8; 4] {
    [0xA5, 0x00, 0x01, 0x00]
}

/// Set the bluetooth pairing password (six ASCII bytes)
pub fn set_bluetooth_password_cmd(password: &[u8; 6]) -> [u8; 8] {
    let mut cmd = [0u8; 8];
    cmd[0] = 0xA9;
    cmd[1] = 0x00;
    cmd[2..8].copy_from_slice(password);
    cmd
}

/// Select the gate width. Takes effect after restart.
pub fn set_distance_resolution_cmd(resolution: DistanceResolution) -> [u8; 4] {
    let mut cmd = [0u8; 4];
    cmd[0] = 0xAA;
    cmd[1] = 0x00;
    cmd[2..4].copy_from_slice(&(resolution as u16).to_le_bytes());
    cmd
}

/// Read the configured gate width
pub fn get_distance_resolution_req() -> [u8; 2] {
    [0xAB, 0x00]
}

/// Configure the auxiliary light control
pub fn set_light_control_cmd(control: LightControl) -> [u8; 6] {
    let mut cmd = [0u8; 6];
    cmd[0] = 0xAD;
    cmd[1] = 0x00;
    cmd[2] = control.function as u8;
    cmd[3] = control.threshold;
    cmd[4] = control.default_level as u8;
    cmd
}

/// Read the auxiliary light control configuration
pub fn get_light_control_req() -> [u8; 2] {
    [0xAE, 0x00]
}

pub(crate) fn light_control_from_ack_args(args: &[u8]) -> Option<LightControl> {
    if args.len() < 4 {
        return None;
    }
    Some(LightControl {
        function: LightFunction::try_from(args[0]).ok()?,
        threshold: args[1],
        default_level: if args[2] == 0 { OutPinLevel::Low } else { OutPinLevel::High },
    })
}

#[cfg(test)]
mod tests {
    use core::fmt::Write;

    use super::*;

    #[test]
    fn builders() {
        assert_eq!(firmware_version_req(), [0xA0, 0x00]);
        assert_eq!(set_baud_rate_cmd(BaudRate::B256000), [0xA1, 0x00, 0x07, 0x00]);
        assert_eq!(set_bluetooth_mode_cmd(true), [0xA4, 0x00, 0x01, 0x00]);
        assert_eq!(set_bluetooth_mode_cmd(false), [0xA4, 0x00, 0x00, 0x00]);
        assert_eq!(mac_address_req(), [0xA5, 0x00, 0x01, 0x00]);
        assert_eq!(
            set_bluetooth_password_cmd(b"HiLink"),
            [0xA9, 0x00, b'H', b'i', b'L', b'i', b'n', b'k']
        );
        assert_eq!(
            set_distance_resolution_cmd(DistanceResolution::Fine),
            [0xAA, 0x00, 0x01, 0x00]
        );
        let control = LightControl {
            function: LightFunction::Above,
            threshold: 0x50,
            default_level: OutPinLevel::Low,
        };
        assert_eq!(set_light_control_cmd(control), [0xAD, 0x00, 0x02, 0x50, 0x00, 0x00]);
    }

    #[test]
    fn firmware_version_reply() {
        let version =
            FirmwareVersion::from_ack_args(&[0x01, 0x00, 0x02, 0x04, 0x11, 0x25, 0x02, 0x23])
                .unwrap();
        assert_eq!(version.major, 2);
        assert_eq!(version.minor, 4);
        assert_eq!(version.revision, 0x2302_2511);

        let mut rendered = heapless::String::<24>::new();
        write!(rendered, "{version}").unwrap();
        assert_eq!(rendered.as_str(), "V2.04.23022511");

        assert!(FirmwareVersion::from_ack_args(&[0x01, 0x00, 0x02]).is_none());
    }

    #[test]
    fn mac_address_reply() {
        let mac =
            MacAddress::from_ack_args(&[0x8A, 0x9B, 0xAC, 0xBD, 0xCE, 0xDF]).unwrap();
        assert!(!mac.is_absent());
        let mut rendered = heapless::String::<20>::new();
        write!(rendered, "{mac}").unwrap();
        assert_eq!(rendered.as_str(), "8A:9B:AC:BD:CE:DF");

        let absent = MacAddress::from_ack_args(&[0; 6]).unwrap();
        assert!(absent.is_absent());
        assert!(MacAddress::from_ack_args(&[0x8A, 0x9B]).is_none());
    }

    #[test]
    fn light_control_reply() {
        let control = light_control_from_ack_args(&[0x01, 0x50, 0x01, 0x00]).unwrap();
        assert_eq!(control.function, LightFunction::Below);
        assert_eq!(control.threshold, 0x50);
        assert_eq!(control.default_level, OutPinLevel::High);
        assert!(light_control_from_ack_args(&[0x07, 0x50, 0x01, 0x00]).is_none());
        assert!(light_control_from_ack_args(&[0x01, 0x50]).is_none());
    }
}
