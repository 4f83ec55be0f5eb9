//! # System control API
//!
//! Module-level commands: firmware identification, serial speed, distance
//! resolution, bluetooth, light control, factory reset and restart. All of
//! these require an open [`ConfigMode`] session.
//!
//! ## Available Methods
//!
//! ### Identification
//! - [`get_firmware_version`](ConfigMode::get_firmware_version) - Read the firmware version triple
//! - [`get_mac_address`](ConfigMode::get_mac_address) - Read the bluetooth MAC address
//!
//! ### Serial and Resolution
//! - [`set_baud_rate`](ConfigMode::set_baud_rate) - Select the serial speed (applies after restart)
//! - [`set_distance_resolution`](ConfigMode::set_distance_resolution) - Select the gate width (applies after restart)
//! - [`get_distance_resolution`](ConfigMode::get_distance_resolution) - Read the configured gate width
//!
//! ### Bluetooth
//! - [`set_bluetooth_mode`](ConfigMode::set_bluetooth_mode) - Enable or disable the bluetooth radio
//! - [`set_bluetooth_password`](ConfigMode::set_bluetooth_password) - Set the pairing password
//!
//! ### Light Control
//! - [`set_light_control`](ConfigMode::set_light_control) - Configure the auxiliary light function
//! - [`get_light_control`](ConfigMode::get_light_control) - Read the auxiliary light configuration
//!
//! ### Lifecycle
//! - [`factory_reset`](ConfigMode::factory_reset) - Restore factory configuration
//! - [`restart_module`](ConfigMode::restart_module) - Reboot the module, ending the configuration session

use embedded_io_async::Write;

pub use crate::cmd::cmd_system::{
    BaudRate, DistanceResolution, FirmwareVersion, LightControl, LightFunction,
    MacAddress, OutPinLevel,
};
use crate::cmd::cmd_system::{
    factory_reset_cmd, firmware_version_req, get_distance_resolution_req,
    get_light_control_req, light_control_from_ack_args, mac_address_req,
    restart_module_cmd, set_baud_rate_cmd, set_bluetooth_mode_cmd,
    set_bluetooth_password_cmd, set_distance_resolution_cmd, set_light_control_cmd,
};
use crate::config::ConfigMode;
use crate::{Ld2410Error, Mode};

impl<W: Write, const QUEUE: usize> ConfigMode<'_, '_, W, QUEUE> {
    /// Read the firmware version triple
    pub async fn get_firmware_version(
        &mut self,
    ) -> Result<FirmwareVersion, Ld2410Error<W::Error>> {
        let ack = self.dev.command(&firmware_version_req(), Mode::Configuring).await?;
        FirmwareVersion::from_ack_args(&ack.args).ok_or(Ld2410Error::BadReply)
    }

    /// Select the serial speed. The device keeps the old speed until the
    /// module is restarted.
    pub async fn set_baud_rate(
        &mut self,
        baud: BaudRate,
    ) -> Result<(), Ld2410Error<W::Error>> {
        self.dev.command(&set_baud_rate_cmd(baud), Mode::Configuring).await?;
        Ok(())
    }

    /// Restore the factory configuration. Takes effect after restart.
    pub async fn factory_reset(&mut self) -> Result<(), Ld2410Error<W::Error>> {
        self.dev.command(&factory_reset_cmd(), Mode::Configuring).await?;
        Ok(())
    }

    /// Enable or disable the bluetooth radio
    pub async fn set_bluetooth_mode(
        &mut self,
        enabled: bool,
    ) -> Result<(), Ld2410Error<W::Error>> {
        self.dev.command(&set_bluetooth_mode_cmd(enabled), Mode::Configuring).await?;
        Ok(())
    }

    /// Read the bluetooth MAC address. Modules without a bluetooth chip
    /// report the all-zero sentinel, see [`MacAddress::is_absent`].
    pub async fn get_mac_address(&mut self) -> Result<MacAddress, Ld2410Error<W::Error>> {
        let ack = self.dev.command(&mac_address_req(), Mode::Configuring).await?;
        MacAddress::from_ack_args(&ack.args).ok_or(Ld2410Error::BadReply)
    }

    /// Set the bluetooth pairing password: exactly six ASCII characters,
    /// validated before anything is transmitted
    pub async fn set_bluetooth_password(
        &mut self,
        password: &str,
    ) -> Result<(), Ld2410Error<W::Error>> {
        let bytes = password.as_bytes();
        if bytes.len() != 6 || !password.is_ascii() {
            return Err(Ld2410Error::InvalidParam);
        }
        let mut fixed = [0u8; 6];
        fixed.copy_from_slice(bytes);
        self.dev
            .command(&set_bluetooth_password_cmd(&fixed), Mode::Configuring)
            .await?;
        Ok(())
    }

    /// Select the gate width. The device keeps the old resolution until
    /// the module is restarted.
    pub async fn set_distance_resolution(
        &mut self,
        resolution: DistanceResolution,
    ) -> Result<(), Ld2410Error<W::Error>> {
        self.dev
            .command(&set_distance_resolution_cmd(resolution), Mode::Configuring)
            .await?;
        Ok(())
    }

    /// Read the configured gate width.
    ///
    /// Device quirk: after [`set_distance_resolution`] but before the
    /// restart that applies it, this may already return the pending value.
    ///
    /// [`set_distance_resolution`]: ConfigMode::set_distance_resolution
    pub async fn get_distance_resolution(
        &mut self,
    ) -> Result<DistanceResolution, Ld2410Error<W::Error>> {
        let ack =
            self.dev.command(&get_distance_resolution_req(), Mode::Configuring).await?;
        if ack.args.len() < 2 {
            return Err(Ld2410Error::BadReply);
        }
        let index = u16::from_le_bytes([ack.args[0], ack.args[1]]);
        DistanceResolution::try_from(index).map_err(|_| Ld2410Error::BadReply)
    }

    /// Configure the auxiliary light control. Firmwares without the light
    /// path reject this with a non-zero status, surfaced verbatim as
    /// [`Ld2410Error::CmdFailed`].
    pub async fn set_light_control(
        &mut self,
        control: LightControl,
    ) -> Result<(), Ld2410Error<W::Error>> {
        self.dev.command(&set_light_control_cmd(control), Mode::Configuring).await?;
        Ok(())
    }

    /// Read the auxiliary light control configuration
    pub async fn get_light_control(
        &mut self,
    ) -> Result<LightControl, Ld2410Error<W::Error>> {
        let ack = self.dev.command(&get_light_control_req(), Mode::Configuring).await?;
        light_control_from_ack_args(&ack.args).ok_or(Ld2410Error::BadReply)
    }

    /// Reboot the module, consuming the configuration session.
    ///
    /// The device acks and then re-enumerates, so a missing ack and a
    /// restart-induced transport loss both count as success. On a host
    /// serial adapter the session then ends and further operations fail
    /// with [`Ld2410Error::Disconnected`]; on a direct UART the device
    /// comes back by itself and resumes reporting.
    pub async fn restart_module(mut self) -> Result<(), Ld2410Error<W::Error>> {
        self.done = true;
        self.dev.shared.expect_restart();
        match self.dev.command(&restart_module_cmd(), Mode::Configuring).await {
            Ok(_) | Err(Ld2410Error::ModuleRestarted) | Err(Ld2410Error::ReplyTimeout) => {
                Ok(())
            }
            Err(error) => {
                // the device did not take the restart
                self.dev.shared.clear_restart();
                Err(error)
            }
        }
    }
}
