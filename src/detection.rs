//! # Detection configuration API
//!
//! Commands shaping what the sensor considers a target: gate limits,
//! presence timeout, per-gate sensitivity thresholds, and the engineering
//! report layout. All of these require an open [`ConfigMode`] session.
//!
//! ## Available Methods
//!
//! - [`get_parameters`](ConfigMode::get_parameters) - Read gate limits, timeout and per-gate sensitivities
//! - [`set_parameters`](ConfigMode::set_parameters) - Set gate limits and presence timeout
//! - [`set_gate_sensitivity`](ConfigMode::set_gate_sensitivity) - Set sensitivity for one gate or all gates
//! - [`set_engineering_mode`](ConfigMode::set_engineering_mode) - Toggle the engineering report layout

use embedded_io_async::Write;

pub use crate::cmd::cmd_detection::{GateSelect, MAX_ENERGY, MAX_GATE, Parameters};
use crate::cmd::cmd_detection::{
    ParametersRsp, get_parameters_req, set_gate_sensitivity_cmd, set_parameters_cmd,
    start_engineering_cmd, stop_engineering_cmd,
};
use crate::config::ConfigMode;
use crate::{Ld2410Error, Mode};

impl<W: Write, const QUEUE: usize> ConfigMode<'_, '_, W, QUEUE> {
    /// Read the current detection parameters
    pub async fn get_parameters(&mut self) -> Result<Parameters, Ld2410Error<W::Error>> {
        let ack = self.dev.command(&get_parameters_req(), Mode::Configuring).await?;
        let rsp = ParametersRsp::from_slice(&ack.args).ok_or(Ld2410Error::BadReply)?;
        Ok(rsp.into())
    }

    /// Set the gate limits and presence timeout.
    ///
    /// Gates range 0..=8 and the moving/static limits may not exceed
    /// `max_distance_gate`; violations fail before anything is
    /// transmitted.
    pub async fn set_parameters(
        &mut self,
        max_distance_gate: u8,
        max_moving_gate: u8,
        max_static_gate: u8,
        presence_timeout_s: u16,
    ) -> Result<(), Ld2410Error<W::Error>> {
        if max_distance_gate > MAX_GATE
            || max_moving_gate > max_distance_gate
            || max_static_gate > max_distance_gate
        {
            return Err(Ld2410Error::InvalidParam);
        }
        let payload = set_parameters_cmd(
            max_distance_gate,
            max_moving_gate,
            max_static_gate,
            presence_timeout_s,
        );
        self.dev.command(&payload, Mode::Configuring).await?;
        Ok(())
    }

    /// Set the moving and static sensitivity thresholds (0..=100) for one
    /// gate, or for every gate with [`GateSelect::All`]
    pub async fn set_gate_sensitivity(
        &mut self,
        gate: GateSelect,
        moving: u8,
        statik: u8,
    ) -> Result<(), Ld2410Error<W::Error>> {
        if moving > MAX_ENERGY || statik > MAX_ENERGY {
            return Err(Ld2410Error::InvalidParam);
        }
        if let GateSelect::Gate(index) = gate {
            if index > MAX_GATE {
                return Err(Ld2410Error::InvalidParam);
            }
        }
        let payload = set_gate_sensitivity_cmd(gate, moving, statik);
        self.dev.command(&payload, Mode::Configuring).await?;
        Ok(())
    }

    /// Toggle engineering mode. Reports switch layout from the next frame
    /// after leaving configuration mode.
    pub async fn set_engineering_mode(
        &mut self,
        enabled: bool,
    ) -> Result<(), Ld2410Error<W::Error>> {
        let payload =
            if enabled { start_engineering_cmd() } else { stop_engineering_cmd() };
        self.dev.command(&payload, Mode::Configuring).await?;
        Ok(())
    }
}
