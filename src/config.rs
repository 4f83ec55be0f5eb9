//! # Configuration mode
//!
//! Every command except enter/leave-config is only accepted while the
//! device is in configuration mode, and the device suspends report frames
//! for the whole span. [`Ld2410::configure`] performs the enter handshake
//! and returns a [`ConfigMode`] guard carrying the command methods; the
//! mutable borrow makes a second concurrent entry impossible.
//!
//! Call [`ConfigMode::exit`] to send leave-config and resume reporting.
//! Dropping the guard without `exit` restores the driver state and logs a
//! warning, but cannot transmit: the device then stays in configuration
//! mode (and silent) until `configure` is entered again or the module is
//! restarted.

use embedded_io_async::Write;

use crate::cmd::cmd_config::{ConfigHandshake, enter_config_cmd, leave_config_cmd};
use crate::{Ld2410, Ld2410Error, Mode};

impl<'d, W: Write, const QUEUE: usize> Ld2410<'d, W, QUEUE> {
    /// Enter configuration mode.
    ///
    /// Sends enter-config and waits for its ack; fails with
    /// [`Ld2410Error::AlreadyConfiguring`] if a previous entry was never
    /// closed.
    pub async fn configure(
        &mut self,
    ) -> Result<ConfigMode<'_, 'd, W, QUEUE>, Ld2410Error<W::Error>> {
        let ack = self.command(&enter_config_cmd(), Mode::Connected).await?;
        let handshake =
            ConfigHandshake::from_ack_args(&ack.args).ok_or(Ld2410Error::BadReply)?;
        self.shared.set_mode(Mode::Configuring);
        Ok(ConfigMode { dev: self, handshake, done: false })
    }
}

/// Active configuration-mode session.
///
/// All configuration commands live on this guard; see
/// [`detection`](crate::detection) and [`system`](crate::system) for the
/// full list.
pub struct ConfigMode<'a, 'd, W, const QUEUE: usize = 64> {
    pub(crate) dev: &'a mut Ld2410<'d, W, QUEUE>,
    handshake: ConfigHandshake,
    pub(crate) done: bool,
}

impl<W: Write, const QUEUE: usize> ConfigMode<'_, '_, W, QUEUE> {
    /// Protocol version and buffer size reported by the enter-config ack
    pub fn handshake(&self) -> ConfigHandshake {
        self.handshake
    }

    /// Send leave-config and return the session to reporting.
    ///
    /// The device resumes report frames within about one report period.
    pub async fn exit(mut self) -> Result<(), Ld2410Error<W::Error>> {
        self.done = true;
        let result = self.dev.command(&leave_config_cmd(), Mode::Configuring).await;
        result.map(|_| ())
    }
}

impl<W, const QUEUE: usize> Drop for ConfigMode<'_, '_, W, QUEUE> {
    fn drop(&mut self) {
        self.dev.shared.set_mode(Mode::Connected);
        if !self.done {
            #[cfg(feature = "defmt")]
            defmt::warn!("configuration mode dropped without exit; device still configuring");
        }
    }
}
