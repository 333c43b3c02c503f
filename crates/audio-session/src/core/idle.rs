use crate::messages::{InternalEvent, SessionMsg};
use crate::platform::OutputOverride;

use super::AudioSessionCore;

impl AudioSessionCore {
    /// Called whenever nothing holds the session. Calls and recordings let go of the
    /// hardware at once; playback keeps it for the configured grace period so back-to-back
    /// items don't bounce the session.
    pub(super) fn schedule_idle_release(&mut self) {
        let Some((session_type, _)) = self.current else {
            return;
        };
        if session_type.releases_immediately() {
            tracing::debug!(session_type = session_type.tag(), "releasing audio session now");
            self.apply_none();
            return;
        }
        if self.idle_release_pending {
            return;
        }

        self.idle_release_token = self.idle_release_token.wrapping_add(1);
        self.idle_release_pending = true;
        let token = self.idle_release_token;
        let delay = self.config.idle_release_delay();
        tracing::debug!(
            token,
            delay_ms = self.config.idle_release_delay_ms,
            "idle release scheduled"
        );

        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionMsg::Internal(Box::new(
                InternalEvent::IdleReleaseTimer { token },
            )));
        });
    }

    pub(super) fn cancel_idle_release(&mut self) {
        if !self.idle_release_pending {
            return;
        }
        tracing::debug!(token = self.idle_release_token, "idle release cancelled");
        self.idle_release_pending = false;
        self.idle_release_token = self.idle_release_token.wrapping_add(1);
    }

    pub(super) fn handle_idle_release_timer(&mut self, token: u64) {
        if !self.idle_release_pending || token != self.idle_release_token {
            tracing::debug!(token, "stale idle release timer");
            return;
        }
        self.apply_none();
    }

    /// Gives the hardware session back and clears the current config.
    pub(super) fn apply_none(&mut self) {
        self.cancel_idle_release();
        let was_active = self.current.is_some();
        let was_playback = self.is_playback_active();
        self.current = None;

        tracing::info!("releasing audio session hardware");
        if let Err(err) = self.release_hardware() {
            tracing::warn!(%err, "audio session release failed");
        }

        self.publish_activity(was_active, was_playback);
    }

    fn release_hardware(&self) -> Result<(), crate::error::PlatformError> {
        self.platform.set_active(false)?;
        self.platform.override_output_port(OutputOverride::None)?;
        self.platform.set_preferred_input(None)
    }
}
