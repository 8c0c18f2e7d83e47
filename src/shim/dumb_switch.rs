use crate::app_config::{DumbSwitch, Shim};
use crate::domain::SwitchPosition;
use crate::domain::commands::Command;
use crate::domain::light::LightState;
use crate::domain::light_api::{LightApi, LightApiError};
use crate::log_level::LogLevel;
use crate::shim::backoff::quadratic_backoff;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::sleep;
use tokio_retry::Retry;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::filter::LevelFilter;

/// Mirrors a dumb wall switch onto Hue lights.
///
/// The switch cuts the power of its trigger lights, which makes them unreachable on the bridge. Whenever the
/// reachability of the trigger lights changes, the target lights are turned on or off to match.
#[derive(Debug)]
pub struct DumbSwitchShim {
    name: String,
    trigger_light_ids: Vec<u32>,
    target_light_ids: Vec<u32>,
    timings: Shim,
    api: Arc<dyn LightApi>,
    log_level: LogLevel,
    position: SwitchPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    TurnedOn,
    TurnedOff,
    Unchanged(SwitchPosition),
}

impl DumbSwitchShim {
    /// Creates the shim, taking the current reachability of the trigger lights as the switch position.
    pub async fn new(
        name: impl Into<String>,
        switch: &DumbSwitch,
        timings: Shim,
        api: Arc<dyn LightApi>,
        log_level: LogLevel,
    ) -> Self {
        let mut shim = DumbSwitchShim {
            name: name.into(),
            trigger_light_ids: switch.trigger_light_ids().to_vec(),
            target_light_ids: switch.target_light_ids().to_vec(),
            timings,
            api,
            log_level,
            position: SwitchPosition::Off,
        };

        if shim.target_light_ids.is_empty() {
            warn!(switch = shim.name, "⚠️ Switch '{}' has no target lights", shim.name);
        }

        shim.position = shim.triggers_reachable().await.into();
        shim
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> SwitchPosition {
        self.position
    }

    #[instrument(skip(self), fields(switch = %self.name))]
    pub async fn run(mut self) {
        info!("🟢 Started switch shim '{}' (position {})", self.name, self.position);

        loop {
            let interval = match self.position {
                SwitchPosition::On => self.timings.on_poll_interval(),
                SwitchPosition::Off => self.timings.off_poll_interval(),
            };
            sleep(interval).await;

            self.poll().await;
        }
    }

    /// Checks the trigger lights once and switches the target lights when the switch was flipped.
    pub async fn poll(&mut self) -> Transition {
        let any_reachable = self.triggers_reachable().await;

        match (any_reachable, self.position) {
            (true, SwitchPosition::Off) => self.flip(SwitchPosition::On).await,
            (false, SwitchPosition::On) => self.flip(SwitchPosition::Off).await,
            (_, position) => {
                debug!(switch = self.name, "Switch '{}' still {}", self.name, position);
                Transition::Unchanged(position)
            }
        }
    }

    /// Returns whether any trigger light is reachable. A failed status request counts as unreachable.
    #[instrument(skip(self), fields(switch = %self.name))]
    pub async fn triggers_reachable(&self) -> bool {
        for &light_id in &self.trigger_light_ids {
            match self.api.light(light_id).await {
                Ok(light) if light.state.reachable => return true,
                Ok(_) => {}
                Err(e) if e.is_unreachable() => {
                    warn!(light_id, "⚠️ Unable to reach the bridge: {}", e);
                    break;
                }
                Err(e) => {
                    warn!(light_id, "⚠️ Unable to get the status of light {}: {}", light_id, e);
                    break;
                }
            }
        }

        false
    }

    /// Turns a light on or off and reads it back to make sure it followed.
    #[instrument(skip(self), fields(switch = %self.name))]
    pub async fn toggle_light(&self, light_id: u32, on: bool) -> Result<LightState, ToggleError> {
        info!(light_id, "💡 Turning {} light {}", SwitchPosition::from(on), light_id);
        self.api.execute(&Command::SetOn { light_id, on }).await?;

        // Lights occasionally ignore a command when their Zigbee link is broken
        sleep(self.timings.verify_delay()).await;

        let light = self.api.light(light_id).await?;
        if light.state.on != on {
            return Err(ToggleError::StateMismatch {
                light_id,
                expected: on.into(),
                actual: light.state.on.into(),
            });
        }

        Ok(light.state)
    }

    async fn flip(&mut self, target: SwitchPosition) -> Transition {
        let _guard = self.log_level.raise(LevelFilter::DEBUG);
        info!(switch = self.name, "🔀 Switch '{}' turned {}", self.name, target);

        let switched = self.switch_targets(target).await;
        if switched == 0 && !self.target_light_ids.is_empty() {
            warn!(switch = self.name, "⚠️ No target light of switch '{}' could be turned {}", self.name, target);
            return Transition::Unchanged(self.position);
        }

        self.position = target;
        match target {
            SwitchPosition::On => Transition::TurnedOn,
            SwitchPosition::Off => Transition::TurnedOff,
        }
    }

    /// Switches every target light, retrying each one. Returns how many lights followed.
    async fn switch_targets(&self, target: SwitchPosition) -> usize {
        let on = target.is_on();
        let mut switched = 0;

        for &light_id in &self.target_light_ids {
            let strategy = quadratic_backoff(self.timings.backoff_unit(), self.timings.toggle_attempts());
            let result = Retry::spawn(strategy, move || async move {
                self.toggle_light(light_id, on)
                    .await
                    .inspect_err(|e| warn!(light_id, "⚠️ Unable to turn {} light {}: {}", target, light_id, e))
            })
            .await;

            match result {
                Ok(state) => {
                    debug!(light_id, ?state, "Light {} is {}", light_id, target);
                    switched += 1;
                }
                Err(e) => {
                    #[rustfmt::skip]
                    warn!(light_id, "⚠️ Giving up on light {} after {} attempt(s): {}", light_id, self.timings.toggle_attempts(), e);
                }
            }
        }

        switched
    }
}

#[derive(Error, Debug)]
pub enum ToggleError {
    #[error(transparent)]
    Api(#[from] LightApiError),
    #[error("light '{light_id}' is {actual}, expected it to be {expected}")]
    StateMismatch {
        light_id: u32,
        expected: SwitchPosition,
        actual: SwitchPosition,
    },
}
