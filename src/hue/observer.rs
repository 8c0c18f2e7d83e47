use crate::app_config::AppConfig;
use crate::domain::light::Light;
use crate::domain::light_api::{LightApi, LightApiError};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

#[instrument(skip_all)]
pub async fn observe(api: &dyn LightApi) -> Result<Vec<Light>, LightApiError> {
    info!("Retrieving Hue lights...");

    let lights = api.lights().await?;
    info!("Retrieving Hue lights... OK, {} found", lights.len());

    for light in &lights {
        let position = if light.state.on { "on" } else { "off" };
        #[rustfmt::skip]
        debug!(light_id = light.id, reachable = light.state.reachable, "💡 Light '{}' ({}) is {}", light.name, light.model_id.as_deref().unwrap_or("unknown model"), position);
    }

    Ok(lights)
}

/// Returns the `(switch, light id)` pairs of every configured light the bridge does not know.
pub fn unknown_light_ids(config: &AppConfig, lights: &[Light]) -> Vec<(String, u32)> {
    let known_ids = lights.iter().map(|light| light.id).collect::<HashSet<_>>();
    let known = &known_ids;

    config
        .dumb_switches()
        .iter()
        .flat_map(|(name, switch)| {
            switch
                .trigger_light_ids()
                .iter()
                .chain(switch.target_light_ids())
                .filter(move |light_id| !known.contains(*light_id))
                .map(move |light_id| (name.clone(), *light_id))
        })
        .collect()
}
