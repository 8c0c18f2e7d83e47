use crate::domain::light::{Light, LightState};
use crate::hue::bridge::BridgeError;
use crate::hue::domain::LightGet;
use std::collections::HashMap;

pub fn map_light(id: u32, light: LightGet) -> Light {
    Light {
        id,
        name: light.name,
        model_id: light.modelid,
        state: LightState {
            on: light.state.on,
            reachable: light.state.reachable,
            brightness: light.state.bri,
        },
    }
}

/// Maps the `GET /lights` object, keyed by light id, to lights ordered by id.
pub fn map_lights(lights: HashMap<String, LightGet>) -> Result<Vec<Light>, BridgeError> {
    let mut lights = lights
        .into_iter()
        .map(|(id, light)| {
            let light_id = id.parse::<u32>().map_err(|_| BridgeError::InvalidLightId { id })?;
            Ok(map_light(light_id, light))
        })
        .collect::<Result<Vec<_>, BridgeError>>()?;

    lights.sort_by_key(|light| light.id);
    Ok(lights)
}
