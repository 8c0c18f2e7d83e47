mod hue_response;
mod light_get;

pub use hue_response::{ApiEntry, ApiError};
pub use light_get::{LightGet, LightStateGet, StateRequest};
