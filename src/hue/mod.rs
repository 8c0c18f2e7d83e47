mod bridge;
mod client;
mod domain;
mod map_lights;
mod observer;

pub use bridge::HueBridge;
pub use client::new_client;
pub use observer::{observe, unknown_light_ids};
