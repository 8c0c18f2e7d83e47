pub mod commands;
pub mod light;
pub mod light_api;
mod switch_position;

pub use switch_position::SwitchPosition;
