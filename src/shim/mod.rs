mod backoff;
mod dumb_switch;

pub use dumb_switch::DumbSwitchShim;
