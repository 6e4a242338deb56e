// ── Live-data storage ──

mod collection;
mod live_data;

pub use live_data::{DeviceSnapshot, LiveDataStore, ParameterReading};
