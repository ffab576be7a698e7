//! Weather data sources: the historical archive feeding the models and the
//! real-time conditions proxy.

pub mod history;
pub mod realtime;

use serde::{Deserialize, Serialize};

pub use history::{HistoryError, HistorySource, WeatherHistory};
pub use realtime::{RealtimeClient, RealtimeError, RealtimeWeather};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}
