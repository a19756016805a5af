use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::drivers::RasterError;
use crate::types::{IntWidth, WireFormat};

/// Display and wire settings. Unset fields in a config file keep the defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Window width W in discrete positions; one tick shifts every mark by one.
    pub window_width: u32,
    /// Wall-clock span T covered by one full window.
    pub window_span_ms: u32,
    /// Time unit a reported count refers to.
    pub rate_interval_ms: u32,
    pub logarithmic: bool,
    pub show_legend: bool,
    pub wire_format: WireFormat,
    pub int_width: IntWidth,
    pub title: String,
}

impl Default for RasterConfig {
    fn default() -> Self {
        // 100 positions covering one second, counts reported per second.
        Self {
            window_width: 100,
            window_span_ms: 1000,
            rate_interval_ms: 1000,
            logarithmic: false,
            show_legend: false,
            wire_format: WireFormat::RateCount,
            int_width: IntWidth::U8,
            title: "Spikes".to_owned(),
        }
    }
}

impl RasterConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: RasterConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RasterError> {
        if self.window_width == 0 {
            return Err(RasterError::Config("window width must be greater than zero".into()));
        }
        if self.window_span_ms == 0 {
            return Err(RasterError::Config("window span must be greater than zero".into()));
        }
        if self.rate_interval_ms == 0 {
            return Err(RasterError::Config("rate interval must be greater than zero".into()));
        }
        Ok(())
    }

    /// Number of ticks that elapse during one rate interval.
    pub fn ticks_per_rate_interval(&self) -> f64 {
        self.window_width as f64 * self.rate_interval_ms as f64 / self.window_span_ms as f64
    }

    /// Wall time represented by one tick.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(self.window_span_ms as f64 / 1000.0 / self.window_width as f64)
    }

    /// Axis caption for the window span, e.g. "1 sec" or "250 ms".
    pub fn span_label(&self) -> String {
        if self.window_span_ms % 1000 == 0 {
            format!("{} sec", self.window_span_ms / 1000)
        } else {
            format!("{} ms", self.window_span_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_one_second_window() {
        let config = RasterConfig::default();
        assert_eq!(config.ticks_per_rate_interval(), 100.0);
        assert_eq!(config.tick_period(), Duration::from_millis(10));
        assert_eq!(config.span_label(), "1 sec");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_width_is_rejected() {
        let config = RasterConfig {
            window_width: 0,
            ..RasterConfig::default()
        };
        assert!(matches!(config.validate(), Err(RasterError::Config(_))));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RasterConfig =
            serde_json::from_str(r#"{"window_span_ms": 500, "wire_format": "one_hot"}"#).unwrap();
        assert_eq!(config.window_width, 100);
        assert_eq!(config.wire_format, WireFormat::OneHot);
        assert_eq!(config.ticks_per_rate_interval(), 200.0);
        assert_eq!(config.span_label(), "500 ms");
    }
}
