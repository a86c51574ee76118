use lagwatch_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};

/// Main lagwatch configuration
///
/// Configuration is loaded from (in priority order):
/// 1. `lagwatch.jsonc` - JSON with comments
/// 2. `lagwatch.json` - Standard JSON
/// 3. `lagwatch.yml` / `lagwatch.yaml` - YAML format
///
/// Also checks hidden variants (`.lagwatch.*`) and `~/.config/lagwatch/` for
/// a global config. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LagwatchConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// The simulated host driven by the console
    #[serde(default)]
    pub host: HostConfig,
}

/// Simulated host settings
///
/// # Example
///
/// ```yaml
/// host:
///   tick_ms: 50
///   use_timings: false
///   owners:
///     - name: Alpha
///       handlers:
///         - listener: tick-scheduler
///           event: ServerTick
///           priority: normal
///           work_micros: 200
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Milliseconds between dispatch rounds (default: 50)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Whether the host keeps its own minimal timings (default: false)
    #[serde(default)]
    pub use_timings: bool,

    #[serde(default = "default_owners")]
    pub owners: Vec<OwnerConfig>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            use_timings: false,
            owners: default_owners(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerConfig {
    pub name: String,

    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub listener: String,

    /// Simple name of an event class in the host catalogue
    pub event: String,

    /// `lowest`, `low`, `normal`, `high`, `highest` or `monitor`
    #[serde(default = "default_priority")]
    pub priority: String,

    /// Time burned on every invocation
    #[serde(default)]
    pub work_micros: u64,

    /// Extra time burned on every `spike_every`-th invocation; 0 disables
    #[serde(default)]
    pub spike_micros: u64,

    #[serde(default)]
    pub spike_every: u64,

    #[serde(default)]
    pub ignore_cancelled: bool,
}

fn default_tick_ms() -> u64 {
    50
}

fn default_priority() -> String {
    "normal".to_string()
}

fn handler(listener: &str, event: &str, priority: &str, work_micros: u64) -> HandlerConfig {
    HandlerConfig {
        listener: listener.to_string(),
        event: event.to_string(),
        priority: priority.to_string(),
        work_micros,
        spike_micros: 0,
        spike_every: 0,
        ignore_cancelled: false,
    }
}

fn default_owners() -> Vec<OwnerConfig> {
    vec![
        OwnerConfig {
            name: "Alpha".to_string(),
            handlers: vec![
                handler("tick-scheduler", "ServerTick", "normal", 200),
                handler("move-tracker", "PlayerMove", "high", 50),
            ],
        },
        OwnerConfig {
            name: "Beta".to_string(),
            handlers: vec![
                HandlerConfig {
                    spike_micros: 8_000,
                    spike_every: 40,
                    ..handler("block-logger", "BlockBreak", "low", 1_500)
                },
                handler("chat-filter", "PlayerChat", "monitor", 100),
            ],
        },
        OwnerConfig {
            name: "Gamma".to_string(),
            handlers: vec![HandlerConfig {
                ignore_cancelled: true,
                ..handler("player-audit", "PlayerEvent", "normal", 20)
            }],
        },
    ]
}
