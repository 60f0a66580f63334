//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                      |
//! |----------------|--------------------|----------------------------------|
//! | `hardware`     | LampPort           | Blink engines (MCP23017 + GPIO)  |
//! | `log_sink`     | EventSink          | Serial log output                |
//! | `nvs`          | PatternStore       | NVS / in-memory store            |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
