//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                   |
//! |------------|--------------------|-------------------------------|
//! | `board`    | ClockPort          | forwards to the three below   |
//! |            | DispenserPort      |                               |
//! |            | ConnectivityPort   |                               |
//! | `hardware` | DispenserPort      | gate servo over LEDC PWM      |
//! | `log_sink` | EventSink          | Serial log output             |
//! | `nvs`      | ConfigPort         | NVS / in-memory store         |
//! |            | StoragePort        |                               |
//! | `time`     | ClockPort          | SNTP-synced system clock      |
//! | `wifi`     | ConnectivityPort   | ESP-IDF WiFi AP + STA         |

pub mod board;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
