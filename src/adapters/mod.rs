//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                    |
//! |----------------|--------------------|--------------------------------|
//! | `config_file`  | ConfigPort         | JSON file on disk              |
//! | `csv_sink`     | PersistenceSink    | one CSV file per flush         |
//! | `gpio`         | ActuatorPort       | `embedded-hal` output pins     |
//! | `log_sink`     | EventSink          | `log` facade                   |
//! | `metrics`      | HostMetricsPort    | `sysinfo` (or nothing)         |
//! | `sim`          | SensorPort         | logistic growth model          |
//! |                | ActuatorPort       | in-memory output states        |
//! | `time`         | Clock              | `std::time` + `chrono::Local`  |

pub mod config_file;
pub mod csv_sink;
pub mod gpio;
pub mod log_sink;
pub mod metrics;
pub mod sim;
pub mod time;
