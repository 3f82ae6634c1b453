//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements | Connects to                 |
//! |--------------|------------|-----------------------------|
//! | `sysfs_gpio` | GpioPort   | Linux `/sys/class/gpio`     |
//! | `sim_gpio`   | GpioPort   | In-memory board (dry runs)  |
//! | `log_sink`   | EventSink  | `log` facade                |
//! | `time`       | Clock      | Host local time             |

pub mod log_sink;
pub mod sim_gpio;
pub mod sysfs_gpio;
pub mod time;
