//! System-wide constants for the flash programmer workspace.
//!
//! Single source of truth for all numeric limits and default paths.

/// Timer interrupt period in microseconds (1 kHz tick).
pub const DEFAULT_TICK_US: u32 = 1000;

/// Housekeeping message interval in ticks. Must be a power of two.
pub const HOUSEKEEPING_TICKS: u8 = 16;

/// Registry self-check period, counted in housekeeping messages.
/// 1875 × 16 ms ≈ 30 s.
pub const DEFAULT_VERIFY_EVERY_HK: u32 = 1875;

/// Length of one process-status window in microseconds.
pub const ONE_SECOND_US: u64 = 1_000_000;

/// Largest programmable device the address latches can reach (20 address lines).
pub const MAX_DEVICE_SIZE: u32 = 1 << 20;

/// Default simulated device size (4 Mbit part).
pub const DEFAULT_DEVICE_SIZE: u32 = 512 * 1024;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/fprog.toml";

/// Default service name used in logs.
pub const DEFAULT_SERVICE_NAME: &str = "fprog";
