pub mod cli;
pub mod fixed_hex;
pub mod fork_schedule;
pub mod networks;

pub use fork_schedule::{ForkName, ForkSchedule, ScheduledFork};
pub use networks::{MAINNET, MINIMAL, NetworkSpec};
