//! Programmed-I/O devices other than the disk controller.
//!
//! - `NullDevice`: answers every unmapped address
//! - `Console`: system console ('04) over a `Terminal`
//! - `Tape`: magtape controller stub ('14)
//! - `ControlPanel`: sense switches and lights ('20)

mod console;
mod null;
mod panel;
mod tape;

pub use console::Console;
pub use null::NullDevice;
pub use panel::ControlPanel;
pub use tape::Tape;

/// Conventional device addresses.
pub mod addr {
    /// System console
    pub const CONSOLE: u8 = 0o04;
    /// First magtape controller
    pub const TAPE: u8 = 0o14;
    /// Control panel / real-time clock
    pub const CONTROL_PANEL: u8 = 0o20;
    /// First disk controller
    pub const DISK0: u8 = 0o26;
    /// Second disk controller
    pub const DISK1: u8 = 0o27;
}
