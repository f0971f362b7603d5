pub mod app;
pub mod cpu;
pub mod error;
pub mod machine;

pub use app::DmgApp;
pub use cpu::CpuSnapshot;
pub use error::{CoreError, Result};
pub use machine::{Dmg, Frame, RomWritePolicy};

/// Logical screen width in pixels for the Game Boy DMG.
pub const SCREEN_WIDTH: usize = 160;
/// Logical screen height in pixels.
pub const SCREEN_HEIGHT: usize = 144;
/// Default integer scaling factor for frontends.
pub const SCREEN_SCALE: u32 = 4;

/// Dots (T-cycles) per full frame, including the vertical blank lines.
pub const DOTS_PER_FRAME: u64 = 70_224;
/// Dots per scanline.
pub const DOTS_PER_LINE: u64 = 456;
