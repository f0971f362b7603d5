mod bus;
mod dmg;
mod ppu;
mod serial;


pub use bus::{io, DmgBus, Lcdc, RomWritePolicy};
pub use dmg::Dmg;
pub use ppu::{Frame, Mode, Ppu};
