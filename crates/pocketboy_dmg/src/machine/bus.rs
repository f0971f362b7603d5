use bitflags::bitflags;

use super::serial::Serial;
use crate::cpu::Bus;
use crate::error::{CoreError, Result};
use pocketboy_common::Key;

/// I/O register addresses. Part of the compatibility contract: games and
/// test ROMs address these ports directly, so the values never change.
pub mod io {
    pub const JOYP: u16 = 0xFF00;
    pub const SB: u16 = 0xFF01;
    pub const SC: u16 = 0xFF02;
    pub const DIV: u16 = 0xFF04;
    pub const TIMA: u16 = 0xFF05;
    pub const TMA: u16 = 0xFF06;
    pub const TAC: u16 = 0xFF07;
    pub const IF: u16 = 0xFF0F;

    pub const NR10: u16 = 0xFF10;
    pub const NR11: u16 = 0xFF11;
    pub const NR12: u16 = 0xFF12;
    pub const NR13: u16 = 0xFF13;
    pub const NR14: u16 = 0xFF14;
    pub const NR21: u16 = 0xFF16;
    pub const NR22: u16 = 0xFF17;
    pub const NR23: u16 = 0xFF18;
    pub const NR24: u16 = 0xFF19;
    pub const NR30: u16 = 0xFF1A;
    pub const NR31: u16 = 0xFF1B;
    pub const NR32: u16 = 0xFF1C;
    pub const NR33: u16 = 0xFF1D;
    pub const NR34: u16 = 0xFF1E;
    pub const NR41: u16 = 0xFF20;
    pub const NR42: u16 = 0xFF21;
    pub const NR43: u16 = 0xFF22;
    pub const NR44: u16 = 0xFF23;
    pub const NR50: u16 = 0xFF24;
    pub const NR51: u16 = 0xFF25;
    pub const NR52: u16 = 0xFF26;
    pub const WAVE_START: u16 = 0xFF30;
    pub const WAVE_END: u16 = 0xFF3F;

    pub const LCDC: u16 = 0xFF40;
    pub const STAT: u16 = 0xFF41;
    pub const SCY: u16 = 0xFF42;
    pub const SCX: u16 = 0xFF43;
    pub const LY: u16 = 0xFF44;
    pub const LYC: u16 = 0xFF45;
    pub const DMA: u16 = 0xFF46;
    pub const BGP: u16 = 0xFF47;
    pub const OBP0: u16 = 0xFF48;
    pub const OBP1: u16 = 0xFF49;
    pub const WY: u16 = 0xFF4A;
    pub const WX: u16 = 0xFF4B;
    pub const BOOT: u16 = 0xFF50;

    pub const IE: u16 = 0xFFFF;
}

bitflags! {
    /// LCD control register bits.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Lcdc: u8 {
        const LCD_ENABLE          = 0x80;
        const WINDOW_TILE_MAP     = 0x40;
        const WINDOW_ENABLE       = 0x20;
        const BG_WINDOW_TILE_DATA = 0x10;
        const BG_TILE_MAP         = 0x08;
        const OBJ_SIZE            = 0x04;
        const OBJ_ENABLE          = 0x02;
        const BG_WINDOW_ENABLE    = 0x01;
    }
}

/// What a write into the ROM range does.
///
/// Real cartridges decode such writes as mapper commands; with no mapper
/// modelled there is nothing meaningful to do with them. `Ignore` (the
/// default) silently discards the write, which is what ROMs probing for a
/// mapper expect. `Fault` turns the write into `CoreError::RomWrite` for
/// debugging runs that want to catch stray stores.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RomWritePolicy {
    #[default]
    Ignore,
    Fault,
}

/// Address-space regions, in address order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Region {
    Rom,
    TileData,
    TileMaps,
    ExtRam,
    Wram,
    EchoRam,
    Oam,
    Unused,
    Io,
    Hram,
    IeReg,
}

/// Region base addresses, ascending. Classification is a lower-bound
/// search: an address belongs to the last region whose base does not
/// exceed it.
const REGION_BASES: [(u16, Region); 11] = [
    (0x0000, Region::Rom),
    (0x8000, Region::TileData),
    (0x9800, Region::TileMaps),
    (0xA000, Region::ExtRam),
    (0xC000, Region::Wram),
    (0xE000, Region::EchoRam),
    (0xFE00, Region::Oam),
    (0xFEA0, Region::Unused),
    (0xFF00, Region::Io),
    (0xFF80, Region::Hram),
    (0xFFFF, Region::IeReg),
];

fn classify(addr: u16) -> Region {
    let idx = REGION_BASES.partition_point(|&(base, _)| base <= addr);
    // Base 0x0000 guarantees idx >= 1.
    REGION_BASES[idx - 1].1
}

/// Sound registers, storage only. The original hardware layout is kept
/// (named ports plus the 16-byte wave pattern) but nothing sequences
/// audio from them.
#[derive(Clone, Debug, Default)]
struct AudioRegs {
    nr10: u8,
    nr11: u8,
    nr12: u8,
    nr13: u8,
    nr14: u8,
    nr21: u8,
    nr22: u8,
    nr23: u8,
    nr24: u8,
    nr30: u8,
    nr31: u8,
    nr32: u8,
    nr33: u8,
    nr34: u8,
    nr41: u8,
    nr42: u8,
    nr43: u8,
    nr44: u8,
    nr50: u8,
    nr51: u8,
    nr52: u8,
    wave: [u8; 16],
}

impl AudioRegs {
    fn read(&self, addr: u16) -> Option<u8> {
        Some(match addr {
            io::NR10 => self.nr10,
            io::NR11 => self.nr11,
            io::NR12 => self.nr12,
            io::NR13 => self.nr13,
            io::NR14 => self.nr14,
            io::NR21 => self.nr21,
            io::NR22 => self.nr22,
            io::NR23 => self.nr23,
            io::NR24 => self.nr24,
            io::NR30 => self.nr30,
            io::NR31 => self.nr31,
            io::NR32 => self.nr32,
            io::NR33 => self.nr33,
            io::NR34 => self.nr34,
            io::NR41 => self.nr41,
            io::NR42 => self.nr42,
            io::NR43 => self.nr43,
            io::NR44 => self.nr44,
            io::NR50 => self.nr50,
            io::NR51 => self.nr51,
            io::NR52 => self.nr52,
            io::WAVE_START..=io::WAVE_END => self.wave[(addr - io::WAVE_START) as usize],
            _ => return None,
        })
    }

    fn write(&mut self, addr: u16, value: u8) -> bool {
        match addr {
            io::NR10 => self.nr10 = value,
            io::NR11 => self.nr11 = value,
            io::NR12 => self.nr12 = value,
            io::NR13 => self.nr13 = value,
            io::NR14 => self.nr14 = value,
            io::NR21 => self.nr21 = value,
            io::NR22 => self.nr22 = value,
            io::NR23 => self.nr23 = value,
            io::NR24 => self.nr24 = value,
            io::NR30 => self.nr30 = value,
            io::NR31 => self.nr31 = value,
            io::NR32 => self.nr32 = value,
            io::NR33 => self.nr33 = value,
            io::NR34 => self.nr34 = value,
            io::NR41 => self.nr41 = value,
            io::NR42 => self.nr42 = value,
            io::NR43 => self.nr43 = value,
            io::NR44 => self.nr44 = value,
            io::NR50 => self.nr50 = value,
            io::NR51 => self.nr51 = value,
            io::NR52 => self.nr52 = value,
            io::WAVE_START..=io::WAVE_END => self.wave[(addr - io::WAVE_START) as usize] = value,
            _ => return false,
        }
        true
    }
}

/// The DMG address space: every memory region plus the I/O ports, behind
/// the `Bus` trait the CPU executes through.
///
/// Regions are separate owned buffers; the router classifies an address
/// and indexes the right one. External RAM, echo RAM, and the 0xFEA0
/// band are deliberately unimplemented and surface as errors.
pub struct DmgBus {
    rom: Vec<u8>,
    boot_image: [u8; 0x100],
    /// While set, reads below 0x100 come from `boot_image` instead of the
    /// cartridge. Cleared by writing the boot register (0xFF50).
    pub(crate) boot_mapped: bool,
    pub(crate) rom_write_policy: RomWritePolicy,

    pub(crate) vram_tiles: [u8; 0x1800],
    pub(crate) vram_maps: [u8; 0x800],
    oam: [u8; 0xA0],
    wram: [u8; 0x2000],
    hram: [u8; 0x7F],

    // Joypad: select bits as last written (P1 bits 4-5, active low), and
    // pressed-button masks with bit=1 meaning pressed:
    // dpad    bit0=Right, bit1=Left, bit2=Up,     bit3=Down
    // buttons bit0=A,     bit1=B,    bit2=Select, bit3=Start
    joyp_select: u8,
    joyp_dpad: u8,
    joyp_buttons: u8,

    pub(crate) serial: Serial,

    div: u8,
    tima: u8,
    tma: u8,
    tac: u8,

    pub(crate) if_reg: u8,
    pub(crate) ie_reg: u8,

    audio: AudioRegs,

    pub(crate) lcdc: Lcdc,
    stat: u8,
    pub(crate) scy: u8,
    pub(crate) scx: u8,
    pub(crate) ly: u8,
    lyc: u8,
    pub(crate) bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    /// Backing store for I/O-window addresses with no named register
    /// (undocumented and unmodelled ports, e.g. DMA at 0xFF46).
    misc_io: [u8; 0x80],
}

impl Default for DmgBus {
    fn default() -> Self {
        Self {
            rom: Vec::new(),
            boot_image: [0; 0x100],
            boot_mapped: false,
            rom_write_policy: RomWritePolicy::default(),
            vram_tiles: [0; 0x1800],
            vram_maps: [0; 0x800],
            oam: [0; 0xA0],
            wram: [0; 0x2000],
            hram: [0; 0x7F],
            // No group selected.
            joyp_select: 0x30,
            joyp_dpad: 0,
            joyp_buttons: 0,
            serial: Serial::default(),
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            if_reg: 0,
            ie_reg: 0,
            audio: AudioRegs::default(),
            lcdc: Lcdc::empty(),
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            misc_io: [0; 0x80],
        }
    }
}

impl DmgBus {
    /// Bus in the state the boot ROM leaves the I/O ports in.
    pub(crate) fn new_post_boot() -> Self {
        let mut bus = Self::default();
        bus.lcdc = Lcdc::from_bits_retain(0x91);
        bus.bgp = 0xFC;
        bus.obp0 = 0xFF;
        bus.obp1 = 0xFF;
        bus
    }

    pub(crate) fn load_rom(&mut self, rom: Vec<u8>) {
        self.rom = rom;
    }

    pub(crate) fn load_boot_image(&mut self, image: [u8; 0x100]) {
        self.boot_image = image;
    }

    /// Clear all memory and I/O state for a boot-ROM restart, keeping the
    /// loaded ROM, the boot image, and the ROM write policy; the boot
    /// overlay comes up mapped.
    pub(crate) fn reset_for_boot(&mut self) {
        let rom = std::mem::take(&mut self.rom);
        let boot_image = self.boot_image;
        let policy = self.rom_write_policy;

        *self = Self::default();
        self.rom = rom;
        self.boot_image = boot_image;
        self.rom_write_policy = policy;
        self.boot_mapped = true;
    }

    /// Latch a key transition into the joypad masks. A press additionally
    /// requests the Joypad interrupt.
    pub(crate) fn handle_key(&mut self, key: Key, pressed: bool) {
        let (mask, dpad) = match key {
            Key::Right => (0x01, true),
            Key::Left => (0x02, true),
            Key::Up => (0x04, true),
            Key::Down => (0x08, true),
            Key::Z | Key::A => (0x01, false),
            Key::X | Key::B => (0x02, false),
            Key::Space => (0x04, false),
            Key::Enter | Key::S => (0x08, false),
            _ => return,
        };
        let group = if dpad {
            &mut self.joyp_dpad
        } else {
            &mut self.joyp_buttons
        };
        if pressed {
            *group |= mask;
            self.if_reg |= 0x10;
        } else {
            *group &= !mask;
        }
    }

    /// Compose the joypad port from the select lines and pressed masks.
    /// Active low throughout: a selected group pulls the bits of its
    /// pressed buttons to 0; with nothing selected the low nibble reads
    /// all ones. Bits 6-7 are unwired and read as 1.
    fn joyp_read(&self) -> u8 {
        let mut nibble = 0x0F;
        if self.joyp_select & 0x10 == 0 {
            nibble &= !self.joyp_dpad;
        }
        if self.joyp_select & 0x20 == 0 {
            nibble &= !self.joyp_buttons;
        }
        0xC0 | self.joyp_select | nibble
    }

    fn io_read(&mut self, addr: u16) -> u8 {
        if let Some(value) = self.audio.read(addr) {
            return value;
        }
        match addr {
            io::JOYP => self.joyp_read(),
            io::SB => self.serial.sb,
            io::SC => self.serial.sc,
            io::DIV => self.div,
            io::TIMA => self.tima,
            io::TMA => self.tma,
            io::TAC => self.tac,
            io::IF => self.if_reg,
            io::LCDC => self.lcdc.bits(),
            io::STAT => self.stat,
            io::SCY => self.scy,
            io::SCX => self.scx,
            io::LY => self.ly,
            io::LYC => self.lyc,
            io::BGP => self.bgp,
            io::OBP0 => self.obp0,
            io::OBP1 => self.obp1,
            io::WY => self.wy,
            io::WX => self.wx,
            io::BOOT => !self.boot_mapped as u8,
            _ => self.misc_io[(addr - 0xFF00) as usize],
        }
    }

    fn io_write(&mut self, addr: u16, value: u8) {
        if self.audio.write(addr, value) {
            return;
        }
        match addr {
            // Pressed-button bits are read-only; only the select lines
            // are writable.
            io::JOYP => self.joyp_select = value & 0x30,
            io::SB => self.serial.write_sb(value),
            io::SC => {
                if self.serial.write_sc(value) {
                    self.if_reg |= 0x08;
                }
            }
            io::DIV => self.div = value,
            io::TIMA => self.tima = value,
            io::TMA => self.tma = value,
            io::TAC => self.tac = value,
            io::IF => self.if_reg = value,
            io::LCDC => self.lcdc = Lcdc::from_bits_retain(value),
            io::STAT => self.stat = value,
            io::SCY => self.scy = value,
            io::SCX => self.scx = value,
            // LY is recomputed by the display machine every tick; storing
            // the write is harmless.
            io::LY => self.ly = value,
            io::LYC => self.lyc = value,
            io::BGP => self.bgp = value,
            io::OBP0 => self.obp0 = value,
            io::OBP1 => self.obp1 = value,
            io::WY => self.wy = value,
            io::WX => self.wx = value,
            io::BOOT => {
                if value & 1 != 0 && self.boot_mapped {
                    log::debug!("boot overlay unmapped");
                    self.boot_mapped = false;
                }
            }
            _ => self.misc_io[(addr - 0xFF00) as usize] = value,
        }
    }
}

impl Bus for DmgBus {
    fn read8(&mut self, addr: u16) -> Result<u8> {
        let value = match classify(addr) {
            Region::Rom => {
                if self.boot_mapped && addr < 0x100 {
                    self.boot_image[addr as usize]
                } else {
                    // Open bus past the end of the loaded image.
                    self.rom.get(addr as usize).copied().unwrap_or(0xFF)
                }
            }
            Region::TileData => self.vram_tiles[(addr - 0x8000) as usize],
            Region::TileMaps => self.vram_maps[(addr - 0x9800) as usize],
            Region::ExtRam => {
                return Err(CoreError::UnimplementedRegion {
                    region: "external RAM",
                    addr,
                })
            }
            Region::Wram => self.wram[(addr - 0xC000) as usize],
            Region::EchoRam => {
                return Err(CoreError::UnimplementedRegion {
                    region: "echo RAM",
                    addr,
                })
            }
            Region::Oam => self.oam[(addr - 0xFE00) as usize],
            Region::Unused => {
                return Err(CoreError::UnimplementedRegion {
                    region: "unused band",
                    addr,
                })
            }
            Region::Io => self.io_read(addr),
            Region::Hram => self.hram[(addr - 0xFF80) as usize],
            Region::IeReg => self.ie_reg,
        };
        Ok(value)
    }

    fn write8(&mut self, addr: u16, value: u8) -> Result<()> {
        match classify(addr) {
            Region::Rom => match self.rom_write_policy {
                RomWritePolicy::Ignore => {
                    log::debug!("ignored ROM write 0x{value:02X} at 0x{addr:04X}")
                }
                RomWritePolicy::Fault => return Err(CoreError::RomWrite { addr }),
            },
            Region::TileData => self.vram_tiles[(addr - 0x8000) as usize] = value,
            Region::TileMaps => self.vram_maps[(addr - 0x9800) as usize] = value,
            Region::ExtRam => {
                return Err(CoreError::UnimplementedRegion {
                    region: "external RAM",
                    addr,
                })
            }
            Region::Wram => self.wram[(addr - 0xC000) as usize] = value,
            Region::EchoRam => {
                return Err(CoreError::UnimplementedRegion {
                    region: "echo RAM",
                    addr,
                })
            }
            Region::Oam => self.oam[(addr - 0xFE00) as usize] = value,
            Region::Unused => {
                return Err(CoreError::UnimplementedRegion {
                    region: "unused band",
                    addr,
                })
            }
            Region::Io => self.io_write(addr, value),
            Region::Hram => self.hram[(addr - 0xFF80) as usize] = value,
            Region::IeReg => self.ie_reg = value,
        }
        Ok(())
    }
}
