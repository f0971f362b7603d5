use pocketboy_common::Key;

use super::bus::{DmgBus, Lcdc, RomWritePolicy};
use super::ppu::{Frame, Ppu};
use crate::cpu::{Bus, Cpu, CpuSnapshot};
use crate::error::Result;
use crate::DOTS_PER_FRAME;

/// The assembled machine: CPU, bus, and display machine, with no state
/// outside this value. The driving loop owns one of these and calls
/// `run_frame` once per output frame.
pub struct Dmg {
    pub cpu: Cpu,
    pub(crate) bus: DmgBus,
    pub(crate) ppu: Ppu,
}

impl Default for Dmg {
    fn default() -> Self {
        Self::new()
    }
}

impl Dmg {
    /// Machine in the post-boot state: registers and I/O ports as the
    /// boot ROM leaves them, overlay disabled, execution at 0x0100.
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            bus: DmgBus::new_post_boot(),
            ppu: Ppu::new(),
        }
    }

    pub fn load_rom(&mut self, rom: Vec<u8>) {
        self.bus.load_rom(rom);
    }

    /// Install a 256-byte boot image. Takes effect on the next
    /// `reset_to_boot_rom`.
    pub fn load_boot_image(&mut self, image: [u8; 0x100]) {
        self.bus.load_boot_image(image);
    }

    /// Restart from the boot image: zeroed registers, PC at 0x0000, boot
    /// overlay mapped over the first 256 bytes of ROM. The loaded ROM and
    /// boot image are kept.
    pub fn reset_to_boot_rom(&mut self) {
        self.cpu = Cpu::new_at_boot_rom();
        self.ppu = Ppu::new();
        self.bus.reset_for_boot();
    }

    pub fn set_rom_write_policy(&mut self, policy: RomWritePolicy) {
        self.bus.rom_write_policy = policy;
    }

    /// Run until the display machine publishes the next frame, then
    /// return it. Propagates any `CoreError` raised by a CPU step.
    ///
    /// With the LCD disabled the display machine never completes a frame;
    /// in that case one frame's worth of dots is executed and the last
    /// published frame returned, so callers keep a steady cadence while a
    /// ROM runs with the screen off.
    pub fn run_frame(&mut self) -> Result<&Frame> {
        let start = self.cpu.dots;
        loop {
            if self.ppu.tick(self.cpu.dots, &mut self.bus) {
                return Ok(self.ppu.frame());
            }
            if !self.bus.lcdc.contains(Lcdc::LCD_ENABLE)
                && self.cpu.dots - start >= DOTS_PER_FRAME
            {
                return Ok(self.ppu.frame());
            }
            self.cpu.step(&mut self.bus)?;
        }
    }

    /// The most recently completed frame.
    pub fn frame(&self) -> &Frame {
        self.ppu.frame()
    }

    pub fn handle_key(&mut self, key: Key, pressed: bool) {
        self.bus.handle_key(key, pressed);
    }

    /// Bytes the running ROM has pushed out of the serial port.
    pub fn serial_output(&self) -> &[u8] {
        &self.bus.serial.output
    }

    /// Capture the observable CPU state plus a 4-byte memory preview at
    /// PC. Unreadable preview bytes (PC parked in an unimplemented
    /// region) show as 0xFF rather than failing the capture.
    pub fn snapshot(&mut self) -> CpuSnapshot {
        let pc = self.cpu.regs.pc;
        let mut pc_mem = [0u8; 4];
        for (i, slot) in pc_mem.iter_mut().enumerate() {
            *slot = self.bus.read8(pc.wrapping_add(i as u16)).unwrap_or(0xFF);
        }
        CpuSnapshot::capture(&self.cpu, pc_mem)
    }
}
