use anyhow::Result;
use pocketboy_common::{App, Key};

use crate::machine::Dmg;
use crate::{SCREEN_HEIGHT, SCREEN_SCALE, SCREEN_WIDTH};

/// RGB values for the four DMG shades, lightest to darkest.
const SHADE_RGB: [u8; 4] = [0xFF, 0xAA, 0x55, 0x00];

/// Frontend-facing wrapper around the DMG machine.
///
/// Implements the shared `App` trait so a windowed or headless frontend
/// can drive the emulator without knowing anything DMG-specific. Core
/// errors surface through `update`'s result and stop the run.
#[derive(Default)]
pub struct DmgApp {
    pub machine: Dmg,
    should_exit: bool,
    frame_counter: u64,
}

impl DmgApp {
    pub fn new(machine: Dmg) -> Self {
        Self {
            machine,
            should_exit: false,
            frame_counter: 0,
        }
    }
}

impl App for DmgApp {
    fn init(&mut self) {
        log::info!("DMG init, pc=0x{:04X}", self.machine.cpu.regs.pc);
    }

    fn update(&mut self, screen: &mut [u8]) -> Result<()> {
        let frame = self.machine.run_frame()?;
        for (pixel, shade) in screen.chunks_exact_mut(3).zip(frame.iter()) {
            pixel.fill(SHADE_RGB[*shade as usize & 0x3]);
        }

        self.frame_counter = self.frame_counter.wrapping_add(1);
        if self.frame_counter % 60 == 0 {
            log::debug!("frame={} {}", self.frame_counter, self.machine.snapshot());
        }
        Ok(())
    }

    fn handle_key_event(&mut self, key: Key, is_down: bool) {
        if key == Key::Escape {
            if is_down {
                self.should_exit = true;
            }
            return;
        }
        self.machine.handle_key(key, is_down);
    }

    fn should_exit(&self) -> bool {
        self.should_exit
    }

    fn exit(&mut self) {
        log::info!("DMG exit after {} frames", self.frame_counter);
    }

    fn width(&self) -> u32 {
        SCREEN_WIDTH as u32
    }

    fn height(&self) -> u32 {
        SCREEN_HEIGHT as u32
    }

    fn scale(&self) -> u32 {
        SCREEN_SCALE
    }

    fn title(&self) -> String {
        "Pocketboy DMG".to_string()
    }
}
