use super::bus::{DmgBus, Lcdc};
use crate::{DOTS_PER_FRAME, DOTS_PER_LINE, SCREEN_HEIGHT, SCREEN_WIDTH};

/// One 160x144 frame of 2-bit shades (0 = lightest, 3 = darkest), already
/// resolved through the background palette. Frontends map shades to real
/// colors.
pub type Frame = [u8; SCREEN_WIDTH * SCREEN_HEIGHT];

/// LCD controller modes. Derived from the dot counter on every tick; only
/// the last observed mode is stored, to detect transitions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    HBlank,
    VBlank,
    OamScan,
    Draw,
}

/// Scanline-timed background renderer.
///
/// A pure function of the dot counter and the bus: `tick` derives LY and
/// the mode from the counter, emits background pixels during Draw, and
/// publishes the finished frame on VBlank entry. It performs no stepping
/// of its own; the driving loop interleaves it with CPU steps.
pub struct Ppu {
    pub(crate) last_mode: Mode,
    /// Per-scanline pixel cursor: the next column to produce.
    next_pixel: usize,
    working: Box<Frame>,
    completed: Box<Frame>,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            last_mode: Mode::OamScan,
            next_pixel: 0,
            working: Box::new([0; SCREEN_WIDTH * SCREEN_HEIGHT]),
            completed: Box::new([0; SCREEN_WIDTH * SCREEN_HEIGHT]),
        }
    }

    /// The most recently completed frame.
    pub fn frame(&self) -> &Frame {
        &self.completed
    }

    #[cfg(test)]
    pub(crate) fn working_frame(&self) -> &Frame {
        &self.working
    }

    /// Advance the display machine to `dots`. Returns true exactly once
    /// per frame, on VBlank entry, after the completed frame has been
    /// published and IF bit 0 requested.
    pub fn tick(&mut self, dots: u64, bus: &mut DmgBus) -> bool {
        if !bus.lcdc.contains(Lcdc::LCD_ENABLE) {
            // Known gap: the screen should blank here instead of keeping
            // the last published frame.
            return false;
        }

        let frame_dot = dots % DOTS_PER_FRAME;
        let line_dot = frame_dot % DOTS_PER_LINE;
        bus.ly = (frame_dot / DOTS_PER_LINE) as u8;

        // Vertical blank: lines 144..=153.
        if (144..=153).contains(&bus.ly) {
            if self.last_mode != Mode::VBlank {
                self.last_mode = Mode::VBlank;
                bus.if_reg |= 0x01;
                std::mem::swap(&mut self.working, &mut self.completed);
                self.working.fill(0);
                return true;
            }
            return false;
        }

        // OAM scan: object fetch is not modelled, the mode only exists
        // for transition accounting.
        if self.last_mode != Mode::OamScan && line_dot < 80 {
            self.last_mode = Mode::OamScan;
            return false;
        }

        if (80..252).contains(&line_dot) {
            self.last_mode = Mode::Draw;
            // The first 12 dots are the fetch delay; afterwards every
            // elapsed dot makes one more column reachable.
            if line_dot >= 92 {
                self.draw_pixels_until((line_dot - 91) as usize, bus);
            }
            return false;
        }

        if self.last_mode != Mode::HBlank && (252..456).contains(&line_dot) {
            self.last_mode = Mode::HBlank;
            self.draw_pixels_until(SCREEN_WIDTH, bus);
            self.next_pixel = 0;
        }
        false
    }

    /// Produce background pixels for columns `next_pixel..until` on the
    /// current line, straight from the tile map and tile data.
    fn draw_pixels_until(&mut self, until: usize, bus: &DmgBus) {
        let ly = bus.ly as usize;
        let bg_y = (ly + bus.scy as usize) % 256;
        let tile_y = bg_y / 8;
        let row_offset = (bg_y % 8) * 2;
        let map_base = if bus.lcdc.contains(Lcdc::BG_TILE_MAP) {
            0x400
        } else {
            0
        };

        while self.next_pixel < until {
            let bg_x = (self.next_pixel + bus.scx as usize) % 256;
            let tile_index = bus.vram_maps[map_base + 32 * tile_y + bg_x / 8];
            // Bit 7 of the bitplane bytes is the leftmost pixel.
            let bit = 7 - (bg_x % 8);
            let tile = if bus.lcdc.contains(Lcdc::BG_WINDOW_TILE_DATA) {
                tile_index as usize
            } else {
                (256 + tile_index as i8 as isize) as usize
            };
            let lsb = (bus.vram_tiles[tile * 16 + row_offset] >> bit) & 1;
            let msb = (bus.vram_tiles[tile * 16 + row_offset + 1] >> bit) & 1;
            let color = (msb << 1) | lsb;
            let shade = (bus.bgp >> (color * 2)) & 0x3;
            self.working[ly * SCREEN_WIDTH + self.next_pixel] = shade;
            self.next_pixel += 1;
        }
    }
}
