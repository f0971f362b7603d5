use anyhow::Result;

use crate::key::Key;

/// Contract between an emulator core and whichever frontend drives it.
///
/// A frontend (SDL window, web canvas, headless test harness) owns the
/// pacing loop: once per frame it calls `update` with an RGB24 buffer of
/// `width() * height()` pixels, forwards input as `Key` events, and stops
/// when `should_exit` reports true or `update` returns an error. Emulation
/// cores report unrecoverable hardware conditions (illegal opcodes,
/// accesses to unimplemented regions) through `update`'s error value
/// instead of terminating the process.
pub trait App {
    fn init(&mut self);
    fn update(&mut self, screen: &mut [u8]) -> Result<()>;
    fn handle_key_event(&mut self, key: Key, is_down: bool);
    fn should_exit(&self) -> bool;
    fn exit(&mut self);

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn scale(&self) -> u32;
    fn title(&self) -> String;
}
