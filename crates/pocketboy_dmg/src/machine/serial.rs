/// Minimal serial link modelled via SB/SC.
///
/// Just enough for CPU conformance ROMs that report results over the
/// link: starting a transfer on SC (bit 7 set together with the
/// internal-clock bit 0) appends the current SB value to `output` and
/// clears the transfer-start bit. No shifting-in of remote data and no
/// transfer timing.
#[derive(Clone, Debug, Default)]
pub(crate) struct Serial {
    pub(crate) sb: u8,
    pub(crate) sc: u8,
    pub(crate) output: Vec<u8>,
}

impl Serial {
    pub(super) fn write_sb(&mut self, value: u8) {
        self.sb = value;
    }

    /// Returns true when the write completed a transfer, so the bus can
    /// request the Serial interrupt.
    pub(super) fn write_sc(&mut self, value: u8) -> bool {
        self.sc = value;
        if (self.sc & 0x81) == 0x81 {
            log::debug!("serial out: 0x{:02X}", self.sb);
            self.output.push(self.sb);
            self.sc &= !0x80;
            return true;
        }
        false
    }
}
