/// Register file for the DMG CPU (SM83).
///
/// Each 16-bit pair is stored as two bytes so that the combined view and
/// the 8-bit high/low views always observe the same storage. The pairing
/// is little-endian in mnemonic order: the second letter names the low
/// byte (C is the low byte of BC, and so on).
#[derive(Clone, Copy, Debug, Default)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    #[inline]
    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f & 0xF0])
    }

    #[inline]
    pub fn set_af(&mut self, value: u16) {
        let [a, f] = value.to_be_bytes();
        self.a = a;
        // Lower 4 bits of F are not implemented and always read as zero.
        self.f = f & 0xF0;
    }

    #[inline]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[inline]
    pub fn set_bc(&mut self, value: u16) {
        let [b, c] = value.to_be_bytes();
        self.b = b;
        self.c = c;
    }

    #[inline]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[inline]
    pub fn set_de(&mut self, value: u16) {
        let [d, e] = value.to_be_bytes();
        self.d = d;
        self.e = e;
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    #[inline]
    pub fn set_hl(&mut self, value: u16) {
        let [h, l] = value.to_be_bytes();
        self.h = h;
        self.l = l;
    }
}

/// Flag bits in the F register.
///
/// Layout (bit index in the byte, from MSB to LSB):
/// - bit 7: Z (zero)
/// - bit 6: N (subtract)
/// - bit 5: H (half carry)
/// - bit 4: C (carry)
/// - bits 0–3 are always zero.
#[derive(Clone, Copy, Debug)]
pub enum Flag {
    Z = 7,
    N = 6,
    H = 5,
    C = 4,
}

/// Directive for one flag when composing a new F byte.
///
/// Almost every instruction describes its flag effects as "set", "clear"
/// or "unchanged" per flag; modelling that as an explicit three-way enum
/// keeps the instruction handlers declarative and avoids magic sentinels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlagOp {
    Zero,
    One,
    Keep,
}

impl From<bool> for FlagOp {
    #[inline]
    fn from(value: bool) -> Self {
        if value {
            FlagOp::One
        } else {
            FlagOp::Zero
        }
    }
}

impl Registers {
    #[inline]
    pub fn flag(&self, flag: Flag) -> bool {
        (self.f & (1 << flag as u8)) != 0
    }

    /// Compose a new flags byte from four per-flag directives.
    ///
    /// `Keep` re-reads the current value of that flag; the low nibble of
    /// the result is always zero.
    pub fn update_flags(&mut self, z: FlagOp, n: FlagOp, h: FlagOp, c: FlagOp) {
        let mut f = 0u8;
        for (op, flag) in [(z, Flag::Z), (n, Flag::N), (h, Flag::H), (c, Flag::C)] {
            let bit = match op {
                FlagOp::Zero => false,
                FlagOp::One => true,
                FlagOp::Keep => self.flag(flag),
            };
            if bit {
                f |= 1 << flag as u8;
            }
        }
        self.f = f;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_pair_views_share_storage() {
        let mut regs = Registers::default();
        regs.set_bc(0x1234);
        assert_eq!(regs.b, 0x12);
        assert_eq!(regs.c, 0x34);

        regs.d = 0xAB;
        regs.e = 0xCD;
        assert_eq!(regs.de(), 0xABCD);
    }

    #[test]
    fn af_low_nibble_always_zero() {
        let mut regs = Registers::default();
        regs.set_af(0xFFFF);
        assert_eq!(regs.af(), 0xFFF0);
        assert_eq!(regs.f, 0xF0);
    }

    #[test]
    fn update_flags_directives() {
        let mut regs = Registers::default();
        regs.update_flags(FlagOp::One, FlagOp::Zero, FlagOp::One, FlagOp::Zero);
        assert!(regs.flag(Flag::Z));
        assert!(!regs.flag(Flag::N));
        assert!(regs.flag(Flag::H));
        assert!(!regs.flag(Flag::C));

        // Keep re-reads the current state.
        regs.update_flags(FlagOp::Keep, FlagOp::One, FlagOp::Keep, FlagOp::Keep);
        assert!(regs.flag(Flag::Z));
        assert!(regs.flag(Flag::N));
        assert!(regs.flag(Flag::H));
        assert!(!regs.flag(Flag::C));
    }
}
