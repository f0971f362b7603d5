use std::fmt;

use super::Cpu;

/// Point-in-time copy of the externally observable CPU state.
///
/// `pc_mem` holds the four bytes at PC onward, captured through the same
/// bus the CPU executes from, so the snapshot shows what would be fetched
/// next. Used for tracing and for the `gameboy-doctor` conformance format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CpuSnapshot {
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
    pub ime: bool,
    pub dots: u64,
    pub pc_mem: [u8; 4],
}

impl CpuSnapshot {
    pub fn capture(cpu: &Cpu, pc_mem: [u8; 4]) -> Self {
        Self {
            a: cpu.regs.a,
            f: cpu.regs.f,
            b: cpu.regs.b,
            c: cpu.regs.c,
            d: cpu.regs.d,
            e: cpu.regs.e,
            h: cpu.regs.h,
            l: cpu.regs.l,
            sp: cpu.regs.sp,
            pc: cpu.regs.pc,
            ime: cpu.ime,
            dots: cpu.dots,
            pc_mem,
        }
    }

    /// One line in the format the `gameboy-doctor` test harness compares
    /// against, byte for byte.
    pub fn conformance_line(&self) -> String {
        format!(
            "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} \
             H:{:02X} L:{:02X} SP:{:04X} PC:{:04X} PCMEM:{:02X},{:02X},{:02X},{:02X}",
            self.a,
            self.f,
            self.b,
            self.c,
            self.d,
            self.e,
            self.h,
            self.l,
            self.sp,
            self.pc,
            self.pc_mem[0],
            self.pc_mem[1],
            self.pc_mem[2],
            self.pc_mem[3],
        )
    }
}

impl fmt::Display for CpuSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "AF={:02X}{:02X} BC={:02X}{:02X} DE={:02X}{:02X} HL={:02X}{:02X}",
            self.a, self.f, self.b, self.c, self.d, self.e, self.h, self.l
        )?;
        write!(
            f,
            "SP={:04X} PC={:04X} IME={} dots={}",
            self.sp, self.pc, self.ime as u8, self.dots
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conformance_line_matches_doctor_format() {
        let snap = CpuSnapshot {
            a: 0x01,
            f: 0xB0,
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xD8,
            h: 0x01,
            l: 0x4D,
            sp: 0xFFFE,
            pc: 0x0100,
            ime: false,
            dots: 0,
            pc_mem: [0x00, 0xC3, 0x13, 0x02],
        };
        assert_eq!(
            snap.conformance_line(),
            "A:01 F:B0 B:00 C:13 D:00 E:D8 H:01 L:4D \
             SP:FFFE PC:0100 PCMEM:00,C3,13,02"
        );
    }
}
