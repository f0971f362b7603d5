mod regs;
mod snapshot;

#[cfg(test)]
mod tests;

pub use regs::{Flag, FlagOp, Registers};
pub use snapshot::CpuSnapshot;

use crate::error::{CoreError, Result};

/// Abstraction over the memory bus seen by the CPU.
///
/// Reads and writes are fallible: the address router reports accesses to
/// unmapped or deliberately unimplemented regions as `CoreError` values
/// instead of terminating the process, and the CPU propagates them out of
/// `step` untouched.
pub trait Bus {
    fn read8(&mut self, addr: u16) -> Result<u8>;
    fn write8(&mut self, addr: u16, value: u8) -> Result<()>;

    /// Little-endian 16-bit read.
    fn read16(&mut self, addr: u16) -> Result<u16> {
        let lo = self.read8(addr)? as u16;
        let hi = self.read8(addr.wrapping_add(1))? as u16;
        Ok((hi << 8) | lo)
    }

    /// Little-endian 16-bit write.
    fn write16(&mut self, addr: u16, value: u16) -> Result<()> {
        self.write8(addr, value as u8)?;
        self.write8(addr.wrapping_add(1), (value >> 8) as u8)
    }
}

/// Interrupt vector table: handler address for bits 0..4 of IE/IF
/// (VBlank, STAT, Timer, Serial, Joypad).
const INTERRUPT_VECTORS: [u16; 5] = [0x0040, 0x0048, 0x0050, 0x0058, 0x0060];

/// DMG CPU core.
///
/// Each `step` is a complete, self-contained transition: either one full
/// interrupt dispatch or one full instruction. The only persistent state
/// is the register file, the interrupt master enable, and the dot counter;
/// there are no partially-executed instructions.
#[derive(Clone, Debug)]
pub struct Cpu {
    pub regs: Registers,
    /// Interrupt Master Enable, the single global gate on servicing.
    pub ime: bool,
    /// Monotonic count of elapsed T-cycles ("dots"). Never reset or
    /// decremented; the display timing machine reduces it modulo frame
    /// and scanline lengths when it reads it.
    pub dots: u64,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// CPU in the post-boot configuration, as the DMG boot ROM leaves it
    /// when handing control to cartridge code at 0x0100.
    pub fn new() -> Self {
        let mut cpu = Self {
            regs: Registers::default(),
            ime: false,
            dots: 0,
        };
        cpu.regs.a = 0x01;
        cpu.regs.f = 0xB0;
        cpu.regs.c = 0x13;
        cpu.regs.e = 0xD8;
        cpu.regs.h = 0x01;
        cpu.regs.l = 0x4D;
        cpu.regs.sp = 0xFFFE;
        cpu.regs.pc = 0x0100;
        cpu
    }

    /// CPU in the zeroed configuration used when executing a boot image:
    /// all registers clear, PC at 0x0000.
    pub fn new_at_boot_rom() -> Self {
        Self {
            regs: Registers::default(),
            ime: false,
            dots: 0,
        }
    }

    /// Execute one step: an interrupt dispatch if one is due, otherwise
    /// one instruction. Returns the T-cycles consumed, which have already
    /// been added to `dots`.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Result<u32> {
        if self.service_interrupt(bus)? {
            self.dots += 20;
            return Ok(20);
        }

        let pc = self.regs.pc;
        let opcode = self.fetch8(bus)?;
        let cycles = self.exec_opcode(bus, opcode, pc)?;
        self.dots += cycles as u64;
        Ok(cycles)
    }

    /// Scan IE & IF in increasing bit order and dispatch the first pending
    /// interrupt, if IME allows.
    ///
    /// At most one interrupt is serviced per step. Servicing clears the IF
    /// bit and IME, pushes PC, and jumps to the fixed vector; the 20-cycle
    /// cost is charged by `step`.
    fn service_interrupt<B: Bus>(&mut self, bus: &mut B) -> Result<bool> {
        if !self.ime {
            return Ok(false);
        }
        let ie = bus.read8(0xFFFF)?;
        let iflags = bus.read8(0xFF0F)?;
        for (bit, &vector) in INTERRUPT_VECTORS.iter().enumerate() {
            let mask = 1u8 << bit;
            if ie & iflags & mask != 0 {
                bus.write8(0xFF0F, iflags & !mask)?;
                self.ime = false;
                self.regs.sp = self.regs.sp.wrapping_sub(2);
                bus.write16(self.regs.sp, self.regs.pc)?;
                self.regs.pc = vector;
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[inline]
    fn fetch8<B: Bus>(&mut self, bus: &mut B) -> Result<u8> {
        let value = bus.read8(self.regs.pc)?;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        Ok(value)
    }

    #[inline]
    fn fetch16<B: Bus>(&mut self, bus: &mut B) -> Result<u16> {
        let lo = self.fetch8(bus)? as u16;
        let hi = self.fetch8(bus)? as u16;
        Ok((hi << 8) | lo)
    }

    #[inline]
    fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) -> Result<()> {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        bus.write16(self.regs.sp, value)
    }

    #[inline]
    fn pop16<B: Bus>(&mut self, bus: &mut B) -> Result<u16> {
        let value = bus.read16(self.regs.sp)?;
        self.regs.sp = self.regs.sp.wrapping_add(2);
        Ok(value)
    }

    // --- Operand-index accessors -----------------------------------------
    //
    // These map the 2- and 3-bit register fields of the instruction
    // encoding onto concrete registers (or a memory dereference through
    // HL). The tables are fixed; an out-of-range index cannot be produced
    // by a legally decoded opcode and is reported as a decode bug.

    /// 8-bit operand table: 0=B, 1=C, 2=D, 3=E, 4=H, 5=L, 6=(HL), 7=A.
    fn read_r8<B: Bus>(&mut self, bus: &mut B, index: u8) -> Result<u8> {
        match index {
            0 => Ok(self.regs.b),
            1 => Ok(self.regs.c),
            2 => Ok(self.regs.d),
            3 => Ok(self.regs.e),
            4 => Ok(self.regs.h),
            5 => Ok(self.regs.l),
            6 => bus.read8(self.regs.hl()),
            7 => Ok(self.regs.a),
            _ => Err(CoreError::BadOperandIndex { table: "r8", index }),
        }
    }

    fn write_r8<B: Bus>(&mut self, bus: &mut B, index: u8, value: u8) -> Result<()> {
        match index {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            6 => return bus.write8(self.regs.hl(), value),
            7 => self.regs.a = value,
            _ => return Err(CoreError::BadOperandIndex { table: "r8", index }),
        }
        Ok(())
    }

    /// 16-bit operand table: 0=BC, 1=DE, 2=HL, 3=SP.
    fn read_r16(&self, index: u8) -> Result<u16> {
        match index {
            0 => Ok(self.regs.bc()),
            1 => Ok(self.regs.de()),
            2 => Ok(self.regs.hl()),
            3 => Ok(self.regs.sp),
            _ => Err(CoreError::BadOperandIndex { table: "r16", index }),
        }
    }

    fn write_r16(&mut self, index: u8, value: u16) -> Result<()> {
        match index {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            3 => self.regs.sp = value,
            _ => return Err(CoreError::BadOperandIndex { table: "r16", index }),
        }
        Ok(())
    }

    /// Stack-op 16-bit table: 0=BC, 1=DE, 2=HL, 3=AF.
    fn read_r16stk(&self, index: u8) -> Result<u16> {
        match index {
            0 => Ok(self.regs.bc()),
            1 => Ok(self.regs.de()),
            2 => Ok(self.regs.hl()),
            3 => Ok(self.regs.af()),
            _ => Err(CoreError::BadOperandIndex { table: "r16stk", index }),
        }
    }

    fn write_r16stk(&mut self, index: u8, value: u16) -> Result<()> {
        match index {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            // POP AF: the low nibble of F is cleared by set_af.
            3 => self.regs.set_af(value),
            _ => return Err(CoreError::BadOperandIndex { table: "r16stk", index }),
        }
        Ok(())
    }

    /// Memory-indirect table: 0=(BC), 1=(DE), 2=(HL+), 3=(HL-).
    ///
    /// Indices 2 and 3 post-increment/post-decrement HL as part of the
    /// access itself.
    fn read_r16mem<B: Bus>(&mut self, bus: &mut B, index: u8) -> Result<u8> {
        match index {
            0 => bus.read8(self.regs.bc()),
            1 => bus.read8(self.regs.de()),
            2 => {
                let hl = self.regs.hl();
                let value = bus.read8(hl)?;
                self.regs.set_hl(hl.wrapping_add(1));
                Ok(value)
            }
            3 => {
                let hl = self.regs.hl();
                let value = bus.read8(hl)?;
                self.regs.set_hl(hl.wrapping_sub(1));
                Ok(value)
            }
            _ => Err(CoreError::BadOperandIndex { table: "r16mem", index }),
        }
    }

    fn write_r16mem<B: Bus>(&mut self, bus: &mut B, index: u8, value: u8) -> Result<()> {
        match index {
            0 => bus.write8(self.regs.bc(), value),
            1 => bus.write8(self.regs.de(), value),
            2 => {
                let hl = self.regs.hl();
                bus.write8(hl, value)?;
                self.regs.set_hl(hl.wrapping_add(1));
                Ok(())
            }
            3 => {
                let hl = self.regs.hl();
                bus.write8(hl, value)?;
                self.regs.set_hl(hl.wrapping_sub(1));
                Ok(())
            }
            _ => Err(CoreError::BadOperandIndex { table: "r16mem", index }),
        }
    }

    /// Condition table for conditional jumps/calls/returns:
    /// 0=NZ, 1=Z, 2=NC, 3=C.
    fn check_cond(&self, index: u8) -> Result<bool> {
        match index {
            0 => Ok(!self.regs.flag(Flag::Z)),
            1 => Ok(self.regs.flag(Flag::Z)),
            2 => Ok(!self.regs.flag(Flag::C)),
            3 => Ok(self.regs.flag(Flag::C)),
            _ => Err(CoreError::BadOperandIndex {
                table: "cond",
                index,
            }),
        }
    }

    // --- ALU helpers ------------------------------------------------------

    /// 8-bit ADD/ADC on A. Half carry comes from XOR-ing both operands
    /// with the result and testing bit 4; full carry from magnitude
    /// comparison against both operands (the carry-in is folded into the
    /// second operand first, mirroring the instruction encoding).
    fn alu_add(&mut self, value: u8, use_carry: bool) {
        let a = self.regs.a;
        let carry_in = (use_carry && self.regs.flag(Flag::C)) as u16;
        let operand = value as u16 + carry_in;
        let result = a.wrapping_add(operand as u8);
        self.regs.update_flags(
            (result == 0).into(),
            FlagOp::Zero,
            ((result as u16 ^ a as u16 ^ operand) & 0x10 != 0).into(),
            ((result as u16) < a as u16 || (result as u16) < operand).into(),
        );
        self.regs.a = result;
    }

    /// 8-bit SUB/SBC on A; same flag derivation as `alu_add` with the
    /// subtraction forms.
    fn alu_sub(&mut self, value: u8, use_carry: bool) {
        let a = self.regs.a;
        let carry_in = (use_carry && self.regs.flag(Flag::C)) as u16;
        let operand = value as u16 + carry_in;
        let result = a.wrapping_sub(operand as u8);
        self.regs.update_flags(
            (result == 0).into(),
            FlagOp::One,
            ((result as u16 ^ a as u16 ^ operand) & 0x10 != 0).into(),
            (operand > a as u16).into(),
        );
        self.regs.a = result;
    }

    /// Compare A with `value`; flags as SUB, A unchanged.
    fn alu_cp(&mut self, value: u8) {
        let a = self.regs.a;
        let result = a.wrapping_sub(value);
        self.regs.update_flags(
            (result == 0).into(),
            FlagOp::One,
            ((result ^ a ^ value) & 0x10 != 0).into(),
            (value > a).into(),
        );
    }

    /// Dispatch one of the eight ALU operations by its 3-bit encoding:
    /// 0=ADD, 1=ADC, 2=SUB, 3=SBC, 4=AND, 5=XOR, 6=OR, 7=CP.
    fn alu(&mut self, op: u8, value: u8) -> Result<()> {
        match op {
            0 => self.alu_add(value, false),
            1 => self.alu_add(value, true),
            2 => self.alu_sub(value, false),
            3 => self.alu_sub(value, true),
            4 => {
                self.regs.a &= value;
                self.regs.update_flags(
                    (self.regs.a == 0).into(),
                    FlagOp::Zero,
                    FlagOp::One,
                    FlagOp::Zero,
                );
            }
            5 => {
                self.regs.a ^= value;
                self.regs.update_flags(
                    (self.regs.a == 0).into(),
                    FlagOp::Zero,
                    FlagOp::Zero,
                    FlagOp::Zero,
                );
            }
            6 => {
                self.regs.a |= value;
                self.regs.update_flags(
                    (self.regs.a == 0).into(),
                    FlagOp::Zero,
                    FlagOp::Zero,
                    FlagOp::Zero,
                );
            }
            7 => self.alu_cp(value),
            _ => return Err(CoreError::BadOperandIndex { table: "alu", index: op }),
        }
        Ok(())
    }

    /// 8-bit increment used by INC r8. Carry is unaffected.
    fn alu_inc8(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.regs.update_flags(
            (result == 0).into(),
            FlagOp::Zero,
            ((result ^ value ^ 1) & 0x10 != 0).into(),
            FlagOp::Keep,
        );
        result
    }

    /// 8-bit decrement used by DEC r8. Carry is unaffected.
    fn alu_dec8(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.regs.update_flags(
            (result == 0).into(),
            FlagOp::One,
            ((result ^ value ^ 1) & 0x10 != 0).into(),
            FlagOp::Keep,
        );
        result
    }

    /// ADD HL,rr. Z unaffected; half carry tested at bit 12, full carry
    /// by magnitude comparison.
    fn alu_add16_hl(&mut self, value: u16) {
        let hl = self.regs.hl();
        let result = hl.wrapping_add(value);
        self.regs.update_flags(
            FlagOp::Keep,
            FlagOp::Zero,
            ((result ^ hl ^ value) & 0x1000 != 0).into(),
            (result < hl || result < value).into(),
        );
        self.regs.set_hl(result);
    }

    /// Shared core of ADD SP,imm8 and LD HL,SP+imm8: the unsigned 16-bit
    /// sum of SP and the sign-extended displacement, with Z and N cleared
    /// and H/C derived from bits 4 and 8 of the XOR of the three values.
    fn alu_add16_signed(&mut self, base: u16, imm8: u8) -> u16 {
        let offset = imm8 as i8 as i16 as u16;
        let result = base.wrapping_add(offset);
        self.regs.update_flags(
            FlagOp::Zero,
            FlagOp::Zero,
            ((result ^ base ^ offset) & 0x10 != 0).into(),
            ((result ^ base ^ offset) & 0x100 != 0).into(),
        );
        result
    }

    /// Decimal adjust A after BCD addition/subtraction. Branches on N:
    /// the addition direction may add 0x06 and/or 0x60, the subtraction
    /// direction only undoes corrections recorded in H/C.
    fn alu_daa(&mut self) {
        let a = self.regs.a;
        let mut adjust = 0u8;
        let mut carry = false;

        let result = if !self.regs.flag(Flag::N) {
            if self.regs.flag(Flag::H) || (a & 0x0F) > 0x09 {
                adjust |= 0x06;
            }
            if self.regs.flag(Flag::C) || a > 0x99 {
                adjust |= 0x60;
                carry = true;
            }
            a.wrapping_add(adjust)
        } else {
            if self.regs.flag(Flag::H) {
                adjust |= 0x06;
            }
            if self.regs.flag(Flag::C) {
                adjust |= 0x60;
                carry = true;
            }
            a.wrapping_sub(adjust)
        };

        self.regs.a = result;
        self.regs.update_flags(
            (result == 0).into(),
            FlagOp::Keep,
            FlagOp::Zero,
            if carry { FlagOp::One } else { FlagOp::Keep },
        );
    }

    // --- Control-flow helpers --------------------------------------------

    /// JR / JR cc: sign-extended displacement added to PC after PC has
    /// advanced past the 2-byte instruction.
    fn jr<B: Bus>(&mut self, bus: &mut B, cond: bool) -> Result<u32> {
        let offset = self.fetch8(bus)? as i8;
        if cond {
            self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
            Ok(12)
        } else {
            Ok(8)
        }
    }

    fn jp_cond<B: Bus>(&mut self, bus: &mut B, cond: bool) -> Result<u32> {
        let addr = self.fetch16(bus)?;
        if cond {
            self.regs.pc = addr;
            Ok(16)
        } else {
            Ok(12)
        }
    }

    fn call_cond<B: Bus>(&mut self, bus: &mut B, cond: bool) -> Result<u32> {
        let addr = self.fetch16(bus)?;
        if cond {
            let ret = self.regs.pc;
            self.push16(bus, ret)?;
            self.regs.pc = addr;
            Ok(24)
        } else {
            Ok(12)
        }
    }

    fn ret_cond<B: Bus>(&mut self, bus: &mut B, cond: bool) -> Result<u32> {
        if cond {
            self.regs.pc = self.pop16(bus)?;
            Ok(20)
        } else {
            Ok(8)
        }
    }

    // --- Decode/execute ---------------------------------------------------

    /// Decode and execute one opcode, returning its cycle cost.
    ///
    /// Decoding groups on the top two bits first and then on the sub-field
    /// masks of each quarter, mirroring the structure of the instruction
    /// encoding rather than flattening into a 256-entry table. `pc` is the
    /// address the opcode was fetched from, used for diagnostics.
    fn exec_opcode<B: Bus>(&mut self, bus: &mut B, opcode: u8, pc: u16) -> Result<u32> {
        match opcode >> 6 {
            0b00 => self.exec_block0(bus, opcode, pc),
            0b01 => self.exec_block1(bus, opcode, pc),
            0b10 => self.exec_block2(bus, opcode),
            _ => self.exec_block3(bus, opcode, pc),
        }
    }

    /// Opcodes 0x00–0x3F: 16-bit loads/arithmetic, indirect accumulator
    /// loads, 8-bit inc/dec and immediate loads, relative jumps, and the
    /// single-byte accumulator/flag operations.
    fn exec_block0<B: Bus>(&mut self, bus: &mut B, opcode: u8, pc: u16) -> Result<u32> {
        let p = (opcode >> 4) & 0x03;
        match opcode & 0x0F {
            0x01 => {
                // LD r16, imm16
                let value = self.fetch16(bus)?;
                self.write_r16(p, value)?;
                return Ok(12);
            }
            0x02 => {
                // LD (r16mem), A
                self.write_r16mem(bus, p, self.regs.a)?;
                return Ok(8);
            }
            0x0A => {
                // LD A, (r16mem)
                self.regs.a = self.read_r16mem(bus, p)?;
                return Ok(8);
            }
            0x03 => {
                // INC r16
                let value = self.read_r16(p)?.wrapping_add(1);
                self.write_r16(p, value)?;
                return Ok(8);
            }
            0x0B => {
                // DEC r16
                let value = self.read_r16(p)?.wrapping_sub(1);
                self.write_r16(p, value)?;
                return Ok(8);
            }
            0x09 => {
                // ADD HL, r16
                let value = self.read_r16(p)?;
                self.alu_add16_hl(value);
                return Ok(8);
            }
            _ => {}
        }

        let q = (opcode >> 3) & 0x07;
        match opcode & 0x07 {
            0x04 => {
                // INC r8
                let value = self.read_r8(bus, q)?;
                let result = self.alu_inc8(value);
                self.write_r8(bus, q, result)?;
                return Ok(if q == 6 { 12 } else { 4 });
            }
            0x05 => {
                // DEC r8
                let value = self.read_r8(bus, q)?;
                let result = self.alu_dec8(value);
                self.write_r8(bus, q, result)?;
                return Ok(if q == 6 { 12 } else { 4 });
            }
            0x06 => {
                // LD r8, imm8
                let value = self.fetch8(bus)?;
                self.write_r8(bus, q, value)?;
                return Ok(if q == 6 { 12 } else { 8 });
            }
            _ => {}
        }

        if opcode & 0x27 == 0x20 {
            // JR cc, imm8
            let cond = self.check_cond((opcode >> 3) & 0x03)?;
            return self.jr(bus, cond);
        }

        match opcode {
            // NOP
            0x00 => Ok(4),
            0x08 => {
                // LD (imm16), SP
                let addr = self.fetch16(bus)?;
                bus.write16(addr, self.regs.sp)?;
                Ok(20)
            }
            0x07 => {
                // RLCA
                let carry = self.regs.a >> 7;
                self.regs.a = self.regs.a.rotate_left(1);
                self.regs
                    .update_flags(FlagOp::Zero, FlagOp::Zero, FlagOp::Zero, (carry != 0).into());
                Ok(4)
            }
            0x0F => {
                // RRCA
                let carry = self.regs.a & 1;
                self.regs.a = self.regs.a.rotate_right(1);
                self.regs
                    .update_flags(FlagOp::Zero, FlagOp::Zero, FlagOp::Zero, (carry != 0).into());
                Ok(4)
            }
            0x17 => {
                // RLA
                let carry_in = self.regs.flag(Flag::C) as u8;
                let carry_out = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | carry_in;
                self.regs.update_flags(
                    FlagOp::Zero,
                    FlagOp::Zero,
                    FlagOp::Zero,
                    (carry_out != 0).into(),
                );
                Ok(4)
            }
            0x1F => {
                // RRA
                let carry_in = self.regs.flag(Flag::C) as u8;
                let carry_out = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | (carry_in << 7);
                self.regs.update_flags(
                    FlagOp::Zero,
                    FlagOp::Zero,
                    FlagOp::Zero,
                    (carry_out != 0).into(),
                );
                Ok(4)
            }
            0x27 => {
                // DAA
                self.alu_daa();
                Ok(4)
            }
            0x2F => {
                // CPL
                self.regs.a = !self.regs.a;
                self.regs
                    .update_flags(FlagOp::Keep, FlagOp::One, FlagOp::One, FlagOp::Keep);
                Ok(4)
            }
            0x37 => {
                // SCF
                self.regs
                    .update_flags(FlagOp::Keep, FlagOp::Zero, FlagOp::Zero, FlagOp::One);
                Ok(4)
            }
            0x3F => {
                // CCF
                let carry = self.regs.flag(Flag::C);
                self.regs
                    .update_flags(FlagOp::Keep, FlagOp::Zero, FlagOp::Zero, (!carry).into());
                Ok(4)
            }
            // JR imm8
            0x18 => self.jr(bus, true),
            // STOP. Low-power state; not modelled.
            0x10 => Err(CoreError::UnimplementedOpcode { opcode, pc }),
            _ => Err(CoreError::IllegalOpcode { opcode, pc }),
        }
    }

    /// Opcodes 0x40–0x7F: register-to-register loads, with the 0x76 slot
    /// reused by the encoding for HALT.
    fn exec_block1<B: Bus>(&mut self, bus: &mut B, opcode: u8, pc: u16) -> Result<u32> {
        if opcode == 0x76 {
            // HALT. Wake-up semantics are not modelled; surfacing the
            // opcode keeps the gap visible instead of spinning silently.
            return Err(CoreError::UnimplementedOpcode { opcode, pc });
        }
        let dst = (opcode >> 3) & 0x07;
        let src = opcode & 0x07;
        let value = self.read_r8(bus, src)?;
        self.write_r8(bus, dst, value)?;
        Ok(if dst == 6 || src == 6 { 8 } else { 4 })
    }

    /// Opcodes 0x80–0xBF: the eight ALU operations against a register or
    /// (HL) operand.
    fn exec_block2<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> Result<u32> {
        let src = opcode & 0x07;
        let value = self.read_r8(bus, src)?;
        self.alu((opcode >> 3) & 0x07, value)?;
        Ok(if src == 6 { 8 } else { 4 })
    }

    /// Opcodes 0xC0–0xFF: absolute control flow, stack operations, the
    /// immediate ALU forms, I/O port addressing, SP arithmetic, IME
    /// control, and the CB-prefixed space.
    fn exec_block3<B: Bus>(&mut self, bus: &mut B, opcode: u8, pc: u16) -> Result<u32> {
        match opcode & 0x27 {
            0x00 => {
                // RET cc
                let cond = self.check_cond((opcode >> 3) & 0x03)?;
                return self.ret_cond(bus, cond);
            }
            0x02 => {
                // JP cc, imm16
                let cond = self.check_cond((opcode >> 3) & 0x03)?;
                return self.jp_cond(bus, cond);
            }
            0x04 => {
                // CALL cc, imm16
                let cond = self.check_cond((opcode >> 3) & 0x03)?;
                return self.call_cond(bus, cond);
            }
            _ => {}
        }

        if opcode & 0x07 == 0x07 {
            // RST tgt3: call to a fixed low vector encoded in bits 3–5.
            let ret = self.regs.pc;
            self.push16(bus, ret)?;
            self.regs.pc = (opcode & 0x38) as u16;
            return Ok(16);
        }

        match opcode & 0x0F {
            0x01 => {
                // POP r16stk
                let value = self.pop16(bus)?;
                self.write_r16stk((opcode >> 4) & 0x03, value)?;
                return Ok(12);
            }
            0x05 => {
                // PUSH r16stk
                let value = self.read_r16stk((opcode >> 4) & 0x03)?;
                self.push16(bus, value)?;
                return Ok(16);
            }
            _ => {}
        }

        match opcode {
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                // ALU A, imm8 (same operation encoding as block 2).
                let value = self.fetch8(bus)?;
                self.alu((opcode >> 3) & 0x07, value)?;
                Ok(8)
            }
            0xC9 => {
                // RET
                self.regs.pc = self.pop16(bus)?;
                Ok(16)
            }
            0xD9 => {
                // RETI
                self.regs.pc = self.pop16(bus)?;
                self.ime = true;
                Ok(16)
            }
            0xC3 => {
                // JP imm16
                self.regs.pc = self.fetch16(bus)?;
                Ok(16)
            }
            0xE9 => {
                // JP HL
                self.regs.pc = self.regs.hl();
                Ok(4)
            }
            0xCD => {
                // CALL imm16
                let addr = self.fetch16(bus)?;
                let ret = self.regs.pc;
                self.push16(bus, ret)?;
                self.regs.pc = addr;
                Ok(24)
            }
            0xE2 => {
                // LDH (C), A
                bus.write8(0xFF00 | self.regs.c as u16, self.regs.a)?;
                Ok(8)
            }
            0xE0 => {
                // LDH (imm8), A
                let offset = self.fetch8(bus)? as u16;
                bus.write8(0xFF00 | offset, self.regs.a)?;
                Ok(12)
            }
            0xEA => {
                // LD (imm16), A
                let addr = self.fetch16(bus)?;
                bus.write8(addr, self.regs.a)?;
                Ok(16)
            }
            0xF2 => {
                // LDH A, (C)
                self.regs.a = bus.read8(0xFF00 | self.regs.c as u16)?;
                Ok(8)
            }
            0xF0 => {
                // LDH A, (imm8)
                let offset = self.fetch8(bus)? as u16;
                self.regs.a = bus.read8(0xFF00 | offset)?;
                Ok(12)
            }
            0xFA => {
                // LD A, (imm16)
                let addr = self.fetch16(bus)?;
                self.regs.a = bus.read8(addr)?;
                Ok(16)
            }
            0xE8 => {
                // ADD SP, imm8
                let imm = self.fetch8(bus)?;
                self.regs.sp = self.alu_add16_signed(self.regs.sp, imm);
                Ok(16)
            }
            0xF8 => {
                // LD HL, SP+imm8
                let imm = self.fetch8(bus)?;
                let result = self.alu_add16_signed(self.regs.sp, imm);
                self.regs.set_hl(result);
                Ok(12)
            }
            0xF9 => {
                // LD SP, HL
                self.regs.sp = self.regs.hl();
                Ok(8)
            }
            0xF3 => {
                // DI
                self.ime = false;
                Ok(4)
            }
            0xFB => {
                // EI. Takes effect immediately; interrupts are only
                // sampled at step boundaries, so the one-instruction
                // enable delay of real hardware is not modelled.
                self.ime = true;
                Ok(4)
            }
            // CB prefix
            0xCB => self.exec_cb(bus),
            _ => Err(CoreError::IllegalOpcode { opcode, pc }),
        }
    }

    /// CB-prefixed opcodes: rotates/shifts, then BIT/RES/SET, grouped on
    /// the top two bits of the second byte.
    fn exec_cb<B: Bus>(&mut self, bus: &mut B) -> Result<u32> {
        let cb = self.fetch8(bus)?;
        let src = cb & 0x07;
        let sel = (cb >> 3) & 0x07;

        match cb >> 6 {
            0b00 => {
                let value = self.read_r8(bus, src)?;
                let (result, carry) = match sel {
                    // RLC
                    0 => (value.rotate_left(1), value >> 7 != 0),
                    // RRC
                    1 => (value.rotate_right(1), value & 1 != 0),
                    // RL
                    2 => (
                        (value << 1) | self.regs.flag(Flag::C) as u8,
                        value >> 7 != 0,
                    ),
                    // RR
                    3 => (
                        (value >> 1) | ((self.regs.flag(Flag::C) as u8) << 7),
                        value & 1 != 0,
                    ),
                    // SLA
                    4 => (value << 1, value >> 7 != 0),
                    // SRA: arithmetic shift keeps the sign bit.
                    5 => (((value as i8) >> 1) as u8, value & 1 != 0),
                    // SWAP
                    6 => ((value << 4) | (value >> 4), false),
                    // SRL
                    _ => (value >> 1, value & 1 != 0),
                };
                self.regs.update_flags(
                    (result == 0).into(),
                    FlagOp::Zero,
                    FlagOp::Zero,
                    carry.into(),
                );
                self.write_r8(bus, src, result)?;
                Ok(if src == 6 { 16 } else { 8 })
            }
            0b01 => {
                // BIT sel, r8
                let value = self.read_r8(bus, src)?;
                self.regs.update_flags(
                    ((value >> sel) & 1 == 0).into(),
                    FlagOp::Zero,
                    FlagOp::One,
                    FlagOp::Keep,
                );
                Ok(if src == 6 { 12 } else { 8 })
            }
            0b10 => {
                // RES sel, r8
                let value = self.read_r8(bus, src)? & !(1 << sel);
                self.write_r8(bus, src, value)?;
                Ok(if src == 6 { 16 } else { 8 })
            }
            _ => {
                // SET sel, r8
                let value = self.read_r8(bus, src)? | (1 << sel);
                self.write_r8(bus, src, value)?;
                Ok(if src == 6 { 16 } else { 8 })
            }
        }
    }
}
