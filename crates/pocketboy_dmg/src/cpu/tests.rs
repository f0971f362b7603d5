use super::{Bus, Cpu, Flag};
use crate::error::{CoreError, Result};

/// Flat 64 KiB bus with no region semantics, for instruction-level tests.
struct TestBus {
    mem: Vec<u8>,
}

impl TestBus {
    fn new() -> Self {
        Self {
            mem: vec![0; 0x10000],
        }
    }
}

impl Bus for TestBus {
    fn read8(&mut self, addr: u16) -> Result<u8> {
        Ok(self.mem[addr as usize])
    }

    fn write8(&mut self, addr: u16, value: u8) -> Result<()> {
        self.mem[addr as usize] = value;
        Ok(())
    }
}

/// CPU in the post-boot state with `program` loaded at 0x0100.
fn setup(program: &[u8]) -> (Cpu, TestBus) {
    let mut bus = TestBus::new();
    bus.mem[0x0100..0x0100 + program.len()].copy_from_slice(program);
    (Cpu::new(), bus)
}

fn flags(cpu: &Cpu) -> (bool, bool, bool, bool) {
    (
        cpu.regs.flag(Flag::Z),
        cpu.regs.flag(Flag::N),
        cpu.regs.flag(Flag::H),
        cpu.regs.flag(Flag::C),
    )
}

#[test]
fn post_boot_register_values() {
    let cpu = Cpu::new();
    assert_eq!(cpu.regs.af(), 0x01B0);
    assert_eq!(cpu.regs.bc(), 0x0013);
    assert_eq!(cpu.regs.de(), 0x00D8);
    assert_eq!(cpu.regs.hl(), 0x014D);
    assert_eq!(cpu.regs.sp, 0xFFFE);
    assert_eq!(cpu.regs.pc, 0x0100);
    assert!(!cpu.ime);
}

#[test]
fn boot_rom_register_values() {
    let cpu = Cpu::new_at_boot_rom();
    assert_eq!(cpu.regs.af(), 0x0000);
    assert_eq!(cpu.regs.pc, 0x0000);
    assert_eq!(cpu.regs.sp, 0x0000);
}

#[test]
fn nop_costs_four_cycles() {
    let (mut cpu, mut bus) = setup(&[0x00]);
    let cycles = cpu.step(&mut bus).unwrap();
    assert_eq!(cycles, 4);
    assert_eq!(cpu.dots, 4);
    assert_eq!(cpu.regs.pc, 0x0101);
}

#[test]
fn ld_r8_r8() {
    // LD B, A
    let (mut cpu, mut bus) = setup(&[0x47]);
    cpu.regs.a = 0x5A;
    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(cpu.regs.b, 0x5A);
}

#[test]
fn ld_through_hl_costs_eight() {
    // LD (HL), A ; LD C, (HL)
    let (mut cpu, mut bus) = setup(&[0x77, 0x4E]);
    cpu.regs.set_hl(0xC123);
    cpu.regs.a = 0x99;
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    assert_eq!(bus.mem[0xC123], 0x99);
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    assert_eq!(cpu.regs.c, 0x99);
}

#[test]
fn add_half_carry_at_bit_three() {
    // LD A, 0x0F ; ADD A, 0x01
    let (mut cpu, mut bus) = setup(&[0x3E, 0x0F, 0xC6, 0x01]);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    assert_eq!(cpu.regs.a, 0x10);
    assert_eq!(flags(&cpu), (false, false, true, false));
}

#[test]
fn add_full_carry_and_zero() {
    // LD A, 0x80 ; ADD A, 0x80
    let (mut cpu, mut bus) = setup(&[0x3E, 0x80, 0xC6, 0x80]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(flags(&cpu), (true, false, false, true));
}

#[test]
fn adc_folds_carry_into_operand() {
    // SCF ; LD A, 0x01 ; ADC A, 0x0E
    let (mut cpu, mut bus) = setup(&[0x37, 0x3E, 0x01, 0xCE, 0x0E]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    // 0x01 + 0x0E + carry = 0x10, half carry out of bit 3.
    assert_eq!(cpu.regs.a, 0x10);
    assert_eq!(flags(&cpu), (false, false, true, false));
}

#[test]
fn sub_borrow() {
    // LD A, 0x00 ; SUB A, 0x01
    let (mut cpu, mut bus) = setup(&[0x3E, 0x00, 0xD6, 0x01]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0xFF);
    assert_eq!(flags(&cpu), (false, true, true, true));
}

#[test]
fn sbc_with_carry_in() {
    // SCF ; LD A, 0x10 ; SBC A, 0x0E
    let (mut cpu, mut bus) = setup(&[0x37, 0x3E, 0x10, 0xDE, 0x0E]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    // 0x10 - (0x0E + 1) = 0x01, borrowing across bit 4.
    assert_eq!(cpu.regs.a, 0x01);
    assert_eq!(flags(&cpu), (false, true, true, false));
}

#[test]
fn cp_leaves_a_untouched() {
    // LD A, 0x42 ; CP 0x42
    let (mut cpu, mut bus) = setup(&[0x3E, 0x42, 0xFE, 0x42]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x42);
    assert_eq!(flags(&cpu), (true, true, false, false));
}

#[test]
fn and_sets_half_carry() {
    // LD A, 0xF0 ; AND 0x0F
    let (mut cpu, mut bus) = setup(&[0x3E, 0xF0, 0xE6, 0x0F]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(flags(&cpu), (true, false, true, false));
}

#[test]
fn xor_a_clears_everything_but_zero() {
    // XOR A
    let (mut cpu, mut bus) = setup(&[0xAF]);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(flags(&cpu), (true, false, false, false));
}

#[test]
fn inc_dec_preserve_carry() {
    // SCF ; INC B ; DEC B
    let (mut cpu, mut bus) = setup(&[0x37, 0x04, 0x05]);
    cpu.regs.b = 0x0F;
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.b, 0x10);
    assert_eq!(flags(&cpu), (false, false, true, true));
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.b, 0x0F);
    assert_eq!(flags(&cpu), (false, true, true, true));
}

#[test]
fn add_hl_half_carry_at_bit_eleven() {
    // LD HL, 0x0FFF ; LD BC, 0x0001 ; ADD HL, BC
    let (mut cpu, mut bus) = setup(&[0x21, 0xFF, 0x0F, 0x01, 0x01, 0x00, 0x09]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    // Seed Z to confirm ADD HL leaves it alone.
    cpu.regs.f = 0x80;
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    assert_eq!(cpu.regs.hl(), 0x1000);
    assert_eq!(flags(&cpu), (true, false, true, false));
}

#[test]
fn add_sp_signed_flag_trick() {
    // ADD SP, +0x01 with SP = 0x00FF: carries out of bits 3 and 7.
    let (mut cpu, mut bus) = setup(&[0xE8, 0x01]);
    cpu.regs.sp = 0x00FF;
    assert_eq!(cpu.step(&mut bus).unwrap(), 16);
    assert_eq!(cpu.regs.sp, 0x0100);
    assert_eq!(flags(&cpu), (false, false, true, true));
}

#[test]
fn add_sp_negative_offset() {
    // ADD SP, -1 with SP = 0x0000 wraps with no carries.
    let (mut cpu, mut bus) = setup(&[0xE8, 0xFF]);
    cpu.regs.sp = 0x0000;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.sp, 0xFFFF);
    assert_eq!(flags(&cpu), (false, false, false, false));
}

#[test]
fn ld_hl_sp_plus_offset() {
    let (mut cpu, mut bus) = setup(&[0xF8, 0xFE]);
    cpu.regs.sp = 0xFFF8;
    assert_eq!(cpu.step(&mut bus).unwrap(), 12);
    assert_eq!(cpu.regs.hl(), 0xFFF6);
    assert_eq!(cpu.regs.sp, 0xFFF8);
}

#[test]
fn daa_after_addition() {
    // LD A, 0x15 ; ADD A, 0x27 ; DAA -> BCD 42
    let (mut cpu, mut bus) = setup(&[0x3E, 0x15, 0xC6, 0x27, 0x27]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x3C);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x42);
    assert_eq!(flags(&cpu), (false, false, false, false));
}

#[test]
fn daa_after_subtraction() {
    // LD A, 0x20 ; SUB A, 0x13 ; DAA -> BCD 07
    let (mut cpu, mut bus) = setup(&[0x3E, 0x20, 0xD6, 0x13, 0x27]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x0D);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x07);
    assert_eq!(flags(&cpu), (false, true, false, false));
}

#[test]
fn daa_addition_carry() {
    // LD A, 0x99 ; ADD A, 0x01 ; DAA -> BCD 00 with carry
    let (mut cpu, mut bus) = setup(&[0x3E, 0x99, 0xC6, 0x01, 0x27]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(flags(&cpu), (true, false, false, true));
}

fn to_bcd(n: u8) -> u8 {
    ((n / 10) << 4) | (n % 10)
}

#[test]
fn daa_all_bcd_additions() {
    // ADD then DAA must implement two-digit BCD addition for every
    // operand pair, carrying past 99.
    for x in 0u16..100 {
        for y in 0u16..100 {
            let (mut cpu, mut bus) = setup(&[0xC6, to_bcd(y as u8), 0x27]);
            cpu.regs.a = to_bcd(x as u8);
            cpu.step(&mut bus).unwrap();
            cpu.step(&mut bus).unwrap();

            let sum = x + y;
            assert_eq!(cpu.regs.a, to_bcd((sum % 100) as u8), "{x} + {y}");
            assert_eq!(cpu.regs.flag(Flag::C), sum > 99, "{x} + {y} carry");
            assert_eq!(cpu.regs.flag(Flag::Z), sum % 100 == 0, "{x} + {y} zero");
            assert!(!cpu.regs.flag(Flag::H));
        }
    }
}

#[test]
fn daa_all_bcd_subtractions() {
    // SUB then DAA: two-digit BCD subtraction, borrowing below 0.
    for x in 0u16..100 {
        for y in 0u16..100 {
            let (mut cpu, mut bus) = setup(&[0xD6, to_bcd(y as u8), 0x27]);
            cpu.regs.a = to_bcd(x as u8);
            cpu.step(&mut bus).unwrap();
            cpu.step(&mut bus).unwrap();

            let diff = (100 + x - y) % 100;
            assert_eq!(cpu.regs.a, to_bcd(diff as u8), "{x} - {y}");
            assert_eq!(cpu.regs.flag(Flag::C), y > x, "{x} - {y} borrow");
            assert_eq!(cpu.regs.flag(Flag::Z), diff == 0, "{x} - {y} zero");
        }
    }
}

#[test]
fn cpl_scf_ccf() {
    let (mut cpu, mut bus) = setup(&[0x2F, 0x37, 0x3F]);
    cpu.regs.a = 0x35;
    cpu.regs.f = 0x00;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0xCA);
    assert_eq!(flags(&cpu), (false, true, true, false));
    cpu.step(&mut bus).unwrap();
    assert_eq!(flags(&cpu), (false, false, false, true));
    cpu.step(&mut bus).unwrap();
    assert_eq!(flags(&cpu), (false, false, false, false));
}

#[test]
fn rotate_a_forms_clear_zero() {
    // RLCA with A = 0x80: result 0x01, carry set, Z forced clear.
    let (mut cpu, mut bus) = setup(&[0x07, 0x1F]);
    cpu.regs.a = 0x80;
    cpu.regs.f = 0x80;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x01);
    assert_eq!(flags(&cpu), (false, false, false, true));
    // RRA shifts the carry into bit 7.
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x80);
    assert_eq!(flags(&cpu), (false, false, false, true));
}

#[test]
fn jr_backward_sign_extends() {
    // NOP ; JR -3 (back to the NOP)
    let (mut cpu, mut bus) = setup(&[0x00, 0x18, 0xFD]);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.step(&mut bus).unwrap(), 12);
    assert_eq!(cpu.regs.pc, 0x0100);
}

#[test]
fn jr_conditional_cycle_split() {
    // JR NZ, +2 with Z set: not taken.
    let (mut cpu, mut bus) = setup(&[0x20, 0x02, 0x20, 0x02]);
    cpu.regs.f = 0x80;
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    assert_eq!(cpu.regs.pc, 0x0102);
    // Same opcode with Z clear: taken.
    cpu.regs.f = 0x00;
    assert_eq!(cpu.step(&mut bus).unwrap(), 12);
    assert_eq!(cpu.regs.pc, 0x0106);
}

#[test]
fn jp_and_jp_hl() {
    let (mut cpu, mut bus) = setup(&[0xC3, 0x00, 0xC0]);
    assert_eq!(cpu.step(&mut bus).unwrap(), 16);
    assert_eq!(cpu.regs.pc, 0xC000);

    bus.mem[0xC000] = 0xE9; // JP HL
    cpu.regs.set_hl(0x0123);
    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(cpu.regs.pc, 0x0123);
}

#[test]
fn jp_conditional_cycle_split() {
    // JP C, 0xC000 with carry clear, then set.
    let (mut cpu, mut bus) = setup(&[0xDA, 0x00, 0xC0, 0xDA, 0x00, 0xC0]);
    cpu.regs.f = 0x00;
    assert_eq!(cpu.step(&mut bus).unwrap(), 12);
    assert_eq!(cpu.regs.pc, 0x0103);
    cpu.regs.f = 0x10;
    assert_eq!(cpu.step(&mut bus).unwrap(), 16);
    assert_eq!(cpu.regs.pc, 0xC000);
}

#[test]
fn call_and_ret() {
    // CALL 0xC000 ... at 0xC000: RET
    let (mut cpu, mut bus) = setup(&[0xCD, 0x00, 0xC0]);
    bus.mem[0xC000] = 0xC9;
    assert_eq!(cpu.step(&mut bus).unwrap(), 24);
    assert_eq!(cpu.regs.pc, 0xC000);
    assert_eq!(cpu.regs.sp, 0xFFFC);
    // Return address is the byte after the CALL, little-endian on stack.
    assert_eq!(bus.mem[0xFFFC], 0x03);
    assert_eq!(bus.mem[0xFFFD], 0x01);
    assert_eq!(cpu.step(&mut bus).unwrap(), 16);
    assert_eq!(cpu.regs.pc, 0x0103);
    assert_eq!(cpu.regs.sp, 0xFFFE);
}

#[test]
fn conditional_call_and_ret_cycles() {
    // CALL Z, 0xC000 with Z clear: skipped, 12 cycles.
    let (mut cpu, mut bus) = setup(&[0xCC, 0x00, 0xC0, 0xC8, 0xC0]);
    cpu.regs.f = 0x00;
    assert_eq!(cpu.step(&mut bus).unwrap(), 12);
    assert_eq!(cpu.regs.pc, 0x0103);
    // RET Z with Z clear: 8 cycles, falls through.
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    // RET NZ with Z clear: 20 cycles, pops.
    cpu.regs.sp = 0xFFF0;
    bus.mem[0xFFF0] = 0x34;
    bus.mem[0xFFF1] = 0x12;
    assert_eq!(cpu.step(&mut bus).unwrap(), 20);
    assert_eq!(cpu.regs.pc, 0x1234);
}

#[test]
fn rst_vectors() {
    // RST 0x28
    let (mut cpu, mut bus) = setup(&[0xEF]);
    assert_eq!(cpu.step(&mut bus).unwrap(), 16);
    assert_eq!(cpu.regs.pc, 0x0028);
    assert_eq!(cpu.regs.sp, 0xFFFC);
    assert_eq!(bus.mem[0xFFFC], 0x01);
    assert_eq!(bus.mem[0xFFFD], 0x01);
}

#[test]
fn push_pop_af_masks_low_nibble() {
    // PUSH BC ; POP AF
    let (mut cpu, mut bus) = setup(&[0xC5, 0xF1]);
    cpu.regs.set_bc(0x12FF);
    assert_eq!(cpu.step(&mut bus).unwrap(), 16);
    assert_eq!(cpu.step(&mut bus).unwrap(), 12);
    assert_eq!(cpu.regs.a, 0x12);
    assert_eq!(cpu.regs.f, 0xF0);
    assert_eq!(cpu.regs.sp, 0xFFFE);
}

#[test]
fn ld_mem16_sp() {
    // LD (0xC100), SP
    let (mut cpu, mut bus) = setup(&[0x08, 0x00, 0xC1]);
    cpu.regs.sp = 0xBEEF;
    assert_eq!(cpu.step(&mut bus).unwrap(), 20);
    assert_eq!(bus.mem[0xC100], 0xEF);
    assert_eq!(bus.mem[0xC101], 0xBE);
}

#[test]
fn hl_post_increment_and_decrement() {
    // LD (HL+), A ; LD (HL-), A ; LD A, (HL+)
    let (mut cpu, mut bus) = setup(&[0x22, 0x32, 0x2A]);
    cpu.regs.set_hl(0xC000);
    cpu.regs.a = 0x11;
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.mem[0xC000], 0x11);
    assert_eq!(cpu.regs.hl(), 0xC001);
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.mem[0xC001], 0x11);
    assert_eq!(cpu.regs.hl(), 0xC000);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x11);
    assert_eq!(cpu.regs.hl(), 0xC001);
}

#[test]
fn ld_a_from_imm16_reads_memory() {
    // LD A, (0xC234)
    let (mut cpu, mut bus) = setup(&[0xFA, 0x34, 0xC2]);
    bus.mem[0xC234] = 0x77;
    assert_eq!(cpu.step(&mut bus).unwrap(), 16);
    assert_eq!(cpu.regs.a, 0x77);
}

#[test]
fn high_page_addressing() {
    // LDH (0x80), A ; LDH A, (0x81) ; LDH (C), A ; LDH A, (C)
    let (mut cpu, mut bus) = setup(&[0xE0, 0x80, 0xF0, 0x81, 0xE2, 0xF2]);
    cpu.regs.a = 0x12;
    assert_eq!(cpu.step(&mut bus).unwrap(), 12);
    assert_eq!(bus.mem[0xFF80], 0x12);

    bus.mem[0xFF81] = 0x34;
    assert_eq!(cpu.step(&mut bus).unwrap(), 12);
    assert_eq!(cpu.regs.a, 0x34);

    cpu.regs.c = 0x82;
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    assert_eq!(bus.mem[0xFF82], 0x34);

    bus.mem[0xFF82] = 0x56;
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    assert_eq!(cpu.regs.a, 0x56);
}

#[test]
fn cb_bit_test() {
    // BIT 7, H with bit set then clear.
    let (mut cpu, mut bus) = setup(&[0xCB, 0x7C, 0xCB, 0x7C]);
    cpu.regs.h = 0x80;
    cpu.regs.f = 0x10;
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    // Carry preserved, H forced set.
    assert_eq!(flags(&cpu), (false, false, true, true));
    cpu.regs.h = 0x00;
    cpu.step(&mut bus).unwrap();
    assert_eq!(flags(&cpu), (true, false, true, true));
}

#[test]
fn cb_res_and_set() {
    // RES 3, B ; SET 0, B
    let (mut cpu, mut bus) = setup(&[0xCB, 0x98, 0xCB, 0xC0]);
    cpu.regs.b = 0xFF;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.b, 0xF7);
    cpu.regs.b = 0x00;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.b, 0x01);
}

#[test]
fn cb_rotates_and_shifts() {
    // RL C ; SRA D ; SWAP E ; SRL A
    let (mut cpu, mut bus) = setup(&[0xCB, 0x11, 0xCB, 0x2A, 0xCB, 0x33, 0xCB, 0x3F]);
    cpu.regs.c = 0x80;
    cpu.regs.f = 0x00;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.c, 0x00);
    assert_eq!(flags(&cpu), (true, false, false, true));

    cpu.regs.d = 0x81;
    cpu.step(&mut bus).unwrap();
    // Arithmetic shift keeps the sign bit.
    assert_eq!(cpu.regs.d, 0xC0);
    assert_eq!(flags(&cpu), (false, false, false, true));

    cpu.regs.e = 0xAB;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.e, 0xBA);
    assert_eq!(flags(&cpu), (false, false, false, false));

    cpu.regs.a = 0x01;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(flags(&cpu), (true, false, false, true));
}

#[test]
fn cb_through_hl_cycle_costs() {
    // RLC (HL) ; BIT 0, (HL)
    let (mut cpu, mut bus) = setup(&[0xCB, 0x06, 0xCB, 0x46]);
    cpu.regs.set_hl(0xC000);
    bus.mem[0xC000] = 0x81;
    assert_eq!(cpu.step(&mut bus).unwrap(), 16);
    assert_eq!(bus.mem[0xC000], 0x03);
    assert_eq!(cpu.step(&mut bus).unwrap(), 12);
}

#[test]
fn interrupt_dispatch_lowest_bit_wins() {
    let (mut cpu, mut bus) = setup(&[0x00]);
    cpu.ime = true;
    bus.mem[0xFFFF] = 0x1F;
    bus.mem[0xFF0F] = 0x1F;

    let cycles = cpu.step(&mut bus).unwrap();
    assert_eq!(cycles, 20);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert!(!cpu.ime);
    // Only the serviced bit is cleared; the NOP has not run.
    assert_eq!(bus.mem[0xFF0F], 0x1E);
    assert_eq!(cpu.regs.sp, 0xFFFC);
    assert_eq!(bus.mem[0xFFFC], 0x00);
    assert_eq!(bus.mem[0xFFFD], 0x01);
}

#[test]
fn interrupt_vectors_ascend() {
    for (bit, vector) in [(0u8, 0x0040u16), (1, 0x0048), (2, 0x0050), (3, 0x0058), (4, 0x0060)] {
        let (mut cpu, mut bus) = setup(&[0x00]);
        cpu.ime = true;
        bus.mem[0xFFFF] = 1 << bit;
        bus.mem[0xFF0F] = 1 << bit;
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.regs.pc, vector);
    }
}

#[test]
fn interrupt_needs_ime_and_enable() {
    // Pending but IME clear: the NOP executes.
    let (mut cpu, mut bus) = setup(&[0x00, 0x00]);
    bus.mem[0xFFFF] = 0x01;
    bus.mem[0xFF0F] = 0x01;
    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(cpu.regs.pc, 0x0101);

    // IME set but IE masks the pending bit: still no dispatch.
    cpu.ime = true;
    bus.mem[0xFFFF] = 0x02;
    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(cpu.regs.pc, 0x0102);
}

#[test]
fn ei_takes_effect_by_next_step() {
    // EI ; NOP with an interrupt already pending: dispatch happens at the
    // step boundary right after EI.
    let (mut cpu, mut bus) = setup(&[0xFB, 0x00]);
    bus.mem[0xFFFF] = 0x01;
    bus.mem[0xFF0F] = 0x01;
    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert!(cpu.ime);
    assert_eq!(cpu.step(&mut bus).unwrap(), 20);
    assert_eq!(cpu.regs.pc, 0x0040);
}

#[test]
fn reti_restores_ime() {
    let (mut cpu, mut bus) = setup(&[0xD9]);
    cpu.regs.sp = 0xFFF0;
    bus.mem[0xFFF0] = 0x00;
    bus.mem[0xFFF1] = 0x02;
    assert_eq!(cpu.step(&mut bus).unwrap(), 16);
    assert_eq!(cpu.regs.pc, 0x0200);
    assert!(cpu.ime);
}

#[test]
fn di_clears_ime() {
    let (mut cpu, mut bus) = setup(&[0xFB, 0xF3]);
    cpu.step(&mut bus).unwrap();
    assert!(cpu.ime);
    cpu.step(&mut bus).unwrap();
    assert!(!cpu.ime);
}

#[test]
fn illegal_opcode_is_an_error() {
    let (mut cpu, mut bus) = setup(&[0xD3]);
    let err = cpu.step(&mut bus).unwrap_err();
    assert_eq!(
        err,
        CoreError::IllegalOpcode {
            opcode: 0xD3,
            pc: 0x0100
        }
    );
}

#[test]
fn halt_and_stop_are_unimplemented() {
    let (mut cpu, mut bus) = setup(&[0x76]);
    assert_eq!(
        cpu.step(&mut bus).unwrap_err(),
        CoreError::UnimplementedOpcode {
            opcode: 0x76,
            pc: 0x0100
        }
    );

    let (mut cpu, mut bus) = setup(&[0x10]);
    assert_eq!(
        cpu.step(&mut bus).unwrap_err(),
        CoreError::UnimplementedOpcode {
            opcode: 0x10,
            pc: 0x0100
        }
    );
}

#[test]
fn inc_dec_r16_touch_no_flags() {
    // INC SP ; DEC BC
    let (mut cpu, mut bus) = setup(&[0x33, 0x0B]);
    cpu.regs.f = 0xF0;
    cpu.regs.set_bc(0x0000);
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    assert_eq!(cpu.regs.sp, 0xFFFF);
    assert_eq!(cpu.step(&mut bus).unwrap(), 8);
    assert_eq!(cpu.regs.bc(), 0xFFFF);
    assert_eq!(cpu.regs.f, 0xF0);
}

#[test]
fn small_program_counts_dots() {
    // LD A, 0x05 ; ADD A, 0x0B ; DAA
    let (mut cpu, mut bus) = setup(&[0x3E, 0x05, 0xC6, 0x0B, 0x27]);
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs.a, 0x16);
    assert_eq!(cpu.dots, 8 + 8 + 4);
}
