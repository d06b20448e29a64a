//! Prefix handling (DD/FD/CB) and interrupt-mode edge cases.

use super::*;

#[test]
fn dd_prefix_redirects_hl_to_ix_halves() {
    // LD IXH,0x12 ; LD IXL,0x34 ; INC IXH
    let (cpu, _mem, _bus) = run_steps(&[0xDD, 0x26, 0x12, 0xDD, 0x2E, 0x34, 0xDD, 0x24], 3);
    assert_eq!(cpu.ix, 0x1334);
}

#[test]
fn dd_prefix_with_hl_operand_uses_ix_plus_displacement() {
    // LD IX,0x1000 ; LD (IX+5),0x42 ; LD A,(IX+5)
    let (cpu, mem, _bus) = run_steps(
        &[0xDD, 0x21, 0x00, 0x10, 0xDD, 0x36, 0x05, 0x42, 0xDD, 0x7E, 0x05],
        3,
    );
    assert_eq!(mem.read(0x1005), 0x42);
    assert_eq!(cpu.a, 0x42);
}

#[test]
fn fd_prefix_targets_iy() {
    // LD IY,0x2000 ; INC (IY+2)
    let (_cpu, mem, _bus) = run_steps(&[0xFD, 0x21, 0x00, 0x20, 0xFD, 0x34, 0x02], 2);
    assert_eq!(mem.read(0x2002), 1);
}

#[test]
fn ddcb_byte_order_is_prefix_cb_displacement_subopcode() {
    // LD IX,0x3000 ; LD (IX+1),0x0F ; DD CB 01 06 -> RLC (IX+1)
    let program = [
        0xDD, 0x21, 0x00, 0x30, // LD IX,0x3000
        0xDD, 0x36, 0x01, 0x0F, // LD (IX+1),0x0F
        0xDD, 0xCB, 0x01, 0x06, // RLC (IX+1)
    ];
    let (_cpu, mem, _bus) = run_steps(&program, 3);
    assert_eq!(mem.read(0x3001), 0x1E);
}

#[test]
fn bit_instruction_sets_zero_flag_complement_of_tested_bit() {
    // LD A,0x00 ; CB 47 -> BIT 0,A
    let (cpu, _mem, _bus) = run_steps(&[0x3E, 0x00, 0xCB, 0x47], 2);
    assert!(cpu.flag_z());
}

#[test]
fn im_modes_all_resolve_to_vector_0038() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut bus = Bus::new();
    // IM 1 ; EI ; HALT
    mem.load(0, &[0xED, 0x56, 0xFB, 0x76]);
    cpu.step(&mut bus, &mut mem).unwrap();
    assert_eq!(cpu.im, InterruptMode::Mode1);
    cpu.step(&mut bus, &mut mem).unwrap();
    cpu.step(&mut bus, &mut mem).unwrap();
    cpu.interrupt();
    cpu.step(&mut bus, &mut mem).unwrap();
    assert_eq!(cpu.pc, 0x0038);
}

#[test]
fn retn_restores_iff1_from_iff2() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut bus = Bus::new();
    cpu.iff2 = true;
    cpu.sp = 0x0000;
    mem.load(0, &[0xED, 0x45]); // RETN
    cpu.step(&mut bus, &mut mem).unwrap();
    assert!(cpu.iff1);
}

#[test]
fn ex_de_hl_applied_twice_restores_originals() {
    let mut cpu = Cpu::new();
    cpu.set_de(0x1234);
    cpu.set_hl(0x5678);
    cpu.ex_de_hl();
    cpu.ex_de_hl();
    assert_eq!(cpu.de(), 0x1234);
    assert_eq!(cpu.hl(), 0x5678);
}

#[test]
fn exx_applied_twice_restores_originals() {
    let mut cpu = Cpu::new();
    cpu.set_bc(0x1111);
    cpu.set_de(0x2222);
    cpu.set_hl(0x3333);
    cpu.exx();
    cpu.exx();
    assert_eq!(cpu.bc(), 0x1111);
    assert_eq!(cpu.de(), 0x2222);
    assert_eq!(cpu.hl(), 0x3333);
}

#[test]
fn ex_af_applied_twice_restores_originals() {
    let mut cpu = Cpu::new();
    cpu.a = 0xAB;
    cpu.f = 0xCD;
    cpu.ex_af();
    cpu.ex_af();
    assert_eq!(cpu.a, 0xAB);
    assert_eq!(cpu.f, 0xCD);
}

#[test]
fn stack_push_below_zero_is_a_fatal_fault() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut bus = Bus::new();
    cpu.sp = 0x0000;
    mem.load(0, &[0xC5]); // PUSH BC
    assert!(cpu.step(&mut bus, &mut mem).is_err());
}

#[test]
fn stack_pop_above_top_is_a_fatal_fault() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut bus = Bus::new();
    cpu.sp = 0xFFFF;
    mem.load(0, &[0xC1]); // POP BC
    assert!(cpu.step(&mut bus, &mut mem).is_err());
}
