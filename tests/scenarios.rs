//! End-to-end scenarios: assemble a short program, run it to HALT, and
//! check the documented observables (registers, memory, and port state).

use z80_core::assembler::assemble;
use z80_core::cpu::{C, H, PV, Z};
use z80_core::emu::{Emu, StopReason};

fn run_to_halt(source: &str) -> Emu {
    let program = assemble(source).expect("assembly failed");
    let mut emu = Emu::new();
    emu.load(0, &program.image);
    let reason = emu.run(10_000);
    assert_eq!(reason, StopReason::Halted, "program did not halt: {}", source);
    emu
}

#[test]
fn add_two_immediates_and_latch_to_a_port() {
    let source = "\
        LD A, 10\n\
        ADD A, 20\n\
        OUT (0x17), A\n\
        HALT\n";
    let program = assemble(source).unwrap();
    let (mut emu, peripherals) = Emu::with_sample_peripherals();
    emu.load(0, &program.image);
    assert_eq!(emu.run(100), StopReason::Halted);

    assert_eq!(emu.cpu.a, 30);
    assert_eq!(peripherals.seven_segment.borrow().digits()[7], 30);
    assert_eq!(emu.cpu.f & C, 0);
}

#[test]
fn overflowing_add_sets_zero_carry_and_half_carry() {
    let source = "\
        LD A, 0xFF\n\
        ADD A, 0x01\n\
        OUT (0x00), A\n\
        HALT\n";
    let (mut emu, peripherals) = Emu::with_sample_peripherals();
    let program = assemble(source).unwrap();
    emu.load(0, &program.image);
    assert_eq!(emu.run(100), StopReason::Halted);

    assert_eq!(peripherals.leds.borrow().state(), 0);
    assert_ne!(emu.cpu.f & Z, 0);
    assert_ne!(emu.cpu.f & C, 0);
    assert_ne!(emu.cpu.f & H, 0);
}

#[test]
fn djnz_loop_counts_down_and_leaves_the_trip_count_in_a() {
    let source = "\
        LD B, 3\n\
        LD A, 0\n\
    L:  INC A\n\
        DJNZ L\n\
        OUT (0x17), A\n\
        HALT\n";
    let (mut emu, peripherals) = Emu::with_sample_peripherals();
    let program = assemble(source).unwrap();
    emu.load(0, &program.image);
    assert_eq!(emu.run(1_000), StopReason::Halted);

    assert_eq!(peripherals.seven_segment.borrow().digits()[7], 3);
    assert_eq!(emu.cpu.b, 0);
}

#[test]
fn sixteen_bit_store_and_reload_round_trips_through_memory() {
    let source = "\
        LD HL, 0x1234\n\
        LD (0x8000), HL\n\
        LD HL, 0\n\
        LD HL, (0x8000)\n\
        HALT\n";
    let emu = run_to_halt(source);

    assert_eq!(emu.cpu.h, 0x12);
    assert_eq!(emu.cpu.l, 0x34);
    assert_eq!(emu.memory.read(0x8000), 0x34);
    assert_eq!(emu.memory.read(0x8001), 0x12);
}

#[test]
fn rlca_rotates_the_high_bit_into_carry_and_bit_zero() {
    let source = "\
        LD A, 0x80\n\
        RLCA\n\
        OUT (0x17), A\n\
        HALT\n";
    let (mut emu, peripherals) = Emu::with_sample_peripherals();
    let program = assemble(source).unwrap();
    emu.load(0, &program.image);
    assert_eq!(emu.run(100), StopReason::Halted);

    assert_eq!(peripherals.seven_segment.borrow().digits()[7], 0x01);
    assert_ne!(emu.cpu.f & C, 0);
}

#[test]
fn ldir_copies_a_block_and_clears_bc_and_parity_overflow() {
    let source = "\
        LD HL, SRC\n\
        LD DE, DST\n\
        LD BC, 4\n\
        LDIR\n\
        HALT\n\
    SRC: DB 0xAA, 0xBB, 0xCC, 0xDD\n\
    DST: DS 4\n";
    let program = assemble(source).unwrap();
    let dst = *program.labels.get("DST").unwrap() as u16;

    let emu = run_to_halt(source);

    assert_eq!(emu.memory.read(dst), 0xAA);
    assert_eq!(emu.memory.read(dst.wrapping_add(1)), 0xBB);
    assert_eq!(emu.memory.read(dst.wrapping_add(2)), 0xCC);
    assert_eq!(emu.memory.read(dst.wrapping_add(3)), 0xDD);
    assert_eq!(emu.cpu.b, 0);
    assert_eq!(emu.cpu.c, 0);
    assert_eq!(emu.cpu.f & PV, 0);
}
