//! P/V-flag-specific regression tests.
//!
//! INC/DEC and the CB rotate/shift group compute genuine parity-or-overflow
//! for P/V rather than leaving it unset or copying the zero flag; these
//! tests pin that down so a future change can't silently regress it.

use super::*;

#[test]
fn cb_rlc_sets_parity_of_result_not_a_copy_of_zero() {
    // LD A,0x01 ; CB rotate: RLC A -> result 0x02 (one bit set, odd parity -> PV=0)
    let (cpu, _mem, _bus) = run_steps(&[0x3E, 0x01, 0xCB, 0x07], 2);
    assert_eq!(cpu.a, 0x02);
    assert!(!cpu.flag_pv());
}

#[test]
fn cb_rlc_even_parity_result_sets_pv() {
    // LD A,0x03 ; RLC A -> 0x06 (two bits set, even parity -> PV=1)
    let (cpu, _mem, _bus) = run_steps(&[0x3E, 0x03, 0xCB, 0x07], 2);
    assert_eq!(cpu.a, 0x06);
    assert!(cpu.flag_pv());
}

#[test]
fn cb_rlc_is_independent_of_zero_flag() {
    // LD A,0x80 ; RLC A -> result 0x01 (odd parity, PV=0), and result != 0 so Z=0 too;
    // the two flags must not be tied together.
    let (cpu, _mem, _bus) = run_steps(&[0x3E, 0x80, 0xCB, 0x07], 2);
    assert_eq!(cpu.a, 0x01);
    assert!(!cpu.flag_z());
    assert!(!cpu.flag_pv());
}

#[test]
fn inc_overflow_from_0x7f_sets_pv_and_half_carry() {
    let (cpu, _mem, _bus) = run_steps(&[0x3E, 0x7F, 0x3C], 2);
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.flag_pv());
    assert!(cpu.f & flags::H != 0);
}

#[test]
fn dec_overflow_from_0x80_sets_pv_and_half_carry() {
    // LD A,0x80 ; DEC A -> 0x7F, overflow (signed 0x80 -> 0x7F), half borrow
    let (cpu, _mem, _bus) = run_steps(&[0x3E, 0x80, 0x3D], 2);
    assert_eq!(cpu.a, 0x7F);
    assert!(cpu.flag_pv());
    assert!(cpu.f & flags::H != 0);
}

#[test]
fn inc_without_overflow_clears_pv() {
    let (cpu, _mem, _bus) = run_steps(&[0x3E, 0x10, 0x3C], 2);
    assert!(!cpu.flag_pv());
}

#[test]
fn and_sets_pv_to_parity_not_overflow() {
    // LD A,0x0F ; AND 0x03 -> 0x03 (two bits set, even parity -> PV=1)
    let (cpu, _mem, _bus) = run_steps(&[0x3E, 0x0F, 0xE6, 0x03], 2);
    assert_eq!(cpu.a, 0x03);
    assert!(cpu.flag_pv());
}

#[test]
fn add_signed_overflow_sets_pv_distinct_from_carry() {
    // LD A,0x7F ; ADD A,0x01 -> 0x80: signed overflow (PV=1), no unsigned carry (C=0)
    let (cpu, _mem, _bus) = run_steps(&[0x3E, 0x7F, 0xC6, 0x01], 2);
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.flag_pv());
    assert!(!cpu.flag_c());
}

#[test]
fn sub_signed_overflow_sets_pv_distinct_from_carry() {
    // LD A,0x80 ; SUB 0x01 -> 0x7F: signed overflow (PV=1), no borrow (C=0)
    let (cpu, _mem, _bus) = run_steps(&[0x3E, 0x80, 0xD6, 0x01], 2);
    assert_eq!(cpu.a, 0x7F);
    assert!(cpu.flag_pv());
    assert!(!cpu.flag_c());
}

#[test]
fn ldi_sets_pv_from_bc_nonzero_not_parity() {
    // LD HL,src ; LD DE,dst ; LD BC,2 ; LDI -> BC=1, PV=1 (BC!=0)
    let mut program = vec![
        0x21, 0x10, 0x00, 0x11, 0x20, 0x00, 0x01, 0x02, 0x00, 0xED, 0xA0, 0x76,
    ];
    program.resize(0x10, 0);
    program.push(0x99);
    let (cpu, _mem, _bus) = super::run_steps(&program, 4);
    assert_eq!(cpu.bc(), 1);
    assert!(cpu.flag_pv());
}

#[test]
fn ldi_clears_pv_when_bc_reaches_zero() {
    let mut program = vec![
        0x21, 0x10, 0x00, 0x11, 0x20, 0x00, 0x01, 0x01, 0x00, 0xED, 0xA0, 0x76,
    ];
    program.resize(0x10, 0);
    program.push(0x99);
    let (cpu, _mem, _bus) = super::run_steps(&program, 4);
    assert_eq!(cpu.bc(), 0);
    assert!(!cpu.flag_pv());
}
