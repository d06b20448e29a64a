//! Z80 CPU test suite
//!
//! - `instructions.rs`: one test per instruction family
//! - `modes.rs`: prefix (DD/FD/CB) and interrupt-mode edge cases
//! - `parity.rs`: P/V-flag-specific regression tests

use super::*;
use crate::bus::Bus;
use crate::memory::Memory;

mod modes;
mod parity;

/// Load `bytes` at address 0 and run a fresh CPU against them.
fn run(bytes: &[u8]) -> (Cpu, Memory, Bus) {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut bus = Bus::new();
    mem.load(0, bytes);
    cpu.reset();
    loop {
        cpu.step(&mut bus, &mut mem).expect("cpu fault");
        if cpu.halted {
            break;
        }
    }
    (cpu, mem, bus)
}

/// Step exactly `n` instructions without requiring a HALT.
fn run_steps(bytes: &[u8], n: usize) -> (Cpu, Memory, Bus) {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut bus = Bus::new();
    mem.load(0, bytes);
    cpu.reset();
    for _ in 0..n {
        cpu.step(&mut bus, &mut mem).expect("cpu fault");
    }
    (cpu, mem, bus)
}

#[test]
fn reset_sets_documented_initial_state() {
    let mut cpu = Cpu::new();
    cpu.a = 0xFF;
    cpu.pc = 0x1234;
    cpu.sp = 0x0001;
    cpu.iff1 = true;
    cpu.halted = true;
    cpu.reset();
    assert_eq!(cpu.pc, 0);
    assert_eq!(cpu.sp, 0xFFFF);
    assert_eq!(cpu.a, 0);
    assert!(!cpu.iff1);
    assert!(!cpu.iff2);
    assert!(!cpu.halted);
    assert_eq!(cpu.im, InterruptMode::Mode0);
}

#[test]
fn halt_stops_stepping_until_interrupt() {
    // HALT
    let (cpu, _mem, _bus) = run_steps(&[0x76], 1);
    assert!(cpu.halted);
}

#[test]
fn interrupt_wakes_halted_cpu_when_enabled() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut bus = Bus::new();
    mem.load(0, &[0xFB, 0x76]); // EI ; HALT
    cpu.step(&mut bus, &mut mem).unwrap();
    cpu.step(&mut bus, &mut mem).unwrap();
    assert!(cpu.halted);
    cpu.interrupt();
    assert!(!cpu.halted);
    cpu.step(&mut bus, &mut mem).unwrap();
    assert_eq!(cpu.pc, 0x0038);
    assert!(!cpu.iff1);
}

#[test]
fn unmapped_in_returns_ff_and_unmapped_out_is_discarded() {
    // IN A,(0x40) ; OUT (0x40),A ; HALT
    let (cpu, _mem, _bus) = run(&[0xDB, 0x40, 0xD3, 0x40, 0x76]);
    assert_eq!(cpu.a, 0xFF);
}
