//! Command-line assembler front end.
//!
//! Usage:
//!   cargo run --release --example assemble_cli -- <source.asm> [--run]
//!
//! Assembles the given file and prints its listing, label table, and byte
//! image (as a hex dump). With `--run`, also loads the image and steps the
//! CPU to HALT or a fault, printing the final register file.

use std::env;
use std::fs;
use std::process::ExitCode;

use z80_core::assembler::assemble;
use z80_core::emu::{Emu, StopReason};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        print_help();
        return ExitCode::FAILURE;
    };
    let run_after = args.iter().any(|a| a == "--run");

    let source = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("failed to read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let program = match assemble(&source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("assembly failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("{}", program.listing);

    println!("labels:");
    let mut labels: Vec<_> = program.labels.iter().collect();
    labels.sort_by_key(|(name, _)| name.clone());
    for (name, value) in labels {
        println!("  {name:<16} = {value:#06X}");
    }

    println!("\nimage ({} bytes):", program.image.len());
    for (row, chunk) in program.image.chunks(16).enumerate() {
        let hex = chunk.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
        println!("  {:04X} | {hex}", row * 16);
    }

    if run_after {
        let mut emu = Emu::new();
        emu.load(0, &program.image);
        match emu.run(100_000) {
            StopReason::Halted => println!("\nhalted after {} steps", emu.total_steps()),
            StopReason::Fault => {
                println!("\n{}", emu.dump_history());
                if let Some(fault) = emu.last_fault() {
                    println!("fault: {fault}");
                }
                return ExitCode::FAILURE;
            }
            StopReason::StepsComplete => println!("\ndid not halt within 100000 steps"),
        }
        println!(
            "A={:02X} BC={:04X} DE={:04X} HL={:04X} SP={:04X} PC={:04X}",
            emu.cpu.a,
            emu.cpu.bc(),
            emu.cpu.de(),
            emu.cpu.hl(),
            emu.cpu.sp,
            emu.cpu.pc
        );
    }

    ExitCode::SUCCESS
}

fn print_help() {
    eprintln!("usage: assemble_cli <source.asm> [--run]");
}
