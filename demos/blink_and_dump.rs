//! Assembles a tiny LED-blink program, runs it against the sample
//! peripherals, and dumps the resulting register file and LED latch.

use z80_core::assembler::assemble;
use z80_core::emu::{Emu, StopReason};

const SOURCE: &str = "\
        LD A, 0x01\n\
    LOOP:\n\
        OUT (0x00), A\n\
        RLCA\n\
        DJNZ LOOP\n\
        HALT\n\
";

fn main() {
    let program = match assemble(SOURCE) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("assembly failed: {err}");
            return;
        }
    };

    println!("{}", program.listing);

    let (mut emu, peripherals) = Emu::with_sample_peripherals();
    emu.load(0, &program.image);
    emu.cpu.b = 8; // DJNZ counts down from B; loop 8 times to cycle the bit

    let reason = emu.run(1_000);
    match reason {
        StopReason::Halted => println!("halted after {} steps", emu.total_steps()),
        StopReason::Fault => {
            println!("{}", emu.dump_history());
            if let Some(fault) = emu.last_fault() {
                println!("fault: {fault}");
            }
            return;
        }
        StopReason::StepsComplete => println!("did not halt within the step budget"),
    }

    println!("A = {:#04X}", emu.cpu.a);
    println!("LED latch = {:#010b}", peripherals.leds.borrow().state());
}
