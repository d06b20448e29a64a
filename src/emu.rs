//! Emulator orchestrator
//!
//! Owns the CPU, memory, and bus and coordinates stepping between them.
//! Bridges `Bus`'s interrupt latch to `Cpu::interrupt` — the Bus is the
//! surface external peripherals mutate, the CPU the surface that
//! acknowledges it — since the two are otherwise only connected through
//! `Cpu::step`'s borrowed references, not a standing link.

use crate::bus::Bus;
use crate::cpu::{Cpu, CpuFault};
use crate::memory::Memory;

/// Number of executed instructions retained for post-mortem diagnostics.
const HISTORY_SIZE: usize = 64;

/// One retained instruction: the PC it ran from and its opcode bytes.
#[derive(Clone, Default)]
struct HistoryEntry {
    pc: u16,
    opcode: [u8; 4],
    opcode_len: u8,
}

/// Ring buffer of the last [`HISTORY_SIZE`] executed instructions, for
/// dumping a trace when a run stops on a fault.
struct ExecutionHistory {
    entries: Vec<HistoryEntry>,
    write_idx: usize,
    count: usize,
}

impl ExecutionHistory {
    fn new() -> Self {
        Self {
            entries: vec![HistoryEntry::default(); HISTORY_SIZE],
            write_idx: 0,
            count: 0,
        }
    }

    fn record(&mut self, pc: u16, mem: &Memory) {
        let mut opcode = [0u8; 4];
        let len = peek_len(mem, pc);
        for (i, slot) in opcode.iter_mut().enumerate().take(len) {
            *slot = mem.read(pc.wrapping_add(i as u16));
        }
        self.entries[self.write_idx] = HistoryEntry {
            pc,
            opcode,
            opcode_len: len as u8,
        };
        self.write_idx = (self.write_idx + 1) % HISTORY_SIZE;
        if self.count < HISTORY_SIZE {
            self.count += 1;
        }
    }

    fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        let start = if self.count < HISTORY_SIZE {
            0
        } else {
            self.write_idx
        };
        (0..self.count).map(move |i| &self.entries[(start + i) % HISTORY_SIZE])
    }

    fn clear(&mut self) {
        self.write_idx = 0;
        self.count = 0;
    }
}

/// How many bytes the instruction at `pc` occupies, for history capture
/// only — a best-effort peek that never mutates state.
fn peek_len(mem: &Memory, pc: u16) -> usize {
    let first = mem.read(pc);
    match first {
        0xCB | 0xED => 2,
        0xDD | 0xFD => {
            if mem.read(pc.wrapping_add(1)) == 0xCB {
                4
            } else {
                2
            }
        }
        _ => 1,
    }
    .min(4)
}

/// Why a run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ran the requested number of steps.
    StepsComplete,
    /// The CPU executed `HALT`.
    Halted,
    /// `Cpu::step` returned a fault.
    Fault,
}

/// Owns Memory, Bus, and Cpu and runs them together.
pub struct Emu {
    pub cpu: Cpu,
    pub bus: Bus,
    pub memory: Memory,
    history: ExecutionHistory,
    total_steps: u64,
    last_fault: Option<CpuFault>,
}

impl Emu {
    /// Build an emulator with a fresh, unmapped bus (no sample peripherals).
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            bus: Bus::new(),
            memory: Memory::new(),
            history: ExecutionHistory::new(),
            total_steps: 0,
            last_fault: None,
        }
    }

    /// Build an emulator whose bus already has every sample peripheral
    /// from [`crate::peripherals`] wired up.
    pub fn with_sample_peripherals() -> (Self, crate::peripherals::SamplePeripherals) {
        let (bus, peripherals) = Bus::with_sample_peripherals();
        let emu = Self {
            cpu: Cpu::new(),
            bus,
            memory: Memory::new(),
            history: ExecutionHistory::new(),
            total_steps: 0,
            last_fault: None,
        };
        (emu, peripherals)
    }

    /// Load a byte image at `base`, wrapping past 0xFFFF.
    pub fn load(&mut self, base: u16, image: &[u8]) {
        self.memory.load(base, image);
    }

    /// Reset the CPU, clear memory, and reset the bus's interrupt latch
    /// (registered handlers survive, since they're wiring, not state).
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.memory.reset();
        self.bus.reset();
        self.history.clear();
        self.total_steps = 0;
        self.last_fault = None;
    }

    /// Step once. Records history, then bridges any interrupt the bus
    /// latched during the prior step's IN/OUT handlers into the CPU.
    pub fn step(&mut self) -> Result<(), CpuFault> {
        self.history.record(self.cpu.pc, &self.memory);
        let result = self.cpu.step(&mut self.bus, &mut self.memory);
        self.total_steps += 1;

        if self.bus.interrupt_pending() {
            self.cpu.interrupt();
            self.bus.clear_interrupt();
        }

        if let Err(fault) = result {
            self.last_fault = Some(fault);
        }
        result
    }

    /// Step until `HALT`, a fault, or `max_steps` steps have run.
    pub fn run(&mut self, max_steps: u64) -> StopReason {
        for _ in 0..max_steps {
            if self.cpu.halted {
                return StopReason::Halted;
            }
            if self.step().is_err() {
                return StopReason::Fault;
            }
            if self.cpu.halted {
                return StopReason::Halted;
            }
        }
        StopReason::StepsComplete
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn last_fault(&self) -> Option<CpuFault> {
        self.last_fault
    }

    /// A human-readable trace of the last [`HISTORY_SIZE`] instructions,
    /// oldest first, for diagnosing a faulted run.
    pub fn dump_history(&self) -> String {
        let mut out = String::from("Execution history (oldest to newest):\n");
        for entry in self.history.iter() {
            let bytes = &entry.opcode[..entry.opcode_len as usize];
            let (mnemonic, _) = crate::disasm::disassemble(bytes);
            let byte_text = bytes
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" ");
            out.push_str(&format!("  PC={:04X}  {byte_text:<11}  {mnemonic}\n", entry.pc));
        }
        out.push_str(&format!("Total steps: {}\n", self.total_steps));
        if let Some(fault) = &self.last_fault {
            out.push_str(&format!("Last fault: {fault}\n"));
        }
        out
    }
}

impl Default for Emu {
    fn default() -> Self {
        Self::new()
    }
}
