//! The 8-bit I/O bus
//!
//! The Z80's IN/OUT instructions address a separate 256-port space from
//! memory. The [`Bus`] dispatches each port number to a handler a
//! peripheral registered at init time; unmapped ports read as 0xFF and
//! discard writes. The bus also carries the interrupt latch that
//! peripherals use to request servicing: `trigger_interrupt` is the one
//! piece of state an outside caller may mutate while the CPU is not
//! mid-step.

/// A handler that produces a byte for an `IN` on its registered port.
pub type InputHandler = Box<dyn FnMut() -> u8>;
/// A handler that consumes a byte from an `OUT` on its registered port.
pub type OutputHandler = Box<dyn FnMut(u8)>;

/// Number of addressable ports (the full 8-bit port space).
pub const PORT_COUNT: usize = 256;

/// The 256-port I/O dispatcher and interrupt latch.
pub struct Bus {
    inputs: Vec<Option<InputHandler>>,
    outputs: Vec<Option<OutputHandler>>,
    interrupt_pending: bool,
}

impl Bus {
    /// Construct a bus with every port unmapped.
    pub fn new() -> Self {
        let mut inputs = Vec::with_capacity(PORT_COUNT);
        let mut outputs = Vec::with_capacity(PORT_COUNT);
        inputs.resize_with(PORT_COUNT, || None);
        outputs.resize_with(PORT_COUNT, || None);
        Self {
            inputs,
            outputs,
            interrupt_pending: false,
        }
    }

    /// Attach an input producer to `port`. Replaces any existing handler.
    pub fn register_in<F>(&mut self, port: u8, handler: F)
    where
        F: FnMut() -> u8 + 'static,
    {
        self.inputs[port as usize] = Some(Box::new(handler));
    }

    /// Attach an output consumer to `port`. Replaces any existing handler.
    pub fn register_out<F>(&mut self, port: u8, handler: F)
    where
        F: FnMut(u8) + 'static,
    {
        self.outputs[port as usize] = Some(Box::new(handler));
    }

    /// Perform an `IN` on `port`. Unmapped ports return 0xFF.
    pub fn read(&mut self, port: u8) -> u8 {
        match &mut self.inputs[port as usize] {
            Some(handler) => handler(),
            None => 0xFF,
        }
    }

    /// Perform an `OUT` on `port`. Unmapped ports discard the value.
    pub fn write(&mut self, port: u8, value: u8) {
        if let Some(handler) = &mut self.outputs[port as usize] {
            handler(value);
        }
    }

    /// Latch a pending interrupt unconditionally. A peripheral calls this
    /// regardless of the CPU's current interrupt-enable state; the CPU
    /// observes and clears the latch the next time it services interrupts.
    pub fn trigger_interrupt(&mut self) {
        self.interrupt_pending = true;
    }

    /// Read the latch without clearing it.
    pub fn interrupt_pending(&self) -> bool {
        self.interrupt_pending
    }

    /// Clear the latch. Called by the CPU once it has acknowledged.
    pub fn clear_interrupt(&mut self) {
        self.interrupt_pending = false;
    }

    /// Clear the interrupt latch. Registered handlers are wiring, not
    /// program state, and survive a reset.
    pub fn reset(&mut self) {
        self.interrupt_pending = false;
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
