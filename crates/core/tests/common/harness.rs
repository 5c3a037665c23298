//! A thin `Cpu` harness for the end-to-end scenario tests: load a word
//! sequence at address 0, run to completion, and inspect the result.

use pipesim_core::common::RegNum;
use pipesim_core::{Config, Cpu, FlatMemory, StopReason};

const MEM_SIZE: usize = 4096;

/// Owns a `Cpu` constructed over a fresh, zero-initialized [`FlatMemory`].
pub struct TestContext {
    cpu: Cpu,
}

impl TestContext {
    /// Assembles `words` into memory starting at address 0 (Fetch's entry
    /// PC) and builds the `Cpu` over it with the default microarchitectural
    /// configuration.
    #[must_use]
    pub fn load_program(words: &[u32]) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut mem = FlatMemory::new(0, MEM_SIZE);
        let mut image = Vec::with_capacity(words.len() * 4);
        for word in words {
            image.extend_from_slice(&word.to_le_bytes());
        }
        mem.load_image(&image);

        let cpu = Cpu::new(&Config::default(), Box::new(mem), 0)
            .expect("default configuration always validates");
        Self { cpu }
    }

    /// Runs to completion (trap or budget exhaustion) and returns why it stopped.
    pub fn run(&mut self) -> StopReason {
        self.cpu.run()
    }

    /// Reads a general-purpose register.
    #[must_use]
    pub fn reg(&self, r: u32) -> u32 {
        self.cpu.register(r as RegNum)
    }

    /// Reads the `HI` auxiliary register.
    #[must_use]
    pub fn hi(&self) -> u32 {
        self.cpu.hi()
    }

    /// Reads the `LO` auxiliary register.
    #[must_use]
    pub fn lo(&self) -> u32 {
        self.cpu.lo()
    }

    /// A snapshot of the running statistics counters.
    #[must_use]
    pub fn stats(&self) -> pipesim_core::SimStats {
        self.cpu.stats()
    }
}
