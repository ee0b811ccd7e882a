//! Register and memory surface shared with the CPU emulator.
//!
//! Device handlers never own machine state. They read and mutate it through
//! the [`Machine`] trait on every access, so a channel program that stores
//! into memory and then jumps through it sees its own writes.

/// Keys bit selecting condition-code mode for I/O success.
pub const KEYS_CC_MODE: u16 = 0o10000;

/// Keys bit set on I/O success in condition-code mode (EQ).
pub const KEYS_EQ: u16 = 0o100;

/// Number of entries in the DMA register bank.
pub const DMA_REGS: usize = 64;

/// `JMP *-1`, the skip-mode retry loop.
const JMP_SELF: u16 = 0o3776;

/// `BCNE`, the condition-code-mode retry branch (target in the next word).
const BCNE: u16 = 0o141603;

/// Memory and registers the I/O subsystem reads and writes.
pub trait Machine {
    /// Read a memory word.
    fn read_word(&self, addr: u16) -> u16;

    /// Write a memory word.
    fn write_word(&mut self, addr: u16, value: u16);

    /// Accumulator.
    fn a(&self) -> u16;
    fn set_a(&mut self, value: u16);

    /// Condition/mode register.
    fn keys(&self) -> u16;
    fn set_keys(&mut self, value: u16);

    /// Entry of the DMA register bank.
    fn dma(&self, index: usize) -> u16;
    fn set_dma(&mut self, index: usize, value: u16);

    /// Instruction pointer. While an I/O instruction executes this points at
    /// the word following it.
    fn rp(&self) -> u16;
    fn set_rp(&mut self, value: u16);
}

/// Signal that an I/O instruction succeeded.
///
/// In condition-code mode this sets EQ, otherwise the next instruction word
/// is skipped.
pub fn io_skip(machine: &mut dyn Machine) {
    let keys = machine.keys();
    if keys & KEYS_CC_MODE != 0 {
        machine.set_keys(keys | KEYS_EQ);
    } else {
        machine.set_rp(machine.rp().wrapping_add(1));
    }
}

/// Decides whether the program will spin on an I/O instruction until it
/// succeeds.
pub type RetryDetector = fn(&dyn Machine) -> bool;

/// Recognize `JMP *-1` or `BCNE *-2` right after the I/O instruction.
pub fn detect_retry_loop(machine: &dyn Machine) -> bool {
    let rp = machine.rp();
    let next = machine.read_word(rp);
    next == JMP_SELF
        || (next == BCNE && machine.read_word(rp.wrapping_add(1)) == rp.wrapping_sub(2))
}

/// Plain word-addressed machine: 64K words of memory plus the registers the
/// I/O subsystem touches.
#[derive(Debug)]
pub struct CoreMachine {
    memory: Vec<u16>,
    a: u16,
    keys: u16,
    rp: u16,
    dma: [u16; DMA_REGS],
}

impl Default for CoreMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreMachine {
    pub fn new() -> Self {
        Self {
            memory: vec![0; u16::MAX as usize + 1],
            a: 0,
            keys: 0,
            rp: 0,
            dma: [0; DMA_REGS],
        }
    }

    /// Copy words into memory starting at `addr`. Words past the end of
    /// memory are dropped.
    pub fn load_image(&mut self, addr: u16, words: &[u16]) {
        let start = addr as usize;
        let end = (start + words.len()).min(self.memory.len());
        self.memory[start..end].copy_from_slice(&words[..end - start]);
    }

    /// Load a big-endian byte image. A trailing odd byte fills the high half
    /// of the last word.
    pub fn load_bytes(&mut self, addr: u16, bytes: &[u8]) {
        let words: Vec<u16> = bytes
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
            .collect();
        self.load_image(addr, &words);
    }

    /// View a range of memory.
    pub fn words(&self, addr: u16, len: usize) -> &[u16] {
        let start = addr as usize;
        let end = (start + len).min(self.memory.len());
        &self.memory[start..end]
    }
}

impl Machine for CoreMachine {
    fn read_word(&self, addr: u16) -> u16 {
        self.memory[addr as usize]
    }

    fn write_word(&mut self, addr: u16, value: u16) {
        self.memory[addr as usize] = value;
    }

    fn a(&self) -> u16 {
        self.a
    }

    fn set_a(&mut self, value: u16) {
        self.a = value;
    }

    fn keys(&self) -> u16 {
        self.keys
    }

    fn set_keys(&mut self, value: u16) {
        self.keys = value;
    }

    fn dma(&self, index: usize) -> u16 {
        self.dma[index % DMA_REGS]
    }

    fn set_dma(&mut self, index: usize, value: u16) {
        self.dma[index % DMA_REGS] = value;
    }

    fn rp(&self) -> u16 {
        self.rp
    }

    fn set_rp(&mut self, value: u16) {
        self.rp = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_advances_rp() {
        let mut m = CoreMachine::new();
        m.set_rp(0o1000);
        io_skip(&mut m);
        assert_eq!(m.rp(), 0o1001);
        assert_eq!(m.keys() & KEYS_EQ, 0);
    }

    #[test]
    fn test_skip_sets_eq_in_cc_mode() {
        let mut m = CoreMachine::new();
        m.set_rp(0o1000);
        m.set_keys(KEYS_CC_MODE);
        io_skip(&mut m);
        assert_eq!(m.rp(), 0o1000);
        assert_eq!(m.keys(), KEYS_CC_MODE | KEYS_EQ);
    }

    #[test]
    fn test_detect_jmp_self() {
        let mut m = CoreMachine::new();
        m.set_rp(0o1001);
        assert!(!detect_retry_loop(&m));
        m.write_word(0o1001, JMP_SELF);
        assert!(detect_retry_loop(&m));
    }

    #[test]
    fn test_detect_bcne_back() {
        let mut m = CoreMachine::new();
        m.set_rp(0o1001);
        m.load_image(0o1001, &[BCNE, 0o777]);
        assert!(detect_retry_loop(&m));

        // Branch somewhere else is not a retry loop
        m.write_word(0o1002, 0o2000);
        assert!(!detect_retry_loop(&m));
    }

    #[test]
    fn test_load_bytes_big_endian() {
        let mut m = CoreMachine::new();
        m.load_bytes(0o100, &[0x12, 0x34, 0x56]);
        assert_eq!(m.words(0o100, 2), &[0x1234, 0x5600]);
    }
}
