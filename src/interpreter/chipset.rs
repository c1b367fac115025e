use std::ops::Range;

use rand::RngCore;
use tinyvec::ArrayVec;

use crate::{
    config::Quirks,
    definitions::{cpu, display, memory},
    devices::Keypad,
    error::{ExecutionError, Fault, LoadError, ProcessError, StackError},
    opcode::{self, Opcode, Operation},
    resources::Rom,
};

/// The Interpreter struct represents the current state
/// of the system, it contains all the structures
/// needed for emulating an instant on the
/// Chip8 CPU.
pub struct Interpreter {
    /// name of the loaded rom
    pub(super) name: String,
    /// the last fetched opcode, all two bytes long and stored big-endian
    pub(super) opcode: Opcode,
    /// - `0x000-0x1FF` - Chip 8 interpreter (contains font set in emu)
    /// - `0x000-0x04F` - Used for the built in `4x5` pixel font set (`0-F`)
    /// - `0x200-0xFFF` - Program ROM and work RAM
    pub(super) memory: Vec<u8>,
    /// `8-bit` data registers named `V0` to `VF`. The `VF` register doubles as a flag for some
    /// instructions; thus, it should be avoided. In an addition operation, `VF` is the carry flag,
    /// while in subtraction, it is the "no borrow" flag. In the draw instruction `VF` is set upon
    /// pixel collision.
    pub(super) registers: [u8; cpu::register::SIZE],
    /// The index for the register, this is a special register entry
    /// called index `I`
    pub(super) index_register: u16,
    /// The program counter is a CPU register in the computer processor which has the address of the
    /// next instruction to be executed from memory.
    pub(super) program_counter: usize,
    /// The stack is only used to store return addresses when subroutines are called. The original
    /// [RCA 1802](https://de.wikipedia.org/wiki/RCA1802) version allocated `48` bytes for up to
    /// `12` levels of nesting; modern implementations usually have more.
    /// (here we are using `16`)
    pub(super) stack: ArrayVec<[usize; cpu::stack::SIZE]>,
    /// Delay timer: This timer is intended to be used for timing the events of games. Its value
    /// can be set and read.
    /// Counts down at 60 hertz, until it reaches 0.
    pub(super) delay_timer: u8,
    /// Sound timer: This timer is used for sound effects. When its value is nonzero, a beeping
    /// sound is made.
    /// Counts down at 60 hertz, until it reaches 0.
    pub(super) sound_timer: u8,
    /// The graphics of the Chip 8 are black and white and the screen has a total of `2048` pixels
    /// `(64 x 32)`, one byte per pixel holding `0` or `1`, indexed by `x + y * 64`.
    pub(super) display: Vec<u8>,
    /// The compatibility toggles used while executing.
    pub(super) quirks: Quirks,
    /// The register waiting for a key press (set by `FX0A`).
    pub(super) awaiting_key: Option<usize>,
    /// This stores the random number generator, used by the chipset.
    /// It is stored into the chipset, so as to enable simple mocking
    /// of the given type.
    pub(super) rng: Box<dyn RngCore + Send>,
}

impl Interpreter {
    /// will create a new interpreter with all of its state zeroed
    pub fn new() -> Self {
        Self {
            name: String::new(),
            opcode: 0,
            memory: vec![0; memory::SIZE],
            registers: [0; cpu::register::SIZE],
            index_register: 0,
            program_counter: cpu::PROGRAM_COUNTER,
            stack: ArrayVec::new(),
            delay_timer: 0,
            sound_timer: 0,
            display: vec![0; display::RESOLUTION],
            quirks: Quirks::default(),
            awaiting_key: None,
            rng: Box::new(rand::rngs::OsRng),
        }
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }

    /// Replaces the random number generator used by `CXNN`.
    pub fn with_rng<R>(mut self, rng: R) -> Self
    where
        R: RngCore + Send + 'static,
    {
        self.rng = Box::new(rng);
        self
    }

    /// Will zero the memory, registers, stack, display and timers and move
    /// the program counter back to the program start. A pending key wait
    /// is dropped as well.
    pub fn reset(&mut self) {
        log::info!("Resetting the interpreter");
        self.name.clear();
        self.opcode = 0;
        self.memory.fill(0);
        self.registers.fill(0);
        self.index_register = 0;
        self.program_counter = cpu::PROGRAM_COUNTER;
        self.stack.clear();
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.display.fill(0);
        self.awaiting_key = None;
    }

    /// Will write the digit glyphs `0-F` into the reserved memory.
    pub fn load_fontset(&mut self) {
        let location = display::fontset::LOCATION;
        self.memory[location..(location + display::fontset::FONTSET.len())]
            .copy_from_slice(&display::fontset::FONTSET);
    }

    /// Will reset the interpreter and load the program at the program start.
    ///
    /// A program that does not fit into the memory is rejected before any
    /// state is changed.
    pub fn load(&mut self, program: &[u8]) -> Result<(), LoadError> {
        if program.len() > cpu::PROGRAM_SIZE {
            return Err(LoadError::Capacity {
                len: program.len(),
                available: cpu::PROGRAM_SIZE,
            });
        }

        self.reset();
        self.load_fontset();

        // write the rom data into memory
        let start = cpu::PROGRAM_COUNTER;
        self.memory[start..(start + program.len())].copy_from_slice(program);

        log::info!("Loaded a program of {} bytes", program.len());
        Ok(())
    }

    /// Will load the given rom, see [`load`](Interpreter::load).
    pub fn load_rom(&mut self, rom: &Rom) -> Result<(), LoadError> {
        self.load(rom.get_data())?;
        self.name.push_str(rom.get_name());
        Ok(())
    }

    /// Will read the opcode at the program counter and move the program
    /// counter onto the next instruction.
    pub fn fetch(&mut self) -> Result<Opcode, ProcessError> {
        // will build the opcode given from the pointer
        self.opcode = opcode::build_opcode(&self.memory, self.program_counter)?;
        self.program_counter += memory::opcodes::SIZE;
        Ok(self.opcode)
    }

    /// will advance the program by a single step
    ///
    /// If the interpreter waits for a key press, the step checks the keypad
    /// and either finishes the wait or returns [`Operation::Wait`] without
    /// moving the program counter.
    ///
    /// On error the state is left as it was before the step.
    pub fn step<K>(&mut self, keypad: &mut K) -> Result<Operation, Fault>
    where
        K: Keypad + ?Sized,
    {
        if let Some(register) = self.awaiting_key {
            return Ok(self.resume_wait(register, keypad));
        }

        let address = self.program_counter;
        let opcode = self.fetch().map_err(|source| Fault {
            address,
            opcode: None,
            source,
        })?;
        log::debug!("{:#06X}: {:#06X}", address, opcode);

        opcode::decode(opcode)
            .map_err(ProcessError::from)
            .and_then(|instruction| self.execute(instruction, keypad))
            .map_err(|source| {
                // the fetch already moved the counter
                self.program_counter = address;
                Fault {
                    address,
                    opcode: Some(opcode),
                    source,
                }
            })
    }

    fn resume_wait<K>(&mut self, register: usize, keypad: &mut K) -> Operation
    where
        K: Keypad + ?Sized,
    {
        match keypad.take_key_press() {
            Some(key) => {
                log::debug!("key {:#X} stored in V{:X}", key, register);
                self.registers[register] = key;
                self.awaiting_key = None;
                self.program_counter += memory::opcodes::SIZE;
                Operation::None
            }
            None => Operation::Wait,
        }
    }

    /// Will count both timers down by one, until they reach zero.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Will return a immutable slice of the current display configuration
    pub fn get_display(&self) -> &[u8] {
        &self.display
    }

    pub fn get_memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn get_registers(&self) -> &[u8] {
        &self.registers
    }

    pub fn get_stack(&self) -> &[usize] {
        &self.stack
    }

    pub fn get_program_counter(&self) -> usize {
        self.program_counter
    }

    pub fn get_index_register(&self) -> u16 {
        self.index_register
    }

    /// will return the sound timer
    pub fn get_sound_timer(&self) -> u8 {
        self.sound_timer
    }

    /// will return the delay timer
    pub fn get_delay_timer(&self) -> u8 {
        self.delay_timer
    }

    /// A nonzero sound timer means the buzzer is playing.
    pub fn is_sound_playing(&self) -> bool {
        self.sound_timer > 0
    }

    pub fn is_awaiting_key(&self) -> bool {
        self.awaiting_key.is_some()
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn get_quirks(&self) -> Quirks {
        self.quirks
    }

    /// The quirks can be changed at any time, without touching the rest of
    /// the state.
    pub fn set_quirks(&mut self, quirks: Quirks) {
        self.quirks = quirks;
    }

    /// Will push the pointer to the stack
    pub(super) fn push_stack(&mut self, pointer: usize) -> Result<(), StackError> {
        match self.stack.try_push(pointer) {
            None => Ok(()),
            Some(_) => Err(StackError::Full),
        }
    }

    /// Will pop from the stack
    pub(super) fn pop_stack(&mut self) -> Result<usize, StackError> {
        self.stack.pop().ok_or(StackError::Empty)
    }

    /// Will return the memory range of `len` bytes starting at `I`.
    pub(super) fn index_range(&self, len: usize) -> Result<Range<usize>, ExecutionError> {
        let address = self.index_register as usize;
        if address + len > self.memory.len() {
            Err(ExecutionError::MemoryOutOfBounds { address, len })
        } else {
            Ok(address..(address + len))
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
