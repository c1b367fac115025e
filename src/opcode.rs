//! Opcode abstractions, functionality and constants.
use std::convert::TryFrom;

use crate::{definitions::memory, OpcodeError};

/// the base mask used for generating all the other sub masks
pub(crate) const OPCODE_MASK_FFFF: u16 = u16::MAX;

/// the mask for the first twelve bits
pub(crate) const OPCODE_MASK_FFF0: u16 = OPCODE_MASK_FFFF << 4;

/// the mask for the first eight bits
pub(crate) const OPCODE_MASK_FF00: u16 = OPCODE_MASK_FFFF << 8;

/// the mask for the first four bits
pub(crate) const OPCODE_MASK_F000: u16 = OPCODE_MASK_FFFF << 12;

/// the mask for the last four bits
pub(crate) const OPCODE_MASK_000F: u16 = OPCODE_MASK_FFFF ^ OPCODE_MASK_FFF0;

/// the mask for the last eight bits
pub(crate) const OPCODE_MASK_00FF: u16 = OPCODE_MASK_FFFF ^ OPCODE_MASK_FF00;

/// the mask for the last twelve bits
pub(crate) const OPCODE_MASK_0FFF: u16 = OPCODE_MASK_FFFF ^ OPCODE_MASK_F000;

/// the size of a single byte
const BYTE_SIZE: u16 = 0x8;

/// the size of a single nibble
const NIBBLE_SIZE: u16 = BYTE_SIZE / 2;

/// a wrapper type for u16 to make it clear what is meant to be used
pub type Opcode = u16;

/// will build an opcode from data and the given point
/// # Arguments
///
/// - `data` - A slice of u8 data entries used to generate the opcodes
/// - `pointer` - Where in the data the opcode shall be extracted, so `pointer` and `pointer + 1` make
/// the opcode up
///
/// # Example
/// ```rust
/// # use chip8vm::opcode::*;
/// # use chip8vm::OpcodeError;
///  const OPCODES: [Opcode; 2] = [0x00EE, 0x1EDA];
///  const SPLIT_OPCODE: [u8; 4] = [0x00, 0xEE, 0x1E, 0xDA];
///  for (i, val) in OPCODES.iter().enumerate() {
///      let opcode = build_opcode(&SPLIT_OPCODE, i * 2).expect("This will work.");
///      assert_eq!(opcode, *val);
///  }
/// # let pointer = 3;
/// # let err = OpcodeError::MemoryInvalid {pointer, len: SPLIT_OPCODE.len() };
/// # assert_eq!(Err(err), build_opcode(&SPLIT_OPCODE, pointer));
/// ```
pub fn build_opcode(data: &[u8], pointer: usize) -> Result<Opcode, OpcodeError> {
    // controlling that there is no illegal access here
    if pointer + 1 < data.len() {
        Ok(Opcode::from_be_bytes([data[pointer], data[pointer + 1]]))
    } else {
        Err(OpcodeError::MemoryInvalid {
            pointer,
            len: data.len(),
        })
    }
}

/// These are special traits used to filter out information
/// from opcodes
pub trait OpcodeTrait {
    /// this is an opcode extractor that will return the
    /// opcode group (the highest nibble) of any opcode
    fn t(&self) -> u8;

    /// this is an opcode extractor for the opcode type `TNNN`
    /// - `T` is the opcode type
    /// - `NNN` is an address
    fn nnn(&self) -> u16;

    /// this is an opcode extractor for the opcode type `TXNN`
    /// - `T` is the opcode type
    /// - `X` is a register index
    /// - `NN` is a constant
    fn xnn(&self) -> (usize, u8);

    /// this is an opcode extractor for the opcode type `TXYN`
    /// - `T` is the opcode type
    /// - `X` is a register index
    /// - `Y` is a register index
    /// - `N` is a nibble constant
    fn xyn(&self) -> (usize, usize, u8);

    /// this is an opcode extractor for the opcode type `TXYT`
    /// - `T` is the opcode type
    /// - `X` is a register index
    /// - `Y` is a register index
    fn xy(&self) -> (usize, usize);

    /// this is an opcode extractor for the opcode type `TXTT`
    /// - `T` is the opcode type
    /// - `X` is a register index
    fn x(&self) -> usize;
}

impl OpcodeTrait for Opcode {
    /// # Example
    /// ```rust
    /// # use chip8vm::opcode::*;
    /// const BASE_OPCODE: Opcode = 0x1EDA;
    /// assert_eq!(BASE_OPCODE.t(), 0x1);
    /// ```
    fn t(&self) -> u8 {
        ((self & OPCODE_MASK_F000) >> (3 * NIBBLE_SIZE)) as u8
    }

    /// # Example
    /// ```rust
    /// # use chip8vm::opcode::*;
    ///  const BASE_OPCODE: Opcode = 0x1EDA;
    ///  assert_eq!(BASE_OPCODE.nnn(), 0xEDA)
    /// ```
    fn nnn(&self) -> u16 {
        self & OPCODE_MASK_0FFF
    }

    /// # Example
    /// ```rust
    /// # use chip8vm::opcode::*;
    /// const BASE_OPCODE: Opcode = 0x1EDA;
    /// assert_eq!(BASE_OPCODE.xnn(), (0xE, 0xDA));
    /// ```
    fn xnn(&self) -> (usize, u8) {
        let x = self.x();
        let nn = (self & OPCODE_MASK_00FF) as u8;
        (x, nn)
    }

    /// ```rust
    /// # use chip8vm::opcode::*;
    ///  const BASE_OPCODE: Opcode = 0x1EDA;
    ///  assert_eq!(BASE_OPCODE.xyn(), (0xE, 0xD, 0xA));
    /// ```
    fn xyn(&self) -> (usize, usize, u8) {
        let (x, y) = self.xy();
        let n = (self & OPCODE_MASK_000F) as u8;
        (x, y, n)
    }

    /// ```rust
    /// # use chip8vm::opcode::*;
    ///  const BASE_OPCODE: Opcode = 0x1EDA;
    ///  assert_eq!(BASE_OPCODE.xy(), (0xE, 0xD));
    /// ```
    fn xy(&self) -> (usize, usize) {
        let x = self.x();
        const MASK: u16 = OPCODE_MASK_00FF ^ OPCODE_MASK_000F;
        let y = ((self & MASK) >> NIBBLE_SIZE) as usize;
        (x, y)
    }

    /// # Example
    /// ```rust
    /// # use chip8vm::opcode::*;
    ///  const BASE_OPCODE: Opcode = 0x1EDA;
    ///  assert_eq!(BASE_OPCODE.x(), 0xE);
    /// ```
    fn x(&self) -> usize {
        ((self & OPCODE_MASK_0FFF & OPCODE_MASK_FF00) >> BYTE_SIZE) as usize
    }
}

/// Every instruction kind the interpreter knows, decoded once from an
/// [`Opcode`](Opcode) with the operands already extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `00E0` - clears the screen.
    ClearScreen,
    /// `00EE` - returns from a subroutine.
    Return,
    /// `1NNN` - jumps to address `NNN`.
    Jump { nnn: u16 },
    /// `2NNN` - calls the subroutine at `NNN`.
    Call { nnn: u16 },
    /// `3XNN` - skips the next instruction if `VX == NN`.
    SkipIfEqual { x: usize, nn: u8 },
    /// `4XNN` - skips the next instruction if `VX != NN`.
    SkipIfNotEqual { x: usize, nn: u8 },
    /// `5XY0` - skips the next instruction if `VX == VY`.
    SkipIfRegistersEqual { x: usize, y: usize },
    /// `6XNN` - sets `VX` to `NN`.
    LoadConstant { x: usize, nn: u8 },
    /// `7XNN` - adds `NN` to `VX`, the carry flag is not changed.
    AddConstant { x: usize, nn: u8 },
    /// `8XY0` - sets `VX` to `VY`.
    Copy { x: usize, y: usize },
    /// `8XY1` - sets `VX` to `VX | VY`.
    Or { x: usize, y: usize },
    /// `8XY2` - sets `VX` to `VX & VY`.
    And { x: usize, y: usize },
    /// `8XY3` - sets `VX` to `VX ^ VY`.
    Xor { x: usize, y: usize },
    /// `8XY4` - adds `VY` to `VX`, `VF` is the carry.
    AddRegisters { x: usize, y: usize },
    /// `8XY5` - subtracts `VY` from `VX`, `VF` is the "no borrow" flag.
    Subtract { x: usize, y: usize },
    /// `8XY6` - shifts `VX` right, `VF` receives the shifted out bit.
    ShiftRight { x: usize, y: usize },
    /// `8XY7` - sets `VX` to `VY - VX`, `VF` is the "no borrow" flag.
    SubtractReversed { x: usize, y: usize },
    /// `8XYE` - shifts `VX` left, `VF` receives the shifted out bit.
    ShiftLeft { x: usize, y: usize },
    /// `9XY0` - skips the next instruction if `VX != VY`.
    SkipIfRegistersNotEqual { x: usize, y: usize },
    /// `ANNN` - sets `I` to `NNN`.
    SetIndex { nnn: u16 },
    /// `BNNN` - jumps to `NNN` plus an offset register.
    JumpWithOffset { x: usize, nnn: u16 },
    /// `CXNN` - sets `VX` to a random byte and `NN`.
    Random { x: usize, nn: u8 },
    /// `DXYN` - draws an `N` rows high sprite at `(VX, VY)`.
    Draw { x: usize, y: usize, n: u8 },
    /// `EX9E` - skips the next instruction if the key in `VX` is pressed.
    SkipIfKeyPressed { x: usize },
    /// `EXA1` - skips the next instruction if the key in `VX` isn't pressed.
    SkipIfKeyNotPressed { x: usize },
    /// `FX07` - sets `VX` to the delay timer.
    LoadDelayTimer { x: usize },
    /// `FX0A` - waits for a key press and stores it in `VX`.
    WaitForKey { x: usize },
    /// `FX15` - sets the delay timer to `VX`.
    SetDelayTimer { x: usize },
    /// `FX18` - sets the sound timer to `VX`.
    SetSoundTimer { x: usize },
    /// `FX1E` - adds `VX` to `I`.
    AddToIndex { x: usize },
    /// `FX29` - points `I` to the font glyph for `VX`.
    LoadFontGlyph { x: usize },
    /// `FX33` - stores the decimal digits of `VX` at `I`, `I + 1` and `I + 2`.
    StoreBcd { x: usize },
    /// `FX55` - stores `V0..=VX` starting at `I`.
    StoreRegisters { x: usize },
    /// `FX65` - fills `V0..=VX` starting at `I`.
    LoadRegisters { x: usize },
}

#[inline]
fn err<T>(value: Opcode) -> Result<T, OpcodeError> {
    Err(OpcodeError::InvalidOpcode(value))
}

impl TryFrom<Opcode> for Instruction {
    type Error = OpcodeError;

    fn try_from(value: Opcode) -> Result<Self, Self::Error> {
        let (x, y, n) = value.xyn();
        let (_, nn) = value.xnn();
        let nnn = value.nnn();

        let res = match value.t() {
            0x0 => match nn {
                0xE0 => Instruction::ClearScreen,
                0xEE => Instruction::Return,
                _ => return err(value),
            },
            0x1 => Instruction::Jump { nnn },
            0x2 => Instruction::Call { nnn },
            0x3 => Instruction::SkipIfEqual { x, nn },
            0x4 => Instruction::SkipIfNotEqual { x, nn },
            0x5 => Instruction::SkipIfRegistersEqual { x, y },
            0x6 => Instruction::LoadConstant { x, nn },
            0x7 => Instruction::AddConstant { x, nn },
            0x8 => match n {
                0x0 => Instruction::Copy { x, y },
                0x1 => Instruction::Or { x, y },
                0x2 => Instruction::And { x, y },
                0x3 => Instruction::Xor { x, y },
                0x4 => Instruction::AddRegisters { x, y },
                0x5 => Instruction::Subtract { x, y },
                0x6 => Instruction::ShiftRight { x, y },
                0x7 => Instruction::SubtractReversed { x, y },
                0xE => Instruction::ShiftLeft { x, y },
                _ => return err(value),
            },
            0x9 => Instruction::SkipIfRegistersNotEqual { x, y },
            0xA => Instruction::SetIndex { nnn },
            0xB => Instruction::JumpWithOffset { x, nnn },
            0xC => Instruction::Random { x, nn },
            0xD => Instruction::Draw { x, y, n },
            0xE => match nn {
                0x9E => Instruction::SkipIfKeyPressed { x },
                0xA1 => Instruction::SkipIfKeyNotPressed { x },
                _ => return err(value),
            },
            0xF => match nn {
                0x07 => Instruction::LoadDelayTimer { x },
                0x0A => Instruction::WaitForKey { x },
                0x15 => Instruction::SetDelayTimer { x },
                0x18 => Instruction::SetSoundTimer { x },
                0x1E => Instruction::AddToIndex { x },
                0x29 => Instruction::LoadFontGlyph { x },
                0x33 => Instruction::StoreBcd { x },
                0x55 => Instruction::StoreRegisters { x },
                0x65 => Instruction::LoadRegisters { x },
                _ => return err(value),
            },
            _ => return err(value),
        };
        Ok(res)
    }
}

/// Decodes the given opcode, see [`Instruction`](Instruction).
#[inline]
pub fn decode(opcode: Opcode) -> Result<Instruction, OpcodeError> {
    Instruction::try_from(opcode)
}

#[derive(Debug, PartialEq, Clone, Copy)]
/// Represents the program counter movement of an instruction, relative to
/// the program counter after the fetch (already pointing at the next
/// instruction).
pub enum ProgramCounterStep {
    /// Continue with the next instruction
    Next,
    /// Skip over the next instruction
    Skip,
    /// Stay on the current instruction so it is run again
    Hold,
    /// Move the program counter to the given location
    Jump(usize),
}

impl ProgramCounterStep {
    /// Will return a Skip if the condition is true.
    ///
    /// # Example
    /// ```rust
    /// # use chip8vm::opcode::ProgramCounterStep;
    /// assert_eq!(ProgramCounterStep::Next, ProgramCounterStep::cond(false));
    /// assert_eq!(ProgramCounterStep::Skip, ProgramCounterStep::cond(true));
    /// ```
    #[inline]
    pub fn cond(cond: bool) -> Self {
        if cond {
            ProgramCounterStep::Skip
        } else {
            ProgramCounterStep::Next
        }
    }

    /// Maps the step onto the program counter after the fetch.
    #[inline]
    pub fn apply(&self, program_counter: usize) -> usize {
        match *self {
            ProgramCounterStep::Next => program_counter,
            ProgramCounterStep::Skip => program_counter + memory::opcodes::SIZE,
            ProgramCounterStep::Hold => program_counter - memory::opcodes::SIZE,
            ProgramCounterStep::Jump(pointer) => pointer,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
/// Represents a command from the interpreter up to the presentation layer.
pub enum Operation {
    /// If no action has to be taken.
    None,
    /// If the interpreter is waiting for the next key press
    Wait,
    /// The display buffer changed and should be redrawn
    Draw,
}
