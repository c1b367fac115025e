use thiserror::Error;

use crate::opcode::Opcode;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum ProcessError {
    #[error("Invalid opcode state '{0}'.")]
    Opcode(#[from] OpcodeError),
    #[error("Invalid stack state '{0}'.")]
    Stack(#[from] StackError),
    #[error("Invalid execution state '{0}'.")]
    Execution(#[from] ExecutionError),
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum OpcodeError {
    #[error("An unsupported opcode was used {0:#06X?}.")]
    InvalidOpcode(Opcode),
    #[error("Pointer location invalid there can not be an opcode at {pointer}, if data len is {len}")]
    MemoryInvalid { pointer: usize, len: usize },
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum StackError {
    #[error("Stack is full!")]
    Full,
    #[error("Stack is empty!")]
    Empty,
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum ExecutionError {
    #[error("Memory access at {address:#06X} with a length of {len} leaves the memory.")]
    MemoryOutOfBounds { address: usize, len: usize },
    #[error("Jump target {0:#06X} is not an aligned address inside of the memory.")]
    InvalidJump(usize),
    #[error("The program counter would continue at {0:#06X}, behind the memory.")]
    ProgramCounterOutOfBounds(usize),
}

/// A failed step, with the location of the instruction that caused it.
///
/// The interpreter state is left as it was before the failed step, so the
/// same fault is reported again if the step is retried.
#[derive(Error, Debug, PartialEq, Clone)]
#[error("Execution halted at {address:#06X}: {source}")]
pub struct Fault {
    /// The program counter of the faulting instruction.
    pub address: usize,
    /// The opcode at `address`, if it could be fetched.
    pub opcode: Option<Opcode>,
    pub source: ProcessError,
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum LoadError {
    #[error("The program is {len} bytes long, but only {available} bytes are available.")]
    Capacity { len: usize, available: usize },
}

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Unable to read the rom archive '{0}'.")]
    Zip(#[from] zip::result::ZipError),
    #[error("Unable to read the rom '{0}'.")]
    Io(#[from] std::io::Error),
}
