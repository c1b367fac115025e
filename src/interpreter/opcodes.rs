use super::Interpreter;
use crate::{
    definitions::{cpu, display, memory},
    devices::Keypad,
    error::{ExecutionError, ProcessError, StackError},
    opcode::{Instruction, Operation, ProgramCounterStep},
};

/// The `VF` register
const FLAG: usize = cpu::register::LAST;

/// Checks that the program counter can be moved to the given address.
fn jump_to(address: usize) -> Result<ProgramCounterStep, ExecutionError> {
    if address % memory::opcodes::SIZE == 0 && address < memory::SIZE {
        Ok(ProgramCounterStep::Jump(address))
    } else {
        Err(ExecutionError::InvalidJump(address))
    }
}

impl Interpreter {
    /// Will execute an already fetched instruction, the program counter is
    /// expected to point at the instruction after it.
    ///
    /// All the checks are done before the state is touched, so an error
    /// leaves everything but the program counter unchanged.
    pub(super) fn execute<K>(
        &mut self,
        instruction: Instruction,
        keypad: &mut K,
    ) -> Result<Operation, ProcessError>
    where
        K: Keypad + ?Sized,
    {
        log::trace!("{:?}", instruction);

        // the last instruction in memory may only move on by jumping, a
        // key wait would continue behind it once the key arrives
        let moves_itself = matches!(
            instruction,
            Instruction::Return
                | Instruction::Jump { .. }
                | Instruction::Call { .. }
                | Instruction::JumpWithOffset { .. }
        );
        if !moves_itself && self.program_counter >= memory::SIZE {
            return Err(ExecutionError::ProgramCounterOutOfBounds(self.program_counter).into());
        }

        let (step, operation) = match instruction {
            Instruction::ClearScreen => {
                self.display.fill(0);
                (ProgramCounterStep::Next, Operation::Draw)
            }
            Instruction::Return => {
                let target = self.stack.last().copied().ok_or(StackError::Empty)?;
                let step = jump_to(target)?;
                self.pop_stack()?;
                (step, Operation::None)
            }
            Instruction::Jump { nnn } => (jump_to(nnn as usize)?, Operation::None),
            Instruction::Call { nnn } => {
                let step = jump_to(nnn as usize)?;
                self.push_stack(self.program_counter)?;
                (step, Operation::None)
            }
            Instruction::SkipIfEqual { x, nn } => {
                (ProgramCounterStep::cond(self.registers[x] == nn), Operation::None)
            }
            Instruction::SkipIfNotEqual { x, nn } => {
                (ProgramCounterStep::cond(self.registers[x] != nn), Operation::None)
            }
            Instruction::SkipIfRegistersEqual { x, y } => (
                ProgramCounterStep::cond(self.registers[x] == self.registers[y]),
                Operation::None,
            ),
            Instruction::SkipIfRegistersNotEqual { x, y } => (
                ProgramCounterStep::cond(self.registers[x] != self.registers[y]),
                Operation::None,
            ),
            Instruction::LoadConstant { x, nn } => {
                self.registers[x] = nn;
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::AddConstant { x, nn } => {
                self.registers[x] = self.registers[x].wrapping_add(nn);
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::Copy { x, y } => {
                self.registers[x] = self.registers[y];
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::Or { x, y } => {
                self.registers[x] |= self.registers[y];
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::And { x, y } => {
                self.registers[x] &= self.registers[y];
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::Xor { x, y } => {
                self.registers[x] ^= self.registers[y];
                (ProgramCounterStep::Next, Operation::None)
            }
            // the flag is always written before `VX`, so an instruction
            // targeting `VF` ends with the result and not the flag
            Instruction::AddRegisters { x, y } => {
                let (sum, carry) = self.registers[x].overflowing_add(self.registers[y]);
                self.registers[FLAG] = carry as u8;
                self.registers[x] = sum;
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::Subtract { x, y } => {
                self.registers[FLAG] = (self.registers[x] > self.registers[y]) as u8;
                self.registers[x] = self.registers[x].wrapping_sub(self.registers[y]);
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::SubtractReversed { x, y } => {
                self.registers[FLAG] = (self.registers[y] > self.registers[x]) as u8;
                self.registers[x] = self.registers[y].wrapping_sub(self.registers[x]);
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::ShiftRight { x, y } => {
                self.shift_source(x, y);
                self.registers[FLAG] = self.registers[x] & 0x1;
                self.registers[x] >>= 1;
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::ShiftLeft { x, y } => {
                self.shift_source(x, y);
                self.registers[FLAG] = self.registers[x] >> 7;
                self.registers[x] <<= 1;
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::SetIndex { nnn } => {
                self.index_register = nnn;
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::JumpWithOffset { x, nnn } => {
                let offset = if self.quirks.jump_offset {
                    self.registers[x]
                } else {
                    self.registers[0]
                };
                (jump_to(offset as usize + nnn as usize)?, Operation::None)
            }
            Instruction::Random { x, nn } => {
                let mut random = [0u8; 1];
                self.rng.fill_bytes(&mut random);
                self.registers[x] = random[0] & nn;
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::Draw { x, y, n } => {
                self.draw(x, y, n)?;
                (ProgramCounterStep::Next, Operation::Draw)
            }
            Instruction::SkipIfKeyPressed { x } => (
                ProgramCounterStep::cond(keypad.is_key_pressed(self.registers[x])),
                Operation::None,
            ),
            Instruction::SkipIfKeyNotPressed { x } => (
                ProgramCounterStep::cond(!keypad.is_key_pressed(self.registers[x])),
                Operation::None,
            ),
            Instruction::LoadDelayTimer { x } => {
                self.registers[x] = self.delay_timer;
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::WaitForKey { x } => {
                // only a press after this instruction counts
                if let Some(key) = keypad.take_key_press() {
                    log::trace!("Dropping the earlier key press {:#X}", key);
                }
                self.awaiting_key = Some(x);
                (ProgramCounterStep::Hold, Operation::Wait)
            }
            Instruction::SetDelayTimer { x } => {
                self.delay_timer = self.registers[x];
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::SetSoundTimer { x } => {
                self.sound_timer = self.registers[x];
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::AddToIndex { x } => {
                self.index_register = self.index_register.wrapping_add(self.registers[x] as u16);
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::LoadFontGlyph { x } => {
                let glyph = self.registers[x] as usize * display::fontset::GLYPH_SIZE;
                self.index_register = (display::fontset::LOCATION + glyph) as u16;
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::StoreBcd { x } => {
                let range = self.index_range(3)?;
                let value = self.registers[x];
                self.memory[range].copy_from_slice(&[value / 100, (value % 100) / 10, value % 10]);
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::StoreRegisters { x } => {
                let range = self.index_range(x + 1)?;
                self.memory[range].copy_from_slice(&self.registers[..=x]);
                self.increment_index(x);
                (ProgramCounterStep::Next, Operation::None)
            }
            Instruction::LoadRegisters { x } => {
                let range = self.index_range(x + 1)?;
                self.registers[..=x].copy_from_slice(&self.memory[range]);
                self.increment_index(x);
                (ProgramCounterStep::Next, Operation::None)
            }
        };

        // only the skips can get here with a target behind the memory, they
        // have not written anything yet
        let program_counter = step.apply(self.program_counter);
        if program_counter >= memory::SIZE {
            return Err(ExecutionError::ProgramCounterOutOfBounds(program_counter).into());
        }

        self.program_counter = program_counter;
        Ok(operation)
    }

    fn shift_source(&mut self, x: usize, y: usize) {
        if self.quirks.shift {
            self.registers[x] = self.registers[y];
        }
    }

    /// Draws a sprite at coordinate `(VX, VY)` that has a width of `8` pixels and a height of `N`
    /// pixels. Each row of `8` pixels is read as bit-coded starting from memory location `I`;
    /// `I` value doesn't change after the execution of this instruction. `VF` is set to `1` if
    /// any screen pixels are flipped from set to unset when the sprite is drawn, and to `0` if
    /// that doesn't happen. Pixels leaving the screen wrap around onto the linear display buffer.
    fn draw(&mut self, x: usize, y: usize, n: u8) -> Result<(), ExecutionError> {
        let range = self.index_range(n as usize)?;
        let coorx = self.registers[x] as usize;
        let coory = self.registers[y] as usize;

        self.registers[FLAG] = 0;

        for (row, &sprite) in self.memory[range].iter().enumerate() {
            for col in 0..display::SPRITE_WIDTH {
                if sprite & (0x80 >> col) == 0 {
                    continue;
                }

                let pixel = (coorx + col + (coory + row) * display::WIDTH) % display::RESOLUTION;
                if self.display[pixel] == 1 {
                    self.registers[FLAG] = 1;
                }
                self.display[pixel] ^= 1;
            }
        }

        Ok(())
    }

    fn increment_index(&mut self, x: usize) {
        if self.quirks.index_increment {
            self.index_register = self.index_register.wrapping_add(x as u16 + 1);
        }
    }
}
