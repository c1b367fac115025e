//! Human readable dump of the [`Interpreter`](super::Interpreter) state.
//!
//! Memory and display are printed in rows, a run of rows that hold nothing
//! is merged into a single line.

use std::{
    fmt::{self, Write},
    mem,
};

use num_traits::Unsigned;
use once_cell::sync::Lazy;

use super::Interpreter;
use crate::{
    config::Quirks,
    definitions::{cpu, display},
};

/// Bytes shown per memory row.
const MEMORY_ROW: usize = 16;
/// Registers shown per register row.
const REGISTER_ROW: usize = 8;
/// Width of the `07 - 31` display row label.
const DISPLAY_LABEL: usize = 7;

const FIELD_INDENT: &str = "\t";
const ROW_INDENT: &str = "\t\t";

const PIXEL_ON: char = '#';
const PIXEL_OFF: char = '.';

/// Column digits printed above the display rows.
static COLUMN_RULER: Lazy<String> = Lazy::new(|| {
    (0..display::WIDTH)
        .map(|column| char::from(b'0' + (column % 10) as u8))
        .collect()
});

/// Writes `value` as upper case hex, padded to the full width of `T`.
fn hex<T>(out: &mut String, value: T) -> fmt::Result
where
    T: fmt::UpperHex + Unsigned + Copy,
{
    write!(out, "{:0width$X}", value, width = mem::size_of::<T>() * 2)
}

/// Writes a memory address, these always fit into 16 bits.
fn address(out: &mut String, value: usize) -> fmt::Result {
    out.push_str("0x");
    hex(out, value as u16)
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn quirks(quirks: Quirks) -> String {
    format!(
        "shift {}, jump offset {}, index increment {}",
        on_off(quirks.shift),
        on_off(quirks.jump_offset),
        on_off(quirks.index_increment)
    )
}

/// Writes a line for every `size` long chunk of `data`. A run of chunks
/// that are all zero gets a single line with `empty` as content.
///
/// `label` receives the first and last offset (inclusive) a line covers.
fn chunk_lines<L, C>(
    out: &mut String,
    data: &[u8],
    size: usize,
    empty: &str,
    label: L,
    content: C,
) -> fmt::Result
where
    L: Fn(&mut String, usize, usize) -> fmt::Result,
    C: Fn(&mut String, &[u8]) -> fmt::Result,
{
    let is_empty = |chunk: &[u8]| chunk.iter().all(|&byte| byte == 0);

    let mut chunks = data.chunks(size).enumerate().peekable();
    while let Some((index, chunk)) = chunks.next() {
        let from = index * size;
        let mut to = from + chunk.len() - 1;

        out.push_str(ROW_INDENT);
        if is_empty(chunk) {
            while let Some((next, last)) = chunks.next_if(|&(_, next)| is_empty(next)) {
                to = next * size + last.len() - 1;
            }
            label(out, from, to)?;
            out.push_str(" : ");
            out.push_str(empty);
        } else {
            label(out, from, to)?;
            out.push_str(" : ");
            content(out, chunk)?;
        }
        out.push('\n');
    }
    Ok(())
}

fn memory_lines(out: &mut String, memory: &[u8]) -> fmt::Result {
    chunk_lines(
        out,
        memory,
        MEMORY_ROW,
        "zero",
        |out, from, to| {
            address(out, from)?;
            out.push_str(" - ");
            address(out, to)
        },
        |out, chunk| {
            for (i, &byte) in chunk.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                hex(out, byte)?;
            }
            Ok(())
        },
    )
}

fn display_lines(out: &mut String, pixels: &[u8]) -> fmt::Result {
    writeln!(out, "{}{:w$} : {}", ROW_INDENT, "", *COLUMN_RULER, w = DISPLAY_LABEL)?;
    chunk_lines(
        out,
        pixels,
        display::WIDTH,
        "blank",
        |out, from, to| {
            let (first, last) = (from / display::WIDTH, to / display::WIDTH);
            let label = if first == last {
                format!("{:02}", first)
            } else {
                format!("{:02} - {:02}", first, last)
            };
            write!(out, "{:w$}", label, w = DISPLAY_LABEL)
        },
        |out, row| {
            out.extend(
                row.iter()
                    .map(|&pixel| if pixel == 0 { PIXEL_OFF } else { PIXEL_ON }),
            );
            Ok(())
        },
    )
}

fn register_lines(out: &mut String, registers: &[u8]) -> fmt::Result {
    for (row, values) in registers.chunks(REGISTER_ROW).enumerate() {
        let first = row * REGISTER_ROW;
        write!(
            out,
            "{}V{:X} - V{:X} :",
            ROW_INDENT,
            first,
            first + values.len() - 1
        )?;
        for &value in values {
            out.push(' ');
            hex(out, value)?;
        }
        out.push('\n');
    }
    Ok(())
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("Interpreter {\n");

        let mut field = |name: &str, value: &str| {
            writeln!(out, "{}{} : {}", FIELD_INDENT, name, value)
        };

        field("Program Name", &self.name)?;
        field("Opcode", &format!("{:#06X}", self.opcode))?;
        field("Program Counter", &format!("{:#06X}", self.program_counter))?;
        field("Index Register", &format!("{:#06X}", self.index_register))?;
        field("Delay Timer", &format!("{:#04X}", self.delay_timer))?;
        field("Sound Timer", &format!("{:#04X}", self.sound_timer))?;

        let awaiting = self
            .awaiting_key
            .map(|register| format!("V{:X}", register))
            .unwrap_or_else(|| "none".to_string());
        field("Awaiting Key", &awaiting)?;
        field("Quirks", &quirks(self.quirks))?;

        let mut stack = format!("{}/{}", self.stack.len(), cpu::stack::SIZE);
        for &entry in self.stack.iter() {
            stack.push(' ');
            address(&mut stack, entry)?;
        }
        field("Stack", &stack)?;

        writeln!(out, "{}Registers :", FIELD_INDENT)?;
        register_lines(&mut out, &self.registers)?;
        writeln!(out, "{}Memory :", FIELD_INDENT)?;
        memory_lines(&mut out, &self.memory)?;
        writeln!(out, "{}Display :", FIELD_INDENT)?;
        display_lines(&mut out, &self.display)?;
        out.push('}');

        f.write_str(&out)
    }
}
