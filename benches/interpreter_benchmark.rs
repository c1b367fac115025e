use chip8vm::{devices::Keyboard, interpreter::Interpreter, resources::Rom};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const ROM_NAME: &str = "COUNTER";

/// A small program that keeps drawing the low digit of a counter.
const PROGRAM: [u16; 8] = [
    0x00E0, // clear the screen
    0x7001, // increment V0
    0x600F, // V1 = 0xF
    0x8102, // V1 &= V0
    0xF129, // I = glyph of V1
    0xD235, // draw it at (V2, V3)
    0x3000, // leave the loop once V0 wrapped around
    0x1200, // loop
];

static BASE_ROM: once_cell::sync::Lazy<Rom> = once_cell::sync::Lazy::new(|| {
    let data: Vec<u8> = PROGRAM
        .iter()
        .flat_map(|opcode| opcode.to_be_bytes())
        .collect();
    Rom::new(ROM_NAME, data)
});

/// will setup the default configured chip
fn get_default_chip() -> Interpreter {
    let mut chip = Interpreter::new();
    chip.load_rom(&BASE_ROM)
        .expect("The benchmark program fits into memory.");
    chip
}

pub fn step_bench(c: &mut Criterion) {
    let mut chip = get_default_chip();
    let mut keyboard = Keyboard::new();
    c.bench_function("step_bench", |b| {
        b.iter(|| {
            // the counter wrapping runs into empty memory, start over
            if chip.step(&mut keyboard).is_err() {
                chip.load_rom(&BASE_ROM)
                    .expect("The benchmark program fits into memory.");
            }
            black_box(chip.get_program_counter());
        });
    });
}

pub fn print_bench(c: &mut Criterion) {
    let chip = get_default_chip();
    c.bench_function("print_bench", |b| {
        b.iter(|| {
            let _ = black_box(format!("{}", chip));
        });
    });
}

criterion_group!(benches, step_bench, print_bench);
criterion_main!(benches);
