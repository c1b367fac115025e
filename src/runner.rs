use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{
    config::{Quirks, RunnerConfig},
    devices::{DisplayCommands, Keypad, SoundCommands},
    error::{Fault, LoadError},
    interpreter::Interpreter,
    opcode::Operation,
    resources::Rom,
    timer::TimedWorker,
};

/// What a pause stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseMode {
    /// No more instructions are executed, the timers keep counting down.
    Instructions,
    /// Nothing is executed at all.
    All,
}

/// Everything touched by a tick, kept behind a single lock so the instruction
/// stepping, the timer ticking and the key input never interleave.
struct State<K, D, S> {
    interpreter: Interpreter,
    keypad: K,
    display: D,
    sound: S,
    instructions_per_tick: usize,
    paused: Option<PauseMode>,
    fault: Option<Fault>,
    sound_playing: bool,
}

impl<K, D, S> State<K, D, S>
where
    K: Keypad,
    D: DisplayCommands,
    S: SoundCommands,
{
    /// A single 60 Hz tick.
    fn frame(&mut self) {
        if self.paused == Some(PauseMode::All) {
            return;
        }

        let mut drawn = false;
        if self.paused.is_none() && self.fault.is_none() {
            for _ in 0..self.instructions_per_tick {
                match self.interpreter.step(&mut self.keypad) {
                    Ok(Operation::None) => {}
                    Ok(Operation::Draw) => drawn = true,
                    // nothing will change until the next key press
                    Ok(Operation::Wait) => break,
                    Err(fault) => {
                        log::error!("{}", fault);
                        self.fault = Some(fault);
                        break;
                    }
                }
            }
        }
        self.update_sound();

        self.interpreter.tick_timers();
        log::trace!(
            "Tick done, delay timer {} and sound timer {}",
            self.interpreter.get_delay_timer(),
            self.interpreter.get_sound_timer()
        );

        if drawn {
            self.display.display(self.interpreter.get_display());
        }
        self.update_sound();
    }

    /// Only informs the sound output if the state changed.
    fn update_sound(&mut self) {
        let playing = self.interpreter.is_sound_playing();
        if playing != self.sound_playing {
            self.sound_playing = playing;
            self.sound.set_playing(playing);
        }
    }

    /// Brings the outputs in line with a fresh interpreter.
    fn refresh(&mut self) {
        self.fault = None;
        self.display.display(self.interpreter.get_display());
        self.update_sound();
    }
}

/// Drives an [`Interpreter`](Interpreter) in real time, all instructions and
/// timer ticks are run from the callback of a single worker.
pub struct Runner<W, K, D, S>
where
    W: TimedWorker,
{
    state: Arc<Mutex<State<K, D, S>>>,
    worker: W,
    tick_interval: Duration,
}

impl<W, K, D, S> Runner<W, K, D, S>
where
    W: TimedWorker,
    K: Keypad + Send + 'static,
    D: DisplayCommands + Send + 'static,
    S: SoundCommands + Send + 'static,
{
    pub fn new(config: RunnerConfig, keypad: K, display: D, sound: S) -> Self {
        let interpreter = Interpreter::new().with_quirks(config.quirks);
        Self::from_interpreter(interpreter, config, keypad, display, sound)
    }

    /// Will use the given interpreter, the quirks in the config are ignored.
    pub fn from_interpreter(
        interpreter: Interpreter,
        config: RunnerConfig,
        keypad: K,
        display: D,
        sound: S,
    ) -> Self {
        let state = State {
            interpreter,
            keypad,
            display,
            sound,
            instructions_per_tick: config.instructions_per_tick,
            paused: None,
            fault: None,
            sound_playing: false,
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            worker: W::new(),
            tick_interval: config.tick_interval,
        }
    }

    /// Will start the periodic execution.
    pub fn start(&mut self) {
        let state = self.state.clone();
        let callback = move || state.lock().frame();

        self.worker.start(callback, self.tick_interval);
        log::info!("Runner started");
    }

    /// Will stop the periodic execution, the state is kept.
    pub fn stop(&mut self) {
        self.worker.stop();
        log::info!("Runner stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_alive()
    }

    pub fn pause(&self, mode: PauseMode) {
        log::info!("Pausing {:?}", mode);
        self.state.lock().paused = Some(mode);
    }

    pub fn resume(&self) {
        log::info!("Resuming");
        self.state.lock().paused = None;
    }

    pub fn get_pause(&self) -> Option<PauseMode> {
        self.state.lock().paused
    }

    /// Will run a single tick, independent of the worker.
    pub fn frame(&self) {
        self.state.lock().frame();
    }

    /// Will reset the interpreter, this also cancels a pending key wait and
    /// clears a fault.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.interpreter.reset();
        state.refresh();
    }

    /// Will load the given program, see [`Interpreter::load`](Interpreter::load).
    pub fn load(&self, program: &[u8]) -> Result<(), LoadError> {
        let mut state = self.state.lock();
        state.interpreter.load(program)?;
        state.refresh();
        Ok(())
    }

    /// Will load the given rom, see [`Interpreter::load_rom`](Interpreter::load_rom).
    pub fn load_rom(&self, rom: &Rom) -> Result<(), LoadError> {
        let mut state = self.state.lock();
        state.interpreter.load_rom(rom)?;
        log::info!("Loaded the rom {}", rom.get_name());
        state.refresh();
        Ok(())
    }

    pub fn set_quirks(&self, quirks: Quirks) {
        self.state.lock().interpreter.set_quirks(quirks);
    }

    /// Changes how many instructions run per tick, this takes effect with
    /// the next tick.
    pub fn set_instructions_per_tick(&self, instructions_per_tick: usize) {
        self.state.lock().instructions_per_tick = instructions_per_tick;
    }

    pub fn get_instructions_per_tick(&self) -> usize {
        self.state.lock().instructions_per_tick
    }

    /// The fault that halted the execution, if there is one.
    pub fn fault(&self) -> Option<Fault> {
        self.state.lock().fault.clone()
    }

    /// Gives read access to the interpreter, the lock is held while `f` runs.
    pub fn with_interpreter<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Interpreter) -> R,
    {
        f(&self.state.lock().interpreter)
    }

    /// Gives access to the keypad to feed in key presses, no tick runs
    /// while `f` does.
    pub fn with_keypad<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut K) -> R,
    {
        f(&mut self.state.lock().keypad)
    }
}

impl<W, K, D, S> Drop for Runner<W, K, D, S>
where
    W: TimedWorker,
{
    fn drop(&mut self) {
        self.worker.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use mockall::predicate::eq;

    use super::*;
    use crate::{
        definitions::{cpu, display},
        devices::{Keyboard, MockDisplayCommands, MockSoundCommands},
        error::{OpcodeError, ProcessError},
        timer::Worker,
    };

    /// A worker that never runs, the ticks are driven by hand.
    struct ManualWorker {
        running: bool,
    }

    impl TimedWorker for ManualWorker {
        fn new() -> Self {
            Self { running: false }
        }

        fn start<T>(&mut self, _callback: T, _interval: Duration)
        where
            T: Send + FnMut() + 'static,
        {
            self.running = true;
        }

        fn stop(&mut self) {
            self.running = false;
        }

        fn is_alive(&self) -> bool {
            self.running
        }
    }

    type TestRunner = Runner<ManualWorker, Keyboard, MockDisplayCommands, MockSoundCommands>;

    /// Polls `check` until it holds, gives up after a generous deadline.
    fn wait_until<F>(mut check: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        check()
    }

    fn program(opcodes: &[u16]) -> Vec<u8> {
        opcodes.iter().flat_map(|opcode| opcode.to_be_bytes()).collect()
    }

    /// A display expecting `times` refreshes, loading counts as one.
    fn display_calls(times: usize) -> MockDisplayCommands {
        let mut display = MockDisplayCommands::new();
        display
            .expect_display()
            .withf(|pixels| pixels.len() == display::RESOLUTION)
            .times(times)
            .return_const(());
        display
    }

    /// Will setup a runner with the program loaded
    fn setup(
        opcodes: &[u16],
        instructions_per_tick: usize,
        display: MockDisplayCommands,
        sound: MockSoundCommands,
    ) -> TestRunner {
        let config = RunnerConfig::default().with_instructions_per_tick(instructions_per_tick);
        let runner = TestRunner::new(config, Keyboard::new(), display, sound);
        runner.load(&program(opcodes)).expect("the program fits");
        runner
    }

    #[test]
    fn test_frame_runs_instructions_per_tick() {
        let runner = setup(
            &[0x7001, 0x7001, 0x7001, 0x7001, 0x7001, 0x7001],
            4,
            display_calls(1),
            MockSoundCommands::new(),
        );

        runner.frame();

        runner.with_interpreter(|chip| {
            assert_eq!(chip.get_registers()[0], 4);
            assert_eq!(chip.get_program_counter(), cpu::PROGRAM_COUNTER + 8);
        });

        runner.set_instructions_per_tick(2);
        assert_eq!(runner.get_instructions_per_tick(), 2);
        runner.frame();

        runner.with_interpreter(|chip| assert_eq!(chip.get_registers()[0], 6));
    }

    #[test]
    fn test_display_only_after_draw() {
        let runner = setup(
            &[0x00E0, 0x00E0, 0x7001, 0x1206],
            8,
            display_calls(2),
            MockSoundCommands::new(),
        );

        // two clears, a single refresh
        runner.frame();
        // only the jump loop
        runner.frame();
    }

    #[test]
    fn test_sound_follows_the_timer() {
        let mut sound = MockSoundCommands::new();
        sound
            .expect_set_playing()
            .with(eq(true))
            .times(1)
            .return_const(());
        sound
            .expect_set_playing()
            .with(eq(false))
            .times(1)
            .return_const(());

        let runner = setup(
            &[0x6002, 0xF018, 0x1204],
            3,
            display_calls(1),
            sound,
        );

        // sound timer set to 2, one tick
        runner.frame();
        runner.with_interpreter(|chip| assert_eq!(chip.get_sound_timer(), 1));
        // second tick silences it
        runner.frame();
        runner.frame();
        runner.with_interpreter(|chip| assert!(!chip.is_sound_playing()));
    }

    #[test]
    fn test_pause() {
        let runner = setup(
            &[0x6005, 0xF015, 0x7101, 0x1204],
            2,
            display_calls(1),
            MockSoundCommands::new(),
        );

        runner.frame();
        runner.with_interpreter(|chip| assert_eq!(chip.get_delay_timer(), 4));

        // the timers keep running
        runner.pause(PauseMode::Instructions);
        assert_eq!(runner.get_pause(), Some(PauseMode::Instructions));
        runner.frame();
        runner.with_interpreter(|chip| {
            assert_eq!(chip.get_delay_timer(), 3);
            assert_eq!(chip.get_program_counter(), 0x204);
        });

        // everything stops
        runner.pause(PauseMode::All);
        runner.frame();
        runner.with_interpreter(|chip| assert_eq!(chip.get_delay_timer(), 3));

        runner.resume();
        assert_eq!(runner.get_pause(), None);
        runner.frame();
        runner.with_interpreter(|chip| {
            assert_eq!(chip.get_delay_timer(), 2);
            assert_ne!(chip.get_registers()[1], 0);
        });
    }

    #[test]
    fn test_fault_halts_the_instructions() {
        // the load and the reset
        let runner = setup(
            &[0x6005, 0xF015, 0xFFFF],
            8,
            display_calls(2),
            MockSoundCommands::new(),
        );

        runner.frame();
        assert_eq!(
            runner.fault(),
            Some(Fault {
                address: 0x204,
                opcode: Some(0xFFFF),
                source: ProcessError::Opcode(OpcodeError::InvalidOpcode(0xFFFF)),
            })
        );

        // the timers continue, the program counter stays on the fault
        runner.frame();
        runner.with_interpreter(|chip| {
            assert_eq!(chip.get_delay_timer(), 3);
            assert_eq!(chip.get_program_counter(), 0x204);
        });

        runner.reset();
        assert_eq!(runner.fault(), None);
        runner.with_interpreter(|chip| assert_eq!(chip.get_delay_timer(), 0));
    }

    #[test]
    fn test_key_wait_through_the_keypad() {
        let runner = setup(
            &[0xF30A, 0x1202],
            8,
            display_calls(1),
            MockSoundCommands::new(),
        );

        runner.frame();
        runner.frame();
        runner.with_interpreter(|chip| {
            assert!(chip.is_awaiting_key());
            assert_eq!(chip.get_program_counter(), 0x200);
        });

        runner.with_keypad(|keypad| keypad.press(0x5));
        runner.frame();

        runner.with_interpreter(|chip| {
            assert!(!chip.is_awaiting_key());
            assert_eq!(chip.get_registers()[3], 0x5);
            assert_eq!(chip.get_program_counter(), 0x202);
        });
    }

    #[test]
    fn test_reset_mid_wait() {
        let runner = setup(&[0xF30A], 8, display_calls(2), MockSoundCommands::new());

        runner.frame();
        runner.with_interpreter(|chip| assert!(chip.is_awaiting_key()));

        runner.reset();
        runner.with_interpreter(|chip| assert!(!chip.is_awaiting_key()));
    }

    #[test]
    fn test_load_too_large_program() {
        let runner = setup(
            &[0x1200],
            8,
            display_calls(1),
            MockSoundCommands::new(),
        );

        let program = vec![0; cpu::PROGRAM_SIZE + 2];
        assert!(matches!(
            runner.load(&program),
            Err(LoadError::Capacity { .. })
        ));
        runner.with_interpreter(|chip| assert_eq!(&chip.get_memory()[0x200..0x202], &[0x12, 0x00]));
    }

    #[test]
    fn test_quirks_are_forwarded() {
        let runner = setup(
            &[0x1200],
            8,
            display_calls(1),
            MockSoundCommands::new(),
        );

        runner.set_quirks(Quirks::COSMAC_VIP);
        runner.with_interpreter(|chip| assert_eq!(chip.get_quirks(), Quirks::COSMAC_VIP));
    }

    #[test]
    fn test_start_and_stop() {
        let mut runner = setup(
            &[0x1200],
            8,
            display_calls(1),
            MockSoundCommands::new(),
        );
        assert!(!runner.is_running());
        runner.start();
        assert!(runner.is_running());
        runner.stop();
        assert!(!runner.is_running());
    }

    #[test]
    fn test_threaded_execution() {
        let display = display_calls(1);

        let config = RunnerConfig::default()
            .with_instructions_per_tick(1)
            .with_tick_interval(Duration::from_millis(2));
        let mut runner: Runner<Worker, _, _, _> =
            Runner::new(config, Keyboard::new(), display, MockSoundCommands::new());
        runner
            .load(&program(&[0x7001, 0xF30A, 0x1204]))
            .expect("the program fits");

        runner.start();

        assert!(wait_until(|| runner.with_interpreter(|chip| chip.is_awaiting_key())));
        runner.with_interpreter(|chip| assert_eq!(chip.get_registers()[0], 1));

        // the key is fed in while the worker keeps ticking
        runner.with_keypad(|keypad| keypad.press(0x5));
        assert!(wait_until(|| {
            runner.with_interpreter(|chip| chip.get_registers()[3] == 0x5)
        }));

        runner.stop();
        runner.with_interpreter(|chip| {
            assert!(!chip.is_awaiting_key());
            assert_eq!(chip.get_program_counter(), 0x204);
        });
    }
}
