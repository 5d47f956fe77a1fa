use chip8_vm::memory::PROGRAM_START;
use chip8_vm::{Chip8Error, Config, Cpu, Display, ExecState, Host, IndexIncrement, QuirkMode};

fn rom(opcodes: &[u16]) -> Vec<u8> {
    opcodes.iter().flat_map(|op| op.to_be_bytes().to_vec()).collect()
}

fn run(config: Config, opcodes: &[u16]) -> Cpu {
    let mut cpu = Cpu::new(config);
    cpu.load_rom(&rom(opcodes)).unwrap();
    cpu
}

#[derive(Default)]
struct Frames {
    dirty: usize,
    tones: Vec<bool>,
    errors: Vec<Chip8Error>,
}

impl Host for Frames {
    fn frame_dirty(&mut self, _display: &Display) {
        self.dirty += 1;
    }

    fn sound(&mut self, enabled: bool) {
        self.tones.push(enabled);
    }

    fn fatal(&mut self, error: &Chip8Error) {
        self.errors.push(error.clone());
    }
}

#[test]
fn load_then_add() {
    let mut cpu = run(Config::default(), &[0x6005, 0x7003]);
    cpu.step().unwrap();
    cpu.step().unwrap();

    let regs = cpu.registers();
    assert_eq!(regs.v[0], 8);
    assert_eq!(regs.v[0xF], 0);
    assert_eq!(regs.pc as usize, PROGRAM_START + 4);
}

fn store_four_registers(mode: QuirkMode) -> Cpu {
    let mut cpu = run(
        Config::with_mode(mode),
        &[0x600A, 0x610B, 0x620C, 0x630D, 0xA300, 0xF355],
    );
    for _ in 0..6 {
        cpu.step().unwrap();
    }

    let memory = cpu.memory();
    assert_eq!(memory.slice(0x300, 4).unwrap(), &cpu.registers().v[..4]);
    assert_eq!(memory.get(0x304).unwrap(), 0);
    cpu
}

#[test]
fn block_store_follows_index_quirk() {
    assert_eq!(store_four_registers(QuirkMode::Modern).registers().i, 0x300);
    assert_eq!(store_four_registers(QuirkMode::Legacy).registers().i, 0x304);
    assert_eq!(store_four_registers(QuirkMode::ShiftOnly).registers().i, 0x304);
}

#[test]
fn block_store_with_increment_by_x() {
    let mut config = Config::with_mode(QuirkMode::Modern);
    config.quirks.index = IndexIncrement::ByX;
    let mut cpu = run(config, &[0xA300, 0xF355]);
    cpu.step().unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.registers().i, 0x303);
}

#[test]
fn store_and_load_round_trip_through_memory() {
    // BCD of 254, then read the three digits back into V0..V2
    let mut cpu = run(Config::default(), &[0x63FE, 0xA400, 0xF333, 0xF265]);
    for _ in 0..4 {
        cpu.step().unwrap();
    }
    assert_eq!(&cpu.registers().v[..3], &[2, 5, 4]);
}

#[test]
fn key_wait_blocks_until_release() {
    let mut cpu = run(Config::default().speed(5), &[0xF50A, 0x7501]);
    let mut frames = Frames::default();

    cpu.cycle(&mut frames).unwrap();
    assert_eq!(cpu.state(), ExecState::WaitingForKey { register: 5 });
    let pc = cpu.registers().pc;

    // pressing alone isn't enough
    cpu.key_down(0xA);
    cpu.cycle(&mut frames).unwrap();
    assert!(cpu.is_waiting_for_key());
    assert_eq!(cpu.registers().pc, pc);

    cpu.key_up(0xA);
    assert!(cpu.is_running());
    cpu.step().unwrap();
    assert_eq!(cpu.registers().v[5], 0xB);
}

#[test]
fn draw_digit_and_collide() {
    // I = glyph for 0, draw it twice at (0, 0), then spin
    let mut cpu = run(Config::default(), &[0x6000, 0xF029, 0xD005, 0xD005, 0x1208]);
    let mut frames = Frames::default();

    for _ in 0..3 {
        cpu.step().unwrap();
    }
    assert!(cpu.display().is_lit(0, 0));
    assert!(cpu.display().is_lit(3, 4));
    assert!(!cpu.display().is_lit(1, 1));
    assert_eq!(cpu.registers().v[0xF], 0);

    cpu.step().unwrap();
    assert!(cpu.display().pixels().iter().all(|&lit| !lit));
    assert_eq!(cpu.registers().v[0xF], 1);

    cpu.cycle(&mut frames).unwrap();
    assert_eq!(frames.dirty, 1);
}

#[test]
fn sound_follows_sound_timer() {
    let mut cpu = run(Config::default().speed(1), &[0x6002, 0xF018, 0x1204]);
    let mut frames = Frames::default();

    for _ in 0..5 {
        cpu.cycle(&mut frames).unwrap();
    }
    // timer set during the second cycle, ticked down there and in the third
    assert_eq!(frames.tones, vec![false, true, false, false, false]);
}

#[test]
fn unknown_opcode_halts() {
    let mut cpu = run(Config::default(), &[0x6001, 0xFFFF]);
    let mut frames = Frames::default();

    let err = cpu.cycle(&mut frames).unwrap_err();
    assert_eq!(
        err,
        Chip8Error::UnknownOpcode {
            opcode: 0xFFFF,
            address: (PROGRAM_START + 2) as u16
        }
    );
    assert_eq!(frames.errors, vec![err]);
    assert_eq!(cpu.state(), ExecState::Halted);
    assert_eq!(cpu.registers().v[0], 1);

    // halted machines stay put until reloaded
    assert!(cpu.cycle(&mut frames).is_ok());
    cpu.load_rom(&rom(&[0x6007])).unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.registers().v[0], 7);
}

#[test]
fn call_and_return() {
    let mut cpu = run(Config::default(), &[0x2206, 0x6101, 0x1204, 0x6202, 0x00EE]);
    for _ in 0..4 {
        cpu.step().unwrap();
    }
    assert_eq!(cpu.registers().v[2], 2);
    assert_eq!(cpu.registers().v[1], 1);
    assert_eq!(cpu.registers().stack_depth(), 0);
}
