use ebpf_vm::isa::ebpf::{assemble, EbpfDecoder, RawInsn, ADD64_IMM, EXIT, LDX_H, MOV64_IMM, STX_H};
use ebpf_vm::{Cpu, CpuConfig, Endian, Env, IntExecutor, RunState, Status};

fn cpu_with(endian: Endian, insns: &[RawInsn]) -> Cpu {
    let mut cpu = Cpu::new(CpuConfig { endian, ..CpuConfig::default() });
    cpu.load(assemble(endian, insns));
    cpu
}

#[test]
fn mov_add_exit() {
    // mov r1, 5; add r1, 3; exit
    let mut cpu = cpu_with(Endian::Little, &[
        RawInsn::new(MOV64_IMM, 1, 0, 0, 5),
        RawInsn::new(ADD64_IMM, 1, 0, 0, 3),
        RawInsn::new(EXIT, 0, 0, 0, 0),
    ]);
    let dec = EbpfDecoder::new();
    let exec = IntExecutor;
    let mut env = Env::new();

    assert_eq!(cpu.step(&dec, &exec, &mut env).unwrap(), Status::Running);
    assert_eq!(cpu.step(&dec, &exec, &mut env).unwrap(), Status::Running);
    assert_eq!(cpu.step(&dec, &exec, &mut env).unwrap(), Status::Exited(0));
    assert_eq!(cpu.state, RunState::Exited);
    assert_eq!(cpu.regs.read(1).unwrap(), 8);
    assert_eq!(cpu.steps, 3);
}

#[test]
fn store_then_load_halfword_through_stack_both_orders() {
    for endian in [Endian::Little, Endian::Big] {
        // stxh [r10-4], r1; ldxh r2, [r10-4]; exit
        let mut cpu = cpu_with(endian, &[
            RawInsn::new(STX_H, 10, 1, -4, 0),
            RawInsn::new(LDX_H, 2, 10, -4, 0),
            RawInsn::new(EXIT, 0, 0, 0, 0),
        ]);
        cpu.regs.write(1, 0x1234).unwrap();
        cpu.run(&EbpfDecoder::new(), &IntExecutor, &mut Env::new()).unwrap();
        assert_eq!(cpu.regs.read(2).unwrap(), 0x1234, "{endian:?}");

        let expect: [u8; 2] = match endian {
            Endian::Little => [0x34, 0x12],
            Endian::Big => [0x12, 0x34],
        };
        assert_eq!(cpu.stack.read_bytes(508, 2).unwrap(), &expect);
    }
}

#[test]
fn run_returns_r0() {
    let mut cpu = cpu_with(Endian::Big, &[
        RawInsn::new(MOV64_IMM, 0, 0, 0, -7),
        RawInsn::new(EXIT, 0, 0, 0, 0),
    ]);
    let r0 = cpu.run(&EbpfDecoder::new(), &IntExecutor, &mut Env::new()).unwrap();
    assert_eq!(r0 as i64, -7);
}

#[test]
fn load_from_reader_materializes_program() {
    let bytes = assemble(Endian::Little, &[
        RawInsn::new(MOV64_IMM, 0, 0, 0, 42),
        RawInsn::new(EXIT, 0, 0, 0, 0),
    ]);
    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.load_from(std::io::Cursor::new(bytes.clone())).unwrap();
    assert_eq!(cpu.program(), &bytes[..]);
    assert_eq!(cpu.program_words(), 2);
    assert_eq!(cpu.run(&EbpfDecoder::new(), &IntExecutor, &mut Env::new()).unwrap(), 42);
}

#[test]
fn frame_pointer_starts_at_top_of_stack() {
    let cpu = Cpu::new(CpuConfig { stack_size: 64, ..CpuConfig::default() });
    assert_eq!(cpu.regs.read(10).unwrap(), 64);
    assert_eq!(cpu.pc, 0);
    assert_eq!(cpu.state, RunState::Running);
}
