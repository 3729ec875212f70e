use ebpf_vm::isa::ebpf::*;
use ebpf_vm::{Cpu, CpuConfig, Endian, Env, Fault, FaultClass, IntExecutor, RunState, Trap};

fn run(insns: &[RawInsn], setup: impl FnOnce(&mut Cpu)) -> (Cpu, Result<u64, Trap>) {
    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.load(assemble(Endian::Little, insns));
    setup(&mut cpu);
    let res = cpu.run(&EbpfDecoder::new(), &IntExecutor, &mut Env::new());
    (cpu, res)
}

/// `if r1 <op> r2 goto +1; r0 = 0; exit; r0 = 1; exit`, returns r0.
fn branch_taken(opcode: u8, lhs: u64, rhs: u64) -> bool {
    let (_, res) = run(&[
        RawInsn::new(opcode, 1, 2, 2, 0),
        RawInsn::new(MOV64_IMM, 0, 0, 0, 0),
        RawInsn::new(EXIT, 0, 0, 0, 0),
        RawInsn::new(MOV64_IMM, 0, 0, 0, 1),
        RawInsn::new(EXIT, 0, 0, 0, 0),
    ], |cpu| {
        cpu.regs.write(1, lhs).unwrap();
        cpu.regs.write(2, rhs).unwrap();
    });
    res.unwrap() == 1
}

const fn jmp(op: u8) -> u8 {
    BPF_JMP | op | BPF_X
}

const fn jmp32(op: u8) -> u8 {
    BPF_JMP32 | op | BPF_X
}

#[test]
fn unsigned_conditions() {
    let minus1 = u64::MAX;
    assert!(branch_taken(jmp(BPF_JEQ), 7, 7));
    assert!(!branch_taken(jmp(BPF_JEQ), 7, 8));
    assert!(branch_taken(jmp(BPF_JNE), 7, 8));
    assert!(branch_taken(jmp(BPF_JGT), minus1, 1));
    assert!(!branch_taken(jmp(BPF_JGT), 1, 1));
    assert!(branch_taken(jmp(BPF_JGE), 1, 1));
    assert!(branch_taken(jmp(BPF_JLT), 1, minus1));
    assert!(branch_taken(jmp(BPF_JLE), 2, 2));
    assert!(!branch_taken(jmp(BPF_JLE), 3, 2));
    assert!(branch_taken(jmp(BPF_JSET), 0b1010, 0b0010));
    assert!(!branch_taken(jmp(BPF_JSET), 0b1010, 0b0101));
}

#[test]
fn signed_conditions() {
    let minus1 = u64::MAX;
    assert!(!branch_taken(jmp(BPF_JSGT), minus1, 1));
    assert!(branch_taken(jmp(BPF_JSGT), 1, minus1));
    assert!(branch_taken(jmp(BPF_JSGE), minus1, minus1));
    assert!(branch_taken(jmp(BPF_JSLT), minus1, 0));
    assert!(branch_taken(jmp(BPF_JSLE), minus1, minus1));
    assert!(!branch_taken(jmp(BPF_JSLE), 0, minus1));
}

#[test]
fn jmp32_compares_low_halves() {
    assert!(branch_taken(jmp32(BPF_JEQ), 0xdead_0000_0000_0005, 5));
    assert!(!branch_taken(jmp(BPF_JEQ), 0xdead_0000_0000_0005, 5));
    assert!(branch_taken(jmp32(BPF_JSLT), 0x8000_0000, 0));
    assert!(!branch_taken(jmp(BPF_JSLT), 0x8000_0000, 0));
}

#[test]
fn immediate_operand_is_sign_extended() {
    // if r1 == -1 goto +1
    let (_, res) = run(&[
        RawInsn::new(BPF_JMP | BPF_JEQ | BPF_K, 1, 0, 1, -1),
        RawInsn::new(EXIT, 0, 0, 0, 0),
        RawInsn::new(MOV64_IMM, 0, 0, 0, 1),
        RawInsn::new(EXIT, 0, 0, 0, 0),
    ], |cpu| cpu.regs.write(1, u64::MAX).unwrap());
    assert_eq!(res.unwrap(), 1);
}

#[test]
fn backward_jump_loops() {
    // r0 = 0; r1 = 5; loop: r0 += r1; r1 -= 1; if r1 != 0 goto loop; exit
    let (cpu, res) = run(&[
        RawInsn::new(MOV64_IMM, 0, 0, 0, 0),
        RawInsn::new(MOV64_IMM, 1, 0, 0, 5),
        RawInsn::new(ADD64_REG, 0, 1, 0, 0),
        RawInsn::new(SUB64_IMM, 1, 0, 0, 1),
        RawInsn::new(BPF_JMP | BPF_JNE | BPF_K, 1, 0, -3, 0),
        RawInsn::new(EXIT, 0, 0, 0, 0),
    ], |_| {});
    assert_eq!(res.unwrap(), 15);
    assert_eq!(cpu.steps, 2 + 5 * 3 + 1);
}

#[test]
fn ja_skips_over_lddw_pair() {
    let [lo, hi] = lddw(0, 99);
    let (_, res) = run(&[
        RawInsn::new(MOV64_IMM, 0, 0, 0, 1),
        RawInsn::new(JA, 0, 0, 2, 0),
        lo,
        hi,
        RawInsn::new(EXIT, 0, 0, 0, 0),
    ], |_| {});
    assert_eq!(res.unwrap(), 1);
}

#[test]
fn jump_outside_program_faults() {
    for off in [5i16, -3] {
        let (cpu, res) = run(&[
            RawInsn::new(MOV64_IMM, 0, 0, 0, 1),
            RawInsn::new(JA, 0, 0, off, 0),
            RawInsn::new(EXIT, 0, 0, 0, 0),
        ], |_| {});
        let trap = res.unwrap_err();
        assert_eq!(trap.pc, 1);
        match trap.fault {
            Fault::JumpOutOfRange { target, len } => {
                assert_eq!(target, 2 + off as i64);
                assert_eq!(len, 3);
            }
            other => panic!("unexpected fault {other}"),
        }
        assert_eq!(cpu.state, RunState::Faulted(FaultClass::Control));
        assert_eq!(cpu.pc, 1);
        // only the mov completed
        assert_eq!(cpu.steps, 1);
    }
}

#[test]
fn running_off_the_end_is_a_decode_fault() {
    let (cpu, res) = run(&[RawInsn::new(MOV64_IMM, 0, 0, 0, 1)], |_| {});
    let trap = res.unwrap_err();
    assert_eq!(trap.pc, 1);
    assert!(matches!(trap.fault, Fault::Truncated { remaining: 0, .. }), "{trap}");
    assert_eq!(trap.raw, None);
    assert_eq!(cpu.state, RunState::Faulted(FaultClass::Decode));
}

#[test]
fn step_budget_stops_infinite_loop() {
    let mut cpu = Cpu::new(CpuConfig {
        max_steps: Some(100),
        ..CpuConfig::default()
    });
    cpu.load(assemble(Endian::Little, &[RawInsn::new(JA, 0, 0, -1, 0)]));
    let trap = cpu
        .run(&EbpfDecoder::new(), &IntExecutor, &mut Env::new())
        .unwrap_err();
    assert!(matches!(trap.fault, Fault::BudgetExhausted { limit: 100 }), "{trap}");
    assert_eq!(cpu.steps, 100);
    assert_eq!(cpu.state, RunState::Faulted(FaultClass::Control));
}

#[test]
fn terminal_states_reject_further_steps() {
    let dec = EbpfDecoder::new();
    let (mut cpu, res) = run(&[RawInsn::new(EXIT, 0, 0, 0, 0)], |_| {});
    res.unwrap();
    let trap = cpu.step(&dec, &IntExecutor, &mut Env::new()).unwrap_err();
    assert!(matches!(trap.fault, Fault::Halted { state: RunState::Exited }), "{trap}");
    assert_eq!(cpu.state, RunState::Exited);

    let (mut cpu, res) = run(&[RawInsn::new(0xff, 0, 0, 0, 0)], |_| {});
    assert!(matches!(res.unwrap_err().fault, Fault::UnsupportedOpcode { opcode: 0xff }));
    let trap = cpu.step(&dec, &IntExecutor, &mut Env::new()).unwrap_err();
    assert!(matches!(
        trap.fault,
        Fault::Halted { state: RunState::Faulted(FaultClass::Opcode) }
    ));
    assert_eq!(cpu.steps, 0);
}
