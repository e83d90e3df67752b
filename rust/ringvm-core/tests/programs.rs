//! End-to-end programs run through a single machine.

use ringvm_core::{
    run_single, run_with_inputs, FnInput, Machine, MachineStatus, NoInput, Program, VmError,
};

fn program(src: &str) -> Program {
    Program::parse(src).expect("program should parse")
}

/// Helper: run with no input and render the final memory image.
fn final_memory(src: &str) -> String {
    let exec = run_with_inputs(&program(src), &[]).expect("program should halt");
    exec.memory
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn outputs(src: &str, inputs: &[i64]) -> Vec<i64> {
    run_with_inputs(&program(src), inputs)
        .expect("program should halt")
        .outputs
}

// ─── Arithmetic only ───

#[test]
fn add_multiply_programs() {
    assert_eq!(final_memory("1,0,0,0,99"), "2,0,0,0,99");
    assert_eq!(final_memory("2,3,0,3,99"), "2,3,0,6,99");
    assert_eq!(final_memory("2,4,4,5,99,0"), "2,4,4,5,99,9801");
    assert_eq!(
        final_memory("1,9,10,3,2,3,11,0,99,30,40,50"),
        "3500,9,10,70,2,3,11,0,99,30,40,50"
    );
}

#[test]
fn immediate_and_position_modes_agree() {
    for input in [0, 5, -12] {
        let exec = run_single(&program("1002,4,3,4,33"), input).unwrap();
        assert_eq!(exec.memory, vec![1002, 4, 3, 4, 99]);
        assert!(exec.outputs.is_empty());
    }
}

// ─── Relative mode and growth ───

#[test]
fn quine_reproduces_itself() {
    let src = "109,1,204,-1,1001,100,1,100,1008,100,16,101,1006,101,0,99";
    let out = outputs(src, &[]);
    let rendered = out
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",");
    assert_eq!(rendered, src);
}

#[test]
fn large_integers() {
    assert_eq!(outputs("104,1125899906842624,99", &[]), vec![1125899906842624]);
    let out = outputs("1102,34915192,34915192,7,4,7,99,0", &[]);
    assert_eq!(out[0].to_string().len(), 16);
}

// ─── Comparisons and jumps ───

#[test]
fn equals_eight_position_mode() {
    let src = "3,9,8,9,10,9,4,9,99,-1,8";
    assert_eq!(outputs(src, &[8]), vec![1]);
    for other in [7, 9, 0, -8] {
        assert_eq!(outputs(src, &[other]), vec![0]);
    }
}

#[test]
fn less_than_eight_both_modes() {
    for src in ["3,9,7,9,10,9,4,9,99,-1,8", "3,3,1107,-1,8,3,4,3,99"] {
        assert_eq!(outputs(src, &[7]), vec![1]);
        assert_eq!(outputs(src, &[8]), vec![0]);
    }
    assert_eq!(outputs("3,3,1108,-1,8,3,4,3,99", &[8]), vec![1]);
}

#[test]
fn three_way_comparison() {
    let src = "3,21,1008,21,8,20,1005,20,22,107,8,21,20,1006,20,31,\
               1106,0,36,98,0,0,1002,21,125,20,4,20,1105,1,46,104,\
               999,1105,1,46,1101,1000,1,20,4,20,1105,1,46,98,99";
    assert_eq!(outputs(src, &[3]), vec![999]);
    assert_eq!(outputs(src, &[8]), vec![1000]);
    assert_eq!(outputs(src, &[11]), vec![1001]);
}

// ─── Isolation ───

#[test]
fn machines_from_one_program_share_nothing() {
    let p = program("3,0,1,0,0,0,4,0,99");
    let mut first = Machine::new(&p);
    let mut second = Machine::new(&p);

    let mut out_a: Vec<i64> = Vec::new();
    let mut out_b: Vec<i64> = Vec::new();
    let mem_a = first.run(FnInput(|| Ok::<i64, VmError>(21)), &mut out_a).unwrap();
    let mem_b = second.run(FnInput(|| Ok::<i64, VmError>(21)), &mut out_b).unwrap();

    assert_eq!(out_a, vec![42]);
    assert_eq!(out_a, out_b);
    assert_eq!(mem_a, mem_b);
    assert_eq!(p.cells()[0], 3, "program text must be untouched");
}

// ─── Faults ───

#[test]
fn undefined_mode_digit_faults_instead_of_hanging() {
    let mut machine = Machine::from_source("3005,1,0,99").unwrap();
    let err = machine.run(NoInput, Vec::<i64>::new()).unwrap_err();
    assert!(matches!(err, VmError::InvalidMode { mode: 3, ip: 0, .. }));
    assert_eq!(machine.status(), MachineStatus::Faulted);
}

#[test]
fn malformed_text_is_reported_at_construction() {
    let err = Machine::from_source("1,0,zero,0,99").unwrap_err();
    assert!(matches!(err, VmError::MalformedProgram { position: 2, .. }));
}

#[test]
fn missing_input_is_reported() {
    let err = run_with_inputs(&program("3,0,99"), &[]).unwrap_err();
    assert_eq!(err, VmError::InputExhausted);
}

#[test]
fn write_to_a_huge_address_faults_without_a_limit() {
    let err = run_with_inputs(&program("1101,1,1,4611686018427387904,99"), &[]).unwrap_err();
    assert_eq!(
        err,
        VmError::AllocationFailed {
            address: 1 << 62,
            ip: 0
        }
    );
}
