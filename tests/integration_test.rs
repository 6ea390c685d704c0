//! End-to-end scenarios from spec.md §8, driven through the public
//! library API rather than the unit tests colocated with each module.

use n2t::hack_asm::Assembler;
use n2t::jack::{collect_jack_files, compile_paths, CompilationOptions};
use n2t::vm_translate::translate_file;
use tempfile::tempdir;

#[test]
fn s1_minimal_a_instruction() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.hack");
    Assembler::create(&output).unwrap().assemble("@5\nD=A\n", "test.asm").unwrap();

    let out = std::fs::read_to_string(&output).unwrap();
    assert_eq!(out, "0000000000000101\n1110110000010000\n");
}

#[test]
fn s2_symbolic_a_with_forward_label() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.hack");
    Assembler::create(&output)
        .unwrap()
        .assemble("@END\n0;JMP\n(END)\n", "test.asm")
        .unwrap();

    let out = std::fs::read_to_string(&output).unwrap();
    assert_eq!(out, "0000000000000010\n1110101010000111\n");
}

#[test]
fn s3_new_variable_allocation() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.hack");
    Assembler::create(&output)
        .unwrap()
        .assemble("@x\nM=D\n@y\nM=D\n", "test.asm")
        .unwrap();

    let out = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "0000000000010000");
    assert_eq!(lines[2], "0000000000010001");
}

#[test]
fn s4_vm_add_emits_expected_tail() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("Main.vm");
    std::fs::write(&input, "push constant 7\npush constant 8\nadd\n").unwrap();
    let output = dir.path().join("Main.asm");

    translate_file(&input, &output).unwrap();

    let out = std::fs::read_to_string(&output).unwrap();
    assert!(out.ends_with("@SP\nAM=M-1\nD=M\nA=A-1\nM=D+M\n"));
}

#[test]
fn s5_jack_empty_class() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("Foo.jack"), "class Foo { function void main() { return; } }").unwrap();

    let files = collect_jack_files(dir.path()).unwrap();
    assert!(compile_paths(&files, 1, CompilationOptions::default()));

    let out = std::fs::read_to_string(dir.path().join("Foo.vm")).unwrap();
    assert_eq!(out, "function Foo.main 0\npush constant 0\nreturn\n");
}

#[test]
fn s6_jack_field_access() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("Point.jack"),
        r#"
            class Point {
              field int x, y;
              constructor Point new(int ax, int ay) { let x = ax; let y = ay; return this; }
              method int getX() { return x; }
            }
        "#,
    )
    .unwrap();

    let files = collect_jack_files(dir.path()).unwrap();
    assert!(compile_paths(&files, 1, CompilationOptions::default()));

    let out = std::fs::read_to_string(dir.path().join("Point.vm")).unwrap();
    assert_eq!(
        out,
        concat!(
            "function Point.new 0\n",
            "push constant 2\n",
            "call Memory.alloc 1\n",
            "pop pointer 0\n",
            "push argument 0\n",
            "pop this 0\n",
            "push argument 1\n",
            "pop this 1\n",
            "push pointer 0\n",
            "return\n",
            "function Point.getX 0\n",
            "push argument 0\n",
            "pop pointer 0\n",
            "push this 0\n",
            "return\n",
        )
    );
}

#[test]
fn directory_compilation_is_parallel_and_order_independent() {
    let dir = tempdir().unwrap();
    for i in 0..6 {
        std::fs::write(
            dir.path().join(format!("Class{i}.jack")),
            format!("class Class{i} {{ function void run() {{ return; }} }}"),
        )
        .unwrap();
    }

    let files = collect_jack_files(dir.path()).unwrap();
    assert!(compile_paths(&files, 4, CompilationOptions::default()));

    for i in 0..6 {
        assert!(dir.path().join(format!("Class{i}.vm")).exists());
    }
}
