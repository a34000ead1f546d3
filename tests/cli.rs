use std::{
    fs,
    path::PathBuf,
    process::{Command, Output},
};

const PROGRAM: &str = "class Main { function void main() { do Output.printInt(7); return; } }";

/// Directorio de trabajo aislado por prueba.
fn workspace(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("jackc-{}-{}", test, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn jackc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jackc"))
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn directories_compile_to_sibling_files() {
    let dir = workspace("dir");
    fs::write(dir.join("Main.jack"), PROGRAM).unwrap();
    fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let output = jackc(&[dir.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let code = fs::read_to_string(dir.join("Main.vm")).unwrap();
    assert!(code.starts_with("function Main.main 0\npush constant 7\n"), "{}", code);
    assert!(!dir.join("notes.vm").exists());
}

#[test]
fn dash_output_writes_to_stdout() {
    let dir = workspace("stdout");
    let input = dir.join("Main.jack");
    fs::write(&input, PROGRAM).unwrap();

    let output = jackc(&["-o", "-", input.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("call Output.printInt 1"));
    assert!(!dir.join("Main.vm").exists());
}

#[test]
fn failures_report_diagnostics_without_output() {
    let dir = workspace("failure");
    let input = dir.join("Main.jack");
    fs::write(&input, "class Main { function void f() { return } }").unwrap();

    let output = jackc(&[input.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Syntax error: Expected term"));
    assert!(!dir.join("Main.vm").exists());
}
