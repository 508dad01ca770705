use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use elan::{
    bytecode::Module,
    compiler::{self, CompileOptions},
    interpreter::Interpreter,
    object::Object,
    vm::{RuntimeError, Vm},
};

fn project_file(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(path)
}

fn read(path: &str) -> String {
    fs::read_to_string(project_file(path)).unwrap()
}

fn compile_file(path: &str) -> Module {
    compiler::compile(&read(path), &CompileOptions::default()).unwrap()
}

fn elanc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_elanc"))
        .args(args)
        .output()
        .unwrap()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("elanc-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn run_vm(module: &Module) -> (Result<Object, RuntimeError>, String) {
    let mut vm = Vm::new(module, Vec::new());
    let result = vm.run();
    (result, String::from_utf8(vm.into_output()).unwrap())
}

fn run_interpreter(source: &str) -> (Result<Object, RuntimeError>, String) {
    let analysis = compiler::analyze(source, &CompileOptions::default()).unwrap();
    let mut interpreter = Interpreter::new(&analysis, Vec::new());
    let result = interpreter.run();
    (result, String::from_utf8(interpreter.into_output()).unwrap())
}

/// What the trial-division loop actually computes, including its quirks
/// for 1 and 4.
fn expected_primes() -> String {
    let mut out = String::new();
    for n in 1u64..100 {
        let prime = (2..n / 2).all(|div| n % div != 0);
        let verdict = if prime { "prime" } else { "composite" };
        out.push_str(&format!("{} is {}!\n", n, verdict));
    }
    out
}

#[test]
fn is_prime_demo() {
    let module = compile_file("demos/is_prime.elan");
    let (result, output) = run_vm(&module);

    assert_eq!(result.unwrap(), Object::Void);
    assert_eq!(output, expected_primes());

    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines.len(), 99);
    assert_eq!(lines[0], "1 is prime!");
    assert_eq!(lines[1], "2 is prime!");
    assert_eq!(lines[3], "4 is prime!");
    assert_eq!(lines[5], "6 is composite!");
    assert_eq!(lines[8], "9 is composite!");
    assert_eq!(lines[96], "97 is prime!");
}

#[test]
fn vm_matches_interpreter() {
    let sources = [
        "demos/is_prime.elan",
        "tests/fixtures/fib.elan",
        "tests/fixtures/numeric.elan",
        "tests/fixtures/div_zero.elan",
    ];

    for path in sources {
        let source = read(path);
        let module = compiler::compile(&source, &CompileOptions::default()).unwrap();

        let (vm_result, vm_output) = run_vm(&module);
        let (tree_result, tree_output) = run_interpreter(&source);

        assert_eq!(vm_output, tree_output, "{}", path);
        match (vm_result, tree_result) {
            (Ok(a), Ok(b)) => assert_eq!(a, b, "{}", path),
            (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string(), "{}", path),
            (a, b) => panic!("{}: vm {:?} vs interpreter {:?}", path, a, b),
        }
    }
}

#[test]
fn fixture_outputs() {
    let cases = [
        (
            "tests/fixtures/fib.elan",
            "0 1 1 2 3 5 8 13 21 34 55 89 144 233 377 610 987 1597 2584 4181 \ntotal = 30\n",
        ),
        (
            "tests/fixtures/numeric.elan",
            "wrapped 44\navg 1.75\nclamped 0 5 10\nneg 300 rem -6\n\
             {literal} and true\ntab\there \"quoted\"\n",
        ),
    ];

    for (path, expected) in cases {
        let module = compiler::compile(&read(path), &CompileOptions::default()).unwrap();
        let (result, output) = run_vm(&module);
        assert!(result.is_ok(), "{}: {:?}", path, result);
        assert_eq!(output, expected, "{}", path);
    }
}

#[test]
fn division_by_zero_stops_output() {
    let module = compile_file("tests/fixtures/div_zero.elan");
    let (result, output) = run_vm(&module);

    assert!(matches!(result, Err(RuntimeError::DivisionByZero)));
    assert_eq!(output, "start\n5\n");
}

#[test]
fn module_file_round_trip() {
    let module = compile_file("tests/fixtures/fib.elan");
    let loaded = Module::from_bytes(&module.to_bytes()).unwrap();

    assert_eq!(run_vm(&loaded).1, run_vm(&module).1);
}

#[test]
fn cli_run_source() {
    let demo = project_file("demos/is_prime.elan");
    let output = elanc(&["run", demo.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), expected_primes());
}

#[test]
fn cli_compile_then_run_module() {
    let dir = scratch_dir("compile");
    let module_path = dir.join("fib.elnb");
    let fixture = project_file("tests/fixtures/fib.elan");

    let output = elanc(&[
        "compile",
        fixture.to_str().unwrap(),
        "-o",
        module_path.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let bytes = fs::read(&module_path).unwrap();
    assert!(Module::is_module(&bytes));

    let output = elanc(&["run", module_path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).ends_with("total = 30\n"));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn cli_emit_bytecode() {
    let fixture = project_file("tests/fixtures/fib.elan");
    let output = elanc(&["compile", fixture.to_str().unwrap(), "--emit", "bytecode"]);

    assert_eq!(output.status.code(), Some(0));
    let listing = String::from_utf8_lossy(&output.stdout);
    assert!(listing.contains("fn 0 fib: params=1"));
    assert!(listing.contains("OpCall 0"));
    assert!(listing.contains("(entry)"));
}

#[test]
fn cli_emit_ast() {
    let fixture = project_file("tests/fixtures/fib.elan");
    let output = elanc(&["compile", fixture.to_str().unwrap(), "--emit", "ast"]);

    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    let tree = String::from_utf8_lossy(&output.stdout);
    assert!(tree.starts_with("Program {"), "{}", tree);
    assert!(tree.contains("name: \"fib\""), "{}", tree);
    assert!(tree.contains("name: \"main\""), "{}", tree);
    assert!(tree.contains("Call {"), "{}", tree);
    assert!(!project_file("tests/fixtures/fib.elnb").exists());
}

#[test]
fn cli_reports_runaway_nesting() {
    let dir = scratch_dir("nesting");
    let path = dir.join("deep.elan");
    let source = format!("proc main() {{ let x = {}1; }}\n", "-".repeat(100_000));
    fs::write(&path, source).unwrap();

    let output = elanc(&["compile", path.to_str().unwrap(), "--emit", "ast"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E0203]"), "{}", stderr);
    assert!(output.stdout.is_empty());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn cli_exit_codes() {
    let type_error = project_file("tests/fixtures/type_error.elan");
    let output = elanc(&["run", type_error.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("type_error.elan:3:"), "{}", stderr);
    assert!(stderr.contains("error[E0402]"), "{}", stderr);
    assert!(output.stdout.is_empty());

    let div_zero = project_file("tests/fixtures/div_zero.elan");
    let output = elanc(&["run", div_zero.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "start\n5\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("division by zero"));

    let output = elanc(&["run", "/nonexistent/program.elan"]);
    assert_eq!(output.status.code(), Some(4));

    let output = elanc(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_rejects_corrupt_module() {
    let dir = scratch_dir("corrupt");
    let path = dir.join("bad.elnb");
    let mut bytes = b"ELNB".to_vec();
    bytes.extend_from_slice(&[0, 9, 0, 0]);
    fs::write(&path, bytes).unwrap();

    let output = elanc(&["run", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported module version 9"));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn cli_tokenize() {
    let dir = scratch_dir("tokenize");
    let path = dir.join("tiny.elan");
    fs::write(&path, "proc main() {}").unwrap();

    let output = elanc(&["tokenize", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("0..4 Proc \"proc\"\n5..9 Identifier \"main\"\n"), "{}", stdout);

    let _ = fs::remove_dir_all(dir);
}
