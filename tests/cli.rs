use assert_cmd::Command;

#[test]
fn runs_a_script_and_exits_zero() {
    Command::cargo_bin("lox")
        .unwrap()
        .arg("tests/fixtures/hello.lox")
        .assert()
        .success()
        .stdout("Hello, world!\n");
}

#[test]
fn syntax_error_exits_65_and_writes_to_stderr() {
    Command::cargo_bin("lox")
        .unwrap()
        .arg("tests/fixtures/syntax_error.lox")
        .assert()
        .code(65)
        .stderr("[line 1] Error at ';': Expect expression.\n");
}

#[test]
fn runtime_error_exits_70_and_writes_to_stderr() {
    Command::cargo_bin("lox")
        .unwrap()
        .arg("tests/fixtures/runtime_error.lox")
        .assert()
        .code(70)
        .stderr("Operands must be two numbers or two strings.\n[line 1]\n");
}

#[test]
fn recursive_function_calls_produce_fibonacci_sequence() {
    Command::cargo_bin("lox")
        .unwrap()
        .arg("tests/fixtures/fibonacci.lox")
        .assert()
        .success()
        .stdout("0\n1\n1\n2\n3\n5\n8\n13\n");
}

#[test]
fn too_many_arguments_exits_64() {
    Command::cargo_bin("lox").unwrap().arg("a.lox").arg("b.lox").assert().code(64);
}
