//! Runs the `doom-host` binary against guests placed at `../doom.wasm`.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::Result;
use tempfile::TempDir;

const IMPORTS: &str = r#"
    (import "js" "js_milliseconds_since_start" (func $millis (result i32)))
    (import "js" "js_console_log" (func $log (param i32 i32)))
    (import "js" "js_draw_screen" (func $present (param i32)))
    (import "js" "js_stdout" (func $stdout (param i32 i32)))
    (import "js" "js_stderr" (func $stderr (param i32 i32)))
    (import "env" "memory" (memory 108))
"#;

/// A scratch tree with the guest at `<root>/doom.wasm` and the working
/// directory at `<root>/run`.
struct Sandbox {
    _root: TempDir,
    cwd: PathBuf,
}

impl Sandbox {
    fn new(artifact: Option<&[u8]>) -> Result<Self> {
        let root = tempfile::tempdir()?;
        let cwd = root.path().join("run");
        std::fs::create_dir(&cwd)?;
        if let Some(bytes) = artifact {
            std::fs::write(root.path().join("doom.wasm"), bytes)?;
        }
        Ok(Self { _root: root, cwd })
    }

    fn with_guest(wat: &str) -> Result<Self> {
        Self::new(Some(&wat::parse_str(wat)?))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_doom-host"));
        cmd.current_dir(&self.cwd);
        cmd
    }

    fn output(&self) -> Result<Output> {
        Ok(self.command().output()?)
    }
}

fn error_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .filter(|line| line.starts_with("error: "))
        .map(str::to_string)
        .collect()
}

#[test]
fn missing_artifact_exits_one_with_single_error_line() -> Result<()> {
    let output = Sandbox::new(None)?.output()?;
    assert_eq!(output.status.code(), Some(1));
    let errors = error_lines(&output);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("doom.wasm"), "{}", errors[0]);
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn zeroed_artifact_reports_invalid_binary() -> Result<()> {
    let output = Sandbox::new(Some(&[0u8; 16]))?.output()?;
    assert_eq!(output.status.code(), Some(1));
    let errors = error_lines(&output);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].starts_with("error: invalid binary"), "{}", errors[0]);
    Ok(())
}

#[test]
fn initializer_only_guest_prints_and_exits_zero() -> Result<()> {
    // Slot 2 holds a global, so there is no frame loop.
    let sandbox = Sandbox::with_guest(&format!(
        r#"(module {IMPORTS}
             (data (i32.const 0) "hello")
             (global $g i32 (i32.const 0))
             (func $main (param i32 i32) (result i32)
               (call $log (i32.const 0) (i32.const 5))
               (i32.const 0))
             (export "g0" (global $g))
             (export "g1" (global $g))
             (export "g2" (global $g))
             (export "main" (func $main)))"#
    ))?;
    let output = sandbox.output()?;
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(String::from_utf8(output.stdout.clone())?, "hello\n");
    assert!(error_lines(&output).is_empty());
    Ok(())
}

#[test]
fn trapping_initializer_exits_one() -> Result<()> {
    let sandbox = Sandbox::with_guest(&format!(
        r#"(module {IMPORTS}
             (func $nop)
             (func $main (param i32 i32) (result i32)
               (call $log (i32.const 0xFFFFFFF0) (i32.const 32))
               (i32.const 0))
             (export "a" (func $nop))
             (export "b" (func $nop))
             (export "c" (func $nop))
             (export "main" (func $main)))"#
    ))?;
    let output = sandbox.output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let errors = error_lines(&output);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("memory out of bounds"), "{}", errors[0]);
    Ok(())
}

#[cfg(unix)]
#[test]
fn interrupt_ends_frame_loop_with_status_zero() -> Result<()> {
    let sandbox = Sandbox::with_guest(&format!(
        r#"(module {IMPORTS}
             (data (i32.const 0) "hello")
             (func $nop)
             (func $main (param i32 i32) (result i32)
               (call $log (i32.const 0) (i32.const 5))
               (i32.const 0))
             (export "a" (func $nop))
             (export "b" (func $nop))
             (export "c" (func $nop))
             (export "main" (func $main)))"#
    ))?;
    let mut child = sandbox
        .command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // The handler is installed before the guest runs, so once "hello" is
    // printed the process is inside the frame loop or about to enter it.
    let mut stdout = BufReader::new(child.stdout.take().expect("piped stdout"));
    let mut line = String::new();
    stdout.read_line(&mut line)?;
    assert_eq!(line, "hello\n");

    let killed = Command::new("kill")
        .arg("-INT")
        .arg(child.id().to_string())
        .status()?;
    assert!(killed.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() > deadline {
            child.kill()?;
            panic!("doom-host did not stop after SIGINT");
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    assert_eq!(status.code(), Some(0));
    Ok(())
}
