use ao_protocol::{read_handoff, WindowId};
use std::fs;
use std::io::BufReader;
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn ao(winid: Option<&str>) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ao"));
    for key in [
        "winid",
        "AO_SOCKET",
        "AO_ANALYZER",
        "ACME_MOUNT",
        "AO_DEBUG_LOG",
        "AO_LOG_DIR",
        "RUST_LOG",
    ] {
        command.env_remove(key);
    }
    if let Some(id) = winid {
        command.env("winid", id);
    }
    command.stdin(Stdio::null());
    command
}

fn run(command: &mut Command) -> Output {
    command.output().expect("Failed to run ao")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Lays out a fake acme tree: window 5 showing /tmp/foo.go, and `new/ctl`
/// handing out window 6 with an empty event file.
fn fake_mount(root: &Path) {
    let target = root.join("5");
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("tag"), "/tmp/foo.go Del Snarf | Look ").unwrap();

    let new = root.join("new");
    fs::create_dir_all(&new).unwrap();
    fs::write(new.join("ctl"), "6 0 0 0 0 ").unwrap();

    let menu = root.join("6");
    fs::create_dir_all(&menu).unwrap();
    for file in ["ctl", "addr", "data", "event"] {
        fs::write(menu.join(file), "").unwrap();
    }
}

#[test]
fn secondary_hands_window_to_listener_and_exits() {
    let dir = TempDir::new().expect("temp dir");
    let socket = dir.path().join("ao");
    let listener = UnixListener::bind(&socket).expect("bind rendezvous");

    let output = run(ao(Some("7")).arg("--socket").arg(&socket));
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let (stream, _) = listener.accept().expect("accept handoff");
    let id = read_handoff(BufReader::new(stream)).expect("valid handoff");
    assert_eq!(id, WindowId::new(7));
}

#[test]
fn missing_winid_exits_with_error() {
    let dir = TempDir::new().expect("temp dir");
    let output = run(ao(None).arg("--socket").arg(dir.path().join("ao")));
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stderr(&output),
        "ao: ao run outside acme window ($winid is not set)\n"
    );
}

#[test]
fn unknown_analyzer_is_fatal_after_claiming_socket() {
    let dir = TempDir::new().expect("temp dir");
    let mount = dir.path().join("acme");
    fake_mount(&mount);
    let socket = dir.path().join("ao");

    let output = run(ao(Some("5"))
        .arg("--socket")
        .arg(&socket)
        .arg("--acme-mount")
        .arg(&mount)
        .arg("--analyzer")
        .arg("ao-analyzer-that-does-not-exist"));

    assert_eq!(output.status.code(), Some(1));
    assert!(socket.exists());
    let stderr = stderr(&output);
    assert_eq!(stderr.lines().count(), 1, "stderr: {}", stderr);
    assert!(stderr.starts_with("ao: Cannot create analyzer: "));
}

#[test]
fn primary_draws_menu_and_exits_when_window_closes() {
    let dir = TempDir::new().expect("temp dir");
    let mount = dir.path().join("acme");
    fake_mount(&mount);
    let socket = dir.path().join("ao");

    let output = run(ao(Some("5"))
        .arg("--socket")
        .arg(&socket)
        .arg("--acme-mount")
        .arg(&mount)
        .arg("--analyzer")
        .arg("echo"));
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let body = fs::read_to_string(mount.join("6").join("data")).unwrap();
    assert!(body.starts_with("Current file is: /tmp/foo.go\n"));
    assert!(body.contains("callers\n"));

    let ctl = fs::read_to_string(mount.join("new").join("ctl")).unwrap();
    assert!(ctl.contains("name /ao//tmp/foo.go\n"));
    assert!(ctl.ends_with("clean\n"));
}
