//! End-to-end tests of the primary/secondary handoff with a real rendezvous
//! socket, the in-memory acme and a scripted analyzer.

use ao_core::coordinator::{self, Role};
use ao_core::event_loop::{spawn_event_pump, EventLoop, LoopEvent};
use ao_core::testing::{FakeAcme, ScriptedAnalyzer};
use ao_core::{Menu, Window, WindowEvent, WindowId, WindowSystem};
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Primary {
    menu: WindowId,
    clicks: Sender<WindowEvent>,
    handle: JoinHandle<ao_core::Result<()>>,
}

fn start_primary(
    acme: &FakeAcme,
    socket: &Path,
    target: WindowId,
    analyzer: ScriptedAnalyzer,
) -> Primary {
    let rendezvous = match coordinator::claim(socket, target).expect("claim rendezvous") {
        Role::Primary(rendezvous) => rendezvous,
        Role::Secondary => panic!("no primary should be running yet"),
    };

    let mut window = acme.create().expect("create menu window");
    let menu = window.id();
    let clicks = acme.event_sender(menu);
    acme.close_events(menu);
    let events = window.events().expect("menu events");

    let mut event_loop = EventLoop::new(acme.clone(), Menu::new(window), analyzer, target);
    event_loop.render().expect("initial render");

    let (tx, rx) = mpsc::channel::<LoopEvent>();
    spawn_event_pump(events, tx.clone());
    rendezvous.spawn_acceptor(tx);

    let handle = thread::spawn(move || event_loop.run(rx));
    Primary {
        menu,
        clicks,
        handle,
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not met within {:?}", timeout);
}

fn click(mode: &str) -> WindowEvent {
    WindowEvent::new('M', 'X', 0, mode.len(), 0, mode)
}

#[test]
fn second_invocation_retargets_running_primary() {
    let dir = TempDir::new().expect("temp dir");
    let socket = dir.path().join("ao");
    let acme = FakeAcme::new();

    let first = acme.add_window("/tmp/foo.go", "package main\n\nfunc main() {}\n");
    acme.select(first, 10, 14);
    let analyzer = ScriptedAnalyzer::new();
    let primary = start_primary(&acme, &socket, first, analyzer.clone());

    assert!(acme
        .body(primary.menu)
        .starts_with("Current file is: /tmp/foo.go\n"));

    primary.clicks.send(click("callers")).unwrap();
    wait_until(Duration::from_secs(5), || analyzer.queries().len() == 1);
    assert_eq!(analyzer.queries()[0].1.to_string(), "/tmp/foo.go:#10,#14");

    let second = acme.add_window("/tmp/bar.go", "package bar\n\nvar x = 1\n");
    acme.select(second, 17, 18);
    let windows_before = acme.window_count();

    let role = coordinator::claim(&socket, second).expect("secondary claim");
    assert!(matches!(role, Role::Secondary));
    assert_eq!(acme.window_count(), windows_before);

    wait_until(Duration::from_secs(5), || {
        acme.body(primary.menu)
            .starts_with("Current file is: /tmp/bar.go\n")
    });

    primary.clicks.send(click("pointsto")).unwrap();
    wait_until(Duration::from_secs(5), || analyzer.queries().len() == 2);
    let (mode, position) = analyzer.queries()[1].clone();
    assert_eq!(mode, "pointsto");
    assert_eq!(position.to_string(), "/tmp/bar.go:#17,#18");

    drop(primary.clicks);
    let outcome = primary.handle.join().expect("event loop thread");
    assert!(outcome.is_ok());
    assert!(!acme.is_dirty(primary.menu));
}

#[test]
fn query_failure_keeps_primary_running() {
    let dir = TempDir::new().expect("temp dir");
    let socket = dir.path().join("ao");
    let acme = FakeAcme::new();

    let target = acme.add_window("/tmp/foo.go", "package main\n");
    acme.select(target, 8, 12);
    let analyzer = ScriptedAnalyzer::new();
    analyzer.fail_mode("callers", "no call graph for this position");
    let primary = start_primary(&acme, &socket, target, analyzer.clone());

    primary.clicks.send(click("callers")).unwrap();
    wait_until(Duration::from_secs(5), || {
        acme.body(primary.menu)
            .contains("Cannot query analyzer: callers: no call graph for this position")
    });
    assert!(!acme.is_dirty(primary.menu));

    primary.clicks.send(click("describe")).unwrap();
    wait_until(Duration::from_secs(5), || {
        acme.body(primary.menu)
            .contains("describe result for /tmp/foo.go:#8,#12")
    });

    drop(primary.clicks);
    assert!(primary.handle.join().expect("event loop thread").is_ok());
}

#[test]
fn malformed_handoff_stops_primary() {
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    let dir = TempDir::new().expect("temp dir");
    let socket = dir.path().join("ao");
    let acme = FakeAcme::new();
    let target = acme.add_window("/tmp/foo.go", "package main\n");
    let primary = start_primary(&acme, &socket, target, ScriptedAnalyzer::new());

    let mut stream = UnixStream::connect(&socket).expect("connect to primary");
    stream.write_all(b"garbage\n").unwrap();
    drop(stream);

    let outcome = primary.handle.join().expect("event loop thread");
    assert!(matches!(outcome, Err(ao_core::AoError::Protocol(_))));
}
