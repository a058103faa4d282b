//! Window capability backed by acme's file server.
//!
//! Expects acme's 9P tree mounted at a directory (for plan9port:
//! `9pfuse $(namespace)/acme /mnt/acme`). Window `N` lives under `<mount>/N/`
//! and opening `<mount>/new/ctl` creates a window.
//!
//! File handles are opened lazily and kept until the window is dropped.
//! acme resets a window's address whenever its `addr` file is opened, so
//! reopening it per operation would lose the address set through `ctl`.

mod event;

pub use event::{format_event, EventReader};

use crate::window::{parse_addr, EventStream, WinFile, Window, WindowEvent, WindowSystem};
use ao_protocol::WindowId;
use fs_err as fs;
use std::collections::HashMap;
use std::io::{self, BufReader, Read, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_MOUNT: &str = "/mnt/acme";

#[derive(Debug, Clone)]
pub struct AcmeFs {
    mount: PathBuf,
}

impl AcmeFs {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
        }
    }

    pub fn mount(&self) -> &Path {
        &self.mount
    }
}

impl WindowSystem for AcmeFs {
    type Window = AcmeWindow;

    fn open(&self, id: WindowId) -> io::Result<AcmeWindow> {
        let dir = self.mount.join(id.to_string());
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no acme window at {}", dir.display()),
            ));
        }
        Ok(AcmeWindow::new(id, dir))
    }

    fn create(&self) -> io::Result<AcmeWindow> {
        let mut ctl = open_rw(&self.mount.join("new").join("ctl"))?;
        let mut buf = [0u8; 128];
        let n = ctl.read(&mut buf)?;
        let line = String::from_utf8_lossy(&buf[..n]);
        let id = line
            .split_whitespace()
            .next()
            .and_then(|field| field.parse::<WindowId>().ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected new/ctl contents {:?}", line),
                )
            })?;

        debug!(id = %id, "Created acme window");
        let mut window = AcmeWindow::new(id, self.mount.join(id.to_string()));
        window.handles.insert(WinFile::Ctl, ctl);
        Ok(window)
    }
}

pub struct AcmeWindow {
    id: WindowId,
    dir: PathBuf,
    handles: HashMap<WinFile, fs::File>,
}

impl AcmeWindow {
    fn new(id: WindowId, dir: PathBuf) -> Self {
        Self {
            id,
            dir,
            handles: HashMap::new(),
        }
    }

    fn handle(&mut self, file: WinFile) -> io::Result<&mut fs::File> {
        if !self.handles.contains_key(&file) {
            let opened = open_rw(&self.dir.join(file.name()))?;
            self.handles.insert(file, opened);
        }
        self.handles
            .get_mut(&file)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, file.name()))
    }
}

impl Window for AcmeWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn read(&mut self, file: WinFile, buf: &mut [u8]) -> io::Result<usize> {
        self.handle(file)?.read(buf)
    }

    fn write(&mut self, file: WinFile, data: &[u8]) -> io::Result<usize> {
        let handle = self.handle(file)?;
        handle.write_all(data)?;
        Ok(data.len())
    }

    fn read_addr(&mut self) -> io::Result<(usize, usize)> {
        let addr = self.handle(WinFile::Addr)?;
        let mut buf = [0u8; 64];
        let n = addr.file().read_at(&mut buf, 0)?;
        parse_addr(&buf[..n])
    }

    fn read_all(&mut self, file: WinFile) -> io::Result<Vec<u8>> {
        let mut contents = Vec::new();
        fs::File::open(self.dir.join(file.name()))?.read_to_end(&mut contents)?;
        Ok(contents)
    }

    fn events(&mut self) -> io::Result<EventStream> {
        let file = fs::File::open(self.dir.join(WinFile::Event.name()))?;
        let id = self.id;
        let mut reader = EventReader::new(BufReader::new(file));
        Ok(Box::new(std::iter::from_fn(move || {
            match reader.read_event() {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, window = %id, "Closing unreadable event stream");
                    None
                }
            }
        })))
    }

    fn write_event(&mut self, event: &WindowEvent) -> io::Result<()> {
        let line = format_event(event);
        self.handle(WinFile::Event)?.write_all(line.as_bytes())
    }
}

fn open_rw(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new().read(true).write(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mount_with_window(id: u32, tag: &str) -> TempDir {
        let mount = TempDir::new().expect("create mount");
        let dir = mount.path().join(id.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tag"), tag).unwrap();
        std::fs::write(dir.join("ctl"), "").unwrap();
        std::fs::write(dir.join("event"), "MX0 7 0 7 callers\nMx0 3 1 3 Del\n").unwrap();
        mount
    }

    #[test]
    fn opens_existing_window_and_reads_tag() {
        let mount = mount_with_window(5, "/tmp/foo.go Del Snarf | Look");
        let acme = AcmeFs::new(mount.path());
        let mut window = acme.open(WindowId::new(5)).unwrap();
        assert_eq!(window.id(), WindowId::new(5));
        let tag = window.read_all(WinFile::Tag).unwrap();
        assert!(tag.starts_with(b"/tmp/foo.go"));
    }

    #[test]
    fn open_missing_window_fails() {
        let mount = TempDir::new().unwrap();
        let acme = AcmeFs::new(mount.path());
        let err = acme.open(WindowId::new(9)).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn ctl_commands_are_newline_terminated() {
        let mount = mount_with_window(3, "/tmp/a.go");
        let acme = AcmeFs::new(mount.path());
        let mut window = acme.open(WindowId::new(3)).unwrap();
        window.ctl("clean").unwrap();
        window.ctl("addr=dot").unwrap();
        drop(window);
        let ctl = std::fs::read_to_string(mount.path().join("3").join("ctl")).unwrap();
        assert_eq!(ctl, "clean\naddr=dot\n");
    }

    #[test]
    fn streams_events_from_event_file() {
        let mount = mount_with_window(4, "/tmp/a.go");
        let acme = AcmeFs::new(mount.path());
        let mut window = acme.open(WindowId::new(4)).unwrap();
        let events: Vec<_> = window.events().unwrap().collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_body_execute());
        assert_eq!(events[0].text, "callers");
        assert!(events[1].is_builtin());
    }

    #[test]
    fn addr_is_reread_from_the_start_on_the_kept_handle() {
        let mount = mount_with_window(5, "/tmp/a.go");
        std::fs::write(mount.path().join("5").join("addr"), format!("{:11} {:11} ", 3, 7))
            .unwrap();
        let acme = AcmeFs::new(mount.path());
        let mut window = acme.open(WindowId::new(5)).unwrap();

        assert_eq!(window.read_addr().unwrap(), (3, 7));
        window.ctl("addr=dot").unwrap();
        assert_eq!(window.read_addr().unwrap(), (3, 7));
    }

    #[test]
    fn resolves_query_position_through_mounted_files() {
        let mount = mount_with_window(5, "/tmp/foo.go Del Snarf | Look ");
        let dir = mount.path().join("5");
        std::fs::write(dir.join("ctl"), format!("{:11} {:11} {:11} {:11} {:11} ", 5, 29, 24, 0, 0))
            .unwrap();
        std::fs::write(dir.join("addr"), format!("{:11} {:11} ", 9, 13)).unwrap();
        std::fs::write(dir.join("data"), "// h\u{e9}llo\nfunc main() {}\n").unwrap();

        let acme = AcmeFs::new(mount.path());
        let position = crate::session::resolve_position(&acme, WindowId::new(5)).unwrap();
        assert_eq!(position.to_string(), "/tmp/foo.go:#10,#14");
    }

    #[test]
    fn create_reads_id_from_new_ctl() {
        let mount = TempDir::new().unwrap();
        std::fs::create_dir_all(mount.path().join("new")).unwrap();
        std::fs::write(
            mount.path().join("new").join("ctl"),
            "         12          0          0          0          0 ",
        )
        .unwrap();
        let acme = AcmeFs::new(mount.path());
        let window = acme.create().unwrap();
        assert_eq!(window.id(), WindowId::new(12));
    }
}
