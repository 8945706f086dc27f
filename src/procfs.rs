//! Linux procfs plumbing for the attach/enumeration collaborators.
//!
//! Everything here is a thin wrapper over `/proc`: memory-map parsing,
//! process lookup by name, liveness probing, and sniffing the target's
//! pointer width from its ELF header.

use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::{Addr, PointerWidth};

/// One line of `/proc/<pid>/maps`.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub start: Addr,
    pub end: Addr,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    /// File offset of the mapping, zero for anonymous memory.
    pub offset: u64,
    /// Backing path, or an empty string for anonymous mappings.
    pub path: String,
}

impl Mapping {
    pub fn len(&self) -> u64 {
        self.end.get() - self.start.get()
    }

    pub fn is_file_backed(&self) -> bool {
        self.path.starts_with('/')
    }
}

/// Read and parse `/proc/<pid>/maps`.
pub fn mappings(pid: Pid) -> Result<Vec<Mapping>> {
    let content = std::fs::read_to_string(format!("/proc/{}/maps", pid))?;
    Ok(parse_maps(&content))
}

/// Parse the text of a maps file. Split out so tests can feed fixed input.
pub fn parse_maps(content: &str) -> Vec<Mapping> {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Mapping> {
    // 55d4e2a00000-55d4e2a21000 r-xp 00001000 103:02 91234  /usr/bin/foo
    let mut fields = line.splitn(6, char::is_whitespace);
    let range = fields.next()?;
    let perms = fields.next()?.as_bytes();
    let offset = u64::from_str_radix(fields.next()?, 16).ok()?;
    let _dev = fields.next()?;
    let _inode = fields.next()?;
    let path = fields.next().unwrap_or("").trim().to_string();

    let (lo, hi) = range.split_once('-')?;
    if perms.len() < 3 {
        return None;
    }

    Some(Mapping {
        start: Addr(u64::from_str_radix(lo, 16).ok()?),
        end: Addr(u64::from_str_radix(hi, 16).ok()?),
        readable: perms[0] == b'r',
        writable: perms[1] == b'w',
        executable: perms[2] == b'x',
        offset,
        path,
    })
}

/// Whether a process with this PID currently exists and is visible to us.
///
/// Uses the signal-0 probe: no signal is delivered, only the existence and
/// permission checks run. EPERM still means the process exists.
pub fn process_alive(pid: Pid) -> bool {
    match kill(pid, None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Resolve the executable path of a process.
pub fn exe_path(pid: Pid) -> Result<PathBuf> {
    Ok(std::fs::read_link(format!("/proc/{}/exe", pid))?)
}

/// Find the first process whose command name matches `name`
/// (case-insensitive).
///
/// Matches against `/proc/<pid>/comm`, which the kernel truncates to 15
/// bytes; callers looking up long binary names should pass the truncated
/// form or the PID directly.
pub fn pid_by_name(name: &str) -> Option<Pid> {
    let entries = std::fs::read_dir("/proc").ok()?;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(pid) = file_name.to_str().and_then(|s| s.parse::<i32>().ok()) else {
            continue;
        };
        let Ok(comm) = std::fs::read_to_string(format!("/proc/{}/comm", pid)) else {
            continue;
        };
        if comm.trim_end().eq_ignore_ascii_case(name) {
            return Some(Pid::from_raw(pid));
        }
    }
    None
}

/// Determine the target's pointer width from the ELF class byte of its
/// executable image.
pub fn pointer_width(pid: Pid) -> Result<PointerWidth> {
    use std::io::Read;

    let path = format!("/proc/{}/exe", pid);
    let mut ident = [0u8; 5];
    std::fs::File::open(&path)?.read_exact(&mut ident)?;
    if &ident[..4] != b"\x7fELF" {
        return Err(Error::Process(format!("{}: not an ELF image", path)));
    }
    match ident[4] {
        1 => Ok(PointerWidth::Four),
        2 => Ok(PointerWidth::Eight),
        c => Err(Error::Process(format!("{}: unknown ELF class {}", path, c))),
    }
}
