//! Attached-process sessions and the typed memory accessor.
//!
//! A [`Session`] is the capability for one target process: it owns no
//! memory of the target, only the right to transfer bytes in and out via
//! `process_vm_readv`/`process_vm_writev`. Those syscalls are safe to issue
//! concurrently from several threads against the same PID, so all accessor
//! methods take `&self` and a `Session` can be shared behind a reference.
//!
//! Every transfer is fail-closed: it either moves exactly the requested
//! byte count or reports an error, and a short transfer discards whatever
//! the kernel did move. Address zero is rejected before any syscall — a
//! null address here is almost always a pointer read from a failed lookup.

use std::io::{IoSlice, IoSliceMut};
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::uio::{process_vm_readv, process_vm_writev, RemoteIoVec};
use nix::unistd::Pid;
use tracing::debug;

use crate::cache::AddressCache;
use crate::error::{Error, Result};
use crate::module::{self, ModuleInfo};
use crate::procfs;
use crate::scan::{scan_range, Pattern, Region, ScanMode, DEFAULT_CHUNK_SIZE};
use crate::types::{Addr, PointerWidth};

/// A fixed-size value with a defined in-memory byte layout.
///
/// The closed set of types the typed accessor can move: primitive scalars
/// and the small geometry structs. Conversion uses the host's native byte
/// order with no padding, matching the assumption that controller and
/// target share one architecture.
pub trait Scalar: Copy {
    /// Exact size of the value in target memory.
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes.
    fn from_bytes(bytes: &[u8]) -> Self;

    /// Encode to exactly `SIZE` bytes.
    fn to_bytes(&self) -> Vec<u8>;
}

macro_rules! scalar_numeric {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn from_bytes(bytes: &[u8]) -> Self {
                // The accessor only hands over exactly SIZE bytes.
                <$t>::from_ne_bytes(bytes[..Self::SIZE].try_into().expect("scalar size"))
            }

            fn to_bytes(&self) -> Vec<u8> {
                self.to_ne_bytes().to_vec()
            }
        }
    )*};
}

scalar_numeric!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);

impl Scalar for bool {
    const SIZE: usize = 1;

    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn to_bytes(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }
}

/// An attached target process.
///
/// Move-only: exactly one owner is responsible for the detach, which runs
/// on drop along with cache invalidation. The liveness flag flips to false
/// on detach or on the first transfer that reports the target gone
/// (`ESRCH`); after that every operation fails with
/// [`Error::SessionInvalid`].
///
/// Detach does not coordinate with transfers in flight on other threads;
/// a read racing a concurrent teardown fails rather than succeeds.
#[derive(Debug)]
pub struct Session {
    pid: Pid,
    width: PointerWidth,
    alive: AtomicBool,
    cache: AddressCache,
}

impl Session {
    /// Attach to a running process by PID.
    ///
    /// Verifies the process exists and sniffs its pointer width from the
    /// executable image. There is no kernel handle on Linux; the actual
    /// permission check happens on the first transfer.
    pub fn attach(pid: Pid) -> Result<Session> {
        if !procfs::process_alive(pid) {
            return Err(Error::Process(format!("no such process: {}", pid)));
        }
        let width = procfs::pointer_width(pid)?;
        debug!(%pid, ?width, "attached to target");
        Ok(Session {
            pid,
            width,
            alive: AtomicBool::new(true),
            cache: AddressCache::new(),
        })
    }

    /// Attach to the first process whose command name matches
    /// (case-insensitive). See [`procfs::pid_by_name`] for the matching
    /// rules.
    pub fn attach_by_name(name: &str) -> Result<Session> {
        let pid = procfs::pid_by_name(name)
            .ok_or_else(|| Error::Process(format!("no process named '{}'", name)))?;
        Session::attach(pid)
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn pointer_width(&self) -> PointerWidth {
        self.width
    }

    /// Whether the session still believes its target is reachable.
    /// Flips to false on detach or on the first transfer that finds the
    /// target gone; it is not re-probed on every call.
    pub fn is_active(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Explicitly end the session. Equivalent to dropping it.
    pub fn detach(self) {}

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::SessionInvalid)
        }
    }

    fn transfer_error(&self, errno: nix::errno::Errno) -> Error {
        if errno == nix::errno::Errno::ESRCH {
            // Target exited out from under us.
            self.alive.store(false, Ordering::Relaxed);
            Error::SessionInvalid
        } else {
            Error::Os(errno)
        }
    }

    // ── raw transfers ────────────────────────────────────────────────

    /// Read exactly `len` bytes at `addr`.
    pub fn read_bytes(&self, addr: Addr, len: usize) -> Result<Vec<u8>> {
        self.ensure_active()?;
        if addr.is_null() {
            return Err(Error::NullAddress);
        }
        if len == 0 {
            return Err(Error::ZeroLength);
        }
        let mut buf = vec![0u8; len];
        let remote = [RemoteIoVec {
            base: addr.get() as usize,
            len,
        }];
        let mut local = [IoSliceMut::new(&mut buf)];
        let n = process_vm_readv(self.pid, &mut local, &remote)
            .map_err(|e| self.transfer_error(e))?;
        if n != len {
            // Fail closed: partially transferred bytes are discarded.
            return Err(Error::ShortTransfer {
                expected: len,
                transferred: n,
            });
        }
        Ok(buf)
    }

    /// Write all of `data` at `addr`.
    pub fn write_bytes(&self, addr: Addr, data: &[u8]) -> Result<()> {
        self.ensure_active()?;
        if addr.is_null() {
            return Err(Error::NullAddress);
        }
        if data.is_empty() {
            return Err(Error::ZeroLength);
        }
        let remote = [RemoteIoVec {
            base: addr.get() as usize,
            len: data.len(),
        }];
        let local = [IoSlice::new(data)];
        let n = process_vm_writev(self.pid, &local, &remote)
            .map_err(|e| self.transfer_error(e))?;
        if n != data.len() {
            return Err(Error::ShortTransfer {
                expected: data.len(),
                transferred: n,
            });
        }
        Ok(())
    }

    /// Read with the session's value cache: a repeat read of the same
    /// address and length is served from memory. Only useful for values
    /// known to be stable; the cache is dropped wholesale at capacity and
    /// on detach.
    pub fn read_bytes_cached(&self, addr: Addr, len: usize) -> Result<Vec<u8>> {
        if let Some(hit) = self.cache.cached_value(addr) {
            if hit.len() == len {
                return Ok(hit);
            }
        }
        let bytes = self.read_bytes(addr, len)?;
        self.cache.remember_value(addr, bytes.clone());
        Ok(bytes)
    }

    // ── typed accessors ──────────────────────────────────────────────

    /// Read one fixed-size value.
    pub fn read<T: Scalar>(&self, addr: Addr) -> Result<T> {
        let bytes = self.read_bytes(addr, T::SIZE)?;
        Ok(T::from_bytes(&bytes))
    }

    /// `read` at `addr + offset`.
    pub fn read_at<T: Scalar>(&self, addr: Addr, offset: i64) -> Result<T> {
        self.read(addr.offset(offset))
    }

    /// Write one fixed-size value.
    pub fn write<T: Scalar>(&self, addr: Addr, value: T) -> Result<()> {
        self.write_bytes(addr, &value.to_bytes())
    }

    /// `write` at `addr + offset`.
    pub fn write_at<T: Scalar>(&self, addr: Addr, offset: i64, value: T) -> Result<()> {
        self.write(addr.offset(offset), value)
    }

    /// The silently defaulting read form for pointer-chain traversal:
    /// an absent address, or any failed read, yields `T::default()`.
    ///
    /// Deliberate trade-off: the caller cannot tell "target held zero"
    /// from "read failed". Use [`Session::read`] when that matters.
    pub fn read_or_default<T: Scalar + Default>(&self, addr: Option<Addr>) -> T {
        self.read_or_default_at(addr, 0)
    }

    /// [`Session::read_or_default`] at `addr + offset`.
    pub fn read_or_default_at<T: Scalar + Default>(&self, addr: Option<Addr>, offset: i64) -> T {
        match addr {
            Some(a) if !a.is_null() => self.read_at(a, offset).unwrap_or_default(),
            _ => T::default(),
        }
    }

    /// Write through an optional address; absent or null means no-op
    /// reported as `false`, mirroring the defaulting read form.
    pub fn write_or_skip<T: Scalar>(&self, addr: Option<Addr>, offset: i64, value: T) -> bool {
        match addr {
            Some(a) if !a.is_null() => self.write_at(a, offset, value).is_ok(),
            _ => false,
        }
    }

    /// Read a pointer at the target's width, zero-extended to 64 bits.
    /// A 32-bit target can never yield an address at or above 2^32.
    pub fn read_ptr(&self, addr: Addr) -> Result<Addr> {
        let raw = match self.width {
            PointerWidth::Four => self.read::<u32>(addr)? as u64,
            PointerWidth::Eight => self.read::<u64>(addr)?,
        };
        Ok(Addr(raw & self.width.mask()))
    }

    /// Follow a pointer chain: for each offset, dereference
    /// `current + offset` to get the next link. Returns `None` as soon as
    /// a link reads as null or fails to read, so a broken chain falls out
    /// silently instead of aborting the caller.
    pub fn pointer_chain(&self, base: Addr, offsets: &[i64]) -> Option<Addr> {
        let mut current = base;
        for &off in offsets {
            current = self.read_ptr(current.offset(off)).ok()?;
            if current.is_null() {
                return None;
            }
        }
        Some(current)
    }

    // ── string helpers ───────────────────────────────────────────────

    /// Read up to `max_len` bytes and cut at the first NUL; without one the
    /// whole buffer is taken. Invalid UTF-8 is replaced, not rejected.
    pub fn read_string(&self, addr: Addr, max_len: usize) -> Result<String> {
        let bytes = self.read_bytes(addr, max_len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read up to `max_len` UTF-16 code units and cut at the first NUL.
    pub fn read_wide_string(&self, addr: Addr, max_len: usize) -> Result<String> {
        let bytes = self.read_bytes(addr, max_len * 2)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect();
        let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
        Ok(String::from_utf16_lossy(&units[..end]))
    }

    /// Write a string's bytes, appending a NUL terminator when asked.
    pub fn write_string(&self, addr: Addr, text: &str, nul_terminated: bool) -> Result<()> {
        if nul_terminated {
            let mut data = Vec::with_capacity(text.len() + 1);
            data.extend_from_slice(text.as_bytes());
            data.push(0);
            self.write_bytes(addr, &data)
        } else {
            self.write_bytes(addr, text.as_bytes())
        }
    }

    // ── modules ──────────────────────────────────────────────────────

    /// Enumerate the target's loaded modules.
    pub fn modules(&self) -> Result<Vec<ModuleInfo>> {
        self.ensure_active()?;
        Ok(module::modules(&procfs::mappings(self.pid)?))
    }

    /// Resolve one module by file name (case-insensitive, first match),
    /// filling in the entry point from the remote ELF header when it is
    /// readable.
    pub fn module(&self, name: &str) -> Result<Option<ModuleInfo>> {
        self.ensure_active()?;
        let maps = procfs::mappings(self.pid)?;
        let Some(mut info) = module::find_module(&maps, name) else {
            return Ok(None);
        };
        if let Ok(header) = self.read_bytes(info.base, 64) {
            info.entry = module::entry_from_header(info.base, &header);
        }
        Ok(Some(info))
    }

    /// Resolve a module base through the session cache. The first lookup
    /// hits procfs; repeats are served from memory until detach.
    pub fn module_base(&self, name: &str) -> Option<Addr> {
        self.cache.get_or_resolve(name, || {
            let maps = procfs::mappings(self.pid).ok()?;
            module::find_module(&maps, name).map(|m| m.base)
        })
    }

    // ── scanning ─────────────────────────────────────────────────────

    /// Scan an address range for a compiled pattern.
    pub fn scan(&self, region: Region, pattern: &Pattern, mode: ScanMode) -> Vec<Addr> {
        self.scan_with_chunk_size(region, pattern, mode, DEFAULT_CHUNK_SIZE)
    }

    /// [`Session::scan`] with an explicit chunk size. Results do not depend
    /// on the chunk size; it only trades syscall count against buffer size.
    pub fn scan_with_chunk_size(
        &self,
        region: Region,
        pattern: &Pattern,
        mode: ScanMode,
        chunk_size: usize,
    ) -> Vec<Addr> {
        let hits = scan_range(region, pattern, mode, chunk_size, |addr, len| {
            self.read_bytes(addr, len)
        });
        debug!(
            start = %region.start,
            end = %region.end,
            hits = hits.len(),
            "scan complete"
        );
        hits
    }

    /// First match in the region, if any.
    pub fn find_first(&self, region: Region, pattern: &Pattern) -> Option<Addr> {
        self.scan(region, pattern, ScanMode::First).into_iter().next()
    }

    /// Every match in the region, ascending.
    pub fn find_all(&self, region: Region, pattern: &Pattern) -> Vec<Addr> {
        self.scan(region, pattern, ScanMode::All)
    }

    /// Scan the full image span of a resolved module.
    pub fn scan_module(&self, info: &ModuleInfo, pattern: &Pattern, mode: ScanMode) -> Vec<Addr> {
        let region = Region {
            start: info.base,
            end: info.base + info.size,
        };
        self.scan(region, pattern, mode)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.cache.clear();
        debug!(pid = %self.pid, "detached from target");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_session() -> Session {
        Session::attach(Pid::this()).unwrap()
    }

    fn addr_of<T>(v: &T) -> Addr {
        Addr(v as *const T as u64)
    }

    #[test]
    fn attach_to_missing_pid_fails() {
        assert!(Session::attach(Pid::from_raw(i32::MAX - 1)).is_err());
    }

    #[test]
    fn attach_by_bogus_name_fails() {
        assert!(Session::attach_by_name("no-such-process-zz").is_err());
    }

    #[test]
    fn reads_own_memory() {
        let s = self_session();
        let data: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
        let got = s.read_bytes(addr_of(&data), 8).unwrap();
        assert_eq!(got, data);
    }

    #[test]
    fn null_address_always_fails() {
        let s = self_session();
        assert!(matches!(s.read_bytes(Addr(0), 4), Err(Error::NullAddress)));
        assert!(matches!(
            s.write_bytes(Addr(0), &[1]),
            Err(Error::NullAddress)
        ));
    }

    #[test]
    fn zero_length_rejected() {
        let s = self_session();
        let data = [0u8; 4];
        assert!(matches!(
            s.read_bytes(addr_of(&data), 0),
            Err(Error::ZeroLength)
        ));
        assert!(matches!(
            s.write_bytes(addr_of(&data), &[]),
            Err(Error::ZeroLength)
        ));
    }

    #[test]
    fn typed_round_trip() {
        let s = self_session();
        let cell = Box::new(0u32);
        let a = Addr(&*cell as *const u32 as u64);
        s.write(a, 0xDEAD_BEEFu32).unwrap();
        assert_eq!(s.read::<u32>(a).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn offset_form_is_plain_addition() {
        let s = self_session();
        let data: [u32; 4] = [10, 20, 30, 40];
        let base = addr_of(&data);
        assert_eq!(s.read_at::<u32>(base, 8).unwrap(), 30);
        assert_eq!(s.read::<u32>(base + 8).unwrap(), 30);
    }

    #[test]
    fn defaulting_read_swallows_absence_and_failure() {
        let s = self_session();
        assert_eq!(s.read_or_default::<u32>(None), 0);
        assert_eq!(s.read_or_default::<u32>(Some(Addr(0))), 0);
        let x: u64 = 77;
        assert_eq!(s.read_or_default::<u64>(Some(addr_of(&x))), 77);
    }

    #[test]
    fn write_or_skip_reports_absence() {
        let s = self_session();
        assert!(!s.write_or_skip(None, 0, 1u8));
        assert!(!s.write_or_skip(Some(Addr(0)), 0, 1u8));
        let cell = Box::new(0u8);
        let a = Addr(&*cell as *const u8 as u64);
        assert!(s.write_or_skip(Some(a), 0, 9u8));
        assert_eq!(s.read::<u8>(a).unwrap(), 9);
    }

    #[test]
    fn pointer_chain_follows_links() {
        let s = self_session();
        let value: u32 = 1234;
        let level1: u64 = &value as *const u32 as u64;
        let level0: u64 = &level1 as *const u64 as u64;
        let root = addr_of(&level0);
        let end = s.pointer_chain(root, &[0, 0]).unwrap();
        assert_eq!(s.read::<u32>(end).unwrap(), 1234);
    }

    #[test]
    fn pointer_chain_breaks_silently_on_null() {
        let s = self_session();
        let null_link: u64 = 0;
        assert_eq!(s.pointer_chain(addr_of(&null_link), &[0, 16]), None);
    }

    #[test]
    fn string_round_trip() {
        let s = self_session();
        let buf = Box::new([0u8; 32]);
        let a = Addr(buf.as_ptr() as u64);
        s.write_string(a, "phantom", true).unwrap();
        assert_eq!(s.read_string(a, 32).unwrap(), "phantom");
    }

    #[test]
    fn wide_string_read() {
        let s = self_session();
        let units: Vec<u16> = "wide\0junk".encode_utf16().collect();
        let got = s
            .read_wide_string(Addr(units.as_ptr() as u64), units.len())
            .unwrap();
        assert_eq!(got, "wide");
    }

    #[test]
    fn finds_own_executable_module() {
        let s = self_session();
        let exe = procfs::exe_path(s.pid()).unwrap();
        let name = exe.file_name().unwrap().to_str().unwrap().to_string();
        let info = s.module(&name).unwrap().unwrap();
        assert!(!info.base.is_null());
        assert!(info.size > 0);
        // Test binaries are PIE, so the entry point lands inside the image.
        let entry = info.entry.unwrap();
        assert!(entry > info.base && entry < info.base + info.size);
    }

    #[test]
    fn module_base_is_cached() {
        let s = self_session();
        let exe = procfs::exe_path(s.pid()).unwrap();
        let name = exe.file_name().unwrap().to_str().unwrap().to_string();
        let first = s.module_base(&name).unwrap();
        let second = s.module_base(&name).unwrap();
        assert_eq!(first, second);
        assert!(s.module_base("definitely-not-loaded.so").is_none());
    }

    #[test]
    fn scans_own_memory_end_to_end() {
        let s = self_session();
        let mut buf = vec![0u8; 1024];
        buf[600..604].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let base = Addr(buf.as_ptr() as u64);
        let region = Region::new(base, base + 1024).unwrap();
        let pat = Pattern::parse("DE AD ?? EF").unwrap();
        for chunk in [64, 256, 1024] {
            let hits = s.scan_with_chunk_size(region, &pat, ScanMode::All, chunk);
            assert_eq!(hits, vec![base + 600], "chunk size {}", chunk);
        }
    }

    #[test]
    fn cached_read_serves_repeat() {
        let s = self_session();
        let data: [u8; 4] = [9, 9, 9, 9];
        let a = addr_of(&data);
        assert_eq!(s.read_bytes_cached(a, 4).unwrap(), vec![9, 9, 9, 9]);
        assert_eq!(s.read_bytes_cached(a, 4).unwrap(), vec![9, 9, 9, 9]);
    }

    #[test]
    fn pointer_width_matches_host_for_self() {
        let s = self_session();
        assert_eq!(s.pointer_width().bytes(), std::mem::size_of::<usize>());
    }
}
