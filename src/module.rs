//! Module resolution: mapping a module name to its load address and size.
//!
//! A "module" is one file-backed image in the target (the main binary or a
//! shared object). Its mappings appear as several consecutive lines in
//! `/proc/<pid>/maps`; the resolver folds them into a single descriptor.

use crate::procfs::Mapping;
use crate::types::Addr;

/// Snapshot of one loaded module.
///
/// Stale by construction: if the target unloads or reloads the module, the
/// descriptor is not refreshed. Re-resolve when that matters.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    /// File name of the image, e.g. `libworld.so`.
    pub name: String,
    /// Full path of the backing file.
    pub path: String,
    /// Lowest mapped address of the image.
    pub base: Addr,
    /// Span from base to the end of the image's highest mapping.
    pub size: u64,
    /// Runtime entry point, recovered from the remote ELF header.
    /// `None` when the header was unreadable or the image has no entry.
    pub entry: Option<Addr>,
}

/// Fold raw mappings into one descriptor per file-backed image.
pub fn modules(maps: &[Mapping]) -> Vec<ModuleInfo> {
    let mut out: Vec<ModuleInfo> = Vec::new();
    for m in maps {
        if !m.is_file_backed() {
            continue;
        }
        match out.iter_mut().find(|info| info.path == m.path) {
            Some(info) => {
                // Mappings arrive in ascending address order, so only the
                // upper bound can grow.
                let end = info.base.get() + info.size;
                info.size = end.max(m.end.get()) - info.base.get();
            }
            None => out.push(ModuleInfo {
                name: file_name(&m.path).to_string(),
                path: m.path.clone(),
                base: m.start,
                size: m.len(),
                entry: None,
            }),
        }
    }
    out
}

/// Find a module by file name, case-insensitive, first match wins.
pub fn find_module(maps: &[Mapping], name: &str) -> Option<ModuleInfo> {
    modules(maps)
        .into_iter()
        .find(|m| m.name.eq_ignore_ascii_case(name))
}

/// Recover the runtime entry point from the first bytes of a module image.
///
/// `header` must be at least 32 bytes read from `base`. For ET_DYN images
/// (PIE binaries and shared objects) `e_entry` is a file-relative offset and
/// is rebased; for ET_EXEC it is already absolute.
pub fn entry_from_header(base: Addr, header: &[u8]) -> Option<Addr> {
    if header.len() < 32 || &header[..4] != b"\x7fELF" {
        return None;
    }
    let e_type = u16::from_ne_bytes([header[16], header[17]]);
    let e_entry = match header[4] {
        // ELFCLASS32: e_entry is a u32 at offset 24
        1 => u32::from_ne_bytes([header[24], header[25], header[26], header[27]]) as u64,
        // ELFCLASS64: e_entry is a u64 at offset 24
        2 => u64::from_ne_bytes(header[24..32].try_into().ok()?),
        _ => return None,
    };
    if e_entry == 0 {
        return None;
    }
    const ET_DYN: u16 = 3;
    if e_type == ET_DYN {
        Some(base + e_entry)
    } else {
        Some(Addr(e_entry))
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
