//! phantomem — read, write, and scan the memory of a running Linux process.
//!
//! Attach to a target by PID or command name, resolve where a module was
//! loaded, read and write typed values at arbitrary addresses, and locate
//! byte signatures with wildcard masks inside the target's address space.
//! Built for reverse-engineering and instrumentation tools that need stable
//! offsets into a binary whose load address moves between runs.
//!
//! Transfers go through `process_vm_readv`/`process_vm_writev`, so the
//! target keeps running while it is inspected and several threads can read
//! through one session concurrently. Every operation is fail-closed: it
//! either moves exactly the requested bytes or returns a typed error, never
//! partial data.
//!
//! # Module overview
//!
//! - [`error`] — Error types used throughout the crate.
//! - [`types`] — Core types: `Addr`, `PointerWidth`.
//! - [`procfs`] — Linux procfs plumbing (`/proc/pid/maps`, process lookup).
//! - [`module`] — Module resolution: name to base address and image size.
//! - [`session`] — Attached-process sessions and the typed memory accessor.
//! - [`scan`] — Signature compilation and chunked wildcard scanning.
//! - [`cache`] — Session-scoped memoization of bases and read values.
//! - [`geometry`] — `Vec2`/`Vec3`/`Mat4x4` value types for game targets.
//!
//! # Example
//!
//! ```no_run
//! use phantomem::{Pattern, ScanMode, Session};
//!
//! # fn main() -> phantomem::Result<()> {
//! let session = Session::attach_by_name("game")?;
//! let module = session.module("libworld.so")?.expect("module not loaded");
//!
//! let pattern = Pattern::parse("48 8B ?? ?? 05 DE AD")?;
//! if let Some(hit) = session
//!     .scan_module(&module, &pattern, ScanMode::First)
//!     .first()
//! {
//!     let health: f32 = session.read_at(*hit, 0x10)?;
//!     session.write_at(*hit, 0x10, health + 25.0)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod geometry;
pub mod module;
pub mod procfs;
pub mod scan;
pub mod session;
pub mod types;

pub use cache::AddressCache;
pub use error::{Error, Result};
pub use geometry::{Mat4x4, Vec2, Vec3};
pub use module::ModuleInfo;
pub use scan::{Pattern, Region, ScanMode, DEFAULT_CHUNK_SIZE};
pub use session::{Scalar, Session};
pub use types::{Addr, PointerWidth};
