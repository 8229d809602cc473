//! # themewatch-probe
//!
//! The two leaf capabilities the monitor drives on every tick:
//!
//! - [`StateReader`]: sample and write the OS theme settings. Backends:
//!   [`WindowsRegistryReader`], [`GnomeReader`], [`FileStateReader`] and the
//!   in-process [`MemoryStateReader`].
//! - [`ProcessAttributor`]: best-effort guess at which process caused a
//!   change. [`SysinfoAttributor`] walks the process table; [`NullAttributor`]
//!   always answers [`Attribution::Unknown`].

pub mod attribution;
mod command;
pub mod error;
pub mod file;
pub mod gnome;
pub mod memory;
pub mod reader;
pub mod windows;

pub use attribution::{
    pick_candidate, Attribution, NullAttributor, ProcessAttributor, ProcessSnapshot,
    SysinfoAttributor,
};
pub use error::AccessError;
pub use file::FileStateReader;
pub use gnome::GnomeReader;
pub use memory::MemoryStateReader;
pub use reader::{reader_for, StateReader};
pub use windows::WindowsRegistryReader;
