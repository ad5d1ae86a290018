//! [`DocumentPort`](crate::port::DocumentPort) implementations.

pub mod memory;
#[cfg(feature = "xlsx")]
pub mod xlsx;

pub use memory::{GridSeed, MemoryDocument, SheetSeed};
#[cfg(feature = "xlsx")]
pub use xlsx::XlsxDocument;
