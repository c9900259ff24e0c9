//! CadSceneFile (CSF): a versioned, pointer-based binary container for
//! CAD scene graphs, plus the load/save engine around it.
//!
//! On disk, every pointer field is a byte offset relative to the start of
//! the file, and a trailing relocation table lists the locations of all
//! such fields. [`raw::RawFile`] gives zero-copy, validated access to a
//! flattened blob; [`scene::Scene`] is the owned object model the load
//! pipeline decodes into; [`write::SceneWriter`] flattens a scene back
//! into the wire layout.

pub mod header;
pub mod records;

pub mod raw;
pub mod read;
pub mod scene;
pub mod write;

pub mod io;
pub mod mem;

pub use header::{MAGIC, VERSION, VERSION_COMPAT};
pub use read::LoadSettings;
pub use scene::Scene;
pub use write::SceneWriter;

#[derive(Debug, thiserror::Error)]
pub enum CsfError {
    /// The file did not exist or an I/O operation failed.
    #[error("I/O: {0}")]
    NoFile(#[from] std::io::Error),
    /// Bad magic, unsupported version, or declared size does not match
    /// the actual size.
    #[error("invalid header (magic, version, or declared size)")]
    Version,
    /// An operation was called that cannot be performed on this data.
    #[error("operation not permitted on this scene")]
    Operation,
    /// The file contains structurally invalid data (out-of-range offsets
    /// or indices).
    #[error("invalid data")]
    Invalid,
}

pub type CsfResult<T> = Result<T, CsfError>;
