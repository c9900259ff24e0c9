use std::mem::size_of;

use crate::records::{GeometryRecord, MaterialRecord, MetaRecord, NodeRecord};
use crate::{CsfError, CsfResult};

pub const MAGIC: i32 = 1567262451;

pub const VERSION_BASE: i32 = 1;
/// Materials gained an opaque byte payload (binary break).
pub const VERSION_MATERIAL: i32 = 2;
/// `file_flags` became a bitfield.
pub const VERSION_FILEFLAGS: i32 = 3;
/// The per-part line-width field was replaced by `node_idx`.
pub const VERSION_PARTNODEIDX: i32 = 4;
/// Meta information arrays were added to the header.
pub const VERSION_META: i32 = 5;
/// Per-vertex and per-part channel tables were added.
pub const VERSION_GEOMETRYCHANNELS: i32 = 6;

/// Newest version this library reads and the only version it writes.
pub const VERSION: i32 = VERSION_GEOMETRYCHANNELS;
/// Oldest version this library still reads.
pub const VERSION_COMPAT: i32 = VERSION_MATERIAL;

/// Node graph reachable from `root_idx` is a tree, no node has two
/// parents. Required by transform propagation.
pub const FLAG_UNIQUENODES: u32 = 1 << 0;
/// Indices are triangle/line strips. Legacy, never written.
pub const FLAG_STRIPS: u32 = 1 << 1;
/// File carries one meta record per node.
pub const FLAG_META_NODE: u32 = 1 << 2;
/// File carries one meta record per geometry.
pub const FLAG_META_GEOMETRY: u32 = 1 << 3;
/// File carries a single file-level meta record.
pub const FLAG_META_FILE: u32 = 1 << 4;
/// Reserved: parts own per-part vertex sub-ranges. Never interpreted.
pub const FLAG_PERPART_VERTICES: u32 = 1 << 5;
/// Reserved: degenerate primitives were removed. Never interpreted.
pub const FLAG_NO_DEGENERATES: u32 = 1 << 6;

/// Header length for files of version >= [`VERSION_META`].
pub const HEADER_SIZE: usize = size_of::<FileHeader>();
/// Header length for older files, which end before the meta offsets.
pub const HEADER_SIZE_LEGACY: usize = std::mem::offset_of!(FileHeader, node_metas);

/// The on-disk file header. All `u64` fields except the first eight
/// 32-bit ones are byte offsets relative to the start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct FileHeader {
    pub magic: i32,
    pub version: i32,
    pub file_flags: u32,
    pub num_pointers: i32,
    pub num_geometries: i32,
    pub num_materials: i32,
    pub num_nodes: i32,
    pub root_idx: i32,
    pub pointers: u64,
    pub geometries: u64,
    pub materials: u64,
    pub nodes: u64,
    pub node_metas: u64,
    pub geometry_metas: u64,
    pub file_meta: u64,
}

/// Number of header bytes that are valid to read or write for a file of
/// the given version. Fields past that point must be treated as zero.
pub const fn header_size_for_version(version: i32) -> usize {
    if version >= VERSION_META {
        HEADER_SIZE
    } else {
        HEADER_SIZE_LEGACY
    }
}

impl FileHeader {
    /// Decodes a header from the leading bytes of a flattened file.
    ///
    /// Accepts any buffer of at least [`HEADER_SIZE_LEGACY`] bytes;
    /// fields the file's version never wrote are zero-filled.
    pub fn from_prefix(buf: &[u8]) -> CsfResult<Self> {
        if buf.len() < HEADER_SIZE_LEGACY {
            return Err(CsfError::Version);
        }
        let mut raw = [0u8; HEADER_SIZE];
        let take = buf.len().min(HEADER_SIZE);
        raw[..take].copy_from_slice(&buf[..take]);
        let mut header: FileHeader = bytemuck::pod_read_unaligned(&raw);
        header = header.to_le();
        if header.header_size() < HEADER_SIZE {
            header.node_metas = 0;
            header.geometry_metas = 0;
            header.file_meta = 0;
        }
        Ok(header)
    }

    pub fn to_le(&self) -> Self {
        Self {
            magic: self.magic.to_le(),
            version: self.version.to_le(),
            file_flags: self.file_flags.to_le(),
            num_pointers: self.num_pointers.to_le(),
            num_geometries: self.num_geometries.to_le(),
            num_materials: self.num_materials.to_le(),
            num_nodes: self.num_nodes.to_le(),
            root_idx: self.root_idx.to_le(),
            pointers: self.pointers.to_le(),
            geometries: self.geometries.to_le(),
            materials: self.materials.to_le(),
            nodes: self.nodes.to_le(),
            node_metas: self.node_metas.to_le(),
            geometry_metas: self.geometry_metas.to_le(),
            file_meta: self.file_meta.to_le(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn header_size(&self) -> usize {
        header_size_for_version(self.version)
    }

    pub fn validate_magic_version(&self) -> CsfResult<()> {
        if self.magic != MAGIC
            || self.version < VERSION_COMPAT
            || self.version > VERSION
        {
            return Err(CsfError::Version);
        }
        Ok(())
    }

    /// Minimum byte length of a file with this header: the maximum over
    /// all range ends the header declares. For a well-formed file the
    /// relocation table comes last, so this equals the exact file size.
    ///
    /// A header declaring negative counts or ranges whose ends
    /// overflow is unreadable and yields [`CsfError::Version`].
    pub fn required_size(&self) -> CsfResult<u64> {
        self.validate_magic_version()?;

        if self.num_pointers < 0
            || self.num_geometries < 0
            || self.num_materials < 0
            || self.num_nodes < 0
        {
            return Err(CsfError::Version);
        }
        let range_end = |offset: u64, elem: usize, count: i32| -> CsfResult<u64> {
            let total = (elem as u64)
                .checked_mul(count as u64)
                .ok_or(CsfError::Version)?;
            offset.checked_add(total).ok_or(CsfError::Version)
        };

        let mut size = self.header_size() as u64;
        size = size.max(range_end(self.pointers, 8, self.num_pointers)?);
        size = size.max(range_end(
            self.geometries,
            size_of::<GeometryRecord>(),
            self.num_geometries,
        )?);
        size = size.max(range_end(
            self.materials,
            size_of::<MaterialRecord>(),
            self.num_materials,
        )?);
        size = size.max(range_end(
            self.nodes,
            size_of::<NodeRecord>(),
            self.num_nodes,
        )?);

        if self.version >= VERSION_META {
            if self.node_metas != 0 {
                size = size.max(range_end(
                    self.node_metas,
                    size_of::<MetaRecord>(),
                    self.num_nodes,
                )?);
            }
            if self.geometry_metas != 0 {
                size = size.max(range_end(
                    self.geometry_metas,
                    size_of::<MetaRecord>(),
                    self.num_geometries,
                )?);
            }
            if self.file_meta != 0 {
                size = size.max(range_end(self.file_meta, size_of::<MetaRecord>(), 1)?);
            }
        }

        Ok(size)
    }
}
