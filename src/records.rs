//! Fixed-layout wire records. Byte-compatible with the original C
//! structs on 64-bit platforms; implicit padding is spelled out so every
//! record can be cast to and from raw bytes.

use bytemuck::{Pod, Zeroable};

pub const NAME_LEN: usize = 128;
pub const GUID_LEN: usize = 4;

pub type Guid = [u32; GUID_LEN];

/// GUID under which GLTF2 material descriptors are packed into a
/// material's byte payload by external importers.
pub const GUID_MATERIAL_GLTF2: Guid = [0, 0, 0, 2];

/// One drawable mesh definition. Offset fields are zero when the
/// corresponding array is absent.
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(Pod, Zeroable)]
#[repr(C)]
pub struct GeometryRecord {
    /// Legacy geometry-matrix region, retained for layout compatibility.
    /// Always written as zero.
    pub _deprecated: [f32; 4],
    pub num_normal_channels: u32,
    pub num_tex_channels: u32,
    pub num_aux_channels: u32,
    pub num_part_channels: u32,
    /// Offset of `num_aux_channels` i32 channel ordinals.
    pub aux_storage_order: u64,
    /// Offset of `4 * num_vertices * num_aux_channels` floats.
    pub aux: u64,
    /// Offset of `num_part_channels` i32 channel ordinals.
    pub perpart_storage_order: u64,
    /// Offset of the per-part channel block, sized per the storage order.
    pub perpart: u64,
    pub num_parts: i32,
    pub num_vertices: i32,
    pub num_index_solid: i32,
    pub num_index_wire: i32,
    /// Offset of `3 * num_vertices` floats.
    pub vertex: u64,
    /// Offset of `3 * num_vertices * num_normal_channels` floats.
    pub normal: u64,
    /// Offset of `2 * num_vertices * num_tex_channels` floats.
    pub tex: u64,
    pub index_solid: u64,
    pub index_wire: u64,
    pub parts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(Pod, Zeroable)]
#[repr(C)]
pub struct MaterialRecord {
    pub name: [u8; NAME_LEN],
    pub color: [f32; 4],
    pub material_type: i32,
    pub num_bytes: u32,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(Pod, Zeroable)]
#[repr(C)]
pub struct NodeRecord {
    pub object_tm: [f32; 16],
    pub world_tm: [f32; 16],
    pub geometry_idx: i32,
    pub num_parts: i32,
    pub num_children: i32,
    pub _pad: u32,
    pub parts: u64,
    pub children: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(Pod, Zeroable)]
#[repr(C)]
pub struct MetaRecord {
    pub name: [u8; NAME_LEN],
    pub flags: i32,
    pub _pad: u32,
    pub num_bytes: u64,
    pub bytes: u64,
}

/// Defines the state of the corresponding geometry part on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Pod, Zeroable)]
#[repr(C)]
pub struct NodePartRecord {
    pub active: i32,
    pub material_idx: i32,
    /// Index of a child node driving this part's transform, or -1 to use
    /// the owning node's matrix.
    pub node_idx: i32,
}

/// A sub-range of the owning geometry's index buffers. Part ranges are
/// stored back to back; the start of part i is the sum of the counts of
/// parts 0..i.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Pod, Zeroable)]
#[repr(C)]
pub struct GeometryPartRecord {
    /// Legacy per-part field, retained for layout compatibility.
    pub _deprecated: i32,
    pub num_index_solid: i32,
    pub num_index_wire: i32,
}

/// Self-describing record header used to pack extension data into the
/// opaque byte blobs of materials and metas. `num_bytes` includes the
/// size of this header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Pod, Zeroable)]
#[repr(C)]
pub struct BytePacket {
    pub guid: Guid,
    pub num_bytes: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(Pod, Zeroable)]
#[repr(C)]
pub struct GeometryPartBbox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// Vertex aux channels are identified by i32 ordinals stored in the
/// geometry's `aux_storage_order` table.
pub const AUXCHANNEL_RADIANCE: i32 = 0;

/// Per-part channels, identified by the i32 ordinals stored in
/// `perpart_storage_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PartChannel {
    Bbox = 0,
}

impl PartChannel {
    /// Returns the byte size of one element of the channel.
    pub const fn size(self) -> usize {
        match self {
            PartChannel::Bbox => std::mem::size_of::<GeometryPartBbox>(),
        }
    }

    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(PartChannel::Bbox),
            _ => None,
        }
    }
}

/// Byte size of one element of a part channel given its stored ordinal.
/// Unknown ordinals size to zero and their data is skipped.
pub const fn part_channel_size(raw: i32) -> usize {
    match PartChannel::from_raw(raw) {
        Some(channel) => channel.size(),
        None => 0,
    }
}

/// Encodes a name into the fixed-size field used on the wire,
/// truncating to [`NAME_LEN`] - 1 bytes and NUL-padding the rest.
pub fn encode_name(name: &str) -> [u8; NAME_LEN] {
    let mut out = [0u8; NAME_LEN];
    let mut take = name.len().min(NAME_LEN - 1);
    while !name.is_char_boundary(take) {
        take -= 1;
    }
    out[..take].copy_from_slice(&name.as_bytes()[..take]);
    out
}

/// Decodes a fixed-size name field, stopping at the first NUL.
pub fn decode_name(raw: &[u8; NAME_LEN]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
