//! Owned scene model.
//!
//! [`Scene`] and its parts own plain `Vec`s and `String`s, so they can
//! be built, edited, cloned, and sent across threads freely. Array
//! sizes that the wire format stores as explicit counts are derived
//! from the vector lengths here, which makes inconsistent counts
//! unrepresentable.

use crate::header::FLAG_UNIQUENODES;
use crate::records::{part_channel_size, BytePacket, GeometryPartBbox, Guid};
use crate::{CsfError, CsfResult};

/// Column-major identity transform.
pub const IDENTITY_TM: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// `object * parent` for column-major 4x4 matrices.
fn mat44_mul(object: &[f32; 16], parent: &[f32; 16]) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    for i in 0..4 {
        for j in 0..4 {
            let mut acc = 0.0;
            for k in 0..4 {
                acc += object[i * 4 + k] * parent[k * 4 + j];
            }
            out[i * 4 + j] = acc;
        }
    }
    out
}

/// A sub-range of the owning geometry's index buffers. Part ranges are
/// stored back to back in part order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryPart {
    pub num_index_solid: i32,
    pub num_index_wire: i32,
}

/// One drawable mesh. Vertex channels are flat float arrays laid out
/// channel after channel; per-part channels are raw bytes in the order
/// given by `perpart_storage_order`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    /// `3 * num_vertices` positions.
    pub vertex: Vec<f32>,
    /// `3 * num_vertices` floats per normal channel.
    pub normal: Vec<f32>,
    /// `2 * num_vertices` floats per texture channel.
    pub tex: Vec<f32>,
    /// `4 * num_vertices` floats per auxiliary channel.
    pub aux: Vec<f32>,
    /// Ordinal of each auxiliary channel, in storage order.
    pub aux_storage_order: Vec<i32>,
    pub index_solid: Vec<u32>,
    pub index_wire: Vec<u32>,
    pub parts: Vec<GeometryPart>,
    /// Ordinal of each per-part channel, in storage order.
    pub perpart_storage_order: Vec<i32>,
    pub perpart: Vec<u8>,
}

impl Geometry {
    pub fn num_vertices(&self) -> usize {
        self.vertex.len() / 3
    }

    pub fn num_normal_channels(&self) -> usize {
        let per = 3 * self.num_vertices();
        if per == 0 { 0 } else { self.normal.len() / per }
    }

    pub fn num_tex_channels(&self) -> usize {
        let per = 2 * self.num_vertices();
        if per == 0 { 0 } else { self.tex.len() / per }
    }

    pub fn num_aux_channels(&self) -> usize {
        self.aux_storage_order.len()
    }

    pub fn num_part_channels(&self) -> usize {
        self.perpart_storage_order.len()
    }

    pub fn normal_channel(&self, channel: u32) -> Option<&[f32]> {
        let per = 3 * self.num_vertices();
        let start = per.checked_mul(channel as usize)?;
        if per == 0 {
            return None;
        }
        self.normal.get(start..start + per)
    }

    pub fn tex_channel(&self, channel: u32) -> Option<&[f32]> {
        let per = 2 * self.num_vertices();
        let start = per.checked_mul(channel as usize)?;
        if per == 0 {
            return None;
        }
        self.tex.get(start..start + per)
    }

    /// Looks up an auxiliary channel by its stored ordinal.
    pub fn aux_channel(&self, ordinal: i32) -> Option<&[f32]> {
        let slot = self.aux_storage_order.iter().position(|&c| c == ordinal)?;
        let per = 4 * self.num_vertices();
        self.aux.get(slot * per..(slot + 1) * per)
    }

    /// Adds an auxiliary channel filled with zeros if it is not present
    /// yet. Returns the storage slot of the channel.
    pub fn require_aux_channel(&mut self, ordinal: i32) -> usize {
        if let Some(slot) = self.aux_storage_order.iter().position(|&c| c == ordinal) {
            return slot;
        }
        self.aux_storage_order.push(ordinal);
        self.aux.resize(self.aux.len() + 4 * self.num_vertices(), 0.0);
        self.aux_storage_order.len() - 1
    }

    /// Total byte size of the per-part block for `num_parts` parts and
    /// the current channel set.
    pub fn perpart_required_size(&self, num_parts: usize) -> usize {
        let stride: usize = self
            .perpart_storage_order
            .iter()
            .map(|&c| part_channel_size(c))
            .sum();
        stride * num_parts
    }

    pub fn perpart_size(&self) -> usize {
        self.perpart_required_size(self.parts.len())
    }

    fn part_channel_range(&self, ordinal: i32) -> Option<(usize, usize)> {
        let mut start = 0;
        for &c in &self.perpart_storage_order {
            let len = part_channel_size(c) * self.parts.len();
            if c == ordinal {
                return Some((start, len));
            }
            start += len;
        }
        None
    }

    /// Raw bytes of one per-part channel, `part_channel_size(ordinal)`
    /// bytes per part.
    pub fn part_channel(&self, ordinal: i32) -> Option<&[u8]> {
        let (start, len) = self.part_channel_range(ordinal)?;
        self.perpart.get(start..start + len)
    }

    pub fn part_channel_mut(&mut self, ordinal: i32) -> Option<&mut [u8]> {
        let (start, len) = self.part_channel_range(ordinal)?;
        self.perpart.get_mut(start..start + len)
    }

    /// Decoded bounding boxes, one per part, if the channel is present.
    pub fn part_bboxes(&self) -> Option<Vec<GeometryPartBbox>> {
        let bytes = self.part_channel(crate::records::PartChannel::Bbox as i32)?;
        Some(bytemuck::pod_collect_to_vec(bytes))
    }

    /// Ensures all listed per-part channels exist, appending missing
    /// ones zero-filled.
    pub fn require_part_channels(&mut self, ordinals: &[i32]) {
        for &ordinal in ordinals {
            if self.perpart_storage_order.contains(&ordinal) {
                continue;
            }
            self.perpart_storage_order.push(ordinal);
            let grow = part_channel_size(ordinal) * self.parts.len();
            self.perpart.resize(self.perpart.len() + grow, 0);
        }
    }

    /// Drops the listed per-part channels, compacting the block.
    pub fn remove_part_channels(&mut self, ordinals: &[i32]) {
        let mut kept_order = Vec::with_capacity(self.perpart_storage_order.len());
        let mut kept = Vec::with_capacity(self.perpart.len());
        let mut start = 0;
        for &c in &self.perpart_storage_order {
            let len = part_channel_size(c) * self.parts.len();
            if !ordinals.contains(&c) {
                kept_order.push(c);
                if let Some(chunk) = self.perpart.get(start..start + len) {
                    kept.extend_from_slice(chunk);
                }
            }
            start += len;
        }
        self.perpart_storage_order = kept_order;
        self.perpart = kept;
    }

    /// First solid index of part `idx`, as an offset into `index_solid`.
    pub fn part_solid_offset(&self, idx: usize) -> usize {
        self.parts[..idx]
            .iter()
            .map(|p| p.num_index_solid.max(0) as usize)
            .sum()
    }

    /// First wireframe index of part `idx`, as an offset into
    /// `index_wire`.
    pub fn part_wire_offset(&self, idx: usize) -> usize {
        self.parts[..idx]
            .iter()
            .map(|p| p.num_index_wire.max(0) as usize)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: [f32; 4],
    pub material_type: i32,
    /// Opaque extension payload, usually a sequence of byte packets.
    pub bytes: Vec<u8>,
}

impl Material {
    pub fn find_byte_packet(&self, guid: &Guid) -> Option<BytePacketRef<'_>> {
        find_byte_packet(&self.bytes, guid)
    }
}

/// Defines the state of the corresponding geometry part on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePart {
    pub active: i32,
    pub material_idx: i32,
    /// Child node driving this part's transform, or -1 for the owning
    /// node's matrix.
    pub node_idx: i32,
}

impl Default for NodePart {
    fn default() -> Self {
        Self { active: 1, material_idx: -1, node_idx: -1 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub object_tm: [f32; 16],
    pub world_tm: [f32; 16],
    /// Geometry drawn by this node, or -1 for a grouping node.
    pub geometry_idx: i32,
    /// One entry per part of the referenced geometry; empty when
    /// `geometry_idx` is -1.
    pub parts: Vec<NodePart>,
    pub children: Vec<i32>,
}

impl Node {
    pub fn identity() -> Self {
        Self {
            object_tm: IDENTITY_TM,
            world_tm: IDENTITY_TM,
            geometry_idx: -1,
            parts: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Named blob of side-band data attached to a node, a geometry, or the
/// file as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub name: String,
    pub flags: i32,
    pub bytes: Vec<u8>,
}

impl Meta {
    pub fn find_byte_packet(&self, guid: &Guid) -> Option<BytePacketRef<'_>> {
        find_byte_packet(&self.bytes, guid)
    }

    /// Stores a packet under `guid`, overwriting an existing packet of
    /// the same payload size in place, or re-appending it otherwise.
    pub fn set_or_add_byte_packet(&mut self, guid: &Guid, payload: &[u8]) {
        let header = std::mem::size_of::<BytePacket>();
        if let Some((start, num_bytes)) = packet_position(&self.bytes, guid) {
            if num_bytes == header + payload.len() {
                self.bytes[start + header..start + num_bytes].copy_from_slice(payload);
                return;
            }
            self.bytes.drain(start..start + num_bytes);
        }
        let packet = BytePacket {
            guid: *guid,
            num_bytes: (header + payload.len()) as i32,
        };
        self.bytes.extend_from_slice(bytemuck::bytes_of(&packet));
        self.bytes.extend_from_slice(payload);
    }
}

/// A packet found inside an opaque byte blob. `num_bytes` is the full
/// packet size including its header, matching the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytePacketRef<'a> {
    pub guid: Guid,
    pub num_bytes: i32,
    pub payload: &'a [u8],
}

fn packet_position(bytes: &[u8], guid: &Guid) -> Option<(usize, usize)> {
    let header = std::mem::size_of::<BytePacket>();
    let mut pos = 0;
    while pos + header <= bytes.len() {
        let packet: BytePacket = bytemuck::pod_read_unaligned(&bytes[pos..pos + header]);
        let num_bytes = usize::try_from(packet.num_bytes).ok()?;
        // A size smaller than the header or past the blob end means the
        // packet stream is not walkable any further.
        if num_bytes < header || num_bytes > bytes.len() - pos {
            return None;
        }
        if packet.guid == *guid {
            return Some((pos, num_bytes));
        }
        pos += num_bytes;
    }
    None
}

/// Scans a byte blob for the packet stored under `guid`.
pub fn find_byte_packet<'a>(bytes: &'a [u8], guid: &Guid) -> Option<BytePacketRef<'a>> {
    let header = std::mem::size_of::<BytePacket>();
    let (start, num_bytes) = packet_position(bytes, guid)?;
    Some(BytePacketRef {
        guid: *guid,
        num_bytes: num_bytes as i32,
        payload: &bytes[start + header..start + num_bytes],
    })
}

/// A complete scene: geometry and material pools plus the node graph
/// that instances them.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub file_flags: u32,
    /// Root of the node tree, or -1 when the file carries no hierarchy.
    pub root_idx: i32,
    pub geometries: Vec<Geometry>,
    pub materials: Vec<Material>,
    pub nodes: Vec<Node>,
    /// Present iff the node meta flag is set; one entry per node.
    pub node_metas: Option<Vec<Meta>>,
    /// Present iff the geometry meta flag is set; one entry per
    /// geometry.
    pub geometry_metas: Option<Vec<Meta>>,
    pub file_meta: Option<Meta>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            file_flags: FLAG_UNIQUENODES,
            root_idx: -1,
            geometries: Vec::new(),
            materials: Vec::new(),
            nodes: Vec::new(),
            node_metas: None,
            geometry_metas: None,
            file_meta: None,
        }
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> i32 {
        self.geometries.push(geometry);
        (self.geometries.len() - 1) as i32
    }

    pub fn add_material(&mut self, material: Material) -> i32 {
        self.materials.push(material);
        (self.materials.len() - 1) as i32
    }

    pub fn add_node(&mut self, node: Node) -> i32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as i32
    }

    pub fn file_byte_packet(&self, guid: &Guid) -> Option<BytePacketRef<'_>> {
        self.file_meta.as_ref()?.find_byte_packet(guid)
    }

    pub fn material_byte_packet(
        &self,
        material_idx: i32,
        guid: &Guid,
    ) -> Option<BytePacketRef<'_>> {
        let material = self.materials.get(usize::try_from(material_idx).ok()?)?;
        material.find_byte_packet(guid)
    }

    /// Recomputes every reachable node's `world_tm` from its `object_tm`
    /// and its parent's world transform, walking the tree from
    /// `root_idx`.
    ///
    /// Requires the unique-nodes flag; without it a node may have
    /// several parents and no single world transform exists; that case
    /// fails before any transform is modified. A negative root is a
    /// no-op.
    pub fn propagate_transforms(&mut self) -> CsfResult<()> {
        if self.root_idx < 0 {
            return Ok(());
        }
        if self.file_flags & FLAG_UNIQUENODES == 0 {
            return Err(CsfError::Operation);
        }
        let root = self.root_idx as usize;
        if root >= self.nodes.len() {
            return Err(CsfError::Invalid);
        }

        // Guards against index cycles in damaged files; a well-formed
        // unique-nodes graph visits every node at most once.
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        visited[root] = true;
        self.nodes[root].world_tm = self.nodes[root].object_tm;

        while let Some(idx) = stack.pop() {
            let parent_world = self.nodes[idx].world_tm;
            for j in 0..self.nodes[idx].children.len() {
                let child = self.nodes[idx].children[j];
                let child = usize::try_from(child).map_err(|_| CsfError::Invalid)?;
                if child >= self.nodes.len() || visited[child] {
                    return Err(CsfError::Invalid);
                }
                visited[child] = true;
                self.nodes[child].world_tm =
                    mat44_mul(&self.nodes[child].object_tm, &parent_world);
                stack.push(child);
            }
        }
        Ok(())
    }
}
