//! Borrowed view over a flattened file image.
//!
//! [`RawFile`] never mutates the buffer it wraps. Offsets stay
//! file-relative and every access resolves them on the fly, so the same
//! buffer can back any number of views and can live in read-only or
//! shared memory. Reads tolerate unaligned offsets.

use std::mem::{offset_of, size_of};

use bytemuck::Pod;

use crate::header::{
    FileHeader, FLAG_META_FILE, FLAG_META_GEOMETRY, FLAG_META_NODE, FLAG_UNIQUENODES,
    VERSION_FILEFLAGS, VERSION_GEOMETRYCHANNELS, VERSION_META,
};
use crate::read::LoadSettings;
use crate::records::{
    part_channel_size, GeometryPartRecord, GeometryRecord, MaterialRecord, MetaRecord,
    NodePartRecord, NodeRecord,
};
use crate::{CsfError, CsfResult};

/// First header field that holds a resolvable offset. Relocation table
/// entries below this point into the fixed part of the header and are
/// rejected.
const FIRST_SLOT: u64 = offset_of!(FileHeader, geometries) as u64;

/// A decoded file header over the buffer it was read from.
///
/// Construction checks the magic, version range, and that the declared
/// ranges exactly account for the buffer length. With validation
/// enabled (the default) every relocation-table entry and every range
/// reachable from the records is bounds-checked as well, so the typed
/// accessors cannot read out of bounds afterwards.
pub struct RawFile<'a> {
    buf: &'a [u8],
    header: FileHeader,
}

impl<'a> RawFile<'a> {
    pub fn new(buf: &'a [u8]) -> CsfResult<Self> {
        Self::with_settings(buf, &LoadSettings::default())
    }

    pub fn with_settings(buf: &'a [u8], settings: &LoadSettings) -> CsfResult<Self> {
        let mut header = FileHeader::from_prefix(buf)?;
        header.validate_magic_version()?;
        // Before VERSION_FILEFLAGS the flags field was a plain boolean
        // marking unique node usage.
        if header.version < VERSION_FILEFLAGS {
            header.file_flags = if header.file_flags != 0 {
                FLAG_UNIQUENODES
            } else {
                0
            };
        }
        if header.required_size()? != buf.len() as u64 {
            return Err(CsfError::Version);
        }

        let file = Self { buf, header };
        if settings.validate {
            file.validate_pointer_table()?;
            file.validate_ranges()?;
        }
        Ok(file)
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn data(&self) -> &'a [u8] {
        self.buf
    }

    /// Resolves a file-relative byte range. A zero length resolves to
    /// the empty slice regardless of offset; a zero offset with a
    /// nonzero length marks an absent array that is required.
    pub fn bytes_at(&self, offset: u64, len: u64) -> CsfResult<&'a [u8]> {
        if len == 0 {
            return Ok(&[]);
        }
        if offset == 0 {
            return Err(CsfError::Invalid);
        }
        let start = usize::try_from(offset).map_err(|_| CsfError::Invalid)?;
        let len = usize::try_from(len).map_err(|_| CsfError::Invalid)?;
        let end = start.checked_add(len).ok_or(CsfError::Invalid)?;
        self.buf.get(start..end).ok_or(CsfError::Invalid)
    }

    /// Copies `count` records of `T` out of the buffer. The copy
    /// tolerates any source alignment.
    pub fn pod_vec_at<T: Pod>(&self, offset: u64, count: usize) -> CsfResult<Vec<T>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let total = (size_of::<T>() as u64)
            .checked_mul(count as u64)
            .ok_or(CsfError::Invalid)?;
        let bytes = self.bytes_at(offset, total)?;
        Ok(bytemuck::pod_collect_to_vec(bytes))
    }

    fn record_at<T: Pod>(&self, base: u64, idx: i32, count: i32) -> CsfResult<T> {
        if idx < 0 || idx >= count {
            return Err(CsfError::Invalid);
        }
        let offset = base
            .checked_add(size_of::<T>() as u64 * idx as u64)
            .ok_or(CsfError::Invalid)?;
        let bytes = self.bytes_at(offset, size_of::<T>() as u64)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn geometry(&self, idx: i32) -> CsfResult<GeometryRecord> {
        self.record_at(self.header.geometries, idx, self.header.num_geometries)
    }

    pub fn material(&self, idx: i32) -> CsfResult<MaterialRecord> {
        self.record_at(self.header.materials, idx, self.header.num_materials)
    }

    pub fn node(&self, idx: i32) -> CsfResult<NodeRecord> {
        self.record_at(self.header.nodes, idx, self.header.num_nodes)
    }

    pub fn node_meta(&self, idx: i32) -> CsfResult<Option<MetaRecord>> {
        if self.header.version < VERSION_META
            || self.header.file_flags & FLAG_META_NODE == 0
            || self.header.node_metas == 0
        {
            return Ok(None);
        }
        self.record_at(self.header.node_metas, idx, self.header.num_nodes)
            .map(Some)
    }

    pub fn geometry_meta(&self, idx: i32) -> CsfResult<Option<MetaRecord>> {
        if self.header.version < VERSION_META
            || self.header.file_flags & FLAG_META_GEOMETRY == 0
            || self.header.geometry_metas == 0
        {
            return Ok(None);
        }
        self.record_at(self.header.geometry_metas, idx, self.header.num_geometries)
            .map(Some)
    }

    pub fn file_meta(&self) -> CsfResult<Option<MetaRecord>> {
        if self.header.version < VERSION_META
            || self.header.file_flags & FLAG_META_FILE == 0
            || self.header.file_meta == 0
        {
            return Ok(None);
        }
        self.record_at(self.header.file_meta, 0, 1).map(Some)
    }

    /// Effective counts for the per-vertex channel tables. Files older
    /// than VERSION_GEOMETRYCHANNELS stored other data where the counts
    /// now live, so presence of the offsets decides, and the auxiliary
    /// tables do not exist at all.
    pub fn channel_counts(&self, geo: &GeometryRecord) -> (u32, u32, u32, u32) {
        if self.header.version >= VERSION_GEOMETRYCHANNELS {
            (
                geo.num_normal_channels,
                geo.num_tex_channels,
                geo.num_aux_channels,
                geo.num_part_channels,
            )
        } else {
            (
                (geo.normal != 0) as u32,
                (geo.tex != 0) as u32,
                0,
                0,
            )
        }
    }

    /// Every relocation entry must name an 8-aligned slot past the
    /// fixed header fields with room for a full offset behind it.
    fn validate_pointer_table(&self) -> CsfResult<()> {
        let count = self.header.num_pointers as u64;
        if count == 0 {
            return Ok(());
        }
        if self.header.pointers % 8 != 0 {
            return Err(CsfError::Invalid);
        }
        let table = self.bytes_at(self.header.pointers, count * 8)?;
        let len = self.buf.len() as u64;
        for entry in table.chunks_exact(8) {
            let slot = u64::from_le_bytes(entry.try_into().map_err(|_| CsfError::Invalid)?);
            let end = slot.checked_add(8).ok_or(CsfError::Invalid)?;
            if slot < FIRST_SLOT || slot % 8 != 0 || end > len {
                return Err(CsfError::Invalid);
            }
        }
        Ok(())
    }

    /// An absent array has a zero offset; anything else must lie after
    /// the header, be aligned, and fit in the buffer.
    fn check_range(&self, offset: u64, elem: usize, count: i64, align: u64) -> CsfResult<()> {
        if count < 0 {
            return Err(CsfError::Invalid);
        }
        let total = (elem as u64)
            .checked_mul(count as u64)
            .ok_or(CsfError::Invalid)?;
        if total == 0 {
            return Ok(());
        }
        if offset == 0
            || offset < self.header.header_size() as u64
            || offset % align != 0
        {
            return Err(CsfError::Invalid);
        }
        let end = offset.checked_add(total).ok_or(CsfError::Invalid)?;
        if end > self.buf.len() as u64 {
            return Err(CsfError::Invalid);
        }
        Ok(())
    }

    fn validate_ranges(&self) -> CsfResult<()> {
        let h = &self.header;

        if h.root_idx >= h.num_nodes {
            return Err(CsfError::Invalid);
        }

        // Record arrays hold offset slots, so they need the stricter
        // alignment the relocation check assumes.
        self.check_range(h.geometries, size_of::<GeometryRecord>(), h.num_geometries as i64, 8)?;
        self.check_range(h.materials, size_of::<MaterialRecord>(), h.num_materials as i64, 8)?;
        self.check_range(h.nodes, size_of::<NodeRecord>(), h.num_nodes as i64, 8)?;

        for i in 0..h.num_geometries {
            self.validate_geometry(&self.geometry(i)?)?;
        }
        for i in 0..h.num_materials {
            let mat = self.material(i)?;
            self.check_range(mat.bytes, 1, mat.num_bytes as i64, 4)?;
        }
        for i in 0..h.num_nodes {
            self.validate_node(&self.node(i)?)?;
        }

        if h.version >= VERSION_META {
            if h.file_flags & FLAG_META_NODE != 0 {
                self.check_range(h.node_metas, size_of::<MetaRecord>(), h.num_nodes as i64, 8)?;
                for i in 0..h.num_nodes {
                    if let Some(meta) = self.node_meta(i)? {
                        self.validate_meta(&meta)?;
                    }
                }
            }
            if h.file_flags & FLAG_META_GEOMETRY != 0 {
                self.check_range(
                    h.geometry_metas,
                    size_of::<MetaRecord>(),
                    h.num_geometries as i64,
                    8,
                )?;
                for i in 0..h.num_geometries {
                    if let Some(meta) = self.geometry_meta(i)? {
                        self.validate_meta(&meta)?;
                    }
                }
            }
            if h.file_flags & FLAG_META_FILE != 0 {
                self.check_range(h.file_meta, size_of::<MetaRecord>(), 1, 8)?;
                if let Some(meta) = self.file_meta()? {
                    self.validate_meta(&meta)?;
                }
            }
        }
        Ok(())
    }

    fn validate_geometry(&self, geo: &GeometryRecord) -> CsfResult<()> {
        if geo.num_parts < 0
            || geo.num_vertices < 0
            || geo.num_index_solid < 0
            || geo.num_index_wire < 0
        {
            return Err(CsfError::Invalid);
        }
        let nv = geo.num_vertices as i64;
        let (normals, texs, auxs, parts_ch) = self.channel_counts(geo);
        // Channel counts come straight off the file, so products must
        // not overflow.
        let floats = |per: i64, channels: u32| -> CsfResult<i64> {
            per.checked_mul(nv)
                .and_then(|n| n.checked_mul(channels as i64))
                .ok_or(CsfError::Invalid)
        };

        self.check_range(geo.vertex, size_of::<f32>(), 3 * nv, 4)?;
        self.check_range(geo.normal, size_of::<f32>(), floats(3, normals)?, 4)?;
        self.check_range(geo.tex, size_of::<f32>(), floats(2, texs)?, 4)?;
        self.check_range(geo.index_solid, size_of::<u32>(), geo.num_index_solid as i64, 4)?;
        self.check_range(geo.index_wire, size_of::<u32>(), geo.num_index_wire as i64, 4)?;
        self.check_range(
            geo.parts,
            size_of::<GeometryPartRecord>(),
            geo.num_parts as i64,
            4,
        )?;

        if self.header.version >= VERSION_GEOMETRYCHANNELS {
            self.check_range(geo.aux_storage_order, size_of::<i32>(), auxs as i64, 4)?;
            self.check_range(geo.aux, size_of::<f32>(), floats(4, auxs)?, 4)?;
            self.check_range(
                geo.perpart_storage_order,
                size_of::<i32>(),
                parts_ch as i64,
                4,
            )?;
            let order: Vec<i32> =
                self.pod_vec_at(geo.perpart_storage_order, parts_ch as usize)?;
            let stride: u64 = order.iter().map(|&c| part_channel_size(c) as u64).sum();
            let perpart_bytes = stride
                .checked_mul(geo.num_parts as u64)
                .and_then(|n| i64::try_from(n).ok())
                .ok_or(CsfError::Invalid)?;
            self.check_range(geo.perpart, 1, perpart_bytes, 4)?;
        }
        Ok(())
    }

    fn validate_node(&self, node: &NodeRecord) -> CsfResult<()> {
        if node.num_parts < 0 || node.num_children < 0 {
            return Err(CsfError::Invalid);
        }
        if node.geometry_idx >= self.header.num_geometries {
            return Err(CsfError::Invalid);
        }
        if node.geometry_idx >= 0 {
            let geo = self.geometry(node.geometry_idx)?;
            if node.num_parts != geo.num_parts {
                return Err(CsfError::Invalid);
            }
            self.check_range(
                node.parts,
                size_of::<NodePartRecord>(),
                node.num_parts as i64,
                4,
            )?;
        }
        self.check_range(node.children, size_of::<i32>(), node.num_children as i64, 4)?;
        let children: Vec<i32> = self.pod_vec_at(node.children, node.num_children as usize)?;
        for child in children {
            if child < 0 || child >= self.header.num_nodes {
                return Err(CsfError::Invalid);
            }
        }
        Ok(())
    }

    fn validate_meta(&self, meta: &MetaRecord) -> CsfResult<()> {
        let count = i64::try_from(meta.num_bytes).map_err(|_| CsfError::Invalid)?;
        self.check_range(meta.bytes, 1, count, 4)
    }
}
