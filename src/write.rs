//! Save pipeline. Serialization runs in two passes over one stream:
//! arrays are written in canonical order with their offset slots
//! zeroed, every stored array records which slot refers to it, and a
//! final pass patches the slots and appends the relocation table.

use std::fs::File;
use std::io::{BufWriter, Cursor, SeekFrom, Write};
use std::mem::{offset_of, size_of};
use std::path::Path;

use crate::header::{
    FileHeader, FLAG_META_FILE, FLAG_META_GEOMETRY, FLAG_META_NODE, HEADER_SIZE, MAGIC, VERSION,
};
use crate::io::WriteSeek;
use crate::records::{
    encode_name, GeometryPartRecord, GeometryRecord, MaterialRecord, MetaRecord, NodePartRecord,
    NodeRecord,
};
use crate::scene::{Geometry, Meta, Scene};
use crate::{CsfError, CsfResult};

/// Byte blobs of meta records keep a generous alignment so consumers
/// can map typed packets straight out of a loaded image.
const META_ALIGN: u64 = 16;
/// The per-part channel block is aligned for SIMD consumers.
const PERPART_ALIGN: u64 = 16;

#[derive(Clone, Copy)]
struct TableEntry {
    /// Where the array landed in the file.
    offset: u64,
    /// File position of the u64 slot referring to it.
    location: u64,
}

/// Forward-only writer that remembers, for every stored array, the
/// offset slot that must end up pointing at it.
struct OffsetTable<'w> {
    write: &'w mut dyn WriteSeek,
    entries: Vec<TableEntry>,
    cursor: u64,
}

impl<'w> OffsetTable<'w> {
    fn new(write: &'w mut dyn WriteSeek, cursor: u64) -> Self {
        Self {
            write,
            entries: Vec::new(),
            cursor,
        }
    }

    fn align(&mut self, align: u64) -> CsfResult<()> {
        const ZERO: [u8; 16] = [0; 16];
        let mut pad = (align - self.cursor % align) % align;
        self.cursor += pad;
        while pad > 0 {
            let n = pad.min(ZERO.len() as u64) as usize;
            self.write.write_all(&ZERO[..n])?;
            pad -= n as u64;
        }
        Ok(())
    }

    /// Stores an array and records the slot at `location` for patching.
    /// Alignment never drops below 4.
    fn store_slot(&mut self, data: &[u8], align: u64, location: u64) -> CsfResult<u64> {
        self.align(align.max(4))?;
        let offset = self.cursor;
        self.entries.push(TableEntry { offset, location });
        self.write.write_all(data)?;
        self.cursor += data.len() as u64;
        Ok(offset)
    }

    /// Appends the relocation table, then patches every recorded slot
    /// and the header fields describing the table.
    fn finalize(mut self) -> CsfResult<()> {
        self.align(8)?;
        let table_offset = self.cursor;
        let count = i32::try_from(self.entries.len()).map_err(|_| CsfError::Operation)?;
        for entry in &self.entries {
            self.write.write_all(&entry.location.to_le_bytes())?;
        }
        for entry in &self.entries {
            self.write.seek(SeekFrom::Start(entry.location))?;
            self.write.write_all(&entry.offset.to_le_bytes())?;
        }
        self.write
            .seek(SeekFrom::Start(offset_of!(FileHeader, num_pointers) as u64))?;
        self.write.write_all(&count.to_le_bytes())?;
        self.write
            .seek(SeekFrom::Start(offset_of!(FileHeader, pointers) as u64))?;
        self.write.write_all(&table_offset.to_le_bytes())?;
        self.write.flush()?;
        Ok(())
    }
}

/// Serializes a [`Scene`] into the current file version.
pub struct SceneWriter<'s> {
    scene: &'s Scene,
}

impl<'s> SceneWriter<'s> {
    pub fn new(scene: &'s Scene) -> Self {
        Self { scene }
    }

    pub fn write_to(&self, write: &mut dyn WriteSeek) -> CsfResult<()> {
        check_consistent(self.scene)?;
        let scene = self.scene;

        let mut flags =
            scene.file_flags & !(FLAG_META_NODE | FLAG_META_GEOMETRY | FLAG_META_FILE);
        if scene.node_metas.is_some() {
            flags |= FLAG_META_NODE;
        }
        if scene.geometry_metas.is_some() {
            flags |= FLAG_META_GEOMETRY;
        }
        if scene.file_meta.is_some() {
            flags |= FLAG_META_FILE;
        }

        let header = FileHeader {
            magic: MAGIC,
            version: VERSION,
            file_flags: flags,
            num_pointers: 0,
            num_geometries: count_i32(scene.geometries.len())?,
            num_materials: count_i32(scene.materials.len())?,
            num_nodes: count_i32(scene.nodes.len())?,
            root_idx: scene.root_idx,
            pointers: 0,
            geometries: 0,
            materials: 0,
            nodes: 0,
            node_metas: 0,
            geometry_metas: 0,
            file_meta: 0,
        };
        let header = header.to_le();
        write.seek(SeekFrom::Start(0))?;
        write.write_all(header.as_bytes())?;

        let mut table = OffsetTable::new(write, HEADER_SIZE as u64);
        self.store_geometries(&mut table)?;
        self.store_materials(&mut table)?;
        self.store_nodes(&mut table)?;
        if let Some(metas) = &scene.node_metas {
            store_meta_array(&mut table, metas, offset_of!(FileHeader, node_metas) as u64)?;
        }
        if let Some(metas) = &scene.geometry_metas {
            store_meta_array(
                &mut table,
                metas,
                offset_of!(FileHeader, geometry_metas) as u64,
            )?;
        }
        if let Some(meta) = &scene.file_meta {
            store_meta_array(
                &mut table,
                std::slice::from_ref(meta),
                offset_of!(FileHeader, file_meta) as u64,
            )?;
        }
        table.finalize()
    }

    fn store_geometries(&self, table: &mut OffsetTable<'_>) -> CsfResult<()> {
        let records: Vec<GeometryRecord> = self
            .scene
            .geometries
            .iter()
            .map(encode_geometry)
            .collect::<CsfResult<_>>()?;
        let base = table.store_slot(
            bytemuck::cast_slice(&records),
            8,
            offset_of!(FileHeader, geometries) as u64,
        )?;

        let record_size = size_of::<GeometryRecord>() as u64;
        for (i, geo) in self.scene.geometries.iter().enumerate() {
            let slot = |field| base + i as u64 * record_size + field as u64;
            if !geo.vertex.is_empty() {
                table.store_slot(
                    bytemuck::cast_slice(&geo.vertex),
                    4,
                    slot(offset_of!(GeometryRecord, vertex)),
                )?;
            }
            if !geo.normal.is_empty() {
                table.store_slot(
                    bytemuck::cast_slice(&geo.normal),
                    4,
                    slot(offset_of!(GeometryRecord, normal)),
                )?;
            }
            if !geo.tex.is_empty() {
                table.store_slot(
                    bytemuck::cast_slice(&geo.tex),
                    4,
                    slot(offset_of!(GeometryRecord, tex)),
                )?;
            }
            if !geo.aux.is_empty() {
                table.store_slot(
                    bytemuck::cast_slice(&geo.aux),
                    4,
                    slot(offset_of!(GeometryRecord, aux)),
                )?;
            }
            if !geo.aux_storage_order.is_empty() {
                table.store_slot(
                    bytemuck::cast_slice(&geo.aux_storage_order),
                    4,
                    slot(offset_of!(GeometryRecord, aux_storage_order)),
                )?;
            }
            if !geo.index_solid.is_empty() {
                table.store_slot(
                    bytemuck::cast_slice(&geo.index_solid),
                    4,
                    slot(offset_of!(GeometryRecord, index_solid)),
                )?;
            }
            if !geo.index_wire.is_empty() {
                table.store_slot(
                    bytemuck::cast_slice(&geo.index_wire),
                    4,
                    slot(offset_of!(GeometryRecord, index_wire)),
                )?;
            }
            if !geo.perpart_storage_order.is_empty() {
                table.store_slot(
                    bytemuck::cast_slice(&geo.perpart_storage_order),
                    4,
                    slot(offset_of!(GeometryRecord, perpart_storage_order)),
                )?;
            }
            if !geo.perpart.is_empty() {
                table.store_slot(
                    &geo.perpart,
                    PERPART_ALIGN,
                    slot(offset_of!(GeometryRecord, perpart)),
                )?;
            }
            if !geo.parts.is_empty() {
                let parts: Vec<GeometryPartRecord> = geo
                    .parts
                    .iter()
                    .map(|p| GeometryPartRecord {
                        _deprecated: 0,
                        num_index_solid: p.num_index_solid,
                        num_index_wire: p.num_index_wire,
                    })
                    .collect();
                table.store_slot(
                    bytemuck::cast_slice(&parts),
                    4,
                    slot(offset_of!(GeometryRecord, parts)),
                )?;
            }
        }
        Ok(())
    }

    fn store_materials(&self, table: &mut OffsetTable<'_>) -> CsfResult<()> {
        let records: Vec<MaterialRecord> = self
            .scene
            .materials
            .iter()
            .map(|mat| {
                Ok(MaterialRecord {
                    name: encode_name(&mat.name),
                    color: mat.color,
                    material_type: mat.material_type,
                    num_bytes: u32::try_from(mat.bytes.len())
                        .map_err(|_| CsfError::Operation)?,
                    bytes: 0,
                })
            })
            .collect::<CsfResult<_>>()?;
        let base = table.store_slot(
            bytemuck::cast_slice(&records),
            8,
            offset_of!(FileHeader, materials) as u64,
        )?;

        let record_size = size_of::<MaterialRecord>() as u64;
        for (i, mat) in self.scene.materials.iter().enumerate() {
            if !mat.bytes.is_empty() {
                let slot =
                    base + i as u64 * record_size + offset_of!(MaterialRecord, bytes) as u64;
                table.store_slot(&mat.bytes, 4, slot)?;
            }
        }
        Ok(())
    }

    fn store_nodes(&self, table: &mut OffsetTable<'_>) -> CsfResult<()> {
        let records: Vec<NodeRecord> = self
            .scene
            .nodes
            .iter()
            .map(|node| {
                Ok(NodeRecord {
                    object_tm: node.object_tm,
                    world_tm: node.world_tm,
                    geometry_idx: node.geometry_idx,
                    num_parts: count_i32(node.parts.len())?,
                    num_children: count_i32(node.children.len())?,
                    _pad: 0,
                    parts: 0,
                    children: 0,
                })
            })
            .collect::<CsfResult<_>>()?;
        let base = table.store_slot(
            bytemuck::cast_slice(&records),
            8,
            offset_of!(FileHeader, nodes) as u64,
        )?;

        let record_size = size_of::<NodeRecord>() as u64;
        for (i, node) in self.scene.nodes.iter().enumerate() {
            let slot = |field| base + i as u64 * record_size + field as u64;
            if !node.parts.is_empty() {
                let parts: Vec<NodePartRecord> = node
                    .parts
                    .iter()
                    .map(|p| NodePartRecord {
                        active: p.active,
                        material_idx: p.material_idx,
                        node_idx: p.node_idx,
                    })
                    .collect();
                table.store_slot(
                    bytemuck::cast_slice(&parts),
                    4,
                    slot(offset_of!(NodeRecord, parts)),
                )?;
            }
            if !node.children.is_empty() {
                table.store_slot(
                    bytemuck::cast_slice(&node.children),
                    4,
                    slot(offset_of!(NodeRecord, children)),
                )?;
            }
        }
        Ok(())
    }

    /// Serializes into a freshly allocated buffer.
    pub fn to_vec(&self) -> CsfResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Writes an uncompressed scene file.
    pub fn save(&self, path: impl AsRef<Path>) -> CsfResult<()> {
        let file = File::create(path)?;
        let mut write = BufWriter::new(file);
        self.write_to(&mut write)?;
        write.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok(())
    }

    /// Writes a scene file, dispatching on the file extension the same
    /// way loading does: `.gz` compresses, glTF output is refused.
    pub fn save_ext(&self, path: impl AsRef<Path>) -> CsfResult<()> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => {
                let flat = self.to_vec()?;
                let file = File::create(path)?;
                let mut encoder = crate::io::new_gz_encoder(file);
                encoder.write_all(&flat)?;
                encoder.finish()?.sync_all()?;
                Ok(())
            }
            Some(ext) if ext.eq_ignore_ascii_case("gltf") => Err(CsfError::Operation),
            _ => self.save(path),
        }
    }
}

impl Scene {
    pub fn save(&self, path: impl AsRef<Path>) -> CsfResult<()> {
        SceneWriter::new(self).save(path)
    }

    pub fn save_ext(&self, path: impl AsRef<Path>) -> CsfResult<()> {
        SceneWriter::new(self).save_ext(path)
    }

    pub fn to_vec(&self) -> CsfResult<Vec<u8>> {
        SceneWriter::new(self).to_vec()
    }
}

fn count_i32(len: usize) -> CsfResult<i32> {
    i32::try_from(len).map_err(|_| CsfError::Operation)
}

fn encode_geometry(geo: &Geometry) -> CsfResult<GeometryRecord> {
    Ok(GeometryRecord {
        _deprecated: [0.0; 4],
        num_normal_channels: geo.num_normal_channels() as u32,
        num_tex_channels: geo.num_tex_channels() as u32,
        num_aux_channels: geo.num_aux_channels() as u32,
        num_part_channels: geo.num_part_channels() as u32,
        aux_storage_order: 0,
        aux: 0,
        perpart_storage_order: 0,
        perpart: 0,
        num_parts: count_i32(geo.parts.len())?,
        num_vertices: count_i32(geo.num_vertices())?,
        num_index_solid: count_i32(geo.index_solid.len())?,
        num_index_wire: count_i32(geo.index_wire.len())?,
        vertex: 0,
        normal: 0,
        tex: 0,
        index_solid: 0,
        index_wire: 0,
        parts: 0,
    })
}

fn store_meta_array(
    table: &mut OffsetTable<'_>,
    metas: &[Meta],
    header_slot: u64,
) -> CsfResult<()> {
    let records: Vec<MetaRecord> = metas
        .iter()
        .map(|meta| MetaRecord {
            name: encode_name(&meta.name),
            flags: meta.flags,
            _pad: 0,
            num_bytes: meta.bytes.len() as u64,
            bytes: 0,
        })
        .collect();
    let base = table.store_slot(bytemuck::cast_slice(&records), 8, header_slot)?;

    let record_size = size_of::<MetaRecord>() as u64;
    for (i, meta) in metas.iter().enumerate() {
        if !meta.bytes.is_empty() {
            let slot = base + i as u64 * record_size + offset_of!(MetaRecord, bytes) as u64;
            table.store_slot(&meta.bytes, META_ALIGN, slot)?;
        }
    }
    Ok(())
}

/// A scene must be internally consistent before it can be flattened.
/// Violations are caller errors, not data corruption.
fn check_consistent(scene: &Scene) -> CsfResult<()> {
    let num_nodes = scene.nodes.len();
    let num_geometries = scene.geometries.len();

    if scene.root_idx >= 0 && scene.root_idx as usize >= num_nodes {
        return Err(CsfError::Operation);
    }

    for geo in &scene.geometries {
        let nv = geo.vertex.len() / 3;
        if geo.vertex.len() % 3 != 0 {
            return Err(CsfError::Operation);
        }
        if nv == 0 {
            if !geo.normal.is_empty() || !geo.tex.is_empty() || !geo.aux.is_empty() {
                return Err(CsfError::Operation);
            }
        } else {
            if geo.normal.len() % (3 * nv) != 0 || geo.tex.len() % (2 * nv) != 0 {
                return Err(CsfError::Operation);
            }
            if geo.aux.len() != 4 * nv * geo.aux_storage_order.len() {
                return Err(CsfError::Operation);
            }
        }
        if geo.perpart.len() != geo.perpart_size() {
            return Err(CsfError::Operation);
        }
    }

    for node in &scene.nodes {
        match usize::try_from(node.geometry_idx) {
            Ok(geo_idx) => {
                let geo = scene
                    .geometries
                    .get(geo_idx)
                    .ok_or(CsfError::Operation)?;
                if node.parts.len() != geo.parts.len() {
                    return Err(CsfError::Operation);
                }
            }
            Err(_) => {
                if !node.parts.is_empty() {
                    return Err(CsfError::Operation);
                }
            }
        }
        for &child in &node.children {
            if child < 0 || child as usize >= num_nodes {
                return Err(CsfError::Operation);
            }
        }
    }

    if let Some(metas) = &scene.node_metas {
        if metas.len() != num_nodes {
            return Err(CsfError::Operation);
        }
    }
    if let Some(metas) = &scene.geometry_metas {
        if metas.len() != num_geometries {
            return Err(CsfError::Operation);
        }
    }
    Ok(())
}
