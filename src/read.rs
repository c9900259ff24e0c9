//! Load pipelines: flattened buffers, plain files, and gzip-compressed
//! files, all decoding into the owned [`Scene`] model.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::header::{
    FLAG_META_FILE, FLAG_META_GEOMETRY, FLAG_META_NODE, HEADER_SIZE, HEADER_SIZE_LEGACY,
    VERSION_PARTNODEIDX,
};
use crate::mem::SceneMemory;
use crate::raw::RawFile;
use crate::records::{decode_name, GeometryPartRecord, MetaRecord, NodePartRecord};
use crate::scene::{Geometry, GeometryPart, Material, Meta, Node, NodePart, Scene};
use crate::{CsfError, CsfResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadSettings {
    /// Bounds-check the relocation table and every offset and index
    /// reachable from the records before decoding. Disable only for
    /// trusted inputs.
    pub validate: bool,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self { validate: true }
    }
}

impl Scene {
    /// Decodes a scene from a flattened file image held in memory.
    pub fn load_buffer(buf: &[u8]) -> CsfResult<Scene> {
        Self::load_buffer_with_settings(buf, &LoadSettings::default())
    }

    pub fn load_buffer_with_settings(buf: &[u8], settings: &LoadSettings) -> CsfResult<Scene> {
        let raw = RawFile::with_settings(buf, settings)?;
        decode_scene(&raw)
    }

    /// Loads an uncompressed scene file.
    pub fn load(path: impl AsRef<Path>) -> CsfResult<Scene> {
        Self::load_with_settings(path, &LoadSettings::default())
    }

    pub fn load_with_settings(
        path: impl AsRef<Path>,
        settings: &LoadSettings,
    ) -> CsfResult<Scene> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let mut prefix = [0u8; HEADER_SIZE];
        let got = read_at_most(&mut file, &mut prefix)?;
        if got < HEADER_SIZE_LEGACY {
            return Err(CsfError::Version);
        }
        let header = crate::header::FileHeader::from_prefix(&prefix[..got])?;
        if header.required_size()? != file_len {
            return Err(CsfError::Version);
        }

        let memory = SceneMemory::new();
        let block = memory
            .alloc(file_len as usize)
            .ok_or(CsfError::Version)?;
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(block)?;
        Self::load_buffer_with_settings(block, settings)
    }

    /// Loads a scene file, dispatching on the file extension: `.gz`
    /// decompresses, anything else loads directly. glTF input is a
    /// conversion concern and is refused here.
    pub fn load_ext(path: impl AsRef<Path>) -> CsfResult<Scene> {
        Self::load_ext_with_settings(path, &LoadSettings::default())
    }

    pub fn load_ext_with_settings(
        path: impl AsRef<Path>,
        settings: &LoadSettings,
    ) -> CsfResult<Scene> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            Some("gz") => load_gz(path, settings),
            Some("gltf") => Err(CsfError::Operation),
            _ => Self::load_with_settings(path, settings),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    Some(path.extension()?.to_str()?.to_ascii_lowercase())
}

/// Reads until `buf` is full or the source is exhausted.
fn read_at_most(read: &mut impl Read, buf: &mut [u8]) -> CsfResult<usize> {
    let mut got = 0;
    while got < buf.len() {
        match read.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(got)
}

/// Streams a gzip member once: decode the header prefix first to learn
/// the flattened size, then continue the same stream into an arena
/// block of exactly that size. Trailing decompressed data or a stream
/// that ends early marks the file as not a valid compressed scene.
fn load_gz(path: &Path, settings: &LoadSettings) -> CsfResult<Scene> {
    let file = File::open(path)?;
    let mut decoder = crate::io::new_gz_decoder(file);

    let mut prefix = [0u8; HEADER_SIZE];
    let got = read_at_most(&mut decoder, &mut prefix).map_err(|_| CsfError::Version)?;
    if got < HEADER_SIZE_LEGACY {
        return Err(CsfError::Version);
    }
    let header = crate::header::FileHeader::from_prefix(&prefix[..got])?;
    let required = header.required_size()?;
    let required = usize::try_from(required).map_err(|_| CsfError::Version)?;
    if required < got {
        return Err(CsfError::Version);
    }

    let memory = SceneMemory::new();
    let block = memory
        .alloc_partial(required, &prefix[..got])
        .ok_or(CsfError::Version)?;
    decoder
        .read_exact(&mut block[got..])
        .map_err(|_| CsfError::Version)?;

    let mut probe = [0u8; 1];
    match decoder.read(&mut probe) {
        Ok(0) => {}
        Ok(_) => return Err(CsfError::Version),
        Err(_) => return Err(CsfError::Version),
    }
    Scene::load_buffer_with_settings(block, settings)
}

fn decode_scene(raw: &RawFile<'_>) -> CsfResult<Scene> {
    let header = *raw.header();

    let mut geometries = Vec::with_capacity(header.num_geometries as usize);
    for i in 0..header.num_geometries {
        geometries.push(decode_geometry(raw, i)?);
    }
    let mut materials = Vec::with_capacity(header.num_materials as usize);
    for i in 0..header.num_materials {
        materials.push(decode_material(raw, i)?);
    }
    let mut nodes = Vec::with_capacity(header.num_nodes as usize);
    for i in 0..header.num_nodes {
        nodes.push(decode_node(raw, i)?);
    }

    let node_metas = if header.file_flags & FLAG_META_NODE != 0 && header.node_metas != 0 {
        let mut metas = Vec::with_capacity(header.num_nodes as usize);
        for i in 0..header.num_nodes {
            let record = raw.node_meta(i)?.ok_or(CsfError::Invalid)?;
            metas.push(decode_meta(raw, &record)?);
        }
        Some(metas)
    } else {
        None
    };
    let geometry_metas =
        if header.file_flags & FLAG_META_GEOMETRY != 0 && header.geometry_metas != 0 {
            let mut metas = Vec::with_capacity(header.num_geometries as usize);
            for i in 0..header.num_geometries {
                let record = raw.geometry_meta(i)?.ok_or(CsfError::Invalid)?;
                metas.push(decode_meta(raw, &record)?);
            }
            Some(metas)
        } else {
            None
        };
    let file_meta = if header.file_flags & FLAG_META_FILE != 0 && header.file_meta != 0 {
        let record = raw.file_meta()?.ok_or(CsfError::Invalid)?;
        Some(decode_meta(raw, &record)?)
    } else {
        None
    };

    Ok(Scene {
        file_flags: header.file_flags,
        root_idx: header.root_idx,
        geometries,
        materials,
        nodes,
        node_metas,
        geometry_metas,
        file_meta,
    })
}

fn count(value: i32) -> CsfResult<usize> {
    usize::try_from(value).map_err(|_| CsfError::Invalid)
}

fn channel_len(per_vertex: usize, nv: usize, channels: u32) -> CsfResult<usize> {
    per_vertex
        .checked_mul(nv)
        .and_then(|n| n.checked_mul(channels as usize))
        .ok_or(CsfError::Invalid)
}

fn decode_geometry(raw: &RawFile<'_>, idx: i32) -> CsfResult<Geometry> {
    let record = raw.geometry(idx)?;
    let nv = count(record.num_vertices)?;
    let num_parts = count(record.num_parts)?;
    let (normals, texs, auxs, parts_ch) = raw.channel_counts(&record);

    let vertex = raw.pod_vec_at::<f32>(record.vertex, channel_len(3, nv, 1)?)?;
    let normal = raw.pod_vec_at::<f32>(record.normal, channel_len(3, nv, normals)?)?;
    let tex = raw.pod_vec_at::<f32>(record.tex, channel_len(2, nv, texs)?)?;
    let index_solid = raw.pod_vec_at::<u32>(record.index_solid, count(record.num_index_solid)?)?;
    let index_wire = raw.pod_vec_at::<u32>(record.index_wire, count(record.num_index_wire)?)?;
    let part_records: Vec<GeometryPartRecord> = raw.pod_vec_at(record.parts, num_parts)?;
    let parts = part_records
        .iter()
        .map(|p| GeometryPart {
            num_index_solid: p.num_index_solid,
            num_index_wire: p.num_index_wire,
        })
        .collect();

    // The channel tables only exist on current files; channel_counts
    // already reports zero for the rest.
    let aux_storage_order: Vec<i32> = raw.pod_vec_at(record.aux_storage_order, auxs as usize)?;
    let aux = raw.pod_vec_at::<f32>(record.aux, channel_len(4, nv, auxs)?)?;
    let perpart_storage_order: Vec<i32> =
        raw.pod_vec_at(record.perpart_storage_order, parts_ch as usize)?;
    let stride: u64 = perpart_storage_order
        .iter()
        .map(|&c| crate::records::part_channel_size(c) as u64)
        .sum();
    let perpart_bytes = stride
        .checked_mul(num_parts as u64)
        .ok_or(CsfError::Invalid)?;
    let perpart = raw.bytes_at(record.perpart, perpart_bytes)?.to_vec();

    Ok(Geometry {
        vertex,
        normal,
        tex,
        aux,
        aux_storage_order,
        index_solid,
        index_wire,
        parts,
        perpart_storage_order,
        perpart,
    })
}

fn decode_material(raw: &RawFile<'_>, idx: i32) -> CsfResult<Material> {
    let record = raw.material(idx)?;
    let bytes = raw.bytes_at(record.bytes, record.num_bytes as u64)?.to_vec();
    Ok(Material {
        name: decode_name(&record.name),
        color: record.color,
        material_type: record.material_type,
        bytes,
    })
}

fn decode_node(raw: &RawFile<'_>, idx: i32) -> CsfResult<Node> {
    let record = raw.node(idx)?;
    let parts = if record.geometry_idx >= 0 {
        let part_records: Vec<NodePartRecord> =
            raw.pod_vec_at(record.parts, count(record.num_parts)?)?;
        part_records
            .iter()
            .map(|p| NodePart {
                active: p.active,
                material_idx: p.material_idx,
                // The field held a line width before VERSION_PARTNODEIDX.
                node_idx: if raw.header().version >= VERSION_PARTNODEIDX {
                    p.node_idx
                } else {
                    -1
                },
            })
            .collect()
    } else {
        Vec::new()
    };
    let children = raw.pod_vec_at::<i32>(record.children, count(record.num_children)?)?;
    Ok(Node {
        object_tm: record.object_tm,
        world_tm: record.world_tm,
        geometry_idx: record.geometry_idx,
        parts,
        children,
    })
}

fn decode_meta(raw: &RawFile<'_>, record: &MetaRecord) -> CsfResult<Meta> {
    let bytes = raw.bytes_at(record.bytes, record.num_bytes)?.to_vec();
    Ok(Meta {
        name: decode_name(&record.name),
        flags: record.flags,
        bytes,
    })
}
