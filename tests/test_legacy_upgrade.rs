//! Loading files written before the current format version must
//! upgrade them: legacy flag semantics, retired per-part fields, and
//! the channel tables that old files never carried.

use cadscene::header::{FileHeader, FLAG_UNIQUENODES, VERSION};
use cadscene::records::{GeometryPartRecord, GeometryRecord, MaterialRecord, NodeRecord};
use cadscene::scene::IDENTITY_TM;
use cadscene::Scene;

fn put(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Builds a version 2 file by hand: 64-byte header, one geometry with
/// positions, one normal array and solid indices, one material, one
/// node. Fields that did not exist in version 2 are filled with junk
/// the way a real old writer would have left garbage there.
fn build_v2_file(file_flags: u32) -> Vec<u8> {
    const GEO: usize = 64;
    const MAT: usize = 192;
    const NODE: usize = 352;
    const VERTEX: usize = 512;
    const NORMAL: usize = 548;
    const INDEX_SOLID: usize = 584;
    const GEO_PARTS: usize = 596;
    const NODE_PARTS: usize = 608;
    const TABLE: usize = 624;
    const LEN: usize = 688;

    let mut buf = vec![0u8; LEN];

    let header = FileHeader {
        magic: cadscene::MAGIC,
        version: 2,
        file_flags,
        num_pointers: 8,
        num_geometries: 1,
        num_materials: 1,
        num_nodes: 1,
        root_idx: 0,
        pointers: TABLE as u64,
        geometries: GEO as u64,
        materials: MAT as u64,
        nodes: NODE as u64,
        node_metas: 0,
        geometry_metas: 0,
        file_meta: 0,
    };
    // Version 2 headers end before the meta offsets.
    put(&mut buf, 0, &header.as_bytes()[..64]);

    let geometry = GeometryRecord {
        _deprecated: [1.5; 4],
        num_normal_channels: 0xAAAA_AAAA,
        num_tex_channels: 0xBBBB_BBBB,
        num_aux_channels: 0xCCCC_CCCC,
        num_part_channels: 0xDDDD_DDDD,
        aux_storage_order: 0xDEAD_BEEF,
        aux: 0xDEAD_BEEF,
        perpart_storage_order: 0xDEAD_BEEF,
        perpart: 0xDEAD_BEEF,
        num_parts: 1,
        num_vertices: 3,
        num_index_solid: 3,
        num_index_wire: 0,
        vertex: VERTEX as u64,
        normal: NORMAL as u64,
        tex: 0,
        index_solid: INDEX_SOLID as u64,
        index_wire: 0,
        parts: GEO_PARTS as u64,
    };
    put(&mut buf, GEO, bytemuck::bytes_of(&geometry));

    let mut name = [0u8; 128];
    name[..6].copy_from_slice(b"legacy");
    let material = MaterialRecord {
        name,
        color: [1.0, 0.5, 0.0, 1.0],
        material_type: 0,
        num_bytes: 0,
        bytes: 0,
    };
    put(&mut buf, MAT, bytemuck::bytes_of(&material));

    let node = NodeRecord {
        object_tm: IDENTITY_TM,
        world_tm: IDENTITY_TM,
        geometry_idx: 0,
        num_parts: 1,
        num_children: 0,
        _pad: 0,
        parts: NODE_PARTS as u64,
        children: 0,
    };
    put(&mut buf, NODE, bytemuck::bytes_of(&node));

    let vertex: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    put(&mut buf, VERTEX, bytemuck::cast_slice(&vertex));
    let normal: [f32; 9] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    put(&mut buf, NORMAL, bytemuck::cast_slice(&normal));
    let indices: [u32; 3] = [0, 1, 2];
    put(&mut buf, INDEX_SOLID, bytemuck::cast_slice(&indices));
    let geo_part = GeometryPartRecord {
        _deprecated: -123,
        num_index_solid: 3,
        num_index_wire: 0,
    };
    put(&mut buf, GEO_PARTS, bytemuck::bytes_of(&geo_part));
    // active, material_idx, and the retired line-width field.
    let node_part: [i32; 3] = [1, 0, 777];
    put(&mut buf, NODE_PARTS, bytemuck::cast_slice(&node_part));

    let slots: [u64; 8] = [
        40,  // header geometries
        48,  // header materials
        56,  // header nodes
        (GEO + 80) as u64,  // geometry vertex
        (GEO + 88) as u64,  // geometry normal
        (GEO + 104) as u64, // geometry index_solid
        (GEO + 120) as u64, // geometry parts
        (NODE + 144) as u64, // node parts
    ];
    put(&mut buf, TABLE, bytemuck::cast_slice(&slots));
    buf
}

#[test]
fn legacy_flags_become_unique_nodes_bit() {
    let scene = Scene::load_buffer(&build_v2_file(0xDEAD)).expect("load failed");
    assert_eq!(scene.file_flags, FLAG_UNIQUENODES);

    let scene = Scene::load_buffer(&build_v2_file(0)).expect("load failed");
    assert_eq!(scene.file_flags, 0);
}

#[test]
fn legacy_channel_counts_come_from_offsets() {
    let scene = Scene::load_buffer(&build_v2_file(1)).expect("load failed");
    let geo = &scene.geometries[0];
    assert_eq!(geo.num_vertices(), 3);
    assert_eq!(geo.num_normal_channels(), 1);
    assert_eq!(geo.num_tex_channels(), 0);
    assert_eq!(geo.num_aux_channels(), 0);
    assert_eq!(geo.num_part_channels(), 0);
    assert!(geo.aux.is_empty());
    assert!(geo.perpart.is_empty());
    assert_eq!(geo.index_solid, vec![0, 1, 2]);
    assert_eq!(geo.parts[0].num_index_solid, 3);
}

#[test]
fn legacy_part_node_idx_is_cleared() {
    let scene = Scene::load_buffer(&build_v2_file(1)).expect("load failed");
    let part = scene.nodes[0].parts[0];
    assert_eq!(part.active, 1);
    assert_eq!(part.material_idx, 0);
    assert_eq!(part.node_idx, -1);
}

#[test]
fn upgraded_scene_saves_as_current_version() {
    let scene = Scene::load_buffer(&build_v2_file(1)).expect("load failed");
    let flat = scene.to_vec().expect("serialize failed");
    let header = FileHeader::from_prefix(&flat).unwrap();
    assert_eq!(header.version, VERSION);
    let reloaded = Scene::load_buffer(&flat).expect("reload failed");
    assert_eq!(reloaded, scene);
    assert_eq!(reloaded.materials[0].name, "legacy");
}
