//! The record structs must match the on-disk layout byte for byte.

use std::mem::{offset_of, size_of};

use cadscene::header::{FileHeader, HEADER_SIZE, HEADER_SIZE_LEGACY, MAGIC, VERSION};
use cadscene::records::{
    BytePacket, GeometryPartBbox, GeometryPartRecord, GeometryRecord, MaterialRecord, MetaRecord,
    NodePartRecord, NodeRecord,
};
use cadscene::Scene;

#[test]
fn record_sizes() {
    assert_eq!(size_of::<FileHeader>(), 88);
    assert_eq!(HEADER_SIZE, 88);
    assert_eq!(HEADER_SIZE_LEGACY, 64);
    assert_eq!(size_of::<GeometryRecord>(), 128);
    assert_eq!(size_of::<MaterialRecord>(), 160);
    assert_eq!(size_of::<NodeRecord>(), 160);
    assert_eq!(size_of::<MetaRecord>(), 152);
    assert_eq!(size_of::<NodePartRecord>(), 12);
    assert_eq!(size_of::<GeometryPartRecord>(), 12);
    assert_eq!(size_of::<BytePacket>(), 20);
    assert_eq!(size_of::<GeometryPartBbox>(), 24);
}

#[test]
fn header_field_offsets() {
    assert_eq!(offset_of!(FileHeader, magic), 0);
    assert_eq!(offset_of!(FileHeader, version), 4);
    assert_eq!(offset_of!(FileHeader, file_flags), 8);
    assert_eq!(offset_of!(FileHeader, num_pointers), 12);
    assert_eq!(offset_of!(FileHeader, root_idx), 28);
    assert_eq!(offset_of!(FileHeader, pointers), 32);
    assert_eq!(offset_of!(FileHeader, geometries), 40);
    assert_eq!(offset_of!(FileHeader, materials), 48);
    assert_eq!(offset_of!(FileHeader, nodes), 56);
    assert_eq!(offset_of!(FileHeader, node_metas), 64);
    assert_eq!(offset_of!(FileHeader, geometry_metas), 72);
    assert_eq!(offset_of!(FileHeader, file_meta), 80);
}

#[test]
fn geometry_field_offsets() {
    assert_eq!(offset_of!(GeometryRecord, num_normal_channels), 16);
    assert_eq!(offset_of!(GeometryRecord, aux_storage_order), 32);
    assert_eq!(offset_of!(GeometryRecord, num_parts), 64);
    assert_eq!(offset_of!(GeometryRecord, vertex), 80);
    assert_eq!(offset_of!(GeometryRecord, normal), 88);
    assert_eq!(offset_of!(GeometryRecord, tex), 96);
    assert_eq!(offset_of!(GeometryRecord, index_solid), 104);
    assert_eq!(offset_of!(GeometryRecord, index_wire), 112);
    assert_eq!(offset_of!(GeometryRecord, parts), 120);
}

#[test]
fn empty_scene_layout() {
    let flat = Scene::new().to_vec().unwrap();
    // Header, three empty record arrays, and a three-entry relocation
    // table naming their header slots.
    assert_eq!(flat.len(), 112);
    let header = FileHeader::from_prefix(&flat).unwrap();
    assert_eq!(header.magic, MAGIC);
    assert_eq!(header.version, VERSION);
    assert_eq!(header.num_pointers, 3);
    assert_eq!(header.pointers, 88);
    assert_eq!(header.required_size().unwrap(), 112);

    let mut slots = Vec::new();
    for entry in flat[88..].chunks_exact(8) {
        slots.push(u64::from_le_bytes(entry.try_into().unwrap()));
    }
    slots.sort_unstable();
    assert_eq!(slots, vec![40, 48, 56]);
    // All three empty arrays land right behind the header.
    assert_eq!(header.geometries, 88);
    assert_eq!(header.materials, 88);
    assert_eq!(header.nodes, 88);
}

#[test]
fn header_prefix_round_trip() {
    let flat = Scene::new().to_vec().unwrap();
    let header = FileHeader::from_prefix(&flat).unwrap();
    assert_eq!(header.as_bytes(), &flat[..HEADER_SIZE]);
}
