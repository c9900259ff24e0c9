//! Operations on the owned scene model: transform propagation, byte
//! packets, and channel bookkeeping.

mod common;

use cadscene::header::FLAG_UNIQUENODES;
use cadscene::records::{BytePacket, PartChannel};
use cadscene::scene::{find_byte_packet, GeometryPart, Meta, Node};
use cadscene::{CsfError, Scene};
use common::*;

#[test]
fn propagate_composes_translations() {
    let mut scene = Scene::new();
    let child = scene.add_node(Node {
        object_tm: translate(1.0, 0.0, 0.0),
        ..Node::identity()
    });
    let root = scene.add_node(Node {
        object_tm: translate(0.0, 2.0, 0.0),
        children: vec![child],
        ..Node::identity()
    });
    scene.root_idx = root;

    scene.propagate_transforms().expect("propagate failed");

    let root_world = scene.nodes[root as usize].world_tm;
    assert_eq!(&root_world[12..15], &[0.0, 2.0, 0.0]);
    let child_world = scene.nodes[child as usize].world_tm;
    assert_eq!(&child_world[12..15], &[1.0, 2.0, 0.0]);
}

#[test]
fn propagate_without_unique_nodes_changes_nothing() {
    let mut scene = Scene::new();
    scene.file_flags &= !FLAG_UNIQUENODES;
    let child = scene.add_node(Node {
        object_tm: translate(1.0, 0.0, 0.0),
        world_tm: translate(9.0, 9.0, 9.0),
        ..Node::identity()
    });
    let root = scene.add_node(Node {
        object_tm: translate(0.0, 2.0, 0.0),
        world_tm: translate(8.0, 8.0, 8.0),
        children: vec![child],
        ..Node::identity()
    });
    scene.root_idx = root;

    let before = scene.clone();
    assert!(matches!(
        scene.propagate_transforms(),
        Err(CsfError::Operation)
    ));
    assert_eq!(scene, before);
}

#[test]
fn propagate_without_root_is_a_noop() {
    let mut scene = Scene::new();
    scene.add_node(Node::identity());
    scene.root_idx = -1;
    let before = scene.clone();
    scene.propagate_transforms().expect("propagate failed");
    assert_eq!(scene, before);
}

#[test]
fn propagate_rejects_node_cycles() {
    let mut scene = Scene::new();
    let a = scene.add_node(Node::identity());
    let b = scene.add_node(Node::identity());
    scene.nodes[a as usize].children = vec![b];
    scene.nodes[b as usize].children = vec![a];
    scene.root_idx = a;
    assert!(matches!(
        scene.propagate_transforms(),
        Err(CsfError::Invalid)
    ));
}

#[test]
fn byte_packet_lookup() {
    let mut meta = Meta::default();
    meta.set_or_add_byte_packet(&[1, 0, 0, 0], b"first");
    meta.set_or_add_byte_packet(&[2, 0, 0, 0], b"second!");

    let found = meta.find_byte_packet(&[1, 0, 0, 0]).expect("packet missing");
    assert_eq!(found.payload, b"first");
    assert_eq!(found.num_bytes as usize, 20 + 5);
    let found = meta.find_byte_packet(&[2, 0, 0, 0]).expect("packet missing");
    assert_eq!(found.payload, b"second!");
    assert!(meta.find_byte_packet(&[3, 0, 0, 0]).is_none());
}

#[test]
fn byte_packet_replace_same_size() {
    let mut meta = Meta::default();
    meta.set_or_add_byte_packet(&[1, 0, 0, 0], b"aaaa");
    meta.set_or_add_byte_packet(&[2, 0, 0, 0], b"bb");
    let len = meta.bytes.len();

    meta.set_or_add_byte_packet(&[1, 0, 0, 0], b"cccc");
    assert_eq!(meta.bytes.len(), len);
    assert_eq!(meta.find_byte_packet(&[1, 0, 0, 0]).unwrap().payload, b"cccc");
    assert_eq!(meta.find_byte_packet(&[2, 0, 0, 0]).unwrap().payload, b"bb");
}

#[test]
fn byte_packet_replace_different_size() {
    let mut meta = Meta::default();
    meta.set_or_add_byte_packet(&[1, 0, 0, 0], b"aaaa");
    meta.set_or_add_byte_packet(&[2, 0, 0, 0], b"bb");

    meta.set_or_add_byte_packet(&[1, 0, 0, 0], b"much longer payload");
    assert_eq!(
        meta.find_byte_packet(&[1, 0, 0, 0]).unwrap().payload,
        b"much longer payload"
    );
    assert_eq!(meta.find_byte_packet(&[2, 0, 0, 0]).unwrap().payload, b"bb");
}

#[test]
fn malformed_packet_ends_the_walk() {
    // A packet whose size field is smaller than the packet header makes
    // the rest of the blob unwalkable.
    let bad = BytePacket {
        guid: [9, 9, 9, 9],
        num_bytes: 3,
    };
    let mut bytes = bytemuck::bytes_of(&bad).to_vec();
    let good = BytePacket {
        guid: [1, 0, 0, 0],
        num_bytes: 20,
    };
    bytes.extend_from_slice(bytemuck::bytes_of(&good));
    assert!(find_byte_packet(&bytes, &[1, 0, 0, 0]).is_none());

    // Size overrunning the blob is equally terminal.
    let overrun = BytePacket {
        guid: [9, 9, 9, 9],
        num_bytes: 1000,
    };
    assert!(find_byte_packet(bytemuck::bytes_of(&overrun), &[9, 9, 9, 9]).is_none());
}

#[test]
fn scene_level_packet_lookup() {
    let scene = sample_scene();
    assert!(scene.material_byte_packet(0, &[1, 2, 3, 4]).is_some());
    assert!(scene.material_byte_packet(0, &[9, 9, 9, 9]).is_none());
    assert!(scene.material_byte_packet(-1, &[1, 2, 3, 4]).is_none());
    assert!(scene.file_byte_packet(&[1, 2, 3, 4]).is_none());
}

#[test]
fn part_index_offsets_are_prefix_sums() {
    let mut geo = sample_geometry();
    geo.parts = vec![
        GeometryPart { num_index_solid: 3, num_index_wire: 2 },
        GeometryPart { num_index_solid: 6, num_index_wire: 0 },
        GeometryPart { num_index_solid: 9, num_index_wire: 4 },
    ];
    assert_eq!(geo.part_solid_offset(0), 0);
    assert_eq!(geo.part_solid_offset(1), 3);
    assert_eq!(geo.part_solid_offset(2), 9);
    assert_eq!(geo.part_wire_offset(2), 2);
}

#[test]
fn vertex_channel_accessors() {
    let geo = sample_geometry();
    assert_eq!(geo.normal_channel(0).unwrap().len(), 9);
    assert!(geo.normal_channel(1).is_none());
    assert_eq!(geo.tex_channel(0).unwrap().len(), 6);
    assert!(geo.tex_channel(1).is_none());
    assert_eq!(geo.aux_channel(7).unwrap().len(), 12);
    assert!(geo.aux_channel(0).is_none());
}

#[test]
fn aux_channel_require_is_idempotent() {
    let mut geo = sample_geometry();
    let slot = geo.require_aux_channel(7);
    assert_eq!(slot, 0);
    assert_eq!(geo.num_aux_channels(), 1);
    let slot = geo.require_aux_channel(11);
    assert_eq!(slot, 1);
    assert_eq!(geo.aux.len(), 2 * 4 * geo.num_vertices());
}

#[test]
fn part_channels_grow_and_shrink() {
    let mut geo = sample_geometry();
    let bbox = PartChannel::Bbox as i32;
    assert_eq!(geo.perpart.len(), geo.parts.len() * PartChannel::Bbox.size());
    assert!(geo.part_channel(bbox).is_some());

    // Unknown ordinals occupy no space but are tracked.
    geo.require_part_channels(&[42]);
    assert_eq!(geo.num_part_channels(), 2);
    assert_eq!(geo.perpart.len(), geo.perpart_size());
    assert_eq!(geo.part_channel(42).unwrap().len(), 0);

    geo.remove_part_channels(&[bbox]);
    assert_eq!(geo.num_part_channels(), 1);
    assert!(geo.part_channel(bbox).is_none());
    assert_eq!(geo.perpart.len(), 0);

    geo.require_part_channels(&[bbox]);
    assert_eq!(geo.perpart.len(), geo.parts.len() * PartChannel::Bbox.size());
    assert!(geo.part_bboxes().is_some());
}
