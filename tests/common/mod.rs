#![allow(dead_code)]

use std::path::PathBuf;

use cadscene::header::{
    FLAG_META_FILE, FLAG_META_GEOMETRY, FLAG_META_NODE, FLAG_UNIQUENODES,
};
use cadscene::records::PartChannel;
use cadscene::scene::{Geometry, GeometryPart, Material, Meta, Node, NodePart, IDENTITY_TM};
use cadscene::Scene;

pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("cadscene_test").join(name);
    std::fs::create_dir_all(&dir).ok();
    dir
}

pub fn translate(x: f32, y: f32, z: f32) -> [f32; 16] {
    let mut tm = IDENTITY_TM;
    tm[12] = x;
    tm[13] = y;
    tm[14] = z;
    tm
}

/// A triangle geometry exercising every channel kind.
pub fn sample_geometry() -> Geometry {
    let mut geo = Geometry {
        vertex: vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0,
        ],
        normal: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        tex: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        index_solid: vec![0, 1, 2],
        index_wire: vec![0, 1, 1, 2, 2, 0],
        parts: vec![GeometryPart {
            num_index_solid: 3,
            num_index_wire: 6,
        }],
        ..Default::default()
    };
    geo.require_aux_channel(7);
    geo.require_part_channels(&[PartChannel::Bbox as i32]);
    geo
}

/// Two geometry instances under one root, with a material payload and
/// every meta kind present.
pub fn sample_scene() -> Scene {
    let mut scene = Scene::new();
    let geo = scene.add_geometry(sample_geometry());

    let mut material = Material {
        name: "steel".into(),
        color: [0.5, 0.5, 0.6, 1.0],
        material_type: 1,
        ..Default::default()
    };
    let mut packets = Meta::default();
    packets.set_or_add_byte_packet(&[1, 2, 3, 4], b"payload-a");
    material.bytes = packets.bytes;
    let material = scene.add_material(material);

    let child = scene.add_node(Node {
        object_tm: translate(0.0, 2.0, 0.0),
        geometry_idx: geo,
        parts: vec![NodePart {
            active: 1,
            material_idx: material,
            node_idx: -1,
        }],
        ..Node::identity()
    });
    let root = scene.add_node(Node {
        object_tm: translate(1.0, 0.0, 0.0),
        children: vec![child],
        ..Node::identity()
    });
    scene.root_idx = root;

    scene.node_metas = Some(vec![
        Meta {
            name: "child".into(),
            flags: 0,
            bytes: b"c".to_vec(),
        },
        Meta {
            name: "root".into(),
            flags: 0,
            bytes: Vec::new(),
        },
    ]);
    scene.geometry_metas = Some(vec![Meta {
        name: "triangle".into(),
        flags: 3,
        bytes: b"geo meta".to_vec(),
    }]);
    scene.file_meta = Some(Meta {
        name: "sample".into(),
        flags: 0,
        bytes: b"file meta bytes".to_vec(),
    });
    // The writer derives the meta flag bits from presence; setting them
    // here keeps loaded scenes comparable to this one.
    scene.file_flags =
        FLAG_UNIQUENODES | FLAG_META_NODE | FLAG_META_GEOMETRY | FLAG_META_FILE;
    scene
}
