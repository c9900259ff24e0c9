use cadscene::records::{GeometryPartBbox, PartChannel, GUID_MATERIAL_GLTF2};
use cadscene::scene::{Geometry, GeometryPart, Material, Meta, Node, NodePart, IDENTITY_TM};
use cadscene::Scene;

static POSITIONS: &[f32] = &[
    // Front face
    -1.0, -1.0,  1.0,   1.0, -1.0,  1.0,
     1.0,  1.0,  1.0,  -1.0,  1.0,  1.0,
    // Back face
    -1.0, -1.0, -1.0,   1.0, -1.0, -1.0,
     1.0,  1.0, -1.0,  -1.0,  1.0, -1.0,
];

static NORMALS: &[f32] = &[
    // Front face
     0.0,  0.0,  1.0,   0.0,  0.0,  1.0,
     0.0,  0.0,  1.0,   0.0,  0.0,  1.0,
    // Back face
     0.0,  0.0, -1.0,   0.0,  0.0, -1.0,
     0.0,  0.0, -1.0,   0.0,  0.0, -1.0,
];

static UVS: &[f32] = &[
    // Front face
     0.0,  0.0,   0.0,  1.0,
     1.0,  0.0,   1.0,  1.0,
    // Back face
     1.0,  1.0,   1.0,  0.0,
     0.0,  1.0,   0.0,  0.0,
];

static INDICES_SOLID: &[u32] = &[
    // Front face
    0, 1, 2, 2, 3, 0,
    // Back face
    4, 5, 6, 6, 7, 4,
    // Left face
    4, 0, 3, 3, 7, 4,
    // Right face
    1, 5, 6, 6, 2, 1,
    // Top face
    3, 2, 6, 6, 7, 3,
    // Bottom face
    4, 5, 1, 1, 0, 4,
];

static INDICES_WIRE: &[u32] = &[
    0, 1, 1, 2, 2, 3, 3, 0, //
    4, 5, 5, 6, 6, 7, 7, 4, //
    0, 4, 1, 5, 2, 6, 3, 7,
];

fn translate(x: f32, y: f32, z: f32) -> [f32; 16] {
    let mut tm = IDENTITY_TM;
    tm[12] = x;
    tm[13] = y;
    tm[14] = z;
    tm
}

fn main() -> anyhow::Result<()> {
    let mut scene = Scene::new();

    let mut cube = Geometry {
        vertex: POSITIONS.to_vec(),
        normal: NORMALS.to_vec(),
        tex: UVS.to_vec(),
        index_solid: INDICES_SOLID.to_vec(),
        index_wire: INDICES_WIRE.to_vec(),
        parts: vec![
            // Front and back faces as one part, the rest as another.
            GeometryPart { num_index_solid: 12, num_index_wire: 16 },
            GeometryPart { num_index_solid: 24, num_index_wire: 8 },
        ],
        ..Default::default()
    };
    cube.require_part_channels(&[PartChannel::Bbox as i32]);
    let bboxes = [
        GeometryPartBbox { min: [-1.0; 3], max: [1.0; 3] },
        GeometryPartBbox { min: [-1.0; 3], max: [1.0; 3] },
    ];
    if let Some(channel) = cube.part_channel_mut(PartChannel::Bbox as i32) {
        channel.copy_from_slice(bytemuck::cast_slice(&bboxes));
    }
    let cube_idx = scene.add_geometry(cube);

    let red = scene.add_material(Material {
        name: "red".into(),
        color: [1.0, 0.0, 0.0, 1.0],
        ..Default::default()
    });
    let mut blue = Material {
        name: "blue".into(),
        color: [0.0, 0.0, 1.0, 1.0],
        ..Default::default()
    };
    // Extension payloads travel as byte packets inside the material.
    let mut packets = Meta::default();
    packets.set_or_add_byte_packet(&GUID_MATERIAL_GLTF2, b"{\"metallic\":0.5}");
    blue.bytes = packets.bytes;
    let blue = scene.add_material(blue);

    let cube_parts = |material_idx| {
        vec![
            NodePart { active: 1, material_idx, node_idx: -1 },
            NodePart { active: 1, material_idx, node_idx: -1 },
        ]
    };
    let child_a = scene.add_node(Node {
        object_tm: translate(3.0, 0.0, 0.0),
        geometry_idx: cube_idx,
        parts: cube_parts(red),
        ..Node::identity()
    });
    let child_b = scene.add_node(Node {
        object_tm: translate(-3.0, 0.0, 0.0),
        geometry_idx: cube_idx,
        parts: cube_parts(blue),
        ..Node::identity()
    });
    let root = scene.add_node(Node {
        object_tm: translate(0.0, 1.0, 0.0),
        children: vec![child_a, child_b],
        ..Node::identity()
    });
    scene.root_idx = root;

    scene.file_meta = Some(Meta {
        name: "demo".into(),
        flags: 0,
        bytes: b"two cubes".to_vec(),
    });

    scene.propagate_transforms()?;

    scene.save("two_cubes.csf")?;
    scene.save_ext("two_cubes.csf.gz")?;

    let reloaded = Scene::load("two_cubes.csf")?;
    assert_eq!(reloaded, Scene::load_ext("two_cubes.csf.gz")?);
    println!(
        "Round trip OK: {} geometries, {} materials, {} nodes.",
        reloaded.geometries.len(),
        reloaded.materials.len(),
        reloaded.nodes.len(),
    );
    Ok(())
}
