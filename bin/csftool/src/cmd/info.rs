use cadscene::header::{
    FLAG_META_FILE, FLAG_META_GEOMETRY, FLAG_META_NODE, FLAG_STRIPS, FLAG_UNIQUENODES,
};
use cadscene::LoadSettings;

use crate::CommonArgs;
use crate::prelude::*;
use crate::util::load_scene;

#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    rarg: crate::ReadArgs,
    #[command(flatten)]
    inpath: crate::InputPath,
}

pub fn run(
    args_common: &CommonArgs,
    args_cmd: &InfoArgs,
) -> AnyResult<()> {
    let scene = load_scene(
        args_common,
        &args_cmd.inpath.in_file,
        LoadSettings::from(&args_cmd.rarg),
    )?;

    println!("Flags: {:#x}", scene.file_flags);
    for (bit, name) in [
        (FLAG_UNIQUENODES, "unique-nodes"),
        (FLAG_STRIPS, "strips"),
        (FLAG_META_NODE, "node-metas"),
        (FLAG_META_GEOMETRY, "geometry-metas"),
        (FLAG_META_FILE, "file-meta"),
    ] {
        if scene.file_flags & bit != 0 {
            println!("  {}", name);
        }
    }
    println!("Root node: {}", scene.root_idx);
    println!("Geometries: {}", scene.geometries.len());
    for (i, geo) in scene.geometries.iter().enumerate() {
        println!(
            "  [{}] {} vertices, {} parts, {} solid / {} wire indices",
            i,
            geo.num_vertices(),
            geo.parts.len(),
            geo.index_solid.len(),
            geo.index_wire.len(),
        );
        if args_common.verbose {
            println!(
                "      channels: {} normal, {} tex, {} aux {:?}, {} per-part {:?}",
                geo.num_normal_channels(),
                geo.num_tex_channels(),
                geo.num_aux_channels(),
                geo.aux_storage_order,
                geo.num_part_channels(),
                geo.perpart_storage_order,
            );
        }
    }
    println!("Materials: {}", scene.materials.len());
    for (i, mat) in scene.materials.iter().enumerate() {
        println!(
            "  [{}] {:?}, type {}, {} payload bytes",
            i,
            mat.name,
            mat.material_type,
            mat.bytes.len(),
        );
    }
    println!("Nodes: {}", scene.nodes.len());
    if let Some(meta) = &scene.file_meta {
        println!(
            "File meta: {:?}, flags {:#x}, {} bytes",
            meta.name,
            meta.flags,
            meta.bytes.len(),
        );
    }

    Ok(())
}
