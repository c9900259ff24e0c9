use cadscene::header::FLAG_UNIQUENODES;
use cadscene::LoadSettings;

use crate::CommonArgs;
use crate::prelude::*;
use crate::util::load_scene;

#[derive(clap::Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    inpath: crate::InputPath,
}

pub fn run(
    args_common: &CommonArgs,
    args_cmd: &VerifyArgs,
) -> AnyResult<()> {
    // Always validate, that is the point of this command.
    let mut scene = load_scene(
        args_common,
        &args_cmd.inpath.in_file,
        LoadSettings { validate: true },
    )?;
    if args_common.verbose {
        eprintln!("All offsets and indices OK.");
    }
    if scene.file_flags & FLAG_UNIQUENODES != 0 {
        scene
            .propagate_transforms()
            .context("Cannot walk the node hierarchy")?;
        if args_common.verbose {
            eprintln!("Node hierarchy OK.");
        }
    }
    scene.to_vec().context("Cannot re-serialize the scene")?;
    if args_common.verbose {
        eprintln!("Scene serializes cleanly.");
    }
    Ok(())
}
