use cadscene::LoadSettings;

use crate::CommonArgs;
use crate::prelude::*;
use crate::util::load_scene;

#[derive(clap::Args, Debug)]
pub struct TransformArgs {
    #[command(flatten)]
    rarg: crate::ReadArgs,
    #[command(flatten)]
    paths: crate::InOutPaths,
}

pub fn run(
    args_common: &CommonArgs,
    args_cmd: &TransformArgs,
) -> AnyResult<()> {
    let mut scene = load_scene(
        args_common,
        &args_cmd.paths.in_file,
        LoadSettings::from(&args_cmd.rarg),
    )?;

    scene
        .propagate_transforms()
        .context("Cannot recompute world transforms")?;
    if args_common.verbose {
        eprintln!("World transforms recomputed.");
    }

    let out_file = args_cmd
        .paths
        .out_file
        .as_ref()
        .unwrap_or(&args_cmd.paths.in_file);
    scene
        .save_ext(out_file)
        .with_context(|| format!("Cannot save scene file {:?}", out_file))?;
    if args_common.verbose {
        eprintln!("Saved {:?}.", out_file);
    }
    Ok(())
}
