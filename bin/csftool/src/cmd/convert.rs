use cadscene::LoadSettings;

use crate::CommonArgs;
use crate::prelude::*;
use crate::util::load_scene;

#[derive(clap::Args, Debug)]
pub struct ConvertArgs {
    #[command(flatten)]
    rarg: crate::ReadArgs,
    #[command(flatten)]
    oarg: crate::OutputArgs,
    #[command(flatten)]
    inpath: crate::InputPath,
    #[command(flatten)]
    outpath: crate::OutputPath,
}

pub fn run(
    args_common: &CommonArgs,
    args_cmd: &ConvertArgs,
) -> AnyResult<()> {
    let scene = load_scene(
        args_common,
        &args_cmd.inpath.in_file,
        LoadSettings::from(&args_cmd.rarg),
    )?;

    let out_file = &args_cmd.outpath.out_file;
    if !args_cmd.oarg.overwrite && out_file.exists() {
        bail!("Output file {:?} already exists.", out_file);
    }
    scene
        .save_ext(out_file)
        .with_context(|| format!("Cannot save scene file {:?}", out_file))?;
    if args_common.verbose {
        eprintln!("Saved {:?}.", out_file);
    }
    Ok(())
}
