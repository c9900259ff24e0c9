use cadscene::{LoadSettings, Scene};

use crate::CommonArgs;
use crate::prelude::*;

pub fn load_scene(
    args_common: &CommonArgs,
    path: &Path,
    settings: LoadSettings,
) -> AnyResult<Scene> {
    let scene = Scene::load_ext_with_settings(path, &settings)
        .with_context(|| format!("Cannot load scene file {:?}", path))?;
    if args_common.verbose {
        eprintln!(
            "Loaded {:?}: {} geometries, {} materials, {} nodes.",
            path,
            scene.geometries.len(),
            scene.materials.len(),
            scene.nodes.len(),
        );
    }
    Ok(scene)
}
