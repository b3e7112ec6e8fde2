//! WFE maps
//!
//! Plot the wavefront error maps as heatmaps

use glob::glob;
use psd_wfe::WfeMap;
use rayon::prelude::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "wfe_maps", about = "Plotting wavefront error maps")]
struct Opt {
    /// Path to the wavefront error map repository
    #[structopt(default_value = ".")]
    path: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let files: Vec<_> = glob(&format!("{}/*_wfe.npy", opt.path))?
        .collect::<Result<Vec<_>, _>>()?;
    files.into_par_iter().try_for_each(|file| {
        let map = WfeMap::load(&file)?;
        let n = map.n();
        let micron: Vec<f64> = map.map().iter().map(|x| x * 1e6).collect();
        let filename = format!("{}", file.with_extension("png").display());
        let _: complot::Heatmap = (
            (micron.as_slice(), (n, n)),
            complot::complot!(filename, xlabel = "WFE [micron]"),
        )
            .into();
        Ok::<(), anyhow::Error>(())
    })?;
    Ok(())
}
