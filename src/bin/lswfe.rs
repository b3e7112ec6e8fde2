//! List the wavefront error maps of a directory
//!
//! Scans a directory for *_wfe.npy* files and prints the statistics of each
//! map

use glob::glob;
use psd_wfe::WfeMap;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "lswfe", about = "Listing wavefront error maps")]
struct Opt {
    /// Path to the wavefront error map repository
    #[structopt(default_value = ".")]
    path: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let pattern = format!("{}/*_wfe.npy", opt.path);
    println!(
        "    {:^10} {:>6} {:>12} {:>12}",
        "SURFACE", "N", "RMS [nm]", "PV [nm]"
    );
    for entry in glob(&pattern)? {
        let map = WfeMap::load(entry?)?;
        println!(
            "  - {:10} {:>6} {:>12.3} {:>12.3}",
            map.name,
            map.n(),
            map.rms() * 1e9,
            map.peak_to_valley() * 1e9
        );
    }
    Ok(())
}
