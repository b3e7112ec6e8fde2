use indicatif::ParallelProgressIterator;
use psd_wfe::{PrescriptionLoader, PsdSet, SamplingConfig, SeedSet, WfeMap};
use rayon::prelude::*;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "psd-wfe", about = "MagAO-X PSD wavefront error map generation")]
struct Opt {
    /// Path to the prescription CSV file
    #[structopt(long, default_value = "prescription.csv")]
    prescription: String,
    /// Path to the pickled PSD parameter sets
    #[structopt(long, default_value = "psd_parameters.pkl")]
    psd: String,
    /// Path to the pickled per-optic seeds
    #[structopt(long, default_value = "seeds.pkl")]
    seeds: String,
    /// Output directory for the wavefront error maps
    #[structopt(short, long, default_value = ".")]
    out: PathBuf,
    /// Regular expression selecting which flagged surfaces to synthesize
    #[structopt(short, long)]
    filter: Option<String>,
    /// Number of pixels across the beam
    #[structopt(long, default_value = "512")]
    npix: usize,
    /// Beam to array size ratio
    #[structopt(long, default_value = "0.25")]
    beam_ratio: f64,
    /// Wavelength [m]
    #[structopt(long, default_value = "656.3e-9")]
    wavelength: f64,
    /// Beam diameter [m] at the entrance pupil
    #[structopt(long, default_value = "9e-3")]
    beam_diameter: f64,
    /// Print the prescription summary and exit
    #[structopt(long)]
    summary: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let rx = PrescriptionLoader::default()
        .path(opt.prescription.as_str())
        .load()?;
    if opt.summary {
        rx.summary();
        return Ok(());
    }

    let psds = PsdSet::load(&opt.psd)?;
    let seeds = SeedSet::load(&opt.seeds)?;

    // the beam always propagates through the complete train, the filter only
    // selects which flagged surfaces get a map
    let sampling = SamplingConfig::default()
        .wavelength(opt.wavelength)
        .npix(opt.npix)
        .beam_ratio(opt.beam_ratio)
        .beam_diameter(opt.beam_diameter)
        .sample(&rx)?;

    let filter = regex::Regex::new(opt.filter.as_deref().unwrap_or(r"\w+"))?;
    std::fs::create_dir_all(&opt.out)?;
    let surfaces: Vec<_> = rx
        .iter()
        .zip(&sampling)
        .filter(|(element, _)| filter.is_match(&element.name))
        .filter_map(|(element, sampling)| {
            element
                .surface_psd
                .as_deref()
                .map(|label| (element, label, sampling))
        })
        .collect();
    let n_surfaces = surfaces.len();
    log::info!("{} surfaces to synthesize", n_surfaces);

    let mut maps = surfaces
        .into_par_iter()
        .progress_count(n_surfaces as u64)
        .map(|(element, label, sampling)| {
            let parameters = psds.get_or_err(label)?;
            let seed = seeds.get_or_err(&element.name)?;
            let map = WfeMap::synthesize(element, parameters, seed, sampling)?;
            map.save(&opt.out)?;
            Ok((element.index, map, sampling.pitch))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    maps.sort_by_key(|(index, ..)| *index);

    println!("WFE MAPS:");
    println!(
        "    {:^10} {:>6} {:>12} {:>12} {:>12}",
        "SURFACE", "N", "PITCH [um]", "RMS [nm]", "PV [nm]"
    );
    for (_, map, pitch) in &maps {
        println!(
            "  - {:10} {:>6} {:>12.3} {:>12.3} {:>12.3}",
            map.name,
            map.n(),
            pitch * 1e6,
            map.rms() * 1e9,
            map.peak_to_valley() * 1e9
        );
    }
    Ok(())
}
