//! Wavefront error map synthesis
//!
//! Draw a wavefront error realization of an optical surface from its PSD
//! model: one uniformly distributed random phase per Fourier mode, an
//! amplitude set by the PSD, an inverse 2D FFT and a rescaling of the map to
//! the surface RMS.  Reflective surfaces get a factor of 2 from surface
//! height to optical path difference.  Maps are stored as *.npy* files.

use crate::{
    beam::SurfaceSampling,
    prescription::Element,
    psd::PsdParameters,
};
use ndarray::Array2;
use rand::prelude::*;
use rustfft::{num_complex::Complex64, FftPlanner};
use std::{
    f64::consts::PI,
    fs::File,
    io::{self, BufWriter},
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum WfeError {
    #[error("Failed to read or write the wavefront error map")]
    Io(#[from] io::Error),
    #[error("Wavefront map layout error")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Sampling {0:?} does not match element {1:?}")]
    Mismatch(String, String),
    #[error("The synthesized map for {0:?} is degenerate")]
    Degenerate(String),
    #[error("{0:?} does not hold a square 2D map")]
    NotASquareMap(PathBuf),
}

type Result<T> = std::result::Result<T, WfeError>;

/// An OPD wavefront error map [m]
#[derive(Debug)]
pub struct WfeMap {
    pub name: String,
    /// Pixel pitch [m], unknown for maps read back from disk
    pub pitch: Option<f64>,
    map: Array2<f64>,
}
impl WfeMap {
    /// Synthesizes the OPD map of `element` from its PSD model
    pub fn synthesize(
        element: &Element,
        parameters: &PsdParameters,
        seed: u64,
        sampling: &SurfaceSampling,
    ) -> Result<Self> {
        if sampling.name != element.name {
            return Err(WfeError::Mismatch(
                sampling.name.clone(),
                element.name.clone(),
            ));
        }
        let n = sampling.n;
        let pitch = sampling.pitch;
        let dk = (n as f64 * pitch).recip();
        let psd = parameters.grid(n, pitch);

        // one random phase per mode, amplitude from the PSD
        let mut rng = StdRng::seed_from_u64(seed);
        let mut spectrum: Vec<Complex64> = psd
            .iter()
            .map(|&p| {
                let phase = rng.gen_range(0f64..2f64 * PI);
                Complex64::from_polar(p.sqrt() * dk, phase)
            })
            .collect();
        ifft2(&mut spectrum, n);

        let mut map = Array2::from_shape_vec((n, n), spectrum.iter().map(|c| c.re).collect())?;
        let rms = (map.iter().map(|x| x * x).sum::<f64>() / (n * n) as f64).sqrt();
        if !(rms.is_finite() && rms > 0f64) {
            return Err(WfeError::Degenerate(element.name.clone()));
        }
        // the spectrum is not Hermitian, taking the real part halves the
        // variance; the map is rescaled to the surface RMS instead
        let surface_rms = parameters
            .rms
            .unwrap_or_else(|| parameters.implied_rms(n, pitch));
        let mut gain = surface_rms / rms;
        if element.kind.is_reflective() {
            gain *= 2f64;
        }
        map.mapv_inplace(|x| x * gain);

        Ok(Self {
            name: element.name.clone(),
            pitch: Some(pitch),
            map,
        })
    }
    /// Reads a map back from a *.npy* file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let npy = npyz::NpyFile::new(&bytes[..])?;
        let shape = npy.shape().to_vec();
        match shape.as_slice() {
            [n, m] if n == m => {
                let n = *n as usize;
                let map = Array2::from_shape_vec((n, n), npy.into_vec::<f64>()?)?;
                let name = path
                    .file_stem()
                    .map(|stem| {
                        stem.to_string_lossy()
                            .trim_end_matches("_wfe")
                            .to_string()
                    })
                    .unwrap_or_default();
                Ok(Self {
                    name,
                    pitch: None,
                    map,
                })
            }
            _ => Err(WfeError::NotASquareMap(path.to_path_buf())),
        }
    }
    /// Writes the map to `<dir>/<name>_wfe.npy`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        use npyz::WriterBuilder;
        let path = dir.as_ref().join(format!("{}_wfe.npy", self.name));
        log::info!("Saving {:?} ...", path);
        let n = self.n() as u64;
        let file = BufWriter::new(File::create(&path)?);
        let mut writer = npyz::WriteOptions::new()
            .default_dtype()
            .shape(&[n, n])
            .writer(file)
            .begin_nd()?;
        writer.extend(self.map.iter().copied())?;
        writer.finish()?;
        Ok(path)
    }
    /// Map size [pixel]
    pub fn n(&self) -> usize {
        self.map.dim().0
    }
    pub fn map(&self) -> &Array2<f64> {
        &self.map
    }
    /// OPD RMS [m]
    pub fn rms(&self) -> f64 {
        (self.map.iter().map(|x| x * x).sum::<f64>() / self.map.len() as f64).sqrt()
    }
    /// OPD peak-to-valley [m]
    pub fn peak_to_valley(&self) -> f64 {
        let max = self.map.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = self.map.iter().cloned().fold(f64::INFINITY, f64::min);
        max - min
    }
}

fn ifft2(buf: &mut [Complex64], n: usize) {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_inverse(n);
    for row in buf.chunks_exact_mut(n) {
        fft.process(row);
    }
    transpose(buf, n);
    for row in buf.chunks_exact_mut(n) {
        fft.process(row);
    }
    transpose(buf, n);
}
fn transpose(buf: &mut [Complex64], n: usize) {
    for i in 0..n {
        for j in i + 1..n {
            buf.swap(i * n + j, j * n + i);
        }
    }
}
