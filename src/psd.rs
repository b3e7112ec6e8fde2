//! Surface power spectral density model
//!
//! Von Karman PSD of the surface figure of an optic:
//!
//! `PSD(k) = beta / (L^-2 + k^2)^(alpha/2) * exp(-(k l)^2) + roughness`
//!
//! with `k` the spatial frequency [1/m], `L` the outer scale [m] and `l` the
//! inner scale [m].  The parameter sets are pre-fit to metrology data and
//! loaded from a pickle file, together with the per-optic random seeds used
//! to draw wavefront error realizations.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_pickle as pickle;
use std::{collections::BTreeMap, ops::Deref, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum PsdError {
    #[error("Failed to open the PSD data file")]
    Io(#[from] std::io::Error),
    #[error("Failed to deserialize the pickle file")]
    Pickle(#[from] pickle::Error),
    #[error("No PSD parameter set labelled {0:?}")]
    Missing(String),
    #[error("No seed for optic {0:?}")]
    MissingSeed(String),
    #[error("Invalid PSD parameter {1} for {0:?}")]
    Invalid(String, &'static str),
}

type Result<T> = std::result::Result<T, PsdError>;

/// Pre-fit PSD model parameters of one optical surface
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PsdParameters {
    /// Power law exponent
    pub alpha: f64,
    /// Normalization [m^2 m^(2-alpha)]
    pub beta: f64,
    /// Outer scale [m]
    pub outer_scale: f64,
    /// Inner scale [m]
    pub inner_scale: f64,
    /// Surface roughness floor [m^2 m^2]
    pub roughness: f64,
    /// Target surface RMS [m], overrides the model implied RMS
    pub rms: Option<f64>,
}
impl PsdParameters {
    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |parameter| Err(PsdError::Invalid(name.to_string(), parameter));
        if !(self.alpha.is_finite() && self.alpha > 0f64) {
            return invalid("alpha");
        }
        if !(self.beta.is_finite() && self.beta > 0f64) {
            return invalid("beta");
        }
        if !(self.outer_scale.is_finite() && self.outer_scale > 0f64) {
            return invalid("outer_scale");
        }
        if !(self.inner_scale.is_finite() && self.inner_scale >= 0f64) {
            return invalid("inner_scale");
        }
        if !(self.roughness.is_finite() && self.roughness >= 0f64) {
            return invalid("roughness");
        }
        Ok(())
    }
    /// PSD at the spatial frequency `k` [1/m]
    pub fn at(&self, k: f64) -> f64 {
        let von_karman = self.beta
            / (self.outer_scale.powi(-2) + k * k).powf(0.5 * self.alpha)
            * (-(k * self.inner_scale).powi(2)).exp();
        von_karman + self.roughness
    }
    /// PSD evaluated on the `n x n` FFT frequency grid of a map sampled at
    /// `pitch` [m], with the piston (DC) term zeroed
    pub fn grid(&self, n: usize, pitch: f64) -> Array2<f64> {
        let dk = (n as f64 * pitch).recip();
        let k = fftfreq(n, dk);
        let mut psd = Array2::from_shape_fn((n, n), |(i, j)| {
            self.at((k[i] * k[i] + k[j] * k[j]).sqrt())
        });
        psd[(0, 0)] = 0f64;
        psd
    }
    /// Surface RMS implied by the model on the same grid as [PsdParameters::grid]
    pub fn implied_rms(&self, n: usize, pitch: f64) -> f64 {
        let dk = (n as f64 * pitch).recip();
        (self.grid(n, pitch).sum() * dk * dk).sqrt()
    }
}

/// FFT frequency samples, in the usual DC-first wrap-around order
pub(crate) fn fftfreq(n: usize, dk: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            if i < n.div_ceil(2) {
                i as f64 * dk
            } else {
                (i as f64 - n as f64) * dk
            }
        })
        .collect()
}

/// PSD parameter sets keyed by surface label
#[derive(Deserialize, Debug)]
pub struct PsdSet(BTreeMap<String, PsdParameters>);
impl Deref for PsdSet {
    type Target = BTreeMap<String, PsdParameters>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl PsdSet {
    /// Load the parameter sets from a pickle file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::info!("Loading {:?} ...", path.as_ref());
        Self::from_slice(&std::fs::read(path)?)
    }
    /// Deserialize the parameter sets from a pickled byte stream
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let this = Self(pickle::from_slice(bytes, Default::default())?);
        for (name, parameters) in this.iter() {
            parameters.validate(name)?;
        }
        Ok(this)
    }
    pub fn get_or_err(&self, name: &str) -> Result<&PsdParameters> {
        self.get(name).ok_or_else(|| PsdError::Missing(name.into()))
    }
}

/// Per-optic random seeds keyed by surface label
#[derive(Deserialize, Debug)]
pub struct SeedSet(BTreeMap<String, u64>);
impl Deref for SeedSet {
    type Target = BTreeMap<String, u64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl SeedSet {
    /// Load the seeds from a pickle file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::info!("Loading {:?} ...", path.as_ref());
        Self::from_slice(&std::fs::read(path)?)
    }
    /// Deserialize the seeds from a pickled byte stream
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(Self(pickle::from_slice(bytes, Default::default())?))
    }
    pub fn get_or_err(&self, name: &str) -> Result<u64> {
        self.get(name)
            .copied()
            .ok_or_else(|| PsdError::MissingSeed(name.into()))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub fn parameters() -> PsdParameters {
        PsdParameters {
            alpha: 3.0,
            beta: 1e-20,
            outer_scale: 0.1,
            inner_scale: 1e-5,
            roughness: 0f64,
            rms: None,
        }
    }

    #[test]
    fn power_law_tail() {
        // well above 1/L and below 1/l, the model follows beta * k^-alpha
        let psd = parameters();
        let k = 1000f64;
        assert_relative_eq!(
            psd.at(k),
            psd.beta * k.powf(-psd.alpha),
            max_relative = 1e-2
        );
    }
    #[test]
    fn grid_dc_is_zero() {
        let psd = parameters().grid(64, 1e-4);
        assert_eq!(psd[(0, 0)], 0f64);
        assert!(psd.iter().all(|&x| x >= 0f64));
    }
    #[test]
    fn implied_rms_is_positive() {
        assert!(parameters().implied_rms(64, 1e-4) > 0f64);
    }
    #[test]
    fn validation() {
        let mut psd = parameters();
        psd.alpha = f64::NAN;
        assert!(matches!(
            psd.validate("oap"),
            Err(PsdError::Invalid(_, "alpha"))
        ));
        let mut psd = parameters();
        psd.roughness = -1f64;
        assert!(psd.validate("oap").is_err());
        assert!(parameters().validate("oap").is_ok());
    }
    #[test]
    fn fftfreq_ordering() {
        let k = fftfreq(4, 0.5);
        assert_eq!(k, vec![0f64, 0.5, -1f64, -0.5]);
        let k = fftfreq(5, 1f64);
        assert_eq!(k, vec![0f64, 1f64, 2f64, -2f64, -1f64]);
    }
    #[test]
    fn pickled_parameters() {
        let mut map = BTreeMap::new();
        map.insert("oap".to_string(), parameters());
        let bytes = serde_pickle::to_vec(&map, Default::default()).unwrap();
        let psds = PsdSet::from_slice(&bytes).unwrap();
        assert!(psds.get_or_err("oap").is_ok());
        assert!(matches!(
            psds.get_or_err("m1"),
            Err(PsdError::Missing(_))
        ));
    }
    #[test]
    fn pickled_seeds() {
        let mut map = BTreeMap::new();
        map.insert("OAP-0".to_string(), 1234u64);
        let bytes = serde_pickle::to_vec(&map, Default::default()).unwrap();
        let seeds = SeedSet::from_slice(&bytes).unwrap();
        assert_eq!(seeds.get_or_err("OAP-0").unwrap(), 1234);
        assert!(matches!(
            seeds.get_or_err("F-1"),
            Err(PsdError::MissingSeed(_))
        ));
    }
}
