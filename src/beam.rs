//! Gaussian beam sampling
//!
//! Propagate the complex beam parameter through the prescription with 2x2
//! ABCD matrices and derive, for each surface, the beam radius and the pixel
//! pitch of its wavefront error map.

use crate::prescription::{Element, Prescription};
use nalgebra::Matrix2;
use num_complex::Complex64;
use std::f64::consts::PI;

#[derive(thiserror::Error, Debug)]
pub enum BeamError {
    #[error("Beam sampling at element {0} is not finite")]
    NonFinite(String),
    #[error("The beam ratio must be within ]0,1], got {0}")]
    BeamRatio(f64),
}

type Result<T> = std::result::Result<T, BeamError>;

/// Wavefront sampling parameters
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Wavelength [m]
    pub wavelength: f64,
    /// Number of pixels across the beam diameter
    pub npix: usize,
    /// Fraction of the array the beam occupies
    pub beam_ratio: f64,
    /// Beam diameter [m] at the entrance pupil
    pub beam_diameter: f64,
}
impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            wavelength: 656.3e-9,
            npix: 512,
            beam_ratio: 0.25,
            beam_diameter: 9e-3,
        }
    }
}
impl SamplingConfig {
    pub fn wavelength(self, wavelength: f64) -> Self {
        Self { wavelength, ..self }
    }
    pub fn npix(self, npix: usize) -> Self {
        Self { npix, ..self }
    }
    pub fn beam_ratio(self, beam_ratio: f64) -> Self {
        Self { beam_ratio, ..self }
    }
    pub fn beam_diameter(self, beam_diameter: f64) -> Self {
        Self {
            beam_diameter,
            ..self
        }
    }
    /// Size of the (square) wavefront error map
    pub fn array_size(&self) -> usize {
        let n = (self.npix as f64 / self.beam_ratio).ceil() as usize;
        n + n % 2
    }
    /// Propagates the beam through the prescription, returning the sampling
    /// at every surface
    pub fn sample(&self, prescription: &Prescription) -> Result<Vec<SurfaceSampling>> {
        if !(self.beam_ratio > 0f64 && self.beam_ratio <= 1f64) {
            return Err(BeamError::BeamRatio(self.beam_ratio));
        }
        let waist = 0.5 * self.beam_diameter;
        let rayleigh_range = PI * waist * waist / self.wavelength;
        // collimated beam at the entrance pupil
        let mut q = Complex64::new(0f64, rayleigh_range);
        let n = self.array_size();
        prescription
            .iter()
            .map(|element| {
                let radius = beam_radius(q, self.wavelength);
                let pitch = 2f64 * radius / self.npix as f64;
                if !(radius.is_finite() && pitch > 0f64) {
                    return Err(BeamError::NonFinite(element.name.clone()));
                }
                q = transform(q, element_abcd(element));
                q = transform(q, free_space(element.distance));
                Ok(SurfaceSampling {
                    index: element.index,
                    name: element.name.clone(),
                    radius,
                    pitch,
                    n,
                })
            })
            .collect()
    }
}

/// Beam geometry at a surface of the optical train
#[derive(Debug, Clone)]
pub struct SurfaceSampling {
    pub index: usize,
    pub name: String,
    /// Beam radius [m]
    pub radius: f64,
    /// Wavefront map pixel pitch [m]
    pub pitch: f64,
    /// Wavefront map size [pixel]
    pub n: usize,
}

fn free_space(distance: f64) -> Matrix2<f64> {
    Matrix2::new(1f64, distance, 0f64, 1f64)
}
fn element_abcd(element: &Element) -> Matrix2<f64> {
    Matrix2::new(1f64, 0f64, -element.power(), 1f64)
}
fn transform(q: Complex64, abcd: Matrix2<f64>) -> Complex64 {
    (abcd[(0, 0)] * q + abcd[(0, 1)]) / (abcd[(1, 0)] * q + abcd[(1, 1)])
}
fn beam_radius(q: Complex64, wavelength: f64) -> f64 {
    (-wavelength / (PI * q.inv().im)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prescription::tests::prescription;
    use approx::assert_relative_eq;

    #[test]
    fn free_space_expansion() {
        let wavelength = 656.3e-9;
        let waist = 4.5e-3;
        let rayleigh_range = PI * waist * waist / wavelength;
        let z = 2.5 * rayleigh_range;
        let q = transform(Complex64::new(0f64, rayleigh_range), free_space(z));
        let expected = waist * (1f64 + (z / rayleigh_range).powi(2)).sqrt();
        assert_relative_eq!(beam_radius(q, wavelength), expected, max_relative = 1e-12);
    }
    #[test]
    fn focused_beam() {
        // beam radius at the focus of a lens: w = lambda f / (pi w0)
        let wavelength = 656.3e-9;
        let waist = 4.5e-3;
        let f = 0.2;
        let mut q = Complex64::new(0f64, PI * waist * waist / wavelength);
        q = transform(q, Matrix2::new(1f64, 0f64, -1f64 / f, 1f64));
        q = transform(q, free_space(f));
        assert_relative_eq!(
            beam_radius(q, wavelength),
            wavelength * f / (PI * waist),
            max_relative = 1e-4
        );
    }
    #[test]
    fn sample_prescription() {
        let rx = prescription();
        let config = SamplingConfig::default();
        let sampling = config.sample(&rx).unwrap();
        assert_eq!(sampling.len(), rx.len());
        // collimated input: the pupil is sampled at beam_diameter/npix
        assert_relative_eq!(
            sampling[0].pitch,
            config.beam_diameter / config.npix as f64,
            max_relative = 1e-12
        );
        assert!(sampling.iter().all(|s| s.pitch > 0f64));
        assert_eq!(sampling[0].n, 2048);
    }
    #[test]
    fn downstream_sampling_includes_upstream_optics() {
        // the flat F-1 sits past the OAP focus: its pitch is set by the
        // focused beam, not by the pupil, and must not depend on which
        // surfaces are later selected for synthesis
        let rx = prescription();
        let config = SamplingConfig::default();
        let sampling = config.sample(&rx).unwrap();
        let f1 = rx.get("F-1").map(|e| &sampling[e.index]).unwrap();
        let waist = 0.5 * config.beam_diameter;
        let focused = config.wavelength * 0.143 / (PI * waist);
        assert_relative_eq!(
            f1.pitch,
            2f64 * focused / config.npix as f64,
            max_relative = 1e-3
        );
        assert!(f1.pitch < sampling[0].pitch * 1e-2);
    }
    #[test]
    fn bad_beam_ratio() {
        let rx = prescription();
        assert!(matches!(
            SamplingConfig::default().beam_ratio(0f64).sample(&rx),
            Err(BeamError::BeamRatio(_))
        ));
    }
}
