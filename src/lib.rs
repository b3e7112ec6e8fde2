//! # MagAO-X PSD wavefront error maps
//!
//! Generation of PSD-based wavefront error maps for the surfaces of the
//! MagAO-X optical train:
//!
//!  1. the instrument prescription is read from a CSV file
//!     ([prescription::PrescriptionLoader]),
//!  2. a Gaussian beam is propagated through the train to sample the beam at
//!     every surface ([beam::SamplingConfig]),
//!  3. pre-fit PSD model parameters and per-optic random seeds are loaded
//!     from pickle files ([psd::PsdSet], [psd::SeedSet]),
//!  4. for each surface flagged in the prescription, an OPD wavefront error
//!     realization is drawn from its PSD and saved to a *.npy* file
//!     ([wfe::WfeMap]).

pub mod beam;
pub mod error;
pub mod prescription;
pub mod psd;
pub mod wfe;

pub use beam::{SamplingConfig, SurfaceSampling};
pub use error::Error;
pub use prescription::{Element, OpticKind, Prescription, PrescriptionLoader};
pub use psd::{PsdParameters, PsdSet, SeedSet};
pub use wfe::WfeMap;
