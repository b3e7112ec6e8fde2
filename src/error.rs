use crate::{
    beam::BeamError, prescription::PrescriptionError, psd::PsdError, wfe::WfeError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `prescription` module")]
    Prescription(#[from] PrescriptionError),
    #[error("Error in the `beam` module")]
    Beam(#[from] BeamError),
    #[error("Error in the `psd` module")]
    Psd(#[from] PsdError),
    #[error("Error in the `wfe` module")]
    Wfe(#[from] WfeError),
}
