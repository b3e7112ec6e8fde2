//! Optical train prescription
//!
//! Load the instrument prescription from a *prescription.csv* file, one record
//! per optical element from the entrance pupil down to the science focal
//! plane.  Elements carrying a surface PSD label are the ones a wavefront
//! error map is synthesized for.

use serde::Deserialize;
use std::{fmt, fs::File, io::Read, ops::Deref, path::Path, str::FromStr};
use strum_macros::{Display, EnumString};

#[derive(thiserror::Error, Debug)]
pub enum PrescriptionError {
    #[error("Failed to open the prescription file")]
    Io(#[from] std::io::Error),
    #[error("Failed to deserialize the CSV file")]
    Csv(#[from] csv::Error),
    #[error("Unknown optical element type: {0}")]
    UnknownKind(String),
    #[error("Focusing element {0} has no focal length")]
    MissingFocalLength(String),
    #[error("The prescription is empty")]
    Empty,
}

type Result<T> = std::result::Result<T, PrescriptionError>;

/// Optical element category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum OpticKind {
    Pupil,
    Mirror,
    Lens,
    Flat,
    Focus,
}
impl OpticKind {
    /// True for surfaces working in reflection, where the surface height
    /// counts twice in the optical path
    pub fn is_reflective(&self) -> bool {
        matches!(self, OpticKind::Mirror | OpticKind::Flat)
    }
    /// True for surfaces that must carry a focal length
    pub fn is_focusing(&self) -> bool {
        matches!(self, OpticKind::Mirror | OpticKind::Lens)
    }
}

#[derive(Deserialize, Debug)]
struct Record {
    #[serde(rename = "Optical Element Number")]
    index: usize,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Focal Length (m)")]
    focal_length: Option<f64>,
    #[serde(rename = "Distance (m)")]
    distance: f64,
    #[serde(rename = "Diameter (m)")]
    diameter: Option<f64>,
    #[serde(rename = "Surface PSD")]
    surface_psd: Option<String>,
}

/// A single element of the optical train
#[derive(Debug, Clone)]
pub struct Element {
    pub index: usize,
    pub name: String,
    pub kind: OpticKind,
    /// Focal length [m] of a focusing element
    pub focal_length: Option<f64>,
    /// Distance [m] to the next element
    pub distance: f64,
    /// Clear aperture diameter [m]
    pub diameter: Option<f64>,
    /// Label of the PSD parameter set that applies to this surface
    pub surface_psd: Option<String>,
}
impl Element {
    fn from_record(record: Record) -> Result<Self> {
        let kind = OpticKind::from_str(&record.kind)
            .map_err(|_| PrescriptionError::UnknownKind(record.kind.clone()))?;
        // flats and folds have their own kind, a mirror is a powered surface
        if kind.is_focusing() && record.focal_length.is_none() {
            return Err(PrescriptionError::MissingFocalLength(record.name));
        }
        Ok(Self {
            index: record.index,
            name: record.name,
            kind,
            focal_length: record.focal_length,
            distance: record.distance,
            diameter: record.diameter,
            surface_psd: record.surface_psd.filter(|psd| psd.as_str() != "none"),
        })
    }
    /// Optical power [1/m] of the element
    pub fn power(&self) -> f64 {
        self.focal_length.map_or(0f64, f64::recip)
    }
}
impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02} {:10} {:6} f:{:>8} d:{:6.3}m",
            self.index,
            self.name,
            self.kind.to_string(),
            self.focal_length
                .map_or("---".to_string(), |f| format!("{:.3}m", f)),
            self.distance
        )
    }
}

/// The optical train, entrance pupil first
#[derive(Debug)]
pub struct Prescription(Vec<Element>);
impl Deref for Prescription {
    type Target = Vec<Element>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl Prescription {
    /// Returns the element matching `name`
    pub fn get(&self, name: &str) -> Option<&Element> {
        self.iter().find(|element| element.name == name)
    }
    /// Returns the elements that carry a surface PSD label
    pub fn wfe_surfaces(&self) -> impl Iterator<Item = &Element> {
        self.iter().filter(|element| element.surface_psd.is_some())
    }
    /// Prescription digest: element count, track length and flagged surfaces
    pub fn summary(&self) {
        println!("PRESCRIPTION:");
        println!(" - # of elements: {}", self.len());
        println!(
            " - track length: {:.3}m",
            self.iter().map(|element| element.distance).sum::<f64>()
        );
        println!(
            " - # of PSD WFE surfaces: {}",
            self.wfe_surfaces().count()
        );
        for element in self.iter() {
            println!("  - {}", element);
        }
    }
}

/// [Prescription] loader from a CSV file
///
/// The loader always returns the complete optical train: the beam sampling
/// at a surface depends on every element upstream of it
pub struct PrescriptionLoader {
    path: String,
}
impl Default for PrescriptionLoader {
    fn default() -> Self {
        Self {
            path: String::from("prescription.csv"),
        }
    }
}
impl PrescriptionLoader {
    pub fn data_path<S: AsRef<Path>>(self, data_path: S) -> Self {
        let path = data_path.as_ref().join("prescription.csv");
        Self {
            path: path.to_string_lossy().into_owned(),
        }
    }
    pub fn path<S: Into<String>>(self, path: S) -> Self {
        Self { path: path.into() }
    }
    pub fn load(self) -> Result<Prescription> {
        log::info!("Loading {} ...", self.path);
        let mut contents = String::new();
        File::open(&self.path)?.read_to_string(&mut contents)?;
        self.parse(contents.as_bytes())
    }
    fn parse(self, contents: &[u8]) -> Result<Prescription> {
        let mut rdr = csv::Reader::from_reader(contents);
        let elements = rdr
            .deserialize()
            .collect::<std::result::Result<Vec<Record>, csv::Error>>()?
            .into_iter()
            .map(Element::from_record)
            .collect::<Result<Vec<Element>>>()?;
        if elements.is_empty() {
            return Err(PrescriptionError::Empty);
        }
        log::info!("{} elements", elements.len());
        Ok(Prescription(elements))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub const CSV: &str = r#"Optical Element Number,Name,Type,Focal Length (m),Distance (m),Diameter (m),Surface PSD
0,pupil,pupil,,0.563,0.009,none
1,OAP-0,mirror,0.143,0.143,0.0127,oap
2,F-1,flat,,0.32,0.0127,flat-fold
3,L-1,lens,0.2,0.2,0.0254,none
4,focus,focus,,0,,none
"#;

    pub fn prescription() -> Prescription {
        PrescriptionLoader::default().parse(CSV.as_bytes()).unwrap()
    }

    #[test]
    fn load_prescription() {
        let rx = prescription();
        assert_eq!(rx.len(), 5);
        assert_eq!(rx[1].kind, OpticKind::Mirror);
        assert_eq!(rx[1].surface_psd.as_deref(), Some("oap"));
        assert!(rx[0].surface_psd.is_none());
        assert!(rx[3].surface_psd.is_none());
    }
    #[test]
    fn wfe_surfaces() {
        let rx = prescription();
        let names: Vec<_> = rx.wfe_surfaces().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["OAP-0", "F-1"]);
    }
    #[test]
    fn lens_without_focal_length() {
        let csv = r#"Optical Element Number,Name,Type,Focal Length (m),Distance (m),Diameter (m),Surface PSD
0,L-1,lens,,0.2,0.0254,none
"#;
        assert!(matches!(
            PrescriptionLoader::default().parse(csv.as_bytes()),
            Err(PrescriptionError::MissingFocalLength(_))
        ));
    }
    #[test]
    fn mirror_without_focal_length() {
        // a powered mirror must not silently degrade to a flat
        let csv = r#"Optical Element Number,Name,Type,Focal Length (m),Distance (m),Diameter (m),Surface PSD
0,OAP-0,mirror,,0.143,0.0127,oap
"#;
        assert!(matches!(
            PrescriptionLoader::default().parse(csv.as_bytes()),
            Err(PrescriptionError::MissingFocalLength(_))
        ));
    }
    #[test]
    fn flat_without_focal_length() {
        let csv = r#"Optical Element Number,Name,Type,Focal Length (m),Distance (m),Diameter (m),Surface PSD
0,F-1,flat,,0.32,0.0127,none
"#;
        let rx = PrescriptionLoader::default().parse(csv.as_bytes()).unwrap();
        assert_eq!(rx[0].power(), 0f64);
    }
    #[test]
    fn unknown_kind() {
        let csv = r#"Optical Element Number,Name,Type,Focal Length (m),Distance (m),Diameter (m),Surface PSD
0,G-1,grating,,0.2,0.0254,none
"#;
        assert!(matches!(
            PrescriptionLoader::default().parse(csv.as_bytes()),
            Err(PrescriptionError::UnknownKind(_))
        ));
    }
    #[test]
    fn empty_prescription() {
        let csv = "Optical Element Number,Name,Type,Focal Length (m),Distance (m),Diameter (m),Surface PSD\n";
        assert!(matches!(
            PrescriptionLoader::default().parse(csv.as_bytes()),
            Err(PrescriptionError::Empty)
        ));
    }
}
