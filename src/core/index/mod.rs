//! Spectral index catalog and evaluator.
//!
//! The catalog is a process-wide, read-only registry built on first use. Each
//! [`IndexDefinition`] declares the canonical bands its formula reads; that
//! declaration drives dependency resolution (which bands to load for an
//! index) and is verified at registration by probing the formula with inputs
//! restricted to the declared bands.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use ndarray::{Array2, Zip};
use once_cell::sync::Lazy;
use tracing::debug;

use crate::core::raster::RasterArray;
use crate::error::{Error, Result};
use crate::types::CanonicalBand;

mod formulas;

/// Signature of an index formula
pub type Formula = fn(&Bands<'_>) -> Result<Array2<f64>>;

/// Band arrays handed to a formula. Reading a band that is not present fails
/// instead of panicking.
pub struct Bands<'a> {
    index: &'a str,
    arrays: &'a BTreeMap<CanonicalBand, Array2<f64>>,
    dim: (usize, usize),
}

impl<'a> Bands<'a> {
    fn new(index: &'a str, arrays: &'a BTreeMap<CanonicalBand, Array2<f64>>) -> Self {
        let dim = arrays.values().next().map(|a| a.dim()).unwrap_or((0, 0));
        Self { index, arrays, dim }
    }

    pub fn get(&self, band: CanonicalBand) -> Result<&'a Array2<f64>> {
        self.arrays.get(&band).ok_or_else(|| Error::MissingBandInputs {
            index: self.index.to_string(),
            missing: vec![band],
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }
}

#[derive(Clone)]
pub struct IndexDefinition {
    pub name: &'static str,
    /// Bands the formula reads, in order of first use
    pub bands: &'static [CanonicalBand],
    pub formula: Formula,
    pub description: &'static str,
}

impl std::fmt::Debug for IndexDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexDefinition")
            .field("name", &self.name)
            .field("bands", &self.bands)
            .finish()
    }
}

impl IndexDefinition {
    pub fn new(
        name: &'static str,
        bands: &'static [CanonicalBand],
        formula: Formula,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            bands,
            formula,
            description,
        }
    }

    /// Run the formula on 1x1 inputs holding only the declared bands
    fn probe(&self) -> Result<()> {
        let inputs: BTreeMap<_, _> = self
            .bands
            .iter()
            .map(|&b| (b, Array2::from_elem((1, 1), 0.5)))
            .collect();
        match (self.formula)(&Bands::new(self.name, &inputs)) {
            Ok(_) => Ok(()),
            Err(Error::MissingBandInputs { missing, .. }) => Err(Error::UndeclaredBand {
                index: self.name.to_string(),
                band: missing.first().copied().unwrap_or(CanonicalBand::CA),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Immutable registry of index definitions
#[derive(Debug)]
pub struct IndexCatalog {
    definitions: Vec<IndexDefinition>,
    by_name: HashMap<&'static str, usize>,
}

impl IndexCatalog {
    /// Register definitions; names must be unique and every formula must stay
    /// within its declared bands
    pub fn new(definitions: Vec<IndexDefinition>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if def.bands.is_empty() {
                return Err(Error::InvalidArgument {
                    arg: "bands",
                    value: format!("{} declares no band", def.name),
                });
            }
            if by_name.insert(def.name, i).is_some() {
                return Err(Error::DuplicateIndex(def.name.to_string()));
            }
            def.probe()?;
        }
        debug!("Registered {} spectral indices", definitions.len());
        Ok(Self {
            definitions,
            by_name,
        })
    }

    pub fn get(&self, name: &str) -> Result<&IndexDefinition> {
        self.by_name
            .get(name)
            .or_else(|| {
                self.by_name
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, i)| i)
            })
            .map(|&i| &self.definitions[i])
            .ok_or_else(|| Error::UnknownIndex(name.to_string()))
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> &[IndexDefinition] {
        &self.definitions
    }

    /// Sorted, de-duplicated index names
    pub fn names(&self) -> Vec<String> {
        self.by_name
            .keys()
            .map(|k| k.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn required_bands(&self, name: &str) -> Result<Vec<CanonicalBand>> {
        let mut seen = BTreeSet::new();
        Ok(self
            .get(name)?
            .bands
            .iter()
            .copied()
            .filter(|b| seen.insert(*b))
            .collect())
    }

    /// Evaluate `name` on plain arrays (no mask or metadata bookkeeping)
    pub fn evaluate_arrays(
        &self,
        name: &str,
        inputs: &BTreeMap<CanonicalBand, Array2<f64>>,
    ) -> Result<Array2<f64>> {
        let def = self.get(name)?;
        check_inputs(def, inputs.iter().map(|(b, a)| (*b, a.dim())))?;
        let restricted: BTreeMap<_, _> = def
            .bands
            .iter()
            .filter_map(|b| inputs.get(b).map(|a| (*b, a.clone())))
            .collect();
        (def.formula)(&Bands::new(def.name, &restricted))
    }

    /// Evaluate `name` on rasters keyed by canonical band.
    ///
    /// Masked pixels enter the formula as NaN. The result carries the metadata
    /// of the first declared band, is renamed after the index, and is masked
    /// wherever any input is masked or the formula is undefined.
    pub fn evaluate(
        &self,
        name: &str,
        inputs: &BTreeMap<CanonicalBand, RasterArray>,
    ) -> Result<RasterArray> {
        let def = self.get(name)?;
        check_inputs(def, inputs.iter().map(|(b, r)| (*b, r.shape())))?;

        let template = &inputs[&def.bands[0]];
        let mut mask = Array2::from_elem(template.shape(), false);
        let mut arrays = BTreeMap::new();
        for band in def.bands {
            let raster = &inputs[band];
            Zip::from(&mut mask).and(&raster.mask).for_each(|m, &v| *m |= v);
            arrays.insert(*band, raster.filled_nan());
        }

        let data = (def.formula)(&Bands::new(def.name, &arrays))?;
        if data.dim() != template.shape() {
            return Err(Error::ShapeMismatch {
                what: format!("{} result", def.name),
                expected: template.shape(),
                got: data.dim(),
            });
        }
        Zip::from(&mut mask).and(&data).for_each(|m, &v| *m |= v.is_nan());
        debug!("Computed {} on {:?}", def.name, data.dim());

        Ok(RasterArray {
            name: def.name.to_string(),
            data,
            mask,
            meta: template.meta.clone(),
        })
    }
}

/// All declared bands present and sharing one shape
fn check_inputs(
    def: &IndexDefinition,
    shapes: impl Iterator<Item = (CanonicalBand, (usize, usize))>,
) -> Result<()> {
    let shapes: BTreeMap<_, _> = shapes.collect();
    let mut missing: Vec<CanonicalBand> = def
        .bands
        .iter()
        .copied()
        .filter(|b| !shapes.contains_key(b))
        .collect();
    if !missing.is_empty() {
        missing.dedup();
        return Err(Error::MissingBandInputs {
            index: def.name.to_string(),
            missing,
        });
    }
    let expected = shapes[&def.bands[0]];
    for band in def.bands {
        let got = shapes[band];
        if got != expected {
            return Err(Error::ShapeMismatch {
                what: format!("{} input {}", def.name, band),
                expected,
                got,
            });
        }
    }
    Ok(())
}

static CATALOG: Lazy<std::result::Result<IndexCatalog, String>> =
    Lazy::new(|| IndexCatalog::new(formulas::builtin()).map_err(|e| e.to_string()));

/// The process-wide built-in catalog
pub fn catalog() -> Result<&'static IndexCatalog> {
    CATALOG
        .as_ref()
        .map_err(|e| Error::Processing(format!("index catalog initialization failed: {e}")))
}

/// Names of every built-in index, sorted
pub fn all_index_names() -> Result<Vec<String>> {
    Ok(catalog()?.names())
}

/// Canonical bands an index needs
pub fn required_bands(index: &str) -> Result<Vec<CanonicalBand>> {
    catalog()?.required_bands(index)
}

pub fn evaluate_index(
    index: &str,
    inputs: &BTreeMap<CanonicalBand, RasterArray>,
) -> Result<RasterArray> {
    catalog()?.evaluate(index, inputs)
}

pub fn evaluate_arrays(
    index: &str,
    inputs: &BTreeMap<CanonicalBand, Array2<f64>>,
) -> Result<Array2<f64>> {
    catalog()?.evaluate_arrays(index, inputs)
}
