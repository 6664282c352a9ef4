//! Sampling strategies that turn a validated schema into a table of samples.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::distribution::Distribution;
use crate::errors::SchemaError;
use crate::schema::{GeneratorKind, NUM_SIMULATIONS_KEY};
use crate::value::ParameterValue;

/// Raw output of a sampling strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct Samples {
    /// Column names of the sample table.
    pub parameter_names: Vec<String>,
    /// One row per parameter set, one column per parameter.
    pub samples: Array2<ParameterValue>,
    /// Unit hypercube coordinates behind `samples`, for distribution based designs.
    pub quantiles: Option<Array2<f64>>,
}

impl Samples {
    /// Build a sample table from rows of equal length.
    fn from_rows(parameter_names: Vec<String>, rows: &[Vec<ParameterValue>]) -> Self {
        let samples = Array2::from_shape_fn((rows.len(), parameter_names.len()), |(set, column)| {
            rows[set][column].clone()
        });
        Self {
            parameter_names,
            samples,
            quantiles: None,
        }
    }

    /// Build a sample table by mapping quantiles through each column's distribution.
    fn from_quantiles(parameters: &[(String, Distribution)], quantiles: Array2<f64>) -> Self {
        let samples = Array2::from_shape_fn(quantiles.dim(), |(set, column)| {
            ParameterValue::Float(parameters[column].1.ppf(quantiles[[set, column]]))
        });
        Self {
            parameter_names: parameters.iter().map(|(name, _)| name.clone()).collect(),
            samples,
            quantiles: Some(quantiles),
        }
    }
}

/// Capability shared by every study design.
pub trait Sampler {
    /// Produce the sample table.
    ///
    /// `seed` makes randomised designs reproducible; deterministic designs ignore it.
    fn sample(&self, seed: Option<u64>) -> Samples;
}

/// Every combination of the discrete values of each parameter.
///
/// Rows follow nested-loop order: the last parameter varies fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct CartesianProduct {
    /// Parameter names and their discrete values.
    parameters: Vec<(String, Vec<ParameterValue>)>,
}

impl CartesianProduct {
    /// Create the design from per-parameter value lists.
    #[must_use]
    pub fn new(parameters: Vec<(String, Vec<ParameterValue>)>) -> Self {
        Self { parameters }
    }
}

impl Sampler for CartesianProduct {
    fn sample(&self, _seed: Option<u64>) -> Samples {
        let names = self.parameters.iter().map(|(name, _)| name.clone()).collect();
        let total: usize = self.parameters.iter().map(|(_, values)| values.len()).product();
        let mut rows = Vec::with_capacity(total);
        let mut odometer = vec![0_usize; self.parameters.len()];
        for _ in 0..total {
            rows.push(
                self.parameters
                    .iter()
                    .zip(&odometer)
                    .map(|((_, values), &position)| values[position].clone())
                    .collect(),
            );
            for (digit, (_, values)) in odometer.iter_mut().zip(&self.parameters).rev() {
                *digit += 1;
                if *digit < values.len() {
                    break;
                }
                *digit = 0;
            }
        }
        Samples::from_rows(names, &rows)
    }
}

/// Stratified space-filling sample of continuous distributions.
#[derive(Clone, Debug, PartialEq)]
pub struct LatinHypercube {
    /// Number of parameter sets.
    num_simulations: usize,
    /// Parameter names and their distributions.
    parameters: Vec<(String, Distribution)>,
}

impl LatinHypercube {
    /// Create the design for `num_simulations` sets.
    #[must_use]
    pub fn new(num_simulations: usize, parameters: Vec<(String, Distribution)>) -> Self {
        Self {
            num_simulations,
            parameters,
        }
    }
}

impl Sampler for LatinHypercube {
    fn sample(&self, seed: Option<u64>) -> Samples {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let count = self.num_simulations;
        let mut quantiles = Array2::<f64>::zeros((count, self.parameters.len()));
        let mut strata: Vec<usize> = (0..count).collect();
        for mut column in quantiles.columns_mut() {
            strata.shuffle(&mut rng);
            for (cell, stratum) in column.iter_mut().zip(&strata) {
                // Open interval so unbounded distributions stay finite.
                let offset: f64 = rng.gen_range(f64::EPSILON..1.0);
                *cell = (*stratum as f64 + offset) / count as f64;
            }
        }
        Samples::from_quantiles(&self.parameters, quantiles)
    }
}

/// Largest number of parameters a [`SobolSequence`] can sample.
pub const MAX_DIMENSIONS: usize = sobol_burley::NUM_DIMENSIONS as usize;

/// Owen-scrambled Sobol sample of continuous distributions.
///
/// The first `2^k` sets are stratified in every parameter, and extending
/// `num_simulations` keeps the earlier sets unchanged for the same seed.
#[derive(Clone, Debug, PartialEq)]
pub struct SobolSequence {
    /// Number of parameter sets.
    num_simulations: u32,
    /// Parameter names and their distributions.
    parameters: Vec<(String, Distribution)>,
}

impl SobolSequence {
    /// Create the design for `num_simulations` sets.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::TooManyDimensions`] for more than [`MAX_DIMENSIONS`]
    /// parameters and [`SchemaError::InvalidValue`] when `num_simulations` does not fit
    /// the sequence index.
    pub fn new(
        num_simulations: usize,
        parameters: Vec<(String, Distribution)>,
    ) -> Result<Self, SchemaError> {
        if let Some((key, _)) = parameters.get(MAX_DIMENSIONS) {
            return Err(SchemaError::TooManyDimensions {
                key: key.clone(),
                requested: parameters.len(),
                supported: MAX_DIMENSIONS,
            });
        }
        let num_simulations =
            u32::try_from(num_simulations).map_err(|_| SchemaError::InvalidValue {
                key: NUM_SIMULATIONS_KEY.to_string(),
                reason: "too many simulations for a Sobol sequence".to_string(),
            })?;
        Ok(Self {
            num_simulations,
            parameters,
        })
    }
}

impl Sampler for SobolSequence {
    fn sample(&self, seed: Option<u64>) -> Samples {
        // Only the low 32 bits seed the scramble.
        let seed = seed.map_or(0, |seed| seed as u32);
        let mut quantiles =
            Array2::<f64>::zeros((self.num_simulations as usize, self.parameters.len()));
        for ((index, dimension), cell) in quantiles.indexed_iter_mut() {
            let point = sobol_burley::sample(index as u32, dimension as u32, seed);
            // Open interval so unbounded distributions stay finite.
            *cell = f64::from(point).clamp(f64::EPSILON, 1.0 - f64::EPSILON);
        }
        Samples::from_quantiles(&self.parameters, quantiles)
    }
}

/// Explicit sample table supplied by the user.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomStudy {
    /// Column names.
    parameter_names: Vec<String>,
    /// Sample rows.
    rows: Vec<Vec<ParameterValue>>,
}

impl CustomStudy {
    /// Create the design from validated names and rows.
    #[must_use]
    pub fn new(parameter_names: Vec<String>, rows: Vec<Vec<ParameterValue>>) -> Self {
        Self {
            parameter_names,
            rows,
        }
    }
}

impl Sampler for CustomStudy {
    fn sample(&self, _seed: Option<u64>) -> Samples {
        Samples::from_rows(self.parameter_names.clone(), &self.rows)
    }
}

/// Sensitivity design varying one parameter at a time.
///
/// The first value listed for each parameter is its nominal value. The nominal set is
/// emitted once, first, followed by every alternate value of each parameter in
/// declaration order with all other parameters held at nominal.
#[derive(Clone, Debug, PartialEq)]
pub struct OneAtATime {
    /// Parameter names and their values, nominal first.
    parameters: Vec<(String, Vec<ParameterValue>)>,
}

impl OneAtATime {
    /// Create the design from per-parameter value lists, nominal value first.
    #[must_use]
    pub fn new(parameters: Vec<(String, Vec<ParameterValue>)>) -> Self {
        Self { parameters }
    }
}

impl Sampler for OneAtATime {
    fn sample(&self, _seed: Option<u64>) -> Samples {
        let names = self.parameters.iter().map(|(name, _)| name.clone()).collect();
        let nominal: Vec<ParameterValue> = self
            .parameters
            .iter()
            .filter_map(|(_, values)| values.first().cloned())
            .collect();
        let mut rows = vec![nominal.clone()];
        for (column, (_, values)) in self.parameters.iter().enumerate() {
            for alternate in values.iter().skip(1) {
                let mut row = nominal.clone();
                row[column] = alternate.clone();
                rows.push(row);
            }
        }
        Samples::from_rows(names, &rows)
    }
}

/// A validated study design, one variant per generator.
#[derive(Clone, Debug, PartialEq)]
pub enum StudyDesign {
    /// See [`CartesianProduct`].
    CartesianProduct(CartesianProduct),
    /// See [`LatinHypercube`].
    LatinHypercube(LatinHypercube),
    /// See [`SobolSequence`].
    SobolSequence(SobolSequence),
    /// See [`CustomStudy`].
    CustomStudy(CustomStudy),
    /// See [`OneAtATime`].
    OneAtATime(OneAtATime),
}

impl StudyDesign {
    /// Generator kind that produced this design.
    #[must_use]
    pub const fn kind(&self) -> GeneratorKind {
        match self {
            Self::CartesianProduct(_) => GeneratorKind::CartesianProduct,
            Self::LatinHypercube(_) => GeneratorKind::LatinHypercube,
            Self::SobolSequence(_) => GeneratorKind::SobolSequence,
            Self::CustomStudy(_) => GeneratorKind::CustomStudy,
            Self::OneAtATime(_) => GeneratorKind::OneAtATime,
        }
    }

    /// The sampling strategy of this design.
    fn sampler(&self) -> &dyn Sampler {
        match self {
            Self::CartesianProduct(design) => design,
            Self::LatinHypercube(design) => design,
            Self::SobolSequence(design) => design,
            Self::CustomStudy(design) => design,
            Self::OneAtATime(design) => design,
        }
    }
}

impl Sampler for StudyDesign {
    fn sample(&self, seed: Option<u64>) -> Samples {
        self.sampler().sample(seed)
    }
}
