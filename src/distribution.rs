//! Continuous distributions used by the space-filling generators.
//!
//! Each distribution follows the `loc`/`scale` convention: the standard form of the
//! distribution is shifted by `loc` and stretched by `scale`. Samplers draw quantiles on
//! the unit hypercube and map them through [`Distribution::ppf`], which evaluates the
//! inverse CDF of the `statrs` standard distribution.

use std::str::FromStr;

use serde_yaml::{Mapping, Value};
use statrs::distribution::{ContinuousCDF, Exp, LogNormal, Normal, Triangular, Uniform};

use crate::errors::{ChoicesError, DistributionError, SchemaError};

/// Names accepted for the `distribution` key of a parameter schema.
pub const DISTRIBUTION_CHOICES: [&str; 5] = ["uniform", "norm", "lognorm", "expon", "triang"];

/// Family of a distribution, without its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistributionKind {
    /// Uniform on `[loc, loc + scale]`.
    Uniform,
    /// Normal with mean `loc` and standard deviation `scale`.
    Norm,
    /// Log-normal with shape `s`.
    LogNorm,
    /// Exponential with rate `1 / scale`.
    Expon,
    /// Triangular with mode at `loc + c * scale`.
    Triang,
}

impl FromStr for DistributionKind {
    type Err = ChoicesError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "uniform" => Ok(Self::Uniform),
            "norm" => Ok(Self::Norm),
            "lognorm" => Ok(Self::LogNorm),
            "expon" => Ok(Self::Expon),
            "triang" => Ok(Self::Triang),
            other => Err(ChoicesError::new(
                "distribution",
                other,
                &DISTRIBUTION_CHOICES,
            )),
        }
    }
}

impl DistributionKind {
    /// Schema name of the family.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Norm => "norm",
            Self::LogNorm => "lognorm",
            Self::Expon => "expon",
            Self::Triang => "triang",
        }
    }

    /// Name of the shape parameter required by this family, if any.
    const fn shape_key(self) -> Option<&'static str> {
        match self {
            Self::LogNorm => Some("s"),
            Self::Triang => Some("c"),
            Self::Uniform | Self::Norm | Self::Expon => None,
        }
    }
}

/// Standard form of a family, before `loc` and `scale` are applied.
#[derive(Clone, Copy, Debug, PartialEq)]
enum StandardForm {
    /// Uniform on `[0, 1]`.
    Uniform(Uniform),
    /// Standard normal.
    Normal(Normal),
    /// `exp(s * Z)` for a standard normal `Z`.
    LogNormal(LogNormal),
    /// Exponential with unit rate.
    Exp(Exp),
    /// Triangular on `[0, 1]` with mode `c`.
    Triangular(Triangular),
}

impl StandardForm {
    /// Build the standard form of `kind`.
    fn new(kind: DistributionKind, shape: Option<f64>) -> Result<Self, DistributionError> {
        let invalid = |reason: String| DistributionError {
            family: kind.name(),
            reason,
        };
        let required_shape = || {
            shape.ok_or_else(|| {
                invalid(format!(
                    "missing shape parameter '{}'",
                    kind.shape_key().unwrap_or_default()
                ))
            })
        };
        let form = match kind {
            DistributionKind::Uniform => {
                Uniform::new(0.0, 1.0).map(Self::Uniform).map_err(|error| invalid(error.to_string()))?
            }
            DistributionKind::Norm => {
                Normal::new(0.0, 1.0).map(Self::Normal).map_err(|error| invalid(error.to_string()))?
            }
            DistributionKind::LogNorm => LogNormal::new(0.0, required_shape()?)
                .map(Self::LogNormal)
                .map_err(|error| invalid(error.to_string()))?,
            DistributionKind::Expon => {
                Exp::new(1.0).map(Self::Exp).map_err(|error| invalid(error.to_string()))?
            }
            DistributionKind::Triang => Triangular::new(0.0, 1.0, required_shape()?)
                .map(Self::Triangular)
                .map_err(|error| invalid(error.to_string()))?,
        };
        Ok(form)
    }

    /// Inverse CDF of the standard form.
    fn inverse_cdf(&self, quantile: f64) -> f64 {
        match self {
            Self::Uniform(distribution) => distribution.inverse_cdf(quantile),
            Self::Normal(distribution) => distribution.inverse_cdf(quantile),
            Self::LogNormal(distribution) => distribution.inverse_cdf(quantile),
            Self::Exp(distribution) => distribution.inverse_cdf(quantile),
            Self::Triangular(distribution) => distribution.inverse_cdf(quantile),
        }
    }
}

/// A fully parameterised continuous distribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Distribution {
    /// Distribution family.
    kind: DistributionKind,
    /// Location shift.
    loc: f64,
    /// Positive scale factor.
    scale: f64,
    /// Shape parameter for families that need one.
    shape: Option<f64>,
    /// Standard form evaluated by [`Distribution::ppf`].
    standard: StandardForm,
}

impl Distribution {
    /// Build a distribution of family `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError`] when `scale` is not positive and finite, or when
    /// the shape parameter is missing or out of range for the family.
    pub fn new(
        kind: DistributionKind,
        loc: f64,
        scale: f64,
        shape: Option<f64>,
    ) -> Result<Self, DistributionError> {
        if !loc.is_finite() || !scale.is_finite() || scale <= 0.0 {
            return Err(DistributionError {
                family: kind.name(),
                reason: format!("loc must be finite and scale positive (received {loc}, {scale})"),
            });
        }
        let shape = kind.shape_key().and(shape);
        Ok(Self {
            kind,
            loc,
            scale,
            shape,
            standard: StandardForm::new(kind, shape)?,
        })
    }

    /// Uniform distribution on `[loc, loc + scale]`.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError`] for a non-positive `scale`.
    pub fn uniform(loc: f64, scale: f64) -> Result<Self, DistributionError> {
        Self::new(DistributionKind::Uniform, loc, scale, None)
    }

    /// Normal distribution with mean `loc` and standard deviation `scale`.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError`] for a non-positive `scale`.
    pub fn norm(loc: f64, scale: f64) -> Result<Self, DistributionError> {
        Self::new(DistributionKind::Norm, loc, scale, None)
    }

    /// Distribution family.
    #[must_use]
    pub const fn kind(&self) -> DistributionKind {
        self.kind
    }

    /// Location shift.
    #[must_use]
    pub const fn loc(&self) -> f64 {
        self.loc
    }

    /// Scale factor.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Shape parameter, for `lognorm` and `triang`.
    #[must_use]
    pub const fn shape(&self) -> Option<f64> {
        self.shape
    }

    /// Parse the distribution of parameter `key` from its schema mapping.
    ///
    /// The mapping must carry a `distribution` name. `loc` defaults to 0 and `scale` to
    /// 1; `lognorm` requires `s` and `triang` requires `c`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] naming `key` when the mapping is incomplete, holds
    /// non-numeric values or unknown keys, or names an unsupported distribution.
    pub fn from_schema(key: &str, mapping: &Mapping) -> Result<Self, SchemaError> {
        let name = mapping
            .get("distribution")
            .ok_or_else(|| SchemaError::MissingKey {
                key: format!("{key}.distribution"),
            })?
            .as_str()
            .ok_or_else(|| SchemaError::InvalidValue {
                key: format!("{key}.distribution"),
                reason: "expected a distribution name".to_string(),
            })?;
        let kind = name
            .parse::<DistributionKind>()
            .map_err(|source| SchemaError::UnknownDistribution {
                key: key.to_string(),
                source,
            })?;

        let mut loc = 0.0;
        let mut scale = 1.0;
        let mut shape = None;
        for (field, value) in mapping {
            let field = field.as_str().ok_or_else(|| SchemaError::NonStringKey {
                key: format!("{key}.{field:?}"),
            })?;
            if field == "distribution" {
                continue;
            }
            let number = numeric(key, field, value)?;
            match field {
                "loc" => loc = number,
                "scale" => scale = number,
                other if Some(other) == kind.shape_key() => shape = Some(number),
                other => {
                    return Err(SchemaError::InvalidValue {
                        key: format!("{key}.{other}"),
                        reason: format!("not a parameter of the '{name}' distribution"),
                    })
                }
            }
        }

        if scale <= 0.0 {
            return Err(SchemaError::InvalidValue {
                key: format!("{key}.scale"),
                reason: format!("scale must be positive (received {scale})"),
            });
        }
        if let Some(shape_key) = kind.shape_key() {
            if shape.is_none() {
                return Err(SchemaError::MissingKey {
                    key: format!("{key}.{shape_key}"),
                });
            }
        }

        Self::new(kind, loc, scale, shape).map_err(|source| SchemaError::InvalidDistribution {
            key: key.to_string(),
            source,
        })
    }

    /// Percent point function, the inverse of the cumulative distribution function.
    ///
    /// `quantile` is expected in the open interval `(0, 1)`.
    ///
    /// # Examples
    /// ```
    /// use waves::Distribution;
    ///
    /// let uniform = Distribution::uniform(10.0, 2.0).unwrap();
    /// assert!((uniform.ppf(0.5) - 11.0).abs() < 1.0e-3);
    /// ```
    #[must_use]
    pub fn ppf(&self, quantile: f64) -> f64 {
        self.loc + self.scale * self.standard.inverse_cdf(quantile)
    }
}

/// Read a numeric distribution parameter.
fn numeric(key: &str, field: &str, value: &Value) -> Result<f64, SchemaError> {
    value.as_f64().ok_or_else(|| SchemaError::InvalidValue {
        key: format!("{key}.{field}"),
        reason: "expected a number".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn mapping(text: &str) -> Mapping {
        serde_yaml::from_str(text).expect("valid mapping")
    }

    #[test]
    fn normal_ppf_matches_reference_values() {
        let normal = Distribution::norm(0.0, 1.0).expect("valid distribution");
        assert_relative_eq!(normal.ppf(0.5), 0.0, epsilon = 1.0e-9);
        assert_relative_eq!(normal.ppf(0.975), 1.959_963_984_540_054, epsilon = 1.0e-8);
        assert_relative_eq!(normal.ppf(0.01), -2.326_347_874_040_841, epsilon = 1.0e-8);
    }

    #[test]
    fn loc_and_scale_shift_and_stretch() {
        let normal = Distribution::norm(50.0, 2.0).expect("valid distribution");
        assert_relative_eq!(normal.ppf(0.975), 50.0 + 2.0 * 1.959_963_984_540_054, epsilon = 1.0e-7);
        let exponential =
            Distribution::new(DistributionKind::Expon, 1.0, 2.0, None).expect("valid distribution");
        assert_relative_eq!(exponential.ppf(0.5), 1.0 + 2.0 * 2.0_f64.ln(), epsilon = 1.0e-3);
    }

    #[test]
    fn triangular_ppf_hits_mode_at_its_quantile() {
        let triangular = Distribution::new(DistributionKind::Triang, 0.0, 4.0, Some(0.25))
            .expect("valid distribution");
        assert_relative_eq!(triangular.ppf(0.25), 1.0, epsilon = 1.0e-3);
    }

    #[test]
    fn lognormal_median_is_the_scale() {
        let lognormal = Distribution::new(DistributionKind::LogNorm, 0.0, 3.0, Some(0.5))
            .expect("valid distribution");
        assert_relative_eq!(lognormal.ppf(0.5), 3.0, epsilon = 1.0e-3);
    }

    #[test]
    fn parses_schema_mapping_with_defaults() {
        let parsed = Distribution::from_schema("width", &mapping("distribution: norm\nloc: 5\n"))
            .expect("valid distribution");
        assert_eq!(parsed, Distribution::norm(5.0, 1.0).expect("valid distribution"));
        assert_eq!(parsed.kind(), DistributionKind::Norm);
        assert_eq!(parsed.shape(), None);
    }

    #[test]
    fn rejects_unknown_distribution_with_choices() {
        let error = Distribution::from_schema("width", &mapping("distribution: cauchy\n"))
            .expect_err("unsupported distribution");
        match error {
            SchemaError::UnknownDistribution { key, source } => {
                assert_eq!(key, "width");
                assert!(source.choices.contains(&"norm".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_shape_and_bad_scale() {
        let missing = Distribution::from_schema("height", &mapping("distribution: lognorm\n"))
            .expect_err("shape required");
        assert_eq!(
            missing,
            SchemaError::MissingKey {
                key: "height.s".to_string()
            }
        );
        let scale = Distribution::from_schema("height", &mapping("distribution: norm\nscale: 0\n"))
            .expect_err("scale must be positive");
        assert!(matches!(scale, SchemaError::InvalidValue { .. }));
        assert!(Distribution::uniform(0.0, -1.0).is_err());
    }

    #[test]
    fn out_of_range_shape_names_the_parameter() {
        let error = Distribution::from_schema(
            "height",
            &mapping("distribution: triang\nc: 1.5\n"),
        )
        .expect_err("mode outside the support");
        assert!(matches!(error, SchemaError::InvalidDistribution { key, .. } if key == "height"));
    }
}
