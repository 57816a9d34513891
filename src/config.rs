//! Index construction and search parameters, layered defaults, then
//! `vamana.toml`, then `VAMANA_*` environment variables.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`VAMANA_*`)
//! 2. Configuration file (`vamana.toml`)
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;

/// Degree cap, search list cap, pruning coefficient, and block size that
/// parameterize the insertion and search engines (spec §4.6, §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    /// Degree cap `R`: maximum out-neighbors per node.
    pub degree_cap: usize,
    /// Search list cap `L`: bound on the candidate list during search and
    /// during the bootstrap search an insert runs before pruning.
    pub search_list_size: usize,
    /// Pruning coefficient `alpha`, must be `>= 1.0`.
    pub alpha: f64,
    /// Block size in bytes, must be a multiple of 512.
    pub block_size: u32,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            degree_cap: 64,
            search_list_size: 100,
            alpha: 1.2,
            block_size: crate::file::DEFAULT_BLOCK_SIZE,
        }
    }
}

impl IndexParams {
    /// Loads parameters from `vamana.toml` (if present) and `VAMANA_*`
    /// environment variables, layered over [`IndexParams::default`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the layered sources fail to parse or
    /// the result fails [`IndexParams::validate`].
    pub fn load() -> Result<Self, Error> {
        Self::load_from_path("vamana.toml")
    }

    /// Loads parameters from a specific file path plus environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the layered sources fail to parse or
    /// the result fails [`IndexParams::validate`].
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("VAMANA_"));

        let params: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Validates this set of parameters (spec §3, §4.6 preconditions).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `degree_cap` is `0`, `search_list_size`
    /// is smaller than `degree_cap`, `alpha < 1.0`, `block_size` is not a
    /// multiple of 512, or `block_size` is too small to hold even one
    /// neighbor slot at the configured dimension.
    pub fn validate(&self) -> Result<(), Error> {
        if self.degree_cap == 0 {
            return Err(Error::Config("degree_cap must be at least 1".to_string()));
        }
        if self.search_list_size < self.degree_cap {
            return Err(Error::Config(format!(
                "search_list_size ({}) must be >= degree_cap ({})",
                self.search_list_size, self.degree_cap
            )));
        }
        if self.alpha < 1.0 {
            return Err(Error::Config(format!(
                "alpha ({}) must be >= 1.0",
                self.alpha
            )));
        }
        if self.block_size % 512 != 0 {
            return Err(Error::Config(format!(
                "block_size ({}) must be a multiple of 512",
                self.block_size
            )));
        }
        Ok(())
    }

    /// Validates that `dimension` leaves room for at least one neighbor
    /// slot under this configuration's `block_size` (spec §3: `R_max` is a
    /// function of block size and dimension).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the computed `R_max` is `0`.
    pub fn validate_dimension(&self, dimension: u16) -> Result<(), Error> {
        let header = crate::block::IndexHeader {
            #[allow(clippy::cast_possible_truncation)]
            block_size_units: (self.block_size / 512) as u16,
            vector_type: crate::vector::ElementType::F32,
            dimension,
            similarity: 0,
            entry_offset: 0,
            first_free_offset: 0,
        };
        if header.r_max() == 0 {
            return Err(Error::Config(format!(
                "block_size {} is too small to hold any neighbors at dimension {dimension}",
                self.block_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let params = IndexParams::default();
        assert_eq!(params.degree_cap, 64);
        assert_eq!(params.search_list_size, 100);
        assert!((params.alpha - 1.2).abs() < f64::EPSILON);
        assert_eq!(params.block_size, 4096);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn rejects_search_list_smaller_than_degree_cap() {
        let params = IndexParams {
            degree_cap: 64,
            search_list_size: 10,
            alpha: 1.2,
            block_size: 4096,
        };
        assert!(matches!(params.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_alpha_below_one() {
        let params = IndexParams {
            alpha: 0.9,
            ..IndexParams::default()
        };
        assert!(matches!(params.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_block_size_not_multiple_of_512() {
        let params = IndexParams {
            block_size: 4000,
            ..IndexParams::default()
        };
        assert!(matches!(params.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_block_size_too_small_for_dimension() {
        let params = IndexParams {
            block_size: 512,
            ..IndexParams::default()
        };
        assert!(matches!(
            params.validate_dimension(16_000),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn from_toml_string_overrides_defaults() {
        let figment = Figment::new()
            .merge(Serialized::defaults(IndexParams::default()))
            .merge(Toml::string("degree_cap = 32\nalpha = 1.5\n"));
        let params: IndexParams = figment.extract().unwrap();
        assert_eq!(params.degree_cap, 32);
        assert!((params.alpha - 1.5).abs() < f64::EPSILON);
        assert_eq!(params.search_list_size, 100);
    }
}
