use burn::tensor::Tensor;

use crate::layer::LayerError;
use crate::{Backend, Device};

/// Whether the reference parameters may be updated by the host optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adaptivity {
    Frozen,
    Adapting,
}

impl Adaptivity {
    pub fn from_trainable(trainable: bool) -> Self {
        if trainable {
            Adaptivity::Adapting
        } else {
            Adaptivity::Frozen
        }
    }

    pub fn is_adapting(self) -> bool {
        self == Adaptivity::Adapting
    }
}

/// Reference Gaussian in the projected space
///
/// Trainability is an explicit flag per parameter. The host reads the flags to
/// decide whether to apply gradient updates, then writes new values through
/// [`ReferenceDistribution::update`], which bumps the version.
#[derive(Debug, Clone)]
pub struct ReferenceDistribution {
    /// Reference mean: [ref_dim]
    mu: Tensor<Backend, 1>,

    /// Reference spread: [ref_dim]
    sigma: Tensor<Backend, 1>,

    mu_trainable: bool,
    sigma_trainable: bool,

    /// Incremented whenever `mu` or `sigma` change
    version: u64,
}

impl ReferenceDistribution {
    /// Standard normal reference (mu = 0, sigma = 1)
    pub fn standard(ref_dim: usize, trainable: bool, device: &Device) -> Self {
        Self {
            mu: Tensor::zeros([ref_dim], device),
            sigma: Tensor::ones([ref_dim], device),
            mu_trainable: trainable,
            sigma_trainable: trainable,
            version: 0,
        }
    }

    /// Replace the reference parameters
    pub fn update(
        &mut self,
        mu: Tensor<Backend, 1>,
        sigma: Tensor<Backend, 1>,
    ) -> Result<(), LayerError> {
        let expected = self.mu.dims();
        if mu.dims() != expected {
            return Err(LayerError::parameter_shape("ref_mu", &expected, &mu.dims()));
        }
        if sigma.dims() != expected {
            return Err(LayerError::parameter_shape("ref_sigma", &expected, &sigma.dims()));
        }

        self.mu = mu;
        self.sigma = sigma;
        self.version += 1;
        Ok(())
    }

    /// Adaptivity as seen by the hysteresis rule (follows the mean's flag)
    pub fn adaptivity(&self) -> Adaptivity {
        Adaptivity::from_trainable(self.mu_trainable)
    }

    /// Set both parameters adapting or frozen
    pub fn set_adaptivity(&mut self, adaptivity: Adaptivity) {
        let trainable = adaptivity.is_adapting();
        self.mu_trainable = trainable;
        self.sigma_trainable = trainable;
    }

    pub fn set_mu_trainable(&mut self, trainable: bool) {
        self.mu_trainable = trainable;
    }

    pub fn set_sigma_trainable(&mut self, trainable: bool) {
        self.sigma_trainable = trainable;
    }

    pub fn mu_trainable(&self) -> bool {
        self.mu_trainable
    }

    pub fn sigma_trainable(&self) -> bool {
        self.sigma_trainable
    }

    pub fn mu(&self) -> &Tensor<Backend, 1> {
        &self.mu
    }

    pub fn sigma(&self) -> &Tensor<Backend, 1> {
        &self.sigma
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn ref_dim(&self) -> usize {
        self.mu.dims()[0]
    }

    /// Broadcast-ready statistics for the estimator
    pub fn stats(&self) -> ReferenceStats {
        let ref_dim = self.ref_dim();
        let sigma = self.sigma.clone().reshape([1, ref_dim]);
        ReferenceStats {
            mu: self.mu.clone().reshape([1, ref_dim]),
            sigma_sq: sigma.clone() * sigma.clone(),
            sigma,
        }
    }
}

/// Reference statistics shaped `[1, ref_dim]` for broadcasting
#[derive(Debug, Clone)]
pub struct ReferenceStats {
    pub mu: Tensor<Backend, 2>,
    pub sigma: Tensor<Backend, 2>,
    pub sigma_sq: Tensor<Backend, 2>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    version: u64,
    batch_size: usize,
    stats: ReferenceStats,
}

/// Cache of reference statistics used in evaluation mode
///
/// An entry is reused only while both the reference version and the batch size
/// match the values it was built for.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    entry: Option<CacheEntry>,
    refreshes: u64,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached statistics, rebuilt when the reference version or batch size changed
    pub fn get_or_refresh(
        &mut self,
        reference: &ReferenceDistribution,
        batch_size: usize,
    ) -> ReferenceStats {
        if let Some(entry) = &self.entry
            && entry.version == reference.version()
            && entry.batch_size == batch_size
        {
            return entry.stats.clone();
        }

        let stats = reference.stats();
        self.entry = Some(CacheEntry {
            version: reference.version(),
            batch_size,
            stats: stats.clone(),
        });
        self.refreshes += 1;
        stats
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_warm(&self) -> bool {
        self.entry.is_some()
    }

    /// Number of times the entry has been (re)built
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }
}
