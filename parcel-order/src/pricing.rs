use parcel_core::{Package, PackageSize, PackageSpec};
use serde::{Deserialize, Serialize};

/// Fallback per-package prices in minor units, keyed by size
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizePrices {
    pub small: i64,
    pub medium: i64,
    pub large: i64,
    pub xlarge: i64,
}

impl Default for SizePrices {
    fn default() -> Self {
        Self {
            small: 499,
            medium: 699,
            large: 899,
            xlarge: 1099,
        }
    }
}

/// Pure pricing: no state beyond the configured size table
#[derive(Debug, Clone, Default)]
pub struct PricingPolicy {
    prices: SizePrices,
}

impl PricingPolicy {
    pub fn new(prices: SizePrices) -> Self {
        Self { prices }
    }

    pub fn size_price(&self, size: PackageSize) -> i64 {
        match size {
            PackageSize::Small => self.prices.small,
            PackageSize::Medium => self.prices.medium,
            PackageSize::Large => self.prices.large,
            PackageSize::Xlarge => self.prices.xlarge,
        }
    }

    /// Explicit price if the package carries one, else the size table
    pub fn resolve(&self, spec: &PackageSpec) -> i64 {
        spec.price.unwrap_or_else(|| self.size_price(spec.size))
    }

    /// Price every package and return them with the total.
    ///
    /// The result always overwrites whatever price the input carried.
    pub fn price_packages(&self, specs: &[PackageSpec]) -> (Vec<Package>, i64) {
        let packages: Vec<Package> = specs
            .iter()
            .map(|spec| Package {
                size: spec.size,
                dimensions: spec.dimensions.clone(),
                label_attached: spec.label_attached,
                carrier: spec.carrier,
                price: self.resolve(spec),
            })
            .collect();
        let total = packages.iter().map(|p| p.price).sum();
        (packages, total)
    }

    pub fn price(&self, specs: &[PackageSpec]) -> i64 {
        specs.iter().map(|spec| self.resolve(spec)).sum()
    }
}
