//! Read-only reference lists: staffing profiles, countries and cities.
//!
//! Profiles and countries are loaded once when a registry opens. Cities are
//! fetched per country on first use and cached until [`Catalogs::invalidate_cities`]
//! is called.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::BackendResult;
use crate::ids::{CityId, CountryId, ProfileId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry<Id> {
    pub id: Id,
    pub name: String,
}

impl<Id> CatalogEntry<Id> {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

pub type Profile = CatalogEntry<ProfileId>;
pub type Country = CatalogEntry<CountryId>;
pub type City = CatalogEntry<CityId>;

/// Source of catalog data, usually the backend.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn profiles(&self) -> BackendResult<Vec<Profile>>;

    async fn countries(&self) -> BackendResult<Vec<Country>>;

    async fn cities(&self, country: &CountryId) -> BackendResult<Vec<City>>;
}

#[derive(Clone, Debug, Default)]
pub struct Catalogs {
    profiles: Vec<Profile>,
    countries: Vec<Country>,
    cities: IndexMap<CountryId, Vec<City>>,
}

impl Catalogs {
    pub fn new(profiles: Vec<Profile>, countries: Vec<Country>) -> Self {
        Self {
            profiles,
            countries,
            cities: IndexMap::new(),
        }
    }

    /// Load profiles and countries. Cities stay lazy.
    pub async fn load<P>(provider: &P) -> BackendResult<Self>
    where
        P: CatalogProvider + ?Sized,
    {
        let profiles = provider.profiles().await?;
        let countries = provider.countries().await?;
        debug!(
            "Loaded catalogs: {} profiles, {} countries",
            profiles.len(),
            countries.len()
        );
        Ok(Self::new(profiles, countries))
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn cached_cities(&self, country: &CountryId) -> Option<&[City]> {
        self.cities.get(country).map(Vec::as_slice)
    }

    pub fn insert_cities(&mut self, country: CountryId, cities: Vec<City>) {
        self.cities.insert(country, cities);
    }

    /// Return the cities of `country`, fetching them only if not yet cached.
    pub async fn ensure_cities<P>(
        &mut self,
        provider: &P,
        country: &CountryId,
    ) -> BackendResult<&[City]>
    where
        P: CatalogProvider + ?Sized,
    {
        if !self.cities.contains_key(country) {
            let cities = provider.cities(country).await?;
            debug!("Cached {} cities for country {}", cities.len(), country);
            self.cities.insert(country.clone(), cities);
        }
        Ok(self.cached_cities(country).unwrap_or(&[]))
    }

    /// Forget every cached city list so the next lookup refetches.
    pub fn invalidate_cities(&mut self) {
        self.cities.clear();
    }

    /// Number of cities across all cached countries.
    pub fn total_known_cities(&self) -> usize {
        self.cities.values().map(Vec::len).sum()
    }

    /// Iterate cached `(country, cities)` pairs in catalog order.
    pub fn cached_countries(&self) -> impl Iterator<Item = (&CountryId, &[City])> {
        self.countries.iter().filter_map(move |country| {
            self.cities
                .get_key_value(&country.id)
                .map(|(id, cities)| (id, cities.as_slice()))
        })
    }

    /// `None` when the country's cities are not cached yet.
    pub fn city_belongs_to(&self, country: &CountryId, city: CityId) -> Option<bool> {
        self.cached_cities(country)
            .map(|cities| cities.iter().any(|c| c.id == city))
    }

    pub fn profile_name(&self, id: ProfileId) -> Option<&str> {
        self.profiles
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.as_str())
    }

    pub fn city_name(&self, country: &CountryId, id: CityId) -> Option<&str> {
        self.cached_cities(country)?
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }
}
