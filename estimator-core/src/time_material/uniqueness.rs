//! Derives which `(profile, city)` pairs are taken and filters selection
//! options so no two rows can end up with the same pair.

use std::collections::HashSet;

use super::row::AssignmentRow;
use crate::catalog::{Catalogs, City, Profile};
use crate::ids::{CityId, CountryId, LocalRowId, ProfileId};

/// Pairs in use, optionally ignoring the row being edited.
#[derive(Clone, Debug, Default)]
pub struct UsedPairs(HashSet<(ProfileId, CityId)>);

impl UsedPairs {
    pub fn collect(rows: &[AssignmentRow], excluding: Option<LocalRowId>) -> Self {
        Self(
            rows.iter()
                .filter(|row| Some(row.local_id) != excluding)
                .filter_map(AssignmentRow::pair)
                .collect(),
        )
    }

    pub fn contains(&self, profile: ProfileId, city: CityId) -> bool {
        self.0.contains(&(profile, city))
    }

    pub fn insert(&mut self, profile: ProfileId, city: CityId) -> bool {
        self.0.insert((profile, city))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Read-only view over rows and catalogs answering availability questions.
pub struct UniquenessEnforcer<'a> {
    rows: &'a [AssignmentRow],
    catalogs: &'a Catalogs,
}

impl<'a> UniquenessEnforcer<'a> {
    pub fn new(rows: &'a [AssignmentRow], catalogs: &'a Catalogs) -> Self {
        Self { rows, catalogs }
    }

    pub fn used_pairs(&self, excluding: Option<LocalRowId>) -> UsedPairs {
        UsedPairs::collect(self.rows, excluding)
    }

    /// Cached cities of `country` not yet paired with `profile`.
    pub fn available_cities_for(
        &self,
        profile: ProfileId,
        country: &CountryId,
        excluding: Option<LocalRowId>,
    ) -> Vec<&'a City> {
        let used = self.used_pairs(excluding);
        let catalogs: &'a Catalogs = self.catalogs;
        catalogs
            .cached_cities(country)
            .unwrap_or(&[])
            .iter()
            .filter(|city| !used.contains(profile, city.id))
            .collect()
    }

    /// Profiles with at least one free city left in any cached country.
    ///
    /// Until some city catalog is loaded every profile counts as available.
    pub fn available_profiles(&self, excluding: Option<LocalRowId>) -> Vec<&'a Profile> {
        let catalogs: &'a Catalogs = self.catalogs;
        if catalogs.total_known_cities() == 0 {
            return catalogs.profiles().iter().collect();
        }

        let used = self.used_pairs(excluding);
        catalogs
            .profiles()
            .iter()
            .filter(|profile| {
                catalogs
                    .cached_countries()
                    .flat_map(|(_, cities)| cities.iter())
                    .any(|city| !used.contains(profile.id, city.id))
            })
            .collect()
    }

    /// First free combination walking profiles, countries and cities in catalog order.
    pub fn first_free_combination(&self) -> Option<(ProfileId, CountryId, CityId)> {
        let used = self.used_pairs(None);
        self.catalogs.profiles().iter().find_map(|profile| {
            self.catalogs
                .cached_countries()
                .find_map(|(country, cities)| {
                    cities
                        .iter()
                        .find(|city| !used.contains(profile.id, city.id))
                        .map(|city| (profile.id, country.clone(), city.id))
                })
        })
    }
}
