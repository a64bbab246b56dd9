use estimator::catalog::{City, Country, Profile};
use estimator::ids::{CityId, CountryId, ProfileId, ProjectId};
use estimator::time_material::{ProjectSettings, YearSpan};
use serde_json::{json, Value};

pub const PROJECT_ID: &str = "proj-tm-1";
pub const PROJECT_START: &str = "2024-01-01";
pub const PROJECT_END: &str = "2026-12-31";

pub fn project_id() -> ProjectId {
    ProjectId::new(PROJECT_ID)
}

/// 2024 through 2026.
pub fn project_span() -> YearSpan {
    YearSpan::parse(Some(PROJECT_START), Some(PROJECT_END))
}

pub fn project_settings() -> ProjectSettings {
    ProjectSettings {
        span: project_span(),
        default_margin_goal: 20.0,
    }
}

pub fn profiles() -> Vec<Profile> {
    vec![
        Profile::new(ProfileId(1), "Consultant"),
        Profile::new(ProfileId(2), "Senior Consultant"),
    ]
}

pub fn countries() -> Vec<Country> {
    vec![Country::new("ES", "Spain"), Country::new("PT", "Portugal")]
}

pub fn cities(country: &CountryId) -> Vec<City> {
    match country.as_str() {
        "ES" => vec![
            City::new(CityId(10), "Madrid"),
            City::new(CityId(11), "Barcelona"),
            City::new(CityId(12), "Valencia"),
        ],
        "PT" => vec![
            City::new(CityId(20), "Lisbon"),
            City::new(CityId(21), "Porto"),
        ],
        _ => Vec::new(),
    }
}

/// `GET /projects/{p}/time-material` body with one step in Madrid.
pub fn time_material_json() -> Value {
    json!({
        "workpackage": { "id": 7, "name": "Time & Material" },
        "deliverable": { "marginGoal": 25.0, "yearlyQuantities": [2, 2, 2] },
        "steps": [
            {
                "id": 42,
                "profileId": 1,
                "countryId": "ES",
                "cityId": 10,
                "processTime": 3.5,
                "workpackage_id": 7,
                "yearlyData": [
                    { "year": 2024, "processTime": 1.0, "mng": 5.0, "office": true, "hardware": false },
                    { "year": 2026, "processTime": 2.0, "mng": 0.0, "office": false, "hardware": true }
                ]
            }
        ]
    })
}
