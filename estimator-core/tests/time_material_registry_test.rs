use std::collections::HashSet;

use estimator::errors::{AssignmentError, GENERIC_FAILURE_MESSAGE};
use estimator::ids::{CityId, CountryId, ProfileId, StepId, WorkPackageId};
use estimator::time_material::{
    AddRowMode, AssignmentRegistry, RowPatch, YearSpan, YearValue,
};
use estimator_test_utils::{fixtures, MockBackend, MockCall};

async fn open(backend: &MockBackend) -> AssignmentRegistry<MockBackend> {
    AssignmentRegistry::open(
        backend.clone(),
        fixtures::project_id(),
        fixtures::project_settings(),
    )
    .await
    .unwrap()
}

fn assert_invariants(registry: &AssignmentRegistry<MockBackend>) {
    let years = registry.settings().span.len();
    let mut pairs = HashSet::new();
    for row in registry.rows() {
        assert!(row.grid.is_aligned(years), "grid of {} not aligned", row.local_id);
        if let Some(pair) = row.pair() {
            assert!(pairs.insert(pair), "duplicate pair {:?}", pair);
        }
    }
}

#[tokio::test]
async fn new_row_quantities_follow_project_span() {
    let backend = MockBackend::new();
    let mut registry = open(&backend).await;

    assert_eq!(
        fixtures::project_span().years().collect::<Vec<_>>(),
        vec![2024, 2025, 2026]
    );
    let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    let row = registry.row(id).unwrap();
    assert_eq!(row.grid.yearly_quantities(), &[1, 1, 1]);
    assert_eq!(row.pair(), Some((ProfileId(1), CityId(10))));
    assert_eq!(row.country_id, Some(CountryId::from("ES")));
    assert_invariants(&registry);
}

#[tokio::test]
async fn first_available_skips_used_pairs_across_countries() {
    let backend = MockBackend::new();
    let mut registry = open(&backend).await;

    let mut pairs = Vec::new();
    for _ in 0..5 {
        let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
        pairs.push(registry.row(id).unwrap().pair());
    }
    assert_eq!(
        pairs,
        vec![
            Some((ProfileId(1), CityId(10))),
            Some((ProfileId(1), CityId(11))),
            Some((ProfileId(1), CityId(12))),
            Some((ProfileId(1), CityId(20))),
            Some((ProfileId(1), CityId(21))),
        ]
    );

    // Profile 1 is exhausted, so the next row moves to profile 2.
    let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    assert_eq!(registry.row(id).unwrap().pair(), Some((ProfileId(2), CityId(10))));
    let remaining: Vec<ProfileId> = registry
        .available_profiles(None)
        .into_iter()
        .map(|profile| profile.id)
        .collect();
    assert_eq!(remaining, vec![ProfileId(2)]);
    assert_invariants(&registry);
}

#[tokio::test]
async fn add_row_fails_without_profiles() {
    let backend = MockBackend::new();
    backend.set_profiles(Vec::new());
    let mut registry = open(&backend).await;

    let err = registry.add_row(AddRowMode::Empty).await.unwrap_err();
    assert!(matches!(err, AssignmentError::NoProfilesAvailable));
    assert!(registry.rows().is_empty());
}

#[tokio::test]
async fn available_cities_exclude_pairs_in_use() {
    let backend = MockBackend::new();
    backend.seed_step(ProfileId(1), "ES", CityId(10), 2.0);
    backend.seed_step(ProfileId(1), "ES", CityId(11), 2.0);
    let registry = open(&backend).await;

    let cities: Vec<CityId> = registry
        .available_cities_for(ProfileId(1), &CountryId::from("ES"), None)
        .into_iter()
        .map(|city| city.id)
        .collect();
    assert_eq!(cities, vec![CityId(12)]);
}

#[tokio::test]
async fn duplicate_city_is_rejected_and_row_unchanged() {
    let backend = MockBackend::new();
    backend.seed_step(ProfileId(1), "ES", CityId(10), 2.0);
    let mut registry = open(&backend).await;

    let id = registry.add_row(AddRowMode::Empty).await.unwrap();
    registry
        .update_row(id, RowPatch::new().profile(ProfileId(1)).country("ES"))
        .await
        .unwrap();
    let before = registry.row(id).unwrap().clone();

    let err = registry
        .update_row(id, RowPatch::new().city(CityId(10)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AssignmentError::DuplicateAssignment {
            profile: ProfileId(1),
            city: CityId(10)
        }
    ));
    assert!(err.is_validation());
    assert_eq!(registry.row(id), Some(&before));
    assert_invariants(&registry);
}

#[tokio::test]
async fn country_change_clears_city_and_loads_catalog() {
    let backend = MockBackend::new();
    let mut registry = open(&backend).await;

    let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    registry
        .update_row(id, RowPatch::new().country("PT"))
        .await
        .unwrap();

    let row = registry.row(id).unwrap();
    assert_eq!(row.country_id, Some(CountryId::from("PT")));
    assert_eq!(row.city_id, None);
    assert!(registry
        .catalogs()
        .cached_cities(&CountryId::from("PT"))
        .is_some());

    registry
        .update_row(id, RowPatch::new().city(CityId(21)))
        .await
        .unwrap();
    assert_eq!(registry.row(id).unwrap().city_id, Some(CityId(21)));
}

#[tokio::test]
async fn save_without_city_makes_no_request() {
    let backend = MockBackend::new();
    let mut registry = open(&backend).await;
    let id = registry.add_row(AddRowMode::Empty).await.unwrap();
    registry
        .update_row(
            id,
            RowPatch::new()
                .profile(ProfileId(1))
                .country("ES")
                .process_time(2.0),
        )
        .await
        .unwrap();
    backend.clear_calls();

    let err = registry.save_row(id).await.unwrap_err();
    assert!(matches!(err, AssignmentError::MissingField("city")));
    assert_eq!(err.error_code(), "VALIDATION_FAILED");
    assert_eq!(backend.network_calls(), 0);
}

#[tokio::test]
async fn save_requires_positive_process_time() {
    let backend = MockBackend::new();
    let mut registry = open(&backend).await;
    let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    backend.clear_calls();

    let err = registry.save_row(id).await.unwrap_err();
    assert!(matches!(err, AssignmentError::NonPositiveProcessTime));
    assert_eq!(backend.network_calls(), 0);
}

#[tokio::test]
async fn save_creates_step_and_binds_ids() {
    let backend = MockBackend::new();
    backend.set_next_step_id(42);
    let mut registry = open(&backend).await;

    let id = registry.add_row(AddRowMode::Empty).await.unwrap();
    registry
        .update_row(
            id,
            RowPatch::new()
                .profile(ProfileId(1))
                .country("ES")
                .city(CityId(10))
                .process_time(3.0),
        )
        .await
        .unwrap();
    registry
        .set_year_value(id, 1, YearValue::Quantity(4))
        .unwrap();
    backend.clear_calls();

    let step = registry.save_row(id).await.unwrap();
    assert_eq!(step.id, StepId(42));

    let calls = backend.calls();
    let MockCall::CreateTimeMaterial(payloads) = &calls[0] else {
        panic!("expected a create request, got {:?}", calls[0]);
    };
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].step_name, "Consultant - Madrid");
    assert_eq!(payloads[0].units, 6);
    assert_eq!(payloads[0].yearly_quantities, vec![1, 4, 1]);
    assert_eq!(calls[1], MockCall::FetchTimeMaterial);

    let row = registry.row(id).unwrap();
    assert_eq!(row.server_step_id, Some(StepId(42)));
    assert!(row.server_work_package_id.is_some());
    assert!(!row.is_editing);
    assert_eq!(row.grid.yearly_quantities(), &[1, 4, 1]);
    assert_eq!(registry.current_work_package_id(), row.server_work_package_id);
    assert_invariants(&registry);
}

#[tokio::test]
async fn saving_a_persisted_row_updates_in_place() {
    let backend = MockBackend::new();
    let seeded = backend.seed_step(ProfileId(2), "PT", CityId(20), 1.0);
    let mut registry = open(&backend).await;
    let id = registry.find_by_step(seeded.id).unwrap().local_id;

    registry
        .update_row(id, RowPatch::new().process_time(6.5).margin_goal(35.0))
        .await
        .unwrap();
    registry
        .set_year_value(id, 2, YearValue::Office(true))
        .unwrap();
    backend.clear_calls();

    let step = registry.save_row(id).await.unwrap();
    assert_eq!(step.id, seeded.id);
    assert!(matches!(
        backend.calls()[0],
        MockCall::UpdateStep { step, .. } if step == seeded.id
    ));
    assert_eq!(registry.rows().len(), 1);
    assert_eq!(backend.step_count(), 1);

    let row = registry.row(id).unwrap();
    assert_eq!(row.process_time, 6.5);
    assert_eq!(row.margin_goal, 35.0);
    assert_eq!(row.grid.office_per_year(), &[false, false, true]);
    assert!(!row.is_editing);
}

#[tokio::test]
async fn removing_unsaved_row_is_local() {
    let backend = MockBackend::new();
    let mut registry = open(&backend).await;
    let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    backend.clear_calls();

    registry.remove_row(id).await.unwrap();
    assert!(registry.rows().is_empty());
    assert_eq!(backend.network_calls(), 0);
}

#[tokio::test]
async fn removing_saved_row_without_work_package_is_a_precondition_failure() {
    let backend = MockBackend::new();
    backend.seed_step(ProfileId(1), "ES", CityId(10), 2.0);
    backend.omit_step_work_package_ids();
    backend.omit_current_work_package();
    let mut registry = open(&backend).await;

    let id = registry.rows()[0].local_id;
    assert!(registry.rows()[0].is_saved());
    assert_eq!(registry.current_work_package_id(), None);
    backend.clear_calls();

    let err = registry.remove_row(id).await.unwrap_err();
    assert!(err.is_precondition());
    assert_eq!(err.error_code(), "PRECONDITION_FAILED");
    assert!(registry.row(id).is_some());
    assert_eq!(backend.network_calls(), 0);
}

#[tokio::test]
async fn deleting_last_step_cascades_to_empty_registry() {
    let backend = MockBackend::new();
    backend.set_next_step_id(42);
    let mut registry = open(&backend).await;

    let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    registry
        .update_row(id, RowPatch::new().process_time(2.0))
        .await
        .unwrap();
    registry.save_row(id).await.unwrap();
    assert!(registry.current_work_package_id().is_some());

    registry.remove_row(id).await.unwrap();
    assert!(registry.rows().is_empty());
    assert_eq!(registry.current_work_package_id(), None);
    assert!(backend.work_package_ids().is_empty());
    assert_eq!(backend.mutation_calls(), 2);
}

#[tokio::test]
async fn remove_falls_back_to_current_work_package() {
    let backend = MockBackend::new();
    let first = backend.seed_step(ProfileId(1), "ES", CityId(10), 2.0);
    backend.seed_step(ProfileId(1), "ES", CityId(11), 2.0);
    let mut registry = open(&backend).await;
    backend.omit_step_work_package_ids();
    registry.reload().await.unwrap();
    let id = registry.find_by_step(first.id).unwrap().local_id;
    assert_eq!(registry.row(id).unwrap().server_work_package_id, None);

    registry.remove_row(id).await.unwrap();
    assert!(matches!(
        backend.calls().iter().find(|call| call.is_mutation()),
        Some(MockCall::DeleteStep { work_package, .. }) if *work_package == WorkPackageId(1)
    ));
    assert_eq!(registry.rows().len(), 1);
    assert_eq!(registry.current_work_package_id(), Some(WorkPackageId(1)));
}

#[tokio::test]
async fn backend_error_message_surfaces_and_state_is_kept() {
    let backend = MockBackend::new();
    backend.seed_step(ProfileId(1), "ES", CityId(10), 2.0);
    let mut registry = open(&backend).await;
    let id = registry.rows()[0].local_id;
    let before = registry.rows().to_vec();

    backend.fail_next_with_status(409, Some("Step is locked by another user"));
    let err = registry.remove_row(id).await.unwrap_err();
    assert!(err.is_backend());
    assert_eq!(err.user_message(), "Step is locked by another user");
    assert_eq!(registry.rows(), before.as_slice());

    backend.fail_next_with_status(500, None);
    let err = registry.save_row(id).await.unwrap_err();
    assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    assert_eq!(registry.rows(), before.as_slice());
}

#[tokio::test]
async fn unsaved_rows_survive_resync() {
    let backend = MockBackend::new();
    let mut registry = open(&backend).await;
    let draft = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    let other = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    registry
        .update_row(other, RowPatch::new().process_time(1.0))
        .await
        .unwrap();

    registry.save_row(other).await.unwrap();
    assert_eq!(registry.rows().len(), 2);
    assert!(!registry.row(draft).unwrap().is_saved());
    assert!(registry.row(other).unwrap().is_saved());
    assert_invariants(&registry);
}

#[tokio::test]
async fn grid_edits_replace_a_single_year() {
    let backend = MockBackend::new();
    let mut registry = open(&backend).await;
    let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();

    registry
        .set_year_value(id, 0, YearValue::Mng(12.5))
        .unwrap();
    let row = registry.row(id).unwrap();
    assert_eq!(row.grid.mng_per_year(), &[12.5, 0.0, 0.0]);

    let err = registry
        .set_year_value(id, 3, YearValue::Quantity(2))
        .unwrap_err();
    assert!(matches!(err, AssignmentError::YearOutOfRange { index: 3, len: 3 }));

    let err = registry
        .set_year_value(id, 1, YearValue::ProcessTime(-1.0))
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(registry.row(id).unwrap().grid.process_time_per_year(), &[0.0, 0.0, 0.0]);
}

#[tokio::test]
async fn span_change_keeps_overlapping_years() {
    let backend = MockBackend::new();
    let mut registry = open(&backend).await;
    let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    registry
        .set_year_value(id, 2, YearValue::Quantity(9))
        .unwrap();

    registry.set_year_span(YearSpan::new(2026, 2027));
    assert_eq!(registry.row(id).unwrap().grid.yearly_quantities(), &[9, 1]);
    assert_invariants(&registry);
}

#[tokio::test]
async fn new_rows_use_deliverable_margin_when_present() {
    let backend = MockBackend::new();
    backend.set_deliverable(Some(32.5), vec![2, 2, 2]);
    let mut registry = open(&backend).await;

    let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    assert_eq!(registry.row(id).unwrap().margin_goal, 32.5);

    let seeded = backend.seed_step(ProfileId(2), "ES", CityId(12), 1.0);
    registry.reload().await.unwrap();
    let persisted = registry.find_by_step(seeded.id).unwrap();
    assert_eq!(persisted.margin_goal, 32.5);
    assert!(registry.row(id).is_some());
    assert_invariants(&registry);
}

#[tokio::test]
async fn profiles_stay_available_while_other_countries_have_free_cities() {
    let backend = MockBackend::new();
    for profile in [ProfileId(1), ProfileId(2)] {
        for city in [CityId(10), CityId(11), CityId(12)] {
            backend.seed_step(profile, "ES", city, 1.0);
        }
    }
    let mut registry = open(&backend).await;
    assert!(registry
        .catalogs()
        .cached_cities(&CountryId::from("PT"))
        .is_none());

    let id = registry.add_row(AddRowMode::Empty).await.unwrap();
    assert!(registry.row(id).unwrap().pair().is_none());
    assert_eq!(registry.available_profiles(None).len(), 2);

    let next = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    assert_eq!(registry.row(next).unwrap().pair(), Some((ProfileId(1), CityId(20))));
    assert_invariants(&registry);
}

#[tokio::test]
async fn save_rejects_quantities_that_overflow_units() {
    let backend = MockBackend::new();
    let mut registry = open(&backend).await;
    let id = registry.add_row(AddRowMode::FirstAvailable).await.unwrap();
    registry
        .update_row(id, RowPatch::new().process_time(1.0))
        .await
        .unwrap();
    registry
        .set_year_value(id, 0, YearValue::Quantity(u32::MAX))
        .unwrap();
    registry
        .set_year_value(id, 1, YearValue::Quantity(2))
        .unwrap();
    backend.clear_calls();

    let err = registry.save_row(id).await.unwrap_err();
    assert!(matches!(err, AssignmentError::InvalidValue { field: "quantity", .. }));
    assert!(err.is_validation());
    assert_eq!(backend.network_calls(), 0);
    assert!(!registry.row(id).unwrap().is_saved());
}

#[tokio::test]
async fn city_catalogs_are_cached_until_invalidated() {
    let backend = MockBackend::new();
    backend.seed_step(ProfileId(1), "ES", CityId(10), 2.0);
    let mut registry = open(&backend).await;
    let spain = CountryId::from("ES");
    let portugal = CountryId::from("PT");

    registry.load_cities(&portugal).await.unwrap();
    backend.clear_calls();
    let cities = registry.load_cities(&portugal).await.unwrap();
    assert_eq!(cities.len(), 2);
    assert_eq!(backend.network_calls(), 0);

    registry.invalidate_catalogs().await.unwrap();
    assert_eq!(
        backend.calls(),
        vec![
            MockCall::Profiles,
            MockCall::Countries,
            MockCall::Cities(spain.clone()),
        ]
    );
    assert!(registry.catalogs().cached_cities(&spain).is_some());
    assert!(registry.catalogs().cached_cities(&portugal).is_none());
}

#[tokio::test]
async fn saving_a_step_the_backend_lost_keeps_local_edits() {
    let backend = MockBackend::new();
    let seeded = backend.seed_step(ProfileId(1), "ES", CityId(10), 1.0);
    let mut registry = open(&backend).await;
    let id = registry.find_by_step(seeded.id).unwrap().local_id;
    registry
        .update_row(id, RowPatch::new().process_time(3.0))
        .await
        .unwrap();

    backend.fail_next_with_status(404, Some("Step not found"));
    let err = registry.save_row(id).await.unwrap_err();
    assert!(err.is_backend());
    assert_eq!(err.user_message(), "Step not found");
    let row = registry.row(id).unwrap();
    assert_eq!(row.process_time, 3.0);
    assert!(row.is_editing);
}
