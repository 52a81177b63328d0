//! Integration tests for `SqliteStore`, mostly against an in-memory database.
//! Cross-connection behaviour uses a file in a temporary directory.

use rondas_core::{
  Error as CoreError,
  account::NewAccount,
  building_element::BuildingElementFields,
  entity::{NewEntity, TagLabels},
  search::SearchQuery,
  stakeholder::{CollectorFields, ContractorFields},
  store::ExchangeStore,
  taxonomy::{Dimension, OnMissing},
};
use std::time::Duration;

use rusqlite::Connection;
use uuid::Uuid;

use crate::{Error, SqliteStore, registry, repository::write_tx, schema::SCHEMA};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn core(err: Error) -> CoreError { err.into() }

fn labels(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| (*s).to_owned()).collect()
}

fn collector(name: &str, strategies: &[&str]) -> NewEntity<CollectorFields> {
  NewEntity::new(
    CollectorFields {
      name:      name.into(),
      address:   "1 rue des Lilas".into(),
      zip_code:  "75001".into(),
      city:      "Paris".into(),
      latitude:  48.86,
      longitude: 2.34,
      email:     None,
      phone:     None,
    },
    TagLabels::new()
      .with(Dimension::Material, &["Wood", "Metals"])
      .with(Dimension::CircularStrategy, strategies),
  )
}

fn contractor(name: &str) -> NewEntity<ContractorFields> {
  NewEntity::new(
    ContractorFields {
      name:      name.into(),
      address:   "3 quai Perrache".into(),
      zip_code:  "69002".into(),
      city:      "Lyon".into(),
      latitude:  45.75,
      longitude: 4.82,
      email:     Some("contact@example.fr".into()),
      phone:     None,
    },
    TagLabels::new().with(Dimension::CircularService, &["Demolition"]),
  )
}

fn element(title: &str, category: &str, materials: &[&str]) -> NewEntity<BuildingElementFields> {
  NewEntity::new(
    BuildingElementFields {
      upload_uuid:         Uuid::new_v4(),
      reference:           "PB-01".into(),
      title:               title.into(),
      address:             "12 avenue Jean Jaurès, Lyon".into(),
      latitude:            45.75,
      longitude:           4.85,
      total:               Some(3.0),
      total_mass_kg:       None,
      total_volume_m3:     None,
      has_energy_recovery: None,
      has_elimination:     Some(false),
    },
    TagLabels::new()
      .with(Dimension::BuildingElementWorksheet, &["SECOND OEUVRE"])
      .with(Dimension::BuildingElementUnit, &["U"])
      .with(Dimension::BuildingElementCategory, &[category])
      .with(Dimension::Material, materials),
  )
}

fn names<F: rondas_core::entity::EntityFields>(
  entities: &[rondas_core::entity::Entity<F>],
) -> Vec<String> {
  entities.iter().map(|e| e.fields.title().to_owned()).collect()
}

// ─── Type registry ───────────────────────────────────────────────────────────

#[tokio::test]
async fn seeded_catalog_is_listed_by_id() {
  let s = store().await;
  let strategies = s.list_by_discriminator(Dimension::CircularStrategy).await.unwrap();
  let got: Vec<_> = strategies.iter().map(|e| (e.id, e.label.as_str())).collect();
  assert_eq!(
    got,
    [
      (1, "Reuse"),
      (2, "Recycling"),
      (3, "Reparation"),
      (4, "Energy Valorization"),
      (5, "Disposal"),
    ]
  );
  assert_eq!(s.list_by_discriminator(Dimension::WasteCode).await.unwrap().len(), 41);
  assert!(s.list_by_discriminator(Dimension::BuildingElementCategory).await.unwrap().is_empty());
}

#[tokio::test]
async fn reopening_schema_does_not_duplicate_seed() {
  let s = store().await;
  s.init_schema().await.unwrap();
  assert_eq!(s.list_by_discriminator(Dimension::Material).await.unwrap().len(), 21);
}

#[tokio::test]
async fn resolve_by_label_is_exact() {
  let s = store().await;
  let wood = s.resolve_by_label(Dimension::Material, "Wood").await.unwrap();
  assert_eq!(wood.id, 4);

  let err = core(s.resolve_by_label(Dimension::Material, "wood").await.unwrap_err());
  assert!(matches!(err, CoreError::NotFound(ref m) if m.contains("wood")), "{err}");
}

#[tokio::test]
async fn labels_are_unique_per_dimension_only() {
  let s = store().await;
  let strategy = s.resolve_by_label(Dimension::CircularStrategy, "Reparation").await.unwrap();
  let service = s.resolve_by_label(Dimension::CircularService, "Reparation").await.unwrap();
  assert_eq!(strategy.discriminator, Dimension::CircularStrategy);
  assert_eq!(service.discriminator, Dimension::CircularService);
}

#[tokio::test]
async fn resolve_or_create_is_idempotent_after_normalisation() {
  let s = store().await;
  let first = s
    .resolve_or_create_by_label(Dimension::BuildingElementCategory, "  menuiserie ")
    .await
    .unwrap();
  assert_eq!(first.id, 1);
  assert_eq!(first.label, "MENUISERIE");

  let again = s
    .resolve_or_create_by_label(Dimension::BuildingElementCategory, "Menuiserie")
    .await
    .unwrap();
  assert_eq!(again, first);

  let next = s
    .resolve_or_create_by_label(Dimension::BuildingElementCategory, "plomberie")
    .await
    .unwrap();
  assert_eq!(next.id, 2);

  // Ids are allocated per dimension.
  let constitution = s
    .resolve_or_create_by_label(Dimension::BuildingElementConstitution, "chêne")
    .await
    .unwrap();
  assert_eq!(constitution.id, 1);
  assert_eq!(constitution.label, "CHÊNE");
}

#[tokio::test]
async fn resolve_or_create_rejects_blank_label() {
  let s = store().await;
  let err = core(
    s.resolve_or_create_by_label(Dimension::BuildingElementCategory, "   ")
      .await
      .unwrap_err(),
  );
  assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn strict_resolution_rejects_whole_call() {
  let s = store().await;
  let err = core(
    s.resolve_tags(
      Dimension::Material,
      &labels(&["Wood", "Unobtainium", "Metals", "Concrete"]),
      OnMissing::Throw,
    )
    .await
    .unwrap_err(),
  );
  assert!(matches!(err, CoreError::Validation(ref m) if m.contains("Unobtainium")), "{err}");
  assert_eq!(s.list_by_discriminator(Dimension::Material).await.unwrap().len(), 21);
}

#[tokio::test]
async fn resolution_collapses_duplicates_and_orders_by_id() {
  let s = store().await;
  let entries = s
    .resolve_tags(
      Dimension::Material,
      &labels(&["Metals", "Wood", "Metals", ""]),
      OnMissing::Throw,
    )
    .await
    .unwrap();
  let ids: Vec<_> = entries.iter().map(|e| e.id).collect();
  assert_eq!(ids, [4, 5]);

  let created = s
    .resolve_tags(
      Dimension::BuildingElementConstitution,
      &labels(&["bois", "BOIS ", "verre"]),
      OnMissing::Create,
    )
    .await
    .unwrap();
  let got: Vec<_> = created.iter().map(|e| e.label.as_str()).collect();
  assert_eq!(got, ["BOIS", "VERRE"]);
}

#[tokio::test]
async fn create_or_get_waits_for_a_competing_writer() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("rondas.db");
  let s = SqliteStore::open(&path).await.unwrap();

  // Another process holds the write lock and has just inserted the label.
  let mut other = Connection::open(&path).unwrap();
  let tx = write_tx(&mut other).unwrap();
  let theirs =
    registry::resolve_or_create(&tx, Dimension::BuildingElementCategory, "menuiserie").unwrap();

  let racer = {
    let s = s.clone();
    tokio::spawn(async move {
      s.resolve_or_create_by_label(Dimension::BuildingElementCategory, " Menuiserie ")
        .await
    })
  };
  tokio::time::sleep(Duration::from_millis(50)).await;
  tx.commit().unwrap();

  let ours = racer.await.unwrap().unwrap();
  assert_eq!(ours, theirs);
}

#[tokio::test]
async fn concurrent_create_or_get_agrees_across_connections() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("rondas.db");
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();

  let mut handles = Vec::new();
  for round in 0..20 {
    let s = if round % 2 == 0 { a.clone() } else { b.clone() };
    let label = ["charpente", "Plomberie", "MENUISERIE", "couverture"][round % 4];
    handles.push(tokio::spawn(async move {
      s.resolve_or_create_by_label(Dimension::BuildingElementConstitution, label)
        .await
        .map_err(core)
    }));
  }

  let mut seen = std::collections::HashMap::new();
  for handle in handles {
    match handle.await.unwrap() {
      Ok(entry) => {
        let id = *seen.entry(entry.label.clone()).or_insert(entry.id);
        assert_eq!(id, entry.id, "{} got two ids", entry.label);
      }
      Err(CoreError::Conflict(_)) => {}
      Err(other) => panic!("unexpected error: {other:?}"),
    }
  }

  let listed = a
    .list_by_discriminator(Dimension::BuildingElementConstitution)
    .await
    .unwrap();
  assert_eq!(listed.len(), 4);
}

#[test]
fn lost_insert_race_is_retried_then_conflict() {
  let conn = Connection::open_in_memory().unwrap();
  conn.execute_batch(SCHEMA).unwrap();
  // Every insert of this label fails on a constraint while the label stays
  // absent, as when a concurrent writer keeps taking the next id.
  conn
    .execute_batch(
      "CREATE TEMP TRIGGER reject_blocked BEFORE INSERT ON main.type_entries
         WHEN NEW.label = 'BLOCKED'
         BEGIN SELECT RAISE(ABORT, 'taken by another writer'); END;",
    )
    .unwrap();

  let err = core(
    registry::resolve_or_create(&conn, Dimension::BuildingElementCategory, "blocked")
      .unwrap_err(),
  );
  assert!(matches!(err, CoreError::Conflict(ref m) if m.contains("BLOCKED")), "{err:?}");

  // Other labels are unaffected.
  let entry =
    registry::resolve_or_create(&conn, Dimension::BuildingElementCategory, "vitrage").unwrap();
  assert_eq!(entry.label, "VITRAGE");
}

// ─── Entities ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_batch_round_trips_labels() {
  let s = store().await;
  let created = s
    .create_batch(vec![collector("Acme", &["Recycling"]), collector("Beta", &[])])
    .await
    .unwrap();
  assert_eq!(created.len(), 2);

  let listed = s.list_entities::<CollectorFields>().await.unwrap();
  assert_eq!(names(&listed), ["Acme", "Beta"]);
  assert_eq!(listed[0].id, created[0].id);
  assert_eq!(listed[0].labels(Dimension::Material), ["Wood", "Metals"]);
  assert_eq!(listed[0].labels(Dimension::CircularStrategy), ["Recycling"]);
  assert!(listed[1].labels(Dimension::CircularStrategy).is_empty());
  assert_eq!(listed[0].created_at, created[0].created_at);

  // Collectors and contractors do not see each other.
  assert!(s.list_entities::<ContractorFields>().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_batch_is_rejected() {
  let s = store().await;
  let err = core(s.create_batch::<CollectorFields>(vec![]).await.unwrap_err());
  assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn failed_batch_persists_nothing() {
  let s = store().await;
  let err = core(
    s.create_batch(vec![
      element("Porte bois", "menuiserie", &["Wood"]),
      element("Radiateur", "chauffage", &["Unobtainium"]),
    ])
    .await
    .unwrap_err(),
  );
  assert!(matches!(err, CoreError::Validation(ref m) if m.contains("Unobtainium")));

  assert!(s.list_entities::<BuildingElementFields>().await.unwrap().is_empty());
  // The category created for the first element was rolled back too.
  assert!(
    s.list_by_discriminator(Dimension::BuildingElementCategory)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn freeform_slots_are_normalised() {
  let s = store().await;
  let created = s
    .create_batch(vec![element("Porte bois", " menuiserie", &[])])
    .await
    .unwrap();
  assert_eq!(created[0].labels(Dimension::BuildingElementCategory), ["MENUISERIE"]);
  assert_eq!(created[0].labels(Dimension::BuildingElementWorksheet), ["SECOND OEUVRE"]);
}

#[tokio::test]
async fn single_valued_slot_takes_one_label() {
  let s = store().await;
  let mut req = element("Porte bois", "menuiserie", &[]);
  req.tags.insert(Dimension::BuildingElementUnit, labels(&["U", "kg"]));
  let err = core(s.create_batch(vec![req]).await.unwrap_err());
  assert!(matches!(err, CoreError::Validation(ref m) if m.contains("unit_type")), "{err}");
}

#[tokio::test]
async fn required_slot_is_enforced_by_the_store() {
  let s = store().await;
  let mut req = element("Porte bois", "menuiserie", &[]);
  req.tags.insert(Dimension::BuildingElementWorksheet, vec![]);
  let err = core(s.create_batch(vec![req]).await.unwrap_err());
  assert!(matches!(err, CoreError::Validation(ref m) if m.contains("worksheet_type")));
}

#[tokio::test]
async fn update_replaces_tag_sets() {
  let s = store().await;
  let created = s.create_batch(vec![collector("Acme", &["Reuse"])]).await.unwrap();
  let id = created[0].id;

  let mut replacement = collector("Acme Recyclage", &[]);
  replacement.tags.insert(Dimension::Material, labels(&["Concrete"]));
  let updated = s.update_entity(id, replacement).await.unwrap();

  assert_eq!(updated.fields.name, "Acme Recyclage");
  assert_eq!(updated.labels(Dimension::Material), ["Concrete"]);
  assert!(updated.labels(Dimension::CircularStrategy).is_empty());
  assert_eq!(updated.created_at, created[0].created_at);

  let fetched = s.get_entity::<CollectorFields>(id).await.unwrap().unwrap();
  assert_eq!(fetched.labels(Dimension::Material), ["Concrete"]);
}

#[tokio::test]
async fn update_missing_or_other_kind_is_not_found() {
  let s = store().await;
  let err = core(s.update_entity(42, collector("Ghost", &[])).await.unwrap_err());
  assert!(matches!(err, CoreError::NotFound(_)));

  let created = s.create_batch(vec![collector("Acme", &[])]).await.unwrap();
  let err = core(
    s.update_entity(created[0].id, contractor("Acme"))
      .await
      .unwrap_err(),
  );
  assert!(matches!(err, CoreError::NotFound(_)));
  assert!(s.get_entity::<ContractorFields>(created[0].id).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_update_leaves_entity_untouched() {
  let s = store().await;
  let created = s.create_batch(vec![collector("Acme", &["Reuse"])]).await.unwrap();
  let id = created[0].id;

  let err = core(
    s.update_entity(id, collector("Acme", &["Teleportation"]))
      .await
      .unwrap_err(),
  );
  assert!(matches!(err, CoreError::Validation(_)));
  let fetched = s.get_entity::<CollectorFields>(id).await.unwrap().unwrap();
  assert_eq!(fetched.labels(Dimension::CircularStrategy), ["Reuse"]);
}

#[tokio::test]
async fn delete_returns_snapshot_then_not_found() {
  let s = store().await;
  let created = s.create_batch(vec![collector("Acme", &["Reuse"])]).await.unwrap();
  let id = created[0].id;

  let deleted = s.delete_entity::<CollectorFields>(id).await.unwrap();
  assert_eq!(deleted.id, id);
  assert_eq!(deleted.labels(Dimension::CircularStrategy), ["Reuse"]);

  for _ in 0..2 {
    let err = core(s.delete_entity::<CollectorFields>(id).await.unwrap_err());
    assert!(matches!(err, CoreError::NotFound(_)));
  }
  let err = core(s.delete_entity::<CollectorFields>(9_999).await.unwrap_err());
  assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn delete_all_counts_and_spares_other_kinds() {
  let s = store().await;
  s.create_batch(vec![collector("A", &[]), collector("B", &["Reuse"])])
    .await
    .unwrap();
  s.create_batch(vec![contractor("C")]).await.unwrap();

  assert_eq!(s.delete_all_entities::<CollectorFields>().await.unwrap(), 2);
  assert!(s.list_entities::<CollectorFields>().await.unwrap().is_empty());
  assert_eq!(s.list_entities::<ContractorFields>().await.unwrap().len(), 1);
  assert_eq!(s.delete_all_entities::<CollectorFields>().await.unwrap(), 0);
}

#[tokio::test]
async fn filter_options_cover_every_slot() {
  let s = store().await;
  let options = s.filter_options::<ContractorFields>().await.unwrap();
  assert_eq!(options.get(Dimension::CircularService).len(), 5);
  assert_eq!(options.get(Dimension::WasteCode).len(), 41);
  assert!(options.get(Dimension::AuthorizedVehicle).is_empty());

  let json = serde_json::to_value(&options).unwrap();
  let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
  assert_eq!(keys.len(), 3);
  assert!(json["circular_service_types"].is_array());
}

#[tokio::test]
async fn owned_entities_are_listed_newest_first_per_owner() {
  let s = store().await;
  let ana = s.create_account(new_account("ana@example.fr")).await.unwrap();
  let bruno = s.create_account(new_account("bruno@example.fr")).await.unwrap();

  let first = s
    .create_owned_batch(ana.id, vec![element("Porte", "menuiserie", &["Wood"])])
    .await
    .unwrap();
  assert_eq!(first[0].owner_id, Some(ana.id));
  s.create_owned_batch(bruno.id, vec![element("Fenêtre", "menuiserie", &[])])
    .await
    .unwrap();
  s.create_owned_batch(ana.id, vec![element("Radiateur", "chauffage", &[])])
    .await
    .unwrap();
  s.create_batch(vec![element("Anonyme", "divers", &[])]).await.unwrap();

  let mine = s.list_owned_entities::<BuildingElementFields>(ana.id).await.unwrap();
  assert_eq!(names(&mine), ["Radiateur", "Porte"]);
  assert!(mine.iter().all(|e| e.owner_id == Some(ana.id)));

  // Ownership survives a full replacement.
  let updated = s
    .update_entity(first[0].id, element("Porte vitrée", "menuiserie", &["Wood"]))
    .await
    .unwrap();
  assert_eq!(updated.owner_id, Some(ana.id));

  let all = s.list_entities::<BuildingElementFields>().await.unwrap();
  assert_eq!(all.len(), 4);
  assert!(all.iter().any(|e| e.owner_id.is_none()));
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unfiltered_search_returns_everything_in_name_order() {
  let s = store().await;
  s.create_batch(vec![collector("beta", &[]), collector("Alpha", &[]), collector("Gamma", &[])])
    .await
    .unwrap();

  let page = s.search::<CollectorFields>(&SearchQuery::all(20)).await.unwrap();
  assert_eq!(names(&page.results), ["Alpha", "beta", "Gamma"]);
  assert!(!page.has_more);
}

#[tokio::test]
async fn building_elements_are_newest_first() {
  let s = store().await;
  s.create_batch(vec![element("Old door", "menuiserie", &[])]).await.unwrap();
  s.create_batch(vec![element("New door", "menuiserie", &[])]).await.unwrap();

  let page = s
    .search::<BuildingElementFields>(&SearchQuery::all(20))
    .await
    .unwrap();
  assert_eq!(names(&page.results), ["New door", "Old door"]);
  let listed = s.list_entities::<BuildingElementFields>().await.unwrap();
  assert_eq!(names(&listed), ["New door", "Old door"]);
}

#[tokio::test]
async fn text_and_tag_filters_are_conjunctive() {
  let s = store().await;
  s.create_batch(vec![
    collector("Acme", &["Recycling"]),
    collector("Acme2", &["Disposal"]),
    collector("Other", &["Recycling"]),
  ])
  .await
  .unwrap();
  let recycling = s
    .resolve_by_label(Dimension::CircularStrategy, "Recycling")
    .await
    .unwrap();

  let query = SearchQuery::all(20)
    .with_text("acme")
    .with_filter(Dimension::CircularStrategy, &[recycling.id]);
  let page = s.search::<CollectorFields>(&query).await.unwrap();
  assert_eq!(names(&page.results), ["Acme"]);

  // An id set matches when it intersects the entity's tag set.
  let query = SearchQuery::all(20).with_filter(Dimension::CircularStrategy, &[2, 5]);
  let page = s.search::<CollectorFields>(&query).await.unwrap();
  assert_eq!(names(&page.results), ["Acme", "Acme2", "Other"]);
}

#[tokio::test]
async fn text_search_folds_case_and_keeps_wildcards_literal() {
  let s = store().await;
  s.create_batch(vec![
    collector("Éco Collecte", &[]),
    collector("Recup 50%", &[]),
    collector("Recup 500", &[]),
  ])
  .await
  .unwrap();

  let page = s
    .search::<CollectorFields>(&SearchQuery::all(20).with_text("éco"))
    .await
    .unwrap();
  assert_eq!(names(&page.results), ["Éco Collecte"]);

  let page = s
    .search::<CollectorFields>(&SearchQuery::all(20).with_text("50%"))
    .await
    .unwrap();
  assert_eq!(names(&page.results), ["Recup 50%"]);
}

#[tokio::test]
async fn has_more_is_exact_at_page_boundary() {
  let s = store().await;
  s.create_batch(vec![collector("A", &[]), collector("B", &[]), collector("C", &[])])
    .await
    .unwrap();

  let full = s.search::<CollectorFields>(&SearchQuery::all(3)).await.unwrap();
  assert_eq!(full.results.len(), 3);
  assert!(!full.has_more);

  let first = s.search::<CollectorFields>(&SearchQuery::all(2)).await.unwrap();
  assert_eq!(names(&first.results), ["A", "B"]);
  assert!(first.has_more);

  let second = s
    .search::<CollectorFields>(&SearchQuery::all(2).with_page(1))
    .await
    .unwrap();
  assert_eq!(names(&second.results), ["C"]);
  assert!(!second.has_more);
}

#[tokio::test]
async fn filter_on_foreign_dimension_is_rejected() {
  let s = store().await;
  let query = SearchQuery::all(20).with_filter(Dimension::BuildingElementWorksheet, &[1]);
  let err = core(s.search::<CollectorFields>(&query).await.unwrap_err());
  assert!(matches!(err, CoreError::Validation(_)));
}

// ─── Accounts ────────────────────────────────────────────────────────────────

fn new_account(email: &str) -> NewAccount {
  NewAccount {
    email:         email.into(),
    display_name:  "Ana Lima".into(),
    phone:         None,
    password_hash: "$argon2id$v=19$placeholder".into(),
  }
}

#[tokio::test]
async fn accounts_are_keyed_by_normalised_email() {
  let s = store().await;
  let account = s.create_account(new_account(" Ana@Example.fr ")).await.unwrap();
  assert_eq!(account.email, "ana@example.fr");
  assert!(!account.is_email_verified);

  let by_email = s.get_account_by_email("ANA@example.FR").await.unwrap().unwrap();
  assert_eq!(by_email.id, account.id);
  let by_id = s.get_account(account.id).await.unwrap().unwrap();
  assert_eq!(by_id.password_hash, account.password_hash);

  assert!(s.get_account(account.id + 1).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
  let s = store().await;
  s.create_account(new_account("ana@example.fr")).await.unwrap();
  let err = core(s.create_account(new_account("ANA@example.fr")).await.unwrap_err());
  assert!(matches!(err, CoreError::Validation(ref m) if m == "Email already registered"));
}
