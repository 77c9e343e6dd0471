use std::cell::Cell;
use std::fs;

use serde_json::{Value, json};
use tempfile::tempdir;
use uuid::Uuid;

use docmigrate::entity::EntityType;
use docmigrate::legacy::LegacyId;
use docmigrate::mapping::IdentityMap;
use docmigrate::migrate::{FailurePolicy, Migrator, RunOutcome};
use docmigrate::report::Outcome;
use docmigrate::store::{JsonDirSource, MemorySource, SqliteTarget, Target};

fn oid(id: &str) -> Value {
    json!({"$oid": id})
}

fn dbref(collection: &str, id: &str) -> Value {
    json!({"$ref": collection, "$id": {"$oid": id}})
}

/// One record per collection, linked the way the document store links them.
fn full_domain() -> MemorySource {
    MemorySource::new()
        .with_collection(
            "users",
            vec![json!({
                "_id": oid("u1"), "uid": "a", "username": "bob", "email": "b@x.com",
                "created_at": {"$date": "2024-03-01T10:00:00Z"}
            })],
        )
        .with_collection(
            "docker_images",
            vec![json!({
                "_id": oid("i1"), "type": "image", "docker_id": "sha256:abc", "tags": "agenta/app:latest",
                "user": dbref("users", "u1")
            })],
        )
        .with_collection(
            "app_db",
            vec![json!({"_id": oid("a1"), "app_name": "chat", "user": dbref("users", "u1")})],
        )
        .with_collection(
            "deployments",
            vec![json!({
                "_id": oid("d1"), "app": dbref("app_db", "a1"), "user": dbref("users", "u1"),
                "container_name": "chat-app", "uri": "http://localhost/chat", "status": "running"
            })],
        )
        .with_collection(
            "bases",
            vec![json!({
                "_id": oid("b1"), "app": dbref("app_db", "a1"), "user": dbref("users", "u1"),
                "image": dbref("docker_images", "i1"), "base_name": "app", "deployment": oid("d1")
            })],
        )
        .with_collection(
            "app_variants",
            vec![json!({
                "_id": oid("v1"), "app": dbref("app_db", "a1"), "image": dbref("docker_images", "i1"),
                "user": dbref("users", "u1"), "modified_by": dbref("users", "u1"),
                "base": dbref("bases", "b1"), "base_name": "app", "variant_name": "app.default",
                "revision": 1, "config_name": "default", "config": {"temperature": 0.7}
            })],
        )
        .with_collection(
            "app_variant_revisions",
            vec![json!({
                "_id": oid("r1"), "variant": dbref("app_variants", "v1"),
                "modified_by": dbref("users", "u1"), "base": dbref("bases", "b1"), "revision": 1,
                "config": {"config_name": "default", "parameters": {"temperature": 0.7}},
                "created_at": "2024-03-02T00:00:00Z", "updated_at": "2024-03-02T00:00:00Z"
            })],
        )
        .with_collection(
            "environments",
            vec![
                json!({
                    "_id": oid("e1"), "app": dbref("app_db", "a1"), "user": dbref("users", "u1"),
                    "name": "production", "revision": 1, "deployed_app_variant": oid("v1"),
                    "deployed_app_variant_revision": oid("r1"), "deployment": oid("d1")
                }),
                json!({
                    "_id": oid("e2"), "app": dbref("app_db", "a1"), "user": dbref("users", "u1"),
                    "name": "staging", "revision": 0, "deployed_app_variant": null,
                    "deployed_app_variant_revision": null, "deployment": null
                }),
            ],
        )
        .with_collection(
            "environments_revisions",
            vec![json!({
                "_id": oid("er1"), "environment": dbref("environments", "e1"),
                "modified_by": dbref("users", "u1"), "revision": 1,
                "deployed_app_variant_revision": oid("r1"), "deployment": oid("d1"),
                "created_at": "2024-03-03T00:00:00Z"
            })],
        )
        .with_collection(
            "templates",
            vec![json!({
                "_id": oid("tp1"), "name": "chat", "title": "Chat", "description": "Chat app",
                "tag_id": 42, "size": {"$numberLong": "1048576"}, "last_pushed": "2024-01-01T00:00:00Z"
            })],
        )
        .with_collection(
            "testsets",
            vec![json!({
                "_id": oid("t1"), "name": "smoke", "app": dbref("app_db", "a1"),
                "user": dbref("users", "u1"), "csvdata": [{"country": "France", "correct_answer": "Paris"}]
            })],
        )
        .with_collection(
            "evaluators_configs",
            vec![json!({
                "_id": oid("c1"), "app": dbref("app_db", "a1"), "user": dbref("users", "u1"),
                "name": "exact", "evaluator_key": "auto_exact_match", "settings_values": {}
            })],
        )
        .with_collection(
            "human_evaluations",
            vec![json!({
                "_id": oid("h1"), "app": dbref("app_db", "a1"), "user": dbref("users", "u1"),
                "testset": dbref("testsets", "t1"), "status": "EVALUATION_FINISHED",
                "evaluation_type": "human_a_b_testing", "variants": [oid("v1")],
                "variants_revisions": [oid("r1")]
            })],
        )
        .with_collection(
            "human_evaluations_scenarios",
            vec![json!({
                "_id": oid("hs1"), "user": dbref("users", "u1"),
                "evaluation": dbref("human_evaluations", "h1"),
                "inputs": [{"input_name": "country", "input_value": "France"}],
                "outputs": [{"variant_id": "v1", "variant_output": "Paris"}],
                "vote": "v1", "is_pinned": false
            })],
        )
        .with_collection(
            "evaluations",
            vec![json!({
                "_id": oid("ev1"), "app": dbref("app_db", "a1"), "user": dbref("users", "u1"),
                "testset": dbref("testsets", "t1"), "variant": oid("v1"), "variant_revision": oid("r1"),
                "status": {"value": "EVALUATION_FINISHED"}, "aggregated_results": [],
                "average_cost": {"type": "number", "value": 0.01}, "total_cost": null,
                "average_latency": {"type": "number", "value": 1.2}
            })],
        )
        .with_collection(
            "evaluation_scenarios",
            vec![json!({
                "_id": oid("es1"), "user": dbref("users", "u1"), "evaluation": dbref("evaluations", "ev1"),
                "variant_id": oid("v1"), "inputs": [], "outputs": [], "results": [],
                "latency": 1.2, "cost": 0.01
            })],
        )
}

fn run(source: &MemorySource, policy: FailurePolicy) -> (RunOutcome, SqliteTarget) {
    let mut target = SqliteTarget::open_memory().unwrap();
    let outcome = Migrator::new(policy).unwrap().run(source, &mut target);
    (outcome, target)
}

fn mapped(mappings: &IdentityMap, legacy: &str) -> Uuid {
    mappings.resolve(&LegacyId::new(legacy)).unwrap()
}

fn column(target: &SqliteTarget, table: &str, column: &str, id: Uuid) -> Option<String> {
    target
        .conn()
        .query_row(
            &format!("SELECT \"{column}\" FROM \"{table}\" WHERE id = ?1"),
            [id.to_string()],
            |row| row.get(0),
        )
        .unwrap()
}

#[test]
fn user_fields_survive_and_row_id_is_the_mapped_id() {
    let source = MemorySource::new().with_collection(
        "users",
        vec![json!({"_id": "u1", "uid": "a", "username": "bob", "email": "b@x.com"})],
    );
    let (outcome, target) = run(&source, FailurePolicy::BestEffort);

    assert_eq!(outcome.report.outcome, Outcome::Succeeded);
    assert_eq!(target.count(EntityType::User).unwrap(), 1);

    let id = mapped(&outcome.mappings, "u1");
    assert_eq!(column(&target, "users", "uid", id).as_deref(), Some("a"));
    assert_eq!(column(&target, "users", "username", id).as_deref(), Some("bob"));
    assert_eq!(column(&target, "users", "email", id).as_deref(), Some("b@x.com"));
    assert!(column(&target, "users", "created_at", id).is_some());
    assert!(column(&target, "users", "updated_at", id).is_some());
}

#[test]
fn app_user_id_is_the_mapped_user_id() {
    let source = MemorySource::new()
        .with_collection(
            "users",
            vec![json!({"_id": "u1", "uid": "a", "username": "bob", "email": "b@x.com"})],
        )
        .with_collection(
            "app_db",
            vec![json!({"_id": "a1", "app_name": "chat", "user": {"$ref": "users", "$id": "u1"}})],
        );
    let (outcome, target) = run(&source, FailurePolicy::BestEffort);

    let app_id = mapped(&outcome.mappings, "a1");
    let user_id = mapped(&outcome.mappings, "u1");
    assert_eq!(
        column(&target, "app_db", "user_id", app_id),
        Some(user_id.to_string())
    );
}

#[test]
fn full_domain_migrates_without_dangling_references() {
    let (outcome, target) = run(&full_domain(), FailurePolicy::BestEffort);

    assert_eq!(
        outcome.report.outcome,
        Outcome::Succeeded,
        "{:?}",
        outcome.report.fatal
    );
    assert_eq!(outcome.report.entities.len(), EntityType::ALL.len());
    assert_eq!(outcome.report.total_failed(), 0);
    assert_eq!(outcome.mappings.len(), 17);
    assert_eq!(target.count(EntityType::Environment).unwrap(), 2);

    // Every registered mapping has exactly one row carrying the new id.
    for entry in outcome.mappings.entries() {
        let rows: i64 = target
            .conn()
            .query_row(
                &format!("SELECT COUNT(*) FROM \"{}\" WHERE id = ?1", entry.entity.table()),
                [entry.new_id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1, "{} {}", entry.entity, entry.legacy_id);
    }

    let mut stmt = target.conn().prepare("PRAGMA foreign_key_check").unwrap();
    let violations = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap().count();
    assert_eq!(violations, 0);

    let revision = mapped(&outcome.mappings, "r1");
    let er1 = mapped(&outcome.mappings, "er1");
    assert_eq!(
        column(&target, "environments_revisions", "deployed_app_variant_revision_id", er1),
        Some(revision.to_string())
    );
    let template = mapped(&outcome.mappings, "tp1");
    assert_eq!(column(&target, "templates", "type", template).as_deref(), Some("image"));
}

#[test]
fn optional_references_become_null_columns() {
    let (outcome, target) = run(&full_domain(), FailurePolicy::BestEffort);
    let staging = mapped(&outcome.mappings, "e2");

    assert_eq!(column(&target, "environments", "deployed_app_variant_id", staging), None);
    assert_eq!(column(&target, "environments", "deployment_id", staging), None);
    assert_eq!(
        column(&target, "environments", "name", staging).as_deref(),
        Some("staging")
    );
}

#[test]
fn missing_required_reference_excludes_only_that_record() {
    let source = MemorySource::new()
        .with_collection(
            "users",
            vec![json!({"_id": "u1", "uid": "a", "username": "bob", "email": "b@x.com"})],
        )
        .with_collection(
            "app_db",
            vec![
                json!({"_id": "a1", "app_name": "kept", "user": "u1"}),
                json!({"_id": "a2", "app_name": "dropped"}),
            ],
        );
    let (outcome, target) = run(&source, FailurePolicy::BestEffort);

    assert_eq!(outcome.report.outcome, Outcome::Partial);
    assert_eq!(target.count(EntityType::App).unwrap(), 1);
    let apps = outcome.report.entity(EntityType::App).unwrap();
    assert_eq!(apps.failures.len(), 1);
    assert_eq!(apps.failures[0].code, "unresolved_reference");
    assert!(outcome.mappings.resolve(&LegacyId::new("a2")).is_err());
}

#[test]
fn excluded_records_cascade_to_their_dependents() {
    let source = MemorySource::new()
        .with_collection(
            "users",
            vec![json!({"_id": "u1", "uid": "a", "username": "bob"})],
        )
        .with_collection("app_db", vec![json!({"_id": "a1", "app_name": "chat", "user": "u1"})])
        .with_collection(
            "deployments",
            vec![json!({"_id": "d1", "app": "a1", "user": "u1", "status": "running"})],
        );
    let (outcome, target) = run(&source, FailurePolicy::BestEffort);

    let codes = |entity| {
        outcome
            .report
            .entity(entity)
            .unwrap()
            .failures
            .iter()
            .map(|f| f.code)
            .collect::<Vec<_>>()
    };
    assert_eq!(codes(EntityType::User), vec!["field_validation"]);
    assert_eq!(codes(EntityType::App), vec!["unresolved_reference"]);
    assert_eq!(codes(EntityType::Deployment), vec!["unresolved_reference"]);
    assert!(outcome.mappings.is_empty());
    for entity in EntityType::ALL {
        assert_eq!(target.count(entity).unwrap(), 0);
    }
}

#[test]
fn reference_to_a_later_entity_type_is_unresolved() {
    let source = MemorySource::new()
        .with_collection(
            "users",
            vec![json!({"_id": "u1", "uid": "a", "username": "bob", "email": "b@x.com"})],
        )
        .with_collection("app_db", vec![json!({"_id": "a1", "app_name": "chat", "user": "tp1"})])
        .with_collection(
            "templates",
            vec![json!({"_id": "tp1", "name": "n", "title": "t", "description": "d"})],
        );
    let (outcome, _) = run(&source, FailurePolicy::BestEffort);

    let apps = outcome.report.entity(EntityType::App).unwrap();
    assert_eq!(apps.failures[0].code, "unresolved_reference");
    assert!(apps.failures[0].message.contains("tp1"));
    // The template itself still migrates afterwards.
    assert_eq!(outcome.report.entity(EntityType::Template).unwrap().written, 1);
}

#[test]
fn duplicate_legacy_id_aborts_the_run() {
    let source = MemorySource::new()
        .with_collection(
            "users",
            vec![json!({"_id": "x1", "uid": "a", "username": "bob", "email": "b@x.com"})],
        )
        .with_collection("app_db", vec![json!({"_id": "x1", "app_name": "chat", "user": "x1"})]);

    let emitted = Cell::new(0);
    let mut target = SqliteTarget::open_memory().unwrap();
    let outcome = Migrator::new(FailurePolicy::BestEffort)
        .unwrap()
        .run_with(&source, &mut target, |_| emitted.set(emitted.get() + 1));

    assert_eq!(emitted.get(), 1);
    assert_eq!(outcome.report.outcome, Outcome::Aborted);
    let fatal = outcome.report.fatal.as_ref().unwrap();
    assert_eq!(fatal.code, "duplicate_mapping");
    assert_eq!(fatal.entity, Some(EntityType::App));
    assert_eq!(target.count(EntityType::User).unwrap(), 1);
    assert_eq!(target.count(EntityType::App).unwrap(), 0);
    assert!(
        outcome
            .mappings
            .resolve_as(&LegacyId::new("x1"), EntityType::User)
            .is_ok()
    );
}

#[test]
fn report_is_emitted_once_on_success() {
    let emitted = Cell::new(0);
    let mut target = SqliteTarget::open_memory().unwrap();
    let outcome = Migrator::new(FailurePolicy::BestEffort)
        .unwrap()
        .run_with(&full_domain(), &mut target, |report| {
            assert!(report.finished_at.is_some());
            emitted.set(emitted.get() + 1);
        });
    assert!(outcome.succeeded());
    assert_eq!(emitted.get(), 1);
}

#[test]
fn rerun_reproduces_counts_with_fresh_ids() {
    let source = full_domain();
    let mut target = SqliteTarget::open_memory().unwrap();
    let migrator = Migrator::new(FailurePolicy::BestEffort).unwrap();

    let first = migrator.run(&source, &mut target);
    let first_counts: Vec<usize> = EntityType::ALL
        .iter()
        .map(|e| target.count(*e).unwrap())
        .collect();

    let second = migrator.run(&source, &mut target);
    let second_counts: Vec<usize> = EntityType::ALL
        .iter()
        .map(|e| target.count(*e).unwrap())
        .collect();

    assert_eq!(first_counts, second_counts);
    assert_ne!(
        mapped(&first.mappings, "u1"),
        mapped(&second.mappings, "u1")
    );
}

#[test]
fn narrower_order_reruns_over_a_previous_full_migration() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("migrated.db");
    let source = full_domain();

    let mut target = SqliteTarget::open(&path).unwrap();
    let first = Migrator::new(FailurePolicy::BestEffort)
        .unwrap()
        .run(&source, &mut target);
    assert!(first.succeeded());
    drop(target);

    let mut target = SqliteTarget::open(&path).unwrap();
    let second = Migrator::new(FailurePolicy::BestEffort)
        .unwrap()
        .with_order(vec![EntityType::User])
        .unwrap()
        .run(&source, &mut target);

    assert_eq!(second.report.outcome, Outcome::Succeeded, "{:?}", second.report.fatal);
    assert_eq!(target.count(EntityType::User).unwrap(), 1);
    assert_ne!(mapped(&first.mappings, "u1"), mapped(&second.mappings, "u1"));
}

#[test]
fn ids_are_issued_in_migration_order() {
    let (outcome, _) = run(&full_domain(), FailurePolicy::BestEffort);
    let entries = outcome.mappings.entries();
    let positions: Vec<usize> = entries
        .iter()
        .map(|entry| {
            outcome
                .report
                .order
                .iter()
                .position(|e| *e == entry.entity)
                .unwrap()
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] <= w[1]));
    assert!(entries.windows(2).all(|w| w[0].new_id < w[1].new_id));
    assert!(entries.iter().all(|e| e.new_id.get_version_num() == 7));
}

#[test]
fn fail_fast_stops_at_the_first_excluded_record() {
    let source = MemorySource::new()
        .with_collection(
            "users",
            vec![
                json!({"_id": "u1", "uid": "a", "username": "bob", "email": "b@x.com"}),
                json!({"_id": "u2", "uid": "b", "username": "eve", "email": 7}),
                json!({"_id": "u3", "uid": "c", "username": "amy", "email": "c@x.com"}),
            ],
        )
        .with_collection("app_db", vec![json!({"_id": "a1", "app_name": "chat", "user": "u1"})]);
    let (outcome, target) = run(&source, FailurePolicy::FailFast);

    assert_eq!(outcome.report.outcome, Outcome::Aborted);
    let users = outcome.report.entity(EntityType::User).unwrap();
    assert_eq!((users.read, users.transformed, users.failed, users.written), (3, 1, 1, 0));
    assert_eq!(target.count(EntityType::User).unwrap(), 0);
    assert!(outcome.report.entity(EntityType::App).is_none());
}

#[test]
fn migrates_a_mongoexport_directory() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("users.json"),
        r#"[{"_id": {"$oid": "65f0c0ffee0000000000aaaa"}, "uid": "a", "username": "bob", "email": "b@x.com",
             "created_at": {"$date": {"$numberLong": "1709287200000"}}}]"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("app_db.jsonl"),
        concat!(
            r#"{"_id": {"$oid": "65f0c0ffee0000000000bbbb"}, "app_name": "chat", "user": {"$ref": "users", "$id": {"$oid": "65f0c0ffee0000000000aaaa"}}}"#,
            "\n"
        ),
    )
    .unwrap();

    let source = JsonDirSource::open(dir.path()).unwrap();
    let db = dir.path().join("migrated.db");
    let mut target = SqliteTarget::open(&db).unwrap();
    let outcome = Migrator::new(FailurePolicy::BestEffort)
        .unwrap()
        .run(&source, &mut target);

    assert!(outcome.succeeded(), "{:?}", outcome.report);
    let user_id = mapped(&outcome.mappings, "65f0c0ffee0000000000aaaa");
    let created: Option<String> = column(&target, "users", "created_at", user_id);
    assert!(created.unwrap().starts_with("2024-03-01T10:00:00"));
    assert_eq!(target.count(EntityType::App).unwrap(), 1);
}
