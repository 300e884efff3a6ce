use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use pgseed_core::{
    Batch, Column, ColumnType, EntityDefinition, Error, ForeignKey, MemorySession, Row,
    SchemaError, Session, TransactionScope, load, reset, reset_and_load,
};

fn definitions() -> Vec<EntityDefinition> {
    vec![
        EntityDefinition::new("teams")
            .with_column(Column::new("id", ColumnType::Text))
            .with_column(Column::new("name", ColumnType::Text))
            .with_primary_key(&["id"]),
        EntityDefinition::new("players")
            .with_column(Column::new("id", ColumnType::BigInt))
            .with_column(Column::new("team_id", ColumnType::Text))
            .with_column(Column::new("rating", ColumnType::Double).nullable())
            .with_primary_key(&["id"])
            .with_foreign_key(ForeignKey::new("team_id", "teams", "id")),
        EntityDefinition::new("leagues")
            .with_column(Column::new("id", ColumnType::Text))
            .with_primary_key(&["id"]),
        EntityDefinition::association("league_teams")
            .with_column(Column::new("league_id", ColumnType::Text))
            .with_column(Column::new("team_id", ColumnType::Text))
            .with_primary_key(&["league_id", "team_id"])
            .with_foreign_key(ForeignKey::new("league_id", "leagues", "id"))
            .with_foreign_key(ForeignKey::new("team_id", "teams", "id")),
    ]
}

fn team(id: &str) -> Row {
    Row::new().with("id", id).with("name", format!("Team {id}"))
}

fn player(id: i64, team_id: &str) -> Row {
    Row::new().with("id", id).with("team_id", team_id).with("rating", 4.5)
}

fn membership(league_id: &str, team_id: &str) -> Row {
    Row::new().with("league_id", league_id).with("team_id", team_id)
}

fn batches() -> Vec<Batch> {
    vec![
        Batch::new("league_teams", vec![membership("L1", "T1"), membership("L1", "T2")]),
        Batch::new("players", vec![player(1, "T1"), player(2, "T2")]),
        Batch::new("teams", vec![team("T1"), team("T2")]),
        Batch::new("leagues", vec![Row::new().with("id", "L1")]),
    ]
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

async fn prepared() -> MemorySession {
    let mut session = MemorySession::new();
    reset(&mut session, &definitions()).await.expect("reset");
    session
}

fn row_count(session: &MemorySession, entity: &str) -> usize {
    session.rows(entity).map(<[Row]>::len).unwrap_or(0)
}

#[tokio::test]
async fn loads_every_tier_and_commits() {
    let mut session = prepared().await;

    let report = load(&mut session, &definitions(), batches())
        .await
        .expect("load");

    assert!(report.owned_transaction);
    assert_eq!(report.total_rows, 7);
    let entities: Vec<Vec<String>> = report.tiers.iter().map(|t| t.entities.clone()).collect();
    assert_eq!(
        entities,
        vec![
            vec!["teams".to_string(), "leagues".to_string()],
            vec!["players".to_string()],
            vec!["league_teams".to_string()],
        ]
    );
    assert_eq!(row_count(&session, "players"), 2);
    assert_eq!(row_count(&session, "league_teams"), 2);
}

#[tokio::test]
async fn failure_after_first_tier_leaves_no_rows() {
    let mut session = prepared().await;
    session.fail_inserts_into("players");

    let err = load(&mut session, &definitions(), batches())
        .await
        .unwrap_err();

    match err {
        Error::Load(load_err) => {
            assert_eq!(load_err.tier, 1);
            assert_eq!(load_err.batch, 1);
            assert_eq!(load_err.entity, "players");
        }
        other => panic!("expected load error, got {other}"),
    }
    for entity in ["teams", "leagues", "players", "league_teams"] {
        assert_eq!(row_count(&session, entity), 0, "{entity} should be empty");
    }
    assert!(!session.in_transaction());
}

#[tokio::test]
async fn failed_load_restores_prior_state_row_for_row() {
    let mut session = prepared().await;
    load(
        &mut session,
        &definitions(),
        vec![Batch::new("teams", vec![team("T0")])],
    )
    .await
    .expect("seed existing rows");
    let before = session.snapshot();

    let mut failing = batches();
    failing[0].rows.push(membership("L1", "T9"));

    let err = load(&mut session, &definitions(), failing).await.unwrap_err();
    match err {
        Error::Load(load_err) => {
            assert_eq!(load_err.tier, 2);
            assert_eq!(load_err.batch, 0);
            assert!(load_err.cause.to_string().contains("league_teams_team_id_fkey"));
        }
        other => panic!("expected load error, got {other}"),
    }
    assert_eq!(session.snapshot(), before);
}

#[tokio::test]
async fn type_mismatches_abort_the_load() {
    let mut session = prepared().await;
    let bad_player = Row::new().with("id", "one").with("team_id", "T1");
    let err = load(
        &mut session,
        &definitions(),
        vec![
            Batch::new("teams", vec![team("T1")]),
            Batch::new("players", vec![bad_player]),
        ],
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("is of type bigint"));
    assert_eq!(row_count(&session, "teams"), 0);
}

#[tokio::test]
async fn empty_batch_set_still_commits() {
    let mut session = prepared().await;
    let report = load(&mut session, &definitions(), Vec::new())
        .await
        .expect("empty load");
    assert!(report.tiers.is_empty());
    assert_eq!(report.total_rows, 0);
    assert!(!session.in_transaction());
}

#[tokio::test]
async fn empty_batch_set_joins_an_outer_scope() {
    let mut session = prepared().await;
    let mut outer = TransactionScope::acquire(&mut session).await.expect("outer");
    load(outer.session(), &definitions(), vec![Batch::new("teams", vec![team("T1")])])
        .await
        .expect("load");
    let report = load(outer.session(), &definitions(), Vec::new())
        .await
        .expect("empty load");
    assert!(!report.owned_transaction);
    outer.commit().await.expect("commit");

    assert_eq!(row_count(&session, "teams"), 1);
}

#[tokio::test]
async fn nested_load_defers_commit_to_outer_scope() {
    let mut session = prepared().await;
    let mut outer = TransactionScope::acquire(&mut session).await.expect("outer");

    let report = load(outer.session(), &definitions(), batches())
        .await
        .expect("nested load");
    assert!(!report.owned_transaction);
    assert!(outer.session().in_transaction());
    outer.rollback().await.expect("rollback");

    assert_eq!(row_count(&session, "teams"), 0);
    assert_eq!(row_count(&session, "league_teams"), 0);
}

#[tokio::test]
async fn failed_nested_load_poisons_the_outer_commit() {
    let mut session = prepared().await;
    let mut outer = TransactionScope::acquire(&mut session).await.expect("outer");
    load(outer.session(), &definitions(), vec![Batch::new("leagues", vec![Row::new().with("id", "L1")])])
        .await
        .expect("first load");

    let orphan = vec![Batch::new("players", vec![player(1, "T404")])];
    assert!(load(outer.session(), &definitions(), orphan).await.is_err());

    assert!(outer.commit().await.is_err());
    assert_eq!(row_count(&session, "leagues"), 0);
}

#[tokio::test]
async fn failed_joined_load_is_logged_as_rollback_only() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut session = prepared().await;
    let mut outer = TransactionScope::acquire(&mut session).await.expect("outer");
    let orphan = vec![Batch::new("players", vec![player(1, "T404")])];
    assert!(load(outer.session(), &definitions(), orphan).await.is_err());
    assert!(outer.session().is_rollback_only());
    outer.rollback().await.expect("rollback");

    let joined = logs.contents();
    assert!(joined.contains("load_marked_rollback_only"));
    assert!(!joined.contains("load_rolled_back"));

    session.fail_inserts_into("teams");
    assert!(load(&mut session, &definitions(), batches()).await.is_err());
    assert!(logs.contents().contains("load_rolled_back"));
}

#[tokio::test]
async fn reset_is_idempotent() {
    let mut once = MemorySession::new();
    reset(&mut once, &definitions()).await.expect("reset");

    let mut twice = MemorySession::new();
    reset(&mut twice, &definitions()).await.expect("first reset");
    load(&mut twice, &definitions(), batches()).await.expect("load");
    let report = reset(&mut twice, &definitions()).await.expect("second reset");

    assert_eq!(once.schema(), twice.schema());
    assert_eq!(row_count(&twice, "teams"), 0);
    assert_eq!(report.dropped.len(), 4);
}

#[tokio::test]
async fn reset_orders_drops_before_dependents_are_gone() {
    let mut session = prepared().await;
    let report = reset(&mut session, &definitions()).await.expect("reset");

    let position = |names: &[String], name: &str| names.iter().position(|n| n == name).unwrap();
    assert!(position(&report.created, "teams") < position(&report.created, "players"));
    assert!(position(&report.created, "leagues") < position(&report.created, "league_teams"));
    assert!(position(&report.dropped, "league_teams") < position(&report.dropped, "teams"));
}

#[tokio::test]
async fn unreachable_destination_is_a_schema_error() {
    let mut session = MemorySession::new();
    session.set_offline(true);

    let err = reset(&mut session, &definitions()).await.unwrap_err();
    assert!(matches!(err, Error::Schema(SchemaError::Unreachable(_))));
}

#[tokio::test]
async fn invalid_definitions_fail_reset_before_touching_the_destination() {
    let mut session = prepared().await;
    let before = session.schema();

    let mut cyclic = definitions();
    cyclic[0] = cyclic[0]
        .clone()
        .with_column(Column::new("captain_id", ColumnType::BigInt).nullable())
        .with_foreign_key(ForeignKey::new("captain_id", "players", "id"));

    let err = reset(&mut session, &cyclic).await.unwrap_err();
    match err {
        Error::Schema(SchemaError::Invalid(cause)) => {
            assert!(matches!(*cause, Error::Cycle(_)));
        }
        other => panic!("expected invalid definitions, got {other}"),
    }
    assert!(!session.in_transaction());
    assert_eq!(session.schema(), before);
}

#[tokio::test]
async fn reset_and_load_roll_back_together() {
    let mut session = prepared().await;
    load(&mut session, &definitions(), vec![Batch::new("teams", vec![team("T0")])])
        .await
        .expect("existing data");
    let before = session.snapshot();

    let mut failing = batches();
    failing[1].rows.push(player(3, "T404"));
    assert!(reset_and_load(&mut session, &definitions(), failing).await.is_err());

    assert_eq!(session.snapshot(), before);
}

#[tokio::test]
async fn reset_and_load_in_a_rolled_back_outer_scope_has_no_effect() {
    let mut session = MemorySession::new();
    let mut outer = TransactionScope::acquire(&mut session).await.expect("outer");
    let (reset_report, load_report) = reset_and_load(outer.session(), &definitions(), batches())
        .await
        .expect("compose");
    assert!(!reset_report.owned_transaction);
    assert!(!load_report.owned_transaction);
    outer.rollback().await.expect("rollback");

    assert!(session.schema().is_empty());
}
