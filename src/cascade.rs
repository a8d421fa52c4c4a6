//! Relation-aware delete.
//!
//! A delete first reads the target row, then walks the entity's relation
//! rules: cascading relations have their dependent rows removed, restricting
//! relations block the delete as soon as one dependent row exists. Everything
//! runs in a single transaction, so a blocked or failed delete leaves the
//! workspace exactly as it was.

use crate::entities::{validate_rule, Entity, EntityRegistry, RelationRule, RuleError};
use crate::store::RecordStore;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRequest {
    pub entity: Entity,
    pub id: i64,
}

/// Order in which rules are acted on. Both orders give the same outcome and
/// the same final state; they differ in whether rollback undoes cascades.
/// When a cascade fails in storage, a blocking relation still takes
/// precedence over the storage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Count every restricting relation first, cascade only once all pass.
    #[default]
    CheckFirst,
    /// Act on rules in declaration order; a later block rolls back earlier cascades.
    InOrder,
}

impl Strategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "checkFirst" => Some(Self::CheckFirst),
            "inOrder" => Some(Self::InOrder),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckFirst => "checkFirst",
            Self::InOrder => "inOrder",
        }
    }
}

/// French label for a dependent table, plural marker included, as used in
/// blocking messages. Unknown tables pass through unchanged.
pub fn display_name(table: &str) -> &str {
    match table {
        "grade" => "niveau(x)",
        "class_room" => "classe(s)",
        "T_student" => "étudiant(s)",
        "professor" => "professeur(s)",
        "course" => "matière(s)",
        "note" => "note(s)",
        "payment" => "paiement(s)",
        "scholarship" => "bourse(s)",
        "attendance" => "présence(s)",
        "homework" => "devoir(s)",
        other => other,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error("{entity} non trouvé")]
    NotFound { entity: Entity },

    #[error("Impossible de supprimer car il y a {count} {display_name} lié(s)")]
    Blocked {
        table: String,
        display_name: String,
        count: i64,
    },

    #[error("{0}")]
    Storage(#[from] rusqlite::Error),

    /// Caught before any SQL is issued; surfaces as a storage failure.
    #[error("{0}")]
    InvalidRule(#[from] RuleError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cascaded {
    pub table: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub entity: Entity,
    pub cascaded: Vec<Cascaded>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeKind {
    Deleted,
    NotFound,
    Blocked,
    StorageFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedBy {
    pub table: String,
    pub display_name: String,
    pub count: i64,
}

/// What the UI receives: `success` and `message` are shown verbatim, the rest
/// lets callers branch without parsing text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub success: bool,
    pub message: String,
    pub kind: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<BlockedBy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cascaded: Vec<Cascaded>,
}

impl From<Result<Deleted, DeleteError>> for DeleteOutcome {
    fn from(result: Result<Deleted, DeleteError>) -> Self {
        match result {
            Ok(d) => DeleteOutcome {
                success: true,
                message: format!("{} supprimé avec succès", d.entity),
                kind: OutcomeKind::Deleted,
                blocked_by: None,
                cascaded: d.cascaded,
            },
            Err(e) => {
                let message = e.to_string();
                let (kind, blocked_by) = match e {
                    DeleteError::NotFound { .. } => (OutcomeKind::NotFound, None),
                    DeleteError::Blocked {
                        table,
                        display_name,
                        count,
                    } => (
                        OutcomeKind::Blocked,
                        Some(BlockedBy {
                            table,
                            display_name,
                            count,
                        }),
                    ),
                    DeleteError::Storage(_) | DeleteError::InvalidRule(_) => {
                        (OutcomeKind::StorageFailure, None)
                    }
                };
                DeleteOutcome {
                    success: false,
                    message,
                    kind,
                    blocked_by,
                    cascaded: Vec::new(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationCount {
    pub table: String,
    pub display_name: String,
    pub foreign_key_column: String,
    pub cascade: bool,
    pub count: i64,
}

/// Dry run of a delete: what would be removed and what would block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePlan {
    pub entity: Entity,
    pub id: i64,
    pub deletable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub relations: Vec<RelationCount>,
}

fn ensure_target<S: RecordStore + ?Sized>(
    store: &S,
    req: DeleteRequest,
) -> Result<(), DeleteError> {
    if store.find_one(req.entity.table(), req.id)? {
        Ok(())
    } else {
        Err(DeleteError::NotFound { entity: req.entity })
    }
}

fn check_rule<S: RecordStore + ?Sized>(
    store: &S,
    rule: &RelationRule,
    id: i64,
) -> Result<(), DeleteError> {
    let count = store.count(&rule.dependent_table, &rule.foreign_key_column, id)?;
    tracing::debug!(
        table = %rule.dependent_table,
        column = %rule.foreign_key_column,
        id,
        count,
        "checked restricting relation"
    );
    if count > 0 {
        return Err(DeleteError::Blocked {
            table: rule.dependent_table.clone(),
            display_name: display_name(&rule.dependent_table).to_string(),
            count,
        });
    }
    Ok(())
}

fn cascade_rule<S: RecordStore + ?Sized>(
    store: &S,
    rule: &RelationRule,
    id: i64,
) -> Result<Cascaded, DeleteError> {
    let rows = store.delete_where(&rule.dependent_table, &rule.foreign_key_column, id)?;
    tracing::debug!(
        table = %rule.dependent_table,
        column = %rule.foreign_key_column,
        id,
        rows,
        "cascaded relation"
    );
    Ok(Cascaded {
        table: rule.dependent_table.clone(),
        rows,
    })
}

/// First restricting rule, in declaration order, that has dependents.
fn first_blocking<S: RecordStore + ?Sized>(
    store: &S,
    rules: &[RelationRule],
    id: i64,
) -> Result<Option<DeleteError>, DeleteError> {
    for rule in rules.iter().filter(|r| !r.cascade) {
        match check_rule(store, rule, id) {
            Ok(()) => {}
            Err(e @ DeleteError::Blocked { .. }) => return Ok(Some(e)),
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Runs the delete steps against `store`. Transaction handling is the
/// caller's job: on `Err`, whatever was issued must be rolled back.
/// Rules are trusted as-is; `CascadeDeleter` validates them first.
pub(crate) fn run_delete<S: RecordStore + ?Sized>(
    store: &S,
    req: DeleteRequest,
    rules: &[RelationRule],
    strategy: Strategy,
) -> Result<Deleted, DeleteError> {
    ensure_target(store, req)?;

    let mut cascaded = Vec::new();
    match strategy {
        Strategy::CheckFirst => {
            for rule in rules.iter().filter(|r| !r.cascade) {
                check_rule(store, rule, req.id)?;
            }
            for rule in rules.iter().filter(|r| r.cascade) {
                cascaded.push(cascade_rule(store, rule, req.id)?);
            }
        }
        Strategy::InOrder => {
            for rule in rules {
                if rule.cascade {
                    match cascade_rule(store, rule, req.id) {
                        Ok(c) => cascaded.push(c),
                        // SQLite undoes only the failed statement, so later
                        // counts still see this transaction's state.
                        Err(e @ DeleteError::Storage(_)) => {
                            return Err(first_blocking(store, rules, req.id)?.unwrap_or(e));
                        }
                        Err(e) => return Err(e),
                    }
                } else {
                    check_rule(store, rule, req.id)?;
                }
            }
        }
    }

    store.delete_by_id(req.entity.table(), req.id)?;
    Ok(Deleted {
        entity: req.entity,
        cascaded,
    })
}

/// Counts every relation of the target without touching any row.
pub(crate) fn plan_delete<S: RecordStore + ?Sized>(
    store: &S,
    req: DeleteRequest,
    rules: &[RelationRule],
) -> Result<DeletePlan, DeleteError> {
    ensure_target(store, req)?;

    let mut relations = Vec::with_capacity(rules.len());
    let mut message = None;
    for rule in rules {
        let count = store.count(&rule.dependent_table, &rule.foreign_key_column, req.id)?;
        let display = display_name(&rule.dependent_table).to_string();
        if !rule.cascade && count > 0 && message.is_none() {
            let blocked = DeleteError::Blocked {
                table: rule.dependent_table.clone(),
                display_name: display.clone(),
                count,
            };
            message = Some(blocked.to_string());
        }
        relations.push(RelationCount {
            table: rule.dependent_table.clone(),
            display_name: display,
            foreign_key_column: rule.foreign_key_column.clone(),
            cascade: rule.cascade,
            count,
        });
    }

    Ok(DeletePlan {
        entity: req.entity,
        id: req.id,
        deletable: message.is_none(),
        message,
        relations,
    })
}

/// Deletes workspace records according to the registry's relation rules.
pub struct CascadeDeleter<'a> {
    conn: &'a Connection,
    registry: &'a EntityRegistry,
    strategy: Strategy,
}

impl<'a> CascadeDeleter<'a> {
    pub fn new(conn: &'a Connection, registry: &'a EntityRegistry) -> Self {
        Self {
            conn,
            registry,
            strategy: Strategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn delete(&self, req: DeleteRequest) -> DeleteOutcome {
        self.delete_with(req, self.registry.rules(req.entity))
    }

    /// Same as `delete`, with an explicit rule list instead of the registry's.
    pub fn delete_with(&self, req: DeleteRequest, rules: &[RelationRule]) -> DeleteOutcome {
        let result = self.try_delete(req, rules);
        match &result {
            Ok(d) => tracing::info!(
                entity = %req.entity,
                id = req.id,
                strategy = self.strategy.as_str(),
                cascaded = ?d.cascaded,
                "record deleted"
            ),
            Err(e) => tracing::warn!(
                entity = %req.entity,
                id = req.id,
                strategy = self.strategy.as_str(),
                error = %e,
                "delete refused"
            ),
        }
        DeleteOutcome::from(result)
    }

    pub fn try_delete(
        &self,
        req: DeleteRequest,
        rules: &[RelationRule],
    ) -> Result<Deleted, DeleteError> {
        // Rule names are spliced into SQL, so caller-supplied lists are checked here.
        for rule in rules {
            validate_rule(rule)?;
        }
        let tx = self.conn.unchecked_transaction()?;
        match run_delete(&*tx, req, rules, self.strategy) {
            Ok(deleted) => {
                tx.commit()?;
                Ok(deleted)
            }
            Err(e) => {
                let _ = tx.rollback();
                Err(e)
            }
        }
    }

    /// Read-only; the transaction is always rolled back.
    pub fn preview(&self, req: DeleteRequest) -> Result<DeletePlan, DeleteError> {
        let tx = self.conn.unchecked_transaction()?;
        let plan = plan_delete(&*tx, req, self.registry.rules(req.entity));
        let _ = tx.rollback();
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use std::cell::RefCell;

    fn setup() -> (Connection, EntityRegistry) {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        let reg = EntityRegistry::school().expect("registry");
        (conn, reg)
    }

    fn insert_grade(conn: &Connection, id: i64) {
        conn.execute(
            "INSERT INTO grade(id, name, created_at) VALUES(?, ?, '2026-09-01')",
            (id, format!("Grade {id}")),
        )
        .expect("insert grade");
    }

    fn insert_class_room(conn: &Connection, grade_id: i64) -> i64 {
        conn.execute(
            "INSERT INTO class_room(name, gradeId, created_at) VALUES('A', ?, '2026-09-01')",
            [grade_id],
        )
        .expect("insert class_room");
        conn.last_insert_rowid()
    }

    fn insert_student(conn: &Connection, grade_id: i64) -> i64 {
        conn.execute(
            "INSERT INTO T_student(lastName, firstName, gradeId, created_at)
             VALUES('Diallo', 'Awa', ?, '2026-09-01')",
            [grade_id],
        )
        .expect("insert student");
        conn.last_insert_rowid()
    }

    fn count(conn: &Connection, sql: &str, id: i64) -> i64 {
        conn.query_row(sql, [id], |r| r.get(0)).expect("count")
    }

    /// Forwards to a real connection and records which tables were touched.
    struct Recording<'a> {
        inner: &'a Connection,
        calls: RefCell<Vec<String>>,
    }

    impl RecordStore for Recording<'_> {
        fn find_one(&self, table: &str, id: i64) -> rusqlite::Result<bool> {
            self.calls.borrow_mut().push(format!("find {table}"));
            self.inner.find_one(table, id)
        }
        fn count(&self, table: &str, column: &str, id: i64) -> rusqlite::Result<i64> {
            self.calls.borrow_mut().push(format!("count {table}"));
            self.inner.count(table, column, id)
        }
        fn delete_where(&self, table: &str, column: &str, id: i64) -> rusqlite::Result<usize> {
            self.calls.borrow_mut().push(format!("delete_where {table}"));
            self.inner.delete_where(table, column, id)
        }
        fn delete_by_id(&self, table: &str, id: i64) -> rusqlite::Result<usize> {
            self.calls.borrow_mut().push(format!("delete {table}"));
            self.inner.delete_by_id(table, id)
        }
    }

    fn grade_rules() -> Vec<RelationRule> {
        vec![
            RelationRule::cascade("class_room", "gradeId"),
            RelationRule::restrict("T_student", "gradeId"),
        ]
    }

    #[test]
    fn missing_target_touches_no_dependent_table() {
        let (conn, _) = setup();
        let rec = Recording {
            inner: &conn,
            calls: RefCell::new(Vec::new()),
        };
        for strategy in [Strategy::CheckFirst, Strategy::InOrder] {
            rec.calls.borrow_mut().clear();
            let e = run_delete(
                &rec,
                DeleteRequest {
                    entity: Entity::Grade,
                    id: 999,
                },
                &grade_rules(),
                strategy,
            )
            .unwrap_err();
            assert_eq!(e.to_string(), "Grade non trouvé");
            assert_eq!(*rec.calls.borrow(), vec!["find grade".to_string()]);
        }
    }

    #[test]
    fn blocked_grade_keeps_rows_under_both_strategies() {
        for strategy in [Strategy::CheckFirst, Strategy::InOrder] {
            let (conn, reg) = setup();
            insert_grade(&conn, 5);
            for _ in 0..3 {
                insert_student(&conn, 5);
            }
            let outcome = CascadeDeleter::new(&conn, &reg)
                .with_strategy(strategy)
                .delete_with(
                    DeleteRequest {
                        entity: Entity::Grade,
                        id: 5,
                    },
                    &grade_rules(),
                );
            assert!(!outcome.success);
            assert_eq!(outcome.kind, OutcomeKind::Blocked);
            assert_eq!(
                outcome.message,
                "Impossible de supprimer car il y a 3 étudiant(s) lié(s)"
            );
            assert_eq!(
                outcome.blocked_by,
                Some(BlockedBy {
                    table: "T_student".to_string(),
                    display_name: "étudiant(s)".to_string(),
                    count: 3,
                })
            );
            assert_eq!(count(&conn, "SELECT COUNT(*) FROM grade WHERE id = ?", 5), 1);
            assert_eq!(
                count(&conn, "SELECT COUNT(*) FROM T_student WHERE gradeId = ?", 5),
                3
            );
        }
    }

    #[test]
    fn in_order_rolls_back_earlier_cascades() {
        let (conn, reg) = setup();
        insert_grade(&conn, 5);
        insert_class_room(&conn, 5);
        insert_class_room(&conn, 5);
        insert_student(&conn, 5);

        // The student has no class room, so the cascade itself succeeds before the block.
        let outcome = CascadeDeleter::new(&conn, &reg)
            .with_strategy(Strategy::InOrder)
            .delete_with(
                DeleteRequest {
                    entity: Entity::Grade,
                    id: 5,
                },
                &grade_rules(),
            );
        assert_eq!(outcome.kind, OutcomeKind::Blocked);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM class_room WHERE gradeId = ?", 5),
            2
        );
    }

    #[test]
    fn check_first_never_cascades_when_blocked() {
        let (conn, _) = setup();
        insert_grade(&conn, 5);
        insert_class_room(&conn, 5);
        insert_student(&conn, 5);
        let rec = Recording {
            inner: &conn,
            calls: RefCell::new(Vec::new()),
        };
        let e = run_delete(
            &rec,
            DeleteRequest {
                entity: Entity::Grade,
                id: 5,
            },
            &grade_rules(),
            Strategy::CheckFirst,
        )
        .unwrap_err();
        assert!(matches!(e, DeleteError::Blocked { count: 1, .. }));
        assert_eq!(
            *rec.calls.borrow(),
            vec!["find grade".to_string(), "count T_student".to_string()]
        );
    }

    #[test]
    fn cascades_then_deletes_target() {
        for strategy in [Strategy::CheckFirst, Strategy::InOrder] {
            let (conn, reg) = setup();
            insert_grade(&conn, 7);
            insert_class_room(&conn, 7);
            insert_class_room(&conn, 7);
            insert_grade(&conn, 8);
            insert_class_room(&conn, 8);

            let deleter = CascadeDeleter::new(&conn, &reg).with_strategy(strategy);
            let req = DeleteRequest {
                entity: Entity::Grade,
                id: 7,
            };
            let outcome = deleter.delete_with(req, &grade_rules());
            assert!(outcome.success);
            assert_eq!(outcome.kind, OutcomeKind::Deleted);
            assert_eq!(outcome.message, "Grade supprimé avec succès");
            assert_eq!(
                outcome.cascaded,
                vec![Cascaded {
                    table: "class_room".to_string(),
                    rows: 2,
                }]
            );
            assert_eq!(count(&conn, "SELECT COUNT(*) FROM grade WHERE id = ?", 7), 0);
            assert_eq!(
                count(&conn, "SELECT COUNT(*) FROM class_room WHERE gradeId = ?", 7),
                0
            );
            assert_eq!(
                count(&conn, "SELECT COUNT(*) FROM class_room WHERE gradeId = ?", 8),
                1
            );

            let again = deleter.delete_with(req, &grade_rules());
            assert_eq!(again.kind, OutcomeKind::NotFound);
            assert_eq!(again.message, "Grade non trouvé");
        }
    }

    #[test]
    fn first_blocking_rule_wins() {
        let (conn, reg) = setup();
        insert_grade(&conn, 3);
        insert_student(&conn, 3);
        conn.execute(
            "INSERT INTO course(name, gradeId, created_at) VALUES('Maths', 3, '2026-09-01')",
            [],
        )
        .expect("insert course");

        let outcome = CascadeDeleter::new(&conn, &reg).delete(DeleteRequest {
            entity: Entity::Grade,
            id: 3,
        });
        assert_eq!(
            outcome.message,
            "Impossible de supprimer car il y a 1 étudiant(s) lié(s)"
        );

        let rules = vec![
            RelationRule::restrict("course", "gradeId"),
            RelationRule::restrict("T_student", "gradeId"),
        ];
        let outcome = CascadeDeleter::new(&conn, &reg).delete_with(
            DeleteRequest {
                entity: Entity::Grade,
                id: 3,
            },
            &rules,
        );
        assert_eq!(
            outcome.message,
            "Impossible de supprimer car il y a 1 matière(s) lié(s)"
        );
    }

    #[test]
    fn storage_failure_rolls_back_and_keeps_raw_text() {
        let (conn, reg) = setup();
        insert_grade(&conn, 4);
        let room = insert_class_room(&conn, 4);
        conn.execute(
            "INSERT INTO homework(title, classRoomId, created_at) VALUES('Lecture', ?, '2026-09-01')",
            [room],
        )
        .expect("insert homework");

        // Grade rules do not know about homework, so the class room cascade trips the foreign key.
        let outcome = CascadeDeleter::new(&conn, &reg).delete(DeleteRequest {
            entity: Entity::Grade,
            id: 4,
        });
        assert!(!outcome.success);
        assert_eq!(outcome.kind, OutcomeKind::StorageFailure);
        assert!(
            outcome.message.contains("FOREIGN KEY"),
            "unexpected message: {}",
            outcome.message
        );
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM grade WHERE id = ?", 4), 1);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM class_room WHERE gradeId = ?", 4),
            1
        );
    }

    #[test]
    fn blocking_rule_wins_over_cascade_storage_failure() {
        for strategy in [Strategy::CheckFirst, Strategy::InOrder] {
            let (conn, reg) = setup();
            insert_grade(&conn, 5);
            let room = insert_class_room(&conn, 5);
            conn.execute(
                "INSERT INTO homework(title, classRoomId, created_at) VALUES('Lecture', ?, '2026-09-01')",
                [room],
            )
            .expect("insert homework");
            insert_student(&conn, 5);

            let outcome = CascadeDeleter::new(&conn, &reg)
                .with_strategy(strategy)
                .delete_with(
                    DeleteRequest {
                        entity: Entity::Grade,
                        id: 5,
                    },
                    &grade_rules(),
                );
            assert_eq!(outcome.kind, OutcomeKind::Blocked, "{:?}", strategy);
            assert_eq!(
                outcome.message,
                "Impossible de supprimer car il y a 1 étudiant(s) lié(s)"
            );
            assert_eq!(count(&conn, "SELECT COUNT(*) FROM grade WHERE id = ?", 5), 1);
            assert_eq!(
                count(&conn, "SELECT COUNT(*) FROM class_room WHERE gradeId = ?", 5),
                1
            );
            assert_eq!(
                count(&conn, "SELECT COUNT(*) FROM homework WHERE classRoomId = ?", room),
                1
            );
        }
    }

    #[test]
    fn cascade_storage_failure_without_blocker_stays_storage_failure() {
        let (conn, reg) = setup();
        insert_grade(&conn, 9);
        let room = insert_class_room(&conn, 9);
        conn.execute(
            "INSERT INTO homework(title, classRoomId, created_at) VALUES('Exposé', ?, '2026-09-01')",
            [room],
        )
        .expect("insert homework");

        let outcome = CascadeDeleter::new(&conn, &reg)
            .with_strategy(Strategy::InOrder)
            .delete_with(
                DeleteRequest {
                    entity: Entity::Grade,
                    id: 9,
                },
                &grade_rules(),
            );
        assert_eq!(outcome.kind, OutcomeKind::StorageFailure);
        assert!(outcome.message.contains("FOREIGN KEY"), "{}", outcome.message);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM class_room WHERE gradeId = ?", 9),
            1
        );
    }

    #[test]
    fn explicit_rules_with_unsafe_names_are_rejected_before_sql() {
        let (conn, reg) = setup();
        insert_grade(&conn, 2);
        insert_class_room(&conn, 2);

        let rules = vec![
            RelationRule::cascade("class_room", "gradeId"),
            RelationRule::restrict("T_student\" WHERE 1=1 --", "gradeId"),
        ];
        let deleter = CascadeDeleter::new(&conn, &reg);
        let req = DeleteRequest {
            entity: Entity::Grade,
            id: 2,
        };
        let e = deleter.try_delete(req, &rules).unwrap_err();
        assert!(matches!(
            e,
            DeleteError::InvalidRule(RuleError::InvalidIdentifier(_))
        ));

        let outcome = deleter.delete_with(req, &rules);
        assert!(!outcome.success);
        assert_eq!(outcome.kind, OutcomeKind::StorageFailure);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM grade WHERE id = ?", 2), 1);
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM class_room WHERE gradeId = ?", 2),
            1
        );
    }

    #[test]
    fn unmapped_table_name_passes_through() {
        assert_eq!(display_name("T_student"), "étudiant(s)");
        assert_eq!(display_name("fee_schedule"), "fee_schedule");

        let e = DeleteError::Blocked {
            table: "fee_schedule".to_string(),
            display_name: display_name("fee_schedule").to_string(),
            count: 2,
        };
        assert_eq!(
            e.to_string(),
            "Impossible de supprimer car il y a 2 fee_schedule lié(s)"
        );
    }

    #[test]
    fn preview_counts_without_mutating() {
        let (conn, reg) = setup();
        insert_grade(&conn, 6);
        insert_class_room(&conn, 6);
        insert_class_room(&conn, 6);
        insert_student(&conn, 6);

        let deleter = CascadeDeleter::new(&conn, &reg);
        let req = DeleteRequest {
            entity: Entity::Grade,
            id: 6,
        };
        let plan = deleter.preview(req).expect("preview");
        assert!(!plan.deletable);
        assert_eq!(
            plan.message.as_deref(),
            Some("Impossible de supprimer car il y a 1 étudiant(s) lié(s)")
        );
        let counts: Vec<(&str, bool, i64)> = plan
            .relations
            .iter()
            .map(|r| (r.table.as_str(), r.cascade, r.count))
            .collect();
        assert_eq!(
            counts,
            vec![("class_room", true, 2), ("T_student", false, 1), ("course", false, 0)]
        );
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM class_room WHERE gradeId = ?", 6),
            2
        );

        let outcome = deleter.delete(req);
        assert_eq!(outcome.message, plan.message.unwrap_or_default());

        let missing = deleter
            .preview(DeleteRequest {
                entity: Entity::Grade,
                id: 404,
            })
            .unwrap_err();
        assert!(matches!(missing, DeleteError::NotFound { entity: Entity::Grade }));
    }

    #[test]
    fn outcome_serializes_camel_case() {
        let outcome = DeleteOutcome::from(Err::<Deleted, _>(DeleteError::Blocked {
            table: "payment".to_string(),
            display_name: "paiement(s)".to_string(),
            count: 2,
        }));
        let v = serde_json::to_value(&outcome).expect("json");
        assert_eq!(v["success"], false);
        assert_eq!(v["kind"], "blocked");
        assert_eq!(v["blockedBy"]["displayName"], "paiement(s)");
        assert!(v.get("cascaded").is_none());
    }
}
