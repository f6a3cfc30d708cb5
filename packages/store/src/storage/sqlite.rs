//! SQLite-backed storage implementation.
//!
//! Uses `rusqlite` (with bundled SQLite) wrapped in an `Arc<Mutex<Connection>>`
//! to satisfy the `Send + Sync` requirements. All blocking calls are offloaded
//! to a thread-pool via `tokio::task::spawn_blocking`. Each write checks its
//! invariants and inserts while holding the connection lock, so concurrent
//! callers cannot interleave between the check and the insert.
//!
//! # Schema
//!
//! - `identities` — one row per identity; `display_name` is `UNIQUE`.
//! - `claims` — one row per claim; `(subject_id, predicate_id, object_id)` is `UNIQUE`.
//! - `attestations` — append-only endorsement events keyed by claim.
//!
//! Filter trees are compiled to nested `EXISTS` sub-queries; see
//! [`FilterCompiler`].

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use claimgraph::{
    Attestation, Claim, ClaimFilter, FieldOp, FieldPredicate, IdentityField, Identity,
    IdentityFilter, Role,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Storage, StorageError};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    identity_id   TEXT PRIMARY KEY,
    display_name  TEXT NOT NULL UNIQUE,
    description   TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS claims (
    claim_id      TEXT PRIMARY KEY,
    subject_id    TEXT NOT NULL REFERENCES identities(identity_id),
    predicate_id  TEXT NOT NULL REFERENCES identities(identity_id),
    object_id     TEXT NOT NULL REFERENCES identities(identity_id),
    direction     INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    UNIQUE (subject_id, predicate_id, object_id)
);
CREATE INDEX IF NOT EXISTS idx_claims_predicate ON claims(predicate_id);
CREATE INDEX IF NOT EXISTS idx_claims_object    ON claims(object_id);

CREATE TABLE IF NOT EXISTS attestations (
    attestation_id  TEXT PRIMARY KEY,
    claim_id        TEXT NOT NULL REFERENCES claims(claim_id),
    direction       INTEGER NOT NULL,
    attestor        TEXT NOT NULL,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attestations_claim ON attestations(claim_id);
";

const IDENTITY_COLUMNS: &str = "identity_id, display_name, description, created_at";
const CLAIM_COLUMNS: &str = "claim_id, subject_id, predicate_id, object_id, direction, created_at";

// ---------------------------------------------------------------------------
// SqliteStorage
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of [`Storage`].
///
/// Holds a single database connection protected by a `Mutex`. All operations
/// run inside `spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the SQLite database at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory SQLite database (data is lost when dropped).
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking thread-pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Internal(format!("task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Error conversions and row mapping
// ---------------------------------------------------------------------------

fn map_err(e: rusqlite::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StorageError> {
    conn.lock()
        .map_err(|_| StorageError::Internal("sqlite connection lock poisoned".into()))
}

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        identity_id: row.get(0)?,
        display_name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn claim_from_row(row: &Row<'_>) -> rusqlite::Result<Claim> {
    Ok(Claim {
        claim_id: row.get(0)?,
        subject_id: row.get(1)?,
        predicate_id: row.get(2)?,
        object_id: row.get(3)?,
        direction: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn exists(conn: &Connection, sql: &str, key: &str) -> Result<bool, StorageError> {
    let count: i64 = conn
        .query_row(sql, params![key], |row| row.get(0))
        .map_err(map_err)?;
    Ok(count > 0)
}

// ---------------------------------------------------------------------------
// Filter compilation
// ---------------------------------------------------------------------------

/// Typed SQL parameter for building dynamic WHERE clauses.
enum SqlParam {
    Text(String),
    Integer(i64),
}

impl rusqlite::ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value};
        match self {
            SqlParam::Text(s) => Ok(ToSqlOutput::Owned(Value::Text(s.clone()))),
            SqlParam::Integer(i) => Ok(ToSqlOutput::Owned(Value::Integer(*i))),
        }
    }
}

/// Compiles filter trees into SQL boolean expressions.
///
/// Placeholders are positional (`?`), so parameters are pushed in exactly
/// the order their placeholders are written. Every sub-query gets a fresh
/// table alias.
#[derive(Default)]
struct FilterCompiler {
    params: Vec<SqlParam>,
    aliases: usize,
}

fn identity_column(field: IdentityField) -> &'static str {
    match field {
        IdentityField::IdentityId => "identity_id",
        IdentityField::DisplayName => "display_name",
        IdentityField::Description => "description",
    }
}

fn role_column(role: Role) -> &'static str {
    match role {
        Role::Subject => "subject_id",
        Role::Predicate => "predicate_id",
        Role::Object => "object_id",
    }
}

impl FilterCompiler {
    fn alias(&mut self, prefix: &str) -> String {
        self.aliases += 1;
        format!("{prefix}{}", self.aliases)
    }

    fn text(&mut self, value: &str) {
        self.params.push(SqlParam::Text(value.to_string()));
    }

    /// Boolean expression over the `identities` row aliased `alias`.
    fn identity(&mut self, filter: &IdentityFilter, alias: &str) -> String {
        match filter {
            IdentityFilter::All => "1".into(),
            IdentityFilter::Field(predicate) => self.field(predicate, alias),
            IdentityFilter::InClaim(participation) => {
                let c = self.alias("c");
                let mut sql = format!(
                    "EXISTS (SELECT 1 FROM claims {c} WHERE {c}.{} = {alias}.identity_id",
                    role_column(participation.role())
                );
                for (role, sub) in participation.constraints() {
                    if let Some(sub) = sub {
                        sql.push_str(" AND ");
                        sql.push_str(&self.endpoint(sub, &c, role));
                    }
                }
                sql.push(')');
                sql
            }
            IdentityFilter::And(parts) => {
                let parts: Vec<String> = parts.iter().map(|f| self.identity(f, alias)).collect();
                join(parts, "AND", "1")
            }
            IdentityFilter::Or(parts) => {
                let parts: Vec<String> = parts.iter().map(|f| self.identity(f, alias)).collect();
                join(parts, "OR", "0")
            }
            IdentityFilter::Not(inner) => format!("NOT ({})", self.identity(inner, alias)),
        }
    }

    fn field(&mut self, predicate: &FieldPredicate, alias: &str) -> String {
        let col = format!("{alias}.{}", identity_column(predicate.field));
        let value = predicate.value.as_str();
        match predicate.op {
            FieldOp::Eq => {
                self.text(value);
                format!("{col} = ?")
            }
            FieldOp::Ne => {
                self.text(value);
                format!("{col} <> ?")
            }
            // instr/substr rather than LIKE: LIKE is case-insensitive for ASCII.
            FieldOp::Contains => {
                self.text(value);
                format!("instr({col}, ?) > 0")
            }
            FieldOp::StartsWith => {
                self.text(value);
                self.text(value);
                format!("substr({col}, 1, length(?)) = ?")
            }
        }
    }

    /// `EXISTS` over the identity in `role` of the claim aliased `claim_alias`.
    fn endpoint(&mut self, filter: &IdentityFilter, claim_alias: &str, role: Role) -> String {
        let i = self.alias("i");
        let head = format!(
            "EXISTS (SELECT 1 FROM identities {i} WHERE {i}.identity_id = {claim_alias}.{} AND (",
            role_column(role)
        );
        let body = self.identity(filter, &i);
        format!("{head}{body}))")
    }

    /// Boolean expression over the `claims` row aliased `alias`.
    fn claim(&mut self, filter: &ClaimFilter, alias: &str) -> String {
        match filter {
            ClaimFilter::All => "1".into(),
            ClaimFilter::WithSubject(f) => self.endpoint(f, alias, Role::Subject),
            ClaimFilter::WithPredicate(f) => self.endpoint(f, alias, Role::Predicate),
            ClaimFilter::WithObject(f) => self.endpoint(f, alias, Role::Object),
            ClaimFilter::Direction(d) => {
                self.params.push(SqlParam::Integer(i64::from(*d)));
                format!("{alias}.direction = ?")
            }
            ClaimFilter::And(parts) => {
                let parts: Vec<String> = parts.iter().map(|f| self.claim(f, alias)).collect();
                join(parts, "AND", "1")
            }
            ClaimFilter::Or(parts) => {
                let parts: Vec<String> = parts.iter().map(|f| self.claim(f, alias)).collect();
                join(parts, "OR", "0")
            }
            ClaimFilter::Not(inner) => format!("NOT ({})", self.claim(inner, alias)),
        }
    }
}

fn join(parts: Vec<String>, op: &str, empty: &str) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    parts
        .iter()
        .map(|p| format!("({p})"))
        .collect::<Vec<_>>()
        .join(&format!(" {op} "))
}

fn run_query<T>(
    conn: &Connection,
    sql: &str,
    params_vec: &[SqlParam],
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StorageError> {
    let params_refs: Vec<&dyn rusqlite::ToSql> =
        params_vec.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
    let mut stmt = conn.prepare(sql).map_err(map_err)?;
    let rows = stmt
        .query_map(params_refs.as_slice(), map)
        .map_err(map_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_err)?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for SqliteStorage {
    // --- Identities ----------------------------------------------------------

    async fn put_identity(&self, identity: &Identity) -> Result<(), StorageError> {
        let identity = identity.clone();
        self.with_conn(move |conn| {
            if exists(
                conn,
                "SELECT COUNT(*) FROM identities WHERE identity_id = ?1",
                &identity.identity_id,
            )? {
                return Err(StorageError::Conflict(format!(
                    "identity {} already exists",
                    identity.identity_id
                )));
            }
            let existing: Option<String> = conn
                .query_row(
                    "SELECT identity_id FROM identities WHERE display_name = ?1",
                    params![identity.display_name],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_err)?;
            if let Some(existing) = existing {
                return Err(StorageError::Conflict(format!(
                    "an identity named {:?} already exists ({existing})",
                    identity.display_name
                )));
            }

            conn.execute(
                "INSERT INTO identities (identity_id, display_name, description, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    identity.identity_id,
                    identity.display_name,
                    identity.description,
                    identity.created_at,
                ],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE identity_id = ?1"),
                params![id],
                identity_from_row,
            )
            .optional()
            .map_err(map_err)
        })
        .await
    }

    async fn query_identities(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Vec<Identity>, StorageError> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut compiler = FilterCompiler::default();
            let condition = compiler.identity(&filter, "i0");
            let sql = format!(
                "SELECT {IDENTITY_COLUMNS} FROM identities i0 \
                 WHERE {condition} ORDER BY identity_id ASC"
            );
            tracing::debug!(%sql, "query_identities");
            run_query(conn, &sql, &compiler.params, identity_from_row)
        })
        .await
    }

    // --- Claims --------------------------------------------------------------

    async fn put_claim(&self, claim: &Claim) -> Result<(), StorageError> {
        let claim = claim.clone();
        self.with_conn(move |conn| {
            for (role, id) in claim.endpoints() {
                if !exists(
                    conn,
                    "SELECT COUNT(*) FROM identities WHERE identity_id = ?1",
                    id,
                )? {
                    return Err(StorageError::DanglingReference(format!(
                        "{role} {id} does not resolve to an identity"
                    )));
                }
            }
            if exists(
                conn,
                "SELECT COUNT(*) FROM claims WHERE claim_id = ?1",
                &claim.claim_id,
            )? {
                return Err(StorageError::Conflict(format!(
                    "claim {} already exists",
                    claim.claim_id
                )));
            }
            let existing: Option<String> = conn
                .query_row(
                    "SELECT claim_id FROM claims
                     WHERE subject_id = ?1 AND predicate_id = ?2 AND object_id = ?3",
                    params![claim.subject_id, claim.predicate_id, claim.object_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_err)?;
            if let Some(existing) = existing {
                return Err(StorageError::Conflict(format!(
                    "claim {existing} already asserts this triple"
                )));
            }

            conn.execute(
                "INSERT INTO claims
                     (claim_id, subject_id, predicate_id, object_id, direction, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    claim.claim_id,
                    claim.subject_id,
                    claim.predicate_id,
                    claim.object_id,
                    claim.direction,
                    claim.created_at,
                ],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn get_claim(&self, id: &str) -> Result<Option<Claim>, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE claim_id = ?1"),
                params![id],
                claim_from_row,
            )
            .optional()
            .map_err(map_err)
        })
        .await
    }

    async fn query_claims(&self, filter: &ClaimFilter) -> Result<Vec<Claim>, StorageError> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut compiler = FilterCompiler::default();
            let condition = compiler.claim(&filter, "c0");
            let sql = format!(
                "SELECT {CLAIM_COLUMNS} FROM claims c0 WHERE {condition} ORDER BY claim_id ASC"
            );
            tracing::debug!(%sql, "query_claims");
            run_query(conn, &sql, &compiler.params, claim_from_row)
        })
        .await
    }

    // --- Attestations --------------------------------------------------------

    async fn put_attestation(&self, attestation: &Attestation) -> Result<(), StorageError> {
        let attestation = attestation.clone();
        self.with_conn(move |conn| {
            if !exists(
                conn,
                "SELECT COUNT(*) FROM claims WHERE claim_id = ?1",
                &attestation.claim_id,
            )? {
                return Err(StorageError::NotFound);
            }
            if exists(
                conn,
                "SELECT COUNT(*) FROM attestations WHERE attestation_id = ?1",
                &attestation.attestation_id,
            )? {
                return Err(StorageError::Conflict(format!(
                    "attestation {} already exists",
                    attestation.attestation_id
                )));
            }
            conn.execute(
                "INSERT INTO attestations
                     (attestation_id, claim_id, direction, attestor, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    attestation.attestation_id,
                    attestation.claim_id,
                    attestation.direction,
                    attestation.attestor,
                    attestation.created_at,
                ],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn list_attestations(&self, claim_id: &str) -> Result<Vec<Attestation>, StorageError> {
        let claim_id = claim_id.to_string();
        self.with_conn(move |conn| {
            if !exists(conn, "SELECT COUNT(*) FROM claims WHERE claim_id = ?1", &claim_id)? {
                return Err(StorageError::NotFound);
            }
            let mut stmt = conn
                .prepare(
                    "SELECT attestation_id, claim_id, direction, attestor, created_at
                     FROM attestations WHERE claim_id = ?1 ORDER BY attestation_id ASC",
                )
                .map_err(map_err)?;
            let rows = stmt
                .query_map(params![claim_id], |row| {
                    Ok(Attestation {
                        attestation_id: row.get(0)?,
                        claim_id: row.get(1)?,
                        direction: row.get(2)?,
                        attestor: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })
                .map_err(map_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_err)?;
            Ok(rows)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(s: &SqliteStorage, names: &[&str]) -> Vec<Identity> {
        let mut out = Vec::new();
        for n in names {
            let i = Identity::new(*n, "test");
            s.put_identity(&i).await.unwrap();
            out.push(i);
        }
        out
    }

    #[tokio::test]
    async fn put_and_get_identity() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let ids = seed(&s, &["Alice"]).await;
        let got = s.get_identity(&ids[0].identity_id).await.unwrap().unwrap();
        assert_eq!(got, ids[0]);
        assert!(s.get_identity("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_identity_name_conflict() {
        let s = SqliteStorage::open_in_memory().unwrap();
        seed(&s, &["Alice"]).await;
        let err = s.put_identity(&Identity::new("Alice", "again")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn claim_roundtrip_and_invariants() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let ids = seed(&s, &["Alice", "Guest", "Club"]).await;
        let (a, p, o) = (&ids[0].identity_id, &ids[1].identity_id, &ids[2].identity_id);

        let c = Claim::new(a, p, o, false);
        s.put_claim(&c).await.unwrap();
        assert_eq!(s.get_claim(&c.claim_id).await.unwrap().unwrap(), c);

        let dup = s.put_claim(&Claim::new(a, p, o, true)).await.unwrap_err();
        assert!(matches!(dup, StorageError::Conflict(_)));

        let dangling = s.put_claim(&Claim::new(a, "missing", o, true)).await.unwrap_err();
        assert!(matches!(dangling, StorageError::DanglingReference(_)));
    }

    #[tokio::test]
    async fn attestations_accumulate() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let ids = seed(&s, &["Alice", "Guest", "Club"]).await;
        let c = Claim::new(&ids[0].identity_id, &ids[1].identity_id, &ids[2].identity_id, true);
        s.put_claim(&c).await.unwrap();

        s.put_attestation(&Attestation::new(&c.claim_id, true, "alice")).await.unwrap();
        s.put_attestation(&Attestation::new(&c.claim_id, false, "bob")).await.unwrap();
        let atts = s.list_attestations(&c.claim_id).await.unwrap();
        assert_eq!(atts.len(), 2);
        assert!(atts.iter().any(|a| a.attestor == "bob" && !a.direction));

        let missing = s
            .put_attestation(&Attestation::new("missing", true, "alice"))
            .await
            .unwrap_err();
        assert!(matches!(missing, StorageError::NotFound));
    }

    #[tokio::test]
    async fn compiled_filters() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let ids = seed(&s, &["Alice", "Bob", "Guest", "Club", "alice lowercase"]).await;
        let c = Claim::new(&ids[0].identity_id, &ids[2].identity_id, &ids[3].identity_id, true);
        s.put_claim(&c).await.unwrap();

        let members = IdentityFilter::subject_of(
            IdentityFilter::display_name("Guest"),
            IdentityFilter::display_name("Club"),
        );
        assert_eq!(s.query_identities(&members).await.unwrap(), vec![ids[0].clone()]);

        // Case-sensitive contains and starts_with.
        let contains = IdentityFilter::field(IdentityField::DisplayName, FieldOp::Contains, "lic");
        assert_eq!(s.query_identities(&contains).await.unwrap().len(), 2);
        let prefix = IdentityFilter::field(IdentityField::DisplayName, FieldOp::StartsWith, "Al");
        assert_eq!(s.query_identities(&prefix).await.unwrap(), vec![ids[0].clone()]);

        let not_members = members.negate().and(IdentityFilter::display_name("Bob"));
        assert_eq!(s.query_identities(&not_members).await.unwrap(), vec![ids[1].clone()]);

        let anchored = ClaimFilter::with_subject(IdentityFilter::display_name("Alice"))
            .and(ClaimFilter::with_predicate(IdentityFilter::id(&ids[2].identity_id)))
            .and(ClaimFilter::Direction(true));
        assert_eq!(s.query_claims(&anchored).await.unwrap(), vec![c.clone()]);
        assert!(s
            .query_claims(&ClaimFilter::Direction(false))
            .await
            .unwrap()
            .is_empty());
        assert!(s
            .query_claims(&ClaimFilter::Or(vec![]))
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn compiler_pushes_params_in_placeholder_order() {
        let mut compiler = FilterCompiler::default();
        let sql = compiler.identity(
            &IdentityFilter::subject_of(
                IdentityFilter::display_name("P"),
                IdentityFilter::field(IdentityField::DisplayName, FieldOp::StartsWith, "O"),
            ),
            "i0",
        );
        assert_eq!(sql.matches('?').count(), compiler.params.len());
        let texts: Vec<&str> = compiler
            .params
            .iter()
            .map(|p| match p {
                SqlParam::Text(s) => s.as_str(),
                SqlParam::Integer(_) => "<int>",
            })
            .collect();
        assert_eq!(texts, vec!["P", "O", "O"]);
    }
}
