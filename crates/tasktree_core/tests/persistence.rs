use std::cell::{Cell, RefCell};
use tasktree_core::db::{open_db, open_db_in_memory};
use tasktree_core::{
    DeleteMode, IntegrityIssue, RepoError, RepoResult, SnapshotRepository, SqliteSnapshotRepository,
    StoreConfig, TaskCollection, TodoStore, TodoStoreError, DEFAULT_STORAGE_KEY,
};
use uuid::Uuid;

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasktree.db");

    let (root_id, child_id) = {
        let conn = open_db(&path).unwrap();
        let mut store = TodoStore::open(SqliteSnapshotRepository::try_new(&conn).unwrap()).unwrap();
        let root = store.create("Buy milk", None).unwrap();
        let child = store.create("2% milk", Some(root.id)).unwrap();
        store.set_completed(child.id, true).unwrap();
        (root.id, child.id)
    };

    let conn = open_db(&path).unwrap();
    let store = TodoStore::open(SqliteSnapshotRepository::try_new(&conn).unwrap()).unwrap();

    assert_eq!(store.len(), 2);
    assert!(store.load_report().is_clean());
    assert_eq!(store.get(root_id).unwrap().children_ids, vec![child_id]);
    let child = store.get(child_id).unwrap();
    assert!(child.completed);
    assert_eq!(child.title, "2% milk");
    let order: Vec<_> = store.tasks().keys().copied().collect();
    assert_eq!(order, vec![root_id, child_id]);
}

#[test]
fn collection_is_stored_as_one_json_value_under_todos_key() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSnapshotRepository::try_new(&conn).unwrap();
    let mut store = TodoStore::open(&repo).unwrap();
    let root = store.create("root", None).unwrap();
    let child = store.create("child", Some(root.id)).unwrap();

    let (key, raw): (String, String) = conn
        .query_row("SELECT key, value FROM kv_store;", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(key, DEFAULT_STORAGE_KEY);

    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let root_json = &value[root.id.to_string()];
    assert_eq!(root_json["title"], "root");
    assert_eq!(root_json["completed"], false);
    assert_eq!(root_json["childrenIds"][0], child.id.to_string());
    assert!(root_json.get("parentId").is_none());
    assert_eq!(
        value[child.id.to_string()]["parentId"],
        root.id.to_string()
    );
}

#[test]
fn stores_with_different_keys_are_isolated() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSnapshotRepository::try_new(&conn).unwrap();

    let mut work =
        TodoStore::open_with_config(&repo, StoreConfig::default().with_storage_key("work"))
            .unwrap();
    work.create("ship release", None).unwrap();

    let home = TodoStore::open(&repo).unwrap();
    assert!(home.is_empty());
    assert_eq!(repo.load("work").unwrap().unwrap().len(), 1);
    assert!(repo.clear("work").unwrap());
    assert!(repo.load("work").unwrap().is_none());
}

#[test]
fn loading_inconsistent_snapshot_reports_issues_without_rewriting() {
    let conn = open_db_in_memory().unwrap();
    let orphan = Uuid::new_v4();
    let missing = Uuid::new_v4();
    let raw = format!(
        r#"{{"{orphan}":{{"id":"{orphan}","title":"orphan","completed":false,"parentId":"{missing}"}}}}"#
    );
    conn.execute(
        "INSERT INTO kv_store (key, value) VALUES ('todos', ?1);",
        [&raw],
    )
    .unwrap();

    let store = TodoStore::open(SqliteSnapshotRepository::try_new(&conn).unwrap()).unwrap();

    assert_eq!(
        store.load_report().issues,
        vec![IntegrityIssue::DanglingParent {
            task_id: orphan,
            parent_id: missing,
        }]
    );
    assert!(store.roots().is_empty());
    let stored: String = conn
        .query_row("SELECT value FROM kv_store WHERE key = 'todos';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(stored, raw);
}

fn seed_todos(conn: &rusqlite::Connection, raw: &str) {
    conn.execute(
        "INSERT INTO kv_store (key, value) VALUES ('todos', ?1);",
        [raw],
    )
    .unwrap();
}

#[test]
fn update_relinks_child_missing_from_parent_children() {
    let conn = open_db_in_memory().unwrap();
    let parent = Uuid::new_v4();
    let child = Uuid::new_v4();
    seed_todos(
        &conn,
        &format!(
            r#"{{"{parent}":{{"id":"{parent}","title":"parent","completed":false}},"{child}":{{"id":"{child}","title":"child","completed":false,"parentId":"{parent}"}}}}"#
        ),
    );

    let mut store = TodoStore::open(SqliteSnapshotRepository::try_new(&conn).unwrap()).unwrap();
    assert_eq!(
        store.load_report().issues,
        vec![IntegrityIssue::MissingChildLink {
            task_id: child,
            parent_id: parent,
        }]
    );

    store.set_completed(child, true).unwrap();

    assert_eq!(store.get(parent).unwrap().children_ids, vec![child]);
    assert!(store.get(child).unwrap().completed);
    assert!(store.check_integrity().is_clean());
}

#[test]
fn cascade_delete_keeps_child_owned_by_another_parent() {
    let conn = open_db_in_memory().unwrap();
    let stale = Uuid::new_v4();
    let owner = Uuid::new_v4();
    let child = Uuid::new_v4();
    seed_todos(
        &conn,
        &format!(
            r#"{{"{stale}":{{"id":"{stale}","title":"stale","completed":false,"childrenIds":["{child}"]}},"{owner}":{{"id":"{owner}","title":"owner","completed":false,"childrenIds":["{child}"]}},"{child}":{{"id":"{child}","title":"child","completed":false,"parentId":"{owner}"}}}}"#
        ),
    );

    let mut store = TodoStore::open(SqliteSnapshotRepository::try_new(&conn).unwrap()).unwrap();
    assert!(!store.load_report().is_clean());

    let removed = store.delete_with_mode(stale, DeleteMode::Cascade).unwrap();

    assert_eq!(removed, vec![stale]);
    assert!(store.get(child).is_some());
    assert_eq!(store.get(owner).unwrap().children_ids, vec![child]);
    assert!(store.check_integrity().is_clean());
}

#[test]
fn malformed_snapshot_fails_open() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("INSERT INTO kv_store (key, value) VALUES ('todos', '[1, 2');")
        .unwrap();

    let err = TodoStore::open(SqliteSnapshotRepository::try_new(&conn).unwrap())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        TodoStoreError::Repo(RepoError::Serialization(_))
    ));
}

#[derive(Default)]
struct FlakyRepository {
    fail_saves: Cell<bool>,
    saved: RefCell<Option<TaskCollection>>,
}

impl SnapshotRepository for FlakyRepository {
    fn load(&self, _key: &str) -> RepoResult<Option<TaskCollection>> {
        Ok(self.saved.borrow().clone())
    }

    fn save(&self, _key: &str, tasks: &TaskCollection) -> RepoResult<()> {
        if self.fail_saves.get() {
            return Err(RepoError::InvalidData("storage unavailable".to_string()));
        }
        *self.saved.borrow_mut() = Some(tasks.clone());
        Ok(())
    }

    fn clear(&self, _key: &str) -> RepoResult<bool> {
        Ok(self.saved.borrow_mut().take().is_some())
    }
}

#[test]
fn failed_save_keeps_transition_and_flush_retries() {
    let repo = FlakyRepository::default();
    let mut store = TodoStore::open(&repo).unwrap();
    store.create("saved", None).unwrap();
    assert!(!store.is_dirty());

    repo.fail_saves.set(true);
    let err = store.create("pending", None).unwrap_err();
    assert!(matches!(err, TodoStoreError::Repo(_)));
    assert_eq!(store.len(), 2);
    assert!(store.is_dirty());
    assert_eq!(repo.saved.borrow().as_ref().unwrap().len(), 1);

    assert!(store.flush().is_err());

    repo.fail_saves.set(false);
    store.flush().unwrap();
    assert!(!store.is_dirty());
    assert_eq!(repo.saved.borrow().as_ref().unwrap().len(), 2);
}
