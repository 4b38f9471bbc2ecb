#[cfg(test)]
mod tests {
    use serde_json::json;
    use tasknest::db::categories::{Categories, NewCategory};
    use tasknest::db::db::Db;
    use tasknest::db::error::DbError;
    use tasknest::db::schema::StoreName;
    use tasknest::db::tasks::Tasks;
    use tasknest::db::transaction::AdvisoryLock;
    use tasknest::libs::config::LockConfig;
    use tasknest::libs::task::{NewTask, TaskPatch, TaskStatus};
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct TransactionTestContext {
        _temp_dir: TempDir,
        db: Db,
    }

    impl TestContext for TransactionTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let db = Db::open(&temp_dir.path().join("tasknest.db"))
                .unwrap()
                .with_lock_config(LockConfig {
                    attempts: 2,
                    backoff_ms: 1,
                    stale_after_secs: 30,
                });
            TransactionTestContext { _temp_dir: temp_dir, db }
        }
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_transaction_commits_across_stores(ctx: &mut TransactionTestContext) {
        let task_id = ctx
            .db
            .transaction(&[StoreName::Tasks, StoreName::Categories], |tx| {
                let category = Categories::new(tx).create(&NewCategory::new("Work", "#ff0000"))?;
                let task = Tasks::new(tx).create(&NewTask::new("Inside").category(&category.id))?;
                Ok::<_, DbError>(task.id)
            })
            .unwrap();

        let task = ctx.db.tasks().get(&task_id).unwrap().unwrap();
        assert!(task.category_id.is_some());
        assert!(ctx.db.categories().get_by_name("Work").unwrap().is_some());
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_transaction_rolls_back_on_error(ctx: &mut TransactionTestContext) {
        let result: Result<(), DbError> = ctx.db.transaction(&[StoreName::Tasks, StoreName::Categories], |tx| {
            Categories::new(tx).create(&NewCategory::new("Ghost", "#ff0000"))?;
            Tasks::new(tx).create(&NewTask::new("Ghost task"))?;
            Err(DbError::LockUnavailable("boom".to_string()))
        });

        assert!(matches!(result, Err(DbError::LockUnavailable(name)) if name == "boom"));
        assert_eq!(ctx.db.tasks().count().unwrap(), 0);
        assert!(ctx.db.categories().get_by_name("Ghost").unwrap().is_none());
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_transaction_requires_a_store(ctx: &mut TransactionTestContext) {
        let result: Result<(), DbError> = ctx.db.transaction(&[], |_| Ok(()));
        assert!(matches!(result, Err(DbError::NoStores)));
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_failed_operation_inside_transaction_keeps_earlier_writes(ctx: &mut TransactionTestContext) {
        let created = ctx
            .db
            .transaction(&[StoreName::Tasks], |tx| {
                let tasks = Tasks::new(tx);
                let kept = tasks.create(&NewTask::new("Kept"))?;
                assert!(tasks.create(&NewTask::new("")).is_err());
                Ok::<_, DbError>(kept)
            })
            .unwrap();

        let all = ctx.db.tasks().all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, created.id);
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_read_transaction_sees_all_stores(ctx: &mut TransactionTestContext) {
        ctx.db.tasks().create(&NewTask::new("One")).unwrap();

        let (tasks, categories) = ctx
            .db
            .read_transaction(&[StoreName::Tasks, StoreName::Categories], |tx| {
                Ok::<_, DbError>((Tasks::new(tx).count()?, Categories::new(tx).count()?))
            })
            .unwrap();
        assert_eq!((tasks, categories), (1, 1));

        let write: Result<(), DbError> = ctx.db.read_transaction(&[StoreName::Tasks], |tx| {
            Tasks::new(tx).create(&NewTask::new("Refused"))?;
            Ok(())
        });
        assert!(write.is_err());

        ctx.db.tasks().create(&NewTask::new("Writable again")).unwrap();
        assert_eq!(ctx.db.tasks().count().unwrap(), 2);
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_batch_update_skips_unknown_ids(ctx: &mut TransactionTestContext) {
        let a = ctx.db.tasks().create(&NewTask::new("A")).unwrap();
        let b = ctx.db.tasks().create(&NewTask::new("B")).unwrap();

        let ids = vec![a.id.clone(), "missing".to_string(), b.id.clone()];
        let updated = ctx
            .db
            .batch_update_tasks(&ids, &TaskPatch::status(TaskStatus::Archived))
            .unwrap();

        assert_eq!(updated, 2);
        for id in [&a.id, &b.id] {
            let task = ctx.db.tasks().get(id).unwrap().unwrap();
            assert_eq!(task.status, TaskStatus::Archived);
        }
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_batch_update_is_all_or_nothing(ctx: &mut TransactionTestContext) {
        let a = ctx.db.tasks().create(&NewTask::new("A")).unwrap();
        let b = ctx.db.tasks().create(&NewTask::new("B")).unwrap();

        let ids = vec![a.id.clone(), b.id.clone()];
        let result = ctx.db.batch_update_tasks(&ids, &TaskPatch::title("  "));

        assert!(matches!(result, Err(DbError::Validation { field: "title", .. })));
        assert_eq!(ctx.db.tasks().get(&a.id).unwrap().unwrap().title, "A");
        assert_eq!(ctx.db.tasks().get(&b.id).unwrap().unwrap().title, "B");
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_batch_delete(ctx: &mut TransactionTestContext) {
        let a = ctx.db.tasks().create(&NewTask::new("A").checklist(&["x"])).unwrap();
        let b = ctx.db.tasks().create(&NewTask::new("B")).unwrap();
        ctx.db.tasks().create(&NewTask::new("C")).unwrap();

        let deleted = ctx
            .db
            .batch_delete_tasks(&[a.id.clone(), b.id.clone(), "missing".to_string()])
            .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(ctx.db.tasks().count().unwrap(), 1);
        let rows: i64 = ctx
            .db
            .conn
            .query_row("SELECT COUNT(*) FROM checklist_items", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_lock_is_exclusive_and_released_on_drop(ctx: &mut TransactionTestContext) {
        let config = ctx.db.lock_config().clone();
        let guard = AdvisoryLock::acquire(&ctx.db.conn, &config, "recurrence:t1").unwrap();
        assert_eq!(guard.key(), "__lock:recurrence:t1");

        let second = AdvisoryLock::acquire(&ctx.db.conn, &config, "recurrence:t1");
        assert!(matches!(second, Err(DbError::LockUnavailable(name)) if name == "recurrence:t1"));

        let other = AdvisoryLock::acquire(&ctx.db.conn, &config, "recurrence:t2");
        assert!(other.is_ok());

        drop(guard);
        assert!(ctx.db.settings().get("__lock:recurrence:t1").unwrap().is_none());
        assert!(AdvisoryLock::acquire(&ctx.db.conn, &config, "recurrence:t1").is_ok());
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_stale_lock_is_reclaimed(ctx: &mut TransactionTestContext) {
        ctx.db
            .settings()
            .put("__lock:stale", &json!({ "acquiredAt": 0, "pid": 1, "token": "old" }))
            .unwrap();

        let config = ctx.db.lock_config().clone();
        let guard = AdvisoryLock::acquire(&ctx.db.conn, &config, "stale").unwrap();

        let held = ctx.db.settings().get("__lock:stale").unwrap().unwrap();
        assert_ne!(held.value["token"], json!("old"));
        drop(guard);
        assert!(ctx.db.settings().get("__lock:stale").unwrap().is_none());
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_stale_lock_is_reclaimed_within_one_attempt(ctx: &mut TransactionTestContext) {
        ctx.db
            .settings()
            .put("__lock:single", &json!({ "acquiredAt": 0, "pid": 1, "token": "old" }))
            .unwrap();

        let config = LockConfig {
            attempts: 1,
            backoff_ms: 1,
            stale_after_secs: 30,
        };
        let guard = AdvisoryLock::acquire(&ctx.db.conn, &config, "single").unwrap();

        let held = ctx.db.settings().get("__lock:single").unwrap().unwrap();
        assert_ne!(held.value["token"], json!("old"));
        drop(guard);
    }

    #[test_context(TransactionTestContext)]
    #[test]
    fn test_with_lock_releases_after_error(ctx: &mut TransactionTestContext) {
        let result: Result<(), DbError> = ctx.db.with_lock("job", |_| Err(DbError::NoStores));
        assert!(result.is_err());
        assert!(ctx.db.settings().get("__lock:job").unwrap().is_none());

        let value = ctx.db.with_lock("job", |conn| Tasks::new(conn).count()).unwrap();
        assert_eq!(value, 0);
    }
}
