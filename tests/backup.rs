#[cfg(test)]
mod tests {
    use serde_json::json;
    use tasknest::db::categories::NewCategory;
    use tasknest::db::db::Db;
    use tasknest::db::settings::MIGRATION_PREFIX;
    use tasknest::libs::task::{NewTask, TaskPatch, TaskStatus};
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct BackupTestContext {
        temp_dir: TempDir,
        db: Db,
    }

    impl TestContext for BackupTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let db = Db::open(&temp_dir.path().join("tasknest.db")).unwrap();
            BackupTestContext { temp_dir, db }
        }
    }

    fn seed(db: &Db) {
        let work = db.categories().create(&NewCategory::new("Work", "#ff0000")).unwrap();
        db.tasks()
            .create(&NewTask::new("Report").category(&work.id).checklist(&["Draft", "Send"]))
            .unwrap();
        db.tasks().create(&NewTask::new("Groceries")).unwrap();
        db.settings().put("theme", &json!("dark")).unwrap();
    }

    #[test_context(BackupTestContext)]
    #[test]
    fn test_backup_captures_every_store(ctx: &mut BackupTestContext) {
        seed(&ctx.db);
        let snapshot = ctx.db.backup().unwrap();

        assert_eq!(snapshot.version, 4);
        assert_eq!(snapshot.tasks.len(), 2);
        assert_eq!(snapshot.categories.len(), 2);
        assert!(snapshot.settings.iter().any(|s| s.key == "theme"));
        assert!(snapshot.settings.iter().any(|s| s.key.starts_with(MIGRATION_PREFIX)));
        assert!(snapshot.timestamp > 0);
    }

    #[test_context(BackupTestContext)]
    #[test]
    fn test_backup_skips_lock_sentinels(ctx: &mut BackupTestContext) {
        ctx.db
            .settings()
            .put("__lock:recurrence:x", &json!({ "acquiredAt": 1, "pid": 1, "token": "t" }))
            .unwrap();

        let snapshot = ctx.db.backup().unwrap();
        assert!(snapshot.settings.iter().all(|s| !s.key.starts_with("__lock:")));
    }

    #[test_context(BackupTestContext)]
    #[test]
    fn test_restore_replaces_content_and_keeps_ids(ctx: &mut BackupTestContext) {
        seed(&ctx.db);
        let snapshot = ctx.db.backup().unwrap();

        let report = &snapshot.tasks[0];
        ctx.db.tasks().update(&report.id, &TaskPatch::status(TaskStatus::Done)).unwrap();
        ctx.db.tasks().create(&NewTask::new("Added later")).unwrap();
        ctx.db.categories().create(&NewCategory::new("Later", "#000000")).unwrap();
        ctx.db.settings().put("theme", &json!("light")).unwrap();
        ctx.db.settings().put("extra", &json!(true)).unwrap();

        assert!(ctx.db.restore(&snapshot).unwrap());

        assert_eq!(ctx.db.tasks().all().unwrap(), snapshot.tasks);
        assert_eq!(ctx.db.categories().all().unwrap(), snapshot.categories);
        assert_eq!(
            ctx.db.settings().get_value::<String>("theme").unwrap().as_deref(),
            Some("dark")
        );
        assert!(ctx.db.settings().get("extra").unwrap().is_none());

        let open: i64 = ctx
            .db
            .conn
            .query_row("SELECT COUNT(*) FROM checklist_items", [], |row| row.get(0))
            .unwrap();
        assert_eq!(open, 2);
    }

    #[test_context(BackupTestContext)]
    #[test]
    fn test_restore_keeps_live_migration_history(ctx: &mut BackupTestContext) {
        seed(&ctx.db);
        let snapshot = ctx.db.backup().unwrap();

        let mut other = Db::open(&ctx.temp_dir.path().join("other.db")).unwrap();
        let before = other.migration_history().unwrap();
        assert!(other.restore(&snapshot).unwrap());

        assert_eq!(other.migration_history().unwrap(), before);
        assert_eq!(other.tasks().count().unwrap(), 2);
    }

    #[test_context(BackupTestContext)]
    #[test]
    fn test_restore_refuses_newer_schema(ctx: &mut BackupTestContext) {
        seed(&ctx.db);
        let mut snapshot = ctx.db.backup().unwrap();
        snapshot.version = 99;
        snapshot.tasks.clear();

        assert!(!ctx.db.restore(&snapshot).unwrap());
        assert_eq!(ctx.db.tasks().count().unwrap(), 2);
    }

    #[test_context(BackupTestContext)]
    #[test]
    fn test_failed_restore_keeps_previous_content(ctx: &mut BackupTestContext) {
        seed(&ctx.db);
        let mut snapshot = ctx.db.backup().unwrap();
        snapshot.tasks[1].title = "   ".to_string();

        assert!(!ctx.db.restore(&snapshot).unwrap());
        assert_eq!(ctx.db.tasks().count().unwrap(), 2);
        assert_eq!(ctx.db.categories().count().unwrap(), 2);
    }

    #[test_context(BackupTestContext)]
    #[test]
    fn test_restore_migrates_older_store_forward(ctx: &mut BackupTestContext) {
        seed(&ctx.db);
        let snapshot = ctx.db.backup().unwrap();

        let mut older = Db::open_without_migrations(&ctx.temp_dir.path().join("older.db")).unwrap();
        assert!(older.migrate(Some(2)).unwrap());

        assert!(older.restore(&snapshot).unwrap());
        assert_eq!(older.version().unwrap(), 4);
        assert_eq!(older.tasks().all().unwrap(), snapshot.tasks);
    }

    #[test_context(BackupTestContext)]
    #[test]
    fn test_health_of_fresh_store(ctx: &mut BackupTestContext) {
        seed(&ctx.db);
        let report = ctx.db.health();

        assert!(report.is_healthy(), "unexpected issues: {:?}", report.issues);
        assert_eq!(report.version, 4);
        assert_eq!(report.latest_version, 4);
        assert_eq!(report.counts.tasks, 2);
        assert_eq!(report.counts.categories, 2);
    }

    #[test_context(BackupTestContext)]
    #[test]
    fn test_health_reports_problems(ctx: &mut BackupTestContext) {
        ctx.db.conn.execute("DELETE FROM categories", []).unwrap();
        ctx.db
            .settings()
            .put("__lock:abandoned", &json!({ "acquiredAt": 0, "pid": 1, "token": "t" }))
            .unwrap();

        let report = ctx.db.health();
        assert!(!report.is_healthy());
        assert!(report.issues.iter().any(|i| i.contains("Default")));
        assert!(report.issues.iter().any(|i| i.contains("__lock:abandoned")));
    }

    #[test_context(BackupTestContext)]
    #[test]
    fn test_health_of_outdated_store(ctx: &mut BackupTestContext) {
        let mut older = Db::open_without_migrations(&ctx.temp_dir.path().join("older.db")).unwrap();
        assert!(older.migrate(Some(3)).unwrap());

        let report = older.health();
        assert_eq!(report.version, 3);
        assert!(report.issues.iter().any(|i| i.contains("behind")));
    }
}
