#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tasknest::db::db::Db;
    use tasknest::db::error::DbError;
    use tasknest::libs::task::{ChecklistItem, NewTask, TaskFilter, TaskPatch, TaskStatus};
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct TaskTestContext {
        _temp_dir: TempDir,
        db: Db,
    }

    impl TestContext for TaskTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let db = Db::open(&temp_dir.path().join("tasknest.db")).unwrap();
            TaskTestContext { _temp_dir: temp_dir, db }
        }
    }

    fn at(day: u32, hour: u32) -> i64 {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap().timestamp_millis()
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_create_assigns_id_and_timestamps(ctx: &mut TaskTestContext) {
        let task = ctx.db.tasks().create(&NewTask::new("  Write report  ")).unwrap();

        assert!(!task.id.is_empty());
        assert_eq!(task.title, "Write report");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.created_at > 0);
        assert_eq!(task.created_at, task.updated_at);
        assert_eq!(task.repeat_parent_id, None);
        assert_eq!(task.repeat_count, None);

        let stored = ctx.db.tasks().get(&task.id).unwrap().unwrap();
        assert_eq!(stored, task);
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_create_keeps_given_id(ctx: &mut TaskTestContext) {
        let new_task = NewTask {
            id: Some("task-1".to_string()),
            created_at: Some(1_000),
            ..NewTask::new("Given id")
        };
        let task = ctx.db.tasks().create(&new_task).unwrap();
        assert_eq!(task.id, "task-1");
        assert_eq!(task.created_at, 1_000);

        let duplicate = ctx.db.tasks().create(&new_task);
        assert!(matches!(duplicate, Err(DbError::Validation { field: "id", .. })));
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_create_rejects_invalid_input(ctx: &mut TaskTestContext) {
        let empty = ctx.db.tasks().create(&NewTask::new("   "));
        assert!(matches!(empty, Err(DbError::Validation { field: "title", .. })));

        let zero = ctx.db.tasks().create(&NewTask::new("Zero").duration(0));
        assert!(matches!(zero, Err(DbError::Validation { field: "durationMin", .. })));

        assert_eq!(ctx.db.tasks().count().unwrap(), 0);
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_update_partial_fields(ctx: &mut TaskTestContext) {
        let task = ctx
            .db
            .tasks()
            .create(&NewTask::new("Original").due_at(at(10, 9)).duration(30))
            .unwrap();

        let patch = TaskPatch {
            title: Some("Renamed".to_string()),
            due_at: Some(None),
            ..Default::default()
        };
        assert!(ctx.db.tasks().update(&task.id, &patch).unwrap());

        let updated = ctx.db.tasks().get(&task.id).unwrap().unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.due_at, None);
        assert_eq!(updated.duration_min, Some(30));
        assert!(updated.updated_at >= task.updated_at);
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_update_and_delete_missing_id(ctx: &mut TaskTestContext) {
        assert!(!ctx.db.tasks().update("missing", &TaskPatch::title("x")).unwrap());
        assert!(!ctx.db.tasks().delete("missing").unwrap());
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_delete_twice(ctx: &mut TaskTestContext) {
        let task = ctx.db.tasks().create(&NewTask::new("Gone soon")).unwrap();

        assert!(ctx.db.tasks().delete(&task.id).unwrap());
        assert!(!ctx.db.tasks().delete(&task.id).unwrap());
        assert!(ctx.db.tasks().get(&task.id).unwrap().is_none());
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_fetch_by_status_and_due(ctx: &mut TaskTestContext) {
        let tasks = ctx.db.tasks();
        let early = tasks.create(&NewTask::new("Early").due_at(at(10, 9))).unwrap();
        let boundary = tasks.create(&NewTask::new("Boundary").due_at(at(11, 9))).unwrap();
        let late = tasks.create(&NewTask::new("Late").due_at(at(12, 9))).unwrap();
        tasks.create(&NewTask::new("Undated")).unwrap();
        tasks.update(&late.id, &TaskPatch::status(TaskStatus::Done)).unwrap();

        let pending = tasks.fetch(&TaskFilter::Status(TaskStatus::Pending)).unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].id, early.id);

        let inclusive = tasks.fetch(&TaskFilter::DueFrom { from: at(11, 9), inclusive: true }).unwrap();
        let ids: Vec<&str> = inclusive.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![boundary.id.as_str(), late.id.as_str()]);

        let exclusive = tasks.fetch(&TaskFilter::DueFrom { from: at(11, 9), inclusive: false }).unwrap();
        assert_eq!(exclusive.len(), 1);
        assert_eq!(exclusive[0].id, late.id);

        let pending_from = tasks
            .fetch(&TaskFilter::StatusDueFrom {
                status: TaskStatus::Pending,
                from: at(10, 9),
                inclusive: false,
            })
            .unwrap();
        assert_eq!(pending_from.len(), 1);
        assert_eq!(pending_from[0].id, boundary.id);
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_fetch_by_category_and_status(ctx: &mut TaskTestContext) {
        let default = ctx.db.categories().get_by_name("Default").unwrap().unwrap();
        let tasks = ctx.db.tasks();
        let a = tasks.create(&NewTask::new("A").category(&default.id)).unwrap();
        let b = tasks.create(&NewTask::new("B").category(&default.id)).unwrap();
        tasks.create(&NewTask::new("Uncategorized")).unwrap();
        tasks.update(&b.id, &TaskPatch::status(TaskStatus::Archived)).unwrap();

        let all_in_category = tasks
            .fetch(&TaskFilter::Category {
                category_id: default.id.clone(),
                status: None,
            })
            .unwrap();
        assert_eq!(all_in_category.len(), 2);

        let pending_in_category = tasks
            .fetch(&TaskFilter::Category {
                category_id: default.id.clone(),
                status: Some(TaskStatus::Pending),
            })
            .unwrap();
        assert_eq!(pending_in_category.len(), 1);
        assert_eq!(pending_in_category[0].id, a.id);
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_checklist_index_tracks_open_items(ctx: &mut TaskTestContext) {
        let tasks = ctx.db.tasks();
        let with_items = tasks.create(&NewTask::new("Pack").checklist(&["Passport", "Charger"])).unwrap();
        tasks.create(&NewTask::new("No checklist")).unwrap();

        assert!(with_items.checklist.iter().all(|item| !item.id.is_empty()));
        let open = tasks.fetch(&TaskFilter::OpenChecklist).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, with_items.id);

        let checked: Vec<ChecklistItem> = with_items
            .checklist
            .iter()
            .cloned()
            .map(|mut item| {
                item.checked = true;
                item
            })
            .collect();
        let patch = TaskPatch {
            checklist: Some(checked),
            ..Default::default()
        };
        tasks.update(&with_items.id, &patch).unwrap();

        assert!(tasks.fetch(&TaskFilter::OpenChecklist).unwrap().is_empty());
        let rows: i64 = ctx
            .db
            .conn
            .query_row("SELECT COUNT(*) FROM checklist_items WHERE checked = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_fetch_by_ids(ctx: &mut TaskTestContext) {
        let tasks = ctx.db.tasks();
        let a = tasks.create(&NewTask::new("A")).unwrap();
        tasks.create(&NewTask::new("B")).unwrap();

        let found = tasks
            .fetch(&TaskFilter::ByIds(vec![a.id.clone(), "missing".to_string()]))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);
        assert!(tasks.fetch(&TaskFilter::ByIds(vec![])).unwrap().is_empty());
    }

    #[test_context(TaskTestContext)]
    #[test]
    fn test_invalid_status_rejected_by_store(ctx: &mut TaskTestContext) {
        let task = ctx.db.tasks().create(&NewTask::new("Guarded")).unwrap();

        let result = ctx
            .db
            .conn
            .execute("UPDATE tasks SET status = 'blocked' WHERE id = ?1", [&task.id]);
        assert!(result.is_err());
    }
}
