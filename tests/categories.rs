#[cfg(test)]
mod tests {
    use tasknest::db::categories::{CategoryPatch, NewCategory, DEFAULT_CATEGORY_NAME};
    use tasknest::db::db::Db;
    use tasknest::db::error::DbError;
    use tasknest::libs::task::NewTask;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct CategoryTestContext {
        _temp_dir: TempDir,
        db: Db,
    }

    impl TestContext for CategoryTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let db = Db::open(&temp_dir.path().join("tasknest.db")).unwrap();
            CategoryTestContext { _temp_dir: temp_dir, db }
        }
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_fresh_store_has_default_category(ctx: &mut CategoryTestContext) {
        let categories = ctx.db.categories().all().unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, DEFAULT_CATEGORY_NAME);
        assert_eq!(categories[0].order, 0);
        assert!(!ctx.db.categories().ensure_default().unwrap());
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_create_places_new_category_last(ctx: &mut CategoryTestContext) {
        let work = ctx.db.categories().create(&NewCategory::new("Work", "#ff0000")).unwrap();
        let home = ctx.db.categories().create(&NewCategory::new(" Home ", "#00ff00")).unwrap();

        assert_eq!(work.order, 1);
        assert_eq!(home.order, 2);
        assert_eq!(home.name, "Home");

        let names: Vec<String> = ctx.db.categories().all().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Default", "Work", "Home"]);
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_duplicate_name_rejected(ctx: &mut CategoryTestContext) {
        ctx.db.categories().create(&NewCategory::new("Work", "#ff0000")).unwrap();

        let duplicate = ctx.db.categories().create(&NewCategory::new("Work", "#000000"));
        assert!(matches!(duplicate, Err(DbError::DuplicateCategory(name)) if name == "Work"));
        assert_eq!(ctx.db.categories().count().unwrap(), 2);
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_rename_rules(ctx: &mut CategoryTestContext) {
        let work = ctx.db.categories().create(&NewCategory::new("Work", "#ff0000")).unwrap();
        let home = ctx.db.categories().create(&NewCategory::new("Home", "#00ff00")).unwrap();
        let default = ctx.db.categories().get_by_name(DEFAULT_CATEGORY_NAME).unwrap().unwrap();

        assert!(ctx.db.categories().update(&work.id, &CategoryPatch::rename("Office")).unwrap());
        assert_eq!(ctx.db.categories().get(&work.id).unwrap().unwrap().name, "Office");

        let clash = ctx.db.categories().update(&home.id, &CategoryPatch::rename("Office"));
        assert!(matches!(clash, Err(DbError::DuplicateCategory(_))));

        let protected = ctx.db.categories().update(&default.id, &CategoryPatch::rename("Other"));
        assert!(matches!(protected, Err(DbError::Validation { field: "name", .. })));

        let recolor = CategoryPatch {
            color: Some("#111111".to_string()),
            ..Default::default()
        };
        assert!(ctx.db.categories().update(&default.id, &recolor).unwrap());
        assert!(!ctx.db.categories().update("missing", &recolor).unwrap());
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_default_category_cannot_be_deleted(ctx: &mut CategoryTestContext) {
        let default = ctx.db.categories().get_by_name(DEFAULT_CATEGORY_NAME).unwrap().unwrap();

        assert!(!ctx.db.categories().delete(&default.id, None).unwrap());
        assert!(ctx.db.categories().get(&default.id).unwrap().is_some());
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_delete_reassigns_tasks(ctx: &mut CategoryTestContext) {
        let work = ctx.db.categories().create(&NewCategory::new("Work", "#ff0000")).unwrap();
        let home = ctx.db.categories().create(&NewCategory::new("Home", "#00ff00")).unwrap();
        let moved = ctx.db.tasks().create(&NewTask::new("Moved").category(&work.id)).unwrap();

        assert!(ctx.db.categories().delete(&work.id, Some(&home.id)).unwrap());

        let task = ctx.db.tasks().get(&moved.id).unwrap().unwrap();
        assert_eq!(task.category_id.as_deref(), Some(home.id.as_str()));
        assert!(ctx.db.categories().get(&work.id).unwrap().is_none());
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_delete_without_target_clears_reference(ctx: &mut CategoryTestContext) {
        let work = ctx.db.categories().create(&NewCategory::new("Work", "#ff0000")).unwrap();
        let orphan = ctx.db.tasks().create(&NewTask::new("Orphan").category(&work.id)).unwrap();

        assert!(ctx.db.categories().delete(&work.id, None).unwrap());
        assert_eq!(ctx.db.tasks().get(&orphan.id).unwrap().unwrap().category_id, None);
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_delete_refuses_bad_target(ctx: &mut CategoryTestContext) {
        let work = ctx.db.categories().create(&NewCategory::new("Work", "#ff0000")).unwrap();
        let task = ctx.db.tasks().create(&NewTask::new("Stays").category(&work.id)).unwrap();

        assert!(!ctx.db.categories().delete(&work.id, Some("missing")).unwrap());
        assert!(!ctx.db.categories().delete(&work.id, Some(&work.id)).unwrap());
        assert!(!ctx.db.categories().delete("missing", None).unwrap());

        assert!(ctx.db.categories().get(&work.id).unwrap().is_some());
        let task = ctx.db.tasks().get(&task.id).unwrap().unwrap();
        assert_eq!(task.category_id.as_deref(), Some(work.id.as_str()));
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_update_order(ctx: &mut CategoryTestContext) {
        let c1 = ctx.db.categories().create(&NewCategory::new("C1", "#000001")).unwrap();
        let c2 = ctx.db.categories().create(&NewCategory::new("C2", "#000002")).unwrap();
        let c3 = ctx.db.categories().create(&NewCategory::new("C3", "#000003")).unwrap();
        let default = ctx.db.categories().get_by_name(DEFAULT_CATEGORY_NAME).unwrap().unwrap();

        let order = vec![c3.id.clone(), c1.id.clone(), c2.id.clone(), default.id.clone()];
        assert!(ctx.db.categories().update_order(&order).unwrap());

        let listed = ctx.db.categories().all().unwrap();
        let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, order.iter().map(String::as_str).collect::<Vec<_>>());
        let orders: Vec<i64> = listed.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_update_order_with_unknown_id_writes_nothing(ctx: &mut CategoryTestContext) {
        let c1 = ctx.db.categories().create(&NewCategory::new("C1", "#000001")).unwrap();
        let before = ctx.db.categories().all().unwrap();

        let order = vec![c1.id.clone(), "missing".to_string()];
        assert!(!ctx.db.categories().update_order(&order).unwrap());
        assert_eq!(ctx.db.categories().all().unwrap(), before);
    }

    #[test_context(CategoryTestContext)]
    #[test]
    fn test_ensure_default_recreates_missing_category(ctx: &mut CategoryTestContext) {
        ctx.db.conn.execute("DELETE FROM categories", []).unwrap();

        assert!(ctx.db.categories().ensure_default().unwrap());
        let default = ctx.db.categories().get_by_name(DEFAULT_CATEGORY_NAME).unwrap().unwrap();
        assert_eq!(default.order, 0);
    }
}
