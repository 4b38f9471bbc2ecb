#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use tasknest::db::db::Db;
    use tasknest::db::error::DbError;
    use tasknest::db::transaction::AdvisoryLock;
    use tasknest::libs::config::LockConfig;
    use tasknest::libs::recurrence::{successor_for, Frequency, RecurrenceError, RepeatRule};
    use tasknest::libs::task::{NewTask, TaskFilter, TaskPatch, TaskStatus};
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct RecurrenceTestContext {
        _temp_dir: TempDir,
        db: Db,
    }

    impl TestContext for RecurrenceTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let db = Db::open(&temp_dir.path().join("tasknest.db"))
                .unwrap()
                .with_lock_config(LockConfig {
                    attempts: 1,
                    backoff_ms: 1,
                    stale_after_secs: 30,
                });
            RecurrenceTestContext { _temp_dir: temp_dir, db }
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn millis(y: i32, m: u32, d: u32, h: u32) -> i64 {
        utc(y, m, d, h, 0).timestamp_millis()
    }

    fn next(rule: &str, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
        rule.parse::<RepeatRule>().unwrap().next_after(anchor)
    }

    // === Rule parsing ===

    #[test]
    fn test_parse_full_rule() {
        let rule: RepeatRule = "RRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE;COUNT=10;WKST=MO".parse().unwrap();

        assert_eq!(rule.freq, Frequency::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(rule.by_day.len(), 2);
        assert_eq!(rule.count, Some(10));
        assert_eq!(rule.to_string(), "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE;COUNT=10");
    }

    #[test]
    fn test_parse_shorthands_and_dtstart() {
        assert_eq!("daily".parse::<RepeatRule>().unwrap(), RepeatRule::new(Frequency::Daily));
        assert_eq!("Weekly".parse::<RepeatRule>().unwrap().freq, Frequency::Weekly);

        let rule: RepeatRule = "DTSTART:20250101T090000Z\nRRULE:FREQ=MONTHLY;BYMONTHDAY=-1".parse().unwrap();
        assert_eq!(rule.freq, Frequency::Monthly);
        assert_eq!(rule.by_month_day, vec![-1]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<RepeatRule>(), Err(RecurrenceError::Empty));
        assert_eq!("INTERVAL=2".parse::<RepeatRule>(), Err(RecurrenceError::MissingFrequency));
        assert!(matches!(
            "FREQ=SOMETIMES".parse::<RepeatRule>(),
            Err(RecurrenceError::UnknownFrequency(_))
        ));
        assert!(matches!(
            "FREQ=DAILY;INTERVAL=0".parse::<RepeatRule>(),
            Err(RecurrenceError::InvalidValue { part: "INTERVAL", .. })
        ));
        assert!(matches!(
            "FREQ=DAILY;COUNT=0".parse::<RepeatRule>(),
            Err(RecurrenceError::InvalidValue { part: "COUNT", .. })
        ));
        assert!(matches!(
            "FREQ=MONTHLY;BYMONTHDAY=32".parse::<RepeatRule>(),
            Err(RecurrenceError::InvalidValue { part: "BYMONTHDAY", .. })
        ));
        assert!(matches!(
            "FREQ=WEEKLY;BYDAY=XX".parse::<RepeatRule>(),
            Err(RecurrenceError::InvalidValue { part: "BYDAY", .. })
        ));
        assert_eq!(
            "FREQ=DAILY;BYSETPOS=1".parse::<RepeatRule>(),
            Err(RecurrenceError::UnsupportedPart("BYSETPOS".to_string()))
        );
        assert!(matches!(
            "FREQ=DAILY;INTERVAL".parse::<RepeatRule>(),
            Err(RecurrenceError::MalformedPart(_))
        ));
    }

    // === Next instant ===

    #[test]
    fn test_daily_and_interval() {
        let anchor = utc(2025, 1, 10, 9, 0);
        assert_eq!(next("FREQ=DAILY", anchor), Some(utc(2025, 1, 11, 9, 0)));
        assert_eq!(next("FREQ=DAILY;INTERVAL=3", anchor), Some(utc(2025, 1, 13, 9, 0)));
        assert_eq!(next("FREQ=HOURLY;INTERVAL=3", anchor), Some(utc(2025, 1, 10, 12, 0)));
    }

    #[test]
    fn test_weekly_by_day() {
        let monday = utc(2025, 1, 13, 9, 0);
        let wednesday = utc(2025, 1, 15, 9, 0);

        assert_eq!(next("FREQ=WEEKLY;BYDAY=MO,WE", monday), Some(wednesday));
        assert_eq!(next("FREQ=WEEKLY;BYDAY=MO,WE", wednesday), Some(utc(2025, 1, 20, 9, 0)));
        assert_eq!(next("FREQ=WEEKLY", monday), Some(utc(2025, 1, 20, 9, 0)));
        assert_eq!(next("FREQ=WEEKLY;INTERVAL=2", monday), Some(utc(2025, 1, 27, 9, 0)));
    }

    #[test]
    fn test_monthly_skips_months_without_the_day() {
        let anchor = utc(2025, 1, 31, 9, 0);
        assert_eq!(next("FREQ=MONTHLY", anchor), Some(utc(2025, 3, 31, 9, 0)));
        assert_eq!(next("FREQ=MONTHLY;BYMONTHDAY=-1", anchor), Some(utc(2025, 2, 28, 9, 0)));
    }

    #[test]
    fn test_monthly_last_weekday() {
        // 2025-01-31 and 2025-02-28 are both Fridays.
        let anchor = utc(2025, 1, 31, 17, 30);
        assert_eq!(next("FREQ=MONTHLY;BYDAY=-1FR", anchor), Some(utc(2025, 2, 28, 17, 30)));
        assert_eq!(next("FREQ=MONTHLY;BYDAY=1MO", anchor), Some(utc(2025, 2, 3, 17, 30)));
    }

    #[test]
    fn test_yearly_leap_day() {
        assert_eq!(next("FREQ=YEARLY", utc(2024, 2, 29, 8, 0)), Some(utc(2028, 2, 29, 8, 0)));
        assert_eq!(
            next("FREQ=YEARLY;BYMONTH=3,9", utc(2025, 3, 15, 8, 0)),
            Some(utc(2025, 9, 15, 8, 0))
        );
    }

    #[test]
    fn test_until_bounds_rule() {
        let rule = "FREQ=DAILY;UNTIL=20250111";
        assert_eq!(next(rule, utc(2025, 1, 10, 9, 0)), Some(utc(2025, 1, 11, 9, 0)));
        assert_eq!(next(rule, utc(2025, 1, 11, 9, 0)), None);
    }

    #[test]
    fn test_successor_for_non_repeating_task() {
        let db = Db::open_in_memory().unwrap();
        let task = db.tasks().create(&NewTask::new("Once").due_at(millis(2025, 1, 10, 9))).unwrap();
        assert_eq!(successor_for(&task), Ok(None));

        let undated = db.tasks().create(&NewTask::new("Undated").repeat("daily")).unwrap();
        assert_eq!(successor_for(&undated), Err(RecurrenceError::MissingAnchor));
    }

    // === Status changes ===

    #[test_context(RecurrenceTestContext)]
    #[test]
    fn test_completing_daily_task_creates_successor(ctx: &mut RecurrenceTestContext) {
        let due = millis(2025, 1, 10, 9);
        let standup = ctx
            .db
            .tasks()
            .create(&NewTask::new("Standup").due_at(due).repeat("FREQ=DAILY").duration(15))
            .unwrap();

        let change = ctx.db.set_task_status(&standup.id, TaskStatus::Done).unwrap().unwrap();
        assert_eq!(change.previous, TaskStatus::Pending);
        assert_eq!(change.task.status, TaskStatus::Done);

        let successor = change.successor.unwrap();
        assert_eq!(successor.title, "Standup");
        assert_eq!(successor.status, TaskStatus::Pending);
        assert_eq!(successor.due_at, Some(millis(2025, 1, 11, 9)));
        assert_eq!(successor.duration_min, Some(15));
        assert_eq!(successor.repeat_rule.as_deref(), Some("FREQ=DAILY"));
        assert_eq!(successor.repeat_parent_id.as_deref(), Some(standup.id.as_str()));
        assert_eq!(successor.repeat_count, Some(1));
        assert_eq!(ctx.db.tasks().get(&successor.id).unwrap().unwrap(), successor);

        let third = ctx
            .db
            .set_task_status(&successor.id, TaskStatus::Done)
            .unwrap()
            .unwrap()
            .successor
            .unwrap();
        assert_eq!(third.repeat_parent_id.as_deref(), Some(standup.id.as_str()));
        assert_eq!(third.repeat_count, Some(2));
        assert_eq!(third.due_at, Some(millis(2025, 1, 12, 9)));

        let chain = ctx.db.tasks().fetch(&TaskFilter::Chain(standup.id.clone())).unwrap();
        let ids: Vec<&str> = chain.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![standup.id.as_str(), successor.id.as_str(), third.id.as_str()]);
    }

    #[test_context(RecurrenceTestContext)]
    #[test]
    fn test_uncompleting_never_creates_or_removes_occurrences(ctx: &mut RecurrenceTestContext) {
        let task = ctx
            .db
            .tasks()
            .create(&NewTask::new("Water plants").due_at(millis(2025, 1, 10, 9)).repeat("daily"))
            .unwrap();

        let first = ctx.db.toggle_task_status(&task.id).unwrap().unwrap();
        assert!(first.successor.is_some());

        let back = ctx.db.toggle_task_status(&task.id).unwrap().unwrap();
        assert_eq!(back.previous, TaskStatus::Done);
        assert_eq!(back.task.status, TaskStatus::Pending);
        assert!(back.successor.is_none());
        assert_eq!(ctx.db.tasks().count().unwrap(), 2);

        let again = ctx.db.toggle_task_status(&task.id).unwrap().unwrap();
        assert!(again.successor.is_none());
        assert_eq!(ctx.db.tasks().count().unwrap(), 2);
    }

    #[test_context(RecurrenceTestContext)]
    #[test]
    fn test_successor_resets_checklist(ctx: &mut RecurrenceTestContext) {
        let task = ctx
            .db
            .tasks()
            .create(
                &NewTask::new("Weekly review")
                    .due_at(millis(2025, 1, 13, 9))
                    .repeat("FREQ=WEEKLY")
                    .checklist(&["Inbox", "Calendar"]),
            )
            .unwrap();
        let checked = task
            .checklist
            .iter()
            .cloned()
            .map(|mut item| {
                item.checked = true;
                item
            })
            .collect();
        ctx.db
            .tasks()
            .update(&task.id, &TaskPatch { checklist: Some(checked), ..Default::default() })
            .unwrap();

        let successor = ctx
            .db
            .set_task_status(&task.id, TaskStatus::Done)
            .unwrap()
            .unwrap()
            .successor
            .unwrap();

        let texts: Vec<&str> = successor.checklist.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["Inbox", "Calendar"]);
        assert!(successor.checklist.iter().all(|item| !item.checked));
        assert_eq!(ctx.db.tasks().fetch(&TaskFilter::OpenChecklist).unwrap().len(), 1);
    }

    #[test_context(RecurrenceTestContext)]
    #[test]
    fn test_repeat_until_ends_chain(ctx: &mut RecurrenceTestContext) {
        let task = ctx
            .db
            .tasks()
            .create(
                &NewTask::new("Course")
                    .due_at(millis(2025, 1, 10, 9))
                    .repeat("FREQ=DAILY")
                    .repeat_until(millis(2025, 1, 10, 12)),
            )
            .unwrap();

        let change = ctx.db.set_task_status(&task.id, TaskStatus::Done).unwrap().unwrap();
        assert_eq!(change.task.status, TaskStatus::Done);
        assert!(change.successor.is_none());
        assert_eq!(ctx.db.tasks().count().unwrap(), 1);
    }

    #[test_context(RecurrenceTestContext)]
    #[test]
    fn test_count_limits_chain_length(ctx: &mut RecurrenceTestContext) {
        let task = ctx
            .db
            .tasks()
            .create(&NewTask::new("Twice").due_at(millis(2025, 1, 10, 9)).repeat("FREQ=DAILY;COUNT=2"))
            .unwrap();

        let second = ctx
            .db
            .set_task_status(&task.id, TaskStatus::Done)
            .unwrap()
            .unwrap()
            .successor
            .unwrap();
        let last = ctx.db.set_task_status(&second.id, TaskStatus::Done).unwrap().unwrap();

        assert!(last.successor.is_none());
        assert_eq!(ctx.db.tasks().count().unwrap(), 2);
    }

    #[test_context(RecurrenceTestContext)]
    #[test]
    fn test_invalid_rule_does_not_block_completion(ctx: &mut RecurrenceTestContext) {
        let task = ctx
            .db
            .tasks()
            .create(&NewTask::new("Odd").due_at(millis(2025, 1, 10, 9)).repeat("FREQ=SOMETIMES"))
            .unwrap();

        let change = ctx.db.set_task_status(&task.id, TaskStatus::Done).unwrap().unwrap();
        assert_eq!(change.task.status, TaskStatus::Done);
        assert!(change.successor.is_none());
    }

    #[test_context(RecurrenceTestContext)]
    #[test]
    fn test_archiving_does_not_expand(ctx: &mut RecurrenceTestContext) {
        let task = ctx
            .db
            .tasks()
            .create(&NewTask::new("Gym").due_at(millis(2025, 1, 10, 9)).repeat("daily"))
            .unwrap();

        let change = ctx.db.set_task_status(&task.id, TaskStatus::Archived).unwrap().unwrap();
        assert!(change.successor.is_none());
        assert_eq!(ctx.db.tasks().count().unwrap(), 1);
    }

    #[test_context(RecurrenceTestContext)]
    #[test]
    fn test_unknown_task(ctx: &mut RecurrenceTestContext) {
        assert!(ctx.db.set_task_status("missing", TaskStatus::Done).unwrap().is_none());
        assert!(ctx.db.toggle_task_status("missing").unwrap().is_none());
    }

    #[test_context(RecurrenceTestContext)]
    #[test]
    fn test_expansion_waits_for_lock(ctx: &mut RecurrenceTestContext) {
        let task = ctx
            .db
            .tasks()
            .create(&NewTask::new("Contended").due_at(millis(2025, 1, 10, 9)).repeat("daily"))
            .unwrap();

        let config = ctx.db.lock_config().clone();
        let guard = AdvisoryLock::acquire(&ctx.db.conn, &config, &format!("recurrence:{}", task.id)).unwrap();

        let blocked = ctx.db.set_task_status(&task.id, TaskStatus::Done);
        assert!(matches!(blocked, Err(DbError::LockUnavailable(_))));
        assert_eq!(ctx.db.tasks().get(&task.id).unwrap().unwrap().status, TaskStatus::Pending);

        drop(guard);
        let change = ctx.db.set_task_status(&task.id, TaskStatus::Done).unwrap().unwrap();
        assert!(change.successor.is_some());
    }
}
