/// Every user-facing and diagnostic message, with its parameters.
///
/// The text lives in `display.rs`.
#[derive(Debug, Clone)]
pub enum Message {
    // === TASK MESSAGES ===
    TaskCreatedWithName(String),
    TaskUpdatedWithName(String),
    TaskStatusChanged(String, String), // title, new status
    TaskNotFoundWithId(String),
    TaskIdAmbiguous(String, usize), // prefix, matches
    TasksDeletedCount(usize),
    TasksHeader,
    TasksToBeDeleted,
    NoTasksFound,
    NoChangesDetected,
    ConfirmDeleteTasks(usize),
    ChainHeader(String),
    InvalidDate(String),

    // === RECURRENCE MESSAGES ===
    InvalidRepeatRule(String, String), // rule, reason
    RepeatWithoutDueDate,
    NextOccurrenceScheduled(String),      // due
    RecurrenceChainEnded(String),         // title
    RecurrenceFailed(String, String),     // title, error
    SuccessorAlreadyExists(String),       // title
    SuccessorCreated(String, String),     // title, due

    // === CATEGORY MESSAGES ===
    CategoryCreated(String),
    CategoryUpdated(String),
    CategoryDeleted(String),
    CategoryNotFound(String),
    CategoryNotFoundWithId(String),
    CategoryDeleteRefused(String),
    CategoryOrderRejected,
    CategoriesReordered,
    CategoriesHeader,
    NoCategoriesFound,

    // === SETTING MESSAGES ===
    SettingValue(String, String), // key, value
    SettingSaved(String),
    SettingDeleted(String),
    SettingNotFound(String),
    SettingKeyReserved(String),
    NoSettingsFound,

    // === STORE MESSAGES ===
    StoreOpenFailed(String),
    TransactionStarted(String),    // stores
    TransactionRolledBack(String), // stores
    SavepointRollbackFailed(String),
    StaleLockReclaimed(String),       // lock name
    LockRetry(String, u32),           // lock name, attempt
    LockReleaseFailed(String, String), // key, error
    ReminderChannelClosed,

    // === MIGRATION MESSAGES ===
    DatabaseVersion(u32, String), // version, name
    DatabaseNeedsUpdate(u32),     // latest
    DatabaseUpToDate(u32),
    SchemaNewerThanKnown(u32, u32), // current, latest
    MigrationsFound(usize),
    RunningMigration(u32, String),
    MigrationCompleted(u32),
    MigrationFailed(u32, String),
    MigrationRecordFailed(u32, String),
    MigrationDowngradeRefused(u32, u32), // current, target
    MigrationUnknownTarget(u32),
    MigrationStopped(u32),
    AllMigrationsCompleted(u32),
    MigrationHistory,
    NoMigrationHistory,

    // === BACKUP MESSAGES ===
    BackupWritten(String, usize, usize), // path, tasks, categories
    ConfirmRestore(usize, usize),        // tasks, categories
    RestoreRefusedNewer(u32, u32),       // snapshot, latest
    RestoreCompleted(usize, usize, usize),
    RestoreFailed(String),
    HealthOk,
    HealthIssue(String),
    HealthIssuesFound(usize),

    // === EXPORT / IMPORT MESSAGES ===
    ExportingData(String), // format
    ExportCompleted(String),
    ConfirmReplaceImport,
    ImportCompleted(usize, usize, usize, usize), // tasks, categories, settings written, skipped
    ImportFailed(String),

    // === GENERAL ===
    OperationCancelled,
}
