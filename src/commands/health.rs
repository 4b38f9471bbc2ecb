use super::open_db_without_migrations;
use crate::{
    libs::{messages::Message, view::View},
    msg_bail_anyhow, msg_success, msg_warning,
};
use anyhow::Result;

/// Reports on the store as found: pending migrations are not applied first.
pub fn cmd() -> Result<()> {
    let db = open_db_without_migrations()?;
    let report = db.health();

    View::health(&report)?;
    if report.is_healthy() {
        msg_success!(Message::HealthOk);
        return Ok(());
    }

    for issue in &report.issues {
        msg_warning!(Message::HealthIssue(issue.clone()));
    }
    msg_bail_anyhow!(Message::HealthIssuesFound(report.issues.len()))
}
