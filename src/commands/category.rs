use super::{open_db, resolve_category};
use crate::{
    db::categories::{CategoryPatch, NewCategory},
    libs::{messages::Message, view::View},
    msg_error, msg_info, msg_print, msg_success,
};
use anyhow::Result;
use clap::{Args, Subcommand};

const DEFAULT_NEW_COLOR: &str = "#3b82f6";

#[derive(Debug, Args)]
pub struct CategoryArgs {
    #[command(subcommand)]
    command: CategoryCommand,
}

#[derive(Debug, Subcommand)]
enum CategoryCommand {
    /// Create a category
    Add {
        name: String,
        #[arg(short, long, default_value = DEFAULT_NEW_COLOR)]
        color: String,
    },
    /// List categories in display order
    List,
    /// Rename a category (name or id)
    Rename { category: String, name: String },
    /// Change the color of a category
    Color { category: String, color: String },
    /// Delete a category; its tasks move to `--reassign-to` or lose their category
    Delete {
        category: String,
        #[arg(short, long)]
        reassign_to: Option<String>,
    },
    /// Set the display order; every listed category gets its position
    Reorder {
        #[arg(required = true)]
        categories: Vec<String>,
    },
}

pub async fn cmd(args: CategoryArgs) -> Result<()> {
    match args.command {
        CategoryCommand::Add { name, color } => handle_add(&name, &color),
        CategoryCommand::List => handle_list(),
        CategoryCommand::Rename { category, name } => handle_update(&category, CategoryPatch::rename(&name)),
        CategoryCommand::Color { category, color } => handle_update(
            &category,
            CategoryPatch {
                color: Some(color),
                ..Default::default()
            },
        ),
        CategoryCommand::Delete { category, reassign_to } => handle_delete(&category, reassign_to),
        CategoryCommand::Reorder { categories } => handle_reorder(&categories),
    }
}

fn handle_add(name: &str, color: &str) -> Result<()> {
    let db = open_db()?;
    let category = db.categories().create(&NewCategory::new(name, color))?;
    msg_success!(Message::CategoryCreated(category.name));
    Ok(())
}

fn handle_list() -> Result<()> {
    let db = open_db()?;
    let categories = db.categories().all()?;

    if categories.is_empty() {
        msg_info!(Message::NoCategoriesFound);
        return Ok(());
    }

    msg_print!(Message::CategoriesHeader, true);
    View::categories(&categories)?;
    Ok(())
}

fn handle_update(identifier: &str, patch: CategoryPatch) -> Result<()> {
    let db = open_db()?;
    let category = resolve_category(&db, identifier)?;

    if db.categories().update(&category.id, &patch)? {
        msg_success!(Message::CategoryUpdated(patch.name.unwrap_or(category.name)));
    } else {
        msg_error!(Message::CategoryNotFound(identifier.to_string()));
    }
    Ok(())
}

fn handle_delete(identifier: &str, reassign_to: Option<String>) -> Result<()> {
    let db = open_db()?;
    let category = resolve_category(&db, identifier)?;
    let target = match reassign_to {
        Some(target) => Some(resolve_category(&db, &target)?),
        None => None,
    };

    if db.categories().delete(&category.id, target.as_ref().map(|c| c.id.as_str()))? {
        msg_success!(Message::CategoryDeleted(category.name));
    } else {
        msg_error!(Message::CategoryDeleteRefused(category.name));
    }
    Ok(())
}

fn handle_reorder(identifiers: &[String]) -> Result<()> {
    let db = open_db()?;
    let mut ids = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        ids.push(resolve_category(&db, identifier)?.id);
    }

    if db.categories().update_order(&ids)? {
        msg_success!(Message::CategoriesReordered);
        View::categories(&db.categories().all()?)?;
    } else {
        msg_error!(Message::CategoryOrderRejected);
    }
    Ok(())
}
