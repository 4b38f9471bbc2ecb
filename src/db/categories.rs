//! Category operations.
//!
//! Categories are labels with a display color and a manual order. Names are
//! unique, checked on creation and rename. The category named `Default` is
//! protected: it is seeded by the first schema version and can never be
//! deleted.

use super::error::{DbError, DbResult};
use super::tasks::Tasks;
use super::transaction::atomic;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY_NAME: &str = "Default";
pub const DEFAULT_CATEGORY_COLOR: &str = "#6b7280";

const SELECT_CATEGORIES: &str = "SELECT id, name, color, sort_order FROM categories";
const INSERT_CATEGORY: &str = "INSERT INTO categories (id, name, color, sort_order) VALUES (?1, ?2, ?3, ?4)";
const UPDATE_CATEGORY: &str = "UPDATE categories SET name = ?2, color = ?3, sort_order = ?4 WHERE id = ?1";
const DELETE_CATEGORY: &str = "DELETE FROM categories WHERE id = ?1";
const UPDATE_ORDER: &str = "UPDATE categories SET sort_order = ?2 WHERE id = ?1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
    pub order: i64,
}

impl Category {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_CATEGORY_NAME
    }
}

/// Input for creating a category. A missing `order` places it last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub order: Option<i64>,
}

impl NewCategory {
    pub fn new(name: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub order: Option<i64>,
}

impl CategoryPatch {
    pub fn rename(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

pub struct Categories<'a> {
    conn: &'a Connection,
}

impl<'a> Categories<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: &str) -> DbResult<Option<Category>> {
        let sql = format!("{} WHERE id = ?1", SELECT_CATEGORIES);
        self.conn.query_row(&sql, params![id], map_category).optional().map_err(Into::into)
    }

    pub fn get_by_name(&self, name: &str) -> DbResult<Option<Category>> {
        let sql = format!("{} WHERE name = ?1 ORDER BY sort_order LIMIT 1", SELECT_CATEGORIES);
        self.conn.query_row(&sql, params![name.trim()], map_category).optional().map_err(Into::into)
    }

    /// All categories in display order.
    pub fn all(&self) -> DbResult<Vec<Category>> {
        let sql = format!("{} ORDER BY sort_order, name", SELECT_CATEGORIES);
        let mut stmt = self.conn.prepare(&sql)?;
        let categories = stmt.query_map([], map_category)?.collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn count(&self) -> DbResult<i64> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?)
    }

    /// Creates a category.
    ///
    /// Fails with [`DbError::DuplicateCategory`] when the name is taken.
    pub fn create(&self, new_category: &NewCategory) -> DbResult<Category> {
        let name = new_category.name.trim();
        validate(name, &new_category.color)?;
        if self.get_by_name(name)?.is_some() {
            return Err(DbError::DuplicateCategory(name.to_string()));
        }

        let order = match new_category.order {
            Some(order) => order,
            None => self.next_order()?,
        };
        let category = Category {
            id: new_category.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: name.to_string(),
            color: new_category.color.clone(),
            order,
        };
        self.insert(&category)?;
        Ok(category)
    }

    pub(crate) fn insert(&self, category: &Category) -> DbResult<()> {
        self.conn.execute(
            INSERT_CATEGORY,
            params![category.id, category.name, category.color, category.order],
        )?;
        Ok(())
    }

    /// Applies a partial update. Returns `false` when the id is unknown.
    ///
    /// A rename onto a name held by another category fails with
    /// [`DbError::DuplicateCategory`].
    pub fn update(&self, id: &str, patch: &CategoryPatch) -> DbResult<bool> {
        let Some(mut category) = self.get(id)? else {
            return Ok(false);
        };

        if let Some(name) = &patch.name {
            let name = name.trim();
            if name != category.name {
                if category.is_default() {
                    return Err(DbError::validation("name", "the Default category cannot be renamed"));
                }
                if self.get_by_name(name)?.is_some_and(|other| other.id != category.id) {
                    return Err(DbError::DuplicateCategory(name.to_string()));
                }
                category.name = name.to_string();
            }
        }
        if let Some(color) = &patch.color {
            category.color = color.clone();
        }
        if let Some(order) = patch.order {
            category.order = order;
        }
        validate(&category.name, &category.color)?;

        self.conn.execute(
            UPDATE_CATEGORY,
            params![category.id, category.name, category.color, category.order],
        )?;
        Ok(true)
    }

    /// Deletes a category, moving its tasks to `reassign_to` or clearing
    /// their category when `None`.
    ///
    /// Returns `false` without changing anything for the `Default` category,
    /// an unknown id, or a reassignment target that does not exist (or is
    /// the category being deleted).
    pub fn delete(&self, id: &str, reassign_to: Option<&str>) -> DbResult<bool> {
        let Some(category) = self.get(id)? else {
            return Ok(false);
        };
        if category.is_default() {
            return Ok(false);
        }

        atomic(self.conn, |conn| {
            let categories = Categories::new(conn);
            if let Some(target) = reassign_to {
                if target == id || categories.get(target)?.is_none() {
                    return Ok(false);
                }
            }
            Tasks::new(conn).reassign_category(id, reassign_to)?;
            conn.execute(DELETE_CATEGORY, params![id])?;
            Ok(true)
        })
    }

    /// Assigns `0..n-1` in the order given.
    ///
    /// Returns `false` and writes nothing when any id is unknown.
    pub fn update_order(&self, ids: &[String]) -> DbResult<bool> {
        atomic(self.conn, |conn| {
            let categories = Categories::new(conn);
            for id in ids {
                if categories.get(id)?.is_none() {
                    return Ok(false);
                }
            }
            for (position, id) in ids.iter().enumerate() {
                conn.execute(UPDATE_ORDER, params![id, position as i64])?;
            }
            Ok(true)
        })
    }

    /// Recreates the protected category if it is missing. Returns `true`
    /// when a record was written.
    pub fn ensure_default(&self) -> DbResult<bool> {
        if self.get_by_name(DEFAULT_CATEGORY_NAME)?.is_some() {
            return Ok(false);
        }
        let category = Category {
            id: uuid::Uuid::new_v4().to_string(),
            name: DEFAULT_CATEGORY_NAME.to_string(),
            color: DEFAULT_CATEGORY_COLOR.to_string(),
            order: 0,
        };
        self.insert(&category)?;
        Ok(true)
    }

    pub(crate) fn clear(&self) -> DbResult<()> {
        self.conn.execute("DELETE FROM categories", [])?;
        Ok(())
    }

    fn next_order(&self) -> DbResult<i64> {
        let max: Option<i64> = self.conn.query_row("SELECT MAX(sort_order) FROM categories", [], |row| row.get(0))?;
        Ok(max.map(|m| m + 1).unwrap_or(0))
    }
}

fn validate(name: &str, color: &str) -> DbResult<()> {
    if name.is_empty() {
        return Err(DbError::validation("name", "must not be empty"));
    }
    if color.trim().is_empty() {
        return Err(DbError::validation("color", "must not be empty"));
    }
    Ok(())
}

fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        order: row.get(3)?,
    })
}
