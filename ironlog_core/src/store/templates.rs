//! Template repository: templates and their suggested exercises.
//!
//! Templates owned by [`SYSTEM_OWNER`] are immutable here: `update` and
//! `delete` reject them. Only their usage metadata (favorite flag, usage
//! counter, last-used timestamp) changes, through the dedicated methods.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{
    ensure_valid, get_opt_ts, get_parsed, get_ts, get_u32, join_list, like_pattern, split_list,
    ts_to_sql, Atomic, Repository,
};
use crate::types::{Difficulty, TemplateCategory, TemplateExercise, WorkoutTemplate, SYSTEM_OWNER};
use crate::{Error, Result};

const TEMPLATE_COLUMNS: &str = "id, owner_id, name, description, category, difficulty, body_areas, \
     estimated_duration_minutes, is_favorite, usage_count, last_used_at, created_at, updated_at";

/// Listing order for templates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemplateSort {
    /// Creation order; the stable listing order recommendations tie-break on
    #[default]
    Listing,
    Name,
    /// Most used first
    Usage,
    /// Most recently used first; never-used templates last
    Recency,
}

impl TemplateSort {
    fn order_by(&self) -> &'static str {
        match self {
            TemplateSort::Listing => "ORDER BY created_at ASC, rowid ASC",
            TemplateSort::Name => "ORDER BY name COLLATE NOCASE ASC, rowid ASC",
            TemplateSort::Usage => "ORDER BY usage_count DESC, name COLLATE NOCASE ASC, rowid ASC",
            TemplateSort::Recency => {
                "ORDER BY last_used_at DESC NULLS LAST, created_at DESC, rowid ASC"
            }
        }
    }
}

/// Selection criteria for template listings
#[derive(Clone, Debug, Default)]
pub struct TemplateFilter {
    /// Templates visible to this user: the system's plus their own
    pub visible_to: Option<String>,
    pub system_only: bool,
    pub category: Option<TemplateCategory>,
    pub difficulty: Option<Difficulty>,
    pub favorites_only: bool,
    /// Case-insensitive substring of the name or description
    pub search: Option<String>,
    pub sort: TemplateSort,
}

impl TemplateFilter {
    pub fn visible_to(owner_id: impl Into<String>) -> Self {
        Self {
            visible_to: Some(owner_id.into()),
            ..Self::default()
        }
    }

    pub fn system() -> Self {
        Self {
            system_only: true,
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: TemplateCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn sorted_by(mut self, sort: TemplateSort) -> Self {
        self.sort = sort;
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(owner) = &self.visible_to {
            values.push(Value::Text(SYSTEM_OWNER.to_string()));
            values.push(Value::Text(owner.clone()));
            clauses.push(format!("owner_id IN (?{}, ?{})", values.len() - 1, values.len()));
        }
        if self.system_only {
            values.push(Value::Text(SYSTEM_OWNER.to_string()));
            clauses.push(format!("owner_id = ?{}", values.len()));
        }
        if let Some(category) = self.category {
            values.push(Value::Text(category.as_str().to_string()));
            clauses.push(format!("category = ?{}", values.len()));
        }
        if let Some(difficulty) = self.difficulty {
            values.push(Value::Text(difficulty.as_str().to_string()));
            clauses.push(format!("difficulty = ?{}", values.len()));
        }
        if self.favorites_only {
            clauses.push("is_favorite = 1".to_string());
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            values.push(Value::Text(like_pattern(term)));
            let n = values.len();
            clauses.push(format!(
                "(name LIKE ?{n} ESCAPE '\\' OR COALESCE(description, '') LIKE ?{n} ESCAPE '\\')"
            ));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// Repository over the `workout_templates` aggregate
pub struct TemplateRepository<'c> {
    conn: &'c Connection,
}

impl<'c> TemplateRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Number of seeded templates
    pub fn count_system(&self) -> Result<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM workout_templates WHERE owner_id = ?1",
            params![SYSTEM_OWNER],
            |r| r.get(0),
        )?;
        Ok(count.max(0) as u32)
    }

    pub fn set_favorite(&self, id: &str, favorite: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE workout_templates SET is_favorite = ?2 WHERE id = ?1",
            params![id, favorite],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("template {}", id)));
        }
        tracing::debug!(template_id = %id, favorite, "template favorite changed");
        Ok(())
    }

    /// Bump the usage counter and last-used timestamp
    pub fn record_usage(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE workout_templates SET usage_count = usage_count + 1, last_used_at = ?2
             WHERE id = ?1",
            params![id, ts_to_sql(&at)],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("template {}", id)));
        }
        tracing::debug!(template_id = %id, "template usage recorded");
        Ok(())
    }

    fn stored_owner(&self, id: &str) -> Result<Option<String>> {
        let owner = self
            .conn
            .query_row(
                "SELECT owner_id FROM workout_templates WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    fn load_exercises(&self, template: &mut WorkoutTemplate) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, exercise_id, exercise_name, body_areas, position, suggested_sets,
                    rep_min, rep_max, suggested_weight, rest_seconds, notes
             FROM template_exercises
             WHERE template_id = ?1
             ORDER BY position",
        )?;
        let rows = stmt.query_map(params![template.id], |row| {
            let body_areas: String = row.get(3)?;
            Ok(TemplateExercise {
                id: row.get(0)?,
                exercise_id: row.get(1)?,
                exercise_name: row.get(2)?,
                body_areas: split_list(&body_areas),
                position: get_u32(row, 4)?,
                suggested_sets: get_u32(row, 5)?,
                rep_min: get_u32(row, 6)?,
                rep_max: get_u32(row, 7)?,
                suggested_weight: row.get(8)?,
                rest_seconds: get_u32(row, 9)?,
                notes: row.get(10)?,
            })
        })?;
        template.exercises = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(())
    }
}

fn row_to_template(row: &Row<'_>) -> rusqlite::Result<WorkoutTemplate> {
    let body_areas: String = row.get(6)?;
    Ok(WorkoutTemplate {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: get_parsed(row, 4)?,
        difficulty: get_parsed(row, 5)?,
        body_areas: split_list(&body_areas),
        estimated_duration_minutes: get_u32(row, 7)?,
        is_favorite: row.get(8)?,
        usage_count: get_u32(row, 9)?,
        last_used_at: get_opt_ts(row, 10)?,
        created_at: get_ts(row, 11)?,
        updated_at: get_ts(row, 12)?,
        exercises: Vec::new(),
    })
}

fn insert_exercises(conn: &Connection, template: &WorkoutTemplate) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO template_exercises (id, template_id, exercise_id, exercise_name, body_areas,
                                         position, suggested_sets, rep_min, rep_max,
                                         suggested_weight, rest_seconds, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;
    for exercise in &template.exercises {
        stmt.execute(params![
            exercise.id,
            template.id,
            exercise.exercise_id,
            exercise.exercise_name,
            join_list(&exercise.body_areas),
            exercise.position,
            exercise.suggested_sets,
            exercise.rep_min,
            exercise.rep_max,
            exercise.suggested_weight,
            exercise.rest_seconds,
            exercise.notes,
        ])?;
    }
    Ok(())
}

impl Repository for TemplateRepository<'_> {
    type Aggregate = WorkoutTemplate;
    type Filter = TemplateFilter;

    fn save(&self, template: &WorkoutTemplate) -> Result<String> {
        ensure_valid(template.validate())?;
        if self.stored_owner(&template.id)?.is_some() {
            return Err(Error::Consistency(format!(
                "template {} already exists",
                template.id
            )));
        }

        let scope = Atomic::begin(self.conn)?;
        scope.conn().execute(
            "INSERT INTO workout_templates (id, owner_id, name, description, category, difficulty,
                                            body_areas, estimated_duration_minutes, is_favorite,
                                            usage_count, last_used_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                template.id,
                template.owner_id,
                template.name,
                template.description,
                template.category.as_str(),
                template.difficulty.as_str(),
                join_list(&template.body_areas),
                template.estimated_duration_minutes,
                template.is_favorite,
                template.usage_count,
                template.last_used_at.as_ref().map(ts_to_sql),
                ts_to_sql(&template.created_at),
                ts_to_sql(&template.updated_at),
            ],
        )?;
        insert_exercises(scope.conn(), template)?;
        scope.commit()?;

        tracing::debug!(template_id = %template.id, name = %template.name, "saved template");
        Ok(template.id.clone())
    }

    fn get(&self, id: &str) -> Result<Option<WorkoutTemplate>> {
        let sql = format!("SELECT {} FROM workout_templates WHERE id = ?1", TEMPLATE_COLUMNS);
        let template = self
            .conn
            .query_row(&sql, params![id], row_to_template)
            .optional()?;

        match template {
            Some(mut template) => {
                self.load_exercises(&mut template)?;
                Ok(Some(template))
            }
            None => Ok(None),
        }
    }

    fn list(&self, filter: &TemplateFilter) -> Result<Vec<WorkoutTemplate>> {
        let (where_sql, values) = filter.where_clause();
        let sql = format!(
            "SELECT {} FROM workout_templates {} {}",
            TEMPLATE_COLUMNS,
            where_sql,
            filter.sort.order_by()
        );

        let mut templates = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), row_to_template)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        for template in &mut templates {
            self.load_exercises(template)?;
        }
        Ok(templates)
    }

    fn update(&self, template: &WorkoutTemplate) -> Result<()> {
        ensure_valid(template.validate())?;
        match self.stored_owner(&template.id)? {
            None => return Err(Error::NotFound(format!("template {}", template.id))),
            Some(owner) if owner == SYSTEM_OWNER => {
                return Err(Error::Consistency(format!(
                    "system template {} cannot be modified",
                    template.id
                )))
            }
            Some(owner) if owner != template.owner_id => {
                return Err(Error::Consistency(format!(
                    "template {} cannot change owner",
                    template.id
                )))
            }
            Some(_) => {}
        }

        let scope = Atomic::begin(self.conn)?;
        scope.conn().execute(
            "UPDATE workout_templates SET name = ?2, description = ?3, category = ?4,
                    difficulty = ?5, body_areas = ?6, estimated_duration_minutes = ?7,
                    is_favorite = ?8, usage_count = ?9, last_used_at = ?10, updated_at = ?11
             WHERE id = ?1",
            params![
                template.id,
                template.name,
                template.description,
                template.category.as_str(),
                template.difficulty.as_str(),
                join_list(&template.body_areas),
                template.estimated_duration_minutes,
                template.is_favorite,
                template.usage_count,
                template.last_used_at.as_ref().map(ts_to_sql),
                ts_to_sql(&template.updated_at),
            ],
        )?;
        scope.conn().execute(
            "DELETE FROM template_exercises WHERE template_id = ?1",
            params![template.id],
        )?;
        insert_exercises(scope.conn(), template)?;
        scope.commit()?;

        tracing::debug!(template_id = %template.id, "replaced template");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        match self.stored_owner(id)? {
            None => return Ok(false),
            Some(owner) if owner == SYSTEM_OWNER => {
                return Err(Error::Consistency(format!(
                    "system template {} cannot be deleted",
                    id
                )))
            }
            Some(_) => {}
        }

        let scope = Atomic::begin(self.conn)?;
        scope
            .conn()
            .execute("DELETE FROM template_exercises WHERE template_id = ?1", params![id])?;
        let removed = scope
            .conn()
            .execute("DELETE FROM workout_templates WHERE id = ?1", params![id])?;
        scope.commit()?;

        tracing::debug!(template_id = %id, "deleted template");
        Ok(removed > 0)
    }
}
