//! v001 -- Initial schema creation.
//!
//! Workouts, templates, personal workouts and personal records, each with
//! their child tables.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Workouts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS workouts (
    id                       TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    owner_id                 TEXT NOT NULL,
    name                     TEXT NOT NULL,
    body_areas               TEXT NOT NULL DEFAULT '',   -- comma-delimited
    planned_duration_minutes INTEGER,
    created_at               TEXT NOT NULL,              -- RFC-3339
    started_at               TEXT,
    completed_at             TEXT,
    status                   TEXT NOT NULL
        CHECK (status IN ('planned', 'in_progress', 'completed', 'cancelled')),
    notes                    TEXT,
    source_template_id       TEXT,
    source_user_workout_id   TEXT
);

CREATE INDEX IF NOT EXISTS idx_workouts_owner_session
    ON workouts(owner_id, COALESCE(completed_at, started_at, created_at));

CREATE TABLE IF NOT EXISTS workout_exercises (
    id            TEXT PRIMARY KEY NOT NULL,
    workout_id    TEXT NOT NULL,
    exercise_id   TEXT NOT NULL,
    exercise_name TEXT NOT NULL,
    body_areas    TEXT NOT NULL DEFAULT '',
    position      INTEGER NOT NULL,
    notes         TEXT,

    UNIQUE (workout_id, position),
    FOREIGN KEY (workout_id) REFERENCES workouts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS workout_sets (
    id                  TEXT PRIMARY KEY NOT NULL,
    workout_exercise_id TEXT NOT NULL,
    set_number          INTEGER NOT NULL CHECK (set_number >= 1),
    weight              REAL NOT NULL CHECK (weight >= 0),
    reps                INTEGER NOT NULL CHECK (reps >= 0),
    completed           INTEGER NOT NULL DEFAULT 0,
    completed_at        TEXT,
    rest_seconds        INTEGER,

    UNIQUE (workout_exercise_id, set_number),
    FOREIGN KEY (workout_exercise_id) REFERENCES workout_exercises(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Templates
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS workout_templates (
    id                         TEXT PRIMARY KEY NOT NULL,
    owner_id                   TEXT NOT NULL,            -- 'system' for seeded templates
    name                       TEXT NOT NULL,
    description                TEXT,
    category                   TEXT NOT NULL,
    difficulty                 TEXT NOT NULL,
    body_areas                 TEXT NOT NULL DEFAULT '',
    estimated_duration_minutes INTEGER NOT NULL DEFAULT 0,
    is_favorite                INTEGER NOT NULL DEFAULT 0,
    usage_count                INTEGER NOT NULL DEFAULT 0,
    last_used_at               TEXT,
    created_at                 TEXT NOT NULL,
    updated_at                 TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_templates_owner ON workout_templates(owner_id);

CREATE TABLE IF NOT EXISTS template_exercises (
    id               TEXT PRIMARY KEY NOT NULL,
    template_id      TEXT NOT NULL,
    exercise_id      TEXT NOT NULL,
    exercise_name    TEXT NOT NULL,
    body_areas       TEXT NOT NULL DEFAULT '',
    position         INTEGER NOT NULL,
    suggested_sets   INTEGER NOT NULL,
    rep_min          INTEGER NOT NULL,
    rep_max          INTEGER NOT NULL,
    suggested_weight REAL,
    rest_seconds     INTEGER NOT NULL,
    notes            TEXT,

    UNIQUE (template_id, position),
    FOREIGN KEY (template_id) REFERENCES workout_templates(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Personal workouts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS user_workouts (
    id                 TEXT PRIMARY KEY NOT NULL,
    owner_id           TEXT NOT NULL,
    name               TEXT NOT NULL,
    description        TEXT,
    source_template_id TEXT,                             -- no FK: templates may be deleted
    source             TEXT NOT NULL,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_user_workouts_owner ON user_workouts(owner_id);

CREATE TABLE IF NOT EXISTS user_exercises (
    id                   TEXT PRIMARY KEY NOT NULL,
    user_workout_id      TEXT NOT NULL,
    exercise_id          TEXT NOT NULL,
    exercise_name        TEXT NOT NULL,
    body_areas           TEXT NOT NULL DEFAULT '',
    position             INTEGER NOT NULL,
    sets                 INTEGER NOT NULL,
    rep_min              INTEGER NOT NULL,
    rep_max              INTEGER NOT NULL,
    weight               REAL,
    rest_seconds         INTEGER NOT NULL,
    notes                TEXT,
    is_from_template     INTEGER NOT NULL DEFAULT 0,
    template_exercise_id TEXT,

    UNIQUE (user_workout_id, position),
    FOREIGN KEY (user_workout_id) REFERENCES user_workouts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS user_workout_customizations (
    user_workout_id TEXT NOT NULL,
    seq             INTEGER NOT NULL,
    kind            TEXT NOT NULL,
    exercise_id     TEXT NOT NULL,
    payload         TEXT NOT NULL,                       -- JSON CustomizationEvent
    recorded_at     TEXT NOT NULL,

    PRIMARY KEY (user_workout_id, seq),
    FOREIGN KEY (user_workout_id) REFERENCES user_workouts(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Personal records
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS personal_records (
    id              TEXT PRIMARY KEY NOT NULL,
    owner_id        TEXT NOT NULL,
    exercise_id     TEXT NOT NULL,
    exercise_name   TEXT NOT NULL,
    kind            TEXT NOT NULL
        CHECK (kind IN ('max_weight', 'max_volume', 'max_reps')),
    value           REAL NOT NULL,
    secondary_value REAL,
    achieved_at     TEXT NOT NULL,
    workout_id      TEXT,
    is_current      INTEGER NOT NULL DEFAULT 1
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_records_one_current
    ON personal_records(owner_id, exercise_id, kind) WHERE is_current = 1;

CREATE INDEX IF NOT EXISTS idx_records_owner_exercise
    ON personal_records(owner_id, exercise_id);
"#;

/// Apply the v001 migration.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
