//! Canonical SQLite schema for ember.
//!
//! Two groups of tables live in the same database:
//! - engine tables (`incidents`, `status_posts`, `timeline_events`,
//!   `playbooks`, `playbook_members`) owned by the incident engine and
//!   dropped by a nuke
//! - directory mirror tables (`users`, `team_members`, `channels`,
//!   `channel_members`, `posts`) standing in for the chat platform, which
//!   is what lets visibility be evaluated inside SQL
//!
//! Checklists are stored as one JSON document per incident and rewritten
//! whole on every change.

/// Migration v1: directory mirror plus incidents, status posts and timeline.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    nuked_at INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    is_bot INTEGER NOT NULL DEFAULT 0 CHECK (is_bot IN (0, 1)),
    create_at INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS team_members (
    team_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    PRIMARY KEY (team_id, user_id)
);

CREATE TABLE IF NOT EXISTS channels (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    name TEXT NOT NULL,
    display_name TEXT NOT NULL,
    channel_type TEXT NOT NULL CHECK (channel_type IN ('O', 'P')),
    create_at INTEGER NOT NULL DEFAULT 0,
    UNIQUE (team_id, name)
);

CREATE TABLE IF NOT EXISTS channel_members (
    channel_id TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    PRIMARY KEY (channel_id, user_id)
);

CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY,
    channel_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    message TEXT NOT NULL,
    create_at INTEGER NOT NULL,
    delete_at INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS incidents (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    description TEXT NOT NULL DEFAULT '',
    owner_user_id TEXT NOT NULL,
    reporter_user_id TEXT NOT NULL,
    team_id TEXT NOT NULL,
    channel_id TEXT NOT NULL,
    create_at INTEGER NOT NULL,
    end_at INTEGER NOT NULL DEFAULT 0,
    delete_at INTEGER NOT NULL DEFAULT 0,
    post_id TEXT NOT NULL DEFAULT '',
    playbook_id TEXT NOT NULL DEFAULT '',
    current_status TEXT NOT NULL
        CHECK (current_status IN ('Reported', 'Active', 'Resolved', 'Archived')),
    last_status_update_at INTEGER NOT NULL DEFAULT 0,
    checklists_json TEXT NOT NULL DEFAULT '[]',
    config_json TEXT NOT NULL DEFAULT '{}',
    retrospective TEXT NOT NULL DEFAULT '',
    retrospective_published_at INTEGER NOT NULL DEFAULT 0,
    retrospective_was_canceled INTEGER NOT NULL DEFAULT 0
        CHECK (retrospective_was_canceled IN (0, 1)),
    retrospective_reminder_interval_seconds INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS status_posts (
    incident_id TEXT NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
    post_id TEXT NOT NULL,
    status TEXT NOT NULL,
    PRIMARY KEY (incident_id, post_id)
);

CREATE TABLE IF NOT EXISTS timeline_events (
    id TEXT PRIMARY KEY,
    incident_id TEXT NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
    create_at INTEGER NOT NULL,
    delete_at INTEGER NOT NULL DEFAULT 0,
    event_at INTEGER NOT NULL,
    event_type TEXT NOT NULL CHECK (length(event_type) > 0),
    summary TEXT NOT NULL DEFAULT '',
    details TEXT NOT NULL DEFAULT '',
    post_id TEXT NOT NULL DEFAULT '',
    subject_user_id TEXT NOT NULL DEFAULT '',
    creator_user_id TEXT NOT NULL DEFAULT ''
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_incidents_live_channel
    ON incidents(channel_id) WHERE delete_at = 0;
CREATE INDEX IF NOT EXISTS idx_incidents_team_status
    ON incidents(team_id, current_status);
CREATE INDEX IF NOT EXISTS idx_incidents_create_at
    ON incidents(create_at);
CREATE INDEX IF NOT EXISTS idx_timeline_incident_event_at
    ON timeline_events(incident_id, event_at);
CREATE INDEX IF NOT EXISTS idx_channel_members_user
    ON channel_members(user_id);
CREATE INDEX IF NOT EXISTS idx_posts_channel
    ON posts(channel_id, create_at);
";

/// Migration v2: playbook templates and their member lists.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS playbooks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT NOT NULL DEFAULT '',
    team_id TEXT NOT NULL,
    create_public_incident INTEGER NOT NULL DEFAULT 0
        CHECK (create_public_incident IN (0, 1)),
    create_at INTEGER NOT NULL,
    delete_at INTEGER NOT NULL DEFAULT 0,
    num_steps INTEGER NOT NULL DEFAULT 0,
    checklists_json TEXT NOT NULL DEFAULT '[]',
    config_json TEXT NOT NULL DEFAULT '{}',
    retrospective_template TEXT NOT NULL DEFAULT '',
    retrospective_reminder_interval_seconds INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS playbook_members (
    playbook_id TEXT NOT NULL REFERENCES playbooks(id) ON DELETE CASCADE,
    member_id TEXT NOT NULL,
    PRIMARY KEY (playbook_id, member_id)
);

CREATE INDEX IF NOT EXISTS idx_playbooks_team
    ON playbooks(team_id, delete_at);
CREATE INDEX IF NOT EXISTS idx_incidents_playbook
    ON incidents(playbook_id);
";

/// Migration v3: case-folded incident names for search.
///
/// SQLite's `LOWER()` folds ASCII only, so `name_lower` is written from
/// Rust on every insert and update; rows older than v3 are backfilled by
/// the migration runner.
pub const MIGRATION_V3_SQL: &str = r"
ALTER TABLE incidents ADD COLUMN name_lower TEXT NOT NULL DEFAULT '';

CREATE INDEX IF NOT EXISTS idx_incidents_name_lower
    ON incidents(name_lower);
";

/// Tables owned by the engine. A nuke drops exactly these.
pub const ENGINE_TABLES: &[&str] = &[
    "playbook_members",
    "status_posts",
    "timeline_events",
    "incidents",
    "playbooks",
];

/// Indexes expected after all migrations have run.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_incidents_live_channel",
    "idx_incidents_team_status",
    "idx_incidents_create_at",
    "idx_timeline_incident_event_at",
    "idx_channel_members_user",
    "idx_posts_channel",
    "idx_playbooks_team",
    "idx_incidents_playbook",
    "idx_incidents_name_lower",
];
