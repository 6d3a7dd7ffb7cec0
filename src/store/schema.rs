pub const SCHEMA: &str = r#"
-- Users own photos; refresh tokens are auth credentials for users
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,  -- stored lowercase
    password_hash TEXT NOT NULL, -- argon2id hash with embedded salt
    created_at TEXT DEFAULT (datetime('now')),
    modified_at TEXT DEFAULT (datetime('now')),
    created_by TEXT,
    modified_by TEXT
);

-- Refresh tokens: one row per issued token, never mutated in place
-- except for the single terminal revocation write
CREATE TABLE IF NOT EXISTS refresh_tokens (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token TEXT NOT NULL UNIQUE,  -- 256-bit random value, base64url

    -- Lifecycle: 'active' or 'revoked'; expiry is computed at read time
    state TEXT NOT NULL DEFAULT 'active',
    expires_at TEXT NOT NULL,
    revoked_at TEXT,

    created_at TEXT DEFAULT (datetime('now')),
    modified_at TEXT DEFAULT (datetime('now')),
    created_by TEXT,
    modified_by TEXT
);

-- Photos
CREATE TABLE IF NOT EXISTS photos (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    file_name TEXT NOT NULL,     -- opaque byte-storage reference
    original_file_name TEXT NOT NULL,
    content_type TEXT NOT NULL,
    title TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    modified_at TEXT DEFAULT (datetime('now')),
    created_by TEXT,
    modified_by TEXT
);

-- Share grants: at most one row per (photo, grantee)
CREATE TABLE IF NOT EXISTS share_grants (
    photo_id TEXT NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
    grantee_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    modified_at TEXT DEFAULT (datetime('now')),
    created_by TEXT,
    modified_by TEXT,
    PRIMARY KEY (photo_id, grantee_id)
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_refresh_tokens_token ON refresh_tokens(token);
CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_photos_owner ON photos(owner_id);
CREATE INDEX IF NOT EXISTS idx_share_grants_grantee ON share_grants(grantee_id);
"#;
