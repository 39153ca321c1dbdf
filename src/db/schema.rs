//! Database schema and migrations for docpool.
//!
//! Migrations are applied in order when the database is opened; the
//! `schema_version` table records which ones already ran.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: users, resolved from the identity provider on each authentication
    r#"
CREATE TABLE users (
    id              TEXT PRIMARY KEY,            -- identity provider subject
    email           TEXT NOT NULL,
    display_name    TEXT NOT NULL,
    role            TEXT NOT NULL DEFAULT 'user', -- 'user' | 'admin'
    created_at      TEXT NOT NULL DEFAULT (datetime('now')),
    last_login      TEXT
);

CREATE INDEX idx_users_email ON users(email);
"#,
    // v2: storage account pool
    r#"
CREATE TABLE storage_accounts (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_email             TEXT NOT NULL,
    access_credential       TEXT NOT NULL,
    refresh_credential      TEXT,
    is_active               INTEGER NOT NULL DEFAULT 1,
    used_capacity_bytes     INTEGER NOT NULL DEFAULT 0,
    total_capacity_bytes    INTEGER NOT NULL DEFAULT 0,
    reserved_bytes          INTEGER NOT NULL DEFAULT 0,
    added_at                TEXT NOT NULL DEFAULT (datetime('now')),
    last_checked_at         TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_storage_accounts_active ON storage_accounts(is_active);
"#,
    // v3: documents and their read ACL
    r#"
CREATE TABLE documents (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    mime_type       TEXT NOT NULL,
    size_bytes      INTEGER NOT NULL,
    owner_id        TEXT NOT NULL REFERENCES users(id),
    account_id      INTEGER NOT NULL REFERENCES storage_accounts(id),
    storage_path    TEXT NOT NULL,
    download_url    TEXT NOT NULL,
    checksum        TEXT NOT NULL,
    uploaded_at     TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_documents_owner ON documents(owner_id);
CREATE INDEX idx_documents_account ON documents(account_id);

CREATE TABLE document_shares (
    document_id     INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    email           TEXT NOT NULL,
    shared_at       TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (document_id, email)
);

CREATE INDEX idx_document_shares_email ON document_shares(email);
"#,
];
