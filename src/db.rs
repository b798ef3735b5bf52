use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::models::{SavedJob, SubmissionRecord};

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS saved_jobs (
                job_id TEXT PRIMARY KEY,
                title TEXT,
                company TEXT,
                saved_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS submissions (
                application_id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL,
                fallback INTEGER NOT NULL DEFAULT 0,
                submitted_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_submissions_job ON submissions(job_id);
            "#,
        )?;
        Ok(())
    }

    // --- Saved jobs ---

    // Re-saving keeps known details unless new ones are given
    pub fn save_job(&self, job_id: &str, title: Option<&str>, company: Option<&str>) -> Result<()> {
        if job_id.trim().is_empty() {
            return Err(anyhow!("Job id must not be empty"));
        }
        self.conn.execute(
            "INSERT INTO saved_jobs (job_id, title, company) VALUES (?1, ?2, ?3)
             ON CONFLICT(job_id) DO UPDATE SET
                title = COALESCE(excluded.title, saved_jobs.title),
                company = COALESCE(excluded.company, saved_jobs.company)",
            params![job_id, title, company],
        )?;
        Ok(())
    }

    pub fn unsave_job(&self, job_id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM saved_jobs WHERE job_id = ?1", [job_id])?;
        Ok(removed > 0)
    }

    pub fn is_saved(&self, job_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM saved_jobs WHERE job_id = ?1",
            [job_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list_saved_jobs(&self) -> Result<Vec<SavedJob>> {
        let mut stmt = self.conn.prepare(
            "SELECT job_id, title, company, saved_at FROM saved_jobs
             ORDER BY saved_at DESC, job_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SavedJob {
                job_id: row.get(0)?,
                title: row.get(1)?,
                company: row.get(2)?,
                saved_at: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list saved jobs")
    }

    // --- Submissions ---

    pub fn record_submission(&self, application_id: &str, job_id: &str, fallback: bool) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO submissions (application_id, job_id, fallback)
             VALUES (?1, ?2, ?3)",
            params![application_id, job_id, fallback],
        )?;
        Ok(())
    }

    pub fn list_submissions(&self) -> Result<Vec<SubmissionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT application_id, job_id, fallback, submitted_at FROM submissions
             ORDER BY submitted_at DESC, application_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SubmissionRecord {
                application_id: row.get(0)?,
                job_id: row.get(1)?,
                fallback: row.get(2)?,
                submitted_at: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list submissions")
    }
}
