use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned migrations for the authoring schema.
///
/// Version 1 creates courses with their teacher grants, lessons, cards, the
/// shared vocabulary, and the card/word annotation links.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if is_applied(pool, 1).await? {
        tracing::debug!("schema up to date");
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS course (
                id INTEGER PRIMARY KEY,
                level INTEGER NOT NULL CHECK (level >= 1),
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'DRAFT'
                    CHECK (status IN ('DRAFT', 'IN_REVIEW', 'APPROVED', 'PUBLISHED', 'ARCHIVED')),
                summary TEXT,
                description TEXT,
                thumbnail TEXT,
                updated_at TEXT NOT NULL
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS teacher_course (
                teacher_username TEXT NOT NULL,
                course_id INTEGER NOT NULL,
                PRIMARY KEY (teacher_username, course_id),
                FOREIGN KEY (course_id) REFERENCES course(id) ON DELETE CASCADE
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS lesson (
                id INTEGER PRIMARY KEY,
                course_id INTEGER NOT NULL,
                lesson_order INTEGER NOT NULL,
                title TEXT NOT NULL,
                audio TEXT NOT NULL DEFAULT '',
                summary TEXT,
                description TEXT,
                thumbnail TEXT,
                content TEXT,
                updated_at TEXT NOT NULL,
                UNIQUE (course_id, lesson_order),
                FOREIGN KEY (course_id) REFERENCES course(id) ON DELETE CASCADE
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS card (
                id INTEGER PRIMARY KEY,
                lesson_id INTEGER NOT NULL,
                card_order INTEGER NOT NULL,
                front_text TEXT NOT NULL,
                front_audio_uri TEXT,
                UNIQUE (lesson_id, card_order),
                FOREIGN KEY (lesson_id) REFERENCES lesson(id) ON DELETE CASCADE
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS word (
                id INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                definition TEXT NOT NULL,
                phonetic TEXT NOT NULL DEFAULT '',
                part_of_speech TEXT NOT NULL DEFAULT '',
                audio_uri TEXT,
                image_uri TEXT
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS card_word (
                card_id INTEGER NOT NULL,
                word_id INTEGER NOT NULL,
                word_order INTEGER NOT NULL,
                start_index INTEGER NOT NULL,
                end_index INTEGER NOT NULL CHECK (end_index > start_index),
                PRIMARY KEY (card_id, word_order),
                FOREIGN KEY (card_id) REFERENCES card(id) ON DELETE CASCADE,
                FOREIGN KEY (word_id) REFERENCES word(id) ON DELETE RESTRICT
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_word_text_nocase
                ON word (text COLLATE NOCASE);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_teacher_course_course
                ON teacher_course (course_id);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(1_i64)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(version = 1, "applied schema migration");

    Ok(())
}
