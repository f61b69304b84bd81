//! Data Access Layer
//!
//! This module contains all the functions for interacting with the PostgreSQL database.
//! It uses `sqlx` with runtime-checked queries over a shared connection pool.
//! Learner profiles live in `users` with the nested learning profile and
//! mastery record stored as JSONB. Generated quizzes live in `quizzes`, a
//! persisted expiring store keyed by (user, topic, kind) so grading survives
//! process restarts without growing without bound.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use evocode_core::mastery::MasteryState;
use evocode_core::profile::LearningProfile;
use evocode_core::quiz::{MixedQuiz, QuizKind};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::debug;

/// A learner profile row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub user_id: String,
    pub user_name: String,
    pub goal: String,
    pub learning_profile: Json<LearningProfile>,
    pub mastery: Json<MasteryState>,
    pub onboarding_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts a new learner profile. Returns `false` when the user id is
    /// already taken (the row is left untouched).
    pub async fn create_user(
        &self,
        user_id: &str,
        user_name: &str,
        goal: &str,
        learning_profile: &LearningProfile,
        mastery: &MasteryState,
        onboarding_complete: bool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (user_id, user_name, goal, learning_profile, mastery, onboarding_complete)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(user_name)
        .bind(goal)
        .bind(Json(learning_profile))
        .bind(Json(mastery))
        .bind(onboarding_complete)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Retrieves a learner profile by id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT user_id, user_name, goal, learning_profile, mastery,
                   onboarding_complete, created_at, updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Persists a learner's updated mastery record and onboarding flag.
    pub async fn update_mastery(
        &self,
        user_id: &str,
        mastery: &MasteryState,
        onboarding_complete: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET mastery = $2, onboarding_complete = $3, updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(Json(mastery))
        .bind(onboarding_complete)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetches a stored quiz, ignoring rows past their expiry.
    pub async fn get_quiz(
        &self,
        user_id: &str,
        topic_id: &str,
        kind: QuizKind,
    ) -> Result<Option<MixedQuiz>> {
        let row = sqlx::query_scalar::<_, Json<MixedQuiz>>(
            r#"
            SELECT quiz
            FROM quizzes
            WHERE user_id = $1 AND topic_id = $2 AND kind = $3 AND expires_at > now()
            "#,
        )
        .bind(user_id)
        .bind(topic_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|json| json.0))
    }

    /// Stores a quiz with a fresh TTL, replacing any previous quiz under
    /// the same key. Expired rows are evicted opportunistically on the way.
    pub async fn put_quiz(
        &self,
        user_id: &str,
        topic_id: &str,
        kind: QuizKind,
        quiz: &MixedQuiz,
        ttl_secs: i64,
    ) -> Result<()> {
        self.evict_expired_quizzes().await?;

        let expires_at = Utc::now() + Duration::seconds(ttl_secs);
        sqlx::query(
            r#"
            INSERT INTO quizzes (user_id, topic_id, kind, quiz, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, topic_id, kind)
            DO UPDATE SET quiz = EXCLUDED.quiz, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(user_id)
        .bind(topic_id)
        .bind(kind.as_str())
        .bind(Json(quiz))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes quizzes past their expiry; returns how many were removed.
    pub async fn evict_expired_quizzes(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM quizzes WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        let evicted = result.rows_affected();
        if evicted > 0 {
            debug!(evicted, "expired quizzes evicted");
        }
        Ok(evicted)
    }
}
