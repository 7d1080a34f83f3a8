use rusqlite::types::Type;
use rusqlite::{params, Row};
use serde::de::DeserializeOwned;

use crate::db::models::{Attachment, FeedPost, PostStatus};
use crate::db::{constraint_violation, ConstraintViolation};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn feed_post_from_row(row: &Row<'_>) -> rusqlite::Result<FeedPost> {
    let status: String = row.get(4)?;
    let status = status
        .parse::<PostStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?;

    Ok(FeedPost {
        id: row.get(0)?,
        author_id: row.get(1)?,
        content: row.get(2)?,
        attachments: json_column(row, 3)?,
        status,
        likes: json_column(row, 5)?,
        comments: json_column(row, 6)?,
        created_at: row.get(7)?,
        full_name: row.get(8)?,
        user_type: row.get(9)?,
        profile_photo: row.get(10)?,
    })
}

/// Insert a post for `author_id`. Status comes from the column default and
/// likes/comments start empty.
pub fn insert(
    pool: &DbPool,
    author_id: i64,
    content: &str,
    attachments: &[Attachment],
) -> AppResult<i64> {
    let conn = pool.get()?;
    let attachments_json = serde_json::to_string(attachments)?;

    let result = conn.execute(
        "INSERT INTO posts (author_id, content, attachments, likes, comments)
         VALUES (?1, ?2, ?3, '[]', '[]')",
        params![author_id, content, attachments_json],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if constraint_violation(&e) == Some(ConstraintViolation::ForeignKey) => {
            Err(AppError::BadRequest("Unknown author".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Posts in `status` joined with their author, newest first.
pub fn list_by_status(pool: &DbPool, status: PostStatus) -> AppResult<Vec<FeedPost>> {
    let conn = pool.get()?;

    let mut stmt = conn.prepare(
        "SELECT p.id, p.author_id, p.content, p.attachments, p.status, p.likes, p.comments,
                p.created_at, u.full_name, u.user_type, u.profile_photo
         FROM posts p
         JOIN users u ON p.author_id = u.id
         WHERE p.status = ?1
         ORDER BY p.created_at DESC, p.id DESC",
    )?;

    let posts = stmt
        .query_map(params![status.as_str()], feed_post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(posts)
}

/// Mark a post approved whatever its current status. Unknown ids are a no-op.
pub fn approve(pool: &DbPool, id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE posts SET status = ?1 WHERE id = ?2",
        params![PostStatus::Approved.as_str(), id],
    )?;
    if changed == 0 {
        tracing::debug!("approve_post: no post with id {}", id);
    }
    Ok(())
}

pub fn delete(pool: &DbPool, id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::{self, NewUser};
    use crate::db::{create_memory_pool, run_migrations};

    fn pool_with_author() -> (DbPool, i64) {
        let pool = create_memory_pool().unwrap();
        run_migrations(&pool).unwrap();
        let author = users::insert(
            &pool,
            &NewUser {
                full_name: "Kip Keino",
                email: "kip@x.com",
                password_hash: "h",
                user_type: "Coach",
                sport: None,
                location: None,
                is_admin: false,
            },
        )
        .unwrap();
        (pool, author)
    }

    #[test]
    fn new_posts_are_pending_with_empty_lists() {
        let (pool, author) = pool_with_author();
        let id = insert(&pool, author, "hello", &[]).unwrap();

        let pending = list_by_status(&pool, PostStatus::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        let post = &pending[0];
        assert_eq!(post.id, id);
        assert_eq!(post.status, PostStatus::Pending);
        assert!(post.likes.is_empty());
        assert!(post.comments.is_empty());
        assert_eq!(post.full_name, "Kip Keino");
        assert_eq!(post.user_type, "Coach");

        assert!(list_by_status(&pool, PostStatus::Approved).unwrap().is_empty());
    }

    #[test]
    fn attachments_survive_storage() {
        let (pool, author) = pool_with_author();
        let attachment = Attachment {
            name: "track.jpg".into(),
            mime_type: "image/jpeg".into(),
            size: 4,
            data: "data:image/jpeg;base64,AAAA".into(),
        };
        insert(&pool, author, "race day", std::slice::from_ref(&attachment)).unwrap();

        let pending = list_by_status(&pool, PostStatus::Pending).unwrap();
        assert_eq!(pending[0].attachments, vec![attachment]);
    }

    #[test]
    fn unknown_author_is_rejected() {
        let (pool, _) = pool_with_author();
        let err = insert(&pool, 4242, "orphan", &[]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn approve_moves_post_to_feed() {
        let (pool, author) = pool_with_author();
        let id = insert(&pool, author, "hello", &[]).unwrap();
        approve(&pool, id).unwrap();

        let approved = list_by_status(&pool, PostStatus::Approved).unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].status, PostStatus::Approved);
        assert!(list_by_status(&pool, PostStatus::Pending).unwrap().is_empty());
    }

    #[test]
    fn approve_unknown_id_is_noop() {
        let (pool, _) = pool_with_author();
        approve(&pool, 999).unwrap();
    }

    #[test]
    fn rejected_posts_never_reach_feed() {
        let (pool, author) = pool_with_author();
        let id = insert(&pool, author, "spam", &[]).unwrap();
        pool.get()
            .unwrap()
            .execute("UPDATE posts SET status = 'rejected' WHERE id = ?1", params![id])
            .unwrap();

        assert!(list_by_status(&pool, PostStatus::Approved).unwrap().is_empty());
        assert!(list_by_status(&pool, PostStatus::Pending).unwrap().is_empty());
    }

    #[test]
    fn list_is_newest_first() {
        let (pool, author) = pool_with_author();
        let first = insert(&pool, author, "one", &[]).unwrap();
        let second = insert(&pool, author, "two", &[]).unwrap();

        let ids: Vec<i64> = list_by_status(&pool, PostStatus::Pending)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn deleting_author_cascades_to_posts() {
        let (pool, author) = pool_with_author();
        insert(&pool, author, "hello", &[]).unwrap();
        users::delete(&pool, author).unwrap();

        let remaining: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
