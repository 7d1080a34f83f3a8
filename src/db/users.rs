use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::{User, UserSummary};
use crate::db::{constraint_violation, ConstraintViolation};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// Columns for a registration. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub user_type: &'a str,
    pub sport: Option<&'a str>,
    pub location: Option<&'a str>,
    pub is_admin: bool,
}

const USER_COLUMNS: &str = "id, full_name, email, user_type, sport, location, bio, \
                            profile_photo, is_admin, suspended, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        user_type: row.get(3)?,
        sport: row.get(4)?,
        location: row.get(5)?,
        bio: row.get(6)?,
        profile_photo: row.get(7)?,
        is_admin: row.get(8)?,
        suspended: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Insert a user and return the new id. A taken email is a `Conflict`.
pub fn insert(pool: &DbPool, user: &NewUser<'_>) -> AppResult<i64> {
    let conn = pool.get()?;

    let result = conn.execute(
        "INSERT INTO users (full_name, email, password_hash, user_type, sport, location, is_admin)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.full_name,
            user.email,
            user.password_hash,
            user.user_type,
            user.sport,
            user.location,
            user.is_admin,
        ],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if constraint_violation(&e) == Some(ConstraintViolation::Unique) => {
            Err(AppError::Conflict("Email already registered".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Look a user up by email, returning the record and its password hash.
pub fn find_credentials(pool: &DbPool, email: &str) -> AppResult<Option<(User, String)>> {
    let conn = pool.get()?;

    let found = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
            params![email],
            |row| Ok((user_from_row(row)?, row.get::<_, String>(11)?)),
        )
        .optional()?;

    Ok(found)
}

/// All users, newest first, without secrets.
pub fn list(pool: &DbPool) -> AppResult<Vec<UserSummary>> {
    let conn = pool.get()?;

    let mut stmt = conn.prepare(
        "SELECT id, full_name, email, user_type, sport, location, created_at, suspended
         FROM users
         ORDER BY created_at DESC, id DESC",
    )?;

    let users = stmt
        .query_map([], |row| {
            Ok(UserSummary {
                id: row.get(0)?,
                full_name: row.get(1)?,
                email: row.get(2)?,
                user_type: row.get(3)?,
                sport: row.get(4)?,
                location: row.get(5)?,
                created_at: row.get(6)?,
                suspended: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(users)
}

/// Remove a user. Posts, conversations and messages go with it through the
/// schema's cascades.
pub fn delete(pool: &DbPool, id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(())
}

/// Set the suspended flag. There is no way back.
pub fn suspend(pool: &DbPool, id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("UPDATE users SET suspended = 1 WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn count(pool: &DbPool) -> AppResult<i64> {
    let conn = pool.get()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

/// Make sure the configured admin account exists and carries the admin flag.
/// An existing account keeps its password.
pub fn ensure_admin(
    pool: &DbPool,
    full_name: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<i64> {
    let conn = pool.get()?;

    conn.execute(
        "INSERT INTO users (full_name, email, password_hash, user_type, is_admin)
         VALUES (?1, ?2, ?3, 'Admin', 1)
         ON CONFLICT(email) DO UPDATE SET is_admin = 1",
        params![full_name, email, password_hash],
    )?;

    let id: i64 = conn.query_row(
        "SELECT id FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;

    Ok(id)
}
