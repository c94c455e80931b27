use chrono::Utc;
use diesel::{dsl::count_star, prelude::*};
use uuid::Uuid;

use crate::models::{NewUser, User};
use crate::schema::users;

pub fn find_by_email(conn: &mut PgConnection, email: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::email.eq(email))
        .first(conn)
        .optional()
}

pub fn find_by_id(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<User>> {
    users::table.find(user_id).first(conn).optional()
}

pub fn insert(conn: &mut PgConnection, new_user: &NewUser) -> QueryResult<User> {
    diesel::insert_into(users::table)
        .values(new_user)
        .get_result(conn)
}

pub fn list_all(conn: &mut PgConnection) -> QueryResult<Vec<User>> {
    users::table.order(users::created_at.desc()).load(conn)
}

pub fn set_role_by_email(
    conn: &mut PgConnection,
    email: &str,
    role: &str,
) -> QueryResult<Option<User>> {
    diesel::update(users::table.filter(users::email.eq(email)))
        .set((users::role.eq(role), users::updated_at.eq(Utc::now())))
        .get_result(conn)
        .optional()
}

pub fn set_email_notifications(
    conn: &mut PgConnection,
    user_id: Uuid,
    enabled: bool,
) -> QueryResult<User> {
    diesel::update(users::table.find(user_id))
        .set((
            users::email_notifications.eq(enabled),
            users::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)
}

pub fn count(conn: &mut PgConnection) -> QueryResult<i64> {
    users::table.select(count_star()).first(conn)
}
