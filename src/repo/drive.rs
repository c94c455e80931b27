use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::models::{
    DriveFileRecord, DriveFolder, DriveToken, NewDriveFileRecord, NewDriveFolder, NewDriveToken,
};
use crate::schema::{drive_files, drive_folders, drive_tokens};

pub fn list_folders(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<DriveFolder>> {
    drive_folders::table
        .filter(drive_folders::connected_by.eq(user_id))
        .order(drive_folders::created_at.desc())
        .load(conn)
}

pub fn upsert_folder(conn: &mut PgConnection, folder: &NewDriveFolder) -> QueryResult<DriveFolder> {
    diesel::insert_into(drive_folders::table)
        .values(folder)
        .on_conflict((drive_folders::connected_by, drive_folders::drive_folder_id))
        .do_update()
        .set((
            drive_folders::name.eq(&folder.name),
            drive_folders::web_view_link.eq(&folder.web_view_link),
            drive_folders::shared.eq(folder.shared),
            drive_folders::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)
}

/// Makes `folder_id` the single active folder of `user_id`.
///
/// Returns `None` when the folder does not exist or belongs to someone else.
pub fn activate_folder(
    conn: &mut PgConnection,
    user_id: Uuid,
    folder_id: Uuid,
) -> QueryResult<Option<DriveFolder>> {
    conn.transaction(|conn| {
        let owned = drive_folders::table
            .filter(drive_folders::id.eq(folder_id))
            .filter(drive_folders::connected_by.eq(user_id))
            .first::<DriveFolder>(conn)
            .optional()?;
        if owned.is_none() {
            return Ok(None);
        }

        let now = Utc::now();
        diesel::update(
            drive_folders::table
                .filter(drive_folders::connected_by.eq(user_id))
                .filter(drive_folders::is_active.eq(true)),
        )
        .set((
            drive_folders::is_active.eq(false),
            drive_folders::updated_at.eq(now),
        ))
        .execute(conn)?;

        let activated = diesel::update(drive_folders::table.find(folder_id))
            .set((
                drive_folders::is_active.eq(true),
                drive_folders::updated_at.eq(now),
            ))
            .get_result::<DriveFolder>(conn)?;

        Ok::<_, diesel::result::Error>(Some(activated))
    })
}

pub fn deactivate_all(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<usize> {
    diesel::update(
        drive_folders::table
            .filter(drive_folders::connected_by.eq(user_id))
            .filter(drive_folders::is_active.eq(true)),
    )
    .set((
        drive_folders::is_active.eq(false),
        drive_folders::updated_at.eq(Utc::now()),
    ))
    .execute(conn)
}

pub fn active_folder(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<DriveFolder>> {
    drive_folders::table
        .filter(drive_folders::connected_by.eq(user_id))
        .filter(drive_folders::is_active.eq(true))
        .first(conn)
        .optional()
}

/// Synced files of a folder that carry extracted content.
pub fn brand_files(conn: &mut PgConnection, folder_id: Uuid) -> QueryResult<Vec<DriveFileRecord>> {
    drive_files::table
        .filter(drive_files::drive_folder_id.eq(folder_id))
        .filter(drive_files::content.is_not_null())
        .order(drive_files::name.asc())
        .load(conn)
}

pub fn replace_folder_files(
    conn: &mut PgConnection,
    folder_id: Uuid,
    files: &[NewDriveFileRecord],
) -> QueryResult<usize> {
    conn.transaction(|conn| {
        diesel::delete(drive_files::table.filter(drive_files::drive_folder_id.eq(folder_id)))
            .execute(conn)?;
        if files.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(drive_files::table)
            .values(files)
            .execute(conn)
    })
}

pub fn get_tokens(
    conn: &mut PgConnection,
    user_id: Uuid,
    provider: &str,
) -> QueryResult<Option<DriveToken>> {
    drive_tokens::table
        .filter(drive_tokens::user_id.eq(user_id))
        .filter(drive_tokens::provider.eq(provider))
        .first(conn)
        .optional()
}

/// Stores fresh OAuth tokens. A missing refresh token keeps the stored one.
pub fn upsert_tokens(
    conn: &mut PgConnection,
    user_id: Uuid,
    provider: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> QueryResult<DriveToken> {
    conn.transaction(|conn| {
        let existing = drive_tokens::table
            .filter(drive_tokens::user_id.eq(user_id))
            .filter(drive_tokens::provider.eq(provider))
            .for_update()
            .first::<DriveToken>(conn)
            .optional()?;

        match existing {
            Some(current) => {
                let refresh_token = refresh_token
                    .map(str::to_string)
                    .or(current.refresh_token);
                diesel::update(drive_tokens::table.find(current.id))
                    .set((
                        drive_tokens::access_token.eq(access_token),
                        drive_tokens::refresh_token.eq(refresh_token),
                        drive_tokens::expires_at.eq(expires_at),
                        drive_tokens::updated_at.eq(Utc::now()),
                    ))
                    .get_result(conn)
            }
            None => {
                let new_token = NewDriveToken {
                    id: Uuid::new_v4(),
                    user_id,
                    provider: provider.to_string(),
                    access_token: access_token.to_string(),
                    refresh_token: refresh_token.map(str::to_string),
                    expires_at,
                };
                diesel::insert_into(drive_tokens::table)
                    .values(&new_token)
                    .get_result(conn)
            }
        }
    })
}

pub fn update_access_token(
    conn: &mut PgConnection,
    token_id: Uuid,
    access_token: &str,
    expires_at: Option<DateTime<Utc>>,
) -> QueryResult<DriveToken> {
    diesel::update(drive_tokens::table.find(token_id))
        .set((
            drive_tokens::access_token.eq(access_token),
            drive_tokens::expires_at.eq(expires_at),
            drive_tokens::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)
}
