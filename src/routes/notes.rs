use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    middleware,
    routing::{get, put},
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::PgPool;
use crate::errors::AppError;
use crate::models::note::{NewNote, Note};
use crate::models::tag::{NewTag, set_note_tags};
use crate::schema::note_tags::dsl::{note_id as link_note_id, note_tags};
use crate::schema::notes::dsl::{
    body as notes_body, created_at as notes_created_at, id as notes_id, notes as notes_table,
    title as notes_title, updated_at as notes_updated_at, user_id as notes_user_id,
};
use crate::security::auth::{AuthenticatedUser, authenticate};
use crate::security::json::ValidatedJson;

pub fn router() -> Router {
    Router::new()
        .route("/notes", get(list_notes).post(create_note))
        .route("/notes/:id", put(update_note).delete(delete_note))
        .layer(middleware::from_fn(authenticate))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct NotePayload {
    title: String,
    body: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl NotePayload {
    /// Splits the payload into a validated note and, when the `tags` key was
    /// supplied, a deduplicated set of normalized labels. A missing `tags`
    /// key leaves existing links untouched; an empty array clears them.
    fn into_parts(self, user_id: Uuid) -> Result<(NewNote, Option<Vec<NewTag>>), AppError> {
        let mut note = NewNote {
            user_id,
            title: self.title,
            body: self.body,
        };

        note.validate()
            .map_err(|err| AppError::Validation(err.to_string()))?;

        let tags = match self.tags {
            None => None,
            Some(labels) => {
                let mut new_tags = Vec::with_capacity(labels.len());
                for label in &labels {
                    new_tags.push(
                        NewTag::new(user_id, label)
                            .map_err(|err| AppError::Validation(err.to_string()))?,
                    );
                }
                new_tags.sort_by(|a, b| a.name.cmp(&b.name));
                new_tags.dedup_by(|a, b| a.name == b.name);
                Some(new_tags)
            }
        };

        Ok((note, tags))
    }
}

pub async fn list_notes(
    Extension(pool): Extension<PgPool>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Vec<Note>>, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let results = notes_table
        .filter(notes_user_id.eq(user_id))
        .order(notes_created_at.desc())
        .load::<Note>(&mut conn)
        .await
        .map_err(AppError::from_diesel)?;

    Ok(Json(results))
}

pub async fn create_note(
    Extension(pool): Extension<PgPool>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<NotePayload>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let (new_note, new_tags) = payload.into_parts(user_id)?;

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let note: Note = diesel::insert_into(notes_table)
        .values(&new_note)
        .get_result(&mut conn)
        .await
        .map_err(AppError::from_diesel)?;

    if let Some(tags) = new_tags {
        set_note_tags(&mut conn, user_id, note.id, &tags)
            .await
            .map_err(AppError::from_diesel)?;
    }

    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn update_note(
    Extension(pool): Extension<PgPool>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(note_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<NotePayload>,
) -> Result<Json<Note>, AppError> {
    let (validated, new_tags) = payload.into_parts(user_id)?;

    let current_time = Utc::now();

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let note: Note =
        diesel::update(notes_table.filter(notes_id.eq(note_id).and(notes_user_id.eq(user_id))))
            .set((
                notes_title.eq(validated.title),
                notes_body.eq(validated.body),
                notes_updated_at.eq(current_time),
            ))
            .get_result(&mut conn)
            .await
            .map_err(|err| match err {
                DieselError::NotFound => AppError::NotFound,
                other => AppError::from_diesel(other),
            })?;

    if let Some(tags) = new_tags {
        set_note_tags(&mut conn, user_id, note.id, &tags)
            .await
            .map_err(AppError::from_diesel)?;
    }

    Ok(Json(note))
}

pub async fn delete_note(
    Extension(pool): Extension<PgPool>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(note_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    // Tag links go first; the subquery keeps the delete owner-scoped so a
    // foreign note's links are never touched. The tags themselves stay for
    // the user's other notes.
    let owned_note = notes_table
        .filter(notes_id.eq(note_id).and(notes_user_id.eq(user_id)))
        .select(notes_id);
    diesel::delete(note_tags.filter(link_note_id.eq_any(owned_note)))
        .execute(&mut conn)
        .await
        .map_err(AppError::from_diesel)?;

    let affected =
        diesel::delete(notes_table.filter(notes_id.eq(note_id).and(notes_user_id.eq(user_id))))
            .execute(&mut conn)
            .await
            .map_err(AppError::from_diesel)?;

    if affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_normalizes_and_dedupes_tags() {
        let payload = NotePayload {
            title: "Standup".to_string(),
            body: "Notes from standup".to_string(),
            tags: Some(vec![
                "Work".to_string(),
                "work ".to_string(),
                "urgent".to_string(),
            ]),
        };

        let (_, tags) = payload.into_parts(Uuid::new_v4()).expect("valid payload");
        let names: Vec<String> = tags.unwrap().into_iter().map(|tag| tag.name).collect();
        assert_eq!(names, ["urgent", "work"]);
    }

    #[test]
    fn payload_without_tags_key_leaves_links_untouched() {
        let payload = NotePayload {
            title: "Standup".to_string(),
            body: "Notes".to_string(),
            tags: None,
        };

        let (_, tags) = payload.into_parts(Uuid::new_v4()).expect("valid payload");
        assert!(tags.is_none());
    }

    #[test]
    fn payload_rejects_invalid_tag_labels() {
        let payload = NotePayload {
            title: "Standup".to_string(),
            body: "Notes".to_string(),
            tags: Some(vec!["a,b".to_string()]),
        };

        assert!(payload.into_parts(Uuid::new_v4()).is_err());
    }

    #[test]
    fn payload_rejects_blank_title() {
        let payload = NotePayload {
            title: "   ".to_string(),
            body: "Notes".to_string(),
            tags: None,
        };

        assert!(payload.into_parts(Uuid::new_v4()).is_err());
    }
}
