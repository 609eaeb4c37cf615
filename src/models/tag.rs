use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{note_tags, notes, tags};

use super::{ModelValidationError, ValidationResult};

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = tags)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tags)]
pub struct NewTag {
    pub user_id: Uuid,
    pub name: String,
}

impl NewTag {
    /// Labels are stored trimmed and lowercased so "Work" and "work" resolve
    /// to the same tag for one user.
    pub fn new(user_id: Uuid, label: &str) -> ValidationResult<Self> {
        let name = label.trim().to_lowercase();
        ensure_valid_label(&name)?;
        Ok(Self { user_id, name })
    }
}

#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = note_tags)]
pub struct NoteTagLink {
    pub note_id: Uuid,
    pub tag_id: Uuid,
}

fn ensure_valid_label(value: &str) -> ValidationResult<()> {
    let len = value.chars().count();
    if len == 0 || len > 40 {
        return Err(ModelValidationError::InvalidTagLabel);
    }

    // Commas would corrupt the flattened tag-list rendering.
    if value.chars().any(|c| c == ',' || c.is_control()) {
        return Err(ModelValidationError::InvalidTagLabel);
    }

    Ok(())
}

/// The distinct tags used by one user's notes, ordered by name ascending.
/// The ordering is this helper's contract; callers render it as-is.
pub async fn distinct_user_tags(
    conn: &mut AsyncPgConnection,
    owner: Uuid,
) -> QueryResult<Vec<Tag>> {
    let owned_note_ids = notes::table
        .filter(notes::user_id.eq(owner))
        .select(notes::id);

    tags::table
        .inner_join(note_tags::table)
        .filter(note_tags::note_id.eq_any(owned_note_ids))
        .select((tags::id, tags::user_id, tags::name, tags::created_at))
        .distinct()
        .order(tags::name.asc())
        .load::<Tag>(conn)
        .await
}

/// Flattens a tag sequence into the comma-joined display form. Joining (as
/// opposed to append-then-trim) means an empty sequence yields an empty
/// string and there is never a trailing comma.
pub fn tag_list(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| tag.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Replaces a note's tag links with the given set: upserts the labels under
/// the owning user, deletes the old links, then inserts the new ones.
/// Callers must already have verified that `note_id` belongs to `owner`.
pub async fn set_note_tags(
    conn: &mut AsyncPgConnection,
    owner: Uuid,
    note_id: Uuid,
    new_tags: &[NewTag],
) -> QueryResult<()> {
    if !new_tags.is_empty() {
        diesel::insert_into(tags::table)
            .values(new_tags)
            .on_conflict((tags::user_id, tags::name))
            .do_nothing()
            .execute(conn)
            .await?;
    }

    diesel::delete(note_tags::table.filter(note_tags::note_id.eq(note_id)))
        .execute(conn)
        .await?;

    if new_tags.is_empty() {
        return Ok(());
    }

    let names: Vec<&str> = new_tags.iter().map(|tag| tag.name.as_str()).collect();
    let tag_ids: Vec<Uuid> = tags::table
        .filter(tags::user_id.eq(owner))
        .filter(tags::name.eq_any(names))
        .select(tags::id)
        .load(conn)
        .await?;

    let links: Vec<NoteTagLink> = tag_ids
        .into_iter()
        .map(|tag_id| NoteTagLink { note_id, tag_id })
        .collect();

    diesel::insert_into(note_tags::table)
        .values(&links)
        .on_conflict((note_tags::note_id, note_tags::tag_id))
        .do_nothing()
        .execute(conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> Tag {
        Tag {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tag_list_joins_without_trailing_comma() {
        let tags = vec![tag("urgent"), tag("work")];
        assert_eq!(tag_list(&tags), "urgent,work");
    }

    #[test]
    fn tag_list_of_empty_sequence_is_empty_string() {
        assert_eq!(tag_list(&[]), "");
    }

    #[test]
    fn tag_list_of_single_tag_has_no_separator() {
        assert_eq!(tag_list(&[tag("ideas")]), "ideas");
    }

    #[test]
    fn new_tag_normalizes_label() {
        let owner = Uuid::new_v4();
        let tag = NewTag::new(owner, "  Work ").expect("valid label");
        assert_eq!(tag.name, "work");
        assert_eq!(tag.user_id, owner);
    }

    #[test]
    fn new_tag_rejects_empty_and_comma_labels() {
        let owner = Uuid::new_v4();
        assert!(NewTag::new(owner, "   ").is_err());
        assert!(NewTag::new(owner, "a,b").is_err());
        assert!(NewTag::new(owner, &"x".repeat(41)).is_err());
    }
}
