use axum::{Extension, Json, Router, extract::Query, routing::get};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use crate::db::PgPool;
use crate::errors::AppError;
use crate::models::note::Note;
use crate::models::tag::{Tag, distinct_user_tags, tag_list};
use crate::schema::notes;
use crate::security::auth::OptionalIdentity;

pub fn router() -> Router {
    Router::new().route("/", get(home_page))
}

const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    page: Option<i64>,
    per_page: Option<i64>,
}

/// The home page context. For anonymous callers the note list is empty and
/// the `tags`/`tagList` keys are absent from the JSON entirely.
#[derive(Debug, Serialize)]
pub struct HomeContext {
    object_list: Vec<Note>,
    count: i64,
    is_paginated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    per_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<Tag>>,
    #[serde(rename = "tagList", skip_serializing_if = "Option::is_none")]
    tag_list: Option<String>,
}

impl HomeContext {
    fn anonymous() -> Self {
        Self {
            object_list: Vec::new(),
            count: 0,
            is_paginated: false,
            page: None,
            per_page: None,
            tags: None,
            tag_list: None,
        }
    }
}

#[tracing::instrument(name = "home_page", skip(pool, identity, params))]
pub async fn home_page(
    Extension(pool): Extension<PgPool>,
    identity: OptionalIdentity,
    Query(params): Query<HomeQuery>,
) -> Result<Json<HomeContext>, AppError> {
    let Some(user_id) = identity.0 else {
        return Ok(Json(HomeContext::anonymous()));
    };

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let count: i64 = notes::table
        .filter(notes::user_id.eq(user_id))
        .count()
        .get_result(&mut conn)
        .await
        .map_err(AppError::from_diesel)?;

    let mut query = notes::table
        .filter(notes::user_id.eq(user_id))
        .order(notes::created_at.desc())
        .into_boxed();

    let per_page = params.per_page.map(|value| value.clamp(1, MAX_PER_PAGE));
    let page = params.page.unwrap_or(1).max(1);
    if let Some(window) = per_page {
        query = query.limit(window).offset((page - 1) * window);
    }

    let object_list: Vec<Note> = query
        .load(&mut conn)
        .await
        .map_err(AppError::from_diesel)?;

    let tags = distinct_user_tags(&mut conn, user_id)
        .await
        .map_err(AppError::from_diesel)?;
    let flattened = tag_list(&tags);

    Ok(Json(HomeContext {
        object_list,
        count,
        is_paginated: per_page.is_some_and(|window| count > window),
        page: per_page.map(|_| page),
        per_page,
        tags: Some(tags),
        tag_list: Some(flattened),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn tag(name: &str) -> Tag {
        Tag {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    fn authenticated_context(tags: Vec<Tag>) -> HomeContext {
        let flattened = tag_list(&tags);
        HomeContext {
            object_list: Vec::new(),
            count: 0,
            is_paginated: false,
            page: None,
            per_page: None,
            tags: Some(tags),
            tag_list: Some(flattened),
        }
    }

    #[test]
    fn anonymous_context_omits_tag_keys() {
        let value = serde_json::to_value(HomeContext::anonymous()).unwrap();

        assert_eq!(value["object_list"].as_array().unwrap().len(), 0);
        assert_eq!(value["count"], 0);
        assert!(value.get("tags").is_none());
        assert!(value.get("tagList").is_none());
    }

    #[test]
    fn authenticated_context_flattens_tags_without_trailing_comma() {
        let value =
            serde_json::to_value(authenticated_context(vec![tag("urgent"), tag("work")])).unwrap();

        assert_eq!(value["tagList"], "urgent,work");
        assert_eq!(value["tags"].as_array().unwrap().len(), 2);
        assert_eq!(value["tags"][0]["name"], "urgent");
    }

    #[test]
    fn authenticated_context_with_no_tags_has_empty_tag_list() {
        let value = serde_json::to_value(authenticated_context(Vec::new())).unwrap();

        assert_eq!(value["tagList"], "");
        assert_eq!(value["tags"].as_array().unwrap().len(), 0);
    }
}
