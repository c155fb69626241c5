/// Chat rooms between two members
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::db::{room_repo, user_repo};
use crate::error::{AppError, Result};
use crate::forms::FormData;
use crate::metrics;
use crate::middleware::CurrentUser;

use super::{found, see_other, validate_form};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Room name is required (at most 255 characters)."))]
    pub room_name: String,
    /// Username of the member being contacted
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub post_author: String,
}

/// `GET /rooms/`
pub async fn list(pool: web::Data<PgPool>, CurrentUser(user): CurrentUser) -> Result<HttpResponse> {
    let rooms = room_repo::list_rooms_for_user(pool.get_ref(), user.id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "page": "rooms/list",
        "user": user.username,
        "rooms": rooms,
        "form": { "fields": ["room_name", "post_author"] },
    })))
}

/// `POST /rooms/create_room/`: the requester becomes the chat initiator
pub async fn create_room(
    pool: web::Data<PgPool>,
    CurrentUser(user): CurrentUser,
    form: FormData<CreateRoomForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    validate_form(&form)?;

    let author = user_repo::find_user_by_username(pool.get_ref(), form.post_author.trim())
        .await?
        .ok_or_else(|| AppError::field("post_author", "No member with that username."))?;
    if author.id == user.id {
        return Err(AppError::field("post_author", "You cannot open a chat with yourself."));
    }

    let room = room_repo::create_room(pool.get_ref(), form.room_name.trim(), user.id, author.id).await?;

    metrics::record_created("rooms", "room");
    tracing::info!(room_id = room.id, slug = %room.slug, initiator = user.id, author = author.id, "Room created");
    Ok(see_other(format!("/rooms/{}/", room.id)))
}

/// `GET /rooms/{id}/`: participants only
pub async fn room(
    pool: web::Data<PgPool>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let room = found(room_repo::find_room(pool.get_ref(), path.into_inner()).await?, "Room")?;
    if !room.is_participant(user.id) {
        return Err(AppError::Authorization(
            "You are not a participant of this room".to_string(),
        ));
    }
    let messages = room_repo::room_history(pool.get_ref(), room.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "rooms/room",
        "user": user.username,
        "room": room,
        "websocket_path": format!("/ws/chat/{}/", room.slug),
        "messages": messages,
    })))
}
