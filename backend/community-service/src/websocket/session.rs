use actix::{
    fut, Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler,
};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

use super::message_types::ChatFrame;
use super::{ConnectionRegistry, SubscriberId};
use crate::db::{room_repo, user_repo};
use crate::metrics::{CHAT_CONNECTIONS, CHAT_MESSAGES_TOTAL};
use crate::middleware::auth::{authenticate_token, request_token};
use crate::models::room::Message;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Frame fanned out to this connection by the registry
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct BroadcastMessage(String);

/// One participant's connection to a room
pub struct ChatSession {
    room_id: i64,
    group: String,
    user_id: i64,
    username: String,
    subscriber_id: SubscriberId,
    receiver: Option<UnboundedReceiver<String>>,
    registry: ConnectionRegistry,
    db: PgPool,
    hb: Instant,
}

impl ChatSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(
                    user_id = act.user_id,
                    group = %act.group,
                    "WebSocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Persist the frame as this user, then fan it out to the group
    fn relay(&self, frame: ChatFrame, ctx: &mut ws::WebsocketContext<Self>) {
        let db = self.db.clone();
        let registry = self.registry.clone();
        let group = self.group.clone();
        let room_id = self.room_id;
        let user_id = self.user_id;

        // wait() keeps frames from one connection in order
        ctx.wait(fut::wrap_future(async move {
            match store_and_broadcast(&db, &registry, &group, room_id, user_id, &frame.message)
                .await
            {
                Ok(_) => CHAT_MESSAGES_TOTAL.with_label_values(&["stored"]).inc(),
                Err(e) => {
                    CHAT_MESSAGES_TOTAL.with_label_values(&["failed"]).inc();
                    tracing::error!(room_id, user_id, error = %e, "Failed to store chat message");
                }
            }
        }));
    }
}

/// Store `content` as `user_id`'s message, then broadcast it to `group`
///
/// The broadcast frame names the stored author, whatever `user` the
/// client put in its frame. Nothing is sent if the insert fails.
pub async fn store_and_broadcast(
    db: &PgPool,
    registry: &ConnectionRegistry,
    group: &str,
    room_id: i64,
    user_id: i64,
    content: &str,
) -> Result<Message, sqlx::Error> {
    let stored = room_repo::insert_message(db, room_id, user_id, content).await?;
    match serde_json::to_string(&ChatFrame::from(&stored)) {
        Ok(payload) => registry.broadcast(group, payload).await,
        Err(e) => tracing::error!("Failed to encode chat frame: {}", e),
    }
    Ok(stored)
}

impl Actor for ChatSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            user = %self.username,
            group = %self.group,
            "WebSocket session started"
        );
        CHAT_CONNECTIONS.inc();

        self.hb(ctx);

        // Bridge the registry channel into this actor's mailbox
        if let Some(mut rx) = self.receiver.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    addr.do_send(BroadcastMessage(msg));
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            user = %self.username,
            group = %self.group,
            "WebSocket session stopped"
        );
        CHAT_CONNECTIONS.dec();

        let registry = self.registry.clone();
        let group = self.group.clone();
        let subscriber_id = self.subscriber_id;

        actix::spawn(async move {
            registry.remove_subscriber(&group, subscriber_id).await;
        });
    }
}

impl Handler<BroadcastMessage> for ChatSession {
    type Result = ();

    fn handle(&mut self, msg: BroadcastMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChatSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                match ChatFrame::parse(&text) {
                    Ok(frame) => self.relay(frame, ctx),
                    Err(e) => {
                        CHAT_MESSAGES_TOTAL.with_label_values(&["rejected"]).inc();
                        tracing::warn!(user_id = self.user_id, "Dropping chat frame: {}", e);
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!("WebSocket close message received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!("WebSocket protocol error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// `GET /ws/chat/{slug}/`: join a room's live chat
///
/// The token comes from `?token=`, a Bearer header or the session cookie.
/// Only the room's two participants may connect.
pub async fn chat_ws(
    req: HttpRequest,
    stream: web::Payload,
    pool: web::Data<PgPool>,
    registry: web::Data<ConnectionRegistry>,
    slug: web::Path<String>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let Some(token) = query.into_inner().token.or_else(|| request_token(&req)) else {
        tracing::warn!("WebSocket connection rejected: no token provided");
        return Ok(HttpResponse::Unauthorized().finish());
    };

    let identity = match authenticate_token(&token) {
        Ok(identity) => identity,
        Err(reason) => {
            tracing::warn!("WebSocket connection rejected: {}", reason);
            return Ok(HttpResponse::Unauthorized().finish());
        }
    };

    let Some(user) = user_repo::find_user_by_id(&pool, identity.user_id)
        .await
        .map_err(crate::error::AppError::from)?
    else {
        return Ok(HttpResponse::Unauthorized().finish());
    };

    let Some(room) = room_repo::find_room_by_slug(&pool, &slug)
        .await
        .map_err(crate::error::AppError::from)?
    else {
        return Ok(HttpResponse::NotFound().finish());
    };

    if !room.is_participant(user.id) {
        tracing::warn!(
            user_id = user.id,
            room = %room.slug,
            "WebSocket connection rejected: not a participant"
        );
        return Ok(HttpResponse::Forbidden().finish());
    }

    let group = room.group_name();
    let (subscriber_id, rx) = registry.add_subscriber(&group).await;

    let session = ChatSession {
        room_id: room.id,
        group: group.clone(),
        user_id: user.id,
        username: user.username,
        subscriber_id,
        receiver: Some(rx),
        registry: registry.get_ref().clone(),
        db: pool.get_ref().clone(),
        hb: Instant::now(),
    };

    match ws::start(session, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            registry.remove_subscriber(&group, subscriber_id).await;
            Err(e)
        }
    }
}
