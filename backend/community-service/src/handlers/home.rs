use actix_web::HttpResponse;
use serde_json::json;

use crate::middleware::{CurrentUser, OptionalUser};
use crate::models::user::UserSummary;

/// Sections linked from the landing and home pages
const SECTIONS: &[(&str, &str)] = &[
    ("parenting", "/parenting/"),
    ("laika", "/laika/"),
    ("marketplace", "/marketplace/"),
    ("tennis", "/tennis/"),
    ("rooms", "/rooms/"),
];

fn sections() -> serde_json::Value {
    SECTIONS
        .iter()
        .map(|(name, path)| json!({ "name": name, "path": path }))
        .collect()
}

/// `GET /`: anonymous visitors get sign-in links
pub async fn landing(OptionalUser(user): OptionalUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "page": "landing",
        "user": user.as_ref().map(UserSummary::from),
        "signin": "/accounts/signin/",
        "signup": "/accounts/signup/",
        "sections": sections(),
    }))
}

/// `GET /home/`
pub async fn home(CurrentUser(user): CurrentUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "page": "home",
        "user": UserSummary::from(&user),
        "sections": sections(),
    }))
}
