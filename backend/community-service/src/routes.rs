/// URL table for community-service
///
/// Resource order inside a scope matters: literal segments such as
/// `create/` are registered before `{id}/` so they are never parsed as ids.
use actix_middleware::metrics_handler;
use actix_web::web;

use crate::error::AppError;
use crate::handlers::{
    accounts, api, health, home, laika, marketplace, parenting, rooms, tennis, test_posts,
};
use crate::media::serve_media;
use crate::middleware::AuthGuard;
use crate::websocket::session::chat_ws;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|_, _| AppError::NotFound("Not found".to_string()).into()),
    )
    .route("/metrics", web::get().to(metrics_handler))
    .route("/health", web::get().to(health::health))
    .route("/health/ready", web::get().to(health::readiness))
    .route("/health/live", web::get().to(health::liveness))
    .route("/media/{tail:.*}", web::get().to(serve_media))
    .route("/ws/chat/{slug}/", web::get().to(chat_ws))
    .route("/", web::get().to(home::landing))
    .service(
        web::resource("/home/")
            .wrap(AuthGuard::web())
            .route(web::get().to(home::home)),
    )
    .configure(accounts_routes)
    .route("/api/token/", web::post().to(accounts::obtain_token))
    .route("/api/token/refresh/", web::post().to(accounts::refresh_token))
    .configure(api_routes)
    .configure(parenting_routes)
    .configure(laika_routes)
    .configure(marketplace_routes)
    .configure(tennis_routes)
    .configure(test_routes)
    .configure(rooms_routes);
}

fn accounts_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/accounts")
            .service(
                web::resource("/signup/")
                    .route(web::get().to(accounts::signup_page))
                    .route(web::post().to(accounts::signup)),
            )
            .service(
                web::resource("/signin/")
                    .route(web::get().to(accounts::signin_page))
                    .route(web::post().to(accounts::signin)),
            )
            .service(
                web::resource("/signout/")
                    .route(web::get().to(accounts::signout))
                    .route(web::post().to(accounts::signout)),
            )
            .service(
                web::resource("/password/reset/")
                    .route(web::get().to(accounts::password_reset_page))
                    .route(web::post().to(accounts::password_reset)),
            )
            .route(
                "/password/reset/done/",
                web::get().to(accounts::password_reset_done),
            )
            .service(
                web::resource("/password/reset/key/{token}/")
                    .route(web::get().to(accounts::password_reset_key_page))
                    .route(web::post().to(accounts::password_reset_key)),
            )
            .service(
                web::resource("/password/change/")
                    .wrap(AuthGuard::web())
                    .route(web::get().to(accounts::password_change_page))
                    .route(web::post().to(accounts::password_change)),
            ),
    );
}

fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .wrap(AuthGuard::api())
            .route("/parenting/", web::get().to(api::parenting_list))
            .service(
                web::resource("/parenting/{id}/")
                    .route(web::get().to(api::parenting_retrieve))
                    .route(web::put().to(api::parenting_put))
                    .route(web::patch().to(api::parenting_patch))
                    .route(web::delete().to(api::parenting_delete)),
            )
            .route("/laika/", web::get().to(api::laika_list))
            .service(
                web::resource("/laika/{id}/")
                    .route(web::get().to(api::laika_retrieve))
                    .route(web::put().to(api::laika_put))
                    .route(web::patch().to(api::laika_patch))
                    .route(web::delete().to(api::laika_delete)),
            )
            .route("/marketplace/", web::get().to(api::marketplace_list))
            .service(
                web::resource("/marketplace/{id}/")
                    .route(web::get().to(api::marketplace_retrieve))
                    .route(web::put().to(api::marketplace_put))
                    .route(web::patch().to(api::marketplace_patch))
                    .route(web::delete().to(api::marketplace_delete)),
            )
            .route("/tennis/", web::get().to(api::tennis_list))
            .service(
                web::resource("/tennis/{id}/")
                    .route(web::get().to(api::tennis_retrieve))
                    .route(web::put().to(api::tennis_put))
                    .route(web::patch().to(api::tennis_patch))
                    .route(web::delete().to(api::tennis_delete)),
            ),
    );
}

/// List and detail are public; everything else resolves `CurrentUser`
fn parenting_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/parenting")
            .route("/", web::get().to(parenting::list))
            .service(
                web::resource("/create/")
                    .route(web::get().to(parenting::create_page))
                    .route(web::post().to(parenting::create)),
            )
            .service(
                web::resource("/{id}/")
                    .route(web::get().to(parenting::detail))
                    .route(web::post().to(parenting::comment)),
            )
            .service(
                web::resource("/{id}/update/")
                    .route(web::get().to(parenting::update_page))
                    .route(web::post().to(parenting::update)),
            )
            .service(
                web::resource("/{id}/delete/")
                    .route(web::get().to(parenting::delete_page))
                    .route(web::post().to(parenting::delete)),
            ),
    );
}

fn laika_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/laika")
            .wrap(AuthGuard::web())
            .route("/", web::get().to(laika::list))
            .service(
                web::resource("/create/")
                    .route(web::get().to(laika::create_page))
                    .route(web::post().to(laika::create)),
            )
            .service(
                web::resource("/profile/")
                    .route(web::get().to(laika::profile_page))
                    .route(web::post().to(laika::update_profile)),
            )
            .route("/{id}/", web::get().to(laika::detail))
            .service(
                web::resource("/{id}/update/")
                    .route(web::get().to(laika::update_page))
                    .route(web::post().to(laika::update)),
            )
            .service(
                web::resource("/{id}/delete/")
                    .route(web::get().to(laika::delete_page))
                    .route(web::post().to(laika::delete)),
            ),
    );
}

fn marketplace_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/marketplace")
            .wrap(AuthGuard::web())
            .route("/", web::get().to(marketplace::list))
            .route(
                "/search_results/",
                web::get().to(marketplace::search_results),
            )
            .route("/my_posts/{username}/", web::get().to(marketplace::my_posts))
            .route(
                "/detail_post/{id}/",
                web::get().to(marketplace::detail_post),
            )
            .service(
                web::resource("/create/")
                    .route(web::get().to(marketplace::create_page))
                    .route(web::post().to(marketplace::create)),
            )
            .service(
                web::resource("/update_post/{id}/")
                    .route(web::get().to(marketplace::update_page))
                    .route(web::post().to(marketplace::update_post)),
            )
            .service(
                web::resource("/delete_post/{id}/")
                    .route(web::get().to(marketplace::delete_page))
                    .route(web::post().to(marketplace::delete_post)),
            ),
    );
}

fn tennis_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tennis")
            .wrap(AuthGuard::web())
            .route("/", web::get().to(tennis::list))
            .service(
                web::resource("/create/")
                    .route(web::get().to(tennis::create_page))
                    .route(web::post().to(tennis::create)),
            )
            .service(
                web::resource("/{id}/detail/")
                    .route(web::get().to(tennis::detail))
                    .route(web::post().to(tennis::comment)),
            )
            .service(
                web::resource("/{id}/update/")
                    .route(web::get().to(tennis::update_page))
                    .route(web::post().to(tennis::update)),
            )
            .service(
                web::resource("/{id}/delete/")
                    .route(web::get().to(tennis::delete_page))
                    .route(web::post().to(tennis::delete)),
            ),
    );
}

fn test_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/test")
            .wrap(AuthGuard::web())
            .route("/", web::get().to(test_posts::list))
            .service(
                web::resource("/create/")
                    .route(web::get().to(test_posts::create_page))
                    .route(web::post().to(test_posts::create)),
            )
            .route("/{id}/", web::get().to(test_posts::detail))
            .service(
                web::resource("/{id}/edit/")
                    .route(web::get().to(test_posts::edit_page))
                    .route(web::post().to(test_posts::edit)),
            )
            .service(
                web::resource("/{id}/delete/")
                    .route(web::get().to(test_posts::delete_page))
                    .route(web::post().to(test_posts::delete)),
            ),
    );
}

fn rooms_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/rooms")
            .wrap(AuthGuard::web())
            .route("/", web::get().to(rooms::list))
            .route("/create_room/", web::post().to(rooms::create_room))
            .route("/{id}/", web::get().to(rooms::room)),
    );
}
