use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;

use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    change_password, get_current_user, health_check, login, logout, refresh, register,
};
use crate::session::SessionService;

pub fn run(listener: TcpListener, session: SessionService) -> Result<Server, std::io::Error> {
    let session_data = web::Data::new(session);

    let server = HttpServer::new(move || {
        let guard = || JwtMiddleware::new(session_data.get_ref().clone());

        App::new()
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            .app_data(session_data.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/user")
                    // Public
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    // Bearer token required
                    .service(
                        web::resource("/me")
                            .route(web::get().to(get_current_user))
                            .wrap(guard()),
                    )
                    .service(
                        web::resource("/password")
                            .route(web::post().to(change_password))
                            .wrap(guard()),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
