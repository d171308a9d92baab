pub mod attempt_handler;
pub mod health_handler;
pub mod test_handler;

use actix_web::web;

use crate::auth::AuthMiddleware;

pub use health_handler::{health_check, health_check_live, health_check_ready};

/// Registers health probes at the root and the authenticated API under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(health_check_live)
        .service(health_check_ready)
        .service(
            web::scope("/api")
                .wrap(AuthMiddleware)
                .service(test_handler::create_test)
                .service(test_handler::list_tests)
                .service(test_handler::get_test_for_presentation)
                .service(test_handler::start_attempt)
                .service(test_handler::get_test)
                .service(test_handler::update_test)
                .service(test_handler::delete_test)
                .service(attempt_handler::finish_attempt)
                .service(attempt_handler::list_attempts)
                .service(attempt_handler::get_attempt),
        );
}
