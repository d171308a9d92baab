use actix_web::{get, put, web, HttpResponse};
use validator::Validate;

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::{
        domain::Role,
        dto::{query::AttemptListParams, request::FinishAttemptRequest, response::TestAttemptDto},
    },
};

#[put("/attempts/{id}/finish")]
async fn finish_attempt(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    request: web::Json<FinishAttemptRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let attempt_id = id.into_inner();
    let request = request.into_inner();
    request.validate()?;

    let attempt = state.attempt_service.get_attempt_by_id(attempt_id).await?;
    if attempt.user_id != auth.0.sub {
        return Err(AppError::Forbidden(
            "Only the test-taker can finish this attempt".to_string(),
        ));
    }

    state
        .attempt_service
        .finish_attempt(attempt_id, request.answers)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/attempts/{id}")]
async fn get_attempt(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let attempt = state
        .attempt_service
        .get_attempt_by_id(id.into_inner())
        .await?;

    if auth.0.role == Role::Student && attempt.user_id != auth.0.sub {
        return Err(AppError::Forbidden(
            "You can only view your own attempts".to_string(),
        ));
    }

    Ok(HttpResponse::Ok().json(TestAttemptDto::from(attempt)))
}

/// Students only ever see their own attempts, whatever `user_ids` says.
#[get("/attempts")]
async fn list_attempts(
    state: web::Data<AppState>,
    query: web::Query<AttemptListParams>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let mut query = query.into_inner().into_query()?;
    if auth.0.role == Role::Student {
        query.filter.user_ids = vec![auth.0.sub];
    }

    let page = state.attempt_service.list_attempts(&query).await?;
    Ok(HttpResponse::Ok().json(page.map(TestAttemptDto::from)))
}
