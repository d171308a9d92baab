use actix_web::{delete, get, post, put, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::{require_role, AuthenticatedUser},
    errors::AppError,
    models::{
        domain::Role,
        dto::{
            query::TestListParams,
            request::TestRequest,
            response::{CreatedResponse, StartAttemptResponse},
        },
    },
};

#[post("/tests")]
async fn create_test(
    state: web::Data<AppState>,
    request: web::Json<TestRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Teacher])?;

    let id = state
        .test_service
        .create_test(auth.0.sub, request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(CreatedResponse { id }))
}

#[get("/tests")]
async fn list_tests(
    state: web::Data<AppState>,
    query: web::Query<TestListParams>,
    _auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner().into_query()?;
    let page = state.test_service.list_tests(query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Full test including correct answers.
#[get("/tests/{id}")]
async fn get_test(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Teacher, Role::Admin])?;

    let test = state.test_service.get_test(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(test))
}

/// Test as shown to a test-taker, with answers removed.
#[get("/tests/{id}/pass")]
async fn get_test_for_presentation(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    _auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let test = state
        .attempt_service
        .prepare_for_presentation(id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(test))
}

#[put("/tests/{id}")]
async fn update_test(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    request: web::Json<TestRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Teacher, Role::Admin])?;

    let test = state
        .test_service
        .update_test(id.into_inner(), &auth.0.actor(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(test))
}

#[delete("/tests/{id}")]
async fn delete_test(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Teacher, Role::Admin])?;

    state
        .test_service
        .delete_test(id.into_inner(), &auth.0.actor())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/tests/{id}/start")]
async fn start_attempt(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Student])?;

    let attempt_id = state
        .attempt_service
        .start_attempt(id.into_inner(), auth.0.sub)
        .await?;
    Ok(HttpResponse::Created().json(StartAttemptResponse { attempt_id }))
}
