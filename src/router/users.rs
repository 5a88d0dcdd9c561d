//! Users-related HTTP API.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::config::Configuration;
use crate::error::Result;
use crate::router::Valid;
use crate::user::{User, UserError, UserId, UserService};
use crate::{AppState, ServerError};

/// Wire representation of a [`User`].
///
/// Timestamps sent by clients are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Login name must be 1 to 255 characters long."
    ))]
    pub login_name: String,
    #[validate(
        email(message = "Email must be formatted."),
        length(max = 255, message = "Email must be at most 255 characters long.")
    )]
    pub email_address: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "First name must be 1 to 255 characters long."
    ))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255, message = "Last name must be 1 to 255 characters long."))]
    pub last_name: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id().map(UserId::get),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
            login_name: user.login_name().to_owned(),
            email_address: user.email_address().to_owned(),
            first_name: user.first_name().to_owned(),
            last_name: user.last_name().to_owned(),
        }
    }
}

impl TryFrom<UserDto> for User {
    type Error = UserError;

    fn try_from(dto: UserDto) -> std::result::Result<Self, Self::Error> {
        User::builder()
            .id(dto.id.map(UserId::new))
            .login_name(dto.login_name)
            .email_address(dto.email_address)
            .first_name(dto.first_name)
            .last_name(dto.last_name)
            .build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    login_name: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        // `GET /api/users` lists, `POST /api/users` creates.
        .route("/", get(get_all).post(create))
        // `GET /api/users/filter?loginName=` looks up by login name.
        .route("/filter", get(filter))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
}

async fn get_all(State(users): State<UserService>) -> Result<Json<Vec<UserDto>>> {
    let all = users.get_all().await?;
    Ok(Json(all.into_iter().map(UserDto::from).collect()))
}

async fn get_by_id(
    State(users): State<UserService>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<UserDto>> {
    let Path(id) = path?;
    let user = users.get_by_id(UserId::new(id)).await?;
    Ok(Json(user.into()))
}

async fn filter(
    State(users): State<UserService>,
    query: std::result::Result<Query<Filter>, QueryRejection>,
) -> Result<Json<UserDto>> {
    let Query(filter) = query?;
    let user = users.get_by_login_name(&filter.login_name).await?;
    Ok(Json(user.into()))
}

async fn create(
    State(users): State<UserService>,
    State(config): State<Arc<Configuration>>,
    Valid(body): Valid<UserDto>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<UserDto>)> {
    // creation never targets an existing record.
    let user = User::try_from(UserDto { id: None, ..body })?;
    let created = users.upsert(user).await?;
    let location = location(&config, created.id())?;

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(created.into())))
}

async fn update(
    State(users): State<UserService>,
    path: std::result::Result<Path<i64>, PathRejection>,
    Valid(body): Valid<UserDto>,
) -> Result<Json<UserDto>> {
    let Path(id) = path?;
    if body.id != Some(id) {
        return Err(ServerError::IdMismatch {
            path: UserId::new(id),
        });
    }

    let updated = users.upsert(User::try_from(body)?).await?;
    Ok(Json(updated.into()))
}

async fn delete(
    State(users): State<UserService>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<StatusCode> {
    let Path(id) = path?;
    users.delete(UserId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Public URL of a stored user.
fn location(config: &Configuration, id: Option<UserId>) -> Result<String> {
    let id = id.ok_or_else(|| ServerError::Internal {
        details: "stored user has no identifier".to_owned(),
        source: None,
    })?;

    let mut url = Url::parse(&config.url).map_err(|err| ServerError::Internal {
        details: "cannot build user location".to_owned(),
        source: Some(Box::new(err)),
    })?;

    // keep any base path of the public URL.
    url.path_segments_mut()
        .map_err(|_| ServerError::Internal {
            details: "public URL cannot be a base".to_owned(),
            source: None,
        })?
        .pop_if_empty()
        .extend(["api", "users", id.to_string().as_str()]);

    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Response};
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::{app, make_request, router as routes};

    fn jane() -> serde_json::Value {
        json!({
            "loginName": "jane_doe",
            "emailAddress": "jane.doe@example.com",
            "firstName": "Jane",
            "lastName": "Doe",
        })
    }

    async fn read<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn create_jane(app: &Router) -> UserDto {
        let response =
            make_request(app.clone(), Method::POST, "/api/users", jane().to_string()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        read(response).await
    }

    #[tokio::test]
    async fn test_create_handler() {
        let app = app(routes::state());

        let response =
            make_request(app.clone(), Method::POST, "/api/users", jane().to_string()).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body: UserDto = read(response).await;
        let id = body.id.expect("created user has an id");
        assert_eq!(
            location.as_deref(),
            Some(format!("http://localhost:8080/api/users/{id}").as_str())
        );
        assert_eq!(body.login_name, "jane_doe");
        assert!(body.created_at.is_some());
        assert!(body.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_create_ignores_body_id() {
        let app = app(routes::state());

        let mut payload = jane();
        payload["id"] = json!(77);
        let response =
            make_request(app.clone(), Method::POST, "/api/users", payload.to_string()).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body: UserDto = read(response).await;
        assert_ne!(body.id, Some(77));
    }

    #[tokio::test]
    async fn test_create_with_invalid_email() {
        let app = app(routes::state());

        let mut payload = jane();
        payload["emailAddress"] = json!("not-an-email");
        let response = make_request(app, Method::POST, "/api/users", payload.to_string()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_with_malformed_json() {
        let app = app(routes::state());

        let response = make_request(app, Method::POST, "/api/users", "{".to_owned()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_duplicate() {
        let app = app(routes::state());
        create_jane(&app).await;

        let mut payload = jane();
        payload["emailAddress"] = json!("other@example.com");
        let response = make_request(app, Method::POST, "/api/users", payload.to_string()).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_get_handlers() {
        let app = app(routes::state());
        let created = create_jane(&app).await;
        let id = created.id.unwrap();

        let response = make_request(
            app.clone(),
            Method::GET,
            &format!("/api/users/{id}"),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let by_id: UserDto = read(response).await;
        assert_eq!(by_id, created);

        let response = make_request(
            app.clone(),
            Method::GET,
            "/api/users/filter?loginName=jane_doe",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let by_name: UserDto = read(response).await;
        assert_eq!(by_name, by_id);

        let response = make_request(app, Method::GET, "/api/users", String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let all: Vec<UserDto> = read(response).await;
        assert_eq!(all, vec![created]);
    }

    #[tokio::test]
    async fn test_get_unknown() {
        let app = app(routes::state());

        let response =
            make_request(app.clone(), Method::GET, "/api/users/404", String::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = make_request(
            app.clone(),
            Method::GET,
            "/api/users/filter?loginName=nobody",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = make_request(app, Method::GET, "/api/users/filter", String::default()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_handler() {
        let app = app(routes::state());
        let created = create_jane(&app).await;
        let id = created.id.unwrap();

        let payload = UserDto {
            first_name: "UpdatedFirstName".into(),
            last_name: "UpdatedLastName".into(),
            ..created.clone()
        };
        let response = make_request(
            app.clone(),
            Method::PUT,
            &format!("/api/users/{id}"),
            json!(payload).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let updated: UserDto = read(response).await;
        assert_eq!(updated.id, Some(id));
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.first_name, "UpdatedFirstName");
        assert_eq!(updated.last_name, "UpdatedLastName");

        let response =
            make_request(app, Method::GET, &format!("/api/users/{id}"), String::default()).await;
        let fetched: UserDto = read(response).await;
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn test_update_with_mismatching_id() {
        let app = app(routes::state());
        let created = create_jane(&app).await;
        let id = created.id.unwrap();

        let response = make_request(
            app.clone(),
            Method::PUT,
            &format!("/api/users/{}", id + 1),
            json!(created).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // no id at all in the body.
        let response =
            make_request(app, Method::PUT, &format!("/api/users/{id}"), jane().to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_unknown() {
        let app = app(routes::state());

        let mut payload = jane();
        payload["id"] = json!(12);
        let response = make_request(app, Method::PUT, "/api/users/12", payload.to_string()).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_location_keeps_base_path() {
        let mut config = Configuration::default();
        config.url = "https://example.com/roster".to_owned();
        assert_eq!(
            location(&config, Some(UserId::new(1))).unwrap(),
            "https://example.com/roster/api/users/1"
        );

        config.url = "https://example.com/roster/".to_owned();
        assert_eq!(
            location(&config, Some(UserId::new(2))).unwrap(),
            "https://example.com/roster/api/users/2"
        );

        assert!(location(&Configuration::default(), None).is_err());
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_problem_details() {
        let app = app(routes::state());

        for method in [Method::GET, Method::DELETE] {
            let response =
                make_request(app.clone(), method, "/api/users/abc", String::default()).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                response.headers().get(header::CONTENT_TYPE).unwrap(),
                "application/problem+json"
            );
        }

        let mut payload = jane();
        payload["id"] = json!(1);
        let response = make_request(app, Method::PUT, "/api/users/abc", payload.to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let app = app(routes::state());
        let id = create_jane(&app).await.id.unwrap();
        let path = format!("/api/users/{id}");

        let response = make_request(app.clone(), Method::DELETE, &path, String::default()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = make_request(app.clone(), Method::DELETE, &path, String::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = make_request(app, Method::GET, "/api/users", String::default()).await;
        let all: Vec<UserDto> = read(response).await;
        assert!(all.iter().all(|user| user.id != Some(id)));
    }
}
