//! Built-in session resolvers.
//!
//! `SessionExecutor` answers the gateway's own root fields (`login`,
//! `register`, `me`, `users`) and rejects everything else. It is the engine
//! the binary mounts behind the gate; a full CRM schema plugs in through
//! [`GraphqlExecutor`] instead.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::{
    Json,
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crm_auth::{PasswordError, PasswordHash, Role, TokenCodec, check_password_policy};
use crm_core::{DomainError, EmailAddress, UserId};

use crate::app::dto::{IdentityView, SessionPayload, UserView};
use crate::app::errors::graphql_error;
use crate::context::{AccessError, RequestContext};
use crate::directory::{DirectoryError, UserDirectory, UserRecord};
use crate::executor::GraphqlExecutor;
use crate::graphql::{self, ArgumentValue, GraphqlRequest, OperationKind, RootField};

/// Field-level failure, reported in the `errors` array.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Cannot query field \"{field}\" on type \"{parent}\"")]
    UnknownField { field: String, parent: &'static str },

    #[error("missing required argument \"{0}\"")]
    MissingArgument(&'static str),

    #[error("argument \"{0}\" must be a string")]
    InvalidArgument(&'static str),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("internal server error")]
    Internal,
}

impl From<DirectoryError> for ResolveError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Domain(e) => ResolveError::Domain(e),
            DirectoryError::Backend(msg) => {
                tracing::error!(error = %msg, "user directory failure");
                ResolveError::Internal
            }
        }
    }
}

pub struct SessionExecutor {
    directory: Arc<dyn UserDirectory>,
    codec: Arc<TokenCodec>,
    default_role: Role,
}

impl SessionExecutor {
    pub fn new(directory: Arc<dyn UserDirectory>, codec: Arc<TokenCodec>, default_role: Role) -> Self {
        Self {
            directory,
            codec,
            default_role,
        }
    }

    async fn resolve(
        &self,
        context: &RequestContext,
        kind: OperationKind,
        field: &RootField,
        variables: &Map<String, Value>,
    ) -> Result<Value, ResolveError> {
        match (kind, field.name.as_str()) {
            (OperationKind::Mutation, "login") => {
                let email = required(field, "email", variables)?;
                let password = required(field, "password", variables)?;
                to_value(self.login(&email, &password).await?)
            }
            (OperationKind::Mutation, "register") => {
                let name = required(field, "name", variables)?;
                let email = required(field, "email", variables)?;
                let password = required(field, "password", variables)?;
                let phone = optional(field, "phone", variables)?;
                to_value(self.register(name, &email, &password, phone).await?)
            }
            (OperationKind::Query, "me") => {
                let claims = context.identity().ok_or(AccessError::Unauthorized)?;
                to_value(IdentityView::from(claims))
            }
            (OperationKind::Query, "users") => {
                context.require_any_role(&[Role::ADMIN.as_str()])?;
                let users = self.directory.list().await?;
                to_value(users.iter().map(UserView::from).collect::<Vec<_>>())
            }
            (kind, name) => Err(ResolveError::UnknownField {
                field: name.to_string(),
                parent: type_name(kind),
            }),
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<SessionPayload, ResolveError> {
        let user = match EmailAddress::parse(email) {
            Ok(email) => self.directory.find_by_email(&email).await?,
            Err(_) => None,
        };

        // Unknown users still pay for one hash so timing does not reveal
        // which emails are registered.
        let Some(user) = user else {
            if let Some(dummy) = dummy_hash() {
                let _ = dummy.verify(password);
            }
            return Err(ResolveError::InvalidCredentials);
        };
        if !user.password_hash.verify(password) {
            tracing::info!(user_id = %user.id, "login rejected");
            return Err(ResolveError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
        self.session_for(&user)
    }

    async fn register(
        &self,
        name: String,
        email: &str,
        password: &str,
        phone: Option<String>,
    ) -> Result<SessionPayload, ResolveError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name must not be empty").into());
        }
        let email = EmailAddress::parse(email)?;
        check_password_policy(password)?;
        let password_hash = PasswordHash::derive(password).map_err(|e| {
            tracing::error!(error = %e, "failed to hash password");
            ResolveError::Internal
        })?;

        let user = UserRecord {
            id: UserId::new(),
            name,
            email,
            phone: phone.filter(|p| !p.trim().is_empty()),
            role: self.default_role.clone(),
            password_hash,
        };
        self.directory.insert(user.clone()).await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        self.session_for(&user)
    }

    fn session_for(&self, user: &UserRecord) -> Result<SessionPayload, ResolveError> {
        let token = self
            .codec
            .issue(&user.id.to_string(), &user.name, &user.role, Utc::now())
            .map_err(|e| {
                tracing::error!(error = %e, "failed to issue token");
                ResolveError::Internal
            })?;

        Ok(SessionPayload {
            token: token.into_string(),
            user: UserView::from(user),
        })
    }
}

#[async_trait]
impl GraphqlExecutor for SessionExecutor {
    async fn execute(&self, context: RequestContext, body: Bytes) -> Response {
        let request: GraphqlRequest = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => return graphql_error(StatusCode::BAD_REQUEST, format!("invalid request: {e}")),
        };
        let operations = match graphql::parse_document(&request.query) {
            Ok(operations) => operations,
            Err(e) => return graphql_error(StatusCode::BAD_REQUEST, format!("Syntax Error: {e}")),
        };
        let Some(operation) = graphql::select_operation(&operations, request.operation_name.as_deref())
        else {
            let message = match request.operation_name {
                Some(name) => format!("Unknown operation named \"{name}\""),
                None => "Must provide operation name if query contains multiple operations".to_string(),
            };
            return graphql_error(StatusCode::BAD_REQUEST, message);
        };
        if operation.has_root_spread {
            return graphql_error(
                StatusCode::BAD_REQUEST,
                "fragment spreads are not supported on the root selection",
            );
        }

        let variables = request.variables.unwrap_or_default();
        let mut data = Map::new();
        let mut errors = Vec::new();

        for field in &operation.root_fields {
            let key = field.response_key().to_string();
            match self.resolve(&context, operation.kind, field, &variables).await {
                Ok(value) => {
                    data.insert(key, value);
                }
                Err(e) => {
                    errors.push(json!({ "message": e.to_string(), "path": [key] }));
                    data.insert(key, Value::Null);
                }
            }
        }

        let mut response = Map::new();
        response.insert("data".to_string(), Value::Object(data));
        if !errors.is_empty() {
            response.insert("errors".to_string(), Value::Array(errors));
        }
        (StatusCode::OK, Json(Value::Object(response))).into_response()
    }
}

fn type_name(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Query => "Query",
        OperationKind::Mutation => "Mutation",
        OperationKind::Subscription => "Subscription",
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, ResolveError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize field result");
        ResolveError::Internal
    })
}

fn optional(
    field: &RootField,
    name: &'static str,
    variables: &Map<String, Value>,
) -> Result<Option<String>, ResolveError> {
    match field.argument(name) {
        None => Ok(None),
        Some(ArgumentValue::String(s)) => Ok(Some(s.clone())),
        Some(ArgumentValue::Variable(var)) => match variables.get(var) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ResolveError::InvalidArgument(name)),
        },
        Some(ArgumentValue::Other) => Err(ResolveError::InvalidArgument(name)),
    }
}

fn required(
    field: &RootField,
    name: &'static str,
    variables: &Map<String, Value>,
) -> Result<String, ResolveError> {
    optional(field, name, variables)?.ok_or(ResolveError::MissingArgument(name))
}

fn dummy_hash() -> Option<&'static PasswordHash> {
    static DUMMY: OnceLock<Option<PasswordHash>> = OnceLock::new();
    DUMMY
        .get_or_init(|| PasswordHash::derive("not-a-real-password").ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryUserDirectory;
    use crm_auth::SigningSecret;

    struct Fixture {
        executor: SessionExecutor,
        codec: Arc<TokenCodec>,
        directory: Arc<InMemoryUserDirectory>,
    }

    fn fixture() -> Fixture {
        let codec = Arc::new(TokenCodec::new(&SigningSecret::new("session-test-secret").unwrap()));
        let directory = Arc::new(InMemoryUserDirectory::new());
        let executor = SessionExecutor::new(directory.clone(), codec.clone(), Role::new("sales"));
        Fixture {
            executor,
            codec,
            directory,
        }
    }

    async fn run(executor: &SessionExecutor, context: RequestContext, body: Value) -> (StatusCode, Value) {
        let res = executor
            .execute(context, Bytes::from(serde_json::to_vec(&body).unwrap()))
            .await;
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn seed_admin(directory: &InMemoryUserDirectory) {
        directory
            .insert(UserRecord {
                id: UserId::new(),
                name: "Root".to_string(),
                email: EmailAddress::parse("root@example.com").unwrap(),
                phone: None,
                role: Role::ADMIN,
                password_hash: PasswordHash::derive("Adm1n!pw").unwrap(),
            })
            .await
            .unwrap();
    }

    const REGISTER: &str = r#"mutation Register($name: String!, $email: String!, $password: String!) {
        register(name: $name, email: $email, password: $password) { token user { id email role } }
    }"#;

    #[tokio::test]
    async fn register_issues_token_with_default_role() {
        let f = fixture();
        let (status, body) = run(
            &f.executor,
            RequestContext::anonymous(),
            json!({
                "query": REGISTER,
                "variables": { "name": "Bob", "email": "Bob@Example.com", "password": "Secr3t!" }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.get("errors").is_none(), "{body}");
        let payload = &body["data"]["register"];
        assert_eq!(payload["user"]["email"], "bob@example.com");
        assert_eq!(payload["user"]["role"], "sales");

        let claims = f
            .codec
            .verify(payload["token"].as_str().unwrap(), Utc::now())
            .unwrap();
        assert_eq!(claims.display_name(), "Bob");
        assert_eq!(claims.subject(), payload["user"]["id"].as_str().unwrap());
    }

    #[tokio::test]
    async fn register_enforces_policy_and_uniqueness() {
        let f = fixture();
        let weak = json!({
            "query": REGISTER,
            "variables": { "name": "Bob", "email": "bob@example.com", "password": "password" }
        });
        let (_, body) = run(&f.executor, RequestContext::anonymous(), weak).await;
        assert_eq!(body["data"]["register"], Value::Null);
        assert_eq!(body["errors"][0]["message"], "password must contain an uppercase letter");

        let ok = json!({
            "query": REGISTER,
            "variables": { "name": "Bob", "email": "bob@example.com", "password": "Secr3t!" }
        });
        let (_, body) = run(&f.executor, RequestContext::anonymous(), ok.clone()).await;
        assert!(body.get("errors").is_none());

        let (_, body) = run(&f.executor, RequestContext::anonymous(), ok).await;
        assert!(
            body["errors"][0]["message"]
                .as_str()
                .unwrap()
                .starts_with("conflict:")
        );
    }

    #[tokio::test]
    async fn login_checks_password() {
        let f = fixture();
        seed_admin(&f.directory).await;

        let login = |password: &str| {
            json!({
                "query": format!(
                    r#"mutation {{ login(email: "ROOT@example.com", password: "{password}") {{ token }} }}"#
                )
            })
        };

        let (_, body) = run(&f.executor, RequestContext::anonymous(), login("Adm1n!pw")).await;
        let token = body["data"]["login"]["token"].as_str().unwrap();
        let claims = f.codec.verify(token, Utc::now()).unwrap();
        assert_eq!(claims.role(), &Role::ADMIN);
        assert_eq!(body["data"]["login"]["user"]["name"], "Root");

        let (_, body) = run(&f.executor, RequestContext::anonymous(), login("wrong")).await;
        assert_eq!(body["errors"][0]["message"], "Invalid email or password");
        assert_eq!(body["errors"][0]["path"][0], "login");
    }

    #[tokio::test]
    async fn unknown_email_is_indistinguishable_from_wrong_password() {
        let f = fixture();
        let (_, body) = run(
            &f.executor,
            RequestContext::anonymous(),
            json!({ "query": r#"mutation { login(email: "nobody@example.com", password: "x") { token } }"# }),
        )
        .await;
        assert_eq!(body["errors"][0]["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn me_reads_the_request_context() {
        let f = fixture();
        let now = Utc::now();
        let token = f.codec.issue("u1", "Alice", &Role::new("sales"), now).unwrap();
        let claims = f.codec.verify(token.as_str(), now).unwrap();

        let (_, body) = run(
            &f.executor,
            RequestContext::authenticated(claims),
            json!({ "query": "{ whoami: me { id } }" }),
        )
        .await;
        assert_eq!(body["data"]["whoami"]["id"], "u1");
        assert_eq!(body["data"]["whoami"]["name"], "Alice");

        let (_, body) = run(&f.executor, RequestContext::anonymous(), json!({ "query": "{ me { id } }" })).await;
        assert_eq!(body["errors"][0]["message"], "unauthorized");
    }

    #[tokio::test]
    async fn users_requires_admin() {
        let f = fixture();
        seed_admin(&f.directory).await;
        let now = Utc::now();
        let ctx = |role: &str| {
            let token = f.codec.issue("u1", "Alice", &Role::new(role.to_string()), now).unwrap();
            RequestContext::authenticated(f.codec.verify(token.as_str(), now).unwrap())
        };

        let (_, body) = run(&f.executor, ctx("sales"), json!({ "query": "{ users { id } }" })).await;
        assert_eq!(body["errors"][0]["message"], "forbidden for role 'sales'");

        let (_, body) = run(&f.executor, ctx("admin"), json!({ "query": "{ users { id } }" })).await;
        let users = body["data"]["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["email"], "root@example.com");
        assert!(users[0].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn unknown_fields_and_bad_documents() {
        let f = fixture();
        let (status, body) = run(&f.executor, RequestContext::anonymous(), json!({ "query": "{ leads { id } }" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["errors"][0]["message"], "Cannot query field \"leads\" on type \"Query\"");

        let (_, body) = run(&f.executor, RequestContext::anonymous(), json!({ "query": "{ login }" })).await;
        assert_eq!(body["errors"][0]["message"], "Cannot query field \"login\" on type \"Query\"");

        let (status, body) = run(&f.executor, RequestContext::anonymous(), json!({ "query": "{ me " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn missing_arguments_are_field_errors() {
        let f = fixture();
        let (_, body) = run(
            &f.executor,
            RequestContext::anonymous(),
            json!({ "query": "mutation { login(email: \"a@b.co\") { token } }" }),
        )
        .await;
        assert_eq!(body["errors"][0]["message"], "missing required argument \"password\"");
    }
}
