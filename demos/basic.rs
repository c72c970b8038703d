//! Minimal reqtrace demo: a few JSON endpoints with console tracing on.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":""}'
//!   curl -X POST http://localhost:3000/avatar -F file=@Cargo.toml
//!   curl http://localhost:3000/panic
//!   curl http://localhost:3000/css/site.css

use http::{Method, StatusCode};
use reqtrace::{HandlerError, Request, Response, Router, Server, TraceConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .on(Method::GET,    "/users/{id}",   get_user)
        .on(Method::POST,   "/users",        users::create)
        .on(Method::DELETE, "/users/{id}",   delete_user)
        .on(Method::POST,   "/avatar",       upload_avatar)
        .on(Method::GET,    "/panic",        explode)
        .on(Method::GET,    "/css/{file}",   stylesheet)
        .debug_logging(TraceConfig::new().highlight("basic::users"));

    if let Err(e) = Server::bind("0.0.0.0:3000").serve(app).await {
        tracing::error!("server error: {e}");
    }
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

mod users {
    use super::*;

    #[derive(Debug)]
    pub struct EmptyName;

    impl std::fmt::Display for EmptyName {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("user name must not be empty")
        }
    }

    impl std::error::Error for EmptyName {}

    // POST /users: fails with a traced error when the name is empty.
    pub async fn create(req: Request) -> Result<Response, HandlerError> {
        let body = req.body().text().await?;
        validate(&body)?;

        Ok(Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/99")
            .json(r#"{"id":"99","name":"new_user"}"#))
    }

    fn validate(body: &str) -> Result<(), EmptyName> {
        if body.is_empty() || body.contains(r#""name":"""#) {
            return Err(EmptyName);
        }
        Ok(())
    }
}

// DELETE /users/{id} → 204 No Content
async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}

// POST /avatar: multipart bodies show up as a one-line summary.
async fn upload_avatar(_req: Request) -> StatusCode {
    StatusCode::ACCEPTED
}

// GET /panic: panics are traced like any other handler error.
async fn explode(_req: Request) -> Response {
    panic!("this handler always panics")
}

// GET /css/{file}: excluded from the trace by default.
async fn stylesheet(_req: Request) -> Response {
    Response::builder()
        .header("content-type", "text/css")
        .no_body()
}
