//! bearer-token staff lookup; the token format itself is owned by the
//! identity provider, here it is just an opaque key into the user table

use actix_web::http::header;
use actix_web::HttpRequest;

use crate::server::controller::error::CustomError;
use crate::server::model::user::LoggedUser;
use crate::server::repository::UsersStore;

pub(crate) async fn logged_user<S: UsersStore>(
    req: &HttpRequest,
    store: &S,
) -> Result<LoggedUser, CustomError> {
    let token = bearer_token(req)?;
    store
        .find_by_token(token)
        .await?
        .ok_or_else(|| CustomError::unauthorized("Invalid or expired token"))
}

fn bearer_token(req: &HttpRequest) -> Result<&str, CustomError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| CustomError::unauthorized("Missing authorization header"))?;
    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| CustomError::unauthorized("Invalid authorization header"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn rejects_missing_and_malformed_headers() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            bearer_token(&req),
            Err(CustomError::Unauthorized { .. })
        ));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert!(matches!(
            bearer_token(&req),
            Err(CustomError::Unauthorized { .. })
        ));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer "))
            .to_http_request();
        assert!(matches!(
            bearer_token(&req),
            Err(CustomError::Unauthorized { .. })
        ));
    }

    #[actix_web::test]
    async fn extracts_the_bearer_token() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer staff-token-1"))
            .to_http_request();
        assert_eq!(bearer_token(&req).unwrap(), "staff-token-1");
    }
}
