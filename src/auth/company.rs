use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};

/// Company scoping for the acting user. Upstream auth terminates before
/// this service and forwards the resolved company in `X-Company-Id`; every
/// query in the engine is filtered by it.
pub struct CompanyScope {
    pub company_id: i64,
}

impl FromRequest for CompanyScope {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let company_id = match req
            .headers()
            .get("X-Company-Id")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.parse::<i64>().ok())
        {
            Some(id) if id > 0 => id,
            _ => return ready(Err(ErrorUnauthorized("Missing or invalid company scope"))),
        };

        ready(Ok(CompanyScope { company_id }))
    }
}
