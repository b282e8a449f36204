use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderMap};
use futures::TryStreamExt;
use serde::de::DeserializeOwned;

use crate::{errors::AppError, AppContext};

/// JSON body read by its declared `Content-Length`.
///
/// Unlike `axum::Json` this does not care about `Content-Type`. The header
/// `Content-Length` must be present and within `general.max_body_bytes`. A
/// body shorter than declared is rejected and anything past the declared
/// length is never read.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let declared = declared_length(req.headers())?;

        let limit = req
            .extensions()
            .get::<AppContext>()
            .map_or(usize::MAX, |ctx| ctx.cfg.general.max_body_bytes);
        if declared > limit {
            return Err(AppError::BodyTooLarge { declared, limit });
        }

        let mut stream = req.into_body().into_data_stream();
        let mut body = Vec::with_capacity(declared);

        while body.len() < declared {
            let Some(chunk) = stream
                .try_next()
                .await
                .map_err(|why| anyhow::anyhow!("failed to read request body: {why}"))?
            else {
                return Err(AppError::TruncatedBody {
                    expected: declared,
                    got: body.len(),
                });
            };

            let wanted = (declared - body.len()).min(chunk.len());
            body.extend_from_slice(&chunk[..wanted]);
        }

        let value = serde_json::from_slice(&body)?;
        Ok(Self(value))
    }
}

fn declared_length(headers: &HeaderMap) -> Result<usize, AppError> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .ok_or(AppError::InvalidLength)
}
