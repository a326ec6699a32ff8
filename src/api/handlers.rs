use axum::{
    extract::{rejection::FormRejection, Form, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{dto::*, metrics, models::Secret, state::AppState};

pub type ApiResult<T> = Result<T, ApiError>;

/// Body encoding picked from the `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    /// Carries the content type echoed back to the client.
    Xml(&'static str),
}

/// Media ranges we can answer. Parameters and q-values are ignored.
const MEDIA_RANGES: [(&str, Format); 6] = [
    ("*/*", Format::Json),
    ("application/*", Format::Json),
    ("application/json", Format::Json),
    ("application/xml", Format::Xml("application/xml")),
    ("text/xml", Format::Xml("text/xml")),
    ("text/*", Format::Xml("text/xml")),
];

/// Picks the format of the first supported range in the `Accept` header.
/// A missing header gets JSON.
fn negotiate(headers: &HeaderMap) -> ApiResult<Format> {
    let Some(accept) = headers.get(header::ACCEPT) else {
        return Ok(Format::Json);
    };
    let accept = accept
        .to_str()
        .map_err(|_| ApiError::new("Accept header is invalid", 405))?;

    accept
        .split(',')
        .filter_map(|range| range.split(';').next())
        .map(str::trim)
        .find_map(|range| {
            MEDIA_RANGES
                .iter()
                .find(|(known, _)| *known == range)
                .map(|(_, format)| *format)
        })
        .ok_or_else(|| ApiError::new("Accept header is invalid", 405))
}

fn respond(format: Format, secret: Secret) -> ApiResult<Response> {
    let body = SecretResponse::from(secret);
    match format {
        Format::Json => Ok(Json(body).into_response()),
        Format::Xml(content_type) => {
            let xml = quick_xml::se::to_string_with_root("Secret", &body).map_err(|e| {
                tracing::error!(error = %e, "failed to encode secret as XML");
                ApiError::new("Internal server error", 500)
            })?;
            Ok(([(header::CONTENT_TYPE, content_type)], xml).into_response())
        }
    }
}

pub async fn store_secret(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<StoreSecretForm>, FormRejection>,
) -> ApiResult<Response> {
    metrics::SECRET_POST_REQUESTS_TOTAL.inc();
    let _timer = metrics::SECRET_POST_DURATION.start_timer();

    let format = negotiate(&headers)?;
    let Form(form) = form.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected secret form");
        ApiError::invalid_input()
    })?;

    let expire_after: i64 = form
        .expire_after
        .trim()
        .parse()
        .map_err(|_| ApiError::invalid_input())?;
    let expire_after_views: i32 = form
        .expire_after_views
        .trim()
        .parse()
        .map_err(|_| ApiError::invalid_input())?;

    tracing::debug!(expire_after, expire_after_views, "storing secret");

    let secret = state
        .storage
        .store(&form.secret, expire_after_views, expire_after)
        .await?;

    respond(format, secret)
}

pub async fn get_secret(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> ApiResult<Response> {
    metrics::SECRET_GET_REQUESTS_TOTAL.inc();
    let _timer = metrics::SECRET_GET_DURATION.start_timer();

    let format = negotiate(&headers)?;

    let secret = state.storage.get(&hash).await?;

    respond(format, secret)
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage = match state.storage.ping().await {
        Ok(()) => "connected".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "storage health check failed");
            "disconnected".to_string()
        }
    };

    Json(HealthCheckResponse {
        status: "ok".to_string(),
        storage,
        timestamp: time::OffsetDateTime::now_utc(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn render_metrics() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn accept(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn negotiation_picks_json_ranges() {
        assert_eq!(negotiate(&HeaderMap::new()).unwrap(), Format::Json);
        assert_eq!(negotiate(&accept("application/json")).unwrap(), Format::Json);
        assert_eq!(negotiate(&accept("text/html, */*;q=0.8")).unwrap(), Format::Json);
        assert_eq!(negotiate(&accept("application/*")).unwrap(), Format::Json);
    }

    #[test]
    fn negotiation_picks_xml_ranges() {
        assert_eq!(
            negotiate(&accept("application/xml")).unwrap(),
            Format::Xml("application/xml")
        );
        assert_eq!(negotiate(&accept("text/xml")).unwrap(), Format::Xml("text/xml"));
        assert_eq!(negotiate(&accept("text/*;q=0.5")).unwrap(), Format::Xml("text/xml"));
    }

    #[test]
    fn negotiation_follows_header_order() {
        assert_eq!(
            negotiate(&accept("text/xml, application/json")).unwrap(),
            Format::Xml("text/xml")
        );
        assert_eq!(
            negotiate(&accept("application/json, text/xml")).unwrap(),
            Format::Json
        );
    }

    #[test]
    fn negotiation_rejects_other_types() {
        let err = negotiate(&accept("text/html")).unwrap_err();
        assert_eq!(err.code, 405);
        assert!(negotiate(&accept("image/png, application/pdf")).is_err());
    }

    #[tokio::test]
    async fn xml_body_uses_wire_element_names() {
        let secret = Secret::new("top secret", 3, 10).unwrap();
        let hash = format!("<hash>{}</hash>", secret.handle);

        let response = respond(Format::Xml("text/xml"), secret).unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let xml = String::from_utf8(body.to_vec()).unwrap();
        assert!(xml.starts_with("<Secret>"), "{xml}");
        for element in [
            hash.as_str(),
            "<secretText>top secret</secretText>",
            "<createdAt>",
            "<expiresAt>",
            "<remainingViews>3</remainingViews>",
        ] {
            assert!(xml.contains(element), "{element} missing from {xml}");
        }
    }
}
