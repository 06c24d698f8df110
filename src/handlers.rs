// src/handlers.rs
use crate::{AppState, errors::TubeMasterError, models::*};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/keywords", web::post().to(find_keywords))
            .route("/scripts", web::post().to(generate_script))
            .route("/titles", web::post().to(generate_titles))
            .route("/publish-time", web::post().to(suggest_publish_time))
            .route("/competitors", web::post().to(analyze_competitor))
            .route("/thumbnails/generate", web::post().to(generate_thumbnail))
            .route("/thumbnails/history", web::get().to(thumbnail_history))
            .route("/thumbnails/compare", web::post().to(compare_thumbnails)),
    )
    .route("/health", web::get().to(health_check));
}

pub async fn find_keywords(
    body: web::Json<TopicRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TubeMasterError> {
    let keywords = data.features.find_keywords(&body.topic).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "keywords": keywords })))
}

pub async fn generate_script(
    body: web::Json<ScriptRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TubeMasterError> {
    let script = data
        .features
        .generate_script(&body.title, &body.audience)
        .await?;
    Ok(HttpResponse::Ok().json(script))
}

pub async fn generate_titles(
    body: web::Json<TopicRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TubeMasterError> {
    let titles = data.features.generate_titles(&body.topic).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "titles": titles })))
}

pub async fn suggest_publish_time(
    body: web::Json<PublishTimeRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TubeMasterError> {
    let suggestion = data
        .features
        .suggest_best_time(&body.title, &body.audience, &body.tags)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "suggestion": suggestion })))
}

pub async fn analyze_competitor(
    body: web::Json<CompetitorRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TubeMasterError> {
    let analysis = data.features.analyze_competitor(&body.channel_url).await?;
    Ok(HttpResponse::Ok().json(analysis))
}

pub async fn generate_thumbnail(
    body: web::Json<ThumbnailGenRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TubeMasterError> {
    let result = data
        .features
        .generate_thumbnail(&body.prompt, &body.style, &body.mood, body.optimize)
        .await?;
    data.history.record(result.clone()).await;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn thumbnail_history(data: web::Data<AppState>) -> HttpResponse {
    let items = data.history.list().await;
    HttpResponse::Ok().json(serde_json::json!({
        "count": items.len(),
        "items": items
    }))
}

/// Multipart fields: `image_a`, `image_b` (file parts or data-URI text),
/// `provider` (`groq` | `openrouter`) and an optional `api_key`.
pub async fn compare_thumbnails(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, TubeMasterError> {
    let mut request = ComparisonRequest {
        image_a: None,
        image_b: None,
        provider: VisionProviderKind::OpenRouter,
        credential: None,
    };

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let filename = disposition.get_filename().map(str::to_string);
        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut value = BytesMut::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            value.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "image_a" | "image_b" => {
                let image = if filename.is_some() {
                    ImagePayload::from_bytes(&content_type, &value)
                } else {
                    ImagePayload::new(text_field(&name, &value)?)
                };
                if name == "image_a" {
                    request.image_a = Some(image);
                } else {
                    request.image_b = Some(image);
                }
            }
            "provider" => {
                let provider = text_field(&name, &value)?;
                request.provider = VisionProviderKind::parse(&provider).ok_or_else(|| {
                    TubeMasterError::InvalidInput(format!("Unknown provider: {}", provider))
                })?;
            }
            "api_key" => request.credential = Some(text_field(&name, &value)?),
            other => log::debug!("Ignoring multipart field {}", other),
        }
    }

    let result = data.comparison.compare(request).await?;
    Ok(HttpResponse::Ok().json(result))
}

fn multipart_error(e: actix_multipart::MultipartError) -> TubeMasterError {
    TubeMasterError::InvalidInput(format!("Invalid multipart payload: {}", e))
}

fn text_field(name: &str, value: &[u8]) -> Result<String, TubeMasterError> {
    String::from_utf8(value.to_vec())
        .map(|s| s.trim().to_string())
        .map_err(|_| TubeMasterError::InvalidInput(format!("Field {} is not valid UTF-8", name)))
}

pub async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "tubemaster",
        "version": env!("CARGO_PKG_VERSION"),
        "brain_configured": !data.config.groq_api_key.is_empty()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::services::comparison::FixedSwap;
    use crate::services::test_support::{ScriptedTransport, choice_body};
    use actix_web::{App, http::StatusCode, http::header, test};
    use serde_json::{Value, json};
    use std::sync::Arc;

    const BOUNDARY: &str = "tubemasterboundary";

    fn state(transport: Arc<ScriptedTransport>) -> AppState {
        let config = Arc::new(AppConfig {
            groq_api_key: "groq-key".to_string(),
            ..AppConfig::default()
        });
        AppState::new(config, transport, Arc::new(FixedSwap(false)))
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, filename, value) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match filename {
                Some(file) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\nContent-Type: image/png\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn multipart_request(body: String) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/v1/thumbnails/compare")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn health_reports_service() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Arc::new(ScriptedTransport::new()))))
                .configure(configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["service"], "tubemaster");
        assert_eq!(body["brain_configured"], true);
    }

    #[actix_web::test]
    async fn blank_topic_is_a_bad_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(transport.clone())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/keywords")
            .set_json(json!({ "topic": "  " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Validation error");
        assert_eq!(transport.post_count(), 0);
    }

    #[actix_web::test]
    async fn generated_thumbnails_land_in_history() {
        let transport = Arc::new(ScriptedTransport::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(transport)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/thumbnails/generate")
            .set_json(json!({ "prompt": "neon city", "style": "cyberpunk", "mood": "tense" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // A failed generation must not touch history.
        let req = test::TestRequest::post()
            .uri("/api/v1/thumbnails/generate")
            .set_json(json!({ "prompt": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/v1/thumbnails/history").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["items"][0]["originalPrompt"], "neon city");
    }

    #[actix_web::test]
    async fn comparison_requires_both_images() {
        let transport = Arc::new(ScriptedTransport::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(transport.clone())))
                .configure(configure),
        )
        .await;

        let body = multipart_body(&[
            ("image_a", None, "data:image/png;base64,QUFBQQ=="),
            ("provider", None, "groq"),
        ]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(transport.post_count(), 0);
    }

    #[actix_web::test]
    async fn empty_file_upload_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_post(200, choice_body(r#"{"winner":"1","score1":7,"score2":5}"#));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(transport.clone())))
                .configure(configure),
        )
        .await;

        let body = multipart_body(&[
            ("image_a", Some("a.png"), ""),
            ("image_b", None, "data:image/png;base64,QkJCQg=="),
            ("provider", None, "groq"),
        ]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(transport.post_count(), 0);
    }

    #[actix_web::test]
    async fn comparison_returns_caller_frame_verdict() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_post(
            200,
            choice_body(r#"{"winner":"2","score1":6,"score2":9,"reasoning":"...","breakdown":[]}"#),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(transport.clone())))
                .configure(configure),
        )
        .await;

        let body = multipart_body(&[
            ("image_a", Some("a.png"), "AAAA"),
            ("image_b", None, "data:image/png;base64,QkJCQg=="),
            ("provider", None, "OpenRouter"),
            ("api_key", None, "user-key"),
        ]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let result: Value = test::read_body_json(resp).await;
        assert_eq!(result["winner"], "B");
        assert_eq!(result["scoreA"], 6.0);
        assert_eq!(result["scoreB"], 9.0);

        let post = &transport.posts()[0];
        assert_eq!(post.header("Authorization"), Some("Bearer user-key"));
        assert_eq!(
            post.body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,QUFBQQ=="
        );
    }

    #[actix_web::test]
    async fn unknown_provider_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Arc::new(ScriptedTransport::new()))))
                .configure(configure),
        )
        .await;

        let body = multipart_body(&[("provider", None, "gemini")]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("gemini"));
    }

    #[actix_web::test]
    async fn missing_openrouter_key_carries_a_hint() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Arc::new(ScriptedTransport::new()))))
                .configure(configure),
        )
        .await;

        let body = multipart_body(&[
            ("image_a", None, "data:image/png;base64,QUFBQQ=="),
            ("image_b", None, "data:image/png;base64,QkJCQg=="),
        ]);
        let resp = test::call_service(&app, multipart_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing credential");
        assert!(body["hint"].is_string());
    }
}
