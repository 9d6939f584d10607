use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use futures_util::StreamExt;
use retailrec_core::popular::{
    self, DEFAULT_COUNTRY_LIMIT, DEFAULT_GLOBAL_LIMIT, DEFAULT_PER_GROUP_LIMIT,
};
use retailrec_core::Error;
use retailrec_session::{LoadOptions, Session};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Upload size cap for spreadsheets
const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

#[derive(Deserialize)]
struct UploadParams {
    sample: Option<f64>,
    seed: Option<u64>,
}

#[derive(Deserialize)]
struct RecommendRequest {
    query: String,
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct PerCountryParams {
    per_country: Option<usize>,
}

#[derive(Deserialize)]
struct PerMonthParams {
    per_month: Option<usize>,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(session: Arc<Session>, port: u16) -> std::io::Result<()> {
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(session.clone()))
                .configure(configure)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }
}

/// Register every route; the session is expected as `web::Data<Arc<Session>>`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/catalog", web::post().to(upload_catalog))
        .route("/catalog", web::get().to(get_catalog))
        .route("/recommend", web::post().to(recommend))
        .route("/popular", web::get().to(popular_products))
        .route("/popular/countries", web::get().to(popular_by_country))
        .route("/popular/countries/{country}", web::get().to(popular_in_country))
        .route("/popular/months", web::get().to(popular_by_month))
        .route("/countries/top", web::get().to(top_countries));
}

async fn upload_catalog(
    session: web::Data<Arc<Session>>,
    params: web::Query<UploadParams>,
    mut payload: Multipart,
) -> ActixResult<HttpResponse> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = payload.next().await {
        let mut field = field?;
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let Some(filename) = filename else {
            continue;
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Ok(HttpResponse::PayloadTooLarge().json(serde_json::json!({
                    "error": format!("Upload exceeds {} bytes", MAX_UPLOAD_BYTES)
                })));
            }
            bytes.extend_from_slice(&chunk);
        }
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Expected a multipart field carrying a spreadsheet file"
        })));
    };

    let defaults = *session.load_options();
    let options = LoadOptions {
        sample_fraction: params.sample.or(defaults.sample_fraction),
        seed: params.seed.unwrap_or(defaults.seed),
    };

    info!(filename = %filename, bytes = bytes.len(), "Catalog upload received");
    let session = session.get_ref().clone();
    let result = web::block(move || session.upload_bytes(&filename, bytes, Some(options))).await?;

    match result {
        Ok(report) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "result": report
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn get_catalog(session: web::Data<Arc<Session>>) -> ActixResult<HttpResponse> {
    match session.summary() {
        Ok(summary) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "result": summary
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn recommend(
    session: web::Data<Arc<Session>>,
    req: web::Json<RecommendRequest>,
) -> ActixResult<HttpResponse> {
    let query = req.into_inner().query;
    if query.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "'query' must not be empty"
        })));
    }

    let session = session.get_ref().clone();
    let recommendation = web::block(move || session.recommend(&query)).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "result": recommendation
    })))
}

async fn popular_products(
    session: web::Data<Arc<Session>>,
    params: web::Query<LimitParams>,
) -> ActixResult<HttpResponse> {
    let catalog = match session.catalog() {
        Ok(catalog) => catalog,
        Err(e) => return Ok(error_response(&e)),
    };
    let limit = params.limit.unwrap_or(DEFAULT_GLOBAL_LIMIT);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "result": popular::top_products(&catalog, limit)
    })))
}

async fn popular_by_country(
    session: web::Data<Arc<Session>>,
    params: web::Query<PerCountryParams>,
) -> ActixResult<HttpResponse> {
    let catalog = match session.catalog() {
        Ok(catalog) => catalog,
        Err(e) => return Ok(error_response(&e)),
    };
    let per_country = params.per_country.unwrap_or(DEFAULT_PER_GROUP_LIMIT);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "result": popular::top_products_by_country(&catalog, per_country)
    })))
}

async fn popular_in_country(
    session: web::Data<Arc<Session>>,
    path: web::Path<String>,
    params: web::Query<LimitParams>,
) -> ActixResult<HttpResponse> {
    let country = path.into_inner();
    let catalog = match session.catalog() {
        Ok(catalog) => catalog,
        Err(e) => return Ok(error_response(&e)),
    };

    let limit = params.limit.unwrap_or(DEFAULT_COUNTRY_LIMIT);
    let products = popular::top_products_for_country(&catalog, &country, limit);
    if products.is_empty() {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("No records for country '{}'", country)
        })));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "result": products
    })))
}

async fn popular_by_month(
    session: web::Data<Arc<Session>>,
    params: web::Query<PerMonthParams>,
) -> ActixResult<HttpResponse> {
    let catalog = match session.catalog() {
        Ok(catalog) => catalog,
        Err(e) => return Ok(error_response(&e)),
    };
    let per_month = params.per_month.unwrap_or(DEFAULT_PER_GROUP_LIMIT);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "result": popular::top_products_by_month(&catalog, per_month)
    })))
}

async fn top_countries(
    session: web::Data<Arc<Session>>,
    params: web::Query<LimitParams>,
) -> ActixResult<HttpResponse> {
    let catalog = match session.catalog() {
        Ok(catalog) => catalog,
        Err(e) => return Ok(error_response(&e)),
    };
    let limit = params.limit.unwrap_or(DEFAULT_PER_GROUP_LIMIT);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "result": popular::top_countries(&catalog, limit)
    })))
}

fn error_response(error: &Error) -> HttpResponse {
    let body = serde_json::json!({ "error": error.to_string() });
    match error {
        Error::EmptyDataset => HttpResponse::NotFound().json(body),
        Error::Io(_) => HttpResponse::InternalServerError().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::{header, StatusCode};
    use actix_web::test;
    use retailrec_core::{Catalog, ProductRecord, RecommenderConfig};
    use serde_json::Value;

    const BOUNDARY: &str = "retailrec-boundary";

    fn session() -> Arc<Session> {
        Arc::new(Session::new(RecommenderConfig::default()).unwrap())
    }

    fn mugs_session() -> Arc<Session> {
        let session = session();
        let records = [
            ("RED MUG", "United Kingdom"),
            ("BLUE MUG", "France"),
            ("RED PLATE", "France"),
            ("GREEN MUG", "Germany"),
            ("BLUE PLATE", "United Kingdom"),
            ("RED MUG", "France"),
        ]
        .iter()
        .map(|(description, country)| ProductRecord::new(*description).with_country(*country))
        .collect();
        session.install(Catalog::from_records(records).unwrap());
        session
    }

    fn multipart_body(filename: &str, content: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = filename,
            c = content
        )
    }

    macro_rules! app {
        ($session:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($session))
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_upload_then_summary() {
        let app = app!(session());
        let csv = "Description,CustomerID,Country\nRED MUG,1,France\nBLUE MUG,2,France\nRED MUG,1,France\n";
        let req = test::TestRequest::post()
            .uri("/catalog")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body("mugs.csv", csv))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"]["records"], 2);
        assert_eq!(body["result"]["dropped_duplicates"], 1);

        let req = test::TestRequest::get().uri("/catalog").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"]["unique_descriptions"], 2);
    }

    #[actix_web::test]
    async fn test_upload_rejects_unknown_format() {
        let app = app!(session());
        let req = test::TestRequest::post()
            .uri("/catalog")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body("notes.txt", "hello"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_recommend() {
        let app = app!(mugs_session());
        let req = test::TestRequest::post()
            .uri("/recommend")
            .set_json(serde_json::json!({ "query": "red mug" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"]["status"], "found");
        assert_eq!(body["result"]["matched"], "RED MUG");
        assert_eq!(body["result"]["items"][0]["description"], "RED PLATE");
        assert_eq!(body["result"]["items"].as_array().map(Vec::len), Some(4));

        let req = test::TestRequest::post()
            .uri("/recommend")
            .set_json(serde_json::json!({ "query": "xylophone" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"]["status"], "no_match");
    }

    #[actix_web::test]
    async fn test_recommend_validation_and_missing_catalog() {
        let app = app!(session());
        let req = test::TestRequest::post()
            .uri("/recommend")
            .set_json(serde_json::json!({ "query": "  " }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/recommend")
            .set_json(serde_json::json!({ "query": "red mug" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"]["status"], "unavailable");

        let req = test::TestRequest::get().uri("/popular").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_popularity_views() {
        let app = app!(mugs_session());

        let req = test::TestRequest::get().uri("/popular?limit=1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"][0]["description"], "RED MUG");
        assert_eq!(body["result"][0]["count"], 2);

        let req = test::TestRequest::get().uri("/popular/countries?per_country=1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"][0]["country"], "France");

        let req = test::TestRequest::get().uri("/popular/countries/France").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"].as_array().map(Vec::len), Some(3));

        let req = test::TestRequest::get().uri("/popular/countries/Spain").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/popular/months").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"].as_array().map(Vec::len), Some(0));

        let req = test::TestRequest::get().uri("/countries/top?limit=2").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"][0]["country"], "France");
        assert_eq!(body["result"][0]["count"], 3);
    }
}
