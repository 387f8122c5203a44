use actix_web::{body::to_bytes, http::StatusCode, test, web, App, HttpResponse};
use meme_api::Recoverer;

async fn boom() -> HttpResponse {
    panic!("handler exploded")
}

async fn fine() -> HttpResponse {
    HttpResponse::Ok().body("fine")
}

#[actix_web::test]
async fn routed_requests_pass_through_untouched() {
    let app = test::init_service(
        App::new()
            .wrap(Recoverer)
            .route("/fine", web::get().to(fine))
            .route("/items/{id}", web::get().to(fine)),
    )
    .await;

    for uri in ["/fine", "/items/7"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        assert_eq!(test::read_body(resp).await, "fine");
    }

    let resp = test::call_service(&app, test::TestRequest::get().uri("/missing").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn panic_becomes_internal_error_envelope() {
    let app = test::init_service(
        App::new()
            .wrap(Recoverer)
            .route("/boom", web::get().to(boom))
            .route("/fine", web::get().to(fine)),
    )
    .await;

    let err = test::try_call_service(&app, test::TestRequest::get().uri("/boom").to_request())
        .await
        .err()
        .expect("panic surfaces as an error");
    let resp = err.error_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(resp.into_body()).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["error"], true);
    assert_eq!(v["message"], "internal error");

    // the service keeps serving after a panic
    let resp = test::call_service(&app, test::TestRequest::get().uri("/fine").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::read_body(resp).await, "fine");
}
