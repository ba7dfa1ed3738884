use std::net::TcpListener;

use axum::Router;
use reqwest::Url;

/// Serves `router` on an ephemeral local port, returns its base url.
pub async fn serve(router: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router.into_make_service())
            .await
            .unwrap();
    });

    Url::parse(&format!("http://{}/", addr)).unwrap()
}
