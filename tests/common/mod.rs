#![allow(dead_code)]

use hyper::server::conn::Http;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls;

/// Bind a loopback listener on an ephemeral port
pub fn listener() -> TcpListener {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    listener
}

/// Serve `handler` over plain HTTP on an ephemeral port
pub fn serve<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    serve_on(listener(), handler)
}

/// Serve `handler` over plain HTTP on an already bound listener
pub fn serve_on<F, Fut>(listener: TcpListener, handler: F) -> SocketAddr
where
    F: Fn(Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    let addr = listener.local_addr().unwrap();
    let make_svc = make_service_fn(move |_conn| {
        let handler = handler.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let response = handler(req);
                async move { Ok::<_, Infallible>(response.await) }
            }))
        }
    });

    let server = Server::from_tcp(listener).unwrap().serve(make_svc);
    tokio::spawn(server);
    addr
}

/// A backend that answers every request with `200 OK` and counts them
pub fn counting_server(body: &'static str) -> (SocketAddr, Arc<AtomicU64>) {
    let hits = Arc::new(AtomicU64::new(0));
    let addr = serve({
        let hits = hits.clone();
        move |_req: Request<Body>| {
            hits.fetch_add(1, Ordering::SeqCst);
            async move { Response::new(Body::from(body)) }
        }
    });
    (addr, hits)
}

pub fn redirect(location: &str, status: StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Location", location)
        .body(Body::empty())
        .unwrap()
}

/// Serve HTTPS with a freshly generated self-signed certificate
pub fn serve_self_signed(body: &'static str) -> (SocketAddr, Arc<AtomicU64>) {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = cert.serialize_der().unwrap();
    let key_der = cert.serialize_private_key_der();

    let config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(vec![rustls::Certificate(cert_der)], rustls::PrivateKey(key_der))
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = tokio::net::TcpListener::from_std(listener()).unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicU64::new(0));

    let served = hits.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let hits = served.clone();
            tokio::spawn(async move {
                let Ok(tls) = acceptor.accept(stream).await else {
                    return;
                };
                let service = service_fn(move |_req: Request<Body>| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    async move { Ok::<_, Infallible>(Response::new(Body::from(body))) }
                });
                let _ = Http::new().serve_connection(tls, service).await;
            });
        }
    });

    (addr, hits)
}
