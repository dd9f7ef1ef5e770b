//! HTTP endpoints for metrics, probes and the route table

use crate::RouteController;
use anyhow::Result;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use router_bgp::ExternalIpRouteTable;
use router_core::ControllerMetrics;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ServerState {
    pub metrics: ControllerMetrics,
    pub table: Arc<ExternalIpRouteTable>,
    pub controller: Arc<RouteController>,
}

/// Serve HTTP/1 connections until `shutdown` is cancelled
pub async fn serve(addr: SocketAddr, state: Arc<ServerState>, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, peer_addr) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(connection) => connection,
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                    continue;
                }
            },
        };
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let state = state.clone();
                async move { Ok::<_, hyper::Error>(respond(req.method(), req.uri().path(), &state).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving connection from {}: {}", peer_addr, e);
            }
        });
    }

    info!("Metrics server stopped");
    Ok(())
}

async fn respond(method: &Method, path: &str, state: &ServerState) -> Response<Full<Bytes>> {
    debug!("{} {}", method, path);

    if method != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n");
    }

    match path {
        "/metrics" => match state.metrics.gather() {
            Ok(body) => with_content_type(StatusCode::OK, "text/plain; version=0.0.4", body),
            Err(e) => {
                warn!("Failed to gather metrics: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to gather metrics\n")
            }
        },
        "/healthz" => text(StatusCode::OK, "OK\n"),
        "/readyz" => {
            if state.controller.has_synced() {
                text(StatusCode::OK, "OK\n")
            } else {
                text(StatusCode::SERVICE_UNAVAILABLE, "Informers not synced\n")
            }
        }
        "/routes" => match serde_json::to_vec(&state.table.routes().await) {
            Ok(body) => with_content_type(StatusCode::OK, "application/json", body),
            Err(e) => {
                warn!("Failed to encode routes: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode routes\n")
            }
        },
        _ => text(StatusCode::NOT_FOUND, "Not Found\n"),
    }
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    with_content_type(status, "text/plain", body)
}

fn with_content_type(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
