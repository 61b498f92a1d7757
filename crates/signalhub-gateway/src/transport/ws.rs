//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS (refused while draining)
//! - Register the connection and drive its lifecycle:
//!   handshake -> connected loop -> disconnecting -> closed
//! - Heartbeat ping + idle timeout
//! - Policy (size, rate) before decode, then dispatch through the handler table
//! - Drain the connection's outbound queue to the socket

use std::sync::Arc;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Duration, Instant};
use tracing::Instrument;

use signalhub_core::error::HubError;
use signalhub_core::protocol::handshake::parse_handshake;
use signalhub_core::protocol::text::{error_json, welcome_json};

use crate::app_state::AppState;
use crate::policy::{ConnRateLimiter, PolicyDecision};
use crate::realtime::{CloseReason, Connection, HubCtx, PreparedMsg};
use crate::transport::codec::{decode, frame_len, is_data_frame, Inbound};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// What the loop does after an inbound frame.
enum Flow {
    Continue,
    /// Close the connection, optionally sending an error frame first.
    Close {
        reason: CloseReason,
        error: Option<String>,
    },
}

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if app.is_draining() {
        return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
    }
    // Frames over twice the policy limit are cut off by the socket itself;
    // anything in between gets a PAYLOAD_TOO_LARGE error frame first.
    let max = app.policy().max_frame_bytes().saturating_mul(2);
    ws.max_message_size(max)
        .on_upgrade(move |socket| run_session(app, socket))
}

// --------------------
// Session
// --------------------
async fn run_session(app: AppState, mut socket: WebSocket) {
    let hub = app.hub();
    let conn = match hub.connect() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(error = %e, "upgrade raced shutdown, dropping socket");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    let conn_id: Arc<str> = Arc::from(conn.id());

    let span = tracing::info_span!("session", conn_id = %conn_id);
    let reason = drive(&app, &conn, socket).instrument(span.clone()).await;

    span.in_scope(|| {
        tracing::info!(reason = reason.as_str(), "session ended");
    });
    hub.disconnect(&conn_id, reason);
}

async fn drive(app: &AppState, conn: &Arc<Connection>, socket: WebSocket) -> CloseReason {
    let (mut ws_tx, mut ws_rx) = socket.split();

    if let Err(reason) = handshake(app, conn, &mut ws_tx, &mut ws_rx).await {
        return reason;
    }
    tracing::info!("session connected");

    let server = &app.cfg().server;
    let ping_every = Duration::from_millis(server.ping_interval_ms);
    let idle_timeout = Duration::from_millis(server.idle_timeout_ms);

    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut last_activity = Instant::now();
    let mut limiter = app.policy().new_connection_limiter();
    let ctx = HubCtx::new(conn.id(), app.hub());

    loop {
        tokio::select! {
            // outbound writer
            maybe_out = conn.queue().recv() => {
                match maybe_out {
                    Some(m) => {
                        if let Err(e) = ws_tx.send(m.to_ws_message()).await {
                            tracing::debug!(error = %e, "socket write failed");
                            return CloseReason::TransportError;
                        }
                    }
                    None => {
                        // Queue closed by overflow policy or hub shutdown.
                        let _ = ws_tx.send(Message::Close(None)).await;
                        return if app.is_draining() {
                            CloseReason::Shutdown
                        } else {
                            CloseReason::Overflow
                        };
                    }
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let msg = match incoming {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "socket read failed");
                        return CloseReason::TransportError;
                    }
                    None => return CloseReason::ClientClosed,
                };
                last_activity = Instant::now();

                if let Flow::Close { reason, error } = handle_inbound(app, &ctx, &mut limiter, msg).await {
                    if let Some(err) = error {
                        let _ = ws_tx.send(Message::Text(err)).await;
                    }
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return reason;
                }
            }

            // heartbeat
            _ = ping_tick.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    return CloseReason::TransportError;
                }
            }

            // idle timeout
            _ = tokio::time::sleep_until(last_activity + idle_timeout) => {
                let e = HubError::IdleTimeout;
                let frame = error_json(e.client_code().as_str(), &e.to_string());
                let _ = ws_tx.send(Message::Text(frame)).await;
                let _ = ws_tx.send(Message::Close(None)).await;
                return CloseReason::IdleTimeout;
            }
        }
    }
}

/// Wait for `{"protocol":"json","version":1}` and answer with `welcome`.
async fn handshake(
    app: &AppState,
    conn: &Connection,
    ws_tx: &mut WsSink,
    ws_rx: &mut WsStream,
) -> Result<(), CloseReason> {
    let deadline = Duration::from_millis(app.cfg().server.handshake_timeout_ms);

    let first = tokio::time::timeout(deadline, async {
        loop {
            match ws_rx.next().await {
                Some(Ok(Message::Text(s))) => return Ok(s),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Binary(_))) => {
                    return Err(Some(HubError::HandshakeFailed(
                        "expected text handshake frame".into(),
                    )))
                }
                Some(Ok(Message::Close(_))) | None => return Err(None),
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "socket read failed during handshake");
                    return Err(None);
                }
            }
        }
    })
    .await;

    let text = match first {
        Ok(Ok(s)) => s,
        Ok(Err(None)) => return Err(CloseReason::ClientClosed),
        Ok(Err(Some(e))) => return Err(fail_handshake(app, ws_tx, e).await),
        Err(_) => {
            let e = HubError::HandshakeFailed("handshake timed out".into());
            return Err(fail_handshake(app, ws_tx, e).await);
        }
    };

    if let Err(e) = parse_handshake(&text) {
        return Err(fail_handshake(app, ws_tx, e).await);
    }
    if let Err(e) = app.hub().handshake_ok(conn.id()) {
        // Closed underneath us (shutdown raced the handshake).
        tracing::debug!(error = %e, "handshake completed on a closing connection");
        return Err(CloseReason::Shutdown);
    }
    if ws_tx.send(Message::Text(welcome_json(conn.id()))).await.is_err() {
        return Err(CloseReason::TransportError);
    }
    Ok(())
}

async fn fail_handshake(app: &AppState, ws_tx: &mut WsSink, e: HubError) -> CloseReason {
    let code = e.client_code().as_str();
    app.metrics().errors.inc(&[("code", code)]);
    tracing::info!(error = %e, "handshake failed");
    let _ = ws_tx.send(Message::Text(error_json(code, &e.to_string()))).await;
    let _ = ws_tx.send(Message::Close(None)).await;
    CloseReason::HandshakeFailed
}

async fn handle_inbound(
    app: &AppState,
    ctx: &HubCtx,
    limiter: &mut Option<ConnRateLimiter>,
    msg: Message,
) -> Flow {
    // cheap-first: size and rate before any parsing
    if is_data_frame(&msg) {
        match app.policy().check(frame_len(&msg), limiter.as_mut()) {
            PolicyDecision::Pass => {}
            PolicyDecision::Reject { code, msg } => {
                app.metrics().errors.inc(&[("code", code.as_str())]);
                reply_error(ctx, code.as_str(), msg);
                return Flow::Continue;
            }
            PolicyDecision::Close { code, msg } => {
                app.metrics().errors.inc(&[("code", code.as_str())]);
                tracing::info!(code = code.as_str(), msg, "closing on policy violation");
                return Flow::Close {
                    reason: CloseReason::Policy,
                    error: Some(error_json(code.as_str(), msg)),
                };
            }
        }
    }

    let inbound = match decode(msg) {
        Ok(i) => i,
        Err(e) => {
            report_error(app, ctx, &e);
            return Flow::Continue;
        }
    };

    let res = match inbound {
        // axum answers pings itself
        Inbound::Ping | Inbound::Pong => return Flow::Continue,
        Inbound::Close => {
            return Flow::Close {
                reason: CloseReason::ClientClosed,
                error: None,
            }
        }
        Inbound::Text(env) => {
            app.metrics().messages_in.inc(&[("kind", env.kind.as_str())]);
            app.dispatcher().dispatch(ctx.clone(), env).await
        }
        Inbound::Binary(frame) => {
            app.metrics().messages_in.inc(&[("kind", frame.op.as_str())]);
            app.dispatcher().dispatch_binary(ctx.clone(), frame).await
        }
    };

    if let Err(e) = res {
        report_error(app, ctx, &e);
    }
    Flow::Continue
}

/// Benign errors are logged only; everything else goes back to the sender.
fn report_error(app: &AppState, ctx: &HubCtx, e: &HubError) {
    if e.is_benign() {
        tracing::debug!(error = %e, "ignored");
        return;
    }
    let code = e.client_code().as_str();
    app.metrics().errors.inc(&[("code", code)]);
    tracing::debug!(error = %e, code, "message rejected");
    reply_error(ctx, code, &e.to_string());
}

fn reply_error(ctx: &HubCtx, code: &str, msg: &str) {
    let _ = ctx.reply(PreparedMsg::text(error_json(code, msg)));
}
