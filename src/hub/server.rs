/// Hub server: accept loop, per-connection task, teardown.
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::command;
use super::error::SessionError;
use super::message::ServerLine;
use super::state::{HubState, SharedState};
use super::transport::Session;
use crate::config::HubConfig;

/// Run the hub with the given configuration.
pub async fn run(config: &HubConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Bind first, so we fail fast on port conflicts.
    let listener = TcpListener::bind(config.bind.as_str()).await?;
    info!(bind = %config.bind, server_ip = %config.server_ip, "chathub listening");

    let state = HubState::shared(config.server_ip.clone());
    accept_loop(listener, state).await
}

/// Accept loop for a single listener.
pub async fn accept_loop(
    listener: TcpListener,
    state: SharedState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (socket, addr) = listener.accept().await?;
        info!(%addr, "new connection");
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, addr, state).await {
                warn!(%addr, "client error: {e}");
            }
            info!(%addr, "disconnected");
        });
    }
}

/// Handle a single client connection from handshake to teardown.
pub async fn handle_client<S>(
    stream: S,
    addr: SocketAddr,
    state: SharedState,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new(stream, addr);
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerLine>();

    let Some(name) = session.negotiate(&state, tx).await? else {
        return Ok(());
    };

    let result = serve_member(&mut session, &name, &mut rx, &state).await;

    // Clean up on disconnect, whatever ended the session.
    cleanup_client(&name, &state).await;
    result
}

/// Relay lines between a registered member and the hub until the session
/// ends.
async fn serve_member<S>(
    session: &mut Session<S>,
    name: &str,
    rx: &mut mpsc::UnboundedReceiver<ServerLine>,
    state: &SharedState,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            // Incoming line from the client.
            line = session.read_line() => {
                let Some(line) = line? else {
                    break; // Connection closed.
                };

                if apply_line(state, name, &line).await {
                    info!(name, "quit");
                    break;
                }
            }

            // Outgoing line queued by any task (including this one).
            Some(line) = rx.recv() => {
                session.send_line(line).await?;
            }
        }
    }

    // Best-effort flush of what was queued before the session ended.
    while let Ok(line) = rx.try_recv() {
        if session.send_line(line).await.is_err() {
            break;
        }
    }
    Ok(())
}

/// Dispatch one line from `name` and publish the result under the same
/// write guard. Returns true when the member asked to quit.
pub async fn apply_line(state: &SharedState, name: &str, line: &str) -> bool {
    let mut st = state.write().await;
    let dispatch = command::dispatch(&mut st, name, line);
    st.publish(dispatch.outbound);
    dispatch.quit
}

/// Deregister a departing member and announce the consequences.
async fn cleanup_client(name: &str, state: &SharedState) {
    {
        let mut st = state.write().await;
        let out = st.leave(name);
        st.publish(out);
    }
    info!(name, "cleaned up");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::codec::LineCodec;
    use pretty_assertions::assert_eq;
    use tokio::io::AsyncWriteExt;
    use tokio_stream::StreamExt;
    use tokio_util::codec::FramedRead;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn joining_member_gets_name_accepted_before_chat() {
        let state = HubState::shared("10.0.0.254");
        let (bob_tx, _bob_rx) = mpsc::unbounded_channel();
        {
            let mut st = state.write().await;
            let out = st.join("bob", "10.0.0.2", bob_tx).unwrap();
            st.publish(out);
        }

        // bob keeps chatting while dave goes through the handshake.
        let chatter = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                for _ in 0..500 {
                    apply_line(&state, "bob", "hi").await;
                    tokio::task::yield_now().await;
                }
            }
        });

        let (server, client) = tokio::io::duplex(64 * 1024);
        let (rd, mut wr) = tokio::io::split(client);
        let mut lines = FramedRead::new(rd, LineCodec);
        let (dave_tx, mut dave_rx) = mpsc::unbounded_channel();
        let handshake = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                let mut session = Session::new(server, "192.0.2.9:40000".parse().unwrap());
                session.negotiate(&state, dave_tx).await
            }
        });

        assert_eq!(lines.next().await.unwrap().unwrap(), "GETIP");
        wr.write_all(b"10.0.0.4\n").await.unwrap();
        assert_eq!(lines.next().await.unwrap().unwrap(), "SUBMITNAME");
        wr.write_all(b"dave\n").await.unwrap();

        assert_eq!(handshake.await.unwrap().unwrap().as_deref(), Some("dave"));
        assert_eq!(
            dave_rx.recv().await,
            Some(ServerLine::NameAccepted("dave".into()))
        );
        chatter.await.unwrap();
    }

    #[tokio::test]
    async fn quit_line_reports_quit_and_stays_registered_until_cleanup() {
        let state = HubState::shared("10.0.0.254");
        let (tx, _rx) = mpsc::unbounded_channel();
        {
            let mut st = state.write().await;
            let out = st.join("alice", "10.0.0.1", tx).unwrap();
            st.publish(out);
        }

        assert!(!apply_line(&state, "alice", "hello").await);
        assert!(apply_line(&state, "alice", "/quit").await);
        assert!(state.read().await.registry.contains("alice"));

        cleanup_client("alice", &state).await;
        assert!(state.read().await.registry.is_empty());
    }
}
