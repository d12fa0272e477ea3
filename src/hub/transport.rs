/// Transport session: one framed connection, plus the setup handshake
/// that turns it into a registered member.
use std::net::SocketAddr;

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use super::codec::LineCodec;
use super::error::SessionError;
use super::message::ServerLine;
use super::registry::ClientTx;
use super::state::SharedState;

/// A connected client before and after registration.
pub struct Session<S> {
    framed: Framed<S, LineCodec>,
    peer: SocketAddr,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self {
            framed: Framed::new(stream, LineCodec),
            peer,
        }
    }

    /// Next line from the client, or `None` once the stream has ended.
    pub async fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        match self.framed.next().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Write one line straight to this client.
    pub async fn send_line(&mut self, line: ServerLine) -> Result<(), SessionError> {
        self.framed.send(line).await?;
        Ok(())
    }

    /// Ask the client for its address.
    ///
    /// A blank answer falls back to the peer IP of the socket.
    pub async fn request_address(&mut self) -> Result<Option<String>, SessionError> {
        self.send_line(ServerLine::GetIp).await?;
        let Some(reported) = self.read_line().await? else {
            return Ok(None);
        };
        let reported = reported.trim();
        if reported.is_empty() {
            Ok(Some(self.peer.ip().to_string()))
        } else {
            Ok(Some(reported.to_owned()))
        }
    }

    /// Run the setup handshake and register the member.
    ///
    /// Sends `GETIP`, then `SUBMITNAME` until a free name comes back. On
    /// success the member is registered with `tx` as its send handle and
    /// the join announcements are delivered. Returns `None` if the client
    /// hangs up first.
    pub async fn negotiate(
        &mut self,
        state: &SharedState,
        tx: ClientTx,
    ) -> Result<Option<String>, SessionError> {
        let Some(address) = self.request_address().await? else {
            return Ok(None);
        };

        loop {
            self.send_line(ServerLine::SubmitName).await?;
            let Some(name) = self.read_line().await? else {
                return Ok(None);
            };

            {
                let mut st = state.write().await;
                match st.join(&name, &address, tx.clone()) {
                    Ok(out) => st.publish(out),
                    Err(e) => {
                        debug!(peer = %self.peer, name, "name rejected: {e}");
                        continue;
                    }
                };
            }
            info!(peer = %self.peer, name, address, "name accepted");
            return Ok(Some(name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::state::HubState;
    use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
    use tokio::sync::mpsc;
    use tokio_util::codec::FramedRead;

    fn peer() -> SocketAddr {
        "192.0.2.7:40000".parse().unwrap()
    }

    struct Client {
        lines: FramedRead<ReadHalf<DuplexStream>, LineCodec>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Client {
        async fn expect(&mut self, wire: &str) {
            let line = self.lines.next().await.unwrap().unwrap();
            assert_eq!(line, wire);
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        }
    }

    fn pair() -> (Session<DuplexStream>, Client) {
        let (server, client) = tokio::io::duplex(4096);
        let (rd, writer) = tokio::io::split(client);
        (
            Session::new(server, peer()),
            Client {
                lines: FramedRead::new(rd, LineCodec),
                writer,
            },
        )
    }

    #[tokio::test]
    async fn handshake_retries_taken_name() {
        let state = HubState::shared("10.0.0.254");
        {
            let (tx, _rx) = mpsc::unbounded_channel();
            state.write().await.join("alice", "10.0.0.1", tx).unwrap();
        }

        let (mut session, mut client) = pair();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn({
            let state = state.clone();
            async move { session.negotiate(&state, tx).await.map(|n| (n, session)) }
        });

        client.expect("GETIP").await;
        client.send("10.0.0.2").await;
        client.expect("SUBMITNAME").await;
        client.send("alice").await;
        client.expect("SUBMITNAME").await;
        client.send("").await;
        client.expect("SUBMITNAME").await;
        client.send("bob").await;

        let (name, _session) = task.await.unwrap().unwrap();
        assert_eq!(name.as_deref(), Some("bob"));
        assert_eq!(rx.recv().await, Some(ServerLine::NameAccepted("bob".into())));
        assert_eq!(state.read().await.registry.address_log(), ["10.0.0.1", "10.0.0.2"]);
    }

    #[tokio::test]
    async fn blank_address_uses_peer_ip() {
        let state = HubState::shared("10.0.0.254");
        let (mut session, mut client) = pair();
        let (tx, _rx) = mpsc::unbounded_channel();
        let task = tokio::spawn({
            let state = state.clone();
            async move { session.negotiate(&state, tx).await.map(|_| ()) }
        });

        client.expect("GETIP").await;
        client.send("").await;
        client.expect("SUBMITNAME").await;
        client.send("carol").await;
        task.await.unwrap().unwrap();

        let st = state.read().await;
        assert_eq!(st.registry.get("carol").unwrap().address, "192.0.2.7");
    }

    #[tokio::test]
    async fn hangup_during_handshake_registers_nobody() {
        let state = HubState::shared("10.0.0.254");
        let (mut session, mut client) = pair();
        let (tx, _rx) = mpsc::unbounded_channel();
        let task = tokio::spawn({
            let state = state.clone();
            async move { session.negotiate(&state, tx).await }
        });

        client.expect("GETIP").await;
        client.send("10.0.0.3").await;
        client.expect("SUBMITNAME").await;
        drop(client);

        assert_eq!(task.await.unwrap().unwrap(), None);
        assert!(state.read().await.registry.is_empty());
    }
}
