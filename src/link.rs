use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::LinkError;
use crate::protocol::Message;
use crate::settings::{FeedbackMode, Role};

const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Why the peer went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// the peer sent `DISCONNECT` before closing
    Left,
    /// read failure or end of stream
    Lost(String),
}

/// What the receive loop hands to the match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Message(Message),
    Disconnected(DisconnectReason),
}

/// What the host shares with the joiner before the race starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub passage: String,
    pub round_secs: u32,
    pub difficulty: u8,
    pub mode: FeedbackMode,
}

/// Outbound half of a peer connection as seen by the match
///
/// All sends are fire-and-forget: once the link is stopped they do nothing, and write
/// failures are swallowed since the receive loop reports the broken connection.
pub trait PeerChannel: Send {
    fn role(&self) -> Role;

    fn send(&self, msg: &Message);

    /// Idempotent, callable from any thread.
    fn stop(&self);

    fn send_progress(&self, position: u32, errors: u32) {
        self.send(&Message::Progress { position, errors });
    }

    fn send_finished(&self) {
        self.send(&Message::Finished);
    }

    fn send_pause(&self) {
        self.send(&Message::Pause);
    }

    fn send_resume(&self) {
        self.send(&Message::Resume);
    }

    fn send_disconnect(&self) {
        self.send(&Message::Disconnect);
    }

    fn send_final_score(&self, score: u32, errors: u32) {
        self.send(&Message::FinalScore { score, errors });
    }
}

/// A single TCP connection to the other player
pub struct PeerLink {
    role: Role,
    running: Arc<AtomicBool>,
    writer: Mutex<TcpStream>,
}

impl PeerLink {
    /// Listen on `port`, wait for one joiner, share the round setup and start receiving.
    pub fn host<F>(
        port: u16,
        handshake: &Handshake,
        cancel: &AtomicBool,
        sink: F,
    ) -> Result<Self, LinkError>
    where
        F: Fn(PeerEvent) + Send + 'static,
    {
        let listener =
            TcpListener::bind(("0.0.0.0", port)).map_err(|source| LinkError::Bind { port, source })?;
        info!(port, "hosting, waiting for an opponent");
        Self::host_on(listener, handshake, cancel, sink)
    }

    pub fn host_on<F>(
        listener: TcpListener,
        handshake: &Handshake,
        cancel: &AtomicBool,
        sink: F,
    ) -> Result<Self, LinkError>
    where
        F: Fn(PeerEvent) + Send + 'static,
    {
        let stream = accept(&listener, cancel)?;
        let link = Self::start(Role::Host, stream, sink, None)?;

        link.send(&Message::Text(handshake.passage.clone()));
        link.send(&Message::Config {
            round_secs: handshake.round_secs,
            difficulty: handshake.difficulty,
            mode: handshake.mode,
        });
        link.send(&Message::Start);
        Ok(link)
    }

    /// Connect to a host and wait for its round setup.
    pub fn join<A, F>(addr: A, sink: F) -> Result<(Self, Handshake), LinkError>
    where
        A: ToSocketAddrs + std::fmt::Display,
        F: Fn(PeerEvent) + Send + 'static,
    {
        let stream = TcpStream::connect(&addr).map_err(|source| LinkError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;
        info!(%addr, "connected to host");

        (&stream).write_all(Message::Ready.to_line().as_bytes())?;

        let mut reader = BufReader::new(stream.try_clone()?);
        let handshake = read_handshake(&mut reader)?;
        let link = Self::start(Role::Joiner, stream, sink, Some(reader))?;
        Ok((link, handshake))
    }

    fn start<F>(
        role: Role,
        stream: TcpStream,
        sink: F,
        reader: Option<BufReader<TcpStream>>,
    ) -> Result<Self, LinkError>
    where
        F: Fn(PeerEvent) + Send + 'static,
    {
        let reader = match reader {
            Some(reader) => reader,
            None => BufReader::new(stream.try_clone()?),
        };
        let running = Arc::new(AtomicBool::new(true));

        let loop_running = Arc::clone(&running);
        thread::Builder::new()
            .name("peer-link".into())
            .spawn(move || receive_loop(reader, &loop_running, sink))?;

        Ok(Self {
            role,
            running,
            writer: Mutex::new(stream),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl PeerChannel for PeerLink {
    fn role(&self) -> Role {
        self.role
    }

    fn send(&self, msg: &Message) {
        if !self.is_running() {
            return;
        }
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writer.write_all(msg.to_line().as_bytes()) {
            debug!(%err, kind = msg.name(), "send failed");
        }
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        // unblocks the receive loop; fails harmlessly when already closed
        let _ = writer.shutdown(Shutdown::Both);
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept(listener: &TcpListener, cancel: &AtomicBool) -> Result<TcpStream, LinkError> {
    listener.set_nonblocking(true)?;
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                info!(%addr, "opponent connected");
                return Ok(stream);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                if cancel.load(Ordering::SeqCst) {
                    return Err(LinkError::Cancelled);
                }
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Read lines until `START`, collecting the passage and round setup.
fn read_handshake<R: BufRead>(reader: &mut R) -> Result<Handshake, LinkError> {
    let mut passage = None;
    let mut setup = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Err(LinkError::ClosedDuringHandshake);
        }
        let line = String::from_utf8_lossy(&buf);
        match line.parse::<Message>() {
            Ok(Message::Text(text)) => passage = Some(text),
            Ok(Message::Config {
                round_secs,
                difficulty,
                mode,
            }) => setup = Some((round_secs, difficulty, mode)),
            Ok(Message::Start) => break,
            Ok(other) => debug!(kind = other.name(), "ignoring message during handshake"),
            Err(err) => debug!(%err, "dropping malformed handshake line"),
        }
    }

    let passage = passage.ok_or(LinkError::IncompleteHandshake("TEXT"))?;
    let (round_secs, difficulty, mode) = setup.ok_or(LinkError::IncompleteHandshake("CFG"))?;
    Ok(Handshake {
        passage,
        round_secs,
        difficulty,
        mode,
    })
}

/// Blocks on the connection and forwards decoded messages until the peer leaves.
///
/// Exactly one `Disconnected` event is produced, and only if the link was not stopped
/// locally first.
fn receive_loop<R, F>(mut reader: R, running: &AtomicBool, sink: F)
where
    R: BufRead,
    F: Fn(PeerEvent),
{
    let mut buf = Vec::new();
    let reason = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break DisconnectReason::Lost("connection closed".into()),
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                match line.parse::<Message>() {
                    Ok(Message::Disconnect) => break DisconnectReason::Left,
                    Ok(msg) => {
                        if !running.load(Ordering::SeqCst) {
                            return;
                        }
                        sink(PeerEvent::Message(msg));
                    }
                    Err(err) => debug!(%err, "dropping malformed message"),
                }
            }
            Err(err) => break DisconnectReason::Lost(err.to_string()),
        }
    };

    if running.swap(false, Ordering::SeqCst) {
        info!(?reason, "peer disconnected");
        sink(PeerEvent::Disconnected(reason));
    }
}
