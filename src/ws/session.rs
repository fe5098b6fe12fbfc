//! Session loop: the coordination point of a live connection.
//!
//! A [`Session`] owns the write half of the connection, both queues and
//! the keepalive timer. [`Session::start`] spawns the receive task and
//! the timer; [`Session::run_until`] then multiplexes
//!
//! - inbound messages (interpreted inline),
//! - outbound messages (written through the single [`MessageSink`]),
//! - the termination signal raised by the receive task,
//! - an external shutdown future,
//!
//! with no fixed priority between them, until one of them ends the
//! session. Teardown stops the timer, discards queued outbound traffic
//! and closes the connection.
//!
//! ```text
//!  MessageSource ──► receive task ──► inbound queue ──┐
//!                          │                           │
//!                          └──► termination signal ──┐ │
//!  Keepalive ──► OutboundHandle ──► outbound queue ──┤ │
//!                                                    ▼ ▼
//!                                              Session::run_until ──► MessageSink
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;
use tracing::{debug, error, info, warn};

use super::dispatch::interpret;
use super::keepalive::Keepalive;
use super::messages::RtmMessage;
use super::outbound::{self, Outbound, OutboundHandle};
use super::transport::{Inbound, MessageSink, MessageSource};
use crate::config::SessionConfig;
use crate::console::Printer;
use crate::error::ClientError;

/// Upper bound of the delay before a failed send is retried.
pub const MAX_SEND_BACKOFF: Duration = Duration::from_secs(30);

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Receive task and keepalive are being launched.
    Starting,
    /// The loop is servicing events.
    Running,
    /// Teardown in progress.
    Closing,
    /// Connection closed, timer stopped.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the connection.
    EndOfStream,
    /// The shutdown future passed to [`Session::run_until`] completed.
    Shutdown,
    /// Reading from the connection failed.
    ReadFailed,
    /// An outbound message exhausted its send attempts.
    SendFailed,
}

/// Counters accumulated over the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Inbound messages taken off the inbound queue.
    pub received: u64,
    /// Inbound messages interpreted successfully.
    pub interpreted: u64,
    /// Inbound messages skipped because interpretation failed.
    pub interpret_failures: u64,
    /// Outbound messages written successfully.
    pub sent: u64,
    /// Failed send attempts.
    pub send_failures: u64,
    /// Keepalive pings written successfully.
    pub keepalives_sent: u64,
    /// Outbound messages still queued or awaiting a retry at close, never
    /// sent.
    pub discarded: u64,
}

/// Final outcome of a session that ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Why the session ended.
    pub reason: CloseReason,
    /// Counters at close.
    pub stats: SessionStats,
}

/// Signal raised by the receive task.
#[derive(Debug)]
enum Termination {
    EndOfStream,
    ReadFailed(ClientError),
}

/// A live session over one connection.
#[derive(Debug)]
pub struct Session<W, P> {
    state: SessionState,
    config: SessionConfig,
    sink: W,
    printer: P,
    inbound_rx: mpsc::Receiver<RtmMessage>,
    outbound: OutboundHandle,
    outbound_rx: mpsc::Receiver<Outbound>,
    quit_rx: oneshot::Receiver<Termination>,
    reader: Option<JoinHandle<()>>,
    keepalive: Keepalive,
    retries: JoinSet<bool>,
    stats: SessionStats,
    close_reason: Option<CloseReason>,
}

impl<W: MessageSink, P: Printer> Session<W, P> {
    /// Launches the receive task and the keepalive timer.
    ///
    /// Must be called from within a Tokio runtime. The returned session is
    /// [`SessionState::Running`].
    pub fn start<S: MessageSource>(source: S, sink: W, printer: P, config: SessionConfig) -> Self {
        debug!(state = ?SessionState::Starting, "session starting");

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let (quit_tx, quit_rx) = oneshot::channel();
        let (outbound, outbound_rx) = outbound::channel(config.outbound_capacity);

        let reader = tokio::spawn(read_loop(source, inbound_tx, quit_tx));
        let keepalive = Keepalive::start(config.ping_interval, outbound.clone());

        info!(
            ping_interval_secs = config.ping_interval.as_secs(),
            "session running"
        );
        Self {
            state: SessionState::Running,
            config,
            sink,
            printer,
            inbound_rx,
            outbound,
            outbound_rx,
            quit_rx,
            reader: Some(reader),
            keepalive,
            retries: JoinSet::new(),
            stats: SessionStats::default(),
            close_reason: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Why the session ended, once it has.
    #[must_use]
    pub const fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// The keepalive timer of this session.
    #[must_use]
    pub const fn keepalive(&self) -> &Keepalive {
        &self.keepalive
    }

    /// The console output sink.
    #[must_use]
    pub const fn printer(&self) -> &P {
        &self.printer
    }

    /// A handle for enqueueing outbound messages on the single write path.
    #[must_use]
    pub fn outbound(&self) -> OutboundHandle {
        self.outbound.clone()
    }

    /// Runs the loop until the peer closes the connection.
    ///
    /// # Errors
    ///
    /// See [`Session::run_until`].
    pub async fn run(&mut self) -> Result<SessionSummary, ClientError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the loop until a terminal event or until `shutdown` completes.
    ///
    /// The session is closed on return, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the read error that ended the session,
    /// [`ClientError::SendExhausted`] when an outbound message failed on
    /// every attempt, and [`ClientError::SessionClosed`] if the session
    /// was already closed.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<SessionSummary, ClientError>
    where
        F: Future<Output = ()>,
    {
        if self.state != SessionState::Running {
            return Err(ClientError::SessionClosed);
        }
        tokio::pin!(shutdown);

        let (reason, failure) = loop {
            tokio::select! {
                Some(message) = self.inbound_rx.recv() => self.dispatch(message),
                Some(item) = self.outbound_rx.recv() => {
                    if let Err(err) = self.deliver(item).await {
                        break (CloseReason::SendFailed, Some(err));
                    }
                }
                signal = &mut self.quit_rx => {
                    break match signal {
                        Ok(Termination::EndOfStream) => (CloseReason::EndOfStream, None),
                        Ok(Termination::ReadFailed(err)) => {
                            error!(error = %err, "read failed, closing session");
                            (CloseReason::ReadFailed, Some(err))
                        }
                        // The receive task only goes away without a signal
                        // when it was aborted.
                        Err(_) => (CloseReason::EndOfStream, None),
                    };
                }
                () = &mut shutdown => break (CloseReason::Shutdown, None),
            }
        };

        self.close(reason).await;

        match failure {
            Some(err) => Err(err),
            None => Ok(SessionSummary {
                reason,
                stats: self.stats,
            }),
        }
    }

    fn dispatch(&mut self, message: RtmMessage) {
        self.stats.received += 1;
        match interpret(&message) {
            Ok(interpretation) => {
                self.stats.interpreted += 1;
                self.printer.print_line(&interpretation.to_string());
            }
            Err(err) => {
                self.stats.interpret_failures += 1;
                warn!(kind = message.kind(), error = %err, "skipping message");
            }
        }
    }

    async fn deliver(&mut self, mut item: Outbound) -> Result<(), ClientError> {
        let kind = item.message.kind().to_string();
        debug!(%kind, attempt = item.attempts + 1, "sending message");

        match self.sink.send(&item.message).await {
            Ok(()) => {
                self.stats.sent += 1;
                if item.message == RtmMessage::Ping {
                    self.stats.keepalives_sent += 1;
                }
                Ok(())
            }
            Err(err) => {
                item.attempts += 1;
                self.stats.send_failures += 1;
                if item.attempts >= self.config.max_send_attempts {
                    error!(%kind, attempts = item.attempts, error = %err, "giving up on message");
                    return Err(ClientError::SendExhausted {
                        attempts: item.attempts,
                    });
                }
                let delay = send_backoff(self.config.send_backoff, item.attempts);
                warn!(
                    %kind,
                    attempt = item.attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "message send failed, re-queueing"
                );
                self.schedule_retry(item, delay);
                Ok(())
            }
        }
    }

    /// Puts a failed message back at the tail of the outbound queue after
    /// `delay`, so newer messages may overtake it.
    fn schedule_retry(&mut self, item: Outbound, delay: Duration) {
        while self.retries.try_join_next().is_some() {}

        let outbound = self.outbound.clone();
        self.retries.spawn(async move {
            if !delay.is_zero() {
                time::sleep(delay).await;
            }
            outbound.requeue(item).await.is_ok()
        });
    }

    /// Cancels pending retries and returns how many messages they held.
    async fn cancel_retries(&mut self) -> u64 {
        self.retries.abort_all();
        let mut dropped = 0;
        while let Some(result) = self.retries.join_next().await {
            // A retry that already re-queued its message is drained with
            // the queue.
            if !matches!(result, Ok(true)) {
                dropped += 1;
            }
        }
        dropped
    }

    async fn close(&mut self, reason: CloseReason) {
        self.state = SessionState::Closing;
        info!(?reason, "session closing");

        self.keepalive.stop();

        // Messages that reached the queue before the termination signal
        // won the race are still interpreted.
        self.inbound_rx.close();
        while let Ok(message) = self.inbound_rx.try_recv() {
            self.dispatch(message);
        }

        self.stats.discarded += self.cancel_retries().await;
        self.outbound_rx.close();
        while self.outbound_rx.try_recv().is_ok() {
            self.stats.discarded += 1;
        }
        if self.stats.discarded > 0 {
            warn!(discarded = self.stats.discarded, "discarded unsent outbound messages");
        }

        self.sink.close().await;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        self.printer.print_line("Quit");
        self.close_reason = Some(reason);
        self.state = SessionState::Closed;
        info!(
            received = self.stats.received,
            sent = self.stats.sent,
            send_failures = self.stats.send_failures,
            "session closed"
        );
    }
}

impl<W, P> Drop for Session<W, P> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Forwards decoded messages into the inbound queue until end of stream
/// or a non-transient read error, then raises the termination signal.
async fn read_loop<S: MessageSource>(
    mut source: S,
    inbound: mpsc::Sender<RtmMessage>,
    quit: oneshot::Sender<Termination>,
) {
    debug!("listening");
    let termination = loop {
        match source.receive().await {
            Ok(Inbound::Message(message)) => {
                if inbound.send(message).await.is_err() {
                    debug!("session gone, receive task exiting");
                    return;
                }
            }
            Ok(Inbound::Closed) => break Termination::EndOfStream,
            Err(err) if err.is_transient() => {
                warn!(error = %err, "dropping undecodable message");
            }
            Err(err) => break Termination::ReadFailed(err),
        }
    };
    if quit.send(termination).is_err() {
        debug!("session gone before termination signal");
    }
}

/// Exponential delay before the `attempts`-th retry, capped at
/// [`MAX_SEND_BACKOFF`].
#[must_use]
pub fn send_backoff(base: Duration, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(16);
    base.checked_mul(2u32.pow(exponent))
        .unwrap_or(MAX_SEND_BACKOFF)
        .min(MAX_SEND_BACKOFF)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::ws::messages::ChatMessage;

    /// Source fed by the test through a channel; never ends on its own.
    struct ScriptedSource {
        rx: mpsc::UnboundedReceiver<Result<Inbound, ClientError>>,
    }

    impl MessageSource for ScriptedSource {
        async fn receive(&mut self) -> Result<Inbound, ClientError> {
            match self.rx.recv().await {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }
    }

    fn scripted() -> (
        mpsc::UnboundedSender<Result<Inbound, ClientError>>,
        ScriptedSource,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, ScriptedSource { rx })
    }

    /// Sink recording every message; fails the first `failures` sends.
    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<RtmMessage>>>,
        failures: Arc<Mutex<u32>>,
        closes: Arc<Mutex<u32>>,
    }

    impl RecordingSink {
        fn failing(failures: u32) -> Self {
            let sink = Self::default();
            if let Ok(mut left) = sink.failures.lock() {
                *left = failures;
            }
            sink
        }

        fn sent(&self) -> Vec<RtmMessage> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }

        fn failures_left(&self) -> u32 {
            self.failures.lock().map(|f| *f).unwrap_or_default()
        }

        fn closes(&self) -> u32 {
            self.closes.lock().map(|c| *c).unwrap_or_default()
        }
    }

    impl MessageSink for RecordingSink {
        async fn send(&mut self, message: &RtmMessage) -> Result<(), ClientError> {
            if let Ok(mut left) = self.failures.lock()
                && *left > 0
            {
                *left -= 1;
                return Err(ClientError::from(
                    tokio_tungstenite::tungstenite::Error::AlreadyClosed,
                ));
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(message.clone());
            }
            Ok(())
        }

        async fn close(&mut self) {
            if let Ok(mut closes) = self.closes.lock() {
                *closes += 1;
            }
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            send_backoff: Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    fn decoded(text: &str) -> Result<Inbound, ClientError> {
        RtmMessage::decode(text.as_bytes()).map(Inbound::Message)
    }

    #[tokio::test]
    async fn end_of_stream_closes_session() {
        let (tx, source) = scripted();
        let sink = RecordingSink::default();
        let mut session = Session::start(source, sink.clone(), Vec::<String>::new(), config());
        assert_eq!(session.state(), SessionState::Running);

        let _ = tx.send(Ok(Inbound::Closed));
        let Ok(summary) = session.run().await else {
            panic!("end of stream is not an error");
        };

        assert_eq!(summary.reason, CloseReason::EndOfStream);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.close_reason(), Some(CloseReason::EndOfStream));
        assert!(!session.keepalive().is_running());
        assert_eq!(sink.closes(), 1);
        assert_eq!(session.printer().last().map(String::as_str), Some("Quit"));
    }

    #[tokio::test]
    async fn inbound_messages_are_interpreted_in_order() {
        let (tx, source) = scripted();
        let sink = RecordingSink::default();
        let mut session = Session::start(source, sink.clone(), Vec::<String>::new(), config());

        let _ = tx.send(decoded(r#"{"type":"hello"}"#));
        let _ = tx.send(decoded(
            r#"{"type":"message","user":"bob","text":"hi","channel":"C1"}"#,
        ));
        let _ = tx.send(decoded(r#"{"type":"weird_event"}"#));
        let _ = tx.send(Ok(Inbound::Closed));

        let Ok(summary) = session.run().await else {
            panic!("session failed");
        };

        assert_eq!(
            session.printer().as_slice(),
            [
                "Hello!",
                "bob say: hi in channel: C1",
                "Unknown action happens: weird_event",
                "Quit",
            ]
        );
        assert_eq!(summary.stats.received, 3);
        assert_eq!(summary.stats.interpreted, 3);
        // Interpretation never produces outbound traffic.
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn undecodable_and_incomplete_messages_do_not_stop_the_loop() {
        let (tx, source) = scripted();
        let mut session = Session::start(
            source,
            RecordingSink::default(),
            Vec::<String>::new(),
            config(),
        );

        let _ = tx.send(decoded("not json"));
        let _ = tx.send(decoded(r#"{"type":"message","text":"no author"}"#));
        let _ = tx.send(decoded(r#"{"type":"hello"}"#));
        let _ = tx.send(Ok(Inbound::Closed));

        let Ok(summary) = session.run().await else {
            panic!("session failed");
        };
        assert_eq!(summary.stats.received, 2);
        assert_eq!(summary.stats.interpret_failures, 1);
        assert_eq!(session.printer().as_slice(), ["Hello!", "Quit"]);
    }

    #[tokio::test]
    async fn fatal_read_error_surfaces() {
        let (tx, source) = scripted();
        let mut session = Session::start(
            source,
            RecordingSink::default(),
            Vec::<String>::new(),
            config(),
        );

        let _ = tx.send(Err(ClientError::from(
            tokio_tungstenite::tungstenite::Error::AttackAttempt,
        )));

        let result = session.run().await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(session.close_reason(), Some(CloseReason::ReadFailed));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn failed_send_is_retried_until_delivered() {
        let (tx, source) = scripted();
        let sink = RecordingSink::failing(2);
        let mut session = Session::start(source, sink.clone(), Vec::<String>::new(), config());

        let Ok(()) = session.outbound().enqueue(RtmMessage::Ping).await else {
            panic!("enqueue failed");
        };

        let probe = sink.clone();
        let run = session.run_until(async move {
            while probe.sent().is_empty() {
                tokio::task::yield_now().await;
            }
        });
        let Ok(summary) = run.await else {
            panic!("session failed");
        };
        drop(tx);

        assert_eq!(summary.reason, CloseReason::Shutdown);
        assert_eq!(sink.sent(), [RtmMessage::Ping]);
        assert_eq!(summary.stats.send_failures, 2);
        assert_eq!(summary.stats.sent, 1);
    }

    #[tokio::test]
    async fn exhausted_send_terminates_session() {
        let (_tx, source) = scripted();
        let sink = RecordingSink::failing(u32::MAX);
        let cfg = SessionConfig {
            max_send_attempts: 3,
            ..config()
        };
        let mut session = Session::start(source, sink.clone(), Vec::<String>::new(), cfg);

        let Ok(()) = session.outbound().enqueue(RtmMessage::Ping).await else {
            panic!("enqueue failed");
        };
        let result = session.run().await;

        let Err(ClientError::SendExhausted { attempts }) = result else {
            panic!("expected exhausted sends");
        };
        assert_eq!(attempts, 3);
        assert_eq!(session.close_reason(), Some(CloseReason::SendFailed));
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn retried_message_goes_behind_newer_ones() {
        let (_tx, source) = scripted();
        let sink = RecordingSink::failing(1);
        let mut session = Session::start(source, sink.clone(), Vec::<String>::new(), config());

        let first = RtmMessage::Message(ChatMessage {
            text: Some("first".into()),
            channel: Some("C1".into()),
            ..ChatMessage::default()
        });
        let outbound = session.outbound();
        let Ok(()) = outbound.enqueue(first.clone()).await else {
            panic!("enqueue failed");
        };
        let Ok(()) = outbound.enqueue(RtmMessage::Ping).await else {
            panic!("enqueue failed");
        };

        let probe = sink.clone();
        let Ok(summary) = session
            .run_until(async move {
                while probe.sent().len() < 2 {
                    tokio::task::yield_now().await;
                }
            })
            .await
        else {
            panic!("session failed");
        };

        assert_eq!(sink.sent(), [RtmMessage::Ping, first]);
        assert_eq!(summary.stats.send_failures, 1);
        assert_eq!(summary.stats.discarded, 0);
    }

    #[tokio::test]
    async fn pending_retry_is_discarded_at_close() {
        let (_tx, source) = scripted();
        let sink = RecordingSink::failing(1);
        let cfg = SessionConfig {
            send_backoff: Duration::from_secs(3600),
            ..config()
        };
        let mut session = Session::start(source, sink.clone(), Vec::<String>::new(), cfg);

        let Ok(()) = session.outbound().enqueue(RtmMessage::Ping).await else {
            panic!("enqueue failed");
        };

        let probe = sink.clone();
        let Ok(summary) = session
            .run_until(async move {
                while probe.failures_left() > 0 {
                    tokio::task::yield_now().await;
                }
            })
            .await
        else {
            panic!("session failed");
        };

        assert_eq!(summary.reason, CloseReason::Shutdown);
        assert_eq!(summary.stats.send_failures, 1);
        assert_eq!(summary.stats.discarded, 1);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_pings_stop_at_close() {
        let (tx, source) = scripted();
        let sink = RecordingSink::default();
        let mut session = Session::start(source, sink.clone(), Vec::<String>::new(), config());

        let closer = tokio::spawn(async move {
            time::sleep(Duration::from_secs(35)).await;
            let _ = tx.send(Ok(Inbound::Closed));
            tx
        });

        let Ok(summary) = session.run().await else {
            panic!("session failed");
        };
        assert_eq!(summary.stats.keepalives_sent, 3);
        assert_eq!(sink.sent(), [RtmMessage::Ping, RtmMessage::Ping, RtmMessage::Ping]);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sink.sent().len(), 3);
        assert_eq!(session.keepalive().fired(), 3);
        let _ = closer.await;
    }

    #[tokio::test]
    async fn shutdown_closes_outbound_queue() {
        let (_tx, source) = scripted();
        let mut session = Session::start(
            source,
            RecordingSink::default(),
            Vec::<String>::new(),
            config(),
        );
        let outbound = session.outbound();

        let Ok(summary) = session.run_until(async {}).await else {
            panic!("session failed");
        };
        assert_eq!(summary.reason, CloseReason::Shutdown);
        assert!(matches!(
            outbound.enqueue(RtmMessage::Ping).await,
            Err(ClientError::SessionClosed)
        ));
        assert!(matches!(
            session.run().await,
            Err(ClientError::SessionClosed)
        ));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(250);
        assert_eq!(send_backoff(base, 1), Duration::from_millis(250));
        assert_eq!(send_backoff(base, 2), Duration::from_millis(500));
        assert_eq!(send_backoff(base, 3), Duration::from_secs(1));
        assert_eq!(send_backoff(base, 30), MAX_SEND_BACKOFF);
        assert_eq!(send_backoff(Duration::ZERO, 4), Duration::ZERO);
    }
}
