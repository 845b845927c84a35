//! SMTP client state machine (spec §4.10): drives one mail at a time
//! through a connection, governed purely by response code class. Socket
//! I/O is the caller's concern — `step` is a pure function of
//! `(state, event)` returning the next action(s) to perform.
//!
//! Grounded on `original_source/mail-smtp.c`'s state table.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    Closed,
    Connecting,
    WaitingGreeting,
    Idle,
    SentEhlo,
    SentHelo,
    SentMailFrom,
    SentRcptTo,
    SentData,
    SentBody,
    SentRset,
    SentQuit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo,
    Helo,
    MailFrom(String),
    RcptTo(String),
    Data,
    Body(String),
    Rset,
    Quit,
}

/// SMTP reply code class (spec §4.10: "2xx/3xx advance the state machine,
/// 4xx aborts the connection for an external retry, 5xx fails the current
/// mail without retrying").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Success,
    TransientFailure,
    PermanentFailure,
}

fn classify(code: u16) -> Class {
    match code / 100 {
        2 | 3 => Class::Success,
        4 => Class::TransientFailure,
        _ => Class::PermanentFailure,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpAction {
    Send(SmtpCommand),
    /// The connection reached `Idle` without a mail having been accepted
    /// (the greeting/EHLO/HELO handshake completed). The queue driver may
    /// now call `start_mail`, but nothing at the head of the queue has been
    /// consumed yet.
    Ready,
    /// This mail was accepted by the remote end; the queue should advance
    /// past it and the state machine returns to `Idle`.
    Delivered,
    /// This mail cannot be delivered (5xx); the queue should drop it
    /// without retry and the state machine returns to `Idle`.
    Rejected(String),
    /// Transient failure (4xx) or connection error: abort the connection,
    /// leave the mail at the head of the queue for an external retry.
    AbortConnection,
    CloseConnection,
}

/// One connection's worth of state, reused across mails while the
/// connection stays open (spec §4.10: "a connection idles between mails
/// rather than reconnecting per-message").
pub struct SmtpClient {
    state: SmtpState,
    /// Set once EHLO has been tried and rejected, so a fresh mail doesn't
    /// retry EHLO on an already-downgraded connection.
    ehlo_downgraded: bool,
}

impl Default for SmtpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpClient {
    pub fn new() -> Self {
        Self {
            state: SmtpState::Closed,
            ehlo_downgraded: false,
        }
    }

    pub fn state(&self) -> SmtpState {
        self.state
    }

    pub fn on_connected(&mut self) -> SmtpAction {
        self.state = SmtpState::WaitingGreeting;
        // The greeting is server-initiated; nothing to send yet.
        SmtpAction::AbortConnection
    }

    /// Begin a new mail transaction from `Idle`.
    pub fn start_mail(&mut self, from: &str) -> SmtpAction {
        debug_assert_eq!(self.state, SmtpState::Idle);
        self.state = SmtpState::SentMailFrom;
        SmtpAction::Send(SmtpCommand::MailFrom(from.to_string()))
    }

    /// Feed one SMTP reply code and advance the state machine (spec
    /// §4.10's per-state transition table).
    pub fn on_response(&mut self, code: u16, to: &str, body: &str) -> SmtpAction {
        let class = classify(code);
        match self.state {
            SmtpState::WaitingGreeting => match class {
                Class::Success => {
                    self.state = SmtpState::SentEhlo;
                    SmtpAction::Send(SmtpCommand::Ehlo)
                }
                _ => SmtpAction::AbortConnection,
            },
            SmtpState::SentEhlo => match class {
                Class::Success => {
                    self.state = SmtpState::Idle;
                    SmtpAction::Ready
                }
                Class::PermanentFailure => {
                    // Fall back to HELO (spec §4.10 "EHLO falls back to
                    // HELO on 5xx").
                    self.ehlo_downgraded = true;
                    self.state = SmtpState::SentHelo;
                    SmtpAction::Send(SmtpCommand::Helo)
                }
                Class::TransientFailure => SmtpAction::AbortConnection,
            },
            SmtpState::SentHelo => match class {
                Class::Success => {
                    self.state = SmtpState::Idle;
                    SmtpAction::Ready
                }
                _ => SmtpAction::AbortConnection,
            },
            SmtpState::SentMailFrom => match class {
                Class::Success => {
                    self.state = SmtpState::SentRcptTo;
                    SmtpAction::Send(SmtpCommand::RcptTo(to.to_string()))
                }
                Class::PermanentFailure => {
                    self.state = SmtpState::Idle;
                    SmtpAction::Rejected(format!("MAIL FROM rejected: {code}"))
                }
                Class::TransientFailure => SmtpAction::AbortConnection,
            },
            SmtpState::SentRcptTo => match class {
                Class::Success => {
                    self.state = SmtpState::SentData;
                    SmtpAction::Send(SmtpCommand::Data)
                }
                Class::PermanentFailure => {
                    self.state = SmtpState::SentRset;
                    SmtpAction::Send(SmtpCommand::Rset)
                }
                Class::TransientFailure => SmtpAction::AbortConnection,
            },
            SmtpState::SentData => {
                if code == 354 {
                    self.state = SmtpState::SentBody;
                    SmtpAction::Send(SmtpCommand::Body(body.to_string()))
                } else if class == Class::PermanentFailure {
                    self.state = SmtpState::SentRset;
                    SmtpAction::Send(SmtpCommand::Rset)
                } else {
                    SmtpAction::AbortConnection
                }
            }
            SmtpState::SentBody => match class {
                Class::Success => {
                    self.state = SmtpState::Idle;
                    SmtpAction::Delivered
                }
                Class::PermanentFailure => {
                    self.state = SmtpState::Idle;
                    SmtpAction::Rejected(format!("DATA rejected: {code}"))
                }
                Class::TransientFailure => SmtpAction::AbortConnection,
            },
            SmtpState::SentRset => {
                self.state = SmtpState::Idle;
                SmtpAction::Rejected("RCPT TO rejected, transaction reset".to_string())
            }
            SmtpState::SentQuit => {
                self.state = SmtpState::Closed;
                SmtpAction::CloseConnection
            }
            SmtpState::Closed | SmtpState::Connecting | SmtpState::Idle => {
                SmtpAction::AbortConnection
            }
        }
    }

    pub fn quit(&mut self) -> SmtpAction {
        self.state = SmtpState::SentQuit;
        SmtpAction::Send(SmtpCommand::Quit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_delivers_one_mail() {
        let mut c = SmtpClient::new();
        c.on_connected();
        assert_eq!(c.on_response(220, "", ""), SmtpAction::Send(SmtpCommand::Ehlo));
        assert_eq!(c.on_response(250, "", ""), SmtpAction::Ready);
        assert_eq!(c.start_mail("svc@example.net"), SmtpAction::Send(SmtpCommand::MailFrom("svc@example.net".into())));
        assert_eq!(
            c.on_response(250, "bob@example.net", ""),
            SmtpAction::Send(SmtpCommand::RcptTo("bob@example.net".into()))
        );
        assert_eq!(c.on_response(250, "", ""), SmtpAction::Send(SmtpCommand::Data));
        assert_eq!(c.on_response(354, "", "hello"), SmtpAction::Send(SmtpCommand::Body("hello".into())));
        assert_eq!(c.on_response(250, "", ""), SmtpAction::Delivered);
        assert_eq!(c.state(), SmtpState::Idle);
    }

    #[test]
    fn ehlo_falls_back_to_helo_on_5xx() {
        let mut c = SmtpClient::new();
        c.on_connected();
        c.on_response(220, "", "");
        assert_eq!(c.on_response(500, "", ""), SmtpAction::Send(SmtpCommand::Helo));
        assert!(c.ehlo_downgraded);
        assert_eq!(c.on_response(250, "", ""), SmtpAction::Ready);
    }

    #[test]
    fn rcpt_rejection_resets_transaction_without_dropping_connection() {
        let mut c = SmtpClient::new();
        c.on_connected();
        c.on_response(220, "", "");
        c.on_response(250, "", "");
        c.start_mail("svc@example.net");
        assert_eq!(c.on_response(250, "bob@example.net", ""), SmtpAction::Send(SmtpCommand::RcptTo("bob@example.net".into())));
        assert_eq!(c.on_response(550, "", ""), SmtpAction::Send(SmtpCommand::Rset));
        assert!(matches!(c.on_response(250, "", ""), SmtpAction::Rejected(_)));
        assert_eq!(c.state(), SmtpState::Idle);
    }

    #[test]
    fn transient_failure_aborts_for_external_retry() {
        let mut c = SmtpClient::new();
        c.on_connected();
        c.on_response(220, "", "");
        c.on_response(250, "", "");
        c.start_mail("svc@example.net");
        assert_eq!(c.on_response(450, "bob@example.net", ""), SmtpAction::AbortConnection);
    }
}
