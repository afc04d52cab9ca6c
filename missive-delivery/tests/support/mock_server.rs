//! Minimal SMTP server for exercising the SMTP transport.
//!
//! Speaks just enough of the protocol for a plain-text submission and
//! records what it received. Responses to MAIL, RCPT and the end of DATA can
//! be overridden to inject rejections.
//!
//! ```rust,no_run
//! use support::mock_server::MockSmtpServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockSmtpServer::builder()
//!     .with_rcpt_to_response(550, "User unknown")
//!     .build()
//!     .await?;
//!
//! // Point a session at server.addr()
//!
//! server.shutdown();
//! # Ok(())
//! # }
//! ```
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

/// SMTP command received by the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Everything between DATA and the terminating dot
    MessageContent(String),
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
struct Reply {
    code: u16,
    message: String,
}

impl Reply {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Debug, Clone)]
struct MockServerConfig {
    greeting: Reply,
    mail_from: Reply,
    rcpt_to: Reply,
    data_end: Reply,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting: Reply::new(220, "mock.missive.test ESMTP"),
            mail_from: Reply::new(250, "OK"),
            rcpt_to: Reply::new(250, "OK"),
            data_end: Reply::new(250, "OK: Message accepted"),
        }
    }
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<SmtpCommand>>>,
    shutdown: Arc<AtomicBool>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            config: MockServerConfig::default(),
        }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands.read().await.clone()
    }

    /// Bodies of every message accepted so far
    pub async fn messages(&self) -> Vec<String> {
        self.commands
            .read()
            .await
            .iter()
            .filter_map(|command| match command {
                SmtpCommand::MessageContent(content) => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockServerConfig>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(&config.greeting.to_bytes()).await?;
        writer.flush().await?;

        loop {
            line.clear();
            match timeout(Duration::from_secs(10), reader.read_line(&mut line)).await {
                Err(_) | Ok(Ok(0)) => return Ok(()),
                Ok(result) => result?,
            };

            let command_line = line.trim().to_string();
            let (verb, argument) = command_line
                .split_once(' ')
                .unwrap_or((command_line.as_str(), ""));

            let (reply, command) = match verb.to_uppercase().as_str() {
                "EHLO" => (
                    b"250-mock.missive.test\r\n250 SIZE 10000000\r\n".to_vec(),
                    SmtpCommand::Ehlo(argument.to_string()),
                ),
                "MAIL" => (
                    config.mail_from.to_bytes(),
                    SmtpCommand::MailFrom(argument.to_string()),
                ),
                "RCPT" => (
                    config.rcpt_to.to_bytes(),
                    SmtpCommand::RcptTo(argument.to_string()),
                ),
                "DATA" => (
                    Reply::new(354, "End data with <CR><LF>.<CR><LF>").to_bytes(),
                    SmtpCommand::Data,
                ),
                "RSET" | "NOOP" => (
                    Reply::new(250, "OK").to_bytes(),
                    SmtpCommand::Other(command_line.clone()),
                ),
                "QUIT" => {
                    commands.write().await.push(SmtpCommand::Quit);
                    writer.write_all(&Reply::new(221, "Bye").to_bytes()).await?;
                    writer.flush().await?;
                    return Ok(());
                }
                _ => (
                    Reply::new(500, "Unknown command").to_bytes(),
                    SmtpCommand::Other(command_line.clone()),
                ),
            };

            let is_data = command == SmtpCommand::Data;
            commands.write().await.push(command);
            writer.write_all(&reply).await?;
            writer.flush().await?;

            if is_data {
                let mut content = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await? == 0 {
                        return Ok(());
                    }
                    if line.trim_end() == "." {
                        break;
                    }
                    content.push_str(&line);
                }

                commands
                    .write()
                    .await
                    .push(SmtpCommand::MessageContent(content));
                writer.write_all(&config.data_end.to_bytes()).await?;
                writer.flush().await?;
            }
        }
    }
}

pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to = Reply::new(code, message);
        self
    }

    /// Reply sent after the terminating `<CRLF>.<CRLF>`
    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end = Reply::new(code, message);
        self
    }

    /// Bind to a random local port and start accepting connections
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to a port
    pub async fn build(self) -> Result<MockSmtpServer, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        {
            let commands = Arc::clone(&commands);
            let shutdown = Arc::clone(&shutdown);

            tokio::spawn(async move {
                while !shutdown.load(Ordering::Relaxed) {
                    // Poll so the shutdown flag is noticed
                    let Ok(accepted) =
                        timeout(Duration::from_millis(100), listener.accept()).await
                    else {
                        continue;
                    };

                    if let Ok((stream, _)) = accepted {
                        let config = Arc::clone(&config);
                        let commands = Arc::clone(&commands);
                        tokio::spawn(async move {
                            if let Err(e) =
                                MockSmtpServer::handle_client(stream, config, commands).await
                            {
                                tracing::debug!("Mock server client error: {e}");
                            }
                        });
                    }
                }
            });
        }

        Ok(MockSmtpServer {
            addr,
            commands,
            shutdown,
        })
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
