/*
 * session.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ritagli, a web application utility toolkit.
 *
 * Ritagli is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ritagli is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ritagli.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Mail session: account settings from properties, a lazily connected store and SMTP
//! transport, folder listings, sending and composing.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;

use crate::config::Properties;
use crate::mail::compose::{compose_message, ComposeRequest};
use crate::mail::headers::MailHeaders;
use crate::mail::message::{MailMessage, RecipientType};
use crate::mail::store::{Flag, MailStore, MessageSummary};
use crate::mail::{Credentials, MailError};
use crate::mime::EmailAddress;
use crate::net::port_is_open;
use crate::protocol::smtp::{SmtpConnection, SmtpOptions};

const SSL_SOCKET_FACTORY: &str = "javax.net.ssl.SSLSocketFactory";
const DEFAULT_STORE_PROTOCOL: &str = "pop3";
const DEFAULT_TRANSPORT_PROTOCOL: &str = "smtp";
const DEFAULT_SMTP_PORT: u16 = 25;
const PORT_CHECK_WAIT: Duration = Duration::from_secs(2);

fn default_store_port(protocol: &str, tls: bool) -> u16 {
    match (protocol, tls) {
        ("pop3s", _) | ("pop3", true) => 995,
        ("imaps", _) | ("imap", true) => 993,
        ("imap", false) => 143,
        _ => 110,
    }
}

fn parse_port(props: &Properties, key: &str) -> Result<Option<u16>, MailError> {
    match props.get_non_empty(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MailError::InvalidArgument(format!("{} is not a port number: {}", key, v))),
        None => Ok(None),
    }
}

pub struct MailSession {
    props: Option<Properties>,
    in_credentials: Credentials,
    out_credentials: Credentials,
    store_protocol: String,
    transport_protocol: String,
    in_host: Option<String>,
    in_port: Option<u16>,
    incoming_tls: bool,
    out_host: Option<String>,
    out_port: u16,
    outgoing_tls: bool,
    mbox_dir: Option<PathBuf>,
    store: Option<MailStore>,
    transport: Option<SmtpConnection>,
    store_connected: bool,
    transport_connected: bool,
}

impl Default for MailSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MailSession {
    /// Unconfigured session; transport port 25.
    pub fn new() -> Self {
        Self {
            props: None,
            in_credentials: Credentials::default(),
            out_credentials: Credentials::default(),
            store_protocol: DEFAULT_STORE_PROTOCOL.to_string(),
            transport_protocol: DEFAULT_TRANSPORT_PROTOCOL.to_string(),
            in_host: None,
            in_port: None,
            incoming_tls: false,
            out_host: None,
            out_port: DEFAULT_SMTP_PORT,
            outgoing_tls: false,
            mbox_dir: None,
            store: None,
            transport: None,
            store_connected: false,
            transport_connected: false,
        }
    }

    /// Configure from `mail.*` properties and add the keys they imply
    /// (`auth`, `socketFactory.port`, `socketFactory.fallback`, `starttls.enable`).
    pub fn from_properties(mut props: Properties) -> Result<Self, MailError> {
        let mut session = Self::new();
        let user = props.get_or("mail.user", "").to_string();
        let password = props.get_or("mail.password", "").to_string();
        session.in_credentials = Credentials::new(user.clone(), password.clone());
        session.out_credentials = Credentials::new(user, password.clone());

        let store = props
            .get_non_empty("mail.store.protocol")
            .unwrap_or(DEFAULT_STORE_PROTOCOL)
            .to_ascii_lowercase();
        session.in_host = props
            .get_non_empty(&format!("mail.{}.host", store))
            .map(str::to_string);
        session.incoming_tls = store.ends_with('s')
            || props.get(&format!("mail.{}.socketFactory.class", store)) == Some(SSL_SOCKET_FACTORY);
        session.in_port = parse_port(&props, &format!("mail.{}.port", store))?;
        session.mbox_dir = props.get_non_empty("mail.mbox.dir").map(PathBuf::from);

        let transport = props
            .get_non_empty("mail.transport.protocol")
            .unwrap_or(DEFAULT_TRANSPORT_PROTOCOL)
            .to_ascii_lowercase();
        session.out_host = props
            .get_non_empty(&format!("mail.{}.host", transport))
            .map(str::to_string);
        session.outgoing_tls = transport == "smtps"
            || props.get(&format!("mail.{}.socketFactory.class", transport))
                == Some(SSL_SOCKET_FACTORY);
        session.out_port =
            parse_port(&props, &format!("mail.{}.port", transport))?.unwrap_or(DEFAULT_SMTP_PORT);

        if !password.is_empty() {
            props.set(format!("mail.{}.auth", store), "true");
            props.set(format!("mail.{}.auth", transport), "true");
        }
        if session.incoming_tls {
            let port = session.store_port();
            props.set(format!("mail.{}.socketFactory.port", store), port.to_string());
            props.set(format!("mail.{}.socketFactory.fallback", store), "false");
        }
        if session.outgoing_tls {
            props.set(
                format!("mail.{}.socketFactory.port", transport),
                session.out_port.to_string(),
            );
            props.set(format!("mail.{}.socketFactory.fallback", transport), "false");
            props.set(format!("mail.{}.starttls.enable", transport), "true");
        }
        tracing::debug!(
            store = %store,
            transport = %transport,
            in_tls = session.incoming_tls,
            out_tls = session.outgoing_tls,
            "mail session configured"
        );
        session.store_protocol = store;
        session.transport_protocol = transport;
        session.props = Some(props);
        Ok(session)
    }

    pub fn account_name(&self) -> &str {
        self.in_credentials.user()
    }

    /// Sets the account for both the store and the transport.
    pub fn set_account_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.in_credentials = Credentials::new(name.clone(), self.in_credentials.password());
        self.out_credentials = Credentials::new(name, self.out_credentials.password());
    }

    pub fn auth_str(&self) -> &str {
        self.in_credentials.password()
    }

    pub fn set_auth_str(&mut self, password: impl Into<String>) {
        let password = password.into();
        self.in_credentials = Credentials::new(self.in_credentials.user(), password.clone());
        self.out_credentials = Credentials::new(self.out_credentials.user(), password);
    }

    pub fn host_name(&self) -> Option<&str> {
        self.in_host.as_deref()
    }

    pub fn set_host_name(&mut self, host: impl Into<String>) {
        self.in_host = Some(host.into());
    }

    pub fn mbox_directory(&self) -> Option<&std::path::Path> {
        self.mbox_dir.as_deref()
    }

    pub fn set_mbox_directory(&mut self, dir: impl Into<PathBuf>) {
        self.mbox_dir = Some(dir.into());
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.props.as_ref()
    }

    pub fn set_properties(&mut self, props: Properties) {
        self.props = Some(props);
    }

    pub fn is_store_connected(&self) -> bool {
        self.store_connected
    }

    pub fn is_transport_connected(&self) -> bool {
        self.transport_connected
    }

    fn store_port(&self) -> u16 {
        self.in_port
            .unwrap_or_else(|| default_store_port(&self.store_protocol, self.incoming_tls))
    }

    /// The connected store; connects and logs in on first use.
    pub async fn store(&mut self) -> Result<&mut MailStore, MailError> {
        if self.store.is_none() {
            let store = self.connect_store().await?;
            self.store = Some(store);
            self.store_connected = true;
        }
        self.store
            .as_mut()
            .ok_or_else(|| MailError::InvalidArgument("store not connected".to_string()))
    }

    async fn connect_store(&self) -> Result<MailStore, MailError> {
        if self.store_protocol == "mbox" {
            let dir = self.mbox_dir.as_ref().ok_or(MailError::MissingHost)?;
            return MailStore::open_mbox(dir.clone());
        }
        let host = self.in_host.as_deref().ok_or(MailError::MissingHost)?;
        if self.props.is_none() {
            return Err(MailError::NoProperties);
        }
        if self.in_credentials.user().is_empty() {
            return Err(MailError::MissingAccount);
        }
        let port = self.store_port();
        tracing::debug!(host, port, protocol = %self.store_protocol, "connecting store");
        match self.store_protocol.as_str() {
            "pop3" | "pop3s" => {
                MailStore::connect_pop3(host, port, self.incoming_tls, &self.in_credentials).await
            }
            "imap" | "imaps" => {
                MailStore::connect_imap(host, port, self.incoming_tls, &self.in_credentials).await
            }
            other => Err(MailError::UnsupportedProtocol(other.to_string())),
        }
    }

    /// The connected SMTP transport; connects on first use. AUTH is attempted
    /// only when the outgoing account name is non-empty.
    pub async fn transport(&mut self) -> Result<&mut SmtpConnection, MailError> {
        if self.transport.is_none() {
            let options = self.smtp_options()?;
            tracing::debug!(host = %options.host, port = options.port, "connecting transport");
            let conn = SmtpConnection::connect(&options).await?;
            self.transport = Some(conn);
            self.transport_connected = true;
        }
        self.transport
            .as_mut()
            .ok_or_else(|| MailError::InvalidArgument("transport not connected".to_string()))
    }

    fn smtp_options(&self) -> Result<SmtpOptions, MailError> {
        let props = self.props.as_ref().ok_or(MailError::NoProperties)?;
        let host = self.out_host.as_deref().ok_or(MailError::MissingHost)?;
        let proto = &self.transport_protocol;
        let mut options = SmtpOptions::new(host, self.out_port);
        options.implicit_tls = self.outgoing_tls || self.out_port == 465;
        options.starttls = props.get(&format!("mail.{}.starttls.enable", proto)) != Some("false");
        options.auth = self.out_credentials.smtp_auth();
        if let Some(name) = props.get_non_empty("mail.smtp.localhost") {
            options.ehlo_hostname = name.to_string();
        }
        Ok(options)
    }

    async fn visible_summaries(&mut self, folder: &str) -> Result<Vec<MessageSummary>, MailError> {
        Ok(self
            .store()
            .await?
            .fetch_summaries(folder)
            .await?
            .into_iter()
            .filter(|s| !s.has_flag(&Flag::Deleted))
            .collect())
    }

    /// `<msg>` XML for every message of `folder` not marked deleted, in ascending order.
    pub async fn list_folder_messages(&mut self, folder: &str) -> Result<Vec<String>, MailError> {
        Ok(self
            .list_folder_mail_headers(folder)
            .await?
            .iter()
            .map(MailHeaders::to_xml)
            .collect())
    }

    pub async fn list_folder_mail_headers(
        &mut self,
        folder: &str,
    ) -> Result<Vec<MailHeaders>, MailError> {
        Ok(self
            .visible_summaries(folder)
            .await?
            .iter()
            .map(MailHeaders::from_summary)
            .collect())
    }

    /// Newest first: looks at the last `max` messages and keeps those not deleted,
    /// not answered and not flagged as spam.
    pub async fn list_recent_messages(
        &mut self,
        folder: &str,
        max: i64,
    ) -> Result<Vec<String>, MailError> {
        if max < 0 {
            return Err(MailError::InvalidArgument(format!(
                "maximum message count is negative: {}",
                max
            )));
        }
        let store = self.store().await?;
        let total = i64::from(store.message_count(folder).await?);
        let lower = (total - max).max(0);
        let mut out = Vec::new();
        let mut num = total;
        while num > lower && (out.len() as i64) < max {
            let summary = store.fetch_summary(folder, num as u32).await?;
            num -= 1;
            if summary.has_flag(&Flag::Deleted) || summary.has_flag(&Flag::Answered) {
                continue;
            }
            let headers = MailHeaders::from_summary(&summary);
            if headers.is_spam() {
                continue;
            }
            out.push(headers.to_xml());
        }
        Ok(out)
    }

    /// Stamp the sent date and send to the message's own recipients.
    pub async fn send_message(&mut self, msg: &mut MailMessage) -> Result<(), MailError> {
        let recipients = msg.all_recipients();
        self.deliver(msg, &recipients).await
    }

    /// Send to an explicit envelope list; the message headers are left as they are.
    pub async fn send_message_to(
        &mut self,
        msg: &mut MailMessage,
        addrs: &[EmailAddress],
    ) -> Result<(), MailError> {
        let recipients: Vec<String> = addrs.iter().map(EmailAddress::address).collect();
        self.deliver(msg, &recipients).await
    }

    /// Add the given addresses to `msg`, then send. Reply-To defaults to From.
    pub async fn send_message_with(
        &mut self,
        msg: &mut MailMessage,
        from: &[EmailAddress],
        reply_to: Option<&[EmailAddress]>,
        to: Option<&[EmailAddress]>,
        cc: Option<&[EmailAddress]>,
        bcc: Option<&[EmailAddress]>,
    ) -> Result<(), MailError> {
        msg.add_from(from);
        msg.set_reply_to(reply_to.unwrap_or(from));
        for (kind, addrs) in [
            (RecipientType::To, to),
            (RecipientType::Cc, cc),
            (RecipientType::Bcc, bcc),
        ] {
            if let Some(addrs) = addrs {
                msg.add_recipients(kind, addrs);
            }
        }
        self.send_message(msg).await
    }

    async fn deliver(&mut self, msg: &mut MailMessage, recipients: &[String]) -> Result<(), MailError> {
        if recipients.is_empty() {
            return Err(MailError::InvalidArgument("message has no recipients".to_string()));
        }
        let sender = match msg.from().first() {
            Some(addr) => addr.address(),
            None if self.out_credentials.user().contains('@') => {
                self.out_credentials.user().to_string()
            }
            None => return Err(MailError::InvalidArgument("message has no sender".to_string())),
        };
        msg.set_sent_date(Local::now().fixed_offset());
        let data = msg.to_rfc822();
        let transport = self.transport().await?;
        transport.send_one(&sender, recipients, &data).await?;
        tracing::debug!(%sender, recipients = recipients.len(), "message sent");
        Ok(())
    }

    pub async fn compose_message(&self, req: &ComposeRequest) -> Result<MailMessage, MailError> {
        compose_message(req).await
    }

    /// QUIT the store and transport. Both are dropped even when QUIT fails.
    pub async fn close(&mut self) -> Result<(), MailError> {
        let mut result = Ok(());
        if let Some(mut store) = self.store.take() {
            result = store.close().await;
        }
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.quit().await {
                result = result.and(Err(e.into()));
            }
        }
        self.store_connected = false;
        self.transport_connected = false;
        result
    }

    /// True when the SMTP host accepts a TCP connection within two seconds.
    pub async fn check_ports(&self) -> bool {
        match &self.out_host {
            Some(host) => port_is_open(host, self.out_port, PORT_CHECK_WAIT).await,
            None => false,
        }
    }
}
