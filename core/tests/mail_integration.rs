/*
 * mail_integration.rs
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

//! Mail session against in-process SMTP and POP3 servers: sending composed messages,
//! bulk send reporting, and folder listings.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use ritagli_core::config::Properties;
use ritagli_core::mail::{BulkMessage, ComposeRequest, MailError, MailSession, RecipientType};
use ritagli_core::mime::EmailAddress;

/// One accepted SMTP transaction: envelope and DATA.
#[derive(Debug, Clone, Default)]
struct Delivery {
    from: String,
    rcpt: Vec<String>,
    data: String,
}

type Deliveries = Arc<Mutex<Vec<Delivery>>>;

/// SMTP server that rejects any recipient whose address starts with `reject`.
async fn smtp_server() -> (u16, Deliveries) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let deliveries: Deliveries = Arc::new(Mutex::new(Vec::new()));
    let log = deliveries.clone();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let log = log.clone();
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut lines = BufReader::new(read);
                write.write_all(b"220 fake ESMTP\r\n").await.unwrap();
                let mut current = Delivery::default();
                let mut line = String::new();
                loop {
                    line.clear();
                    if lines.read_line(&mut line).await.unwrap() == 0 {
                        break;
                    }
                    let cmd = line.trim_end().to_string();
                    let upper = cmd.to_ascii_uppercase();
                    let reply: &[u8] = if upper.starts_with("EHLO") {
                        b"250-fake\r\n250 8BITMIME\r\n"
                    } else if upper.starts_with("MAIL FROM:") {
                        current = Delivery {
                            from: cmd[10..].trim_matches(|c| c == '<' || c == '>').to_string(),
                            ..Default::default()
                        };
                        b"250 ok\r\n"
                    } else if upper.starts_with("RCPT TO:") {
                        let rcpt = cmd[8..].trim_matches(|c| c == '<' || c == '>').to_string();
                        if rcpt.starts_with("reject") {
                            b"550 no such user\r\n"
                        } else {
                            current.rcpt.push(rcpt);
                            b"250 ok\r\n"
                        }
                    } else if upper == "DATA" {
                        write.write_all(b"354 go ahead\r\n").await.unwrap();
                        let mut data = String::new();
                        loop {
                            line.clear();
                            lines.read_line(&mut line).await.unwrap();
                            if line == ".\r\n" {
                                break;
                            }
                            data.push_str(&line);
                        }
                        current.data = data;
                        log.lock().unwrap().push(std::mem::take(&mut current));
                        b"250 queued\r\n"
                    } else if upper == "RSET" {
                        current = Delivery::default();
                        b"250 reset\r\n"
                    } else if upper == "QUIT" {
                        write.write_all(b"221 bye\r\n").await.unwrap();
                        break;
                    } else {
                        b"502 unknown\r\n"
                    };
                    write.write_all(reply).await.unwrap();
                }
            });
        }
    });
    (port, deliveries)
}

const HEADERS: [&str; 3] = [
    "From: Ann <ann@example.com>\r\nTo: me@example.com\r\nSubject: first\r\nDate: Mon, 1 Jan 2024 10:00:00 +0000\r\n",
    "From: bob@example.com\r\nTo: me@example.com\r\nSubject: =?UTF-8?B?U2VndW5kbyDDsQ==?=\r\nDate: Tue, 2 Jan 2024 10:00:00 +0000\r\n",
    "From: spam@example.com\r\nTo: me@example.com\r\nSubject: offer\r\nX-Spam-Flag: YES\r\n",
];
const SIZES: [u64; 3] = [100, 2100, 80];

/// POP3 maildrop holding three messages; the third is flagged as spam.
async fn pop3_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut lines = BufReader::new(read);
                write.write_all(b"+OK POP3 ready\r\n").await.unwrap();
                let mut line = String::new();
                loop {
                    line.clear();
                    if lines.read_line(&mut line).await.unwrap() == 0 {
                        break;
                    }
                    let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
                    let arg = |i: usize| words.get(i).and_then(|w| w.parse::<usize>().ok());
                    let reply = match words.first().map(|w| w.to_ascii_uppercase()).as_deref() {
                        Some("USER") | Some("PASS") => "+OK\r\n".to_string(),
                        Some("STAT") => format!("+OK 3 {}\r\n", SIZES.iter().sum::<u64>()),
                        Some("LIST") => match arg(1) {
                            Some(n) if (1..=3).contains(&n) => format!("+OK {} {}\r\n", n, SIZES[n - 1]),
                            Some(_) => "-ERR no such message\r\n".to_string(),
                            None => {
                                let mut out = "+OK 3 messages\r\n".to_string();
                                for (i, size) in SIZES.iter().enumerate() {
                                    out.push_str(&format!("{} {}\r\n", i + 1, size));
                                }
                                out.push_str(".\r\n");
                                out
                            }
                        },
                        Some("TOP") => match arg(1) {
                            Some(n) if (1..=3).contains(&n) => {
                                format!("+OK\r\n{}\r\n.\r\n", HEADERS[n - 1])
                            }
                            _ => "-ERR no such message\r\n".to_string(),
                        },
                        Some("QUIT") => {
                            write.write_all(b"+OK bye\r\n").await.unwrap();
                            break;
                        }
                        _ => "-ERR unknown command\r\n".to_string(),
                    };
                    write.write_all(reply.as_bytes()).await.unwrap();
                }
            });
        }
    });
    port
}

fn smtp_properties(port: u16) -> Properties {
    [
        ("mail.smtp.host", "127.0.0.1".to_string()),
        ("mail.smtp.port", port.to_string()),
    ]
    .into_iter()
    .collect()
}

fn addr(s: &str) -> EmailAddress {
    EmailAddress::parse_addr_spec(s).unwrap()
}

#[tokio::test]
async fn compose_and_send_with_addresses() {
    let (port, deliveries) = smtp_server().await;
    let mut session = MailSession::from_properties(smtp_properties(port)).unwrap();
    assert!(session.check_ports().await);

    let req = ComposeRequest {
        subject: Some("Report".to_string()),
        html_body: Some("<p>Monthly <b>report</b></p>".to_string()),
        id: Some("r-1".to_string()),
        ..Default::default()
    };
    let mut msg = session.compose_message(&req).await.unwrap();
    let from = [addr("me@example.com").with_display_name(Some("Me"))];
    let to = [addr("ann@example.com")];
    let bcc = [addr("audit@example.com")];
    session
        .send_message_with(&mut msg, &from, None, Some(&to), None, Some(&bcc))
        .await
        .unwrap();
    assert!(session.is_transport_connected());
    assert!(msg.sent_date().is_some());

    let sent = deliveries.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, "me@example.com");
    assert_eq!(sent[0].rcpt, vec!["ann@example.com", "audit@example.com"]);
    let data = &sent[0].data;
    assert!(data.contains("From: Me <me@example.com>\r\n"));
    assert!(data.contains("Reply-To: Me <me@example.com>\r\n"));
    assert!(data.contains("Subject: Report\r\n"));
    assert!(data.contains("Content-ID: r-1\r\n"));
    assert!(data.contains("Content-Type: multipart/alternative;"));
    assert!(data.contains("Monthly report"));
    assert!(!data.contains("audit@"));

    session.close().await.unwrap();
    assert!(!session.is_transport_connected());
}

#[tokio::test]
async fn bulk_send_reports_each_recipient() {
    let (port, deliveries) = smtp_server().await;
    let mut session = MailSession::from_properties(smtp_properties(port)).unwrap();
    let bulk = BulkMessage {
        subject: Some("News".to_string()),
        from_address: Some("news@example.com".to_string()),
        recipients: Some(vec![
            "a@example.com".to_string(),
            " \r\n".to_string(),
            "reject@example.com".to_string(),
            " b@exam ple.com\t".to_string(),
        ]),
        recipient_types: vec![RecipientType::To],
        text_body: Some("Hello".to_string()),
        id: Some("n7".to_string()),
        ..Default::default()
    };
    let mut out = Vec::new();
    let sent = session.send_bulk(&bulk, Some(&mut out)).await.unwrap();
    assert_eq!(sent, 2);
    let report = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "OK a@example.com");
    assert_eq!(lines[1], "ERROR reject@example.com RCPT TO failed: 550 no such user");
    assert_eq!(lines[2], "OK b@example.com");
    assert_eq!(
        lines[3],
        "Process finished with errors. 2 messages successfully sent, 2 messages failed"
    );

    let sent = deliveries.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].data.contains("Content-ID: n7.1\r\n"));
    assert!(sent[0].data.contains("From: \"news@example.com\" <news@example.com>\r\n"));
    assert!(sent[1].data.contains("Content-ID: n7.4\r\n"));
    assert_eq!(sent[1].rcpt, vec!["b@example.com"]);
    session.close().await.unwrap();
}

#[tokio::test]
async fn bulk_send_rewrites_message_id_marker() {
    let (port, deliveries) = smtp_server().await;
    let mut session = MailSession::from_properties(smtp_properties(port)).unwrap();
    let bulk = BulkMessage {
        from_personal: Some("News Desk".to_string()),
        from_address: Some("news@example.com".to_string()),
        recipients: Some(vec!["a@example.com".to_string(), "b@example.com".to_string()]),
        text_body: Some("Unsubscribe: https://example.com/u?m={#MESSAGE.ID}".to_string()),
        id: Some("camp".to_string()),
        ..Default::default()
    };
    let mut out = Vec::new();
    assert_eq!(session.send_bulk(&bulk, Some(&mut out)).await.unwrap(), 2);
    assert!(String::from_utf8(out)
        .unwrap()
        .ends_with("Process successfully completed. 2 messages sent\n"));

    let sent = deliveries.lock().unwrap().clone();
    assert!(sent[0].data.contains("https://example.com/u?m=camp.1"));
    assert!(sent[1].data.contains("https://example.com/u?m=camp.2"));
    assert!(sent[1].data.contains("Content-ID: camp.2\r\n"));
    assert!(sent[1].data.contains("From: News Desk <news@example.com>\r\n"));
}

#[tokio::test]
async fn pop3_folder_listings() {
    let port = pop3_server().await;
    let props: Properties = [
        ("mail.user", "me".to_string()),
        ("mail.password", "secret".to_string()),
        ("mail.pop3.host", "127.0.0.1".to_string()),
        ("mail.pop3.port", port.to_string()),
    ]
    .into_iter()
    .collect();
    let mut session = MailSession::from_properties(props).unwrap();

    let xml = session.list_folder_messages("INBOX").await.unwrap();
    assert!(session.is_store_connected());
    assert_eq!(xml.len(), 3);
    assert!(xml[0].starts_with("<msg><num>1</num>"));
    assert!(xml[0].contains("<from><![CDATA[Ann]]></from>"));
    assert!(xml[0].contains("<sent>2024-01-01 10:00:00</sent>"));
    assert!(xml[1].contains("<subject><![CDATA[Segundo ñ]]></subject>"));
    assert!(xml[1].contains("<size>3</size>"));

    let recent = session.list_recent_messages("INBOX", 2).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert!(recent[0].starts_with("<msg><num>2</num>"));

    assert!(matches!(
        session.list_folder_messages("Sent").await,
        Err(MailError::NoSuchFolder(_))
    ));
    session.close().await.unwrap();
    assert!(!session.is_store_connected());
}
