/*
 * store.rs
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

//! Message stores the session lists folders from: a POP3 maildrop (INBOX only),
//! an IMAP server, or a directory of mbox files named after their folders.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::mail::{Credentials, MailError};
use crate::mime::HeaderBlock;
use crate::protocol::imap::{FetchSummary, ImapSession};
use crate::protocol::pop3::Pop3Session;

/// Message flags the listings look at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
    Custom(String),
}

impl Flag {
    /// IMAP system flag (`\Seen`, ...) or keyword.
    pub fn from_imap(flag: &str) -> Self {
        match flag.to_ascii_lowercase().as_str() {
            "\\seen" => Flag::Seen,
            "\\answered" => Flag::Answered,
            "\\flagged" => Flag::Flagged,
            "\\deleted" => Flag::Deleted,
            "\\draft" => Flag::Draft,
            "\\recent" => Flag::Recent,
            _ => Flag::Custom(flag.to_string()),
        }
    }
}

/// Number, flags, size and raw header of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    /// 1-based position in the folder.
    pub num: u32,
    pub flags: Vec<Flag>,
    pub size: u64,
    pub header: Vec<u8>,
}

impl MessageSummary {
    pub fn has_flag(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    pub fn headers(&self) -> HeaderBlock {
        HeaderBlock::parse(&self.header)
    }
}

impl From<FetchSummary> for MessageSummary {
    fn from(f: FetchSummary) -> Self {
        Self {
            num: f.seq,
            flags: f.flags.iter().map(|s| Flag::from_imap(s)).collect(),
            size: u64::from(f.size),
            header: f.header,
        }
    }
}

pub enum MailStore {
    Pop3(Pop3Session),
    Imap(ImapSession),
    Mbox(MboxDirectory),
}

impl MailStore {
    /// Connect and log in to a POP3 maildrop.
    pub async fn connect_pop3(
        host: &str,
        port: u16,
        tls: bool,
        credentials: &Credentials,
    ) -> Result<Self, MailError> {
        let mut session = Pop3Session::connect(host, port, tls).await?;
        session.read_greeting().await?;
        session
            .login(credentials.user(), credentials.password())
            .await?;
        Ok(MailStore::Pop3(session))
    }

    pub async fn connect_imap(
        host: &str,
        port: u16,
        tls: bool,
        credentials: &Credentials,
    ) -> Result<Self, MailError> {
        let mut session = ImapSession::connect(host, port, tls).await?;
        session
            .login(credentials.user(), credentials.password())
            .await?;
        Ok(MailStore::Imap(session))
    }

    pub fn open_mbox(dir: impl Into<PathBuf>) -> Result<Self, MailError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(MailError::NoSuchFolder(dir.display().to_string()));
        }
        Ok(MailStore::Mbox(MboxDirectory { dir }))
    }

    pub async fn message_count(&mut self, folder: &str) -> Result<u32, MailError> {
        match self {
            MailStore::Pop3(session) => {
                check_inbox(folder)?;
                Ok(session.stat().await?.count)
            }
            MailStore::Imap(session) => Ok(session.select(folder).await?.exists),
            MailStore::Mbox(mbox) => Ok(mbox.scan(folder)?.len() as u32),
        }
    }

    /// Every message of `folder`, in ascending order.
    pub async fn fetch_summaries(&mut self, folder: &str) -> Result<Vec<MessageSummary>, MailError> {
        match self {
            MailStore::Pop3(session) => {
                check_inbox(folder)?;
                let mut out = Vec::new();
                for entry in session.list().await? {
                    let header = session.top(entry.msg_no, 0).await?;
                    out.push(MessageSummary {
                        num: entry.msg_no,
                        flags: Vec::new(),
                        size: entry.size,
                        header,
                    });
                }
                Ok(out)
            }
            MailStore::Imap(session) => {
                let selected = session.select(folder).await?;
                if selected.exists == 0 {
                    return Ok(Vec::new());
                }
                let mut out: Vec<MessageSummary> = session
                    .fetch_summaries(1, selected.exists)
                    .await?
                    .into_iter()
                    .map(MessageSummary::from)
                    .collect();
                out.sort_by_key(|s| s.num);
                Ok(out)
            }
            MailStore::Mbox(mbox) => mbox.summaries(folder),
        }
    }

    /// Message `num` (1-based) of `folder`.
    pub async fn fetch_summary(&mut self, folder: &str, num: u32) -> Result<MessageSummary, MailError> {
        match self {
            MailStore::Pop3(session) => {
                check_inbox(folder)?;
                let entry = session.list_one(num).await?;
                let header = session.top(num, 0).await?;
                Ok(MessageSummary {
                    num,
                    flags: Vec::new(),
                    size: entry.size,
                    header,
                })
            }
            MailStore::Imap(session) => {
                session.select(folder).await?;
                session
                    .fetch_summaries(num, num)
                    .await?
                    .into_iter()
                    .find(|s| s.seq == num)
                    .map(MessageSummary::from)
                    .ok_or(MailError::NoSuchMessage(num))
            }
            MailStore::Mbox(mbox) => mbox
                .summaries(folder)?
                .into_iter()
                .find(|s| s.num == num)
                .ok_or(MailError::NoSuchMessage(num)),
        }
    }

    /// QUIT or LOGOUT. Nothing to do for mbox.
    pub async fn close(&mut self) -> Result<(), MailError> {
        match self {
            MailStore::Pop3(session) => session.quit().await?,
            MailStore::Imap(session) => session.logout().await?,
            MailStore::Mbox(_) => {}
        }
        Ok(())
    }
}

fn check_inbox(folder: &str) -> Result<(), MailError> {
    if folder.eq_ignore_ascii_case("INBOX") {
        Ok(())
    } else {
        Err(MailError::NoSuchFolder(folder.to_string()))
    }
}

/// Directory of mbox files; folder `name` is the file `<dir>/<name>`.
#[derive(Debug, Clone)]
pub struct MboxDirectory {
    dir: PathBuf,
}

impl MboxDirectory {
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn folder_path(&self, folder: &str) -> Result<PathBuf, MailError> {
        if folder.is_empty() || folder.contains(|c| c == '/' || c == '\\') || folder == ".." {
            return Err(MailError::NoSuchFolder(folder.to_string()));
        }
        let path = self.dir.join(folder);
        if path.is_file() {
            Ok(path)
        } else {
            Err(MailError::NoSuchFolder(folder.to_string()))
        }
    }

    fn scan(&self, folder: &str) -> Result<Vec<Vec<u8>>, MailError> {
        let path = self.folder_path(folder)?;
        Ok(split_messages(BufReader::new(File::open(path)?))?)
    }

    fn summaries(&self, folder: &str) -> Result<Vec<MessageSummary>, MailError> {
        Ok(self
            .scan(folder)?
            .into_iter()
            .enumerate()
            .map(|(i, raw)| summarize(i as u32 + 1, raw))
            .collect())
    }
}

/// Split an mbox stream into messages. Each `From ` line at the start of a line opens a
/// message and is not part of it; `>From ` quoting in bodies is left as is.
fn split_messages<R: BufRead>(mut reader: R) -> std::io::Result<Vec<Vec<u8>>> {
    let mut messages = Vec::new();
    let mut current: Option<Vec<u8>> = None;
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if line.starts_with(b"From ") {
            if let Some(done) = current.take() {
                messages.push(trim_separator(done));
            }
            current = Some(Vec::new());
        } else if let Some(msg) = current.as_mut() {
            msg.extend_from_slice(&line);
        }
    }
    if let Some(done) = current {
        messages.push(trim_separator(done));
    }
    Ok(messages)
}

/// Drop the blank line that separates a message from the next `From ` line.
fn trim_separator(mut msg: Vec<u8>) -> Vec<u8> {
    if msg.ends_with(b"\r\n\r\n") {
        msg.truncate(msg.len() - 2);
    } else if msg.ends_with(b"\n\n") {
        msg.truncate(msg.len() - 1);
    }
    msg
}

fn summarize(num: u32, raw: Vec<u8>) -> MessageSummary {
    let headers = HeaderBlock::parse(&raw);
    let mut flags = Vec::new();
    for name in ["Status", "X-Status"] {
        for value in headers.get_all(name) {
            for c in value.chars() {
                let flag = match c {
                    'R' => Flag::Seen,
                    'A' => Flag::Answered,
                    'D' => Flag::Deleted,
                    'F' => Flag::Flagged,
                    'T' => Flag::Draft,
                    _ => continue,
                };
                if !flags.contains(&flag) {
                    flags.push(flag);
                }
            }
        }
    }
    let header_len = crate::mime::headers::header_end(&raw);
    MessageSummary {
        num,
        flags,
        size: raw.len() as u64,
        header: raw[..header_len].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MBOX: &str = "From alice@example.com Mon Jan  1 00:00:00 2024\n\
Subject: one\n\
Status: RO\n\
\n\
body one\n\
\n\
From bob@example.com Mon Jan  1 00:00:00 2024\n\
Subject: two\n\
X-Status: AD\n\
\n\
body two\n";

    #[test]
    fn imap_flags() {
        assert_eq!(Flag::from_imap("\\Seen"), Flag::Seen);
        assert_eq!(Flag::from_imap("\\DELETED"), Flag::Deleted);
        assert_eq!(Flag::from_imap("$Junk"), Flag::Custom("$Junk".to_string()));
    }

    #[test]
    fn splits_on_from_lines() {
        let msgs = split_messages(MBOX.as_bytes()).unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].starts_with(b"Subject: one\n"));
        assert!(msgs[0].ends_with(b"body one\n"));
        assert!(msgs[1].ends_with(b"body two\n"));
    }

    #[test]
    fn status_headers_become_flags() {
        let msgs = split_messages(MBOX.as_bytes()).unwrap();
        let first = summarize(1, msgs[0].clone());
        assert_eq!(first.flags, vec![Flag::Seen]);
        let second = summarize(2, msgs[1].clone());
        assert!(second.has_flag(&Flag::Answered));
        assert!(second.has_flag(&Flag::Deleted));
        assert_eq!(second.headers().get("Subject"), Some("two"));
        assert!(!second.header.ends_with(b"body two\n"));
    }

    #[tokio::test]
    async fn mbox_directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = File::create(dir.path().join("INBOX")).unwrap();
        f.write_all(MBOX.as_bytes()).unwrap();
        let mut store = MailStore::open_mbox(dir.path()).unwrap();
        assert_eq!(store.message_count("INBOX").await.unwrap(), 2);
        let two = store.fetch_summary("INBOX", 2).await.unwrap();
        assert_eq!(two.num, 2);
        assert!(matches!(
            store.fetch_summary("INBOX", 3).await,
            Err(MailError::NoSuchMessage(3))
        ));
        assert!(matches!(
            store.message_count("Sent").await,
            Err(MailError::NoSuchFolder(_))
        ));
        assert!(matches!(
            store.message_count("../INBOX").await,
            Err(MailError::NoSuchFolder(_))
        ));
        store.close().await.unwrap();
    }
}
