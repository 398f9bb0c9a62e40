use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    fd_lock::RwLock,
    serde_json::{Map, Value},
    tracing::{debug, warn},
};

use crate::{
    ConversationIdentity, ConversationRecord, Error, Message, Result, Role,
    message::now_ms,
    record::RecordMeta,
};

/// Default number of messages retained per conversation.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Durable keyed append log of conversation messages.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Maximum number of messages retained per identity.
    fn history_limit(&self) -> usize;

    /// Append a message, trim to the history limit (oldest first) and verify
    /// the write by reading the tail back. Creates the record on first use.
    async fn append(
        &self,
        identity: &ConversationIdentity,
        role: Role,
        content: &str,
    ) -> Result<Message>;

    /// The newest `limit` messages, oldest first. Empty when no record exists.
    async fn get_recent(&self, identity: &ConversationIdentity, limit: usize)
    -> Result<Vec<Message>>;

    /// Remove the record. Succeeds when nothing existed.
    async fn clear(&self, identity: &ConversationIdentity) -> Result<()>;

    async fn record(&self, identity: &ConversationIdentity) -> Result<Option<ConversationRecord>>;

    /// Set `current_agent_variant` on an existing record. No-op otherwise.
    async fn set_current_variant(&self, identity: &ConversationIdentity, variant: &str)
    -> Result<()>;

    /// Merge keys into the metadata of an existing record. No-op otherwise.
    async fn update_metadata(
        &self,
        identity: &ConversationIdentity,
        entries: Map<String, Value>,
    ) -> Result<()>;

    async fn list_identities(&self) -> Result<Vec<ConversationIdentity>>;

    /// History capped at [`Self::history_limit`].
    async fn get_history(&self, identity: &ConversationIdentity) -> Result<Vec<Message>> {
        self.get_recent(identity, self.history_limit()).await
    }
}

/// Entry points taking raw, unvalidated input (webhook fields, CLI args).
#[async_trait]
pub trait HistoryStoreExt: HistoryStore {
    /// Normalize `raw_identity`, validate `role` and append.
    async fn append_raw(&self, raw_identity: &str, role: &str, content: &str) -> Result<Message> {
        let role: Role = role.parse()?;
        let identity = ConversationIdentity::parse(raw_identity)?;
        self.append(&identity, role, content).await
    }
}

impl<T: HistoryStore + ?Sized> HistoryStoreExt for T {}

/// JSONL-backed history store with advisory file locking.
pub struct JsonlHistoryStore {
    base_dir: PathBuf,
    history_limit: usize,
}

impl JsonlHistoryStore {
    pub fn new(base_dir: PathBuf, history_limit: usize) -> Self {
        Self {
            base_dir,
            history_limit: history_limit.max(1),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn history_path(&self, identity: &ConversationIdentity) -> PathBuf {
        self.base_dir
            .join(format!("{}.jsonl", identity.file_stem()))
    }

    fn record_path(&self, identity: &ConversationIdentity) -> PathBuf {
        self.base_dir
            .join(format!("{}.record.json", identity.file_stem()))
    }
}

/// Non-empty lines of the log, in file order.
fn read_lines(reader: impl Read) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn parse_messages(lines: &[String], path: &Path) -> Vec<Message> {
    lines
        .iter()
        .filter_map(|line| match serde_json::from_str::<Message>(line.trim()) {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping malformed history line");
                None
            },
        })
        .collect()
}

fn lock_failed(e: std::io::Error) -> Error {
    Error::unavailable_with("history file lock failed", e)
}

fn append_blocking(
    history_path: &Path,
    record_path: &Path,
    message: &Message,
    limit: usize,
) -> Result<()> {
    if let Some(parent) = history_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(message)?;

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(history_path)?;
    let mut lock = RwLock::new(file);
    let mut guard = lock.write().map_err(lock_failed)?;
    // A clear that held the lock first has unlinked this file.
    if !history_path.exists() {
        return Err(Error::unavailable("history log removed while waiting for lock"));
    }

    writeln!(*guard, "{line}")?;

    guard.seek(SeekFrom::Start(0))?;
    let lines = read_lines(&mut *guard)?;
    if lines.len() > limit {
        let dropped = lines.len() - limit;
        guard.set_len(0)?;
        for kept in &lines[dropped..] {
            writeln!(*guard, "{kept}")?;
        }
        debug!(path = %history_path.display(), dropped, "trimmed history");
    }
    guard.sync_data()?;

    // Read-back verification of the tail entry.
    guard.seek(SeekFrom::Start(0))?;
    let lines = read_lines(&mut *guard)?;
    let tail = lines
        .last()
        .ok_or_else(|| Error::unavailable("history empty after append"))?;
    let stored: Message = serde_json::from_str(tail)
        .map_err(|e| Error::unavailable_with("history tail unreadable", e))?;
    if &stored != message {
        return Err(Error::unavailable("history tail does not match appended message"));
    }
    if lines.len() > limit {
        return Err(Error::unavailable("history exceeds limit after trim"));
    }

    let mut meta = RecordMeta::load(record_path)?;
    meta.touch(message.timestamp);
    meta.save(record_path)?;
    Ok(())
}

fn read_blocking(history_path: &Path) -> Result<Option<Vec<String>>> {
    let file = match File::open(history_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let lock = RwLock::new(file);
    let guard = lock.read().map_err(lock_failed)?;
    read_lines(&*guard).map(Some)
}

/// Apply `update` to the sidecar of an existing record while holding the
/// log's write lock. Returns `false` when the record does not exist.
fn mutate_meta_blocking(
    history_path: &Path,
    record_path: &Path,
    update: impl FnOnce(&mut RecordMeta),
) -> Result<bool> {
    let file = match OpenOptions::new().read(true).append(true).open(history_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let mut lock = RwLock::new(file);
    let _guard = lock.write().map_err(lock_failed)?;

    let mut meta = RecordMeta::load(record_path)?;
    update(&mut meta);
    meta.touch(now_ms());
    meta.save(record_path)?;
    Ok(true)
}

/// Remove the log and its sidecar while holding the log's write lock, so a
/// clear never interleaves with an append or a metadata update.
fn clear_blocking(history_path: &Path, record_path: &Path) -> Result<()> {
    let file = match OpenOptions::new().read(true).append(true).open(history_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return remove_if_exists(record_path),
        Err(e) => return Err(e.into()),
    };
    let mut lock = RwLock::new(file);
    let _guard = lock.write().map_err(lock_failed)?;

    remove_if_exists(record_path)?;
    remove_if_exists(history_path)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    fn history_limit(&self) -> usize {
        self.history_limit
    }

    async fn append(
        &self,
        identity: &ConversationIdentity,
        role: Role,
        content: &str,
    ) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(Error::validation("content", "message content is empty"));
        }

        let message = Message::stamped(role, content);
        let history_path = self.history_path(identity);
        let record_path = self.record_path(identity);
        let limit = self.history_limit;

        let written = message.clone();
        tokio::task::spawn_blocking(move || {
            append_blocking(&history_path, &record_path, &written, limit)
        })
        .await??;

        debug!(
            identity = %identity,
            role = %role,
            content_len = content.len(),
            "appended message"
        );
        Ok(message)
    }

    async fn get_recent(
        &self,
        identity: &ConversationIdentity,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let history_path = self.history_path(identity);

        tokio::task::spawn_blocking(move || -> Result<Vec<Message>> {
            let Some(lines) = read_blocking(&history_path)? else {
                return Ok(vec![]);
            };
            let messages = parse_messages(&lines, &history_path);
            let start = messages.len().saturating_sub(limit);
            Ok(messages[start..].to_vec())
        })
        .await?
    }

    async fn clear(&self, identity: &ConversationIdentity) -> Result<()> {
        let history_path = self.history_path(identity);
        let record_path = self.record_path(identity);

        tokio::task::spawn_blocking(move || clear_blocking(&history_path, &record_path)).await??;

        debug!(identity = %identity, "cleared conversation");
        Ok(())
    }

    async fn record(&self, identity: &ConversationIdentity) -> Result<Option<ConversationRecord>> {
        let history_path = self.history_path(identity);
        let record_path = self.record_path(identity);
        let owned = identity.clone();

        tokio::task::spawn_blocking(move || -> Result<Option<ConversationRecord>> {
            let Some(lines) = read_blocking(&history_path)? else {
                return Ok(None);
            };
            let messages = parse_messages(&lines, &history_path);
            let meta = RecordMeta::load(&record_path)?;
            Ok(Some(meta.into_record(owned, messages)))
        })
        .await?
    }

    async fn set_current_variant(
        &self,
        identity: &ConversationIdentity,
        variant: &str,
    ) -> Result<()> {
        let history_path = self.history_path(identity);
        let record_path = self.record_path(identity);
        let variant = variant.to_string();

        let existed = tokio::task::spawn_blocking(move || {
            mutate_meta_blocking(&history_path, &record_path, |meta| {
                meta.current_agent_variant = Some(variant);
            })
        })
        .await??;

        if !existed {
            debug!(identity = %identity, "no record, current variant not set");
        }
        Ok(())
    }

    async fn update_metadata(
        &self,
        identity: &ConversationIdentity,
        entries: Map<String, Value>,
    ) -> Result<()> {
        let history_path = self.history_path(identity);
        let record_path = self.record_path(identity);

        tokio::task::spawn_blocking(move || {
            mutate_meta_blocking(&history_path, &record_path, |meta| {
                meta.metadata.extend(entries);
            })
        })
        .await??;
        Ok(())
    }

    async fn list_identities(&self) -> Result<Vec<ConversationIdentity>> {
        let base = self.base_dir.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<ConversationIdentity>> {
            let entries = match fs::read_dir(&base) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
                Err(e) => return Err(e.into()),
            };
            let mut identities: Vec<ConversationIdentity> = entries
                .filter_map(|e| e.ok())
                .filter_map(|e| {
                    let name = e.file_name().to_string_lossy().to_string();
                    name.strip_suffix(".jsonl")
                        .and_then(ConversationIdentity::from_file_stem)
                })
                .collect();
            identities.sort();
            Ok(identities)
        })
        .await?
    }
}
