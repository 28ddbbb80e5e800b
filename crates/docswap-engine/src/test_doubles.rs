//! Scripted sessions and editors for tests and behavioural specs.
//!
//! [`ScriptedSession`] keeps a document as plain text with blocks separated
//! by [`BLOCK_SEPARATOR`], and lets a test make any primitive fail or lie
//! about its effect. [`ScriptedEditor`] opens plain-text files as scripted
//! sessions and records how many sessions were opened and closed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::session::{
    BLOCK_SEPARATOR, DocumentFormat, DocumentSession, Editor, SessionError,
};

/// Session primitives that can be scripted to misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// [`DocumentSession::text`]
    Text,
    /// [`DocumentSession::replace_next`]
    ReplaceNext,
    /// [`DocumentSession::set_text`]
    SetText,
    /// [`DocumentSession::set_block_text`]
    SetBlockText,
    /// [`DocumentSession::replace_all`]
    ReplaceAll,
    /// [`DocumentSession::save_as`]
    Save,
}

impl Primitive {
    const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::ReplaceNext => "replace_next",
            Self::SetText => "set_text",
            Self::SetBlockText => "set_block_text",
            Self::ReplaceAll => "replace_all",
            Self::Save => "save",
        }
    }
}

/// How a scripted primitive misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every call fails.
    Fails,
    /// The first call fails; later calls work.
    FailsOnce,
    /// Calls report success without changing the document.
    Phantom,
}

/// In-memory document session with scriptable faults.
#[derive(Debug)]
pub struct ScriptedSession {
    text: String,
    cursor: usize,
    faults: HashMap<Primitive, Fault>,
    calls: RefCell<HashMap<Primitive, usize>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedSession {
    /// Creates a session over `text`; carriage returns separate blocks.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            cursor: 0,
            faults: HashMap::new(),
            calls: RefCell::new(HashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a session with one block per entry.
    #[must_use]
    pub fn from_blocks(blocks: &[&str]) -> Self {
        Self::from_text(&blocks.join(&BLOCK_SEPARATOR.to_string()))
    }

    /// Makes `primitive` misbehave as described by `fault`.
    #[must_use]
    pub fn with_fault(mut self, primitive: Primitive, fault: Fault) -> Self {
        self.faults.insert(primitive, fault);
        self
    }

    /// Makes every read of the full text fail.
    #[must_use]
    pub fn with_unreadable_text(self) -> Self {
        self.with_fault(Primitive::Text, Fault::Fails)
    }

    /// Current document text, ignoring faults and the closed state.
    #[must_use]
    pub fn current_text(&self) -> &str {
        &self.text
    }

    /// Number of calls made to `primitive`.
    #[must_use]
    pub fn calls(&self, primitive: Primitive) -> usize {
        self.calls.borrow().get(&primitive).copied().unwrap_or(0)
    }

    /// Returns true once [`DocumentSession::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    /// Records a call and returns the fault to act on, if any.
    fn enter(&self, primitive: Primitive) -> Result<Option<Fault>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let call = {
            let mut calls = self.calls.borrow_mut();
            let entry = calls.entry(primitive).or_insert(0);
            *entry += 1;
            *entry
        };
        match self.faults.get(&primitive) {
            Some(Fault::Fails) => Err(rejected(primitive)),
            Some(Fault::FailsOnce) if call == 1 => Err(rejected(primitive)),
            Some(Fault::Phantom) => Ok(Some(Fault::Phantom)),
            _ => Ok(None),
        }
    }

    fn blocks(&self) -> Vec<&str> {
        self.text.split(BLOCK_SEPARATOR).collect()
    }
}

fn rejected(primitive: Primitive) -> SessionError {
    SessionError::Rejected {
        operation: primitive.name(),
        message: "scripted failure".to_owned(),
    }
}

impl DocumentSession for ScriptedSession {
    fn text(&self) -> Result<String, SessionError> {
        self.enter(Primitive::Text)?;
        Ok(self.text.clone())
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn replace_next(
        &mut self,
        search: &str,
        replacement: &str,
    ) -> Result<Option<usize>, SessionError> {
        let fault = self.enter(Primitive::ReplaceNext)?;
        let Some(found) = self.text.get(self.cursor..).and_then(|rest| rest.find(search)) else {
            return Ok(None);
        };
        let start = self.cursor + found;
        let block = self
            .text
            .get(..start)
            .map_or(0, |head| head.matches(BLOCK_SEPARATOR).count());
        if fault == Some(Fault::Phantom) {
            return Ok(Some(block));
        }
        self.text.replace_range(start..start + search.len(), replacement);
        self.cursor = start + replacement.len();
        Ok(Some(block))
    }

    fn set_text(&mut self, text: &str) -> Result<(), SessionError> {
        if self.enter(Primitive::SetText)?.is_none() {
            self.text = text.to_owned();
            self.cursor = 0;
        }
        Ok(())
    }

    fn block_count(&self) -> usize {
        self.blocks().len()
    }

    fn block_text(&self, index: usize) -> Result<String, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let blocks = self.blocks();
        blocks
            .get(index)
            .map(|block| (*block).to_owned())
            .ok_or(SessionError::BlockOutOfRange {
                index,
                count: blocks.len(),
            })
    }

    fn set_block_text(&mut self, index: usize, text: &str) -> Result<(), SessionError> {
        if self.enter(Primitive::SetBlockText)?.is_some() {
            return Ok(());
        }
        let mut blocks: Vec<String> = self.blocks().into_iter().map(str::to_owned).collect();
        let count = blocks.len();
        let block = blocks
            .get_mut(index)
            .ok_or(SessionError::BlockOutOfRange { index, count })?;
        text.clone_into(block);
        self.text = blocks.join(&BLOCK_SEPARATOR.to_string());
        self.cursor = 0;
        Ok(())
    }

    fn replace_all(&mut self, search: &str, replacement: &str) -> Result<usize, SessionError> {
        let fault = self.enter(Primitive::ReplaceAll)?;
        let count = self.text.matches(search).count();
        if fault.is_none() {
            self.text = self.text.replace(search, replacement);
            self.cursor = 0;
        }
        Ok(count)
    }

    fn save_as(&mut self, path: &Path) -> Result<(), SessionError> {
        if self.enter(Primitive::Save)?.is_some() {
            return Ok(());
        }
        fs::write(path, &self.text).map_err(|source| SessionError::io(path, source))
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Opens plain-text files as [`ScriptedSession`]s.
///
/// Files are classified by extension like real documents, so a test can
/// name a text file `report.docx` and drive the orchestrator with it.
#[derive(Debug, Default)]
pub struct ScriptedEditor {
    faults: Vec<(Primitive, Fault)>,
    failing_opens: usize,
    opens: AtomicUsize,
    sessions: Mutex<Vec<Arc<AtomicBool>>>,
}

impl ScriptedEditor {
    /// Creates an editor whose sessions behave correctly.
    #[must_use]
    pub fn working() -> Self {
        Self::default()
    }

    /// Makes the first `count` opens fail.
    #[must_use]
    pub fn with_failing_opens(mut self, count: usize) -> Self {
        self.failing_opens = count;
        self
    }

    /// Makes every open fail.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::working().with_failing_opens(usize::MAX)
    }

    /// Applies `fault` to `primitive` in every session opened.
    #[must_use]
    pub fn with_fault(mut self, primitive: Primitive, fault: Fault) -> Self {
        self.faults.push((primitive, fault));
        self
    }

    /// Number of open attempts, successful or not.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of sessions handed out.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.sessions.lock().map_or(0, |sessions| sessions.len())
    }

    /// Returns true when every session handed out has been closed.
    #[must_use]
    pub fn all_sessions_closed(&self) -> bool {
        self.sessions.lock().is_ok_and(|sessions| {
            sessions.iter().all(|closed| closed.load(Ordering::SeqCst))
        })
    }
}

impl Editor for ScriptedEditor {
    fn open(
        &self,
        _format: DocumentFormat,
        path: &Path,
    ) -> Result<Box<dyn DocumentSession>, SessionError> {
        let attempt = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failing_opens {
            return Err(SessionError::Rejected {
                operation: "open",
                message: "scripted failure".to_owned(),
            });
        }
        let text = fs::read_to_string(path).map_err(|source| SessionError::io(path, source))?;
        let session = self
            .faults
            .iter()
            .fold(ScriptedSession::from_text(&text), |session, (primitive, fault)| {
                session.with_fault(*primitive, *fault)
            });
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push(session.closed_flag());
        }
        Ok(Box::new(session))
    }
}
