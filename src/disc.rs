//! Disc model (§3): an ordered sequence of sessions, plus a count of incomplete sessions appended
//! after the complete ones (media that was multi-session-appended but never closed).

use crate::error::ProgrammerError;
use crate::session::Session;

pub struct Disc {
    sessions: Vec<Session>,
    incomplete_sessions: u32,
}

impl Disc {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            incomplete_sessions: 0,
        }
    }

    pub fn num_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, index: usize) -> Option<&Session> {
        self.sessions.get(index)
    }

    pub fn session_mut(&mut self, index: usize) -> Option<&mut Session> {
        self.sessions.get_mut(index)
    }

    pub fn add_session(&mut self, session: Session, position: Option<usize>) {
        match position {
            Some(i) if i <= self.sessions.len() => self.sessions.insert(i, session),
            _ => self.sessions.push(session),
        }
    }

    pub fn remove_session(&mut self, index: usize) -> Result<Session, ProgrammerError> {
        if index >= self.sessions.len() {
            return Err(ProgrammerError::SessionIndexOutOfRange(index));
        }
        Ok(self.sessions.remove(index))
    }

    pub fn incomplete_sessions(&self) -> u32 {
        self.incomplete_sessions
    }

    pub fn set_incomplete_sessions(&mut self, n: u32) {
        self.incomplete_sessions = n;
    }

    pub fn sectors(&self) -> Result<u32, crate::error::SourceError> {
        self.sessions.iter().try_fold(0u32, |acc, s| Ok(acc + s.sectors()?))
    }
}

impl Default for Disc {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_insert_and_remove_in_order() {
        let mut disc = Disc::new();
        disc.add_session(Session::new(), None);
        disc.add_session(Session::new(), None);
        assert_eq!(disc.num_sessions(), 2);

        disc.remove_session(0).unwrap();
        assert_eq!(disc.num_sessions(), 1);
        assert!(disc.remove_session(5).is_err());
    }

    #[test]
    fn incomplete_sessions_tracked_separately_from_ordered_list() {
        let mut disc = Disc::new();
        disc.set_incomplete_sessions(2);
        assert_eq!(disc.incomplete_sessions(), 2);
        assert_eq!(disc.num_sessions(), 0);
    }
}
