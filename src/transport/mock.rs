//! Scripted in-process transport for unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{ChallengeToken, SignInOutcome, Transport, TransportSession};
use crate::error::TransportError;
use crate::operator::OperatorId;

/// The code every mock login accepts.
pub const VALID_CODE: &str = "123456";

#[derive(Debug, Default)]
pub struct MockState {
    /// Operators with a stored, authorized session artifact.
    pub authorized: HashSet<OperatorId>,
    pub invalid_phones: HashSet<String>,
    /// When set, sign-in asks for this second-factor password.
    pub password: Option<String>,
    pub failing_destinations: HashSet<String>,
    /// Number of upcoming `connect` calls that fail with a network error.
    pub connect_failures: usize,
    pub sends: Vec<(OperatorId, String, String)>,
    pub connects: usize,
    pub disconnects: usize,
    pub codes_requested: usize,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn authorize(&self, operator: OperatorId) {
        self.state().authorized.insert(operator);
    }

    pub fn sends_for(&self, operator: OperatorId) -> Vec<(String, String)> {
        self.state()
            .sends
            .iter()
            .filter(|(op, _, _)| *op == operator)
            .map(|(_, dest, text)| (dest.clone(), text.clone()))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        operator: OperatorId,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        let mut state = self.state();
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(TransportError::Network("connection refused".into()));
        }
        state.connects += 1;
        Ok(Box::new(MockSession {
            operator,
            state: Arc::clone(&self.state),
            issued_challenge: None,
            awaiting_password: false,
        }))
    }

    async fn remove_session(&self, operator: OperatorId) -> Result<bool, TransportError> {
        Ok(self.state().authorized.remove(&operator))
    }
}

struct MockSession {
    operator: OperatorId,
    state: Arc<Mutex<MockState>>,
    issued_challenge: Option<String>,
    awaiting_password: bool,
}

impl MockSession {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl TransportSession for MockSession {
    async fn request_code(&mut self, phone: &str) -> Result<ChallengeToken, TransportError> {
        let n = {
            let mut state = self.state();
            if state.invalid_phones.contains(phone) {
                return Err(TransportError::InvalidPhone("PHONE_NUMBER_INVALID".into()));
            }
            state.codes_requested += 1;
            state.codes_requested
        };
        let token = format!("challenge-{}-{n}", self.operator);
        self.issued_challenge = Some(token.clone());
        Ok(ChallengeToken::new(token))
    }

    async fn sign_in(
        &mut self,
        _phone: &str,
        code: &str,
        challenge: &ChallengeToken,
    ) -> Result<SignInOutcome, TransportError> {
        if self.issued_challenge.as_deref() != Some(challenge.as_str()) {
            return Err(TransportError::Rejected("PHONE_CODE_EXPIRED".into()));
        }
        if code != VALID_CODE {
            return Err(TransportError::Rejected("PHONE_CODE_INVALID".into()));
        }
        self.issued_challenge = None;
        let mut state = self.state.lock().unwrap();
        if state.password.is_some() {
            self.awaiting_password = true;
            return Ok(SignInOutcome::PasswordRequired);
        }
        state.authorized.insert(self.operator);
        Ok(SignInOutcome::SignedIn)
    }

    async fn sign_in_with_password(&mut self, password: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if !self.awaiting_password || state.password.as_deref() != Some(password) {
            return Err(TransportError::Rejected("PASSWORD_HASH_INVALID".into()));
        }
        self.awaiting_password = false;
        state.authorized.insert(self.operator);
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, TransportError> {
        Ok(self.state().authorized.contains(&self.operator))
    }

    async fn send_message(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        let mut state = self.state();
        if !state.authorized.contains(&self.operator) {
            return Err(TransportError::Unauthorized {
                operator: self.operator,
            });
        }
        if state.failing_destinations.contains(destination) {
            return Err(TransportError::InvalidDestination {
                destination: destination.to_string(),
                reason: "PEER_ID_INVALID".into(),
            });
        }
        state
            .sends
            .push((self.operator, destination.to_string(), text.to_string()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.state().disconnects += 1;
        Ok(())
    }
}
