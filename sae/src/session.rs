//! SAE session state machine.

use crate::{
    Config, Error, Result,
    commit::{self, MAX_PASSWORD_IDENTIFIER_LEN},
    confirm,
    exchange::AnyExchange,
    group::{Group, select_group},
    kdf::{Keys, PMK_LEN, PMKID_LEN},
    pwe,
};
use alloc::vec::Vec;
use core::fmt;
use rand_core::CryptoRngCore;
use tracing::{debug, warn};
use zeroize::Zeroize;

/// Protocol state of a [`Session`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum State {
    /// No commit has been derived or received.
    Nothing,
    /// A commit has been derived or received.
    Committed,
    /// Keys are derived; waiting for the peer's confirm.
    Confirmed,
    /// Peer's confirm verified. The PMK is available.
    Accepted,
    /// The session failed and rejects every further operation.
    Aborted,
}

/// Result of processing a message that did not fail.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[must_use]
pub enum Outcome {
    /// The message was processed.
    Accepted,
    /// The message was dropped. No reply must be sent.
    SilentDiscard,
}

/// One SAE authentication attempt with one peer.
///
/// Every error except [`Error::MalformedMessage`], [`Error::Replay`] and
/// [`Error::InvalidState`] aborts the session, unless it has already
/// reached [`State::Accepted`], in which case the offending message is
/// rejected and the accepted result kept. See [`Error::is_fatal`].
pub struct Session {
    config: Config,
    state: State,
    group: Option<Group>,
    exchange: Option<AnyExchange>,
    keys: Option<Keys>,
    retained_keys: Option<Keys>,
    send_confirm: u16,
    peer_send_confirm: Option<u16>,
    accepted_peer_scalar: Option<Vec<u8>>,
    anti_clogging_token: Option<Vec<u8>>,
    peer_token: Option<Vec<u8>>,
    password_identifier: Option<Vec<u8>>,
}

impl Session {
    /// Create a session governed by `config`.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: State::Nothing,
            group: None,
            exchange: None,
            keys: None,
            retained_keys: None,
            send_confirm: 0,
            peer_send_confirm: None,
            accepted_peer_scalar: None,
            anti_clogging_token: None,
            peer_token: None,
            password_identifier: None,
        }
    }

    /// Select the group for this session.
    ///
    /// Only possible before any commit was derived or received. Selecting
    /// a different group drops a stored anti-clogging token.
    pub fn set_group(&mut self, id: u16) -> Result<()> {
        let result = self.try_set_group(id);
        self.check(result)
    }

    fn try_set_group(&mut self, id: u16) -> Result<()> {
        if self.state != State::Nothing {
            return Err(Error::InvalidState);
        }

        let group = select_group(id, &self.config)?;
        self.replace_group(group);
        Ok(())
    }

    fn replace_group(&mut self, group: Group) {
        if self.group.as_ref().map(Group::id) != Some(group.id()) {
            debug!(group = group.id(), "group selected");
            self.anti_clogging_token = None;
        }
        self.group = Some(group);
    }

    /// Derive the password element and this party's commit.
    ///
    /// Uses the most preferred configured group if none was selected.
    /// `id_a` and `id_b` are the two parties' identities in either order.
    /// The password identifier, if any, is expected in the peer's commit.
    pub fn derive_pwe<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        password: &[u8],
        id_a: &[u8],
        id_b: &[u8],
        identifier: Option<&[u8]>,
    ) -> Result<()> {
        let result = self.try_derive_pwe(rng, password, id_a, id_b, identifier);
        self.check(result)
    }

    fn try_derive_pwe<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        password: &[u8],
        id_a: &[u8],
        id_b: &[u8],
        identifier: Option<&[u8]>,
    ) -> Result<()> {
        if matches!(self.state, State::Confirmed | State::Aborted) {
            return Err(Error::InvalidState);
        }

        if identifier.is_some_and(|id| id.len() > MAX_PASSWORD_IDENTIFIER_LEN) {
            return Err(Error::UnknownPasswordIdentifier);
        }

        let group = match &self.group {
            Some(group) => group.clone(),
            None => {
                let id = self
                    .config
                    .preferred_group()
                    .ok_or(Error::GroupNotSupported)?;
                select_group(id, &self.config)?
            }
        };

        // a responder keeps the peer commit it already parsed
        let mut fresh = None;
        let exchange = match &mut self.exchange {
            Some(exchange) if self.state == State::Committed => exchange,
            _ => fresh.insert(AnyExchange::new(&group)),
        };

        let seed_key = pwe::seed_key(id_a, id_b);
        exchange.derive(rng, &seed_key, password, identifier)?;

        if let Some(exchange) = fresh {
            self.exchange = Some(exchange);
        }
        self.replace_group(group);
        if self.state == State::Accepted {
            self.retain_accepted_keys();
        }
        self.keys = None;
        self.password_identifier = identifier.map(<[u8]>::to_vec);
        self.transition(State::Committed);
        Ok(())
    }

    /// Serialize this party's commit.
    ///
    /// `token` and `identifier` default to the stored anti-clogging token
    /// and password identifier.
    pub fn build_commit(
        &mut self,
        token: Option<&[u8]>,
        identifier: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let result = self.try_build_commit(token, identifier);
        self.check(result)
    }

    fn try_build_commit(&self, token: Option<&[u8]>, identifier: Option<&[u8]>) -> Result<Vec<u8>> {
        if self.state == State::Aborted {
            return Err(Error::InvalidState);
        }

        let (Some(group), Some(exchange)) = (&self.group, &self.exchange) else {
            return Err(Error::InvalidState);
        };
        let (scalar, element) = exchange.own_commit().ok_or(Error::InvalidState)?;

        let token = token.or(self.anti_clogging_token.as_deref());
        let identifier = identifier.or(self.password_identifier.as_deref());

        let mut msg = Vec::with_capacity(2 + scalar.len() + element.len());
        msg.extend_from_slice(&group.id().to_le_bytes());
        if let Some(token) = token {
            msg.extend_from_slice(token);
        }
        msg.extend_from_slice(scalar);
        msg.extend_from_slice(element);
        if let Some(identifier) = identifier {
            commit::write_password_identifier(&mut msg, identifier)?;
        }

        Ok(msg)
    }

    /// Process the peer's commit.
    ///
    /// Returns [`Outcome::SilentDiscard`] for a reflection of our own
    /// commit. The session is only modified when the commit is accepted.
    ///
    /// A new commit after [`State::Accepted`] means the peer started over.
    /// It starts a fresh exchange, so this party must call
    /// [`derive_pwe`](Self::derive_pwe) again before deriving keys. The
    /// accepted PMK stays available until the new exchange is accepted.
    pub fn parse_commit(&mut self, msg: &[u8]) -> Result<Outcome> {
        let result = self.try_parse_commit(msg);
        self.check(result)
    }

    fn try_parse_commit(&mut self, msg: &[u8]) -> Result<Outcome> {
        if matches!(self.state, State::Confirmed | State::Aborted) {
            return Err(Error::InvalidState);
        }

        let (id, body) = commit::split_group(msg)?;
        let group = match (&self.group, self.state) {
            (_, State::Nothing) => select_group(id, &self.config)?,
            (Some(group), _) if group.id() == id => group.clone(),
            _ => {
                debug!(group = id, "peer proposed a different group");
                return Err(Error::GroupNotSupported);
            }
        };

        let fields = commit::parse(body, group.prime_len(), group.element_len())?;

        if self.state == State::Accepted {
            let own = self.exchange.as_ref().and_then(AnyExchange::own_commit);
            if own == Some((fields.scalar, fields.element)) {
                warn!("peer reflected our accepted commit");
                return Ok(Outcome::SilentDiscard);
            }
        }

        // only a responder that has not yet accepted keeps its exchange
        let mut fresh = None;
        let exchange = match &mut self.exchange {
            Some(exchange) if self.state == State::Committed => exchange,
            _ => fresh.insert(AnyExchange::new(&group)),
        };

        let expected = self.password_identifier.as_deref();
        let outcome = exchange.receive(
            fields.scalar,
            fields.element,
            self.accepted_peer_scalar.as_deref(),
            || commit::check_password_identifier(expected, fields.password_identifier),
        )?;

        if outcome == Outcome::SilentDiscard {
            return Ok(outcome);
        }

        if let Some(exchange) = fresh {
            self.exchange = Some(exchange);
        }
        self.replace_group(group);

        if let Some(token) = fields.token {
            debug!(len = token.len(), "peer included an anti-clogging token");
        }
        self.peer_token = fields.token.map(<[u8]>::to_vec);

        if self.password_identifier.is_none() {
            self.password_identifier = fields.password_identifier.map(<[u8]>::to_vec);
        }

        if self.state == State::Accepted {
            debug!("peer started a new exchange");
            self.retain_accepted_keys();
        }
        self.transition(State::Committed);
        Ok(Outcome::Accepted)
    }

    /// Combine the shared secret and derive the session keys.
    ///
    /// Both commits must be known. Without a peer commit this is a
    /// [`Error::KeyDerivationFailure`]. Without our own commit, as after
    /// the peer restarted an accepted exchange, it is
    /// [`Error::InvalidState`] and the session is left as it was.
    pub fn derive_keys(&mut self) -> Result<()> {
        let result = self.try_derive_keys();
        self.check(result)
    }

    fn try_derive_keys(&mut self) -> Result<()> {
        match self.state {
            State::Nothing => {
                debug!("no commit to derive keys from");
                return Err(Error::KeyDerivationFailure);
            }
            State::Committed => (),
            _ => return Err(Error::InvalidState),
        }

        let exchange = self.exchange.as_mut().ok_or(Error::KeyDerivationFailure)?;
        if exchange.own_commit().is_none() {
            debug!("own commit not derived yet");
            return Err(Error::InvalidState);
        }

        self.keys = Some(exchange.derive_keys()?);
        self.transition(State::Confirmed);
        Ok(())
    }

    /// Serialize a confirm message and advance the send-confirm counter.
    pub fn build_confirm(&mut self) -> Result<Vec<u8>> {
        let result = self.try_build_confirm();
        self.check(result)
    }

    fn try_build_confirm(&mut self) -> Result<Vec<u8>> {
        if !matches!(self.state, State::Confirmed | State::Accepted) {
            return Err(Error::InvalidState);
        }

        let (Some(keys), Some(exchange)) = (&self.keys, &self.exchange) else {
            return Err(Error::InvalidState);
        };
        let ((own_scalar, own_element), (peer_scalar, peer_element)) =
            match (exchange.own_commit(), exchange.peer_commit()) {
                (Some(own), Some(peer)) => (own, peer),
                _ => return Err(Error::InvalidState),
            };

        let send_confirm = self.send_confirm;
        let mac = confirm::confirm_mac(
            &keys.kck,
            send_confirm,
            own_scalar,
            own_element,
            peer_scalar,
            peer_element,
        )?;

        let mut msg = Vec::with_capacity(confirm::CONFIRM_LEN);
        msg.extend_from_slice(&send_confirm.to_le_bytes());
        msg.extend_from_slice(&mac);

        self.send_confirm = send_confirm.saturating_add(1);
        Ok(msg)
    }

    /// Verify the peer's confirm message.
    ///
    /// Once accepted, confirms that do not advance the peer's counter are
    /// ignored with [`Outcome::SilentDiscard`].
    pub fn check_confirm(&mut self, msg: &[u8]) -> Result<Outcome> {
        let result = self.try_check_confirm(msg);
        self.check(result)
    }

    fn try_check_confirm(&mut self, msg: &[u8]) -> Result<Outcome> {
        if !matches!(self.state, State::Confirmed | State::Accepted) {
            return Err(Error::InvalidState);
        }

        let (peer_send_confirm, mac) = confirm::split(msg)?;

        if self.state == State::Accepted
            && (peer_send_confirm == u16::MAX
                || self.peer_send_confirm.is_some_and(|rc| peer_send_confirm <= rc))
        {
            debug!(sc = peer_send_confirm, "ignoring stale confirm");
            return Ok(Outcome::SilentDiscard);
        }

        let (Some(keys), Some(exchange)) = (&self.keys, &self.exchange) else {
            return Err(Error::InvalidState);
        };
        let ((own_scalar, own_element), (peer_scalar, peer_element)) =
            match (exchange.own_commit(), exchange.peer_commit()) {
                (Some(own), Some(peer)) => (own, peer),
                _ => return Err(Error::InvalidState),
            };

        let expected = confirm::confirm_mac(
            &keys.kck,
            peer_send_confirm,
            peer_scalar,
            peer_element,
            own_scalar,
            own_element,
        )?;

        if !confirm::mac_eq(&expected, mac) {
            warn!("confirm mismatch");
            return Err(Error::ConfirmMismatch);
        }

        self.accepted_peer_scalar = Some(peer_scalar.to_vec());
        self.peer_send_confirm = Some(peer_send_confirm);
        self.retained_keys = None;
        self.transition(State::Accepted);
        Ok(Outcome::Accepted)
    }

    /// Store an anti-clogging token demanded by the peer; it is included
    /// in subsequent commits.
    pub fn set_anti_clogging_token(&mut self, token: &[u8]) {
        self.anti_clogging_token = Some(token.to_vec());
    }

    /// Process a token request (status
    /// [`ANTI_CLOGGING_TOKEN_REQUIRED`](crate::status::ANTI_CLOGGING_TOKEN_REQUIRED))
    /// and store the token it carries.
    pub fn parse_token_request(&mut self, msg: &[u8]) -> Result<()> {
        let result = self.try_parse_token_request(msg);
        self.check(result)
    }

    fn try_parse_token_request(&mut self, msg: &[u8]) -> Result<()> {
        if !matches!(self.state, State::Nothing | State::Committed) {
            return Err(Error::InvalidState);
        }

        let (id, token) = commit::split_group(msg)?;
        if self.group.as_ref().map(Group::id) != Some(id) {
            debug!(group = id, "token request for a different group");
            return Err(Error::GroupNotSupported);
        }

        if token.is_empty() {
            debug!("token request without a token");
            return Err(Error::MalformedMessage);
        }

        debug!(len = token.len(), "peer demanded an anti-clogging token");
        self.set_anti_clogging_token(token);
        Ok(())
    }

    /// Current protocol state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Selected group.
    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    /// Pairwise master key of the most recently accepted exchange.
    pub fn pmk(&self) -> Option<&[u8; PMK_LEN]> {
        self.accepted_keys().map(|keys| &keys.pmk)
    }

    /// Pairwise master key identifier of the most recently accepted
    /// exchange.
    pub fn pmkid(&self) -> Option<&[u8; PMKID_LEN]> {
        self.accepted_keys().map(|keys| &keys.pmkid)
    }

    fn accepted_keys(&self) -> Option<&Keys> {
        match self.state {
            State::Accepted => self.keys.as_ref(),
            _ => self.retained_keys.as_ref(),
        }
    }

    /// Set the accepted keys aside while a new exchange runs.
    fn retain_accepted_keys(&mut self) {
        self.retained_keys = self.keys.take();
        self.peer_send_confirm = None;
    }

    /// Password identifier expected from, or received from, the peer.
    pub fn password_identifier(&self) -> Option<&[u8]> {
        self.password_identifier.as_deref()
    }

    /// Anti-clogging token found in the last accepted peer commit.
    pub fn peer_token(&self) -> Option<&[u8]> {
        self.peer_token.as_deref()
    }

    /// Counter the next confirm message will carry.
    pub fn send_confirm(&self) -> u16 {
        self.send_confirm
    }

    fn transition(&mut self, next: State) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "state transition");
            self.state = next;
        }
    }

    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() && !matches!(self.state, State::Accepted | State::Aborted) {
                self.abort(*err);
            }
        }
        result
    }

    fn abort(&mut self, err: Error) {
        debug!(%err, from = ?self.state, "session aborted");
        self.state = State::Aborted;
        self.exchange = None;
        self.keys = None;
        self.retained_keys = None;
        self.accepted_peer_scalar.zeroize();
        self.anti_clogging_token.zeroize();
        self.peer_token.zeroize();
        self.password_identifier.zeroize();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("group", &self.group.as_ref().map(Group::id))
            .field("send_confirm", &self.send_confirm)
            .finish_non_exhaustive()
    }
}
