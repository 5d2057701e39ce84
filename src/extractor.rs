use core::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::aggregate::{GroupSidList, aggregate_group_sids};
use crate::authorization_data::extract_pac;
use crate::error::{ExtractError, MalformedToken};
use crate::spnego::SpnegoToken;
use crate::ticket::{ServiceKeySet, TicketDecryptor};
use crate::Limits;

/// Progress of one [`GroupSidExtractor::extract`] call.
///
/// States only move forward. A failure is labelled with the last state that
/// was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    /// Nothing parsed yet.
    Start,
    /// The SPNEGO token was parsed.
    TokenParsed,
    /// The ticket was decrypted.
    TicketDecrypted,
    /// The PAC was located, or found absent.
    PacExtracted,
    /// The SID list is complete.
    SidsAggregated,
}

impl fmt::Display for PipelineState {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::TokenParsed => "token parsed",
            Self::TicketDecrypted => "ticket decrypted",
            Self::PacExtracted => "PAC extracted",
            Self::SidsAggregated => "SIDs aggregated",
        })
    }
}

impl PipelineState {
    fn fail<E>(self, source: E) -> ExtractError
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        warn!(state = %self, error = %source, "ticket processing failed");
        ExtractError::TicketProcessing {
            state: self,
            source: Box::new(source),
        }
    }
}

/// Turns SPNEGO negotiation tokens into the group SIDs of the client.
///
/// Stateless between calls: one extractor can serve any number of threads
/// when its decryptor is `Sync`.
///
/// # Examples
/// ```rust
/// use ad_group_sids::{
///     DecryptedTicket, GroupSidExtractor, ServiceKeySet, TicketDecryptor,
/// };
///
/// struct NoPac;
///
/// impl TicketDecryptor for NoPac {
///     type Error = std::io::Error;
///
///     fn decrypt(&self, _: &[u8], _: &ServiceKeySet) -> Result<DecryptedTicket, Self::Error> {
///         Ok(DecryptedTicket::default())
///     }
/// }
///
/// let extractor = GroupSidExtractor::new(NoPac, ServiceKeySet::default().shared());
/// // Not a negotiation token at all.
/// assert!(extractor.extract(b"\x30\x00").is_err());
/// ```
#[derive(Debug)]
pub struct GroupSidExtractor<D> {
    decryptor: D,
    keys: Arc<ServiceKeySet>,
    limits: Limits,
}

impl<D: TicketDecryptor> GroupSidExtractor<D> {
    /// Creates an extractor with [`Limits::DEFAULT`].
    #[must_use]
    #[inline]
    pub const fn new(decryptor: D, keys: Arc<ServiceKeySet>) -> Self {
        Self {
            decryptor,
            keys,
            limits: Limits::DEFAULT,
        }
    }

    /// Replaces the decoding limits.
    #[must_use]
    #[inline]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The decoding limits.
    #[must_use]
    #[inline]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The service keys handed to the decryptor.
    #[must_use]
    #[inline]
    pub const fn keys(&self) -> &Arc<ServiceKeySet> {
        &self.keys
    }

    /// Extracts the group SIDs carried by a negotiation token.
    ///
    /// A mechanism other than Kerberos, a ticket without a PAC and a PAC
    /// without logon info all yield an empty list.
    ///
    /// # Errors
    /// - [`ExtractError::MalformedToken`] for an invalid SPNEGO token.
    /// - [`ExtractError::TicketProcessing`] when decryption, authorization
    ///   data or the PAC structure fails.
    /// - [`ExtractError::PacDecoding`] for a malformed SID in the PAC.
    #[tracing::instrument(level = "debug", skip_all, fields(token_len = token.len()))]
    pub fn extract(&self, token: &[u8]) -> Result<GroupSidList, ExtractError> {
        let state = PipelineState::Start;
        trace!(%state, "parsing negotiation token");
        let spnego = SpnegoToken::parse(token, &self.limits).inspect_err(|err| {
            warn!(%state, error = %err, "malformed negotiation token");
        })?;
        let state = PipelineState::TokenParsed;
        debug!(%state, mechanism = %spnego.mechanism, "parsed negotiation token");

        if !spnego.mechanism.is_kerberos() {
            debug!(
                state = %PipelineState::SidsAggregated,
                mechanism = %spnego.mechanism,
                "mechanism carries no PAC"
            );
            return Ok(GroupSidList::new());
        }
        let mechanism_token = spnego
            .mechanism_token
            .ok_or(MalformedToken::MissingMechanismToken)?;

        let ticket = self
            .decryptor
            .decrypt(mechanism_token, &self.keys)
            .map_err(|err| state.fail(err))?;
        let state = PipelineState::TicketDecrypted;
        debug!(
            %state,
            authorization_data = ticket.authorization_data.len(),
            "decrypted ticket"
        );

        let pac = extract_pac(&ticket, &self.limits).map_err(|err| state.fail(err))?;
        let state = PipelineState::PacExtracted;
        let logon_info = pac.as_ref().and_then(|pac| pac.logon_info.as_ref());
        debug!(
            %state,
            pac = pac.is_some(),
            logon_info = logon_info.is_some(),
            "extracted PAC"
        );

        let sids = aggregate_group_sids(logon_info).inspect_err(|err| {
            warn!(list = %err.list, index = err.index, error = %err.source, "malformed PAC SID");
        })?;
        debug!(state = %PipelineState::SidsAggregated, count = sids.len(), "aggregated group SIDs");
        trace!(sids = ?sids.as_slice());
        Ok(sids)
    }
}
