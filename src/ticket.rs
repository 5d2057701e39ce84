//! The decryption boundary.
//!
//! Decrypting a Kerberos AP-REQ and checking its signatures needs a
//! Kerberos/crypto library and the service's long-term keys. This crate does
//! not do either: a [`TicketDecryptor`] is handed the mechanism token and the
//! [`ServiceKeySet`] and returns the ticket's authorization data in plain
//! text.

use core::fmt;
use std::sync::Arc;

use delegate::delegate;

use crate::authorization_data::parse_authorization_data;
use crate::error::AuthorizationDataError;

/// A long-term service key, as found in a keytab.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceKey {
    /// Service principal name, for example `HTTP/web.example.com@EXAMPLE.COM`.
    pub principal: String,
    /// Kerberos encryption type (`etype`).
    pub encryption_type: i32,
    /// Key version number, when known.
    pub version: Option<u32>,
    key: Vec<u8>,
}

impl ServiceKey {
    /// Creates a service key.
    #[must_use]
    #[inline]
    pub fn new(
        principal: impl Into<String>,
        encryption_type: i32,
        version: Option<u32>,
        key: Vec<u8>,
    ) -> Self {
        Self {
            principal: principal.into(),
            encryption_type,
            version,
            key,
        }
    }

    /// The key material.
    #[must_use]
    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for ServiceKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKey")
            .field("principal", &self.principal)
            .field("encryption_type", &self.encryption_type)
            .field("version", &self.version)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// The keys a service can decrypt tickets with.
///
/// Read-only once built, shared between extractors behind an [`Arc`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceKeySet {
    keys: Vec<ServiceKey>,
}

impl ServiceKeySet {
    /// Creates a key set.
    #[must_use]
    #[inline]
    pub const fn new(keys: Vec<ServiceKey>) -> Self {
        Self { keys }
    }

    /// Wraps the key set for sharing.
    #[must_use]
    #[inline]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Keys of the given encryption type, in insertion order.
    #[inline]
    pub fn by_encryption_type(&self, encryption_type: i32) -> impl Iterator<Item = &ServiceKey> {
        self.keys
            .iter()
            .filter(move |key| key.encryption_type == encryption_type)
    }

    delegate! {
        to self.keys {
            /// Number of keys.
            #[must_use]
            pub fn len(&self) -> usize;
            /// Whether the set holds no key.
            #[must_use]
            pub fn is_empty(&self) -> bool;
            /// All keys, in insertion order.
            pub fn iter(&self) -> core::slice::Iter<'_, ServiceKey>;
        }
    }
}

impl FromIterator<ServiceKey> for ServiceKeySet {
    #[inline]
    fn from_iter<I: IntoIterator<Item = ServiceKey>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// One `AuthorizationData` element of a decrypted ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationDataElement {
    /// `ad-type`.
    pub ad_type: i32,
    /// `ad-data`.
    pub ad_data: Vec<u8>,
}

impl AuthorizationDataElement {
    /// Creates an element.
    #[must_use]
    #[inline]
    pub const fn new(ad_type: i32, ad_data: Vec<u8>) -> Self {
        Self { ad_type, ad_data }
    }

    /// Parses a DER `AuthorizationData` sequence, for decryptors that hand
    /// back the encoded field.
    ///
    /// # Errors
    /// [`AuthorizationDataError::Der`] if `der` is not a valid sequence.
    #[inline]
    pub fn parse_sequence(der: &[u8]) -> Result<Vec<Self>, AuthorizationDataError> {
        Ok(parse_authorization_data(der)?
            .into_iter()
            .map(|(ad_type, ad_data)| Self::new(ad_type, ad_data.to_vec()))
            .collect())
    }
}

/// The parts of a decrypted service ticket this crate reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct DecryptedTicket {
    /// `cname` of the ticket, when the decryptor exposes it.
    pub client_principal: Option<String>,
    /// `crealm` of the ticket, when the decryptor exposes it.
    pub client_realm: Option<String>,
    /// `authorization-data`, in ticket order.
    pub authorization_data: Vec<AuthorizationDataElement>,
}

impl DecryptedTicket {
    /// Creates a ticket holding only authorization data.
    #[must_use]
    #[inline]
    pub const fn new(authorization_data: Vec<AuthorizationDataElement>) -> Self {
        Self {
            client_principal: None,
            client_realm: None,
            authorization_data,
        }
    }

    /// Sets the client principal and realm.
    #[must_use]
    #[inline]
    pub fn with_client(mut self, principal: impl Into<String>, realm: impl Into<String>) -> Self {
        self.client_principal = Some(principal.into());
        self.client_realm = Some(realm.into());
        self
    }
}

/// Decrypts a Kerberos AP-REQ into a [`DecryptedTicket`].
///
/// Implementations verify the ticket with the service keys; anything
/// returned is trusted by the rest of the pipeline.
pub trait TicketDecryptor {
    /// Decryption failure.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Decrypts `mechanism_token`, the raw AP-REQ carried by SPNEGO.
    ///
    /// # Errors
    /// Whatever prevents decryption or verification.
    fn decrypt(
        &self,
        mechanism_token: &[u8],
        keys: &ServiceKeySet,
    ) -> Result<DecryptedTicket, Self::Error>;
}

impl<T: TicketDecryptor + ?Sized> TicketDecryptor for &T {
    type Error = T::Error;

    #[inline]
    fn decrypt(
        &self,
        mechanism_token: &[u8],
        keys: &ServiceKeySet,
    ) -> Result<DecryptedTicket, Self::Error> {
        (**self).decrypt(mechanism_token, keys)
    }
}

impl<T: TicketDecryptor + ?Sized> TicketDecryptor for Arc<T> {
    type Error = T::Error;

    #[inline]
    fn decrypt(
        &self,
        mechanism_token: &[u8],
        keys: &ServiceKeySet,
    ) -> Result<DecryptedTicket, Self::Error> {
        (**self).decrypt(mechanism_token, keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod test {
    use super::*;
    use crate::testutil::authorization_data_der;

    #[test]
    fn debug_redacts_key_material() {
        let key = ServiceKey::new("HTTP/web.example.com@EXAMPLE.COM", 18, Some(3), vec![0xaa; 32]);
        let debug = format!("{key:?}");
        assert!(debug.contains("<redacted>"), "{debug}");
        assert!(!debug.contains("170"), "{debug}");
        assert_eq!(key.key().len(), 32);
    }

    #[test]
    fn key_set_filters_by_encryption_type() {
        let keys: ServiceKeySet = [
            ServiceKey::new("HTTP/a", 17, None, vec![1]),
            ServiceKey::new("HTTP/a", 18, Some(2), vec![2]),
            ServiceKey::new("HTTP/a", 18, Some(3), vec![3]),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 3);
        let versions: Vec<_> = keys.by_encryption_type(18).map(|key| key.version).collect();
        assert_eq!(versions, [Some(2), Some(3)]);
        assert!(ServiceKeySet::default().is_empty());
    }

    #[test]
    fn parse_sequence_keeps_order() {
        let der = authorization_data_der(&[(1, vec![0x30, 0x00]), (128, vec![1, 2, 3])]);
        assert_eq!(
            AuthorizationDataElement::parse_sequence(&der).unwrap(),
            [
                AuthorizationDataElement::new(1, vec![0x30, 0x00]),
                AuthorizationDataElement::new(128, vec![1, 2, 3]),
            ]
        );
        assert!(AuthorizationDataElement::parse_sequence(&[0x30, 0x05]).is_err());
    }
}
