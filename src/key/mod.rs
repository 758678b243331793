//! Client keys.
//!
//! A client key names the rate-limited entity: an API key, an IP address, a
//! user id, or a combination of several of these. The engine treats keys as
//! opaque strings; this module only decides how a value is rendered into one.
//!
//! # Example
//!
//! ```
//! use ratelimit_engine::key::{ClientKey, CompositeKey};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
//! assert_eq!(ip.to_key(), "10.0.0.1");
//!
//! let key = CompositeKey::new().part("tenant-7").part(ip).part("/search");
//! assert_eq!(key.to_key(), "tenant-7:10.0.0.1:/search");
//! ```

mod composite;

pub use composite::CompositeKey;

use std::borrow::Cow;
use std::net::IpAddr;

/// A value that identifies one rate-limited client.
pub trait ClientKey {
    /// Render the key used to index the client's state.
    fn to_key(&self) -> Cow<'_, str>;
}

impl ClientKey for str {
    fn to_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl ClientKey for String {
    fn to_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl ClientKey for IpAddr {
    fn to_key(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

impl ClientKey for u64 {
    fn to_key(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

impl<K: ClientKey + ?Sized> ClientKey for &K {
    fn to_key(&self) -> Cow<'_, str> {
        (**self).to_key()
    }
}
