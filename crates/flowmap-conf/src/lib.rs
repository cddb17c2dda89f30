//! Layered Splunk configuration loading and precedence merging.
//!
//! A host snapshot is a directory tree shaped like `$SPLUNK_HOME/etc`:
//! - `system/default`, `system/local`
//! - `apps/<app>/default`, `apps/<app>/local`
//!
//! [`ConfigLoader`] extracts raw records from every supported `.conf` file
//! without merging. [`PrecedenceMerger`] resolves one winning value per
//! `(conf kind, stanza, attribute)` and [`HostConfig`] indexes the typed
//! stanzas for the resolver.

mod host;
mod layer;
mod loader;
mod merge;
mod parser;
mod record;
mod redact;
mod stanza;

pub use host::{HostConfig, OutputGroup, ServerEntry};
pub use layer::{AppOrder, Layer};
pub use loader::{ConfFile, ConfigLoader, HostSnapshot, LoadError};
pub use merge::{AttributeValue, MergedConfig, MergedStanza, PrecedenceMerger};
pub use parser::{parse_conf, ConfEntry, ParsedConf};
pub use record::{ConfKind, ParseError, Provenance, RawRecord, StanzaHeader};
pub use redact::{RedactionPolicy, DEFAULT_MARKERS, REDACTED};
pub use stanza::{
    parse_bool, split_list, IndexStanza, InputKind, InputStanza, OutputStanza, OutputTarget,
    PropsPattern, PropsStanza, ServerStanza, Stanza, StanzaAttributes, TransformAction,
    TransformStanza,
};

/// Stanza name that collects keys appearing before any header.
pub const DEFAULT_STANZA: &str = "default";
