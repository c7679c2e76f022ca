//! Resolved content exposure for template rendering.
//!
//! The template renderer receives only a link's materialized content:
//! no ids, timestamps, or provider reference. Manual and resolved
//! links come out the same shape. Key ordering of the returned
//! mapping is not guaranteed.

use serde_json::Value;

use tether_core::LinkContent;
use tether_state::LinkRecord;

/// The mapping handed to the template renderer for one link.
pub fn template_content(link: &LinkRecord) -> LinkContent {
    link.content_snapshot.clone()
}

/// Same content as a JSON value, for renderers that take a document.
pub fn template_content_value(link: &LinkRecord) -> Value {
    Value::Object(link.content_snapshot.clone())
}
