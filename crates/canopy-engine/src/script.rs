//! Engine-side update scripts.
//!
//! Two scripts exist, each in the Groovy dialect of 1.x/2.x engines and the
//! Painless dialect of 5.x and later:
//!
//! - the fulltext merge script, which applies one node's contribution to a
//!   fulltext root's `__fulltextParts` and recomputes `__fulltext`
//!   (params: `identifier`, `fulltext`);
//! - the preserve-fulltext script, which replaces a fulltext root's source
//!   with fresh node data while keeping both fulltext fields
//!   (params: `newData`).
//!
//! Both must behave exactly like [`canopy_core::FulltextParts`].

use serde_json::{Map, Value, json};

/// Fulltext merge script, Groovy.
pub const GROOVY_MERGE_FULLTEXT: &str = r#"
if (!(ctx._source.__fulltextParts instanceof Map)) {
    ctx._source.__fulltextParts = [:];
}
if (fulltext.size() > 0) {
    ctx._source.__fulltextParts[identifier] = fulltext;
} else {
    ctx._source.__fulltextParts.remove(identifier);
}
ctx._source.__fulltext = [:];
for (part in ctx._source.__fulltextParts.values()) {
    for (bucket in part.entrySet()) {
        def value = bucket.value.trim();
        if (ctx._source.__fulltext.containsKey(bucket.key)) {
            ctx._source.__fulltext[bucket.key] += ' ' + value;
        } else {
            ctx._source.__fulltext[bucket.key] = value;
        }
    }
}
"#;

/// Fulltext merge script, Painless.
pub const PAINLESS_MERGE_FULLTEXT: &str = r#"
if (!(ctx._source.__fulltextParts instanceof Map)) {
    ctx._source.__fulltextParts = new LinkedHashMap();
}
if (params.fulltext.size() > 0) {
    ctx._source.__fulltextParts[params.identifier] = params.fulltext;
} else {
    ctx._source.__fulltextParts.remove(params.identifier);
}
ctx._source.__fulltext = new HashMap();
for (part in ctx._source.__fulltextParts.values()) {
    for (bucket in part.entrySet()) {
        String value = bucket.getValue().trim();
        if (ctx._source.__fulltext.containsKey(bucket.getKey())) {
            ctx._source.__fulltext[bucket.getKey()] += ' ' + value;
        } else {
            ctx._source.__fulltext[bucket.getKey()] = value;
        }
    }
}
"#;

/// Preserve-fulltext index script, Groovy.
pub const GROOVY_PRESERVE_FULLTEXT: &str = r#"
def fulltext = ctx._source.__fulltext;
def fulltextParts = ctx._source.__fulltextParts;
ctx._source = newData;
if (fulltext != null) { ctx._source.__fulltext = fulltext; }
if (fulltextParts != null) { ctx._source.__fulltextParts = fulltextParts; }
"#;

/// Preserve-fulltext index script, Painless.
pub const PAINLESS_PRESERVE_FULLTEXT: &str = r#"
def fulltext = ctx._source.__fulltext;
def fulltextParts = ctx._source.__fulltextParts;
ctx._source = params.newData;
if (fulltext != null) { ctx._source.__fulltext = fulltext; }
if (fulltextParts != null) { ctx._source.__fulltextParts = fulltextParts; }
"#;

/// Parameter carrying the fresh source in the preserve-fulltext script.
pub const NEW_DATA_PARAM: &str = "newData";

/// Parameters of the preserve-fulltext script.
pub fn preserve_params(source: &Map<String, Value>) -> Value {
    json!({ NEW_DATA_PARAM: source })
}

/// Script dialect and payload layout of an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptDialect {
    /// `{"script": SRC, "lang": "groovy", "params": {...}}` (1.x/2.x).
    FlatGroovy,
    /// `{"script": {"lang": "painless", "inline": SRC, "params": {...}}}` (5.x/6.x).
    PainlessInline,
    /// `{"script": {"lang": "painless", "source": SRC, "params": {...}}}` (7.x+).
    PainlessSource,
}

impl ScriptDialect {
    /// Merge script source for this dialect.
    pub fn merge_source(&self) -> &'static str {
        match self {
            Self::FlatGroovy => GROOVY_MERGE_FULLTEXT,
            Self::PainlessInline | Self::PainlessSource => PAINLESS_MERGE_FULLTEXT,
        }
    }

    /// Preserve-fulltext script source for this dialect.
    pub fn preserve_source(&self) -> &'static str {
        match self {
            Self::FlatGroovy => GROOVY_PRESERVE_FULLTEXT,
            Self::PainlessInline | Self::PainlessSource => PAINLESS_PRESERVE_FULLTEXT,
        }
    }

    /// Update body running `source` with `params`, creating `upsert` when
    /// the document is missing.
    pub fn update_body(&self, source: &str, params: Value, upsert: Value) -> Value {
        match self {
            Self::FlatGroovy => json!({
                "script": source,
                "lang": "groovy",
                "params": params,
                "upsert": upsert,
            }),
            Self::PainlessInline => json!({
                "script": {"lang": "painless", "inline": source, "params": params},
                "upsert": upsert,
            }),
            Self::PainlessSource => json!({
                "script": {"lang": "painless", "source": source, "params": params},
                "upsert": upsert,
            }),
        }
    }
}
