//! A backend that keeps filter values in the query string of the page address.
use crate::{
    error::FilterSyncError as Error,
    store::{
        codec::{JsonCodec, ValueCodec},
        Bucket, FilterStore, Patch,
    },
};
use log::debug;
use std::{collections::HashMap, sync::Arc};
use url::form_urlencoded;

static DEFAULT_CODEC: JsonCodec = JsonCodec;

/// Filter values stored as query parameters.
///
/// When a namespace is set, each key is written as `{namespace}.{key}` so that several tables can share one
/// address. Parameters that do not belong to this store are left untouched and keep their position. A repeated
/// parameter is read from its first occurrence, and a write replaces that occurrence and drops the rest.
#[derive(Clone, Debug, Default)]
pub struct UrlStore {
    namespace: Option<String>,
    params: Vec<(String, String)>,
    codecs: HashMap<String, Arc<dyn ValueCodec>>,
}

impl UrlStore {
    /// Create a store from the current query string, with or without its leading `?`
    pub fn new(query: &str) -> Self {
        let params = form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .into_owned()
            .collect();
        Self {
            namespace: None,
            params,
            codecs: HashMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string()).filter(|namespace| !namespace.is_empty());
        self
    }

    /// Use these codecs for their keys; keys without a codec use `JsonCodec`
    pub fn with_codecs(mut self, codecs: HashMap<String, Arc<dyn ValueCodec>>) -> Self {
        self.codecs.extend(codecs);
        self
    }

    pub fn set_codec(&mut self, key: &str, codec: Arc<dyn ValueCodec>) {
        self.codecs.insert(key.to_string(), codec);
    }

    /// The current query string, without a leading `?`
    pub fn query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish()
    }

    fn codec(&self, key: &str) -> &dyn ValueCodec {
        match self.codecs.get(key) {
            Some(codec) => codec.as_ref(),
            None => &DEFAULT_CODEC,
        }
    }

    fn param_name(&self, key: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}.{}", namespace, key),
            None => key.to_string(),
        }
    }

    // The store key of a query parameter, or `None` if the parameter belongs to someone else
    fn key_of<'a>(&self, name: &'a str) -> Option<&'a str> {
        match &self.namespace {
            Some(namespace) => name.strip_prefix(namespace.as_str())?.strip_prefix('.'),
            None => Some(name),
        }
    }
}

impl FilterStore for UrlStore {
    fn snapshot(&self) -> Bucket {
        let mut bucket = Bucket::new();
        for (name, text) in &self.params {
            let Some(key) = self.key_of(name) else {
                continue;
            };
            if bucket.contains_key(key) {
                debug!("Ignoring repeated query parameter {}", name);
                continue;
            }
            match self.codec(key).decode(text) {
                Some(value) => {
                    bucket.insert(key.to_string(), value);
                }
                None => debug!("Query parameter {} carries no value", name),
            }
        }
        bucket
    }

    fn patch(&mut self, patch: Patch) -> Result<(), Error> {
        // Encode everything first so that a codec failure leaves the address unchanged
        let mut encoded = Vec::with_capacity(patch.len());
        for (key, value) in patch {
            let text = match value {
                Some(value) => Some(self.codec(&key).encode(&value).map_err(|e| {
                    Error::CodecError {
                        key: key.clone(),
                        message: e.to_string(),
                    }
                })?),
                None => None,
            };
            encoded.push((self.param_name(&key), text));
        }

        for (name, text) in encoded {
            match text {
                Some(text) => {
                    let mut seen = false;
                    self.params.retain_mut(|(param, value)| {
                        if *param != name {
                            return true;
                        }
                        if seen {
                            return false;
                        }
                        seen = true;
                        *value = text.clone();
                        true
                    });
                    if !seen {
                        self.params.push((name, text));
                    }
                }
                None => self.params.retain(|(param, _)| *param != name),
            }
        }
        debug!("Address query is now {}", self.query());

        Ok(())
    }
}
