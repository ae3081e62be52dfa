// Call options
// Per-call configuration, applied in order on top of the client defaults

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use conduit_error::StackError;

use crate::connection::TransportRequest;

/// Multi-valued string map
///
/// With `CASE_INSENSITIVE` set, keys are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueMap<const CASE_INSENSITIVE: bool> {
    entries: BTreeMap<String, Vec<String>>,
}

/// Header map with case-insensitive keys
pub type Headers = ValueMap<true>;
/// Query parameters
pub type Query = ValueMap<false>;

impl<const CASE_INSENSITIVE: bool> ValueMap<CASE_INSENSITIVE> {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(key: &str) -> String {
        if CASE_INSENSITIVE {
            key.to_ascii_lowercase()
        } else {
            key.to_string()
        }
    }

    /// Replace every value of `key`
    pub fn set<I, V>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        self.entries.insert(Self::key(key), values);
    }

    /// Replace `key` with a single value
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.set(key, [value.into()]);
    }

    /// Append one value to `key`
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .entry(Self::key(key))
            .or_default()
            .push(value.into());
    }

    /// Append several values to `key`
    pub fn append<I, V>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.entries
            .entry(Self::key(key))
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Per-key replace with the entries of `other`
    pub fn merge(&mut self, other: &Self) {
        for (key, values) in &other.entries {
            self.entries.insert(key.clone(), values.clone());
        }
    }

    /// Append every value of `other`
    pub fn extend(&mut self, other: &Self) {
        for (key, values) in &other.entries {
            self.entries
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    /// First value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&Self::key(key))
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&Self::key(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&Self::key(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.entries.remove(&Self::key(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Every key/value pair, flattened
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V, const CASE_INSENSITIVE: bool> FromIterator<(K, V)> for ValueMap<CASE_INSENSITIVE>
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.add(k.as_ref(), v);
        }
        map
    }
}

/// Computes the full request URL at call time
pub type UrlResolver = Arc<dyn Fn() -> Result<String, StackError> + Send + Sync>;
/// Rewrites the outgoing request just before it is sent
pub type RequestProcessor =
    Arc<dyn Fn(&mut TransportRequest) -> Result<(), StackError> + Send + Sync>;
/// Opaque value carried alongside a call
pub type CallData = Arc<dyn Any + Send + Sync>;

/// One mutation of a [`CallInfo`]
#[derive(Clone)]
pub enum CallOption {
    Timeout(Duration),
    SetHeaders(Headers),
    SetHeader(String, Vec<String>),
    AddHeaders(Headers),
    AddHeader(String, Vec<String>),
    SetQuery(Query),
    MergeQuery(Query),
    SetQueryValue(String, String),
    AddQuery(Query),
    AddQueryValue(String, String),
    Url(UrlResolver),
    Endpoint(String),
    ResponseNotParse,
    ProcessRequest(RequestProcessor),
    Interceptors(Vec<String>),
    Data(CallData),
}

impl fmt::Debug for CallOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOption::Timeout(d) => f.debug_tuple("Timeout").field(d).finish(),
            CallOption::SetHeaders(h) => f.debug_tuple("SetHeaders").field(h).finish(),
            CallOption::SetHeader(k, v) => f.debug_tuple("SetHeader").field(k).field(v).finish(),
            CallOption::AddHeaders(h) => f.debug_tuple("AddHeaders").field(h).finish(),
            CallOption::AddHeader(k, v) => f.debug_tuple("AddHeader").field(k).field(v).finish(),
            CallOption::SetQuery(q) => f.debug_tuple("SetQuery").field(q).finish(),
            CallOption::MergeQuery(q) => f.debug_tuple("MergeQuery").field(q).finish(),
            CallOption::SetQueryValue(k, v) => {
                f.debug_tuple("SetQueryValue").field(k).field(v).finish()
            }
            CallOption::AddQuery(q) => f.debug_tuple("AddQuery").field(q).finish(),
            CallOption::AddQueryValue(k, v) => {
                f.debug_tuple("AddQueryValue").field(k).field(v).finish()
            }
            CallOption::Url(_) => f.write_str("Url(..)"),
            CallOption::Endpoint(e) => f.debug_tuple("Endpoint").field(e).finish(),
            CallOption::ResponseNotParse => f.write_str("ResponseNotParse"),
            CallOption::ProcessRequest(_) => f.write_str("ProcessRequest(..)"),
            CallOption::Interceptors(names) => f.debug_tuple("Interceptors").field(names).finish(),
            CallOption::Data(_) => f.write_str("Data(..)"),
        }
    }
}

/// The merged configuration of one call
#[derive(Clone, Default)]
pub struct CallInfo {
    pub timeout: Option<Duration>,
    pub headers: Headers,
    pub query: Query,
    pub response_not_parse: bool,
    pub url: Option<UrlResolver>,
    pub process: Option<RequestProcessor>,
    pub data: Option<CallData>,
    pub endpoint: Option<String>,
    pub interceptors: Option<Vec<String>>,
}

impl CallInfo {
    /// Apply options in order to an empty call info
    pub fn from_options<'a>(options: impl IntoIterator<Item = &'a CallOption>) -> Self {
        let mut info = CallInfo::default();
        for option in options {
            info.apply(option);
        }
        info
    }

    pub fn apply(&mut self, option: &CallOption) {
        match option {
            CallOption::Timeout(d) => self.timeout = Some(*d),
            CallOption::SetHeaders(h) => self.headers = h.clone(),
            CallOption::SetHeader(k, vs) => self.headers.set(k, vs.iter().cloned()),
            CallOption::AddHeaders(h) => self.headers.extend(h),
            CallOption::AddHeader(k, vs) => self.headers.append(k, vs.iter().cloned()),
            CallOption::SetQuery(q) => self.query = q.clone(),
            CallOption::MergeQuery(q) => self.query.merge(q),
            CallOption::SetQueryValue(k, v) => {
                if !k.is_empty() {
                    self.query.insert(k, v.clone());
                }
            }
            CallOption::AddQuery(q) => self.query.extend(q),
            CallOption::AddQueryValue(k, v) => {
                if !k.is_empty() {
                    self.query.add(k, v.clone());
                }
            }
            CallOption::Url(resolver) => self.url = Some(resolver.clone()),
            CallOption::Endpoint(e) => self.endpoint = Some(e.clone()),
            CallOption::ResponseNotParse => self.response_not_parse = true,
            CallOption::ProcessRequest(p) => self.process = Some(p.clone()),
            CallOption::Interceptors(names) => self.interceptors = Some(names.clone()),
            CallOption::Data(d) => self.data = Some(d.clone()),
        }
    }

    /// The passthrough data, if it has type `T`
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_deref().and_then(|d| d.downcast_ref::<T>())
    }
}

impl fmt::Debug for CallInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallInfo")
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("response_not_parse", &self.response_not_parse)
            .field("url", &self.url.is_some())
            .field("process", &self.process.is_some())
            .field("data", &self.data.is_some())
            .field("endpoint", &self.endpoint)
            .field("interceptors", &self.interceptors)
            .finish()
    }
}

/// Chainable list of call options
#[derive(Debug, Clone, Default)]
pub struct CallOptions(Vec<CallOption>);

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, option: CallOption) -> Self {
        self.0.push(option);
        self
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.push(CallOption::Timeout(timeout))
    }

    pub fn set_headers(self, headers: Headers) -> Self {
        self.push(CallOption::SetHeaders(headers))
    }

    pub fn set_header(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(CallOption::SetHeader(key.into(), vec![value.into()]))
    }

    pub fn add_headers(self, headers: Headers) -> Self {
        self.push(CallOption::AddHeaders(headers))
    }

    pub fn add_header(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(CallOption::AddHeader(key.into(), vec![value.into()]))
    }

    pub fn set_query(self, query: Query) -> Self {
        self.push(CallOption::SetQuery(query))
    }

    pub fn merge_query(self, query: Query) -> Self {
        self.push(CallOption::MergeQuery(query))
    }

    pub fn query_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(CallOption::SetQueryValue(key.into(), value.into()))
    }

    pub fn add_query(self, query: Query) -> Self {
        self.push(CallOption::AddQuery(query))
    }

    pub fn add_query_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(CallOption::AddQueryValue(key.into(), value.into()))
    }

    pub fn url<F>(self, resolver: F) -> Self
    where
        F: Fn() -> Result<String, StackError> + Send + Sync + 'static,
    {
        self.push(CallOption::Url(Arc::new(resolver)))
    }

    pub fn endpoint(self, endpoint: impl Into<String>) -> Self {
        self.push(CallOption::Endpoint(endpoint.into()))
    }

    pub fn response_not_parse(self) -> Self {
        self.push(CallOption::ResponseNotParse)
    }

    pub fn process_request<F>(self, process: F) -> Self
    where
        F: Fn(&mut TransportRequest) -> Result<(), StackError> + Send + Sync + 'static,
    {
        self.push(CallOption::ProcessRequest(Arc::new(process)))
    }

    pub fn interceptors<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(CallOption::Interceptors(names.into_iter().map(Into::into).collect()))
    }

    pub fn data<T: Any + Send + Sync>(self, data: T) -> Self {
        self.push(CallOption::Data(Arc::new(data)))
    }

    pub fn build(self) -> Vec<CallOption> {
        self.0
    }

    pub fn as_slice(&self) -> &[CallOption] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<CallOptions> for Vec<CallOption> {
    fn from(options: CallOptions) -> Self {
        options.0
    }
}

impl IntoIterator for CallOptions {
    type Item = CallOption;
    type IntoIter = std::vec::IntoIter<CallOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Client defaults followed by call options, in a fresh list
pub fn combine(defaults: &[CallOption], call: Vec<CallOption>) -> Vec<CallOption> {
    if defaults.is_empty() {
        return call;
    }
    let mut combined = Vec::with_capacity(defaults.len() + call.len());
    combined.extend_from_slice(defaults);
    combined.extend(call);
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> Query {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_call_options_win_over_defaults() {
        let defaults = CallOptions::new().merge_query(query(&[("a", "1")])).build();
        let call = CallOptions::new()
            .merge_query(query(&[("a", "2"), ("b", "3")]))
            .build();

        let info = CallInfo::from_options(&combine(&defaults, call));
        assert_eq!(info.query, query(&[("a", "2"), ("b", "3")]));
    }

    #[test]
    fn test_set_options_are_idempotent() {
        let options = CallOptions::new()
            .set_header("X-Tenant", "acme")
            .query_value("page", "2")
            .merge_query(query(&[("size", "10")]))
            .timeout(Duration::from_secs(3))
            .build();

        let once = CallInfo::from_options(&options);
        let twice = CallInfo::from_options(options.iter().chain(options.iter()));

        assert_eq!(once.headers, twice.headers);
        assert_eq!(once.query, twice.query);
        assert_eq!(once.timeout, twice.timeout);
        assert_eq!(twice.headers.get_all("x-tenant"), ["acme".to_string()]);
    }

    #[test]
    fn test_add_options_are_additive() {
        let options = CallOptions::new()
            .add_header("Accept", "application/json")
            .add_query_value("tag", "red")
            .build();

        let twice = CallInfo::from_options(options.iter().chain(options.iter()));
        assert_eq!(twice.headers.get_all("accept").len(), 2);
        assert_eq!(twice.query.get_all("tag"), ["red".to_string(), "red".to_string()]);
    }

    #[test]
    fn test_set_header_replaces_added_values() {
        let info = CallInfo::from_options(
            &CallOptions::new()
                .add_header("x-a", "1")
                .add_header("X-A", "2")
                .set_header("x-a", "3")
                .build(),
        );
        assert_eq!(info.headers.get_all("X-A"), ["3".to_string()]);
    }

    #[test]
    fn test_set_query_replaces_everything() {
        let info = CallInfo::from_options(
            &CallOptions::new()
                .merge_query(query(&[("a", "1"), ("b", "2")]))
                .set_query(query(&[("c", "3")]))
                .build(),
        );
        assert_eq!(info.query, query(&[("c", "3")]));
    }

    #[test]
    fn test_empty_query_key_is_ignored() {
        let info = CallInfo::from_options(&CallOptions::new().query_value("", "x").build());
        assert!(info.query.is_empty());
    }

    #[test]
    fn test_data_passthrough() {
        #[derive(Debug, PartialEq)]
        struct Tenant(&'static str);

        let info = CallInfo::from_options(&CallOptions::new().data(Tenant("acme")).build());
        assert_eq!(info.data::<Tenant>(), Some(&Tenant("acme")));
        assert_eq!(info.data::<String>(), None);
    }

    #[test]
    fn test_combine_does_not_alias_defaults() {
        let defaults = CallOptions::new().timeout(Duration::from_secs(1)).build();
        let mut first = combine(&defaults, vec![CallOption::ResponseNotParse]);
        first.push(CallOption::Endpoint("http://other".into()));
        assert_eq!(defaults.len(), 1);
        assert_eq!(combine(&defaults, Vec::new()).len(), 1);
    }

    #[test]
    fn test_pairs_flatten_values() {
        let mut q = Query::new();
        q.append("id", ["1", "2"]);
        q.insert("sort", "asc");
        let pairs: Vec<_> = q.pairs().collect();
        assert_eq!(pairs, vec![("id", "1"), ("id", "2"), ("sort", "asc")]);
    }
}
