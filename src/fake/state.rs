//! In-memory keyspace behind the fake server.

use std::collections::HashMap;

/// Failures of keyspace operations, rendered as server error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Key holds a value of another type.
    WrongType,
    /// Value cannot be parsed as an integer, or the result overflows.
    ValueNotInteger,
    /// Filter required but absent.
    NotFound,
    /// Filter creation over an existing key.
    ItemExists,
    /// No slot left and expansion disabled.
    FilterFull,
}

impl StoreError {
    /// Reply text, as the server words it.
    pub fn message(&self) -> &'static str {
        match self {
            StoreError::WrongType => {
                "WRONGTYPE Operation against a key holding the wrong kind of value"
            }
            StoreError::ValueNotInteger => "ERR value is not an integer or out of range",
            StoreError::NotFound => "ERR not found",
            StoreError::ItemExists => "ERR item exists",
            StoreError::FilterFull => "ERR Filter is full",
        }
    }
}

/// Parameters of a cuckoo filter, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuckooParams {
    /// Requested capacity of the first sub-filter.
    pub capacity: u64,
    /// Items per bucket.
    pub bucket_size: u64,
    /// Maximum cuckoo kicks.
    pub max_iterations: u64,
    /// Growth factor for each further sub-filter; `0` disables growth.
    pub expansion: u64,
}

impl Default for CuckooParams {
    fn default() -> Self {
        Self {
            capacity: 1024,
            bucket_size: 2,
            max_iterations: 20,
            expansion: 1,
        }
    }
}

/// Exact stand-in for a server-side cuckoo filter.
///
/// Membership is tracked exactly (no false positives) while the slot
/// accounting follows the real layout: a sub-filter holds
/// `next_pow2(capacity / bucket_size)` buckets and a new, `expansion` times
/// larger sub-filter is added when every slot is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cuckoo {
    params: CuckooParams,
    counts: HashMap<Vec<u8>, u64>,
    buckets: Vec<u64>,
    items: u64,
    deleted: u64,
}

/// Outcome of adding one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The item was stored.
    Added,
    /// `nx` was set and the item was already present.
    Exists,
    /// No room left.
    Full,
}

impl Cuckoo {
    /// Creates an empty filter with one sub-filter.
    pub fn new(params: CuckooParams) -> Self {
        let base = (params.capacity / params.bucket_size.max(1))
            .max(1)
            .next_power_of_two();
        Self {
            params,
            counts: HashMap::new(),
            buckets: vec![base],
            items: 0,
            deleted: 0,
        }
    }

    /// Adds one item, growing the filter if allowed.
    pub fn add(&mut self, item: &[u8], nx: bool) -> AddOutcome {
        if nx && self.contains(item) {
            return AddOutcome::Exists;
        }
        if self.items >= self.slots() && !self.grow() {
            return AddOutcome::Full;
        }
        *self.counts.entry(item.to_vec()).or_insert(0) += 1;
        self.items += 1;
        AddOutcome::Added
    }

    /// Returns true if the item was added and not yet deleted.
    pub fn contains(&self, item: &[u8]) -> bool {
        self.counts.contains_key(item)
    }

    /// How many copies of the item are stored.
    pub fn count(&self, item: &[u8]) -> u64 {
        self.counts.get(item).copied().unwrap_or(0)
    }

    /// Removes one copy of the item.
    pub fn delete(&mut self, item: &[u8]) -> bool {
        let Some(count) = self.counts.get_mut(item) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(item);
        }
        self.items -= 1;
        self.deleted += 1;
        true
    }

    /// Creation parameters.
    pub fn params(&self) -> &CuckooParams {
        &self.params
    }

    /// Items currently stored.
    pub fn items(&self) -> u64 {
        self.items
    }

    /// Successful deletions so far.
    pub fn deleted(&self) -> u64 {
        self.deleted
    }

    /// Number of sub-filters.
    pub fn filters(&self) -> u64 {
        self.buckets.len() as u64
    }

    /// Buckets of the first sub-filter.
    pub fn bucket_num(&self) -> u64 {
        self.buckets.first().copied().unwrap_or(0)
    }

    /// Fingerprint bytes across all sub-filters.
    pub fn size(&self) -> u64 {
        self.slots()
    }

    fn slots(&self) -> u64 {
        self.buckets
            .iter()
            .fold(0u64, |acc, b| acc.saturating_add(b.saturating_mul(self.params.bucket_size)))
    }

    fn grow(&mut self) -> bool {
        if self.params.expansion == 0 {
            return false;
        }
        let last = self.buckets.last().copied().unwrap_or(1);
        self.buckets.push(last.saturating_mul(self.params.expansion));
        true
    }
}

/// A value stored under one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Plain string (integers are stored as their decimal text).
    String(Vec<u8>),
    /// Cuckoo filter.
    Cuckoo(Cuckoo),
}

impl Value {
    /// Name reported by `TYPE`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Cuckoo(_) => "MBbloomCF",
        }
    }
}

/// Number of databases a fake server exposes, as `SELECT 0` to `SELECT 15`.
pub const DATABASES: usize = 16;

/// The keys of one database.
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: HashMap<Vec<u8>, Value>,
}

/// Every database of one fake server.
///
/// Every connection opened by one [`FakeConnector`](crate::fake::FakeConnector)
/// shares one state; separate connectors never share. Connections start on
/// database 0 and move with `SELECT`.
#[derive(Debug)]
pub struct FakeServerState {
    databases: Vec<Keyspace>,
    credentials: Option<Credentials>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Credentials {
    username: Vec<u8>,
    password: Vec<u8>,
}

impl Default for FakeServerState {
    fn default() -> Self {
        Self {
            databases: (0..DATABASES).map(|_| Keyspace::default()).collect(),
            credentials: None,
        }
    }
}

impl FakeServerState {
    /// Creates a server with every database empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every key from every database.
    pub fn reset(&mut self) {
        self.databases.iter_mut().for_each(Keyspace::clear);
    }

    /// Number of keys across all databases.
    pub fn len(&self) -> usize {
        self.databases.iter().map(Keyspace::len).sum()
    }

    /// Returns true if no database holds a key.
    pub fn is_empty(&self) -> bool {
        self.databases.iter().all(Keyspace::is_empty)
    }

    /// Returns true if the key is set in database 0.
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.databases
            .first()
            .is_some_and(|db| db.contains_key(key))
    }

    /// Protects the server with a password. Connections must `AUTH` before
    /// any other command; `username` defaults to `default`.
    pub fn require_auth(&mut self, username: Option<&str>, password: impl AsRef<[u8]>) {
        self.credentials = Some(Credentials {
            username: username.unwrap_or("default").as_bytes().to_vec(),
            password: password.as_ref().to_vec(),
        });
    }

    /// Returns true if connections must authenticate.
    pub fn requires_auth(&self) -> bool {
        self.credentials.is_some()
    }

    pub(crate) fn check_credentials(&self, username: Option<&[u8]>, password: &[u8]) -> bool {
        self.credentials.as_ref().is_some_and(|c| {
            c.username == username.unwrap_or(b"default") && c.password == password
        })
    }

    /// Returns the database at `index`, if it exists.
    pub fn database(&self, index: usize) -> Option<&Keyspace> {
        self.databases.get(index)
    }

    pub(crate) fn database_mut(&mut self, index: usize) -> Option<&mut Keyspace> {
        self.databases.get_mut(index)
    }
}

impl Keyspace {
    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no key is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the key is set.
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.entries.contains_key(key.as_ref())
    }

    /// Returns the value under a key.
    pub fn value(&self, key: impl AsRef<[u8]>) -> Option<&Value> {
        self.entries.get(key.as_ref())
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn get(&self, key: &[u8]) -> Result<Option<&[u8]>, StoreError> {
        match self.entries.get(key) {
            Some(Value::String(v)) => Ok(Some(v)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    pub(crate) fn set(&mut self, key: &[u8], value: &[u8]) {
        self.entries
            .insert(key.to_vec(), Value::String(value.to_vec()));
    }

    pub(crate) fn del(&mut self, key: &[u8]) -> bool {
        self.entries.remove(key).is_some()
    }

    pub(crate) fn incr_by(&mut self, key: &[u8], delta: i64) -> Result<i64, StoreError> {
        let current = match self.get(key)? {
            Some(v) => std::str::from_utf8(v)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(StoreError::ValueNotInteger)?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or(StoreError::ValueNotInteger)?;
        self.set(key, next.to_string().as_bytes());
        Ok(next)
    }

    pub(crate) fn cf_reserve(&mut self, key: &[u8], params: CuckooParams) -> Result<(), StoreError> {
        if self.entries.contains_key(key) {
            return Err(StoreError::ItemExists);
        }
        self.entries
            .insert(key.to_vec(), Value::Cuckoo(Cuckoo::new(params)));
        Ok(())
    }

    /// Returns the filter under `key`, `None` if the key is missing.
    pub(crate) fn cf(&self, key: &[u8]) -> Result<Option<&Cuckoo>, StoreError> {
        match self.entries.get(key) {
            Some(Value::Cuckoo(cf)) => Ok(Some(cf)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    /// Returns the filter under `key`, failing with `NotFound` if missing.
    pub(crate) fn cf_existing(&mut self, key: &[u8]) -> Result<&mut Cuckoo, StoreError> {
        match self.entries.get_mut(key) {
            Some(Value::Cuckoo(cf)) => Ok(cf),
            Some(_) => Err(StoreError::WrongType),
            None => Err(StoreError::NotFound),
        }
    }

    /// Returns the filter under `key`, creating it with `params` if missing.
    pub(crate) fn cf_or_create(
        &mut self,
        key: &[u8],
        params: CuckooParams,
    ) -> Result<&mut Cuckoo, StoreError> {
        let value = self
            .entries
            .entry(key.to_vec())
            .or_insert_with(|| Value::Cuckoo(Cuckoo::new(params)));
        match value {
            Value::Cuckoo(cf) => Ok(cf),
            _ => Err(StoreError::WrongType),
        }
    }
}
