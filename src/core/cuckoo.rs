//! Cuckoo filter module commands (`CF.*`).
//!
//! The filter itself lives on the server; this module only builds commands
//! and narrows replies into Rust types:
//!
//! | method | reply |
//! |--------|-------|
//! | `create`, `reserve` | `bool` (`OK`) |
//! | `add`, `addnx`, `exists`, `delete` | `bool` |
//! | `insert`, `insertnx` | `Vec<i64>`: `1` added, `0` already present, `-1` filter full |
//! | `mexists` | `Vec<bool>` in argument order |
//! | `count` | `u64`, `0` for missing filters |
//! | `info` | [`CfInfo`] |

use bytes::Bytes;
use tracing::instrument;

use crate::core::command::{self, Cmd};
use crate::core::transport::Connector;
use crate::proto::error::EncodeError;
use crate::proto::frame::Frame;
use crate::{Client, Error, Result};

const MAX_BUCKET_SIZE: u64 = 255;
const MAX_ITERATIONS: u64 = 65535;
const MAX_EXPANSION: u64 = 32768;

/// Optional arguments of `CF.RESERVE`, serialized as
/// `BUCKETSIZE`, `MAXITERATIONS`, `EXPANSION` in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfReserveOptions {
    /// Items per bucket (1..=255).
    pub bucket_size: Option<u64>,
    /// Swap attempts before declaring the filter full (1..=65535).
    pub max_iterations: Option<u64>,
    /// Growth factor for sub-filters; `0` disables scaling (0..=32768).
    pub expansion: Option<u64>,
}

impl CfReserveOptions {
    /// Sets the bucket size.
    pub fn bucket_size(mut self, bucket_size: u64) -> Self {
        self.bucket_size = Some(bucket_size);
        self
    }

    /// Sets the maximum number of cuckoo kicks.
    pub fn max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Sets the expansion rate.
    pub fn expansion(mut self, expansion: u64) -> Self {
        self.expansion = Some(expansion);
        self
    }

    fn validate(&self) -> std::result::Result<(), EncodeError> {
        check_range("bucket size", self.bucket_size, 1, MAX_BUCKET_SIZE)?;
        check_range("max iterations", self.max_iterations, 1, MAX_ITERATIONS)?;
        check_range("expansion", self.expansion, 0, MAX_EXPANSION)
    }
}

/// Optional arguments of `CF.INSERT` / `CF.INSERTNX`, serialized as
/// `CAPACITY <n>` then `NOCREATE`, before `ITEMS`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfInsertOptions {
    /// Capacity used if the filter has to be created.
    pub capacity: Option<u64>,
    /// Fail instead of creating a missing filter.
    pub nocreate: bool,
}

impl CfInsertOptions {
    /// Sets the capacity for implicit creation.
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Requires the filter to exist already.
    pub fn nocreate(mut self) -> Self {
        self.nocreate = true;
        self
    }
}

fn check_range(
    name: &str,
    value: Option<u64>,
    min: u64,
    max: u64,
) -> std::result::Result<(), EncodeError> {
    match value {
        Some(v) if v < min || v > max => Err(EncodeError::new(format!(
            "{name} must be between {min} and {max}, got {v}"
        ))),
        _ => Ok(()),
    }
}

fn check_capacity(capacity: u64) -> std::result::Result<(), EncodeError> {
    if capacity == 0 {
        return Err(EncodeError::new("capacity must be greater than zero"));
    }
    Ok(())
}

fn check_items<I>(items: &[I]) -> std::result::Result<(), EncodeError> {
    if items.is_empty() {
        return Err(EncodeError::new("at least one item is required"));
    }
    Ok(())
}

/// Creates a CF.RESERVE command.
pub fn reserve(
    key: &str,
    capacity: u64,
    options: &CfReserveOptions,
) -> std::result::Result<Cmd, EncodeError> {
    check_capacity(capacity)?;
    options.validate()?;

    let mut cmd = Cmd::new("CF.RESERVE")
        .arg(key.to_string())
        .arg(capacity.to_string());
    if let Some(bucket_size) = options.bucket_size {
        cmd = cmd.arg("BUCKETSIZE").arg(bucket_size.to_string());
    }
    if let Some(max_iterations) = options.max_iterations {
        cmd = cmd.arg("MAXITERATIONS").arg(max_iterations.to_string());
    }
    if let Some(expansion) = options.expansion {
        cmd = cmd.arg("EXPANSION").arg(expansion.to_string());
    }
    Ok(cmd)
}

/// Creates a single-item CF command such as CF.ADD or CF.COUNT.
pub fn item_command(name: &'static str, key: &str, item: &[u8]) -> Cmd {
    Cmd::new(name).arg(key.to_string()).arg_slice(item)
}

/// Creates a CF.INSERT (or CF.INSERTNX when `nx`) command.
pub fn insert<I: AsRef<[u8]>>(
    key: &str,
    items: &[I],
    options: &CfInsertOptions,
    nx: bool,
) -> std::result::Result<Cmd, EncodeError> {
    check_items(items)?;
    if let Some(capacity) = options.capacity {
        check_capacity(capacity)?;
    }

    let name = if nx { "CF.INSERTNX" } else { "CF.INSERT" };
    let mut cmd = Cmd::new(name).arg(key.to_string());
    if let Some(capacity) = options.capacity {
        cmd = cmd.arg("CAPACITY").arg(capacity.to_string());
    }
    if options.nocreate {
        cmd = cmd.arg("NOCREATE");
    }
    cmd = cmd.arg("ITEMS");
    for item in items {
        cmd = cmd.arg_slice(item.as_ref());
    }
    Ok(cmd)
}

/// Creates a CF.MEXISTS command.
pub fn mexists<I: AsRef<[u8]>>(key: &str, items: &[I]) -> std::result::Result<Cmd, EncodeError> {
    check_items(items)?;
    Ok(items
        .iter()
        .fold(Cmd::new("CF.MEXISTS").arg(key.to_string()), |cmd, item| {
            cmd.arg_slice(item.as_ref())
        }))
}

/// Creates a CF.INFO command.
pub fn info(key: &str) -> Cmd {
    Cmd::new("CF.INFO").arg(key.to_string())
}

/// Creates a CF.SCANDUMP command.
pub fn scandump(key: &str, iterator: i64) -> Cmd {
    Cmd::new("CF.SCANDUMP")
        .arg(key.to_string())
        .arg(iterator.to_string())
}

/// Creates a CF.LOADCHUNK command.
pub fn loadchunk(key: &str, iterator: i64, data: Bytes) -> Cmd {
    Cmd::new("CF.LOADCHUNK")
        .arg(key.to_string())
        .arg(iterator.to_string())
        .arg(data)
}

/// Parsed `CF.INFO` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CfInfo {
    /// Memory used by the filter, in bytes.
    pub size: i64,
    /// Number of buckets.
    pub bucket_num: i64,
    /// Number of sub-filters.
    pub filter_num: i64,
    /// Items currently stored.
    pub inserted_num: i64,
    /// Items deleted so far.
    pub deleted_num: i64,
    /// Items per bucket.
    pub bucket_size: i64,
    /// Growth factor for sub-filters.
    pub expansion_rate: i64,
    /// Maximum cuckoo kicks per insert.
    pub max_iteration: i64,
}

impl CfInfo {
    /// Looks a field up by its camelCase name (`"insertedNum"`) or by the
    /// label the server uses (`"Number of items inserted"`).
    pub fn get(&self, name: &str) -> Option<i64> {
        let value = match name {
            "size" | "Size" => self.size,
            "bucketNum" | "Number of buckets" => self.bucket_num,
            "filterNum" | "Number of filters" => self.filter_num,
            "insertedNum" | "Number of items inserted" => self.inserted_num,
            "deletedNum" | "Number of items deleted" => self.deleted_num,
            "bucketSize" | "Bucket size" => self.bucket_size,
            "expansionRate" | "Expansion rate" => self.expansion_rate,
            "maxIteration" | "Max iterations" => self.max_iteration,
            _ => return None,
        };
        Some(value)
    }

    /// Builds the info from a RESP2 flat array or a RESP3 map. Unknown labels
    /// are ignored so newer servers stay readable.
    pub fn from_frame(frame: Frame) -> Result<Self> {
        let mut info = CfInfo::default();
        for (label, value) in command::frame_to_pairs(frame)? {
            let value = command::frame_to_int(value)?;
            let slot = match label.as_str() {
                "Size" => &mut info.size,
                "Number of buckets" => &mut info.bucket_num,
                "Number of filters" => &mut info.filter_num,
                "Number of items inserted" => &mut info.inserted_num,
                "Number of items deleted" => &mut info.deleted_num,
                "Bucket size" => &mut info.bucket_size,
                "Expansion rate" => &mut info.expansion_rate,
                "Max iterations" => &mut info.max_iteration,
                _ => continue,
            };
            *slot = value;
        }
        Ok(info)
    }
}

/// Cuckoo filter commands, reachable through [`Client::cf`].
///
/// # Example
///
/// ```no_run
/// # async fn demo(client: valet::Client) -> valet::Result<()> {
/// let cf = client.cf();
/// cf.create("cuckoo", 1000).await?;
/// assert!(cf.add("cuckoo", "filter").await?);
/// assert_eq!(cf.mexists("cuckoo", &["filter", "notexist"]).await?, vec![true, false]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CuckooFilter<'a, C: Connector> {
    client: &'a Client<C>,
}

impl<'a, C: Connector> CuckooFilter<'a, C> {
    pub(crate) fn new(client: &'a Client<C>) -> Self {
        Self { client }
    }

    /// Creates an empty filter with the given capacity (`CF.RESERVE`).
    ///
    /// # Errors
    ///
    /// [`Error::Server`] if the key already exists.
    #[instrument(skip(self), level = "debug")]
    pub async fn create(&self, key: &str, capacity: u64) -> Result<bool> {
        self.reserve(key, capacity, &CfReserveOptions::default())
            .await
    }

    /// Creates an empty filter with explicit tuning parameters.
    pub async fn reserve(
        &self,
        key: &str,
        capacity: u64,
        options: &CfReserveOptions,
    ) -> Result<bool> {
        let frame = self.client.execute(reserve(key, capacity, options)?).await?;
        command::frame_to_ok(frame)
    }

    /// Adds an item, creating the filter if needed. Duplicates are allowed.
    #[instrument(skip(self, item), level = "debug")]
    pub async fn add(&self, key: &str, item: impl AsRef<[u8]>) -> Result<bool> {
        self.item_bool("CF.ADD", key, item.as_ref()).await
    }

    /// Adds an item only if it may not exist yet. Returns false when it may.
    #[instrument(skip(self, item), level = "debug")]
    pub async fn addnx(&self, key: &str, item: impl AsRef<[u8]>) -> Result<bool> {
        self.item_bool("CF.ADDNX", key, item.as_ref()).await
    }

    /// Adds several items, one reply entry per item in input order.
    pub async fn insert<I: AsRef<[u8]>>(
        &self,
        key: &str,
        items: &[I],
        options: &CfInsertOptions,
    ) -> Result<Vec<i64>> {
        let frame = self
            .client
            .execute(insert(key, items, options, false)?)
            .await?;
        command::frame_to_vec_int(frame)
    }

    /// Like [`insert`](Self::insert) but skips items that may already exist.
    pub async fn insertnx<I: AsRef<[u8]>>(
        &self,
        key: &str,
        items: &[I],
        options: &CfInsertOptions,
    ) -> Result<Vec<i64>> {
        let frame = self
            .client
            .execute(insert(key, items, options, true)?)
            .await?;
        command::frame_to_vec_int(frame)
    }

    /// Checks whether an item may exist. Missing filters report false.
    pub async fn exists(&self, key: &str, item: impl AsRef<[u8]>) -> Result<bool> {
        self.item_bool("CF.EXISTS", key, item.as_ref()).await
    }

    /// Checks several items at once, aligned with the input order.
    pub async fn mexists<I: AsRef<[u8]>>(&self, key: &str, items: &[I]) -> Result<Vec<bool>> {
        let frame = self.client.execute(mexists(key, items)?).await?;
        command::frame_to_vec_bool(frame)
    }

    /// Returns how many times an item may have been added. `0` for a missing
    /// filter or item.
    pub async fn count(&self, key: &str, item: impl AsRef<[u8]>) -> Result<u64> {
        let cmd = item_command("CF.COUNT", key, item.as_ref());
        let n = command::frame_to_int(self.client.execute(cmd).await?)?;
        u64::try_from(n).map_err(|_| Error::Protocol {
            message: format!("negative count: {n}"),
        })
    }

    /// Removes one occurrence of an item. Returns false if it was not present.
    ///
    /// # Errors
    ///
    /// [`Error::Server`] if the filter does not exist.
    pub async fn delete(&self, key: &str, item: impl AsRef<[u8]>) -> Result<bool> {
        self.item_bool("CF.DEL", key, item.as_ref()).await
    }

    /// Returns filter statistics.
    pub async fn info(&self, key: &str) -> Result<CfInfo> {
        CfInfo::from_frame(self.client.execute(info(key)).await?)
    }

    /// Reads one chunk of a filter dump. Returns the next iterator (`0` when
    /// done) and the chunk data.
    pub async fn scandump(&self, key: &str, iterator: i64) -> Result<(i64, Option<Bytes>)> {
        let frame = self.client.execute(scandump(key, iterator)).await?;
        let parts = match command::parse_frame_response(frame)? {
            Frame::Array(parts) => parts,
            other => {
                return Err(Error::Protocol {
                    message: format!("unexpected CF.SCANDUMP reply: {other:?}"),
                })
            }
        };
        let [next, data] = <[Frame; 2]>::try_from(parts).map_err(|parts| Error::Protocol {
            message: format!("CF.SCANDUMP reply has {} elements", parts.len()),
        })?;
        Ok((command::frame_to_int(next)?, command::frame_to_bytes(data)?))
    }

    /// Restores one chunk produced by [`scandump`](Self::scandump).
    pub async fn loadchunk(&self, key: &str, iterator: i64, data: Bytes) -> Result<bool> {
        let frame = self.client.execute(loadchunk(key, iterator, data)).await?;
        command::frame_to_ok(frame)
    }

    async fn item_bool(&self, name: &'static str, key: &str, item: &[u8]) -> Result<bool> {
        let frame = self.client.execute(item_command(name, key, item)).await?;
        command::frame_to_bool(frame)
    }
}
