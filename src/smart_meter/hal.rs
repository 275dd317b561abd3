/* ----------------- Platform capabilities ------------------ */

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::error::Result;

/// Monotonic millisecond clock (milliseconds since boot or equivalent).
pub trait TimeSource {
    fn now_ms(&self) -> u64;
}

/// Durable key/value store of named float fields.
pub trait DurableStore {
    fn get_or(&self, key: &str, default: f64) -> f64;

    fn put(&mut self, key: &str, value: f64) -> Result<()>;

    /// Writes several fields as one snapshot. Stores that can batch override this.
    fn put_all(&mut self, entries: &[(&str, f64)]) -> Result<()> {
        for (key, value) in entries {
            self.put(key, *value)?;
        }
        Ok(())
    }
}

/// Single digital output line (the alert buzzer).
pub trait DigitalOutput {
    fn write(&mut self, high: bool);
}

/// One raw reading from a current transducer ADC channel.
pub trait RawSampler {
    fn read_raw(&mut self) -> u16;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

impl<T: DurableStore + ?Sized> DurableStore for &mut T {
    fn get_or(&self, key: &str, default: f64) -> f64 {
        (**self).get_or(key, default)
    }

    fn put(&mut self, key: &str, value: f64) -> Result<()> {
        (**self).put(key, value)
    }

    fn put_all(&mut self, entries: &[(&str, f64)]) -> Result<()> {
        (**self).put_all(entries)
    }
}

impl<T: DigitalOutput + ?Sized> DigitalOutput for &mut T {
    fn write(&mut self, high: bool) {
        (**self).write(high)
    }
}

impl<T: RawSampler + ?Sized> RawSampler for Box<T> {
    fn read_raw(&mut self) -> u16 {
        (**self).read_raw()
    }
}

/* ----------------- Clocks ------------------ */

/// Wall clock backed by `Instant`, counting from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Settable clock. Clones share the same time, so a test can hold one
/// handle and advance it while components own the others.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/* ----------------- Stores ------------------ */

/// Volatile store. `set_unavailable(true)` makes every write fail.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, f64>,
    writes: usize,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Number of successful writes, a batch counting once.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(io::Error::other("memory store marked unavailable").into());
        }
        Ok(())
    }
}

impl DurableStore for MemoryStore {
    fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    fn put(&mut self, key: &str, value: f64) -> Result<()> {
        self.check_available()?;
        self.values.insert(key.to_string(), value);
        self.writes += 1;
        Ok(())
    }

    fn put_all(&mut self, entries: &[(&str, f64)]) -> Result<()> {
        self.check_available()?;
        for (key, value) in entries {
            self.values.insert((*key).to_string(), *value);
        }
        self.writes += 1;
        Ok(())
    }
}

/*
* @brief File backed store, one JSON object per namespace file.
* @note Every write replaces the whole file through a temporary file and a rename,
*       so a crash leaves either the previous or the new snapshot on disk.
*/
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, f64>,
}

impl JsonFileStore {
    /*
    * @brief Open a store file, starting empty when it does not exist yet.
    * @param path Location of the namespace file
    * @return The store, or an error when the file exists but cannot be read or parsed
    */
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values: BTreeMap<String, f64> = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        log::debug!("Opened store {} with {} fields", path.display(), values.len());

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.values)?;
        let tmp = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = File::create(&tmp)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DurableStore for JsonFileStore {
    fn get_or(&self, key: &str, default: f64) -> f64 {
        self.values.get(key).copied().unwrap_or(default)
    }

    fn put(&mut self, key: &str, value: f64) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }

    fn put_all(&mut self, entries: &[(&str, f64)]) -> Result<()> {
        for (key, value) in entries {
            self.values.insert((*key).to_string(), *value);
        }
        self.flush()
    }
}

/* ----------------- Outputs ------------------ */

/// Output that remembers its level and counts level changes.
#[derive(Debug, Default, Clone)]
pub struct RecordingOutput {
    high: bool,
    edges: usize,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    pub fn edges(&self) -> usize {
        self.edges
    }
}

impl DigitalOutput for RecordingOutput {
    fn write(&mut self, high: bool) {
        if high != self.high {
            self.edges += 1;
        }
        self.high = high;
    }
}

/// Output that only logs its edges, used when no buzzer is wired.
#[derive(Debug, Clone)]
pub struct LogOutput {
    name: String,
    high: bool,
}

impl LogOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            high: false,
        }
    }
}

impl DigitalOutput for LogOutput {
    fn write(&mut self, high: bool) {
        if high != self.high {
            log::debug!("{} -> {}", self.name, if high { "HIGH" } else { "LOW" });
        }
        self.high = high;
    }
}

/* ----------------- Samplers ------------------ */

/// Replays queued raw readings, then repeats an idle value.
#[derive(Debug, Default, Clone)]
pub struct ScriptedSampler {
    queue: VecDeque<u16>,
    idle: u16,
}

impl ScriptedSampler {
    pub fn new(idle: u16) -> Self {
        Self {
            queue: VecDeque::new(),
            idle,
        }
    }

    pub fn push(&mut self, samples: impl IntoIterator<Item = u16>) {
        self.queue.extend(samples);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl RawSampler for ScriptedSampler {
    fn read_raw(&mut self) -> u16 {
        self.queue.pop_front().unwrap_or(self.idle)
    }
}
