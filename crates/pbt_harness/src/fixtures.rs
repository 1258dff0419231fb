//! Registered fixture properties.
//!
//! Each fixture is a small property with a fixed test name, chosen to
//! exercise one seeding behavior end to end:
//!
//! - `fails_once`: fails on the first accepted value, so the failing line
//!   shows exactly which value a seed produces first
//! - `record_rejections`: records every drawn value and rejects it, then on
//!   later runs rejects only values it has seen, so a health-check failure
//!   replays only under the seed that recorded it
//! - `always_passes`: never fails
//! - `oversized`: draws more data than the choice budget allows

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

use pbt_core::data::{StopTest, TestCase};
use pbt_core::strategy::{booleans, integers, vecs};
use tracing::{debug, info};

use crate::error::{HarnessError, Result};

/// Boxed test body, as the runner consumes it.
pub type TestBody = Box<dyn FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest>>;

/// A registered fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fixture {
    /// Fails on the first value with magnitude above 10000.
    FailsOnce,
    /// Record-then-filter health-check scenario.
    RecordRejections,
    /// Always passes.
    AlwaysPasses,
    /// Overruns the choice budget on every example.
    Oversized,
}

impl Fixture {
    /// Every fixture, in listing order.
    pub const ALL: [Self; 4] = [
        Self::FailsOnce,
        Self::RecordRejections,
        Self::AlwaysPasses,
        Self::Oversized,
    ];

    /// Registry name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FailsOnce => "fails_once",
            Self::RecordRejections => "record_rejections",
            Self::AlwaysPasses => "always_passes",
            Self::Oversized => "oversized",
        }
    }

    /// Name the property runs under. Derandomized seeds depend on it.
    #[must_use]
    pub const fn test_name(self) -> &'static str {
        match self {
            Self::FailsOnce => "test_fails_once",
            Self::RecordRejections => "test_failure",
            Self::AlwaysPasses => "test_always_passes",
            Self::Oversized => "test_oversized",
        }
    }

    /// One-line description for `list`.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::FailsOnce => "fails on the first integer with |n| > 10000",
            Self::RecordRejections => {
                "records and rejects every value; with an existing record, rejects seen values"
            }
            Self::AlwaysPasses => "draws an integer and a boolean and passes",
            Self::Oversized => "draws vectors longer than the choice budget",
        }
    }

    /// Whether the fixture needs `--record`.
    #[must_use]
    pub const fn needs_record(self) -> bool {
        matches!(self, Self::RecordRejections)
    }

    /// Build a fresh instance of the property.
    ///
    /// Every call starts from clean state, so two instances never influence
    /// each other.
    pub fn property(self, record: Option<&Path>) -> Result<FixtureProperty> {
        let property = match self {
            Self::FailsOnce => FixtureProperty::plain(Box::new(fails_once())),
            Self::AlwaysPasses => FixtureProperty::plain(Box::new(always_passes())),
            Self::Oversized => FixtureProperty::plain(Box::new(oversized()?)),
            Self::RecordRejections => {
                let path = record
                    .ok_or_else(|| HarnessError::MissingRecordPath(self.name().to_string()))?;
                if path.exists() {
                    let seen = read_record(path)?;
                    info!(path = %path.display(), values = seen.len(), "replaying record");
                    FixtureProperty::plain(Box::new(reject_seen(seen)))
                } else {
                    info!(path = %path.display(), "recording rejected values");
                    let values = Rc::new(RefCell::new(Vec::new()));
                    FixtureProperty {
                        body: Box::new(record_and_reject(Rc::clone(&values))),
                        recording: Some(Recording {
                            path: path.to_path_buf(),
                            values,
                        }),
                    }
                }
            }
        };
        Ok(property)
    }
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Fixture {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| HarnessError::UnknownFixture(s.to_string()))
    }
}

/// Values drawn in record mode, written out after the run.
struct Recording {
    path: PathBuf,
    values: Rc<RefCell<Vec<i64>>>,
}

/// A test body plus any state it must persist once the run is over.
pub struct FixtureProperty {
    body: TestBody,
    recording: Option<Recording>,
}

impl FixtureProperty {
    fn plain(body: TestBody) -> Self {
        Self {
            body,
            recording: None,
        }
    }

    /// Split into the body and a finisher that persists recorded values.
    #[must_use]
    pub fn into_parts(self) -> (TestBody, RecordWriter) {
        (
            self.body,
            RecordWriter {
                recording: self.recording,
            },
        )
    }
}

/// Writes recorded values once the run is over.
pub struct RecordWriter {
    recording: Option<Recording>,
}

impl RecordWriter {
    /// Write the record file, if this run was recording.
    pub fn finish(self) -> Result<()> {
        let Some(recording) = self.recording else {
            return Ok(());
        };
        let values = recording.values.borrow();
        let mut contents = String::with_capacity(values.len() * 8);
        for value in values.iter() {
            contents.push_str(&value.to_string());
            contents.push('\n');
        }
        fs::write(&recording.path, contents)?;
        info!(path = %recording.path.display(), values = values.len(), "record written");
        Ok(())
    }
}

/// Read a record file: one integer per line, blank lines ignored.
pub fn read_record(path: &Path) -> Result<BTreeSet<i64>> {
    let contents = fs::read_to_string(path)?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            line.trim()
                .parse::<i64>()
                .map_err(|_| HarnessError::InvalidRecord {
                    path: path.to_path_buf(),
                    line: i + 1,
                    content: line.to_string(),
                })
        })
        .collect()
}

fn fails_once() -> impl FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest> {
    let mut first: Option<i64> = None;
    move |tc| {
        let some_int = tc.draw_named("some_int", &integers())?;
        tc.assume(some_int.unsigned_abs() > 10_000)?;
        let first = *first.get_or_insert(some_int);
        if some_int == first {
            return Err(StopTest::fail(format!("drew {first} again")));
        }
        Ok(())
    }
}

fn always_passes() -> impl FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest> {
    |tc| {
        tc.draw_named("n", &integers())?;
        tc.draw_named("flag", &booleans())?;
        Ok(())
    }
}

fn oversized() -> Result<impl FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest>> {
    let strategy = vecs(integers(), 2_000, 4_000)?;
    Ok(property_fn(move |tc| {
        let items = tc.draw(&strategy)?;
        debug!(len = items.len(), "oversized draw completed");
        Ok(())
    }))
}

/// Pins a closure to the test-body signature.
fn property_fn<F>(f: F) -> F
where
    F: FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest>,
{
    f
}

fn record_and_reject(
    values: Rc<RefCell<Vec<i64>>>,
) -> impl FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest> {
    move |tc| {
        let i = tc.draw(&integers())?;
        values.borrow_mut().push(i);
        tc.reject()
    }
}

fn reject_seen(
    seen: BTreeSet<i64>,
) -> impl FnMut(&mut TestCase<'_>) -> std::result::Result<(), StopTest> {
    move |tc| {
        let i = tc.draw(&integers())?;
        tc.assume(!seen.contains(&i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for fixture in Fixture::ALL {
            assert_eq!(fixture.name().parse::<Fixture>().unwrap(), fixture);
        }
        assert!(matches!(
            "nope".parse::<Fixture>(),
            Err(HarnessError::UnknownFixture(_))
        ));
    }

    #[test]
    fn test_record_fixture_needs_path() {
        assert!(matches!(
            Fixture::RecordRejections.property(None),
            Err(HarnessError::MissingRecordPath(_))
        ));
        assert!(Fixture::FailsOnce.property(None).is_ok());
    }

    #[test]
    fn test_read_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.txt");
        fs::write(&path, "3\n-7\n\n3\n").unwrap();
        let seen = read_record(&path).unwrap();
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![-7, 3]);
    }

    #[test]
    fn test_read_record_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.txt");
        fs::write(&path, "1\nfoo\n").unwrap();
        match read_record(&path) {
            Err(HarnessError::InvalidRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected invalid record, got {other:?}"),
        }
    }

    #[test]
    fn test_record_writer_without_recording_is_noop() {
        let (_, writer) = Fixture::AlwaysPasses.property(None).unwrap().into_parts();
        assert!(writer.finish().is_ok());
    }
}
